use orbit_viewer::{DEFAULT_ASSET, app};

fn main() -> anyhow::Result<()> {
    app::run(DEFAULT_ASSET)
}
