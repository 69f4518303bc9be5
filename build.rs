use std::{env, path::PathBuf};

use anyhow::Result;
use fs_extra::{copy_items, dir::CopyOptions};

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=assets/*");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = env::var("OUT_DIR")?;

    // The viewer resolves its asset path relative to the binary, so the
    // assets directory ships next to the build output when one exists.
    if manifest_dir.join("assets").exists() {
        let options = CopyOptions {
            overwrite: true,
            ..CopyOptions::new()
        };
        copy_items(&["assets/"], out_dir, &options)?;
    }

    Ok(())
}
