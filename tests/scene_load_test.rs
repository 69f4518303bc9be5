//! End-to-end loader tests against the checked-in fixture: a scene with one
//! red-material mesh, one material-less mesh and one translation animation,
//! carried in a base64 data-URI buffer.

use cgmath::Vector3;
use orbit_viewer::{
    animation::Mixer,
    resources::load_scene,
    scene::{DEFAULT_BASE_COLOR, apply_material_policy},
};

fn fixture_path() -> String {
    format!(
        "{}/tests/data/two_meshes.gltf",
        env!("CARGO_MANIFEST_DIR")
    )
}

#[tokio::test]
async fn loads_the_fixture_scene() {
    let mut reports: Vec<(u64, u64)> = Vec::new();
    let data = load_scene(&fixture_path(), |loaded, total| {
        reports.push((loaded, total));
    })
    .await
    .unwrap();

    // Progress ran up to the full file size.
    let (loaded, total) = *reports.last().unwrap();
    assert_eq!(loaded, total);
    assert!(total > 0);
    assert!(reports.windows(2).all(|w| w[0].0 <= w[1].0));

    assert_eq!(data.root.children.len(), 2);
    let crate_node = &data.root.children[0];
    let bare_node = &data.root.children[1];
    assert_eq!(crate_node.name, "Crate");
    assert_eq!(bare_node.name, "Bare");
    assert_eq!(bare_node.transform.position, Vector3::new(2.0, 0.0, 0.0));

    let crate_mesh = crate_node.mesh.as_ref().unwrap();
    assert_eq!(crate_mesh.primitives.len(), 1);
    assert_eq!(crate_mesh.primitives[0].material, Some(0));
    assert_eq!(crate_mesh.primitives[0].vertices.len(), 3);
    assert_eq!(crate_mesh.primitives[0].indices, vec![0, 1, 2]);

    let bare_mesh = bare_node.mesh.as_ref().unwrap();
    assert_eq!(bare_mesh.primitives[0].material, None);

    assert_eq!(data.materials.len(), 1);
    assert_eq!(data.materials[0].name, "Red");
    assert_eq!(data.materials[0].base_color, [1.0, 0.0, 0.0, 1.0]);
    assert_eq!(data.materials[0].roughness, 0.4);
    assert_eq!(data.materials[0].metallic, 0.1);

    assert_eq!(data.animations.len(), 1);
    assert_eq!(data.animations[0].name, "Bob");
    assert_eq!(data.animations[0].target, 0);
}

#[tokio::test]
async fn policy_and_mixer_run_on_the_loaded_scene() {
    let mut data = load_scene(&fixture_path(), |_, _| {}).await.unwrap();
    apply_material_policy(&mut data);

    // The bare primitive got the appended default, the red one is untouched.
    assert_eq!(data.materials.len(), 2);
    assert_eq!(data.materials[1].base_color, DEFAULT_BASE_COLOR);
    let crate_mesh = data.root.children[0].mesh.as_ref().unwrap();
    let bare_mesh = data.root.children[1].mesh.as_ref().unwrap();
    assert_eq!(crate_mesh.primitives[0].material, Some(0));
    assert_eq!(bare_mesh.primitives[0].material, Some(1));
    assert!(crate_mesh.cast_shadow && crate_mesh.receive_shadow);
    assert!(bare_mesh.cast_shadow && bare_mesh.receive_shadow);

    let mut mixer = Mixer::new(data.animations);
    assert_eq!(mixer.actions().len(), 1);
    assert_eq!(mixer.actions()[0].name, "Bob");
    assert!(mixer.actions()[0].playing);

    // Halfway through the 1s clip the 0..(0,2,0) translation is (0,1,0).
    let deltas = mixer.update(0.5);
    assert_eq!(deltas.len(), 1);
    let (target, delta) = deltas[0];
    assert_eq!(target, 0);
    assert_eq!(delta.translation, Some(Vector3::new(0.0, 1.0, 0.0)));
}

#[tokio::test]
async fn missing_asset_is_an_error_not_a_panic() {
    let result = load_scene("tests/data/does_not_exist.gltf", |_, _| {}).await;
    assert!(result.is_err());
}
