//! Every workspace member inherits the workspace version.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("workspace root")
        .to_path_buf()
}

fn read_toml(path: &Path) -> toml::Value {
    let text = std::fs::read_to_string(path).expect("read manifest");
    text.parse().expect("parse manifest")
}

#[test]
fn members_use_workspace_version() {
    let root = workspace_root();
    let manifest = read_toml(&root.join("Cargo.toml"));
    let members = manifest["workspace"]["members"]
        .as_array()
        .expect("members array");
    assert!(!members.is_empty());

    for member in members {
        let member = member.as_str().expect("member path");
        let doc = read_toml(&root.join(member).join("Cargo.toml"));
        let inherits = doc["package"]["version"]
            .get("workspace")
            .and_then(|v| v.as_bool())
            == Some(true);
        assert!(inherits, "{member} must set version.workspace = true");
    }
}

#[test]
fn workspace_version_matches_cargo_pkg() {
    let manifest = read_toml(&workspace_root().join("Cargo.toml"));
    let version = manifest["workspace"]["package"]["version"]
        .as_str()
        .expect("workspace version");
    assert_eq!(version, qagate_core::VERSION);
}
