use std::path::PathBuf;

fn motionviz_exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_motionviz")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "motionviz.exe"
            } else {
                "motionviz"
            });
            p
        })
}

#[test]
fn cli_gallery_writes_markdown_pages() {
    let tmp = tempfile::tempdir().unwrap();
    let vid = tmp.path().join("data/vid");
    let thumb = tmp.path().join("data/thumb");
    std::fs::create_dir_all(&vid).unwrap();
    std::fs::create_dir_all(&thumb).unwrap();
    for name in ["one.gif", "two.gif"] {
        std::fs::write(vid.join(name), b"gif").unwrap();
        std::fs::write(thumb.join(name), b"gif").unwrap();
    }

    let status = std::process::Command::new(motionviz_exe())
        .args(["gallery", "--root"])
        .arg(tmp.path())
        .status()
        .unwrap();

    assert!(status.success());
    let index = std::fs::read_to_string(tmp.path().join("data/README.md")).unwrap();
    assert!(index.contains("[![one.gif](thumb/one.gif)](vid/one.gif)"));
    assert!(index.contains("[![two.gif](thumb/two.gif)](vid/two.gif)"));
}

#[test]
fn cli_gallery_honors_config_file_root() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("work");
    std::fs::create_dir_all(root.join("data/vid")).unwrap();
    std::fs::create_dir_all(root.join("data/thumb")).unwrap();

    let config_path = tmp.path().join("motionviz.json");
    std::fs::write(
        &config_path,
        format!(r#"{{ "root": "{}" }}"#, root.display()),
    )
    .unwrap();

    let status = std::process::Command::new(motionviz_exe())
        .args(["gallery", "--config"])
        .arg(&config_path)
        .status()
        .unwrap();

    assert!(status.success());
    assert!(root.join("data/README.md").is_file());
}
