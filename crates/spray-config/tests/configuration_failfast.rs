use std::ffi::OsString;
use std::fs;

use ortho_config::OrthoConfig;
use tempfile::TempDir;

use spray_config::Config;

#[test]
fn malformed_config_file_fails_to_load() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let path = temp_dir.path().join("spray.toml");
    fs::write(&path, "endpoint = \"tcp://127.0.0.1\"\nmax_line_bytes = \"lots\"\n")
        .expect("write malformed config");

    let args = vec![
        OsString::from("spray-peer"),
        OsString::from("--config-path"),
        path.into_os_string(),
    ];

    let error = Config::load_from_iter(args).expect_err("loading must fail");
    assert!(
        !error.to_string().is_empty(),
        "expected a descriptive configuration error"
    );
}

#[test]
fn endpoint_flag_rejects_non_tcp_scheme() {
    let args = vec![
        OsString::from("spray-peer"),
        OsString::from("--endpoint"),
        OsString::from("unix:///tmp/spray.sock"),
    ];

    assert!(
        Config::load_from_iter(args).is_err(),
        "unix endpoints must be rejected"
    );
}
