use std::env;
use std::fs;
use std::path::Path;

use amo_engine::{
    load_config, BugzillaConfig, ConfigError, ConsoleConfig, RedashConfig, HOST_ENV,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn with_env_host(config: ConsoleConfig) -> ConsoleConfig {
    config.with_host_override(env::var(HOST_ENV).ok().as_deref())
}

fn write_rc(dir: &TempDir, content: &str, mode: u32) -> std::path::PathBuf {
    let path = dir.path().join(".amorc");
    fs::write(&path, content).unwrap();
    set_mode(&path, mode);
    path
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) {}

#[test]
fn missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_config(&dir.path().join("absent")).unwrap();
    assert_eq!(config, with_env_host(ConsoleConfig::default()));
    assert!(config.auth.session_id.is_none());
}

#[test]
fn json_file_overrides_defaults_and_ignores_unknown_keys() {
    let dir = TempDir::new().unwrap();
    let path = write_rc(
        &dir,
        r#"{
            "internal_base": "https://admin.example.test",
            "auth": { "session_id": "abc" },
            "redirect_limit": 3,
            "bugzilla": { "apikey": "bz-key", "readonly": true },
            "redash": { "api_key": "rd-key" },
            "phabricator": { "token": "unused" }
        }"#,
        0o600,
    );

    let config = load_config(&path).unwrap();
    let expected = with_env_host(ConsoleConfig {
        internal_base: "https://admin.example.test".to_string(),
        redirect_limit: 3,
        auth: amo_engine::AuthConfig {
            session_id: Some("abc".to_string()),
            cookie_file: None,
        },
        bugzilla: BugzillaConfig {
            api_key: Some("bz-key".to_string()),
            readonly: true,
            ..BugzillaConfig::default()
        },
        redash: RedashConfig {
            api_key: Some("rd-key".to_string()),
            ..RedashConfig::default()
        },
        ..ConsoleConfig::default()
    });
    assert_eq!(config, expected);
    assert_eq!(config.redash.data_source_id, 25);
}

#[test]
fn empty_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_rc(&dir, "\n", 0o600);
    assert_eq!(
        load_config(&path).unwrap(),
        with_env_host(ConsoleConfig::default())
    );
}

#[cfg(unix)]
#[test]
fn group_readable_file_is_refused() {
    let dir = TempDir::new().unwrap();
    let path = write_rc(&dir, "{}", 0o644);
    let err = load_config(&path).unwrap_err();
    assert!(
        matches!(err, ConfigError::InsecurePermissions { mode: 0o644, .. }),
        "{err}"
    );
}

#[test]
fn ini_style_file_is_refused() {
    let dir = TempDir::new().unwrap();
    let path = write_rc(&dir, "[auth]\nsessionid = abc\n", 0o600);
    let err = load_config(&path).unwrap_err();
    assert!(matches!(err, ConfigError::LegacyIni { .. }), "{err}");
}

#[test]
fn malformed_json_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_rc(&dir, "{ not json", 0o600);
    let err = load_config(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
}

#[test]
fn host_override_replaces_both_bases() {
    let config = ConsoleConfig::default().with_host_override(Some("addons.allizom.org"));
    assert_eq!(config.public_base, "https://addons.allizom.org");
    assert_eq!(config.internal_base, "https://addons.allizom.org");
    assert_eq!(config.admin_base(), "https://addons.allizom.org/en-US/admin");

    let untouched = ConsoleConfig::default().with_host_override(Some("  "));
    assert_eq!(untouched, ConsoleConfig::default());
}

#[test]
fn cookie_urls_are_deduplicated() {
    let config = ConsoleConfig::for_base_url("http://127.0.0.1:8080");
    assert_eq!(config.cookie_urls().unwrap().len(), 1);
    assert_eq!(ConsoleConfig::default().cookie_urls().unwrap().len(), 2);

    let broken = ConsoleConfig::for_base_url("not a url");
    assert!(matches!(
        broken.cookie_urls(),
        Err(ConfigError::InvalidUrl { .. })
    ));
}
