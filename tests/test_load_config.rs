use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::{tempdir, NamedTempFile};
use theme_sync::load_config::{
    default_config_path, load_config, save_config, ClientConfig, DEFAULT_PROVIDER_ID,
    DEFAULT_PROVIDER_REPOSITORY,
};
use theme_sync_core::config::ProviderRef;

#[test]
fn test_load_config_full_file_preserves_provider_order() {
    let config_yaml = r#"
selected_program_dir: /opt/peggle
installed_theme_providers:
  zeta: someone/zeta-themes
  alpha: other/alpha-themes
dark_mode: false
auto_update_themes: false
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    let config = load_config(config_file.path()).expect("Config should load");

    assert_eq!(config.selected_program_dir, "/opt/peggle");
    assert!(!config.dark_mode);
    assert!(!config.auto_update_themes);
    assert_eq!(
        config.providers(),
        vec![
            ProviderRef::new("zeta", "someone/zeta-themes"),
            ProviderRef::new("alpha", "other/alpha-themes"),
        ]
    );

    let snapshot = config.snapshot();
    assert_eq!(snapshot.program_dir, Some(PathBuf::from("/opt/peggle")));
    assert_eq!(snapshot.providers.len(), 2);
    assert!(!snapshot.dark_mode);
}

#[test]
fn test_missing_or_empty_file_yields_defaults() {
    let dir = tempdir().unwrap();
    let missing = load_config(dir.path().join("absent.yml")).unwrap();
    assert_eq!(missing, ClientConfig::default());

    for content in ["", "~\n"] {
        let file = NamedTempFile::new().unwrap();
        write(file.path(), content).unwrap();
        assert_eq!(load_config(file.path()).unwrap(), ClientConfig::default(), "{content:?}");
    }

    let defaults = ClientConfig::default();
    assert_eq!(
        defaults.providers(),
        vec![ProviderRef::new(DEFAULT_PROVIDER_ID, DEFAULT_PROVIDER_REPOSITORY)]
    );
    assert!(defaults.dark_mode && defaults.auto_update_themes);
    assert_eq!(defaults.snapshot().program_dir, None);
}

#[test]
fn test_invalid_yaml_is_an_error() {
    let file = NamedTempFile::new().unwrap();
    write(file.path(), "installed_theme_providers: [unclosed").unwrap();
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config YAML"));
}

#[test]
fn test_edits_survive_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sub/theme_provider_config.yml");

    let mut config = ClientConfig::default();
    config.add_provider("mine", "me/mine").unwrap();
    assert!(config.add_provider("bad", "no-slash").is_err());
    for locator in ["owner/..", "owner/.", "owner/../", "/"] {
        assert!(config.add_provider("bad", locator).is_err(), "{locator:?}");
    }
    assert!(config.add_provider(" ", "me/x").is_err());
    config.set_program_dir(&PathBuf::from("/games/peggle"));
    assert!(config.remove_provider(DEFAULT_PROVIDER_ID));
    assert!(!config.remove_provider("never-added"));
    save_config(&path, &config).unwrap();

    let reloaded = load_config(&path).unwrap();
    assert_eq!(reloaded, config);
    assert_eq!(reloaded.providers(), vec![ProviderRef::new("mine", "me/mine")]);
    assert_eq!(reloaded.selected_program_dir, "/games/peggle");
}

#[test]
fn test_empty_provider_mapping_stays_empty() {
    let file = NamedTempFile::new().unwrap();
    write(file.path(), "installed_theme_providers: {}\n").unwrap();
    let config = load_config(file.path()).unwrap();
    assert!(config.providers().is_empty());
}

#[test]
#[serial]
fn test_default_path_is_under_home() {
    let home = tempdir().unwrap();
    let previous = env::var_os("HOME");
    env::set_var("HOME", home.path());

    let path = default_config_path().unwrap();

    match previous {
        Some(value) => env::set_var("HOME", value),
        None => env::remove_var("HOME"),
    }
    assert_eq!(
        path,
        home.path()
            .join(".theme_provider_client")
            .join("theme_provider_config.yml")
    );
}
