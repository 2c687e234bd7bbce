use ngwdocker_core::{Mode, Settings};
use tempfile::TempDir;

fn load(yaml: &str) -> Settings {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("ngwdocker.yaml");
    std::fs::write(&path, yaml).unwrap();
    Settings::load(&path).unwrap()
}

#[test]
fn load_returns_defaults_when_no_config_file() {
    let tmp = TempDir::new().unwrap();
    let settings = Settings::load(&tmp.path().join("ngwdocker.yaml")).unwrap();

    assert_eq!(settings.mode, Mode::Development);
    assert!(!settings.python3);
    assert!(settings.autoload);
    assert!(settings.registry.prefix.is_none());
    assert!(settings.stack.is_none());
    assert!(settings.package.is_empty());
}

#[test]
fn load_parses_full_config() {
    let settings = load(
        r#"
mode: production
python3: true
registry:
  prefix: registry.example.com/ngw-
  suffix: -custom
  version: "3.4"
stack:
  placement:
    constraints:
      - node.role == manager
autoload: false
package:
  nextgisweb:
  nextgisweb_qgis:
    repository:
      remote: https://github.com/nextgis/nextgisweb_qgis.git
      revision: master
"#,
    );

    assert_eq!(settings.mode, Mode::Production);
    assert!(settings.python3);
    assert!(!settings.autoload);
    assert_eq!(
        settings.registry.prefix.as_deref(),
        Some("registry.example.com/ngw-")
    );
    assert_eq!(settings.registry.suffix.as_deref(), Some("-custom"));
    assert_eq!(settings.registry.version.as_deref(), Some("3.4"));
    assert!(settings.stack.is_some());
    let placement = settings.stack.as_ref().unwrap().placement.as_ref().unwrap();
    assert!(placement.get("constraints").is_some());

    let keys: Vec<&str> = settings.package.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["nextgisweb", "nextgisweb_qgis"]);
    assert!(settings.package["nextgisweb"].enabled);
    let repo = settings.package["nextgisweb_qgis"].repository.as_ref().unwrap();
    assert_eq!(repo.revision, "master");
}

#[test]
fn mode_is_case_insensitive() {
    let settings = load("mode: Production\n");
    assert_eq!(settings.mode, Mode::Production);
}

#[test]
fn unknown_mode_returns_parse_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("ngwdocker.yaml");
    std::fs::write(&path, "mode: staging\n").unwrap();

    let err = Settings::load(&path).unwrap_err().to_string();
    assert!(err.contains("parse"), "got: {err}");
}

#[test]
fn load_invalid_yaml_returns_parse_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("ngwdocker.yaml");
    std::fs::write(&path, "mode: [unclosed\n").unwrap();

    let result = Settings::load(&path);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("parse"));
}

#[test]
fn load_empty_config_returns_defaults() {
    let settings = load("");
    assert_eq!(settings.mode, Mode::Development);
    assert!(settings.autoload);
}

// ── package settings ──

#[test]
fn package_can_be_disabled_with_false() {
    let settings = load("package:\n  foo: false\n");
    assert!(!settings.package["foo"].enabled);
}

#[test]
fn package_can_be_disabled_with_enabled_key() {
    let settings = load("package:\n  foo:\n    enabled: false\n");
    assert!(!settings.package["foo"].enabled);
    assert!(settings.package["foo"].options.is_empty());
}

#[test]
fn package_free_options_are_kept() {
    let settings = load(
        r#"
package:
  ngwdocker:
    pgadmin:
      enabled: true
    elasticsearch:
      enabled: false
"#,
    );

    let ngwdocker = settings.package_settings("ngwdocker");
    assert!(ngwdocker.enabled);
    assert!(ngwdocker.feature_enabled("pgadmin"));
    assert!(!ngwdocker.feature_enabled("elasticsearch"));
    assert!(!ngwdocker.feature_enabled("kibana"));
}

#[test]
fn missing_package_settings_default_to_enabled() {
    let settings = load("mode: development\n");
    let pkg = settings.package_settings("anything");
    assert!(pkg.enabled);
    assert!(pkg.repository.is_none());
}

#[test]
fn null_stack_is_disabled() {
    let settings = load("stack:\n");
    assert!(settings.stack.is_none());
}

#[test]
fn empty_stack_mapping_is_enabled() {
    let settings = load("stack: {}\n");
    assert!(settings.stack.is_some());
    assert!(settings.stack.unwrap().placement.is_none());
}

#[test]
fn repository_without_revision_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("ngwdocker.yaml");
    std::fs::write(
        &path,
        "package:\n  extra:\n    repository:\n      remote: https://example.com/extra.git\n      revision: ''\n",
    )
    .unwrap();

    let err = Settings::load(&path).unwrap_err();
    assert!(matches!(
        &err,
        ngwdocker_core::Error::InvalidPackageSettings { package, .. } if package == "extra"
    ));
    assert!(err.to_string().contains("repository revision is empty"), "got: {err}");
}
