#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Integration tests for the settings vault.

use std::path::{Path, PathBuf};

use prasword_store::{
    BackendConfig, ConnectionProfile, KdfParams, PostgresConfig, SettingsVault, StoreError,
};
use rusqlite::Connection;

const FAST: KdfParams = KdfParams { iterations: 10 };

fn vault(dir: &Path) -> SettingsVault {
    SettingsVault::open_with(&dir.join("settings.db"), &FAST).unwrap()
}

fn sqlite_profile(name: &str) -> ConnectionProfile {
    ConnectionProfile::new(
        name,
        BackendConfig::Sqlite {
            path: PathBuf::from(format!("/data/{name}.db")),
        },
    )
}

fn stored_payloads(dir: &Path) -> Vec<(String, String)> {
    let conn = Connection::open(dir.join("settings.db")).unwrap();
    let mut stmt = conn
        .prepare("SELECT name, config_encrypted FROM databases ORDER BY name")
        .unwrap();
    stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

#[test]
fn empty_vault_loads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let vault = vault(dir.path());
    assert!(vault.load_profiles("anything").unwrap().is_empty());
    assert!(!vault.has_profiles().unwrap());
    assert_eq!(vault.profile_count().unwrap(), 0);
}

#[test]
fn profiles_round_trip_and_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut vault = vault(dir.path());
        vault.add_profile(&sqlite_profile("home"), "vault-pw").unwrap();
        let office = ConnectionProfile {
            master_password: Some("remember-me".into()),
            ..ConnectionProfile::new(
                "office",
                BackendConfig::Postgresql {
                    config: PostgresConfig {
                        host: "db.office".into(),
                        port: 5432,
                        database: "passwords".into(),
                        user: "alice".into(),
                        password: "pg".into(),
                    },
                },
            )
        };
        vault.add_profile(&office, "vault-pw").unwrap();
    }

    let vault = vault(dir.path());
    assert_eq!(vault.profile_count().unwrap(), 2);
    let profiles = vault.load_profiles("vault-pw").unwrap();
    assert_eq!(profiles[0], sqlite_profile("home"));
    assert_eq!(profiles[1].name, "office");
    assert_eq!(profiles[1].master_password.as_deref(), Some("remember-me"));

    let office = vault.get_profile("office", "vault-pw").unwrap();
    assert_eq!(office.target.kind().as_str(), "postgresql");
}

#[test]
fn names_and_types_are_stored_in_clear() {
    let dir = tempfile::tempdir().unwrap();
    let mut vault = vault(dir.path());
    vault.add_profile(&sqlite_profile("home"), "pw").unwrap();

    let conn = Connection::open(dir.path().join("settings.db")).unwrap();
    let (name, kind, payload): (String, String, String) = conn
        .query_row(
            "SELECT name, type, config_encrypted FROM databases",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(name, "home");
    assert_eq!(kind, "sqlite");
    assert!(!payload.contains("/data/home.db"));
}

#[test]
fn wrong_vault_password_fails_whole_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut vault = vault(dir.path());
    vault.add_profile(&sqlite_profile("a"), "right").unwrap();
    vault.add_profile(&sqlite_profile("b"), "right").unwrap();

    assert!(matches!(
        vault.load_profiles("wrong"),
        Err(StoreError::WrongVaultPassword)
    ));
}

#[test]
fn duplicate_name_leaves_payload_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut vault = vault(dir.path());
    vault.add_profile(&sqlite_profile("home"), "pw").unwrap();
    let before = stored_payloads(dir.path());

    let clash = ConnectionProfile::new(
        "home",
        BackendConfig::Sqlite {
            path: PathBuf::from("/elsewhere.db"),
        },
    );
    assert!(matches!(
        vault.add_profile(&clash, "pw"),
        Err(StoreError::DuplicateProfile(name)) if name == "home"
    ));
    assert_eq!(stored_payloads(dir.path()), before);
}

#[test]
fn add_with_wrong_password_does_not_wipe_vault() {
    let dir = tempfile::tempdir().unwrap();
    let mut vault = vault(dir.path());
    vault.add_profile(&sqlite_profile("home"), "right").unwrap();
    let before = stored_payloads(dir.path());

    assert!(matches!(
        vault.add_profile(&sqlite_profile("new"), "wrong"),
        Err(StoreError::WrongVaultPassword)
    ));
    assert_eq!(stored_payloads(dir.path()), before);
    assert_eq!(vault.load_profiles("right").unwrap().len(), 1);
}

#[test]
fn remove_profile_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let mut vault = vault(dir.path());
    for name in ["a", "b", "c"] {
        vault.add_profile(&sqlite_profile(name), "pw").unwrap();
    }

    vault.remove_profile("b", "pw").unwrap();
    let names: Vec<_> = vault
        .load_profiles("pw")
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, ["a", "c"]);

    assert!(matches!(
        vault.remove_profile("b", "pw"),
        Err(StoreError::ProfileNotFound(_))
    ));
    assert!(matches!(
        vault.get_profile("zzz", "pw"),
        Err(StoreError::ProfileNotFound(_))
    ));
}

#[test]
fn save_profiles_replaces_collection() {
    let dir = tempfile::tempdir().unwrap();
    let mut vault = vault(dir.path());
    vault.add_profile(&sqlite_profile("old"), "pw").unwrap();

    vault
        .save_profiles(&[sqlite_profile("x"), sqlite_profile("y")], "pw")
        .unwrap();
    let names: Vec<_> = vault
        .load_profiles("pw")
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, ["x", "y"]);

    assert!(matches!(
        vault.save_profiles(&[sqlite_profile("x"), sqlite_profile("x")], "pw"),
        Err(StoreError::DuplicateProfile(_))
    ));
    assert_eq!(vault.profile_count().unwrap(), 2);
}
