use std::sync::Arc;

use notevault_document::{
    DatabaseStatus, DbError, EncryptedDatabase, Group, Note, Property, PropertyKind, VaultSession,
};
use notevault_remote::testing::TestEnv;
use notevault_remote::{ProviderConfig, SyncStrategy};
use notevault_shared::DocumentKey;

const VAULT: &str = "/vault.nvdb";

fn session(env: &TestEnv) -> VaultSession {
    VaultSession::with_provider(env.provider.clone())
}

fn password_key(password: &str) -> DocumentKey {
    DocumentKey::from_password(password).unwrap()
}

fn k1() -> DocumentKey {
    password_key("correct horse")
}

#[test]
fn create_edit_reopen() {
    let env = TestEnv::new();
    let session = session(&env);

    let db = session.create(VAULT, k1()).unwrap();
    assert!(!db.deferred);
    let db = db.into_value();

    let root = db.root_group().unwrap();
    let work = db.insert_group(Group::new(root.uid, "Work")).unwrap().into_value();
    db.insert_note(Note::new(work.uid, "Email").with_property(Property::password("x")))
        .unwrap();
    assert!(!db.commit().unwrap().deferred);
    assert_eq!(db.status().unwrap(), DatabaseStatus::Normal);
    db.close();

    let reopened = session.open(VAULT, k1()).unwrap().into_value();
    let work_groups: Vec<_> = reopened
        .all_groups()
        .unwrap()
        .into_iter()
        .filter(|g| !g.is_root())
        .collect();
    assert_eq!(work_groups.len(), 1);
    assert_eq!(work_groups[0].title, "Work");
    assert_eq!(work_groups[0].note_count, 1);

    let notes = reopened.notes_in(&work_groups[0].uid).unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "Email");
    let password = notes[0].property(PropertyKind::Password).unwrap();
    assert_eq!(password.value, "x");
}

#[test]
fn remote_bytes_are_encrypted_under_the_key() {
    let env = TestEnv::new();
    let session = session(&env);
    session.create(VAULT, k1()).unwrap();

    let bytes = env.remote_bytes(VAULT);
    assert_eq!(&bytes[..4], b"NVDB");
    let store = Arc::new(env.provider.clone());
    assert!(EncryptedDatabase::open(store.clone(), session.file(VAULT), k1(), &bytes).is_ok());
    assert!(matches!(
        EncryptedDatabase::open(store, session.file(VAULT), password_key("nope"), &bytes),
        Err(DbError::Auth)
    ));
}

#[test]
fn wrong_key_on_open_is_auth_error() {
    let env = TestEnv::new();
    let session = session(&env);
    session.create(VAULT, k1()).unwrap();

    assert!(matches!(
        session.open(VAULT, password_key("wrong")),
        Err(DbError::Auth)
    ));
}

#[test]
fn offline_edits_survive_and_sync_later() {
    let env = TestEnv::new();
    let session = session(&env);
    let db = session.create(VAULT, k1()).unwrap().into_value();
    let root = db.root_group().unwrap().uid;

    env.api.set_network_down(true);
    let outcome = db.insert_group(Group::new(root, "Offline")).unwrap();
    assert!(outcome.deferred);
    assert_eq!(db.status().unwrap(), DatabaseStatus::PostponedChanges);
    db.close();

    let cached = session.open(VAULT, k1()).unwrap();
    assert!(cached.deferred);
    // The offline edit is still queued in the cache.
    assert_eq!(cached.value.status().unwrap(), DatabaseStatus::PostponedChanges);
    assert_eq!(cached.value.find_groups("offline").unwrap().len(), 1);

    env.api.set_network_down(false);
    let report = session.sync_all(SyncStrategy::default()).unwrap();
    assert_eq!(report.uploaded, vec![VAULT.to_string()]);

    let bytes = env.remote_bytes(VAULT);
    let fresh = EncryptedDatabase::open(Arc::new(env.provider.clone()), session.file(VAULT), k1(), &bytes)
        .unwrap();
    assert_eq!(fresh.find_groups("offline").unwrap().len(), 1);
}

#[test]
fn reopening_offline_without_local_edits_is_cached() {
    let env = TestEnv::new();
    let session = session(&env);
    session.create(VAULT, k1()).unwrap().into_value().close();

    env.api.set_network_down(true);
    let cached = session.open(VAULT, k1()).unwrap();
    assert!(cached.deferred);
    assert_eq!(cached.value.status().unwrap(), DatabaseStatus::Cached);
}

#[test]
fn create_refuses_to_replace_existing_remote_file() {
    let env = TestEnv::new();
    env.seed_remote(VAULT, b"someone else's vault");

    assert!(matches!(
        session(&env).create(VAULT, k1()),
        Err(DbError::VersionConflict(_))
    ));
    assert_eq!(env.remote_bytes(VAULT), b"someone else's vault");
}

#[test]
fn postponed_changes_commit_without_cache() {
    let env = TestEnv::with_config(ProviderConfig {
        cache_enabled: false,
        ..ProviderConfig::default()
    });
    let session = session(&env);
    let db = session.create(VAULT, k1()).unwrap().into_value();
    db.set_postpone_changes(true).unwrap();

    let root = db.root_group().unwrap().uid;
    let outcome = db.insert_group(Group::new(root, "Work")).unwrap();
    assert!(!outcome.deferred);
    db.close();

    let reopened = session.open(VAULT, k1()).unwrap().into_value();
    assert_eq!(reopened.find_groups("work").unwrap().len(), 1);
}

#[test]
fn rejected_upload_rolls_back_insert() {
    let env = TestEnv::new();
    let session = session(&env);
    let db = session.create(VAULT, k1()).unwrap().into_value();
    let root = db.root_group().unwrap().uid;

    env.api.set_reject_uploads(true);
    let group = Group::new(root, "Doomed");
    let uid = group.uid;
    assert!(matches!(db.insert_group(group), Err(DbError::Api(_))));
    assert!(matches!(db.get_group(&uid), Err(DbError::NotFound(_))));
}

#[test]
fn read_only_session() {
    let env = TestEnv::new();
    session(&env).create(VAULT, k1()).unwrap();

    let read_only = TestEnv::with_config(ProviderConfig {
        write_enabled: false,
        ..ProviderConfig::default()
    });
    let file = read_only.seed_remote(VAULT, &env.remote_bytes(VAULT));
    let db = VaultSession::with_provider(read_only.provider.clone())
        .open(&file.path, k1())
        .unwrap()
        .into_value();

    assert_eq!(db.status().unwrap(), DatabaseStatus::ReadOnly);
    let root = db.root_group().unwrap().uid;
    assert!(matches!(
        db.insert_group(Group::new(root, "Nope")),
        Err(DbError::Unsupported(_))
    ));
}

#[test]
fn concurrent_edits_are_serialized() {
    let env = TestEnv::new();
    let session = session(&env);
    let db = session.create(VAULT, k1()).unwrap().into_value();
    let root = db.root_group().unwrap().uid;

    std::thread::scope(|scope| {
        for t in 0..4 {
            let db = &db;
            scope.spawn(move || {
                for i in 0..3 {
                    db.insert_group(Group::new(root, format!("t{t}-{i}"))).unwrap();
                }
            });
        }
    });

    // Root and twelve new groups.
    assert_eq!(db.all_groups().unwrap().len(), 13);
    db.close();
    let reopened = session.open(VAULT, k1()).unwrap().into_value();
    assert_eq!(reopened.root_group().unwrap().group_count, 12);
}
