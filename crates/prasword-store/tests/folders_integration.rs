#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Integration tests for folder management.

use std::sync::Arc;

use prasword_store::{
    FolderUpdate, KdfParams, NewPassword, RecordingEvents, SqliteBackend, Store, StoreError,
    StoreEvent, DEFAULT_FOLDER_COLOR,
};

fn open() -> (Store, RecordingEvents) {
    let events = RecordingEvents::new();
    let store = Store::create(
        Box::new(SqliteBackend::in_memory().unwrap()),
        "master",
        &KdfParams { iterations: 10 },
        Arc::new(events.clone()),
    )
    .unwrap();
    (store, events)
}

#[test]
fn folders_are_listed_by_name_with_default_color() {
    let (mut store, _) = open();
    let work = store.create_folder("Work", None, None).unwrap();
    let bank = store
        .create_folder("Banking", Some(&[0x89_u8, 0x50, 0x4e, 0x47][..]), Some("#e74c3c"))
        .unwrap();
    assert!(work > 1 && bank > work);

    let folders = store.list_folders().unwrap();
    let names: Vec<_> = folders.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["Banking", "General", "Work"]);

    let work = store.get_folder(work).unwrap();
    assert_eq!(work.color, DEFAULT_FOLDER_COLOR);
    assert!(work.icon.is_none());
    assert!(work.created_at.is_some());

    let banking = &folders[0];
    assert_eq!(banking.color, "#e74c3c");
    assert_eq!(banking.icon_base64().as_deref(), Some("iVBORw=="));
}

#[test]
fn empty_folder_name_is_rejected() {
    let (mut store, _) = open();
    assert!(matches!(
        store.create_folder("  ", None, None),
        Err(StoreError::InvalidInput(_))
    ));
    assert_eq!(store.list_folders().unwrap().len(), 1);
}

#[test]
fn update_rewrites_only_supplied_fields() {
    let (mut store, _) = open();
    let id = store
        .create_folder("Travel", Some(&b"icon"[..]), Some("#111111"))
        .unwrap();

    store
        .update_folder(
            id,
            &FolderUpdate {
                color: Some("#222222".into()),
                ..FolderUpdate::default()
            },
        )
        .unwrap();

    let folder = store.get_folder(id).unwrap();
    assert_eq!(folder.name, "Travel");
    assert_eq!(folder.icon.as_deref(), Some(&b"icon"[..]));
    assert_eq!(folder.color, "#222222");
    assert!(folder.updated_at.is_some());
}

#[test]
fn update_of_unknown_folder_is_not_found() {
    let (mut store, _) = open();
    let err = store
        .update_folder(
            99,
            &FolderUpdate {
                name: Some("x".into()),
                ..FolderUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::FolderNotFound(99)));
}

#[test]
fn default_folder_cannot_be_deleted() {
    let (mut store, _) = open();
    let other = store.create_folder("Other", None, None).unwrap();

    assert!(matches!(
        store.delete_folder(1, other),
        Err(StoreError::ProtectedFolder(1))
    ));
    assert!(store.get_folder(1).is_ok());
}

#[test]
fn deleting_a_folder_moves_its_entries() {
    let (mut store, events) = open();
    let old = store.create_folder("Old", None, None).unwrap();
    let new = store.create_folder("New", None, None).unwrap();
    for title in ["a", "b", "c"] {
        store
            .add_password(&NewPassword {
                folder_id: old,
                ..NewPassword::new(title, "pw")
            })
            .unwrap();
    }
    store.add_password(&NewPassword::new("d", "pw")).unwrap();

    let moved = store.delete_folder(old, new).unwrap();
    assert_eq!(moved, 3);

    assert!(matches!(
        store.get_folder(old),
        Err(StoreError::FolderNotFound(_))
    ));
    let entries = store.get_passwords(None).unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries.iter().filter(|e| e.folder_id == new).count(), 3);
    assert!(events.events().contains(&StoreEvent::FolderDeleted {
        folder_id: old,
        moved_to: new,
        moved_entries: 3,
    }));
}

#[test]
fn deleting_into_default_folder() {
    let (mut store, _) = open();
    let temp = store.create_folder("Temp", None, None).unwrap();
    store
        .add_password(&NewPassword {
            folder_id: temp,
            ..NewPassword::new("x", "y")
        })
        .unwrap();

    store.delete_folder(temp, 1).unwrap();
    assert_eq!(store.get_passwords(Some(1)).unwrap().len(), 1);
}

#[test]
fn failed_delete_leaves_entries_in_place() {
    let (mut store, _) = open();
    let source = store.create_folder("Source", None, None).unwrap();
    store
        .add_password(&NewPassword {
            folder_id: source,
            ..NewPassword::new("stay", "pw")
        })
        .unwrap();

    // Unknown target: nothing moves, nothing is deleted.
    assert!(matches!(
        store.delete_folder(source, 999),
        Err(StoreError::FolderNotFound(999))
    ));
    assert_eq!(store.get_passwords(Some(source)).unwrap().len(), 1);

    // Unknown source.
    assert!(matches!(
        store.delete_folder(888, 1),
        Err(StoreError::FolderNotFound(888))
    ));

    assert!(matches!(
        store.delete_folder(source, source),
        Err(StoreError::InvalidInput(_))
    ));
}

#[test]
fn counts_include_empty_folders() {
    let (mut store, _) = open();
    let empty = store.create_folder("Empty", None, None).unwrap();
    let busy = store.create_folder("Busy", None, Some("#00ff00")).unwrap();
    for title in ["one", "two"] {
        store
            .add_password(&NewPassword {
                folder_id: busy,
                ..NewPassword::new(title, "pw")
            })
            .unwrap();
    }

    let counts = store.count_by_folder().unwrap();
    let names: Vec<_> = counts.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Busy", "Empty", "General"]);

    let by_id = |id| counts.iter().find(|c| c.id == id).unwrap();
    assert_eq!(by_id(busy).password_count, 2);
    assert_eq!(by_id(busy).color, "#00ff00");
    assert_eq!(by_id(empty).password_count, 0);
    assert_eq!(by_id(1).password_count, 0);
}
