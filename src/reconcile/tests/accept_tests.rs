use super::*;
use crate::store;

fn sha256_hex(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

#[test]
fn test_accept_changed_rebaselines() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let a = track_file(&store, &temp, "a.txt", "v1");

    fs::write(a.as_path(), "v2").unwrap();
    assert_eq!(scan(&store).changed, vec![a.clone()]);

    let outcome = accept(&store, Classification::Changed, &a, None).unwrap();

    assert_eq!(outcome, AcceptOutcome::Updated);
    assert_eq!(scan(&store).unchanged, vec![a.clone()]);

    let entry = store.entry(&a).unwrap();
    assert_eq!(entry.status, EntryStatus::Accepted);
    assert_eq!(entry.sha256, Some(sha256_hex("v2")));

    // Durable, not just in memory.
    let loaded = store::load(store.path()).unwrap();
    assert_eq!(loaded.baseline.get(&a), Some(&entry));
}

#[test]
fn test_accept_changed_twice_is_noop() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let a = track_file(&store, &temp, "a.txt", "v1");
    fs::write(a.as_path(), "v2").unwrap();

    accept(&store, Classification::Changed, &a, None).unwrap();
    let second = accept(&store, Classification::Changed, &a, None).unwrap();

    assert_eq!(second, AcceptOutcome::NoOp);
}

#[test]
fn test_accept_changed_uses_content_at_accept_time() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let a = track_file(&store, &temp, "a.txt", "v1");
    fs::write(a.as_path(), "v2").unwrap();
    assert_eq!(scan(&store).changed, vec![a.clone()]);

    fs::write(a.as_path(), "v3").unwrap();
    accept(&store, Classification::Changed, &a, None).unwrap();

    assert_eq!(store.entry(&a).unwrap().sha256, Some(sha256_hex("v3")));
}

#[test]
fn test_accept_changed_with_matching_expected_digest() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let a = track_file(&store, &temp, "a.txt", "v1");
    fs::write(a.as_path(), "v2").unwrap();

    let outcome = accept(
        &store,
        Classification::Changed,
        &a,
        Some(&sha256_hex("v2")),
    )
    .unwrap();

    assert_eq!(outcome, AcceptOutcome::Updated);
}

#[test]
fn test_accept_changed_digest_mismatch_changes_nothing() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let a = track_file(&store, &temp, "a.txt", "v1");
    fs::write(a.as_path(), "v2").unwrap();
    let inspected = sha256_hex("v2");

    // Modified again after the caller looked at it.
    fs::write(a.as_path(), "v3").unwrap();
    let result = accept(&store, Classification::Changed, &a, Some(&inspected));

    match result {
        Err(ReconcileError::DigestMismatch {
            path,
            expected,
            actual,
        }) => {
            assert_eq!(path, a);
            assert_eq!(expected, inspected);
            assert_eq!(actual, sha256_hex("v3"));
        }
        other => panic!("Expected DigestMismatch, got {other:?}"),
    }
    assert_eq!(store.entry(&a).unwrap().sha256, Some(sha256_hex("v1")));
}

#[test]
fn test_accept_changed_untracked_is_invalid() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let file = temp.path().join("stray.txt");
    fs::write(&file, "v1").unwrap();

    let result = accept(&store, Classification::Changed, &tracked_path(&file), None);

    assert!(matches!(result, Err(ReconcileError::InvalidOperation(_))));
    assert!(store.snapshot().is_empty());
}

#[test]
fn test_accept_changed_after_file_vanished() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let a = track_file(&store, &temp, "a.txt", "v1");
    fs::remove_file(a.as_path()).unwrap();

    let result = accept(&store, Classification::Changed, &a, None);

    assert!(matches!(
        result,
        Err(ReconcileError::Read(ReadError::NotFound(_)))
    ));
    assert!(store.is_tracked(&a));
}

#[test]
fn test_accept_removed_twice() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let a = track_file(&store, &temp, "a.txt", "v1");
    let b = track_file(&store, &temp, "b.txt", "v1");
    fs::remove_file(a.as_path()).unwrap();

    let first = accept(&store, Classification::Removed, &a, None).unwrap();
    let second = accept(&store, Classification::Removed, &a, None).unwrap();

    assert_eq!(first, AcceptOutcome::Removed);
    assert_eq!(second, AcceptOutcome::NoOp);
    assert!(!store.is_tracked(&a));
    assert!(!store.tracked().contains(&a));
    let listed: Vec<TrackedPath> = store.list().into_iter().map(|(p, _)| p).collect();
    assert_eq!(listed, vec![b.clone()]);

    let result = scan(&store);
    assert_eq!(result.classification_of(&a), None);
    assert_eq!(result.unchanged, vec![b]);

    let (reopened, _) = BaselineStore::open(store.path()).unwrap();
    assert!(!reopened.is_tracked(&a));
}

#[test]
fn test_accept_removed_when_file_came_back() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let a = track_file(&store, &temp, "a.txt", "v1");

    let outcome = accept(&store, Classification::Removed, &a, None).unwrap();

    assert_eq!(outcome, AcceptOutcome::Removed);
    assert!(!store.is_tracked(&a));
    assert!(a.as_path().exists());
}

#[test]
fn test_accept_unchanged_is_noop() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let a = track_file(&store, &temp, "a.txt", "v1");
    let before = store.snapshot();

    let outcome = accept(&store, Classification::Unchanged, &a, None).unwrap();

    assert_eq!(outcome, AcceptOutcome::NoOp);
    assert_eq!(store.snapshot(), before);
}

#[test]
fn test_accept_unknown_is_invalid() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let a = track_file(&store, &temp, "a.txt", "v1");

    let result = accept(&store, Classification::Unknown, &a, None);

    assert!(matches!(result, Err(ReconcileError::InvalidOperation(_))));
    assert!(store.is_tracked(&a));
}

#[test]
fn test_accept_scanned_all() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let a = track_file(&store, &temp, "a.txt", "v1");
    let b = track_file(&store, &temp, "b.txt", "v1");
    let c = track_file(&store, &temp, "c.txt", "v1");
    fs::write(a.as_path(), "v2").unwrap();
    fs::remove_file(b.as_path()).unwrap();

    let summary = accept_scanned(&store, &Selection::All, None).unwrap();

    assert_eq!(summary.updated, vec![a.clone()]);
    assert_eq!(summary.removed, vec![b.clone()]);
    assert!(summary.skipped.is_empty());

    let result = scan(&store);
    assert!(!result.has_differences());
    assert_eq!(result.unchanged, vec![a, c]);
    assert!(!store.is_tracked(&b));
}

#[test]
fn test_accept_scanned_with_matching_fingerprint() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let a = track_file(&store, &temp, "a.txt", "v1");
    fs::write(a.as_path(), "v2").unwrap();
    let shown = scan(&store);

    let summary = accept_scanned(&store, &Selection::All, Some(&shown.fingerprint)).unwrap();

    assert_eq!(summary.updated, vec![a]);
}

#[test]
fn test_accept_scanned_fingerprint_mismatch_changes_nothing() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let a = track_file(&store, &temp, "a.txt", "v1");
    let b = track_file(&store, &temp, "b.txt", "v1");
    fs::write(a.as_path(), "v2").unwrap();
    let shown = scan(&store);

    // A difference the user never saw.
    fs::remove_file(b.as_path()).unwrap();
    let before = store.snapshot();
    let result = accept_scanned(&store, &Selection::All, Some(&shown.fingerprint));

    match result {
        Err(ReconcileError::FingerprintMismatch { expected, actual }) => {
            assert_eq!(expected, shown.fingerprint);
            assert_ne!(actual, shown.fingerprint);
        }
        other => panic!("Expected FingerprintMismatch, got {other:?}"),
    }
    assert_eq!(store.snapshot(), before);
}

#[test]
fn test_accept_scanned_selected_paths_only() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let a = track_file(&store, &temp, "a.txt", "v1");
    let b = track_file(&store, &temp, "b.txt", "v1");
    fs::write(a.as_path(), "v2").unwrap();
    fs::write(b.as_path(), "v2").unwrap();

    let summary = accept_scanned(&store, &Selection::Paths(vec![b.clone()]), None).unwrap();

    assert_eq!(summary.updated, vec![b.clone()]);
    let result = scan(&store);
    assert_eq!(result.changed, vec![a]);
    assert_eq!(result.unchanged, vec![b]);
}

#[test]
fn test_accept_scanned_rejects_untracked_selection() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let a = track_file(&store, &temp, "a.txt", "v1");
    fs::write(a.as_path(), "v2").unwrap();
    let stray = tracked_path(&temp.path().join("stray.txt"));

    let result = accept_scanned(&store, &Selection::Paths(vec![a.clone(), stray]), None);

    assert!(matches!(result, Err(ReconcileError::InvalidOperation(_))));
    assert_eq!(scan(&store).changed, vec![a]);
}

#[test]
fn test_accept_scanned_nothing_to_do() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    track_file(&store, &temp, "a.txt", "v1");

    let summary = accept_scanned(&store, &Selection::All, None).unwrap();

    assert!(summary.updated.is_empty());
    assert!(summary.removed.is_empty());
    assert!(summary.skipped.is_empty());
}

#[test]
#[cfg(unix)]
fn test_accept_scanned_skips_unknown() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let locked = track_file(&store, &temp, "locked.txt", "v1");
    let a = track_file(&store, &temp, "a.txt", "v1");
    fs::write(a.as_path(), "v2").unwrap();
    fs::set_permissions(locked.as_path(), fs::Permissions::from_mode(0o000)).unwrap();
    // Root ignores file modes.
    if fs::File::open(locked.as_path()).is_ok() {
        return;
    }

    let summary = accept_scanned(&store, &Selection::All, None).unwrap();

    assert_eq!(summary.updated, vec![a]);
    assert_eq!(summary.skipped, vec![locked.clone()]);
    assert_eq!(
        store.entry(&locked).unwrap().sha256,
        Some(sha256_hex("v1"))
    );

    fs::set_permissions(locked.as_path(), fs::Permissions::from_mode(0o644)).unwrap();
}
