use super::*;

fn policy(allow: &[&str], deny: &[&str]) -> PatternPolicy {
    PatternPolicy {
        allow: allow.iter().map(|s| (*s).to_string()).collect(),
        deny: deny.iter().map(|s| (*s).to_string()).collect(),
    }
}

#[test]
fn test_load_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = PolicyStore::new();
    let loaded = store
        .load_command_policy(&dir.path().join("absent.json"))
        .unwrap();
    assert_eq!(loaded, PatternPolicy::default());
}

#[test]
fn test_load_empty_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.json");
    std::fs::write(&path, "").unwrap();
    let store = PolicyStore::new();
    assert_eq!(
        store.load_command_policy(&path).unwrap(),
        PatternPolicy::default()
    );
}

#[test]
fn test_save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("allowed_commands.json");
    let store = PolicyStore::new();
    let p = policy(&["git status", "ls *"], &["rm *"]);
    store.save_command_policy(&path, &p).unwrap();
    assert_eq!(store.load_command_policy(&path).unwrap(), p);

    // A fresh store reads the same bytes back from disk.
    let fresh = PolicyStore::new();
    assert_eq!(fresh.load_command_policy(&path).unwrap(), p);
}

#[test]
fn test_save_load_byte_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("p.json");
    let store = PolicyStore::new();
    store
        .save_command_policy(&path, &policy(&["git status"], &[]))
        .unwrap();
    let first = std::fs::read(&path).unwrap();
    let loaded = store.load_command_policy(&path).unwrap();
    store.save_command_policy(&path, &loaded).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), first);
}

#[test]
fn test_parse_error_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{not json").unwrap();
    let store = PolicyStore::new();
    assert!(store.load_command_policy(&path).is_err());
}

#[test]
fn test_cache_ignores_external_edits_until_reset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("p.json");
    let store = PolicyStore::new();
    store
        .save_command_policy(&path, &policy(&["git status"], &[]))
        .unwrap();

    // External tampering is invisible to the cached load…
    std::fs::write(&path, r#"{"allow":["rm -rf /"],"deny":[]}"#).unwrap();
    assert_eq!(
        store.load_command_policy(&path).unwrap().allow,
        vec!["git status".to_string()]
    );

    // …until the cache is reset.
    store.reset_cache();
    assert_eq!(
        store.load_command_policy(&path).unwrap().allow,
        vec!["rm -rf /".to_string()]
    );
}

#[test]
fn test_flush_all_restores_tampered_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("p.json");
    let store = PolicyStore::new();
    let p = policy(&["git status"], &["curl *"]);
    store.save_command_policy(&path, &p).unwrap();
    let original = std::fs::read(&path).unwrap();

    std::fs::write(&path, r#"{"allow":["*"],"deny":[]}"#).unwrap();
    store.flush_all().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), original);
}

#[test]
fn test_pattern_policy_insert_dedup_preserves_order() {
    let mut p = PatternPolicy::default();
    assert!(p.insert_allow("git status"));
    assert!(p.insert_allow("git commit *"));
    assert!(!p.insert_allow("git status"));
    assert_eq!(p.allow, vec!["git status", "git commit *"]);
    assert!(p.insert_deny("rm *"));
    assert!(!p.insert_deny("rm *"));
    assert_eq!(p.deny, vec!["rm *"]);
}

#[test]
fn test_users_round_trip_and_membership() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("allowed_users.json");
    let store = PolicyStore::new();

    let mut users = UserAllowlist::default();
    users.insert(UserEntry {
        id: "12345".into(),
        channel: "Telegram".into(),
        username: "jturnbull".into(),
        name: "James".into(),
        added_at: Utc::now(),
    });
    store.save_users(&path, &users).unwrap();

    let loaded = store.load_users(&path).unwrap();
    assert!(loaded.contains("12345", "telegram"));
    assert!(loaded.contains("12345", "TELEGRAM"));
    assert!(!loaded.contains("12345", "discord"));
    assert!(!loaded.contains("99999", "telegram"));
}

#[test]
fn test_users_insert_dedup() {
    let mut users = UserAllowlist::default();
    let entry = UserEntry {
        id: "1".into(),
        channel: "terminal".into(),
        username: String::new(),
        name: String::new(),
        added_at: Utc::now(),
    };
    assert!(users.insert(entry.clone()));
    assert!(!users.insert(UserEntry {
        channel: "Terminal".into(),
        ..entry
    }));
    assert_eq!(users.users.len(), 1);
}
