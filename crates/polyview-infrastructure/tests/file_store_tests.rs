use polyview_core::config::AppConfig;
use polyview_core::service::ServiceKey;
use polyview_core::session::{
    ChatHistoryManager, LoadOptions, MessageRole, NoUrlSource, SessionMode, SessionStore,
};
use polyview_core::store::{KeyValueStore, keys};
use polyview_infrastructure::{ConfigService, JsonFileStore, PolyviewPaths};
use std::sync::Arc;
use tempfile::TempDir;

fn store_in(dir: &TempDir, quota: usize) -> Arc<JsonFileStore> {
    Arc::new(JsonFileStore::open(dir.path().join("data").join("store.json"), quota).unwrap())
}

#[test]
fn test_values_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir, 1024);
    store.set(keys::LAYOUT_MODE, "\"grid\"").unwrap();
    store.set(keys::SESSION_COUNTER, "3").unwrap();
    store.remove(keys::SESSION_COUNTER);
    drop(store);

    let reopened = store_in(&dir, 1024);
    assert_eq!(reopened.get(keys::LAYOUT_MODE).as_deref(), Some("\"grid\""));
    assert!(reopened.get(keys::SESSION_COUNTER).is_none());
    assert!(!dir.path().join("data").join(".store.json.tmp").exists());
}

#[test]
fn test_quota_error_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir, 32);
    store.set("a", "small").unwrap();
    let err = store.set("b", &"x".repeat(100)).unwrap_err();
    assert!(err.is_quota_exceeded());
    drop(store);

    let reopened = store_in(&dir, 32);
    assert_eq!(reopened.keys(), vec!["a".to_string()]);
}

#[test]
fn test_failed_writes_keep_memory_and_disk_in_step() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir, 1024);
    store.set("a", "kept").unwrap();

    // A directory where the temp file goes makes every write fail.
    let blocker = dir.path().join("data").join(".store.json.tmp");
    std::fs::create_dir(&blocker).unwrap();

    store.remove("a");
    assert_eq!(store.get("a").as_deref(), Some("kept"));
    assert!(store.set("b", "lost").is_err());
    assert!(store.get("b").is_none());

    std::fs::remove_dir(&blocker).unwrap();
    drop(store);
    let reopened = store_in(&dir, 1024);
    assert_eq!(reopened.keys(), vec!["a".to_string()]);
}

#[test]
fn test_corrupt_file_opens_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(&path, "{ not json").unwrap();
    let store = JsonFileStore::open(&path, 1024).unwrap();
    assert!(store.keys().is_empty());
    store.set("k", "v").unwrap();
    assert_eq!(JsonFileStore::open(&path, 1024).unwrap().get("k").as_deref(), Some("v"));
}

#[test]
fn test_session_round_trip_through_file() {
    let dir = TempDir::new().unwrap();
    let config = AppConfig::default();
    let store = store_in(&dir, config.storage_quota_bytes);

    let mut sessions = SessionStore::new(store.clone(), &config);
    let first = sessions.create_session(
        Some("Research".into()),
        Some(vec![ServiceKey::new("claude"), ServiceKey::new("chatgpt")]),
        Some(SessionMode::DirectCall),
    );
    let first_id = first.id.clone();
    sessions.add_session(first);
    let second = sessions.create_session(None, None, Some(SessionMode::Interactive));
    sessions.add_session(second);

    let history = ChatHistoryManager::from_config(&config);
    history
        .append(
            &mut sessions,
            &NoUrlSource,
            &first_id,
            &ServiceKey::new("claude"),
            MessageRole::User,
            "hello",
        )
        .unwrap();
    history
        .append(
            &mut sessions,
            &NoUrlSource,
            &first_id,
            &ServiceKey::new("claude"),
            MessageRole::Assistant,
            "hi",
        )
        .unwrap();

    let mut restored = SessionStore::new(store_in(&dir, config.storage_quota_bytes), &config);
    let report = restored.load(LoadOptions::default());
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(restored.sessions(), sessions.sessions());
    assert_eq!(restored.current_session_id(), Some(&first_id));
    assert_eq!(restored.session_counter(), 2);
    assert_eq!(
        history.read(&restored, &first_id, &ServiceKey::new("claude")).len(),
        2
    );
}

#[test]
fn test_quota_recovery_with_file_store() {
    let dir = TempDir::new().unwrap();
    let config = AppConfig::default();
    let store = store_in(&dir, 4096);

    let mut sessions = SessionStore::new(store.clone(), &config);
    let session = sessions.create_session(
        None,
        Some(vec![ServiceKey::new("claude")]),
        Some(SessionMode::DirectCall),
    );
    let id = session.id.clone();
    sessions.add_session(session);

    let history = ChatHistoryManager::from_config(&config);
    let service = ServiceKey::new("claude");
    let mut failures = 0;
    for i in 0..12 {
        let body = format!("{i}:{}", "y".repeat(300));
        if history
            .append(&mut sessions, &NoUrlSource, &id, &service, MessageRole::User, body)
            .is_err()
        {
            failures += 1;
        }
    }

    assert_eq!(failures, 0);
    assert!(store.usage() <= 4096);
    let kept = history.read(&sessions, &id, &service);
    assert!(kept.len() <= config.history_limit);
    assert!(kept.last().unwrap().content.starts_with("11:"));
}

#[test]
fn test_config_defaults_when_missing_and_round_trip() {
    let dir = TempDir::new().unwrap();
    let paths = PolyviewPaths::new(Some(dir.path().to_path_buf()));
    let service = ConfigService::new(&paths).unwrap();
    assert_eq!(service.get_config().unwrap(), AppConfig::default());

    let config = AppConfig {
        history_limit: 30,
        ..AppConfig::default()
    };
    service.save(&config).unwrap();
    service.invalidate_cache();
    assert_eq!(service.get_config().unwrap().history_limit, 30);
}

#[test]
fn test_malformed_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "history_limit = \"many\"").unwrap();
    let err = ConfigService::with_path(&path).get_config().unwrap_err();
    assert!(err.is_serialization());
}
