//! Integration tests for settings persisted in `storage.json`.
//!
//! Each test writes its own file under the system temp dir, opens it the way
//! startup does, and checks what survives a reopen.

use chrono::{Duration, Utc};
use fluxread::ai::AiProvider;
use fluxread::settings::storage::LocalStorage;
use fluxread::settings::{SettingsStore, SETTINGS_KEY};
use fluxread::version;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

struct TempFile(PathBuf);

impl TempFile {
    fn new(name: &str) -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Self(std::env::temp_dir().join(format!(
            "fluxread-{}-{nanos}-{name}",
            std::process::id()
        )))
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn write_legacy(file: &TempFile, settings: serde_json::Value) {
    let mut blob = serde_json::Map::new();
    blob.insert(SETTINGS_KEY.to_string(), settings.to_string().into());
    std::fs::write(&file.0, serde_json::Value::Object(blob).to_string()).unwrap();
}

#[test]
fn test_legacy_blob_is_migrated_on_load() {
    let file = TempFile::new("legacy.json");
    write_legacy(
        &file,
        serde_json::json!({
            "articleWidth": 100,
            "sidebarWidth": 1000,
            "entryListWidth": 100,
            "aiProvider": "anthropic",
            "aiApiKey": "sk-legacy",
            "aiModel": "claude-legacy",
            "somethingRemoved": true,
            "pageSize": "not a number",
        }),
    );

    let store = SettingsStore::load(LocalStorage::open(&file.0).unwrap());
    let s = store.get();
    assert_eq!(s.article_width, 90);
    assert_eq!(s.sidebar_width, 480);
    assert_eq!(s.entry_list_width, 280);
    assert_eq!(s.ai_provider, AiProvider::Anthropic);
    assert_eq!(s.active_ai_key(), "sk-legacy");
    assert_eq!(s.ai_models.get("anthropic").map(String::as_str), Some("claude-legacy"));
    assert_eq!(s.page_size, 100);
}

#[test]
fn test_updates_survive_reopen() {
    let file = TempFile::new("reopen.json");
    {
        let mut store = SettingsStore::load(LocalStorage::open(&file.0).unwrap());
        store
            .update(|s| {
                s.select_ai_provider(AiProvider::Ollama);
                s.set_active_ai_key("http://localhost:11434");
                s.sidebar_width = 5000;
                s.page_size = 50;
            })
            .unwrap();
    }

    let store = SettingsStore::load(LocalStorage::open(&file.0).unwrap());
    let s = store.get();
    assert_eq!(s.ai_provider, AiProvider::Ollama);
    assert_eq!(s.active_ai_key(), "http://localhost:11434");
    assert_eq!(s.sidebar_width, 480);
    assert_eq!(s.page_size, 50);
}

#[test]
fn test_reset_writes_defaults() {
    let file = TempFile::new("reset.json");
    write_legacy(&file, serde_json::json!({"pageSize": 20, "themeColor": "Green"}));

    let mut store = SettingsStore::load(LocalStorage::open(&file.0).unwrap());
    assert_eq!(store.get().page_size, 20);
    store.reset().unwrap();

    let reopened = SettingsStore::load(LocalStorage::open(&file.0).unwrap());
    assert_eq!(reopened.get().page_size, 100);
    assert_eq!(reopened.get().theme_color, "Blue");
}

#[test]
fn test_update_dismissal_shares_the_file() {
    let file = TempFile::new("dismiss.json");
    let now = Utc::now();
    {
        let mut store = SettingsStore::load(LocalStorage::open(&file.0).unwrap());
        version::dismiss(store.storage_mut(), now).unwrap();
        store.update(|s| s.page_size = 200).unwrap();
    }

    let store = SettingsStore::load(LocalStorage::open(&file.0).unwrap());
    assert_eq!(store.get().page_size, 200);
    assert!(version::dismissed_recently(store.storage(), now + Duration::hours(23)));
    assert!(!version::dismissed_recently(store.storage(), now + Duration::hours(25)));
}
