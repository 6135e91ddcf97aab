//! Reader preferences persisted as a camelCase JSON blob in local storage.
//!
//! Decoding is forgiving: the blob may come from an older release or be
//! partly hand-edited, so each known key is validated on its own and a bad
//! value only resets that key. Legacy values are migrated on load (pane
//! widths clamped, `articleWidth` converted from `ch` to percent, a single
//! AI key/model moved into the per-provider maps). Encoding writes only the
//! keys listed in [`Settings`].

pub mod storage;

use crate::ai::AiProvider;
use crate::api::SortDirection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use storage::{LocalStorage, StorageError};

/// Local storage key for the settings blob.
pub const SETTINGS_KEY: &str = "settings";

pub const ARTICLE_WIDTH_MIN: u32 = 50;
pub const ARTICLE_WIDTH_MAX: u32 = 90;
pub const ARTICLE_WIDTH_STEP: u32 = 5;
pub const SIDEBAR_WIDTH_MIN: u32 = 180;
pub const SIDEBAR_WIDTH_MAX: u32 = 480;
pub const ENTRY_LIST_WIDTH_MIN: u32 = 280;
pub const ENTRY_LIST_WIDTH_MAX: u32 = 900;

/// Which entries the list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShowStatus {
    #[default]
    Unread,
    All,
    Starred,
}

impl ShowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ShowStatus::Unread => "unread",
            ShowStatus::All => "all",
            ShowStatus::Starred => "starred",
        }
    }
}

/// Field used to collapse duplicate entries in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoveDuplicates {
    #[default]
    None,
    Title,
    Url,
    Hash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemeMode {
    pub fn next(self) -> Self {
        match self {
            ThemeMode::System => ThemeMode::Light,
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::System,
        }
    }
}

/// When an entry counts as read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkReadBy {
    /// Opening the entry marks it read.
    #[default]
    View,
    /// Only explicit toggles change status.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Legacy single key, kept so older blobs round-trip.
    pub ai_api_key: String,
    /// Provider name → key (or base URL for local providers).
    pub ai_api_keys: BTreeMap<String, String>,
    pub ai_models: BTreeMap<String, String>,
    /// Model used for summarization.
    pub ai_model: String,
    pub ai_provider: AiProvider,
    /// Reader text width in percent of the detail pane (50..=90, step 5).
    pub article_width: u32,
    pub sidebar_width: u32,
    pub entry_list_width: u32,
    pub compact_sidebar_groups: bool,
    pub cover_display_mode: String,
    pub edge_to_edge_images: bool,
    pub enable_context_menu: bool,
    pub enable_swipe_gesture: bool,
    pub font_family: String,
    pub font_size: f64,
    pub home_page: String,
    pub language: String,
    pub lightbox_slide_animation: bool,
    pub mark_read_by: MarkReadBy,
    pub mark_read_on_scroll: bool,
    pub order_by: String,
    pub order_direction: SortDirection,
    pub page_size: u32,
    pub remove_duplicates: RemoveDuplicates,
    pub show_detailed_relative_time: bool,
    pub show_estimated_reading_time: bool,
    pub show_feed_icon: bool,
    pub show_hidden_feeds: bool,
    pub show_status: ShowStatus,
    pub show_unread_feeds_only: bool,
    pub swipe_sensitivity: f64,
    pub theme_color: String,
    pub theme_mode: ThemeMode,
    pub title_alignment: String,
    pub update_content_on_fetch: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let provider_slots = || {
            ["anthropic", "gemini", "perplexity"]
                .into_iter()
                .map(|p| (p.to_string(), String::new()))
                .collect::<BTreeMap<_, _>>()
        };
        Self {
            ai_api_key: String::new(),
            ai_api_keys: provider_slots(),
            ai_models: provider_slots(),
            ai_model: String::new(),
            ai_provider: AiProvider::None,
            article_width: 75,
            sidebar_width: 240,
            entry_list_width: 420,
            compact_sidebar_groups: true,
            cover_display_mode: "auto".to_string(),
            edge_to_edge_images: false,
            enable_context_menu: true,
            enable_swipe_gesture: true,
            font_family: "system-ui".to_string(),
            font_size: 1.05,
            home_page: "all".to_string(),
            language: detect_language(|key| std::env::var(key).ok()),
            lightbox_slide_animation: true,
            mark_read_by: MarkReadBy::View,
            mark_read_on_scroll: false,
            order_by: "created_at".to_string(),
            order_direction: SortDirection::Desc,
            page_size: 100,
            remove_duplicates: RemoveDuplicates::None,
            show_detailed_relative_time: false,
            show_estimated_reading_time: false,
            show_feed_icon: true,
            show_hidden_feeds: false,
            show_status: ShowStatus::Unread,
            show_unread_feeds_only: false,
            swipe_sensitivity: 1.0,
            theme_color: "Blue".to_string(),
            theme_mode: ThemeMode::System,
            title_alignment: "center".to_string(),
            update_content_on_fetch: false,
        }
    }
}

/// Derives a BCP 47 tag from `LC_ALL`, `LC_MESSAGES` or `LANG`.
///
/// `de_DE.UTF-8` becomes `de-DE`; `C`, `POSIX` and unset fall back to `en-US`.
pub fn detect_language(env: impl Fn(&str) -> Option<String>) -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .into_iter()
        .filter_map(|key| env(key))
        .map(|raw| {
            let base = raw.split(['.', '@']).next().unwrap_or_default().to_string();
            base.replace('_', "-")
        })
        .find(|tag| !tag.is_empty() && tag != "C" && tag != "POSIX")
        .unwrap_or_else(|| "en-US".to_string())
}

/// Legacy `ch` widths above 90 are scaled by 0.9, then clamped to
/// 50..=90 and snapped to the nearest multiple of 5.
pub fn migrate_article_width(raw: f64) -> u32 {
    let migrated = if raw > 90.0 { raw * 0.9 } else { raw };
    let clamped = migrated.clamp(ARTICLE_WIDTH_MIN as f64, ARTICLE_WIDTH_MAX as f64);
    ((clamped / ARTICLE_WIDTH_STEP as f64).round() * ARTICLE_WIDTH_STEP as f64) as u32
}

fn clamp_width(raw: f64, min: u32, max: u32) -> u32 {
    raw.clamp(min as f64, max as f64).round() as u32
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Keeps only string values of a provider map; anything but an object becomes `{}`.
fn sanitize_provider_map(value: Option<Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map
            .into_iter()
            .filter(|(_, v)| v.is_string())
            .collect(),
        _ => Map::new(),
    }
}

/// Copies a legacy single value into `map[provider]` when that slot is empty.
fn migrate_legacy_slot(map: &mut Map<String, Value>, legacy: Option<&Value>, provider: Option<&str>) {
    let (Some(legacy @ Value::String(s)), Some(provider)) = (legacy, provider) else {
        return;
    };
    if s.is_empty() || provider == "none" {
        return;
    }
    let slot_empty = map.get(provider).is_none_or(|v| !is_truthy(v));
    if slot_empty {
        map.insert(provider.to_string(), legacy.clone());
    }
}

impl Settings {
    /// Decodes a stored blob, applying migrations and defaults.
    ///
    /// Never fails: unreadable input yields defaults, bad keys are skipped.
    pub fn decode(raw: &str) -> Self {
        let mut stored = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                tracing::warn!("Stored settings are not a JSON object, using defaults");
                return Self::default();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stored settings are not valid JSON, using defaults");
                return Self::default();
            }
        };

        if let Some(raw) = stored.get("articleWidth").and_then(Value::as_f64) {
            stored.insert("articleWidth".into(), migrate_article_width(raw).into());
        }
        if let Some(raw) = stored.get("sidebarWidth").and_then(Value::as_f64) {
            let width = clamp_width(raw, SIDEBAR_WIDTH_MIN, SIDEBAR_WIDTH_MAX);
            stored.insert("sidebarWidth".into(), width.into());
        }
        if let Some(raw) = stored.get("entryListWidth").and_then(Value::as_f64) {
            let width = clamp_width(raw, ENTRY_LIST_WIDTH_MIN, ENTRY_LIST_WIDTH_MAX);
            stored.insert("entryListWidth".into(), width.into());
        }

        let provider_valid = match stored.get("aiProvider") {
            Some(v) if is_truthy(v) => v.as_str().and_then(AiProvider::parse).is_some(),
            _ => true,
        };
        if !provider_valid {
            tracing::warn!("Unknown AI provider in stored settings, resetting to none");
            stored.insert("aiProvider".into(), "none".into());
            stored.insert("aiModel".into(), "".into());
        }

        let provider = stored
            .get("aiProvider")
            .and_then(Value::as_str)
            .map(str::to_string);
        let mut keys = sanitize_provider_map(stored.remove("aiApiKeys"));
        migrate_legacy_slot(&mut keys, stored.get("aiApiKey"), provider.as_deref());
        let mut models = sanitize_provider_map(stored.remove("aiModels"));
        migrate_legacy_slot(&mut models, stored.get("aiModel"), provider.as_deref());
        stored.insert("aiApiKeys".into(), Value::Object(keys));
        stored.insert("aiModels".into(), Value::Object(models));

        Self::merge_over_defaults(stored)
    }

    /// Layers each stored key over the defaults, dropping keys that are
    /// unknown or whose value does not fit the field type.
    fn merge_over_defaults(stored: Map<String, Value>) -> Self {
        let defaults = Self::default();
        let Ok(Value::Object(mut merged)) = serde_json::to_value(&defaults) else {
            return defaults;
        };

        for (key, value) in stored {
            let Some(previous) = merged.get(&key).cloned() else {
                tracing::debug!(key = %key, "Dropping unknown settings key");
                continue;
            };
            merged.insert(key.clone(), value);
            if serde_json::from_value::<Settings>(Value::Object(merged.clone())).is_err() {
                tracing::warn!(key = %key, "Ignoring invalid stored setting");
                merged.insert(key, previous);
            }
        }

        serde_json::from_value(Value::Object(merged)).unwrap_or(defaults)
    }

    /// Serializes every known key. Unknown keys never survive a decode, so
    /// none are written.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Clamps the pane widths into their ranges. Applied after every update.
    pub fn normalize(&mut self) {
        self.article_width = migrate_article_width(self.article_width as f64);
        self.sidebar_width = self.sidebar_width.clamp(SIDEBAR_WIDTH_MIN, SIDEBAR_WIDTH_MAX);
        self.entry_list_width = self
            .entry_list_width
            .clamp(ENTRY_LIST_WIDTH_MIN, ENTRY_LIST_WIDTH_MAX);
    }

    /// Key (or local base URL) of the active provider, empty when unset.
    pub fn active_ai_key(&self) -> &str {
        self.ai_api_keys
            .get(self.ai_provider.as_str())
            .map_or("", String::as_str)
    }

    /// Switches provider and restores the model last chosen for it.
    pub fn select_ai_provider(&mut self, provider: AiProvider) {
        self.ai_provider = provider;
        self.ai_model = self
            .ai_models
            .get(provider.as_str())
            .cloned()
            .unwrap_or_default();
    }

    /// Records `model` as current and as the provider's remembered choice.
    pub fn select_ai_model(&mut self, model: &str) {
        self.ai_model = model.to_string();
        if self.ai_provider != AiProvider::None {
            self.ai_models
                .insert(self.ai_provider.as_str().to_string(), model.to_string());
        }
    }

    pub fn set_active_ai_key(&mut self, key: &str) {
        if self.ai_provider != AiProvider::None {
            self.ai_api_keys
                .insert(self.ai_provider.as_str().to_string(), key.trim().to_string());
        }
    }

    /// After a model list loads: selects the first model when none is chosen.
    /// Returns true when the selection changed.
    pub fn adopt_first_model(&mut self, model_ids: &[String]) -> bool {
        let remembered = self
            .ai_models
            .get(self.ai_provider.as_str())
            .is_some_and(|m| !m.is_empty());
        match model_ids.first() {
            Some(first) if self.ai_provider != AiProvider::None && !remembered => {
                self.select_ai_model(first);
                true
            }
            _ => false,
        }
    }
}

/// Settings bound to their storage. Every change is persisted immediately.
#[derive(Debug)]
pub struct SettingsStore {
    storage: LocalStorage,
    settings: Settings,
}

impl SettingsStore {
    pub fn load(storage: LocalStorage) -> Self {
        let settings = match storage.get(SETTINGS_KEY) {
            Some(raw) => Settings::decode(raw),
            None => {
                tracing::debug!("No stored settings, using defaults");
                Settings::default()
            }
        };
        Self { storage, settings }
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Applies `change`, normalizes, and persists.
    pub fn update(&mut self, change: impl FnOnce(&mut Settings)) -> Result<(), StorageError> {
        change(&mut self.settings);
        self.settings.normalize();
        self.storage.set(SETTINGS_KEY, self.settings.encode())
    }

    /// Restores every default and persists them.
    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.settings = Settings::default();
        tracing::info!("Settings reset to defaults");
        self.storage.set(SETTINGS_KEY, self.settings.encode())
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut LocalStorage {
        &mut self.storage
    }
}
