//! "New version available" check.
//!
//! The binary carries the git hash and commit date it was built from. A
//! remote JSON copy of the same two fields is fetched periodically; a newer
//! remote commit date (or, failing dates, a different hash) raises the
//! update banner. Dismissing the banner silences it for 24 hours.

use crate::settings::storage::{LocalStorage, StorageError};
use crate::util::{parse_timestamp, TODAY_WINDOW};
use chrono::{DateTime, TimeZone, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_VERSION_INFO_URL: &str =
    "https://raw.githubusercontent.com/fluxread/fluxread/main/version-info.json";

/// Where the "view update" action points.
pub const UPDATE_PAGE_URL: &str = "https://github.com/fluxread/fluxread/commits/main";

/// Local storage key holding the dismissal time in epoch milliseconds.
pub const DISMISSED_AT_KEY: &str = "updateNotificationDismissedAt";

/// Env var enabling step-by-step logging of the check.
pub const DEBUG_ENV: &str = "FLUXREAD_VERSION_CHECK_DEBUG";

const DEV_HASH: &str = "dev";
const MAX_VERSION_INFO_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Version info request failed (HTTP {0})")]
    Status(u16),
    #[error("Invalid version info: {0}")]
    Decode(String),
    #[error("Version info too large")]
    TooLarge,
}

/// Git metadata of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildInfo {
    pub git_hash: String,
    pub git_date: String,
}

impl BuildInfo {
    /// Metadata embedded by the build script.
    pub fn current() -> Self {
        Self {
            git_hash: env!("FLUXREAD_GIT_HASH").to_string(),
            git_date: env!("FLUXREAD_GIT_DATE").to_string(),
        }
    }

    pub fn is_dev(&self) -> bool {
        self.git_hash == DEV_HASH
    }

    fn date(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.git_date.trim())
    }
}

/// Outcome of comparing the local build with the published one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDecision {
    /// Both commit dates parsed; `true` when the remote one is newer.
    ByDate(bool),
    /// Dates unusable, hashes compared instead.
    ByHash(bool),
    InsufficientData,
}

impl UpdateDecision {
    pub fn has_update(self) -> bool {
        matches!(self, UpdateDecision::ByDate(true) | UpdateDecision::ByHash(true))
    }

    fn reason(self) -> &'static str {
        match self {
            UpdateDecision::ByDate(_) => "date_comparison",
            UpdateDecision::ByHash(_) => "hash_fallback",
            UpdateDecision::InsufficientData => "insufficient_version_data",
        }
    }
}

pub fn compare(local: &BuildInfo, remote: &BuildInfo) -> UpdateDecision {
    if let (Some(ours), Some(theirs)) = (local.date(), remote.date()) {
        return UpdateDecision::ByDate(ours < theirs);
    }
    let (ours, theirs) = (local.git_hash.trim(), remote.git_hash.trim());
    if !ours.is_empty() && !theirs.is_empty() {
        return UpdateDecision::ByHash(ours != theirs);
    }
    UpdateDecision::InsufficientData
}

/// Why a scheduled check did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    DevBuild,
    DismissedRecently,
}

/// True when the stored dismissal time lies within the last 24 hours.
pub fn dismissed_recently(storage: &LocalStorage, now: DateTime<Utc>) -> bool {
    storage
        .get(DISMISSED_AT_KEY)
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .is_some_and(|at| at >= now - TODAY_WINDOW)
}

pub fn dismiss(storage: &mut LocalStorage, now: DateTime<Utc>) -> Result<(), StorageError> {
    storage.set(DISMISSED_AT_KEY, now.timestamp_millis().to_string())
}

/// Parses the debug switch: `1`, `true`, `yes`, `on` in any case.
pub fn debug_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

/// Adds (or replaces) the `_` cache-busting query parameter.
pub fn cache_busted_url(base: &str, now_ms: i64) -> String {
    match Url::parse(base) {
        Ok(mut url) => {
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, _)| k != "_")
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            url.query_pairs_mut()
                .clear()
                .extend_pairs(kept)
                .append_pair("_", &now_ms.to_string());
            url.to_string()
        }
        Err(_) => {
            let separator = if base.contains('?') { '&' } else { '?' };
            format!("{base}{separator}_={now_ms}")
        }
    }
}

/// Fetches the published [`BuildInfo`] and compares it with this build.
#[derive(Debug, Clone)]
pub struct VersionChecker {
    http: reqwest::Client,
    url: String,
    local: BuildInfo,
    debug: bool,
}

impl VersionChecker {
    pub fn new(
        url: Option<String>,
        local: BuildInfo,
        debug: bool,
        timeout: Duration,
    ) -> Result<Self, VersionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fluxread/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            url: url.unwrap_or_else(|| DEFAULT_VERSION_INFO_URL.to_string()),
            local,
            debug,
        })
    }

    pub fn local(&self) -> &BuildInfo {
        &self.local
    }

    pub fn skip_reason(&self, storage: &LocalStorage, now: DateTime<Utc>) -> Option<SkipReason> {
        if self.local.is_dev() {
            return Some(SkipReason::DevBuild);
        }
        if dismissed_recently(storage, now) {
            self.trace("dismissed_in_last_24_hours", None);
            return Some(SkipReason::DismissedRecently);
        }
        None
    }

    pub async fn fetch_remote(&self, now: DateTime<Utc>) -> Result<BuildInfo, VersionError> {
        let url = cache_busted_url(&self.url, now.timestamp_millis());
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(VersionError::Status(response.status().as_u16()));
        }
        if response
            .content_length()
            .is_some_and(|len| len > MAX_VERSION_INFO_SIZE as u64)
        {
            return Err(VersionError::TooLarge);
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if bytes.len().saturating_add(chunk.len()) > MAX_VERSION_INFO_SIZE {
                return Err(VersionError::TooLarge);
            }
            bytes.extend_from_slice(&chunk);
        }
        serde_json::from_slice(&bytes).map_err(|e| VersionError::Decode(e.to_string()))
    }

    /// Runs one check. Errors are returned for logging; callers treat them as "no update".
    pub async fn check(&self, now: DateTime<Utc>) -> Result<UpdateDecision, VersionError> {
        let remote = match self.fetch_remote(now).await {
            Ok(remote) => remote,
            Err(e) => {
                self.trace("request_failed", Some(&e.to_string()));
                return Err(e);
            }
        };
        let decision = compare(&self.local, &remote);
        if self.debug {
            tracing::info!(
                reason = decision.reason(),
                has_update = decision.has_update(),
                url = %self.url,
                local_hash = %self.local.git_hash,
                local_date = %self.local.git_date,
                remote_hash = %remote.git_hash,
                remote_date = %remote.git_date,
                "version check"
            );
        }
        Ok(decision)
    }

    fn trace(&self, reason: &str, error: Option<&str>) {
        if self.debug {
            tracing::info!(reason, error, "version check");
        } else {
            tracing::debug!(reason, error, "version check");
        }
    }
}

/// Banner state plus the generation guard for in-flight checks.
#[derive(Debug, Clone, Default)]
pub struct VersionState {
    pub has_update: bool,
    generation: u64,
}

impl VersionState {
    /// Starts a check; results of earlier checks are ignored from now on.
    pub fn begin(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    /// Applies a finished check. Returns `false` if it was superseded.
    pub fn finish(&mut self, generation: u64, decision: Option<UpdateDecision>) -> bool {
        if generation != self.generation {
            return false;
        }
        if let Some(decision) = decision {
            self.has_update = decision.has_update();
        }
        true
    }

    pub fn dismiss(&mut self) {
        self.has_update = false;
    }
}
