use super::error::ApiError;
use super::types::{
    Category, Counters, EntriesPage, Entry, EntryQuery, EntrySource, EntryStatus, Feed,
    FeedModification, OriginalContent, User,
};
use crate::util::validate_server_url;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Upper bound for any JSON response body.
const MAX_RESPONSE_SIZE: usize = 20 * 1024 * 1024;
/// Upper bound for an OPML export.
const MAX_OPML_SIZE: usize = 10 * 1024 * 1024;

const AUTH_HEADER: &str = "X-Auth-Token";

#[derive(Deserialize)]
struct ServerError {
    error_message: String,
}

#[derive(Serialize)]
struct StatusUpdate<'a> {
    entry_ids: &'a [i64],
    status: EntryStatus,
}

#[derive(Serialize)]
struct CategoryTitle<'a> {
    title: &'a str,
}

#[derive(Deserialize)]
struct IntegrationsStatus {
    #[serde(default)]
    has_integrations: bool,
}

/// Client for the Miniflux v1 REST API.
///
/// Cheap to clone; clones share the connection pool. The token lives in a
/// default header marked sensitive so it never appears in debug output.
#[derive(Clone)]
pub struct MinifluxClient {
    http: reqwest::Client,
    base: Url,
}

impl std::fmt::Debug for MinifluxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinifluxClient")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl MinifluxClient {
    pub fn new(server_url: &str, token: &SecretString, timeout: Duration) -> Result<Self, ApiError> {
        let base =
            validate_server_url(server_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;

        let mut auth = HeaderValue::from_str(token.expose_secret().trim())
            .map_err(|_| ApiError::InvalidToken)?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTH_HEADER, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .user_agent(concat!("fluxread/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        Ok(self.http.request(method, self.url(path)?))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = read_limited_text(response, MAX_RESPONSE_SIZE)
            .await
            .unwrap_or_default();
        let message = serde_json::from_str::<ServerError>(&body)
            .map(|e| e.error_message)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });
        tracing::debug!(status = status.as_u16(), %message, "Miniflux request failed");
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        let body = read_limited_text(response, MAX_RESPONSE_SIZE).await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.send(request).await.map(|_| ())
    }

    // ---- entries ----

    /// Lists entries of `source` narrowed by `query`.
    pub async fn get_entries(
        &self,
        source: EntrySource,
        query: EntryQuery,
    ) -> Result<EntriesPage, ApiError> {
        let query = source.constrain(query, chrono::Utc::now());
        let request = self.request(Method::GET, &source.path())?.query(&query);
        let page: EntriesPage = self.get_json(request).await?;
        tracing::debug!(
            source = source.label(),
            total = page.total,
            returned = page.entries.len(),
            "Fetched entries"
        );
        Ok(page)
    }

    pub async fn get_entry(&self, entry_id: i64) -> Result<Entry, ApiError> {
        let request = self.request(Method::GET, &format!("v1/entries/{entry_id}"))?;
        self.get_json(request).await
    }

    /// Sets `status` on every entry in `entry_ids`. An empty slice is a no-op.
    pub async fn update_entries_status(
        &self,
        entry_ids: &[i64],
        status: EntryStatus,
    ) -> Result<(), ApiError> {
        if entry_ids.is_empty() {
            return Ok(());
        }
        let request = self
            .request(Method::PUT, "v1/entries")?
            .json(&StatusUpdate { entry_ids, status });
        self.send_empty(request).await?;
        tracing::debug!(count = entry_ids.len(), %status, "Updated entry status");
        Ok(())
    }

    /// Flips the starred flag server-side.
    pub async fn toggle_bookmark(&self, entry_id: i64) -> Result<(), ApiError> {
        let request = self.request(Method::PUT, &format!("v1/entries/{entry_id}/bookmark"))?;
        self.send_empty(request).await
    }

    /// Asks the server to scrape the original page of an entry.
    pub async fn fetch_original_content(&self, entry_id: i64) -> Result<OriginalContent, ApiError> {
        let request = self.request(Method::GET, &format!("v1/entries/{entry_id}/fetch-content"))?;
        self.get_json(request).await
    }

    /// Sends the entry to the user's configured third-party integrations.
    /// The server answers 202 and delivers asynchronously; any other
    /// status means nothing was queued.
    pub async fn save_entry(&self, entry_id: i64) -> Result<(), ApiError> {
        let request = self.request(Method::POST, &format!("v1/entries/{entry_id}/save"))?;
        let response = self.send(request).await?;
        let status = response.status();
        if status != StatusCode::ACCEPTED {
            tracing::debug!(status = status.as_u16(), entry_id, "Save was not accepted");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: "Entry was not queued for saving".to_string(),
            });
        }
        Ok(())
    }

    // ---- counters and lists ----

    pub async fn get_counters(&self) -> Result<Counters, ApiError> {
        let request = self.request(Method::GET, "v1/feeds/counters")?;
        self.get_json(request).await
    }

    pub async fn get_feeds(&self) -> Result<Vec<Feed>, ApiError> {
        let request = self.request(Method::GET, "v1/feeds")?;
        self.get_json(request).await
    }

    pub async fn get_categories(&self) -> Result<Vec<Category>, ApiError> {
        let request = self.request(Method::GET, "v1/categories")?;
        self.get_json(request).await
    }

    pub async fn get_current_user(&self) -> Result<User, ApiError> {
        let request = self.request(Method::GET, "v1/me")?;
        self.get_json(request).await
    }

    /// Whether any third-party integration is enabled, which decides if
    /// "save entry" is offered.
    pub async fn has_integrations(&self) -> Result<bool, ApiError> {
        let request = self.request(Method::GET, "v1/integrations/status")?;
        let status: IntegrationsStatus = self.get_json(request).await?;
        Ok(status.has_integrations)
    }

    // ---- mark as read ----

    pub async fn mark_feed_as_read(&self, feed_id: i64) -> Result<(), ApiError> {
        let request = self.request(Method::PUT, &format!("v1/feeds/{feed_id}/mark-all-as-read"))?;
        self.send_empty(request).await
    }

    pub async fn mark_category_as_read(&self, category_id: i64) -> Result<(), ApiError> {
        let request = self.request(
            Method::PUT,
            &format!("v1/categories/{category_id}/mark-all-as-read"),
        )?;
        self.send_empty(request).await
    }

    pub async fn mark_all_as_read(&self, user_id: i64) -> Result<(), ApiError> {
        let request = self.request(Method::PUT, &format!("v1/users/{user_id}/mark-all-as-read"))?;
        self.send_empty(request).await
    }

    // ---- refresh ----

    pub async fn refresh_feed(&self, feed_id: i64) -> Result<(), ApiError> {
        let request = self.request(Method::PUT, &format!("v1/feeds/{feed_id}/refresh"))?;
        self.send_empty(request).await
    }

    pub async fn refresh_category(&self, category_id: i64) -> Result<(), ApiError> {
        let request = self.request(Method::PUT, &format!("v1/categories/{category_id}/refresh"))?;
        self.send_empty(request).await
    }

    pub async fn refresh_all_feeds(&self) -> Result<(), ApiError> {
        let request = self.request(Method::PUT, "v1/feeds/refresh")?;
        self.send_empty(request).await
    }

    // ---- feed and category editing ----

    pub async fn update_feed(
        &self,
        feed_id: i64,
        changes: &FeedModification,
    ) -> Result<Feed, ApiError> {
        let request = self
            .request(Method::PUT, &format!("v1/feeds/{feed_id}"))?
            .json(changes);
        self.get_json(request).await
    }

    pub async fn delete_feed(&self, feed_id: i64) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, &format!("v1/feeds/{feed_id}"))?;
        self.send_empty(request).await
    }

    pub async fn create_category(&self, title: &str) -> Result<Category, ApiError> {
        let request = self
            .request(Method::POST, "v1/categories")?
            .json(&CategoryTitle { title });
        self.get_json(request).await
    }

    pub async fn update_category(&self, category_id: i64, title: &str) -> Result<Category, ApiError> {
        let request = self
            .request(Method::PUT, &format!("v1/categories/{category_id}"))?
            .json(&CategoryTitle { title });
        self.get_json(request).await
    }

    pub async fn delete_category(&self, category_id: i64) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, &format!("v1/categories/{category_id}"))?;
        self.send_empty(request).await
    }

    // ---- OPML ----

    pub async fn export_opml(&self) -> Result<String, ApiError> {
        let request = self.request(Method::GET, "v1/export")?;
        let response = self.send(request).await?;
        read_limited_text(response, MAX_OPML_SIZE).await
    }

    pub async fn import_opml(&self, opml: String) -> Result<(), ApiError> {
        let request = self
            .request(Method::POST, "v1/import")?
            .header(CONTENT_TYPE, "application/xml")
            .body(opml);
        self.send_empty(request).await
    }
}

/// Reads a response body as UTF-8, refusing bodies over `limit` bytes.
async fn read_limited_text(response: Response, limit: usize) -> Result<String, ApiError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes).map_err(|_| ApiError::Decode("invalid UTF-8".into()))
}
