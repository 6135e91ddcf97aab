//! Miniflux REST API client.
//!
//! [`MinifluxClient`] wraps a shared `reqwest::Client` authenticated with the
//! `X-Auth-Token` header. Every call is a single attempt: user actions are
//! not retried, their callers roll back local state instead.

mod client;
mod error;
mod types;

pub use client::MinifluxClient;
pub use error::ApiError;
pub use types::{
    Category, Counters, EntriesPage, Entry, EntryQuery, EntrySource, EntryStatus, Feed, FeedIcon,
    FeedModification, OriginalContent, SortDirection, User,
};
