//! Utility functions shared by the core and the UI.
//!
//! - **Text**: Unicode-aware width calculation, truncation, control-char stripping
//! - **HTML**: block extraction and plain text for entry content
//! - **Time**: the 24h "today" window and lenient timestamp parsing
//! - **URLs**: server URL normalization and safe link opening
//!
//! ```
//! use fluxread::util::{display_width, truncate_to_width, validate_url_for_open};
//!
//! assert!(validate_url_for_open("https://example.com/post").is_ok());
//! assert_eq!(display_width("Hello 世界"), 10);
//! assert_eq!(truncate_to_width("Long entry title", 10), "Long en...");
//! ```

mod html;
mod text;
mod time;
mod url_validator;

pub use html::{decode_entities, escape_html, extract_text, html_to_blocks, Block};
pub use text::{display_width, strip_control_chars, truncate_chars, truncate_to_width};
pub use time::{format_relative_time, is_within_last_24h, parse_timestamp, TODAY_WINDOW};
pub use url_validator::{
    is_local_or_private, normalize_base_url, validate_server_url, validate_url_for_open,
    UrlValidationError,
};

/// Maximum accepted search query length.
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;
