use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// The URL embeds credentials (`user:pass@host`).
    #[error("URLs with embedded credentials are not allowed")]
    EmbeddedCredentials,
}

/// Trims whitespace and trailing slashes from a user-entered base URL.
///
/// ```
/// use fluxread::util::normalize_base_url;
///
/// assert_eq!(normalize_base_url("  http://localhost:11434/// "), "http://localhost:11434");
/// assert_eq!(normalize_base_url(""), "");
/// ```
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

/// Validates the Miniflux server URL.
///
/// Self-hosted servers commonly live on `localhost` or a LAN address, so
/// unlike link targets those are accepted. The scheme must still be HTTP(S)
/// and the URL must not carry credentials, which would leak into logs.
/// The returned URL always ends with `/` so `Url::join` appends paths.
pub fn validate_server_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let normalized = normalize_base_url(url_str);
    let mut url = Url::parse(&normalized)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(UrlValidationError::EmbeddedCredentials);
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Validates a URL before handing it to the system browser.
///
/// Entry links and comment links come from third-party feeds, so only plain
/// `http`/`https` targets with a host are opened. `file://`, `javascript:`
/// and custom schemes are refused.
///
/// ```
/// use fluxread::util::validate_url_for_open;
///
/// assert!(validate_url_for_open("https://example.com/post").is_ok());
/// assert!(validate_url_for_open("file:///etc/passwd").is_err());
/// ```
pub fn validate_url_for_open(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(UrlValidationError::EmbeddedCredentials);
    }

    Ok(url)
}

/// True when the URL points at the local machine or a private network.
///
/// Used to decide whether a plain-`http` server URL deserves a warning: an
/// API token sent over cleartext to a public host is worth flagging.
pub fn is_local_or_private(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    if host == "localhost" || host.ends_with(".local") {
        return true;
    }

    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    match host_for_parse.parse::<IpAddr>() {
        Ok(IpAddr::V4(ipv4)) => ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local(),
        Ok(IpAddr::V6(ipv6)) => {
            let segments = ipv6.segments();
            // fc00::/7 and fe80::/10
            ipv6.is_loopback()
                || (segments[0] & 0xfe00) == 0xfc00
                || (segments[0] & 0xffc0) == 0xfe80
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_url_allows_localhost() {
        let url = validate_server_url("http://localhost:8080").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/");
        assert!(is_local_or_private(&url));
    }

    #[test]
    fn test_server_url_keeps_subpath() {
        let url = validate_server_url("https://example.com/miniflux/").unwrap();
        assert_eq!(url.join("v1/me").unwrap().as_str(), "https://example.com/miniflux/v1/me");
    }

    #[test]
    fn test_server_url_rejects_bad_scheme() {
        assert!(matches!(
            validate_server_url("ftp://example.com"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_server_url_rejects_credentials() {
        assert!(matches!(
            validate_server_url("https://user:pw@example.com"),
            Err(UrlValidationError::EmbeddedCredentials)
        ));
    }

    #[test]
    fn test_open_rejects_non_http() {
        assert!(validate_url_for_open("javascript:alert(1)").is_err());
        assert!(validate_url_for_open("mailto:someone@example.com").is_err());
        assert!(validate_url_for_open("not a url").is_err());
    }

    #[test]
    fn test_private_detection() {
        let public = Url::parse("https://example.com").unwrap();
        let lan = Url::parse("http://192.168.1.10").unwrap();
        let v6 = Url::parse("http://[fd00::1]").unwrap();
        assert!(!is_local_or_private(&public));
        assert!(is_local_or_private(&lan));
        assert!(is_local_or_private(&v6));
    }
}
