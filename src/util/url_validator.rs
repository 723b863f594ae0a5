use std::net::IpAddr;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("Article link has no host")]
    MissingHost,
    #[error("Article link points at a local address: {0}")]
    LocalAddress(String),
}

/// Validate an article's source link before opening it in the browser.
///
/// Links come from the backend, so anything that is not a plain web page on a
/// public host is refused: other schemes (`file:`, `javascript:`), loopback,
/// private and link-local addresses.
///
/// ```
/// use reachnews::util::validate_article_url;
///
/// assert!(validate_article_url("https://news.example.com/story").is_ok());
/// assert!(validate_article_url("file:///etc/passwd").is_err());
/// assert!(validate_article_url("http://192.168.0.10/admin").is_err());
/// ```
pub fn validate_article_url(raw: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(raw.trim())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlValidationError::UnsupportedScheme(url.scheme().to_owned()));
    }

    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;
    if host.eq_ignore_ascii_case("localhost") {
        return Err(UrlValidationError::LocalAddress(host.to_owned()));
    }

    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        if is_local_ip(&ip) {
            return Err(UrlValidationError::LocalAddress(ip.to_string()));
        }
    }

    Ok(url)
}

fn is_local_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link local
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
        }
    }
}
