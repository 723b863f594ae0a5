//! Thin clients for the remote collaborators: the auth provider and the
//! GraphQL backend (feed query and profile mirror).

use futures::StreamExt;
use url::{Host, Url};

mod auth;
mod graphql;
mod profile;

pub use auth::{validate_password, AuthClient, AuthError, PasswordPolicyError};
pub use graphql::{GraphQlClient, GraphQlError};
pub use profile::{ProfileClient, RemoteProfile};

/// HTTPS, or plain HTTP to a loopback host (used by tests and local dev).
///
/// The host is compared after parsing, so `http://localhost.evil.com` and
/// `http://localhost@evil.com` are remote hosts, not loopback ones.
pub(crate) fn is_secure_endpoint(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    match parsed.scheme() {
        "https" => true,
        "http" => {
            if !parsed.username().is_empty() || parsed.password().is_some() {
                return false;
            }
            match parsed.host() {
                Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
                Some(Host::Ipv4(ip)) => ip.is_loopback(),
                Some(Host::Ipv6(ip)) => ip.is_loopback(),
                None => false,
            }
        }
        _ => false,
    }
}

/// Failure while reading a size-capped response body.
#[derive(Debug)]
pub(crate) enum LimitedReadError {
    TooLarge(usize),
    Network(reqwest::Error),
}

/// Read a response body, giving up once it grows past `limit` bytes.
pub(crate) async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, LimitedReadError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(LimitedReadError::TooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(LimitedReadError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(LimitedReadError::TooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_secure_endpoints() {
        assert!(is_secure_endpoint("https://api.example.com/v1/graphql"));
        assert!(is_secure_endpoint("http://127.0.0.1:8080"));
        assert!(is_secure_endpoint("http://localhost:1337/v1/auth"));
        assert!(is_secure_endpoint("http://[::1]:4000/graphql"));
        assert!(!is_secure_endpoint("http://evil.com"));
        assert!(!is_secure_endpoint("ftp://example.com"));
        assert!(!is_secure_endpoint("not a url"));
    }

    #[test]
    fn test_loopback_lookalikes_rejected() {
        assert!(!is_secure_endpoint("http://localhost.evil.com/x"));
        assert!(!is_secure_endpoint("http://127.0.0.1.nip.io/x"));
        assert!(!is_secure_endpoint("http://localhost@evil.com/x"));
        assert!(!is_secure_endpoint("http://user:pw@localhost:1337/x"));
        assert!(!is_secure_endpoint("http://10.0.0.1/x"));
    }

    #[tokio::test]
    async fn test_read_limited_bytes_caps_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&mock_server)
            .await;

        let response = reqwest::get(mock_server.uri()).await.unwrap();
        let result = read_limited_bytes(response, 16).await;
        assert!(matches!(result, Err(LimitedReadError::TooLarge(16))));

        let response = reqwest::get(mock_server.uri()).await.unwrap();
        let bytes = read_limited_bytes(response, 64).await.unwrap();
        assert_eq!(bytes.len(), 64);
    }
}
