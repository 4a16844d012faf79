/*
 * Responsibility
 * - リクエスト (Parts + body) から EchoResponse を組み立てる
 * - client IP / protocol の導出 (X-Forwarded-For / X-Forwarded-Proto を優先)
 * - JWT ヘッダが設定されていれば jwt_decode に渡し、結果を載せる (必要ならログ出力)
 */
use std::net::SocketAddr;

use axum::{
    extract::ConnectInfo,
    http::{HeaderMap, HeaderName, Uri, header, request::Parts},
};
use tracing::{info, warn};

use crate::api::dto::echo::{EchoResponse, MultiMap, OsInfo};
use crate::services::jwt_decode::{self, DecodedClaims};

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Which header (if any) carries a JWT, and whether decode results are logged.
#[derive(Debug, Clone, Default)]
pub struct JwtSettings {
    pub header: Option<HeaderName>,
    pub log: bool,
}

pub fn capture(parts: &Parts, body: &[u8], os_hostname: &str, jwt: &JwtSettings) -> EchoResponse {
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    EchoResponse {
        path: parts.uri.path().to_string(),
        method: parts.method.to_string(),
        headers: collect_headers(&parts.headers),
        body: String::from_utf8_lossy(body).into_owned(),
        query: parse_query(parts.uri.query()),
        hostname: request_host(&parts.headers, &parts.uri),
        ip: client_ip(&parts.headers, peer),
        protocol: protocol(&parts.headers),
        os: OsInfo {
            hostname: os_hostname.to_string(),
        },
        jwt: decode_configured_jwt(&parts.headers, jwt),
    }
}

/// `x-custom-header` -> `X-Custom-Header`
pub fn canonical_header_key(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

// Host is reported separately as `hostname`.
fn collect_headers(headers: &HeaderMap) -> MultiMap {
    let mut out = MultiMap::new();
    for (name, value) in headers.iter() {
        if *name == header::HOST {
            continue;
        }
        out.entry(canonical_header_key(name.as_str()))
            .or_default()
            .push(header_text(value.as_bytes()));
    }
    out
}

pub fn parse_query(query: Option<&str>) -> MultiMap {
    let mut out = MultiMap::new();
    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            out.entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
    }
    out
}

fn request_host(headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get(header::HOST)
        .map(|v| header_text(v.as_bytes()))
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_default()
}

/// First hop of `X-Forwarded-For`, else the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = first_value(headers, X_FORWARDED_FOR) {
        let first = forwarded.split(',').next().unwrap_or_default();
        return first.trim().to_string();
    }
    peer.map(|addr| addr.to_string()).unwrap_or_default()
}

/// The listener is plain TCP, so only a proxy can tell us it was https.
pub fn protocol(headers: &HeaderMap) -> String {
    first_value(headers, X_FORWARDED_PROTO).unwrap_or_else(|| "http".to_string())
}

fn decode_configured_jwt(headers: &HeaderMap, settings: &JwtSettings) -> Option<DecodedClaims> {
    let name = settings.header.as_ref()?;
    let raw = headers
        .get(name)
        .map(|v| header_text(v.as_bytes()))
        .filter(|v| !v.is_empty())?;

    let claims = jwt_decode::decode(&raw);

    if let Some(reason) = claims.error() {
        warn!(header = %name, error = %reason, "JWT could not be decoded");
    }

    if settings.log {
        match serde_json::to_string(&claims) {
            Ok(json) => info!(jwt = %json, "decoded JWT"),
            Err(e) => warn!(error = %e, "failed to serialize decoded JWT"),
        }
    }

    Some(claims)
}

fn first_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|v| header_text(v.as_bytes()))
        .filter(|v| !v.is_empty())
}

fn header_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::jwt_decode::JwtDecodeError;
    use axum::http::{HeaderValue, Request};

    fn parts(req: Request<()>) -> Parts {
        req.into_parts().0
    }

    #[test]
    fn canonicalizes_header_names() {
        assert_eq!(canonical_header_key("x-custom-header"), "X-Custom-Header");
        assert_eq!(canonical_header_key("content-type"), "Content-Type");
        assert_eq!(canonical_header_key("dpop"), "Dpop");
        assert_eq!(canonical_header_key("x--a"), "X--A");
    }

    #[test]
    fn collects_repeated_headers_and_skips_host() {
        let mut headers = HeaderMap::new();
        headers.append("x-multi", HeaderValue::from_static("one"));
        headers.append("x-multi", HeaderValue::from_static("two"));
        headers.insert(header::HOST, HeaderValue::from_static("example.com"));

        let collected = collect_headers(&headers);
        assert_eq!(collected.get("X-Multi").unwrap(), &vec!["one", "two"]);
        assert!(!collected.contains_key("Host"));
    }

    #[test]
    fn parses_query_multimap() {
        let query = parse_query(Some("foo=bar&foo=baz&name=John+Doe&enc=%2Fx&flag"));
        assert_eq!(query["foo"], vec!["bar", "baz"]);
        assert_eq!(query["name"], vec!["John Doe"]);
        assert_eq!(query["enc"], vec!["/x"]);
        assert_eq!(query["flag"], vec![""]);
        assert!(parse_query(None).is_empty());
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let peer: SocketAddr = "10.1.2.3:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)), "10.1.2.3:5555");
        assert_eq!(client_ip(&headers, None), "");

        headers.insert(
            X_FORWARDED_FOR,
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers, Some(peer)), "192.168.1.1");
    }

    #[test]
    fn protocol_defaults_to_http() {
        let mut headers = HeaderMap::new();
        assert_eq!(protocol(&headers), "http");
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https"));
        assert_eq!(protocol(&headers), "https");
    }

    #[test]
    fn captures_request_fields() {
        let req = Request::builder()
            .method("PUT")
            .uri("/a/b?x=1")
            .header(header::HOST, "echo.local")
            .header("x-custom-header", "test-value")
            .body(())
            .unwrap();

        let snapshot = capture(&parts(req), b"hello", "box-1", &JwtSettings::default());
        assert_eq!(snapshot.path, "/a/b");
        assert_eq!(snapshot.method, "PUT");
        assert_eq!(snapshot.body, "hello");
        assert_eq!(snapshot.query["x"], vec!["1"]);
        assert_eq!(snapshot.hostname, "echo.local");
        assert_eq!(snapshot.headers["X-Custom-Header"], vec!["test-value"]);
        assert_eq!(snapshot.protocol, "http");
        assert_eq!(snapshot.os.hostname, "box-1");
        assert!(snapshot.jwt.is_none());
    }

    #[test]
    fn jwt_is_decoded_only_when_configured_and_present() {
        let settings = JwtSettings {
            header: Some(header::AUTHORIZATION),
            log: true,
        };

        let req = Request::builder().uri("/").body(()).unwrap();
        assert!(capture(&parts(req), b"", "h", &settings).jwt.is_none());

        let req = Request::builder()
            .uri("/")
            .header(header::AUTHORIZATION, "")
            .body(())
            .unwrap();
        assert!(capture(&parts(req), b"", "h", &settings).jwt.is_none());

        let req = Request::builder()
            .uri("/")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(())
            .unwrap();
        let jwt = capture(&parts(req), b"", "h", &settings).jwt.unwrap();
        assert_eq!(jwt.error(), Some(&JwtDecodeError::Format));

        // header present but decoding not configured
        let req = Request::builder()
            .uri("/")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(())
            .unwrap();
        assert!(
            capture(&parts(req), b"", "h", &JwtSettings::default())
                .jwt
                .is_none()
        );
    }

    #[test]
    fn lossy_body_text() {
        let req = Request::builder().uri("/").body(()).unwrap();
        let snapshot = capture(&parts(req), &[0x66, 0x6f, 0xff], "h", &JwtSettings::default());
        assert_eq!(snapshot.body, "fo\u{fffd}");
    }
}
