use http::HeaderMap;

use hirefire_core::version::{HEADER_REQUEST_START, HEADER_TOKEN};

/// What the middleware needs to know about one inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInfo {
    pub path: String,
    /// Router timestamp from `X-Request-Start`, in unix milliseconds.
    pub request_start_ms: Option<u64>,
    /// Value of the `HireFire-Token` header.
    pub token: Option<String>,
}

impl RequestInfo {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn from_parts(path: &str, headers: &HeaderMap) -> Self {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        Self {
            path: path.to_string(),
            request_start_ms: header(HEADER_REQUEST_START).and_then(parse_request_start),
            token: header(HEADER_TOKEN).map(str::to_string),
        }
    }
}

/// Parse an `X-Request-Start` value as integer milliseconds.
///
/// A `t=` prefix is stripped; trailing non-digits (a fractional part, for
/// instance) are ignored. Values without leading digits, and zero, yield
/// `None`.
pub fn parse_request_start(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let raw = raw.strip_prefix("t=").unwrap_or(raw);
    let end = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());

    raw[..end].parse::<u64>().ok().filter(|ms| *ms > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn parses_request_start() {
        assert_eq!(parse_request_start("1700000000123"), Some(1_700_000_000_123));
        assert_eq!(parse_request_start(" t=1700000000123 "), Some(1_700_000_000_123));
        assert_eq!(parse_request_start("1700000000123.5"), Some(1_700_000_000_123));
        assert_eq!(parse_request_start("soon"), None);
        assert_eq!(parse_request_start(""), None);
        assert_eq!(parse_request_start("0"), None);
    }

    #[test]
    fn reads_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-start", HeaderValue::from_static("1000"));
        headers.insert("hirefire-token", HeaderValue::from_static("abc"));

        let info = RequestInfo::from_parts("/hirefire", &headers);
        assert_eq!(
            info,
            RequestInfo {
                path: "/hirefire".into(),
                request_start_ms: Some(1000),
                token: Some("abc".into()),
            }
        );
    }

    #[test]
    fn missing_headers() {
        let info = RequestInfo::from_parts("/", &HeaderMap::new());
        assert_eq!(info, RequestInfo::new("/"));
    }
}
