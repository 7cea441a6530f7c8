//! Request and response snapshots exchanged between the host, the network
//! and the cache store.

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::Error;

/// Body of the synthetic response returned when both cache and network miss.
pub const OFFLINE_BODY: &str = "Offline";

/// An intercepted request descriptor.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new() }
    }

    /// Build a GET request for the given URL.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Whether the request is a side-effect-free read that may be stored.
    pub fn is_read(&self) -> bool {
        self.method == Method::GET
    }

    /// The URL used as cache identity: the request URL without its fragment.
    pub fn cache_url(&self) -> Url {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url
    }
}

/// How a response was produced, mirroring the fetch contract's response types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseType {
    /// Same-origin network response.
    Basic,
    /// Cross-origin response with readable body.
    Cors,
    /// Cross-origin response without a readable body.
    Opaque,
    /// Constructed locally, never from the network.
    Default,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Opaque => "opaque",
            ResponseType::Default => "default",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(ResponseType::Basic),
            "cors" => Ok(ResponseType::Cors),
            "opaque" => Ok(ResponseType::Opaque),
            "default" => Ok(ResponseType::Default),
            other => Err(Error::CorruptEntry(format!("unknown response type: {other}"))),
        }
    }
}

/// A full response snapshot: status, headers and body.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub response_type: ResponseType,
    /// Final URL the response was served from, if it came from the network.
    pub url: Option<Url>,
}

impl Response {
    /// The synthetic offline response: 503 with body `Offline`.
    pub fn offline() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            headers,
            body: Bytes::from_static(OFFLINE_BODY.as_bytes()),
            response_type: ResponseType::Default,
            url: None,
        }
    }

    /// Status in the 200..=299 range.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Only successful same-origin responses are written to a store.
    pub fn is_cacheable(&self) -> bool {
        self.ok() && self.response_type == ResponseType::Basic
    }

    /// Flatten headers into name/value pairs for storage.
    ///
    /// Values keep their raw bytes, including non-UTF-8 ones.
    pub fn header_pairs(&self) -> Vec<(String, Vec<u8>)> {
        self.headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect()
    }

    /// Rebuild a header map from stored name/value pairs.
    pub fn headers_from_pairs(pairs: &[(String, Vec<u8>)]) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::with_capacity(pairs.len());
        for (name, value) in pairs {
            let name = header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::CorruptEntry(format!("header name {name}: {e}")))?;
            let value =
                HeaderValue::from_bytes(value).map_err(|e| Error::CorruptEntry(format!("header value for {name}: {e}")))?;
            headers.append(name, value);
        }
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_response() {
        let resp = Response::offline();
        assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.body, Bytes::from_static(b"Offline"));
        assert_eq!(resp.response_type, ResponseType::Default);
        assert!(!resp.is_cacheable());
    }

    #[test]
    fn test_is_read() {
        let url = Url::parse("http://127.0.0.1:5000/api/panico").unwrap();
        assert!(Request::get(url.clone()).is_read());
        assert!(!Request::new(Method::POST, url.clone()).is_read());
        assert!(!Request::new(Method::HEAD, url).is_read());
    }

    #[test]
    fn test_cache_url_strips_fragment() {
        let req = Request::get(Url::parse("http://127.0.0.1:5000/termos#secao-2").unwrap());
        assert_eq!(req.cache_url().as_str(), "http://127.0.0.1:5000/termos");
    }

    #[test]
    fn test_cacheable_requires_basic_and_ok() {
        let mut resp = Response {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            response_type: ResponseType::Basic,
            url: None,
        };
        assert!(resp.is_cacheable());

        resp.response_type = ResponseType::Cors;
        assert!(!resp.is_cacheable());

        resp.response_type = ResponseType::Basic;
        resp.status = StatusCode::NOT_FOUND;
        assert!(!resp.is_cacheable());
    }

    #[test]
    fn test_header_pairs_roundtrip_preserves_repeats() {
        let mut headers = HeaderMap::new();
        headers.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));
        let resp = Response {
            status: StatusCode::OK,
            headers,
            body: Bytes::new(),
            response_type: ResponseType::Basic,
            url: None,
        };

        let rebuilt = Response::headers_from_pairs(&resp.header_pairs()).unwrap();
        assert_eq!(rebuilt.get_all(header::SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn test_header_pairs_keep_non_utf8_bytes() {
        let mut headers = HeaderMap::new();
        let disposition = HeaderValue::from_bytes(b"attachment; filename=\"rel\xf3rio.pdf\"").unwrap();
        headers.insert(header::CONTENT_DISPOSITION, disposition);
        let resp = Response {
            status: StatusCode::OK,
            headers,
            body: Bytes::new(),
            response_type: ResponseType::Basic,
            url: None,
        };
        let rebuilt = Response::headers_from_pairs(&resp.header_pairs()).unwrap();
        assert_eq!(rebuilt, resp.headers);
    }

    #[test]
    fn test_response_type_parse() {
        assert_eq!("basic".parse::<ResponseType>().unwrap(), ResponseType::Basic);
        assert!("bogus".parse::<ResponseType>().is_err());
    }
}
