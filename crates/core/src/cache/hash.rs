//! Request-identity cache key generation.

use sha2::{Digest, Sha256};

/// Compute the cache key for a request from its method and fragment-free URL.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let key1 = compute_request_key("GET", "http://127.0.0.1:5000/static/style.css");
        let key2 = compute_request_key("GET", "http://127.0.0.1:5000/static/style.css");
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_method_case_insensitive() {
        let upper = compute_request_key("GET", "http://127.0.0.1:5000/termos");
        let lower = compute_request_key("get", "http://127.0.0.1:5000/termos");
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_key_different_method() {
        let get = compute_request_key("GET", "http://127.0.0.1:5000/api/alertas");
        let post = compute_request_key("POST", "http://127.0.0.1:5000/api/alertas");
        assert_ne!(get, post);
    }

    #[test]
    fn test_key_format() {
        let key = compute_request_key("GET", "http://127.0.0.1:5000/");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
