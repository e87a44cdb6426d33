use url::Url;

/// Domain key used when a URL has no usable host
pub const UNKNOWN_DOMAIN: &str = "unknown-domain";

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use feedline::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_lowercase())
}

/// Returns the rate-limiting key for a URL string
///
/// The key is the lower-cased host, or [`UNKNOWN_DOMAIN`] when the URL does
/// not parse or has no host. All host-less URLs therefore share one pacing
/// slot.
///
/// # Examples
///
/// ```
/// use feedline::url::domain_key;
///
/// assert_eq!(domain_key("https://News.Example.com/a"), "news.example.com");
/// assert_eq!(domain_key("not a url"), "unknown-domain");
/// ```
pub fn domain_key(url: &str) -> String {
    Url::parse(url)
        .ok()
        .as_ref()
        .and_then(extract_domain)
        .unwrap_or_else(|| UNKNOWN_DOMAIN.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_subdomain() {
        let url = Url::parse("https://blog.example.com/post").unwrap();
        assert_eq!(extract_domain(&url), Some("blog.example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_mixed_case() {
        let url = Url::parse("https://Example.COM/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_domain_key_keeps_www() {
        // Pacing is per host as dialled, not per normalized identity
        assert_eq!(domain_key("https://www.example.com/a"), "www.example.com");
    }

    #[test]
    fn test_domain_key_fallbacks() {
        assert_eq!(domain_key(""), UNKNOWN_DOMAIN);
        assert_eq!(domain_key("mailto:someone@example.com"), UNKNOWN_DOMAIN);
        assert_eq!(domain_key("relative/path"), UNKNOWN_DOMAIN);
    }

    #[test]
    fn test_domain_key_ip_host() {
        assert_eq!(domain_key("http://127.0.0.1:8080/feed"), "127.0.0.1");
    }
}
