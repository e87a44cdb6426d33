use crate::UrlError;
use url::Url;

/// Normalizes an entry URL into the identity used for deduplication
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or host-less
/// 2. Lowercase the scheme and host
/// 3. Remove leading `www.` labels from the host
/// 4. Drop default ports (80 for http, 443 for https)
/// 5. Remove the query string and fragment
/// 6. Strip a single trailing slash from the path; an empty path becomes `/`
///
/// Two URLs that differ only in case, default port, `www.` prefix, trailing
/// slash, query or fragment normalize to the same string.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(String)` - Normalized URL
/// * `Err(UrlError)` - Failed to parse or normalize the URL
///
/// # Examples
///
/// ```
/// use feedline::url::normalize_url;
///
/// let url = normalize_url("https://WWW.Example.com/path/?x=1#f").unwrap();
/// assert_eq!(url, "https://example.com/path");
/// ```
pub fn normalize_url(url_str: &str) -> Result<String, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_lowercase(),
        _ => return Err(UrlError::MissingDomain),
    };
    let mut bare = host.as_str();
    while let Some(rest) = bare.strip_prefix("www.") {
        bare = rest;
    }
    url.set_host(Some(bare))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let default_port = match url.scheme() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };
    if url.port().is_some() && url.port() == default_port {
        url.set_port(None)
            .map_err(|_| UrlError::Malformed(format!("Cannot clear port of {}", url_str)))?;
    }

    url.set_query(None);
    url.set_fragment(None);

    let path = normalize_path(url.path());
    url.set_path(&path);

    Ok(url.to_string())
}

/// Strips one trailing slash; the root path stays `/`
fn normalize_path(path: &str) -> String {
    let stripped = path.strip_suffix('/').unwrap_or(path);
    if stripped.is_empty() {
        "/".to_string()
    } else {
        stripped.to_string()
    }
}
