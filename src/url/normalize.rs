use crate::UrlError;
use url::Url;

/// Normalizes a URL into the identity key used for cycle detection
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only `http` and `https`
/// 3. Lowercase the host (done by the parser) and keep a non-default port
/// 4. Resolve dot segments in the path (done by the parser)
/// 5. Drop user info, query string and fragment
/// 6. Strip trailing slashes, including the root slash
///
/// Two URLs are the same page iff their normalized forms are equal.
///
/// # Examples
///
/// ```
/// use crawl_agent::url::normalize_url;
///
/// let key = normalize_url("https://Example.com/data/?ref=1#top").unwrap();
/// assert_eq!(key, "https://example.com/data");
/// ```
pub fn normalize_url(url_str: &str) -> Result<String, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(&url)
}

/// Normalizes an already parsed URL
pub fn normalize_parsed(url: &Url) -> Result<String, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?;
    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let path = url.path().trim_end_matches('/');

    Ok(format!("{}://{}{}", url.scheme(), authority, path))
}
