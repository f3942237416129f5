// URL resolution and normalisation shared by discovery and the asset inventory

use url::Url;

/// Canonical string form used as the identity of a page or asset:
/// absolute, fragment removed, host lowercased and default port dropped.
pub fn normalize_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

/// Parse and normalise an absolute URL string.
pub fn normalize_str(url: &str) -> Option<String> {
    Url::parse(url).ok().map(|u| normalize_url(&u))
}

/// Resolve `href` against `base`, skipping references that never name a
/// fetchable resource.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
        || href.starts_with('#')
    {
        return None;
    }

    let base_url = Url::parse(base).ok()?;
    let resolved = base_url.join(href).ok()?;

    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }

    Some(normalize_url(&resolved))
}

/// Same scheme, host and port.
pub fn is_same_origin(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a.origin() == b.origin(),
        _ => false,
    }
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Lowercased file extension of the URL path, if any.
pub fn path_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?.to_string();
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}
