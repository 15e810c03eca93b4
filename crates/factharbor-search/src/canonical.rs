//! Canonical URL normalization used for within-stage dedup (§4.D "dedupes
//! by canonical URL within a single stage").

use url::Url;

/// Lowercases the host, strips the fragment, a trailing slash, and the
/// common UTM/click tracking query params, so that visually distinct URLs
/// referring to the same page collapse to one canonical form.
pub fn canonicalize(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.trim_end_matches('/').to_lowercase();
    };

    url.set_fragment(None);

    let filtered: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    if filtered.is_empty() {
        url.set_query(None);
    } else {
        let query = filtered
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        let _ = url.set_host(Some(&lowered));
    }

    let mut canonical = url.to_string();
    if canonical.ends_with('/') && url.path() == "/" {
        canonical.pop();
    }
    canonical
}

fn is_tracking_param(key: &str) -> bool {
    matches!(
        key,
        "utm_source" | "utm_medium" | "utm_campaign" | "utm_term" | "utm_content" | "fbclid" | "gclid"
    )
}
