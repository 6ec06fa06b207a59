//! Deterministic URL canonicalization (SPEC_FULL.md §6). Both the
//! fingerprint cache and the scorer call must use this rule so that
//! `canonicalize(canonicalize(u)) == canonicalize(u)` (§8 property).

use url::Url;

const TRACKING_PREFIXES: &[&str] = &["utm_"];
const TRACKING_EXACT: &[&str] = &["fbclid", "gclid", "ref", "ref_src"];

pub fn canonicalize(raw: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(raw)?;

    url.set_fragment(None);

    let scheme = url.scheme().to_lowercase();
    url.set_scheme(&scheme).ok();

    if let Some(host) = url.host_str() {
        let host = host.to_lowercase();
        url.set_host(Some(&host)).ok();
    }

    let default_port = match scheme.as_str() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };
    if url.port() == default_port {
        url.set_port(None).ok();
    }

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&pairs);
    }

    let collapsed_path = collapse_slashes(url.path());
    let trimmed_path = if collapsed_path.len() > 1 {
        collapsed_path.trim_end_matches('/').to_string()
    } else {
        collapsed_path
    };
    url.set_path(&trimmed_path);

    Ok(url.to_string())
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PREFIXES.iter().any(|p| key.starts_with(p)) || TRACKING_EXACT.contains(&key)
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_scheme_and_host() {
        assert_eq!(
            canonicalize("HTTPS://Example.COM/a").unwrap(),
            "https://example.com/a"
        );
    }

    #[test]
    fn strips_default_port() {
        assert_eq!(
            canonicalize("https://example.com:443/a").unwrap(),
            "https://example.com/a"
        );
        assert_eq!(
            canonicalize("http://example.com:80/a").unwrap(),
            "http://example.com/a"
        );
    }

    #[test]
    fn keeps_non_default_port() {
        assert_eq!(
            canonicalize("http://example.com:8080/a").unwrap(),
            "http://example.com:8080/a"
        );
    }

    #[test]
    fn removes_fragment() {
        assert_eq!(
            canonicalize("https://example.com/a#section").unwrap(),
            "https://example.com/a"
        );
    }

    #[test]
    fn strips_tracking_params_and_sorts_remaining() {
        assert_eq!(
            canonicalize("https://example.com/a?b=2&utm_source=x&a=1&fbclid=y").unwrap(),
            "https://example.com/a?a=1&b=2"
        );
    }

    #[test]
    fn collapses_duplicate_slashes_and_trims_trailing() {
        assert_eq!(
            canonicalize("https://example.com//a//b/").unwrap(),
            "https://example.com/a/b"
        );
    }

    #[test]
    fn root_path_keeps_single_slash() {
        assert_eq!(canonicalize("https://example.com/").unwrap(), "https://example.com/");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let once = canonicalize("HTTPS://Example.com:443//a//?utm_source=x&b=2&a=1#frag").unwrap();
        let twice = canonicalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn tracking_params_only_collapse_to_same_fingerprint() {
        let a = canonicalize("https://example.com/x?utm_source=twitter").unwrap();
        let b = canonicalize("https://example.com/x?utm_source=facebook").unwrap();
        assert_eq!(a, b);
    }
}
