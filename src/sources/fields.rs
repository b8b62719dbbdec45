//! Small field cleaners shared by the source adapters.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("valid regex"));

/// Integer prefix of a string, the way loose numeric columns are read
/// (`"200 km"` -> 200, `"1,200"` -> 1).
pub fn leading_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Like [`leading_int`] after dropping thousands separators.
pub fn leading_int_ignoring_commas(text: &str) -> Option<i64> {
    leading_int(&text.replace(',', ""))
}

/// Whether a spreadsheet cell starts with a number (date columns on data rows).
pub fn starts_with_digit(text: &str) -> bool {
    text.trim().chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Round a distance down to its `bucket` category; zero or negative is unknown.
pub fn bucket_distance(km: i64, bucket: i64) -> Option<u32> {
    if km <= 0 || bucket <= 0 {
        return None;
    }
    let rounded = (km / bucket) * bucket;
    if rounded == 0 {
        None
    } else {
        u32::try_from(rounded).ok()
    }
}

/// Non-negative distance from a provider that reports exact kilometres.
pub fn exact_distance(km: i64) -> Option<u32> {
    u32::try_from(km).ok()
}

/// Split a multi-valued link field on `;` or whitespace, dropping empties.
pub fn split_links(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ';' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Unwrap `https://www.google.com/url?q=<target>` links; anything else passes through.
pub fn resolve_redirect(link: &str) -> String {
    let Ok(parsed) = Url::parse(link) else {
        return link.to_string();
    };
    if parsed.host_str() == Some("www.google.com") && parsed.path() == "/url" {
        if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "q") {
            if !target.is_empty() {
                return target.into_owned();
            }
        }
    }
    link.to_string()
}

/// Resolve a possibly relative link against the page it was found on.
pub fn absolute_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    Url::parse(base).ok()?.join(href).ok().map(String::from)
}

/// Decode HTML entities (`&#8211;`, `&amp;`) in a provider title.
pub fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// `n`th `-` separated segment of a slug (`2025-brm-500-oudenburg`, 3 -> `oudenburg`).
pub fn slug_segment(slug: &str, n: usize) -> Option<String> {
    slug.split('-')
        .nth(n)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Replace runs of non-word characters with `_` for use inside identity keys.
pub fn identity_safe(text: &str) -> String {
    NON_WORD.replace_all(text, "_").into_owned()
}

/// Trimmed, `None` when empty.
pub fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

pub fn non_empty_opt(text: Option<&str>) -> Option<String> {
    text.and_then(non_empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_distance() {
        assert_eq!(bucket_distance(734, 100), Some(700));
        assert_eq!(bucket_distance(200, 100), Some(200));
        assert_eq!(bucket_distance(99, 100), None);
        assert_eq!(bucket_distance(0, 100), None);
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("200"), Some(200));
        assert_eq!(leading_int(" 300 km"), Some(300));
        assert_eq!(leading_int("abc"), None);
        assert_eq!(leading_int_ignoring_commas("1,200"), Some(1200));
        assert_eq!(leading_int("-5"), Some(-5));
    }

    #[test]
    fn test_split_links() {
        assert_eq!(
            split_links(" https://a.example/1 ; https://b.example/2;;"),
            vec!["https://a.example/1", "https://b.example/2"]
        );
        assert_eq!(
            split_links("https://a.example/1 https://b.example/2"),
            vec!["https://a.example/1", "https://b.example/2"]
        );
        assert!(split_links("   ").is_empty());
    }

    #[test]
    fn test_resolve_redirect() {
        assert_eq!(
            resolve_redirect("https://www.google.com/url?q=https://example.com/x"),
            "https://example.com/x"
        );
        assert_eq!(
            resolve_redirect("https://www.google.com/url?q=https://example.com/x&sa=D&ust=1"),
            "https://example.com/x"
        );
        assert_eq!(resolve_redirect("https://example.com/direct"), "https://example.com/direct");
        assert_eq!(
            resolve_redirect("https://www.google.com/search?q=brevet"),
            "https://www.google.com/search?q=brevet"
        );
        assert_eq!(resolve_redirect("not a url"), "not a url");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("BRM 200 &#8211; Oudenburg"), "BRM 200 \u{2013} Oudenburg");
        assert_eq!(decode_entities("Fish &amp; Chips"), "Fish & Chips");
        assert_eq!(decode_entities("Plain"), "Plain");
        assert_eq!(
            decode_entities("BRM 200 &amp; <Ronde> van Vlaanderen"),
            "BRM 200 & <Ronde> van Vlaanderen"
        );
    }

    #[test]
    fn test_slug_segment() {
        assert_eq!(slug_segment("2025-brm-500-oudenburg", 3).as_deref(), Some("oudenburg"));
        assert_eq!(slug_segment("brm-200", 3), None);
    }

    #[test]
    fn test_identity_safe() {
        assert_eq!(identity_safe("Bishop's Stortford"), "Bishop_s_Stortford");
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(
            absolute_url("https://rusa.org/cgi-bin/eventsearch_PF.pl", "/cgi-bin/routesearch.pl?x=1").as_deref(),
            Some("https://rusa.org/cgi-bin/routesearch.pl?x=1")
        );
        assert_eq!(absolute_url("https://rusa.org/", ""), None);
    }
}
