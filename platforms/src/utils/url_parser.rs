//! Post URL identity and platform detection.
//!
//! [`normalize_url`] produces the key used to decide whether a fetched post
//! already has a row in the sheet. The remaining helpers classify a bare URL
//! and pull the platform-native post id out of it.

use crate::models::Platform;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Every platform a URL can be classified as, including ones no adapter exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectedPlatform {
    Facebook,
    Instagram,
    Twitter,
    TikTok,
    YouTube,
    LinkedIn,
}

impl DetectedPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectedPlatform::Facebook => "facebook",
            DetectedPlatform::Instagram => "instagram",
            DetectedPlatform::Twitter => "twitter",
            DetectedPlatform::TikTok => "tiktok",
            DetectedPlatform::YouTube => "youtube",
            DetectedPlatform::LinkedIn => "linkedin",
        }
    }

    /// The adapter platform, or `None` for recognized-but-unsupported sites.
    pub fn supported(&self) -> Option<Platform> {
        match self {
            DetectedPlatform::Facebook => Some(Platform::Facebook),
            DetectedPlatform::Instagram => Some(Platform::Instagram),
            DetectedPlatform::Twitter => Some(Platform::Twitter),
            _ => None,
        }
    }
}

impl From<Platform> for DetectedPlatform {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Facebook => DetectedPlatform::Facebook,
            Platform::Instagram => DetectedPlatform::Instagram,
            Platform::Twitter => DetectedPlatform::Twitter,
        }
    }
}

impl fmt::Display for DetectedPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn host_pattern(domains: &str) -> Regex {
    Regex::new(&format!(r"(?:^|\.)(?:{})$", domains)).expect("Invalid platform host regex")
}

// Order matters: the first matching platform wins.
static PLATFORM_PATTERNS: Lazy<Vec<(DetectedPlatform, Regex)>> = Lazy::new(|| {
    vec![
        (
            DetectedPlatform::Facebook,
            host_pattern(r"facebook\.com|fb\.com|fb\.watch|fb\.me"),
        ),
        (
            DetectedPlatform::Instagram,
            host_pattern(r"instagram\.com|instagr\.am"),
        ),
        (
            DetectedPlatform::Twitter,
            host_pattern(r"twitter\.com|x\.com|t\.co"),
        ),
        (
            DetectedPlatform::TikTok,
            host_pattern(r"tiktok\.com|vm\.tiktok\.com"),
        ),
        (
            DetectedPlatform::YouTube,
            host_pattern(r"youtube\.com|youtu\.be"),
        ),
        (DetectedPlatform::LinkedIn, host_pattern(r"linkedin\.com")),
    ]
});

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("Invalid post id regex"))
        .collect()
}

static FACEBOOK_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(&[
        r"/posts/(\d+)",
        r"/videos/(\d+)",
        r"story_fbid=(\d+)",
        r"fbid=(\d+)",
        r"/permalink/(\d+)",
        r"/photos/[^/]+/(\d+)",
    ])
});

static INSTAGRAM_ID_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| compile_all(&[r"/(?:p|reel|tv)/([A-Za-z0-9_-]+)"]));

static TWITTER_ID_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| compile_all(&[r"/status/(\d+)", r"/statuses/(\d+)"]));

static TIKTOK_ID_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| compile_all(&[r"/video/(\d+)", r"vm\.tiktok\.com/([A-Za-z0-9]+)"]));

static YOUTUBE_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(&[
        r"v=([A-Za-z0-9_-]{11})",
        r"youtu\.be/([A-Za-z0-9_-]{11})",
        r"/embed/([A-Za-z0-9_-]{11})",
        r"/shorts/([A-Za-z0-9_-]{11})",
    ])
});

/// Splits an already lowercased URL into `(scheme, host, path)`, dropping
/// query string, fragment, credentials and port.
fn split_url(url: &str) -> (&str, &str, &str) {
    let url = url.split('#').next().unwrap_or_default();
    let url = url.split('?').next().unwrap_or_default();

    let (scheme, rest) = url.split_once("://").unwrap_or(("", url));
    let (authority, path) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };
    let host = authority.rsplit('@').next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();

    (scheme, host, path)
}

/// Comparison key for a post URL.
///
/// Lowercases and trims, strips `www.`, folds `x.com` into `twitter.com`,
/// drops trailing slashes, query and fragment. `http`, `https` and a missing
/// scheme all normalize to `https`. Never fails: garbage in gives a
/// best-effort (possibly empty) key out.
pub fn normalize_url(url: &str) -> String {
    let lowered = url.trim().to_lowercase();
    let (scheme, host, path) = split_url(&lowered);

    let host = host.strip_prefix("www.").unwrap_or(host);
    let host = if host == "x.com" { "twitter.com" } else { host };
    let path = path.trim_end_matches('/');

    if host.is_empty() && path.is_empty() {
        return String::new();
    }

    let scheme = match scheme {
        "" | "http" | "https" => "https",
        other => other,
    };

    format!("{}://{}{}", scheme, host, path)
}

pub fn detect_platform(url: &str) -> Option<DetectedPlatform> {
    let lowered = url.trim().to_lowercase();
    let (_, host, _) = split_url(&lowered);
    if host.is_empty() {
        return None;
    }

    PLATFORM_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(host))
        .map(|(platform, _)| *platform)
}

/// Post id embedded in the URL. Auto-detects the platform when not given.
pub fn extract_post_id(url: &str, platform: Option<DetectedPlatform>) -> Option<String> {
    let patterns: &[Regex] = match platform.or_else(|| detect_platform(url))? {
        DetectedPlatform::Facebook => &FACEBOOK_ID_PATTERNS,
        DetectedPlatform::Instagram => &INSTAGRAM_ID_PATTERNS,
        DetectedPlatform::Twitter => &TWITTER_ID_PATTERNS,
        DetectedPlatform::TikTok => &TIKTOK_ID_PATTERNS,
        DetectedPlatform::YouTube => &YOUTUBE_ID_PATTERNS,
        DetectedPlatform::LinkedIn => return None,
    };

    patterns
        .iter()
        .find_map(|pattern| pattern.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// A URL is valid when the platform is recognized and a post id can be extracted.
pub fn validate_url(url: &str) -> bool {
    detect_platform(url).is_some_and(|platform| extract_post_id(url, Some(platform)).is_some())
}

/// Permalink with the post id in the path, so it keeps its own identity key.
pub fn canonical_url(url: &str) -> Option<String> {
    let platform = detect_platform(url)?;
    let post_id = extract_post_id(url, Some(platform))?;

    match platform {
        DetectedPlatform::Facebook => Some(format!("https://www.facebook.com/{}", post_id)),
        DetectedPlatform::Instagram => Some(format!("https://www.instagram.com/p/{}/", post_id)),
        DetectedPlatform::Twitter => Some(format!("https://twitter.com/i/web/status/{}", post_id)),
        DetectedPlatform::TikTok => Some(format!("https://www.tiktok.com/video/{}", post_id)),
        DetectedPlatform::YouTube => Some(format!("https://youtu.be/{}", post_id)),
        DetectedPlatform::LinkedIn => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_www_and_trailing_slash_are_cosmetic() {
        for host in ["example.com", "facebook.com", "instagram.com"] {
            assert_eq!(
                normalize_url(&format!("https://www.{}/a/b/", host)),
                normalize_url(&format!("https://{}/a/b", host))
            );
        }
    }

    #[test]
    fn test_x_com_is_twitter() {
        assert_eq!(
            normalize_url("https://x.com/i/status/1"),
            normalize_url("https://twitter.com/i/status/1")
        );
        assert_eq!(
            normalize_url("https://www.x.com/i/status/1"),
            "https://twitter.com/i/status/1"
        );
        // only the exact host is an alias
        assert_eq!(
            normalize_url("https://netflix.com/title/1"),
            "https://netflix.com/title/1"
        );
    }

    #[test]
    fn test_query_fragment_and_case_dropped() {
        assert_eq!(
            normalize_url("  HTTPS://WWW.Facebook.com/Page/posts/555/?ref=share#top  "),
            "https://facebook.com/page/posts/555"
        );
    }

    #[test]
    fn test_scheme_variants_collapse() {
        assert_eq!(
            normalize_url("http://instagram.com/p/abc"),
            normalize_url("instagram.com/p/abc/")
        );
    }

    #[test]
    fn test_malformed_input_never_fails() {
        assert_eq!(normalize_url(""), "");
        assert_eq!(normalize_url("   "), "");
        assert_eq!(normalize_url("?#"), "");
        assert_eq!(normalize_url("not a url"), "https://not a url");
    }

    #[test]
    fn test_detect_platform() {
        let cases = [
            ("https://www.facebook.com/p/100/posts/555", Some(DetectedPlatform::Facebook)),
            ("https://fb.watch/abc123/", Some(DetectedPlatform::Facebook)),
            ("https://m.facebook.com/story.php?story_fbid=1", Some(DetectedPlatform::Facebook)),
            ("https://instagr.am/p/Cx12/", Some(DetectedPlatform::Instagram)),
            ("https://x.com/user/status/1", Some(DetectedPlatform::Twitter)),
            ("https://t.co/xyz", Some(DetectedPlatform::Twitter)),
            ("https://vm.tiktok.com/ZM123/", Some(DetectedPlatform::TikTok)),
            ("https://youtu.be/dQw4w9WgXcQ", Some(DetectedPlatform::YouTube)),
            ("https://www.linkedin.com/posts/x", Some(DetectedPlatform::LinkedIn)),
            ("https://microsoft.com/t.co/page", None),
            ("https://example.com", None),
            ("", None),
        ];
        for (url, expected) in cases {
            assert_eq!(detect_platform(url), expected, "url: {}", url);
        }
    }

    #[test]
    fn test_supported_platforms() {
        assert_eq!(
            DetectedPlatform::Instagram.supported(),
            Some(Platform::Instagram)
        );
        assert_eq!(DetectedPlatform::TikTok.supported(), None);
        assert_eq!(DetectedPlatform::from(Platform::Twitter).as_str(), "twitter");
    }

    #[test]
    fn test_extract_post_id() {
        assert_eq!(
            extract_post_id("https://www.facebook.com/p/100/posts/555", None).as_deref(),
            Some("555")
        );
        assert_eq!(
            extract_post_id("https://www.facebook.com/permalink.php?story_fbid=42&id=1", None)
                .as_deref(),
            Some("42")
        );
        assert_eq!(
            extract_post_id("https://www.instagram.com/reel/Cx12_aB-9/", None).as_deref(),
            Some("Cx12_aB-9")
        );
        assert_eq!(
            extract_post_id("https://x.com/someone/status/1760000000000000001", None).as_deref(),
            Some("1760000000000000001")
        );
        assert_eq!(
            extract_post_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ", None).as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(extract_post_id("https://www.linkedin.com/posts/x", None), None);
        assert_eq!(extract_post_id("https://example.com/posts/1", None), None);
    }

    #[test]
    fn test_validate_and_canonical() {
        assert!(validate_url("https://twitter.com/a/status/9"));
        assert!(!validate_url("https://twitter.com/a"));
        assert_eq!(
            canonical_url("https://x.com/a/status/9").as_deref(),
            Some("https://twitter.com/i/web/status/9")
        );
        assert_eq!(
            canonical_url("https://instagram.com/p/abc").as_deref(),
            Some("https://www.instagram.com/p/abc/")
        );
        assert_eq!(canonical_url("https://example.com/p/abc"), None);
    }

    #[test]
    fn test_query_identified_posts_share_a_key() {
        // The query is dropped, so posts told apart only by it collide.
        assert_eq!(
            normalize_url("https://www.facebook.com/photo.php?fbid=1"),
            normalize_url("https://www.facebook.com/photo.php?fbid=2")
        );
        assert_eq!(
            normalize_url("https://www.youtube.com/watch?v=aaaaaaaaaaa"),
            normalize_url("https://www.youtube.com/watch?v=bbbbbbbbbbb")
        );

        // Canonical permalinks keep the id in the path and stay distinct.
        let first = canonical_url("https://www.facebook.com/photo.php?fbid=1").unwrap();
        let second = canonical_url("https://www.facebook.com/photo.php?fbid=2").unwrap();
        assert_eq!(first, "https://www.facebook.com/1");
        assert_ne!(normalize_url(&first), normalize_url(&second));

        let video = canonical_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(video, "https://youtu.be/dQw4w9WgXcQ");
        assert_eq!(extract_post_id(&video, None).as_deref(), Some("dQw4w9WgXcQ"));
    }
}
