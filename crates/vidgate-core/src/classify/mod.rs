//! URL classification
//!
//! Turns an arbitrary, untrusted string into a typed [`MediaReference`].
//! Rules are evaluated in fixed priority order; the first rule whose
//! predicate matches *and* whose transform yields a result wins. A rule
//! whose transform cannot extract what it needs (e.g. a YouTube URL with no
//! video id) falls through to the next rule.
//!
//! Classification is total: every input, including empty strings and
//! non-URL garbage, produces a reference.

mod rules;

pub use rules::RULES;

use crate::types::{MediaReference, MediaSource};
use tracing::trace;
use url::Url;

/// Input to a classification rule
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    /// Trimmed raw input
    pub raw: &'a str,
    /// Parsed http(s) URL, when the input is one (scheme-less host paths are
    /// parsed as https)
    pub url: Option<Url>,
}

impl<'a> Candidate<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            url: parse_web_url(raw),
        }
    }

    /// Lowercased host without a leading `www.` / `m.`
    pub fn host(&self) -> Option<String> {
        let host = self.url.as_ref()?.host_str()?.to_ascii_lowercase();
        let host = host
            .strip_prefix("www.")
            .or_else(|| host.strip_prefix("m."))
            .map(str::to_string)
            .unwrap_or(host);
        Some(host)
    }

    /// True if the host is `domain` or one of its subdomains
    pub fn host_is(&self, domain: &str) -> bool {
        match self.host() {
            Some(host) => host == domain || host.ends_with(&format!(".{}", domain)),
            None => false,
        }
    }

    /// Non-empty path segments
    pub fn segments(&self) -> Vec<&str> {
        match &self.url {
            Some(url) => url
                .path_segments()
                .map(|s| s.filter(|seg| !seg.is_empty()).collect())
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// First value of a query parameter
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.url
            .as_ref()?
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    }

    /// Lowercased extension of the last path segment, ignoring query and
    /// fragment
    pub fn extension(&self) -> Option<String> {
        let path = match &self.url {
            Some(url) => url.path().to_string(),
            None => self
                .raw
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        };
        let last = path.rsplit('/').next()?;
        let (_, ext) = last.rsplit_once('.')?;
        if ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// True if the input has no scheme at all (a relative or bare path)
    pub fn is_schemeless(&self) -> bool {
        match self.raw.split_once(':') {
            Some((scheme, _)) => {
                // "host:port/..." and Windows-ish drive letters are not schemes we care about;
                // anything before a slash that looks like a scheme counts.
                scheme.contains('/')
                    || scheme.is_empty()
                    || !scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
            }
            None => true,
        }
    }
}

fn parse_web_url(raw: &str) -> Option<Url> {
    if raw.chars().any(char::is_whitespace) {
        return None;
    }
    let parsed = if let Some(rest) = raw.strip_prefix("//") {
        Url::parse(&format!("https://{}", rest)).ok()
    } else {
        match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let head = raw.split('/').next().unwrap_or_default();
                if raw.contains('/') && head.contains('.') {
                    Url::parse(&format!("https://{}", raw)).ok()
                } else {
                    None
                }
            }
            Err(_) => None,
        }
    }?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Some(parsed),
        _ => None,
    }
}

/// A single ordered classification rule
pub struct ClassificationRule {
    /// Rule name, used in traces
    pub name: &'static str,
    /// Cheap host/shape test
    pub predicate: fn(&Candidate<'_>) -> bool,
    /// Builds the playable URL and tagged source; `None` falls through
    pub transform: fn(&Candidate<'_>) -> Option<(String, MediaSource)>,
}

/// Classify a raw media reference string
pub fn classify(raw: &str) -> MediaReference {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return MediaReference::new(raw, "", MediaSource::Unknown);
    }

    let candidate = Candidate::new(trimmed);
    for rule in RULES {
        if !(rule.predicate)(&candidate) {
            continue;
        }
        if let Some((playable, source)) = (rule.transform)(&candidate) {
            trace!(rule = rule.name, kind = %source.kind(), "Classified media reference");
            return MediaReference::new(raw, playable, source);
        }
        trace!(rule = rule.name, "Rule matched but produced no reference, falling through");
    }

    MediaReference::new(raw, trimmed, MediaSource::Generic)
}
