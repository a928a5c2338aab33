//! Ordered classification rules

use super::{Candidate, ClassificationRule};
use crate::types::{Container, MediaSource, ShareHost};
use regex::Regex;
use std::sync::LazyLock;

static YOUTUBE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());
static STREAMTAPE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());
static RUMBLE_EMBED_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").unwrap());
static RUMBLE_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(v[A-Za-z0-9]+)(?:-[^/]*)?\.html$").unwrap());
static DRIVE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{8,}$").unwrap());

/// Classification rules in precedence order
pub static RULES: &[ClassificationRule] = &[
    ClassificationRule {
        name: "streamtape",
        predicate: is_streamtape,
        transform: streamtape,
    },
    ClassificationRule {
        name: "facebook",
        predicate: is_facebook,
        transform: facebook,
    },
    ClassificationRule {
        name: "rumble",
        predicate: is_rumble,
        transform: rumble,
    },
    ClassificationRule {
        name: "odysee",
        predicate: is_odysee,
        transform: odysee,
    },
    ClassificationRule {
        name: "youtube",
        predicate: is_youtube,
        transform: youtube,
    },
    ClassificationRule {
        name: "extension",
        predicate: is_direct_link,
        transform: by_extension,
    },
    ClassificationRule {
        name: "google_drive",
        predicate: is_google_drive,
        transform: google_drive,
    },
    ClassificationRule {
        name: "dropbox",
        predicate: is_dropbox,
        transform: dropbox,
    },
];

fn is_streamtape(c: &Candidate<'_>) -> bool {
    c.host_is("streamtape.com")
}

fn is_facebook(c: &Candidate<'_>) -> bool {
    c.host_is("facebook.com") || c.host_is("fb.watch")
}

fn is_rumble(c: &Candidate<'_>) -> bool {
    c.host_is("rumble.com")
}

fn is_odysee(c: &Candidate<'_>) -> bool {
    c.host_is("odysee.com")
}

fn is_youtube(c: &Candidate<'_>) -> bool {
    c.host_is("youtube.com") || c.host_is("youtu.be") || c.host_is("youtube-nocookie.com")
}

/// Web or relative links, excluding share hosts: those serve an HTML page
/// at the raw link even when the path ends in a media extension
fn is_direct_link(c: &Candidate<'_>) -> bool {
    (c.url.is_some() || c.is_schemeless()) && !is_google_drive(c) && !is_dropbox(c)
}

fn is_google_drive(c: &Candidate<'_>) -> bool {
    c.host_is("drive.google.com")
}

fn is_dropbox(c: &Candidate<'_>) -> bool {
    c.host_is("dropbox.com")
}

fn streamtape(c: &Candidate<'_>) -> Option<(String, MediaSource)> {
    match c.segments().as_slice() {
        [mode, id, ..] if matches!(*mode, "v" | "e") && STREAMTAPE_ID.is_match(id) => Some((
            c.raw.to_string(),
            MediaSource::Streamtape { id: id.to_string() },
        )),
        _ => None,
    }
}

fn facebook(c: &Candidate<'_>) -> Option<(String, MediaSource)> {
    let segments = c.segments();
    // An already-built plugin link wraps the canonical one in `href`
    if segments.as_slice() == ["plugins", "video.php"] {
        let href = c.query_param("href")?;
        let inner = Candidate::new(&href);
        if !is_facebook(&inner) || inner.segments().first() == Some(&"plugins") {
            return None;
        }
        return facebook(&inner);
    }

    let canonical = if c.host_is("fb.watch") {
        let code = segments.first()?;
        format!("https://fb.watch/{}/", code)
    } else if segments.first() == Some(&"watch") {
        let id = c.query_param("v")?;
        format!("https://www.facebook.com/watch/?v={}", id)
    } else {
        let pos = segments.iter().position(|s| *s == "videos")?;
        let id = segments.get(pos + 1)?;
        let prefix = segments[..pos].join("/");
        if prefix.is_empty() {
            format!("https://www.facebook.com/videos/{}/", id)
        } else {
            format!("https://www.facebook.com/{}/videos/{}/", prefix, id)
        }
    };

    let playable = format!(
        "https://www.facebook.com/plugins/video.php?href={}&show_text=false&autoplay=1&allowfullscreen=true",
        urlencoding::encode(&canonical)
    );
    Some((playable, MediaSource::Facebook { canonical_url: canonical }))
}

fn rumble(c: &Candidate<'_>) -> Option<(String, MediaSource)> {
    let segments = c.segments();
    let id = match segments.as_slice() {
        ["embed", id, ..] if RUMBLE_EMBED_ID.is_match(id) => id.to_string(),
        [page, ..] => RUMBLE_PAGE.captures(page)?.get(1)?.as_str().to_string(),
        _ => return None,
    };
    Some((
        format!("https://rumble.com/embed/{}/?autoplay=2", id),
        MediaSource::Rumble { id },
    ))
}

fn odysee(c: &Candidate<'_>) -> Option<(String, MediaSource)> {
    let url = c.url.as_ref()?;
    let path = url.path().trim_start_matches('/');
    let path = match path.strip_prefix("$/") {
        Some(rest) => rest.strip_prefix("embed/")?,
        None => path,
    };
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        return None;
    }
    Some((
        format!("https://odysee.com/$/embed/{}?autoplay=1", path),
        MediaSource::Odysee {
            path: path.to_string(),
        },
    ))
}

fn youtube(c: &Candidate<'_>) -> Option<(String, MediaSource)> {
    let segments = c.segments();
    let id = if c.host_is("youtu.be") {
        segments.first().map(|s| s.to_string())
    } else {
        match segments.as_slice() {
            ["watch", ..] => c.query_param("v"),
            ["shorts" | "embed" | "live" | "v", id, ..] => Some(id.to_string()),
            _ => None,
        }
    }?;

    if !YOUTUBE_ID.is_match(&id) {
        return None;
    }
    Some((
        format!(
            "https://www.youtube.com/embed/{}?rel=0&autoplay=1&playsinline=1",
            id
        ),
        MediaSource::Youtube { video_id: id },
    ))
}

fn by_extension(c: &Candidate<'_>) -> Option<(String, MediaSource)> {
    let ext = c.extension()?;
    let source = if ext == "m3u8" {
        MediaSource::Hls { via: None }
    } else {
        MediaSource::File {
            container: Container::from_extension(&ext)?,
            via: None,
        }
    };
    Some((c.raw.to_string(), source))
}

/// Type a rewritten share link by its trailing extension, defaulting to a
/// progressive MP4
fn share_source(c: &Candidate<'_>, via: ShareHost) -> MediaSource {
    let ext = c.extension();
    match ext.as_deref() {
        Some("m3u8") => MediaSource::Hls { via: Some(via) },
        other => MediaSource::File {
            container: other
                .and_then(Container::from_extension)
                .unwrap_or(Container::Mp4),
            via: Some(via),
        },
    }
}

fn google_drive(c: &Candidate<'_>) -> Option<(String, MediaSource)> {
    let segments = c.segments();
    let id = match segments.as_slice() {
        ["file", "d", id, ..] => id.to_string(),
        ["uc" | "open", ..] => c.query_param("id")?,
        _ => return None,
    };
    if !DRIVE_ID.is_match(&id) {
        return None;
    }
    Some((
        format!("https://drive.google.com/uc?export=download&id={}", id),
        share_source(c, ShareHost::GoogleDrive),
    ))
}

fn dropbox(c: &Candidate<'_>) -> Option<(String, MediaSource)> {
    let url = c.url.as_ref()?;
    if c.segments().is_empty() {
        return None;
    }
    let source = share_source(c, ShareHost::Dropbox);

    if c.query_param("raw").as_deref() == Some("1") {
        return Some((c.raw.to_string(), source));
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "raw")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut rewritten = url.clone();
    rewritten
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("raw", "1");
    Some((rewritten.to_string(), source))
}
