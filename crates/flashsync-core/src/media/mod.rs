//! Media embeds in note fields.
//!
//! Obsidian wiki embeds (`![[file.png]]`) and Markdown images are rewritten to
//! the markup the store understands, and each file becomes a [`MediaRef`] to
//! upload before the note is submitted.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::models::{MediaRef, MediaSource};
use crate::util::is_http_url;

static WIKI_EMBED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[\[([^\]|#]+)(?:[|#][^\]]*)?\]\]").expect("Invalid wiki embed regex")
});

static MARKDOWN_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[[^\]]*\]\(\s*([^)\s]+)(?:\s+"[^"]*")?\s*\)"#)
        .expect("Invalid markdown image regex")
});

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "svg", "tiff", "webp"];
const AUDIO_EXTENSIONS: &[&str] = &["wav", "m4a", "flac", "mp3", "wma", "aac", "webm", "ogg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    fn of(link: &str) -> Option<Self> {
        let extension = Path::new(link)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Some(Self::Image)
        } else if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
            Some(Self::Audio)
        } else {
            None
        }
    }

    fn markup(self, filename: &str) -> String {
        match self {
            Self::Image => format!("<img src=\"{filename}\">"),
            Self::Audio => format!("[sound:{filename}]"),
        }
    }
}

/// Finds local media files in an ordered list of directories.
#[derive(Debug, Clone, Default)]
pub struct MediaLocator {
    search_dirs: Vec<PathBuf>,
}

impl MediaLocator {
    pub fn new(search_dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            search_dirs: search_dirs.into_iter().collect(),
        }
    }

    /// First existing file named by `link`, if any.
    pub fn locate(&self, link: &str) -> Option<PathBuf> {
        self.search_dirs
            .iter()
            .map(|dir| dir.join(link))
            .find(|path| path.is_file())
    }
}

/// Rewrite media embeds in `content` and collect the files they reference.
///
/// Embeds of unknown file types and local files that cannot be found are
/// left as written.
pub fn extract_media(field: &str, content: &str, locator: &MediaLocator) -> (String, Vec<MediaRef>) {
    let mut media = Vec::new();

    let content = WIKI_EMBED.replace_all(content, |caps: &Captures<'_>| {
        let link = caps[1].trim();
        local_media(field, link, locator, &mut media).unwrap_or_else(|| caps[0].to_string())
    });

    let content = MARKDOWN_IMAGE.replace_all(&content, |caps: &Captures<'_>| {
        let target = &caps[1];
        let rewritten = if is_http_url(target) {
            remote_media(field, target, &mut media)
        } else {
            let link = urlencoding::decode(target)
                .map_or_else(|_| target.to_string(), std::borrow::Cow::into_owned);
            local_media(field, &link, locator, &mut media)
        };
        rewritten.unwrap_or_else(|| caps[0].to_string())
    });

    (content.into_owned(), media)
}

fn local_media(
    field: &str,
    link: &str,
    locator: &MediaLocator,
    media: &mut Vec<MediaRef>,
) -> Option<String> {
    let kind = MediaKind::of(link)?;
    let Some(path) = locator.locate(link) else {
        tracing::warn!(link, "Media file not found");
        return None;
    };
    let filename = path.file_name()?.to_str()?.to_string();
    let markup = kind.markup(&filename);
    media.push(MediaRef::new(filename, MediaSource::Path(path), field));
    Some(markup)
}

fn remote_media(field: &str, url: &str, media: &mut Vec<MediaRef>) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let filename = path.rsplit('/').next().filter(|name| !name.is_empty())?;
    let kind = MediaKind::of(filename)?;
    let markup = kind.markup(filename);
    media.push(MediaRef::new(filename, MediaSource::Url(url.to_string()), field));
    Some(markup)
}
