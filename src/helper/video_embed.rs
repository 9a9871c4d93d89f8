//! Detects video-hosting links in free text and swaps them for embed placeholders.
//!
//! One generic URL scan collects candidates; each candidate is then tested against the
//! platform patterns in a fixed order (YouTube, Vimeo, Dailymotion) and the first match
//! wins. Candidates that match no platform stay in the text untouched.
//!
//! Placeholders are wrapped in U+FFFC (OBJECT REPLACEMENT CHARACTER). Any U+FFFC the author
//! typed is replaced with U+FFFD before scanning, so the text can never contain a
//! placeholder that was not produced here and the n-th placeholder is always `videos[n]`.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::fmt;

const SENTINEL: char = '\u{FFFC}';
const NEUTRALIZED: char = '\u{FFFD}';

static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"https?://(www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_+.~#?&/=]*)",
    )
    .expect("URL pattern is valid")
});

static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new("\u{FFFC}VIDEO:[a-z]+:[^\u{FFFC}]+\u{FFFC}").expect("placeholder pattern is valid")
});

static YOUTUBE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
    )
    .expect("youtube pattern is valid")
});

static VIMEO_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)vimeo\.com/(\d+)").expect("vimeo pattern is valid"));

static DAILYMOTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)dailymotion\.com/video/([a-zA-Z0-9]+)").expect("dailymotion pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoPlatform {
    Youtube,
    Vimeo,
    Dailymotion,
}

impl VideoPlatform {
    /// Match priority. The first platform whose pattern matches a URL claims it.
    pub const ALL: [VideoPlatform; 3] = [Self::Youtube, Self::Vimeo, Self::Dailymotion];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Vimeo => "vimeo",
            Self::Dailymotion => "dailymotion",
        }
    }

    /// Caption shown under an embedded player, e.g. "Youtube Video".
    pub fn caption(self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => format!("{}{} Video", first.to_ascii_uppercase(), chars.as_str()),
            None => "Video".to_string(),
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Self::Youtube => &YOUTUBE_REGEX,
            Self::Vimeo => &VIMEO_REGEX,
            Self::Dailymotion => &DAILYMOTION_REGEX,
        }
    }

    fn embed_url(self, id: &str) -> String {
        match self {
            Self::Youtube => format!("https://www.youtube.com/embed/{}", id),
            Self::Vimeo => format!("https://player.vimeo.com/video/{}", id),
            Self::Dailymotion => format!("https://www.dailymotion.com/embed/video/{}", id),
        }
    }

    fn thumbnail_url(self, id: &str) -> String {
        match self {
            Self::Youtube => format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", id),
            Self::Vimeo => format!("https://vumbnail.com/{}.jpg", id),
            Self::Dailymotion => format!("https://www.dailymotion.com/thumbnail/video/{}", id),
        }
    }
}

impl fmt::Display for VideoPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recognised video link. Built only through [`VideoReference::from_url`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoReference {
    pub platform: VideoPlatform,
    pub video_id: String,
    pub embed_url: String,
    pub thumbnail_url: String,
    pub original_url: String,
}

impl VideoReference {
    /// Tests `url` against each platform in priority order.
    pub fn from_url(url: &str) -> Option<Self> {
        VideoPlatform::ALL.iter().find_map(|&platform| {
            let caps = platform.pattern().captures(url)?;
            let video_id = caps.get(1)?.as_str().to_string();
            Some(Self {
                platform,
                embed_url: platform.embed_url(&video_id),
                thumbnail_url: platform.thumbnail_url(&video_id),
                original_url: url.to_string(),
                video_id,
            })
        })
    }

    fn placeholder(&self) -> String {
        format!("{s}VIDEO:{}:{}{s}", self.platform, self.video_id, s = SENTINEL)
    }
}

/// Text with every recognised video URL replaced by a placeholder, plus the videos in the
/// order their placeholders appear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedText {
    pub text: String,
    pub videos: Vec<VideoReference>,
}

impl ProcessedText {
    pub fn placeholder_count(&self) -> usize {
        PLACEHOLDER_REGEX.find_iter(&self.text).count()
    }

    pub fn has_videos(&self) -> bool {
        !self.videos.is_empty()
    }
}

/// Every URL in `text` that belongs to a known platform, left to right.
pub fn find_video_urls(text: &str) -> Vec<String> {
    URL_REGEX
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|url| VideoReference::from_url(url).is_some())
        .map(str::to_string)
        .collect()
}

/// Replaces every recognised video URL with a placeholder in a single left-to-right pass.
pub fn replace_video_urls(text: &str) -> ProcessedText {
    let source = if text.contains(SENTINEL) {
        std::borrow::Cow::Owned(text.replace(SENTINEL, &NEUTRALIZED.to_string()))
    } else {
        std::borrow::Cow::Borrowed(text)
    };

    let mut videos = Vec::new();
    let replaced = URL_REGEX.replace_all(&source, |caps: &Captures| {
        let url = &caps[0];
        match VideoReference::from_url(url) {
            Some(video) => {
                let token = video.placeholder();
                videos.push(video);
                token
            }
            None => url.to_string(),
        }
    });

    ProcessedText { text: replaced.into_owned(), videos }
}

/// A renderable piece of processed content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
    Video { embed_url: String, thumbnail_url: String, platform: VideoPlatform, caption: String },
}

/// Splits processed text on placeholders and pairs the j-th gap with `videos[j]`.
/// Empty text pieces are dropped; a gap with no matching video is skipped.
pub fn render_blocks(processed: &ProcessedText) -> Vec<ContentBlock> {
    if processed.videos.is_empty() {
        if processed.text.is_empty() {
            return Vec::new();
        }
        return vec![ContentBlock::Text { text: processed.text.clone() }];
    }

    let mut blocks = Vec::new();
    for (index, part) in PLACEHOLDER_REGEX.split(&processed.text).enumerate() {
        if index > 0 {
            if let Some(video) = processed.videos.get(index - 1) {
                blocks.push(ContentBlock::Video {
                    embed_url: video.embed_url.clone(),
                    thumbnail_url: video.thumbnail_url.clone(),
                    platform: video.platform,
                    caption: video.platform.caption(),
                });
            }
        }
        if !part.is_empty() {
            blocks.push(ContentBlock::Text { text: part.to_string() });
        }
    }
    blocks
}

/// Convenience for templates: scan and split in one go.
pub fn content_blocks(text: &str) -> Vec<ContentBlock> {
    render_blocks(&replace_video_urls(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://www.youtube.com/watch?v=dQw4w9WgXcQ", VideoPlatform::Youtube, "dQw4w9WgXcQ", "https://www.youtube.com/embed/dQw4w9WgXcQ")]
    #[case("https://youtu.be/dQw4w9WgXcQ", VideoPlatform::Youtube, "dQw4w9WgXcQ", "https://www.youtube.com/embed/dQw4w9WgXcQ")]
    #[case("https://www.youtube.com/embed/dQw4w9WgXcQ", VideoPlatform::Youtube, "dQw4w9WgXcQ", "https://www.youtube.com/embed/dQw4w9WgXcQ")]
    #[case("https://vimeo.com/76979871", VideoPlatform::Vimeo, "76979871", "https://player.vimeo.com/video/76979871")]
    #[case("https://www.dailymotion.com/video/x7tgad0", VideoPlatform::Dailymotion, "x7tgad0", "https://www.dailymotion.com/embed/video/x7tgad0")]
    fn recognises_each_platform(
        #[case] url: &str,
        #[case] platform: VideoPlatform,
        #[case] id: &str,
        #[case] embed: &str,
    ) {
        let processed = replace_video_urls(url);
        assert_eq!(processed.videos.len(), 1);
        let video = &processed.videos[0];
        assert_eq!(video.platform, platform);
        assert_eq!(video.video_id, id);
        assert_eq!(video.embed_url, embed);
        assert_eq!(video.original_url, url);
        assert_eq!(processed.placeholder_count(), 1);
    }

    #[test]
    fn thumbnails_are_templated_from_the_id() {
        let yt = VideoReference::from_url("https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(yt.thumbnail_url, "https://img.youtube.com/vi/dQw4w9WgXcQ/maxresdefault.jpg");
        let vimeo = VideoReference::from_url("https://vimeo.com/76979871").unwrap();
        assert_eq!(vimeo.thumbnail_url, "https://vumbnail.com/76979871.jpg");
        let dm = VideoReference::from_url("https://www.dailymotion.com/video/x7tgad0").unwrap();
        assert_eq!(dm.thumbnail_url, "https://www.dailymotion.com/thumbnail/video/x7tgad0");
    }

    #[test]
    fn non_video_urls_pass_through() {
        let input = "See https://example.com/page and http://foo.org/a?b=c for details";
        let processed = replace_video_urls(input);
        assert!(processed.videos.is_empty());
        assert_eq!(processed.text, input);
        assert!(find_video_urls(input).is_empty());
    }

    #[test]
    fn empty_input_is_not_an_error() {
        let processed = replace_video_urls("");
        assert_eq!(processed.text, "");
        assert!(processed.videos.is_empty());
        assert!(render_blocks(&processed).is_empty());
    }

    #[test]
    fn mixed_content_keeps_surrounding_text() {
        let processed = replace_video_urls("Check this out: https://youtu.be/dQw4w9WgXcQ amazing right?");
        assert_eq!(processed.videos.len(), 1);
        assert_eq!(processed.placeholder_count(), 1);
        assert!(processed.text.starts_with("Check this out: "));
        assert!(processed.text.ends_with(" amazing right?"));

        let blocks = render_blocks(&processed);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], ContentBlock::Text { text: "Check this out: ".to_string() });
        match &blocks[1] {
            ContentBlock::Video { embed_url, caption, .. } => {
                assert_eq!(embed_url, "https://www.youtube.com/embed/dQw4w9WgXcQ");
                assert_eq!(caption, "Youtube Video");
            }
            other => panic!("expected a video block, got {:?}", other),
        }
        assert_eq!(blocks[2], ContentBlock::Text { text: " amazing right?".to_string() });
    }

    #[test]
    fn order_follows_the_source_text() {
        let input = "first https://vimeo.com/1234 then https://youtu.be/dQw4w9WgXcQ \
                     skip https://example.com last https://www.dailymotion.com/video/x7tgad0";
        let processed = replace_video_urls(input);
        let platforms: Vec<_> = processed.videos.iter().map(|v| v.platform).collect();
        assert_eq!(
            platforms,
            vec![VideoPlatform::Vimeo, VideoPlatform::Youtube, VideoPlatform::Dailymotion]
        );
        assert_eq!(processed.placeholder_count(), processed.videos.len());
        assert!(processed.text.contains("https://example.com"));
        assert_eq!(find_video_urls(input).len(), 3);
    }

    #[test]
    fn ids_with_punctuation_still_split_into_a_video_block() {
        let processed = replace_video_urls("watch https://youtu.be/abc.def%20gh now");
        assert_eq!(processed.videos.len(), 1);
        assert_eq!(processed.videos[0].video_id, "abc.def%20g");
        assert_eq!(processed.placeholder_count(), processed.videos.len());

        let blocks = render_blocks(&processed);
        let videos = blocks.iter().filter(|b| matches!(b, ContentBlock::Video { .. })).count();
        assert_eq!(videos, 1);
        for block in &blocks {
            if let ContentBlock::Text { text } = block {
                assert!(!text.contains(SENTINEL), "token leaked into {:?}", text);
            }
        }
    }

    #[test]
    fn repeated_url_yields_one_entry_per_occurrence() {
        let input = "https://youtu.be/dQw4w9WgXcQ and again https://youtu.be/dQw4w9WgXcQ";
        let processed = replace_video_urls(input);
        assert_eq!(processed.videos.len(), 2);
        assert_eq!(processed.placeholder_count(), 2);
        let videos = render_blocks(&processed)
            .into_iter()
            .filter(|b| matches!(b, ContentBlock::Video { .. }))
            .count();
        assert_eq!(videos, 2);
    }

    #[test]
    fn user_text_cannot_forge_a_placeholder() {
        let forged = format!("{s}VIDEO:youtube:dQw4w9WgXcQ{s} https://vimeo.com/42", s = SENTINEL);
        let processed = replace_video_urls(&forged);
        assert_eq!(processed.videos.len(), 1);
        assert_eq!(processed.placeholder_count(), 1);
        assert_eq!(processed.videos[0].platform, VideoPlatform::Vimeo);
        assert!(!processed.text.starts_with(SENTINEL));
    }

    #[test]
    fn bracketed_legacy_markers_are_plain_text() {
        let input = "[VIDEO_youtube_dQw4w9WgXcQ] is just text";
        let processed = replace_video_urls(input);
        assert_eq!(processed.text, input);
        assert_eq!(render_blocks(&processed), vec![ContentBlock::Text { text: input.to_string() }]);
    }

    #[test]
    fn gap_without_video_is_skipped() {
        let processed = ProcessedText {
            text: format!("a {s}VIDEO:youtube:dQw4w9WgXcQ{s} b {s}VIDEO:vimeo:42{s} c", s = SENTINEL),
            videos: vec![VideoReference::from_url("https://youtu.be/dQw4w9WgXcQ").unwrap()],
        };
        let blocks = render_blocks(&processed);
        let video_count = blocks.iter().filter(|b| matches!(b, ContentBlock::Video { .. })).count();
        assert_eq!(video_count, 1);
        assert_eq!(blocks.last(), Some(&ContentBlock::Text { text: " c".to_string() }));
    }

    #[test]
    fn extraction_is_repeatable() {
        let input = "https://youtu.be/dQw4w9WgXcQ https://vimeo.com/76979871";
        assert_eq!(replace_video_urls(input), replace_video_urls(input));
    }

    #[test]
    fn youtube_wins_over_later_platforms() {
        // A YouTube link whose query mentions vimeo still resolves to YouTube.
        let video = VideoReference::from_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&ref=vimeo.com/99").unwrap();
        assert_eq!(video.platform, VideoPlatform::Youtube);
    }
}
