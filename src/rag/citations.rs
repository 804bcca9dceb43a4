//! Maps a generated answer back to the chunks that support it.
//!
//! Structured citations from the model are authoritative. When the model did
//! not follow the JSON contract, chunks are matched by looking for their video
//! id and whole-second offset in the answer text; that mode is a heuristic and
//! can both miss and over-match.

use super::answer::SourceCitation;
use crate::config::CitationSettings;
use crate::error::{Result, SiftError};
use crate::vector_store::DocumentChunk;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;
use url::Url;

/// One cited moment in a video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimestampReference {
    /// Link offset in seconds, buffer applied.
    pub seconds: u64,
    /// `M:SS` or `H:MM:SS` of the chunk start.
    pub formatted: String,
    pub href: String,
}

/// A cited video with its referenced moments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredSource {
    pub video_id: String,
    pub title: String,
    pub show_name: String,
    pub published_at: i64,
    pub video_href: String,
    pub thumbnail_src: String,
    pub references: Vec<TimestampReference>,
}

/// How chunk usage is decided.
#[derive(Debug, Clone, Copy)]
pub enum CitationMode<'a> {
    Explicit(&'a [SourceCitation]),
    AnswerText(&'a str),
}

/// Per-video fields shared by all of its chunks.
#[derive(Debug)]
struct VideoSummary {
    title: String,
    show_name: String,
    published_at: i64,
}

pub struct CitationExtractor {
    watch_base: Url,
    thumbnail_base: String,
    buffer_secs: i64,
}

impl CitationExtractor {
    pub fn new(settings: &CitationSettings) -> Result<Self> {
        let watch_base = Url::parse(&settings.watch_base_url).map_err(|e| {
            SiftError::Config(format!("Invalid watch_base_url '{}': {}", settings.watch_base_url, e))
        })?;
        Url::parse(&settings.thumbnail_base_url).map_err(|e| {
            SiftError::Config(format!(
                "Invalid thumbnail_base_url '{}': {}",
                settings.thumbnail_base_url, e
            ))
        })?;

        Ok(Self {
            watch_base,
            thumbnail_base: settings.thumbnail_base_url.trim_end_matches('/').to_string(),
            buffer_secs: settings.timestamp_buffer_secs,
        })
    }

    /// Group the cited chunks by video, oldest video first.
    pub fn extract(&self, mode: CitationMode<'_>, chunks: &[DocumentChunk]) -> Vec<StructuredSource> {
        let cited: HashSet<(&str, u64)> = match mode {
            CitationMode::Explicit(citations) => citations
                .iter()
                .map(|c| (c.video_id.as_str(), whole_seconds(c.start_time)))
                .collect(),
            CitationMode::AnswerText(_) => HashSet::new(),
        };

        let is_used = |chunk: &DocumentChunk| -> bool {
            if chunk.video_id().is_empty() {
                return false;
            }
            match mode {
                CitationMode::Explicit(_) => cited.contains(&(chunk.video_id(), chunk.start_seconds())),
                CitationMode::AnswerText(text) => {
                    text.contains(chunk.video_id()) && contains_number(text, chunk.start_seconds())
                }
            }
        };

        let mut groups: BTreeMap<&str, (VideoSummary, BTreeSet<u64>)> = BTreeMap::new();
        for chunk in chunks.iter().filter(|c| is_used(*c)) {
            let (_, seconds) = groups.entry(chunk.video_id()).or_insert_with(|| {
                (
                    VideoSummary {
                        title: chunk.metadata.title.clone(),
                        show_name: chunk.metadata.show_name.clone(),
                        published_at: chunk.metadata.published_at,
                    },
                    BTreeSet::new(),
                )
            });
            seconds.insert(chunk.start_seconds());
        }

        let mut ordered: Vec<_> = groups.into_iter().collect();
        ordered.sort_by_key(|(_, (summary, _))| summary.published_at);

        let sources: Vec<StructuredSource> = ordered
            .into_iter()
            .map(|(video_id, (summary, seconds))| self.source(video_id, summary, seconds))
            .collect();

        debug!("{} of {} chunks' videos cited", sources.len(), chunks.len());
        sources
    }

    fn source(&self, video_id: &str, summary: VideoSummary, seconds: BTreeSet<u64>) -> StructuredSource {
        let references = seconds
            .into_iter()
            .map(|offset| {
                let linked = self.buffered(offset);
                TimestampReference {
                    seconds: linked,
                    formatted: format_timestamp(offset),
                    href: self.watch_url(video_id, Some(linked)),
                }
            })
            .collect();

        StructuredSource {
            video_id: video_id.to_string(),
            title: summary.title,
            show_name: summary.show_name,
            published_at: summary.published_at,
            video_href: self.watch_url(video_id, None),
            thumbnail_src: format!("{}/{}/mqdefault.jpg", self.thumbnail_base, video_id),
            references,
        }
    }

    /// Deep link to `offset` seconds into a video, buffer applied.
    pub fn deep_link(&self, video_id: &str, offset: u64) -> String {
        self.watch_url(video_id, Some(self.buffered(offset)))
    }

    fn buffered(&self, offset: u64) -> u64 {
        (offset as i64).saturating_add(self.buffer_secs).max(0) as u64
    }

    fn watch_url(&self, video_id: &str, offset: Option<u64>) -> String {
        let mut url = self.watch_base.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("v", video_id);
            if let Some(secs) = offset {
                query.append_pair("t", &format!("{}s", secs));
            }
        }
        url.to_string()
    }
}

/// `M:SS` below an hour, `H:MM:SS` from an hour on.
pub fn format_timestamp(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

fn whole_seconds(start_time: f64) -> u64 {
    if start_time.is_finite() && start_time > 0.0 {
        start_time.trunc() as u64
    } else {
        0
    }
}

/// Whether `n` appears in `text` as a whole number (not inside a longer one).
fn contains_number(text: &str, n: u64) -> bool {
    let needle = n.to_string();
    let bytes = text.as_bytes();
    text.match_indices(&needle).any(|(at, _)| {
        let before = at.checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(at + needle.len()).copied();
        !before.is_some_and(|b| b.is_ascii_digit()) && !after.is_some_and(|b| b.is_ascii_digit())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::chunk;

    fn extractor() -> CitationExtractor {
        CitationExtractor::new(&CitationSettings::default()).unwrap()
    }

    fn cite(video_id: &str, start_time: f64) -> SourceCitation {
        SourceCitation {
            video_id: video_id.to_string(),
            start_time,
        }
    }

    #[test]
    fn test_only_cited_timestamp_is_referenced() {
        let chunks = vec![chunk("abc", 10.0, 100, "one"), chunk("abc", 20.0, 100, "two")];
        let citations = vec![cite("abc", 10.0)];

        let sources = extractor().extract(CitationMode::Explicit(&citations), &chunks);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].references.len(), 1);
        assert_eq!(sources[0].references[0].seconds, 10);
        assert_eq!(sources[0].references[0].formatted, "0:10");
        assert_eq!(
            sources[0].references[0].href,
            "https://www.youtube.com/watch?v=abc&t=10s"
        );
        assert_eq!(sources[0].video_href, "https://www.youtube.com/watch?v=abc");
        assert_eq!(sources[0].thumbnail_src, "https://i.ytimg.com/vi/abc/mqdefault.jpg");
    }

    #[test]
    fn test_pairs_are_matched_together() {
        // abc@10 and def@20 are cited; abc@20 and def@10 are not
        let chunks = vec![
            chunk("abc", 10.0, 100, ""),
            chunk("abc", 20.0, 100, ""),
            chunk("def", 10.0, 50, ""),
            chunk("def", 20.9, 50, ""),
        ];
        let citations = vec![cite("abc", 10.4), cite("def", 20.0)];

        let sources = extractor().extract(CitationMode::Explicit(&citations), &chunks);
        let summary: Vec<(&str, Vec<u64>)> = sources
            .iter()
            .map(|s| (s.video_id.as_str(), s.references.iter().map(|r| r.seconds).collect()))
            .collect();
        assert_eq!(summary, vec![("def", vec![20]), ("abc", vec![10])]);
    }

    #[test]
    fn test_timestamps_sorted_and_unique() {
        let chunks = vec![
            chunk("abc", 3700.0, 1, ""),
            chunk("abc", 65.2, 1, ""),
            chunk("abc", 65.8, 1, ""),
        ];
        let citations = vec![cite("abc", 65.0), cite("abc", 3700.0)];
        let sources = extractor().extract(CitationMode::Explicit(&citations), &chunks);

        let formatted: Vec<&str> = sources[0].references.iter().map(|r| r.formatted.as_str()).collect();
        assert_eq!(formatted, vec!["1:05", "1:01:40"]);
    }

    #[test]
    fn test_buffer_shifts_links_not_labels() {
        let settings = CitationSettings {
            timestamp_buffer_secs: -5,
            ..Default::default()
        };
        let extractor = CitationExtractor::new(&settings).unwrap();
        let chunks = vec![chunk("abc", 3.0, 1, ""), chunk("abc", 30.0, 1, "")];
        let citations = vec![cite("abc", 3.0), cite("abc", 30.0)];

        let refs = &extractor.extract(CitationMode::Explicit(&citations), &chunks)[0].references;
        assert_eq!(refs[0].seconds, 0);
        assert_eq!(refs[0].formatted, "0:03");
        assert_eq!(refs[1].seconds, 25);
        assert!(refs[1].href.ends_with("t=25s"));
    }

    #[test]
    fn test_answer_text_mode() {
        let chunks = vec![
            chunk("abc", 10.0, 1, ""),
            chunk("abc", 20.0, 1, ""),
            chunk("xyz", 10.0, 1, ""),
        ];
        let answer = "Greg brings it up in abc around 10 seconds in, and again at 120.";

        let sources = extractor().extract(CitationMode::AnswerText(answer), &chunks);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].video_id, "abc");
        assert_eq!(sources[0].references.len(), 1);
        assert_eq!(sources[0].references[0].seconds, 10);
    }

    #[test]
    fn test_number_must_stand_alone() {
        assert!(contains_number("at 10 seconds", 10));
        assert!(contains_number("(10s)", 10));
        assert!(!contains_number("at 120 seconds", 20));
        assert!(!contains_number("back in 2010", 10));
        assert!(!contains_number("at 105", 10));
    }

    #[test]
    fn test_no_match_is_empty() {
        let chunks = vec![chunk("abc", 10.0, 1, "")];
        assert!(extractor().extract(CitationMode::Explicit(&[]), &chunks).is_empty());
        assert!(extractor().extract(CitationMode::AnswerText("nothing here"), &chunks).is_empty());
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "0:00");
        assert_eq!(format_timestamp(59), "0:59");
        assert_eq!(format_timestamp(60), "1:00");
        assert_eq!(format_timestamp(3599), "59:59");
        assert_eq!(format_timestamp(3600), "1:00:00");
        assert_eq!(format_timestamp(3661), "1:01:01");
    }

    #[test]
    fn test_invalid_base_url() {
        let settings = CitationSettings {
            watch_base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(CitationExtractor::new(&settings).is_err());
    }
}
