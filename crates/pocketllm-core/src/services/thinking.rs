//! Reasoning extraction.
//!
//! Models that "think out loud" wrap their reasoning in delimiter tags. The
//! extractor splits raw output into the user-facing answer and zero or more
//! reasoning segments; the recorder stores those segments as immutable,
//! content-addressed objects.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{
    ArtifactId, ContentHash, ModelCapabilities, SegmentKind, StoredSegment, ThinkingSegment,
};
use crate::ports::{CoreError, RepositoryError, SegmentRepository};

/// A delimiter pair.
///
/// `open` is a prefix: when it does not itself end in `>` the tag runs up to
/// the next `>`, so `<think` also matches `<think reason="x">`. The byte after
/// such a prefix must be `>` or whitespace, so `<think` never matches
/// `<thinking>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TagPair {
    open: &'static str,
    close: &'static str,
    kind: SegmentKind,
}

const STANDARD: TagPair = TagPair {
    open: "<think",
    close: "</think>",
    kind: SegmentKind::Thinking,
};

const THINKING: TagPair = TagPair {
    open: "<thinking>",
    close: "</thinking>",
    kind: SegmentKind::Thinking,
};

const REASONING: TagPair = TagPair {
    open: "<reasoning>",
    close: "</reasoning>",
    kind: SegmentKind::Reasoning,
};

const SEED: TagPair = TagPair {
    open: "<seed:think>",
    close: "</seed:think>",
    kind: SegmentKind::Thinking,
};

const COMMAND_R: TagPair = TagPair {
    open: "<|START_THINKING|>",
    close: "<|END_THINKING|>",
    kind: SegmentKind::Thinking,
};

const APERTUS: TagPair = TagPair {
    open: "<|inner_prefix|>",
    close: "<|inner_suffix|>",
    kind: SegmentKind::Thinking,
};

/// Model-family hint selecting fallback delimiters.
///
/// The standard `<think>` and `<thinking>` pairs are always recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThinkingFormat {
    #[default]
    Standard,
    /// `<reasoning>...</reasoning>`
    Reasoning,
    /// `<seed:think>...</seed:think>`
    Seed,
    /// `<|START_THINKING|>...<|END_THINKING|>`
    CommandR,
    /// `<|inner_prefix|>...<|inner_suffix|>`
    Apertus,
    /// Every known convention.
    Any,
}

impl ThinkingFormat {
    /// Pick a hint from the model name and capabilities.
    pub fn for_model(name: &str, capabilities: ModelCapabilities) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("seed") {
            Self::Seed
        } else if lower.contains("command-r") || lower.contains("command_r") {
            Self::CommandR
        } else if lower.contains("apertus") {
            Self::Apertus
        } else if capabilities.supports_reasoning() {
            Self::Any
        } else {
            Self::Standard
        }
    }

    fn pairs(self) -> &'static [TagPair] {
        match self {
            Self::Standard => &[STANDARD, THINKING],
            Self::Reasoning => &[STANDARD, THINKING, REASONING],
            Self::Seed => &[STANDARD, THINKING, SEED],
            Self::CommandR => &[STANDARD, THINKING, COMMAND_R],
            Self::Apertus => &[STANDARD, THINKING, APERTUS],
            Self::Any => &[STANDARD, THINKING, REASONING, SEED, COMMAND_R, APERTUS],
        }
    }
}

/// A segment found by the extractor, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSegment {
    pub kind: SegmentKind,
    pub content: String,
}

/// Result of splitting raw model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Output with every reasoning block removed.
    pub visible_text: String,
    /// Reasoning blocks in the order they appeared.
    pub segments: Vec<ExtractedSegment>,
}

/// Splits raw model output into visible text and reasoning segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThinkingExtractor;

impl ThinkingExtractor {
    pub const fn new() -> Self {
        Self
    }

    /// Split `raw` using the delimiters selected by `format`.
    ///
    /// Tag matching is ASCII case-insensitive. A closing tag that appears
    /// before any opening tag marks everything before it as reasoning (the
    /// chat template opened the block). An opening tag with no closing tag
    /// turns the rest of the output into a `Raw` segment. When no delimiter
    /// is present, `visible_text` is `raw` unchanged.
    pub fn extract(&self, raw: &str, format: ThinkingFormat) -> Extraction {
        let pairs = format.pairs();
        // ASCII lowercasing keeps byte offsets identical to `raw`.
        let haystack = raw.to_ascii_lowercase();
        let mut visible = String::with_capacity(raw.len());
        let mut segments = Vec::new();
        let mut found_delimiter = false;
        let mut cursor = 0;

        if let Some((pair, close_start)) = leading_close(&haystack, pairs) {
            found_delimiter = true;
            push_segment(&mut segments, pair.kind, &raw[..close_start]);
            cursor = close_start + pair.close.len();
        }

        while cursor < raw.len() {
            let Some((pair, open_start)) = earliest_open(&haystack, cursor, pairs) else {
                visible.push_str(&raw[cursor..]);
                break;
            };

            let tag_end = if pair.open.ends_with('>') {
                Some(open_start + pair.open.len())
            } else {
                haystack[open_start..].find('>').map(|i| open_start + i + 1)
            };
            let Some(tag_end) = tag_end else {
                // "<think" with no '>' at all is not a tag.
                visible.push_str(&raw[cursor..open_start + pair.open.len()]);
                cursor = open_start + pair.open.len();
                continue;
            };

            found_delimiter = true;
            visible.push_str(&raw[cursor..open_start]);

            let close_lower = pair.close.to_ascii_lowercase();
            if let Some(offset) = haystack[tag_end..].find(&close_lower) {
                let close_start = tag_end + offset;
                push_segment(&mut segments, pair.kind, &raw[tag_end..close_start]);
                cursor = close_start + pair.close.len();
            } else {
                push_segment(&mut segments, SegmentKind::Raw, &raw[tag_end..]);
                cursor = raw.len();
            }
        }

        if !found_delimiter {
            return Extraction {
                visible_text: raw.to_string(),
                segments,
            };
        }

        Extraction {
            visible_text: visible.trim().to_string(),
            segments,
        }
    }
}

fn push_segment(segments: &mut Vec<ExtractedSegment>, kind: SegmentKind, content: &str) {
    let content = content.trim();
    if !content.is_empty() {
        segments.push(ExtractedSegment {
            kind,
            content: content.to_string(),
        });
    }
}

fn earliest_open(haystack: &str, from: usize, pairs: &[TagPair]) -> Option<(TagPair, usize)> {
    pairs
        .iter()
        .filter_map(|pair| find_open(haystack, from, pair).map(|pos| (*pair, pos)))
        .min_by_key(|(_, pos)| *pos)
}

/// First position at or after `from` where `pair.open` starts a tag.
fn find_open(haystack: &str, from: usize, pair: &TagPair) -> Option<usize> {
    let open = pair.open.to_ascii_lowercase();
    let mut search = from;
    while let Some(offset) = haystack[search..].find(&open) {
        let start = search + offset;
        let after = start + open.len();
        let bounded = open.ends_with('>')
            || haystack
                .as_bytes()
                .get(after)
                .is_none_or(|b| *b == b'>' || b.is_ascii_whitespace());
        if bounded {
            return Some(start);
        }
        search = after;
    }
    None
}

/// A close tag that precedes every open tag.
fn leading_close(haystack: &str, pairs: &[TagPair]) -> Option<(TagPair, usize)> {
    let first_open = earliest_open(haystack, 0, pairs).map(|(_, pos)| pos);
    pairs
        .iter()
        .filter_map(|pair| {
            haystack
                .find(&pair.close.to_ascii_lowercase())
                .map(|i| (*pair, i))
        })
        .min_by_key(|(_, pos)| *pos)
        .filter(|(_, pos)| first_open.is_none_or(|open| *pos < open))
}

/// Visible text plus the segments stored for one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedThinking {
    pub visible_text: String,
    pub segments: Vec<StoredSegment>,
}

/// Extracts reasoning from generated text and stores it.
#[derive(Clone)]
pub struct ThinkingRecorder {
    repo: Arc<dyn SegmentRepository>,
    extractor: ThinkingExtractor,
}

impl ThinkingRecorder {
    pub fn new(repo: Arc<dyn SegmentRepository>) -> Self {
        Self {
            repo,
            extractor: ThinkingExtractor::new(),
        }
    }

    /// Extract and store reasoning for a finished response.
    ///
    /// Never fails. Segments are stored all at once; if that fails the
    /// error is logged and the response is reported as if no delimiter had
    /// been found: the raw output as visible text and no segments.
    pub async fn record(
        &self,
        raw: &str,
        format: ThinkingFormat,
        model_id: Option<&ArtifactId>,
    ) -> RecordedThinking {
        let extraction = self.extractor.extract(raw, format);
        if extraction.segments.is_empty() {
            return RecordedThinking {
                visible_text: extraction.visible_text,
                segments: Vec::new(),
            };
        }

        let created_at = Utc::now();
        let segments: Vec<ThinkingSegment> = extraction
            .segments
            .into_iter()
            .enumerate()
            .map(|(index, found)| ThinkingSegment {
                kind: found.kind,
                content: found.content,
                index: u32::try_from(index).unwrap_or(u32::MAX),
                created_at,
                model_id: model_id.cloned(),
                response_length: Some(raw.len()),
            })
            .collect();

        match self.repo.put_all(&segments).await {
            Ok(hashes) => {
                debug!(count = hashes.len(), "Recorded thinking segments");
                RecordedThinking {
                    visible_text: extraction.visible_text,
                    segments: hashes
                        .into_iter()
                        .zip(segments)
                        .map(|(hash, segment)| StoredSegment { hash, segment })
                        .collect(),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to store thinking segments; returning raw output");
                RecordedThinking {
                    visible_text: raw.to_string(),
                    segments: Vec::new(),
                }
            }
        }
    }

    /// Segments produced by a model, newest response first.
    pub async fn segments_for_model(
        &self,
        model_id: &ArtifactId,
    ) -> Result<Vec<StoredSegment>, CoreError> {
        Ok(self.repo.list_for_model(model_id).await?)
    }

    /// Look a segment up by content hash.
    pub async fn get(&self, hash: &ContentHash) -> Result<Option<ThinkingSegment>, CoreError> {
        match self.repo.get(hash).await {
            Ok(segment) => Ok(Some(segment)),
            Err(RepositoryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemorySegmentRepository;

    fn extract(raw: &str) -> Extraction {
        ThinkingExtractor::new().extract(raw, ThinkingFormat::Standard)
    }

    #[test]
    fn test_no_delimiters_passthrough() {
        let raw = "  Just an answer.\n";
        let result = extract(raw);
        assert_eq!(result.visible_text, raw);
        assert!(result.segments.is_empty());
    }

    #[test]
    fn test_standard_block() {
        let result = extract("<think>\nweigh options\n</think>\n\nThe answer is 4.");
        assert_eq!(result.visible_text, "The answer is 4.");
        assert_eq!(
            result.segments,
            vec![ExtractedSegment {
                kind: SegmentKind::Thinking,
                content: "weigh options".to_string()
            }]
        );
    }

    #[test]
    fn test_case_insensitive_and_attributes() {
        let result = extract("<THINK mode=\"deep\">hmm</Think>ok");
        assert_eq!(result.visible_text, "ok");
        assert_eq!(result.segments[0].content, "hmm");
    }

    #[test]
    fn test_multiple_blocks_keep_order() {
        let result = extract("<think>a</think>one <think>b</think>two");
        assert_eq!(result.visible_text, "one two");
        let contents: Vec<_> = result.segments.iter().map(|s| s.content.as_str()).collect();
        assert_eq!(contents, ["a", "b"]);
    }

    #[test]
    fn test_unclosed_block_becomes_raw() {
        let result = extract("Sure. <think>still going and cut off");
        assert_eq!(result.visible_text, "Sure.");
        assert_eq!(result.segments[0].kind, SegmentKind::Raw);
        assert_eq!(result.segments[0].content, "still going and cut off");
    }

    #[test]
    fn test_thinking_tag_is_its_own_pair() {
        let result = extract("<thinking>plan</thinking>The answer is 4.");
        assert_eq!(result.visible_text, "The answer is 4.");
        assert_eq!(
            result.segments,
            vec![ExtractedSegment {
                kind: SegmentKind::Thinking,
                content: "plan".to_string()
            }]
        );
    }

    #[test]
    fn test_think_prefix_needs_tag_boundary() {
        let raw = "Use <thinkpad> tags sparingly.";
        let result = extract(raw);
        assert_eq!(result.visible_text, raw);
        assert!(result.segments.is_empty());

        let result = extract("<thinker>x</thinker> <think>y</think>z");
        assert_eq!(result.visible_text, "<thinker>x</thinker> z");
        assert_eq!(result.segments[0].content, "y");
    }

    #[test]
    fn test_leading_close_tag() {
        let result = extract("template opened this</think>Answer");
        assert_eq!(result.visible_text, "Answer");
        assert_eq!(result.segments[0].content, "template opened this");
    }

    #[test]
    fn test_empty_block_strips_tags_without_segment() {
        let result = extract("<think></think>Answer");
        assert_eq!(result.visible_text, "Answer");
        assert!(result.segments.is_empty());
    }

    #[test]
    fn test_fallback_formats_need_hint() {
        let raw = "<|START_THINKING|>plan<|END_THINKING|>Done";
        assert_eq!(extract(raw).visible_text, raw);

        let result = ThinkingExtractor::new().extract(raw, ThinkingFormat::CommandR);
        assert_eq!(result.visible_text, "Done");
        assert_eq!(result.segments[0].content, "plan");

        let result = ThinkingExtractor::new()
            .extract("<reasoning>why</reasoning>what", ThinkingFormat::Any);
        assert_eq!(result.segments[0].kind, SegmentKind::Reasoning);
        assert_eq!(result.visible_text, "what");
    }

    #[test]
    fn test_non_ascii_content_is_preserved() {
        let result = extract("<think>überlegen ✓</think>Antwort: ja");
        assert_eq!(result.visible_text, "Antwort: ja");
        assert_eq!(result.segments[0].content, "überlegen ✓");
    }

    #[test]
    fn test_format_for_model() {
        assert_eq!(
            ThinkingFormat::for_model("Seed-OSS-36B", ModelCapabilities::CHAT),
            ThinkingFormat::Seed
        );
        assert_eq!(
            ThinkingFormat::for_model("qwen3", ModelCapabilities::REASONING),
            ThinkingFormat::Any
        );
        assert_eq!(
            ThinkingFormat::for_model("llama", ModelCapabilities::CHAT),
            ThinkingFormat::Standard
        );
    }

    #[tokio::test]
    async fn test_recorder_stores_and_retrieves() {
        let repo = Arc::new(InMemorySegmentRepository::new());
        let recorder = ThinkingRecorder::new(repo.clone());
        let model = ArtifactId::for_name("m");

        let recorded = recorder
            .record(
                "<think>one</think>x<think>two</think>y",
                ThinkingFormat::Standard,
                Some(&model),
            )
            .await;
        assert_eq!(recorded.visible_text, "xy");
        assert_eq!(recorded.segments.len(), 2);
        assert_eq!(recorded.segments[1].segment.index, 1);
        assert_eq!(repo.len(), 2);

        let listed = recorder.segments_for_model(&model).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].segment.content, "one");

        let hash = &recorded.segments[0].hash;
        assert_eq!(
            recorder.get(hash).await.unwrap().unwrap().content,
            "one"
        );
        assert!(recorder
            .get(&ContentHash::from_hex("00"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_recorder_degrades_on_storage_failure() {
        let repo = Arc::new(InMemorySegmentRepository::new());
        repo.fail_writes(true);
        let recorder = ThinkingRecorder::new(repo.clone());

        let recorded = recorder
            .record(
                "<think>important reasoning</think>answer",
                ThinkingFormat::Standard,
                None,
            )
            .await;
        assert_eq!(
            recorded.visible_text,
            "<think>important reasoning</think>answer"
        );
        assert!(recorded.segments.is_empty());
        assert!(repo.is_empty());
    }
}
