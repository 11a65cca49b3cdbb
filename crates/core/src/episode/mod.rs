//! Episode number extraction.
//!
//! Strategies are tried in a fixed order and the first hit wins:
//! AI inference (when the source enables it), then the source's regex.
//! The source's offset is applied to the raw number exactly once.

use std::sync::Arc;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ai::MediaBrain;
use crate::store::Source;

/// Strategy that produced an episode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeStrategy {
    Ai,
    Regex,
}

/// A raw episode number and its offset-adjusted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeMatch {
    pub extracted: u32,
    pub final_episode: i32,
    pub strategy: EpisodeStrategy,
}

impl EpisodeMatch {
    /// `None` when the offset pushes the episode outside `i32`.
    fn new(extracted: u32, offset: i32, strategy: EpisodeStrategy) -> Option<Self> {
        let final_episode = i32::try_from(extracted).ok()?.checked_add(offset);
        if final_episode.is_none() {
            warn!(extracted, offset, "Episode offset overflows, ignoring match");
        }
        Some(Self {
            extracted,
            final_episode: final_episode?,
            strategy,
        })
    }
}

/// Runs the configured extraction strategies for a source.
pub struct EpisodeExtractor {
    brain: Arc<dyn MediaBrain>,
}

impl EpisodeExtractor {
    pub fn new(brain: Arc<dyn MediaBrain>) -> Self {
        Self { brain }
    }

    /// Extract an episode number from `text` using `source`'s settings.
    pub async fn extract(&self, text: &str, source: &Source) -> Option<EpisodeMatch> {
        if source.use_ai_episode {
            if let Some(episode) = self.brain.extract_episode(text).await {
                if is_valid_episode(episode) {
                    debug!(text, episode, "Episode extracted by AI");
                    return EpisodeMatch::new(episode, source.episode_offset, EpisodeStrategy::Ai);
                }
                warn!(text, episode, "AI returned out-of-range episode");
            }
        }

        if let Some(pattern) = &source.episode_regex {
            if let Some(episode) = extract_with_regex(pattern, text) {
                debug!(text, episode, pattern = %pattern, "Episode extracted by regex");
                return EpisodeMatch::new(episode, source.episode_offset, EpisodeStrategy::Regex);
            }
        }

        None
    }
}

fn is_valid_episode(episode: u32) -> bool {
    episode > 0 && episode < 1000
}

/// Parse the first capture group of `pattern` in `text` as an episode number.
///
/// An invalid pattern logs a warning and yields `None`.
pub fn extract_with_regex(pattern: &str, text: &str) -> Option<u32> {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => {
            warn!(pattern, error = %e, "Invalid episode regex");
            return None;
        }
    };

    let caps = re.captures(text)?;
    let raw = caps.get(1)?.as_str();
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|n| is_valid_episode(*n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MediaType;
    use crate::testing::{fixtures, MockBrain};

    fn source(use_ai: bool, regex: Option<&str>, offset: i32) -> Source {
        let mut source = fixtures::source(1, "Show", MediaType::Tv);
        source.use_ai_episode = use_ai;
        source.episode_regex = regex.map(String::from);
        source.episode_offset = offset;
        source
    }

    #[test]
    fn test_extract_with_regex() {
        assert_eq!(extract_with_regex(r"- (\d+)", "[Sub] Show - 12 [1080p]"), Some(12));
        assert_eq!(extract_with_regex(r"E(\d+)", "Show.S01E05.mkv"), Some(5));
        assert_eq!(extract_with_regex(r"- (\d+)", "Show [1080p]"), None);
        assert_eq!(extract_with_regex(r"- (\d+)", "Show - 1000"), None);
        assert_eq!(extract_with_regex(r"- (\d+)", "Show - 0"), None);
        assert_eq!(extract_with_regex(r"- \d+", "Show - 12"), None);
    }

    #[test]
    fn test_invalid_regex_yields_none() {
        assert_eq!(extract_with_regex(r"(\d+", "Show - 12"), None);
    }

    #[tokio::test]
    async fn test_regex_offset_applied_once() {
        let extractor = EpisodeExtractor::new(Arc::new(MockBrain::new()));
        let m = extractor
            .extract("Show - 12.mkv", &source(false, Some(r"- (\d+)"), 5))
            .await
            .unwrap();
        assert_eq!(m.extracted, 12);
        assert_eq!(m.final_episode, 17);
        assert_eq!(m.strategy, EpisodeStrategy::Regex);
    }

    #[tokio::test]
    async fn test_ai_offset_applied_once() {
        let brain = MockBrain::new();
        brain.set_episode("Show - 12.mkv", 12).await;
        let extractor = EpisodeExtractor::new(Arc::new(brain));

        let m = extractor
            .extract("Show - 12.mkv", &source(true, Some(r"- (\d+)"), 5))
            .await
            .unwrap();
        assert_eq!(m.extracted, 12);
        assert_eq!(m.final_episode, 17);
        assert_eq!(m.strategy, EpisodeStrategy::Ai);
    }

    #[tokio::test]
    async fn test_ai_miss_falls_back_to_regex() {
        let extractor = EpisodeExtractor::new(Arc::new(MockBrain::new()));
        let m = extractor
            .extract("Show - 03.mkv", &source(true, Some(r"- (\d+)"), -1))
            .await
            .unwrap();
        assert_eq!(m.strategy, EpisodeStrategy::Regex);
        assert_eq!(m.final_episode, 2);
    }

    #[tokio::test]
    async fn test_ai_out_of_range_is_ignored() {
        let brain = MockBrain::new();
        brain.set_episode("Show - 1200.mkv", 1200).await;
        let extractor = EpisodeExtractor::new(Arc::new(brain));

        let m = extractor
            .extract("Show - 1200.mkv", &source(true, None, 0))
            .await;
        assert!(m.is_none());
    }

    #[tokio::test]
    async fn test_overflowing_offset_yields_no_match() {
        let extractor = EpisodeExtractor::new(Arc::new(MockBrain::new()));
        assert!(extractor
            .extract("Show - 12.mkv", &source(false, Some(r"- (\d+)"), i32::MAX))
            .await
            .is_none());

        let brain = MockBrain::new();
        brain.set_episode("Show - 12.mkv", 12).await;
        let extractor = EpisodeExtractor::new(Arc::new(brain));
        assert!(extractor
            .extract("Show - 12.mkv", &source(true, None, i32::MAX))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_no_strategy_configured() {
        let brain = MockBrain::new();
        brain.set_episode("Show - 01.mkv", 1).await;
        let extractor = EpisodeExtractor::new(Arc::new(brain));

        assert!(extractor
            .extract("Show - 01.mkv", &source(false, None, 0))
            .await
            .is_none());
    }
}
