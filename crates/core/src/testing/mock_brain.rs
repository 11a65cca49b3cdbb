//! Mock AI brain for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::ai::{AiError, MediaBrain};

/// One scripted answer to a main-content question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockVote {
    Yes,
    No,
    /// The call fails.
    Error,
    /// The call never returns (until the caller's timeout fires).
    Hang,
}

/// Mock implementation of the MediaBrain trait.
///
/// Unscripted paths are classified by extension: video and subtitle
/// files are main content, anything else is not. Episode, season and
/// name answers are looked up by exact text.
#[derive(Debug, Default)]
pub struct MockBrain {
    votes: Arc<RwLock<HashMap<String, VecDeque<MockVote>>>>,
    verdicts: Arc<RwLock<HashMap<String, bool>>>,
    episodes: Arc<RwLock<HashMap<String, u32>>>,
    seasons: Arc<RwLock<HashMap<String, u32>>>,
    names: Arc<RwLock<HashMap<String, String>>>,
    classify_calls: Arc<RwLock<usize>>,
    episode_calls: Arc<RwLock<usize>>,
}

impl MockBrain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue answers for `path`, consumed one per call.
    pub async fn script_votes(&self, path: &str, votes: Vec<MockVote>) {
        self.votes
            .write()
            .await
            .insert(path.to_string(), votes.into_iter().collect());
    }

    /// Fixed answer for every call about `path`.
    pub async fn set_main_content(&self, path: &str, is_main: bool) {
        self.verdicts.write().await.insert(path.to_string(), is_main);
    }

    pub async fn set_episode(&self, text: &str, episode: u32) {
        self.episodes.write().await.insert(text.to_string(), episode);
    }

    pub async fn set_season(&self, text: &str, season: u32) {
        self.seasons.write().await.insert(text.to_string(), season);
    }

    pub async fn set_name(&self, text: &str, name: &str) {
        self.names
            .write()
            .await
            .insert(text.to_string(), name.to_string());
    }

    /// Number of main-content calls made so far.
    pub async fn classify_calls(&self) -> usize {
        *self.classify_calls.read().await
    }

    /// Number of episode extraction calls made so far.
    pub async fn episode_calls(&self) -> usize {
        *self.episode_calls.read().await
    }

    fn classify_by_extension(path: &str) -> bool {
        let lower = path.to_lowercase();
        let is_media = [".mkv", ".mp4", ".avi", ".ts", ".ass", ".srt", ".ssa"]
            .iter()
            .any(|ext| lower.ends_with(ext));
        let is_extra = ["sample", "trailer", "preview"]
            .iter()
            .any(|word| lower.contains(word));
        is_media && !is_extra
    }
}

#[async_trait]
impl MediaBrain for MockBrain {
    fn name(&self) -> &str {
        "mock"
    }

    async fn classify_is_main_content(&self, path: &str) -> Result<bool, AiError> {
        *self.classify_calls.write().await += 1;

        let scripted = self
            .votes
            .write()
            .await
            .get_mut(path)
            .and_then(|queue| queue.pop_front());

        match scripted {
            Some(MockVote::Yes) => Ok(true),
            Some(MockVote::No) => Ok(false),
            Some(MockVote::Error) => Err(AiError::InvalidResponse("scripted failure".to_string())),
            Some(MockVote::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(AiError::InvalidResponse("scripted hang".to_string()))
            }
            None => {
                if let Some(verdict) = self.verdicts.read().await.get(path) {
                    return Ok(*verdict);
                }
                Ok(Self::classify_by_extension(path))
            }
        }
    }

    async fn extract_episode(&self, text: &str) -> Option<u32> {
        *self.episode_calls.write().await += 1;
        self.episodes.read().await.get(text).copied()
    }

    async fn extract_season(&self, text: &str) -> Option<u32> {
        self.seasons.read().await.get(text).copied()
    }

    async fn extract_name(&self, text: &str) -> Option<String> {
        self.names.read().await.get(text).cloned()
    }
}
