//! Main-content classification by majority vote.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::ai::MediaBrain;
use crate::config::ClassifierConfig;
use crate::metrics::CLASSIFIER_VOTES;

/// Tally of one classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub yes: usize,
    pub no: usize,
    /// Calls that errored or timed out.
    pub failed: usize,
}

/// Decides whether a file is main content.
#[async_trait]
pub trait ContentClassifier: Send + Sync {
    async fn is_main_content(&self, path: &str) -> bool;
}

/// Asks the brain several times concurrently and keeps the file only when
/// enough calls say yes. Failed calls do not vote.
pub struct MajorityClassifier {
    brain: Arc<dyn MediaBrain>,
    votes: usize,
    min_yes_votes: usize,
    call_timeout: Duration,
}

impl MajorityClassifier {
    pub fn new(brain: Arc<dyn MediaBrain>, config: &ClassifierConfig) -> Self {
        Self {
            brain,
            votes: config.votes.max(1),
            min_yes_votes: config.min_yes_votes.max(1),
            call_timeout: Duration::from_secs(config.call_timeout_secs),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Run all votes and count them.
    pub async fn tally(&self, path: &str) -> VoteTally {
        let calls = (0..self.votes).map(|_| async move {
            tokio::time::timeout(self.call_timeout, self.brain.classify_is_main_content(path)).await
        });

        let mut tally = VoteTally::default();
        for result in join_all(calls).await {
            let outcome = match result {
                Ok(Ok(true)) => {
                    tally.yes += 1;
                    "yes"
                }
                Ok(Ok(false)) => {
                    tally.no += 1;
                    "no"
                }
                Ok(Err(e)) => {
                    debug!(path, error = %e, "Classifier vote failed");
                    tally.failed += 1;
                    "error"
                }
                Err(_) => {
                    tally.failed += 1;
                    "timeout"
                }
            };
            CLASSIFIER_VOTES.with_label_values(&[outcome]).inc();
        }
        tally
    }
}

#[async_trait]
impl ContentClassifier for MajorityClassifier {
    async fn is_main_content(&self, path: &str) -> bool {
        let tally = self.tally(path).await;

        if tally.failed == self.votes {
            warn!(path, votes = self.votes, "Every classifier vote failed, rejecting file");
            return false;
        }

        let keep = tally.yes >= self.min_yes_votes;
        debug!(
            path,
            yes = tally.yes,
            no = tally.no,
            failed = tally.failed,
            keep,
            "Classified file"
        );
        keep
    }
}

/// Media and subtitle extensions accepted by [`ExtensionClassifier`].
const MAIN_CONTENT_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "ts", "m2ts", "webm", "ass", "ssa", "srt", "sup",
];

/// Words that mark extras rather than the release itself.
const EXTRA_MARKERS: &[&str] = &["sample", "trailer", "preview", "menu", "ncop", "nced"];

/// Keyword-based classification for deployments without an LLM.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtensionClassifier;

#[async_trait]
impl ContentClassifier for ExtensionClassifier {
    async fn is_main_content(&self, path: &str) -> bool {
        let lower = path.to_lowercase();
        let is_media = lower
            .rsplit_once('.')
            .is_some_and(|(_, ext)| MAIN_CONTENT_EXTENSIONS.contains(&ext));
        let is_extra = EXTRA_MARKERS.iter().any(|word| lower.contains(word));

        debug!(path, is_media, is_extra, "Classified file by extension");
        is_media && !is_extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBrain, MockVote};

    fn classifier(brain: MockBrain) -> MajorityClassifier {
        MajorityClassifier::new(Arc::new(brain), &ClassifierConfig::default())
    }

    async fn scripted(votes: Vec<MockVote>) -> MajorityClassifier {
        let brain = MockBrain::new();
        brain.script_votes("Show/01.mkv", votes).await;
        classifier(brain)
    }

    #[tokio::test]
    async fn test_two_of_three_kept() {
        let c = scripted(vec![MockVote::Yes, MockVote::Yes, MockVote::No]).await;
        assert!(c.is_main_content("Show/01.mkv").await);
    }

    #[tokio::test]
    async fn test_one_of_three_rejected() {
        let c = scripted(vec![MockVote::Yes, MockVote::No, MockVote::No]).await;
        assert!(!c.is_main_content("Show/01.mkv").await);
    }

    #[tokio::test]
    async fn test_failed_vote_excluded() {
        let c = scripted(vec![MockVote::Error, MockVote::Yes, MockVote::Yes]).await;
        let tally = c.tally("Show/01.mkv").await;
        assert_eq!(tally, VoteTally { yes: 2, no: 0, failed: 1 });

        let c = scripted(vec![MockVote::Error, MockVote::Yes, MockVote::Yes]).await;
        assert!(c.is_main_content("Show/01.mkv").await);
    }

    #[tokio::test]
    async fn test_all_failed_rejected() {
        let c = scripted(vec![MockVote::Error, MockVote::Error, MockVote::Error]).await;
        assert!(!c.is_main_content("Show/01.mkv").await);
    }

    #[tokio::test]
    async fn test_slow_vote_times_out() {
        let c = scripted(vec![MockVote::Hang, MockVote::Yes, MockVote::Yes])
            .await
            .with_call_timeout(Duration::from_millis(50));
        let tally = c.tally("Show/01.mkv").await;
        assert_eq!(tally.failed, 1);
        assert_eq!(tally.yes, 2);
    }

    #[tokio::test]
    async fn test_votes_run_per_call() {
        let brain = Arc::new(MockBrain::new());
        let c = MajorityClassifier::new(brain.clone(), &ClassifierConfig::default());
        assert!(c.is_main_content("Show/01.mkv").await);
        assert_eq!(brain.classify_calls().await, 3);
    }

    #[tokio::test]
    async fn test_extension_classifier() {
        let c = ExtensionClassifier;
        assert!(c.is_main_content("Show/Show - 01.mkv").await);
        assert!(c.is_main_content("Show/Show - 01.zh-CN.ASS").await);
        assert!(!c.is_main_content("Show/Show - 01 sample.mkv").await);
        assert!(!c.is_main_content("Show/Extras/NCOP1.mkv").await);
        assert!(!c.is_main_content("Show/cover.jpg").await);
        assert!(!c.is_main_content("README").await);
    }
}
