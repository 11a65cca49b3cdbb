//! Prompt-driven implementation of the media judgments.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::llm::{CompletionRequest, LlmClient};
use crate::metrics::LLM_TOKENS;
use super::{AiError, MediaBrain};

const SYSTEM_PROMPT: &str =
    "You are an assistant that analyses anime and TV release titles and file names.";

/// Attempts per request before giving up on the transport.
const TRANSPORT_ATTEMPTS: u32 = 3;

/// Attempts per question before accepting "no answer".
const ANSWER_ATTEMPTS: u32 = 2;

/// `MediaBrain` backed by an LLM. Every answer is validated before use.
pub struct LlmBrain {
    client: Option<Arc<dyn LlmClient>>,
    max_tokens: u32,
    retry_delay: Duration,
}

impl LlmBrain {
    /// Create a brain. `None` means the LLM is disabled.
    pub fn new(client: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            client,
            max_tokens: 512,
            retry_delay: Duration::from_secs(1),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Base delay between transport retries (grows linearly per attempt).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    async fn ask(&self, prompt: String) -> Result<String, AiError> {
        let client = self.client.as_ref().ok_or(AiError::NotConfigured)?;

        let mut last_error = None;
        for attempt in 0..TRANSPORT_ATTEMPTS {
            let request = CompletionRequest::new(prompt.clone())
                .with_system(SYSTEM_PROMPT)
                .with_max_tokens(self.max_tokens)
                .with_temperature(0.1);

            match client.complete(request).await {
                Ok(response) => {
                    LLM_TOKENS
                        .with_label_values(&[client.provider(), "input"])
                        .inc_by(response.usage.input_tokens as u64);
                    LLM_TOKENS
                        .with_label_values(&[client.provider(), "output"])
                        .inc_by(response.usage.output_tokens as u64);
                    return Ok(response.text);
                }
                Err(e) => {
                    warn!(
                        provider = client.provider(),
                        attempt = attempt + 1,
                        error = %e,
                        "LLM request failed"
                    );
                    last_error = Some(e);
                }
            }

            if attempt + 1 < TRANSPORT_ATTEMPTS {
                tokio::time::sleep(self.retry_delay * (attempt + 1)).await;
            }
        }

        Err(match last_error {
            Some(e) => AiError::Llm(e),
            None => AiError::NotConfigured,
        })
    }

    /// Ask up to `ANSWER_ATTEMPTS` times until `parse` accepts the answer.
    async fn ask_until<T, F>(&self, prompt: String, parse: F) -> Option<T>
    where
        F: Fn(&str) -> Option<T>,
    {
        for _ in 0..ANSWER_ATTEMPTS {
            match self.ask(prompt.clone()).await {
                Ok(text) => {
                    if let Some(value) = parse(&text) {
                        return Some(value);
                    }
                    debug!(response = %text, "LLM answer rejected");
                }
                Err(AiError::NotConfigured) => return None,
                Err(_) => continue,
            }
        }
        None
    }
}

#[async_trait]
impl MediaBrain for LlmBrain {
    fn name(&self) -> &str {
        "llm"
    }

    async fn classify_is_main_content(&self, path: &str) -> Result<bool, AiError> {
        let text = self.ask(main_content_prompt(path)).await?;
        parse_main_content(&text)
    }

    async fn extract_episode(&self, text: &str) -> Option<u32> {
        self.ask_until(episode_prompt(text), parse_episode).await
    }

    async fn extract_season(&self, text: &str) -> Option<u32> {
        self.ask_until(season_prompt(text), parse_season).await
    }

    async fn extract_name(&self, text: &str) -> Option<String> {
        self.ask_until(name_prompt(text), parse_name).await
    }
}

fn main_content_prompt(path: &str) -> String {
    format!(
        r#"Decide whether this file is a main episode/movie video, or a subtitle for one.

<path>{path}</path>

Answer "yes" when the file is main content and "no" when it is a trailer,
interview, bonus, sample, screenshot or other non-essential file.

Criteria:
1. Video extensions (.mkv, .mp4, .avi, .ts, ...) whose name does not contain
   "sample", "trailer" or "preview" are most likely main content.
2. Subtitle extensions (.ass, .srt, .ssa, ...) whose name matches a main video
   are main content.
3. .nfo, .txt, .jpg, .png and other non-video, non-subtitle files are not.
4. Files under folders such as "Samples", "Trailers", "Extras" or "SP" are
   probably not main content.
5. Specials and bonus episodes are not main content.

Put the answer inside <result></result>, for example <result>yes</result>."#
    )
}

fn episode_prompt(title: &str) -> String {
    format!(
        r#"<title>{title}</title>

Extract the episode number from the title above, if there is one.
Put it inside <episode></episode>, for example <episode>12</episode>.
If there is no episode number, or the release is an OVA or special, answer <episode>null</episode>."#
    )
}

fn season_prompt(title: &str) -> String {
    format!(
        r#"Extract the season number from this title, if there is one.
Answer with the number only, for example: 2
If it is the first season or no season is mentioned, answer null.
If several season numbers are possible, answer the most likely one.

Title: {title}"#
    )
}

fn name_prompt(title: &str) -> String {
    format!(
        r#"<title>{title}</title>

The title above is a release or file name. It may contain the release group,
the show name, a date, the episode, the season and quality tags.
Work out which part is the name of the show, then answer with that name inside
<name></name>. If no name can be found, answer <name>null</name>."#
    )
}

/// Content between the first `<tag>` and the following `</tag>`.
fn extract_tag<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let len = text[start..].find(&close)?;
    Some(text[start..start + len].trim())
}

fn parse_main_content(text: &str) -> Result<bool, AiError> {
    let answer = extract_tag(text, "result")
        .ok_or_else(|| AiError::InvalidResponse("missing <result> tag".to_string()))?;
    Ok(answer.eq_ignore_ascii_case("yes"))
}

fn parse_episode(text: &str) -> Option<u32> {
    let value = extract_tag(text, "episode")?;
    if value.eq_ignore_ascii_case("null") {
        return None;
    }
    value.parse::<u32>().ok().filter(|n| *n > 0 && *n < 1000)
}

fn parse_season(text: &str) -> Option<u32> {
    let value = text.trim();
    if value.eq_ignore_ascii_case("null") {
        return None;
    }
    value.parse::<u32>().ok().filter(|n| *n > 0 && *n < 100)
}

fn parse_name(text: &str) -> Option<String> {
    let value = extract_tag(text, "name")?;
    if value.is_empty() || value.eq_ignore_ascii_case("null") {
        return None;
    }
    Some(value.to_string())
}
