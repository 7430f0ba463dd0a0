//! Narrative collaborator: prompt construction, HTTP client and output
//! sanitization.

use std::sync::LazyLock;

use async_trait::async_trait;
use churnlens_core::ChurnIntent;
use churnlens_enrich::CollaboratorClient;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::NarratorError;

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*```[A-Za-z0-9_-]*\s*$").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static LEADING_BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*\d.)\s]+").expect("valid regex"));

/// Produces a short phrase list from a templated prompt.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(&self, prompt: &str) -> Result<String, NarratorError>;
}

#[derive(Serialize)]
struct SummarizeRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct SummarizeResponse {
    text: String,
}

/// `POST {url}/summarize {"prompt": ".."}` → `{"text": ".."}`.
#[derive(Debug, Clone)]
pub struct HttpNarrator {
    client: CollaboratorClient,
}

impl HttpNarrator {
    #[must_use]
    pub fn new(client: CollaboratorClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Narrator for HttpNarrator {
    async fn narrate(&self, prompt: &str) -> Result<String, NarratorError> {
        let response: SummarizeResponse = self
            .client
            .post_json("summarize", &SummarizeRequest { prompt })
            .await?;
        if response.text.trim().is_empty() {
            return Err(NarratorError::Empty);
        }
        Ok(response.text)
    }
}

/// Builds the phrase-extraction prompt for one narrative section.
///
/// `texts` are the section's evidence reviews, numbered `ID_1..`.
#[must_use]
pub fn build_prompt(class: ChurnIntent, keyword: Option<&str>, texts: &[&str]) -> String {
    let focus = match class {
        ChurnIntent::None => "what reviewers appreciate",
        ChurnIntent::Complaint | ChurnIntent::Confirmed => "the common pain points",
    };

    let mut prompt = format!(
        "You are a data analyst reading customer app reviews.\n\
         From the review list below, extract {focus} as short noun phrases.\n\
         Do not guess or exaggerate anything the reviews do not say.\n\n\
         [Constraints]\n"
    );
    if let Some(keyword) = keyword {
        prompt.push_str(&format!(
            "- Summarize in the context of reviews that mention \"{keyword}\".\n"
        ));
    }
    prompt.push_str(
        "- Output exactly 2 or 3 items.\n\
         - Each item is a short noun phrase (for example \"unhelpful support desk\").\n\
         - Separate items with commas only; no quotes, bullets or numbering.\n\n\
         [Review List]\n",
    );
    for (i, text) in texts.iter().enumerate() {
        prompt.push_str(&format!("ID_{}: {text}\n", i + 1));
    }
    prompt
}

/// Reduces raw narrator output to one clean line: drops markdown fences,
/// surrounding quotes, line breaks, runs of whitespace and a leading bullet
/// or number.
#[must_use]
pub fn sanitize(raw: &str) -> String {
    let without_fences = FENCE_RE.replace_all(raw, "");
    let unquoted = without_fences
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim();
    let one_line = WHITESPACE_RE.replace_all(unquoted, " ");
    LEADING_BULLET_RE
        .replace(one_line.trim(), "")
        .trim()
        .to_owned()
}
