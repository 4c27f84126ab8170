use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reply when no FAQ entry clears the relevance threshold.
pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't find a specific answer to your question in our FAQ. \
For more help, please contact our customer support team.";

/// Reply when the language model cannot be reached.
pub const APOLOGY_REPLY: &str = "Sorry, I'm having trouble connecting to my brain right now. Please try again later.";

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Turns a matched FAQ answer into the chat reply.
pub enum Paraphraser {
    /// Hand back the FAQ answer as stored.
    Passthrough,
    Gemini(GeminiClient),
}

impl Paraphraser {
    /// Gemini when `GOOGLE_API_KEY` is set, passthrough otherwise.
    pub fn from_env() -> Result<Self> {
        match std::env::var("GOOGLE_API_KEY") {
            Ok(key) if !key.trim().is_empty() => {
                let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string());
                let base_url = std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.to_string());
                Ok(Paraphraser::Gemini(GeminiClient::new(key, model, base_url)?))
            }
            _ => {
                tracing::warn!("GOOGLE_API_KEY not set, replying with raw faq answers");
                Ok(Paraphraser::Passthrough)
            }
        }
    }

    /// Never fails: model errors are logged and answered with [`APOLOGY_REPLY`].
    pub async fn paraphrase(&self, question: &str, answer: &str) -> String {
        match self {
            Paraphraser::Passthrough => answer.to_string(),
            Paraphraser::Gemini(client) => match client.generate(&support_prompt(question, answer)).await {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(error = %format!("{err:#}"), "gemini request failed");
                    APOLOGY_REPLY.to_string()
                }
            },
        }
    }
}

pub fn support_prompt(question: &str, answer: &str) -> String {
    format!(
        "You are a friendly and helpful e-commerce customer support chatbot.\n\
         A customer has asked the following question: \"{question}\"\n\n\
         Use the following information from our FAQ to answer the customer's question:\n\
         \"{answer}\"\n\n\
         If the provided information doesn't directly answer the question, say that you don't have \
         enough information to answer and suggest they contact customer support.\n\
         Keep your answer concise and conversational."
    )
}

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("build http client")?;
        Ok(Self { http, base_url: base_url.into(), model: model.into(), api_key: api_key.into() })
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url.trim_end_matches('/'), self.model);
        let body = GenerateRequest { contents: [Content { parts: [Part { text: prompt }] }] };
        let resp: GenerateResponse = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("send generateContent request")?
            .error_for_status()?
            .json()
            .await
            .context("decode generateContent response")?;
        resp.candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text.filter(|t| !t.trim().is_empty()))
            .ok_or_else(|| anyhow!("gemini returned no text"))
    }
}
