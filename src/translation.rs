use crate::config::{Config, LANGUAGE_SLOT, XML_DATA_SLOT};
use crate::languages::Language;
use crate::parser::{self, StringEntry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are a world-class translation assistant that understands how native speakers would speak and read their languages.";

/// The provider's most random setting on its 0-2 scale
const TEMPERATURE: f32 = 1.0;

/// Large enough that a full resource file does not come back truncated
const MAX_TOKENS: u32 = 12000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error("translation provider error: {message}")]
    ProviderError {
        status: Option<u16>,
        message: String,
    },
    #[error("translation provider returned no content")]
    EmptyResponse,
}

impl TranslationError {
    fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ProviderError {
            status,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate a batch into `language`, keyed by string name.
    ///
    /// Keys the provider dropped or mangled are simply absent from the result.
    async fn translate_batch(
        &self,
        entries: &[StringEntry],
        language: &Language,
    ) -> Result<BTreeMap<String, String>, TranslationError>;
}

/// OpenAI Chat Completion request
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Translator backed by an OpenAI-compatible chat completions endpoint
pub struct OpenAiTranslator {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    prompt_template: String,
}

impl OpenAiTranslator {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            api_url: config.openai_api_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
            prompt_template: config.prompt_template.clone(),
        }
    }

    fn build_request(&self, entries: &[StringEntry], language: &Language) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: Some(SYSTEM_PROMPT.to_string()),
                },
                Message {
                    role: "user".to_string(),
                    content: Some(build_user_prompt(
                        &self.prompt_template,
                        &parser::render(entries),
                        language.prompt_name,
                    )),
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        }
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, TranslationError> {
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                TranslationError::provider(None, format!("failed to reach OpenAI API: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(TranslationError::provider(
                Some(status.as_u16()),
                format!("OpenAI API error ({}): {}", status, body),
            ));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            TranslationError::provider(None, format!("failed to parse OpenAI response: {}", e))
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(TranslationError::EmptyResponse)
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate_batch(
        &self,
        entries: &[StringEntry],
        language: &Language,
    ) -> Result<BTreeMap<String, String>, TranslationError> {
        if entries.is_empty() {
            return Ok(BTreeMap::new());
        }

        debug!("Translating {} strings into {}", entries.len(), language.name);

        let request = self.build_request(entries, language);
        let reply = self.complete(&request).await?;

        Ok(collect_translations(entries, &reply, language))
    }
}

/// Fill the template's two slots
fn build_user_prompt(template: &str, xml_data: &str, language: &str) -> String {
    template
        .replace(LANGUAGE_SLOT, language)
        .replace(XML_DATA_SLOT, xml_data)
}

/// Keep the reply lines that answer a requested key with a non-empty value
fn collect_translations(
    requested: &[StringEntry],
    reply: &str,
    language: &Language,
) -> BTreeMap<String, String> {
    let wanted: HashSet<&str> = requested.iter().map(|e| e.key.as_str()).collect();
    let mut translations = BTreeMap::new();

    for entry in parser::parse_lenient(reply) {
        if !wanted.contains(entry.key.as_str()) {
            warn!(
                "Ignoring unrequested key '{}' in {} translation",
                entry.key, language.name
            );
            continue;
        }
        if entry.value.is_empty() {
            continue;
        }
        translations.insert(entry.key, entry.value);
    }

    let dropped = wanted.len() - translations.len();
    if dropped > 0 {
        warn!(
            "{} of {} strings missing from {} translation",
            dropped,
            wanted.len(),
            language.name
        );
    }

    translations
}
