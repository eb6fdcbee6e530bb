//! OpenAI-compatible chat completions classifier.
//!
//! Works against any endpoint that speaks `POST {api_base}/chat/completions`
//! (OpenAI, DeepSeek, local proxies).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::{BatchItem, Classifier, EmotionVocabulary, PositionLabel, parse_labels};
use crate::error::ClassifierError;

/// Longest error body kept in [`ClassifierError::Status`].
const MAX_ERROR_BODY: usize = 500;

/// Endpoint, credentials and decoding limits for the classifier.
#[derive(Clone, PartialEq, Eq)]
pub struct ClassifierSettings {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    /// Prompt language (`es` or anything else for English).
    pub language: String,
    /// `max_tokens` for each answer.
    pub max_response_tokens: u32,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            language: "es".to_string(),
            max_response_tokens: 300,
        }
    }
}

impl fmt::Debug for ClassifierSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierSettings")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("language", &self.language)
            .field("max_response_tokens", &self.max_response_tokens)
            .finish()
    }
}

/// Classifier backed by a chat completions endpoint.
///
/// Decoding is deterministic (`temperature = 0`) and the prompt is fixed, so
/// identical batches produce identical requests.
pub struct OpenAiClassifier {
    client: Client,
    settings: ClassifierSettings,
    system_prompt: String,
}

impl OpenAiClassifier {
    /// Creates a classifier for `vocabulary`.
    pub fn new(settings: ClassifierSettings, vocabulary: Arc<EmotionVocabulary>) -> Self {
        let system_prompt = system_prompt(&settings.language, &vocabulary);
        Self {
            client: Client::new(),
            settings,
            system_prompt,
        }
    }

    /// Builds the chat completions request body for a batch.
    pub fn request_body(&self, items: &[BatchItem]) -> Value {
        json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": user_prompt(&self.settings.language, items) },
            ],
            "temperature": 0.0,
            "max_tokens": self.settings.max_response_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.api_base.trim_end_matches('/'))
    }
}

fn is_spanish(language: &str) -> bool {
    language.to_lowercase().starts_with("es")
}

fn system_prompt(language: &str, vocabulary: &EmotionVocabulary) -> String {
    let labels = vocabulary.labels().join(", ");
    let unknown = vocabulary.unknown();
    if is_spanish(language) {
        format!(
            "Eres un sistema de clasificación de emociones en español. \
             Recibirás un bloque de oraciones enumeradas, y tu respuesta debe ser \
             EXCLUSIVAMENTE un objeto JSON con la forma:\n\
             {{ \"1\": \"emoción\", \"2\": \"emoción\", ... }}\n\
             sin texto adicional. Emociones posibles: {labels}. \
             No agregues explicaciones. Si no coincide, usa \"{unknown}\"."
        )
    } else {
        format!(
            "You are an emotion classification system. \
             You will receive a block of numbered sentences, and your answer must be \
             ONLY a JSON object of the form:\n\
             {{ \"1\": \"emotion\", \"2\": \"emotion\", ... }}\n\
             with no extra text. Possible emotions: {labels}. \
             Do not add explanations. If none fits, use \"{unknown}\"."
        )
    }
}

fn user_prompt(language: &str, items: &[BatchItem]) -> String {
    let header = if is_spanish(language) {
        "Clasifica cada oración enumerada en una de las emociones. Devuelve SOLO un JSON."
    } else {
        "Classify each numbered sentence as one of the emotions. Return ONLY JSON."
    };
    let enumerated = items
        .iter()
        .map(|item| format!("{}) {}", item.position, item.text.replace('\n', " ")))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{header}\n\n{enumerated}")
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => body[..idx].to_string(),
        None => body.to_string(),
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, items: &[BatchItem]) -> Result<Vec<PositionLabel>, ClassifierError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&self.request_body(items))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body: truncate(&body),
            });
        }

        let data: Value = response.json().await?;
        if let Some(error) = data.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(ClassifierError::malformed(format!("API error: {message}")));
        }

        let content = data
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ClassifierError::malformed("response missing choices[0].message.content")
            })?;
        tracing::debug!(
            items = items.len(),
            response = %content.chars().take(100).collect::<String>(),
            "Classifier answered"
        );

        parse_labels(content, items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn vocab() -> Arc<EmotionVocabulary> {
        Arc::new(EmotionVocabulary::new(["amor", "ira", "alegría"], "Neutro").unwrap())
    }

    fn settings(base: String) -> ClassifierSettings {
        ClassifierSettings {
            api_key: "sk-test".into(),
            api_base: base,
            ..ClassifierSettings::default()
        }
    }

    fn items() -> Vec<BatchItem> {
        vec![
            BatchItem {
                position: 1,
                text: "te quiero".into(),
            },
            BatchItem {
                position: 2,
                text: "qué rabia".into(),
            },
        ]
    }

    fn completion(content: &str) -> Value {
        json!({
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": content } }
            ]
        })
    }

    #[test]
    fn test_request_body_is_deterministic() {
        let classifier = OpenAiClassifier::new(settings("http://x".into()), vocab());
        let body = classifier.request_body(&items());

        assert_eq!(body["temperature"], json!(0.0));
        assert_eq!(body["max_tokens"], json!(300));
        assert_eq!(body["model"], json!("gpt-3.5-turbo"));
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.ends_with("1) te quiero\n2) qué rabia"));
        let system = body["messages"][0]["content"].as_str().unwrap();
        assert!(system.contains("amor, ira, alegría"));
        assert!(system.contains("\"Neutro\""));
        assert_eq!(body, classifier.request_body(&items()));
    }

    #[test]
    fn test_english_prompt() {
        let mut s = settings("http://x".into());
        s.language = "en".into();
        let classifier = OpenAiClassifier::new(s, vocab());
        let body = classifier.request_body(&items());
        assert!(body["messages"][0]["content"].as_str().unwrap().starts_with("You are"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let s = settings("http://x".into());
        assert!(!format!("{s:?}").contains("sk-test"));
    }

    #[tokio::test]
    async fn test_classify_success() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("authorization", "Bearer sk-test")
                .body_contains("qué rabia");
            then.status(200)
                .json_body(completion("{\"2\": \"ira\", \"1\": \"amor\"}"));
        });

        let classifier = OpenAiClassifier::new(settings(server.base_url()), vocab());
        let labels = classifier.classify(&items()).await.unwrap();

        mock.assert();
        assert_eq!(
            labels,
            vec![PositionLabel::new(1, "amor"), PositionLabel::new(2, "ira")]
        );
    }

    #[tokio::test]
    async fn test_classify_status_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(429).body("slow down");
        });

        let classifier = OpenAiClassifier::new(settings(server.base_url()), vocab());
        let err = classifier.classify(&items()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::Status { status: 429, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_classify_malformed_content() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(completion("lo siento, no puedo"));
        });

        let classifier = OpenAiClassifier::new(settings(server.base_url()), vocab());
        let err = classifier.classify(&items()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_classify_missing_choices() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({ "choices": [] }));
        });

        let classifier = OpenAiClassifier::new(settings(server.base_url()), vocab());
        let err = classifier.classify(&items()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::MalformedResponse(_)));
    }
}
