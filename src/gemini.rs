use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

/// Failure modes of a generation call. `Parse` and `Empty` are raised by
/// the adapter layer after the transport succeeds; only the controller
/// turns any of these into user-visible state.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gemini API error: {0}")]
    Api(String),
    /// The model returned text that is not the expected JSON array shape.
    /// No partial recovery is attempted; retrying the same prompt against
    /// a persistent formatting bug would not help.
    #[error("unparseable model output: {0}")]
    Parse(String),
    /// Valid response, but nothing usable after filtering. Recoverable:
    /// the caller presents an empty state.
    #[error("no usable questions in response")]
    Empty,
    #[error("storage error: {0}")]
    Store(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// One generateContent call. No internal retry: a rejection returns
    /// the session to idle and the user decides whether to try again.
    pub async fn generate(
        &self,
        system: &str,
        prompt: &str,
        temperature: f64,
        top_p: f64,
    ) -> Result<String, GenerateError> {
        let body = json!({
            "systemInstruction": {
                "parts": [{"text": system}]
            },
            "contents": [{
                "parts": [{"text": prompt}]
            }],
            "generationConfig": {
                "temperature": temperature,
                "topP": top_p
            }
        });

        let url = format!("{}?key={}", GEMINI_URL, self.api_key);

        let resp = self.client.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(GenerateError::Api(format!("{}: {}", status, error_text)));
        }

        let gemini_resp: GeminiResponse = resp.json().await?;

        gemini_resp
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| GenerateError::Api("response contained no candidates".to_string()))
    }
}
