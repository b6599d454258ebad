//! Extraction-provider client for an OpenAI-compatible vision API.
//!
//! The image goes out as a base64 data URL on a chat-completion request; the
//! model answers with JSON (sometimes wrapped in prose, which the engine's
//! reconciler tolerates). Correction requests re-send the parsed data plus
//! the discrepancy messages and ask for a repaired object.

use std::future::Future;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use engine::{EngineError, ExtractionProvider, Receipt};
use serde::Deserialize;
use serde_json::json;

const EXTRACTION_PROMPT: &str = "Analyze this receipt and provide the following details in a JSON format:\n\
1. Store name (merchantName)\n\
2. List of items purchased with their prices\n\
3. Subtotal, tax, and total amounts\n\
4. Any additional fees like tips, service charges, healthcare surcharges, etc. should be included in an array called 'otherFees' with each fee having a 'name' and 'amount' property. Do not create separate fields for these fees.\n\
\n\
Make sure to format numbers as actual numbers, not strings. Ensure that the sum of item prices equals the subtotal, and that subtotal + tax + other fees equals the total.";

const RETRY_EMPHASIS: &str = "IMPORTANT: Previous attempt had calculation errors. Please ensure all numbers add up correctly. The sum of item prices MUST equal the subtotal, and subtotal + tax + other fees MUST equal the total.";

const CORRECTION_SYSTEM: &str = "You are a receipt analysis expert. Your task is to correct discrepancies in receipt data.";

/// Connection settings for the vision API.
#[derive(Clone, Debug)]
pub struct VisionConfig {
    /// API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: String,
    /// Vision-capable model used for extraction.
    pub model: String,
    /// Model used for the text-only correction pass.
    pub correction_model: String,
    pub max_tokens: u32,
}

impl VisionConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: "gpt-4o".to_string(),
            correction_model: "gpt-4".to_string(),
            max_tokens: 4096,
        }
    }
}

/// Reqwest-backed [`ExtractionProvider`].
#[derive(Clone, Debug)]
pub struct VisionClient {
    config: VisionConfig,
    http: reqwest::Client,
}

impl VisionClient {
    #[must_use]
    pub fn new(config: VisionConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    async fn chat(
        &self,
        model: &str,
        messages: serde_json::Value,
        max_tokens: u32,
    ) -> Result<String, EngineError> {
        let endpoint = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": max_tokens,
        });

        let res = self
            .http
            .post(endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| EngineError::Provider(err.to_string()))?;

        if !res.status().is_success() {
            return Err(EngineError::Provider(format!(
                "provider returned {}",
                res.status()
            )));
        }

        let completion: ChatCompletion = res
            .json()
            .await
            .map_err(|err| EngineError::Provider(err.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| EngineError::Provider("empty completion".to_string()))
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl ExtractionProvider for VisionClient {
    fn extract(
        &self,
        image: &[u8],
        retry_hint: bool,
    ) -> impl Future<Output = Result<String, EngineError>> + Send {
        let encoded = STANDARD.encode(image);
        let prompt = if retry_hint {
            format!("{EXTRACTION_PROMPT}\n\n{RETRY_EMPHASIS}")
        } else {
            EXTRACTION_PROMPT.to_string()
        };

        async move {
            let messages = json!([{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:image/jpeg;base64,{encoded}") }
                    },
                ],
            }]);
            self.chat(&self.config.model, messages, self.config.max_tokens)
                .await
        }
    }

    fn correct(
        &self,
        candidate: &Receipt,
        discrepancies: &[String],
    ) -> impl Future<Output = Result<String, EngineError>> + Send {
        let data = serde_json::to_string_pretty(candidate).unwrap_or_default();
        let prompt = format!(
            "I've analyzed a receipt and found some discrepancies:\n\n\
{}\n\n\
Here's the current parsed data:\n\
{}\n\n\
Please correct the data to resolve these discrepancies. Focus on:\n\
1. Checking if any items are missing or have incorrect prices\n\
2. Verifying if there are additional fees not captured\n\
3. Ensuring the subtotal is the sum of all item prices\n\
4. Ensuring the total equals subtotal + tax + other fees\n\n\
Return only the corrected JSON object.",
            discrepancies.join("\n"),
            data,
        );

        async move {
            let messages = json!([
                { "role": "system", "content": CORRECTION_SYSTEM },
                { "role": "user", "content": prompt },
            ]);
            self.chat(&self.config.correction_model, messages, 2000)
                .await
        }
    }
}
