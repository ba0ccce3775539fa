use crate::config::{InferenceSettings, INFERENCE_API_VERSION};
use crate::errors::ExtractionError;
use crate::image::ImageRef;
use crate::json_recovery;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument};

/// Payload returned when the endpoint answered but sent no text.
pub const EMPTY_RESPONSE_MARKER: &str = "Empty response from inference service";

/// Everything sent to the inference endpoint for one run.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    images: &'a [ImageRef],
    schema_prompt: &'a str,
}

impl<'a> ExtractionRequest<'a> {
    pub fn new(images: &'a [ImageRef], schema_prompt: &'a str) -> Result<Self, ExtractionError> {
        if images.is_empty() {
            return Err(ExtractionError::NoImages);
        }
        Ok(Self {
            images,
            schema_prompt,
        })
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// One image part per screenshot, in order, followed by the schema prompt.
    pub fn to_payload(&self, model: &str, max_tokens: u32) -> Value {
        let mut content: Vec<Value> = self
            .images
            .iter()
            .map(|image| {
                json!({
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": image.media_type.as_str(),
                        "data": image.data,
                    },
                })
            })
            .collect();
        content.push(json!({"type": "text", "text": self.schema_prompt}));

        json!({
            "model": model,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": content}],
        })
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Client for the vision inference endpoint. Performs no retries.
#[derive(Clone)]
pub struct ExtractionClient {
    client: reqwest::Client,
    settings: InferenceSettings,
}

impl ExtractionClient {
    pub fn new(settings: InferenceSettings) -> Self {
        Self::with_client(reqwest::Client::new(), settings)
    }

    pub fn with_client(client: reqwest::Client, settings: InferenceSettings) -> Self {
        Self { client, settings }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'))
    }

    /// Sends all screenshots in one call and recovers a JSON record from
    /// the reply.
    ///
    /// Transport failures, timeouts and non-success statuses are errors. A
    /// reply that cannot be parsed is returned as `Ok` with an error marker.
    #[instrument(skip_all, fields(images = images.len()))]
    pub async fn extract(
        &self,
        images: &[ImageRef],
        schema_prompt: &str,
    ) -> Result<Value, ExtractionError> {
        let request = ExtractionRequest::new(images, schema_prompt)?;
        let timeout = self.settings.timeout_for(request.image_count());
        info!(
            "Sending {} screenshot(s) to {} for analysis",
            request.image_count(),
            self.settings.model
        );

        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                ExtractionError::Timeout(timeout)
            } else {
                ExtractionError::Transport(e.to_string())
            }
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", INFERENCE_API_VERSION)
            .timeout(timeout)
            .json(&request.to_payload(&self.settings.model, self.settings.max_tokens))
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Inference API error: {} - {}", status.as_u16(), body);
            return Err(ExtractionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: MessagesResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ExtractionError::Timeout(timeout)
            } else {
                ExtractionError::InvalidBody(e.to_string())
            }
        })?;

        let text = body
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .filter(|t| !t.is_empty());

        match text {
            Some(text) => Ok(json_recovery::recover(&text).into_value()),
            None => {
                error!("{}", EMPTY_RESPONSE_MARKER);
                Ok(json!({ "error": EMPTY_RESPONSE_MARKER }))
            }
        }
    }
}
