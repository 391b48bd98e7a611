use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::prelude::*;

use crate::{ApiSnafu, DeserializeSnafu, EmptyCompletionSnafu, HttpSnafu, Result};

const API_BASE: &str = "https://api.groq.com/openai/v1";
const TEMPERATURE: f32 = 0.8;

/// Chat completion client for Groq's OpenAI compatible endpoint.
#[derive(Debug, Clone)]
pub struct GroqClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    description: &'a str,
    schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl GroqClient {
    pub fn new(http: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            http,
            api_key,
            model,
        }
    }

    /// Sends a single user message and returns the raw content of the first choice.
    /// The model is constrained to `schema`, but callers still validate the result.
    pub async fn complete_json(
        &self,
        prompt: &str,
        schema_name: &str,
        schema_description: &str,
        schema: &Value,
    ) -> Result<String> {
        let endpoint = "chat/completions";
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: schema_name,
                    description: schema_description,
                    schema,
                },
            },
        };

        let response = self
            .http
            .post(format!("{API_BASE}/{endpoint}"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context(HttpSnafu { endpoint })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return ApiSnafu {
                endpoint,
                status: status.as_u16(),
                message,
            }
            .fail();
        }

        let bytes = response.bytes().await.context(HttpSnafu { endpoint })?;
        let completion: ChatCompletionResponse =
            serde_json::from_slice(&bytes).context(DeserializeSnafu { endpoint })?;

        first_content(completion)
    }
}

fn first_content(completion: ChatCompletionResponse) -> Result<String> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .context(EmptyCompletionSnafu)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_content_takes_first_choice() {
        let completion: ChatCompletionResponse = serde_json::from_value(serde_json::json!({
            "choices": [
                {"message": {"role": "assistant", "content": "{\"slots\": []}"}},
                {"message": {"role": "assistant", "content": "ignored"}}
            ]
        }))
        .unwrap();

        assert_eq!(first_content(completion).unwrap(), "{\"slots\": []}");
    }

    #[test]
    fn missing_content_is_an_error() {
        let completion: ChatCompletionResponse =
            serde_json::from_value(serde_json::json!({"choices": []})).unwrap();

        assert!(matches!(
            first_content(completion),
            Err(crate::Error::EmptyCompletion)
        ));
    }

    #[test]
    fn request_carries_json_schema_format() {
        let schema = serde_json::json!({"type": "object"});
        let body = ChatCompletionRequest {
            model: "llama",
            messages: [ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.8,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: "RadioSongSlots",
                    description: "slots",
                    schema: &schema,
                },
            },
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["response_format"]["type"], "json_schema");
        assert_eq!(value["response_format"]["json_schema"]["name"], "RadioSongSlots");
        assert_eq!(value["messages"][0]["role"], "user");
    }
}
