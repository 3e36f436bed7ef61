//! Gemini `generateContent` driver.
//!
//! This module implements [`ModelGateway`] over the Gemini REST API,
//! sending the whole conversation in one non-streaming request.

use serde_json::{Value, json};

use crate::error::GatewayError;
use crate::session::{Role, Turn};

use super::{
    Candidate, GatewayResponse, GatewaySettings, GenerationConfig, ModelGateway, Part, ToolSpec,
};

/// Driver for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiDriver {
    http: reqwest::Client,
    settings: GatewaySettings,
}

impl std::fmt::Debug for GeminiDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiDriver")
            .field("base_url", &self.settings.base_url)
            .field("provider", &self.settings.provider)
            .finish_non_exhaustive()
    }
}

impl GeminiDriver {
    /// Create a new driver with the given settings.
    #[must_use]
    pub fn new(settings: GatewaySettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }
}

#[async_trait::async_trait]
impl ModelGateway for GeminiDriver {
    async fn generate(
        &self,
        model: &str,
        turns: &[Turn],
        config: &GenerationConfig,
    ) -> Result<GatewayResponse, GatewayError> {
        let url = self
            .settings
            .provider
            .build_generate_url(&self.settings.base_url, model);
        let body = build_request_body(turns, config);

        tracing::debug!(url = %url, turn_count = turns.len(), "Sending generateContent request");

        let rb = self.http.post(&url).json(&body);
        let rb = self
            .settings
            .provider
            .authorize(rb, self.settings.api_key.as_deref());

        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        parse_response(&v)
    }
}

/// Build the JSON request body for a conversation.
fn build_request_body(turns: &[Turn], config: &GenerationConfig) -> Value {
    let contents: Vec<Value> = turns
        .iter()
        .map(|t| {
            let role = match t.role() {
                Role::User => "user",
                Role::Model => "model",
            };
            json!({ "role": role, "parts": [{ "text": t.text() }] })
        })
        .collect();

    let mut generation = serde_json::Map::new();
    if let Some(t) = config.temperature {
        generation.insert("temperature".into(), json!(t));
    }
    if let Some(p) = config.top_p {
        generation.insert("topP".into(), json!(p));
    }
    if let Some(seed) = config.seed {
        generation.insert("seed".into(), json!(seed));
    }
    if let Some(max) = config.max_output_tokens {
        generation.insert("maxOutputTokens".into(), json!(max));
    }
    if let Some(modalities) = &config.response_modalities {
        generation.insert("responseModalities".into(), json!(modalities));
    }
    if let Some(budget) = config.thinking_config.and_then(|t| t.thinking_budget) {
        generation.insert("thinkingConfig".into(), json!({ "thinkingBudget": budget }));
    }

    let mut body = json!({
        "contents": contents,
        "generationConfig": generation,
        "safetySettings": GenerationConfig::safety_settings(),
    });

    if !config.tools.is_empty() {
        let tools: Vec<Value> = config
            .tools
            .iter()
            .map(|tool| match tool {
                ToolSpec::GoogleSearch => json!({ "googleSearch": {} }),
                ToolSpec::Retrieval { datastore } => json!({
                    "retrieval": { "vertexAiSearch": { "datastore": datastore } }
                }),
            })
            .collect();
        body["tools"] = Value::Array(tools);
    }

    let instruction: Vec<Value> = config
        .instruction_texts()
        .map(|text| json!({ "text": text }))
        .collect();
    if !instruction.is_empty() {
        body["systemInstruction"] = json!({ "parts": instruction });
    }

    body
}

/// Interpret a `generateContent` response body.
///
/// The text parts of the first candidate become one consolidated text. A
/// prompt-level block reason is reported when no text exists. Anything else
/// is passed on as raw candidates.
fn parse_response(v: &Value) -> Result<GatewayResponse, GatewayError> {
    if !v.is_object() {
        return Err(GatewayError::Malformed(format!(
            "expected a JSON object, got: {v}"
        )));
    }
    if let Some(err) = v.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(GatewayError::Provider(message.to_string()));
    }

    let candidates: Vec<Candidate> = v
        .get("candidates")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(parse_candidate).collect())
        .unwrap_or_default();

    let consolidated: Vec<&str> = candidates
        .first()
        .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
        .unwrap_or_default();
    if !consolidated.is_empty() {
        return Ok(GatewayResponse::Text(consolidated.concat()));
    }

    if let Some(reason) = v
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(Value::as_str)
    {
        return Ok(GatewayResponse::Blocked {
            reason: reason.to_string(),
        });
    }

    Ok(GatewayResponse::Candidates(candidates))
}

fn parse_candidate(c: &Value) -> Candidate {
    let parts = c
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .map(|p| Part {
                    text: p.get("text").and_then(Value::as_str).map(ToString::to_string),
                })
                .collect()
        })
        .unwrap_or_default();
    Candidate { parts }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let turns = vec![Turn::user("Hello"), Turn::model("Hi"), Turn::user("News?")];
        let config = GenerationConfig::standard(Some("Be cheerful."));

        let body = build_request_body(&turns, &config);

        assert_eq!(body["contents"].as_array().unwrap().len(), 3);
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["parts"][0]["text"], "News?");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingBudget"], 1024);
        assert_eq!(body["tools"][0], json!({ "googleSearch": {} }));
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be cheerful.");
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
        assert_eq!(body["safetySettings"][0]["threshold"], "OFF");
    }

    #[test]
    fn test_request_body_minimal_config() {
        let config = GenerationConfig {
            tools: vec![ToolSpec::Retrieval {
                datastore: "ds".to_string(),
            }],
            ..GenerationConfig::default()
        };

        let body = build_request_body(&[Turn::user("q")], &config);

        assert_eq!(body["generationConfig"], json!({}));
        assert_eq!(body["tools"][0]["retrieval"]["vertexAiSearch"]["datastore"], "ds");
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_parse_consolidates_first_candidate_text() {
        let v = json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "Hello, "}, {"text": "world"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        });
        assert_eq!(
            parse_response(&v).unwrap(),
            GatewayResponse::Text("Hello, world".to_string())
        );
    }

    #[test]
    fn test_parse_blocked_prompt() {
        let v = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert_eq!(
            parse_response(&v).unwrap(),
            GatewayResponse::Blocked {
                reason: "SAFETY".to_string()
            }
        );
    }

    #[test]
    fn test_parse_candidates_without_text() {
        let v = json!({ "candidates": [{ "finishReason": "RECITATION" }] });
        assert_eq!(
            parse_response(&v).unwrap(),
            GatewayResponse::Candidates(vec![Candidate::default()])
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_response(&json!([1, 2])),
            Err(GatewayError::Malformed(_))
        ));
        assert!(matches!(
            parse_response(&json!({ "error": { "message": "quota" } })),
            Err(GatewayError::Provider(m)) if m == "quota"
        ));
    }
}
