//! Generation configuration passed through to the model gateway.
//!
//! Request bodies may carry a `generation_config` object that replaces the
//! server default for a single call. Only the keys present are set. Numeric
//! values are accepted as JSON numbers or numeric strings. The safety
//! settings are fixed and cannot be overridden.

use serde_json::{Map, Value};

use crate::error::SessionError;

/// Harm categories that receive an explicit threshold on every call.
const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HARASSMENT",
];

/// Per-call generation parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub seed: Option<i64>,
    pub max_output_tokens: Option<u32>,
    pub response_modalities: Option<Vec<String>>,
    /// Tools the model may use (search grounding, datastore retrieval).
    pub tools: Vec<ToolSpec>,
    pub thinking_config: Option<ThinkingConfig>,
    /// System instruction text parts, in order.
    pub system_instruction: Vec<String>,
}

/// A tool made available to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSpec {
    /// Google Search grounding.
    GoogleSearch,
    /// Vertex AI Search datastore retrieval.
    Retrieval {
        /// Full datastore resource name.
        datastore: String,
    },
}

/// Thinking budget for models that expose internal reasoning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkingConfig {
    pub thinking_budget: Option<i32>,
}

/// Safety threshold for one harm category.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SafetySetting {
    pub category: &'static str,
    pub threshold: &'static str,
}

impl GenerationConfig {
    /// Server default: search-grounded, 8k output, 1k thinking budget.
    #[must_use]
    pub fn standard(system_instruction: Option<&str>) -> Self {
        Self {
            temperature: Some(1.0),
            top_p: Some(0.95),
            seed: Some(0),
            max_output_tokens: Some(8192),
            response_modalities: Some(vec!["TEXT".to_string()]),
            tools: vec![ToolSpec::GoogleSearch],
            thinking_config: Some(ThinkingConfig {
                thinking_budget: Some(1024),
            }),
            system_instruction: system_instruction
                .filter(|s| !s.trim().is_empty())
                .map(|s| vec![s.to_string()])
                .unwrap_or_default(),
        }
    }

    /// Parse a client-supplied override object.
    ///
    /// Tool entries of an unrecognised `type` are skipped. A `retrieval`
    /// entry without a datastore and values that cannot be read as numbers
    /// are rejected.
    pub fn from_json(data: &Map<String, Value>) -> Result<Self, SessionError> {
        let mut config = Self::default();

        if let Some(v) = data.get("temperature") {
            config.temperature = Some(float_field("temperature", v)? as f32);
        }
        if let Some(v) = data.get("top_p") {
            config.top_p = Some(float_field("top_p", v)? as f32);
        }
        if let Some(v) = data.get("seed") {
            config.seed = Some(int_field("seed", v)?);
        }
        if let Some(v) = data.get("max_output_tokens") {
            let max = u32::try_from(int_field("max_output_tokens", v)?)
                .map_err(|e| invalid(format!("'max_output_tokens' out of range: {e}")))?;
            config.max_output_tokens = Some(max);
        }
        if let Some(v) = data.get("response_modalities") {
            config.response_modalities = Some(string_list("response_modalities", v)?);
        }

        if let Some(tools) = data.get("tools").filter(|v| is_truthy(v)) {
            let Value::Array(entries) = tools else {
                return Err(invalid("'tools' must be a list"));
            };
            for entry in entries {
                if let Some(tool) = parse_tool(entry)? {
                    config.tools.push(tool);
                }
            }
        }

        if let Some(thinking) = data.get("thinking_config").filter(|v| is_truthy(v)) {
            let Value::Object(thinking) = thinking else {
                return Err(invalid("'thinking_config' must be an object"));
            };
            if let Some(v) = thinking.get("thinking_budget") {
                let budget = i32::try_from(int_field("thinking_budget", v)?)
                    .map_err(|e| invalid(format!("'thinking_budget' out of range: {e}")))?;
                config.thinking_config = Some(ThinkingConfig {
                    thinking_budget: Some(budget),
                });
            }
        }

        if let Some(parts) = data.get("system_instruction").filter(|v| is_truthy(v)) {
            let Value::Array(parts) = parts else {
                return Err(invalid("'system_instruction' must be a list"));
            };
            config.system_instruction = parts
                .iter()
                .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|p| match p.get("content")? {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect();
        }

        Ok(config)
    }

    /// Text of the system instruction parts, in order.
    pub fn instruction_texts(&self) -> impl Iterator<Item = &str> {
        self.system_instruction.iter().map(String::as_str)
    }

    /// Fixed safety settings applied to every call.
    #[must_use]
    pub fn safety_settings() -> Vec<SafetySetting> {
        HARM_CATEGORIES
            .into_iter()
            .map(|category| SafetySetting {
                category,
                threshold: "OFF",
            })
            .collect()
    }
}

fn parse_tool(entry: &Value) -> Result<Option<ToolSpec>, SessionError> {
    let Value::Object(entry) = entry else {
        return Err(invalid("each tool must be an object"));
    };
    match entry.get("type").and_then(Value::as_str) {
        Some("google_search") => Ok(Some(ToolSpec::GoogleSearch)),
        Some("retrieval") => {
            let search = entry
                .get("retrieval")
                .and_then(|r| r.get("vertex_ai_search"))
                .filter(|s| is_truthy(s))
                .ok_or_else(|| invalid("Invalid tool type: retrieval"))?;
            let datastore = search
                .get("datastore")
                .ok_or_else(|| invalid("Missing 'datastore' in vertex_ai_search data."))?;
            let datastore = match datastore {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Ok(Some(ToolSpec::Retrieval { datastore }))
        }
        other => {
            tracing::debug!(tool_type = ?other, "Skipping unsupported tool type");
            Ok(None)
        }
    }
}

/// JSON truthiness: null, false, zero and empty containers are false.
fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn float_field(key: &str, v: &Value) -> Result<f64, SessionError> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| invalid(format!("'{key}' must be a number, got {v}")))
}

fn int_field(key: &str, v: &Value) -> Result<i64, SessionError> {
    let parsed = match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| invalid(format!("'{key}' must be an integer, got {v}")))
}

fn string_list(key: &str, v: &Value) -> Result<Vec<String>, SessionError> {
    let Value::Array(items) = v else {
        return Err(invalid(format!("'{key}' must be a list")));
    };
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(ToString::to_string)
                .ok_or_else(|| invalid(format!("'{key}' entries must be strings")))
        })
        .collect()
}

fn invalid(msg: impl std::fmt::Display) -> SessionError {
    SessionError::InvalidRequest(format!("Invalid generation_config: {msg}"))
}
