//! OpenAI-backed predictor. Real team names go through the Responses API
//! with web search enabled so the model can check current form; sheets with
//! placeholder names skip the research and use plain Chat Completions with a
//! strict response schema. Rejected payloads are retried with a hint that
//! names what went wrong.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::{MatchRow, Prediction};
use crate::output;
use crate::reconcile::{self, ReconcileError};

use super::prompt::{self, DEGENERATE_HINT, FORMAT_HINT};
use super::Predictor;

/// Request-level knobs, filled from configuration.
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub temperature: f64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub forbid_degenerate: bool,
}

pub struct OpenAiPredictor {
    http: Client,
    api_url: String,
    api_key: String,
    model: String,
    settings: OpenAiSettings,
    /// Raw responses are dumped here for postmortems, when set.
    dump_dir: Option<PathBuf>,
}

impl OpenAiPredictor {
    pub fn new(
        api_url: &str,
        api_key: String,
        model: String,
        settings: OpenAiSettings,
        dump_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(OpenAiPredictor {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            settings,
            dump_dir,
        })
    }

    /// Responses API with the built-in web_search tool.
    async fn call_responses(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "tools": [{ "type": "web_search" }],
            "input": prompt,
            "temperature": self.settings.temperature,
        });
        let resp = self
            .http
            .post(format!("{}/responses", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("OpenAI Responses API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("OpenAI Responses API error {}: {}", status, body);
        }

        let raw: Value = resp
            .json()
            .await
            .context("Failed to parse OpenAI Responses payload")?;
        self.dump("responses", &raw);
        responses_output_text(&raw)
            .context("OpenAI Responses payload carried no output text")
    }

    /// Chat Completions with a strict json_schema response format.
    async fn call_chat(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.settings.temperature,
            "response_format": {
                "type": "json_schema",
                "json_schema": prompt::prediction_schema(),
            },
        });
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("OpenAI Chat API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("OpenAI Chat API error {}: {}", status, body);
        }

        let raw: Value = resp
            .json()
            .await
            .context("Failed to parse OpenAI Chat payload")?;
        self.dump("chat", &raw);
        raw["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .context("OpenAI Chat payload carried no message content")
    }

    fn dump(&self, kind: &str, raw: &Value) {
        if let Some(dir) = &self.dump_dir {
            if let Err(e) = output::write_json(dir, &format!("openai_{kind}"), raw) {
                warn!("Failed to dump raw {kind} response: {e:#}");
            }
        }
    }
}

#[async_trait]
impl Predictor for OpenAiPredictor {
    fn name(&self) -> &str {
        "openai"
    }

    async fn predict(&self, rows: &[MatchRow], matchday: u32) -> Result<Vec<Prediction>> {
        // Research is pointless against "Heim"/"Gast" placeholders.
        let research = !rows.iter().any(MatchRow::has_placeholder_teams);
        let base_prompt = prompt::build_research_prompt(rows, matchday);
        let mut hint: Option<&str> = None;

        for attempt in 1..=self.settings.max_retries {
            let prompt_text = match hint {
                Some(h) => format!("{base_prompt}\n\n{h}"),
                None => base_prompt.clone(),
            };

            info!(
                attempt,
                model = %self.model,
                research,
                "Requesting predictions for matchday {matchday}"
            );
            let text = if research {
                match self.call_responses(&prompt_text).await {
                    Ok(t) => t,
                    Err(e) => {
                        warn!("Responses API failed, falling back to Chat: {e:#}");
                        self.call_chat(&prompt_text).await?
                    }
                }
            } else {
                self.call_chat(&prompt_text).await?
            };

            let Some(payload) = extract_json_payload(&text) else {
                warn!(attempt, "Model reply contained no JSON payload");
                hint = Some(FORMAT_HINT);
                continue;
            };

            match reconcile::validate_predictions(
                &payload,
                rows,
                matchday,
                self.settings.forbid_degenerate,
            ) {
                Ok(predictions) => {
                    debug!(count = predictions.len(), "Predictions accepted");
                    return Ok(predictions);
                }
                Err(e @ ReconcileError::Degenerate { .. }) => {
                    warn!(attempt, "Predictions rejected: {e}");
                    hint = Some(DEGENERATE_HINT);
                }
                Err(e) => {
                    warn!(attempt, "Predictions rejected: {e}");
                    hint = Some(FORMAT_HINT);
                }
            }
        }

        bail!(
            "No valid predictions after {} attempts",
            self.settings.max_retries
        )
    }
}

/// Collect the assistant text out of a Responses API payload.
fn responses_output_text(raw: &Value) -> Option<String> {
    if let Some(text) = raw["output_text"].as_str() {
        return Some(text.to_string());
    }
    let items = raw["output"].as_array()?;
    let mut text = String::new();
    for item in items {
        if item["type"].as_str() != Some("message") {
            continue;
        }
        for part in item["content"].as_array().into_iter().flatten() {
            if part["type"].as_str() == Some("output_text") {
                if let Some(t) = part["text"].as_str() {
                    text.push_str(t);
                }
            }
        }
    }
    (!text.is_empty()).then_some(text)
}

/// Pull the first JSON array or object out of free-form model text. Handles
/// fenced code blocks and prose around the payload; brackets inside JSON
/// strings do not confuse the scan.
pub fn extract_json_payload(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }

    let bytes = trimmed.as_bytes();
    let start = trimmed.find(['[', '{'])?;
    let (open, close) = if bytes[start] == b'[' {
        (b'[', b']')
    } else {
        (b'{', b'}')
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return serde_json::from_str(&trimmed[start..=i]).ok();
                }
            }
            _ => {}
        }
    }
    None
}
