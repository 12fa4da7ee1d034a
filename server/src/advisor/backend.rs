use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{prompt::ChatMessage, BackendLoader, GenerationParams, InferenceBackend, InferenceError};

/// Talks to a text-generation server exposing the OpenAI chat completions API
/// (vLLM, llama.cpp server, TGI and friends).
#[derive(Clone)]
pub struct OpenAiCompatibleLoader {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

pub struct OpenAiCompatibleBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatibleLoader {
    pub fn new(base_url: &str, api_key: Option<String>, model: &str, timeout: Duration) -> Result<Self, InferenceError> {
        reqwest::Url::parse(base_url)
            .map_err(|err| InferenceError::Load(format!("invalid base url '{base_url}': {err}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InferenceError::Load(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        with_auth(self.client.get(format!("{}{path}", self.base_url)), self.api_key.as_deref())
    }
}

fn with_auth(request: reqwest::RequestBuilder, api_key: Option<&str>) -> reqwest::RequestBuilder {
    match api_key {
        Some(key) => request.bearer_auth(key),
        None => request,
    }
}

#[async_trait]
impl BackendLoader for OpenAiCompatibleLoader {
    /// Checks that the server is up and serves the configured model. Weights are loaded server
    /// side, so this is where the first request pays for a cold start.
    async fn load(&self) -> Result<Arc<dyn InferenceBackend>, InferenceError> {
        let response = self.get("/models")
            .send()
            .await
            .map_err(|err| InferenceError::Load(err.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(|err| InferenceError::Load(err.to_string()))?;
        if !status.is_success() {
            return Err(InferenceError::Load(format!("model listing returned {status}: {text}")));
        }

        let served = served_models(&text)?;
        if !served.iter().any(|id| id == &self.model) {
            return Err(InferenceError::Load(format!("model '{}' is not served, available: {}", self.model, served.join(", "))));
        }

        tracing::debug!(model = %self.model, url = %self.base_url, "Model is served");

        Ok(Arc::new(OpenAiCompatibleBackend {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
        }))
    }
}

#[async_trait]
impl InferenceBackend for OpenAiCompatibleBackend {
    async fn generate(&self, messages: &[ChatMessage], params: &GenerationParams) -> Result<String, InferenceError> {
        let body = completion_body(&self.model, messages, params);

        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = %self.model, url = %url, max_tokens = params.max_new_tokens, "Calling inference backend");

        let response = with_auth(self.client.post(&url), self.api_key.as_deref())
            .json(&body)
            .send()
            .await
            .map_err(|err| InferenceError::Request(err.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(|err| InferenceError::Request(err.to_string()))?;
        if !status.is_success() {
            return Err(InferenceError::Status { status: status.as_u16(), body: text });
        }

        completion_text(&text)
    }
}

fn completion_body(model: &str, messages: &[ChatMessage], params: &GenerationParams) -> Value {
    let mut body = json!({
        "model": model,
        "messages": messages,
        "max_tokens": params.max_new_tokens,
        "temperature": params.temperature,
        "top_p": params.top_p,
        "repetition_penalty": params.repetition_penalty,
    });

    if let Some(eos) = &params.eos_token {
        body["stop"] = json!([eos]);
    }

    body
}

fn served_models(text: &str) -> Result<Vec<String>, InferenceError> {
    let data: Value = serde_json::from_str(text).map_err(|err| InferenceError::Load(format!("bad model listing: {err}")))?;
    let models = data["data"]
        .as_array()
        .ok_or_else(|| InferenceError::Load("model listing has no data".into()))?;

    Ok(models.iter()
        .filter_map(|model| model["id"].as_str())
        .map(str::to_string)
        .collect())
}

fn completion_text(text: &str) -> Result<String, InferenceError> {
    let data: Value = serde_json::from_str(text).map_err(|err| InferenceError::Malformed(err.to_string()))?;
    let choice = data["choices"]
        .get(0)
        .ok_or_else(|| InferenceError::Malformed("no choices in response".into()))?;

    choice["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| InferenceError::Malformed("choice has no text content".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::prompt::Role;

    #[test]
    fn body_carries_sampling_parameters() {
        let messages = [ChatMessage { role: Role::User, content: "hi".into() }];
        let body = completion_body("Qwen/Qwen2.5-7B-Instruct", &messages, &GenerationParams::default());

        assert_eq!(body["model"], "Qwen/Qwen2.5-7B-Instruct");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["top_p"], 0.9);
        assert_eq!(body["repetition_penalty"], 1.1);
        assert_eq!(body["stop"][0], "</s>");

        let no_eos = GenerationParams { eos_token: None, ..Default::default() };
        assert!(completion_body("m", &messages, &no_eos).get("stop").is_none());
    }

    #[test]
    fn reads_first_choice_content() {
        let text = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"電車で行く\n\n30分"}}]}"#;
        assert_eq!(completion_text(text).unwrap(), "電車で行く\n\n30分");
    }

    #[test]
    fn malformed_completions_are_errors() {
        assert!(matches!(completion_text(r#"{"choices":[]}"#), Err(InferenceError::Malformed(_))));
        assert!(matches!(completion_text("not json"), Err(InferenceError::Malformed(_))));
        assert!(matches!(completion_text(r#"{"choices":[{"message":{"content":null}}]}"#), Err(InferenceError::Malformed(_))));
    }

    #[test]
    fn lists_served_model_ids() {
        let models = served_models(r#"{"object":"list","data":[{"id":"a"},{"id":"b"}]}"#).unwrap();
        assert_eq!(models, ["a", "b"]);
        assert!(served_models(r#"{"error":"nope"}"#).is_err());
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(OpenAiCompatibleLoader::new("not a url", None, "m", Duration::from_secs(1)).is_err());
        assert!(OpenAiCompatibleLoader::new("http://localhost:8080/v1/", None, "m", Duration::from_secs(1)).is_ok());
    }
}
