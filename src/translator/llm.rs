use crate::config::{AIConfig, ApiType, ProviderConfig};
use crate::translator::types::{LLMMessage, LLMResponse, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;

/// LLM Provider trait
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Send a chat completion request
    async fn complete(&self, messages: &[LLMMessage]) -> Result<LLMResponse, String>;

    /// Get provider name
    fn name(&self) -> &str;

    /// Get model name
    fn model(&self) -> &str;
}

async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    format!("HTTP {}: {}", status.as_u16(), text)
}

/// OpenAI-compatible provider (OpenAI, Azure, custom endpoints, etc.)
pub struct OpenAIProvider {
    client: Client,
    config: ProviderConfig,
    model: String,
    provider_id: String,
}

impl OpenAIProvider {
    pub fn new(provider_id: String, config: ProviderConfig, model: String) -> Self {
        Self {
            client: Client::new(),
            config,
            model,
            provider_id,
        }
    }

    fn build_body(&self, messages: &[LLMMessage]) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|msg| {
                serde_json::json!({
                    "role": msg.role,
                    "content": msg.content
                })
            })
            .collect();

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": 256,
            "temperature": 0.0
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn complete(&self, messages: &[LLMMessage]) -> Result<LLMResponse, String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let mut request = self.client.post(&url).json(&self.build_body(messages));

        if let Some(api_key) = self.config.resolve_api_key() {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("OpenAI API error: {}", error_body(response).await));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let usage = TokenUsage {
            prompt_tokens: json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
            total_tokens: json["usage"]["total_tokens"].as_u64().unwrap_or(0) as u32,
        };

        Ok(LLMResponse {
            content,
            model: self.model.clone(),
            usage,
        })
    }

    fn name(&self) -> &str {
        &self.provider_id
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Anthropic provider
pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
    model: String,
    provider_id: String,
}

impl AnthropicProvider {
    pub fn new(provider_id: String, config: ProviderConfig, model: String) -> Self {
        Self {
            client: Client::new(),
            config,
            model,
            provider_id,
        }
    }

    fn build_body(&self, messages: &[LLMMessage]) -> serde_json::Value {
        let mut system_prompt = String::new();
        let mut anthropic_messages = Vec::new();

        for msg in messages {
            if msg.role == "system" {
                system_prompt = msg.content.clone();
            } else {
                anthropic_messages.push(serde_json::json!({
                    "role": msg.role,
                    "content": [{"type": "text", "text": msg.content}]
                }));
            }
        }

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": anthropic_messages,
            "max_tokens": 256,
        });

        if !system_prompt.is_empty() {
            body["system"] = serde_json::Value::String(system_prompt);
        }
        body
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn complete(&self, messages: &[LLMMessage]) -> Result<LLMResponse, String> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));

        let api_key = self
            .config
            .resolve_api_key()
            .ok_or_else(|| "Anthropic API key required".to_string())?;

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&self.build_body(messages))
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Anthropic API error: {}", error_body(response).await));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        let content = json["content"][0]["text"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let input = json["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32;
        let output = json["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32;

        Ok(LLMResponse {
            content,
            model: self.model.clone(),
            usage: TokenUsage {
                prompt_tokens: input,
                completion_tokens: output,
                total_tokens: input + output,
            },
        })
    }

    fn name(&self) -> &str {
        &self.provider_id
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Ollama provider (local)
pub struct OllamaProvider {
    client: Client,
    config: ProviderConfig,
    model: String,
    provider_id: String,
}

impl OllamaProvider {
    pub fn new(provider_id: String, config: ProviderConfig, model: String) -> Self {
        Self {
            client: Client::new(),
            config,
            model,
            provider_id,
        }
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn complete(&self, messages: &[LLMMessage]) -> Result<LLMResponse, String> {
        let url = format!("{}/api/chat", self.config.base_url.trim_end_matches('/'));

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "format": "json"
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Ollama API error: {}", error_body(response).await));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        let content = json["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        // Ollama doesn't provide token counts in the same way
        let usage = TokenUsage {
            prompt_tokens: json["prompt_eval_count"].as_u64().unwrap_or(0) as u32,
            completion_tokens: json["eval_count"].as_u64().unwrap_or(0) as u32,
            total_tokens: 0,
        };

        Ok(LLMResponse {
            content,
            model: self.model.clone(),
            usage,
        })
    }

    fn name(&self) -> &str {
        &self.provider_id
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Google Gemini provider (`generateContent`)
pub struct GoogleProvider {
    client: Client,
    config: ProviderConfig,
    model: String,
    provider_id: String,
}

impl GoogleProvider {
    pub fn new(provider_id: String, config: ProviderConfig, model: String) -> Self {
        Self {
            client: Client::new(),
            config,
            model,
            provider_id,
        }
    }

    fn generate_content_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.contains(":generateContent") {
            return base.replace("{model}", &self.model);
        }
        format!("{}/v1beta/models/{}:generateContent", base, self.model)
    }

    fn build_body(&self, messages: &[LLMMessage]) -> serde_json::Value {
        let system = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let contents: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| {
                let role = if m.role == "assistant" { "model" } else { "user" };
                serde_json::json!({
                    "role": role,
                    "parts": [{"text": m.content}]
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "temperature": 0.0,
                "responseMimeType": "application/json"
            }
        });

        if !system.is_empty() {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{"text": system}]
            });
        }
        body
    }
}

#[async_trait]
impl LLMProvider for GoogleProvider {
    async fn complete(&self, messages: &[LLMMessage]) -> Result<LLMResponse, String> {
        let api_key = self
            .config
            .resolve_api_key()
            .ok_or_else(|| "Google API key required".to_string())?;

        let response = self
            .client
            .post(self.generate_content_url())
            .query(&[("key", api_key.as_str())])
            .json(&self.build_body(messages))
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Gemini API error: {}", error_body(response).await));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        let content = json["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = TokenUsage {
            prompt_tokens: json["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0) as u32,
            completion_tokens: json["usageMetadata"]["candidatesTokenCount"]
                .as_u64()
                .unwrap_or(0) as u32,
            total_tokens: json["usageMetadata"]["totalTokenCount"].as_u64().unwrap_or(0) as u32,
        };

        Ok(LLMResponse {
            content,
            model: self.model.clone(),
            usage,
        })
    }

    fn name(&self) -> &str {
        &self.provider_id
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// LLM Client factory
pub struct LLMClient {
    config: AIConfig,
}

impl LLMClient {
    pub fn new(config: AIConfig) -> Self {
        Self { config }
    }

    /// Create a provider instance with the specified model
    fn create_provider(
        &self,
        provider_id: &str,
        model: &str,
    ) -> Result<Box<dyn LLMProvider>, String> {
        let provider_config = self
            .config
            .providers
            .get(provider_id)
            .ok_or_else(|| format!("Provider '{}' not configured", provider_id))?;

        let needs_key = matches!(
            provider_config.api_type,
            ApiType::Anthropic | ApiType::Google
        );
        if needs_key && provider_config.resolve_api_key().is_none() {
            let hint = provider_config
                .api_key_env
                .as_deref()
                .map(|var| format!(" (set {} or api_key)", var))
                .unwrap_or_default();
            return Err(format!(
                "Provider '{}' requires an API key{}",
                provider_id, hint
            ));
        }

        let provider: Box<dyn LLMProvider> = match provider_config.api_type {
            ApiType::Openai => Box::new(OpenAIProvider::new(
                provider_id.to_string(),
                provider_config.clone(),
                model.to_string(),
            )),
            ApiType::Anthropic => Box::new(AnthropicProvider::new(
                provider_id.to_string(),
                provider_config.clone(),
                model.to_string(),
            )),
            ApiType::Ollama => Box::new(OllamaProvider::new(
                provider_id.to_string(),
                provider_config.clone(),
                model.to_string(),
            )),
            ApiType::Google => Box::new(GoogleProvider::new(
                provider_id.to_string(),
                provider_config.clone(),
                model.to_string(),
            )),
        };

        Ok(provider)
    }

    /// Get the default LLM provider (format: "provider_id:model_name")
    pub fn get_default_llm(&self) -> Result<Box<dyn LLMProvider>, String> {
        let selection = self.config.default_llm.as_ref().ok_or_else(|| {
            "No default LLM configured. Set ai.default_llm in the relay config.".to_string()
        })?;

        // Model names may themselves contain ':' (e.g. "llama3:8b").
        match selection.split_once(':') {
            Some((provider_id, model)) if !provider_id.is_empty() && !model.is_empty() => {
                self.create_provider(provider_id, model)
            }
            _ => Err(format!(
                "Invalid default_llm format '{}'. Expected 'provider_id:model_name'",
                selection
            )),
        }
    }
}
