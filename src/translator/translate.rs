//! Natural-language to [`Command`] translation with strict output validation.

use crate::config::AIConfig;
use crate::error::TranslateError;
use crate::translator::llm::{LLMClient, LLMProvider};
use crate::translator::prompt::build_messages;
use crate::translator::types::{Action, Command, CommandOutcome, CommandValue};
use async_trait::async_trait;
use std::time::Duration;

/// Anything that can turn user text into a command outcome.
#[async_trait]
pub trait Translate: Send + Sync {
    async fn translate(&self, user_text: &str) -> Result<CommandOutcome, TranslateError>;
}

/// LLM-backed translator. One call per request, bounded by `timeout`, no retries.
pub struct CommandTranslator {
    provider: Box<dyn LLMProvider>,
    timeout: Duration,
}

impl CommandTranslator {
    pub fn new(provider: Box<dyn LLMProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Build from the `[ai]` config section using `default_llm`.
    pub fn from_config(config: &AIConfig) -> Result<Self, TranslateError> {
        let provider = LLMClient::new(config.clone())
            .get_default_llm()
            .map_err(TranslateError::NotConfigured)?;
        tracing::info!(
            "Command translator using {}:{} (timeout {}s)",
            provider.name(),
            provider.model(),
            config.timeout_seconds
        );
        Ok(Self::new(provider, config.timeout()))
    }
}

#[async_trait]
impl Translate for CommandTranslator {
    async fn translate(&self, user_text: &str) -> Result<CommandOutcome, TranslateError> {
        let messages = build_messages(user_text);

        let response = tokio::time::timeout(self.timeout, self.provider.complete(&messages))
            .await
            .map_err(|_| TranslateError::Timeout(self.timeout))?
            .map_err(TranslateError::Provider)?;

        tracing::debug!(
            "LLM {} answered with {} tokens: {}",
            response.model,
            response.usage.total_tokens,
            truncate(&response.content, 200)
        );

        parse_command(&response.content)
    }
}

/// Validate raw model output.
///
/// Code fences are stripped, then the text must parse as a JSON object. `{}`
/// is the unsupported sentinel; any other object must carry a non-empty
/// `action` naming a known action, otherwise it is also treated as
/// unsupported.
pub fn parse_command(raw: &str) -> Result<CommandOutcome, TranslateError> {
    let text = strip_code_fence(raw);

    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| TranslateError::InvalidResponse(format!("not JSON ({})", e)))?;

    let object = value.as_object().ok_or_else(|| {
        TranslateError::InvalidResponse(format!("expected a JSON object, got {}", kind_of(&value)))
    })?;

    if object.is_empty() {
        return Ok(CommandOutcome::Unsupported);
    }

    let action_name = match object.get("action").and_then(|a| a.as_str()) {
        Some(name) if !name.trim().is_empty() => name.trim(),
        _ => {
            tracing::warn!("LLM output has no usable action field: {}", truncate(text, 200));
            return Ok(CommandOutcome::Unsupported);
        }
    };

    let Some(action) = Action::parse(action_name) else {
        tracing::warn!("LLM proposed unsupported action '{}'", action_name);
        return Ok(CommandOutcome::Unsupported);
    };

    let value = match object.get("value") {
        None => CommandValue::Empty,
        Some(v) => serde_json::from_value(v.clone())
            .unwrap_or_else(|_| CommandValue::Other(v.clone())),
    };

    Ok(CommandOutcome::Actionable(Command::new(action, value)))
}

/// Remove a surrounding ``` / ```json fence, if any.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json"), whether or not a newline follows it.
    let body = rest
        .trim_start_matches([' ', '\t'])
        .trim_start_matches(|c: char| c.is_ascii_alphabetic());
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

pub(crate) fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::types::{LLMMessage, LLMResponse, TokenUsage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CannedProvider {
        reply: Result<String, String>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LLMProvider for CannedProvider {
        async fn complete(&self, _messages: &[LLMMessage]) -> Result<LLMResponse, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.reply.clone().map(|content| LLMResponse {
                content,
                model: "canned".to_string(),
                usage: TokenUsage::default(),
            })
        }

        fn name(&self) -> &str {
            "canned"
        }

        fn model(&self) -> &str {
            "canned"
        }
    }

    fn translator(reply: Result<&str, &str>, delay: Duration) -> (CommandTranslator, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CannedProvider {
            reply: reply.map(str::to_string).map_err(str::to_string),
            delay,
            calls: Arc::clone(&calls),
        };
        (
            CommandTranslator::new(Box::new(provider), Duration::from_secs(15)),
            calls,
        )
    }

    #[test]
    fn test_parse_plain_command() {
        let outcome = parse_command(r#"{"action": "open_url", "value": "youtube.com"}"#).unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Actionable(Command::new(
                Action::OpenUrl,
                CommandValue::Text("youtube.com".to_string())
            ))
        );
    }

    #[test]
    fn test_parse_fenced_command() {
        let raw = "```json\n{\"action\": \"scroll\", \"value\": 300}\n```";
        let outcome = parse_command(raw).unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Actionable(Command::new(Action::Scroll, CommandValue::Amount(300)))
        );

        let bare_fence = "```\n{}\n```";
        assert_eq!(parse_command(bare_fence).unwrap(), CommandOutcome::Unsupported);
    }

    #[test]
    fn test_parse_single_line_fence() {
        let expected = CommandOutcome::Actionable(Command::new(
            Action::OpenUrl,
            CommandValue::Text("youtube.com".to_string()),
        ));
        for raw in [
            "```json {\"action\": \"open_url\", \"value\": \"youtube.com\"}```",
            "```json{\"action\": \"open_url\", \"value\": \"youtube.com\"}```",
            "```{\"action\": \"open_url\", \"value\": \"youtube.com\"}```",
            "```{\"action\": \"open_url\", \"value\": \"youtube.com\"}\n```",
        ] {
            assert_eq!(parse_command(raw).unwrap(), expected, "{}", raw);
        }
        assert_eq!(parse_command("```json {}```").unwrap(), CommandOutcome::Unsupported);
    }

    #[test]
    fn test_empty_object_is_sentinel() {
        assert_eq!(parse_command("{}").unwrap(), CommandOutcome::Unsupported);
        assert_eq!(parse_command("  { }  ").unwrap(), CommandOutcome::Unsupported);
    }

    #[test]
    fn test_missing_or_blank_action_is_sentinel() {
        for raw in [
            r#"{"value": "youtube.com"}"#,
            r#"{"action": "", "value": 1}"#,
            r#"{"action": 42}"#,
            r#"{"action": "fly_to_moon", "value": null}"#,
        ] {
            assert_eq!(parse_command(raw).unwrap(), CommandOutcome::Unsupported, "{}", raw);
        }
    }

    #[test]
    fn test_non_json_is_an_error() {
        let err = parse_command("Sure! I will open YouTube for you.").unwrap_err();
        assert!(matches!(err, TranslateError::InvalidResponse(_)));
    }

    #[test]
    fn test_non_object_is_an_error() {
        let err = parse_command(r#"["open_url", "youtube.com"]"#).unwrap_err();
        match err {
            TranslateError::InvalidResponse(msg) => assert!(msg.contains("an array")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_type_command_value() {
        let outcome = parse_command(
            r#"{"action": "type", "value": {"selector": "input[name=q]", "text": "rust"}}"#,
        )
        .unwrap();
        match outcome {
            CommandOutcome::Actionable(cmd) => {
                assert_eq!(cmd.action, Action::Type);
                assert_eq!(
                    cmd.value,
                    CommandValue::Input {
                        selector: "input[name=q]".to_string(),
                        text: "rust".to_string()
                    }
                );
            }
            CommandOutcome::Unsupported => panic!("expected a command"),
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[tokio::test]
    async fn test_translate_calls_provider_once() {
        let (translator, calls) =
            translator(Ok(r#"{"action": "close_tab", "value": null}"#), Duration::ZERO);
        let outcome = translator.translate("close this tab").await.unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Actionable(Command::new(Action::CloseTab, CommandValue::Empty))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_retried() {
        let (translator, calls) = translator(Err("HTTP 503: overloaded"), Duration::ZERO);
        let err = translator.translate("open youtube").await.unwrap_err();
        assert_eq!(err, TranslateError::Provider("HTTP 503: overloaded".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let (translator, _calls) = translator(Ok("{}"), Duration::from_secs(60));
        let err = translator.translate("open youtube").await.unwrap_err();
        assert_eq!(err, TranslateError::Timeout(Duration::from_secs(15)));
    }
}
