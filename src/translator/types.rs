use serde::{Deserialize, Serialize};

/// LLM message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMMessage {
    pub role: String,
    pub content: String,
}

impl LLMMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// LLM response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Browser actions the extension knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    OpenUrl,
    Click,
    Scroll,
    Type,
    Navigate,
    CloseTab,
    PlayVideo,
    SuggestMusic,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::OpenUrl,
        Action::Click,
        Action::Scroll,
        Action::Type,
        Action::Navigate,
        Action::CloseTab,
        Action::PlayVideo,
        Action::SuggestMusic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::OpenUrl => "open_url",
            Action::Click => "click",
            Action::Scroll => "scroll",
            Action::Type => "type",
            Action::Navigate => "navigate",
            Action::CloseTab => "close_tab",
            Action::PlayVideo => "play_video",
            Action::SuggestMusic => "suggest_music",
        }
    }

    pub fn parse(name: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|a| a.as_str() == name)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Argument of a command; its shape depends on the action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CommandValue {
    /// `null`, e.g. for `close_tab`
    #[default]
    Empty,
    /// Scroll offset in pixels
    Amount(i64),
    /// URL, selector, or search text
    Text(String),
    /// Text typed into the element matched by `selector`
    Input { selector: String, text: String },
    /// Anything else the model produced; forwarded untouched
    Other(serde_json::Value),
}

/// A structured, machine-actionable browser instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub action: Action,
    #[serde(default)]
    pub value: CommandValue,
}

impl Command {
    pub fn new(action: Action, value: CommandValue) -> Self {
        Self { action, value }
    }
}

/// Result of translating one utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Actionable(Command),
    /// The model answered `{}`: ambiguous, conversational, or unsupported input.
    Unsupported,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_names_round_trip_through_parse() {
        for action in Action::ALL {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
        assert_eq!(Action::parse("teleport"), None);
    }

    #[test]
    fn test_command_value_shapes() {
        let scroll: Command = serde_json::from_value(json!({"action": "scroll", "value": -300})).unwrap();
        assert_eq!(scroll.value, CommandValue::Amount(-300));

        let typed: Command = serde_json::from_value(
            json!({"action": "type", "value": {"selector": "input[name=q]", "text": "rust"}}),
        )
        .unwrap();
        assert_eq!(
            typed.value,
            CommandValue::Input {
                selector: "input[name=q]".to_string(),
                text: "rust".to_string()
            }
        );

        let close: Command = serde_json::from_value(json!({"action": "close_tab", "value": null})).unwrap();
        assert_eq!(close.value, CommandValue::Empty);

        let missing: Command = serde_json::from_value(json!({"action": "close_tab"})).unwrap();
        assert_eq!(missing.value, CommandValue::Empty);
    }

    #[test]
    fn test_command_serializes_to_wire_shape() {
        let cmd = Command::new(Action::OpenUrl, CommandValue::Text("youtube.com".to_string()));
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({"action": "open_url", "value": "youtube.com"})
        );

        let close = Command::new(Action::CloseTab, CommandValue::Empty);
        assert_eq!(
            serde_json::to_value(&close).unwrap(),
            json!({"action": "close_tab", "value": null})
        );
    }

    #[test]
    fn test_unexpected_value_shape_is_kept() {
        let cmd: Command =
            serde_json::from_value(json!({"action": "scroll", "value": 12.5})).unwrap();
        assert_eq!(cmd.value, CommandValue::Other(json!(12.5)));
    }
}
