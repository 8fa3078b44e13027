//! The English-coach prompts sent with every completion request.

use crate::state::Prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoachRole {
    User,
    Model,
}

impl CoachRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoachRole::User => "user",
            CoachRole::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoachTurn {
    pub role: CoachRole,
    pub text: String,
}

const INSTRUCTION: &str = "English trainer, refine my advanced English!\n\
-Correct & explain my mistakes.\n\
-Offer advanced alternatives.\n\
-Output a maximum of 80 words.";

const FIRST_REQUEST: &str = "Hello, how are you?";

const FIRST_RESPONSE: &str = "Your sentence is grammatically correct! However, depending on the context and desired formality, here are some advanced alternatives:\n\
\"Good morning/afternoon/evening, I hope you are well.\"\n\
\"Great to see you! How's it going?\"\n\
\"Hello! Are you tackling any exciting projects nowadays?\"";

const SECOND_REQUEST: &str = "What are you done?";

const SECOND_RESPONSE: &str = "\"What are you done?\" is grammatically incorrect. The correct way to ask would be \"What have you done?\" or \"What are you doing?\" depending on the context and time frame.\n\
Alternatives in advanced English:\n\
\"What have you accomplished recently?\"\n\
\"What have you been up to lately?\"\n\
\"What progress have you made on [project/task]?\" (Tailored to a specific context)";

/// Few-shot history that precedes a free-form chat message.
pub fn chat_history() -> Vec<CoachTurn> {
    vec![
        CoachTurn {
            role: CoachRole::User,
            text: format!("{INSTRUCTION}\n{FIRST_REQUEST}"),
        },
        CoachTurn {
            role: CoachRole::Model,
            text: FIRST_RESPONSE.to_string(),
        },
        CoachTurn {
            role: CoachRole::User,
            text: format!("{INSTRUCTION}\n{SECOND_REQUEST}"),
        },
        CoachTurn {
            role: CoachRole::Model,
            text: SECOND_RESPONSE.to_string(),
        },
    ]
}

/// Parts of the single instruction block for a structured request.
pub fn structured_parts(text: &str) -> Vec<String> {
    vec![
        format!("{INSTRUCTION}\n{FIRST_REQUEST}"),
        format!("Request: {FIRST_REQUEST}"),
        format!("Response: {FIRST_RESPONSE}"),
        format!("Request: {SECOND_REQUEST}"),
        format!("Response: {SECOND_RESPONSE}"),
        format!("Request: {text}"),
        "Response: ".to_string(),
    ]
}

/// Flatten a prompt into one string for providers without a chat shape.
pub fn flatten(prompt: &Prompt) -> String {
    match prompt {
        Prompt::Structured(text) => structured_parts(text).join("\n"),
        Prompt::Freeform(text) => {
            let mut out = String::new();
            for turn in chat_history() {
                let speaker = match turn.role {
                    CoachRole::User => "User",
                    CoachRole::Model => "Assistant",
                };
                out.push_str(&format!("{speaker}: {}\n\n", turn.text));
            }
            out.push_str(&format!("User: {INSTRUCTION}\n{text}\n\nAssistant:"));
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_alternates_roles_starting_with_user() {
        let history = chat_history();
        assert_eq!(history.len(), 4);
        for (i, turn) in history.iter().enumerate() {
            let expected = if i % 2 == 0 { CoachRole::User } else { CoachRole::Model };
            assert_eq!(turn.role, expected);
        }
    }

    #[test]
    fn structured_block_ends_with_request_and_open_response() {
        let parts = structured_parts("I has a cat");
        assert_eq!(parts[parts.len() - 2], "Request: I has a cat");
        assert_eq!(parts.last().unwrap(), "Response: ");
        assert!(parts[0].starts_with("English trainer"));
        assert!(parts[0].ends_with("80 words.\nHello, how are you?"));
        assert_eq!(parts[1], "Request: Hello, how are you?");
    }

    #[test]
    fn flattened_freeform_ends_with_user_text() {
        let text = flatten(&Prompt::Freeform("What's the weather".into()));
        assert!(text.contains("What's the weather"));
        assert!(text.trim_end().ends_with("Assistant:"));
    }
}
