//! Prompt assembly.

use crate::llm::completion_client::{PromptMessage, PromptRole};

/// Prepend the system instruction to a context window.
#[must_use]
pub fn assemble_prompt(system_instruction: &str, window: Vec<PromptMessage>) -> Vec<PromptMessage> {
    let mut prompt = Vec::with_capacity(window.len() + 1);
    prompt.push(PromptMessage::new(PromptRole::System, system_instruction));
    prompt.extend(window);
    prompt
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn instruction_comes_first_and_window_order_is_kept() {
        let window = vec![
            PromptMessage::new(PromptRole::User, "A"),
            PromptMessage::new(PromptRole::Assistant, "B"),
        ];

        let prompt = assemble_prompt("persona", window.clone());
        assert_eq!(prompt.len(), 3);
        assert_eq!(prompt[0], PromptMessage::new(PromptRole::System, "persona"));
        assert_eq!(&prompt[1..], window.as_slice());
    }

    #[test]
    fn empty_window_yields_instruction_only() {
        let prompt = assemble_prompt("persona", Vec::new());
        assert_eq!(prompt, vec![PromptMessage::new(PromptRole::System, "persona")]);
    }
}
