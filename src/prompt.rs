use crate::memory::Turn;
use std::env;
use std::fmt::Write;

/// Context block used when retrieval returns nothing
pub const NO_CONTEXT_PLACEHOLDER: &str = "No relevant text found.";

pub const DEFAULT_PERSONA: &str = "You are DAMON, a Vampire AI assistant.";

const RULES: &str = "CRITICAL RULES:
1. Answer based ONLY on the CONTEXT provided below.
2. Do NOT use Markdown formatting (no asterisks *, no bolding, no headers). Write plain text only.
3. If the user asks \"in one word\" or \"short answer\", OBEY STRICTLY. Do not write a full sentence.";

/// Builds the single prompt sent to the completion service
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    persona: String,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        PromptAssembler::new(DEFAULT_PERSONA)
    }
}

impl PromptAssembler {
    pub fn new(persona: impl Into<String>) -> Self {
        PromptAssembler {
            persona: persona.into(),
        }
    }

    /// Persona from `ASSISTANT_PERSONA`, falling back to the default
    pub fn from_env() -> Self {
        env::var("ASSISTANT_PERSONA")
            .ok()
            .filter(|persona| !persona.trim().is_empty())
            .map(PromptAssembler::new)
            .unwrap_or_default()
    }

    /// Persona, rules, context, history and question, always in that order
    pub fn assemble(&self, context: &[String], history: &[Turn], question: &str) -> String {
        let context_text = if context.is_empty() {
            NO_CONTEXT_PLACEHOLDER.to_string()
        } else {
            context.join("\n")
        };

        let mut history_text = String::new();
        for turn in history {
            // Writing into a String cannot fail
            let _ = writeln!(history_text, "User: {}", turn.user);
            let _ = writeln!(history_text, "Assistant: {}", turn.assistant);
        }

        format!(
            "{}\n\n{}\n\nCONTEXT FROM DOCUMENT:\n{}\n\nPAST CONVERSATION:\n{}\nUSER QUESTION: {}\n",
            self.persona, RULES, context_text, history_text, question
        )
    }
}
