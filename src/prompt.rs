//! Operator prompts.
//!
//! Anything that may ask the operator a question goes through [`Prompter`]
//! so the bootstrap sequence can run headless and tests can script answers.

use std::io;

pub trait Prompter {
    /// Whether an operator is attached to answer prompts.
    fn is_terminal(&self) -> bool;

    fn prompt(&self, label: &str) -> io::Result<String>;

    /// Prompt without echoing the answer.
    fn password_prompt(&self, label: &str) -> io::Result<String>;
}

/// Prompts on the controlling terminal via `dialoguer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn is_terminal(&self) -> bool {
        console::user_attended()
    }

    fn prompt(&self, label: &str) -> io::Result<String> {
        dialoguer::Input::<String>::new()
            .with_prompt(label)
            .interact_text()
            .map_err(io::Error::other)
    }

    fn password_prompt(&self, label: &str) -> io::Result<String> {
        dialoguer::Password::new()
            .with_prompt(label)
            .interact()
            .map_err(io::Error::other)
    }
}
