//! Operator confirmation policies
//!
//! Decisions that used to be interactive y/n prompts are injected as a
//! `ConfirmationPolicy`, so automation and tests never need a terminal.

use std::io::{self, BufRead, Write};

/// Questions the pipeline may put to an operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationPrompt {
    /// Safe mode could not be released; try to create the base path anyway?
    ProceedDespiteProtectiveMode { base_path: String },
    /// Uploads failed; record a local-only fallback configuration?
    EnableLocalMode { attempted: usize, succeeded: usize },
    /// The data directory held no eligible spreadsheets
    NothingToUpload { data_dir: String },
    /// The run stopped before any file was uploaded
    IngestionAborted { reason: String },
}

impl ConfirmationPrompt {
    pub fn question(&self) -> String {
        match self {
            ConfirmationPrompt::ProceedDespiteProtectiveMode { base_path } => format!(
                "HDFS is still in safe mode. Try to create {} anyway?",
                base_path
            ),
            ConfirmationPrompt::EnableLocalMode { attempted, succeeded } => format!(
                "Only {}/{} files reached HDFS. Create a local-mode fallback configuration?",
                succeeded, attempted
            ),
            ConfirmationPrompt::NothingToUpload { data_dir } => format!(
                "No spreadsheets found in {}. Create a local-mode fallback configuration?",
                data_dir
            ),
            ConfirmationPrompt::IngestionAborted { reason } => format!(
                "Ingestion stopped before uploading ({}). Create a local-mode fallback configuration?",
                reason
            ),
        }
    }
}

pub trait ConfirmationPolicy: Send + Sync {
    fn confirm(&self, prompt: &ConfirmationPrompt) -> bool;
}

/// Declines everything. The default for unattended runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AbortPolicy;

impl ConfirmationPolicy for AbortPolicy {
    fn confirm(&self, _prompt: &ConfirmationPrompt) -> bool {
        false
    }
}

/// Accepts everything (`--yes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct ProceedPolicy;

impl ConfirmationPolicy for ProceedPolicy {
    fn confirm(&self, _prompt: &ConfirmationPrompt) -> bool {
        true
    }
}

/// Asks on stdin; anything but `y`/`yes` is a no, as is a closed stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirmation;

impl ConfirmationPolicy for TerminalConfirmation {
    fn confirm(&self, prompt: &ConfirmationPrompt) -> bool {
        print!("{} (y/n): ", prompt.question());
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => false,
            Ok(_) => is_yes(&line),
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_policies() {
        let prompt = ConfirmationPrompt::EnableLocalMode { attempted: 2, succeeded: 1 };
        assert!(!AbortPolicy.confirm(&prompt));
        assert!(ProceedPolicy.confirm(&prompt));
        assert!(prompt.question().contains("1/2"));
    }

    #[test]
    fn test_abort_prompt_names_the_reason() {
        let prompt = ConfirmationPrompt::IngestionAborted {
            reason: "Distributed store unavailable: connection refused".to_string(),
        };
        let question = prompt.question();
        assert!(question.contains("connection refused"));
        assert!(!question.contains("0/0"));

        let empty = ConfirmationPrompt::NothingToUpload {
            data_dir: "data".to_string(),
        };
        assert!(empty.question().contains("No spreadsheets found in data"));
    }

    #[test]
    fn test_terminal_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("n\n"));
        assert!(!is_yes(""));
    }
}
