// src/decision.rs

//! Decisions that would otherwise need a prompt
//!
//! The orchestrator and step executor never read from a terminal. Whenever a
//! run could reasonably go either way they ask a [`DecisionProvider`], which
//! makes every run reproducible in tests and scripts.

use std::io::{self, BufRead, IsTerminal, Write};
use strum_macros::Display;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum QuestionKind {
    /// The backup could not be created
    ContinueWithoutBackup,
    /// A step failed; go on with the next one?
    ContinueAfterFailure,
    /// Conflicts need manual work; install anyway?
    ProceedWithManualConflicts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub kind: QuestionKind,
    pub prompt: String,
    /// Answer used when nobody is asked
    pub default: bool,
}

impl Question {
    pub fn new(kind: QuestionKind, prompt: impl Into<String>, default: bool) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
            default,
        }
    }
}

pub trait DecisionProvider: Send + Sync {
    fn decide(&self, question: &Question) -> bool;
}

/// Always answers with the question's default
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecisions;

impl DecisionProvider for DefaultDecisions {
    fn decide(&self, question: &Question) -> bool {
        debug!("{}: using default answer {}", question.kind, question.default);
        question.default
    }
}

/// Always gives the same answer (`--yes`)
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl DecisionProvider for FixedAnswer {
    fn decide(&self, question: &Question) -> bool {
        debug!("{}: answering {}", question.kind, self.0);
        self.0
    }
}

/// Asks on stdin when attached to a terminal, otherwise uses the default
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalDecisions;

impl TerminalDecisions {
    fn ask(question: &Question) -> io::Result<bool> {
        let hint = if question.default { "[Y/n]" } else { "[y/N]" };
        let mut stdout = io::stdout();
        write!(stdout, "{} {} ", question.prompt, hint)?;
        stdout.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(parse_answer(&line).unwrap_or(question.default))
    }
}

impl DecisionProvider for TerminalDecisions {
    fn decide(&self, question: &Question) -> bool {
        if !io::stdin().is_terminal() {
            return question.default;
        }
        Self::ask(question).unwrap_or(question.default)
    }
}

fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
