// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Interactive prompts.
//!
//! Confirmation and secret entry block on standard input. Both sit behind the
//! [`Prompter`] trait, so callers can be exercised without a real terminal.

use indicatif::ProgressBar;
use inquire::{Confirm, Password, PasswordDisplayMode};
use tracing::{info, instrument};

/// Layer of indirection for interactive prompts.
pub trait Prompter {
    /// Ask user a yes/no question, defaulting to no.
    fn confirm(&self, message: &str) -> Result<bool>;

    /// Ask user for a secret without echoing it.
    fn secret(&self, message: &str) -> Result<String>;
}

/// Prompts through the terminal.
#[derive(Debug, Default, Clone)]
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    #[instrument(skip(self), level = "debug")]
    fn confirm(&self, message: &str) -> Result<bool> {
        Ok(Confirm::new(message).with_default(false).prompt()?)
    }

    #[instrument(skip(self), level = "debug")]
    fn secret(&self, message: &str) -> Result<String> {
        Ok(Password::new(message)
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Hidden)
            .prompt()?)
    }
}

/// Terminal prompter for use while a progress bar is drawn.
///
/// The progress bar is suspended for as long as the user is asked.
#[derive(Debug, Clone)]
pub struct ProgressPrompter {
    bar: ProgressBar,
}

impl ProgressPrompter {
    /// Construct new prompter suspending target progress bar.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for ProgressPrompter {
    #[instrument(skip(self), level = "debug")]
    fn confirm(&self, message: &str) -> Result<bool> {
        self.bar.suspend(|| InquirePrompter.confirm(message))
    }

    #[instrument(skip(self), level = "debug")]
    fn secret(&self, message: &str) -> Result<String> {
        info!("authentication required");
        self.bar.suspend(|| InquirePrompter.secret(message))
    }
}

/// Prompt error types.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// Terminal prompt fails or is interrupted.
    #[error(transparent)]
    Inquire(#[from] inquire::InquireError),

    /// Prompt was answered with nothing usable.
    #[error("no answer given to {0:?}")]
    NoAnswer(String),
}

/// Friendly result alias :3
pub type Result<T, E = PromptError> = std::result::Result<T, E>;
