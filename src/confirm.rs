//! Yes/no decisions for recoverable anomalies.
//!
//! Extraction asks before writing into a non-empty folder and when a
//! header carries an odd `header_size` or `next_header_offset`.  Rebuilding
//! asks before overwriting an existing archive.  The library never talks to
//! a terminal itself; callers pass whatever hook fits their environment.

/// Answers a yes/no question.  `false` aborts the running operation.
pub trait ConfirmationHook {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> ConfirmationHook for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Gives the same answer to every question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedAnswer(pub bool);

impl ConfirmationHook for FixedAnswer {
    fn confirm(&mut self, prompt: &str) -> bool {
        tracing::debug!(answer = self.0, "{prompt}");
        self.0
    }
}
