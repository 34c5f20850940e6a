//! Per-session run state: counters, the failure summary and the last
//! posted reason. One [`RunContext`] is threaded through a whole session.

use crate::outcome::TestOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name used before any script has been set up.
pub const DEFAULT_SCRIPT: &str = "default";

/// Outcome tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub success: usize,
    pub fail: usize,
    pub skip: usize,
    pub blowup: usize,
}

impl RunCounters {
    pub fn record(&mut self, outcome: &TestOutcome) {
        match outcome {
            TestOutcome::Success => self.success += 1,
            TestOutcome::Fail(_) => self.fail += 1,
            TestOutcome::Skip => self.skip += 1,
            TestOutcome::Blowup(_) => self.blowup += 1,
        }
    }

    /// Fail plus blowup.
    pub fn failures(&self) -> usize {
        self.fail + self.blowup
    }

    pub fn total(&self) -> usize {
        self.success + self.fail + self.skip + self.blowup
    }

    pub fn absorb(&mut self, other: &RunCounters) {
        self.success += other.success;
        self.fail += other.fail;
        self.skip += other.skip;
        self.blowup += other.blowup;
    }
}

/// One failed or blown-up test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub script: String,
    /// `name` or `name: label`, as printed on the test line.
    pub test: String,
    /// Status text, `fail` or `fail (blowup)`.
    pub result: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryLine {
    /// Header pushed before the first failure of a script.
    Script(String),
    Failure(FailureEntry),
}

impl fmt::Display for SummaryLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script(name) => write!(f, "Script: {}", name),
            Self::Failure(entry) => {
                write!(f, "  TEST: {} ... {}", entry.test, entry.result)?;
                if let Some(reason) = &entry.reason {
                    write!(f, "\n    {}", reason)?;
                }
                Ok(())
            }
        }
    }
}

/// Failures accumulated across every script of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSummary {
    lines: Vec<SummaryLine>,
}

impl FailureSummary {
    pub fn lines(&self) -> &[SummaryLine] {
        &self.lines
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailureEntry> {
        self.lines.iter().filter_map(|line| match line {
            SummaryLine::Failure(entry) => Some(entry),
            SummaryLine::Script(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn push(&mut self, line: SummaryLine) {
        self.lines.push(line);
    }
}

/// Session state shared by the runner, the checker and test functions.
#[derive(Debug, Clone)]
pub struct RunContext {
    script: String,
    counters: RunCounters,
    totals: RunCounters,
    summary: FailureSummary,
    last_reason: Option<String>,
    script_had_errors: bool,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            script: DEFAULT_SCRIPT.to_string(),
            counters: RunCounters::default(),
            totals: RunCounters::default(),
            summary: FailureSummary::default(),
            last_reason: None,
            script_had_errors: false,
        }
    }

    /// Start a new script. Counters of the previous script are folded into
    /// the session totals; the failure summary is kept.
    pub fn setup_run(&mut self, name: impl Into<String>) {
        self.totals.absorb(&self.counters);
        self.counters = RunCounters::default();
        self.script = name.into();
        self.script_had_errors = false;
        self.last_reason = None;
        tracing::info!(script = %self.script, "starting script");
    }

    pub fn script_name(&self) -> &str {
        &self.script
    }

    /// Counters of the current script.
    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    /// Counters of every script so far, the current one included.
    pub fn session_totals(&self) -> RunCounters {
        let mut totals = self.totals;
        totals.absorb(&self.counters);
        totals
    }

    pub fn summary(&self) -> &FailureSummary {
        &self.summary
    }

    /// Record a diagnostic for the test currently running.
    pub fn post_reason(&mut self, message: impl Into<String>) {
        self.last_reason = Some(message.into());
    }

    pub fn last_reason(&self) -> Option<&str> {
        self.last_reason.as_deref()
    }

    pub fn take_reason(&mut self) -> Option<String> {
        self.last_reason.take()
    }

    pub(crate) fn clear_reason(&mut self) {
        self.last_reason = None;
    }

    /// Count `outcome` and, for failures, append it to the summary.
    pub(crate) fn record(&mut self, test: &str, outcome: &TestOutcome, reason: Option<&str>) {
        self.counters.record(outcome);
        if !outcome.is_failure() {
            return;
        }
        if !self.script_had_errors {
            self.summary.push(SummaryLine::Script(self.script.clone()));
            self.script_had_errors = true;
        }
        self.summary.push(SummaryLine::Failure(FailureEntry {
            script: self.script.clone(),
            test: test.to_string(),
            result: outcome.status_text().to_string(),
            reason: reason.map(str::to_string),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_pushed_once_per_script() {
        let mut ctx = RunContext::new();
        ctx.setup_run("a.toml");
        ctx.record("one", &TestOutcome::fail("x"), Some("x"));
        ctx.record("two", &TestOutcome::Blowup("y".into()), None);
        ctx.setup_run("b.toml");
        ctx.record("three", &TestOutcome::Success, None);
        ctx.record("four", &TestOutcome::fail(""), None);

        let lines = ctx.summary().lines();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], SummaryLine::Script("a.toml".into()));
        assert_eq!(lines[3], SummaryLine::Script("b.toml".into()));
        assert_eq!(ctx.summary().failures().count(), 3);
    }

    #[test]
    fn setup_run_folds_counters() {
        let mut ctx = RunContext::new();
        assert_eq!(ctx.script_name(), DEFAULT_SCRIPT);
        ctx.record("a", &TestOutcome::Success, None);
        ctx.record("b", &TestOutcome::Skip, None);
        ctx.setup_run("next");
        assert_eq!(ctx.counters().total(), 0);
        ctx.record("c", &TestOutcome::fail("no"), None);
        let totals = ctx.session_totals();
        assert_eq!((totals.success, totals.skip, totals.fail), (1, 1, 1));
    }

    #[test]
    fn summary_line_rendering() {
        let line = SummaryLine::Failure(FailureEntry {
            script: "s".into(),
            test: "open: byte".into(),
            result: "fail".into(),
            reason: Some("Checksum differs".into()),
        });
        assert_eq!(
            line.to_string(),
            "  TEST: open: byte ... fail\n    Checksum differs"
        );
    }

    #[test]
    fn reason_is_taken_once() {
        let mut ctx = RunContext::new();
        ctx.post_reason("because");
        assert_eq!(ctx.last_reason(), Some("because"));
        assert_eq!(ctx.take_reason().as_deref(), Some("because"));
        assert!(ctx.take_reason().is_none());
    }
}
