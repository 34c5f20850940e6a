//! Test outcome classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The result of one test invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestOutcome {
    Success,
    /// An anticipated mismatch, with the explanation.
    Fail(String),
    /// A precondition was not met (driver missing, capability absent).
    Skip,
    /// The test returned an unexpected error or panicked.
    Blowup(String),
}

impl TestOutcome {
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail(reason.into())
    }

    /// Interpret a legacy status string: `fail...` fails, `skip` skips,
    /// anything else succeeds.
    pub fn from_status(status: &str) -> Self {
        if status.starts_with("fail") {
            Self::Fail(String::new())
        } else if status == "skip" {
            Self::Skip
        } else {
            Self::Success
        }
    }

    /// Status text printed after the test line.
    pub fn status_text(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fail(_) => "fail",
            Self::Skip => "skip",
            Self::Blowup(_) => "fail (blowup)",
        }
    }

    /// Counts against the run (fail or blowup).
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail(_) | Self::Blowup(_))
    }

    /// The inline reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Fail(r) | Self::Blowup(r) if !r.is_empty() => Some(r.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_status_strings() {
        assert_eq!(TestOutcome::from_status("success"), TestOutcome::Success);
        assert_eq!(TestOutcome::from_status("skip"), TestOutcome::Skip);
        assert!(matches!(TestOutcome::from_status("fail"), TestOutcome::Fail(_)));
        assert!(matches!(
            TestOutcome::from_status("fail (expected)"),
            TestOutcome::Fail(_)
        ));
        assert_eq!(TestOutcome::from_status("whatever"), TestOutcome::Success);
    }

    #[test]
    fn status_text_and_reason() {
        let blowup = TestOutcome::Blowup("io error".into());
        assert_eq!(blowup.to_string(), "fail (blowup)");
        assert_eq!(blowup.reason(), Some("io error"));
        assert!(blowup.is_failure());
        assert_eq!(TestOutcome::fail("").reason(), None);
        assert!(!TestOutcome::Skip.is_failure());
    }
}
