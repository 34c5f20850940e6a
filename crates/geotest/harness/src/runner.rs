//! Sequential test execution with per-test isolation.
//!
//! Every test runs inside `catch_unwind`; an `Err` or a panic becomes a
//! [`TestOutcome::Blowup`] and the next test still runs.

use crate::context::RunContext;
use crate::error::{error_chain, HarnessError, HarnessResult};
use crate::outcome::TestOutcome;
use std::any::Any;
use std::fmt;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};

/// A test body.
pub type TestFn = Box<dyn FnMut(&mut RunContext) -> HarnessResult<TestOutcome>>;

/// One entry of a test list.
pub struct TestCase {
    name: String,
    label: Option<String>,
    func: TestFn,
}

impl TestCase {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: FnMut(&mut RunContext) -> HarnessResult<TestOutcome> + 'static,
    {
        Self {
            name: name.into(),
            label: None,
            func: Box::new(func),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The label, defaulting to the name.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Text shown on the test line. With a label, a leading `test` is
    /// dropped from the name.
    pub fn title(&self) -> String {
        match &self.label {
            Some(label) => format!("{}: {}", strip_test_prefix(&self.name), label),
            None => self.name.clone(),
        }
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

fn strip_test_prefix(name: &str) -> &str {
    match name.strip_prefix("test") {
        Some(rest) if !rest.is_empty() => rest.trim_start_matches('_'),
        _ => name,
    }
}

#[doc(hidden)]
pub fn last_path_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path).trim()
}

/// Build a [`TestCase`] named after a function, optionally with a label.
///
/// ```ignore
/// let tests = vec![
///     test_case!(test_byte_open),
///     test_case!(checks::test_byte_copy, "byte.jras"),
/// ];
/// ```
#[macro_export]
macro_rules! test_case {
    ($func:path) => {
        $crate::runner::TestCase::new(
            $crate::runner::last_path_segment(stringify!($func)),
            $func,
        )
    };
    ($func:path, $label:expr) => {
        $crate::runner::TestCase::new(
            $crate::runner::last_path_segment(stringify!($func)),
            $func,
        )
        .with_label($label)
    };
}

/// Runs test lists, writing the console report to `W`.
pub struct TestRunner<W: Write = io::Stdout> {
    out: W,
}

impl TestRunner<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TestRunner<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Run `tests` strictly in order. Only a failure to write the report
    /// stops the loop.
    pub fn run<I>(&mut self, ctx: &mut RunContext, tests: I) -> io::Result<()>
    where
        I: IntoIterator<Item = TestCase>,
    {
        for mut case in tests {
            self.run_one(ctx, &mut case)?;
        }
        Ok(())
    }

    pub fn run_one(&mut self, ctx: &mut RunContext, case: &mut TestCase) -> io::Result<TestOutcome> {
        let title = case.title();
        write!(self.out, "  TEST: {} ... ", title)?;
        self.out.flush()?;

        ctx.clear_reason();
        let func = &mut case.func;
        let result = panic::catch_unwind(AssertUnwindSafe(|| func(&mut *ctx)));
        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                let message = error_chain(&err);
                tracing::error!(test = %title, error = %message, "test returned an error");
                TestOutcome::Blowup(message)
            }
            Err(payload) => {
                let message = HarnessError::Panic(panic_message(payload.as_ref())).to_string();
                tracing::error!(test = %title, error = %message, "test panicked");
                TestOutcome::Blowup(message)
            }
        };
        writeln!(self.out, "{}", outcome)?;

        // The outcome's own message comes first, then whatever was posted.
        let mut lines = Vec::new();
        match &outcome {
            TestOutcome::Fail(inline) if !inline.is_empty() => lines.push(inline.clone()),
            TestOutcome::Blowup(message) => lines.push(message.clone()),
            _ => {}
        }
        lines.extend(ctx.take_reason());
        let reason = (!lines.is_empty()).then(|| lines.join("\n    "));
        if let Some(reason) = &reason {
            writeln!(self.out, "    {}", reason)?;
        }

        tracing::debug!(test = %title, outcome = %outcome, "test finished");
        ctx.record(&title, &outcome, reason.as_deref());
        Ok(outcome)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
