//! Session driver: runs scripts, prints per-script summaries and the
//! cross-script failure block.

use crate::config::HarnessConfig;
use crate::context::RunContext;
use crate::error::{error_chain, HarnessResult};
use crate::runner::{TestCase, TestRunner};
use crate::script::{discover_scripts, ScriptManifest};
use geotest_driver::DriverManager;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

/// Session-wide switches for [`ReportAggregator::run_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub keep_artifacts: bool,
    /// `KEY=VALUE` options applied to the driver manager before any script.
    pub config_options: BTreeMap<String, String>,
}

impl RunOptions {
    /// Parse `KEY=VALUE` pairs. Returns the first malformed pair as `Err`.
    pub fn with_config_pairs<I, S>(mut self, pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pair in pairs {
            let pair = pair.as_ref();
            match pair.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    self.config_options.insert(key.to_string(), value.to_string());
                }
                _ => return Err(pair.to_string()),
            }
        }
        Ok(self)
    }
}

/// Owns the run context and the report writer for one session.
pub struct ReportAggregator<W: Write = io::Stdout> {
    ctx: RunContext,
    runner: TestRunner<W>,
    manager: Arc<DriverManager>,
    config: HarnessConfig,
}

impl ReportAggregator<io::Stdout> {
    pub fn new(manager: Arc<DriverManager>, config: HarnessConfig) -> Self {
        Self::with_writer(manager, config, io::stdout())
    }
}

impl<W: Write> ReportAggregator<W> {
    pub fn with_writer(manager: Arc<DriverManager>, config: HarnessConfig, out: W) -> Self {
        Self {
            ctx: RunContext::new(),
            runner: TestRunner::new(out),
            manager,
            config,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut RunContext {
        &mut self.ctx
    }

    pub fn manager(&self) -> &Arc<DriverManager> {
        &self.manager
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn post_reason(&mut self, message: impl Into<String>) {
        self.ctx.post_reason(message);
    }

    pub fn into_writer(self) -> W {
        self.runner.into_inner()
    }

    pub fn setup_run(&mut self, name: impl Into<String>) {
        self.ctx.setup_run(name);
    }

    pub fn run_tests<I>(&mut self, tests: I) -> HarnessResult<()>
    where
        I: IntoIterator<Item = TestCase>,
    {
        self.runner.run(&mut self.ctx, tests)?;
        Ok(())
    }

    /// `setup_run`, `run_tests` and `summarize` in one call.
    pub fn run_script<I>(&mut self, name: impl Into<String>, tests: I) -> HarnessResult<usize>
    where
        I: IntoIterator<Item = TestCase>,
    {
        self.setup_run(name);
        self.run_tests(tests)?;
        self.summarize()
    }

    /// Print the counters of the current script. Returns its failure count.
    pub fn summarize(&mut self) -> HarnessResult<usize> {
        let counters = *self.ctx.counters();
        let out = self.runner.writer_mut();
        writeln!(out)?;
        writeln!(out, "Test Script: {}", self.ctx.script_name())?;
        writeln!(out, "Succeeded: {}", counters.success)?;
        writeln!(
            out,
            "Failed:    {} ({} blew exceptions)",
            counters.failures(),
            counters.blowup
        )?;
        writeln!(out, "Skipped:   {}", counters.skip)?;
        writeln!(out)?;
        out.flush()?;
        Ok(counters.failures())
    }

    /// Print every failure of the session, grouped by script.
    pub fn print_failures(&mut self) -> HarnessResult<()> {
        let out = self.runner.writer_mut();
        writeln!(out, " ------------ Failures ------------")?;
        for line in self.ctx.summary().lines() {
            writeln!(out, "{}", line)?;
        }
        writeln!(out, " ----------------------------------")?;
        out.flush()?;
        Ok(())
    }

    /// Run every `*.toml` script of every directory, in sorted order.
    ///
    /// A directory or script that cannot be read is reported and skipped.
    /// Returns the failure count of the whole session.
    pub fn run_all<P: AsRef<Path>>(&mut self, dirs: &[P], options: &RunOptions) -> HarnessResult<usize> {
        self.config.keep_artifacts |= options.keep_artifacts;
        self.config
            .config_options
            .extend(options.config_options.iter().map(|(k, v)| (k.clone(), v.clone())));
        for (key, value) in &self.config.config_options {
            self.manager.set_config_option(key, Some(value));
        }

        for dir in dirs {
            let dir = dir.as_ref();
            let scripts = match discover_scripts(dir) {
                Ok(scripts) => scripts,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "cannot read test directory");
                    writeln!(
                        self.runner.writer_mut(),
                        "Unable to read {}, skipping: {}",
                        dir.display(),
                        error_chain(&e)
                    )?;
                    continue;
                }
            };
            let config = Arc::new(self.config.rooted_at(dir));
            for script in scripts {
                self.run_script_file(dir, &script, config.clone())?;
            }
        }

        if !self.ctx.summary().is_empty() {
            self.print_failures()?;
        }
        Ok(self.ctx.session_totals().failures())
    }

    fn run_script_file(&mut self, dir: &Path, script: &Path, config: Arc<HarnessConfig>) -> HarnessResult<()> {
        let file = script
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        writeln!(self.runner.writer_mut(), "Running tests from {}/{}", dir.display(), file)?;

        let loaded = ScriptManifest::load(script).and_then(|manifest| {
            let name = manifest.name.clone().unwrap_or_else(|| file.clone());
            manifest
                .test_cases(self.manager.clone(), config)
                .map(|cases| (name, cases))
        });
        match loaded {
            Ok((name, cases)) => {
                self.run_script(name, cases)?;
            }
            Err(e) => {
                tracing::warn!(script = %script.display(), error = %e, "script failed to load");
                writeln!(
                    self.runner.writer_mut(),
                    "... failed to load {} ... skipping: {}",
                    file,
                    error_chain(&e)
                )?;
            }
        }
        Ok(())
    }
}
