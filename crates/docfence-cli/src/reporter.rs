//! Console reporting (pytest-style)
//!
//! Progress is printed while items run: one character per item, or one line
//! per item with `--verbose`. Failures and setup errors are collected and
//! printed in `FAILURES` and `ERRORS` sections at the end, followed by a
//! summary line.

use std::io::{self, Write};
use std::time::Duration;

use crossterm::style::{Color, Stylize};
use docfence_engine::{TestItem, TestOutcome, TestResult};

const WIDTH: usize = 80;

/// Summary of a test run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TestSummary {
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub deselected: usize,
    pub duration: Duration,
}

impl TestSummary {
    pub fn record(&mut self, outcome: &TestOutcome) {
        match outcome {
            TestOutcome::Passed => self.passed += 1,
            TestOutcome::Failed { .. } => self.failed += 1,
            TestOutcome::Error { .. } => self.errors += 1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

struct Problem {
    nodeid: String,
    report: String,
    code: String,
}

pub struct ConsoleReporter<W: Write> {
    out: W,
    verbose: bool,
    color: bool,
    failures: Vec<Problem>,
    errors: Vec<Problem>,
}

/// `===== title =====` padded to the report width.
fn banner(title: &str, fill: char) -> String {
    let title = format!(" {title} ");
    let len = title.chars().count();
    if len >= WIDTH {
        return title.trim().to_string();
    }
    let left = (WIDTH - len) / 2;
    let right = WIDTH - len - left;
    format!(
        "{}{title}{}",
        fill.to_string().repeat(left),
        fill.to_string().repeat(right)
    )
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, verbose: bool, color: bool) -> Self {
        Self {
            out,
            verbose,
            color,
            failures: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn on_collection_complete(&mut self, collected: usize, deselected: usize) -> io::Result<()> {
        let mut line = format!("collected {collected} item{}", if collected == 1 { "" } else { "s" });
        if deselected > 0 {
            line.push_str(&format!(" / {deselected} deselected"));
        }
        writeln!(self.out, "{line}")?;
        if self.verbose {
            writeln!(self.out)?;
        }
        Ok(())
    }

    pub fn on_test_start(&mut self, item: &TestItem) -> io::Result<()> {
        if self.verbose {
            write!(self.out, "{} ", item.nodeid)?;
            self.out.flush()?;
        }
        Ok(())
    }

    pub fn on_test_complete(&mut self, item: &TestItem, result: &TestResult) -> io::Result<()> {
        let (short, long, color) = match &result.outcome {
            TestOutcome::Passed => (".", "PASSED", Color::Green),
            TestOutcome::Failed { .. } => ("F", "FAILED", Color::Red),
            TestOutcome::Error { .. } => ("E", "ERROR", Color::Red),
        };

        let status = if self.verbose {
            format!(
                "{} ({}ms)",
                self.paint(long, color),
                result.duration.as_millis()
            )
        } else {
            self.paint(short, color)
        };
        if self.verbose {
            writeln!(self.out, "{status}")?;
        } else {
            write!(self.out, "{status}")?;
            self.out.flush()?;
        }

        let problem = |report: &str| Problem {
            nodeid: item.nodeid.clone(),
            report: report.to_string(),
            code: item.code().to_string(),
        };
        match &result.outcome {
            TestOutcome::Passed => {}
            TestOutcome::Failed { report } => self.failures.push(problem(report)),
            TestOutcome::Error { report } => self.errors.push(problem(report)),
        }
        Ok(())
    }

    fn print_problems(&mut self, title: &str, heading_prefix: &str, errors: bool) -> io::Result<()> {
        let problems = if errors { &self.errors } else { &self.failures };
        if problems.is_empty() {
            return Ok(());
        }
        let mut text = format!("{}\n", banner(title, '='));
        for problem in problems {
            text.push_str(&format!(
                "{}\n",
                banner(&format!("{heading_prefix}{}", problem.nodeid), '_')
            ));
            text.push_str(&problem.report);
            if !problem.report.ends_with('\n') {
                text.push('\n');
            }
            if self.verbose && !errors {
                text.push_str(&format!(
                    "{}\n{}\n",
                    banner("code", '-'),
                    problem.code.trim_matches('\n')
                ));
            }
        }
        write!(self.out, "{text}")
    }

    pub fn on_run_complete(&mut self, summary: &TestSummary) -> io::Result<()> {
        if !self.verbose {
            writeln!(self.out)?;
        }
        writeln!(self.out)?;

        self.print_problems("ERRORS", "ERROR at setup of ", true)?;
        self.print_problems("FAILURES", "", false)?;

        let mut parts = Vec::new();
        if summary.failed > 0 {
            parts.push(self.paint(&format!("{} failed", summary.failed), Color::Red));
        }
        if summary.passed > 0 {
            parts.push(self.paint(&format!("{} passed", summary.passed), Color::Green));
        }
        if summary.deselected > 0 {
            parts.push(self.paint(&format!("{} deselected", summary.deselected), Color::Yellow));
        }
        if summary.errors > 0 {
            let noun = if summary.errors == 1 { "error" } else { "errors" };
            parts.push(self.paint(&format!("{} {noun}", summary.errors), Color::Red));
        }
        let described = if parts.is_empty() {
            "no tests ran".to_string()
        } else {
            parts.join(", ")
        };

        writeln!(
            self.out,
            "{}",
            banner(
                &format!("{described} in {:.2}s", summary.duration.as_secs_f64()),
                '='
            )
        )?;
        self.out.flush()
    }
}
