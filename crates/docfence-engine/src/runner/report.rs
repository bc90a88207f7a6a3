//! Documentation-relative failure reports.
//!
//! Frames from before the fence's own code (the driver that compiled and ran
//! it) are dropped, and the fence source is shown with the line numbers it
//! has in the document.

use std::fmt::Write;

use super::{FrameSummary, RunError, TracebackStyle};
use crate::definitions::{FenceTestDefinition, StartLine};

const CODE_MARGIN: &str = "   ";

/// Render `error` for `test` in the given style.
pub fn render_failure(
    test: &FenceTestDefinition,
    error: &RunError,
    style: TracebackStyle,
) -> String {
    match style {
        TracebackStyle::Line => format!(
            "{}:{}: {}\n",
            test.source_path.display(),
            failure_line(test, error),
            error.exconly()
        ),
        TracebackStyle::Short => traceback(test, error),
        TracebackStyle::Long => format!("{}{}", numbered_source(test), traceback(test, error)),
    }
}

/// Frames from the first one inside the document onwards.
fn user_frames<'a>(test: &FenceTestDefinition, error: &'a RunError) -> &'a [FrameSummary] {
    let Some(info) = error.exception() else {
        return &[];
    };
    let path = test.source_path.to_string_lossy();
    let first = info
        .frames
        .iter()
        .position(|f| f.filename == path)
        .unwrap_or(info.frames.len());
    &info.frames[first..]
}

fn failure_line(test: &FenceTestDefinition, error: &RunError) -> String {
    let path = test.source_path.to_string_lossy();
    let last_in_document = user_frames(test, error)
        .iter()
        .rev()
        .find(|f| f.filename == path);
    match (last_in_document, test.start_line) {
        (Some(frame), StartLine::Exact(_)) => frame.lineno.to_string(),
        (Some(frame), StartLine::Unmapped) => format!("~{}", frame.lineno),
        (None, start) => start.to_string(),
    }
}

fn traceback(test: &FenceTestDefinition, error: &RunError) -> String {
    let approximate = !test.start_line.is_mapped();
    let mut out = String::from("Traceback (most recent call last):\n");
    for frame in user_frames(test, error) {
        let linespec = if approximate {
            format!("line ~{}", frame.lineno)
        } else {
            format!("line {}", frame.lineno)
        };
        let _ = writeln!(out, "  File \"{}\", {linespec}, in {}", frame.filename, frame.name);
        if let Some(line) = frame.line.as_deref().filter(|l| !l.trim().is_empty()) {
            let _ = writeln!(out, "    {}", line.trim_start());
        }
    }
    let _ = writeln!(out, "{}", error.exconly());
    out
}

fn numbered_source(test: &FenceTestDefinition) -> String {
    let rawlines: Vec<&str> = test.source.trim_end_matches('\n').split('\n').collect();
    let maxdigits = rawlines.len().to_string().len();
    let pad = " ".repeat(maxdigits);

    let (skip, note) = match test.start_line {
        StartLine::Exact(start) => (start, ""),
        StartLine::Unmapped => (0, " (line numbers are approximate)"),
    };

    let mut out = format!("Error in code block{note}:\n{pad}{CODE_MARGIN}```\n");
    for (i, line) in rawlines.iter().enumerate().skip(skip) {
        let numbered = format!("{:>maxdigits$}{CODE_MARGIN}{line}", i + 1);
        let _ = writeln!(out, "{}", numbered.trim_end());
    }
    let _ = writeln!(out, "{pad}{CODE_MARGIN}```");
    out
}
