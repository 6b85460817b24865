//! Trace styling.
//!
//! The literal tokens (`WAS UNEVALUATED`, `PASSED`, `FAILED`, `FAILURE`,
//! `NOT MARKED SHAREABLE`) are identical in every style; only the colour
//! escapes differ.  Log scrapers match on the tokens.

use std::fmt;

use warden_contracts::permission::CheckResult;

const BLUE: &str = "\u{1b}[34m";
const GREEN: &str = "\u{1b}[32m";
const RED: &str = "\u{1b}[31m";
const RESET: &str = "\u{1b}[m";

/// How a trace colours status tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TraceStyle {
    /// ANSI colours: blue unevaluated, green passed, red failed.
    #[default]
    Ansi,
    /// No escapes, for log files and non-interactive sinks.
    Plain,
}

impl TraceStyle {
    /// Write `text` coloured for `result`.
    pub fn paint(self, f: &mut fmt::Formatter<'_>, result: CheckResult, text: &str) -> fmt::Result {
        match self {
            TraceStyle::Plain => f.write_str(text),
            TraceStyle::Ansi => {
                let colour = match result {
                    CheckResult::Unevaluated => BLUE,
                    CheckResult::Passed => GREEN,
                    CheckResult::Failed => RED,
                };
                write!(f, "{}{}{}", colour, text, RESET)
            }
        }
    }

    /// Write the status token for `result`.
    pub fn status(self, f: &mut fmt::Formatter<'_>, result: CheckResult) -> fmt::Result {
        self.paint(f, result, status_label(result))
    }
}

pub fn status_label(result: CheckResult) -> &'static str {
    match result {
        CheckResult::Unevaluated => "WAS UNEVALUATED",
        CheckResult::Passed => "PASSED",
        CheckResult::Failed => "FAILED",
    }
}

/// Something that can write itself in a given `TraceStyle`.
pub trait Traceable {
    fn fmt_trace(&self, f: &mut fmt::Formatter<'_>, style: TraceStyle) -> fmt::Result;

    /// Render into a `String`.
    fn render(&self, style: TraceStyle) -> String
    where
        Self: Sized,
    {
        Styled { inner: self, style }.to_string()
    }
}

/// `Display` adapter pairing a value with a style.
pub struct Styled<'a, T: Traceable> {
    pub inner: &'a T,
    pub style: TraceStyle,
}

impl<T: Traceable> fmt::Display for Styled<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt_trace(f, self.style)
    }
}
