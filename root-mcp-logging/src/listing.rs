//! Human-readable listings of executed code and its outcome

use std::fmt::Write;

/// Width of the `=` rule framing a listing
pub const BANNER_WIDTH: usize = 60;

/// What an execution produced, as far as the log cares
#[derive(Debug, Clone, Copy, Default)]
pub struct Outcome<'a> {
    pub ok: bool,
    pub error: Option<&'a str>,
    pub error_type: Option<&'a str>,
    pub stdout: &'a str,
    pub stderr: &'a str,
}

fn rule() -> String {
    "=".repeat(BANNER_WIDTH)
}

/// Frame `code` between two rules with a title and right-aligned line numbers
pub fn code_listing(language: &str, code: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "EXECUTING {} CODE:", language.to_uppercase());
    for (n, line) in code.split('\n').enumerate() {
        let _ = writeln!(out, "{:>3} | {}", n + 1, line);
    }
    let _ = write!(out, "{}", rule());
    out
}

/// Summary block printed once the code has run
pub fn outcome_report(outcome: &Outcome<'_>) -> String {
    let mut out = String::new();

    if outcome.ok {
        let _ = writeln!(out, "✓ EXECUTION SUCCESS");
    } else {
        let _ = writeln!(out, "❌ EXECUTION FAILED");
        let _ = writeln!(out, "Error: {}", outcome.error.unwrap_or("None"));
        let _ = writeln!(out, "Type: {}", outcome.error_type.unwrap_or("None"));
    }

    if !outcome.stdout.is_empty() {
        let _ = writeln!(out, "STDOUT:\n{}", outcome.stdout);
    }
    if !outcome.stderr.is_empty() {
        let _ = writeln!(out, "STDERR:\n{}", outcome.stderr);
    }

    out
}
