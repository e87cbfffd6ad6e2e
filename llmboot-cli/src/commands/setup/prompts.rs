//! Console output helpers for setup progress.
//!
//! Every helper has a `_to` variant that writes to any `Write` so output
//! can be asserted in tests.

use dialoguer::console::style;
use std::io::{self, Write};

const HEADER_WIDTH: usize = 60;

/// Draws a boxed header with the given title.
pub fn print_header(title: &str) {
    let _ = print_header_to(&mut io::stdout(), title);
}

/// Draws a boxed header to a writer (for testing).
pub fn print_header_to<W: Write>(w: &mut W, title: &str) -> io::Result<()> {
    let border = "─".repeat(HEADER_WIDTH);
    writeln!(w, "┌{}┐", border)?;
    writeln!(w, "│ {:<width$} │", title, width = HEADER_WIDTH - 2)?;
    writeln!(w, "└{}┘", border)?;
    writeln!(w)?;
    Ok(())
}

/// Prints a numbered step line, e.g. `[3/9] Starting Ollama service`.
pub fn print_step_to<W: Write>(
    w: &mut W,
    index: usize,
    total: usize,
    message: &str,
) -> io::Result<()> {
    writeln!(
        w,
        "{} {}",
        style(format!("[{index}/{total}]")).cyan().bold(),
        message
    )?;
    w.flush()
}

/// Prints an indented detail line under a step.
pub fn print_detail_to<W: Write>(w: &mut W, message: &str) -> io::Result<()> {
    writeln!(w, "      {}", style(message).dim())
}

/// Prints a success message with a green checkmark.
pub fn print_success_to<W: Write>(w: &mut W, message: &str) -> io::Result<()> {
    writeln!(
        w,
        "\n{} {}",
        style("✓").green().bold(),
        style(message).green()
    )
}

/// Prints an error message with a red X.
pub fn print_error_to<W: Write>(w: &mut W, message: &str) -> io::Result<()> {
    writeln!(w, "\n{} {}", style("✗").red().bold(), style(message).red())
}
