//! Console progress for the bootstrap pipeline.

use std::io::{self, Write};
use std::sync::Mutex;

use dialoguer::console::style;
use llmboot_core::{BootstrapReport, Observer, Step, StepError, StepOutcome};

use super::prompts::{print_detail_to, print_error_to, print_step_to, print_success_to};

/// Prints numbered progress lines as steps run.
pub struct ConsoleObserver<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleObserver<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleObserver<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap()
    }

    fn write(&self, f: impl FnOnce(&mut W) -> io::Result<()>) {
        if let Ok(mut out) = self.out.lock() {
            // Progress output is best effort; a closed stdout must not abort setup
            let _ = f(&mut *out);
        }
    }
}

/// Steps shown with a `[i/n]` counter. The completion step prints the
/// summary instead of a counter line.
pub(super) const COUNTED_STEPS: usize = Step::ALL.len() - 1;

/// 1-based position of a step.
pub(super) fn step_number(step: Step) -> usize {
    Step::ALL.iter().position(|s| *s == step).unwrap_or(0) + 1
}

impl<W: Write + Send> Observer for ConsoleObserver<W> {
    fn step_started(&self, step: Step) {
        if step == Step::Complete {
            return;
        }
        self.write(|w| print_step_to(w, step_number(step), COUNTED_STEPS, step.title()));
    }

    fn step_finished(&self, step: Step, outcome: &StepOutcome) {
        if step == Step::Complete {
            return;
        }
        self.write(|w| print_detail_to(w, &outcome.to_string()));
    }

    fn step_failed(&self, step: Step, error: &StepError) {
        self.write(|w| print_error_to(w, &format!("{} failed: {}", step.title(), error)));
    }

    fn completed(&self, report: &BootstrapReport) {
        self.write(|w| {
            print_success_to(w, &format!("Setup complete! Model {} is ready.", report.model))?;
            if report.installed_runtime {
                print_detail_to(w, "Ollama was installed during this run")?;
            }
            writeln!(w)?;
            writeln!(w, "Next step:")?;
            writeln!(w, "  {}", style(&report.run_command).cyan())
        });
    }
}
