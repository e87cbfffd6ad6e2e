//! `llmboot setup`: run the bootstrap pipeline.

mod observer;
mod prompts;

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use llmboot_core::{Bootstrapper, Host, Step, SystemHost};

use super::{Overrides, load_config};

use observer::{COUNTED_STEPS, ConsoleObserver, step_number};
pub use prompts::print_header;
use prompts::{print_detail_to, print_step_to};

#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Print the steps without running them
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub overrides: Overrides,
}

pub async fn run(args: SetupArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path, &args.overrides)?;
    let host: Arc<dyn Host> = Arc::new(SystemHost::new());
    let bootstrapper = super::bootstrapper(host, config, &args.overrides);

    print_header(&format!(
        "llmboot setup · {}",
        bootstrapper.config().model.name
    ));

    if args.dry_run {
        print_plan_to(&mut io::stdout(), &bootstrapper)?;
        return Ok(());
    }

    execute(&bootstrapper, ConsoleObserver::stdout()).await
}

/// Run the pipeline, reporting progress through `observer`.
async fn execute<W: Write + Send>(
    bootstrapper: &Bootstrapper,
    observer: ConsoleObserver<W>,
) -> Result<()> {
    bootstrapper.run(&observer).await?;
    Ok(())
}

/// Print the numbered plan for `--dry-run`.
fn print_plan_to<W: Write>(w: &mut W, bootstrapper: &Bootstrapper) -> io::Result<()> {
    for (step, description) in bootstrapper.plan() {
        if step == Step::Complete {
            writeln!(w)?;
            writeln!(w, "Then: {description}")?;
        } else {
            print_step_to(w, step_number(step), COUNTED_STEPS, step.title())?;
            print_detail_to(w, &description)?;
        }
    }
    writeln!(w)?;
    writeln!(w, "Dry run: nothing was changed.")
}
