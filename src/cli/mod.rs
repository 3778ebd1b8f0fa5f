// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands off to Layer 2. The only
// output printed here is the final result of each command.
//
//   stance-gator fit   --corpus TYPE:PATH[:RATIOS[:WEIGHT]] ...
//   stance-gator test  --ckpt runs/x/epoch=07-val_macro_f1=0.641.ckpt
//   stance-gator embed --ckpt ... --corpus-type vast --corpus vast.csv -o out.npy
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EmbedArgs, FitArgs, TestArgs};

use crate::application::Accelerator;

#[derive(Parser, Debug)]
#[command(
    name = "stance-gator",
    version,
    about = "Train stance detection classifiers, evaluate them and export embeddings."
)]
pub struct Cli {
    /// Compute device: gpu (wgpu) or cpu (ndarray). Defaults to gpu,
    /// or to the value in the --config file for `fit`
    #[arg(long, global = true)]
    pub device: Option<Accelerator>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let device = self.device;
        match self.command {
            Commands::Fit(args)   => run_fit(args, device),
            Commands::Test(args)  => run_test(args, device.unwrap_or_default()),
            Commands::Embed(args) => run_embed(args, device.unwrap_or_default()),
        }
    }
}

fn run_fit(args: FitArgs, device: Option<Accelerator>) -> Result<()> {
    use crate::application::{fit_use_case::FitUseCase, test_use_case::format_report};

    let print_only = args.print_config;
    let config     = args.into_config(device)?;
    if print_only {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let outcome = FitUseCase::new(config).execute()?;
    match &outcome.report.best_checkpoint {
        Some(path) => println!(
            "Training complete after {} epochs{}. Best checkpoint: {}",
            outcome.report.epochs_run,
            if outcome.report.stopped_early { " (early stop)" } else { "" },
            path.display(),
        ),
        None => println!("Training complete. No checkpoint was saved."),
    }
    if let Some(test) = &outcome.test {
        print!("{}", format_report(test));
    }
    Ok(())
}

fn run_test(args: TestArgs, device: Accelerator) -> Result<()> {
    use crate::application::test_use_case::{format_report, TestUseCase};

    let eval = TestUseCase::new(args.ckpt, args.run_dir, device).execute()?;
    print!("{}", format_report(&eval));
    Ok(())
}

fn run_embed(args: EmbedArgs, device: Accelerator) -> Result<()> {
    use crate::application::embed_use_case::EmbedUseCase;

    let request = args.into_request(device);
    let output  = request.output.clone();
    let summary = EmbedUseCase::new(request).execute()?;
    println!("Wrote {} embeddings of size {} to {}", summary.rows, summary.dim, output.display());
    Ok(())
}
