//! The `folio` command line tool.

use anyhow::{Context, bail};
use clap::{ArgAction, Parser, Subcommand};
use folio::{Document, PageOutcome, SplitOptions};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "folio")]
#[command(version)]
#[command(about = "Split PDF files into single-page documents", long_about = None)]
struct Cli {
    /// Print more diagnostics (-v for progress, -vv for debugging output)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a PDF file into one file per page
    Split {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory (defaults to `<FILE stem>_pages` next to the input)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Number of pages processed in parallel
        #[arg(short = 'j', long, value_name = "N")]
        jobs: Option<usize>,

        /// Fail pages whose output file already exists instead of replacing it
        #[arg(long)]
        no_overwrite: bool,
    },

    /// Show the page count and page geometry of a PDF file
    Info {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let result = match cli.command {
        Commands::Split {
            input,
            output,
            jobs,
            no_overwrite,
        } => {
            let mut options = SplitOptions::new().with_overwrite(!no_overwrite);

            if let Some(output) = output {
                options = options.with_output_dir(output);
            }

            if let Some(jobs) = jobs {
                options = options.with_workers(jobs);
            }

            cmd_split(&input, &options)
        }
        Commands::Info { input } => cmd_info(&input),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_split(input: &Path, options: &SplitOptions) -> anyhow::Result<()> {
    let report = folio::split_file(input, options)
        .with_context(|| format!("failed to split {}", input.display()))?;

    for (i, outcome) in report.pages.iter().enumerate() {
        match outcome {
            PageOutcome::Written(path) => println!("page {}: {}", i + 1, path.display()),
            PageOutcome::Failed(e) => println!("page {}: failed: {e}", i + 1),
            PageOutcome::Cancelled => println!("page {}: cancelled", i + 1),
        }
    }

    let total = report.pages.len();
    let written = report.written();

    if written != total {
        bail!("only {written} of {total} pages were written");
    }

    println!("wrote {total} pages to {}", report.output_dir.display());

    Ok(())
}

fn cmd_info(input: &Path) -> anyhow::Result<()> {
    let doc =
        Document::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    let pages = doc.pages().context("failed to read the page tree")?;

    println!("File:       {}", input.display());
    println!("Version:    {}", doc.version());
    println!("Encrypted:  {}", if doc.is_encrypted() { "yes" } else { "no" });
    println!("Pages:      {}", pages.len());

    for (i, page) in pages.iter().enumerate() {
        let media_box = page.media_box();
        println!(
            "  {:>4}: {} x {} pt, rotated {}",
            i + 1,
            media_box.width(),
            media_box.height(),
            page.rotation()
        );
    }

    Ok(())
}
