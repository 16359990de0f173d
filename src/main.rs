use anyhow::Context;
use clap::Parser;
use codebrief::{Config, IgnoreConfig, Pipeline, RetryPolicy};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "codebrief",
    version,
    author,
    about = "Compile an LLM-written report about a source tree",
    long_about = "Compile an LLM-written report about a source tree.\n\n\
    Every eligible file is analyzed on its own, the analyses are joined into a \
    preliminary document, and that document is folded chunk by chunk into one \
    report which is finally reformatted into a fixed outline. Interrupted \
    compilations can be resumed from their checkpoint.\n\n\
    USAGE EXAMPLES:\n  \
      # Report on the current directory, printed to stdout\n  \
      codebrief\n\n  \
      # Report on a project, written to a file\n  \
      codebrief --dir ./my-project --output report.md\n\n  \
      # Continue a compilation that stalled\n  \
      codebrief --dir ./my-project --output report.md --resume"
)]
struct Cli {
    /// Root directory to analyze
    #[arg(short, long, default_value = ".", value_name = "PATH")]
    dir: PathBuf,

    /// Write the report to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Model used for every call
    #[arg(short, long)]
    model: Option<String>,

    /// Chat completions endpoint
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// API key for the completions endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    /// Compile chunk size in characters
    #[arg(long, default_value_t = 12_000)]
    chunk_size: usize,

    /// Overlap between compile chunks in characters
    #[arg(long)]
    overlap: Option<usize>,

    /// Pause between file analyses in milliseconds
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,

    /// Retries per compile chunk before giving up
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Extra directory name to skip (can be used multiple times)
    #[arg(long = "ignore-dir", value_name = "NAME")]
    ignore_dirs: Vec<String>,

    /// Extra file-name suffix to skip (can be used multiple times)
    #[arg(long = "ignore-suffix", value_name = "SUFFIX")]
    ignore_suffixes: Vec<String>,

    /// Glob pattern to exclude (can be used multiple times)
    ///
    /// Example: codebrief --exclude "docs/**" --exclude "**/*.snap"
    #[arg(long = "exclude", value_name = "GLOB")]
    excludes: Vec<String>,

    /// Honour .gitignore files
    #[arg(long)]
    gitignore: bool,

    /// Resume compilation from the checkpoint next to the output file
    #[arg(long, requires = "output")]
    resume: bool,

    /// Also write the preliminary document next to the output file
    #[arg(long, requires = "output")]
    keep_intermediate: bool,

    /// Print stage timings after the run
    #[arg(long)]
    metrics: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    let ignore = IgnoreConfig::default()
        .add_dir_names(cli.ignore_dirs)
        .add_suffixes(cli.ignore_suffixes)
        .exclude_globs(cli.excludes)
        .respect_gitignore(cli.gitignore);

    let mut builder = Config::builder()
        .root_dir(cli.dir)
        .ignore(ignore)
        .compile_chunk_size(cli.chunk_size)
        .file_delay(Duration::from_millis(cli.delay_ms))
        .retry(RetryPolicy::with_max_retries(cli.max_retries))
        .resume(cli.resume)
        .keep_intermediate(cli.keep_intermediate);

    if let Some(output) = cli.output {
        builder = builder.output_path(output);
    }
    if let Some(model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(url) = cli.api_url {
        builder = builder.api_url(url);
    }
    if let Some(key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(temperature) = cli.temperature {
        builder = builder.temperature(temperature);
    }
    if let Some(overlap) = cli.overlap {
        builder = builder.overlap(overlap);
    }

    let config = builder
        .build()
        .context("Failed to build configuration")?;

    let output = Pipeline::new(config)
        .context("Failed to create pipeline")?
        .run()
        .await
        .context("Pipeline execution failed")?;

    if output.output_path.is_none() {
        println!("{}", output.report);
    }

    output.print_summary();

    if cli.metrics {
        eprintln!("{}", output.metrics.to_table());
    }

    Ok(())
}

fn setup_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "codebrief=info",
        1 => "codebrief=debug",
        _ => "codebrief=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false),
        )
        .init();
}
