use std::process::ExitCode;

use arxiv_brain::{
    ConfigFile,
    DataDir,
    Error,
    Result,
    SearchEngine,
    Settings,
    engine::IndexStatus,
    search::{self, QueryParams},
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{AskArgs, Cli, Command};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("ARXIV_BRAIN_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let config = ConfigFile::load(cli.config.as_deref())?;
    let data_dir = DataDir::resolve(cli.root.as_deref(), &config)?;
    let settings = Settings::from_config(&data_dir, &config)?;
    let mut engine = SearchEngine::new(settings);

    match cli.command {
        Command::Index => cmd_index(&mut engine)?,
        Command::Ask(args) => cmd_ask(&engine, &args)?,
        Command::Status(args) => cmd_status(&engine, args.json)?,
        Command::Completions(_) => {}
    }

    Ok(())
}

/// Rebuild the index and report the chunk count.
///
/// Storage failures are printed and reported as 0 chunks with exit status 0.
/// A missing knowledge root or invalid configuration is returned as an error
/// instead, so the process exits 1.
fn cmd_index(engine: &mut SearchEngine) -> Result<()> {
    let store_path = engine.settings().store_path.clone();
    match engine.rebuild() {
        Ok(report) => {
            println!("Indexed {} chunks into {}", report.chunks, store_path.display());
            Ok(())
        }
        Err(e @ (Error::RootNotFound(_) | Error::Config(_))) => Err(e),
        Err(e) => {
            eprintln!("Index build failed: {e}");
            println!("Indexed 0 chunks into {}", store_path.display());
            Ok(())
        }
    }
}

fn cmd_ask(engine: &SearchEngine, args: &AskArgs) -> Result<()> {
    let params = QueryParams {
        text: args.text.clone(),
        top_k: args.top_k,
        min_score: args.min_score,
    };

    let hits = match engine.query(&params) {
        Ok(hits) => hits,
        Err(e) => {
            eprintln!("{e}");
            Vec::new()
        }
    };

    if args.json {
        println!("{}", serde_json::to_string(&search::format_json(&args.text, &hits))?);
    } else {
        print!("{}", search::format_human(&hits));
    }
    Ok(())
}

fn cmd_status(engine: &SearchEngine, json: bool) -> Result<()> {
    let status: IndexStatus = engine.status()?;

    if json {
        println!("{}", serde_json::to_string(&status)?);
        return Ok(());
    }

    println!("Knowledge root: {}", status.root.display());
    println!("Index: {}", status.store_path.display());
    if !status.exists {
        println!("Index not built. Run: arxiv-brain index");
        return Ok(());
    }
    for (key, value) in status.metadata.iter() {
        println!("  {key}: {value}");
    }
    println!("Documents: {}", status.documents);
    println!("Chunks: {}", status.chunks);
    for (source, count) in &status.chunks_by_source {
        println!("  {source}: {count}");
    }
    Ok(())
}
