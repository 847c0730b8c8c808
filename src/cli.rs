use std::path::PathBuf;

use arxiv_brain::search::DEFAULT_TOP_K;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "arxiv-brain",
    about = "Local semantic search over your arXiv research notes and code"
)]
pub struct Cli {
    /// Knowledge root directory (overrides ARXIV_BRAIN_ROOT and the config file)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Path to a JSON config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rebuild the semantic index from the knowledge root (full rebuild)
    Index,
    /// Ask a question against the index
    Ask(AskArgs),
    /// Show index location, build settings and chunk counts
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Ask --

#[derive(Debug, Parser)]
pub struct AskArgs {
    /// The question or search text
    pub text: String,

    /// Number of results to return
    #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Minimum score threshold
    #[arg(long, default_value = "0.0")]
    pub min_score: f32,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "arxiv-brain",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_ask_defaults() {
        let cli = Cli::parse_from(["arxiv-brain", "ask", "what is rope"]);
        match cli.command {
            Command::Ask(args) => {
                assert_eq!(args.text, "what is rope");
                assert_eq!(args.top_k, 5);
                assert!(!args.json);
                assert_eq!(args.min_score, 0.0);
            }
            _ => panic!("expected ask command"),
        }
    }

    #[test]
    fn parse_ask_flags() {
        let cli = Cli::parse_from([
            "arxiv-brain",
            "ask",
            "kv cache",
            "--top-k",
            "3",
            "--json",
            "--root",
            "/kb",
        ]);
        assert_eq!(cli.root, Some(PathBuf::from("/kb")));
        match cli.command {
            Command::Ask(args) => {
                assert_eq!(args.top_k, 3);
                assert!(args.json);
            }
            _ => panic!("expected ask command"),
        }
    }

    #[test]
    fn parse_index_takes_no_args() {
        let cli = Cli::parse_from(["arxiv-brain", "-q", "index"]);
        assert!(matches!(cli.command, Command::Index));
        assert!(cli.quiet);
        assert!(Cli::try_parse_from(["arxiv-brain", "index", "extra"]).is_err());
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
