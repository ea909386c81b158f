use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Reconcile recipe completions against a pantry", long_about = None)]
pub struct Cli {
    /// JSON file holding every user's pantry and completion history
    #[arg(long, global = true)]
    pub state_file: Option<PathBuf>,

    /// Minimum name-similarity score for a pantry item to count as a match
    #[arg(long, global = true)]
    pub threshold: Option<f64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replace a user's pantry with the contents of a CSV file
    Import {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        csv: PathBuf,
    },
    /// Print a user's pantry as JSON
    Pantry {
        #[arg(short, long)]
        user: String,
    },
    /// Complete a recipe from a JSON request file
    Complete {
        #[arg(short, long)]
        request: PathBuf,
    },
    /// Undo a previous completion
    Revert {
        #[arg(short, long)]
        user: String,
        #[arg(long)]
        recipe: Option<String>,
        #[arg(long)]
        minutes_ago: Option<i64>,
        #[arg(long)]
        transaction_id: Option<String>,
    },
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
