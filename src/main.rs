use std::io::Read;

use clap::Parser;
use dump_index::Analyzer;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dump-index",
    about = "Score free-form text quality and triage it by priority tier",
    version
)]
struct Cli {
    /// File paths to analyze (reads stdin if none provided)
    files: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let analyzer = Analyzer::new();

    if cli.files.is_empty() {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .expect("Failed to read stdin");
        let result = analyzer.analyze(&input);
        println!("{}", serde_json::to_string_pretty(&result).unwrap());
    } else {
        for path in &cli.files {
            let text = std::fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("Error reading {path}: {e}");
                std::process::exit(1);
            });
            let result = analyzer.analyze(&text);
            println!("{}", serde_json::to_string_pretty(&result).unwrap());
        }
    }
}
