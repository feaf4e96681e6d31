use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use ruby_index::{config::IndexingConfig, introspection, query, synchronizer::Synchronizer};

#[derive(Parser, Debug)]
#[command(name = "ruby_index_cli", about = "Indexes a Ruby workspace and queries its symbols", version)]
struct Args {
    #[arg(value_name = "PATHS", default_value = ".")]
    paths: Vec<String>,

    #[arg(long = "config", value_name = "FILE", help = "Configuration file (defaults to .ruby-index.toml)")]
    config: Option<PathBuf>,

    #[arg(long = "stop-after", help = "Stop after the given stage")]
    stop_after: Option<StopAfter>,

    #[arg(
        long = "list",
        value_name = "QUERY",
        num_args = 0..=1,
        default_missing_value = "",
        help = "List classes and modules, optionally filtered by a fuzzy query"
    )]
    list: Option<String>,

    #[arg(long = "search", value_name = "QUERY", help = "Fuzzy search every declaration")]
    search: Option<String>,

    #[arg(long = "namespace", value_name = "FQN", help = "Describe a class or module")]
    namespaces: Vec<String>,

    #[arg(long = "method", value_name = "SIG", help = "Describe a method, written `Owner#name` or `Owner.name`")]
    methods: Vec<String>,

    #[arg(long = "ancestors", value_name = "FQN", help = "Print the ancestors of a namespace")]
    ancestors: Option<String>,
}

#[derive(Debug, Clone, ValueEnum)]
enum StopAfter {
    Listing,
    Indexing,
}

fn load_config(args: &Args) -> Result<IndexingConfig, ruby_index::errors::Errors> {
    if let Some(path) = &args.config {
        return IndexingConfig::load(path);
    }

    let root = args
        .paths
        .first()
        .map(Path::new)
        .filter(|path| path.is_dir())
        .unwrap_or_else(|| Path::new("."));

    IndexingConfig::discover(root)
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(error) => tracing::error!(error = %error, "failed to serialize the result"),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_env("RUBY_INDEX_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };

    // Listing

    if let Some(StopAfter::Listing) = args.stop_after {
        let (file_paths, errors) = ruby_index::listing::collect_file_paths(args.paths, &config);

        for error in &errors {
            eprintln!("{error}");
        }

        println!("Listed {} files", file_paths.len());
        return ExitCode::SUCCESS;
    }

    // Indexing

    let synchronizer = Synchronizer::new(config);
    let (summary, errors) = synchronizer.index_all(args.paths.clone());

    for error in &errors {
        eprintln!("{error}");
    }

    {
        let index = synchronizer.read();
        println!("Indexed {} files", index.documents().len());
        println!("Found {} declarations", index.declarations().len());
        println!("Found {} entries", index.entries().len());
    }

    if summary.failed > 0 {
        eprintln!("Failed to index {} files", summary.failed);
    }

    if let Some(StopAfter::Indexing) = args.stop_after {
        return ExitCode::SUCCESS;
    }

    // Queries

    let index = synchronizer.read();
    let config = synchronizer.config();

    if let Some(query) = &args.list {
        let query = Some(query.as_str()).filter(|query| !query.is_empty());
        print_json(&introspection::list_namespaces(
            &index,
            query,
            config.max_listed_namespaces,
            false,
        ));
    }

    if let Some(query) = &args.search {
        let names: Vec<String> = query::fuzzy_search(
            &index,
            query,
            config.max_search_results,
            config.max_listed_namespaces,
        )
        .iter()
        .map(|entry| entry.declaration_name())
        .collect();
        print_json(&names);
    }

    if !args.namespaces.is_empty() {
        print_json(&introspection::namespace_details(&index, &args.namespaces, false));
    }

    if !args.methods.is_empty() {
        print_json(&introspection::method_details(&index, &args.methods, false));
    }

    if let Some(fqn) = &args.ancestors {
        print_json(&index.linearized_ancestors_of(fqn));
    }

    ExitCode::SUCCESS
}
