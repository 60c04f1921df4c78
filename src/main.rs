//! couchsql CLI - try selectors, collation and view options from a shell

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use couchsql::options::ViewOptions;
use couchsql::{compare_values, find_options, Map, Matcher};
use serde_json::Value;
use tracing::debug;

#[derive(Parser)]
#[command(name = "couchsql")]
#[command(about = "CouchDB query semantics compiled for SQL backends", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the documents a Mango selector matches
    Match {
        /// The selector, as JSON
        selector: String,

        /// File with one JSON document per line (defaults to stdin)
        #[arg(short, long)]
        docs: Option<PathBuf>,
    },

    /// Sort JSON values into CouchDB collation order
    Collate {
        /// File with one JSON value per line (defaults to stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Compile view query options into SQL
    View {
        /// View name, e.g. _all_docs or _design/ddoc/_view/name
        name: String,

        /// Query options as a JSON object
        #[arg(default_value = "{}")]
        options: String,
    },

    /// Compile a _find request body into SQL
    Find {
        /// The request body, as JSON
        query: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Match { selector, docs } => match_documents(&selector, docs.as_deref()),
        Commands::Collate { file } => collate_values(file.as_deref()),
        Commands::View { name, options } => compile_view(&name, &options),
        Commands::Find { query } => compile_find(&query),
    }
}

/// Read non-empty lines from a file, or stdin when no path is given
fn read_lines(path: Option<&Path>) -> anyhow::Result<Vec<String>> {
    let reader: Box<dyn BufRead> = match path {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

fn parse_json_lines(path: Option<&Path>) -> anyhow::Result<Vec<(String, Value)>> {
    read_lines(path)?
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let value = serde_json::from_str(&line)
                .with_context(|| format!("Invalid JSON on line {}", i + 1))?;
            Ok((line, value))
        })
        .collect()
}

fn match_documents(selector: &str, docs: Option<&Path>) -> anyhow::Result<()> {
    let selector = couchsql::parse_selector(selector)?;
    debug!(%selector, "parsed selector");

    let mut matched = 0;
    for (line, doc) in parse_json_lines(docs)? {
        if selector.matches(&doc) {
            println!("{}", line);
            matched += 1;
        }
    }
    debug!(matched, "done");
    Ok(())
}

fn collate_values(file: Option<&Path>) -> anyhow::Result<()> {
    let mut values = parse_json_lines(file)?;
    values.sort_by(|(_, a), (_, b)| compare_values(a, b));
    for (line, _) in values {
        println!("{}", line);
    }
    Ok(())
}

fn compile_view(name: &str, options: &str) -> anyhow::Result<()> {
    let opts: Map = serde_json::from_str(options).context("Options must be a JSON object")?;
    let view = opts.view_options(name)?;
    print_sql(&view);
    if view.reduce() == Some(true) {
        println!("Group level: {}", view.reduce_group_level());
    }
    Ok(())
}

fn compile_find(query: &str) -> anyhow::Result<()> {
    let body: Value = serde_json::from_str(query).context("Query must be JSON")?;
    let view = find_options(&body)?;
    if let Some(selector) = view.selector() {
        println!("Selector: {}", selector);
    }
    print_sql(&view);
    if !view.bookmark_where().is_empty() {
        println!("Bookmark: {}", view.bookmark_where());
    }
    println!("Limit: {}  Skip: {}", view.find_limit(), view.find_skip());
    if !view.fields().is_empty() {
        println!("Fields: {}", view.fields().join(", "));
    }
    Ok(())
}

fn print_sql(view: &ViewOptions) {
    let mut args = Vec::new();
    let predicates = view.build_where(&mut args);
    if predicates.is_empty() {
        println!("WHERE: (none)");
    } else {
        println!("WHERE {}", predicates.join(" AND "));
    }

    let order_by = view.build_order_by(&["id"]);
    if !order_by.is_empty() {
        println!("{}", order_by);
    }

    for (i, arg) in args.iter().enumerate() {
        println!("  ${} = {}", i + 1, arg);
    }
}
