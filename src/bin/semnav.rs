//! semnav CLI
//!
//! Inspect annotated OpenAPI descriptions: print the expanded document, find
//! operations by meaning, and preview the request a value bag would produce.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use semnav::{
    build_request, find_operation, ApiDocument, OperationDescriptor, OperationQuery,
    OperationSchema, SearchOptions,
};
use serde_json::{json, Map, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "semnav")]
#[command(about = "Navigate annotated OpenAPI descriptions by meaning")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the expanded document (references resolved, allOf merged)
    Expand {
        /// Document source: file path or URL (http:// or https://)
        document: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Find the operation answering a semantic query
    Find {
        /// Document source: file path or URL (http:// or https://)
        document: String,

        #[command(flatten)]
        query: QueryArgs,

        /// Treat the caller as authenticated
        #[arg(long)]
        authenticated: bool,
    },

    /// Print the request an operation would send for the given values
    Request {
        /// Document source: file path or URL (http:// or https://)
        document: String,

        #[command(flatten)]
        query: QueryArgs,

        /// Value for a parameter, by semantic id or name (key=value, value may be JSON)
        #[arg(long = "value", value_name = "KEY=VALUE")]
        values: Vec<String>,
    },
}

#[derive(Args)]
struct QueryArgs {
    #[command(flatten)]
    kind: QueryKind,

    /// Prefer operations accepting these semantic parameters
    #[arg(long = "with-parameter")]
    with_parameters: Vec<String>,

    /// Only operations whose response provides these fields
    #[arg(long = "require-field")]
    required_fields: Vec<String>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct QueryKind {
    /// Operation performing this action (semantic id)
    #[arg(long)]
    action: Option<String>,

    /// Operation returning this semantic type
    #[arg(long)]
    returns: Option<String>,

    /// Operation listing this semantic type
    #[arg(long)]
    lists: Option<String>,

    /// Operation whose path template matches this URL
    #[arg(long)]
    path: Option<String>,
}

impl QueryArgs {
    fn query(&self) -> Option<OperationQuery> {
        let kind = &self.kind;
        if let Some(action) = &kind.action {
            return Some(OperationQuery::Action(action.clone()));
        }
        if let Some(returns) = &kind.returns {
            return Some(OperationQuery::Returns(returns.clone()));
        }
        if let Some(lists) = &kind.lists {
            return Some(OperationQuery::Lists(lists.clone()));
        }
        kind.path.clone().map(OperationQuery::Path)
    }

    fn options(&self) -> SearchOptions {
        let mut options = SearchOptions::new();
        for key in &self.with_parameters {
            options = options.with_parameter(key.as_str());
        }
        for key in &self.required_fields {
            options = options.require_field(key.as_str());
        }
        options
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Expand {
            document,
            output,
            pretty,
        } => run_expand(&document, output, pretty),
        Commands::Find {
            document,
            query,
            authenticated,
        } => run_find(&document, &query, authenticated),
        Commands::Request {
            document,
            query,
            values,
        } => run_request(&document, &query, &values),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn load(source: &str) -> Result<ApiDocument, u8> {
    ApiDocument::load_auto(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn run_expand(source: &str, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    let document = load(source)?;

    let json_output = if pretty {
        serde_json::to_string_pretty(document.expanded())
    } else {
        serde_json::to_string(document.expanded())
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => println!("{}", json_output),
    }

    Ok(())
}

fn locate(
    document: &ApiDocument,
    args: &QueryArgs,
    authenticated: bool,
) -> Result<OperationDescriptor, u8> {
    let query = args.query().ok_or_else(|| {
        eprintln!("Error: one of --action, --returns, --lists or --path is required");
        2u8
    })?;
    find_operation(document, &query, &args.options(), authenticated).ok_or_else(|| {
        eprintln!("No operation found for {}", query);
        1u8
    })
}

fn run_find(source: &str, args: &QueryArgs, authenticated: bool) -> Result<(), u8> {
    let document = load(source)?;
    let operation = locate(&document, args, authenticated)?;
    let schema = OperationSchema::new(operation);
    let operation = schema.operation();

    let summary = json!({
        "method": operation.verb,
        "path": operation.path,
        "operationId": operation.operation_id,
        "semantics": operation.semantics,
        "securityRequired": operation.security_required,
        "parameters": schema.parameters(),
    });
    println!("{}", summary);
    Ok(())
}

fn run_request(source: &str, args: &QueryArgs, values: &[String]) -> Result<(), u8> {
    let document = load(source)?;
    let operation = locate(&document, args, true)?;
    let values = parse_values(values)?;

    let request = build_request(&OperationSchema::new(operation), &values).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    let json_output = serde_json::to_string(&request).map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", json_output);
    Ok(())
}

/// `key=value` pairs into a value bag. Values that parse as JSON keep their
/// type; anything else is a string.
fn parse_values(pairs: &[String]) -> Result<Value, u8> {
    let mut bag = Map::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            eprintln!("Error: expected KEY=VALUE, got '{}'", pair);
            return Err(2);
        };
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        bag.insert(key.to_string(), value);
    }
    Ok(Value::Object(bag))
}
