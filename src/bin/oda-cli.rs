use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use oda_client::OdaClient;
use oda_client::catalog;
use oda_client::sync::UpdatedSince;
use reqwest::Method;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "oda-cli",
    version,
    about = "Small async CLI for querying the Folketinget Open Data API"
)]
struct Cli {
    /// Base URL for the API. Defaults to the metadata service root.
    #[arg(long, env = "ODA_BASE_URL")]
    base_url: Option<String>,

    /// Bearer token sent in the Authorization header.
    #[arg(long, env = "ODA_ACCESS_TOKEN")]
    access_token: Option<String>,

    /// Emit compact JSON instead of pretty-printed output.
    #[arg(long)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List generated operation ids.
    Operations {
        /// Filter operations by substring match on operation id (case-insensitive).
        #[arg(long)]
        filter: Option<String>,
    },
    /// List entity sets with their keys and navigation properties.
    Entities {
        /// Order sets so referenced sets come before their referrers.
        #[arg(long)]
        dependency_order: bool,
    },
    /// Call an endpoint by operation id.
    Call(CallArgs),
    /// Send a raw HTTP request using method + path.
    Request(RequestArgs),
    /// Fetch the rows of an entity set updated after a timestamp.
    Updated(UpdatedArgs),
}

#[derive(Debug, Args)]
struct CallArgs {
    /// Operation id (for example: sagGetById).
    operation_id: String,

    /// Path parameter in form key=value. Repeat as needed.
    #[arg(long = "path-param", value_name = "KEY=VALUE")]
    path_param: Vec<String>,

    /// Query parameter in form key=value. Repeat as needed.
    #[arg(long = "query", value_name = "KEY=VALUE")]
    query: Vec<String>,

    #[command(flatten)]
    body: BodyInput,
}

#[derive(Debug, Args)]
struct RequestArgs {
    /// HTTP method (GET, POST, PATCH, DELETE, ...).
    method: String,

    /// Request path relative to the base URL (for example: /Sag(1)).
    path: String,

    /// Query parameter in form key=value. Repeat as needed.
    #[arg(long = "query", value_name = "KEY=VALUE")]
    query: Vec<String>,

    #[command(flatten)]
    body: BodyInput,
}

#[derive(Debug, Args)]
struct UpdatedArgs {
    /// Entity set name (for example: Sag or Aktør).
    entity_set: String,

    /// RFC 3339 timestamp; rows with a later `opdateringsdato` are returned.
    #[arg(long)]
    since: DateTime<Utc>,

    /// Rows requested per page.
    #[arg(long, default_value_t = oda_client::sync::DEFAULT_BATCH_SIZE)]
    batch_size: u32,

    /// Stop after this many pages.
    #[arg(long)]
    max_pages: Option<usize>,
}

#[derive(Debug, Args)]
struct BodyInput {
    /// JSON request body literal.
    #[arg(long, conflicts_with = "body_file")]
    body_json: Option<String>,

    /// Path to a file containing a JSON request body.
    #[arg(long, value_name = "PATH", conflicts_with = "body_json")]
    body_file: Option<PathBuf>,
}

/// Entry point for the async CLI.
///
/// Logs go to stderr, filtered by `RUST_LOG` (default `warn`), so stdout
/// stays valid JSON.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Catalog listings need no HTTP client.
    match &cli.command {
        Command::Operations { filter } => {
            print_operations(filter.as_deref());
            return Ok(());
        }
        Command::Entities { dependency_order } => {
            print_entity_sets(*dependency_order)?;
            return Ok(());
        }
        _ => {}
    }

    let mut client = match &cli.base_url {
        Some(url) => OdaClient::new(url)
            .with_context(|| format!("failed to create client with base URL '{url}'"))?,
        None => OdaClient::from_default_server()
            .context("failed to create client from the default server URL")?,
    };

    if let Some(token) = &cli.access_token {
        client = client.with_authorization_token(token.clone());
    }

    let output = match &cli.command {
        Command::Operations { .. } | Command::Entities { .. } => unreachable!("handled above"),
        Command::Call(args) => call_operation(&client, args)
            .await
            .with_context(|| format!("operation call failed: '{}'", args.operation_id))?,
        Command::Request(args) => send_request(&client, args)
            .await
            .with_context(|| format!("request failed: {} {}", args.method, args.path))?,
        Command::Updated(args) => fetch_updated(&client, args)
            .await
            .with_context(|| format!("incremental fetch failed for '{}'", args.entity_set))?,
    };

    print_json(&output, cli.compact).context("failed to print JSON output")?;
    Ok(())
}

/// Prints the generated operation catalog.
fn print_operations(filter: Option<&str>) {
    let filter = filter.map(str::to_lowercase);

    let operations: Vec<_> = OdaClient::operations()
        .iter()
        .filter(|operation| {
            filter
                .as_ref()
                .is_none_or(|needle| operation.operation_id.to_lowercase().contains(needle))
        })
        .collect();

    let (operation_id_width, method_width) =
        operations
            .iter()
            .fold((0usize, 0usize), |(id_max, method_max), operation| {
                (
                    id_max.max(operation.operation_id.chars().count()),
                    method_max.max(operation.method.len()),
                )
            });

    for operation in operations {
        println!(
            "{:<operation_id_width$}  {:<method_width$}  {}",
            operation.operation_id, operation.method, operation.path_template
        );
    }
}

fn print_entity_sets(dependency_order: bool) -> Result<()> {
    let names: Vec<&str> = if dependency_order {
        catalog::dependency_order()
    } else {
        catalog::entity_sets().iter().map(|set| set.name).collect()
    };
    let width = names
        .iter()
        .map(|name| name.chars().count())
        .max()
        .unwrap_or_default();

    for name in names {
        let set = catalog::entity_set(name)?;
        let navigations: Vec<String> = set
            .navigations
            .iter()
            .map(|navigation| {
                if navigation.collection {
                    format!("{}[]", navigation.name)
                } else {
                    navigation.name.to_owned()
                }
            })
            .collect();
        println!("{:<width$}  {}", set.name, navigations.join(", "));
    }
    Ok(())
}

/// Calls a generated operation by `operation_id`.
async fn call_operation(client: &OdaClient, args: &CallArgs) -> Result<Value> {
    let path_params = parse_pairs(&args.path_param, "--path-param")
        .context("failed to parse --path-param arguments")?;
    let query = parse_pairs(&args.query, "--query").context("failed to parse --query arguments")?;
    let body = parse_body(&args.body).context("failed to parse request body input")?;

    let value = client
        .call_operation(
            &args.operation_id,
            &borrow_pairs(&path_params),
            &borrow_pairs(&query),
            body,
        )
        .await
        .with_context(|| format!("operation '{}' returned an error", args.operation_id))?;
    Ok(value)
}

/// Sends a raw HTTP request using method + path.
///
/// This bypasses operation-id lookup and calls
/// `OdaClient::request_json_with_query` directly.
async fn send_request(client: &OdaClient, args: &RequestArgs) -> Result<Value> {
    let method = Method::from_str(&args.method)
        .with_context(|| format!("invalid HTTP method '{}'", args.method))?;
    let query = parse_pairs(&args.query, "--query").context("failed to parse --query arguments")?;
    let body = parse_body(&args.body).context("failed to parse request body input")?;

    let value = client
        .request_json_with_query(method, &args.path, &borrow_pairs(&query), body)
        .await
        .with_context(|| format!("HTTP request failed for path '{}'", args.path))?;
    Ok(value)
}

/// Collects updated rows page by page into one JSON array.
async fn fetch_updated(client: &OdaClient, args: &UpdatedArgs) -> Result<Value> {
    let mut pager = UpdatedSince::<Value>::new(&args.entity_set, args.since)?
        .batch_size(args.batch_size);

    let mut rows = Vec::new();
    let mut pages = 0;
    while args.max_pages.is_none_or(|max| pages < max) {
        let Some(page) = pager.next_page(client).await? else {
            break;
        };
        rows.extend(page);
        pages += 1;
    }
    tracing::info!(rows = rows.len(), pages, "incremental fetch finished");
    Ok(Value::Array(rows))
}

/// Parses repeated `key=value` arguments into owned key/value pairs.
///
/// Returns an error when a value does not include `=` or has an empty key.
fn parse_pairs(values: &[String], flag_name: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::with_capacity(values.len());
    for item in values {
        let Some((key, value)) = item.split_once('=') else {
            bail!("invalid {flag_name} value '{item}': expected key=value");
        };
        if key.is_empty() {
            bail!("invalid {flag_name} value '{item}': empty key");
        }
        pairs.push((key.to_owned(), value.to_owned()));
    }
    Ok(pairs)
}

fn borrow_pairs(pairs: &[(String, String)]) -> Vec<(&str, &str)> {
    pairs
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect()
}

/// Parses an optional JSON body from inline text or a file path.
fn parse_body(body: &BodyInput) -> Result<Option<Value>> {
    match (&body.body_json, &body.body_file) {
        (Some(raw), None) => serde_json::from_str(raw)
            .context("failed to parse JSON from --body-json")
            .map(Some),
        (None, Some(path)) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read --body-file '{}'", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| {
                    format!("failed to parse JSON in --body-file '{}'", path.display())
                })
                .map(Some)
        }
        (None, None) => Ok(None),
        (Some(_), Some(_)) => bail!("use only one of --body-json or --body-file"),
    }
}

/// Prints a JSON value either compact or pretty-formatted.
fn print_json(value: &Value, compact: bool) -> Result<()> {
    if compact {
        println!(
            "{}",
            serde_json::to_string(value).context("Failed to render JSON")?
        );
    } else {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("Failed to render JSON")?
        );
    }
    Ok(())
}
