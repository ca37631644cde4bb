//! `extdb` command line: run one gateway operation and print the result.
//!
//! Usage:
//!   extdb --config db.json list
//!   TYPE=mysql HOST=localhost USER=root DB=shop extdb find items --limit 5

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;

use extdb_rpc::{Collection, Field, Filter, FindQuery, Sort};

use crate::config::{read_env_config, read_file_config};
use crate::database::ConnectionManager;

#[derive(Parser)]
#[command(name = "extdb", version, about = "Schema and data gateway for MySQL and MongoDB")]
struct Cli {
    /// JSON connection config. Environment variables are read when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List collections; all of them when no id is given
    List { ids: Vec<String> },
    /// Create a collection from a JSON array of fields
    Create {
        id: String,
        #[arg(long)]
        fields: String,
    },
    /// Reconcile a collection with a JSON array of fields
    Update {
        id: String,
        #[arg(long)]
        fields: String,
    },
    /// Drop a collection
    Drop { id: String },
    /// Query rows
    Find {
        id: String,
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, default_value_t = 0)]
        skip: u64,
        #[arg(long, default_value_t = 50)]
        limit: u64,
    },
    /// Count rows
    Count {
        id: String,
        #[arg(long)]
        filter: Option<String>,
    },
    /// Check that the engine is reachable
    Ping,
}

pub fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => read_file_config(path)?,
        None => read_env_config(|key| std::env::var(key).ok())?,
    };
    let manager = ConnectionManager::new(config);

    if let Command::Ping = cli.command {
        let ok = manager.test_connection().await?;
        return print_json(&serde_json::json!({ "ok": ok }));
    }

    let gateway = manager.gateway().await?;
    tracing::info!("[CLI] Connected to {}", gateway.engine_name());

    match cli.command {
        Command::List { ids } => print_json(&gateway.schema.list(&ids).await?),
        Command::Create { id, fields } => {
            let fields: Vec<Field> = parse_json("--fields", &fields)?;
            print_json(&gateway.schema.create(Collection::new(&id, fields)).await?)
        }
        Command::Update { id, fields } => {
            let fields: Vec<Field> = parse_json("--fields", &fields)?;
            print_json(&gateway.schema.update(Collection::new(&id, fields)).await?)
        }
        Command::Drop { id } => print_json(&gateway.schema.delete(&id).await?),
        Command::Find {
            id,
            filter,
            sort,
            skip,
            limit,
        } => {
            let query = FindQuery {
                filter: parse_filter(filter.as_deref())?,
                sort: match sort.as_deref() {
                    Some(raw) => parse_json::<Sort>("--sort", raw)?,
                    None => Sort::new(),
                },
                skip,
                limit,
            };
            print_json(&gateway.data.find(&id, &query).await?)
        }
        Command::Count { id, filter } => {
            let filter = parse_filter(filter.as_deref())?;
            print_json(&gateway.data.count(&id, &filter).await?)
        }
        Command::Ping => Ok(()),
    }
}

fn parse_filter(raw: Option<&str>) -> Result<Filter> {
    match raw {
        Some(raw) => parse_json("--filter", raw),
        None => Ok(Filter::Empty),
    }
}

fn parse_json<T: DeserializeOwned>(flag: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).with_context(|| format!("invalid JSON in {flag}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use extdb_rpc::{FieldType, QueryOperator, SortDirection};

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_find_arguments() {
        let cli = Cli::try_parse_from([
            "extdb",
            "find",
            "items",
            "--filter",
            r#"{"condition":{"field":"qty","operator":"gt","value":2}}"#,
            "--limit",
            "5",
        ])
        .unwrap();
        let Command::Find { id, filter, limit, skip, .. } = cli.command else {
            panic!("expected find");
        };
        assert_eq!(id, "items");
        assert_eq!((skip, limit), (0, 5));
        assert_eq!(
            parse_filter(filter.as_deref()).unwrap(),
            Filter::condition("qty", QueryOperator::Gt, 2)
        );
    }

    #[test]
    fn test_parse_fields_and_sort() {
        let fields: Vec<Field> =
            parse_json("--fields", r#"[{"name":"title","type":"text","subtype":"string"}]"#).unwrap();
        assert_eq!(fields[0].field_type, FieldType::Text);

        let sort: Sort = parse_json("--sort", r#"[{"field":"qty","direction":"desc"}]"#).unwrap();
        assert_eq!(sort[0].direction, SortDirection::Desc);

        let err = parse_json::<Sort>("--sort", "nope").unwrap_err();
        assert_eq!(err.to_string(), "invalid JSON in --sort");
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["extdb", "list", "a", "b", "--config", "db.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("db.json")));
        assert!(matches!(cli.command, Command::List { ref ids } if ids.len() == 2));
    }
}
