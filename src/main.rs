use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vecbench::app::query::{SearchParams, TableDataParams};
use vecbench::app::reaper::spawn_reaper;
use vecbench::app::registry::SessionRegistry;
use vecbench::app::Workbench;
use vecbench::domain::{DistanceMetric, Identifier, QueryVector, SessionId, SessionKey, UserId};
use vecbench::infra::{AppConfig, ManagerSettings, PgConnectionFactory, TomlSessionStore};
use vecbench::{error, logging};

/// How often `watch` re-verifies its session.
const WATCH_INTERVAL: Duration = Duration::from_secs(60);

/// Browse pgvector databases through managed, per-user connection sessions.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ./vecbench.toml, then the user config dir)
    #[arg(long, global = true, env = "VECBENCH_CONFIG")]
    config: Option<PathBuf>,

    /// Owner of the sessions being managed
    #[arg(long, global = true, env = "VECBENCH_USER", default_value = "default")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct TableArgs {
    /// Session id
    session: String,

    table: String,

    #[arg(long, default_value = "public")]
    schema: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage registered target databases
    Sessions {
        #[command(subcommand)]
        command: SessionsCommand,
    },
    /// Open (or verify) a session's connection pool
    Connect { session: String },
    /// List tables with vector columns
    Tables { session: String },
    /// Columns, dimensions, size, and indexes of one table
    Metadata {
        #[command(flatten)]
        target: TableArgs,
    },
    /// Page through a table
    Data {
        #[command(flatten)]
        target: TableArgs,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long)]
        sort_by: Option<String>,
        #[arg(long)]
        sort_order: Option<String>,
        #[arg(long)]
        tenant: Option<String>,
    },
    /// Text and/or vector similarity search
    Search {
        #[command(flatten)]
        target: TableArgs,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        search_column: Option<String>,
        #[arg(long)]
        vector_column: Option<String>,
        /// Query vector, e.g. "[0.1,0.2,0.3]"
        #[arg(long, value_parser = parse_vector)]
        vector: Option<QueryVector>,
        #[arg(long, default_value = "cosine")]
        metric: DistanceMetric,
        #[arg(long)]
        sort_by: Option<String>,
        #[arg(long)]
        sort_order: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        tenant: Option<String>,
        /// Equality filter, repeatable: --filter source=OP30.md
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
    /// Collection names of a table, or details of one collection with --id
    Collections {
        #[command(flatten)]
        target: TableArgs,
        #[arg(long)]
        id: Option<String>,
        #[arg(long, default_value = "collection_id")]
        id_column: String,
        #[arg(long, default_value = "name")]
        name_column: String,
    },
    /// Pool statistics of a session, connecting it if needed
    Stats { session: String },
    /// Keep a session connected until Ctrl-C
    Watch { session: String },
}

#[derive(Subcommand, Debug)]
enum SessionsCommand {
    List,
    Add { name: String, dsn: String },
    Remove { session: String },
}

fn parse_vector(raw: &str) -> Result<QueryVector, String> {
    QueryVector::parse_literal(raw).map_err(|e| e.to_string())
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(column, value)| (column.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("expected COLUMN=VALUE, got {:?}", raw))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

struct Context {
    workbench: Workbench,
    user: UserId,
}

impl Context {
    fn key(&self, session: &str) -> SessionKey {
        SessionKey::new(self.user.clone(), SessionId::from_string(session))
    }
}

async fn run(ctx: &Context, command: Command) -> Result<()> {
    let wb = &ctx.workbench;
    match command {
        Command::Sessions { command } => match command {
            SessionsCommand::List => print_json(&wb.list_sessions(&ctx.user)?),
            SessionsCommand::Add { name, dsn } => {
                print_json(&wb.create_session(&ctx.user, &name, &dsn)?)
            }
            SessionsCommand::Remove { session } => {
                wb.delete_session(&ctx.key(&session)).await?;
                Ok(())
            }
        },
        Command::Connect { session } => {
            let result = wb.connect(&ctx.key(&session)).await;
            print_json(&result)?;
            if result.connected {
                Ok(())
            } else {
                Err(eyre!("connection failed"))
            }
        }
        Command::Tables { session } => {
            print_json(&wb.list_vector_tables(&ctx.key(&session)).await?)
        }
        Command::Metadata { target } => print_json(
            &wb.table_metadata(&ctx.key(&target.session), &target.schema, &target.table)
                .await?,
        ),
        Command::Data {
            target,
            limit,
            offset,
            sort_by,
            sort_order,
            tenant,
        } => {
            let params = TableDataParams {
                schema: target.schema,
                table: target.table,
                limit,
                offset,
                sort_by,
                sort_order,
                tenant_filter: tenant,
            };
            print_json(&wb.table_data(&ctx.key(&target.session), &params).await?)
        }
        Command::Search {
            target,
            text,
            search_column,
            vector_column,
            vector,
            metric,
            sort_by,
            sort_order,
            limit,
            tenant,
            filters,
        } => {
            let params = SearchParams {
                schema: target.schema,
                table: target.table,
                text_query: text,
                search_column,
                vector_column,
                vector_query: vector.map(|v| v.to_vec()),
                metric,
                sort_by,
                sort_order,
                limit,
                tenant_filter: tenant,
                filters: filters.into_iter().collect(),
            };
            print_json(&wb.search(&ctx.key(&target.session), &params).await?)
        }
        Command::Collections {
            target,
            id,
            id_column,
            name_column,
        } => {
            let key = ctx.key(&target.session);
            match id {
                Some(id) => print_json(
                    &wb.collection_info(&key, &target.schema, &target.table, &id)
                        .await?,
                ),
                None => print_json(
                    &wb.collection_names(
                        &key,
                        &target.schema,
                        &target.table,
                        &id_column,
                        &name_column,
                    )
                    .await?,
                ),
            }
        }
        Command::Stats { session } => {
            print_json(&wb.connected_pool_stats(&ctx.key(&session)).await?)
        }
        Command::Watch { session } => watch(wb, &ctx.key(&session)).await,
    }
}

async fn watch(wb: &Workbench, key: &SessionKey) -> Result<()> {
    let result = wb.connect(key).await;
    print_json(&result)?;
    if !result.connected {
        return Err(eyre!("connection failed"));
    }

    let mut ticker = tokio::time::interval(WATCH_INTERVAL);
    ticker.tick().await;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!(session = %key, "Stopping watch");
                return Ok(());
            }
            _ = ticker.tick() => {
                let check = wb.connect(key).await;
                match (check.connected, wb.pool_stats(key).await) {
                    (true, Ok(stats)) => info!(
                        session = %key,
                        size = stats.size,
                        idle = stats.idle_size,
                        active = stats.active_connections,
                        "Session alive"
                    ),
                    (_, _) => warn!(session = %key, error = ?check.error, "Session check failed"),
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    error::install_hooks()?;

    let cli = Cli::parse();
    logging::init();

    let config = AppConfig::load(cli.config.as_deref())?;
    let store = match &config.store.path {
        Some(path) => TomlSessionStore::with_path(path.clone()),
        None => TomlSessionStore::new()?,
    };

    let factory = PgConnectionFactory::new(ManagerSettings {
        pool: config.pool.clone(),
        cache: config.cache.clone(),
        precise_count_threshold: config.query.precise_count_threshold,
        tenant_column: Identifier::parse(&config.query.tenant_column)?,
    });
    let registry = Arc::new(SessionRegistry::new(Arc::new(store), Arc::new(factory)));

    let shutdown = CancellationToken::new();
    let reaper = spawn_reaper(
        Arc::clone(&registry),
        config.reaper.clone(),
        shutdown.clone(),
    );

    let ctx = Context {
        workbench: Workbench::new(Arc::clone(&registry), &config.query)?,
        user: UserId::from_string(cli.user),
    };
    let outcome = run(&ctx, cli.command).await;

    shutdown.cancel();
    reaper.await?;
    for (key, _) in registry.list_live() {
        registry.evict(&key).await;
    }

    outcome
}
