//! Linkstore CLI - link fields, title caches and sorted paging over SQLite

mod commands;

use clap::{Args, Parser, Subcommand};
use linkstore::config::{self, LinkstoreConfig};
use linkstore::output::{emit_error, OutputMode};
use linkstore::storage::SqliteStore;
use linkstore::{FieldType, OrderSpec};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "linkstore")]
#[command(version)]
#[command(about = "Bidirectional link fields and consistent title caches for SQLite tables")]
#[command(long_about = r#"
Linkstore keeps relational state consistent on top of a plain SQLite file:
  • Paired link fields mirrored through lk_<owner>_<target> tables
  • <column>__title caches refreshed on every link or title change
  • Deterministic sorting and paging of arbitrary SELECTs

Example usage:
  linkstore init
  linkstore table create books --display Books
  linkstore field add books Authors --type link --target authors
  linkstore cell set books cl_ab12cd34 <row-id> a1,a2
  linkstore rows books --sort title:desc --limit 20
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    /// Path to the database file (overrides linkstore.toml)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write linkstore.toml and create the database
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,

        /// Default page size for `rows`
        #[arg(long)]
        page_size: Option<u64>,
    },

    /// Manage data tables
    #[command(subcommand)]
    Table(TableCommand),

    /// Manage rows
    #[command(subcommand)]
    Row(RowCommand),

    /// Manage fields
    #[command(subcommand)]
    Field(FieldCommand),

    /// Read or write single cells
    #[command(subcommand)]
    Cell(CellCommand),

    /// Print one page of a table
    Rows {
        table: String,

        /// Sort key, `column` or `column:desc`; repeatable
        #[arg(short, long = "sort")]
        sort: Vec<OrderSpec>,

        #[arg(long, default_value = "0")]
        offset: u64,

        /// Page size (defaults to the configured page size)
        #[arg(short, long)]
        limit: Option<u64>,
    },

    /// Ensure a secondary index on one column
    Index { table: String, column: String },

    /// Show how a SELECT is rewritten
    #[command(subcommand)]
    Rewrite(RewriteCommand),

    /// Report the lifecycle state and mirror violations of a link field
    Check { table: String, column: String },

    /// Recompute the value and title caches of a link field
    Refresh { table: String, column: String },

    /// Show database statistics
    Stats,
}

#[derive(Subcommand)]
enum TableCommand {
    /// Create a data table
    Create {
        name: String,

        /// Display name (defaults to the table name)
        #[arg(long)]
        display: Option<String>,
    },

    /// List registered tables
    List,
}

#[derive(Subcommand)]
enum RowCommand {
    /// Insert a row
    Add {
        table: String,
        title: String,

        /// Row id (defaults to a generated UUID)
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Subcommand)]
enum FieldCommand {
    /// Add a field
    Add {
        table: String,
        name: String,

        #[arg(short = 't', long = "type", default_value = "text")]
        field_type: FieldType,

        /// Target table of a link field
        #[arg(long)]
        target: Option<String>,
    },

    /// List the fields of a table
    List { table: String },

    /// Rename a field (display name only)
    Rename {
        table: String,
        column: String,
        name: String,
    },

    /// Delete a field and its column
    Delete { table: String, column: String },
}

#[derive(Subcommand)]
enum CellCommand {
    /// Print a cell
    Get {
        table: String,
        column: String,
        row: String,
    },

    /// Write a cell; omit the value to clear it
    Set {
        table: String,
        column: String,
        row: String,
        value: Option<String>,
    },
}

#[derive(Args)]
struct SqlArg {
    /// A single SELECT statement
    sql: String,
}

#[derive(Subcommand)]
enum RewriteCommand {
    /// Project `_id` in display order
    SortedIds {
        #[command(flatten)]
        query: SqlArg,

        /// Ordering is applied later through a temp table
        #[arg(long)]
        temp_table: bool,
    },

    /// Project `_id`, always injecting the default ordering
    Compat {
        #[command(flatten)]
        query: SqlArg,
    },

    /// Page a query with LIMIT/OFFSET
    Page {
        #[command(flatten)]
        query: SqlArg,

        #[arg(long, default_value = "0")]
        offset: u64,

        #[arg(long, default_value = "50")]
        limit: u64,
    },

    /// Replace the ordering using a table's field types
    Order {
        table: String,

        #[command(flatten)]
        query: SqlArg,

        #[arg(short, long = "sort")]
        sort: Vec<OrderSpec>,
    },

    /// Whether the query has an ORDER BY
    HasOrder {
        #[command(flatten)]
        query: SqlArg,
    },

    /// Columns referenced by the ORDER BY
    Columns {
        #[command(flatten)]
        query: SqlArg,
    },
}

fn main() {
    let cli = Cli::parse();
    let mode = OutputMode::from_flag(cli.json);

    if let Err(e) = run(cli, mode) {
        emit_error(mode, "linkstore", &format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli, mode: OutputMode) -> anyhow::Result<()> {
    let config = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    // Initialize logging
    let filter = if cli.verbose || config.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let database = cli.database.clone().unwrap_or_else(|| config.database_path());

    if let Commands::Init { force, page_size } = cli.command {
        let config_path = cli.config.unwrap_or_else(config::default_config_path);
        let written = LinkstoreConfig {
            database: Some(database.display().to_string()),
            page_size,
            verbose: false,
        };
        return commands::run_init(mode, &config_path, &written, &database, force);
    }

    config::ensure_db_dir(&database)?;
    tracing::debug!(database = %database.display(), "opening store");
    let store = SqliteStore::open(&database)?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Table(TableCommand::Create { name, display }) => {
            commands::run_table_create(&store, mode, &name, display.as_deref())
        }
        Commands::Table(TableCommand::List) => commands::run_table_list(&store, mode),
        Commands::Row(RowCommand::Add { table, title, id }) => {
            commands::run_row_add(&store, mode, &table, &title, id.as_deref())
        }
        Commands::Field(FieldCommand::Add {
            table,
            name,
            field_type,
            target,
        }) => commands::run_field_add(&store, mode, &table, &name, field_type, target.as_deref()),
        Commands::Field(FieldCommand::List { table }) => commands::run_field_list(&store, mode, &table),
        Commands::Field(FieldCommand::Rename { table, column, name }) => {
            commands::run_field_rename(&store, mode, &table, &column, &name)
        }
        Commands::Field(FieldCommand::Delete { table, column }) => {
            commands::run_field_delete(&store, mode, &table, &column)
        }
        Commands::Cell(CellCommand::Get { table, column, row }) => {
            commands::run_cell_get(&store, mode, &table, &column, &row)
        }
        Commands::Cell(CellCommand::Set {
            table,
            column,
            row,
            value,
        }) => commands::run_cell_set(&store, mode, &table, &column, &row, value.as_deref()),
        Commands::Rows {
            table,
            sort,
            offset,
            limit,
        } => {
            let limit = limit.unwrap_or_else(|| config.page_size());
            commands::run_rows(&store, mode, &table, &sort, offset, limit)
        }
        Commands::Index { table, column } => commands::run_index(&store, mode, &table, &column),
        Commands::Rewrite(rewrite) => run_rewrite(&store, mode, rewrite),
        Commands::Check { table, column } => commands::run_check(&store, mode, &table, &column),
        Commands::Refresh { table, column } => commands::run_refresh(&store, mode, &table, &column),
        Commands::Stats => commands::run_stats(&store, mode, &database),
    }
}

fn run_rewrite(store: &SqliteStore, mode: OutputMode, rewrite: RewriteCommand) -> anyhow::Result<()> {
    use commands::Rewrite;

    let request = match rewrite {
        RewriteCommand::SortedIds { query, temp_table } => Rewrite::SortedIds {
            sql: query.sql,
            use_temp_table: temp_table,
        },
        RewriteCommand::Compat { query } => Rewrite::Compat { sql: query.sql },
        RewriteCommand::Page { query, offset, limit } => Rewrite::Page {
            sql: query.sql,
            offset,
            limit,
        },
        RewriteCommand::Order { table, query, sort } => Rewrite::Order {
            table,
            sql: query.sql,
            order_specs: sort,
        },
        RewriteCommand::HasOrder { query } => Rewrite::HasOrder { sql: query.sql },
        RewriteCommand::Columns { query } => Rewrite::Columns { sql: query.sql },
    };
    commands::run_rewrite(store, mode, request)
}
