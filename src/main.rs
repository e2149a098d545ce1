//! Tabulum CLI Entry Point
//!
//! Two subcommands:
//! - `list` - Page through instances of an entity and print them as a table
//! - `list-translatable` - Same, reading translated fields in a given locale
//!
//! Tables and JSON envelopes go to stdout. Logs and error lines go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use tabulum::config::{self, ListDefaults};
use tabulum::{
    ErrorEnvelope, JsonRenderer, ListCommand, ListOptions, LocaleHook, SqliteSource, TableRenderer,
    TabulumError, TextTableRenderer,
};

/// Tabulum - Metadata-Driven Entity Inspector
#[derive(Parser)]
#[command(name = "tabulum")]
#[command(about = "List stored entity instances as a table, driven by entity metadata")]
#[command(version)]
struct Cli {
    /// Use this config file instead of the local/global lookup
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// SQLite database file (overrides the configured one)
    #[arg(long, global = true, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List instances of an entity
    List(ListArgs),

    /// List instances of an entity with translated fields
    ListTranslatable {
        #[command(flatten)]
        args: ListArgs,

        /// Locale to read translated fields in [default: en_US]
        #[arg(long)]
        locale: Option<String>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::List(_) => "list",
            Self::ListTranslatable { .. } => "list-translatable",
        }
    }

    fn args(&self) -> &ListArgs {
        match self {
            Self::List(args) | Self::ListTranslatable { args, .. } => args,
        }
    }
}

#[derive(Args)]
struct ListArgs {
    /// Entity identifier, e.g. "App\Entity\User" [default: defaults.entity from config]
    entity: Option<String>,

    /// Maximum number of instances [default: 10]
    #[arg(long)]
    limit: Option<usize>,

    /// Number of instances to skip [default: 0]
    #[arg(long)]
    offset: Option<usize>,

    /// Print every association as N/A without loading it [default: on]
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = parse_bool_like
    )]
    associations_ignore: Option<bool>,

    /// Maximum number of items printed per collection association [default: 10]
    #[arg(long)]
    associations_limit: Option<usize>,

    /// strftime pattern for date/time fields [default: %Y-%m-%d %H:%M:%S]
    #[arg(long)]
    date_format: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

/// Accept the usual spellings of a boolean option value
fn parse_bool_like(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected one of 1/0/true/false/yes/no/on/off, got '{other}'")),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A subscriber may already be installed when embedded; keep that one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run(cli: &Cli) -> anyhow::Result<String> {
    let started = Instant::now();
    let args = cli.command.args();

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(database) = &cli.database {
        config.database = Some(database.clone());
    }

    let locale = match &cli.command {
        Commands::ListTranslatable { locale, .. } => locale.clone(),
        Commands::List(_) => None,
    };
    let overrides = ListDefaults {
        entity: args.entity.clone(),
        limit: args.limit,
        offset: args.offset,
        associations_ignore: args.associations_ignore,
        associations_limit: args.associations_limit,
        date_format: args.date_format.clone(),
        locale,
    };
    let options = ListOptions::resolve(&overrides, &config.defaults)?;

    let source = SqliteSource::from_config(&config)?;
    let mut command = ListCommand::new(source);
    if matches!(cli.command, Commands::ListTranslatable { .. }) {
        let hook = LocaleHook::new(&options.locale)
            .with_default_locale(config.translation_settings().default_locale);
        command = command.with_hook(Box::new(hook));
    }

    let table = command.execute(&options).await?;

    let rendered = match args.format {
        OutputFormat::Table => TextTableRenderer.render(&table)?,
        OutputFormat::Json => {
            let execution_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            JsonRenderer::new(command.engine_name(), cli.command.name(), execution_ms)
                .render(&table)?
        }
    };

    Ok(rendered)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(rendered) => {
            print!("{rendered}");
            if cli.command.args().format == OutputFormat::Json {
                println!();
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            let tabulum_err = err.downcast_ref::<TabulumError>();
            tracing::debug!(error = ?err, "command failed");

            match (cli.command.args().format, tabulum_err) {
                (OutputFormat::Json, Some(e)) => {
                    let envelope = ErrorEnvelope::from_error("sqlite", cli.command.name(), e);
                    match serde_json::to_string(&envelope) {
                        Ok(json) => println!("{json}"),
                        Err(_) => eprintln!("[ERROR] {}", e.message()),
                    }
                }
                (_, Some(e)) => eprintln!("[ERROR] {}", e.message()),
                (_, None) => eprintln!("[ERROR] {err:#}"),
            }

            ExitCode::from(tabulum_err.map_or(2, TabulumError::exit_code))
        }
    }
}
