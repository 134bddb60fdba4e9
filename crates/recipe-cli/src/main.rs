use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use recipe_application::{ExportFormat, SortKey, SortOrder};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "recipes")]
#[command(about = "Recipe sync - manage saved processing recipes", long_about = None)]
struct Cli {
    /// Config file to use instead of the platform location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved recipes
    List {
        /// Column to sort by
        #[arg(long, value_enum, default_value_t = SortArg::UpdateTime)]
        sort: SortArg,
        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,
        /// Whitespace separated search terms, all of which must match the name
        #[arg(long)]
        search: Option<String>,
    },
    /// Print a saved recipe as JSON
    Show { id: String },
    /// Copy a saved recipe into a new one
    Duplicate {
        id: String,
        /// Placeholder name of the tab receiving the copy
        #[arg(long, default_value = "Recipe copy")]
        placeholder: String,
    },
    /// Delete a saved recipe
    Delete { id: String },
    /// Export a saved recipe as a file
    Export {
        id: String,
        /// Output format: json or zip
        #[arg(long, default_value_t = ExportFormat::Zip)]
        format: ExportFormat,
        /// Directory the file is written to
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file location
    Path,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    UpdateTime,
    Name,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::UpdateTime => SortKey::UpdateTime,
            SortArg::Name => SortKey::Name,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let configs = commands::config_service(cli.config.as_deref());

    if let Commands::Config {
        action: ConfigAction::Path,
    } = cli.command
    {
        return commands::config::path(&configs);
    }

    let config = configs.get_config()?;
    commands::init_tracing(&config.log_level);
    let context = || commands::Context::bootstrap(&config);

    match cli.command {
        Commands::List { sort, asc, search } => {
            let order = if asc {
                SortOrder::Ascending
            } else {
                SortOrder::Descending
            };
            commands::recipes::list(&context().await?, sort.into(), order, search.as_deref())
                .await?
        }
        Commands::Show { id } => commands::recipes::show(&context().await?, &id).await?,
        Commands::Duplicate { id, placeholder } => {
            commands::recipes::duplicate(&context().await?, &id, &placeholder).await?
        }
        Commands::Delete { id } => commands::recipes::delete(&context().await?, &id).await?,
        Commands::Export { id, format, out } => {
            commands::recipes::export(&context().await?, &id, format, &out).await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&config)?,
            ConfigAction::Path => commands::config::path(&configs)?,
        },
    }

    Ok(())
}
