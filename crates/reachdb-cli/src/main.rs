mod collect;
mod runs;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::collect::RunMode;
use crate::runs::RunsCommands;

#[derive(Debug, Parser)]
#[command(name = "reachdb")]
#[command(about = "Collect engagement metrics from configured platforms into Postgres")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Collect from every source in the sources file
    Collect {
        /// Collect once and exit, or keep collecting on the configured interval
        #[arg(long, value_enum, env = "REACHDB_RUN_MODE", default_value = "once")]
        mode: RunMode,
    },
    /// Inspect recorded collection runs
    Runs {
        #[command(subcommand)]
        command: RunsCommands,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("reachdb: no command given; see `reachdb --help`");
        return Ok(());
    };

    let config = reachdb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = reachdb_db::PoolConfig::from_app_config(&config);
    let pool = reachdb_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Collect { mode } => {
            reachdb_db::run_migrations(&pool).await?;
            collect::run_collect(pool, &config, mode).await?;
        }
        Commands::Runs {
            command: RunsCommands::List { platform, limit },
        } => runs::run_runs_list(&pool, platform, limit).await?,
        Commands::Runs {
            command: RunsCommands::Show { id },
        } => runs::run_runs_show(&pool, &id).await?,
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            reachdb_db::health_check(&pool).await?;
            println!("database reachable");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = reachdb_db::run_migrations(&pool).await?;
            println!("applied {applied} migrations");
        }
    }

    Ok(())
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, stopping collection");
}
