//! Cassandra CLI
//!
//! Parses load balancing policy expressions and checks clusters described by
//! a JSON config file or `CASSANDRA_*` environment variables.

use std::path::PathBuf;

use cassandra_bundle::policies::{DEFAULT_NAMESPACE, PolicyParser};
use cassandra_bundle::{
    CassandraBundle, CassandraConfig, CassandraHealthCheck, connect_from_config_with_retry,
    get_cluster_info, shutdown_signal,
};
use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv};
use eyre::{Result, WrapErr};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "cassandra-cli")]
#[command(about = "Inspect policy expressions and check Cassandra clusters")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a load balancing policy expression and print the result as JSON
    Policy {
        /// e.g. "TokenAwarePolicy(DCAwareRoundRobinPolicy('dc1'))"
        expression: String,

        /// Namespace for policy names written without one
        #[arg(short, long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },

    /// Connect and run the health check
    Check {
        /// JSON config file. Defaults to CASSANDRA_* environment variables.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print information about the cluster
    Info {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Hold a session open with metrics reporting until SIGINT/SIGTERM
    Run {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the Prometheus metrics on exit
        #[arg(long)]
        print_metrics: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<CassandraConfig> {
    let config = match path {
        Some(path) => CassandraConfig::from_json_file(path)
            .wrap_err_with(|| format!("Failed to load {}", path.display()))?,
        None => CassandraConfig::from_env()
            .wrap_err("Failed to load configuration from environment")?
            .validated()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    let cli = Cli::parse();

    match cli.command {
        Commands::Policy {
            expression,
            namespace,
        } => {
            let parser = PolicyParser::with_namespace(namespace);
            match parser.parse(&expression)? {
                Some(policy) => {
                    println!("{}", serde_json::to_string_pretty(&policy)?);
                    info!(driver_policy = %policy.build().name(), "Driver policy built");
                }
                None => {
                    warn!(%expression, "Expression does not name a policy");
                    println!("null");
                }
            }
        }

        Commands::Check { config } => {
            let config = load_config(config.as_ref())?;
            let session = connect_from_config_with_retry(&config, None).await?;

            let status = CassandraHealthCheck::new(session, &config).check().await;
            println!("{}", serde_json::to_string_pretty(&status)?);

            if !status.healthy {
                eyre::bail!("Cassandra cluster '{}' is unhealthy", config.cluster_name());
            }
        }

        Commands::Info { config } => {
            let config = load_config(config.as_ref())?;
            let session = connect_from_config_with_retry(&config, None).await?;

            let info = get_cluster_info(&session).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Run {
            config,
            print_metrics,
        } => {
            let config = load_config(config.as_ref())?;
            if config.metrics_enabled {
                observability::init_metrics().wrap_err("Failed to install metrics recorder")?;
            }

            let bundle = CassandraBundle::build(config).await?;
            info!("Session open, waiting for shutdown signal");

            shutdown_signal().await?;

            let outcome = bundle.shutdown().await;
            info!(?outcome, "Shutdown complete");

            if print_metrics {
                print!("{}", observability::render_metrics());
            }
        }
    }

    Ok(())
}
