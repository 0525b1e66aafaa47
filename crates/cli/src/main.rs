use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vl_cli::cli::simulate::SimulateOptions;
use vl_cli::cli::{Cli, Command, ConfigCommand};
use vl_domain::config::ObservabilityConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Shard { guild_id, shards } => {
            let (config, _) = vl_cli::cli::load_config()?;
            vl_cli::cli::shard::run(&config, guild_id, shards);
            Ok(())
        }
        Command::Simulate {
            guild,
            channel,
            no_server,
            timeout_secs,
        } => {
            let (config, _) = vl_cli::cli::load_config()?;
            init_tracing(&config.observability);
            let opts = SimulateOptions {
                guild,
                channel,
                no_server,
                timeout: timeout_secs.map(Duration::from_secs),
            };
            vl_cli::cli::simulate::run(&config, opts).await
        }
        Command::Reconnect {
            shard,
            failures,
            max_attempts,
        } => {
            let (config, _) = vl_cli::cli::load_config()?;
            init_tracing(&config.observability);
            vl_cli::cli::reconnect::run(&config, shard, failures, max_attempts).await
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = vl_cli::cli::load_config()?;
            let valid = vl_cli::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _config_path) = vl_cli::cli::load_config()?;
            vl_cli::cli::config::show(&config)
        }
        Command::Version => {
            println!("voxlink {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize tracing on stderr so stdout stays clean for command output.
///
/// `RUST_LOG` wins over the configured filter.
fn init_tracing(obs: &ObservabilityConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&obs.log_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    if obs.json_logs {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
