use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use roshambo::config::{load_config, validate_config, ConfigError, ServiceConfig};
use roshambo::lifecycle::{self, Shutdown};
use roshambo::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "roshambo", version)]
#[command(about = "Rock-paper-scissors over HTTP, instrumented with OpenTelemetry", long_about = None)]
struct Args {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides `listener.bind_address`
    #[arg(long, env = "ROSHAMBO_BIND_ADDRESS")]
    bind: Option<String>,

    /// OTLP gRPC collector endpoint, overrides `telemetry.exporter_endpoint`
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    exporter_endpoint: Option<String>,
}

impl Args {
    fn resolve(self) -> Result<ServiceConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ServiceConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(endpoint) = self.exporter_endpoint {
            config.telemetry.exporter_endpoint = endpoint;
        }
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Args::parse().resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("roshambo: configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("roshambo: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = %config.telemetry.service_version,
        bind_address = %config.listener.bind_address,
        exporter_endpoint = %config.telemetry.exporter_endpoint,
        opponent = %config.game.opponent_move,
        "roshambo starting"
    );

    let shutdown = Shutdown::new();
    lifecycle::spawn_signal_listener(shutdown.clone());

    match lifecycle::run(config, shutdown.subscribe()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "roshambo exited with an error");
            eprintln!("roshambo: {e}");
            ExitCode::FAILURE
        }
    }
}
