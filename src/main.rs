use clap::Parser;
use tracing_subscriber::EnvFilter;
use unwindd_front::{eventloop, FrontendConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::process::ExitCode {
    let config = FrontendConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = eventloop::run(config).await {
        tracing::error!(error = %e, "unwindd-front exited with an error");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}
