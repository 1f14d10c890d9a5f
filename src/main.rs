use clap::Parser;

/// Wasel live order-status notification relay.
#[derive(Parser)]
#[command(name = "wasel", version)]
struct Cli {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 4000)]
    port: u16,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = wasel_relay::ServerConfig {
        host: cli.host,
        port: cli.port,
        ..Default::default()
    };

    let handle = match wasel_relay::start(config).await {
        Ok(h) => h,
        Err(e) => {
            tracing::error!(error = %e, "failed to start relay");
            std::process::exit(1);
        }
    };
    tracing::info!(port = handle.port, "relay ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl+c");
    }
    tracing::info!("shutting down");
}
