use clap::Parser;
use foodgram::{Application, Config, config::Command, telemetry};

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = foodgram::config::Args::parse();

    let config = Config::load(&args)?;

    // If --validate flag is set, exit successfully after config validation
    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_telemetry(config.enable_otel_export)?;

    tracing::debug!("{:?}", args);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let shutdown = shutdown_signal();
            Application::new(config).await?.serve(shutdown).await
        }
        Command::ImportTags { path } => {
            let pool = foodgram::setup_database(&config).await?;
            let count = foodgram::import::import_tags(&pool, &path).await?;
            println!("Imported {count} tags.");
            pool.close().await;
            telemetry::shutdown_telemetry();
            Ok(())
        }
        Command::ImportIngredients { path } => {
            let pool = foodgram::setup_database(&config).await?;
            let count = foodgram::import::import_ingredients(&pool, &path).await?;
            println!("Imported {count} ingredients.");
            pool.close().await;
            telemetry::shutdown_telemetry();
            Ok(())
        }
    }
}
