//! Relay Worker - SQS consumer and SNS webhook receiver in one process.
//!
//! The consumer loop and the HTTP server run concurrently for the lifetime of
//! the process. Both forward to the sink configured by `REDIRECT_URL`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relay::aws::load_sdk_config;
use relay::web::{bootstrap_subscription, router};
use relay::{
    AppState, Config, ConsumerSettings, Forwarder, QueueConsumer, SnsSubscriptions, SqsQueue,
};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment may already be populated
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!(dotenv_loaded = dotenv_loaded, "relay_starting");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        queue = %config.queue_name,
        wait_time_seconds = config.wait_time_seconds,
        visibility_timeout_seconds = config.visibility_timeout_seconds,
        sink = %config.redirect_url,
        region = %config.aws_region,
        endpoint_override = config.aws_endpoint.is_some(),
        port = config.port,
        "config_loaded"
    );

    let forwarder = Forwarder::new(
        config.redirect_url.clone(),
        Duration::from_millis(config.request_timeout_ms),
    )
    .context("Failed to create HTTP client")?;

    let sdk_config = load_sdk_config(&config).await;
    let subscriptions = Arc::new(SnsSubscriptions::new(&sdk_config));

    if let Some(subscription_arn) = bootstrap_subscription(&*subscriptions, &config)
        .await
        .context("Failed to subscribe to SNS topic")?
    {
        info!(subscription_arn = %subscription_arn, "sns_subscription_bootstrapped");
    }

    // Start the consumer on its own task
    let consumer = QueueConsumer::new(
        SqsQueue::new(&sdk_config),
        forwarder.clone(),
        ConsumerSettings::from_config(&config),
    );
    let mut consumer_task = tokio::spawn(async move { consumer.run().await });

    // Build the router and bind
    let app = router(AppState::new(forwarder, subscriptions));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    let server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    };

    tokio::select! {
        result = server => {
            result.context("Server error")?;
            consumer_task.abort();
        }
        joined = &mut consumer_task => {
            // The consumer only stops when the queue cannot be resolved
            match joined {
                Ok(Err(e)) => {
                    error!(error = %e, "sqs_consumer_failed");
                    return Err(e).context("Failed to start queue consumer");
                }
                Ok(Ok(never)) => match never {},
                Err(e) => {
                    error!(error = %e, "sqs_consumer_panicked");
                    return Err(e).context("Queue consumer task failed");
                }
            }
        }
    }

    info!("relay_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
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
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("relay_shutting_down");
}
