mod api;
mod device;

use chrono::Utc;
use clap::Parser;
use device::{LitterBox, Scenario};
use tracing::{error, info};

/// Local stand-in for the vendor cloud, serving one simulated litter box
#[derive(Debug, Parser)]
#[command(name = "simulator")]
struct Args {
    #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:8090")]
    http_addr: String,

    #[arg(long, env = "SCENARIO", value_enum, default_value = "stuck")]
    scenario: Scenario,

    #[arg(long, env = "TUYA_DEVICE_ID", default_value = "sim-litterbox-01")]
    device_id: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("Starting vendor cloud simulator");
    info!("Device: {}, scenario: {:?}", args.device_id, args.scenario);

    let mut rng = rand::thread_rng();
    let device = LitterBox::new(
        args.device_id,
        args.scenario,
        Utc::now().timestamp_millis(),
        &mut rng,
    );
    let app = api::create_router(device);

    let listener = match tokio::net::TcpListener::bind(&args.http_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", args.http_addr, e);
            std::process::exit(1);
        }
    };

    info!("HTTP server listening on {}", args.http_addr);
    info!("Point the watchdog at it with TUYA_API_HOST=http://{}", args.http_addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap_or_else(|e| {
            error!("HTTP server error: {}", e);
        });
    });

    tokio::select! {
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
}
