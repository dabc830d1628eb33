use std::env;
use std::io;
use std::process::ExitCode;

use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use vend_core::Vendor;
use vend_core::config;
use vend_core::csv::{read_purchases, write_transactions};

#[tokio::main]
async fn main() -> ExitCode {
    // RUST_LOG may come from .env
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: vend <purchases.csv>");
        return ExitCode::from(2);
    };

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let config = match config::load_from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let orders = match read_purchases(path) {
        Ok(orders) => orders,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let (vendor, store) = Vendor::in_memory(&config);
    let (order_sender, order_receiver) = tokio::sync::mpsc::channel(16);

    let reader = tokio::spawn(async move {
        for result in orders {
            match result {
                Ok(order) => {
                    if order_sender.send(order).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    vendor.run(ReceiverStream::new(order_receiver)).await;
    if let Err(e) = reader.await {
        error!("reader task failed: {e}");
    }

    let records = store.all();
    if let Err(e) = write_transactions(io::stdout().lock(), &records) {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
