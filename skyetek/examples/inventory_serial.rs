//! Continuous inventory on a serial reader, stopped with Ctrl-C
//!
//! ```text
//! SKYETEK_PORT=/dev/ttyUSB0 cargo run --example inventory_serial --features serial
//! ```

use std::collections::HashSet;
use std::ops::ControlFlow;

use anyhow::Context;
use skyetek::{default_tag_type, Error, Reader, Tag};
use skyetek_transport::serial::DEFAULT_BAUD_RATE;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let port = std::env::var("SKYETEK_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());

    let mut reader = Reader::serial(&port, DEFAULT_BAUD_RATE);
    reader
        .open()
        .await
        .with_context(|| format!("opening reader on {}", port))?;

    let product = reader.product_code().await.context("reading product code")?;
    let tag = Tag::with_type(default_tag_type(skyetek::ProductFamily::from_code(&product)));
    let ports = reader.mux_port_count().await?;
    println!("Product {} with {}", product, ports);

    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.cancel();
        }
    });

    let mut seen = HashSet::new();
    'scan: for &port in ports.port_indices() {
        if ports.count() > 0 {
            reader.select_mux_port(port).await?;
        }

        let result = reader
            .inventory_tags(tag.clone(), true, &cancel, |tag| {
                if seen.insert(tag.clone()) {
                    println!("[port {}] {}", port, tag);
                }
                ControlFlow::Continue(())
            })
            .await;

        match result {
            Ok(_) => {}
            Err(Error::Cancelled) => break 'scan,
            Err(e) => eprintln!("Inventory on port {} failed: {}", port, e),
        }
    }

    println!("{} distinct tags", seen.len());
    reader.close().await?;

    Ok(())
}
