//! Identify the first SkyeTek reader on USB

use skyetek::{default_tag_type, Reader};

#[tokio::main]
async fn main() -> skyetek::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    for path in skyetek_transport::HidApiReports::enumerate()? {
        println!("Found reader at {}", path);
    }

    let mut reader = Reader::first_usb()?;
    reader.open().await?;

    let info = reader.reader_info().await?;
    println!("{}", info);
    println!("Hardware version: {}", info.hardware_version);
    println!("Reader ID: {}", info.reader_id);
    println!("Default tag type: {}", default_tag_type(info.family()));

    let ports = reader.mux_port_count().await?;
    println!("Antenna: {}", ports);

    reader.close().await?;

    Ok(())
}
