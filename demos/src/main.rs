//! Connect to one device by MAC address, walk its GATT tree, and print the attributes,
//! permission categories, and landmine categories found.

use blerecon::{scan_and_connect, CoreConfig, ScanMode, TaxonomyConfig};
use bluez_async::facade::BlueZFacade;
use bluez_async::{BluetoothSession, MacAddress, Transport};
use eyre::{Report, WrapErr};
use std::str::FromStr;
use std::time::Duration;

const OVERALL_TIMEOUT: Duration = Duration::from_secs(20);

#[tokio::main]
async fn main() -> Result<(), Report> {
    pretty_env_logger::init();

    let mut args = std::env::args().skip(1);
    let address = args.next().ok_or_else(|| eyre::eyre!("usage: walk <MAC> [mode]"))?;
    let address = MacAddress::from_str(&address).wrap_err("invalid MAC address")?;
    let mode = match args.next().as_deref() {
        None | Some("passive") => ScanMode::Passive,
        Some("naggy") => ScanMode::Naggy,
        Some("pokey") => ScanMode::Pokey,
        Some("bruteforce") => ScanMode::Bruteforce,
        Some(other) => return Err(eyre::eyre!("unknown scan mode: {}", other)),
    };

    let (dbus_handle, session) = BluetoothSession::new().await?;
    tokio::spawn(dbus_handle);

    let facade = BlueZFacade::new(session);
    let config = CoreConfig::default();
    let taxonomy = TaxonomyConfig::default();

    println!("scanning for {} in {:?} mode", address, mode);
    let result = scan_and_connect(
        &facade,
        &address,
        mode,
        Transport::Le,
        &config,
        &taxonomy,
        OVERALL_TIMEOUT,
    )
    .await
    .wrap_err("scan failed")?;

    println!("{:#?}", result);
    Ok(())
}
