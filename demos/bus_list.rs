//! Scan the bus and list the nodes that answer.
//!
//! Usage: bus_list [PORT]

use std::time::Duration;

use anyhow::{Context, Result};

use commbus::host::io::{AutoDirection, Error, Host};
use commbus::timing::DEFAULT_BAUD_RATE;

const NODES: &[(u8, &str)] = &[
    (2, "Light node in score box"),
    (3, "Light node in play field"),
    (4, "Flipper node"),
    (5, "Jet bumpers node"),
    (6, "Kicker node"),
    (7, "Lane sensor node"),
    (8, "Target node"),
    (9, "Test node"),
];

const ECHO_COMMAND: [u8; 2] = [100, 20];

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args();
    args.next(); // Skip program name
    let port = args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    let serial = serialport::new(&port, DEFAULT_BAUD_RATE)
        .timeout(Duration::from_millis(1))
        .open()
        .with_context(|| format!("Failed to open serial port {}", port))?;
    let mut host = Host::new(serial, AutoDirection);

    println!();
    println!("Node Addr  Found  Description");
    println!("---------  -----  -----------");

    for (address, description) in NODES {
        let mut result = host.node_io(*address, &ECHO_COMMAND);
        if result.is_err() {
            std::thread::sleep(Duration::from_millis(500));
            result = host.node_io(*address, &ECHO_COMMAND);
        }
        match result {
            Ok(_) => println!("{:9}  Yes    {}", address, description),
            Err(Error::Io { source }) => return Err(source).context("Serial port failed"),
            Err(e) => {
                log::debug!("Node {}: {}", address, e);
                println!("{:9}         {}", address, description);
            }
        }
    }
    println!();
    Ok(())
}
