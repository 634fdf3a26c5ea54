//! Bus node on a serial port, answering each command with its own payload.
//!
//! Usage: echo_node [PORT] [ADDRESS]
//!
//! The transceiver's driver enable is expected on RTS.

use std::cell::RefCell;
use std::convert::Infallible;
use std::io::{Read, Write};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use embedded_hal::digital::{ErrorType, OutputPin};
use log::{info, warn};
use serialport::SerialPort;

use commbus::hal::{Serial, StdClock};
use commbus::timing::DEFAULT_BAUD_RATE;
use commbus::{Address, CommBus};

struct Port(Box<dyn SerialPort>);

impl Serial for Port {
    fn read_byte(&mut self) -> Option<u8> {
        match self.0.bytes_to_read() {
            Ok(0) => None,
            Ok(_) => {
                let mut buf = [0];
                match self.0.read(&mut buf) {
                    Ok(1) => Some(buf[0]),
                    _ => None,
                }
            }
            Err(e) => {
                warn!("Serial port error: {}", e);
                None
            }
        }
    }

    fn write_byte(&mut self, byte: u8) {
        if let Err(e) = self.0.write_all(&[byte]) {
            warn!("Serial port write failed: {}", e);
        }
    }
}

/// Driver enable wired to the RTS line of the port.
struct Rts(Box<dyn SerialPort>);

impl ErrorType for Rts {
    type Error = Infallible;
}

impl OutputPin for Rts {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if let Err(e) = self.0.write_request_to_send(false) {
            warn!("Failed to clear RTS: {}", e);
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if let Err(e) = self.0.write_request_to_send(true) {
            warn!("Failed to set RTS: {}", e);
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args();
    args.next(); // Skip program name
    let port = args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let address = match args.next() {
        Some(a) => a.parse::<u8>().context("Address must be a number")?,
        None => 9,
    };
    let address = Address::new(address).context("Address must be 0-15")?;

    let serial = serialport::new(&port, DEFAULT_BAUD_RATE)
        .timeout(Duration::from_millis(1))
        .open()
        .with_context(|| format!("Failed to open serial port {}", port))?;
    let rts = serial.try_clone().context("Failed to clone serial port")?;

    let last_command = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&last_command);
    let mut node = CommBus::new(
        address,
        Port(serial),
        Rts(rts),
        StdClock::new(),
        move |cmd: &[u8]| *sink.borrow_mut() = Some(cmd.to_vec()),
    );
    info!("Node {} listening on {}", address, port);

    loop {
        node.update();
        if let Some(cmd) = last_command.borrow_mut().take() {
            info!("Command {:02x?}", cmd);
            node.set_response(&cmd)?;
        }
        if !node.is_busy() {
            std::thread::sleep(Duration::from_micros(100));
        }
    }
}
