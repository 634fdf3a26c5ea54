use std::collections::VecDeque;
use std::io::{Error, ErrorKind};
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::Duration;

use commbus::hal::Serial;

/// Half-duplex line shared between threads. Every byte written by an
/// interface is received by all interfaces, the writer included.
#[derive(Default)]
pub struct Rs485Bus {
    interfaces: Mutex<Vec<Weak<BusInterfaceLink>>>,
    eof: AtomicBool,
}

impl Rs485Bus {
    pub fn new() -> Arc<Rs485Bus> {
        Default::default()
    }

    /// Make blocked readers return end of file.
    pub fn disconnect(&self) {
        self.eof.store(true, SeqCst);
        for link in self.interfaces.lock().unwrap().iter() {
            if let Some(link) = link.upgrade() {
                link.rx_condvar.notify_all();
            }
        }
    }

    pub fn new_interface(self: &Arc<Self>) -> BusInterface {
        let link = Arc::new(BusInterfaceLink::default());
        self.interfaces.lock().unwrap().push(Arc::downgrade(&link));
        BusInterface {
            bus: Arc::clone(self),
            link,
            timeout: Duration::from_millis(100),
            do_read_error: false,
            do_write_error: false,
        }
    }

    fn send(&self, byte: u8) {
        let interfaces = self.interfaces.lock().unwrap();
        for weak in interfaces.iter() {
            if let Some(link) = weak.upgrade() {
                link.rx.lock().unwrap().push_back(byte);
                link.rx_condvar.notify_all();
            }
        }
    }
}

#[derive(Default)]
struct BusInterfaceLink {
    rx: Mutex<VecDeque<u8>>,
    rx_condvar: Condvar,
}

/// One transceiver on an [`Rs485Bus`].
///
/// As a [`Serial`] it never blocks, like a UART polled by a node. As
/// `std::io::Read` it blocks for up to `timeout`, like a serial port opened
/// by a host.
pub struct BusInterface {
    bus: Arc<Rs485Bus>,
    link: Arc<BusInterfaceLink>,
    pub timeout: Duration,
    pub do_read_error: bool,
    pub do_write_error: bool,
}

impl Serial for BusInterface {
    fn read_byte(&mut self) -> Option<u8> {
        self.link.rx.lock().unwrap().pop_front()
    }

    fn write_byte(&mut self, byte: u8) {
        self.bus.send(byte);
    }
}

impl std::io::Read for BusInterface {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            panic!("Testsuite called read with zero length buffer.")
        }
        if self.do_read_error {
            self.do_read_error = false;
            return Err(Error::new(ErrorKind::PermissionDenied, "IO read error"));
        }

        let rx = self.link.rx.lock().expect("Read mutex is poisoned");
        let (mut rx, _) = self
            .link
            .rx_condvar
            .wait_timeout_while(rx, self.timeout, |rx| {
                rx.is_empty() && !self.bus.eof.load(SeqCst)
            })
            .expect("Mutex lock failed");

        if rx.is_empty() {
            return if self.bus.eof.load(SeqCst) {
                Ok(0)
            } else {
                Err(Error::new(ErrorKind::TimedOut, "IO read timeout"))
            };
        }
        let len = buf.len().min(rx.len());
        for (dst, src) in buf.iter_mut().zip(rx.drain(..len)) {
            *dst = src;
        }
        Ok(len)
    }
}

impl std::io::Write for BusInterface {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.do_write_error {
            self.do_write_error = false;
            return Err(Error::new(ErrorKind::PermissionDenied, "IO write error"));
        }
        for byte in buf {
            self.bus.send(*byte);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
