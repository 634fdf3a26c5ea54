#![allow(dead_code)]

pub mod sync;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use commbus::hal::{Clock, Serial};
use commbus::{Address, CommBus};
use embedded_hal::digital::{ErrorType, OutputPin};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Low byte of the sum, computed independently of the crate.
pub fn sum8(data: &[u8]) -> u8 {
    (data.iter().map(|b| u32::from(*b)).sum::<u32>() & 0xff) as u8
}

/// Build a frame by hand.
pub fn frame(start: u8, address: u8, payload: &[u8]) -> Vec<u8> {
    let mut data = vec![start, (address << 4) | payload.len() as u8];
    data.extend_from_slice(payload);
    data.push(sum8(&data));
    data
}

pub fn command(address: u8, payload: &[u8]) -> Vec<u8> {
    frame(b'E', address, payload)
}

pub fn reply(address: u8, payload: &[u8]) -> Vec<u8> {
    frame(b'e', address, payload)
}

/// Manually advanced microsecond clock, shared by everything on a simulated bus.
#[derive(Clone, Default)]
pub struct ManualClock(Rc<Cell<u32>>);

impl ManualClock {
    pub fn new(start: u32) -> Self {
        Self(Rc::new(Cell::new(start)))
    }

    pub fn advance(&self, us: u32) {
        self.0.set(self.0.get().wrapping_add(us));
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u32 {
        self.0.get()
    }
}

/// A half-duplex line: every byte written by any port is received by all
/// ports, the writer included.
#[derive(Default)]
pub struct SharedBus {
    ports: RefCell<Vec<Rc<RefCell<VecDeque<u8>>>>>,
}

impl SharedBus {
    pub fn new() -> Rc<SharedBus> {
        Default::default()
    }

    pub fn new_port(self: &Rc<Self>) -> BusPort {
        let rx: Rc<RefCell<VecDeque<u8>>> = Default::default();
        self.ports.borrow_mut().push(Rc::clone(&rx));
        BusPort {
            bus: Rc::clone(self),
            rx,
            tx: Default::default(),
        }
    }

    fn send(&self, byte: u8) {
        for port in self.ports.borrow().iter() {
            port.borrow_mut().push_back(byte);
        }
    }
}

#[derive(Clone)]
pub struct BusPort {
    bus: Rc<SharedBus>,
    rx: Rc<RefCell<VecDeque<u8>>>,
    tx: Rc<RefCell<Vec<u8>>>,
}

impl BusPort {
    /// Transmit `data` as a whole burst, like the host does.
    pub fn send(&mut self, data: &[u8]) {
        for byte in data {
            self.write_byte(*byte);
        }
    }

    /// Everything this port has transmitted so far.
    pub fn transmitted(&self) -> Vec<u8> {
        self.tx.borrow().clone()
    }

    /// Remove and return everything received so far.
    pub fn take_received(&self) -> Vec<u8> {
        self.rx.borrow_mut().drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.rx.borrow().len()
    }
}

impl Serial for BusPort {
    fn read_byte(&mut self) -> Option<u8> {
        self.rx.borrow_mut().pop_front()
    }

    fn write_byte(&mut self, byte: u8) {
        self.tx.borrow_mut().push(byte);
        self.bus.send(byte);
    }
}

/// Line enable pin recording every change with its timestamp.
#[derive(Clone)]
pub struct RecordingPin {
    clock: ManualClock,
    history: Rc<RefCell<Vec<(u32, bool)>>>,
}

impl RecordingPin {
    pub fn new(clock: &ManualClock) -> Self {
        Self {
            clock: clock.clone(),
            history: Default::default(),
        }
    }

    pub fn history(&self) -> Vec<(u32, bool)> {
        self.history.borrow().clone()
    }

    pub fn is_high(&self) -> bool {
        self.history.borrow().last().map_or(false, |(_, high)| *high)
    }
}

impl ErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.history.borrow_mut().push((self.clock.now_us(), false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.history.borrow_mut().push((self.clock.now_us(), true));
        Ok(())
    }
}

pub type Node = CommBus<BusPort, RecordingPin, ManualClock, Box<dyn FnMut(&[u8])>>;

/// A node driver attached to a simulated bus, recording the commands it receives.
pub struct TestNode {
    pub node: Node,
    pub port: BusPort,
    pub pin: RecordingPin,
    pub clock: ManualClock,
    pub received: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl TestNode {
    pub fn new(bus: &Rc<SharedBus>, clock: &ManualClock, address: Address) -> Self {
        let port = bus.new_port();
        let pin = RecordingPin::new(clock);
        let received: Rc<RefCell<Vec<Vec<u8>>>> = Default::default();
        let sink = Rc::clone(&received);
        let on_receive: Box<dyn FnMut(&[u8])> =
            Box::new(move |cmd: &[u8]| sink.borrow_mut().push(cmd.to_vec()));
        let node = CommBus::new(address, port.clone(), pin.clone(), clock.clone(), on_receive);
        TestNode {
            node,
            port,
            pin,
            clock: clock.clone(),
            received,
        }
    }

    /// Let the node see a quiet bus for long enough to leave resynchronization.
    pub fn settle(&mut self) {
        for _ in 0..7 {
            self.clock.advance(1_000);
            self.node.update();
        }
    }

    /// Advance the clock in `step` increments for `duration`, updating after each.
    pub fn run_for(&mut self, duration: u32, step: u32) {
        let mut elapsed = 0;
        while elapsed < duration {
            self.clock.advance(step);
            self.node.update();
            elapsed += step;
        }
    }

    pub fn received(&self) -> Vec<Vec<u8>> {
        self.received.borrow().clone()
    }
}
