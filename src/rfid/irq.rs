use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use linux_embedded_hal::sysfs_gpio::{self, Direction, Edge};
use linux_embedded_hal::Pin;
use log::{debug, error, warn};
use rc522::signal::{edge_signal, EdgeNotifier, EdgeSignal, SignalClosed};
use rc522::{EdgeWatch, IrqLine};

// How often the watcher thread checks whether it should stop
const POLL_TIMEOUT_MS: isize = 50;

/// Export `number` through sysfs and set its direction.
pub fn export_pin(number: u64, direction: Direction) -> Result<Pin> {
    let pin = Pin::new(number);
    pin.export()
        .with_context(|| format!("Failed to export gpio {}", number))?;
    while !pin.is_exported() {}
    // udev needs a moment to fix the permissions of the new files
    thread::sleep(Duration::from_millis(25));
    pin.set_direction(direction)
        .with_context(|| format!("Failed to set direction of gpio {}", number))?;
    Ok(pin)
}

#[derive(Debug)]
pub enum IrqError {
    Gpio(sysfs_gpio::Error),
    Closed(SignalClosed),
}

impl fmt::Display for IrqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrqError::Gpio(e) => write!(f, "irq gpio error: {}", e),
            IrqError::Closed(e) => write!(f, "irq watcher stopped: {}", e),
        }
    }
}

impl std::error::Error for IrqError {}

impl From<sysfs_gpio::Error> for IrqError {
    fn from(error: sysfs_gpio::Error) -> Self {
        IrqError::Gpio(error)
    }
}

/// The RC522 IRQ pin as a sysfs input
pub struct SysfsIrqLine {
    number: u64,
    pin: Pin,
}

impl SysfsIrqLine {
    pub fn open(number: u64) -> Result<SysfsIrqLine> {
        let pin = export_pin(number, Direction::In)?;
        Ok(SysfsIrqLine { number, pin })
    }
}

impl IrqLine for SysfsIrqLine {
    type Error = IrqError;
    type Watch = SysfsEdgeWatch;

    fn watch_falling_edge(&mut self) -> Result<SysfsEdgeWatch, IrqError> {
        self.pin.set_edge(Edge::FallingEdge)?;
        let poller = self.pin.get_poller()?;

        let (notifier, signal) = edge_signal();
        let stop = Arc::new(AtomicBool::new(false));
        let watcher_stop = stop.clone();
        let watcher = thread::spawn(move || watch_edges(poller, notifier, watcher_stop));

        Ok(SysfsEdgeWatch {
            pin: sysfs_gpio::Pin::new(self.number),
            signal,
            stop,
            watcher: Some(watcher),
        })
    }
}

fn watch_edges(mut poller: sysfs_gpio::PinPoller, notifier: EdgeNotifier, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::SeqCst) {
        match poller.poll(POLL_TIMEOUT_MS) {
            Ok(Some(_)) => {
                if !notifier.notify() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!("Polling irq line failed: {:?}", e);
                break;
            }
        }
    }
    debug!("irq watcher stopped");
}

/// Falling edge watch running on its own thread until dropped
pub struct SysfsEdgeWatch {
    pin: sysfs_gpio::Pin,
    signal: EdgeSignal,
    stop: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

impl EdgeWatch for SysfsEdgeWatch {
    type Error = IrqError;

    fn wait(&mut self, timeout: Duration) -> Result<bool, IrqError> {
        self.signal.wait(timeout).map_err(IrqError::Closed)
    }
}

impl Drop for SysfsEdgeWatch {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(watcher) = self.watcher.take() {
            if watcher.join().is_err() {
                warn!("irq watcher panicked");
            }
        }
        self.signal.clear();
        if let Err(e) = self.pin.set_edge(Edge::NoInterrupt) {
            warn!("Failed to clear irq edge: {:?}", e);
        }
    }
}
