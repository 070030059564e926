//! Interrupt side notifications.
//!
//! Receive interrupts and out-of-band modem events only bump atomics here.
//! All parsing happens later, from `poll` or the runner task.
use core::sync::atomic::{AtomicU16, AtomicU8, Ordering};

use crate::client::Handle;
use crate::config::{DeviceType, MAX_HANDLES};

pub struct Notifier {
    rx: [AtomicU16; MAX_HANDLES],
    events: AtomicU8,
}

impl Notifier {
    pub const fn new() -> Self {
        #[allow(clippy::declare_interior_mutable_const)]
        const ZERO: AtomicU16 = AtomicU16::new(0);
        Self {
            rx: [ZERO; MAX_HANDLES],
            events: AtomicU8::new(0),
        }
    }

    /// A message, or at least some bytes, arrived for `handle`.
    pub fn notify_rx(&self, handle: Handle) {
        if let Some(counter) = self.rx.get(handle.index()) {
            counter.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Takes the number of notifications since the last call.
    pub fn take_rx(&self, handle: Handle) -> u16 {
        self.rx
            .get(handle.index())
            .map(|c| c.swap(0, Ordering::AcqRel))
            .unwrap_or(0)
    }

    pub fn notify_internal_event(&self, device_type: DeviceType) {
        self.events.fetch_or(device_type.bit(), Ordering::AcqRel);
    }

    /// Takes the event bitmask, one bit per [`DeviceType`].
    pub fn take_internal_events(&self) -> u8 {
        self.events.swap(0, Ordering::AcqRel)
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
