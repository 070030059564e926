//! Cooperative front-end.
//!
//! [`AtCore`] owns a fixed table of devices. `send` busy-waits on the clock
//! until the request is done, so it is meant for super-loop firmware that
//! calls [`AtCore::poll`] and [`AtCore::poll_event`] from its main loop.
//!
//! Devices of different types keep their own personality, so a cellular
//! modem and a GNSS receiver with unrelated command tables can share one
//! registry.
use embassy_time::Instant;
use serde::{Deserialize, Serialize};

use crate::config::{DeviceDescriptor, MAX_HANDLES};
use crate::engine::{Device, Progress};
use crate::error::{Error, ErrorReport};
use crate::modules::Personality;
use crate::notifier::Notifier;
use crate::request::{Request, Response, Urc};
use crate::transport::Transport;

/// Handle of an open device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Handle(u8);

impl Handle {
    pub(crate) const fn new(index: u8) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// Application hooks of one device.
#[derive(Default, Clone, Copy)]
pub struct Callbacks {
    /// Input or an out-of-band event is waiting, call
    /// [`AtCore::poll_event`].
    pub event: Option<fn(Handle)>,
    pub urc: Option<fn(Handle, &Urc)>,
}

/// A registered device, bound to the personality it was opened with.
pub type DynDevice<'a, T> = Device<T, &'a mut dyn Personality>;

struct Slot<'a, T: Transport> {
    device: DynDevice<'a, T>,
    callbacks: Callbacks,
}

pub struct AtCore<'a, T: Transport> {
    slots: [Option<Slot<'a, T>>; MAX_HANDLES],
    notifier: &'a Notifier,
}

impl<'a, T: Transport> AtCore<'a, T> {
    /// Empty registry. Interrupt handlers report to `notifier`.
    pub fn init(notifier: &'a Notifier) -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            notifier,
        }
    }

    /// Registers a device and opens its channel.
    pub fn open(
        &mut self,
        descriptor: DeviceDescriptor,
        transport: T,
        personality: &'a mut dyn Personality,
        callbacks: Callbacks,
    ) -> Result<Handle, Error> {
        if self.slots.iter().flatten().any(|s| {
            s.device.descriptor().device_type == descriptor.device_type
        }) {
            return Err(Error::DeviceTypeInUse);
        }
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::RegistryFull)?;

        let mut device = Device::new(descriptor, transport, personality);
        device.open_channel()?;

        let handle = Handle::new(index as u8);
        info!("Opened {:?} as {:?}", descriptor.device_type, handle);
        self.slots[index] = Some(Slot { device, callbacks });
        Ok(handle)
    }

    fn slot(&mut self, handle: Handle) -> Result<&mut Slot<'a, T>, Error> {
        self.slots
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidHandle)
    }

    pub fn device(&self, handle: Handle) -> Result<&DynDevice<'a, T>, Error> {
        self.slots
            .get(handle.index())
            .and_then(Option::as_ref)
            .map(|s| &s.device)
            .ok_or(Error::InvalidHandle)
    }

    pub fn device_mut(&mut self, handle: Handle) -> Result<&mut DynDevice<'a, T>, Error> {
        self.slot(handle).map(|s| &mut s.device)
    }

    pub fn open_channel(&mut self, handle: Handle) -> Result<(), Error> {
        self.device_mut(handle)?.open_channel()
    }

    pub fn close_channel(&mut self, handle: Handle) -> Result<(), Error> {
        self.device_mut(handle)?.close_channel()
    }

    pub fn reset_context(&mut self, handle: Handle) -> Result<(), Error> {
        self.device_mut(handle)?.reset_context()
    }

    pub fn last_error(&self, handle: Handle) -> Result<Option<ErrorReport>, Error> {
        Ok(self.device(handle)?.last_error())
    }

    /// Runs `request` to completion.
    ///
    /// URCs raised while the request ran are delivered through the URC
    /// callback before this returns.
    pub fn send(&mut self, handle: Handle, request: Request) -> Result<Response, Error> {
        let slot = self.slot(handle)?;
        let device = &mut slot.device;

        let mut progress = device.begin(request, Instant::now())?;
        let result = loop {
            match progress {
                Progress::Complete(result) => break result,
                Progress::Idle => break Err(Error::Protocol),
                Progress::Waiting { .. } => progress = device.poll(Instant::now()),
            }
        };

        Self::deliver_urcs(handle, slot);
        result
    }

    fn deliver_urcs(handle: Handle, slot: &mut Slot<'a, T>) -> usize {
        let mut count = 0;
        while let Some(urc) = slot.device.next_urc() {
            debug!("URC {:?}", crate::fmt::Debug2Format(&urc));
            if let Some(cb) = slot.callbacks.urc {
                cb(handle, &urc);
            }
            count += 1;
        }
        count
    }

    /// Picks up interrupt notifications and tells the application which
    /// devices need [`poll_event`](Self::poll_event). Returns the number of
    /// devices signalled.
    pub fn poll(&mut self) -> usize {
        let events = self.notifier.take_internal_events();
        let mut signalled = 0;

        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(slot) = slot else { continue };
            let handle = Handle::new(index as u8);

            let event = events & slot.device.descriptor().device_type.bit() != 0;
            if event {
                slot.device.internal_event();
            }
            let rx = self.notifier.take_rx(handle);

            if rx > 0 || event || slot.device.has_pending_urc() {
                trace!("{:?}: {} rx notifications", handle, rx);
                if let Some(cb) = slot.callbacks.event {
                    cb(handle);
                }
                signalled += 1;
            }
        }
        signalled
    }

    /// Frames and classifies input received outside of a request, then
    /// delivers pending URCs. Returns the number of URCs delivered.
    pub fn poll_event(&mut self, handle: Handle) -> Result<usize, Error> {
        let slot = self.slot(handle)?;
        slot.device.process_idle()?;
        Ok(Self::deliver_urcs(handle, slot))
    }
}
