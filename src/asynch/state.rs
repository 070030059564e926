use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::pubsub::{PubSubChannel, Subscriber};
use embassy_sync::signal::Signal;

use crate::error::Error;
use crate::request::{Request, Response, Urc};

/// Number of tasks that can listen for URCs at the same time.
pub const URC_SUBSCRIBERS: usize = 2;
pub(crate) const URC_PUBLISHERS: usize = 1;

pub type UrcSubscriber<'d, const URC_CAPACITY: usize> =
    Subscriber<'d, CriticalSectionRawMutex, Urc, URC_CAPACITY, URC_SUBSCRIBERS, URC_PUBLISHERS>;

/// Everything shared between the [`Runner`](super::runner::Runner), its
/// [`Control`](super::control::Control) handles and interrupt handlers.
///
/// Meant to live in a `static`.
pub struct State<const URC_CAPACITY: usize> {
    pub(crate) requests: Channel<CriticalSectionRawMutex, Request, 1>,
    pub(crate) responses: Signal<CriticalSectionRawMutex, Result<Response, Error>>,
    pub(crate) in_flight: AtomicBool,
    pub(crate) rx: Signal<CriticalSectionRawMutex, ()>,
    internal_event: AtomicBool,
    pub(crate) urcs: PubSubChannel<
        CriticalSectionRawMutex,
        Urc,
        URC_CAPACITY,
        URC_SUBSCRIBERS,
        URC_PUBLISHERS,
    >,
}

impl<const URC_CAPACITY: usize> State<URC_CAPACITY> {
    pub const fn new() -> Self {
        Self {
            requests: Channel::new(),
            responses: Signal::new(),
            in_flight: AtomicBool::new(false),
            rx: Signal::new(),
            internal_event: AtomicBool::new(false),
            urcs: PubSubChannel::new(),
        }
    }

    /// Wakes the runner, call from the receive interrupt. Nothing is parsed
    /// here.
    pub fn notify_rx(&self) {
        self.rx.signal(());
    }

    /// Out-of-band modem event, e.g. a ring indicator edge.
    pub fn notify_internal_event(&self) {
        self.internal_event.store(true, Ordering::Release);
        self.rx.signal(());
    }

    pub(crate) fn take_internal_event(&self) -> bool {
        self.internal_event.swap(false, Ordering::AcqRel)
    }

    pub fn subscribe(&self) -> Result<UrcSubscriber<'_, URC_CAPACITY>, Error> {
        self.urcs.subscriber().map_err(|_| Error::RegistryFull)
    }
}

impl<const URC_CAPACITY: usize> Default for State<URC_CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}
