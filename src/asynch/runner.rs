use core::sync::atomic::Ordering;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pubsub::ImmediatePublisher;
use embassy_time::{Instant, Timer};

use super::state::{State, URC_PUBLISHERS, URC_SUBSCRIBERS};
use crate::engine::{Device, Progress};
use crate::error::Error;
use crate::fmt::Debug2Format;
use crate::modules::Personality;
use crate::request::{Request, Response, Urc};
use crate::transport::Transport;

/// Background task owning the device.
///
/// You must call `.run()` in a background task for requests to be served.
/// All framing and classification happens here, interrupt handlers only
/// signal the [`State`].
pub struct Runner<'d, T: Transport, P: Personality, const URC_CAPACITY: usize> {
    device: Device<T, P>,
    state: &'d State<URC_CAPACITY>,
    urcs: ImmediatePublisher<
        'd,
        CriticalSectionRawMutex,
        Urc,
        URC_CAPACITY,
        URC_SUBSCRIBERS,
        URC_PUBLISHERS,
    >,
}

impl<'d, T: Transport, P: Personality, const URC_CAPACITY: usize> Runner<'d, T, P, URC_CAPACITY> {
    pub(crate) fn new(device: Device<T, P>, state: &'d State<URC_CAPACITY>) -> Self {
        Self {
            device,
            state,
            urcs: state.urcs.immediate_publisher(),
        }
    }

    pub fn device(&self) -> &Device<T, P> {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Device<T, P> {
        &mut self.device
    }

    pub async fn run(&mut self) -> ! {
        loop {
            match select(self.state.requests.receive(), self.state.rx.wait()).await {
                Either::First(request) => {
                    let result = self.execute(request).await;
                    self.publish_urcs();
                    self.state.responses.signal(result);
                    self.state.in_flight.store(false, Ordering::Release);
                }
                Either::Second(()) => {
                    self.on_rx();
                    self.publish_urcs();
                }
            }
        }
    }

    async fn execute(&mut self, request: Request) -> Result<Response, Error> {
        let mut progress = match self.device.begin(request, Instant::now())? {
            // The answer may already be buffered
            Progress::Waiting { .. } => self.device.poll(Instant::now()),
            other => other,
        };

        loop {
            match progress {
                Progress::Complete(result) => return result,
                Progress::Idle => return Err(Error::Protocol),
                Progress::Waiting { deadline } => {
                    select(self.state.rx.wait(), Timer::at(deadline)).await;
                    if self.state.take_internal_event() {
                        self.device.internal_event();
                    }
                    progress = self.device.poll(Instant::now());
                }
            }
        }
    }

    fn on_rx(&mut self) {
        if self.state.take_internal_event() {
            self.device.internal_event();
        }
        if let Err(e) = self.device.process_idle() {
            warn!("Idle input dropped: {:?}", e);
        }
    }

    fn publish_urcs(&mut self) {
        while let Some(urc) = self.device.next_urc() {
            debug!("URC {:?}", Debug2Format(&urc));
            self.urcs.publish_immediate(urc);
        }
    }
}
