use core::sync::atomic::{AtomicBool, Ordering};

use super::state::{State, UrcSubscriber};
use crate::error::Error;
use crate::request::{Request, Response};

/// Application side of the preemptive model.
///
/// Cheap to copy, all copies talk to the same runner. One request is served
/// at a time, a second concurrent [`send`](Control::send) fails with
/// [`Error::Busy`] instead of queueing.
#[derive(Clone, Copy)]
pub struct Control<'d, const URC_CAPACITY: usize> {
    state: &'d State<URC_CAPACITY>,
}

/// Releases the in-flight flag if the request never reached the runner.
/// Once it has, the runner releases the flag after signalling the result.
struct Handoff<'d> {
    flag: &'d AtomicBool,
    armed: bool,
}

impl Drop for Handoff<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(false, Ordering::Release);
        }
    }
}

impl<'d, const URC_CAPACITY: usize> Control<'d, URC_CAPACITY> {
    pub(crate) fn new(state: &'d State<URC_CAPACITY>) -> Self {
        Self { state }
    }

    pub async fn send(&self, request: Request) -> Result<Response, Error> {
        if self.state.in_flight.swap(true, Ordering::AcqRel) {
            return Err(Error::Busy);
        }
        let mut handoff = Handoff {
            flag: &self.state.in_flight,
            armed: true,
        };

        // A caller that gave up earlier may have left its result behind
        self.state.responses.reset();
        self.state.requests.send(request).await;
        handoff.armed = false;
        self.state.responses.wait().await
    }

    /// A request is queued or running, possibly for a caller that already
    /// gave up waiting.
    pub fn is_busy(&self) -> bool {
        self.state.in_flight.load(Ordering::Acquire)
    }

    /// New URC listener. URCs of a request are published before its result
    /// is returned.
    pub fn subscribe(&self) -> Result<UrcSubscriber<'d, URC_CAPACITY>, Error> {
        self.state.subscribe()
    }
}
