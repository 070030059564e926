//! Preemptive model.
//!
//! A [`Runner`] task owns the device and serves requests posted by any
//! number of [`Control`] copies, one at a time.
pub mod control;
pub mod runner;
pub mod state;

pub use control::Control;
pub use runner::Runner;
pub use state::{State, UrcSubscriber, URC_SUBSCRIBERS};

use crate::engine::Device;
use crate::error::Error;
use crate::modules::Personality;
use crate::transport::Transport;

/// Opens the device channel and splits it into the runner task and a
/// control handle.
pub fn new<'d, T: Transport, P: Personality, const URC_CAPACITY: usize>(
    state: &'d State<URC_CAPACITY>,
    mut device: Device<T, P>,
) -> Result<(Runner<'d, T, P, URC_CAPACITY>, Control<'d, URC_CAPACITY>), Error> {
    device.open_channel()?;
    Ok((Runner::new(device, state), Control::new(state)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceDescriptor;
    use crate::modules::GenericModem;
    use crate::registration::{RegType, Status};
    use crate::request::{Request, Response, SignalQuality, Urc, UrcCategory};
    use crate::test_helpers::{init_logger, MockTransport};
    use embassy_futures::block_on;
    use embassy_futures::join::join;
    use embassy_futures::select::{select, Either};
    use embassy_time::{Duration, Timer};

    fn device(transport: MockTransport) -> Device<MockTransport, GenericModem> {
        init_logger();
        Device::new(
            DeviceDescriptor::cellular_uart(),
            transport,
            GenericModem::default(),
        )
    }

    #[test]
    fn request_is_served_by_the_runner() {
        let state = State::<4>::new();
        let transport = MockTransport::new().expect(b"AT+CSQ\r", b"\r\n+CSQ: 20,0\r\n\r\nOK\r\n");
        let (mut runner, control) = new(&state, device(transport)).unwrap();

        block_on(async {
            match select(runner.run(), control.send(Request::GetSignalQuality)).await {
                Either::First(never) => never,
                Either::Second(result) => assert_eq!(
                    result,
                    Ok(Response::SignalQuality(SignalQuality { rssi: 20, ber: 0 }))
                ),
            }
        });
        assert!(!control.is_busy());
    }

    #[test]
    fn concurrent_send_is_busy() {
        let state = State::<4>::new();
        let transport = MockTransport::new().expect(b"AT\r", b"\r\nOK\r\n");
        let (mut runner, control) = new(&state, device(transport)).unwrap();

        block_on(async {
            let requests = join(
                control.send(Request::CheckConnection),
                control.send(Request::CheckConnection),
            );
            match select(runner.run(), requests).await {
                Either::First(never) => never,
                Either::Second((first, second)) => {
                    assert_eq!(first, Ok(Response::None));
                    assert_eq!(second, Err(Error::Busy));
                }
            }
        });
    }

    #[test]
    fn abandoned_request_keeps_the_runner_busy() {
        let state = State::<4>::new();
        let transport = MockTransport::new()
            .expect(b"AT+CSQ\r", b"")
            .expect(b"AT\r", b"\r\nOK\r\n");
        let (mut runner, control) = new(&state, device(transport)).unwrap();

        block_on(async {
            let caller = async {
                let abandoned = select(
                    control.send(Request::GetSignalQuality),
                    Timer::after(Duration::from_millis(10)),
                )
                .await;
                assert!(matches!(abandoned, Either::Second(())));
                assert!(control.is_busy());
                assert_eq!(
                    control.send(Request::CheckConnection).await,
                    Err(Error::Busy)
                );

                // The runner finishes the abandoned request on its own
                while control.is_busy() {
                    Timer::after(Duration::from_millis(5)).await;
                }
                control.send(Request::CheckConnection).await
            };
            match select(runner.run(), caller).await {
                Either::First(never) => never,
                Either::Second(result) => assert_eq!(result, Ok(Response::None)),
            }
        });
    }

    #[test]
    fn timeout_is_reported() {
        let state = State::<4>::new();
        let transport = MockTransport::new()
            .expect(b"AT\r", b"")
            .expect(b"AT\r", b"\r\nOK\r\n");
        let (mut runner, control) = new(&state, device(transport)).unwrap();

        block_on(async {
            let requests = async {
                let first = control.send(Request::CheckConnection).await;
                let second = control.send(Request::CheckConnection).await;
                (first, second)
            };
            match select(runner.run(), requests).await {
                Either::First(never) => never,
                Either::Second((first, second)) => {
                    assert_eq!(first, Err(Error::Timeout));
                    assert_eq!(second, Ok(Response::None));
                }
            }
        });
    }

    #[test]
    fn idle_urcs_are_published() {
        let state = State::<4>::new();
        let (mut runner, control) = new(&state, device(MockTransport::new())).unwrap();
        let mut urcs = control.subscribe().unwrap();

        runner
            .device_mut()
            .context_mut()
            .persist
            .subscribe(UrcCategory::NetworkRegistration);
        runner.device_mut().transport_mut().inject(b"\r\n+CREG: 5\r\n");
        state.notify_rx();

        block_on(async {
            match select(runner.run(), urcs.next_message_pure()).await {
                Either::First(never) => never,
                Either::Second(urc) => assert_eq!(
                    urc,
                    Urc::NetworkRegistration {
                        domain: RegType::Creg,
                        status: Status::Roaming
                    }
                ),
            }
        });
    }

    #[test]
    fn internal_event_is_forwarded() {
        let state = State::<4>::new();
        let (mut runner, control) = new(&state, device(MockTransport::new())).unwrap();
        let mut urcs = control.subscribe().unwrap();
        runner
            .device_mut()
            .context_mut()
            .persist
            .subscribe(UrcCategory::ModemEvent);
        state.notify_internal_event();

        block_on(async {
            match select(runner.run(), urcs.next_message_pure()).await {
                Either::First(never) => never,
                Either::Second(urc) => assert_eq!(urc, Urc::ModemEvent(1)),
            }
        });
    }
}
