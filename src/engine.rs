//! Transaction engine.
//!
//! [`Device`] holds everything belonging to one modem and runs requests as
//! a state machine driven from the outside: [`Device::begin`] starts a
//! request, [`Device::poll`] feeds it received bytes and the clock. Both
//! scheduling models sit on top of it, the blocking [`AtCore`] busy-waits
//! and the async runner sleeps until data arrives or the deadline passes.
//!
//! [`AtCore`]: crate::client::AtCore
use embassy_time::Instant;

use crate::command::{
    AnswerExpectation, CommandBuilder, CommandDescriptor, CommandParams, CommandType, Lut,
};
use crate::config::{DeviceDescriptor, MAX_STEPS};
use crate::context::ModemContext;
use crate::error::{Error, ErrorKind, ErrorReport};
use crate::fmt::{Debug2Format, LossyStr};
use crate::modules::{NextCommand, Personality};
use crate::parser::classify::classify;
use crate::parser::{Action, Classification, Ingress};
use crate::request::{Request, RequestId, Response, Urc};
use crate::transport::{LogicalChannel, Transport};

/// Where a request stands after a call into the engine.
#[derive(Debug, PartialEq, Eq)]
pub enum Progress {
    /// No request in flight
    Idle,
    /// Call [`Device::poll`] again when bytes arrive, at the latest at
    /// `deadline`
    Waiting { deadline: Instant },
    Complete(Result<Response, Error>),
}

struct Transaction {
    request: Request,
    step: u8,
    deadline: Instant,
    /// The channel switched to data mode while this request ran
    entered_data_mode: bool,
}

pub struct Device<T: Transport, P: Personality> {
    descriptor: DeviceDescriptor,
    transport: T,
    personality: P,
    ctx: ModemContext,
    ingress: Ingress,
    builder: CommandBuilder,
    params: CommandParams,
    channel_open: bool,
    txn: Option<Transaction>,
    last_error: Option<ErrorReport>,
}

impl<T: Transport, P: Personality> Device<T, P> {
    pub fn new(descriptor: DeviceDescriptor, transport: T, personality: P) -> Self {
        Self {
            descriptor,
            transport,
            personality,
            ctx: ModemContext::new(),
            ingress: Ingress::new(),
            builder: CommandBuilder::new(),
            params: CommandParams::new(),
            channel_open: false,
            txn: None,
            last_error: None,
        }
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn context(&self) -> &ModemContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ModemContext {
        &mut self.ctx
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn personality(&self) -> &P {
        &self.personality
    }

    pub fn is_open(&self) -> bool {
        self.channel_open
    }

    pub fn is_busy(&self) -> bool {
        self.txn.is_some()
    }

    /// Report of the last failed request.
    pub fn last_error(&self) -> Option<ErrorReport> {
        self.last_error
    }

    fn transport_error(e: T::Error) -> Error {
        error!("Transport failure: {:?}", Debug2Format(&e));
        Error::Transport
    }

    /// Opens the link and initializes the context.
    pub fn open_channel(&mut self) -> Result<(), Error> {
        if self.channel_open {
            return Ok(());
        }
        self.transport
            .open(&self.descriptor)
            .map_err(Self::transport_error)?;
        self.ingress.reset();
        self.ctx.persist.reset();
        self.ctx.reset();
        self.personality.init(&mut self.ctx);
        self.channel_open = true;
        Ok(())
    }

    /// Closes the link. A request in flight is dropped without a result.
    pub fn close_channel(&mut self) -> Result<(), Error> {
        if self.txn.take().is_some() {
            warn!("Channel closed with a request in flight");
        }
        self.channel_open = false;
        self.transport.close().map_err(Self::transport_error)
    }

    /// Resets framing and the request, command and socket contexts. The
    /// persistent context, pending URCs included, is left alone.
    pub fn reset_context(&mut self) -> Result<(), Error> {
        self.txn = None;
        self.ingress.reset();
        self.ctx.reset();
        self.personality.init(&mut self.ctx);
        self.transport.reset().map_err(Self::transport_error)
    }

    /// Starts `request`.
    pub fn begin(&mut self, request: Request, now: Instant) -> Result<Progress, Error> {
        if !self.channel_open {
            return Err(Error::ChannelClosed);
        }
        if self.txn.is_some() {
            return Err(Error::Busy);
        }

        let id = request.id();
        if id == RequestId::DataSuspend && !self.ctx.data_mode {
            self.last_error = Some(ErrorReport {
                kind: ErrorKind::Rejected,
                request: Some(id),
                ..ErrorReport::new()
            });
            return Err(Error::NotInDataMode);
        }

        debug!("Request {:?}", id);
        self.ctx.sid.start(id);
        self.ctx.cmd.clear();
        self.ctx.socket.reset();
        self.txn = Some(Transaction {
            request,
            step: 0,
            deadline: now,
            entered_data_mode: false,
        });
        Ok(self.issue_next(now))
    }

    /// Processes received bytes and the clock for the request in flight.
    pub fn poll(&mut self, now: Instant) -> Progress {
        if self.txn.is_none() {
            return Progress::Idle;
        }

        loop {
            let msg = match self.ingress.next_message(
                &mut self.transport,
                &mut self.ctx.automaton,
                &mut self.ctx.socket,
            ) {
                Ok(Some(msg)) => msg,
                Ok(None) => break,
                Err(e) => return self.complete(Err(e)),
            };
            let classification = classify(&mut self.personality, &mut self.ctx, msg);
            if let Some(done) = self.handle(classification, now) {
                return done;
            }
        }

        match &self.txn {
            Some(txn) if now >= txn.deadline => self.on_timeout(now),
            Some(txn) => Progress::Waiting {
                deadline: txn.deadline,
            },
            None => Progress::Idle,
        }
    }

    /// Frames and classifies input that arrives outside of a request.
    /// Returns the number of messages seen.
    pub fn process_idle(&mut self) -> Result<usize, Error> {
        if self.txn.is_some() || !self.channel_open || self.ctx.data_mode {
            return Ok(0);
        }
        let mut count = 0;
        while let Some(msg) = self.ingress.next_message(
            &mut self.transport,
            &mut self.ctx.automaton,
            &mut self.ctx.socket,
        )? {
            classify(&mut self.personality, &mut self.ctx, msg);
            count += 1;
        }
        Ok(count)
    }

    /// Takes the next pending URC.
    pub fn next_urc(&mut self) -> Option<Urc> {
        self.personality.get_urc(&mut self.ctx)
    }

    pub fn has_pending_urc(&self) -> bool {
        self.ctx.persist.has_pending()
    }

    pub fn internal_event(&mut self) {
        self.personality
            .on_internal_event(self.descriptor.device_type, &mut self.ctx);
    }

    /// Reacts to one classified message. `Some` when the request ended.
    fn handle(&mut self, classification: Classification, now: Instant) -> Option<Progress> {
        if classification.data_mode && !self.ctx.data_mode {
            info!("Entering data mode");
            if let Err(e) = self.select(LogicalChannel::Data) {
                return Some(self.complete(Err(e)));
            }
            self.ctx.data_mode = true;
            if let Some(txn) = self.txn.as_mut() {
                txn.entered_data_mode = true;
            }
        }

        match classification.action {
            action if action.is_terminal() => {
                let command = self.ctx.cmd.awaited?;
                let txn = self.txn.as_ref()?;
                let action =
                    self.personality
                        .terminate_command(&txn.request, &command, &mut self.ctx, action);
                match action {
                    Action::Error => {
                        let err = self.ctx.sid.error.modem_error().unwrap_or(Error::Protocol);
                        Some(self.complete(Err(err)))
                    }
                    Action::Final | Action::ForceEnd => match self.issue_next(now) {
                        Progress::Waiting { .. } => None,
                        done => Some(done),
                    },
                    _ => None,
                }
            }
            Action::ForceContinue => {
                let timeout = self.ctx.cmd.awaited.map(|c| c.timeout);
                if let (Some(txn), Some(timeout)) = (self.txn.as_mut(), timeout) {
                    txn.deadline = now + timeout;
                }
                None
            }
            _ => None,
        }
    }

    fn select(&mut self, channel: LogicalChannel) -> Result<(), Error> {
        self.transport
            .select(channel)
            .map_err(Self::transport_error)
    }

    fn on_timeout(&mut self, now: Instant) -> Progress {
        match self.ctx.cmd.answer {
            Some(AnswerExpectation::Optional) => {
                trace!("Optional answer timed out");
                self.issue_next(now)
            }
            _ => {
                warn!("Timeout waiting for {:?}", self.ctx.cmd.awaited_id());
                self.complete(Err(Error::Timeout))
            }
        }
    }

    /// Asks the personality for the next step and carries it out.
    fn issue_next(&mut self, now: Instant) -> Progress {
        let Some(txn) = self.txn.as_mut() else {
            return Progress::Idle;
        };
        if txn.step >= MAX_STEPS {
            error!("{:?} did not finish within {} commands", txn.request.id(), MAX_STEPS);
            return self.complete(Err(Error::Protocol));
        }
        let step = txn.step;
        txn.step += 1;

        let next = match self
            .personality
            .next_command(&txn.request, &mut self.ctx, step)
        {
            Ok(next) => next,
            Err(e) => return self.complete(Err(e)),
        };

        match next {
            NextCommand::Done => self.complete(Ok(())),
            NextCommand::Send {
                id,
                kind,
                answer,
                timeout,
            } => {
                let Some(command) = Lut::new(self.personality.lut()).by_id(id).copied() else {
                    error!("No table entry for {:?}", id);
                    return self.complete(Err(Error::Protocol));
                };
                match self.transmit(&command, kind, answer) {
                    Ok(()) => self.wait_until(now + timeout.unwrap_or(command.timeout)),
                    Err(e) => self.complete(Err(e)),
                }
            }
            NextCommand::WaitOnly { timeout, answer } => {
                self.ctx.cmd.answer = Some(answer);
                self.wait_until(now + timeout)
            }
        }
    }

    fn wait_until(&mut self, deadline: Instant) -> Progress {
        match self.txn.as_mut() {
            Some(txn) => {
                txn.deadline = deadline;
                Progress::Waiting { deadline }
            }
            None => Progress::Idle,
        }
    }

    fn transmit(
        &mut self,
        command: &CommandDescriptor,
        kind: CommandType,
        answer: AnswerExpectation,
    ) -> Result<(), Error> {
        let txn = self.txn.as_ref().ok_or(Error::Protocol)?;
        self.ctx.cmd.start(Some(*command), Some(kind), answer);
        self.params.clear();
        self.personality
            .build_params(&txn.request, command, &mut self.ctx, &mut self.params)?;

        let bytes = self.builder.build(command, kind, &self.params)?;
        debug!("Sending {:?}", LossyStr(bytes));
        self.transport.send(bytes).map_err(Self::transport_error)
    }

    /// Ends the request in flight.
    fn complete(&mut self, result: Result<(), Error>) -> Progress {
        let Some(txn) = self.txn.take() else {
            return Progress::Idle;
        };

        let mut result = match result {
            Ok(()) => Ok(self.personality.get_response(&txn.request, &mut self.ctx)),
            Err(e) => {
                warn!("{:?} failed: {:?}", txn.request.id(), e);
                let report = &mut self.ctx.sid.error;
                report.kind = e.into();
                if report.command.is_none() {
                    report.command = self.ctx.cmd.awaited_id();
                }
                self.ctx.abort();
                self.ingress.drop_partial();
                self.last_error = Some(self.personality.get_error(&txn.request, &mut self.ctx));
                Err(e)
            }
        };

        let leave_data_mode = txn.request.id() == RequestId::DataSuspend
            || (txn.entered_data_mode && result.is_err());
        if leave_data_mode && self.ctx.data_mode {
            info!("Back in command mode");
            match self.select(LogicalChannel::Command) {
                Ok(()) => self.ctx.data_mode = false,
                Err(e) if result.is_ok() => result = Err(e),
                Err(_) => {}
            }
        }

        self.ctx.cmd.clear();
        Progress::Complete(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandId;
    use crate::config::DeviceDescriptor;
    use crate::error::ModemError;
    use crate::modules::{GenericConfig, GenericModem};
    use crate::request::{ConnectionId, UrcCategory};
    use crate::test_helpers::{init_logger, run, MockTransport, SocketModem};
    use embassy_time::Duration;

    fn device<P: Personality>(personality: P, transport: MockTransport) -> Device<MockTransport, P> {
        init_logger();
        let mut device = Device::new(DeviceDescriptor::cellular_uart(), transport, personality);
        device.open_channel().unwrap();
        device
    }

    fn generic() -> GenericModem {
        GenericModem::new(GenericConfig {
            escape_guard: Duration::from_millis(20),
            ..GenericConfig::default()
        })
    }

    #[test]
    fn single_command_request() {
        let transport = MockTransport::new().expect(b"AT+CGATT?\r", b"\r\n+CGATT: 1\r\n\r\nOK\r\n");
        let mut dev = device(generic(), transport);
        assert_eq!(run(&mut dev, Request::GetAttachStatus), Ok(Response::AttachStatus(true)));
        assert_eq!(dev.transport().sent_count(), 1);
        assert!(dev.transport().is_done());
    }

    #[test]
    fn timeout_then_next_request_works() {
        struct Slow;
        static TABLE: &[CommandDescriptor] = &[CommandDescriptor::new(
            CommandId::custom(1),
            "+SLOW",
            Duration::from_millis(30),
        )];
        impl Personality for Slow {
            fn lut(&self) -> &'static [CommandDescriptor] {
                TABLE
            }
            fn next_command(
                &mut self,
                _: &Request,
                _: &mut ModemContext,
                step: u8,
            ) -> Result<NextCommand, Error> {
                Ok(match step {
                    0 => NextCommand::send(CommandId::custom(1), CommandType::Execution),
                    _ => NextCommand::Done,
                })
            }
        }

        let transport = MockTransport::new()
            .expect(b"AT+SLOW\r", b"")
            .expect(b"AT+SLOW\r", b"\r\nOK\r\n");
        let mut dev = device(Slow, transport);

        assert_eq!(run(&mut dev, Request::CheckConnection), Err(Error::Timeout));
        let report = dev.last_error().unwrap();
        assert_eq!(report.kind, ErrorKind::Timeout);
        assert_eq!(report.command, Some(CommandId::custom(1)));
        assert_eq!(report.request, Some(RequestId::CheckConnection));
        assert!(!dev.is_busy());

        assert_eq!(run(&mut dev, Request::CheckConnection), Ok(Response::None));
        assert_eq!(dev.transport().sent_count(), 2);
    }

    #[test]
    fn optional_answer_timeout_proceeds() {
        struct Probe;
        static TABLE: &[CommandDescriptor] = &[
            CommandDescriptor::new(CommandId::custom(1), "+A", Duration::from_millis(20)),
            CommandDescriptor::new(CommandId::custom(2), "+B", Duration::from_secs(1)),
        ];
        impl Personality for Probe {
            fn lut(&self) -> &'static [CommandDescriptor] {
                TABLE
            }
            fn next_command(
                &mut self,
                _: &Request,
                _: &mut ModemContext,
                step: u8,
            ) -> Result<NextCommand, Error> {
                Ok(match step {
                    0 => NextCommand::send(CommandId::custom(1), CommandType::Execution).optional(),
                    1 => NextCommand::send(CommandId::custom(2), CommandType::Execution),
                    _ => NextCommand::Done,
                })
            }
        }

        let transport = MockTransport::new()
            .expect(b"AT+A\r", b"")
            .expect(b"AT+B\r", b"\r\nOK\r\n");
        let mut dev = device(Probe, transport);
        assert_eq!(run(&mut dev, Request::CheckConnection), Ok(Response::None));
        assert_eq!(dev.transport().sent_count(), 2);
    }

    #[test]
    fn sent_commands_match_send_steps() {
        let transport = MockTransport::new()
            .expect(b"AT+CGDCONT=1,\"IP\",\"internet\"\r", b"\r\nOK\r\n");
        let mut dev = device(generic(), transport);
        let request = Request::DefinePdn {
            conid: ConnectionId(0),
            pdp_type: crate::command::types::PdpType::Ip,
            apn: crate::config::Apn::named("internet"),
        };
        assert_eq!(run(&mut dev, request), Ok(Response::None));
        assert_eq!(dev.transport().sent_count(), 1);
    }

    #[test]
    fn modem_error_aborts_with_report() {
        let transport = MockTransport::new().expect(b"AT+CGATT=1\r", b"\r\n+CME ERROR: 30\r\n");
        let mut dev = device(generic(), transport);
        assert_eq!(
            run(&mut dev, Request::Attach),
            Err(Error::Modem(ModemError::Cme(30)))
        );
        let report = dev.last_error().unwrap();
        assert_eq!(report.kind, ErrorKind::Modem);
        assert_eq!(report.modem, Some(ModemError::Cme(30)));
    }

    #[test]
    fn urc_during_request_is_drained_before_result() {
        let transport = MockTransport::new().expect(
            b"AT+CGATT?\r",
            b"\r\n+CEREG: 5,\"00AB\",\"0000CAFE\",7\r\n\r\n+CGATT: 0\r\n\r\nOK\r\n",
        );
        let mut dev = device(generic(), transport);
        dev.context_mut()
            .persist
            .subscribe(UrcCategory::NetworkRegistration);

        assert_eq!(run(&mut dev, Request::GetAttachStatus), Ok(Response::AttachStatus(false)));
        assert!(dev.has_pending_urc());
        assert!(matches!(dev.next_urc(), Some(Urc::NetworkRegistration { .. })));
        assert_eq!(dev.next_urc(), None);
    }

    #[test]
    fn data_mode_selects_channels_once() {
        let transport = MockTransport::new()
            .expect(b"ATD*99***1#\r", b"\r\nCONNECT 150000000\r\n")
            .expect(b"+++", b"\r\nOK\r\n");
        let mut dev = device(generic(), transport);

        assert_eq!(run(&mut dev, Request::DataDial(ConnectionId(0))), Ok(Response::None));
        assert!(dev.context().data_mode);
        assert_eq!(dev.transport().selects(), [LogicalChannel::Data]);

        assert_eq!(run(&mut dev, Request::DataSuspend), Ok(Response::None));
        assert!(!dev.context().data_mode);
        assert_eq!(
            dev.transport().selects(),
            [LogicalChannel::Data, LogicalChannel::Command]
        );
    }

    #[test]
    fn failed_suspend_still_returns_to_command_mode() {
        let transport = MockTransport::new()
            .expect(b"ATD*99***1#\r", b"\r\nCONNECT\r\n")
            .expect(b"+++", b"\r\nERROR\r\n");
        let mut dev = device(generic(), transport);
        run(&mut dev, Request::DataDial(ConnectionId(0))).unwrap();
        assert!(run(&mut dev, Request::DataSuspend).is_err());
        assert!(!dev.context().data_mode);
        assert_eq!(
            dev.transport().selects(),
            [LogicalChannel::Data, LogicalChannel::Command]
        );
    }

    #[test]
    fn suspend_outside_data_mode_is_rejected() {
        let mut dev = device(generic(), MockTransport::new());
        assert_eq!(
            dev.begin(Request::DataSuspend, Instant::now()),
            Err(Error::NotInDataMode)
        );
        assert_eq!(dev.transport().sent_count(), 0);
        assert!(dev.transport().selects().is_empty());
        assert_eq!(dev.last_error().unwrap().kind, ErrorKind::Rejected);
    }

    #[test]
    fn second_begin_is_busy() {
        let transport = MockTransport::new().expect(b"AT\r", b"");
        let mut dev = device(generic(), transport);
        assert!(matches!(
            dev.begin(Request::CheckConnection, Instant::now()),
            Ok(Progress::Waiting { .. })
        ));
        assert_eq!(
            dev.begin(Request::CheckConnection, Instant::now()),
            Err(Error::Busy)
        );
        assert_eq!(dev.transport().sent_count(), 1);
    }

    #[test]
    fn requests_on_closed_channel_fail() {
        let mut dev = device(generic(), MockTransport::new());
        dev.close_channel().unwrap();
        assert_eq!(
            dev.begin(Request::CheckConnection, Instant::now()),
            Err(Error::ChannelClosed)
        );
    }

    #[test]
    fn dial_without_connect_banner_is_rejected() {
        let transport = MockTransport::new().expect(b"ATD*99***1#\r", b"\r\nOK\r\n");
        let mut dev = device(generic(), transport);
        assert_eq!(
            run(&mut dev, Request::DataDial(ConnectionId(0))),
            Err(Error::Protocol)
        );
        assert!(!dev.context().data_mode);
    }

    #[test]
    fn socket_receive_surfaces_exactly_the_payload() {
        let transport = MockTransport::new().expect(
            b"AT+QIRD=1,16\r",
            b"\r\n+QIRD: 7\r\nOK\r\n\r\n\r\nOK\r\n",
        );
        let mut dev = device(SocketModem::new(), transport);
        let result = run(
            &mut dev,
            Request::SocketReceive {
                socket: crate::context::SocketId(1),
                max_len: 16,
            },
        );
        match result {
            Ok(Response::SocketData(data)) => assert_eq!(&data[..], b"OK\r\n\r\n\r"),
            other => panic!("unexpected {:?}", other),
        }
        // The LF of the final OK is still buffered
        dev.process_idle().unwrap();
        assert_eq!(
            dev.context().automaton.state(),
            crate::parser::SyntaxState::WaitingFirstChar
        );
    }

    #[test]
    fn socket_send_waits_for_prompt() {
        let transport = MockTransport::new()
            .expect(b"AT+QISEND=0,5\r", b"\r\n> ")
            .expect(b"hello", b"\r\nSEND OK\r\n");
        let mut dev = device(SocketModem::new(), transport);
        let mut data = heapless::Vec::new();
        data.extend_from_slice(b"hello").unwrap();
        assert_eq!(
            run(
                &mut dev,
                Request::SocketSend {
                    socket: crate::context::SocketId(0),
                    data
                }
            ),
            Ok(Response::SocketSent(5))
        );
    }

    #[test]
    fn terminate_hook_can_downgrade_success() {
        let transport = MockTransport::new().expect(b"AT+QICLOSE=2\r", b"\r\nOK\r\n");
        let mut dev = device(SocketModem::new(), transport);
        // Socket 2 was never opened, the test personality refuses the close
        assert_eq!(
            run(&mut dev, Request::SocketClose(crate::context::SocketId(2))),
            Err(Error::Protocol)
        );
    }

    #[test]
    fn endless_sequence_is_capped() {
        struct Endless;
        impl Personality for Endless {
            fn lut(&self) -> &'static [CommandDescriptor] {
                &[]
            }
            fn next_command(
                &mut self,
                _: &Request,
                _: &mut ModemContext,
                _: u8,
            ) -> Result<NextCommand, Error> {
                Ok(NextCommand::WaitOnly {
                    timeout: Duration::from_ticks(0),
                    answer: AnswerExpectation::Optional,
                })
            }
        }
        let mut dev = device(Endless, MockTransport::new());
        assert_eq!(run(&mut dev, Request::CheckConnection), Err(Error::Protocol));
    }

    #[test]
    fn reset_context_keeps_undelivered_urcs() {
        let mut dev = device(generic(), MockTransport::new());
        dev.context_mut()
            .persist
            .subscribe(UrcCategory::NetworkRegistration);
        dev.transport_mut().inject(b"\r\n+CREG: 5\r\n");
        dev.process_idle().unwrap();
        assert!(dev.has_pending_urc());

        let persist = &mut dev.context_mut().persist;
        persist.connections[0] = Some(crate::context::PdnConnection {
            cid: 1,
            ip: None,
            active: true,
        });
        persist.sockets[1].connected = true;

        dev.reset_context().unwrap();

        let persist = &dev.context().persist;
        assert!(persist.connections[0].is_some());
        assert!(persist.sockets[1].connected);
        assert!(dev.has_pending_urc());
        assert!(matches!(dev.next_urc(), Some(Urc::NetworkRegistration { .. })));
    }

    #[test]
    fn connect_outside_data_commands_is_rejected() {
        let transport = MockTransport::new().expect(b"AT+CGATT?\r", b"\r\nCONNECT\r\n");
        let mut dev = device(generic(), transport);
        assert_eq!(run(&mut dev, Request::GetAttachStatus), Err(Error::Protocol));
        assert!(!dev.context().data_mode);
        assert!(dev.transport().selects().is_empty());
    }

    #[test]
    fn failure_after_connect_returns_to_command_mode() {
        struct Dialer;
        static TABLE: &[CommandDescriptor] = &[CommandDescriptor::new(
            CommandId::custom(1),
            "D",
            Duration::from_secs(1),
        )
        .with_data_mode()];
        impl Personality for Dialer {
            fn lut(&self) -> &'static [CommandDescriptor] {
                TABLE
            }
            fn next_command(
                &mut self,
                _: &Request,
                _: &mut ModemContext,
                step: u8,
            ) -> Result<NextCommand, Error> {
                Ok(match step {
                    0 => NextCommand::send(CommandId::custom(1), CommandType::Execution),
                    1 => NextCommand::WaitOnly {
                        timeout: Duration::from_millis(20),
                        answer: AnswerExpectation::Mandatory,
                    },
                    _ => NextCommand::Done,
                })
            }
        }

        let transport = MockTransport::new().expect(b"ATD\r", b"\r\nCONNECT\r\n");
        let mut dev = device(Dialer, transport);
        assert_eq!(run(&mut dev, Request::CheckConnection), Err(Error::Timeout));
        assert!(!dev.context().data_mode);
        assert_eq!(
            dev.transport().selects(),
            [LogicalChannel::Data, LogicalChannel::Command]
        );
    }

    #[test]
    fn resume_reenters_data_mode() {
        let transport = MockTransport::new()
            .expect(b"ATD*99***1#\r", b"\r\nCONNECT\r\n")
            .expect(b"+++", b"\r\nOK\r\n")
            .expect(b"ATO\r", b"\r\nCONNECT\r\n");
        let mut dev = device(generic(), transport);

        run(&mut dev, Request::DataDial(ConnectionId(0))).unwrap();
        run(&mut dev, Request::DataSuspend).unwrap();
        assert!(!dev.context().data_mode);

        assert_eq!(run(&mut dev, Request::DataResume), Ok(Response::None));
        assert!(dev.context().data_mode);
        assert_eq!(
            dev.transport().selects(),
            [LogicalChannel::Data, LogicalChannel::Command, LogicalChannel::Data]
        );
        assert!(dev.transport().is_done());
    }

    #[test]
    fn chunked_receives_back_to_back() {
        let transport = MockTransport::new()
            .chunked(2)
            .expect(b"AT+QIRD=1,16\r", b"\r\n+QIRD: 5\r\nab\r\nc\r\nOK\r\n")
            .expect(b"AT+QIRD=1,16\r", b"\r\n+QIRD: 3\r\nx,y\r\nOK\r\n");
        let mut dev = device(SocketModem::new(), transport);
        let receive = || Request::SocketReceive {
            socket: crate::context::SocketId(1),
            max_len: 16,
        };

        match run(&mut dev, receive()) {
            Ok(Response::SocketData(data)) => assert_eq!(&data[..], b"ab\r\nc"),
            other => panic!("unexpected {:?}", other),
        }
        match run(&mut dev, receive()) {
            Ok(Response::SocketData(data)) => assert_eq!(&data[..], b"x,y"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(dev.transport().is_done());
    }
}
