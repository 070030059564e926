//! Shared fixtures for unit tests: a scripted transport, a request driver
//! and a small personality with vendor socket commands.
use std::collections::VecDeque;
use std::sync::Once;
use std::vec::Vec as StdVec;

use embassy_time::{Duration, Instant};

use crate::command::{CommandDescriptor, CommandParams, CommandType};
use crate::config::{DeviceDescriptor, MAX_SOCKETS};
use crate::context::{ModemContext, SocketId};
use crate::engine::{Device, Progress};
use crate::error::Error;
use crate::modules::{NextCommand, Personality};
use crate::parser::classify::analyze_generic;
use crate::parser::{Action, Classification, Message, MessageKind};
use crate::request::{Request, Response, SocketProtocol};
use crate::transport::{LogicalChannel, Transport};

static INIT: Once = Once::new();

pub fn init_logger() {
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Trace)
            .try_init();
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    Open,
    Receive,
}

/// Transport replaying a script of `(expected command, modem reply)`.
///
/// Sending anything other than the next expected bytes fails the test.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: VecDeque<(StdVec<u8>, StdVec<u8>)>,
    rx: VecDeque<u8>,
    chunk: Option<usize>,
    sent: usize,
    selects: StdVec<LogicalChannel>,
    pub fail_receive: bool,
    pub fail_open: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect(mut self, sent: &[u8], reply: &[u8]) -> Self {
        self.script.push_back((sent.to_vec(), reply.to_vec()));
        self
    }

    /// Hands out at most `n` bytes per receive call.
    pub fn chunked(mut self, n: usize) -> Self {
        self.chunk = Some(n);
        self
    }

    /// Queues bytes as if the modem sent them on its own.
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    pub fn sent_count(&self) -> usize {
        self.sent
    }

    /// Every scripted exchange took place.
    pub fn is_done(&self) -> bool {
        self.script.is_empty()
    }

    pub fn selects(&self) -> &[LogicalChannel] {
        &self.selects
    }
}

impl Transport for MockTransport {
    type Error = MockError;

    fn open(&mut self, _descriptor: &DeviceDescriptor) -> Result<(), MockError> {
        if self.fail_open {
            return Err(MockError::Open);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), MockError> {
        Ok(())
    }

    fn reset(&mut self) -> Result<(), MockError> {
        self.rx.clear();
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), MockError> {
        let (expected, reply) = self
            .script
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected send {:?}", String::from_utf8_lossy(bytes)));
        assert_eq!(
            String::from_utf8_lossy(bytes),
            String::from_utf8_lossy(&expected),
            "sent bytes differ from the script"
        );
        self.sent += 1;
        self.rx.extend(reply);
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, MockError> {
        if self.fail_receive {
            return Err(MockError::Receive);
        }
        let limit = self.chunk.unwrap_or(usize::MAX);
        let n = buf.len().min(limit).min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn select(&mut self, channel: LogicalChannel) -> Result<(), MockError> {
        self.selects.push(channel);
        Ok(())
    }
}

/// Drives `request` to completion, polling like the blocking front-end.
pub fn run<T: Transport, P: Personality>(
    dev: &mut Device<T, P>,
    request: Request,
) -> Result<Response, Error> {
    let mut progress = dev.begin(request, Instant::now())?;
    loop {
        match progress {
            Progress::Complete(result) => return result,
            Progress::Idle => panic!("request vanished"),
            Progress::Waiting { .. } => {
                std::thread::sleep(std::time::Duration::from_millis(1));
                progress = dev.poll(Instant::now());
            }
        }
    }
}

pub mod cmd {
    use crate::command::CommandId;

    pub const AT: CommandId = CommandId::custom(0);
    pub const QIOPEN: CommandId = CommandId::custom(1);
    pub const QISEND: CommandId = CommandId::custom(2);
    pub const SEND: CommandId = CommandId::custom(3);
    pub const QIRD: CommandId = CommandId::custom(4);
    pub const QICLOSE: CommandId = CommandId::custom(5);
    pub const QIURC: CommandId = CommandId::custom(6);
}

static SOCKET_COMMANDS: &[CommandDescriptor] = &[
    CommandDescriptor::new(cmd::AT, "", Duration::from_secs(1)),
    CommandDescriptor::new(cmd::QIOPEN, "+QIOPEN", Duration::from_secs(1)),
    CommandDescriptor::new(cmd::QISEND, "+QISEND", Duration::from_secs(1)),
    CommandDescriptor::new(cmd::SEND, "SEND", Duration::from_secs(1)),
    CommandDescriptor::new(cmd::QIRD, "+QIRD", Duration::from_secs(1)),
    CommandDescriptor::new(cmd::QICLOSE, "+QICLOSE", Duration::from_secs(1)),
    CommandDescriptor::new(cmd::QIURC, "+QIURC", Duration::from_secs(1)),
];

/// Personality with a vendor socket dialect, used to exercise payload
/// framing, send prompts and the terminate hook.
#[derive(Debug, Default)]
pub struct SocketModem {
    rx_limit: usize,
    opening: Option<SocketId>,
}

impl SocketModem {
    pub fn new() -> Self {
        Self::default()
    }

    fn free_socket(ctx: &ModemContext) -> Option<SocketId> {
        (0..MAX_SOCKETS as u8)
            .map(SocketId)
            .find(|s| !ctx.persist.sockets[usize::from(s.0)].connected)
    }
}

impl Personality for SocketModem {
    fn lut(&self) -> &'static [CommandDescriptor] {
        SOCKET_COMMANDS
    }

    fn next_command(
        &mut self,
        request: &Request,
        _ctx: &mut ModemContext,
        step: u8,
    ) -> Result<NextCommand, Error> {
        use CommandType::*;
        Ok(match (request, step) {
            (Request::CheckConnection, 0) => NextCommand::send(cmd::AT, Execution),
            (Request::SocketOpen { .. }, 0) => NextCommand::send(cmd::QIOPEN, Write),
            (Request::SocketOpen { .. }, 1) => NextCommand::WaitOnly {
                timeout: Duration::from_secs(1),
                answer: crate::command::AnswerExpectation::Mandatory,
            },
            (Request::SocketSend { .. }, 0) => NextCommand::send(cmd::QISEND, Write),
            (Request::SocketSend { .. }, 1) => NextCommand::send(cmd::SEND, Raw),
            (Request::SocketReceive { .. }, 0) => NextCommand::send(cmd::QIRD, Write),
            (Request::SocketClose(_), 0) => NextCommand::send(cmd::QICLOSE, Write),
            (_, 0) => return Err(Error::Unsupported),
            _ => NextCommand::Done,
        })
    }

    fn build_params(
        &mut self,
        request: &Request,
        command: &CommandDescriptor,
        ctx: &mut ModemContext,
        params: &mut CommandParams,
    ) -> Result<(), Error> {
        match (command.id, request) {
            (
                cmd::QIOPEN,
                Request::SocketOpen {
                    conid,
                    protocol,
                    remote,
                    port,
                },
            ) => {
                let socket = Self::free_socket(ctx).ok_or(Error::InvalidArgument)?;
                let cid = ctx.persist.cid(*conid).ok_or(Error::InvalidArgument)?;
                let mut ip: heapless::String<40> = heapless::String::new();
                core::fmt::Write::write_fmt(&mut ip, format_args!("{}", remote))
                    .map_err(|_| Error::CommandTooLong)?;
                let protocol = match protocol {
                    SocketProtocol::Tcp => "TCP",
                    SocketProtocol::Udp => "UDP",
                };
                params
                    .int(u32::from(cid))?
                    .int(u32::from(socket.0))?
                    .quoted(protocol)?
                    .quoted(&ip)?
                    .int(u32::from(*port))?;
                self.opening = Some(socket);
            }
            (cmd::QISEND, Request::SocketSend { socket, data }) => {
                ctx.socket.socket = Some(*socket);
                ctx.socket.expect_prompt(b'>', Some(b' '));
                params.int(u32::from(socket.0))?.int(data.len() as u32)?;
            }
            (cmd::SEND, Request::SocketSend { data, .. }) => {
                params.raw(data, data.len())?;
            }
            (cmd::QIRD, Request::SocketReceive { socket, max_len }) => {
                ctx.socket.start_receive(*socket);
                self.rx_limit = *max_len;
                params.int(u32::from(socket.0))?.int(*max_len as u32)?;
            }
            (cmd::QICLOSE, Request::SocketClose(socket)) => {
                params.int(u32::from(socket.0))?;
            }
            _ => {}
        }
        Ok(())
    }

    fn analyze(
        &mut self,
        command: &CommandDescriptor,
        msg: &Message,
        ctx: &mut ModemContext,
    ) -> Classification {
        let awaited = ctx.cmd.is_awaited(command.id);
        match command.id {
            cmd::QIOPEN if awaited && msg.kind == MessageKind::Line => {
                let (Some(id), Some(err)) = (msg.field_u32(1), msg.field_u32(2)) else {
                    return Action::Intermediate.into();
                };
                if err != 0 || self.opening.map(|s| u32::from(s.0)) != Some(id) {
                    return Action::Error.into();
                }
                if let Some(socket) = self.opening.take() {
                    ctx.persist.sockets[usize::from(socket.0)].connected = true;
                    ctx.sid.response = Response::Socket(socket);
                }
                Action::ForceEnd.into()
            }
            cmd::SEND if awaited => match msg.as_bytes() {
                b"SEND OK" => Action::Final.into(),
                b"SEND FAIL" => Action::Error.into(),
                _ => Action::Intermediate.into(),
            },
            cmd::QIRD if awaited && msg.kind == MessageKind::Line => {
                if let Some(len) = msg.field_u32(1) {
                    ctx.socket.expect_payload((len as usize).min(self.rx_limit));
                }
                Action::Intermediate.into()
            }
            cmd::QIURC => {
                let Some(socket) = msg
                    .field_u32(2)
                    .and_then(|s| u8::try_from(s).ok())
                    .map(SocketId)
                else {
                    return Action::Ignored.into();
                };
                match msg.field_str(1) {
                    Some(b"recv") => ctx.persist.socket_data_pending(socket).into(),
                    Some(b"closed") => ctx.persist.socket_closed(socket).into(),
                    _ => Action::Ignored.into(),
                }
            }
            _ if command.id.is_generic() || awaited => analyze_generic(command, msg, ctx),
            _ => Action::Ignored.into(),
        }
    }

    fn terminate_command(
        &mut self,
        request: &Request,
        command: &CommandDescriptor,
        ctx: &mut ModemContext,
        action: Action,
    ) -> Action {
        match (command.id, request) {
            (cmd::QICLOSE, Request::SocketClose(socket)) if action != Action::Error => {
                match ctx.persist.sockets.get_mut(usize::from(socket.0)) {
                    Some(flags) if flags.connected => {
                        *flags = Default::default();
                        action
                    }
                    _ => Action::Error,
                }
            }
            _ => action,
        }
    }

    fn get_response(&mut self, request: &Request, ctx: &mut ModemContext) -> Response {
        match request {
            Request::SocketReceive { .. } => Response::SocketData(ctx.socket.rx_data.clone()),
            Request::SocketSend { data, .. } => Response::SocketSent(data.len()),
            _ => core::mem::take(&mut ctx.sid.response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceDescriptor;
    use crate::request::{ConnectionId, Urc, UrcCategory};
    use no_std_net::{IpAddr, Ipv4Addr};

    fn device(transport: MockTransport) -> Device<MockTransport, SocketModem> {
        init_logger();
        let mut dev = Device::new(DeviceDescriptor::cellular_uart(), transport, SocketModem::new());
        dev.open_channel().unwrap();
        dev
    }

    #[test]
    fn open_waits_for_the_connect_report() {
        let transport = MockTransport::new().expect(
            b"AT+QIOPEN=1,0,\"TCP\",\"10.1.2.3\",8080\r",
            b"\r\nOK\r\n\r\n+QIOPEN: 0,0\r\n",
        );
        let mut dev = device(transport);
        let request = Request::SocketOpen {
            conid: ConnectionId(0),
            protocol: SocketProtocol::Tcp,
            remote: IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)),
            port: 8080,
        };
        assert_eq!(run(&mut dev, request), Ok(Response::Socket(SocketId(0))));
        assert!(dev.context().persist.sockets[0].connected);
    }

    #[test]
    fn socket_urcs_reach_the_persistent_context() {
        let mut dev = device(MockTransport::new());
        dev.context_mut().persist.subscribe(UrcCategory::SocketDataPending);
        dev.transport_mut()
            .inject(b"\r\n+QIURC: \"recv\",2\r\n+QIURC: \"bogus\",1\r\n");
        assert_eq!(dev.process_idle(), Ok(2));
        assert_eq!(dev.next_urc(), Some(Urc::SocketDataPending(SocketId(2))));
        assert_eq!(dev.next_urc(), None);
    }

    #[test]
    fn script_mismatch_is_caught() {
        let result = std::panic::catch_unwind(|| {
            let mut transport = MockTransport::new().expect(b"AT\r", b"");
            let _ = transport.send(b"ATI\r");
        });
        assert!(result.is_err());
    }
}
