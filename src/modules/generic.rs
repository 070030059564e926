//! Personality for modems that stick to the 3GPP TS 27.007 command set.
//!
//! Vendor extensions (sockets, ping) are not standardized and are rejected
//! with [`Error::Unsupported`].
use core::fmt::Write as _;
use core::str::FromStr;

use embassy_time::Duration;
use heapless::{String, Vec};
use no_std_net::IpAddr;

use super::{NextCommand, Personality};
use crate::command::types::{PdnEventKind, SimState};
use crate::command::{
    AnswerExpectation, CommandDescriptor, CommandId, CommandParams, CommandType,
};
use crate::config::{Apn, DeviceType, OperatorFormat};
use crate::context::{ModemContext, PdnConnection};
use crate::error::Error;
use crate::parser::classify::analyze_generic;
use crate::parser::{parse_u32, Action, Classification, Message};
use crate::registration::{RegType, RegistrationParams};
use crate::request::{
    ConnectionId, DeviceInfoField, NetworkStatus, PdnEvent, Request, Response, SignalQuality,
    UrcCategory,
};

pub mod cmd {
    use crate::command::CommandId;

    pub const AT: CommandId = CommandId::custom(0);
    pub const ECHO: CommandId = CommandId::custom(1);
    pub const CMEE: CommandId = CommandId::custom(2);
    pub const CGMI: CommandId = CommandId::custom(3);
    pub const CGMM: CommandId = CommandId::custom(4);
    pub const CGMR: CommandId = CommandId::custom(5);
    pub const CGSN: CommandId = CommandId::custom(6);
    pub const CIMI: CommandId = CommandId::custom(7);
    pub const CCID: CommandId = CommandId::custom(8);
    pub const CSQ: CommandId = CommandId::custom(9);
    pub const CPIN: CommandId = CommandId::custom(10);
    pub const COPS: CommandId = CommandId::custom(11);
    pub const CREG: CommandId = CommandId::custom(12);
    pub const CGREG: CommandId = CommandId::custom(13);
    pub const CEREG: CommandId = CommandId::custom(14);
    pub const CGATT: CommandId = CommandId::custom(15);
    pub const CGDCONT: CommandId = CommandId::custom(16);
    pub const CGAUTH: CommandId = CommandId::custom(17);
    pub const CGACT: CommandId = CommandId::custom(18);
    pub const CGPADDR: CommandId = CommandId::custom(19);
    pub const CGEREP: CommandId = CommandId::custom(20);
    pub const CGEV: CommandId = CommandId::custom(21);
    pub const DIAL: CommandId = CommandId::custom(22);
    pub const ONLINE: CommandId = CommandId::custom(23);
}

const fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

static COMMANDS: &[CommandDescriptor] = &[
    CommandDescriptor::new(cmd::AT, "", secs(1)),
    CommandDescriptor::new(cmd::ECHO, "E", secs(1)),
    CommandDescriptor::new(cmd::CMEE, "+CMEE", secs(1)),
    CommandDescriptor::new(cmd::CGMI, "+CGMI", secs(1)).with_unprefixed_answer(),
    CommandDescriptor::new(cmd::CGMM, "+CGMM", secs(1)).with_unprefixed_answer(),
    CommandDescriptor::new(cmd::CGMR, "+CGMR", secs(1)).with_unprefixed_answer(),
    CommandDescriptor::new(cmd::CGSN, "+CGSN", secs(1)).with_unprefixed_answer(),
    CommandDescriptor::new(cmd::CIMI, "+CIMI", secs(1)).with_unprefixed_answer(),
    CommandDescriptor::new(cmd::CCID, "+CCID", secs(1)),
    CommandDescriptor::new(cmd::CSQ, "+CSQ", secs(1)),
    CommandDescriptor::new(cmd::CPIN, "+CPIN", secs(10)),
    CommandDescriptor::new(cmd::COPS, "+COPS", secs(180)),
    CommandDescriptor::new(cmd::CREG, "+CREG", secs(1)),
    CommandDescriptor::new(cmd::CGREG, "+CGREG", secs(1)),
    CommandDescriptor::new(cmd::CEREG, "+CEREG", secs(1)),
    CommandDescriptor::new(cmd::CGATT, "+CGATT", secs(180)),
    CommandDescriptor::new(cmd::CGDCONT, "+CGDCONT", secs(1)),
    CommandDescriptor::new(cmd::CGAUTH, "+CGAUTH", secs(1)),
    CommandDescriptor::new(cmd::CGACT, "+CGACT", secs(150)),
    CommandDescriptor::new(cmd::CGPADDR, "+CGPADDR", secs(1)),
    CommandDescriptor::new(cmd::CGEREP, "+CGEREP", secs(1)),
    CommandDescriptor::new(cmd::CGEV, "+CGEV", secs(1)),
    CommandDescriptor::new(cmd::DIAL, "D", secs(180)).with_data_mode(),
    CommandDescriptor::new(cmd::ONLINE, "O", secs(5)).with_data_mode(),
];

#[derive(Debug, Clone, Copy)]
pub struct GenericConfig {
    /// `+CMEE` level, 1 for numeric error codes
    pub cmee: u8,
    pub operator_format: OperatorFormat,
    /// Silence kept before the `+++` escape sequence
    pub escape_guard: Duration,
}

impl Default for GenericConfig {
    fn default() -> Self {
        Self {
            cmee: 1,
            operator_format: OperatorFormat::Long,
            escape_guard: Duration::from_secs(1),
        }
    }
}

type Plan = Vec<NextCommand, 4>;

fn plan_of(steps: &[NextCommand]) -> Plan {
    // Plans are at most four steps long
    Vec::from_slice(steps).unwrap_or_default()
}

pub struct GenericModem {
    config: GenericConfig,
}

impl GenericModem {
    pub fn new(config: GenericConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GenericConfig {
        &self.config
    }

    fn cid(ctx: &ModemContext, conid: ConnectionId) -> Result<u8, Error> {
        ctx.persist.cid(conid).ok_or(Error::InvalidArgument)
    }

    /// Commands making up `request`.
    fn plan(&self, request: &Request) -> Result<Plan, Error> {
        use CommandType::*;
        let send = NextCommand::send;

        Ok(match request {
            Request::CheckConnection => plan_of(&[send(cmd::AT, Execution)]),
            Request::ModemConfig => plan_of(&[
                send(cmd::ECHO, Execution),
                send(cmd::CMEE, Write),
                send(cmd::COPS, Write),
            ]),
            Request::GetDeviceInfo(field) => {
                let id = match field {
                    DeviceInfoField::Manufacturer => cmd::CGMI,
                    DeviceInfoField::Model => cmd::CGMM,
                    DeviceInfoField::Revision => cmd::CGMR,
                    DeviceInfoField::Imei => cmd::CGSN,
                    DeviceInfoField::Imsi => cmd::CIMI,
                    DeviceInfoField::Iccid => cmd::CCID,
                };
                plan_of(&[send(id, Execution)])
            }
            Request::GetSignalQuality => plan_of(&[send(cmd::CSQ, Execution)]),
            Request::GetSimStatus => plan_of(&[send(cmd::CPIN, Read)]),
            Request::Register | Request::Deregister => plan_of(&[send(cmd::COPS, Write)]),
            Request::GetNetworkStatus => plan_of(&[
                send(cmd::CREG, Read),
                send(cmd::CGREG, Read),
                send(cmd::CEREG, Read),
            ]),
            Request::GetAttachStatus => plan_of(&[send(cmd::CGATT, Read)]),
            Request::Attach | Request::Detach => plan_of(&[send(cmd::CGATT, Write)]),
            Request::SubscribeUrc(category) | Request::UnsubscribeUrc(category) => {
                let subscribe = matches!(request, Request::SubscribeUrc(_));
                match category {
                    // Reporting stays on after unsubscribing, the lines are
                    // then only used to keep the state current
                    UrcCategory::NetworkRegistration | UrcCategory::LocationInfo if subscribe => {
                        plan_of(&[
                            send(cmd::CREG, Write),
                            send(cmd::CGREG, Write),
                            send(cmd::CEREG, Write),
                        ])
                    }
                    UrcCategory::PdnEvent => plan_of(&[send(cmd::CGEREP, Write)]),
                    _ => Plan::new(),
                }
            }
            Request::DefinePdn { apn, .. } => match apn {
                Apn::Given {
                    username: Some(_), ..
                } => plan_of(&[send(cmd::CGDCONT, Write), send(cmd::CGAUTH, Write)]),
                _ => plan_of(&[send(cmd::CGDCONT, Write)]),
            },
            Request::ActivatePdn(_) | Request::DeactivatePdn(_) => {
                plan_of(&[send(cmd::CGACT, Write)])
            }
            Request::GetIpAddress(_) => plan_of(&[send(cmd::CGPADDR, Write)]),
            Request::DataDial(_) => plan_of(&[send(cmd::DIAL, Execution)]),
            Request::DataSuspend => plan_of(&[
                NextCommand::WaitOnly {
                    timeout: self.config.escape_guard,
                    answer: AnswerExpectation::Optional,
                },
                send(CommandId::RAW, Raw),
            ]),
            Request::DataResume => plan_of(&[send(cmd::ONLINE, Execution)]),
            Request::SocketOpen { .. }
            | Request::SocketSend { .. }
            | Request::SocketReceive { .. }
            | Request::SocketClose(_)
            | Request::Ping { .. } => return Err(Error::Unsupported),
        })
    }

    /// Bookkeeping once every command of `request` succeeded.
    fn finish(&self, request: &Request, ctx: &mut ModemContext) {
        match request {
            Request::SubscribeUrc(category) => ctx.persist.subscribe(*category),
            Request::UnsubscribeUrc(category) => ctx.persist.unsubscribe(*category),
            _ => {}
        }
    }

    fn device_info(command: &CommandDescriptor, msg: &Message, ctx: &mut ModemContext) {
        let text = if msg.token() == command.name.as_bytes() {
            msg.field_str(1).unwrap_or_default()
        } else {
            msg.as_bytes()
        };
        let mut s = String::new();
        for b in text {
            if s.push(*b as char).is_err() {
                break;
            }
        }
        ctx.sid.response = Response::DeviceInfo(s);
    }

    fn ip_address(msg: &Message, ctx: &mut ModemContext) {
        let Some(cid) = msg.field_u32(1).and_then(|c| u8::try_from(c).ok()) else {
            return;
        };
        let ip = msg
            .field_str(2)
            .and_then(|raw| core::str::from_utf8(raw).ok())
            .and_then(|s| IpAddr::from_str(s).ok());
        if let Some(conn) = ctx.persist.connection_by_cid(cid) {
            conn.ip = ip;
        }
        if let Some(ip) = ip {
            ctx.sid.response = Response::IpAddress(ip);
        }
    }

    fn pdn_event(msg: &Message, ctx: &mut ModemContext) -> Action {
        // `+CGEV: NW PDN DEACT 1`, the cid trails the event text
        let Some(text) = msg.field(1) else {
            return Action::Ignored;
        };
        let (kind, cid) = match text.iter().rposition(|b| *b == b' ') {
            Some(i) if parse_u32(&text[i + 1..]).is_some() => (
                &text[..i],
                parse_u32(&text[i + 1..]).and_then(|c| u8::try_from(c).ok()),
            ),
            _ => (text, None),
        };
        match PdnEventKind::from_text(kind) {
            Some(kind) => ctx.persist.set_pdn_event(PdnEvent { kind, cid }),
            None => {
                debug!("Unhandled +CGEV event");
                Action::Ignored
            }
        }
    }

    fn analyze_answer(
        &self,
        command: &CommandDescriptor,
        msg: &Message,
        ctx: &mut ModemContext,
    ) -> Classification {
        match command.id {
            cmd::CGMI | cmd::CGMM | cmd::CGMR | cmd::CGSN | cmd::CIMI | cmd::CCID => {
                Self::device_info(command, msg, ctx)
            }
            cmd::CSQ => {
                if let (Some(rssi), Some(ber)) = (msg.field_u32(1), msg.field_u32(2)) {
                    let sq = SignalQuality {
                        rssi: rssi.min(99) as u8,
                        ber: ber.min(99) as u8,
                    };
                    ctx.persist.signal = Some(sq);
                    ctx.sid.response = Response::SignalQuality(sq);
                }
            }
            cmd::CPIN => {
                let state = SimState::from_code(msg.field_str(1).unwrap_or_default());
                ctx.persist.sim = state;
                ctx.sid.response = Response::SimStatus(state);
            }
            cmd::CREG | cmd::CGREG | cmd::CEREG => {
                if let Some(params) = RegistrationParams::parse(msg, true) {
                    ctx.persist.registration.compare_and_set(params);
                }
            }
            cmd::CGATT => {
                if let Some(state) = msg.field_u32(1) {
                    ctx.sid.response = Response::AttachStatus(state == 1);
                }
            }
            cmd::CGPADDR => Self::ip_address(msg, ctx),
            _ => return analyze_generic(command, msg, ctx),
        }
        Action::Intermediate.into()
    }
}

impl Default for GenericModem {
    fn default() -> Self {
        Self::new(GenericConfig::default())
    }
}

impl Personality for GenericModem {
    fn lut(&self) -> &'static [CommandDescriptor] {
        COMMANDS
    }

    fn next_command(
        &mut self,
        request: &Request,
        ctx: &mut ModemContext,
        step: u8,
    ) -> Result<NextCommand, Error> {
        let plan = self.plan(request)?;
        match plan.get(usize::from(step)) {
            Some(next) => Ok(*next),
            None => {
                self.finish(request, ctx);
                Ok(NextCommand::Done)
            }
        }
    }

    fn build_params(
        &mut self,
        request: &Request,
        command: &CommandDescriptor,
        ctx: &mut ModemContext,
        params: &mut CommandParams,
    ) -> Result<(), Error> {
        match (command.id, request) {
            (cmd::ECHO, _) => {
                params.bare("0")?;
            }
            (cmd::CMEE, _) => {
                params.int(u32::from(self.config.cmee))?;
            }
            (cmd::COPS, Request::ModemConfig) => {
                params
                    .int(3)?
                    .int(self.config.operator_format as u32)?;
            }
            (cmd::COPS, Request::Register) => {
                params.int(0)?;
            }
            (cmd::COPS, Request::Deregister) => {
                params.int(2)?;
            }
            (cmd::CREG | cmd::CGREG | cmd::CEREG, _) => {
                params.int(2)?;
            }
            (cmd::CGATT, req) => {
                params.int(u32::from(matches!(req, Request::Attach)))?;
            }
            (cmd::CGEREP, req) => {
                if matches!(req, Request::SubscribeUrc(_)) {
                    params.int(2)?.int(1)?;
                } else {
                    params.int(0)?;
                }
            }
            (
                cmd::CGDCONT,
                Request::DefinePdn {
                    conid,
                    pdp_type,
                    apn,
                },
            ) => {
                let cid = Self::cid(ctx, *conid)?;
                params
                    .int(u32::from(cid))?
                    .quoted(pdp_type.as_str())?
                    .quoted(apn.name())?;
            }
            (cmd::CGAUTH, Request::DefinePdn { conid, apn, .. }) => {
                let cid = Self::cid(ctx, *conid)?;
                if let Apn::Given {
                    username, password, ..
                } = apn
                {
                    // PAP
                    params
                        .int(u32::from(cid))?
                        .int(1)?
                        .quoted(username.as_deref().unwrap_or_default())?
                        .quoted(password.as_deref().unwrap_or_default())?;
                }
            }
            (cmd::CGACT, Request::ActivatePdn(conid) | Request::DeactivatePdn(conid)) => {
                let cid = Self::cid(ctx, *conid)?;
                let state = matches!(request, Request::ActivatePdn(_));
                params.int(u32::from(state))?.int(u32::from(cid))?;
            }
            (cmd::CGPADDR, Request::GetIpAddress(conid)) => {
                params.int(u32::from(Self::cid(ctx, *conid)?))?;
            }
            (cmd::DIAL, Request::DataDial(conid)) => {
                let cid = Self::cid(ctx, *conid)?;
                let mut number: String<16> = String::new();
                write!(number, "*99***{}#", cid).map_err(|_| Error::CommandTooLong)?;
                params.bare(&number)?;
            }
            (CommandId::RAW, Request::DataSuspend) => {
                params.raw(b"+++", 3)?;
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
        if command.id.is_generic() || ctx.cmd.is_awaited(command.id) {
            return self.analyze_answer(command, msg, ctx);
        }

        match command.id {
            cmd::CREG | cmd::CGREG | cmd::CEREG => match RegistrationParams::parse(msg, false) {
                Some(params) => ctx.persist.update_registration(params).into(),
                None => Action::Ignored.into(),
            },
            cmd::CGEV => Self::pdn_event(msg, ctx).into(),
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
        if action == Action::Error {
            return action;
        }

        match (command.id, request) {
            (cmd::DIAL | cmd::ONLINE, _) if !ctx.cmd.data_mode_banner => {
                warn!("Data mode requested but no CONNECT seen");
                Action::Error
            }
            (
                cmd::CGPADDR | cmd::CGMI | cmd::CGMM | cmd::CGMR | cmd::CGSN | cmd::CIMI
                | cmd::CCID,
                _,
            ) if ctx.sid.response == Response::None => Action::Error,
            (cmd::CGDCONT, Request::DefinePdn { conid, .. }) => {
                if let Some(cid) = ctx.persist.cid(*conid) {
                    ctx.persist.connections[usize::from(conid.0)] = Some(PdnConnection {
                        cid,
                        ip: None,
                        active: false,
                    });
                }
                action
            }
            (cmd::CGACT, Request::ActivatePdn(conid) | Request::DeactivatePdn(conid)) => {
                let up = matches!(request, Request::ActivatePdn(_));
                if let Some(Some(conn)) = ctx.persist.connections.get_mut(usize::from(conid.0)) {
                    conn.active = up;
                    if !up {
                        conn.ip = None;
                    }
                }
                action
            }
            _ => action,
        }
    }

    fn get_response(&mut self, request: &Request, ctx: &mut ModemContext) -> Response {
        match request {
            Request::GetNetworkStatus => {
                let reg = &ctx.persist.registration;
                Response::NetworkStatus(NetworkStatus {
                    csd: reg.status(RegType::Creg),
                    psd: reg.status(RegType::Cgreg),
                    eps: reg.status(RegType::Cereg),
                })
            }
            _ => core::mem::take(&mut ctx.sid.response),
        }
    }

    fn on_internal_event(&mut self, device_type: DeviceType, ctx: &mut ModemContext) {
        debug!("Internal event for {:?}", device_type);
        ctx.persist.modem_event(u32::from(device_type.bit()));
    }
}
