//! Turns framed messages into engine actions.
use super::{Message, MessageKind};
use crate::command::{CommandDescriptor, CommandId, Lut};
use crate::context::{ModemContext, RxState};
use crate::error::ModemError;
use crate::fmt::LossyStr;
use crate::modules::Personality;

/// What a message means for the command in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Successful final answer
    Final,
    /// Part of the answer, keep waiting
    Intermediate,
    /// Failed final answer
    Error,
    /// Terminate the command successfully without a final result code
    ForceEnd,
    /// Keep waiting and restart the command timeout
    ForceContinue,
    Ignored,
    /// Unsolicited, and the application wants to hear about it
    UrcForwarded,
    /// Unsolicited, state updated but nobody subscribed
    UrcIgnored,
}

impl Action {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Final | Self::Error | Self::ForceEnd)
    }

    pub fn is_urc(&self) -> bool {
        matches!(self, Self::UrcForwarded | Self::UrcIgnored)
    }
}

/// Result of classifying one message. Entering data mode is orthogonal to
/// the action, a `CONNECT` is both final and a mode switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Classification {
    pub action: Action,
    pub data_mode: bool,
}

impl Classification {
    pub const fn new(action: Action) -> Self {
        Self {
            action,
            data_mode: false,
        }
    }

    pub const fn with_data_mode(mut self) -> Self {
        self.data_mode = true;
        self
    }
}

impl From<Action> for Classification {
    fn from(action: Action) -> Self {
        Self::new(action)
    }
}

/// Interpretation shared by every modem: final result codes, prompts and
/// payload chunks. Anything else is part of an answer.
pub fn analyze_generic(
    command: &CommandDescriptor,
    msg: &Message,
    ctx: &mut ModemContext,
) -> Classification {
    match msg.kind {
        MessageKind::Prompt => return Action::Final.into(),
        MessageKind::Payload => return Action::Intermediate.into(),
        MessageKind::Line => {}
    }

    match command.id {
        CommandId::OK => Action::Final.into(),
        CommandId::CONNECT => match ctx.cmd.awaited {
            Some(awaited) if awaited.enters_data_mode => {
                ctx.cmd.data_mode_banner = true;
                Classification::new(Action::Final).with_data_mode()
            }
            awaited => {
                warn!("CONNECT in answer to {:?}", awaited.map(|c| c.id));
                Action::Error.into()
            }
        },
        CommandId::CME_ERROR | CommandId::CMS_ERROR => {
            let code = msg.field_u32(1).and_then(|c| u16::try_from(c).ok());
            ctx.sid.error.modem = Some(match code {
                Some(c) if command.id == CommandId::CME_ERROR => ModemError::Cme(c),
                Some(c) => ModemError::Cms(c),
                None => ModemError::Failed(command.id),
            });
            Action::Error.into()
        }
        CommandId::ERROR
        | CommandId::NO_CARRIER
        | CommandId::BUSY
        | CommandId::NO_ANSWER
        | CommandId::NO_DIALTONE => {
            ctx.sid.error.modem = Some(ModemError::Failed(command.id));
            Action::Error.into()
        }
        _ => Action::Intermediate.into(),
    }
}

fn is_echo(line: &[u8], command: &CommandDescriptor) -> bool {
    !command.name.is_empty()
        && line.len() >= 2
        && line[..2].eq_ignore_ascii_case(b"AT")
        && line[2..].starts_with(command.name.as_bytes())
}

/// Classifies one complete message against the device's tables.
pub fn classify<P: Personality + ?Sized>(
    personality: &mut P,
    ctx: &mut ModemContext,
    msg: &Message,
) -> Classification {
    let classification = match msg.kind {
        MessageKind::Line => classify_line(personality, ctx, msg),
        MessageKind::Payload => {
            ctx.socket.push_payload(msg.as_bytes());
            dispatch_awaited(personality, ctx, msg)
        }
        MessageKind::Prompt => dispatch_awaited(personality, ctx, msg),
    };

    // A line that was not the data header
    if ctx.socket.rx_state == RxState::ReceivingHeader {
        ctx.socket.rx_state = RxState::WaitingHeader;
    }

    trace!(
        "{:?} {:?} -> {:?}",
        msg.kind,
        LossyStr(msg.as_bytes()),
        classification.action
    );
    classification
}

fn dispatch_awaited<P: Personality + ?Sized>(
    personality: &mut P,
    ctx: &mut ModemContext,
    msg: &Message,
) -> Classification {
    match ctx.cmd.awaited {
        Some(command) => personality.analyze(&command, msg, ctx),
        None => {
            warn!("{:?} without a command in flight", msg.kind);
            Action::Ignored.into()
        }
    }
}

fn classify_line<P: Personality + ?Sized>(
    personality: &mut P,
    ctx: &mut ModemContext,
    msg: &Message,
) -> Classification {
    let awaited = ctx.cmd.awaited;
    if let Some(command) = awaited {
        if is_echo(msg.as_bytes(), &command) {
            return Action::Ignored.into();
        }
    }

    let lut = Lut::new(personality.lut());
    let Some(command) = lut.by_token(msg.token()).copied() else {
        return match awaited {
            Some(command) if command.unprefixed_answer => {
                personality.analyze(&command, msg, ctx)
            }
            _ => Action::Ignored.into(),
        };
    };

    if awaited.map(|c| c.id) == Some(command.id) {
        ctx.cmd.received = Some(command.id);
        return personality.analyze(&command, msg, ctx);
    }

    if command.id.is_generic() {
        if awaited.is_none() {
            return Action::Ignored.into();
        }
        ctx.cmd.received = Some(command.id);
        return personality.analyze(&command, msg, ctx);
    }

    // Recognized, but not what we are waiting for
    let classification = personality.analyze(&command, msg, ctx);
    let action = match classification.action {
        Action::Ignored | Action::UrcIgnored => classification.action,
        _ => Action::UrcForwarded,
    };
    if action == Action::UrcForwarded {
        debug!("URC {:?}", LossyStr(msg.as_bytes()));
    }
    Classification::new(action)
}
