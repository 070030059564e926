//! Modem personalities.
//!
//! A personality supplies the command vocabulary of one modem model and the
//! callbacks the engine dispatches through while running a request.
pub mod generic;

use embassy_time::Duration;

use crate::command::{
    AnswerExpectation, CommandDescriptor, CommandId, CommandParams, CommandType,
};
use crate::config::DeviceType;
use crate::context::ModemContext;
use crate::error::{Error, ErrorReport};
use crate::parser::classify::analyze_generic;
use crate::parser::{Action, Classification, Message};
use crate::request::{Request, Response, Urc};

pub use generic::{GenericConfig, GenericModem};

/// Next step of a request, as decided by [`Personality::next_command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NextCommand {
    /// Render and transmit command `id`, then wait for its answer.
    /// `timeout` overrides the table timeout.
    Send {
        id: CommandId,
        kind: CommandType,
        answer: AnswerExpectation,
        timeout: Option<Duration>,
    },
    /// Transmit nothing and wait, e.g. a guard time. A late answer of the
    /// previous command ends the wait early.
    WaitOnly {
        timeout: Duration,
        answer: AnswerExpectation,
    },
    /// The request is complete
    Done,
}

impl NextCommand {
    /// Command with a mandatory answer and the table timeout.
    pub const fn send(id: CommandId, kind: CommandType) -> Self {
        Self::Send {
            id,
            kind,
            answer: AnswerExpectation::Mandatory,
            timeout: None,
        }
    }

    pub const fn optional(self) -> Self {
        match self {
            Self::Send { id, kind, timeout, .. } => Self::Send {
                id,
                kind,
                answer: AnswerExpectation::Optional,
                timeout,
            },
            Self::WaitOnly { timeout, .. } => Self::WaitOnly {
                timeout,
                answer: AnswerExpectation::Optional,
            },
            Self::Done => Self::Done,
        }
    }

    pub const fn with_timeout(self, timeout: Duration) -> Self {
        match self {
            Self::Send { id, kind, answer, .. } => Self::Send {
                id,
                kind,
                answer,
                timeout: Some(timeout),
            },
            other => other,
        }
    }
}

/// Behaviour of one modem model.
///
/// Only [`lut`](Personality::lut) and
/// [`next_command`](Personality::next_command) are required, the remaining
/// callbacks default to the generic TS 27.007 behaviour.
pub trait Personality {
    /// Ordered command table, consulted before the engine's generic result
    /// codes.
    fn lut(&self) -> &'static [CommandDescriptor];

    /// Called once when the device is opened and after every context reset.
    fn init(&mut self, _ctx: &mut ModemContext) {}

    /// Decides what to do at `step` (0-based) of `request`.
    ///
    /// Called after the previous command terminated successfully, or timed
    /// out with an optional answer.
    fn next_command(
        &mut self,
        request: &Request,
        ctx: &mut ModemContext,
        step: u8,
    ) -> Result<NextCommand, Error>;

    /// Writes the parameters of `command`, or the payload of a raw command.
    fn build_params(
        &mut self,
        _request: &Request,
        _command: &CommandDescriptor,
        _ctx: &mut ModemContext,
        _params: &mut CommandParams,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Interprets one message addressed to `command`.
    ///
    /// `command` is the awaited command, a generic result code, or an
    /// unrelated table entry whose line arrived unsolicited (check
    /// `ctx.cmd.is_awaited`).
    fn analyze(
        &mut self,
        command: &CommandDescriptor,
        msg: &Message,
        ctx: &mut ModemContext,
    ) -> Classification {
        analyze_generic(command, msg, ctx)
    }

    /// Last word on a terminated command, may turn success into failure.
    fn terminate_command(
        &mut self,
        _request: &Request,
        _command: &CommandDescriptor,
        _ctx: &mut ModemContext,
        action: Action,
    ) -> Action {
        action
    }

    fn get_response(&mut self, _request: &Request, ctx: &mut ModemContext) -> Response {
        core::mem::take(&mut ctx.sid.response)
    }

    fn get_urc(&mut self, ctx: &mut ModemContext) -> Option<Urc> {
        ctx.persist.next_urc()
    }

    fn get_error(&mut self, _request: &Request, ctx: &mut ModemContext) -> ErrorReport {
        ctx.sid.error
    }

    /// Out-of-band event signalled for this device type, outside of any
    /// received line.
    fn on_internal_event(&mut self, _device_type: DeviceType, _ctx: &mut ModemContext) {}
}

impl<P: Personality + ?Sized> Personality for &mut P {
    fn lut(&self) -> &'static [CommandDescriptor] {
        (**self).lut()
    }

    fn init(&mut self, ctx: &mut ModemContext) {
        (**self).init(ctx)
    }

    fn next_command(
        &mut self,
        request: &Request,
        ctx: &mut ModemContext,
        step: u8,
    ) -> Result<NextCommand, Error> {
        (**self).next_command(request, ctx, step)
    }

    fn build_params(
        &mut self,
        request: &Request,
        command: &CommandDescriptor,
        ctx: &mut ModemContext,
        params: &mut CommandParams,
    ) -> Result<(), Error> {
        (**self).build_params(request, command, ctx, params)
    }

    fn analyze(
        &mut self,
        command: &CommandDescriptor,
        msg: &Message,
        ctx: &mut ModemContext,
    ) -> Classification {
        (**self).analyze(command, msg, ctx)
    }

    fn terminate_command(
        &mut self,
        request: &Request,
        command: &CommandDescriptor,
        ctx: &mut ModemContext,
        action: Action,
    ) -> Action {
        (**self).terminate_command(request, command, ctx, action)
    }

    fn get_response(&mut self, request: &Request, ctx: &mut ModemContext) -> Response {
        (**self).get_response(request, ctx)
    }

    fn get_urc(&mut self, ctx: &mut ModemContext) -> Option<Urc> {
        (**self).get_urc(ctx)
    }

    fn get_error(&mut self, request: &Request, ctx: &mut ModemContext) -> ErrorReport {
        (**self).get_error(request, ctx)
    }

    fn on_internal_event(&mut self, device_type: DeviceType, ctx: &mut ModemContext) {
        (**self).on_internal_event(device_type, ctx)
    }
}
