//! Per-device modem context.
//!
//! The context is split by lifetime: [`PersistentContext`] lives as long as
//! the device, [`RequestContext`] is reset at the start of every request,
//! [`CommandContext`] at every wire command and [`SocketContext`] whenever a
//! socket operation starts.
pub mod persist;
pub mod socket;

use crate::command::{AnswerExpectation, CommandDescriptor, CommandId, CommandType};
use crate::error::ErrorReport;
use crate::parser::SyntaxAutomaton;
use crate::request::{RequestId, Response};

pub use persist::{PdnConnection, PersistentContext, SocketFlags};
pub use socket::{PromptState, RxState, SocketContext, SocketId};

/// State of one service request.
#[derive(Debug, Default)]
pub struct RequestContext {
    pub request: Option<RequestId>,
    /// Built up by analyze callbacks, handed out by `get_response`
    pub response: Response,
    pub error: ErrorReport,
}

impl RequestContext {
    pub fn start(&mut self, request: RequestId) {
        self.request = Some(request);
        self.response = Response::None;
        self.error = ErrorReport::new();
        self.error.request = Some(request);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// State of the wire command in flight.
#[derive(Debug, Default)]
pub struct CommandContext {
    pub awaited: Option<CommandDescriptor>,
    pub kind: Option<CommandType>,
    pub answer: Option<AnswerExpectation>,
    /// Id of the last recognized token
    pub received: Option<CommandId>,
    /// Scratch index for personalities walking multi-line answers
    pub sub_field: u8,
    /// Scratch value carried between the steps of one request
    pub param: u32,
    /// A `CONNECT` banner was seen for this command
    pub data_mode_banner: bool,
}

impl CommandContext {
    /// Prepares for a new command. `param` survives, it belongs to the
    /// request.
    pub fn start(
        &mut self,
        awaited: Option<CommandDescriptor>,
        kind: Option<CommandType>,
        answer: AnswerExpectation,
    ) {
        self.awaited = awaited;
        self.kind = kind;
        self.answer = Some(answer);
        self.received = None;
        self.sub_field = 0;
        self.data_mode_banner = false;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn awaited_id(&self) -> Option<CommandId> {
        self.awaited.map(|c| c.id)
    }

    pub fn is_awaited(&self, id: CommandId) -> bool {
        self.awaited_id() == Some(id)
    }
}

#[derive(Debug, Default)]
pub struct ModemContext {
    pub persist: PersistentContext,
    pub sid: RequestContext,
    pub cmd: CommandContext,
    pub socket: SocketContext,
    pub automaton: SyntaxAutomaton,
    /// The channel is currently in data mode
    pub data_mode: bool,
}

impl ModemContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops request, command and socket state and resynchronizes framing.
    pub fn reset(&mut self) {
        self.sid.clear();
        self.abort();
        self.data_mode = false;
    }

    /// Parser side cleanup after a failed request.
    pub fn abort(&mut self) {
        self.cmd.clear();
        self.socket.reset();
        self.automaton.reset();
    }
}
