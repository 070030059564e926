//! Command descriptors and the lookup table (LUT) the engine dispatches on.
//!
//! A modem personality supplies its own ordered table of
//! [`CommandDescriptor`]s. The engine adds a small table of generic final
//! result codes every TS 27.007 modem emits, consulted after the
//! personality's table so a personality can shadow any of them.
pub mod builder;
pub mod types;

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

pub use builder::{CommandBuilder, CommandParams};

/// Identifier of a command in the lookup table.
///
/// Values below [`CommandId::FIRST_CUSTOM`] are reserved for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandId(pub u16);

impl CommandId {
    pub const NONE: Self = Self(0);
    pub const RAW: Self = Self(1);
    pub const OK: Self = Self(2);
    pub const ERROR: Self = Self(3);
    pub const CME_ERROR: Self = Self(4);
    pub const CMS_ERROR: Self = Self(5);
    pub const NO_CARRIER: Self = Self(6);
    pub const BUSY: Self = Self(7);
    pub const NO_ANSWER: Self = Self(8);
    pub const NO_DIALTONE: Self = Self(9);
    pub const CONNECT: Self = Self(10);

    pub const FIRST_CUSTOM: u16 = 0x100;

    /// Personality command number `n`.
    pub const fn custom(n: u16) -> Self {
        Self(Self::FIRST_CUSTOM + n)
    }

    /// Whether this is one of the engine's generic result codes, which are
    /// always relevant to the command in flight.
    pub const fn is_generic(&self) -> bool {
        self.0 < Self::FIRST_CUSTOM
    }
}

/// How a command is rendered on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandType {
    /// `AT<name>=?`
    Test,
    /// `AT<name>?`
    Read,
    /// `AT<name>=<params>`
    Write,
    /// `AT<name><params>`
    Execution,
    /// Exactly the bytes produced by the build callback, no framing
    Raw,
}

/// What a timeout means for the command in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnswerExpectation {
    /// No answer before the timeout aborts the request
    Mandatory,
    /// No answer before the timeout lets the sequence go on
    Optional,
}

/// One entry of a command lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandDescriptor {
    pub id: CommandId,
    /// Wire name, e.g. `+CGDCONT`. Also the token that answers start with.
    pub name: &'static str,
    pub timeout: Duration,
    /// The answer is a bare text line without the `<name>:` prefix, as for
    /// `+CGMI` or `+CIMI`.
    pub unprefixed_answer: bool,
    /// A `CONNECT` to this command switches the channel to data mode, as
    /// for `D` or `O`. Elsewhere it is a protocol violation.
    pub enters_data_mode: bool,
}

impl CommandDescriptor {
    pub const fn new(id: CommandId, name: &'static str, timeout: Duration) -> Self {
        Self {
            id,
            name,
            timeout,
            unprefixed_answer: false,
            enters_data_mode: false,
        }
    }

    pub const fn with_unprefixed_answer(mut self) -> Self {
        self.unprefixed_answer = true;
        self
    }

    pub const fn with_data_mode(mut self) -> Self {
        self.enters_data_mode = true;
        self
    }

    /// Matches a received token against the wire name.
    pub fn matches(&self, token: &[u8]) -> bool {
        !self.name.is_empty() && self.name.as_bytes() == token
    }
}

const RESULT_CODE_TIMEOUT: Duration = Duration::from_millis(0);

/// Final result codes the engine recognizes for every modem.
pub static GENERIC_COMMANDS: &[CommandDescriptor] = &[
    CommandDescriptor::new(CommandId::OK, "OK", RESULT_CODE_TIMEOUT),
    CommandDescriptor::new(CommandId::ERROR, "ERROR", RESULT_CODE_TIMEOUT),
    CommandDescriptor::new(CommandId::CME_ERROR, "+CME ERROR", RESULT_CODE_TIMEOUT),
    CommandDescriptor::new(CommandId::CMS_ERROR, "+CMS ERROR", RESULT_CODE_TIMEOUT),
    CommandDescriptor::new(CommandId::NO_CARRIER, "NO CARRIER", RESULT_CODE_TIMEOUT),
    CommandDescriptor::new(CommandId::BUSY, "BUSY", RESULT_CODE_TIMEOUT),
    CommandDescriptor::new(CommandId::NO_ANSWER, "NO ANSWER", RESULT_CODE_TIMEOUT),
    CommandDescriptor::new(CommandId::NO_DIALTONE, "NO DIALTONE", RESULT_CODE_TIMEOUT),
    CommandDescriptor::new(CommandId::CONNECT, "CONNECT", RESULT_CODE_TIMEOUT),
];

/// Descriptor used for raw transmissions that have no table entry.
pub const RAW_COMMAND: CommandDescriptor =
    CommandDescriptor::new(CommandId::RAW, "", Duration::from_secs(5));

/// View over a personality table chained with [`GENERIC_COMMANDS`].
#[derive(Clone, Copy)]
pub struct Lut<'a> {
    custom: &'a [CommandDescriptor],
}

impl<'a> Lut<'a> {
    pub const fn new(custom: &'a [CommandDescriptor]) -> Self {
        Self { custom }
    }

    fn iter(&self) -> impl Iterator<Item = &'a CommandDescriptor> {
        self.custom.iter().chain(GENERIC_COMMANDS.iter())
    }

    pub fn by_id(&self, id: CommandId) -> Option<&'a CommandDescriptor> {
        if id == CommandId::RAW {
            return Some(&RAW_COMMAND);
        }
        self.iter().find(|c| c.id == id)
    }

    /// Finds the descriptor answering to `token`.
    ///
    /// Result codes may carry a suffix after a space (`CONNECT 150000000`),
    /// so when the whole token is unknown the first word is tried as well.
    pub fn by_token(&self, token: &[u8]) -> Option<&'a CommandDescriptor> {
        if token.is_empty() {
            return None;
        }
        self.iter().find(|c| c.matches(token)).or_else(|| {
            let word = token.split(|b| *b == b' ').next()?;
            if word.len() == token.len() {
                return None;
            }
            self.iter().find(|c| c.matches(word))
        })
    }
}
