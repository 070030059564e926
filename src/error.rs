use serde::{Deserialize, Serialize};

use crate::command::CommandId;
use crate::request::RequestId;

/// Error code reported by the modem in a `+CME ERROR` or `+CMS ERROR` final
/// result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModemError {
    /// `+CME ERROR: <err>`, mobile termination error
    Cme(u16),
    /// `+CMS ERROR: <err>`, message service error
    Cms(u16),
    /// Failure result code without a number (`ERROR`, `NO CARRIER`, a
    /// verbose `+CME ERROR` text...), identified by its table entry
    Failed(CommandId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    // Transaction errors
    /// The transport failed to send or receive
    Transport,
    /// A mandatory answer did not arrive before the command timeout
    Timeout,
    /// Unrecognized or malformed answer, or the personality rejected an
    /// otherwise successful sequence
    Protocol,
    /// The modem answered with an extended error code
    Modem(ModemError),
    /// Another request is in flight on this handle
    Busy,

    // Registry errors
    InvalidHandle,
    RegistryFull,
    DeviceTypeInUse,
    ChannelClosed,

    // Request errors
    /// A request argument is out of range, e.g. an unknown connection id
    InvalidArgument,
    CommandTooLong,
    NotInDataMode,
    Unsupported,
}

impl From<ModemError> for Error {
    fn from(e: ModemError) -> Self {
        Self::Modem(e)
    }
}

/// Category of a failed request, as stored in an [`ErrorReport`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    #[default]
    None,
    Transport,
    Timeout,
    Protocol,
    Modem,
    Rejected,
}

impl From<Error> for ErrorKind {
    fn from(e: Error) -> Self {
        match e {
            Error::Transport => Self::Transport,
            Error::Timeout => Self::Timeout,
            Error::Protocol => Self::Protocol,
            Error::Modem(_) => Self::Modem,
            _ => Self::Rejected,
        }
    }
}

/// Report describing why the last request on a handle failed.
///
/// Built up by the classifier while a request runs and completed by the
/// personality's `get_error` once the request aborts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub request: Option<RequestId>,
    pub command: Option<CommandId>,
    pub modem: Option<ModemError>,
}

impl ErrorReport {
    pub const fn new() -> Self {
        Self {
            kind: ErrorKind::None,
            request: None,
            command: None,
            modem: None,
        }
    }

    /// The error a caller sees for this report, if it carries a modem code.
    pub fn modem_error(&self) -> Option<Error> {
        self.modem.map(Error::Modem)
    }
}
