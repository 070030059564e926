//! Renders wire commands from a descriptor and the parameters produced by
//! the personality's build callback.
use core::fmt::Write as _;

use heapless::Vec;

use super::{CommandDescriptor, CommandType};
use crate::config::{CMD_MAX_SIZE, SOCKET_DATA_MAX};
use crate::error::Error;

const PREFIX: &[u8] = b"AT";
const TERMINATOR: &[u8] = b"\r";

/// Parameters of the command being built.
///
/// Text arguments are comma separated automatically. A raw command instead
/// carries a pre-built byte sequence and its declared length.
#[derive(Debug, Default)]
pub struct CommandParams {
    buf: Vec<u8, SOCKET_DATA_MAX>,
    args: u8,
    declared_len: Option<usize>,
}

impl CommandParams {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            args: 0,
            declared_len: None,
        }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.args = 0;
        self.declared_len = None;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn separator(&mut self) -> Result<(), Error> {
        if self.args > 0 {
            self.buf.push(b',').map_err(|_| Error::CommandTooLong)?;
        }
        self.args = self.args.saturating_add(1);
        Ok(())
    }

    fn extend(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.buf
            .extend_from_slice(bytes)
            .map_err(|_| Error::CommandTooLong)
    }

    /// Appends a decimal argument.
    pub fn int(&mut self, value: u32) -> Result<&mut Self, Error> {
        self.separator()?;
        let mut s: heapless::String<10> = heapless::String::new();
        write!(s, "{}", value).map_err(|_| Error::CommandTooLong)?;
        self.extend(s.as_bytes())?;
        Ok(self)
    }

    /// Appends a double-quoted string argument.
    pub fn quoted(&mut self, value: &str) -> Result<&mut Self, Error> {
        self.separator()?;
        self.extend(b"\"")?;
        self.extend(value.as_bytes())?;
        self.extend(b"\"")?;
        Ok(self)
    }

    /// Appends an argument verbatim.
    pub fn bare(&mut self, value: &str) -> Result<&mut Self, Error> {
        self.separator()?;
        self.extend(value.as_bytes())?;
        Ok(self)
    }

    /// Leaves a position empty, as in `AT+COPS=0,,"operator"`.
    pub fn skip(&mut self) -> Result<&mut Self, Error> {
        self.separator()?;
        Ok(self)
    }

    /// Sets the payload of a raw command. `declared_len` bytes of `bytes`
    /// are transmitted.
    pub fn raw(&mut self, bytes: &[u8], declared_len: usize) -> Result<(), Error> {
        if declared_len > bytes.len() {
            return Err(Error::CommandTooLong);
        }
        self.clear();
        self.extend(&bytes[..declared_len])?;
        self.declared_len = Some(declared_len);
        Ok(())
    }
}

/// Output buffer of the command builder.
#[derive(Debug, Default)]
pub struct CommandBuilder {
    out: Vec<u8, SOCKET_DATA_MAX>,
}

impl CommandBuilder {
    pub const fn new() -> Self {
        Self { out: Vec::new() }
    }

    /// Renders the command and returns the bytes to transmit.
    ///
    /// Text commands longer than [`CMD_MAX_SIZE`] are rejected before
    /// anything is written to the transport.
    pub fn build(
        &mut self,
        command: &CommandDescriptor,
        kind: CommandType,
        params: &CommandParams,
    ) -> Result<&[u8], Error> {
        self.out.clear();

        if kind == CommandType::Raw {
            let len = params.declared_len.unwrap_or(params.buf.len());
            self.out
                .extend_from_slice(&params.buf[..len])
                .map_err(|_| Error::CommandTooLong)?;
            return Ok(&self.out);
        }

        let separator: &[u8] = match kind {
            CommandType::Test => b"=?",
            CommandType::Read => b"?",
            CommandType::Write => b"=",
            CommandType::Execution | CommandType::Raw => b"",
        };
        let params: &[u8] = match kind {
            CommandType::Write | CommandType::Execution => params.as_bytes(),
            _ => b"",
        };

        let len = PREFIX.len()
            + command.name.len()
            + separator.len()
            + params.len()
            + TERMINATOR.len();
        if len > CMD_MAX_SIZE {
            error!(
                "Command {:?} needs {} bytes, limit is {}",
                command.id, len, CMD_MAX_SIZE
            );
            return Err(Error::CommandTooLong);
        }

        for part in [PREFIX, command.name.as_bytes(), separator, params, TERMINATOR] {
            self.out
                .extend_from_slice(part)
                .map_err(|_| Error::CommandTooLong)?;
        }
        Ok(&self.out)
    }
}
