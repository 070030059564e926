//! Inbound side of the engine: byte framing, element extraction and
//! classification of complete messages.
pub mod classify;
pub mod element;
pub mod ingress;
pub mod syntax;

use heapless::Vec;

use crate::config::RSP_MAX_SIZE;
pub use classify::{Action, Classification};
pub use element::{Element, Elements};
pub use ingress::Ingress;
pub use syntax::{Feed, SyntaxAutomaton, SyntaxState};

/// How a message was delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageKind {
    /// Text line terminated by CR and/or LF, terminators stripped
    Line,
    /// Exactly the number of socket bytes announced by a data header
    Payload,
    /// Send prompt, e.g. `> `
    Prompt,
}

/// One complete inbound message.
#[derive(Debug, Clone)]
pub struct Message {
    pub kind: MessageKind,
    data: Vec<u8, RSP_MAX_SIZE>,
    truncated: bool,
}

impl Message {
    pub const fn new() -> Self {
        Self {
            kind: MessageKind::Line,
            data: Vec::new(),
            truncated: false,
        }
    }

    /// Builds a line message, truncating at [`RSP_MAX_SIZE`].
    pub fn line(text: &[u8]) -> Self {
        let mut msg = Self::new();
        for b in text {
            msg.push(*b);
        }
        msg
    }

    pub(crate) fn clear(&mut self, kind: MessageKind) {
        self.kind = kind;
        self.data.clear();
        self.truncated = false;
    }

    pub(crate) fn push(&mut self, byte: u8) {
        if self.data.push(byte).is_err() {
            self.truncated = true;
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes were dropped because the message did not fit.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn elements(&self) -> Elements<'_> {
        Elements::new(&self.data)
    }

    /// Rank 0 element: the text before `:`, or the whole line.
    pub fn token(&self) -> &[u8] {
        match self.kind {
            MessageKind::Line => self
                .elements()
                .next()
                .map(|e| e.slice(&self.data))
                .unwrap_or(&[]),
            _ => &[],
        }
    }

    /// Field `rank` (1-based) of a `<token>: a,b,c` line, blanks trimmed.
    pub fn field(&self, rank: u8) -> Option<&[u8]> {
        if self.kind != MessageKind::Line || rank == 0 {
            return None;
        }
        self.elements()
            .find(|e| e.rank == rank)
            .map(|e| trim(e.slice(&self.data)))
    }

    /// Field `rank` parsed as a decimal number.
    pub fn field_u32(&self, rank: u8) -> Option<u32> {
        self.field(rank).and_then(parse_u32)
    }

    /// Field `rank` with surrounding double quotes removed.
    pub fn field_str(&self, rank: u8) -> Option<&[u8]> {
        self.field(rank).map(unquote)
    }

    /// Number of fields after the token.
    pub fn field_count(&self) -> u8 {
        self.elements().filter(|e| e.rank > 0).count() as u8
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

pub fn trim(mut s: &[u8]) -> &[u8] {
    while let [b' ', rest @ ..] = s {
        s = rest;
    }
    while let [rest @ .., b' '] = s {
        s = rest;
    }
    s
}

pub fn unquote(s: &[u8]) -> &[u8] {
    let s = trim(s);
    match s {
        [b'"', inner @ .., b'"'] => inner,
        _ => s,
    }
}

/// Parses an unsigned decimal, rejecting empty input and overflow.
pub fn parse_u32(s: &[u8]) -> Option<u32> {
    let s = unquote(s);
    if s.is_empty() {
        return None;
    }
    s.iter().try_fold(0u32, |acc, b| {
        if !b.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_add(u32::from(b - b'0'))
    })
}

/// Parses a hexadecimal field such as a cell id, quotes allowed.
pub fn parse_hex_u32(s: &[u8]) -> Option<u32> {
    let s = unquote(s);
    if s.is_empty() || s.len() > 8 {
        return None;
    }
    s.iter().try_fold(0u32, |acc, b| {
        let digit = (*b as char).to_digit(16)?;
        Some((acc << 4) | digit)
    })
}
