use super::{Message, MessageKind, SyntaxAutomaton};
use crate::config::RX_CHUNK_SIZE;
use crate::context::SocketContext;
use crate::error::Error;
use crate::transport::Transport;

/// Pulls bytes from the transport and frames them into messages.
///
/// Messages are handed out one at a time and the bytes behind the current
/// one stay buffered. That way the classifier can switch the automaton
/// into payload counting before the next byte is looked at.
pub struct Ingress {
    chunk: [u8; RX_CHUNK_SIZE],
    head: usize,
    tail: usize,
    msg: Message,
    complete: bool,
}

impl Ingress {
    pub const fn new() -> Self {
        Self {
            chunk: [0; RX_CHUNK_SIZE],
            head: 0,
            tail: 0,
            msg: Message::new(),
            complete: false,
        }
    }

    /// Forgets buffered bytes and any partial message.
    pub fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.msg.clear(MessageKind::Line);
        self.complete = false;
    }

    /// Drops the partial message, keeping buffered bytes for the automaton
    /// to resynchronize on.
    pub fn drop_partial(&mut self) {
        self.msg.clear(MessageKind::Line);
        self.complete = false;
    }

    /// Bytes are buffered that have not been framed yet.
    pub fn has_buffered(&self) -> bool {
        self.head < self.tail
    }

    /// Returns the next complete message, or `None` once the transport has
    /// nothing more to give.
    pub fn next_message<T: Transport>(
        &mut self,
        transport: &mut T,
        automaton: &mut SyntaxAutomaton,
        socket: &mut SocketContext,
    ) -> Result<Option<&Message>, Error> {
        if self.complete {
            self.msg.clear(MessageKind::Line);
            self.complete = false;
        }

        loop {
            if self.head == self.tail {
                let n = transport.receive(&mut self.chunk).map_err(|e| {
                    error!("Transport receive failed: {:?}", crate::fmt::Debug2Format(&e));
                    Error::Transport
                })?;
                if n == 0 {
                    return Ok(None);
                }
                self.head = 0;
                self.tail = n.min(RX_CHUNK_SIZE);
            }

            while self.head < self.tail {
                let byte = self.chunk[self.head];
                self.head += 1;

                let feed = automaton.feed_byte(byte, socket);
                if feed.stores() {
                    self.msg.push(byte);
                }
                if feed.is_end() {
                    if let Some(kind) = automaton.kind() {
                        self.msg.kind = kind;
                    }
                    if self.msg.truncated() {
                        warn!("Message exceeded {} bytes, tail dropped", self.msg.len());
                    }
                    self.complete = true;
                    return Ok(Some(&self.msg));
                }
            }
        }
    }
}

impl Default for Ingress {
    fn default() -> Self {
        Self::new()
    }
}
