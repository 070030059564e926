//! Socket bookkeeping for the request in flight.
use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::config::SOCKET_DATA_MAX;

/// Modem-side socket number as used by the personality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketId(pub u8);

/// Progress of a socket receive operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxState {
    #[default]
    NotStarted,
    /// Read command sent, the data header has not started yet
    WaitingHeader,
    /// A line is arriving that may be the data header
    ReceivingHeader,
    /// Header seen, payload bytes are being counted
    ReceivingData,
    Complete,
}

/// Progress of waiting for the send prompt (e.g. `> `).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PromptState {
    #[default]
    None,
    WaitingMarker1,
    WaitingMarker2,
    PromptReceived,
}

#[derive(Debug)]
pub struct SocketContext {
    pub socket: Option<SocketId>,

    pub rx_state: RxState,
    /// Payload size announced by the data header
    pub rx_expected: usize,
    pub rx_received: usize,
    pub rx_data: Vec<u8, SOCKET_DATA_MAX>,

    pub prompt_state: PromptState,
    prompt: (u8, Option<u8>),
}

impl Default for SocketContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketContext {
    pub const fn new() -> Self {
        Self {
            socket: None,
            rx_state: RxState::NotStarted,
            rx_expected: 0,
            rx_received: 0,
            rx_data: Vec::new(),
            prompt_state: PromptState::None,
            prompt: (b'>', Some(b' ')),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Arms header detection for a read command about to be sent.
    pub fn start_receive(&mut self, socket: SocketId) {
        self.socket = Some(socket);
        self.rx_state = RxState::WaitingHeader;
        self.rx_expected = 0;
        self.rx_received = 0;
        self.rx_data.clear();
    }

    /// The data header announced `len` payload bytes. Payload larger than
    /// the receive buffer is clipped by the caller before this point.
    pub fn expect_payload(&mut self, len: usize) {
        self.rx_expected = len;
        self.rx_received = 0;
        self.rx_state = if len == 0 {
            RxState::Complete
        } else {
            RxState::ReceivingData
        };
    }

    /// Whether the framer must count payload bytes instead of reading lines.
    pub fn payload_pending(&self) -> usize {
        if self.rx_state == RxState::ReceivingData {
            self.rx_expected.saturating_sub(self.rx_received)
        } else {
            0
        }
    }

    /// Stores a payload chunk handed over by the classifier.
    pub fn push_payload(&mut self, chunk: &[u8]) {
        let room = SOCKET_DATA_MAX - self.rx_data.len();
        let take = chunk.len().min(room);
        if take < chunk.len() {
            warn!(
                "Socket payload clipped, {} bytes dropped",
                chunk.len() - take
            );
        }
        // `take` never exceeds the remaining capacity
        let _ = self.rx_data.extend_from_slice(&chunk[..take]);
        self.rx_received += chunk.len();
        if self.rx_received >= self.rx_expected {
            self.rx_state = RxState::Complete;
        }
    }

    /// Arms prompt detection with the given markers. `second` is `None` for
    /// modems that prompt with a single character.
    pub fn expect_prompt(&mut self, first: u8, second: Option<u8>) {
        self.prompt = (first, second);
        self.prompt_state = PromptState::WaitingMarker1;
    }

    pub(crate) fn prompt_markers(&self) -> (u8, Option<u8>) {
        self.prompt
    }

    pub fn prompt_received(&self) -> bool {
        self.prompt_state == PromptState::PromptReceived
    }
}
