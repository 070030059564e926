//! Byte level framing of the modem's output.
use super::MessageKind;
use crate::context::socket::{PromptState, RxState, SocketContext};

const CR: u8 = b'\r';
const LF: u8 = b'\n';

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyntaxState {
    /// Out of sync, discarding until a line terminator
    #[default]
    WaitingInitialFrame,
    WaitingFirstChar,
    WaitingCR,
    /// A line ended on CR, a following LF belongs to it
    WaitingLF,
    ReceivingSocketData,
}

/// What to do with the byte just fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Feed {
    Discard,
    Store,
    /// Store, and the message is complete
    StoreAndEnd,
    /// Drop the byte, the message is complete
    End,
}

impl Feed {
    /// End-of-message predicate.
    pub fn is_end(&self) -> bool {
        matches!(self, Self::StoreAndEnd | Self::End)
    }

    pub fn stores(&self) -> bool {
        matches!(self, Self::Store | Self::StoreAndEnd)
    }
}

/// Framing automaton. It has a single reader, the ingress stage of the
/// device that owns it.
#[derive(Debug, Default)]
pub struct SyntaxAutomaton {
    state: SyntaxState,
    kind: Option<MessageKind>,
    remaining: usize,
}

impl SyntaxAutomaton {
    pub const fn new() -> Self {
        Self {
            state: SyntaxState::WaitingInitialFrame,
            kind: None,
            remaining: 0,
        }
    }

    pub fn state(&self) -> SyntaxState {
        self.state
    }

    /// Kind of the message currently being framed.
    pub fn kind(&self) -> Option<MessageKind> {
        self.kind
    }

    /// Drops any partial message and resynchronizes on the next terminator.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Back to line mode with no partial message, used between commands.
    pub fn resync(&mut self) {
        self.state = SyntaxState::WaitingFirstChar;
        self.kind = None;
        self.remaining = 0;
    }

    pub fn feed_byte(&mut self, byte: u8, socket: &mut SocketContext) -> Feed {
        match self.state {
            SyntaxState::WaitingInitialFrame => {
                if byte == CR || byte == LF {
                    self.state = SyntaxState::WaitingFirstChar;
                }
                Feed::Discard
            }
            SyntaxState::WaitingLF => {
                self.state = SyntaxState::WaitingFirstChar;
                if byte == LF {
                    Feed::Discard
                } else {
                    self.first_char(byte, socket)
                }
            }
            SyntaxState::WaitingFirstChar => self.first_char(byte, socket),
            SyntaxState::WaitingCR => self.in_line(byte, socket),
            SyntaxState::ReceivingSocketData => self.payload_byte(),
        }
    }

    fn first_char(&mut self, byte: u8, socket: &mut SocketContext) -> Feed {
        let pending = socket.payload_pending();
        if pending > 0 {
            self.kind = Some(MessageKind::Payload);
            self.remaining = pending;
            self.state = SyntaxState::ReceivingSocketData;
            return self.payload_byte();
        }

        if byte == CR || byte == LF {
            return Feed::Discard;
        }

        if socket.prompt_state == PromptState::WaitingMarker1 {
            let (first, second) = socket.prompt_markers();
            if byte == first {
                self.kind = Some(MessageKind::Prompt);
                return match second {
                    None => {
                        socket.prompt_state = PromptState::PromptReceived;
                        self.end()
                    }
                    Some(_) => {
                        socket.prompt_state = PromptState::WaitingMarker2;
                        self.state = SyntaxState::WaitingCR;
                        Feed::Store
                    }
                };
            }
        }

        self.kind = Some(MessageKind::Line);
        if socket.rx_state == RxState::WaitingHeader {
            socket.rx_state = RxState::ReceivingHeader;
        }
        self.state = SyntaxState::WaitingCR;
        Feed::Store
    }

    fn in_line(&mut self, byte: u8, socket: &mut SocketContext) -> Feed {
        if socket.prompt_state == PromptState::WaitingMarker2 {
            let (_, second) = socket.prompt_markers();
            if Some(byte) == second {
                socket.prompt_state = PromptState::PromptReceived;
                return self.end();
            }
            // Marker 1 was the start of an ordinary line
            socket.prompt_state = PromptState::WaitingMarker1;
            self.kind = Some(MessageKind::Line);
        }

        match byte {
            CR => {
                self.state = SyntaxState::WaitingLF;
                Feed::End
            }
            LF => {
                self.state = SyntaxState::WaitingFirstChar;
                Feed::End
            }
            _ => Feed::Store,
        }
    }

    fn payload_byte(&mut self) -> Feed {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.end()
        } else {
            Feed::Store
        }
    }

    fn end(&mut self) -> Feed {
        self.state = SyntaxState::WaitingFirstChar;
        Feed::StoreAndEnd
    }
}
