//! State that outlives individual requests: subscriptions, pending URC
//! flags and what the modem last told us about the network.
use no_std_net::IpAddr;

use crate::command::types::SimState;
use crate::config::{MAX_CONNECTIONS, MAX_SOCKETS};
use crate::context::socket::SocketId;
use crate::parser::Action;
use crate::registration::{RegType, RegistrationChange, RegistrationParams, RegistrationState};
use crate::request::{ConnectionId, PdnEvent, PingResult, SignalQuality, Urc, UrcCategory};

/// A logical connection and the modem context it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdnConnection {
    pub cid: u8,
    pub ip: Option<IpAddr>,
    pub active: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SocketFlags {
    pub connected: bool,
    pub data_pending: bool,
    pub closed_by_remote: bool,
}

#[derive(Debug)]
pub struct PersistentContext {
    subscriptions: u16,
    pending: u16,

    pub registration: RegistrationState,
    last_registration: Option<(RegType, crate::registration::Status)>,
    pub signal: Option<SignalQuality>,
    pub sim: SimState,
    pub connections: [Option<PdnConnection>; MAX_CONNECTIONS],
    pub sockets: [SocketFlags; MAX_SOCKETS],
    pub last_pdn_event: Option<PdnEvent>,
    pub last_ping: Option<PingResult>,
    modem_events: u32,
}

impl Default for PersistentContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistentContext {
    pub const fn new() -> Self {
        Self {
            subscriptions: 0,
            pending: 0,
            registration: RegistrationState::new(),
            last_registration: None,
            signal: None,
            sim: SimState::Unknown,
            connections: [None; MAX_CONNECTIONS],
            sockets: [SocketFlags {
                connected: false,
                data_pending: false,
                closed_by_remote: false,
            }; MAX_SOCKETS],
            last_pdn_event: None,
            last_ping: None,
            modem_events: 0,
        }
    }

    /// Clears everything but the subscriptions. Only for a freshly opened
    /// link, where nothing the modem said before can be trusted.
    pub fn reset(&mut self) {
        let subscriptions = self.subscriptions;
        *self = Self::new();
        self.subscriptions = subscriptions;
    }

    pub fn subscribe(&mut self, category: UrcCategory) {
        self.subscriptions |= category.bit();
    }

    /// Unsubscribing also drops anything of that category not yet delivered.
    pub fn unsubscribe(&mut self, category: UrcCategory) {
        self.subscriptions &= !category.bit();
        self.pending &= !category.bit();
    }

    pub fn is_subscribed(&self, category: UrcCategory) -> bool {
        self.subscriptions & category.bit() != 0
    }

    pub fn is_pending(&self, category: UrcCategory) -> bool {
        self.pending & category.bit() != 0
    }

    pub fn has_pending(&self) -> bool {
        self.pending != 0
    }

    /// Flags `category` for delivery if subscribed. The returned action is
    /// what an analyze callback should report for the line.
    pub fn raise(&mut self, category: UrcCategory) -> Action {
        if self.is_subscribed(category) {
            self.pending |= category.bit();
            Action::UrcForwarded
        } else {
            Action::UrcIgnored
        }
    }

    /// Stores a registration report and raises the categories it affects.
    pub fn update_registration(&mut self, params: RegistrationParams) -> Action {
        let domain = params.reg_type;
        let status = params.status;
        let RegistrationChange {
            status: status_changed,
            location,
        } = self.registration.compare_and_set(params);

        let mut action = Action::UrcIgnored;
        if status_changed {
            self.last_registration = Some((domain, status));
            if self.raise(UrcCategory::NetworkRegistration) == Action::UrcForwarded {
                action = Action::UrcForwarded;
            }
        }
        if location && self.raise(UrcCategory::LocationInfo) == Action::UrcForwarded {
            action = Action::UrcForwarded;
        }
        action
    }

    pub fn set_signal(&mut self, signal: SignalQuality) -> Action {
        self.signal = Some(signal);
        self.raise(UrcCategory::SignalQuality)
    }

    pub fn set_pdn_event(&mut self, event: PdnEvent) -> Action {
        self.last_pdn_event = Some(event);
        if let Some(cid) = event.cid {
            use crate::command::types::PdnEventKind::*;
            let up = matches!(event.kind, NetworkPdnActivate | MobileStationPdnActivate);
            for conn in self.connections.iter_mut().flatten() {
                if conn.cid == cid {
                    conn.active = up;
                    if !up {
                        conn.ip = None;
                    }
                }
            }
        }
        self.raise(UrcCategory::PdnEvent)
    }

    pub fn set_ping(&mut self, result: PingResult) -> Action {
        self.last_ping = Some(result);
        self.raise(UrcCategory::PingResponse)
    }

    /// ORs `mask` into the modem event bitmask.
    pub fn modem_event(&mut self, mask: u32) -> Action {
        self.modem_events |= mask;
        self.raise(UrcCategory::ModemEvent)
    }

    fn socket_flags(&mut self, socket: SocketId) -> Option<&mut SocketFlags> {
        self.sockets.get_mut(usize::from(socket.0))
    }

    pub fn socket_data_pending(&mut self, socket: SocketId) -> Action {
        match self.socket_flags(socket) {
            Some(flags) => flags.data_pending = true,
            None => {
                warn!("URC for unknown socket {:?}", socket.0);
                return Action::Ignored;
            }
        }
        self.raise(UrcCategory::SocketDataPending)
    }

    pub fn socket_closed(&mut self, socket: SocketId) -> Action {
        match self.socket_flags(socket) {
            Some(flags) => {
                flags.closed_by_remote = true;
                flags.connected = false;
                flags.data_pending = false;
            }
            None => {
                warn!("URC for unknown socket {:?}", socket.0);
                return Action::Ignored;
            }
        }
        self.raise(UrcCategory::SocketClosed)
    }

    /// Modem cid used for a logical connection. Connections not yet defined
    /// map to cid `n + 1`.
    pub fn cid(&self, conid: ConnectionId) -> Option<u8> {
        let slot = self.connections.get(usize::from(conid.0))?;
        Some(slot.map(|c| c.cid).unwrap_or(conid.0 + 1))
    }

    pub fn connection_by_cid(&mut self, cid: u8) -> Option<&mut PdnConnection> {
        self.connections
            .iter_mut()
            .flatten()
            .find(|c| c.cid == cid)
    }

    /// Takes the next pending URC, clearing its flag.
    ///
    /// Per-socket categories are only cleared once no socket carries the
    /// flag anymore, so each socket gets its own URC.
    pub fn next_urc(&mut self) -> Option<Urc> {
        for category in UrcCategory::ALL {
            if !self.is_pending(category) {
                continue;
            }
            self.pending &= !category.bit();

            let urc = match category {
                UrcCategory::NetworkRegistration => self
                    .last_registration
                    .map(|(domain, status)| Urc::NetworkRegistration { domain, status }),
                UrcCategory::LocationInfo => {
                    Some(Urc::LocationInfo(self.registration.cgi().clone()))
                }
                UrcCategory::SignalQuality => self.signal.map(Urc::SignalQuality),
                UrcCategory::SocketDataPending => self
                    .take_socket_flag(category, |f| &mut f.data_pending)
                    .map(Urc::SocketDataPending),
                UrcCategory::SocketClosed => self
                    .take_socket_flag(category, |f| &mut f.closed_by_remote)
                    .map(Urc::SocketClosed),
                UrcCategory::PdnEvent => self.last_pdn_event.map(Urc::PdnEvent),
                UrcCategory::PingResponse => self.last_ping.map(Urc::PingResponse),
                UrcCategory::ModemEvent => {
                    let mask = core::mem::take(&mut self.modem_events);
                    (mask != 0).then_some(Urc::ModemEvent(mask))
                }
            };
            if urc.is_some() {
                return urc;
            }
        }
        None
    }

    fn take_socket_flag(
        &mut self,
        category: UrcCategory,
        flag: impl Fn(&mut SocketFlags) -> &mut bool,
    ) -> Option<SocketId> {
        let mut found = None;
        let mut remaining = false;
        for (i, flags) in self.sockets.iter_mut().enumerate() {
            let f = flag(flags);
            if !*f {
                continue;
            }
            if found.is_none() {
                *f = false;
                found = Some(SocketId(i as u8));
            } else {
                remaining = true;
            }
        }
        if remaining {
            self.pending |= category.bit();
        }
        found
    }
}
