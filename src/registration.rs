//! Network registration bookkeeping for the CS, PS and EPS domains.
use embassy_time::{Duration, Instant};
use heapless::String;
use serde::{Deserialize, Serialize};

use crate::parser::{parse_u32, Message};

#[derive(Debug, Clone, Default)]
pub struct CellularRegistrationStatus {
    status: Status,
    updated: Option<Instant>,
    started: Option<Instant>,
}

impl CellularRegistrationStatus {
    pub const fn new() -> Self {
        Self {
            status: Status::None,
            updated: None,
            started: None,
        }
    }

    /// Time spent in the current status.
    pub fn duration(&self, ts: Instant) -> Duration {
        self.started
            .and_then(|started| ts.checked_duration_since(started))
            .unwrap_or_else(|| Duration::from_millis(0))
    }

    pub fn started(&self) -> Option<Instant> {
        self.started
    }

    pub fn updated(&self) -> Option<Instant> {
        self.updated
    }

    pub fn reset(&mut self) {
        self.status = Status::None;
        self.updated = None;
        self.started = None;
    }

    pub fn get_status(&self) -> Status {
        self.status
    }

    /// Records `stat`, returning whether it differs from the previous one.
    pub fn set_status(&mut self, stat: Status) -> bool {
        let ts = Instant::now();
        let changed = self.status != stat;
        if changed {
            self.status = stat;
            self.started = Some(ts);
        }
        self.updated = Some(ts);
        changed
    }

    pub fn registered(&self) -> bool {
        self.status.registered()
    }
}

/// `<stat>` of `+CREG`, `+CGREG` and `+CEREG`.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    #[default]
    None,
    NotRegistering,
    Home,
    Searching,
    Denied,
    OutOfCoverage,
    Roaming,
}

impl Status {
    pub fn registered(&self) -> bool {
        matches!(self, Self::Home | Self::Roaming)
    }
}

impl From<u32> for Status {
    fn from(v: u32) -> Self {
        match v {
            0 => Self::NotRegistering,
            1 => Self::Home,
            2 => Self::Searching,
            3 => Self::Denied,
            4 => Self::OutOfCoverage,
            5 => Self::Roaming,
            _ => Self::None,
        }
    }
}

/// Registration domain, named after the command reporting it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegType {
    Creg,
    Cgreg,
    Cereg,
    #[default]
    Unknown,
}

impl RegType {
    pub fn from_token(token: &[u8]) -> Self {
        match token {
            b"+CREG" => Self::Creg,
            b"+CGREG" => Self::Cgreg,
            b"+CEREG" => Self::Cereg,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CellularGlobalIdentity {
    /// Registered network operator cell Id.
    pub cell_id: Option<String<8>>,
    /// Location Area Code, or Tracking Area Code on EPS.
    pub lac: Option<String<4>>,
}

impl CellularGlobalIdentity {
    pub const fn new() -> Self {
        Self {
            cell_id: None,
            lac: None,
        }
    }
}

/// One registration report, from a read answer or an unsolicited line.
#[derive(Debug, Default)]
pub struct RegistrationParams {
    pub reg_type: RegType,
    pub status: Status,
    /// `<AcT>`, access technology
    pub act: Option<u8>,
    pub cell_id: Option<String<8>>,
    pub lac: Option<String<4>>,
}

fn hex_field<const N: usize>(msg: &Message, rank: u8) -> Option<String<N>> {
    let raw = msg.field_str(rank)?;
    if raw.is_empty() || raw.len() > N || !raw.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let mut s = String::new();
    for b in raw {
        s.push(*b as char).ok()?;
    }
    Some(s)
}

impl RegistrationParams {
    /// Parses a `+CREG`/`+CGREG`/`+CEREG` line.
    ///
    /// The answer to a read command starts with the `<n>` setting, the
    /// unsolicited form does not.
    pub fn parse(msg: &Message, solicited: bool) -> Option<Self> {
        let reg_type = RegType::from_token(msg.token());
        if reg_type == RegType::Unknown {
            return None;
        }
        let first = if solicited { 2 } else { 1 };
        let status = Status::from(msg.field_u32(first)?);
        Some(Self {
            reg_type,
            status,
            lac: hex_field(msg, first + 1),
            cell_id: hex_field(msg, first + 2),
            act: msg
                .field(first + 3)
                .and_then(parse_u32)
                .and_then(|v| u8::try_from(v).ok()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// CSD (Circuit Switched Data) registration status (registered/searching/roaming etc.).
    pub(crate) csd: CellularRegistrationStatus,
    /// PSD (Packet Switched Data) registration status (registered/searching/roaming etc.).
    pub(crate) psd: CellularRegistrationStatus,
    /// EPS (Evolved Packet Switched) registration status (registered/searching/roaming etc.).
    pub(crate) eps: CellularRegistrationStatus,

    pub(crate) cgi: CellularGlobalIdentity,
}

impl Default for RegistrationState {
    fn default() -> Self {
        Self::new()
    }
}

/// What [`RegistrationState::compare_and_set`] changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationChange {
    pub status: bool,
    pub location: bool,
}

impl RegistrationState {
    pub const fn new() -> Self {
        Self {
            csd: CellularRegistrationStatus::new(),
            psd: CellularRegistrationStatus::new(),
            eps: CellularRegistrationStatus::new(),
            cgi: CellularGlobalIdentity::new(),
        }
    }

    /// Determine if a given cellular network status value means that we're
    /// registered with the network.
    pub fn is_registered(&self) -> bool {
        // If PSD or EPS are registered, we are connected!
        self.psd.registered() || self.eps.registered()
    }

    pub fn status(&self, reg_type: RegType) -> Status {
        match reg_type {
            RegType::Creg => self.csd.get_status(),
            RegType::Cgreg => self.psd.get_status(),
            RegType::Cereg => self.eps.get_status(),
            RegType::Unknown => Status::None,
        }
    }

    pub fn cgi(&self) -> &CellularGlobalIdentity {
        &self.cgi
    }

    pub fn reset(&mut self) {
        self.csd.reset();
        self.psd.reset();
        self.eps.reset();
        self.cgi = CellularGlobalIdentity::new();
    }

    pub fn compare_and_set(&mut self, new_params: RegistrationParams) -> RegistrationChange {
        let status = match new_params.reg_type {
            RegType::Creg => self.csd.set_status(new_params.status),
            RegType::Cgreg => self.psd.set_status(new_params.status),
            RegType::Cereg => self.eps.set_status(new_params.status),
            RegType::Unknown => {
                error!("unknown reg type");
                return RegistrationChange::default();
            }
        };

        // Update Cellular Global Identity
        let location = new_params.cell_id.is_some() && self.cgi.cell_id != new_params.cell_id;
        if location {
            self.cgi.cell_id = new_params.cell_id;
            self.cgi.lac = new_params.lac;
        }

        RegistrationChange { status, location }
    }
}
