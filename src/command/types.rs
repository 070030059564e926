//! Argument and parameter types shared by the engine and personalities
use serde::{Deserialize, Serialize};

/// PDP type of a packet data context, `+CGDCONT` `<PDP_type>`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PdpType {
    #[default]
    Ip,
    Ipv6,
    Ipv4v6,
    NonIp,
}

impl PdpType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ip => "IP",
            Self::Ipv6 => "IPV6",
            Self::Ipv4v6 => "IPV4V6",
            Self::NonIp => "Non-IP",
        }
    }
}

/// SIM state as reported by `+CPIN`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SimState {
    #[default]
    Unknown,
    NotInserted,
    Ready,
    SimPin,
    SimPuk,
    SimPin2,
    SimPuk2,
    PhNetPin,
    PhNetSubPin,
    PhSpPin,
    PhCorpPin,
    PhSimPin,
}

impl SimState {
    pub fn from_code(code: &[u8]) -> Self {
        match code {
            b"READY" => Self::Ready,
            b"SIM PIN" => Self::SimPin,
            b"SIM PUK" => Self::SimPuk,
            b"SIM PIN2" => Self::SimPin2,
            b"SIM PUK2" => Self::SimPuk2,
            b"PH-NET PIN" => Self::PhNetPin,
            b"PH-NETSUB PIN" => Self::PhNetSubPin,
            b"PH-SP PIN" => Self::PhSpPin,
            b"PH-CORP PIN" => Self::PhCorpPin,
            b"PH-SIM PIN" => Self::PhSimPin,
            _ => Self::Unknown,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Packet domain event reported through `+CGEV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PdnEventKind {
    NetworkDetach,
    MobileStationDetach,
    NetworkDeactivate,
    MobileStationDeactivate,
    NetworkPdnDeactivate,
    MobileStationPdnDeactivate,
    NetworkPdnActivate,
    MobileStationPdnActivate,
}

impl PdnEventKind {
    /// Parses the event text of a `+CGEV` line. Trailing parameters such as
    /// the cid are not part of `text`.
    pub fn from_text(text: &[u8]) -> Option<Self> {
        Some(match text {
            b"NW DETACH" => Self::NetworkDetach,
            b"ME DETACH" => Self::MobileStationDetach,
            b"NW DEACT" => Self::NetworkDeactivate,
            b"ME DEACT" => Self::MobileStationDeactivate,
            b"NW PDN DEACT" => Self::NetworkPdnDeactivate,
            b"ME PDN DEACT" => Self::MobileStationPdnDeactivate,
            b"NW PDN ACT" => Self::NetworkPdnActivate,
            b"ME PDN ACT" => Self::MobileStationPdnActivate,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_state_codes() {
        assert_eq!(SimState::from_code(b"READY"), SimState::Ready);
        assert_eq!(SimState::from_code(b"SIM PIN"), SimState::SimPin);
        assert_eq!(SimState::from_code(b"PH-NETSUB PIN"), SimState::PhNetSubPin);
        assert_eq!(SimState::from_code(b"garbage"), SimState::Unknown);
    }

    #[test]
    fn packet_switched_event_text() {
        assert_eq!(
            PdnEventKind::from_text(b"ME DETACH"),
            Some(PdnEventKind::MobileStationDetach)
        );
        assert_eq!(
            PdnEventKind::from_text(b"NW PDN DEACT"),
            Some(PdnEventKind::NetworkPdnDeactivate)
        );
        assert_eq!(PdnEventKind::from_text(b"NW DETACHED"), None);
    }
}
