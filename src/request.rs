//! Service requests accepted by the engine and the data they produce.
use heapless::{String, Vec};
use no_std_net::IpAddr;
use serde::{Deserialize, Serialize};

use crate::command::types::{PdnEventKind, PdpType, SimState};
use crate::config::{Apn, SOCKET_DATA_MAX};
use crate::context::socket::SocketId;
use crate::registration::{CellularGlobalIdentity, RegType, Status};

/// Local logical PDN connection, mapped to a modem cid by the persistent
/// context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionId(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceInfoField {
    Manufacturer,
    Model,
    Revision,
    Imei,
    Imsi,
    Iccid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketProtocol {
    Tcp,
    Udp,
}

/// Category of unsolicited result codes an application can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum UrcCategory {
    NetworkRegistration = 0,
    LocationInfo,
    SignalQuality,
    SocketDataPending,
    SocketClosed,
    PdnEvent,
    PingResponse,
    ModemEvent,
}

impl UrcCategory {
    pub const ALL: [Self; 8] = [
        Self::NetworkRegistration,
        Self::LocationInfo,
        Self::SignalQuality,
        Self::SocketDataPending,
        Self::SocketClosed,
        Self::PdnEvent,
        Self::PingResponse,
        Self::ModemEvent,
    ];

    pub(crate) const fn bit(self) -> u16 {
        1 << (self as u8)
    }
}

/// A service request. Each one runs as a single transaction that may issue
/// several wire commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Plain `AT`, checks the modem answers
    CheckConnection,
    /// Echo off, verbose errors, operator format
    ModemConfig,
    GetDeviceInfo(DeviceInfoField),
    GetSignalQuality,
    GetSimStatus,

    /// Automatic operator selection
    Register,
    Deregister,
    GetNetworkStatus,

    GetAttachStatus,
    Attach,
    Detach,

    SubscribeUrc(UrcCategory),
    UnsubscribeUrc(UrcCategory),

    DefinePdn {
        conid: ConnectionId,
        pdp_type: PdpType,
        apn: Apn,
    },
    ActivatePdn(ConnectionId),
    DeactivatePdn(ConnectionId),
    GetIpAddress(ConnectionId),

    /// Enter data mode on a PDN connection
    DataDial(ConnectionId),
    /// Escape back to command mode, the data session stays up
    DataSuspend,
    /// Return to an established data session
    DataResume,

    SocketOpen {
        conid: ConnectionId,
        protocol: SocketProtocol,
        remote: IpAddr,
        port: u16,
    },
    SocketSend {
        socket: SocketId,
        data: Vec<u8, SOCKET_DATA_MAX>,
    },
    SocketReceive {
        socket: SocketId,
        max_len: usize,
    },
    SocketClose(SocketId),

    Ping {
        conid: ConnectionId,
        host: String<64>,
    },
}

/// Discriminant of a [`Request`], carried in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestId {
    CheckConnection,
    ModemConfig,
    GetDeviceInfo,
    GetSignalQuality,
    GetSimStatus,
    Register,
    Deregister,
    GetNetworkStatus,
    GetAttachStatus,
    Attach,
    Detach,
    SubscribeUrc,
    UnsubscribeUrc,
    DefinePdn,
    ActivatePdn,
    DeactivatePdn,
    GetIpAddress,
    DataDial,
    DataSuspend,
    DataResume,
    SocketOpen,
    SocketSend,
    SocketReceive,
    SocketClose,
    Ping,
}

impl Request {
    pub fn id(&self) -> RequestId {
        match self {
            Self::CheckConnection => RequestId::CheckConnection,
            Self::ModemConfig => RequestId::ModemConfig,
            Self::GetDeviceInfo(_) => RequestId::GetDeviceInfo,
            Self::GetSignalQuality => RequestId::GetSignalQuality,
            Self::GetSimStatus => RequestId::GetSimStatus,
            Self::Register => RequestId::Register,
            Self::Deregister => RequestId::Deregister,
            Self::GetNetworkStatus => RequestId::GetNetworkStatus,
            Self::GetAttachStatus => RequestId::GetAttachStatus,
            Self::Attach => RequestId::Attach,
            Self::Detach => RequestId::Detach,
            Self::SubscribeUrc(_) => RequestId::SubscribeUrc,
            Self::UnsubscribeUrc(_) => RequestId::UnsubscribeUrc,
            Self::DefinePdn { .. } => RequestId::DefinePdn,
            Self::ActivatePdn(_) => RequestId::ActivatePdn,
            Self::DeactivatePdn(_) => RequestId::DeactivatePdn,
            Self::GetIpAddress(_) => RequestId::GetIpAddress,
            Self::DataDial(_) => RequestId::DataDial,
            Self::DataSuspend => RequestId::DataSuspend,
            Self::DataResume => RequestId::DataResume,
            Self::SocketOpen { .. } => RequestId::SocketOpen,
            Self::SocketSend { .. } => RequestId::SocketSend,
            Self::SocketReceive { .. } => RequestId::SocketReceive,
            Self::SocketClose(_) => RequestId::SocketClose,
            Self::Ping { .. } => RequestId::Ping,
        }
    }
}

/// `+CSQ` values, `99` meaning not known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalQuality {
    pub rssi: u8,
    pub ber: u8,
}

impl SignalQuality {
    /// Received signal strength in dBm, if known.
    pub fn rssi_dbm(&self) -> Option<i16> {
        match self.rssi {
            0..=31 => Some(-113 + 2 * i16::from(self.rssi)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NetworkStatus {
    pub csd: Status,
    pub psd: Status,
    pub eps: Status,
}

impl NetworkStatus {
    pub fn registered(&self) -> bool {
        [self.csd, self.psd, self.eps]
            .iter()
            .any(|s| matches!(s, Status::Home | Status::Roaming))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PdnEvent {
    pub kind: PdnEventKind,
    pub cid: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PingResult {
    /// Round trip time, `None` when the host did not answer
    pub rtt_ms: Option<u32>,
}

/// Result of a successful request.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    #[default]
    None,
    DeviceInfo(String<64>),
    SignalQuality(SignalQuality),
    SimStatus(SimState),
    NetworkStatus(NetworkStatus),
    AttachStatus(bool),
    IpAddress(IpAddr),
    Socket(SocketId),
    SocketData(Vec<u8, SOCKET_DATA_MAX>),
    SocketSent(usize),
    Ping(PingResult),
}

/// Unsolicited result code delivered to the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urc {
    NetworkRegistration { domain: RegType, status: Status },
    LocationInfo(CellularGlobalIdentity),
    SignalQuality(SignalQuality),
    SocketDataPending(SocketId),
    SocketClosed(SocketId),
    PdnEvent(PdnEvent),
    PingResponse(PingResult),
    /// Bitmask of vendor defined modem events
    ModemEvent(u32),
}
