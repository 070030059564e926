use heapless::String;
use serde::{Deserialize, Serialize};

/// Number of devices the registry can hold at the same time, e.g. the
/// cellular modem and a GNSS receiver sharing its package.
pub const MAX_HANDLES: usize = 2;

/// Largest rendered text command, prefix and terminator included.
pub const CMD_MAX_SIZE: usize = 256;

/// Largest socket payload transferred in one send or receive request.
pub const SOCKET_DATA_MAX: usize = 1460;

/// Largest message handed to the classifier. A socket payload travels as a
/// single message, so this must hold `SOCKET_DATA_MAX` bytes.
pub const RSP_MAX_SIZE: usize = SOCKET_DATA_MAX + 64;

/// Number of bytes pulled from the transport in one go.
pub const RX_CHUNK_SIZE: usize = 64;

/// Logical PDN connections tracked in the persistent context.
pub const MAX_CONNECTIONS: usize = 4;

/// Sockets tracked in the persistent context.
pub const MAX_SOCKETS: usize = 6;

/// Upper bound on the commands a single request may issue.
pub const MAX_STEPS: u8 = 64;

/// Kind of device sitting behind a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DeviceType {
    Cellular = 0,
    Wifi = 1,
    Gnss = 2,
}

impl DeviceType {
    pub(crate) const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Physical link used to reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelKind {
    Uart,
    Ipc,
}

/// Description of a device passed to `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceDescriptor {
    pub device_type: DeviceType,
    pub channel: ChannelKind,
}

impl DeviceDescriptor {
    pub const fn cellular_uart() -> Self {
        Self {
            device_type: DeviceType::Cellular,
            channel: ChannelKind::Uart,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OperatorFormat {
    #[default]
    Long = 0,
    Short = 1,
    Numeric = 2,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Apn {
    #[default]
    None,
    Given {
        name: String<64>,
        username: Option<String<32>>,
        password: Option<String<32>>,
    },
}

impl Apn {
    /// Access point without credentials. Names longer than 64 bytes are
    /// truncated.
    pub fn named(name: &str) -> Self {
        let mut s = String::new();
        for c in name.chars() {
            if s.push(c).is_err() {
                break;
            }
        }
        Self::Given {
            name: s,
            username: None,
            password: None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::None => "",
            Self::Given { name, .. } => name.as_str(),
        }
    }
}
