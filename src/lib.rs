#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod client;
pub mod command;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod modules;
pub mod notifier;
pub mod parser;
pub mod registration;
pub mod request;
pub mod transport;

#[cfg(feature = "async")]
pub mod asynch;

#[cfg(test)]
mod test_helpers;

pub use client::{AtCore, Callbacks, Handle};
pub use config::{DeviceDescriptor, DeviceType};
pub use engine::{Device, Progress};
pub use error::{Error, ErrorReport};
pub use modules::{GenericConfig, GenericModem, Personality};
pub use notifier::Notifier;
pub use request::{Request, Response, Urc, UrcCategory};
pub use transport::{Serial, Transport};
