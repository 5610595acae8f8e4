//! Sensor transport capabilities.
//!
//! Opening a port, binding a bus or talking to BlueZ happens outside the core.
//! The acquisition loop only sees the traits below and a [`TransportFactory`]
//! that builds a fresh transport for every (re)connect attempt.

use crate::error::TransportError;

/// Builds a transport from scratch.
///
/// Every reconnect attempt calls [`open`](TransportFactory::open) again; a
/// transport that failed once is dropped, never reused.
#[allow(async_fn_in_trait)]
pub trait TransportFactory {
    type Transport;

    async fn open(&mut self) -> Result<Self::Transport, TransportError>;
}

/// Blocking source of newline-free text records (serial line).
#[allow(async_fn_in_trait)]
pub trait LineSource {
    async fn read_line(&mut self) -> Result<Vec<u8>, TransportError>;
}

/// Synchronous register reads (I2C bus).
#[allow(async_fn_in_trait)]
pub trait RegisterBus {
    async fn read_block(&mut self, address: u16, command: u8) -> Result<[u8; 2], TransportError>;
}
