// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Ledger Acre Bitcoin API Library (and CLI)
//!
//! Operations are exposed via [DeviceHandle], which drives interrupted
//! execution using a per-operation [ClientCommandInterpreter] loaded with
//! the data the device may request.

use std::fmt::Debug;

use async_trait::async_trait;

/// Re-export transports for consumer use
pub mod transport;
pub use transport::{Exchange, TcpOptions, TcpTransport};

/// Re-export `ledger-acre-apdu` for consumers
pub use ledger_acre_apdu::{self as apdu};

mod handle;
pub use handle::{DeviceHandle, WalletRegistration};

mod error;
pub use error::Error;

pub mod interpreter;
pub use interpreter::{ClientCommandInterpreter, InterpreterError};

pub mod merkleize;
pub use merkleize::{MerkleMap, MerkleizedPsbt};

pub mod policy;
pub use policy::WalletPolicy;

pub mod psbt;
pub use psbt::Psbt;

pub mod signature;
pub use signature::MessageSignature;

pub mod withdrawal;
pub use withdrawal::{WithdrawalData, WithdrawalRequest};

/// Ledger provider manages connections to ledger devices
#[derive(Clone, Debug, Default)]
pub struct LedgerProvider;

/// Connect trait for supported transports
#[async_trait]
pub trait Connect<T: Exchange> {
    type Options: Debug;

    /// Connect to the specified device
    async fn connect(&self, opts: &Self::Options) -> Result<DeviceHandle<T>, Error>;
}

/// Connect implementation for TCP (speculos) devices
#[async_trait]
impl Connect<TcpTransport> for LedgerProvider {
    type Options = TcpOptions;

    async fn connect(&self, opts: &Self::Options) -> Result<DeviceHandle<TcpTransport>, Error> {
        log::debug!("Connecting to {}:{}", opts.addr, opts.port);

        // Connect to device
        let t = TcpTransport::new(opts.clone()).await?;

        // Create handle
        Ok(DeviceHandle::from(t))
    }
}
