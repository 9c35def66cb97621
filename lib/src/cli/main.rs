// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Command line utility for interacting with the Ledger Acre Bitcoin app

use clap::Parser;
use log::{debug, info, LevelFilter};

use ledger_acre::{
    apdu::prelude::DerivationPath, Connect, DeviceHandle, Exchange, LedgerProvider,
    MerkleizedPsbt, MessageSignature, Psbt, TcpOptions, WalletPolicy, WithdrawalData,
    WithdrawalRequest,
};

mod helpers;
use helpers::*;

/// Ledger command line utility
#[derive(Clone, PartialEq, Debug, Parser)]
struct Options {
    /// Simulator connection options
    #[clap(flatten)]
    tcp: TcpOptions,

    /// Subcommand to execute
    #[clap(subcommand)]
    cmd: Actions,

    /// Enable verbose logging
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,
}

#[derive(Clone, PartialEq, Debug, Parser)]
#[non_exhaustive]
enum Actions {
    /// Fetch an extended public key
    Pubkey {
        /// BIP32 derivation path
        #[clap(long, default_value = "m/84'/0'/0'")]
        path: DerivationPath,

        /// Show the key on the device
        #[clap(long)]
        display: bool,
    },

    /// Fetch the master key fingerprint
    Fingerprint,

    /// Register a wallet policy
    RegisterWallet {
        /// Wallet policy file (JSON)
        #[clap(long)]
        policy: String,
    },

    /// Fetch a wallet address
    Address {
        /// Wallet policy file (JSON)
        #[clap(long)]
        policy: String,

        /// Hex-encoded registration HMAC (omit for default policies)
        #[clap(long)]
        hmac: Option<HexData<32>>,

        /// Change address (0 for receive, 1 for change)
        #[clap(long, default_value = "0")]
        change: u8,

        /// Address index
        #[clap(long, default_value = "0")]
        index: u32,

        /// Show the address on the device
        #[clap(long)]
        display: bool,
    },

    /// Sign a PSBT (v2)
    SignPsbt {
        /// Base64 encoded PSBT file
        #[clap(long)]
        psbt: String,

        /// Wallet policy file (JSON)
        #[clap(long)]
        policy: String,

        /// Hex-encoded registration HMAC (omit for default policies)
        #[clap(long)]
        hmac: Option<HexData<32>>,
    },

    /// Sign a message
    SignMessage {
        /// BIP32 derivation path
        #[clap(long)]
        path: DerivationPath,

        /// Message to sign
        #[clap(long)]
        message: String,
    },

    /// Sign an ERC-4361 message
    SignErc4361 {
        /// BIP32 derivation path
        #[clap(long)]
        path: DerivationPath,

        /// Message to sign
        #[clap(long)]
        message: String,
    },

    /// Sign a withdrawal
    SignWithdrawal {
        /// BIP32 derivation path
        #[clap(long)]
        path: DerivationPath,

        /// Withdrawal request file (JSON)
        #[clap(long)]
        input: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Options::parse();

    // Setup logging
    simplelog::SimpleLogger::init(args.log_level, simplelog::Config::default())?;

    debug!("Using transport: {:?}", args.tcp);

    // Connect to device
    let t = LedgerProvider.connect(&args.tcp).await?;

    // Execute command
    execute(t, args.cmd).await?;

    Ok(())
}

/// Execute a command with the provided transport
async fn execute<T>(t: DeviceHandle<T>, cmd: Actions) -> anyhow::Result<()>
where
    T: Exchange + Send,
{
    debug!("Executing command: {:?}", cmd);

    match cmd {
        Actions::Pubkey { path, display } => {
            info!("requesting extended pubkey for path: {}", path);

            let k = t.get_extended_pubkey(path.elements(), display).await?;

            info!("xpub: {}", k);
        }
        Actions::Fingerprint => {
            let f = t.get_master_fingerprint().await?;

            info!("master fingerprint: {}", hex::encode(f));
        }
        Actions::RegisterWallet { policy } => {
            let p: WalletPolicy = read_json(&policy).await?;

            info!("registering wallet policy: '{}' ({})", p.name, p.template);

            let r = t.register_wallet(&p).await?;

            info!("wallet id: {}", hex::encode(r.wallet_id));
            info!("wallet hmac: {}", hex::encode(r.hmac));
        }
        Actions::Address {
            policy,
            hmac,
            change,
            index,
            display,
        } => {
            let p: WalletPolicy = read_json(&policy).await?;

            let a = t
                .get_wallet_address(
                    &p,
                    hmac.as_ref().map(|h| &h.0[..]),
                    change,
                    index,
                    display,
                )
                .await?;

            info!("address: {}", a);
        }
        Actions::SignPsbt { psbt, policy, hmac } => {
            let p: WalletPolicy = read_json(&policy).await?;

            let s = tokio::fs::read_to_string(&psbt).await?;
            let parsed = Psbt::from_base64(&s)?;
            let merkleized = MerkleizedPsbt::from(&parsed);

            let sigs = t
                .sign_psbt(&merkleized, &p, hmac.as_ref().map(|h| &h.0[..]), None)
                .await?;

            for (i, s) in sigs {
                info!("input {}: {}", i, hex::encode(s));
            }
        }
        Actions::SignMessage { path, message } => {
            let s = t.sign_message(message.as_bytes(), path.elements()).await?;
            log_signature(&s)?;
        }
        Actions::SignErc4361 { path, message } => {
            let s = t
                .sign_erc4361_message(message.as_bytes(), path.elements())
                .await?;
            log_signature(&s)?;
        }
        Actions::SignWithdrawal { path, input } => {
            let r: WithdrawalRequest = read_json(&input).await?;
            let w = WithdrawalData::try_from(&r)?;

            let s = t.sign_withdrawal(path.elements(), &w).await?;
            log_signature(&s)?;
        }
    }

    Ok(())
}

fn log_signature(s: &str) -> anyhow::Result<()> {
    let sig = MessageSignature::from_base64(s)?;

    info!("signature: {}", s);
    info!("v: {}", sig.v);
    info!("r: {}", hex::encode(sig.r));
    info!("s: {}", hex::encode(sig.s));

    Ok(())
}
