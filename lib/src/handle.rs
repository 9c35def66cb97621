// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Handle for connected ledger devices
//!
//! This provides methods for interacting with the device
//! and is generic over [Exchange] transports

use std::{collections::BTreeMap, sync::Arc};

use base64::prelude::{Engine as _, BASE64_STANDARD};
use encdec::Decode;
use log::{debug, warn};
use tokio::sync::Mutex;

use ledger_acre_apdu::{
    encode_apdu,
    fingerprint::{MasterFingerprintReq, MasterFingerprintResp},
    framework::ContinueReq,
    merkle::{Hash, HASH_LEN},
    message::{MessageKind, SignMessageReq},
    path::MAX_PATH_LEN,
    psbt::SignPsbtReq,
    pubkey::GetExtendedPubkeyReq,
    wallet::{GetWalletAddressReq, RegisterWalletReq, RegisterWalletResp},
    ApduError, ApduReq, StatusWord,
};

use crate::{
    interpreter::{ClientCommandInterpreter, ProgressCallback},
    merkleize::{message_chunks, MerkleizedPsbt},
    policy::WalletPolicy,
    transport::{send, Exchange},
    withdrawal::WithdrawalData,
    Error,
};

/// Acre handle for a connected ledger device.
///
/// This is generic over [Exchange] types to support different
/// underlying transports. Each operation holds the transport for its
/// full duration, operations on clones of a handle are serialised.
pub struct DeviceHandle<T: Exchange> {
    /// Transport for communication
    t: Arc<Mutex<T>>,
}

impl<T: Exchange> Clone for DeviceHandle<T> {
    fn clone(&self) -> Self {
        Self { t: self.t.clone() }
    }
}

/// Create a [DeviceHandle] wrapper from a type implementing [Exchange]
impl<T: Exchange> From<T> for DeviceHandle<T> {
    fn from(t: T) -> Self {
        Self {
            t: Arc::new(Mutex::new(t)),
        }
    }
}

/// Execution step of a single logical request
#[derive(Clone, PartialEq, Debug)]
enum Step {
    /// Frame to be sent
    Send(Vec<u8>),
    /// Device suspended execution with a client command
    Interrupted(Vec<u8>),
    /// Device completed with a response body
    Done(Vec<u8>),
}

/// Wallet registration result
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct WalletRegistration {
    /// Policy identifier
    pub wallet_id: Hash,
    /// Authentication tag for later use of the policy
    pub hmac: Hash,
}

fn check_path(path: &[u32]) -> Result<(), Error> {
    if path.len() > MAX_PATH_LEN {
        return Err(Error::PathTooLong(path.len()));
    }
    Ok(())
}

/// Resolve an optional registration HMAC, zeroed for default policies
fn hmac_or_zero(hmac: Option<&[u8]>) -> Result<Hash, Error> {
    let mut h = [0u8; HASH_LEN];

    if let Some(v) = hmac {
        if v.len() != HASH_LEN {
            return Err(Error::InvalidHmacLength(v.len()));
        }
        h.copy_from_slice(v);
    }

    Ok(h)
}

/// Decode a fixed layout response, rejecting trailing bytes
fn decode_response<R>(b: &[u8]) -> Result<R, Error>
where
    R: for<'a> Decode<'a, Output = R, Error = ApduError>,
{
    let (r, n) = R::decode(b)?;
    if n != b.len() {
        return Err(Error::InvalidLength);
    }
    Ok(r)
}

fn ascii_response(b: Vec<u8>) -> Result<String, Error> {
    String::from_utf8(b).map_err(|_| Error::UnexpectedResponse)
}

impl<T: Exchange + Send> DeviceHandle<T> {
    /// Fetch a handle to the underlying transport
    pub fn transport(&self) -> Arc<Mutex<T>> {
        self.t.clone()
    }

    /// Execute a request, answering client commands until the device completes
    ///
    /// Requests without an interpreter fail if the device suspends execution.
    async fn make_request<R: ApduReq>(
        &self,
        req: &R,
        mut cci: Option<&mut ClientCommandInterpreter>,
    ) -> Result<Vec<u8>, Error> {
        let mut step = Step::Send(encode_apdu(req)?);

        // Hold the transport for the whole exchange
        let mut t = self.t.lock().await;

        loop {
            step = match step {
                Step::Send(frame) => match send(&mut *t, &frame).await? {
                    (StatusWord::Ok, body) => Step::Done(body),
                    (StatusWord::InterruptedExecution, body) => Step::Interrupted(body),
                    (sw, _) => return Err(Error::Status(sw as u16)),
                },
                Step::Interrupted(cmd) => {
                    let i = cci.as_deref_mut().ok_or(Error::UnexpectedInterrupt)?;
                    let answer = i.execute(&cmd)?;

                    Step::Send(encode_apdu(&ContinueReq::new(&answer))?)
                }
                Step::Done(body) => return Ok(body),
            }
        }
    }

    /// Fetch the extended public key for a derivation path
    pub async fn get_extended_pubkey(&self, path: &[u32], display: bool) -> Result<String, Error> {
        check_path(path)?;

        debug!("Requesting extended pubkey (path: {:08x?})", path);

        let resp = self
            .make_request(&GetExtendedPubkeyReq::new(path, display), None)
            .await?;

        ascii_response(resp)
    }

    /// Fetch the master key fingerprint
    pub async fn get_master_fingerprint(&self) -> Result<[u8; 4], Error> {
        debug!("Requesting master fingerprint");

        let resp = self.make_request(&MasterFingerprintReq {}, None).await?;
        let f: MasterFingerprintResp = decode_response(&resp)?;

        Ok(f.fingerprint)
    }

    /// Register a wallet policy, returning its identifier and HMAC
    pub async fn register_wallet(&self, policy: &WalletPolicy) -> Result<WalletRegistration, Error> {
        let serialized = policy.serialize()?;

        let mut i = ClientCommandInterpreter::new();
        policy.register(&mut i)?;

        debug!("Registering wallet policy '{}'", policy.name);

        let resp = self
            .make_request(&RegisterWalletReq::new(&serialized), Some(&mut i))
            .await?;
        let r: RegisterWalletResp = decode_response(&resp)?;

        Ok(WalletRegistration {
            wallet_id: r.wallet_id,
            hmac: r.hmac,
        })
    }

    /// Fetch a receive (`change = 0`) or change (`change = 1`) address
    pub async fn get_wallet_address(
        &self,
        policy: &WalletPolicy,
        hmac: Option<&[u8]>,
        change: u8,
        address_index: u32,
        display: bool,
    ) -> Result<String, Error> {
        if change > 1 {
            return Err(Error::InvalidChange(change));
        }
        let hmac = hmac_or_zero(hmac)?;

        let mut i = ClientCommandInterpreter::new();
        policy.register(&mut i)?;

        let req = GetWalletAddressReq {
            display,
            wallet_id: policy.id()?,
            hmac,
            change: change == 1,
            address_index,
        };

        debug!(
            "Requesting address (change: {}, index: {})",
            change, address_index
        );

        let resp = self.make_request(&req, Some(&mut i)).await?;

        ascii_response(resp)
    }

    /// Sign a merkleized PSBT, returning signatures by input index
    pub async fn sign_psbt(
        &self,
        psbt: &MerkleizedPsbt,
        policy: &WalletPolicy,
        hmac: Option<&[u8]>,
        progress: Option<ProgressCallback>,
    ) -> Result<BTreeMap<usize, Vec<u8>>, Error> {
        let hmac = hmac_or_zero(hmac)?;

        let mut i = match progress {
            Some(p) => ClientCommandInterpreter::with_progress(p),
            None => ClientCommandInterpreter::new(),
        };

        policy.register(&mut i)?;
        psbt.register(&mut i);

        let req = SignPsbtReq {
            global: psbt.global_commitment(),
            input_count: psbt.input_count() as u64,
            inputs_root: psbt.inputs_root(),
            output_count: psbt.output_count() as u64,
            outputs_root: psbt.outputs_root(),
            wallet_id: policy.id()?,
            hmac,
        };

        debug!(
            "Signing PSBT ({} inputs, {} outputs)",
            psbt.input_count(),
            psbt.output_count()
        );

        self.make_request(&req, Some(&mut i)).await?;

        let mut signatures = BTreeMap::new();
        for y in i.into_yielded() {
            match y.split_first() {
                Some((index, sig)) => {
                    signatures.insert(*index as usize, sig.to_vec());
                }
                None => warn!("Ignoring empty yielded fragment"),
            }
        }

        Ok(signatures)
    }

    /// Sign a message, returning the base64 encoded compact signature
    pub async fn sign_message(&self, message: &[u8], path: &[u32]) -> Result<String, Error> {
        check_path(path)?;

        let chunks = message_chunks(message);
        self.sign_chunks(MessageKind::Message, path, message.len(), &chunks)
            .await
    }

    /// Sign an ERC-4361 message, returning the base64 encoded compact signature
    pub async fn sign_erc4361_message(
        &self,
        message: &[u8],
        path: &[u32],
    ) -> Result<String, Error> {
        check_path(path)?;

        let chunks = message_chunks(message);
        self.sign_chunks(MessageKind::Erc4361, path, message.len(), &chunks)
            .await
    }

    /// Sign a withdrawal, returning the base64 encoded compact signature
    pub async fn sign_withdrawal(
        &self,
        path: &[u32],
        withdrawal: &WithdrawalData,
    ) -> Result<String, Error> {
        check_path(path)?;

        // Withdrawals send the chunk count rather than a byte length
        let chunks = withdrawal.chunks()?;
        self.sign_chunks(MessageKind::Withdrawal, path, chunks.len(), &chunks)
            .await
    }

    async fn sign_chunks<B: AsRef<[u8]>>(
        &self,
        kind: MessageKind,
        path: &[u32],
        len: usize,
        chunks: &[B],
    ) -> Result<String, Error> {
        let mut i = ClientCommandInterpreter::new();
        let root = i.add_known_list(chunks);

        let req = SignMessageReq {
            kind,
            path,
            len: len as u64,
            root,
        };

        debug!("Signing {} ({} chunks)", kind, chunks.len());

        let resp = self.make_request(&req, Some(&mut i)).await?;

        Ok(BASE64_STANDARD.encode(resp))
    }
}
