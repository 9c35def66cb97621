// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Withdrawal (Safe transaction) payloads
//!
//! Withdrawals are signed as a fixed chunk layout so the device can parse
//! fields without holding the whole payload:
//!
//! ```text
//! 0:  TO[20] | GAS_TOKEN[20] | REFUND_RECEIVER[20]
//! 1:  VALUE[32] | SAFE_TX_GAS[32]
//! 2:  BASE_GAS[32] | GAS_PRICE[32]
//! 3:  NONCE[32] | OPERATION[1]
//! 4:  DATA[0..4] (function selector)
//! 5+: DATA[4..] in 64 byte chunks
//! ```

use serde::{Deserialize, Serialize};

use ledger_acre_apdu::message::MESSAGE_CHUNK_LEN;

use crate::Error;

/// Ethereum address length
pub const ADDRESS_LEN: usize = 20;

/// Unsigned 256-bit word length
pub const WORD_LEN: usize = 32;

/// Function selector length
pub const SELECTOR_LEN: usize = 4;

/// Number of fixed chunks preceding the call data chunks
pub const FIXED_CHUNKS: usize = 5;

/// Withdrawal request in its textual (JSON) form
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub to: String,
    pub value: String,
    pub data: String,
    pub operation: String,
    pub safe_tx_gas: String,
    pub base_gas: String,
    pub gas_price: String,
    pub gas_token: String,
    pub refund_receiver: String,
    pub nonce: String,
}

/// Withdrawal payload with fields at their wire widths
#[derive(Clone, PartialEq, Debug)]
pub struct WithdrawalData {
    pub to: [u8; ADDRESS_LEN],
    pub value: [u8; WORD_LEN],
    pub data: Vec<u8>,
    pub operation: u8,
    pub safe_tx_gas: [u8; WORD_LEN],
    pub base_gas: [u8; WORD_LEN],
    pub gas_price: [u8; WORD_LEN],
    pub gas_token: [u8; ADDRESS_LEN],
    pub refund_receiver: [u8; ADDRESS_LEN],
    pub nonce: [u8; WORD_LEN],
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidWithdrawal(msg.into())
}

/// Decode `0x` prefixed hex, allowing an odd number of digits
fn decode_hex(field: &str, s: &str) -> Result<Vec<u8>, Error> {
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);

    let r = match s.len() % 2 {
        0 => hex::decode(s),
        _ => hex::decode(format!("0{s}")),
    };

    r.map_err(|e| invalid(format!("{field}: {e}")))
}

/// Decode hex and left-pad to a fixed width
fn decode_padded<const N: usize>(field: &str, s: &str) -> Result<[u8; N], Error> {
    let b = decode_hex(field, s)?;
    if b.len() > N {
        return Err(invalid(format!("{field}: {} bytes exceeds {N}", b.len())));
    }

    let mut v = [0u8; N];
    v[N - b.len()..].copy_from_slice(&b);
    Ok(v)
}

/// Decode the operation byte, decimal or `0x` hex
fn decode_operation(s: &str) -> Result<u8, Error> {
    if s.starts_with("0x") || s.starts_with("0X") {
        return decode_padded::<1>("operation", s).map(|v| v[0]);
    }

    s.parse()
        .map_err(|e| invalid(format!("operation: {e}")))
}

impl TryFrom<&WithdrawalRequest> for WithdrawalData {
    type Error = Error;

    fn try_from(r: &WithdrawalRequest) -> Result<Self, Self::Error> {
        let d = Self {
            to: decode_padded("to", &r.to)?,
            value: decode_padded("value", &r.value)?,
            data: decode_hex("data", &r.data)?,
            operation: decode_operation(&r.operation)?,
            safe_tx_gas: decode_padded("safeTxGas", &r.safe_tx_gas)?,
            base_gas: decode_padded("baseGas", &r.base_gas)?,
            gas_price: decode_padded("gasPrice", &r.gas_price)?,
            gas_token: decode_padded("gasToken", &r.gas_token)?,
            refund_receiver: decode_padded("refundReceiver", &r.refund_receiver)?,
            nonce: decode_padded("nonce", &r.nonce)?,
        };

        if d.data.len() < SELECTOR_LEN {
            return Err(invalid("data shorter than function selector"));
        }

        Ok(d)
    }
}

impl WithdrawalData {
    /// Lay out the withdrawal as signing chunks
    pub fn chunks(&self) -> Result<Vec<Vec<u8>>, Error> {
        if self.data.len() < SELECTOR_LEN {
            return Err(invalid("data shorter than function selector"));
        }

        let mut chunks = Vec::with_capacity(self.chunk_count());

        chunks.push([&self.to[..], &self.gas_token, &self.refund_receiver].concat());
        chunks.push([self.value, self.safe_tx_gas].concat());
        chunks.push([self.base_gas, self.gas_price].concat());
        chunks.push([&self.nonce[..], &[self.operation]].concat());
        chunks.push(self.data[..SELECTOR_LEN].to_vec());

        chunks.extend(
            self.data[SELECTOR_LEN..]
                .chunks(MESSAGE_CHUNK_LEN)
                .map(|c| c.to_vec()),
        );

        Ok(chunks)
    }

    /// Number of signing chunks
    pub fn chunk_count(&self) -> usize {
        let n = self.data.len().saturating_sub(SELECTOR_LEN);
        FIXED_CHUNKS + (n + MESSAGE_CHUNK_LEN - 1) / MESSAGE_CHUNK_LEN
    }
}
