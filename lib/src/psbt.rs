// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Minimal PSBT (v2) container parser
//!
//! Splits a serialized PSBT into its global, input and output key / value
//! maps for merkleization. Transaction semantics are not validated.

use std::collections::BTreeMap;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use byteorder::{ByteOrder, LittleEndian};
use log::debug;

use ledger_acre_apdu::varint;

use crate::Error;

/// PSBT magic bytes
pub const PSBT_MAGIC: [u8; 5] = *b"psbt\xff";

/// Global PSBT version key
pub const PSBT_GLOBAL_VERSION: u8 = 0xfb;
/// Global input count key (v2)
pub const PSBT_GLOBAL_INPUT_COUNT: u8 = 0x04;
/// Global output count key (v2)
pub const PSBT_GLOBAL_OUTPUT_COUNT: u8 = 0x05;

/// Key / value map of a PSBT section
pub type PsbtMap = BTreeMap<Vec<u8>, Vec<u8>>;

/// Parsed PSBT maps
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Psbt {
    pub global: PsbtMap,
    pub inputs: Vec<PsbtMap>,
    pub outputs: Vec<PsbtMap>,
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidPsbt(msg.into())
}

/// Read one map, returning the map and bytes consumed (including terminator)
fn read_map(buff: &[u8]) -> Result<(PsbtMap, usize), Error> {
    let mut map = PsbtMap::new();
    let mut index = 0;

    loop {
        let (key_len, n) = varint::decode(&buff[index..]).map_err(|_| invalid("truncated key"))?;
        index += n;

        // Zero length key terminates the map
        if key_len == 0 {
            return Ok((map, index));
        }

        let key_len = usize::try_from(key_len).map_err(|_| invalid("truncated key"))?;
        if buff.len() - index < key_len {
            return Err(invalid("truncated key"));
        }
        let key = buff[index..][..key_len].to_vec();
        index += key_len;

        let (value_len, n) =
            varint::decode(&buff[index..]).map_err(|_| invalid("truncated value"))?;
        index += n;

        let value_len = usize::try_from(value_len).map_err(|_| invalid("truncated value"))?;
        if buff.len() - index < value_len {
            return Err(invalid("truncated value"));
        }
        let value = buff[index..][..value_len].to_vec();
        index += value_len;

        if map.contains_key(&key) {
            return Err(invalid(format!("duplicate key {}", hex::encode(&key))));
        }
        map.insert(key, value);
    }
}

/// Read a varint count from a global map entry
fn read_count(global: &PsbtMap, key: u8) -> Result<usize, Error> {
    let v = global
        .get(&vec![key])
        .ok_or_else(|| invalid(format!("missing global key 0x{key:02x}")))?;

    match varint::decode(v) {
        Ok((c, n)) if n == v.len() => {
            usize::try_from(c).map_err(|_| invalid(format!("invalid count for key 0x{key:02x}")))
        }
        _ => Err(invalid(format!("invalid count for key 0x{key:02x}"))),
    }
}

impl Psbt {
    /// Parse a serialized PSBT
    pub fn from_bytes(buff: &[u8]) -> Result<Self, Error> {
        if buff.len() < PSBT_MAGIC.len() || buff[..PSBT_MAGIC.len()] != PSBT_MAGIC {
            return Err(invalid("bad magic"));
        }
        let mut index = PSBT_MAGIC.len();

        let (global, n) = read_map(&buff[index..])?;
        index += n;

        if let Some(v) = global.get(&vec![PSBT_GLOBAL_VERSION]) {
            if v.len() != 4 || LittleEndian::read_u32(v) != 2 {
                return Err(invalid("unsupported PSBT version"));
            }
        }

        let input_count = read_count(&global, PSBT_GLOBAL_INPUT_COUNT)?;
        let output_count = read_count(&global, PSBT_GLOBAL_OUTPUT_COUNT)?;

        debug!("PSBT with {input_count} inputs, {output_count} outputs");

        // Every map holds at least its terminator
        let remaining = buff.len() - index;
        if input_count > remaining || output_count > remaining - input_count {
            return Err(invalid("map count exceeds PSBT length"));
        }

        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            let (m, n) = read_map(&buff[index..])?;
            inputs.push(m);
            index += n;
        }

        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            let (m, n) = read_map(&buff[index..])?;
            outputs.push(m);
            index += n;
        }

        if index != buff.len() {
            return Err(invalid("trailing data"));
        }

        Ok(Self {
            global,
            inputs,
            outputs,
        })
    }

    /// Parse a base64 encoded PSBT
    pub fn from_base64(s: &str) -> Result<Self, Error> {
        let b = BASE64_STANDARD
            .decode(s.trim())
            .map_err(|e| invalid(e.to_string()))?;
        Self::from_bytes(&b)
    }

    /// Serialize back to PSBT bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut b = PSBT_MAGIC.to_vec();

        for m in std::iter::once(&self.global)
            .chain(self.inputs.iter())
            .chain(self.outputs.iter())
        {
            for (k, v) in m {
                b.extend_from_slice(&varint::VarInt::from(k.len()).to_vec());
                b.extend_from_slice(k);
                b.extend_from_slice(&varint::VarInt::from(v.len()).to_vec());
                b.extend_from_slice(v);
            }
            b.push(0x00);
        }

        b
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// Build a v2 PSBT with the provided number of inputs and outputs
    pub fn build_psbt(inputs: usize, outputs: usize) -> Psbt {
        let mut global = PsbtMap::new();
        global.insert(vec![PSBT_GLOBAL_VERSION], 2u32.to_le_bytes().to_vec());
        global.insert(vec![0x02], 2u32.to_le_bytes().to_vec());
        global.insert(vec![PSBT_GLOBAL_INPUT_COUNT], vec![inputs as u8]);
        global.insert(vec![PSBT_GLOBAL_OUTPUT_COUNT], vec![outputs as u8]);

        let inputs = (0..inputs)
            .map(|i| {
                let mut m = PsbtMap::new();
                m.insert(vec![0x0e], [i as u8; 32].to_vec());
                m.insert(vec![0x0f], (i as u32).to_le_bytes().to_vec());
                m
            })
            .collect();

        let outputs = (0..outputs)
            .map(|i| {
                let mut m = PsbtMap::new();
                m.insert(vec![0x03], (1000 * (i as u64 + 1)).to_le_bytes().to_vec());
                m.insert(vec![0x04], vec![0x00, 0x14, i as u8]);
                m
            })
            .collect();

        Psbt {
            global,
            inputs,
            outputs,
        }
    }

    #[test]
    fn parse_serialized() {
        let p = build_psbt(2, 1);
        let b = p.to_bytes();

        assert_eq!(&b[..5], b"psbt\xff");
        assert_eq!(Psbt::from_bytes(&b).unwrap(), p);

        let s = BASE64_STANDARD.encode(&b);
        assert_eq!(Psbt::from_base64(&s).unwrap(), p);
    }

    #[test]
    fn reject_malformed() {
        let p = build_psbt(1, 1);
        let b = p.to_bytes();

        // Bad magic
        let mut c = b.clone();
        c[0] = b'x';
        assert!(matches!(Psbt::from_bytes(&c), Err(Error::InvalidPsbt(_))));

        // Truncated
        assert!(matches!(
            Psbt::from_bytes(&b[..b.len() - 1]),
            Err(Error::InvalidPsbt(_))
        ));

        // Trailing data
        let mut c = b.clone();
        c.push(0x00);
        assert!(matches!(Psbt::from_bytes(&c), Err(Error::InvalidPsbt(_))));

        // Missing v2 counts
        let mut q = p;
        q.global.remove(&vec![PSBT_GLOBAL_INPUT_COUNT]);
        assert!(matches!(
            Psbt::from_bytes(&q.to_bytes()),
            Err(Error::InvalidPsbt(_))
        ));
    }

    #[test]
    fn reject_oversized_lengths() {
        // Key length close to u64::MAX
        let mut b = PSBT_MAGIC.to_vec();
        b.push(0xff);
        b.extend_from_slice(&[0xff; 8]);
        b.push(0x04);
        assert!(matches!(Psbt::from_bytes(&b), Err(Error::InvalidPsbt(_))));

        // Value length close to u64::MAX
        let mut b = PSBT_MAGIC.to_vec();
        b.extend_from_slice(&[0x01, 0x04, 0xff]);
        b.extend_from_slice(&[0xff; 8]);
        assert!(matches!(Psbt::from_bytes(&b), Err(Error::InvalidPsbt(_))));
    }

    #[test]
    fn reject_oversized_counts() {
        let mut b = PSBT_MAGIC.to_vec();
        b.extend_from_slice(&[0x01, PSBT_GLOBAL_INPUT_COUNT, 0x09, 0xff]);
        b.extend_from_slice(&[0xff; 8]);
        b.extend_from_slice(&[0x01, PSBT_GLOBAL_OUTPUT_COUNT, 0x01, 0x01]);
        b.push(0x00);
        b.push(0x00);

        assert!(matches!(Psbt::from_bytes(&b), Err(Error::InvalidPsbt(_))));
    }

    #[test]
    fn reject_duplicate_keys() {
        let mut b = PSBT_MAGIC.to_vec();
        b.extend_from_slice(&[0x01, 0x04, 0x01, 0x00]);
        b.extend_from_slice(&[0x01, 0x04, 0x01, 0x00]);
        b.push(0x00);

        assert!(matches!(Psbt::from_bytes(&b), Err(Error::InvalidPsbt(_))));
    }
}
