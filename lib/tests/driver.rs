//! Interrupted execution against scripted device responses

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use encdec::Encode;

use ledger_acre::{
    apdu::{
        client_command::ClientCommand,
        merkle::{hash_leaf, Hash},
        path::HARDENED,
    },
    interpreter::ProgressCallback,
    DeviceHandle, Error, InterpreterError, MerkleMap, MerkleizedPsbt, WalletPolicy,
    WithdrawalData, WithdrawalRequest,
};

mod helpers;
use helpers::{continuation_payload, setup_logging, ScriptedTransport};

const KEY: &str = "[f5acc2fd/84'/1'/0']tpubDCtKfsNyRhULjZ9XMS4VKKtVcPdVDi8MKUbcSD9MJDyjRu1A2ND5MiipozyyspBT9bg8upEp7a8EAgFxNxXn1d7QkdbL52Ty5jiSLcxPt1P/**";

const PATH: [u32; 5] = [84 | HARDENED, 1 | HARDENED, HARDENED, 0, 0];
const LONG_PATH: [u32; 7] = [HARDENED; 7];

fn policy() -> WalletPolicy {
    WalletPolicy::new("", "wpkh(@0)", vec![KEY.to_string()])
}

fn command(c: &ClientCommand) -> Vec<u8> {
    let mut b = vec![0u8; c.encode_len().unwrap()];
    c.encode(&mut b).unwrap();
    b
}

fn setup() -> (ScriptedTransport, DeviceHandle<ScriptedTransport>) {
    setup_logging();

    let t = ScriptedTransport::new();
    let h = DeviceHandle::from(t.clone());
    (t, h)
}

#[tokio::test]
async fn suspensions_then_success() -> anyhow::Result<()> {
    let (t, h) = setup();

    for i in 0..3u8 {
        t.interrupt(&command(&ClientCommand::Yield(&[i])));
    }
    t.complete(b"testaddress");

    let address = h.get_wallet_address(&policy(), None, 0, 7, false).await?;
    assert_eq!(address, "testaddress");

    // Initial request plus one empty continuation per suspension
    let sent = t.sent();
    assert_eq!(sent.len(), 4);
    assert_eq!(&sent[0][..2], &[0xe1, 0x03]);
    for f in &sent[1..] {
        assert_eq!(f, &[0xf8, 0x01, 0x00, 0x00, 0x00]);
    }

    Ok(())
}

#[tokio::test]
async fn address_answers_policy_preimage() -> anyhow::Result<()> {
    let (t, h) = setup();

    let p = policy();
    let id = p.id()?;
    let serialized = p.serialize()?;

    t.interrupt(&command(&ClientCommand::GetPreimage { hash: id }));
    t.complete(b"testaddress");

    let address = h.get_wallet_address(&p, None, 0, 0, false).await?;
    assert_eq!(address, "testaddress");

    let sent = t.sent();
    assert_eq!(sent.len(), 2);

    let payload = continuation_payload(&sent[1]);
    assert_eq!(payload[0] as usize, serialized.len());
    assert_eq!(payload[1] as usize, serialized.len());
    assert_eq!(&payload[2..], &serialized[..]);

    Ok(())
}

#[tokio::test]
async fn unknown_preimage_aborts() -> anyhow::Result<()> {
    let (t, h) = setup();

    t.interrupt(&command(&ClientCommand::GetPreimage { hash: [0xaa; 32] }));
    t.complete(b"unreachable");

    let r = h.get_wallet_address(&policy(), None, 0, 0, false).await;
    assert!(
        matches!(
            r,
            Err(Error::Interpreter(InterpreterError::UnknownPreimage(hash))) if hash == [0xaa; 32]
        ),
        "unexpected result: {r:?}"
    );

    // Nothing is sent after the failing command
    assert_eq!(t.sent().len(), 1);
    assert_eq!(t.remaining(), 1);

    Ok(())
}

#[tokio::test]
async fn long_paths_rejected_before_sending() -> anyhow::Result<()> {
    let (t, h) = setup();

    let w = WithdrawalData::try_from(&withdrawal_request())?;

    assert!(matches!(
        h.get_extended_pubkey(&LONG_PATH, false).await,
        Err(Error::PathTooLong(7))
    ));
    assert!(matches!(
        h.sign_message(b"test", &LONG_PATH).await,
        Err(Error::PathTooLong(7))
    ));
    assert!(matches!(
        h.sign_erc4361_message(b"test", &LONG_PATH).await,
        Err(Error::PathTooLong(7))
    ));
    assert!(matches!(
        h.sign_withdrawal(&LONG_PATH, &w).await,
        Err(Error::PathTooLong(7))
    ));

    assert!(t.sent().is_empty());

    Ok(())
}

#[tokio::test]
async fn invalid_address_arguments() -> anyhow::Result<()> {
    let (t, h) = setup();

    assert!(matches!(
        h.get_wallet_address(&policy(), None, 2, 0, false).await,
        Err(Error::InvalidChange(2))
    ));
    assert!(matches!(
        h.get_wallet_address(&policy(), Some(&[0u8; 31]), 0, 0, false)
            .await,
        Err(Error::InvalidHmacLength(31))
    ));

    assert!(t.sent().is_empty());

    Ok(())
}

#[tokio::test]
async fn unexpected_interrupt() -> anyhow::Result<()> {
    let (t, h) = setup();

    t.interrupt(&command(&ClientCommand::Yield(&[0x01])));

    assert!(matches!(
        h.get_master_fingerprint().await,
        Err(Error::UnexpectedInterrupt)
    ));
    assert_eq!(t.sent(), vec![hex::decode("e105000000")?]);

    Ok(())
}

#[tokio::test]
async fn device_status_error() -> anyhow::Result<()> {
    let (t, h) = setup();

    t.respond(&[], 0x6985);

    let r = h.get_extended_pubkey(&PATH, true).await;
    assert!(matches!(r, Err(Error::Status(0x6985))), "{r:?}");

    Ok(())
}

#[tokio::test]
async fn register_wallet() -> anyhow::Result<()> {
    let (t, h) = setup();

    let p = policy();

    // Device fetches the first key through the keys tree
    t.interrupt(&command(&ClientCommand::GetMerkleLeafProof {
        root: p.keys_root(),
        tree_size: 1,
        leaf_index: 0,
    }));

    let mut resp = p.id()?.to_vec();
    resp.extend_from_slice(&[0x5a; 32]);
    t.complete(&resp);

    let r = h.register_wallet(&p).await?;
    assert_eq!(r.wallet_id, p.id()?);
    assert_eq!(r.hmac, [0x5a; 32]);

    // Leaf for the single key, with an empty proof
    let sent = t.sent();
    let payload = continuation_payload(&sent[1]);
    assert_eq!(&payload[..32], &hash_leaf(KEY.as_bytes()));
    assert_eq!(&payload[32..], &[0u8, 0]);

    Ok(())
}

fn psbt() -> MerkleizedPsbt {
    let mut global = MerkleMap::new();
    global.insert(vec![0xfb], 2u32.to_le_bytes().to_vec()).unwrap();

    let inputs = (0..2u8)
        .map(|i| {
            let mut m = MerkleMap::new();
            m.insert(vec![0x0e], vec![i; 32]).unwrap();
            m.insert(vec![0x0f], (i as u32).to_le_bytes().to_vec())
                .unwrap();
            m
        })
        .collect();

    let mut output = MerkleMap::new();
    output.insert(vec![0x03], 1000u64.to_le_bytes().to_vec()).unwrap();

    MerkleizedPsbt::new(global, inputs, vec![output])
}

#[tokio::test]
async fn sign_psbt_multiple_inputs() -> anyhow::Result<()> {
    let (t, h) = setup();

    let p = psbt();
    let root: Hash = p.inputs_root();

    let leaves: Vec<Hash> = p
        .input_commitments()
        .iter()
        .map(|c| hash_leaf(c))
        .collect();

    // Inputs are visited out of order, each followed by its signature
    for i in [1u8, 0] {
        t.interrupt(&command(&ClientCommand::GetMerkleLeafProof {
            root,
            tree_size: 2,
            leaf_index: i as u64,
        }));

        let mut y = vec![i];
        y.extend_from_slice(&[0x30 + i; 8]);
        t.interrupt(&command(&ClientCommand::Yield(&y)));
    }
    t.interrupt(&command(&ClientCommand::Yield(&[])));
    t.complete(&[]);

    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let progress: ProgressCallback = Box::new(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });

    let sigs = h.sign_psbt(&p, &policy(), None, Some(progress)).await?;

    assert_eq!(sigs.len(), 2);
    assert_eq!(sigs[&0], vec![0x30u8; 8]);
    assert_eq!(sigs[&1], vec![0x31u8; 8]);

    // One callback per client command
    assert_eq!(count.load(Ordering::SeqCst), 5);

    // Proof answers carry the sibling leaf
    let sent = t.sent();
    assert_eq!(sent.len(), 6);
    assert_eq!(&sent[0][..2], &[0xe1, 0x04]);

    let first = continuation_payload(&sent[1]);
    assert_eq!(&first[..32], &leaves[1]);
    assert_eq!(&first[32..34], &[1u8, 1]);
    assert_eq!(&first[34..], &leaves[0]);

    let second = continuation_payload(&sent[3]);
    assert_eq!(&second[..32], &leaves[0]);
    assert_eq!(&second[34..], &leaves[1]);

    Ok(())
}

fn withdrawal_request() -> WithdrawalRequest {
    serde_json::from_str(include_str!("data/withdrawal.json")).unwrap()
}

#[tokio::test]
async fn sign_withdrawal_chunk_count() -> anyhow::Result<()> {
    let (t, h) = setup();

    let w = WithdrawalData::try_from(&withdrawal_request())?;
    assert_eq!(w.chunk_count(), 11);

    let sig = hex::decode("1f32af834dbf7e64f730a1fb76d1970cb66517222bfb017f46a75f91cc1fa216b76fd35df48d28b9c2c4b994e7799608cc1353ae810d1049a8ab8af047e16a1a99")?;
    t.complete(&sig);

    let r = h.sign_withdrawal(&PATH, &w).await?;
    assert_eq!(r, "HzKvg02/fmT3MKH7dtGXDLZlFyIr+wF/Rqdfkcwfoha3b9Nd9I0oucLEuZTneZYIzBNTroENEEmoq4rwR+FqGpk=");

    // Header, path, then the chunk count as a varint
    let sent = t.sent();
    assert_eq!(&sent[0][..2], &[0xe1, 0x11]);
    let body = &sent[0][5..];
    assert_eq!(body[0], 5);
    assert_eq!(body[1 + 5 * 4], 11);

    Ok(())
}
