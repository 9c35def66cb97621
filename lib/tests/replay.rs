//! Replay recorded device sessions against [DeviceHandle] operations

use log::info;

use ledger_acre::{apdu::path::HARDENED, DeviceHandle, MessageSignature, WalletPolicy};

mod helpers;
use helpers::{setup_logging, ReplayTransport};

const WALLET_TRACE: &str = include_str!("traces/wallet_address.trace");
const MESSAGE_TRACE: &str = include_str!("traces/sign_message.trace");

const KEY: &str = "[f5acc2fd/84'/1'/0']tpubDCtKfsNyRhULjZ9XMS4VKKtVcPdVDi8MKUbcSD9MJDyjRu1A2ND5MiipozyyspBT9bg8upEp7a8EAgFxNxXn1d7QkdbL52Ty5jiSLcxPt1P/**";

const ACCOUNT_PATH: [u32; 3] = [84 | HARDENED, 1 | HARDENED, HARDENED];
const ADDRESS_PATH: [u32; 5] = [84 | HARDENED, 1 | HARDENED, HARDENED, 0, 0];

#[tokio::test]
async fn replay_wallet_session() -> anyhow::Result<()> {
    setup_logging();

    let h = DeviceHandle::from(ReplayTransport::new(WALLET_TRACE));

    let xpub = h.get_extended_pubkey(&ADDRESS_PATH, false).await?;
    assert_eq!(xpub, "tpubDGB3r44m7fjeL6gjkuEnnZnXfwdnzqRKkq9acev5MFGUe61vay2nn2pBzVeNTma5ctW3AWFRJdLepzsz5P32gjMBbhhx7hKd4fJMXsacZ6L");

    let account = h.get_extended_pubkey(&ACCOUNT_PATH, false).await?;
    assert_eq!(account, "tpubDCtKfsNyRhULjZ9XMS4VKKtVcPdVDi8MKUbcSD9MJDyjRu1A2ND5MiipozyyspBT9bg8upEp7a8EAgFxNxXn1d7QkdbL52Ty5jiSLcxPt1P");

    let fingerprint = h.get_master_fingerprint().await?;
    assert_eq!(fingerprint, [0xf5, 0xac, 0xc2, 0xfd]);

    let policy = WalletPolicy::new("", "wpkh(@0)", vec![KEY.to_string()]);
    let address = h.get_wallet_address(&policy, None, 0, 0, false).await?;
    info!("address: {address}");
    assert_eq!(address, "tb1qzdr7s2sr0dwmkwx033r4nujzk86u0cy6fmzfjk");

    // Repeated requests produce identical results
    let again = h.get_extended_pubkey(&ACCOUNT_PATH, false).await?;
    assert_eq!(again, account);

    assert!(h.transport().lock().await.is_done());

    Ok(())
}

#[tokio::test]
async fn replay_sign_message() -> anyhow::Result<()> {
    setup_logging();

    let h = DeviceHandle::from(ReplayTransport::new(MESSAGE_TRACE));
    let first = h.sign_message(b"test", &ADDRESS_PATH).await?;
    assert!(h.transport().lock().await.is_done());

    // Same session against a fresh device
    let h = DeviceHandle::from(ReplayTransport::new(MESSAGE_TRACE));
    let second = h.sign_message(b"test", &ADDRESS_PATH).await?;

    assert_eq!(first, "HzKvg02/fmT3MKH7dtGXDLZlFyIr+wF/Rqdfkcwfoha3b9Nd9I0oucLEuZTneZYIzBNTroENEEmoq4rwR+FqGpk=");
    assert_eq!(first, second);

    let sig = MessageSignature::from_base64(&first)?;
    assert_eq!(sig.v, 0);
    assert_eq!(
        hex::encode(sig.r),
        "32af834dbf7e64f730a1fb76d1970cb66517222bfb017f46a75f91cc1fa216b7"
    );
    assert_eq!(
        hex::encode(sig.s),
        "6fd35df48d28b9c2c4b994e7799608cc1353ae810d1049a8ab8af047e16a1a99"
    );

    assert!(h.transport().lock().await.is_done());

    Ok(())
}
