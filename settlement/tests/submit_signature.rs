mod helpers;

use k256::ecdsa::{signature::hazmat::PrehashSigner, Signature};
use relay_bridge_core::LockEvent;
use relay_bridge_settlement::{BridgeError, ErrorKind, Missing, SubmitOutcome, TransferStatus};

use helpers::*;

fn pending(signatures: usize, threshold: usize) -> SubmitOutcome {
    SubmitOutcome::Pending {
        signatures,
        threshold,
    }
}

/// A deployment with one lock of `amount` waiting to be relayed.
fn locked(relayer_count: u8, amount: u64) -> (Deployment, LockEvent) {
    let d = proper_instantiate(relayer_count);
    d.fund_user(USER, amount);
    d.fund_target_vault(amount);
    let event = d.lock(amount);
    (d, event)
}

fn submit(d: &Deployment, index: usize, event: &LockEvent) -> Result<SubmitOutcome, BridgeError> {
    let r = &d.relayers[index];
    d.target.submit_signature(&r.address, event, &r.sign(event))
}

#[test]
fn not_whitelisted() {
    let (d, event) = locked(3, 100);
    let outsider = Relayer::new(50);

    let err = d
        .target
        .submit_signature(&outsider.address, &event, &outsider.sign(&event))
        .unwrap_err();
    assert_eq!(BridgeError::NotWhitelisted(outsider.address.clone()), err);
    assert_eq!(ErrorKind::Authorization, err.kind());
    assert_eq!(None, d.target.transfer_status(event.nonce));
}

#[test]
fn wrong_source_contract() {
    let (d, mut event) = locked(3, 100);
    event.source_contract = addr("0xa513E6E4b8f2a923D98304ec87F64353C4D5C853");

    // The signature itself is valid for the forged event.
    let err = submit(&d, 0, &event).unwrap_err();
    assert_eq!(BridgeError::InvalidSourceContract(event.source_contract.clone()), err);
    assert_eq!(ErrorKind::ProtocolIntegrity, err.kind());
}

#[test]
fn wrong_target_contract() {
    let (d, mut event) = locked(3, 100);
    event.target_contract = addr("0xCf7Ed3AccA5a467e9e704C703E8D87F634fB0Fc9");

    let err = submit(&d, 0, &event).unwrap_err();
    assert_eq!(BridgeError::InvalidTargetContract(event.target_contract.clone()), err);
    assert_eq!(ErrorKind::ProtocolIntegrity, err.kind());
    assert!(d.target.pending_unlocks().is_empty());
}

#[test]
fn wrong_chain_id() {
    let (d, mut event) = locked(3, 100);
    event.chain_id = TARGET_CHAIN;

    let err = submit(&d, 0, &event).unwrap_err();
    assert_eq!(
        BridgeError::InvalidChainId {
            expected: SOURCE_CHAIN,
            actual: TARGET_CHAIN
        },
        err
    );
    assert!(d.target.pending_unlocks().is_empty());
}

#[test]
fn invalid_signature() {
    let (d, event) = locked(3, 100);
    let r0 = &d.relayers[0];
    let r1 = &d.relayers[1];

    // Signed by a different whitelisted relayer.
    let err = d
        .target
        .submit_signature(&r0.address, &event, &r1.sign(&event))
        .unwrap_err();
    assert_eq!(BridgeError::InvalidSignature, err);

    // Signed over different event data.
    let mut other = event.clone();
    other.amount += 1;
    let err = d
        .target
        .submit_signature(&r0.address, &event, &r0.sign(&other))
        .unwrap_err();
    assert_eq!(BridgeError::InvalidSignature, err);

    // Garbage.
    let err = d
        .target
        .submit_signature(&r0.address, &event, &[0u8; 12])
        .unwrap_err();
    assert_eq!(BridgeError::InvalidSignature, err);

    assert!(d.target.pending_unlocks().is_empty());
}

#[test]
fn der_signature() {
    let (d, event) = locked(3, 100);
    let r = &d.relayers[0];
    let digest = event.digest().unwrap();
    let sig: Signature = r.key.sign_prehash(&digest.secp256k_hash).unwrap();

    let outcome = d
        .target
        .submit_signature(&r.address, &event, sig.to_der().as_bytes())
        .unwrap();
    assert_eq!(pending(1, 2), outcome);
}

#[test]
fn stock_relayer_signatures_settle() {
    let (d, event) = locked(3, 100);

    for (i, r) in d.relayers[..2].iter().enumerate() {
        let sig = r.sign_json_der(&event);
        let outcome = d.target.submit_signature(&r.address, &event, &sig).unwrap();
        if i == 0 {
            assert_eq!(pending(1, 2), outcome);
        } else {
            assert!(matches!(outcome, SubmitOutcome::Settled(_)));
        }
    }
    assert_eq!(100, d.target_balance(RECIPIENT));
}

#[test]
fn payload_mismatch() {
    let (d, event) = locked(4, 100);
    assert_eq!(pending(1, 3), submit(&d, 0, &event).unwrap());

    let mut forged = event.clone();
    forged.receiver_address = addr("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");
    let err = submit(&d, 1, &forged).unwrap_err();
    assert_eq!(BridgeError::PayloadMismatch(event.nonce), err);

    // The pending record still describes the original event.
    let p = d.target.pending_unlocks();
    assert_eq!(1, p.len());
    assert_eq!(&event, p[0].event());
    assert_eq!(1, p[0].num_signatures());
}

#[test]
fn duplicate_submission_counts_once() {
    let (d, event) = locked(4, 100);

    for _ in 0..5 {
        assert_eq!(pending(1, 3), submit(&d, 0, &event).unwrap());
    }
    assert_eq!(pending(2, 3), submit(&d, 1, &event).unwrap());
    assert_eq!(pending(2, 3), submit(&d, 0, &event).unwrap());
    assert_eq!(0, d.target_balance(RECIPIENT));

    assert!(matches!(submit(&d, 2, &event).unwrap(), SubmitOutcome::Settled(_)));
    assert_eq!(100, d.target_balance(RECIPIENT));
}

#[test]
fn out_of_order_nonces() {
    let d = proper_instantiate(3);
    d.fund_user(USER, 30);
    d.fund_target_vault(30);
    let events: Vec<_> = (0..3).map(|_| d.lock(10)).collect();

    for event in events.iter().rev() {
        submit(&d, 0, event).unwrap();
        submit(&d, 1, event).unwrap();
    }

    let state = d.target.receiver_state();
    assert_eq!(3, state.last_nonce);
    assert_eq!(vec![1, 2, 3], state.used_nonces.keys().copied().collect::<Vec<_>>());
    assert_eq!(30, d.target_balance(RECIPIENT));
}

#[test]
fn nonces_do_not_interfere() {
    let d = proper_instantiate(4);
    d.fund_user(USER, 30);
    d.fund_target_vault(30);
    let e1 = d.lock(10);
    let e2 = d.lock(20);

    assert_eq!(pending(1, 3), submit(&d, 0, &e1).unwrap());
    assert_eq!(pending(1, 3), submit(&d, 1, &e2).unwrap());
    assert_eq!(pending(2, 3), submit(&d, 1, &e1).unwrap());
    assert_eq!(pending(2, 3), submit(&d, 2, &e2).unwrap());

    assert_eq!(vec![2], d.target.missing_signatures(&d.relayers[0].address).nonces);
    assert_eq!(Vec::<u64>::new(), d.target.missing_signatures(&d.relayers[1].address).nonces);
    assert_eq!(vec![1, 2], d.target.missing_signatures(&d.relayers[3].address).nonces);

    assert!(matches!(submit(&d, 3, &e2).unwrap(), SubmitOutcome::Settled(r) if r.amount == 20));
    assert_eq!(20, d.target_balance(RECIPIENT));
    assert!(matches!(
        d.target.transfer_status(1),
        Some(TransferStatus::Pending { threshold: 3, .. })
    ));
    assert!(matches!(
        d.target.transfer_status(2),
        Some(TransferStatus::Settled(s)) if s.amount == 20
    ));
}

#[test]
fn insufficient_vault_balance() {
    let d = proper_instantiate(3);
    d.fund_user(USER, 100);
    d.fund_target_vault(60);
    let event = d.lock(100);

    submit(&d, 0, &event).unwrap();
    let err = submit(&d, 1, &event).unwrap_err();
    assert_eq!(
        BridgeError::InsufficientBalance {
            needed: 100,
            available: 60
        },
        err
    );
    assert_eq!(60, d.target.vault_balance().unwrap());
    assert!(matches!(
        d.target.transfer_status(1),
        Some(TransferStatus::Pending { signers, .. }) if signers.len() == 1
    ));

    // Topping up the vault lets the next signature settle.
    d.fund_target_vault(40);
    assert!(matches!(submit(&d, 1, &event).unwrap(), SubmitOutcome::Settled(_)));
    assert_eq!(100, d.target_balance(RECIPIENT));
    assert_eq!(0, d.target.vault_balance().unwrap());
}

#[test]
fn removed_relayer() {
    let (d, event) = locked(4, 100);
    submit(&d, 0, &event).unwrap();
    submit(&d, 1, &event).unwrap();

    d.target
        .remove_relayer(&addr(ADMIN), &d.relayers[0].address)
        .unwrap();

    // No new signatures from the removed relayer.
    let err = submit(&d, 0, &event).unwrap_err();
    assert_eq!(BridgeError::NotWhitelisted(d.relayers[0].address.clone()), err);

    // Its earlier signature still counts: 3 relayers left, threshold 2, already 2 signers.
    assert!(matches!(submit(&d, 2, &event).unwrap(), SubmitOutcome::Settled(_)));
}

#[test]
fn not_configured() {
    let (bridge, _ledger) = bare_bridge();
    let r = Relayer::new(0);
    bridge
        .add_relayer(&addr(ADMIN), r.address.clone(), r.verifying_key())
        .unwrap();

    let event = LockEvent {
        source_contract: addr(TARGET_BRIDGE),
        target_contract: addr(SOURCE_BRIDGE),
        chain_id: TARGET_CHAIN,
        block_height: 1,
        amount: 1,
        receiver_address: addr(RECIPIENT),
        nonce: 1,
    };
    let err = bridge
        .submit_signature(&r.address, &event, &r.sign(&event))
        .unwrap_err();
    assert_eq!(BridgeError::NotConfigured(Missing::Asset), err);
}

#[test]
fn replay_after_settlement() {
    let (d, event) = locked(3, 100);
    submit(&d, 0, &event).unwrap();
    submit(&d, 1, &event).unwrap();

    let err = submit(&d, 2, &event).unwrap_err();
    assert_eq!(BridgeError::NonceAlreadyUsed(1), err);
    assert_eq!(ErrorKind::Replay, err.kind());

    // A different payload for the settled nonce is rejected the same way.
    let mut other = event.clone();
    other.amount = 1;
    assert_eq!(
        BridgeError::NonceAlreadyUsed(1),
        submit(&d, 2, &other).unwrap_err()
    );
    assert_eq!(100, d.target_balance(RECIPIENT));
}
