#![allow(dead_code)]

use k256::ecdsa::{signature::Signer, Signature, SigningKey};
use relay_bridge_core::{
    sign_event, Address, AssetId, ChainId, EncodingVersion, LockEvent, RelayerKey,
};
use sha2::{Digest, Sha256};
use relay_bridge_settlement::{
    AssetLedger, BlockInfo, Bridge, InstantiateMsg, MemoryLedger, PeerBinding, RelayerInfo,
    SharedLedger,
};

pub const SOURCE_CHAIN: ChainId = ChainId(91024);
pub const TARGET_CHAIN: ChainId = ChainId(1);

pub const SOURCE_BRIDGE: &str = "GnCSS2aPuvn6zjuZxaGocQpaEAofpqBCFFExMqaBxQDz";
pub const TARGET_BRIDGE: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
pub const SOURCE_VAULT: &str = "8sRJ2Tjm1QMeRR8iPCsYeRzyoAj7ebgzcgqRiuNgkcVv";
pub const TARGET_VAULT: &str = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512";

pub const ADMIN: &str = "admin";
pub const USER: &str = "user";
pub const RECIPIENT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

pub fn usdc() -> AssetId {
    AssetId::from("usdc")
}

pub fn addr(s: &str) -> Address {
    Address::from(s)
}

/// A relayer with a deterministic signing key.
pub struct Relayer {
    pub address: Address,
    pub key: SigningKey,
}

impl Relayer {
    pub fn new(index: u8) -> Self {
        Self {
            address: Address::from(format!("relayer-{index}")),
            key: SigningKey::from_slice(&[index.wrapping_add(1); 32]).unwrap(),
        }
    }

    pub fn verifying_key(&self) -> RelayerKey {
        RelayerKey::from(&self.key)
    }

    pub fn info(&self) -> RelayerInfo {
        RelayerInfo {
            address: self.address.clone(),
            key: self.verifying_key(),
        }
    }

    pub fn sign(&self, event: &LockEvent) -> Vec<u8> {
        sign_event(&self.key, event).unwrap()
    }

    /// DER signature from a stock SHA-256 ECDSA signer fed `sha256(json)`.
    pub fn sign_json_der(&self, event: &LockEvent) -> Vec<u8> {
        let body = event.encode(EncodingVersion::V1).unwrap();
        let sig: Signature = self.key.sign(&Sha256::digest(body));
        sig.to_der().as_bytes().to_vec()
    }
}

pub fn relayers(count: u8) -> Vec<Relayer> {
    (0..count).map(Relayer::new).collect()
}

/// Two bridge instances wired to each other, each on its own chain's ledger.
pub struct Deployment {
    pub source: Bridge<SharedLedger>,
    pub target: Bridge<SharedLedger>,
    pub source_ledger: SharedLedger,
    pub target_ledger: SharedLedger,
    pub relayers: Vec<Relayer>,
}

impl Deployment {
    /// Mints `amount` to `owner` on the source chain and approves the source vault for it.
    pub fn fund_user(&self, owner: &str, amount: u64) {
        let mut ledger = self.source_ledger.lock();
        ledger.mint(&usdc(), &addr(owner), amount).unwrap();
        let approved = ledger.allowance(&usdc(), &addr(owner), &addr(SOURCE_VAULT));
        ledger.approve(
            &usdc(),
            &addr(owner),
            &addr(SOURCE_VAULT),
            approved + amount,
        );
    }

    /// Pre-funds the target vault through the admin.
    pub fn fund_target_vault(&self, amount: u64) {
        {
            let mut ledger = self.target_ledger.lock();
            ledger.mint(&usdc(), &addr(ADMIN), amount).unwrap();
            ledger.approve(&usdc(), &addr(ADMIN), &addr(TARGET_VAULT), amount);
        }
        self.target.add_liquidity(&addr(ADMIN), amount).unwrap();
    }

    pub fn lock(&self, amount: u64) -> LockEvent {
        self.source
            .lock(BlockInfo { height: 1000 }, &addr(USER), amount, addr(RECIPIENT))
            .unwrap()
    }

    pub fn source_balance(&self, owner: &str) -> u64 {
        self.source_ledger.balance_of(&usdc(), &addr(owner))
    }

    pub fn target_balance(&self, owner: &str) -> u64 {
        self.target_ledger.balance_of(&usdc(), &addr(owner))
    }
}

pub fn instantiate_msg(
    contract: &str,
    vault: &str,
    peer: &str,
    local_chain: ChainId,
    peer_chain: ChainId,
    relayers: &[Relayer],
) -> InstantiateMsg {
    InstantiateMsg {
        contract: addr(contract),
        admin: addr(ADMIN),
        vault: addr(vault),
        asset: Some(usdc()),
        peer: Some(PeerBinding {
            contract: addr(peer),
            source_chain_id: local_chain,
            target_chain_id: peer_chain,
        }),
        relayers: relayers.iter().map(Relayer::info).collect(),
        encoding: EncodingVersion::V1,
    }
}

pub fn proper_instantiate(relayer_count: u8) -> Deployment {
    let relayers = relayers(relayer_count);
    let source_ledger = SharedLedger::new(MemoryLedger::new());
    let target_ledger = SharedLedger::new(MemoryLedger::new());

    let source = Bridge::instantiate(
        instantiate_msg(
            SOURCE_BRIDGE,
            SOURCE_VAULT,
            TARGET_BRIDGE,
            SOURCE_CHAIN,
            TARGET_CHAIN,
            &relayers,
        ),
        source_ledger.clone(),
    )
    .unwrap();
    let target = Bridge::instantiate(
        instantiate_msg(
            TARGET_BRIDGE,
            TARGET_VAULT,
            SOURCE_BRIDGE,
            TARGET_CHAIN,
            SOURCE_CHAIN,
            &relayers,
        ),
        target_ledger.clone(),
    )
    .unwrap();

    Deployment {
        source,
        target,
        source_ledger,
        target_ledger,
        relayers,
    }
}

/// A bridge with identities only: no asset, peer or relayers.
pub fn bare_bridge() -> (Bridge<SharedLedger>, SharedLedger) {
    let ledger = SharedLedger::new(MemoryLedger::new());
    let msg = InstantiateMsg {
        contract: addr(SOURCE_BRIDGE),
        admin: addr(ADMIN),
        vault: addr(SOURCE_VAULT),
        asset: None,
        peer: None,
        relayers: Vec::new(),
        encoding: EncodingVersion::V1,
    };
    (Bridge::instantiate(msg, ledger.clone()).unwrap(), ledger)
}
