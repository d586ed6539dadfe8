use solana_sdk::{
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
};
use std::collections::HashMap;

use crate::error::{LendingClientError, Result};

/// Keypairs the client generated and must sign with later
#[derive(Default)]
pub struct Keyring {
    keys: HashMap<Pubkey, Keypair>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, keypair: Keypair) -> Pubkey {
        let pubkey = keypair.pubkey();
        self.keys.insert(pubkey, keypair);
        pubkey
    }

    /// Generates a fresh keypair, keeps it and returns its address
    pub fn generate(&mut self) -> Pubkey {
        self.insert(Keypair::new())
    }

    pub fn get(&self, pubkey: &Pubkey) -> Option<&Keypair> {
        self.keys.get(pubkey)
    }

    pub fn contains(&self, pubkey: &Pubkey) -> bool {
        self.keys.contains_key(pubkey)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Looks up every signer in order, failing on the first one not held
    pub fn resolve(&self, signers: &[Pubkey]) -> Result<Vec<&Keypair>> {
        signers
            .iter()
            .map(|pubkey| {
                self.keys
                    .get(pubkey)
                    .ok_or(LendingClientError::MissingSigner(*pubkey))
            })
            .collect()
    }
}
