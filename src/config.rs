//! Client configuration: cluster endpoint, program ids, supported assets and
//! the risk parameters new reserves are created with.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, native_token::LAMPORTS_PER_SOL, pubkey::Pubkey};
use std::path::Path;

use crate::protocol::{
    ReserveConfig, FLASH_LOAN_RECEIVER_PROGRAM_ID, LENDING_PROGRAM_ID, ORACLE_PROGRAM_ID,
};

/// One asset the client can open a reserve for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSpec {
    /// Symbol used to address the asset, e.g. "ETH"
    pub symbol: String,
    /// Price product account handed to InitReserve
    #[serde(with = "serde_pubkey")]
    pub price_product: Pubkey,
    /// Price account read by RefreshReserve
    #[serde(with = "serde_pubkey")]
    pub price: Pubkey,
    /// Decimals of the liquidity mint created for the asset
    #[serde(default)]
    pub decimals: u8,
}

impl AssetSpec {
    pub fn new(symbol: &str, price_product: Pubkey, price: Pubkey) -> Self {
        Self {
            symbol: symbol.to_string(),
            price_product,
            price,
            decimals: 0,
        }
    }

    /// ETH/USD feed on devnet
    pub fn eth_devnet() -> Self {
        Self::new(
            "ETH",
            solana_sdk::pubkey!("2ciUuGZiee5macAMeQ7bHGTJtwcYTgnt6jdmQnnKZrfu"),
            solana_sdk::pubkey!("EdVCmQ9FSPcVe5YySXDPCRmc8aDQLKJ9xvYBMZPie1Vw"),
        )
    }

    /// BTC/USD feed on devnet
    pub fn btc_devnet() -> Self {
        Self::new(
            "BTC",
            solana_sdk::pubkey!("3m1y5h2uv7EQL3KaJZehvAJa4yDNvgc5yAdL9KPMKwvk"),
            solana_sdk::pubkey!("HovQMDrbAgAYPCmHVSrezcSmkMtXSSUsLDFANExrZh2J"),
        )
    }
}

/// Configuration for a [`crate::LendingClient`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Commitment level: processed, confirmed or finalized
    pub commitment: String,
    #[serde(with = "serde_pubkey")]
    pub lending_program_id: Pubkey,
    #[serde(with = "serde_pubkey")]
    pub oracle_program_id: Pubkey,
    #[serde(with = "serde_pubkey")]
    pub flash_loan_receiver_program_id: Pubkey,
    /// Quote currency label written into the market
    pub quote_currency: String,
    /// Assets reserves can be opened for
    pub assets: Vec<AssetSpec>,
    /// Risk parameters for every reserve this client initializes
    pub reserve_config: ReserveConfig,
    /// Submit reserve account creation and InitReserve as a single transaction.
    ///
    /// Off by default: seven signatures and seventeen InitReserve accounts do
    /// not fit a 1232-byte packet, so the account-creation prefix goes first.
    pub single_bundle_reserve_setup: bool,
    /// Lamports requested for the market owner on startup
    pub payer_airdrop_lamports: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.devnet.solana.com".to_string(),
            commitment: "confirmed".to_string(),
            lending_program_id: LENDING_PROGRAM_ID,
            oracle_program_id: ORACLE_PROGRAM_ID,
            flash_loan_receiver_program_id: FLASH_LOAN_RECEIVER_PROGRAM_ID,
            quote_currency: "USD".to_string(),
            assets: vec![AssetSpec::eth_devnet(), AssetSpec::btc_devnet()],
            reserve_config: ReserveConfig::standard(),
            single_bundle_reserve_setup: false,
            payer_airdrop_lamports: LAMPORTS_PER_SOL * 10,
        }
    }
}

impl ClientConfig {
    /// Loads a JSON config; missing fields fall back to the defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn asset(&self, symbol: &str) -> Option<&AssetSpec> {
        self.assets.iter().find(|a| a.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn commitment_config(&self) -> CommitmentConfig {
        match self.commitment.to_lowercase().as_str() {
            "finalized" => CommitmentConfig::finalized(),
            "processed" => CommitmentConfig::processed(),
            _ => CommitmentConfig::confirmed(),
        }
    }
}

/// Serializes pubkeys as base58 strings instead of byte arrays
mod serde_pubkey {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(pubkey: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&pubkey.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Pubkey::from_str(&raw).map_err(|e| D::Error::custom(format!("invalid pubkey '{}': {}", raw, e)))
    }
}
