use async_trait::async_trait;
use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    nonblocking::rpc_client::RpcClient,
    rpc_request::RpcError,
};
use solana_program::program_pack::Pack;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::Transaction,
};
use spl_token::state::Account as TokenAccount;

use super::ledger::{LedgerClient, SimulationOutcome};
use crate::error::LedgerError;

/// [`LedgerClient`] backed by a JSON-RPC node
pub struct RpcLedger {
    client: RpcClient,
}

impl RpcLedger {
    pub fn new(rpc_url: String, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_commitment(rpc_url, commitment),
        }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }

    /// Version string reported by the cluster, used to confirm connectivity
    pub async fn cluster_version(&self) -> Result<String, LedgerError> {
        let version = self.client.get_version().await?;
        Ok(version.solana_core)
    }

    async fn signed_transaction(
        &self,
        instructions: &[Instruction],
        payer: &Pubkey,
        signers: &[&Keypair],
    ) -> Result<Transaction, LedgerError> {
        let recent_blockhash = self.client.get_latest_blockhash().await?;

        let mut tx = Transaction::new_with_payer(instructions, Some(payer));
        tx.try_sign(signers, recent_blockhash)
            .map_err(|e| LedgerError::Rejected(format!("signing failed: {}", e)))?;
        Ok(tx)
    }
}

#[async_trait]
impl LedgerClient for RpcLedger {
    async fn send_bundle(
        &self,
        instructions: &[Instruction],
        payer: &Pubkey,
        signers: &[&Keypair],
    ) -> Result<Signature, LedgerError> {
        let tx = self.signed_transaction(instructions, payer, signers).await?;
        let signature = self.client.send_and_confirm_transaction(&tx).await?;
        log::debug!("Confirmed {} ({} instructions)", signature, instructions.len());
        Ok(signature)
    }

    async fn simulate_bundle(
        &self,
        instructions: &[Instruction],
        payer: &Pubkey,
        signers: &[&Keypair],
    ) -> Result<SimulationOutcome, LedgerError> {
        let tx = self.signed_transaction(instructions, payer, signers).await?;
        let result = self.client.simulate_transaction(&tx).await?.value;

        Ok(SimulationOutcome {
            err: result.err.map(|e| e.to_string()),
            logs: result.logs.unwrap_or_default(),
            units_consumed: result.units_consumed,
        })
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Vec<u8>, LedgerError> {
        self.client
            .get_account_data(address)
            .await
            .map_err(|e| not_found_or(e, address))
    }

    async fn token_balance(&self, token_account: &Pubkey) -> Result<u64, LedgerError> {
        let data = self.account_data(token_account).await?;
        let account = TokenAccount::unpack(&data)
            .map_err(|_| LedgerError::InvalidTokenAccount(*token_account))?;
        Ok(account.amount)
    }

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, LedgerError> {
        Ok(self
            .client
            .get_minimum_balance_for_rent_exemption(data_len)
            .await?)
    }

    async fn balance(&self, address: &Pubkey) -> Result<u64, LedgerError> {
        Ok(self.client.get_balance(address).await?)
    }

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<Signature, LedgerError> {
        Ok(self.client.request_airdrop(address, lamports).await?)
    }
}

/// The RPC node reports a missing account as a generic "AccountNotFound" error
fn not_found_or(err: ClientError, address: &Pubkey) -> LedgerError {
    match err.kind() {
        ClientErrorKind::RpcError(RpcError::ForUser(msg)) if msg.starts_with("AccountNotFound") => {
            LedgerError::AccountNotFound(*address)
        }
        _ => err.into(),
    }
}
