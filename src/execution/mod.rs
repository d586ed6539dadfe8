pub mod ledger;
pub mod rpc_ledger;

pub use ledger::{LedgerClient, SimulationOutcome};
pub use rpc_ledger::RpcLedger;
