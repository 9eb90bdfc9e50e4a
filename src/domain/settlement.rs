//! Settlement actions and the batched calls sent to the remote ledger.

use super::{Amount, Ledger};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Batched action applied to a set of selected locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettlementAction {
    /// Release matured fungible locks of token groups.
    Unlock,
    /// Pay matured native locks out to the wallet.
    WithdrawToWallet,
    /// Move matured native locks into the vault deposit balance.
    WithdrawToContract,
    /// Lock the selected amount again for a new duration.
    Reinvest,
    /// Drain the fungible pending-withdrawal queue.
    ProcessPendingQueue,
}

impl SettlementAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementAction::Unlock => "unlock",
            SettlementAction::WithdrawToWallet => "withdrawToWallet",
            SettlementAction::WithdrawToContract => "withdrawToContract",
            SettlementAction::Reinvest => "reinvest",
            SettlementAction::ProcessPendingQueue => "processPendingQueue",
        }
    }
}

impl fmt::Display for SettlementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettlementAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unlock" => Ok(SettlementAction::Unlock),
            "withdrawToWallet" => Ok(SettlementAction::WithdrawToWallet),
            "withdrawToContract" => Ok(SettlementAction::WithdrawToContract),
            "reinvest" => Ok(SettlementAction::Reinvest),
            "processPendingQueue" => Ok(SettlementAction::ProcessPendingQueue),
            other => Err(format!("unknown settlement action: {}", other)),
        }
    }
}

/// The single external call dispatched for one settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementBatch {
    pub ledger: Ledger,
    pub action: SettlementAction,
    /// External sequence indices, ascending. The ledger treats a batch as a set of
    /// positions; order is not significant.
    pub indices: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

/// A new native-asset lock against a token group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentOrder {
    pub token_id: u64,
    /// Seconds.
    pub duration: u64,
    /// Amount sent from the wallet, after any vault deposit was applied.
    pub amount: Amount,
    pub use_deposit: bool,
}

/// Acknowledgement returned by the remote ledger for a dispatched call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReceipt {
    pub tx_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_match_wire_format() {
        for action in [
            SettlementAction::Unlock,
            SettlementAction::WithdrawToWallet,
            SettlementAction::WithdrawToContract,
            SettlementAction::Reinvest,
            SettlementAction::ProcessPendingQueue,
        ] {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
            assert_eq!(action.as_str().parse::<SettlementAction>(), Ok(action));
        }
    }

    #[test]
    fn test_batch_omits_missing_duration() {
        let batch = SettlementBatch {
            ledger: Ledger::Native,
            action: SettlementAction::WithdrawToWallet,
            indices: vec![0, 2],
            duration: None,
        };
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["ledger"], "native");
        assert_eq!(json["action"], "withdrawToWallet");
        assert!(json.get("duration").is_none());
    }
}
