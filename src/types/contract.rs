use serde::{Deserialize, Serialize};

use crate::common::{AztecAddress, EthAddress};

/// A deployed contract and its L1 portal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractData {
    pub contract_address: AztecAddress,
    /// The L1 contract paired with this L2 contract for cross-chain messaging
    pub portal_address: EthAddress,
    /// Selectors of the contract's public functions
    pub function_selectors: Vec<[u8; 4]>,
}

impl ContractData {
    pub fn has_function(&self, selector: [u8; 4]) -> bool {
        self.function_selectors.contains(&selector)
    }
}
