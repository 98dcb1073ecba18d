//! Fork schedule configuration.

use serde::{Deserialize, Serialize};

/// Block numbers at which consensus upgrades activate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkConfig {
    /// First block number at which headers carry a finality vote and the
    /// finality engine starts tracking rounds.
    pub finality: u32,
}

impl ForkConfig {
    /// Schedule with every upgrade active from genesis.
    pub fn all_active() -> Self {
        Self { finality: 0 }
    }
}
