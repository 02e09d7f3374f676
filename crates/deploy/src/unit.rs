//! Contract unit description.

use serde::{Deserialize, Serialize};

/// A named, precompiled deployable contract.
///
/// Units are assembled before a run starts (init code resolved from the
/// artifact store, constructor words taken from the manifest) and are
/// immutable for the duration of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractUnit {
    /// Unit name, unique within a deployment run.
    pub name: String,
    /// 0x-prefixed hex of the contract init code.
    pub init_code: String,
    /// Pre-ABI-encoded constructor words (0x-prefixed hex), appended to the
    /// init code in order. Empty for argument-less constructors.
    pub constructor_args: Vec<String>,
}

impl ContractUnit {
    /// Create a unit with no constructor arguments.
    pub fn new(name: impl Into<String>, init_code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            init_code: init_code.into(),
            constructor_args: Vec::new(),
        }
    }

    /// Attach pre-encoded constructor words to this unit.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.constructor_args = args;
        self
    }

    /// The full deployment calldata: init code followed by the encoded
    /// constructor words, as a single 0x-prefixed hex string.
    pub fn deploy_data(&self) -> String {
        let mut data = String::from("0x");
        data.push_str(strip_hex_prefix(&self.init_code));
        for arg in &self.constructor_args {
            data.push_str(strip_hex_prefix(arg));
        }
        data
    }
}

/// Strip an optional `0x`/`0X` prefix from a hex string.
pub(crate) fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}
