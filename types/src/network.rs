//! Network identifier.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Identifies which network a node is connected to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// The production network.
    Main,
    /// The public test network.
    Test,
    /// Local regression-test network.
    Regtest,
}

impl NetworkId {
    /// Default port for this network.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Main => 28878,
            Self::Test => 8878,
            Self::Regtest => 18444,
        }
    }

    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Test => "test",
            Self::Regtest => "regtest",
        }
    }

    /// Port policy for masternode service addresses: mainnet nodes must use
    /// the mainnet port and no other network may use it.
    pub fn is_valid_service_port(&self, port: u16) -> bool {
        let main_port = Self::Main.default_port();
        match self {
            Self::Main => port == main_port,
            _ => port != main_port,
        }
    }
}

impl FromStr for NetworkId {
    type Err = crate::LmnodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" | "mainnet" => Ok(Self::Main),
            "test" | "testnet" => Ok(Self::Test),
            "regtest" => Ok(Self::Regtest),
            other => Err(crate::LmnodeError::Other(format!("unknown network: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_policy() {
        assert!(NetworkId::Main.is_valid_service_port(28878));
        assert!(!NetworkId::Main.is_valid_service_port(8878));
        assert!(NetworkId::Test.is_valid_service_port(8878));
        assert!(!NetworkId::Test.is_valid_service_port(28878));
        assert!(!NetworkId::Regtest.is_valid_service_port(28878));
    }

    #[test]
    fn parses_aliases() {
        assert_eq!("mainnet".parse::<NetworkId>().unwrap(), NetworkId::Main);
        assert_eq!("regtest".parse::<NetworkId>().unwrap(), NetworkId::Regtest);
        assert!("bogus".parse::<NetworkId>().is_err());
    }
}
