//! Per-network contract overrides.
//!
//! A contract definition maps each network name to at most one override. The
//! override is either a literal on-chain address or the name of another entry
//! in the deployment registry. Raw strings are classified exactly once, when
//! the map is built, so nothing downstream has to look at string prefixes.

use std::{collections::BTreeMap, fmt, str::FromStr};

use ethers::types::Address;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Raw overrides starting with this prefix are parsed as addresses.
pub const ADDRESS_PREFIX: &str = "0x";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid address override \"{value}\": {reason}")]
pub struct InvalidOverride {
    pub value: String,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractOverride {
    /// A deployed contract at a fixed address.
    Address(Address),
    /// The name of a deployment registry entry.
    RegistryName(String),
}

impl ContractOverride {
    /// Classifies a raw override. Empty strings mean "no override". Only a
    /// string that starts with `0x` is an address; the raw value is never
    /// trimmed.
    pub fn parse(raw: &str) -> Result<Option<Self>, InvalidOverride> {
        if raw.is_empty() {
            return Ok(None);
        }
        if raw.starts_with(ADDRESS_PREFIX) {
            let address = raw.parse::<Address>().map_err(|e| InvalidOverride {
                value: raw.to_string(),
                reason: e.to_string(),
            })?;
            return Ok(Some(Self::Address(address)));
        }
        Ok(Some(Self::RegistryName(raw.to_string())))
    }

    pub fn address(&self) -> Option<Address> {
        match self {
            Self::Address(address) => Some(*address),
            Self::RegistryName(_) => None,
        }
    }

    pub fn registry_name(&self) -> Option<&str> {
        match self {
            Self::Address(_) => None,
            Self::RegistryName(name) => Some(name),
        }
    }
}

impl fmt::Display for ContractOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // `Address`'s `Display` abbreviates, so the full form comes from `Debug`.
            Self::Address(address) => write!(f, "{:?}", address),
            Self::RegistryName(name) => write!(f, "{}", name),
        }
    }
}

impl FromStr for ContractOverride {
    type Err = InvalidOverride;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)?.ok_or_else(|| InvalidOverride {
            value: s.to_string(),
            reason: "empty override".to_string(),
        })
    }
}

impl Serialize for ContractOverride {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ContractOverride {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Maps network names to contract overrides. Networks without an entry (or
/// whose raw entry was empty) resolve through the deployment registry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NetworkContractMap(BTreeMap<String, ContractOverride>);

impl NetworkContractMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from raw `(network, value)` pairs, dropping empty values.
    pub fn parse<I, K, V>(entries: I) -> Result<Self, InvalidOverride>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut map = BTreeMap::new();
        for (network, raw) in entries {
            if let Some(value) = ContractOverride::parse(raw.as_ref())? {
                map.insert(network.into(), value);
            }
        }
        Ok(Self(map))
    }

    pub fn with(mut self, network: impl Into<String>, value: ContractOverride) -> Self {
        self.0.insert(network.into(), value);
        self
    }

    pub fn get(&self, network: &str) -> Option<&ContractOverride> {
        self.0.get(network)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContractOverride)> {
        self.0.iter().map(|(network, value)| (network.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for NetworkContractMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        Self::parse(raw).map_err(de::Error::custom)
    }
}
