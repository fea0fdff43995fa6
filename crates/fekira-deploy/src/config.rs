/// This module holds everything that is decided before a deployment starts:
/// the constructor parameters for each network, the named accounts and the
/// environment the binaries are run with.
use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use ethers::{
    abi::Token,
    signers::LocalWallet,
    types::{Address, H256},
};
use eyre::Result;
use serde::{Deserialize, Serialize};

use crate::{
    chain::derive_accounts,
    constants::{DEFAULT_NETWORK, DEPLOYER, MNEMONIC},
    Error,
};

const BASE_URI: &str = "https://p4010183-u833-067a4df9.app.run.fish/api/v1/unpack/";
const RANDOMNESS_REVEALER: &str = "0x86DB88892459F98e3D4337B75aABd7E3D2734328";
const HASH_OF_LAUNCH_METADATA_LIST: &str =
    "0x03ac674216f3e15c761ee1a5e255f067953623c8b388b4459e13f978d7c846f4";

/// The `FekiraUniverse` constructor parameters for one network.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    pub name: String,
    pub symbol: String,
    #[serde(default, rename = "baseURI", skip_serializing_if = "Option::is_none")]
    pub base_uri: Option<String>,
    pub randomness_revealer: Address,
    pub hash_of_launch_metadata_list: H256,
}

impl DeployConfig {
    /// The constructor arguments in declaration order. A missing base URI is
    /// passed as the empty string.
    pub fn constructor_args(&self) -> Vec<Token> {
        vec![
            Token::String(self.name.clone()),
            Token::String(self.symbol.clone()),
            Token::String(self.base_uri.clone().unwrap_or_default()),
            Token::Address(self.randomness_revealer),
            Token::FixedBytes(self.hash_of_launch_metadata_list.as_bytes().to_vec()),
        ]
    }

    fn launch(name: &str) -> Self {
        Self {
            name: name.to_string(),
            symbol: "FU".to_string(),
            base_uri: Some(BASE_URI.to_string()),
            // These are compile-time literals.
            randomness_revealer: RANDOMNESS_REVEALER.parse().unwrap(),
            hash_of_launch_metadata_list: HASH_OF_LAUNCH_METADATA_LIST.parse().unwrap(),
        }
    }
}

/// The per-network deployment table. It is built once at startup and handed
/// to whoever needs it; lookups never touch the underlying source again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployConfigs {
    networks: HashMap<String, DeployConfig>,
}

impl DeployConfigs {
    /// The table shipped with the toolkit.
    pub fn builtin() -> Self {
        let networks = [
            ("hardhat", DeployConfig::launch("FekiraUniverse")),
            ("kovan", DeployConfig::launch("FekiraUniverse-Test")),
            ("mainnet", DeployConfig::launch("FekiraUniverse")),
            ("rinkeby", DeployConfig::launch("FekiraUniverse-Test")),
        ]
        .into_iter()
        .map(|(network, config)| (network.to_string(), config))
        .collect();
        Self { networks }
    }

    /// Reads a table of the form `{ "<network>": { "name": .., .. } }`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let networks = serde_json::from_reader::<_, HashMap<String, DeployConfig>>(file)?;
        Ok(Self { networks })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self {
            networks: serde_json::from_str(json)?,
        })
    }

    /// Gets the parameters for `network`. Unknown networks are fatal for a
    /// deployment, so they surface as `Error::UnconfiguredNetwork`.
    pub fn deploy_config_for(&self, network: &str) -> Result<&DeployConfig> {
        Ok(self
            .networks
            .get(network)
            .ok_or_else(|| Error::UnconfiguredNetwork(network.to_string()))?)
    }

    pub fn networks(&self) -> impl Iterator<Item = &str> {
        self.networks.keys().map(String::as_str)
    }
}

/// Account aliases, resolved to indices into the chain's account list.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct NamedAccounts(BTreeMap<String, usize>);

impl Default for NamedAccounts {
    fn default() -> Self {
        Self(BTreeMap::from([(DEPLOYER.to_string(), 0)]))
    }
}

impl NamedAccounts {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, name: impl Into<String>, index: usize) -> Self {
        self.0.insert(name.into(), index);
        self
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(name, index)| (name.as_str(), *index))
    }
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_string()
}

fn default_mnemonic() -> String {
    MNEMONIC.to_string()
}

fn default_num_accounts() -> usize {
    10
}

fn default_deployments_dir() -> PathBuf {
    PathBuf::from("deployments")
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

/// The environment the binaries run with. Every field is read from a
/// `FEKIRA_`-prefixed variable, e.g. `FEKIRA_ETHEREUM_URL`.
#[derive(Clone, Debug, Deserialize)]
pub struct EnvConfig {
    /// If unset, an anvil node is spawned.
    pub ethereum_url: Option<String>,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default = "default_mnemonic")]
    pub mnemonic: String,
    /// Takes precedence over the mnemonic when set.
    pub private_key: Option<String>,
    #[serde(default = "default_num_accounts")]
    pub num_accounts: usize,
    #[serde(default = "default_deployments_dir")]
    pub deployments_dir: PathBuf,
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    pub deploy_config: Option<PathBuf>,
}

impl EnvConfig {
    const PREFIX: &'static str = "FEKIRA_";

    pub fn from_env() -> Result<Self> {
        Ok(envy::prefixed(Self::PREFIX).from_env::<Self>()?)
    }

    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::prefixed(Self::PREFIX).from_iter::<_, Self>(vars)?)
    }

    /// The deploy table: the override file if one is configured, otherwise
    /// the builtin table.
    pub fn deploy_configs(&self) -> Result<DeployConfigs> {
        match &self.deploy_config {
            Some(path) => DeployConfigs::from_path(path),
            None => Ok(DeployConfigs::builtin()),
        }
    }

    /// The signing accounts: the private key alone when one is provided,
    /// otherwise the first `num_accounts` accounts of the mnemonic.
    pub fn accounts(&self) -> Result<Vec<LocalWallet>> {
        match &self.private_key {
            Some(key) => Ok(vec![key.parse::<LocalWallet>()?]),
            None => derive_accounts(&self.mnemonic, self.num_accounts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_builtin_table() -> Result<()> {
        let configs = DeployConfigs::builtin();
        let mut networks = configs.networks().collect::<Vec<_>>();
        networks.sort();
        assert_eq!(networks, vec!["hardhat", "kovan", "mainnet", "rinkeby"]);

        let kovan = configs.deploy_config_for("kovan")?;
        assert_eq!(kovan.name, "FekiraUniverse-Test");
        assert_eq!(kovan.symbol, "FU");
        assert_eq!(kovan.randomness_revealer, RANDOMNESS_REVEALER.parse()?);
        assert_eq!(
            kovan.hash_of_launch_metadata_list,
            HASH_OF_LAUNCH_METADATA_LIST.parse()?
        );
        Ok(())
    }

    #[test]
    fn test_lookup_is_reference_stable() -> Result<()> {
        let configs = DeployConfigs::builtin();
        let first = configs.deploy_config_for("hardhat")?;
        let second = configs.deploy_config_for("hardhat")?;
        assert!(std::ptr::eq(first, second));
        Ok(())
    }

    #[test]
    fn test_unknown_network() {
        let err = DeployConfigs::builtin()
            .deploy_config_for("unknown-network")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UnconfiguredNetwork(network)) if network == "unknown-network"
        ));
        assert_eq!(err.to_string(), "Unconfigured network: \"unknown-network\"");
    }

    #[test]
    fn test_from_json() -> Result<()> {
        let configs = DeployConfigs::from_json(
            r#"{
                "sepolia": {
                    "name": "FekiraUniverse-Test",
                    "symbol": "FU",
                    "randomnessRevealer": "0x86DB88892459F98e3D4337B75aABd7E3D2734328",
                    "hashOfLaunchMetadataList": "0x03ac674216f3e15c761ee1a5e255f067953623c8b388b4459e13f978d7c846f4"
                }
            }"#,
        )?;
        let sepolia = configs.deploy_config_for("sepolia")?;
        assert_eq!(sepolia.base_uri, None);
        assert!(configs.deploy_config_for("hardhat").is_err());
        Ok(())
    }

    #[test]
    fn test_from_path_reads_file_once() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("fekira-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("deploy.config.json");
        let builtin = DeployConfigs::builtin();
        let table = builtin
            .networks()
            .map(|network| Ok((network, builtin.deploy_config_for(network)?)))
            .collect::<Result<HashMap<_, _>>>()?;
        std::fs::write(&path, serde_json::to_string(&table)?)?;

        let configs = DeployConfigs::from_path(&path)?;
        // The table is fully materialized, so the file can go away.
        std::fs::remove_dir_all(&dir)?;
        assert_eq!(configs, builtin);
        assert_eq!(configs.deploy_config_for("mainnet")?.name, "FekiraUniverse");
        Ok(())
    }

    #[test]
    fn test_constructor_args() -> Result<()> {
        let config = DeployConfigs::builtin().deploy_config_for("rinkeby")?.clone();
        let args = config.constructor_args();
        assert_eq!(args.len(), 5);
        assert_eq!(args[0], Token::String("FekiraUniverse-Test".into()));
        assert_eq!(args[2], Token::String(BASE_URI.into()));
        assert_eq!(args[3], Token::Address(RANDOMNESS_REVEALER.parse()?));
        assert_eq!(
            args[4],
            Token::FixedBytes(
                HASH_OF_LAUNCH_METADATA_LIST
                    .parse::<H256>()?
                    .as_bytes()
                    .to_vec()
            )
        );

        let without_uri = DeployConfig {
            base_uri: None,
            ..config
        };
        assert_eq!(without_uri.constructor_args()[2], Token::String(String::new()));
        Ok(())
    }

    #[test]
    fn test_named_accounts() {
        let named = NamedAccounts::default();
        assert_eq!(named.get(DEPLOYER), Some(0));
        assert_eq!(named.get("treasury"), None);
        let named = named.with("treasury", 3);
        assert_eq!(named.iter().collect::<Vec<_>>(), vec![("deployer", 0), ("treasury", 3)]);
    }

    #[test]
    fn test_env_config_defaults() -> Result<()> {
        let config = EnvConfig::from_vars(vars(&[]))?;
        assert_eq!(config.ethereum_url, None);
        assert_eq!(config.network, DEFAULT_NETWORK);
        assert_eq!(config.num_accounts, 10);
        assert_eq!(config.deployments_dir, PathBuf::from("deployments"));
        assert_eq!(config.artifacts_dir, PathBuf::from("artifacts"));
        assert_eq!(config.deploy_configs()?, DeployConfigs::builtin());
        Ok(())
    }

    #[test]
    fn test_env_config_overrides() -> Result<()> {
        let config = EnvConfig::from_vars(vars(&[
            ("FEKIRA_ETHEREUM_URL", "http://localhost:8545"),
            ("FEKIRA_NETWORK", "rinkeby"),
            ("FEKIRA_NUM_ACCOUNTS", "2"),
            ("UNRELATED", "ignored"),
        ]))?;
        assert_eq!(config.ethereum_url.as_deref(), Some("http://localhost:8545"));
        assert_eq!(config.network, "rinkeby");
        assert_eq!(config.accounts()?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_private_key_takes_precedence() -> Result<()> {
        // The first hardhat development key.
        let config = EnvConfig::from_vars(vars(&[(
            "FEKIRA_PRIVATE_KEY",
            "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )]))?;
        let accounts = config.accounts()?;
        assert_eq!(accounts.len(), 1);
        assert_eq!(
            ethers::signers::Signer::address(&accounts[0]),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>()?
        );
        Ok(())
    }
}
