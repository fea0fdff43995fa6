/// This module contains the deployment registry: the store that maps a
/// deployed contract's name to its address and ABI on the current network.
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use ethers::{
    abi::{Abi, Token},
    types::{Address, H256, U256},
    utils::hex,
};
use eyre::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

/// A registry record. The field names follow the hardhat-deploy JSON layout
/// so existing `deployments/` directories can be read directly.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", from = "RawDeployment")]
pub struct Deployment {
    pub address: Address,
    pub abi: Abi,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<H256>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<U256>,
}

impl Deployment {
    pub fn new(address: Address, abi: Abi) -> Self {
        Self {
            address,
            abi,
            transaction_hash: None,
            args: Vec::new(),
            gas_used: None,
        }
    }
}

/// A registry file as written by us or by hardhat-deploy. hardhat-deploy
/// keeps the gas used inside the `receipt` object.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDeployment {
    address: Address,
    abi: Abi,
    #[serde(default)]
    transaction_hash: Option<H256>,
    #[serde(default)]
    args: Vec<Value>,
    #[serde(default)]
    gas_used: Option<U256>,
    #[serde(default)]
    receipt: Option<Value>,
}

impl From<RawDeployment> for Deployment {
    fn from(raw: RawDeployment) -> Self {
        let gas_used = raw.gas_used.or_else(|| {
            raw.receipt
                .as_ref()
                .and_then(|receipt| receipt.get("gasUsed"))
                .and_then(parse_quantity)
        });
        Self {
            address: raw.address,
            abi: raw.abi,
            transaction_hash: raw.transaction_hash,
            args: raw.args,
            gas_used,
        }
    }
}

/// Reads a quantity in any of the forms hardhat-deploy has written over
/// time: a JSON number, a decimal or hex string, or an ethers v5
/// `{ "type": "BigNumber", "hex": .. }` object.
fn parse_quantity(value: &Value) -> Option<U256> {
    match value {
        Value::Number(number) => number.as_u64().map(U256::from),
        Value::String(string) => match string.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16).ok(),
            None => U256::from_dec_str(string).ok(),
        },
        Value::Object(object) => object.get("hex").and_then(parse_quantity),
        _ => None,
    }
}

/// Renders a constructor argument the way hardhat-deploy records it.
pub fn render_arg(token: &Token) -> Value {
    match token {
        Token::Address(address) => Value::String(format!("{:?}", address)),
        Token::FixedBytes(bytes) | Token::Bytes(bytes) => {
            Value::String(format!("0x{}", hex::encode(bytes)))
        }
        Token::Uint(value) | Token::Int(value) => Value::String(value.to_string()),
        Token::Bool(value) => Value::Bool(*value),
        Token::String(value) => Value::String(value.clone()),
        Token::Array(tokens) | Token::FixedArray(tokens) | Token::Tuple(tokens) => {
            Value::Array(tokens.iter().map(render_arg).collect())
        }
    }
}

#[async_trait]
pub trait Registry: Send + Sync {
    /// Gets the deployment saved under `name`, if there is one.
    async fn get(&self, name: &str) -> Result<Option<Deployment>>;

    /// Saves `deployment` under `name`, replacing any previous entry.
    async fn save(&self, name: &str, deployment: Deployment) -> Result<()>;
}

/// A registry that lives as long as the process. This is what the in-process
/// hardhat network and throwaway anvil chains use.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    deployments: RwLock<HashMap<String, Deployment>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn get(&self, name: &str) -> Result<Option<Deployment>> {
        Ok(self.deployments.read().await.get(name).cloned())
    }

    async fn save(&self, name: &str, deployment: Deployment) -> Result<()> {
        self.deployments
            .write()
            .await
            .insert(name.to_string(), deployment);
        Ok(())
    }
}

/// A registry backed by `<root>/<network>/<name>.json` files.
#[derive(Clone, Debug)]
pub struct FileRegistry {
    dir: PathBuf,
}

impl FileRegistry {
    pub fn new(root: impl AsRef<Path>, network: &str) -> Self {
        Self {
            dir: root.as_ref().join(network),
        }
    }

    /// The directory this network's deployments are stored in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

#[async_trait]
impl Registry for FileRegistry {
    async fn get(&self, name: &str) -> Result<Option<Deployment>> {
        let path = self.path(name);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let bytes = tokio::fs::read(&path).await?;
        let deployment = serde_json::from_slice::<Deployment>(&bytes)
            .map_err(|e| eyre::eyre!("invalid deployment file {}: {}", path.display(), e))?;
        Ok(Some(deployment))
    }

    async fn save(&self, name: &str, deployment: Deployment) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(&deployment)?;
        tokio::fs::write(self.path(name), json).await?;
        Ok(())
    }
}
