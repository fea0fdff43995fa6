use std::{collections::BTreeMap, sync::Arc};

use ethers::{
    signers::Signer,
    types::{Address, U256},
};
use eyre::{eyre, Result};
use tracing::debug;

use super::{derive_accounts, Chain};
use crate::{
    artifacts::ArtifactStore,
    config::DeployConfigs,
    constants::{ARTIFACTS_DIR, DEFAULT_NETWORK, MAYBE_ETHEREUM_URL, MNEMONIC},
    deploy::{deploy_fekira_universe, DeployResult},
    fixtures::{setup_users, setup_users_with_names, User},
    handle::ContractHandle,
    registry::MemoryRegistry,
    resolver::{ContractDefinitions, ContractResolver, ContractSlug},
};

/// A local anvil chain with a fresh `FekiraUniverse` deployment. The
/// deployment lives in an in-memory registry, the way it does on the hardhat
/// network.
pub struct TestChain {
    chain: Chain,
    registry: Arc<MemoryRegistry>,
    artifacts: ArtifactStore,
    configs: DeployConfigs,
    deployment: DeployResult,
}

impl TestChain {
    /// Connects to `FEKIRA_ETHEREUM_URL` (or spawns anvil), funds
    /// `num_accounts` mnemonic accounts and deploys from `FEKIRA_ARTIFACTS_DIR`.
    pub async fn fixture(num_accounts: usize) -> Result<Self> {
        if num_accounts == 0 {
            return Err(eyre!("cannot create a test chain with zero accounts"));
        }

        // Connect to the anvil node.
        let accounts = derive_accounts(MNEMONIC, num_accounts)?;
        let chain = Chain::connect(MAYBE_ETHEREUM_URL.clone(), DEFAULT_NETWORK, accounts).await?;

        Self::fund_accounts(&chain).await?;

        // Deploy the contracts.
        let registry = Arc::new(MemoryRegistry::new());
        let artifacts = ArtifactStore::load(ARTIFACTS_DIR.as_str())?;
        let configs = DeployConfigs::builtin();
        let deployment =
            deploy_fekira_universe(&chain, registry.as_ref(), &artifacts, &configs).await?;
        debug!(address = ?deployment.address, "test chain ready");

        Ok(Self {
            chain,
            registry,
            artifacts,
            configs,
            deployment,
        })
    }

    /// Funds every account on anvil. Other development nodes, like a hardhat
    /// node, already fund the mnemonic accounts and are left alone.
    async fn fund_accounts(chain: &Chain) -> Result<()> {
        if !chain.is_anvil() {
            debug!(network = chain.network(), "not an anvil chain; skipping funding");
            return Ok(());
        }
        for account in chain.accounts() {
            chain.deal(account.address(), U256::exp10(22)).await?;
        }
        Ok(())
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn registry(&self) -> Arc<MemoryRegistry> {
        self.registry.clone()
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn configs(&self) -> &DeployConfigs {
        &self.configs
    }

    pub fn deployment(&self) -> &DeployResult {
        &self.deployment
    }

    pub fn resolver(&self) -> ContractResolver<'_, MemoryRegistry> {
        ContractResolver::new(&self.chain, self.registry.as_ref(), &self.artifacts)
    }

    /// Read-only handles to every deployed contract, keyed by slug.
    pub async fn contracts(&self) -> Result<BTreeMap<String, ContractHandle>> {
        let definitions = ContractDefinitions::default();
        let resolver = self.resolver();
        let mut contracts = BTreeMap::new();
        let slug = ContractSlug::FekiraUniverse;
        contracts.insert(
            slug.to_string(),
            resolver
                .contract_for_environment(&definitions, slug, None)
                .await?,
        );
        Ok(contracts)
    }

    /// The accounts that aren't named accounts.
    pub fn unnamed_addresses(&self) -> Result<Vec<Address>> {
        let named = self.chain.named_addresses()?;
        Ok(self
            .chain
            .accounts()
            .iter()
            .map(|account| account.address())
            .filter(|address| !named.values().any(|named| named == address))
            .collect())
    }

    pub async fn named_users(&self) -> Result<BTreeMap<String, User>> {
        let contracts = self.contracts().await?;
        setup_users_with_names(&self.chain, &self.chain.named_addresses()?, &contracts)
    }

    pub async fn unnamed_users(&self) -> Result<Vec<User>> {
        let contracts = self.contracts().await?;
        setup_users(&self.chain, &self.unnamed_addresses()?, &contracts)
    }
}
