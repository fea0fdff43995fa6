/// This module deploys contracts from compiled artifacts and records them in
/// a deployment registry.
use ethers::{
    abi::Token,
    contract::ContractFactory,
    providers::{JsonRpcClient, Middleware, PendingTransaction},
    signers::Signer,
    types::{Address, TransactionReceipt, H256, U256, U64},
    utils::format_ether,
};
use eyre::{eyre, Result};
use tracing::info;

use crate::{
    artifacts::ArtifactStore,
    chain::Chain,
    config::DeployConfigs,
    constants::{DEPLOYER, FEKIRA_UNIVERSE, GAS_LIMIT},
    handle::SignerRef,
    registry::{render_arg, Deployment, Registry},
    Error,
};

#[derive(Clone, Debug)]
pub struct DeployOptions {
    /// The artifact to deploy.
    pub contract: String,
    pub args: Vec<Token>,
    pub from: SignerRef,
    pub gas_limit: u64,
    pub log: bool,
    /// Reuse the registry entry instead of deploying when one exists.
    pub skip_if_already_deployed: bool,
}

impl DeployOptions {
    pub fn new(contract: impl Into<String>, from: SignerRef) -> Self {
        Self {
            contract: contract.into(),
            args: Vec::new(),
            from,
            gas_limit: GAS_LIMIT,
            log: true,
            skip_if_already_deployed: false,
        }
    }

    pub fn args(mut self, args: Vec<Token>) -> Self {
        self.args = args;
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    pub fn skip_if_already_deployed(mut self, skip: bool) -> Self {
        self.skip_if_already_deployed = skip;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployResult {
    pub address: Address,
    pub newly_deployed: bool,
    pub transaction_hash: Option<H256>,
    pub gas_used: Option<U256>,
}

impl DeployResult {
    fn reused(deployment: &Deployment) -> Self {
        Self {
            address: deployment.address,
            newly_deployed: false,
            transaction_hash: deployment.transaction_hash,
            gas_used: deployment.gas_used,
        }
    }
}

pub struct Deployer<'a, R: Registry + ?Sized> {
    chain: &'a Chain,
    registry: &'a R,
    artifacts: &'a ArtifactStore,
}

impl<'a, R: Registry + ?Sized> Deployer<'a, R> {
    pub fn new(chain: &'a Chain, registry: &'a R, artifacts: &'a ArtifactStore) -> Self {
        Self {
            chain,
            registry,
            artifacts,
        }
    }

    pub fn chain(&self) -> &Chain {
        self.chain
    }

    /// Deploys `options.contract` and saves it in the registry as `name`.
    pub async fn deploy(&self, name: &str, options: DeployOptions) -> Result<DeployResult> {
        if options.skip_if_already_deployed {
            if let Some(deployment) = self.registry.get(name).await? {
                let result = DeployResult::reused(&deployment);
                if options.log {
                    info!(
                        "[Reused] {} at {:?} (tx: {:?})",
                        name, result.address, result.transaction_hash
                    );
                }
                return Ok(result);
            }
        }

        let artifact = self
            .artifacts
            .get(&options.contract)
            .ok_or_else(|| Error::UnresolvedContract(options.contract.clone()))?;
        let bytecode = artifact
            .bytecode
            .clone()
            .ok_or_else(|| Error::UnresolvedContract(options.contract.clone()))?;

        let signer = self.chain.signer(&options.from)?;
        let client = self.chain.client(signer).await?;
        let factory = ContractFactory::new(artifact.abi.clone(), bytecode, client.clone());
        let mut deployer = factory.deploy_tokens(options.args.clone())?;
        deployer.tx.set_gas(options.gas_limit);
        let (contract, receipt) = deployer.send_with_receipt().await?;
        if receipt.status != Some(U64::one()) {
            return Err(Error::TransactionFailed(receipt.transaction_hash).into());
        }

        let deployment = Deployment {
            address: contract.address(),
            abi: artifact.abi.clone(),
            transaction_hash: Some(receipt.transaction_hash),
            args: options.args.iter().map(render_arg).collect(),
            gas_used: receipt.gas_used,
        };
        self.registry.save(name, deployment).await?;

        let result = DeployResult {
            address: contract.address(),
            newly_deployed: true,
            transaction_hash: Some(receipt.transaction_hash),
            gas_used: receipt.gas_used,
        };
        if options.log {
            info!(
                "[New] {} at {:?} (tx: {:?}, gas used: {}, deployer: {:?})",
                name,
                result.address,
                receipt.transaction_hash,
                receipt.gas_used.unwrap_or_default(),
                client.address()
            );
        }

        Ok(result)
    }

    /// Deploys the artifact `name` under its own name with default options.
    pub async fn deploy_contract(
        &self,
        name: &str,
        args: Vec<Token>,
        from: SignerRef,
    ) -> Result<DeployResult> {
        self.deploy(name, DeployOptions::new(name, from).args(args))
            .await
    }
}

/// The accounts a deployment runs with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Setup {
    pub accounts: Vec<Address>,
    pub deployer: Address,
}

/// Resolves the deployer and logs where the deployment is going.
pub async fn setup(chain: &Chain) -> Result<Setup> {
    let accounts = chain
        .accounts()
        .iter()
        .map(|account| account.address())
        .collect::<Vec<_>>();
    let deployer = chain.signer(&SignerRef::Named(DEPLOYER.to_string()))?.address();
    let balance = chain.provider().get_balance(deployer, None).await?;

    info!("network: {}", chain.network());
    info!("signer: {:?}", deployer);
    info!("signer balance: {}", format_ether(balance));

    Ok(Setup { accounts, deployer })
}

/// Deploys `FekiraUniverse` with the network's constructor parameters.
pub async fn deploy_contracts<R: Registry + ?Sized>(
    deployer: &Deployer<'_, R>,
    from: Address,
    configs: &DeployConfigs,
) -> Result<DeployResult> {
    let config = configs.deploy_config_for(deployer.chain().network())?;
    deployer
        .deploy_contract(FEKIRA_UNIVERSE, config.constructor_args(), from.into())
        .await
}

pub async fn deploy_fekira_universe<R: Registry + ?Sized>(
    chain: &Chain,
    registry: &R,
    artifacts: &ArtifactStore,
    configs: &DeployConfigs,
) -> Result<DeployResult> {
    let setup = setup(chain).await?;
    let deployer = Deployer::new(chain, registry, artifacts);
    let result = deploy_contracts(&deployer, setup.deployer, configs).await?;
    info!("contracts setup done");
    Ok(result)
}

/// Waits for a contract call to be mined and checks that it succeeded.
pub async fn wait_contract_call<P: JsonRpcClient>(
    pending: PendingTransaction<'_, P>,
) -> Result<TransactionReceipt> {
    let tx_hash = *pending;
    let receipt = pending
        .await?
        .ok_or_else(|| eyre!("transaction {:?} was dropped from the mempool", tx_hash))?;
    info!(
        "tx: {:?}, block: {}, gas used: {}",
        receipt.transaction_hash,
        receipt.block_number.unwrap_or_default(),
        receipt.gas_used.unwrap_or_default()
    );
    if receipt.status != Some(U64::one()) {
        return Err(Error::TransactionFailed(receipt.transaction_hash).into());
    }
    Ok(receipt)
}
