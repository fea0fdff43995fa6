/// This script deploys `FekiraUniverse` to the network named by
/// `FEKIRA_NETWORK`. The deployment is recorded under
/// `FEKIRA_DEPLOYMENTS_DIR/<network>/` unless the network is the in-process
/// `hardhat` network, whose deployments are never written to disk.
use dotenvy::dotenv;
use eyre::Result;
use fekira_deploy::{
    artifacts::ArtifactStore,
    chain::Chain,
    config::EnvConfig,
    constants::DEFAULT_NETWORK,
    deploy::deploy_fekira_universe,
    registry::{FileRegistry, MemoryRegistry, Registry},
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load the environment variables.
    dotenv().ok();
    tracing_subscriber::fmt::init();
    let config = EnvConfig::from_env()?;

    // Fail before connecting if the network has no deploy parameters.
    let configs = config.deploy_configs()?;
    configs.deploy_config_for(&config.network)?;

    let artifacts = ArtifactStore::load(&config.artifacts_dir)?;
    let chain = Chain::connect(
        config.ethereum_url.clone(),
        &config.network,
        config.accounts()?,
    )
    .await?;

    let registry: Box<dyn Registry> = if config.network == DEFAULT_NETWORK {
        Box::new(MemoryRegistry::new())
    } else {
        Box::new(FileRegistry::new(&config.deployments_dir, &config.network))
    };

    let result = deploy_fekira_universe(&chain, registry.as_ref(), &artifacts, &configs).await?;
    info!(address = ?result.address, newly_deployed = result.newly_deployed, "done");

    Ok(())
}
