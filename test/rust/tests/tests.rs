use std::path::PathBuf;

use ethers::{
    providers::{Http, Provider},
    signers::Signer,
    types::Address,
};
use eyre::Result;
use fekira_addresses::NetworkContractMap;
use fekira_deploy::{
    artifacts::ArtifactStore,
    chain::{Chain, TestChain},
    config::EnvConfig,
    constants::{ALICE, BOB, FEKIRA_UNIVERSE},
    fixtures::setup_user,
    registry::{Deployment, FileRegistry, Registry},
    resolver::{ContractDefinition, ContractDefinitions, ContractResolver, ContractSlug},
    Error,
};

const ABI: &str = r#"[
    {
        "type": "function",
        "name": "name",
        "inputs": [],
        "outputs": [{ "name": "", "type": "string" }],
        "stateMutability": "view"
    }
]"#;

const MAINNET_ADDRESS: &str = "0x1111111111111111111111111111111111111111";
const RINKEBY_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

fn scratch_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("fekira-tests-{}-{}", name, std::process::id()))
}

fn chain(network: &str, chain_id: u64) -> Result<Chain> {
    Ok(Chain::new(
        Provider::<Http>::try_from("http://localhost:8545")?,
        network,
        chain_id,
        vec![ALICE.clone(), BOB.clone()],
    ))
}

/// Networks resolve the same slug differently: rinkeby through the registry
/// files, mainnet through a literal address with the ABI from the artifacts.
#[tokio::test]
async fn test_resolve_across_networks() -> Result<()> {
    let root = scratch_dir("resolve");
    let deployments = root.join("deployments");
    let artifacts_dir = root.join("artifacts");
    std::fs::create_dir_all(artifacts_dir.join("contracts/FekiraUniverse.sol"))?;
    std::fs::write(
        artifacts_dir.join("contracts/FekiraUniverse.sol/FekiraUniverse.json"),
        format!(
            r#"{{ "contractName": "FekiraUniverse", "abi": {}, "bytecode": "0x6080" }}"#,
            ABI
        ),
    )?;
    FileRegistry::new(&deployments, "rinkeby")
        .save(
            FEKIRA_UNIVERSE,
            Deployment::new(RINKEBY_ADDRESS.parse()?, serde_json::from_str(ABI)?),
        )
        .await?;

    let artifacts = ArtifactStore::load(&artifacts_dir)?;
    let definitions = ContractDefinitions::default().with(
        ContractSlug::FekiraUniverse,
        ContractDefinition::new(NetworkContractMap::parse([
            ("mainnet", MAINNET_ADDRESS),
            ("rinkeby", ""),
        ])?),
    );

    let rinkeby = chain("rinkeby", 4)?;
    let registry = FileRegistry::new(&deployments, "rinkeby");
    let handle = ContractResolver::new(&rinkeby, &registry, &artifacts)
        .contract_for_environment(
            &definitions,
            ContractSlug::FekiraUniverse,
            Some(BOB.address().into()),
        )
        .await?;
    assert_eq!(handle.address(), RINKEBY_ADDRESS.parse::<Address>()?);
    assert_eq!(handle.signer_address(), Some(BOB.address()));

    // Nothing was ever deployed to mainnet.
    let mainnet = chain("mainnet", 1)?;
    let registry = FileRegistry::new(&deployments, "mainnet");
    let handle = ContractResolver::new(&mainnet, &registry, &artifacts)
        .contract_for_environment(&definitions, ContractSlug::FekiraUniverse, None)
        .await?;
    assert_eq!(handle.address(), MAINNET_ADDRESS.parse::<Address>()?);
    assert!(handle.abi().function("name").is_ok());
    assert!(handle.is_read_only());

    // Every user gets their own signer on the same contract.
    let user = setup_user(
        &mainnet,
        ALICE.address().into(),
        &[(FEKIRA_UNIVERSE.to_string(), handle.clone())]
            .into_iter()
            .collect(),
    )?;
    assert_eq!(
        user.contract(FEKIRA_UNIVERSE).unwrap().signer_address(),
        Some(ALICE.address())
    );

    std::fs::remove_dir_all(&root)?;
    Ok(())
}

#[test]
fn test_invalid_override_is_rejected() {
    let err = NetworkContractMap::parse([("mainnet", "0xnot-an-address")]).unwrap_err();
    assert_eq!(err.value, "0xnot-an-address");
}

#[test]
fn test_env_config_with_override_file() -> Result<()> {
    let root = scratch_dir("env");
    std::fs::create_dir_all(&root)?;
    let path = root.join("deploy-config.json");
    std::fs::write(
        &path,
        r#"{
            "goerli": {
                "name": "FekiraUniverse-Goerli",
                "symbol": "FUG",
                "randomnessRevealer": "0x86DB88892459F98e3D4337B75aABd7E3D2734328",
                "hashOfLaunchMetadataList": "0x03ac674216f3e15c761ee1a5e255f067953623c8b388b4459e13f978d7c846f4"
            }
        }"#,
    )?;

    let config = EnvConfig::from_vars([
        ("FEKIRA_NETWORK".to_string(), "goerli".to_string()),
        (
            "FEKIRA_DEPLOY_CONFIG".to_string(),
            path.display().to_string(),
        ),
        ("FEKIRA_NUM_ACCOUNTS".to_string(), "2".to_string()),
    ])?;
    let configs = config.deploy_configs()?;
    let goerli = configs.deploy_config_for(&config.network)?;
    assert_eq!(goerli.name, "FekiraUniverse-Goerli");
    assert_eq!(goerli.base_uri, None);
    assert_eq!(goerli.constructor_args().len(), 5);
    assert_eq!(config.accounts()?.len(), 2);

    // The override replaces the builtin table.
    let err = configs.deploy_config_for("mainnet").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::UnconfiguredNetwork(network)) if network == "mainnet"
    ));

    std::fs::remove_dir_all(&root)?;
    Ok(())
}

#[ignore = "needs anvil and compiled artifacts"]
#[tokio::test]
async fn test_deployed_contract() -> Result<()> {
    // Set up the logger.
    tracing_subscriber::fmt::init();

    let chain = TestChain::fixture(3).await?;
    let config = chain.configs().deploy_config_for(chain.chain().network())?;

    // Every unnamed user sees the deployed contract.
    for user in chain.unnamed_users().await? {
        let handle = user.contract(FEKIRA_UNIVERSE).unwrap();
        assert_eq!(handle.address(), chain.deployment().address);
        let name = handle
            .read_only()
            .method::<_, String>("name", ())?
            .call()
            .await?;
        assert_eq!(name, config.name);
    }

    Ok(())
}
