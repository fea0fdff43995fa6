use std::env;

use ethers::{signers::LocalWallet, utils::keccak256};

/// The network that hardhat runs in-process. Deployments on it are never
/// written to disk.
pub const DEFAULT_NETWORK: &str = "hardhat";

/// The gas limit used for every deployment transaction.
pub const GAS_LIMIT: u64 = 5_500_000;

/// The named account that signs deployments.
pub const DEPLOYER: &str = "deployer";

/// The development mnemonic shared by hardhat and anvil.
pub const MNEMONIC: &str = "test test test test test test test test test test test junk";

/// The logical name, artifact name and registry name of the NFT contract.
pub const FEKIRA_UNIVERSE: &str = "FekiraUniverse";

lazy_static! {
    // A set of test accounts.
    pub static ref ALICE: LocalWallet = LocalWallet::from_bytes(&keccak256("alice")).unwrap();
    pub static ref BOB: LocalWallet = LocalWallet::from_bytes(&keccak256("bob")).unwrap();
    pub static ref CELINE: LocalWallet = LocalWallet::from_bytes(&keccak256("celine")).unwrap();

    // The Ethereum URL the tests should connect to. If None, then the tests
    // will spawn an anvil node.
    pub static ref MAYBE_ETHEREUM_URL: Option<String> = env::var("FEKIRA_ETHEREUM_URL").ok();

    // The artifacts directory the end-to-end tests deploy from.
    pub static ref ARTIFACTS_DIR: String = env::var("FEKIRA_ARTIFACTS_DIR").unwrap_or_else(|_| "artifacts".to_string());
}
