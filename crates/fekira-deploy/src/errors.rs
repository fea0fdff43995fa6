use ethers::types::H256;
use thiserror::Error;

/// The failure kinds callers are expected to tell apart. Everything else is
/// propagated as a plain `eyre::Report`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unconfigured network: \"{0}\"")]
    UnconfiguredNetwork(String),
    #[error("unresolved contract \"{0}\": no deployment or artifact has that name")]
    UnresolvedContract(String),
    #[error("unresolved signer {0}: not one of the chain's accounts")]
    UnresolvedSigner(String),
    #[error("contract \"{0}\" is read-only; connect a signer before sending transactions")]
    ReadOnlyHandle(String),
    #[error("transaction {0:?} was mined but reverted")]
    TransactionFailed(H256),
}
