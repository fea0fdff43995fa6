/// Helpers that give each test account its own view of the deployed
/// contracts.
use std::collections::BTreeMap;

use ethers::{signers::Signer, types::Address};
use eyre::Result;

use crate::{
    chain::Chain,
    handle::{ContractHandle, SignerRef},
};

/// An account together with every contract connected to its signer.
#[derive(Clone, Debug)]
pub struct User {
    pub address: Address,
    pub contracts: BTreeMap<String, ContractHandle>,
}

impl User {
    pub fn contract(&self, name: &str) -> Option<&ContractHandle> {
        self.contracts.get(name)
    }
}

pub fn setup_user(
    chain: &Chain,
    signer: SignerRef,
    contracts: &BTreeMap<String, ContractHandle>,
) -> Result<User> {
    let signer = chain.signer(&signer)?;
    let contracts = contracts
        .iter()
        .map(|(name, handle)| (name.clone(), handle.connect(signer.clone())))
        .collect();
    Ok(User {
        address: signer.address(),
        contracts,
    })
}

pub fn setup_users(
    chain: &Chain,
    addresses: &[Address],
    contracts: &BTreeMap<String, ContractHandle>,
) -> Result<Vec<User>> {
    addresses
        .iter()
        .map(|address| setup_user(chain, (*address).into(), contracts))
        .collect()
}

pub fn setup_users_with_names(
    chain: &Chain,
    named_addresses: &BTreeMap<String, Address>,
    contracts: &BTreeMap<String, ContractHandle>,
) -> Result<BTreeMap<String, User>> {
    named_addresses
        .iter()
        .map(|(name, address)| Ok((name.clone(), setup_user(chain, (*address).into(), contracts)?)))
        .collect()
}
