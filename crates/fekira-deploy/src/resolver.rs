//! Network-aware contract resolution.
//!
//! A contract is named by a slug that stays the same on every network. Each
//! slug has a definition saying, per network, whether the contract lives at a
//! fixed address or under some registry name. The resolver turns a slug, a
//! network and an optional signer into a bound [`ContractHandle`].

use std::{collections::BTreeMap, fmt};

use ethers::types::Address;
use eyre::Result;
use fekira_addresses::{ContractOverride, NetworkContractMap};
use tracing::debug;

use crate::{
    artifacts::ArtifactStore,
    chain::Chain,
    constants::{DEFAULT_NETWORK, FEKIRA_UNIVERSE},
    handle::{ContractHandle, SignerRef},
    registry::Registry,
    Error,
};

/// Returns the first candidate that is present and non-empty.
pub fn first_non_empty<'a, I>(candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|candidate| !candidate.is_empty())
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolutionOptions {
    /// The ABI to use instead of the slug's.
    pub abi_name: Option<String>,
    /// The registry entry to take the address from instead of the slug's.
    pub lookup_name: Option<String>,
}

impl ResolutionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abi_name(mut self, abi_name: impl Into<String>) -> Self {
        self.abi_name = Some(abi_name.into());
        self
    }

    pub fn lookup_name(mut self, lookup_name: impl Into<String>) -> Self {
        self.lookup_name = Some(lookup_name.into());
        self
    }

    /// The registry entry to take the address from, when it differs from the
    /// ABI name. Both names have to be set for this to apply.
    fn distinct_lookup_name(&self) -> Option<&str> {
        let abi_name = first_non_empty([self.abi_name.as_deref()])?;
        let lookup_name = first_non_empty([self.lookup_name.as_deref()])?;
        (abi_name != lookup_name).then_some(lookup_name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContractDefinition {
    pub networks: NetworkContractMap,
    pub options: ResolutionOptions,
}

impl ContractDefinition {
    pub fn new(networks: NetworkContractMap) -> Self {
        Self {
            networks,
            options: ResolutionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolutionOptions) -> Self {
        self.options = options;
        self
    }
}

/// The contracts this toolkit knows how to resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContractSlug {
    FekiraUniverse,
}

impl ContractSlug {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FekiraUniverse => FEKIRA_UNIVERSE,
        }
    }
}

impl fmt::Display for ContractSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The definition of every contract slug.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractDefinitions(BTreeMap<ContractSlug, ContractDefinition>);

impl Default for ContractDefinitions {
    fn default() -> Self {
        let fekira_universe = ContractDefinition::new(NetworkContractMap::new().with(
            DEFAULT_NETWORK,
            ContractOverride::RegistryName(FEKIRA_UNIVERSE.to_string()),
        ));
        Self(BTreeMap::from([(
            ContractSlug::FekiraUniverse,
            fekira_universe,
        )]))
    }
}

impl ContractDefinitions {
    pub fn with(mut self, slug: ContractSlug, definition: ContractDefinition) -> Self {
        self.0.insert(slug, definition);
        self
    }

    pub fn get(&self, slug: ContractSlug) -> Option<&ContractDefinition> {
        self.0.get(&slug)
    }
}

/// Resolves contracts against one chain, one registry and one artifact store.
pub struct ContractResolver<'a, R: Registry + ?Sized> {
    chain: &'a Chain,
    registry: &'a R,
    artifacts: &'a ArtifactStore,
}

impl<'a, R: Registry + ?Sized> ContractResolver<'a, R> {
    pub fn new(chain: &'a Chain, registry: &'a R, artifacts: &'a ArtifactStore) -> Self {
        Self {
            chain,
            registry,
            artifacts,
        }
    }

    /// Gets the registry entry `name`, using both its address and its ABI.
    pub async fn get_contract(
        &self,
        name: &str,
        signer: Option<SignerRef>,
    ) -> Result<ContractHandle> {
        let signer = self.resolve_signer(signer)?;
        let deployment = self
            .registry
            .get(name)
            .await?
            .ok_or_else(|| Error::UnresolvedContract(name.to_string()))?;
        Ok(ContractHandle::new(
            name,
            deployment.address,
            deployment.abi,
            self.chain.provider(),
            signer,
        ))
    }

    /// Gets the contract at `address` described by the ABI named `name`. The
    /// ABI comes from the registry entry of that name if there is one and
    /// from the compiled artifact otherwise.
    pub async fn get_contract_at(
        &self,
        name: &str,
        address: Address,
        signer: Option<SignerRef>,
    ) -> Result<ContractHandle> {
        let signer = self.resolve_signer(signer)?;
        let abi = match self.registry.get(name).await? {
            Some(deployment) => deployment.abi,
            None => self
                .artifacts
                .get(name)
                .map(|artifact| artifact.abi.clone())
                .ok_or_else(|| Error::UnresolvedContract(name.to_string()))?,
        };
        Ok(ContractHandle::new(
            name,
            address,
            abi,
            self.chain.provider(),
            signer,
        ))
    }

    /// Resolves `slug` on `network` according to `definition`.
    ///
    /// With an address override, the ABI is named by the lookup name, the ABI
    /// name or the slug (first one set) and the registry is never asked for
    /// an address. Otherwise the registry entry named by the registry
    /// override, the ABI name or the slug supplies the contract; if the ABI
    /// and lookup names are both set and differ, the lookup name's entry
    /// supplies the address instead.
    pub async fn resolve_contract(
        &self,
        slug: &str,
        network: &str,
        signer: Option<SignerRef>,
        definition: &ContractDefinition,
    ) -> Result<ContractHandle> {
        let options = &definition.options;
        let maybe_override = definition.networks.get(network);

        if let Some(ContractOverride::Address(address)) = maybe_override {
            let abi_name = first_non_empty([
                options.lookup_name.as_deref(),
                options.abi_name.as_deref(),
                Some(slug),
            ])
            .ok_or_else(|| Error::UnresolvedContract(slug.to_string()))?;
            debug!(slug, network, abi_name, ?address, "resolving address override");
            return self.get_contract_at(abi_name, *address, signer).await;
        }

        let registry_name = first_non_empty([
            maybe_override.and_then(|o| o.registry_name()),
            options.abi_name.as_deref(),
            Some(slug),
        ])
        .ok_or_else(|| Error::UnresolvedContract(slug.to_string()))?;

        match options.distinct_lookup_name() {
            Some(lookup_name) => {
                debug!(slug, network, registry_name, lookup_name, "resolving through lookup");
                let target = self.get_contract(lookup_name, None).await?;
                self.get_contract_at(registry_name, target.address(), signer)
                    .await
            }
            None => {
                debug!(slug, network, registry_name, "resolving through registry");
                self.get_contract(registry_name, signer).await
            }
        }
    }

    /// Resolves a known contract on the resolver's own chain.
    pub async fn contract_for_environment(
        &self,
        definitions: &ContractDefinitions,
        slug: ContractSlug,
        signer: Option<SignerRef>,
    ) -> Result<ContractHandle> {
        let definition = definitions
            .get(slug)
            .ok_or_else(|| Error::UnresolvedContract(slug.to_string()))?;
        self.resolve_contract(slug.as_str(), self.chain.network(), signer, definition)
            .await
    }

    fn resolve_signer(&self, signer: Option<SignerRef>) -> Result<Option<ethers::signers::LocalWallet>> {
        signer
            .map(|reference| self.chain.signer(&reference))
            .transpose()
    }
}
