use std::{fmt, sync::Arc};

use ethers::{
    abi::Abi,
    contract::Contract,
    middleware::SignerMiddleware,
    providers::{Http, Provider},
    signers::{LocalWallet, Signer},
    types::Address,
};
use eyre::Result;
use fekira_addresses::ADDRESS_PREFIX;

use crate::Error;

/// A reference to the account that should sign for a contract.
#[derive(Clone)]
pub enum SignerRef {
    /// One of the chain's accounts, by address.
    Address(Address),
    /// One of the chain's named accounts, e.g. `deployer`.
    Named(String),
    /// A wallet that is used as-is.
    Wallet(LocalWallet),
}

impl fmt::Debug for SignerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => f.debug_tuple("Address").field(address).finish(),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Wallet(wallet) => f.debug_tuple("Wallet").field(&wallet.address()).finish(),
        }
    }
}

impl From<Address> for SignerRef {
    fn from(address: Address) -> Self {
        Self::Address(address)
    }
}

impl From<LocalWallet> for SignerRef {
    fn from(wallet: LocalWallet) -> Self {
        Self::Wallet(wallet)
    }
}

/// Hex strings refer to accounts by address. Everything else is an account
/// name.
impl From<&str> for SignerRef {
    fn from(reference: &str) -> Self {
        if reference.starts_with(ADDRESS_PREFIX) {
            if let Ok(address) = reference.parse::<Address>() {
                return Self::Address(address);
            }
        }
        Self::Named(reference.to_string())
    }
}

pub type SignedContract = Contract<SignerMiddleware<Provider<Http>, LocalWallet>>;

/// A contract at a known address, described by a named ABI and optionally
/// bound to a signer. The `ethers` contracts are built on demand, so a handle
/// is cheap to clone and re-bind.
#[derive(Clone)]
pub struct ContractHandle {
    abi_name: String,
    address: Address,
    abi: Abi,
    provider: Provider<Http>,
    signer: Option<LocalWallet>,
}

impl fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractHandle")
            .field("abi_name", &self.abi_name)
            .field("address", &self.address)
            .field("signer", &self.signer_address())
            .finish()
    }
}

impl ContractHandle {
    pub fn new(
        abi_name: impl Into<String>,
        address: Address,
        abi: Abi,
        provider: Provider<Http>,
        signer: Option<LocalWallet>,
    ) -> Self {
        Self {
            abi_name: abi_name.into(),
            address,
            abi,
            provider,
            signer,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// The name the ABI was resolved by.
    pub fn abi_name(&self) -> &str {
        &self.abi_name
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    /// The address of the bound signer, or `None` for a read-only handle.
    pub fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(|signer| signer.address())
    }

    pub fn is_read_only(&self) -> bool {
        self.signer.is_none()
    }

    /// A copy of this handle bound to `signer`.
    pub fn connect(&self, signer: LocalWallet) -> Self {
        Self {
            signer: Some(signer),
            ..self.clone()
        }
    }

    /// A contract that can only make calls.
    pub fn read_only(&self) -> Contract<Provider<Http>> {
        Contract::new(self.address, self.abi.clone(), Arc::new(self.provider.clone()))
    }

    /// A contract whose transactions are signed by the bound signer.
    pub fn signed(&self) -> Result<SignedContract> {
        let signer = self
            .signer
            .clone()
            .ok_or_else(|| Error::ReadOnlyHandle(self.abi_name.clone()))?;
        let client = SignerMiddleware::new(self.provider.clone(), signer);
        Ok(Contract::new(self.address, self.abi.clone(), Arc::new(client)))
    }
}
