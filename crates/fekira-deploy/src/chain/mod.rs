mod test_chain;

use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use ethers::{
    core::utils::Anvil,
    middleware::{
        nonce_manager::NonceManagerError, MiddlewareError, NonceManagerMiddleware,
        SignerMiddleware,
    },
    providers::{
        Http, HttpClientError, HttpRateLimitRetryPolicy, Middleware, PendingTransaction, Provider,
        RetryClient, RetryClientBuilder, RetryPolicy,
    },
    signers::{coins_bip39::English, LocalWallet, MnemonicBuilder, Signer},
    types::{transaction::eip2718::TypedTransaction, Address, BlockId, U256},
    utils::AnvilInstance,
};
use eyre::Result;
pub use test_chain::TestChain;
use tracing::debug;

use crate::{config::NamedAccounts, handle::SignerRef, Error};

/// Derives the first `num_accounts` accounts of a BIP-39 mnemonic.
pub fn derive_accounts(mnemonic: &str, num_accounts: usize) -> Result<Vec<LocalWallet>> {
    let mut accounts = Vec::with_capacity(num_accounts);
    let mut builder = MnemonicBuilder::<English>::default().phrase(mnemonic);
    for i in 0..num_accounts {
        builder = builder.index(i as u32)?;
        accounts.push(builder.build()?);
    }
    Ok(accounts)
}

/// A retry policy that will retry on rate limit errors, timeout errors, and
/// "intrinsic gas too high".
#[derive(Debug, Default)]
struct ChainRetryPolicy(HttpRateLimitRetryPolicy);

impl RetryPolicy<HttpClientError> for ChainRetryPolicy {
    fn should_retry(&self, error: &HttpClientError) -> bool {
        self.0.should_retry(error) || error.to_string().contains("intrinsic gas too high")
    }

    fn backoff_hint(&self, error: &HttpClientError) -> Option<Duration> {
        self.0.backoff_hint(error).or_else(|| {
            error
                .to_string()
                .contains("intrinsic gas too high")
                .then(|| Duration::from_millis(1))
        })
    }
}

type ChainClientProvider = Arc<RetryClient<Http>>;

type ChainClientInner<S> = NonceManagerMiddleware<SignerMiddleware<Provider<ChainClientProvider>, S>>;

/// The client deployments are sent through: a retrying provider with signer
/// and nonce management middleware on top.
#[derive(Debug)]
pub struct ChainClient<S: Signer + 'static> {
    inner: ChainClientInner<S>,
    address: Address,
}

impl<S: Signer + 'static> ChainClient<S> {
    pub async fn new(provider: Provider<Http>, signer: S) -> Result<Self> {
        let provider = RetryClientBuilder::default()
            .rate_limit_retries(10)
            .timeout_retries(3)
            .initial_backoff(Duration::from_millis(1))
            .build(
                provider.as_ref().clone(),
                Box::<ChainRetryPolicy>::default(),
            );
        let provider = Provider::new(Arc::new(provider)).interval(Duration::from_millis(10));

        let inner = SignerMiddleware::new_with_provider_chain(provider, signer).await?;
        let address = inner.address();
        let inner = NonceManagerMiddleware::new(inner, address);

        Ok(Self { inner, address })
    }

    /// Gets the client's address.
    pub fn address(&self) -> Address {
        self.address
    }
}

#[async_trait]
impl<S: Signer + 'static> Middleware for ChainClient<S> {
    // NOTE: This is a pass-through middleware implementation, so we just use
    // the error from the top of the middleware stack.
    type Error = NonceManagerError<Self::Inner>;

    type Provider = ChainClientProvider;
    type Inner = ChainClientInner<S>;

    fn inner(&self) -> &Self::Inner {
        &self.inner
    }

    async fn send_transaction<T: Into<TypedTransaction> + Send + Sync>(
        &self,
        tx: T,
        block: Option<BlockId>,
    ) -> Result<PendingTransaction<'_, Self::Provider>, Self::Error> {
        Ok(self
            .inner
            .send_transaction(tx, block)
            .await
            .map_err(MiddlewareError::from_err)?)
    }
}

/// A connection to one named network: its provider, its chain id and the
/// local accounts that can sign on it.
#[derive(Clone)]
pub struct Chain {
    provider: Provider<Http>,
    network: String,
    chain_id: u64,
    accounts: Vec<LocalWallet>,
    named_accounts: NamedAccounts,
    client_version: String,
    _maybe_anvil: Option<Arc<AnvilInstance>>,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("network", &self.network)
            .field("chain_id", &self.chain_id)
            .field(
                "accounts",
                &self.accounts.iter().map(|a| a.address()).collect::<Vec<_>>(),
            )
            .field("named_accounts", &self.named_accounts)
            .field("client_version", &self.client_version)
            .finish()
    }
}

impl Chain {
    /// Connects to `maybe_rpc_url`, or spawns a local anvil node when no URL
    /// is given.
    pub async fn connect(
        maybe_rpc_url: Option<String>,
        network: &str,
        accounts: Vec<LocalWallet>,
    ) -> Result<Self> {
        let (provider, _maybe_anvil) = if let Some(rpc_url) = maybe_rpc_url {
            (
                Provider::<Http>::try_from(rpc_url)?.interval(Duration::from_millis(10)),
                None,
            )
        } else {
            let anvil = Anvil::new().spawn();
            (
                Provider::<Http>::try_from(anvil.endpoint())?.interval(Duration::from_millis(10)),
                Some(Arc::new(anvil)),
            )
        };
        let client_version = provider.client_version().await?;
        let chain_id = provider.get_chainid().await?.as_u64();
        debug!(network, chain_id, %client_version, "connected");

        Ok(Self {
            provider,
            network: network.to_string(),
            chain_id,
            accounts,
            named_accounts: NamedAccounts::default(),
            client_version,
            _maybe_anvil,
        })
    }

    /// Builds a chain from parts that are already known. Nothing is sent to
    /// the provider until a contract is called.
    pub fn new(
        provider: Provider<Http>,
        network: &str,
        chain_id: u64,
        accounts: Vec<LocalWallet>,
    ) -> Self {
        Self {
            provider,
            network: network.to_string(),
            chain_id,
            accounts,
            named_accounts: NamedAccounts::default(),
            client_version: String::new(),
            _maybe_anvil: None,
        }
    }

    pub fn with_named_accounts(mut self, named_accounts: NamedAccounts) -> Self {
        self.named_accounts = named_accounts;
        self
    }
}

impl Chain {
    /// A provider that can access the chain.
    pub fn provider(&self) -> Provider<Http> {
        self.provider.clone()
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn accounts(&self) -> &[LocalWallet] {
        &self.accounts
    }

    pub fn named_accounts(&self) -> &NamedAccounts {
        &self.named_accounts
    }

    /// The address behind every named account.
    pub fn named_addresses(&self) -> Result<BTreeMap<String, Address>> {
        self.named_accounts
            .iter()
            .map(|(name, _)| {
                let signer = self.signer(&SignerRef::Named(name.to_string()))?;
                Ok((name.to_string(), signer.address()))
            })
            .collect()
    }

    /// Resolves a signer reference to one of the chain's accounts, bound to
    /// the chain id. Wallets are passed through.
    pub fn signer(&self, reference: &SignerRef) -> Result<LocalWallet> {
        let wallet = match reference {
            SignerRef::Address(address) => self
                .accounts
                .iter()
                .find(|account| account.address() == *address)
                .cloned()
                .ok_or_else(|| Error::UnresolvedSigner(format!("{:?}", address)))?,
            SignerRef::Named(name) => self
                .named_accounts
                .get(name)
                .and_then(|index| self.accounts.get(index))
                .cloned()
                .ok_or_else(|| Error::UnresolvedSigner(format!("\"{}\"", name)))?,
            SignerRef::Wallet(wallet) => wallet.clone(),
        };
        Ok(wallet.with_chain_id(self.chain_id))
    }

    /// A client that can send transactions on the chain.
    pub async fn client<S: Signer + 'static>(&self, signer: S) -> Result<Arc<ChainClient<S>>> {
        Ok(Arc::new(ChainClient::new(self.provider(), signer).await?))
    }

    /// Sets an address's balance. This only works for anvil chains.
    pub async fn deal<U: Into<U256>>(&self, address: Address, amount: U) -> Result<()> {
        if !self.is_anvil() {
            return Err(eyre::eyre!("can't deal ether on a non-anvil chain"));
        }
        self.provider
            .request::<(Address, U256), ()>("anvil_setBalance", (address, amount.into()))
            .await?;
        Ok(())
    }

    /// Checks to see if the underlying chain is an anvil chain.
    pub fn is_anvil(&self) -> bool {
        self.client_version.contains("anvil")
    }
}
