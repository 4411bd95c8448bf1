use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, U256},
    utils::format_ether,
};
use tracing::{debug, info};

use crate::{
    contract::{EthersRebalancer, RebalancerContract, verify_deployed},
    error::{Error, Result},
};

pub const SEPOLIA_CHAIN_ID: u64 = 11155111;
pub const DEFAULT_RPC_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";

/// An account connected to the rebalancer contract.
#[derive(Clone)]
pub struct WalletConnection {
    pub address: Address,
    /// Native balance in wei.
    pub balance: U256,
    pub contract: Arc<dyn RebalancerContract>,
}

impl Debug for WalletConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConnection")
            .field("address", &self.address)
            .field("balance", &self.balance)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait WalletConnector: Send + Sync {
    async fn connect(&self) -> Result<WalletConnection>;
}

/// Connects with a locally held signing key over JSON-RPC.
pub struct LocalWalletConnector {
    pub rpc_url: String,
    pub chain_id: u64,
    pub private_key: Option<String>,
    pub contract_address: Address,
}

#[async_trait]
impl WalletConnector for LocalWalletConnector {
    async fn connect(&self) -> Result<WalletConnection> {
        let Some(key) = self.private_key.as_deref() else {
            return Err(Error::MissingInput(
                "Please configure a wallet private key (WALLET_PRIVATE_KEY)",
            ));
        };
        let provider = Provider::<Http>::try_from(self.rpc_url.as_str())
            .map_err(|e| Error::Wallet(format!("Invalid RPC URL: {e}")))?;

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| Error::Wallet(e.to_string()))?;
        debug!(%chain_id, "connected to network");
        if chain_id != U256::from(self.chain_id) {
            return Err(Error::Wallet(format!(
                "Please switch to chain {}. Currently on: {chain_id}",
                self.chain_id
            )));
        }

        let wallet = key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| Error::Wallet(format!("Invalid private key: {e}")))?
            .with_chain_id(self.chain_id);
        let address = wallet.address();

        verify_deployed(&provider, self.contract_address).await?;
        let balance = provider
            .get_balance(address, None)
            .await
            .map_err(|e| Error::Wallet(e.to_string()))?;
        info!(address = %short_address(&address), "wallet connected");

        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let contract = EthersRebalancer::new(self.contract_address, client);
        Ok(WalletConnection {
            address,
            balance,
            contract: Arc::new(contract),
        })
    }
}

/// `0x1234...abcd`
pub fn short_address(address: &Address) -> String {
    let full = format!("{address:?}");
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Fixed four decimals, e.g. `0.1234 ETH`.
pub fn format_eth(wei: U256) -> String {
    format!("{} ETH", format_units_4(wei))
}

/// An 18-decimal amount rendered with four decimals.
pub fn format_units_4(wei: U256) -> String {
    let value = format_ether(wei).parse::<f64>().unwrap_or(0.0);
    format!("{value:.4}")
}
