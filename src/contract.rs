use std::sync::Arc;

use async_trait::async_trait;
use ethers::{
    contract::ContractCall,
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::LocalWallet,
    types::{Address, H256, U256, U64},
};
use tracing::debug;

use crate::{
    Percent,
    error::{Error, Result},
};

pub const DEFAULT_CONTRACT_ADDRESS: &str = "0xc49d07Ae270Fb68D50A15e3a91a92c70c9aC190C";

ethers::contract::abigen!(
    PortfolioRebalancer,
    r#"[
        struct StrategyInfo { string name; address[] targetTokens; uint256[] targetPercentages; uint256 timestamp; bool executed; }
        function createStrategy(string name, address[] targetTokens, uint256[] targetPercentages)
        function executeStrategy(uint256 strategyId)
        function getUserStrategies(address user) view returns (StrategyInfo[])
        function getSupportedTokens() view returns (address[], string[])
        function calculatePortfolioValue(address user) view returns (uint256)
        function getTokenValue(address user, address token) view returns (uint256)
        function addSupportedToken(address token, string symbol)
        function removeSupportedToken(address token)
        function owner() view returns (address)
        function supportedTokens(address) view returns (bool)
    ]"#
);

/// Tokens the rebalancer is expected to track on Sepolia.
pub struct KnownToken {
    pub symbol: &'static str,
    pub name: &'static str,
    pub address: &'static str,
}

pub const SEPOLIA_TOKENS: [KnownToken; 3] = [
    KnownToken {
        symbol: "USDC",
        name: "USD Coin (Sepolia)",
        address: "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238",
    },
    KnownToken {
        symbol: "USDT",
        name: "Tether USD (Sepolia)",
        address: "0x7169D38820dfd117C3FA1f22a697dBA58d90BA06",
    },
    KnownToken {
        symbol: "DAI",
        name: "Dai Stablecoin (Sepolia)",
        address: "0x68194a729C2450ad26072b3D33ADaCbcef39D574",
    },
];

impl KnownToken {
    pub fn address(&self) -> Address {
        self.address.parse().unwrap_or_default()
    }
}

/// Sepolia address for `symbol`, or the zero address when it isn't known.
pub fn token_address(symbol: &str) -> Address {
    SEPOLIA_TOKENS
        .iter()
        .find(|t| t.symbol == symbol)
        .map(KnownToken::address)
        .unwrap_or_else(Address::zero)
}

/// Percentages travel on-chain as basis points.
pub fn to_basis_points(percentage: Percent) -> Result<U256> {
    let bps = (percentage * 100.0).round();
    if !bps.is_finite() || bps < 0.0 {
        return Err(Error::InvalidInput(format!(
            "percentage {percentage} can't be sent to the contract"
        )));
    }
    Ok(U256::from(bps as u128))
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRecord {
    pub name: String,
    pub target_tokens: Vec<Address>,
    pub target_percentages: Vec<U256>,
    /// Seconds since the epoch.
    pub timestamp: u64,
    pub executed: bool,
}

impl From<StrategyInfo> for StrategyRecord {
    fn from(info: StrategyInfo) -> Self {
        Self {
            name: info.name,
            target_tokens: info.target_tokens,
            target_percentages: info.target_percentages,
            timestamp: info.timestamp.low_u64(),
            executed: info.executed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupportedToken {
    pub address: Address,
    pub symbol: String,
}

/// Remote procedures exposed by the deployed rebalancer. Writes resolve once
/// the transaction is mined and return its hash.
#[async_trait]
pub trait RebalancerContract: Send + Sync {
    async fn create_strategy(
        &self,
        name: &str,
        target_tokens: Vec<Address>,
        target_percentages: Vec<U256>,
    ) -> Result<H256>;
    async fn execute_strategy(&self, strategy_id: U256) -> Result<H256>;
    async fn user_strategies(&self, user: Address) -> Result<Vec<StrategyRecord>>;
    async fn supported_tokens(&self) -> Result<Vec<SupportedToken>>;
    async fn portfolio_value(&self, user: Address) -> Result<U256>;
    async fn token_value(&self, user: Address, token: Address) -> Result<U256>;
    async fn add_supported_token(&self, token: Address, symbol: &str) -> Result<H256>;
    async fn remove_supported_token(&self, token: Address) -> Result<H256>;
    async fn owner(&self) -> Result<Address>;
    async fn is_supported_token(&self, token: Address) -> Result<bool>;
}

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

pub struct EthersRebalancer {
    contract: PortfolioRebalancer<SignerClient>,
}

impl EthersRebalancer {
    pub fn new(address: Address, client: Arc<SignerClient>) -> Self {
        Self {
            contract: PortfolioRebalancer::new(address, client),
        }
    }
}

fn contract_err(e: impl std::fmt::Display) -> Error {
    Error::Contract(e.to_string())
}

async fn send_and_wait(call: ContractCall<SignerClient, ()>) -> Result<H256> {
    let pending = call.send().await.map_err(contract_err)?;
    let hash = pending.tx_hash();
    debug!(?hash, "transaction sent");
    match pending.await.map_err(contract_err)? {
        Some(receipt) => {
            if receipt.status == Some(U64::zero()) {
                return Err(Error::Contract(format!("transaction {hash:?} reverted")));
            }
            Ok(hash)
        }
        None => Err(Error::Contract(format!("transaction {hash:?} dropped"))),
    }
}

#[async_trait]
impl RebalancerContract for EthersRebalancer {
    async fn create_strategy(
        &self,
        name: &str,
        target_tokens: Vec<Address>,
        target_percentages: Vec<U256>,
    ) -> Result<H256> {
        send_and_wait(
            self.contract
                .create_strategy(name.to_string(), target_tokens, target_percentages),
        )
        .await
    }

    async fn execute_strategy(&self, strategy_id: U256) -> Result<H256> {
        send_and_wait(self.contract.execute_strategy(strategy_id)).await
    }

    async fn user_strategies(&self, user: Address) -> Result<Vec<StrategyRecord>> {
        let raw = self
            .contract
            .get_user_strategies(user)
            .call()
            .await
            .map_err(contract_err)?;
        Ok(raw
            .into_iter()
            .map(
                |(name, target_tokens, target_percentages, timestamp, executed)| {
                    StrategyRecord::from(StrategyInfo {
                        name,
                        target_tokens,
                        target_percentages,
                        timestamp,
                        executed,
                    })
                },
            )
            .collect())
    }

    async fn supported_tokens(&self) -> Result<Vec<SupportedToken>> {
        let (addresses, symbols) = self
            .contract
            .get_supported_tokens()
            .call()
            .await
            .map_err(contract_err)?;
        Ok(addresses
            .into_iter()
            .zip(symbols)
            .map(|(address, symbol)| SupportedToken { address, symbol })
            .collect())
    }

    async fn portfolio_value(&self, user: Address) -> Result<U256> {
        self.contract
            .calculate_portfolio_value(user)
            .call()
            .await
            .map_err(contract_err)
    }

    async fn token_value(&self, user: Address, token: Address) -> Result<U256> {
        self.contract
            .get_token_value(user, token)
            .call()
            .await
            .map_err(contract_err)
    }

    async fn add_supported_token(&self, token: Address, symbol: &str) -> Result<H256> {
        send_and_wait(self.contract.add_supported_token(token, symbol.to_string())).await
    }

    async fn remove_supported_token(&self, token: Address) -> Result<H256> {
        send_and_wait(self.contract.remove_supported_token(token)).await
    }

    async fn owner(&self) -> Result<Address> {
        self.contract.owner().call().await.map_err(contract_err)
    }

    async fn is_supported_token(&self, token: Address) -> Result<bool> {
        self.contract
            .supported_tokens(token)
            .call()
            .await
            .map_err(contract_err)
    }
}

/// Fails when nothing is deployed at `address` on the connected network.
pub async fn verify_deployed(provider: &Provider<Http>, address: Address) -> Result<()> {
    let code = provider
        .get_code(address, None)
        .await
        .map_err(contract_err)?;
    debug!(len = code.len(), "contract code fetched");
    if code.is_empty() {
        return Err(Error::Contract(format!(
            "No contract deployed at address {address:?}"
        )));
    }
    Ok(())
}
