#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use intent_rebalancer::{
    ai::TextGenerator,
    contract::{RebalancerContract, StrategyRecord, SupportedToken},
    controller::{Collaborators, Controller, Mode},
    error::{Error, Result},
    portfolio::PriceTable,
    server::{RebalanceRequest, RebalanceResponse, RebalanceService},
    wallet::{WalletConnection, WalletConnector},
};

pub fn user() -> Address {
    Address::from_low_u64_be(0xA11CE)
}

// --- AI endpoint ---
pub struct MockGenerator {
    reply: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| Error::Ai("API key not valid".to_string()))
    }
}

// --- Server endpoints ---
#[derive(Default)]
pub struct MockService {
    pub intent: Option<String>,
    pub intent_fails: bool,
    pub response: Option<RebalanceResponse>,
    pub requests: Mutex<Vec<RebalanceRequest>>,
}

#[async_trait]
impl RebalanceService for MockService {
    async fn generate_intent(&self, _strategy: &str) -> Result<Option<String>> {
        if self.intent_fails {
            return Err(Error::Server("connection refused".to_string()));
        }
        Ok(self.intent.clone())
    }

    async fn rebalance(&self, request: &RebalanceRequest) -> Result<RebalanceResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.response
            .clone()
            .ok_or_else(|| Error::Server("HTTP 500".to_string()))
    }
}

// --- Contract ---
#[derive(Default)]
pub struct MockContract {
    pub owner: Address,
    pub tokens: Mutex<Vec<SupportedToken>>,
    pub values: HashMap<Address, U256>,
    pub strategies: Mutex<Vec<StrategyRecord>>,
    pub executed: Mutex<Vec<U256>>,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl MockContract {
    fn read(&self) -> Result<()> {
        match self.fail_reads {
            true => Err(Error::Contract("execution reverted".to_string())),
            false => Ok(()),
        }
    }

    fn write(&self) -> Result<H256> {
        match self.fail_writes {
            true => Err(Error::Contract("insufficient funds for gas".to_string())),
            false => Ok(H256::from_low_u64_be(0xBEEF)),
        }
    }
}

#[async_trait]
impl RebalancerContract for MockContract {
    async fn create_strategy(
        &self,
        name: &str,
        target_tokens: Vec<Address>,
        target_percentages: Vec<U256>,
    ) -> Result<H256> {
        let hash = self.write()?;
        self.strategies.lock().unwrap().push(StrategyRecord {
            name: name.to_string(),
            target_tokens,
            target_percentages,
            timestamp: 1_700_000_000,
            executed: false,
        });
        Ok(hash)
    }

    async fn execute_strategy(&self, strategy_id: U256) -> Result<H256> {
        let hash = self.write()?;
        self.executed.lock().unwrap().push(strategy_id);
        Ok(hash)
    }

    async fn user_strategies(&self, _user: Address) -> Result<Vec<StrategyRecord>> {
        self.read()?;
        Ok(self.strategies.lock().unwrap().clone())
    }

    async fn supported_tokens(&self) -> Result<Vec<SupportedToken>> {
        self.read()?;
        Ok(self.tokens.lock().unwrap().clone())
    }

    async fn portfolio_value(&self, _user: Address) -> Result<U256> {
        self.read()?;
        Ok(self.values.values().fold(U256::zero(), |acc, v| acc + *v))
    }

    async fn token_value(&self, _user: Address, token: Address) -> Result<U256> {
        self.read()?;
        Ok(self.values.get(&token).copied().unwrap_or_default())
    }

    async fn add_supported_token(&self, token: Address, symbol: &str) -> Result<H256> {
        let hash = self.write()?;
        self.tokens.lock().unwrap().push(SupportedToken {
            address: token,
            symbol: symbol.to_string(),
        });
        Ok(hash)
    }

    async fn remove_supported_token(&self, token: Address) -> Result<H256> {
        let hash = self.write()?;
        self.tokens.lock().unwrap().retain(|t| t.address != token);
        Ok(hash)
    }

    async fn owner(&self) -> Result<Address> {
        self.read()?;
        Ok(self.owner)
    }

    async fn is_supported_token(&self, token: Address) -> Result<bool> {
        self.read()?;
        Ok(self.tokens.lock().unwrap().iter().any(|t| t.address == token))
    }
}

// --- Wallet ---
pub struct MockConnector {
    pub contract: Option<Arc<MockContract>>,
    pub missing_key: bool,
}

impl MockConnector {
    pub fn with(contract: Arc<MockContract>) -> Self {
        Self {
            contract: Some(contract),
            missing_key: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            contract: None,
            missing_key: false,
        }
    }
}

#[async_trait]
impl WalletConnector for MockConnector {
    async fn connect(&self) -> Result<WalletConnection> {
        if self.missing_key {
            return Err(Error::MissingInput("Please configure a wallet private key"));
        }
        let contract = self.contract.clone().ok_or_else(|| {
            Error::Wallet("Please switch to chain 11155111. Currently on: 1".to_string())
        })?;
        Ok(WalletConnection {
            address: user(),
            balance: U256::exp10(18),
            contract,
        })
    }
}

pub fn controller(
    mode: Mode,
    generator: Arc<MockGenerator>,
    service: Arc<MockService>,
    connector: MockConnector,
) -> Controller {
    Controller::new(
        mode,
        PriceTable::mock(),
        Collaborators {
            generator,
            service,
            connector: Arc::new(connector),
        },
    )
}

pub fn wallet_controller(generator: Arc<MockGenerator>, contract: Arc<MockContract>) -> Controller {
    controller(
        Mode::Wallet,
        generator,
        Arc::new(MockService::default()),
        MockConnector::with(contract),
    )
}

pub fn server_controller(service: Arc<MockService>) -> Controller {
    controller(
        Mode::Server,
        Arc::new(MockGenerator::failing()),
        service,
        MockConnector::unreachable(),
    )
}
