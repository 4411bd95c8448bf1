use std::sync::Arc;

use clap::ValueEnum;
use ethers::types::{Address, H256, U256};
use tracing::{debug, error, info};

use crate::{
    ai::{StrategyOptions, TextGenerator, generate_strategy},
    contract::{SEPOLIA_TOKENS, StrategyRecord, SupportedToken, to_basis_points, token_address},
    error::{Error, Result},
    plan::RebalanceReport,
    portfolio::{PriceTable, parse_portfolio},
    server::{RebalanceRequest, RebalanceService},
    strategy::Strategy,
    wallet::{WalletConnection, WalletConnector},
};

/// Which collaborators a controller talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Wallet, contract and the AI endpoint.
    Wallet,
    /// The `/generate_intent` and `/rebalance` endpoints.
    Server,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Wallet => f.write_str("wallet"),
            Mode::Server => f.write_str("server"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Wallet,
    Strategy,
    Portfolio,
    History,
    Admin,
    Intent,
    Analysis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenBalance {
    pub symbol: String,
    pub address: Address,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Wallet {
        address: Address,
        balance: U256,
        is_owner: bool,
    },
    Strategy(Strategy),
    Portfolio(Vec<TokenBalance>),
    PortfolioValue(U256),
    History(Vec<StrategyRecord>),
    Tokens(Vec<SupportedToken>),
    Intent(String),
    Rebalance(RebalanceReport),
    Log(Vec<String>),
    Notice(String),
    Error(String),
}

/// What one operation leaves behind in one display region.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub region: Region,
    pub content: Content,
}

impl Panel {
    pub fn new(region: Region, content: Content) -> Self {
        Self { region, content }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.content, Content::Error(_))
    }
}

/// Transient per-run state. Nothing here outlives the process.
#[derive(Debug, Default)]
pub struct Session {
    pub wallet: Option<WalletConnection>,
    pub current_strategy: Option<Strategy>,
    pub is_owner: bool,
}

impl Session {
    fn connection(&self) -> Result<&WalletConnection> {
        self.wallet
            .as_ref()
            .ok_or(Error::MissingInput("Please connect your wallet first"))
    }
}

pub struct Collaborators {
    pub generator: Arc<dyn TextGenerator>,
    pub service: Arc<dyn RebalanceService>,
    pub connector: Arc<dyn WalletConnector>,
}

/// Runs user actions against the collaborators allowed by its [`Mode`].
///
/// Missing input comes back as `Err`. Failed external calls are logged and
/// turned into an error [`Panel`] so the caller can render and carry on.
pub struct Controller {
    mode: Mode,
    prices: PriceTable,
    generator: Arc<dyn TextGenerator>,
    service: Arc<dyn RebalanceService>,
    connector: Arc<dyn WalletConnector>,
}

impl Controller {
    pub fn new(mode: Mode, prices: PriceTable, collaborators: Collaborators) -> Self {
        Self {
            mode,
            prices,
            generator: collaborators.generator,
            service: collaborators.service,
            connector: collaborators.connector,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn require(&self, mode: Mode) -> Result<()> {
        if self.mode != mode {
            return Err(Error::Unsupported(self.mode));
        }
        Ok(())
    }

    /// Connects the wallet and checks contract ownership. Returns the wallet panel.
    pub async fn connect(&self, session: &mut Session) -> Result<Panel> {
        self.require(Mode::Wallet)?;
        let connection = match self.connector.connect().await {
            Ok(connection) => connection,
            Err(e @ Error::MissingInput(_)) => return Err(e),
            Err(e) => {
                error!(error = %e, "Error connecting wallet");
                return Ok(Panel::new(
                    Region::Wallet,
                    Content::Error(format!("Failed to connect wallet: {e}")),
                ));
            }
        };
        let (address, balance) = (connection.address, connection.balance);
        session.wallet = Some(connection);
        session.is_owner = self.check_owner(session).await?;
        let content = Content::Wallet {
            address,
            balance,
            is_owner: session.is_owner,
        };
        Ok(Panel::new(Region::Wallet, content))
    }

    /// [`Controller::connect`] followed by portfolio and history refreshes.
    pub async fn connect_wallet(&self, session: &mut Session) -> Result<Vec<Panel>> {
        let wallet = self.connect(session).await?;
        if wallet.is_error() {
            return Ok(vec![wallet]);
        }
        Ok(vec![
            wallet,
            self.load_portfolio(session).await?,
            self.load_history(session).await?,
        ])
    }

    /// Whether the connected account owns the contract. Lookup failures count as no.
    pub async fn check_owner(&self, session: &Session) -> Result<bool> {
        self.require(Mode::Wallet)?;
        let connection = session.connection()?;
        match connection.contract.owner().await {
            Ok(owner) => Ok(owner == connection.address),
            Err(e) => {
                debug!(error = %e, "Could not check ownership");
                Ok(false)
            }
        }
    }

    pub async fn generate_strategy(
        &self,
        session: &mut Session,
        intent: &str,
        options: StrategyOptions,
    ) -> Result<Panel> {
        self.require(Mode::Wallet)?;
        let intent = intent.trim();
        if intent.is_empty() {
            return Err(Error::MissingInput("Please enter your rebalance intent"));
        }
        session.connection()?;

        let strategy = generate_strategy(self.generator.as_ref(), intent, options).await;
        session.current_strategy = Some(strategy.clone());
        Ok(Panel::new(Region::Strategy, Content::Strategy(strategy)))
    }

    /// Records the current strategy on-chain, then refreshes the history.
    pub async fn execute_strategy(&self, session: &Session) -> Result<Vec<Panel>> {
        self.require(Mode::Wallet)?;
        let Some(strategy) = session.current_strategy.as_ref() else {
            return Err(Error::MissingInput("No strategy to execute"));
        };
        let connection = session.connection()?;

        let submitted = create_on_chain(connection, strategy).await;
        match submitted {
            Ok(hash) => {
                info!(?hash, name = %strategy.name, "strategy created");
                Ok(vec![
                    Panel::new(
                        Region::Strategy,
                        Content::Notice(format!("Strategy created successfully! ({hash:?})")),
                    ),
                    self.load_history(session).await?,
                ])
            }
            Err(e) => {
                error!(error = %e, "Error executing strategy");
                Ok(vec![Panel::new(
                    Region::Strategy,
                    Content::Error(format!("Failed to execute strategy: {e}")),
                )])
            }
        }
    }

    pub fn discard_strategy(&self, session: &mut Session) -> Panel {
        session.current_strategy = None;
        Panel::new(Region::Strategy, Content::Notice("Strategy discarded".to_string()))
    }

    /// Triggers execution of a previously created strategy by its on-chain id.
    pub async fn run_strategy(&self, session: &Session, strategy_id: u64) -> Result<Vec<Panel>> {
        self.require(Mode::Wallet)?;
        let connection = session.connection()?;
        match connection.contract.execute_strategy(U256::from(strategy_id)).await {
            Ok(hash) => Ok(vec![
                Panel::new(
                    Region::History,
                    Content::Notice(format!("Strategy {strategy_id} executed ({hash:?})")),
                ),
                self.load_history(session).await?,
            ]),
            Err(e) => {
                error!(error = %e, strategy_id, "Error running strategy");
                Ok(vec![Panel::new(
                    Region::History,
                    Content::Error(format!("Failed to execute strategy: {e}")),
                )])
            }
        }
    }

    pub async fn load_portfolio(&self, session: &Session) -> Result<Panel> {
        self.require(Mode::Wallet)?;
        let connection = session.connection()?;
        let balances = async {
            let tokens = connection.contract.supported_tokens().await?;
            let mut balances = Vec::with_capacity(tokens.len());
            for token in tokens {
                let value = connection
                    .contract
                    .token_value(connection.address, token.address)
                    .await?;
                balances.push(TokenBalance {
                    symbol: token.symbol,
                    address: token.address,
                    value,
                });
            }
            Ok::<_, Error>(balances)
        };
        let content = match balances.await {
            Ok(balances) if balances.is_empty() => {
                Content::Notice("No tokens in portfolio".to_string())
            }
            Ok(balances) => Content::Portfolio(balances),
            Err(e) => {
                error!(error = %e, "Error loading portfolio");
                Content::Error("Failed to load portfolio".to_string())
            }
        };
        Ok(Panel::new(Region::Portfolio, content))
    }

    pub async fn portfolio_value(&self, session: &Session) -> Result<Panel> {
        self.require(Mode::Wallet)?;
        let connection = session.connection()?;
        let content = match connection.contract.portfolio_value(connection.address).await {
            Ok(value) => Content::PortfolioValue(value),
            Err(e) => {
                error!(error = %e, "Error computing portfolio value");
                Content::Error("Failed to load portfolio".to_string())
            }
        };
        Ok(Panel::new(Region::Portfolio, content))
    }

    pub async fn load_history(&self, session: &Session) -> Result<Panel> {
        self.require(Mode::Wallet)?;
        let connection = session.connection()?;
        let content = match connection.contract.user_strategies(connection.address).await {
            Ok(records) if records.is_empty() => {
                Content::Notice("No strategies executed yet".to_string())
            }
            Ok(records) => Content::History(records),
            Err(e) => {
                error!(error = %e, "Error loading strategy history");
                Content::Error("Failed to load strategy history".to_string())
            }
        };
        Ok(Panel::new(Region::History, content))
    }

    fn require_owner(&self, session: &Session) -> Result<()> {
        self.require(Mode::Wallet)?;
        session.connection()?;
        if !session.is_owner {
            return Err(Error::NotOwner);
        }
        Ok(())
    }

    pub async fn list_supported_tokens(&self, session: &Session) -> Result<Panel> {
        self.require(Mode::Wallet)?;
        let connection = session.connection()?;
        let content = match connection.contract.supported_tokens().await {
            Ok(tokens) if tokens.is_empty() => {
                Content::Notice("No supported tokens configured in contract yet.".to_string())
            }
            Ok(tokens) => Content::Tokens(tokens),
            Err(e) => {
                error!(error = %e, "Error checking tokens");
                Content::Error(format!("Error: {e}"))
            }
        };
        Ok(Panel::new(Region::Admin, content))
    }

    /// Registers the Sepolia token set, skipping tokens already supported.
    pub async fn initialize_default_tokens(&self, session: &Session) -> Result<Vec<Panel>> {
        self.require_owner(session)?;
        let connection = session.connection()?;
        let mut log = vec!["Initializing Sepolia testnet tokens...".to_string()];

        let outcome = async {
            for token in &SEPOLIA_TOKENS {
                log.push(format!("Processing {}...", token.name));
                let address = token.address();
                if connection.contract.is_supported_token(address).await? {
                    log.push(format!("{} already supported, skipping...", token.symbol));
                    continue;
                }
                log.push(format!("Adding {} to contract...", token.symbol));
                let hash = connection
                    .contract
                    .add_supported_token(address, token.symbol)
                    .await?;
                log.push(tx_line(hash));
                log.push(format!("{} added successfully!", token.symbol));
            }
            Ok::<_, Error>(())
        }
        .await;

        match outcome {
            Ok(()) => log.push("All Sepolia tokens initialized!".to_string()),
            Err(e) => {
                error!(error = %e, "Error initializing tokens");
                let message = e.to_string();
                log.push(format!("Error: {message}"));
                if message.contains("insufficient funds") {
                    log.push("Make sure you have enough Sepolia ETH for gas fees.".to_string());
                }
                return Ok(vec![Panel::new(Region::Admin, Content::Log(log))]);
            }
        }
        Ok(vec![
            Panel::new(Region::Admin, Content::Log(log)),
            self.load_portfolio(session).await?,
        ])
    }

    pub async fn add_token(
        &self,
        session: &Session,
        token: Address,
        symbol: &str,
    ) -> Result<Panel> {
        self.require_owner(session)?;
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(Error::MissingInput("Please enter a token symbol"));
        }
        let connection = session.connection()?;
        let content = match connection.contract.add_supported_token(token, symbol).await {
            Ok(hash) => Content::Log(vec![tx_line(hash), format!("{symbol} added successfully!")]),
            Err(e) => {
                error!(error = %e, symbol, "Error adding token");
                Content::Error(format!("Error: {e}"))
            }
        };
        Ok(Panel::new(Region::Admin, content))
    }

    pub async fn remove_token(&self, session: &Session, token: Address) -> Result<Panel> {
        self.require_owner(session)?;
        let connection = session.connection()?;
        let content = match connection.contract.remove_supported_token(token).await {
            Ok(hash) => Content::Log(vec![tx_line(hash), format!("{token:?} removed")]),
            Err(e) => {
                error!(error = %e, ?token, "Error removing token");
                Content::Error(format!("Error: {e}"))
            }
        };
        Ok(Panel::new(Region::Admin, content))
    }

    pub async fn generate_intent(&self, preset: &str) -> Result<Panel> {
        self.require(Mode::Server)?;
        let preset = preset.trim();
        if preset.is_empty() {
            return Err(Error::MissingInput("Please choose a strategy"));
        }
        let intent = match self.service.generate_intent(preset).await {
            Ok(Some(intent)) => intent,
            Ok(None) => "Intent generation failed.".to_string(),
            Err(e) => {
                error!(error = %e, "Error generating intent");
                "Error generating intent.".to_string()
            }
        };
        Ok(Panel::new(Region::Intent, Content::Intent(intent)))
    }

    /// Sends holdings and intent to the server, then values the returned plan.
    pub async fn rebalance(&self, portfolio: &str, intent: &str) -> Result<Panel> {
        self.require(Mode::Server)?;
        let (portfolio, intent) = (portfolio.trim(), intent.trim());
        if portfolio.is_empty() || intent.is_empty() {
            return Err(Error::MissingInput("Portfolio and intent are required."));
        }
        let request = RebalanceRequest {
            portfolio: portfolio.to_string(),
            intent: intent.to_string(),
            market_prices: self.prices.as_map().clone(),
        };
        let content = match self.service.rebalance(&request).await {
            Ok(response) => {
                let holdings = parse_portfolio(portfolio);
                Content::Rebalance(RebalanceReport::new(
                    response.analysis,
                    response.plan,
                    &holdings,
                    &self.prices,
                ))
            }
            Err(e) => {
                error!(error = %e, "Error rebalancing");
                Content::Error("Rebalancing failed.".to_string())
            }
        };
        Ok(Panel::new(Region::Analysis, content))
    }
}

async fn create_on_chain(connection: &WalletConnection, strategy: &Strategy) -> Result<H256> {
    let target_tokens = strategy
        .tokens
        .iter()
        .map(|t| token_address(&t.symbol))
        .collect();
    let target_percentages = strategy
        .tokens
        .iter()
        .map(|t| to_basis_points(t.percentage))
        .collect::<Result<Vec<_>>>()?;
    connection
        .contract
        .create_strategy(&strategy.name, target_tokens, target_percentages)
        .await
}

fn tx_line(hash: H256) -> String {
    format!("Transaction sent: https://sepolia.etherscan.io/tx/{hash:?}")
}
