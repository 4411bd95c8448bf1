use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use intent_rebalancer::controller::Mode;

#[derive(Parser, Debug)]
#[command(version, about = "AI-assisted crypto portfolio rebalancing")]
pub(crate) struct Cli {
    #[arg(short, long, global = true, help = "Configuration file")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Connect the configured wallet and show balances and history
    Wallet,
    /// Generate a target allocation from a free-text intent
    Strategy {
        #[arg(help = "Rebalance intent, e.g. \"reduce risk\"")]
        intent: String,
        #[arg(long, help = "Ask for current market analysis and trends")]
        market_analysis: bool,
        #[arg(long, help = "Ask for risk assessment and mitigation strategies")]
        risk_assessment: bool,
        #[arg(short, long, help = "Record the generated strategy on-chain")]
        execute: bool,
    },
    /// Execute a previously created on-chain strategy
    Run {
        #[arg(help = "Strategy id")]
        id: u64,
    },
    /// Show token balances tracked by the contract
    Portfolio {
        #[arg(long, help = "Show the contract's total portfolio value instead")]
        total: bool,
    },
    /// List strategies created by the connected account
    History,
    /// Ask the server for an investment intent
    Intent {
        #[arg(default_value = "Balanced", help = "Strategy preset")]
        preset: String,
    },
    /// Ask the server for a rebalancing plan
    Rebalance {
        #[arg(short, long, help = "Holdings, e.g. \"2 eth, 500 usdc\"")]
        portfolio: String,
        #[arg(short, long, help = "Rebalance intent")]
        intent: String,
        #[arg(long, help = "Write before/after doughnut chart configs as JSON")]
        chart_json: Option<PathBuf>,
        #[arg(long, help = "Write before/after valuation as CSV")]
        export: Option<PathBuf>,
    },
    /// Contract owner tools
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Interactive session that keeps the generated strategy between commands
    Shell {
        #[arg(short, long, value_enum, default_value_t = Mode::Wallet, help = "Session mode")]
        mode: Mode,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum AdminAction {
    /// Show whether the connected account owns the contract
    Owner,
    /// Register the default Sepolia tokens
    InitTokens,
    /// List supported tokens
    Tokens,
    /// Register a supported token
    Add { address: String, symbol: String },
    /// Remove a supported token
    Remove { address: String },
}
