use std::{
    collections::HashMap,
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, anyhow};
use directories::ProjectDirs;
use ethers::types::Address;
use serde::Deserialize;
use tracing::debug;

use crate::{
    ai::DEFAULT_MODEL,
    contract::DEFAULT_CONTRACT_ADDRESS,
    portfolio::PriceTable,
    server::DEFAULT_SERVER_URL,
    wallet::{DEFAULT_RPC_URL, SEPOLIA_CHAIN_ID},
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ConfigFile {
    gemini_api_key: Option<String>,
    gemini_model: Option<String>,
    server_url: Option<String>,
    rpc_url: Option<String>,
    chain_id: Option<u64>,
    contract_address: Option<String>,
    private_key: Option<String>,
    prices: HashMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Sent to the AI endpoint as a query parameter.
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub server_url: String,
    pub rpc_url: String,
    pub chain_id: u64,
    pub contract_address: Address,
    pub private_key: Option<String>,
    pub prices: PriceTable,
}

impl Config {
    /// `path` must exist when given. Otherwise the per-user config file is read
    /// if present, and defaults are used if not.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let file = match path {
            Some(path) => read_file(path)?,
            None => match default_path() {
                Some(path) if path.exists() => read_file(&path)?,
                _ => ConfigFile::default(),
            },
        };
        Self::from_parts(file, |key| env::var(key).ok())
    }

    fn from_parts(file: ConfigFile, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let contract_address = file
            .contract_address
            .as_deref()
            .unwrap_or(DEFAULT_CONTRACT_ADDRESS)
            .parse::<Address>()
            .map_err(|e| anyhow!("Invalid contract address: {e}"))?;
        let mut prices = PriceTable::mock();
        prices.extend(file.prices);

        Ok(Self {
            gemini_api_key: var("GEMINI_API_KEY")
                .or(file.gemini_api_key)
                .unwrap_or_default(),
            gemini_model: file.gemini_model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            server_url: var("REBALANCER_SERVER_URL")
                .or(file.server_url)
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            rpc_url: var("REBALANCER_RPC_URL")
                .or(file.rpc_url)
                .unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            chain_id: file.chain_id.unwrap_or(SEPOLIA_CHAIN_ID),
            contract_address,
            private_key: var("WALLET_PRIVATE_KEY").or(file.private_key),
            prices,
        })
    }
}

pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "quotidian", "intent-rebalancer")
        .map(|pdirs| pdirs.config_dir().join("config.yml"))
}

fn read_file(path: &Path) -> anyhow::Result<ConfigFile> {
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open file {path:?}"))?;
    let parsed: ConfigFile = serde_yaml::from_reader(file)
        .with_context(|| format!("Failed to parse config file {path:?}"))?;
    debug!(?path, "loaded config file");
    Ok(parsed)
}
