use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Usd;

/// Quantity held per upper-cased symbol.
pub type Holdings = BTreeMap<String, f64>;

/// Parse a holdings string like `"1.5 eth, 100 usdc"`.
///
/// Entries that don't split into exactly an amount and a symbol are dropped.
/// A repeated symbol overwrites the earlier amount.
pub fn parse_portfolio(text: &str) -> Holdings {
    let mut holdings = Holdings::new();
    for entry in text.split(',') {
        let parts: Vec<&str> = entry.split_whitespace().collect();
        let [amount, symbol] = parts.as_slice() else {
            debug!(entry, "dropping malformed holding");
            continue;
        };
        holdings.insert(symbol.to_uppercase(), parse_leading_float(amount));
    }
    debug!(?holdings, "parsed portfolio");
    holdings
}

/// Longest numeric prefix of `s`, or NaN when there is none.
///
/// Only a literal `Infinity` spells infinity. Rust's other spellings such as
/// `inf` or `NaN` are not numbers here.
pub(crate) fn parse_leading_float(s: &str) -> f64 {
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    if unsigned.starts_with("Infinity") {
        let sign = if s.starts_with('-') { -1.0 } else { 1.0 };
        return sign * f64::INFINITY;
    }
    if !unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return f64::NAN;
    }
    let mut end = s.len();
    while end > 0 {
        if let Ok(val) = s[..end].parse::<f64>() {
            return val;
        }
        end = s[..end]
            .char_indices()
            .next_back()
            .map(|(idx, _)| idx)
            .unwrap_or(0);
    }
    f64::NAN
}

/// Unit prices used for display-side valuation. Not authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceTable {
    prices: HashMap<String, f64>,
}

impl PriceTable {
    pub fn new(prices: HashMap<String, f64>) -> Self {
        Self {
            prices: prices
                .into_iter()
                .map(|(sym, price)| (sym.to_uppercase(), price))
                .collect(),
        }
    }

    /// The fixed demo price list sent along with rebalance requests.
    pub fn mock() -> Self {
        let prices = [
            ("BTC", 68000.0),
            ("ETH", 3500.0),
            ("SOL", 150.0),
            ("ADA", 0.45),
            ("AVAX", 35.0),
            ("DOT", 7.0),
            ("LINK", 18.0),
            ("MATIC", 0.7),
            ("XRP", 0.5),
            ("DOGE", 0.15),
            ("USDC", 1.0),
            ("USDT", 1.0),
            ("DAI", 1.0),
            ("RNDR", 10.0),
            ("TAO", 400.0),
            ("FET", 2.2),
            ("AAVE", 90.0),
            ("UNI", 10.0),
            ("LDO", 2.3),
        ];
        Self {
            prices: prices
                .into_iter()
                .map(|(sym, price)| (sym.to_string(), price))
                .collect(),
        }
    }

    /// Unknown symbols are priced at zero.
    pub fn price(&self, symbol: &str) -> f64 {
        self.prices.get(symbol).copied().unwrap_or(0.0)
    }

    /// Later entries replace existing prices.
    pub fn extend(&mut self, overrides: HashMap<String, f64>) {
        self.prices.extend(
            overrides
                .into_iter()
                .map(|(sym, price)| (sym.to_uppercase(), price)),
        );
    }

    pub fn as_map(&self) -> &HashMap<String, f64> {
        &self.prices
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::mock()
    }
}

pub fn total_value(holdings: &Holdings, prices: &PriceTable) -> Usd {
    holdings
        .iter()
        .map(|(symbol, amount)| Usd(amount * prices.price(symbol)))
        .sum()
}

pub fn value_by_asset(holdings: &Holdings, prices: &PriceTable) -> BTreeMap<String, Usd> {
    holdings
        .iter()
        .map(|(symbol, amount)| (symbol.clone(), Usd(amount * prices.price(symbol))))
        .collect()
}
