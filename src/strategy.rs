use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::{Percent, portfolio::parse_leading_float};

static JSON_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[\s\S]*\}").expect("static pattern compiles"));

/// One target share. Model output is loosely typed, so every field is read
/// leniently: missing text is empty and an unusable percentage is NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationTarget {
    #[serde(default, deserialize_with = "lenient_text")]
    pub symbol: String,
    #[serde(default = "unknown_percentage", deserialize_with = "lenient_percentage")]
    pub percentage: Percent,
    #[serde(default, deserialize_with = "lenient_text")]
    pub reason: String,
}

/// A named target allocation. Held only for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub name: String,
    #[serde(deserialize_with = "object_entries")]
    pub tokens: Vec<AllocationTarget>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub reasoning: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub risks: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub expected_outcome: String,
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    })
}

fn unknown_percentage() -> Percent {
    f64::NAN
}

/// Numbers, or strings with a numeric prefix such as `"40"` or `"40%"`.
fn lenient_percentage<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Percent, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(text) => parse_leading_float(text.trim()),
        _ => f64::NAN,
    })
}

/// Token entries that aren't objects are skipped.
fn object_entries<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<AllocationTarget>, D::Error> {
    Vec::<Value>::deserialize(deserializer)?
        .into_iter()
        .filter(Value::is_object)
        .map(|entry| serde_json::from_value(entry).map_err(D::Error::custom))
        .collect()
}

impl Strategy {
    /// Served whenever the AI response can't be used.
    pub fn fallback() -> Self {
        let target = |symbol: &str, percentage, reason: &str| AllocationTarget {
            symbol: symbol.to_string(),
            percentage,
            reason: reason.to_string(),
        };
        Self {
            name: "Defensive Market Strategy".to_string(),
            tokens: vec![
                target("USDC", 40.0, "Stable store of value during volatility"),
                target("ETH", 35.0, "Blue chip crypto with strong fundamentals"),
                target("BTC", 25.0, "Digital gold, hedge against inflation"),
            ],
            reasoning: "Given the current market volatility and your defensive stance, this allocation prioritizes stability while maintaining exposure to proven cryptocurrencies.".to_string(),
            risks: "Market risk remains present, but reduced through stablecoin allocation.".to_string(),
            expected_outcome: "Reduced portfolio volatility with maintained growth potential.".to_string(),
        }
    }

    /// Sum of the target percentages. Nothing forces this to be 100.
    pub fn percentage_total(&self) -> Percent {
        self.tokens.iter().map(|t| t.percentage).sum()
    }
}

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("No JSON object found in AI response")]
    NoJson,
    #[error("Failed to parse AI JSON response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Strategy has no name")]
    MissingName,
    #[error("Strategy tokens missing or not a list")]
    MissingTokens,
}

/// First greedy `{...}` region of `text`: from the first `{` to the last `}`.
///
/// Prose before and after the object is ignored. Stray braces ahead of the
/// payload are captured too, which makes the candidate fail to parse.
pub fn extract_json_candidate(text: &str) -> Option<&str> {
    JSON_OBJECT.find(text).map(|m| m.as_str())
}

/// Untyped view of the candidate, checked before committing to `Strategy`.
struct StrategyBuilder(Value);

impl StrategyBuilder {
    fn validate(&self) -> Result<(), StrategyError> {
        match self.0.get("name").and_then(|v| v.as_str()) {
            Some(name) if !name.is_empty() => {}
            _ => return Err(StrategyError::MissingName),
        }
        if !self.0.get("tokens").is_some_and(|v| v.is_array()) {
            return Err(StrategyError::MissingTokens);
        }
        Ok(())
    }

    fn build(self) -> Result<Strategy, StrategyError> {
        self.try_into()
    }
}

impl TryFrom<StrategyBuilder> for Strategy {
    type Error = StrategyError;

    fn try_from(builder: StrategyBuilder) -> Result<Self, Self::Error> {
        builder.validate()?;
        Ok(serde_json::from_value(builder.0)?)
    }
}

pub fn parse_strategy(text: &str) -> Result<Strategy, StrategyError> {
    let candidate = extract_json_candidate(text).ok_or(StrategyError::NoJson)?;
    let value: Value = serde_json::from_str(candidate)?;
    let strategy = StrategyBuilder(value).build()?;
    debug!(?strategy, "parsed strategy");
    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"name": "Growth", "tokens": [{"symbol": "ETH", "percentage": 60, "reason": "L1"}, {"symbol": "SOL", "percentage": 40}], "reasoning": "r", "risks": "k", "expectedOutcome": "o"}"#;

    #[test]
    fn accepts_json_surrounded_by_prose() {
        let text = format!("Sure! Here is your strategy:\n```json\n{VALID}\n```\nGood luck.");
        let strategy = parse_strategy(&text).unwrap();
        assert_eq!(strategy.name, "Growth");
        assert_eq!(strategy.tokens.len(), 2);
        assert_eq!(strategy.tokens[1].reason, "");
        assert_eq!(strategy.expected_outcome, "o");
    }

    #[test]
    fn optional_texts_default_to_empty() {
        let strategy = parse_strategy(r#"{"name": "Bare", "tokens": []}"#).unwrap();
        assert!(strategy.tokens.is_empty());
        assert_eq!(strategy.reasoning, "");
        assert_eq!(strategy.risks, "");
    }

    #[test]
    fn numeric_string_percentages_are_read() {
        let strategy = parse_strategy(
            r#"{"name": "X", "tokens": [{"symbol": "ETH", "percentage": "40"}, {"symbol": "BTC", "percentage": " 60% "}]}"#,
        )
        .unwrap();
        assert_eq!(strategy.tokens[0].percentage, 40.0);
        assert_eq!(strategy.tokens[1].percentage, 60.0);
    }

    #[test]
    fn unusable_percentages_are_nan() {
        let strategy = parse_strategy(
            r#"{"name": "X", "tokens": [{"symbol": "ETH"}, {"symbol": "BTC", "percentage": "lots"}, {"symbol": "SOL", "percentage": null}]}"#,
        )
        .unwrap();
        assert!(strategy.tokens.iter().all(|t| t.percentage.is_nan()));
    }

    #[test]
    fn null_texts_are_empty() {
        let strategy = parse_strategy(
            r#"{"name": "X", "tokens": [{"symbol": null, "percentage": 100, "reason": null}], "risks": null, "reasoning": 42}"#,
        )
        .unwrap();
        assert_eq!(strategy.risks, "");
        assert_eq!(strategy.reasoning, "42");
        assert_eq!(strategy.tokens[0].symbol, "");
        assert_eq!(strategy.tokens[0].reason, "");
    }

    #[test]
    fn non_object_token_entries_are_skipped() {
        let strategy = parse_strategy(
            r#"{"name": "X", "tokens": [1, "ETH", null, {"symbol": "DAI", "percentage": 100}]}"#,
        )
        .unwrap();
        assert_eq!(strategy.tokens.len(), 1);
        assert_eq!(strategy.tokens[0].symbol, "DAI");

        let empty = parse_strategy(r#"{"name": "X", "tokens": [1, 2]}"#).unwrap();
        assert!(empty.tokens.is_empty());
    }

    #[test]
    fn candidate_spans_first_to_last_brace() {
        let text = "a {x} b {y} c";
        assert_eq!(extract_json_candidate(text), Some("{x} b {y}"));
        assert_eq!(extract_json_candidate("no braces"), None);
    }

    #[test]
    fn leading_braces_before_payload_fail() {
        let text = format!("Note {{draft}} then {VALID}");
        assert!(matches!(parse_strategy(&text), Err(StrategyError::Parse(_))));
    }

    #[test]
    fn truncated_response_fails() {
        let truncated = &VALID[..VALID.len() - 20];
        assert!(parse_strategy(truncated).is_err());
        assert!(matches!(parse_strategy(r#"{"name": "Cut", "tokens": ["#), Err(StrategyError::NoJson)));
    }

    #[test]
    fn rejects_missing_or_empty_name() {
        assert!(matches!(parse_strategy(r#"{"tokens": []}"#), Err(StrategyError::MissingName)));
        assert!(matches!(
            parse_strategy(r#"{"name": "", "tokens": []}"#),
            Err(StrategyError::MissingName)
        ));
    }

    #[test]
    fn rejects_missing_or_non_list_tokens() {
        assert!(matches!(parse_strategy(r#"{"name": "x"}"#), Err(StrategyError::MissingTokens)));
        assert!(matches!(
            parse_strategy(r#"{"name": "x", "tokens": {"ETH": 50}}"#),
            Err(StrategyError::MissingTokens)
        ));
    }

    #[test]
    fn fallback_is_the_defensive_allocation() {
        let fallback = Strategy::fallback();
        assert_eq!(fallback.name, "Defensive Market Strategy");
        let allocation: Vec<(&str, Percent)> = fallback
            .tokens
            .iter()
            .map(|t| (t.symbol.as_str(), t.percentage))
            .collect();
        assert_eq!(allocation, vec![("USDC", 40.0), ("ETH", 35.0), ("BTC", 25.0)]);
        assert_eq!(fallback.percentage_total(), 100.0);
    }

    #[test]
    fn percentages_are_not_normalized() {
        let strategy = parse_strategy(
            r#"{"name": "Lopsided", "tokens": [{"symbol": "ETH", "percentage": 70}, {"symbol": "BTC", "percentage": 70}]}"#,
        )
        .unwrap();
        assert_eq!(strategy.percentage_total(), 140.0);
    }
}
