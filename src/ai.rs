use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    strategy::{Strategy, parse_strategy},
};

pub const DEFAULT_MODEL: &str = "gemini-pro";

/// A generative-AI endpoint that turns one prompt into free text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyOptions {
    pub market_analysis: bool,
    pub risk_assessment: bool,
}

pub fn build_strategy_prompt(intent: &str, options: StrategyOptions) -> String {
    let market = match options.market_analysis {
        true => "Include current market analysis and trends.",
        false => "",
    };
    let risk = match options.risk_assessment {
        true => "Include risk assessment and mitigation strategies.",
        false => "",
    };
    format!(
        r#"As a crypto portfolio optimization expert, analyze the following rebalance intent and create an optimized portfolio strategy:

Intent: {intent}

{market}
{risk}

Please provide a JSON response with the following structure:
{{
    "name": "Strategy Name",
    "tokens": [
        {{"symbol": "USDC", "percentage": 30, "reason": "Stable store of value"}},
        {{"symbol": "ETH", "percentage": 40, "reason": "Blue chip crypto"}},
        {{"symbol": "BTC", "percentage": 30, "reason": "Digital gold"}}
    ],
    "reasoning": "Detailed reasoning...",
    "risks": "Risk assessment...",
    "expectedOutcome": "Expected results..."
}}

Only return valid JSON, no additional text."#
    )
}

/// Ask the generator for a strategy. Never fails: any problem along the way
/// yields [`Strategy::fallback`].
pub async fn generate_strategy(
    generator: &dyn TextGenerator,
    intent: &str,
    options: StrategyOptions,
) -> Strategy {
    let prompt = build_strategy_prompt(intent, options);
    let text = match generator.generate(&prompt).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "AI call failed, using fallback strategy");
            return Strategy::fallback();
        }
    };
    match parse_strategy(&text) {
        Ok(strategy) => strategy,
        Err(e) => {
            warn!(error = %e, "AI response rejected, using fallback strategy");
            Strategy::fallback()
        }
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub struct GeminiClient {
    client: reqwest::Client,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };
        let response = self.client.post(self.url()).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        let text = decode_generate_response(status, &body)?;
        debug!(len = text.len(), "received AI response");
        Ok(text)
    }
}

/// `candidates[0].content.parts[0].text` of a successful reply. A non-OK
/// reply carries `error.message`, or "Unknown error" when it has none.
fn decode_generate_response(status: StatusCode, body: &str) -> Result<String> {
    if !status.is_success() {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|e| e.error)
            .and_then(|e| e.message)
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(Error::Ai(message));
    }
    let parsed: GenerateContentResponse = serde_json::from_str(body)?;
    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| Error::Ai("Response contained no candidate text".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(Result<String>);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(Error::Ai("Gemini quota exhausted".to_string())),
            }
        }
    }

    #[test]
    fn prompt_lines_follow_options() {
        let plain = build_strategy_prompt("reduce risk", StrategyOptions::default());
        assert!(plain.contains("Intent: reduce risk"));
        assert!(!plain.contains("market analysis"));
        assert!(!plain.contains("risk assessment and mitigation"));

        let full = build_strategy_prompt(
            "reduce risk",
            StrategyOptions {
                market_analysis: true,
                risk_assessment: true,
            },
        );
        assert!(full.contains("Include current market analysis and trends."));
        assert!(full.contains("Include risk assessment and mitigation strategies."));
        assert!(full.contains(r#""expectedOutcome": "Expected results...""#));
    }

    #[test]
    fn non_ok_reply_carries_error_message() {
        let body =
            r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        let err = decode_generate_response(StatusCode::BAD_REQUEST, body).unwrap_err();
        assert!(matches!(err, Error::Ai(msg) if msg == "API key not valid"));
    }

    #[test]
    fn non_ok_reply_without_envelope_is_unknown_error() {
        for body in ["", "<html>502</html>", r#"{"error": {}}"#] {
            let err = decode_generate_response(StatusCode::BAD_GATEWAY, body).unwrap_err();
            assert!(matches!(err, Error::Ai(msg) if msg == "Unknown error"));
        }
    }

    #[test]
    fn reply_without_candidates_is_an_error() {
        for body in [
            r#"{}"#,
            r#"{"candidates": []}"#,
            r#"{"candidates": [{"content": {"parts": []}}]}"#,
        ] {
            let err = decode_generate_response(StatusCode::OK, body).unwrap_err();
            assert!(matches!(err, Error::Ai(_)));
        }
    }

    #[test]
    fn first_candidate_text_is_returned() {
        let body = r#"{"candidates": [
            {"content": {"parts": [{"text": "{\"name\": \"A\"}"}, {"text": "ignored"}]}},
            {"content": {"parts": [{"text": "second"}]}}
        ]}"#;
        let text = decode_generate_response(StatusCode::OK, body).unwrap();
        assert_eq!(text, r#"{"name": "A"}"#);
    }

    #[tokio::test]
    async fn non_ok_response_yields_fallback() {
        let generator = Canned(Err(Error::Ai(String::new())));
        let strategy =
            generate_strategy(&generator, "reduce risk", StrategyOptions::default()).await;
        assert_eq!(strategy, Strategy::fallback());
    }

    #[tokio::test]
    async fn unusable_text_yields_fallback() {
        let generator = Canned(Ok("I cannot help with that.".to_string()));
        let strategy = generate_strategy(&generator, "x", StrategyOptions::default()).await;
        assert_eq!(strategy.name, "Defensive Market Strategy");
    }

    #[tokio::test]
    async fn valid_text_is_used() {
        let generator = Canned(Ok(
            r#"Here: {"name": "Stable Yield", "tokens": [{"symbol": "DAI", "percentage": 100, "reason": "peg"}]}"#
                .to_string(),
        ));
        let strategy = generate_strategy(&generator, "x", StrategyOptions::default()).await;
        assert_eq!(strategy.name, "Stable Yield");
        assert_eq!(strategy.tokens[0].symbol, "DAI");
    }
}
