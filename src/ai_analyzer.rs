//! Plain-language strategy commentary from an OpenRouter chat model.

use std::{fmt::Write as _, time::Duration};

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::AiCfg;
use crate::types::{Strategy, StrategyMetrics};
use crate::utils::mask_secret;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("OpenRouter rejected the API key")]
    InvalidApiKey,
    #[error("OpenRouter returned HTTP {0}")]
    Http(u16),
    #[error("analysis request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("OpenRouter error: {0}")]
    Api(String),
    #[error("unusable analysis response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyAnalysis {
    pub interpretation: String,
    pub market_outlook: String,
    pub risk_warning: String,
}

pub struct AiAnalyzer {
    client: reqwest::Client,
    cfg: AiCfg,
    api_key: String,
}

impl AiAnalyzer {
    pub fn new(cfg: &AiCfg, api_key: impl Into<String>) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_sec))
            .build()?;
        let api_key = api_key.into();
        info!(
            "AI analyzer ready: model={}, key={}",
            cfg.model,
            mask_secret(&api_key)
        );
        Ok(Self {
            client,
            cfg: cfg.clone(),
            api_key,
        })
    }

    pub async fn analyze_strategy(
        &self,
        strategy: &Strategy,
        metrics: &StrategyMetrics,
        current_price: Decimal,
    ) -> Result<StrategyAnalysis, AnalysisError> {
        let prompt = format_analysis_prompt(strategy, metrics, current_price);
        debug!("analysis prompt:\n{}", prompt);
        let body = json!({
            "model": self.cfg.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are an options trading educator. Answer with JSON only."
                },
                { "role": "user", "content": prompt }
            ],
            "temperature": self.cfg.temperature,
            "max_tokens": self.cfg.max_tokens,
        });

        let resp = self
            .client
            .post(&self.cfg.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AnalysisError::InvalidApiKey);
        }
        if !status.is_success() {
            return Err(AnalysisError::Http(status.as_u16()));
        }
        let v: Value = resp.json().await?;
        if let Some(err) = v.get("error") {
            let msg = err
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(AnalysisError::Api(msg));
        }
        let content = v
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| AnalysisError::InvalidResponse("no message content".into()))?;
        let analysis = parse_analysis_response(content)?;
        info!("Received analysis for {}", strategy.underlying_symbol());
        Ok(analysis)
    }
}

pub fn format_analysis_prompt(
    strategy: &Strategy,
    metrics: &StrategyMetrics,
    current_price: Decimal,
) -> String {
    let mut p = String::new();
    let _ = writeln!(
        p,
        "Analyze this options strategy on {} (current price ${:.2}, expiring {}).",
        strategy.underlying_symbol(),
        current_price,
        strategy.expiration()
    );
    p.push_str("Legs:\n");
    for leg in strategy.legs() {
        let c = leg.contract();
        let _ = writeln!(
            p,
            "- {} {} {} ${:.2} strike (bid ${:.2}, ask ${:.2})",
            leg.action(),
            leg.quantity(),
            c.option_type(),
            c.strike(),
            c.bid(),
            c.ask()
        );
    }
    let premium_kind = if metrics.is_credit() { "credit" } else { "debit" };
    let _ = writeln!(
        p,
        "Net premium: ${:.2} ({})",
        metrics.net_premium(),
        premium_kind
    );
    let _ = writeln!(p, "Max profit: {}", metrics.max_profit_bound());
    let _ = writeln!(p, "Max loss: {}", metrics.max_loss_bound());
    let breakevens: Vec<String> = metrics
        .breakeven_points()
        .iter()
        .map(|b| format!("${:.2}", b))
        .collect();
    let _ = writeln!(p, "Breakeven: {}", breakevens.join(", "));
    p.push_str(
        "\nRespond with a JSON object with exactly these string keys: \
         \"interpretation\" (what the position is and how it makes money), \
         \"market_outlook\" (the view it expresses), \
         \"risk_warning\" (the main risks). Keep each under three sentences.",
    );
    p
}

/// Parse the model's JSON answer, tolerating a surrounding code fence.
pub fn parse_analysis_response(content: &str) -> Result<StrategyAnalysis, AnalysisError> {
    let mut s = content.trim();
    if let Some(rest) = s.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        s = rest.strip_suffix("```").unwrap_or(rest).trim();
    }
    serde_json::from_str(s).map_err(|e| AnalysisError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::calculate_strategy_metrics;
    use crate::types::fixtures::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ANSWER: &str = r#"{"interpretation":"A bull call spread.","market_outlook":"Moderately bullish.","risk_warning":"Loses the debit below 145."}"#;

    fn analyzer(server: &MockServer) -> AiAnalyzer {
        let cfg = AiCfg {
            base_url: format!("{}/api/v1/chat/completions", server.uri()),
            ..AiCfg::default()
        };
        AiAnalyzer::new(&cfg, "sk-test").unwrap()
    }

    fn completion(content: &str) -> Value {
        json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
    }

    #[test]
    fn prompt_lists_legs_and_metrics() {
        let s = bull_call_spread();
        let m = calculate_strategy_metrics(&s).unwrap();
        let p = format_analysis_prompt(&s, &m, dec!(150));
        assert!(p.contains("NVDA"));
        assert!(p.contains("$150.00"));
        assert!(p.contains("- buy 1 call $145.00 strike (bid $12.00, ask $12.20)"));
        assert!(p.contains("- sell 1 call $155.00 strike"));
        assert!(p.contains("Net premium: $-540.00 (debit)"));
        assert!(p.contains("Max profit: $460.00"));
        assert!(p.contains("Max loss: $540.00"));
        assert!(p.contains("Breakeven: $150.40"));
        assert!(p.contains("risk_warning"));
    }

    #[test]
    fn prompt_marks_unlimited_profit() {
        let s = long_call();
        let m = calculate_strategy_metrics(&s).unwrap();
        let p = format_analysis_prompt(&s, &m, dec!(150));
        assert!(p.contains("Max profit: unlimited"));
        assert!(p.contains("Breakeven: $158.70"));
    }

    #[test]
    fn response_parsing_handles_fences() {
        let plain = parse_analysis_response(ANSWER).unwrap();
        assert_eq!(plain.market_outlook, "Moderately bullish.");
        let fenced = parse_analysis_response(&format!("```json\n{}\n```", ANSWER)).unwrap();
        assert_eq!(fenced, plain);
        let bare_fence = parse_analysis_response(&format!("```\n{}\n```", ANSWER)).unwrap();
        assert_eq!(bare_fence, plain);
    }

    #[test]
    fn response_missing_keys_is_invalid() {
        assert!(matches!(
            parse_analysis_response(r#"{"interpretation":"x"}"#),
            Err(AnalysisError::InvalidResponse(_))
        ));
        assert!(parse_analysis_response("not json").is_err());
    }

    #[tokio::test]
    async fn analyze_posts_chat_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "temperature": 0.3, "max_tokens": 300 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(ANSWER)))
            .expect(1)
            .mount(&server)
            .await;

        let s = bull_call_spread();
        let m = calculate_strategy_metrics(&s).unwrap();
        let a = analyzer(&server)
            .analyze_strategy(&s, &m, dec!(150))
            .await
            .unwrap();
        assert_eq!(a.interpretation, "A bull call spread.");
    }

    #[tokio::test]
    async fn unauthorized_maps_to_invalid_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let s = long_call();
        let m = calculate_strategy_metrics(&s).unwrap();
        let err = analyzer(&server)
            .analyze_strategy(&s, &m, dec!(150))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidApiKey));
    }

    #[tokio::test]
    async fn server_errors_and_api_errors_are_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        let s = long_call();
        let m = calculate_strategy_metrics(&s).unwrap();
        assert!(matches!(
            analyzer(&server).analyze_strategy(&s, &m, dec!(150)).await,
            Err(AnalysisError::Http(502))
        ));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "error": { "message": "model not found" } })),
            )
            .mount(&server)
            .await;
        match analyzer(&server).analyze_strategy(&s, &m, dec!(150)).await {
            Err(AnalysisError::Api(msg)) => assert_eq!(msg, "model not found"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
