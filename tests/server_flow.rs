mod common;

use std::sync::Arc;

use intent_rebalancer::{
    Usd,
    controller::{Content, Mode, Region, Session},
    error::Error,
    plan::{Analysis, PlanAction, PlanStep},
    server::RebalanceResponse,
};

use common::{MockService, server_controller};

fn response() -> RebalanceResponse {
    RebalanceResponse {
        analysis: Analysis {
            summary: "Too much ETH".to_string(),
            risk: "High".to_string(),
            rationale: "Move into stables".to_string(),
        },
        plan: vec![
            PlanStep {
                action: PlanAction::Sell,
                asset: "ETH".to_string(),
                percentage: 20.0,
            },
            PlanStep {
                action: PlanAction::Buy,
                asset: "USDC".to_string(),
                percentage: 80.0,
            },
        ],
    }
}

#[tokio::test]
async fn rebalance_values_plan_against_current_total() {
    let service = Arc::new(MockService {
        response: Some(response()),
        ..Default::default()
    });
    let controller = server_controller(service.clone());

    let panel = controller.rebalance("2 eth, 500 usdc", "reduce risk").await.unwrap();
    assert_eq!(panel.region, Region::Analysis);
    let Content::Rebalance(report) = &panel.content else {
        panic!("expected report, got {panel:?}");
    };
    assert_eq!(report.total, Usd(7500.0));
    assert_eq!(report.analysis.summary, "Too much ETH");
    assert_eq!(report.chart.before.labels, vec!["ETH", "USDC"]);
    assert_eq!(report.chart.before.values, vec![Usd(7000.0), Usd(500.0)]);
    assert_eq!(report.chart.after.labels, vec!["ETH", "USDC"]);
    assert_eq!(report.chart.after.values, vec![Usd(1500.0), Usd(6000.0)]);

    let requests = service.requests.lock().unwrap();
    assert_eq!(requests[0].portfolio, "2 eth, 500 usdc");
    assert_eq!(requests[0].intent, "reduce risk");
    assert_eq!(requests[0].market_prices["ETH"], 3500.0);
}

#[tokio::test]
async fn rebalance_needs_portfolio_and_intent() {
    let service = Arc::new(MockService::default());
    let controller = server_controller(service.clone());

    for (portfolio, intent) in [("", "reduce risk"), ("2 eth", "  ")] {
        let result = controller.rebalance(portfolio, intent).await;
        assert!(matches!(result, Err(Error::MissingInput("Portfolio and intent are required."))));
    }
    assert!(service.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn server_error_shows_rebalancing_failed() {
    let controller = server_controller(Arc::new(MockService::default()));
    let panel = controller.rebalance("2 eth", "reduce risk").await.unwrap();
    assert_eq!(panel.content, Content::Error("Rebalancing failed.".to_string()));
}

#[tokio::test]
async fn intent_is_shown_when_generated() {
    let controller = server_controller(Arc::new(MockService {
        intent: Some("Hold mostly blue chips".to_string()),
        ..Default::default()
    }));
    let panel = controller.generate_intent("Conservative").await.unwrap();
    assert_eq!(panel.region, Region::Intent);
    assert_eq!(panel.content, Content::Intent("Hold mostly blue chips".to_string()));
}

#[tokio::test]
async fn missing_intent_and_server_error_have_distinct_messages() {
    let empty = server_controller(Arc::new(MockService::default()));
    assert_eq!(
        empty.generate_intent("Balanced").await.unwrap().content,
        Content::Intent("Intent generation failed.".to_string())
    );

    let broken = server_controller(Arc::new(MockService {
        intent_fails: true,
        ..Default::default()
    }));
    assert_eq!(
        broken.generate_intent("Balanced").await.unwrap().content,
        Content::Intent("Error generating intent.".to_string())
    );
    assert!(matches!(
        broken.generate_intent("").await,
        Err(Error::MissingInput("Please choose a strategy"))
    ));
}

#[tokio::test]
async fn wallet_operations_are_unavailable_in_server_mode() {
    let controller = server_controller(Arc::new(MockService::default()));
    let mut session = Session::default();
    assert!(matches!(
        controller.connect_wallet(&mut session).await,
        Err(Error::Unsupported(Mode::Server))
    ));
    assert!(matches!(
        controller.load_history(&session).await,
        Err(Error::Unsupported(Mode::Server))
    ));
}
