use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    Percent, Usd,
    portfolio::{Holdings, PriceTable, total_value, value_by_asset},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanAction {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for PlanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PlanAction::Buy => "BUY",
            PlanAction::Sell => "SELL",
            PlanAction::Hold => "HOLD",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub action: PlanAction,
    pub asset: String,
    /// Target share of the portfolio after rebalancing.
    pub percentage: Percent,
}

pub type RebalancePlan = Vec<PlanStep>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub risk: String,
    #[serde(default)]
    pub rationale: String,
}

/// Value each plan asset should hold after rebalancing.
///
/// Percentages are taken relative to `total`, the value of the portfolio
/// *before* any trade. They are used as given: a plan that doesn't add up to
/// 100% produces an after-total different from `total`. A repeated asset
/// keeps its last percentage.
pub fn after_values(plan: &[PlanStep], total: Usd) -> BTreeMap<String, Usd> {
    plan.iter()
        .map(|step| (step.asset.clone(), total * (step.percentage / 100.0)))
        .collect()
}

const PALETTE: [&str; 10] = [
    "#6366F1", "#8B5CF6", "#EC4899", "#F59E0B", "#10B981", "#3B82F6", "#EF4444", "#6B7280",
    "#F97316", "#0EA5E9",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartDataset {
    pub labels: Vec<String>,
    pub values: Vec<Usd>,
}

impl ChartDataset {
    pub fn from_values(values: &BTreeMap<String, Usd>) -> Self {
        Self {
            labels: values.keys().cloned().collect(),
            values: values.values().copied().collect(),
        }
    }

    pub fn total(&self) -> Usd {
        self.values.iter().copied().sum()
    }

    /// Doughnut chart document for a JS charting front-end.
    pub fn to_chart_config(&self) -> serde_json::Value {
        json!({
            "type": "doughnut",
            "data": {
                "labels": self.labels,
                "datasets": [{
                    "data": self.values.iter().map(|v| v.0).collect::<Vec<_>>(),
                    "backgroundColor": PALETTE,
                    "borderColor": "#1F2937",
                    "borderWidth": 2,
                }]
            },
            "options": {
                "plugins": { "legend": { "display": false } },
                "responsive": true,
                "maintainAspectRatio": false,
            }
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AllocationChart {
    pub before: ChartDataset,
    pub after: ChartDataset,
}

impl AllocationChart {
    pub fn build(holdings: &Holdings, prices: &PriceTable, plan: &[PlanStep]) -> Self {
        let total = total_value(holdings, prices);
        Self {
            before: ChartDataset::from_values(&value_by_asset(holdings, prices)),
            after: ChartDataset::from_values(&after_values(plan, total)),
        }
    }

    pub fn to_chart_config(&self) -> serde_json::Value {
        json!({
            "before": self.before.to_chart_config(),
            "after": self.after.to_chart_config(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebalanceReport {
    pub analysis: Analysis,
    pub plan: RebalancePlan,
    pub total: Usd,
    pub chart: AllocationChart,
}

impl RebalanceReport {
    pub fn new(
        analysis: Analysis,
        plan: RebalancePlan,
        holdings: &Holdings,
        prices: &PriceTable,
    ) -> Self {
        let chart = AllocationChart::build(holdings, prices, &plan);
        Self {
            analysis,
            total: total_value(holdings, prices),
            plan,
            chart,
        }
    }
}
