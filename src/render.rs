use std::{collections::BTreeSet, fmt::Write, path::Path};

use anyhow::Context;
use chrono::DateTime;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use crate::{
    Usd,
    controller::{Content, Panel, Region},
    plan::RebalanceReport,
    strategy::Strategy,
    wallet::{format_eth, format_units_4, short_address},
};

#[derive(Tabled)]
struct AllocationRow {
    #[tabled(rename = "Token")]
    symbol: String,
    #[tabled(rename = "Target")]
    percentage: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

#[derive(Tabled)]
struct BalanceRow {
    #[tabled(rename = "Token")]
    symbol: String,
    #[tabled(rename = "Balance")]
    balance: String,
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Strategy")]
    name: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Status")]
    status: &'static str,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Target")]
    target: String,
}

#[derive(Tabled, Serialize)]
struct ValuationRow {
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Before")]
    before: String,
    #[tabled(rename = "After")]
    after: String,
}

fn table<T: Tabled>(rows: impl IntoIterator<Item = T>) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn heading(region: Region) -> &'static str {
    match region {
        Region::Wallet => "Wallet",
        Region::Strategy => "Strategy",
        Region::Portfolio => "Portfolio",
        Region::History => "Strategy History",
        Region::Admin => "Admin",
        Region::Intent => "Intent",
        Region::Analysis => "Rebalance",
    }
}

pub fn render(panel: &Panel) -> String {
    let body = match &panel.content {
        Content::Wallet {
            address,
            balance,
            is_owner,
        } => {
            let mut out = format!("{} ({})", short_address(address), format_eth(*balance));
            if *is_owner {
                out.push_str("\nConnected account owns the contract");
            }
            out
        }
        Content::Strategy(strategy) => render_strategy(strategy),
        Content::Portfolio(balances) => table(balances.iter().map(|b| BalanceRow {
            symbol: b.symbol.clone(),
            balance: format_units_4(b.value),
        })),
        Content::PortfolioValue(value) => format!("Total value: {}", format_units_4(*value)),
        Content::History(records) => table(records.iter().map(|r| HistoryRow {
            name: r.name.clone(),
            created: DateTime::from_timestamp(r.timestamp as i64, 0)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            status: if r.executed { "Executed" } else { "Pending" },
        })),
        Content::Tokens(tokens) => {
            let mut out = format!("Found {} supported tokens:", tokens.len());
            for token in tokens {
                let _ = write!(out, "\n  {}: {:?}", token.symbol, token.address);
            }
            out
        }
        Content::Intent(intent) => intent.clone(),
        Content::Rebalance(report) => render_report(report),
        Content::Log(lines) => lines.join("\n"),
        Content::Notice(text) => text.clone(),
        Content::Error(text) => format!("Error: {text}"),
    };
    format!("== {} ==\n{}\n", heading(panel.region), body)
}

fn render_strategy(strategy: &Strategy) -> String {
    let mut out = format!("{}\n", strategy.name);
    out.push_str(&table(strategy.tokens.iter().map(|t| AllocationRow {
        symbol: t.symbol.clone(),
        percentage: format!("{}%", t.percentage),
        reason: t.reason.clone(),
    })));
    let total = strategy.percentage_total();
    if total != 100.0 {
        let _ = write!(out, "\nWarning: allocation adds up to {total}%");
    }
    let _ = write!(
        out,
        "\n\nReasoning:\n{}\n\nRisk Assessment:\n{}\n\nExpected Outcome:\n{}",
        strategy.reasoning, strategy.risks, strategy.expected_outcome
    );
    out
}

fn valuation_rows(report: &RebalanceReport) -> Vec<ValuationRow> {
    let lookup = |labels: &[String], values: &[Usd], asset: &str| {
        labels
            .iter()
            .position(|l| l == asset)
            .map(|idx| values[idx].to_string())
            .unwrap_or_default()
    };
    let chart = &report.chart;
    let assets: BTreeSet<&String> = chart.before.labels.iter().chain(&chart.after.labels).collect();
    assets
        .into_iter()
        .map(|asset| ValuationRow {
            asset: asset.clone(),
            before: lookup(&chart.before.labels, &chart.before.values, asset),
            after: lookup(&chart.after.labels, &chart.after.values, asset),
        })
        .collect()
}

fn render_report(report: &RebalanceReport) -> String {
    let analysis = &report.analysis;
    let mut out = format!(
        "Summary: {}\nRisk: {}\nRationale: {}\n\n",
        analysis.summary, analysis.risk, analysis.rationale
    );
    out.push_str(&table(report.plan.iter().map(|step| PlanRow {
        action: step.action.to_string(),
        asset: step.asset.clone(),
        target: format!("{}%", step.percentage),
    })));
    let _ = write!(out, "\n\nPortfolio value: {}\n", report.total);
    out.push_str(&table(valuation_rows(report)));
    out
}

pub fn write_chart_json(path: &Path, report: &RebalanceReport) -> anyhow::Result<()> {
    let file =
        std::fs::File::create(path).with_context(|| format!("Failed to create file {path:?}"))?;
    serde_json::to_writer_pretty(file, &report.chart.to_chart_config())?;
    Ok(())
}

/// Before/after valuation as CSV, one row per asset.
pub fn export_csv(path: &Path, report: &RebalanceReport) -> anyhow::Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to create file {path:?}"))?;
    for row in valuation_rows(report) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
