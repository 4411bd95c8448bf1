use std::{io::Write, path::Path, sync::Arc};

use anyhow::{Context, bail};
use clap::{CommandFactory, Parser};
use ethers::types::Address;
use intent_rebalancer::{
    ai::{GeminiClient, StrategyOptions},
    config::Config,
    controller::{Collaborators, Content, Controller, Mode, Panel, Session},
    error::Error,
    render::{export_csv, render, write_chart_json},
    server::{HttpRebalanceService, INTENT_PRESETS},
    wallet::LocalWalletConnector,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::cli::{AdminAction, Command};

mod cli;

/// Loads the configuration and wires the real collaborators for `mode`.
fn build_controller(mode: Mode, config_path: Option<&Path>) -> anyhow::Result<Controller> {
    let config = Config::load(config_path)?;
    Ok(Controller::new(
        mode,
        config.prices.clone(),
        Collaborators {
            generator: Arc::new(GeminiClient::new(&config.gemini_model, &config.gemini_api_key)),
            service: Arc::new(HttpRebalanceService::new(&config.server_url)),
            connector: Arc::new(LocalWalletConnector {
                rpc_url: config.rpc_url.clone(),
                chain_id: config.chain_id,
                private_key: config.private_key.clone(),
                contract_address: config.contract_address,
            }),
        },
    ))
}

fn show(panels: &[Panel]) {
    for panel in panels {
        println!("{}", render(panel));
    }
}

fn parse_address(address: &str) -> anyhow::Result<Address> {
    address
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address {address:?}: {e}"))
}

/// Connects and displays the wallet. Fails when the connection did not succeed.
async fn connect(controller: &Controller, session: &mut Session) -> anyhow::Result<()> {
    let panel = controller.connect(session).await?;
    show(std::slice::from_ref(&panel));
    if panel.is_error() {
        bail!("wallet not connected");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli::Cli { config, command } = cli::Cli::parse();
    let config_path = config.as_deref();
    let mut session = Session::default();

    match command {
        Command::Wallet => {
            let controller = build_controller(Mode::Wallet, config_path)?;
            show(&controller.connect_wallet(&mut session).await?);
        }
        Command::Strategy {
            intent,
            market_analysis,
            risk_assessment,
            execute,
        } => {
            let controller = build_controller(Mode::Wallet, config_path)?;
            connect(&controller, &mut session).await?;
            let options = StrategyOptions {
                market_analysis,
                risk_assessment,
            };
            let panel = controller
                .generate_strategy(&mut session, &intent, options)
                .await?;
            show(&[panel]);
            if execute {
                show(&controller.execute_strategy(&session).await?);
            }
        }
        Command::Run { id } => {
            let controller = build_controller(Mode::Wallet, config_path)?;
            connect(&controller, &mut session).await?;
            show(&controller.run_strategy(&session, id).await?);
        }
        Command::Portfolio { total } => {
            let controller = build_controller(Mode::Wallet, config_path)?;
            connect(&controller, &mut session).await?;
            let panel = match total {
                true => controller.portfolio_value(&session).await?,
                false => controller.load_portfolio(&session).await?,
            };
            show(&[panel]);
        }
        Command::History => {
            let controller = build_controller(Mode::Wallet, config_path)?;
            connect(&controller, &mut session).await?;
            show(&[controller.load_history(&session).await?]);
        }
        Command::Intent { preset } => {
            if !INTENT_PRESETS.contains(&preset.as_str()) {
                warn!(%preset, "not one of the known presets");
            }
            let controller = build_controller(Mode::Server, config_path)?;
            show(&[controller.generate_intent(&preset).await?]);
        }
        Command::Rebalance {
            portfolio,
            intent,
            chart_json,
            export,
        } => {
            let controller = build_controller(Mode::Server, config_path)?;
            let panel = controller.rebalance(&portfolio, &intent).await?;
            show(std::slice::from_ref(&panel));
            if let Content::Rebalance(report) = &panel.content {
                if let Some(path) = chart_json {
                    write_chart_json(&path, report)?;
                }
                if let Some(path) = export {
                    export_csv(&path, report)?;
                }
            }
        }
        Command::Admin { action } => {
            let controller = build_controller(Mode::Wallet, config_path)?;
            connect(&controller, &mut session).await?;
            match action {
                AdminAction::Owner => {
                    let owner = controller.check_owner(&session).await?;
                    println!("Contract owner: {}", if owner { "yes" } else { "no" });
                }
                AdminAction::InitTokens => {
                    show(&controller.initialize_default_tokens(&session).await?)
                }
                AdminAction::Tokens => show(&[controller.list_supported_tokens(&session).await?]),
                AdminAction::Add { address, symbol } => {
                    let address = parse_address(&address)?;
                    show(&[controller.add_token(&session, address, &symbol).await?]);
                }
                AdminAction::Remove { address } => {
                    let address = parse_address(&address)?;
                    show(&[controller.remove_token(&session, address).await?]);
                }
            }
        }
        Command::Shell { mode } => {
            let controller = build_controller(mode, config_path)?;
            shell(&controller, &mut session).await?;
        }
        Command::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut cli::Cli::command(),
                "rebalancer",
                &mut std::io::stdout(),
            );
        }
    }
    Ok(())
}

const SHELL_HELP: &str = "\
commands:
  connect                      connect the wallet
  generate <intent>            generate a strategy
  execute                      record the current strategy on-chain
  discard                      drop the current strategy
  run <id>                     execute an on-chain strategy
  portfolio | history          refresh a display
  intent <preset>              ask the server for an intent
  rebalance <holdings> | <intent>
  quit";

async fn shell_command(
    controller: &Controller,
    session: &mut Session,
    line: &str,
) -> Result<Vec<Panel>, Error> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let panels = match command {
        "connect" => controller.connect_wallet(session).await?,
        "generate" => vec![
            controller
                .generate_strategy(session, rest, StrategyOptions::default())
                .await?,
        ],
        "execute" => controller.execute_strategy(session).await?,
        "discard" => vec![controller.discard_strategy(session)],
        "run" => {
            let id = rest
                .trim()
                .parse()
                .map_err(|_| Error::InvalidInput(format!("not a strategy id: {rest:?}")))?;
            controller.run_strategy(session, id).await?
        }
        "portfolio" => vec![controller.load_portfolio(session).await?],
        "history" => vec![controller.load_history(session).await?],
        "intent" => vec![controller.generate_intent(rest).await?],
        "rebalance" => {
            let (portfolio, intent) = rest.split_once('|').unwrap_or((rest, ""));
            vec![controller.rebalance(portfolio, intent).await?]
        }
        _ => {
            println!("{SHELL_HELP}");
            vec![]
        }
    };
    Ok(panels)
}

async fn shell(controller: &Controller, session: &mut Session) -> anyhow::Result<()> {
    println!("{} mode, type `help` for commands", controller.mode());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            _ => {}
        }
        match shell_command(controller, session, line).await {
            Ok(panels) => show(&panels),
            Err(e) => println!("{e}"),
        }
    }
    Ok(())
}
