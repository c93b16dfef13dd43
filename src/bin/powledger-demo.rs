#![forbid(unsafe_code)]
use clap::Parser;
use colored::*;
use comfy_table::{presets::UTF8_FULL, Table};
use indicatif::{ProgressBar, ProgressStyle};
use powledger::blockchain::Blockchain;
use powledger::config::load_config;
use powledger::crypto::{Address, KeyPair, Secp256k1Scheme};
use powledger::node::LedgerNode;
use powledger::transaction::{Amount, Transaction};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::Level;

/// Signs a transfer, mines it, and prints the resulting ledger.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    /// Hex private key of the sender; a fresh key is generated when omitted
    #[arg(long)]
    secret_key: Option<String>,
    /// Recipient address
    #[arg(long, default_value = "address2")]
    to: String,
    /// Amount to send
    #[arg(long, default_value_t = 30)]
    amount: Amount,
    /// Override the configured difficulty
    #[arg(long)]
    difficulty: Option<u32>,
    /// Print the chain as JSON after mining
    #[arg(long)]
    json: bool,
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut config = load_config(&cli.config)?;
    if let Some(difficulty) = cli.difficulty {
        config.ledger.difficulty = difficulty;
    }

    let scheme = Secp256k1Scheme::new();
    let keypair = match &cli.secret_key {
        Some(secret_hex) => KeyPair::from_secret_hex(&scheme, secret_hex)?,
        None => KeyPair::generate(&scheme),
    };
    let my_address = keypair.address();
    let reward_address = config
        .miner
        .beneficiary_address
        .clone()
        .map(Address::from)
        .unwrap_or_else(|| my_address.clone());

    let chain = Blockchain::from_config(&config.ledger)?;
    let node = LedgerNode::with_progress_interval(chain, config.miner.progress_interval);

    println!("{}", "⛓️  powledger demo".bright_cyan().bold());
    println!("Wallet:     {}", my_address.short().bright_white());
    println!("Difficulty: {}", config.ledger.difficulty);
    println!();

    let mut tx = Transaction::new(my_address.clone(), Address::new(cli.to.clone()), cli.amount);
    tx.sign(&scheme, &keypair.secret_key)?;
    node.add_transaction(tx)?;
    println!("{} {} -> {} ({})", "✅ Submitted".bright_green(), my_address.short(), cli.to, cli.amount);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    spinner.set_message("start mining...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let started = Instant::now();
    let handle = node.spawn_miner(reward_address.clone())?;
    while !handle.is_finished() {
        if let Ok(progress) = handle.progress().recv_timeout(Duration::from_millis(100)) {
            spinner.set_message(format!("mining... {} hashes tried", progress.attempts));
        }
    }
    let block = handle.join()?;
    let elapsed = Duration::from_millis(started.elapsed().as_millis() as u64);
    spinner.finish_with_message(format!(
        "⛏️  block mined in {} (nonce {})",
        humantime::format_duration(elapsed),
        block.nonce
    ));
    println!();

    println!(
        "Balance of {} is: {}",
        my_address.short().bright_yellow(),
        node.balance_of(&my_address)
    );
    println!(
        "Balance of {} is: {}",
        cli.to.bright_yellow(),
        node.balance_of(&Address::new(cli.to.clone()))
    );
    if reward_address != my_address {
        println!(
            "Balance of {} is: {}",
            reward_address.short().bright_yellow(),
            node.balance_of(&reward_address)
        );
    }
    println!();

    let chain = node.read();
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Hash", "Previous", "Nonce", "Txs"]);
    for (height, block) in chain.blocks().iter().enumerate() {
        table.add_row(vec![
            height.to_string(),
            block.hash_str(),
            hex::encode(block.previous_hash),
            block.nonce.to_string(),
            block.transactions.len().to_string(),
        ]);
    }
    println!("{table}");

    let valid = chain.is_valid()?;
    if valid {
        println!("{}", "Chain is valid".bright_green());
    } else {
        println!("{}", "Chain is INVALID".bright_red().bold());
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(chain.blocks())?);
    }

    Ok(())
}
