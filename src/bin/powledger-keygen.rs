#![forbid(unsafe_code)]
use clap::Parser;
use colored::*;
use powledger::crypto::{KeyPair, Secp256k1Scheme};

/// Generates a secp256k1 key pair; the public key doubles as the wallet address.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Derive the address of an existing private key instead of generating one
    #[arg(long)]
    secret_key: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let scheme = Secp256k1Scheme::new();

    let keypair = match cli.secret_key {
        Some(secret_hex) => KeyPair::from_secret_hex(&scheme, &secret_hex)?,
        None => KeyPair::generate(&scheme),
    };

    println!("{}", "🔑 Key pair".bright_cyan().bold());
    println!();
    println!("{} {}", "Private key:".bright_yellow(), keypair.secret_hex());
    println!("{} {}", "Public key: ".bright_green(), keypair.address());

    Ok(())
}
