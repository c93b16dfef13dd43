#![forbid(unsafe_code)]

use colored::*;

fn main() {
    println!("{}", "powledger CLI".bright_cyan().bold());
    println!("{}", "-------------".bright_cyan());
    println!();
    println!(
        "{}",
        "This is the main entry point, but functionality lives in separate binaries.".yellow()
    );
    println!(
        "{}",
        "Use 'cargo run --bin <binary_name>' to run a specific command.".yellow()
    );
    println!();
    println!("{}", "Available binaries:".bright_green().underline());
    println!("  - {}", "powledger-keygen".bright_white());
    println!("  - {}", "powledger-demo".bright_white());
    println!();
    println!("{}", "Example:".bright_green().underline());
    println!("{}", "  cargo run --release --bin powledger-demo -- --difficulty 4".italic());
}
