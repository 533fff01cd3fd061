//! Admin tool for operating the control plane outside the HTTP API:
//! running migrations, seeding principals, and adjusting credit
//! balances directly against Postgres.

use std::env;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use orchestrator_core::ledger;
use orchestrator_core::models::Role;
use orchestrator_core::store::PgStore;
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "orchestrator-cli", about = "Admin tool for the iteration orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run pending database migrations.
    Migrate,
    /// Create a principal with an initial credit balance.
    Seed {
        #[arg(long)]
        email: String,
        #[arg(long, value_enum, default_value_t = RoleArg::Free)]
        role: RoleArg,
        #[arg(long, default_value = "0")]
        credits: Decimal,
    },
    /// Grant additional credits to an existing principal.
    Grant {
        #[arg(long)]
        principal: Uuid,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value = "admin grant")]
        description: String,
    },
    /// Print a principal's balance and recent transactions.
    Wallet {
        #[arg(long)]
        principal: Uuid,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Free,
    Pro,
    Enterprise,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Free => Role::Free,
            RoleArg::Pro => Role::Pro,
            RoleArg::Enterprise => Role::Enterprise,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "command failed");
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let database_url = env::var("DATABASE_URL").map_err(|_| "missing required environment variable: DATABASE_URL")?;
    let store = PgStore::connect(&database_url).await?;

    match cli.command {
        Command::Migrate => {
            store.migrate().await?;
            println!("migrations applied");
        }
        Command::Seed { email, role, credits } => {
            let principal = store.create_user(&email, role.into(), credits).await?;
            println!("created principal {} ({}) with {} credits", principal.id, principal.email, principal.credits);
        }
        Command::Grant { principal, amount, description } => {
            let balance = ledger::grant(&store, principal, amount, &description).await?;
            println!("granted {amount} credits to {principal}, new balance {balance}");
        }
        Command::Wallet { principal } => {
            let wallet = ledger::wallet(&store, principal).await?;
            println!("balance: {}", wallet.balance);
            for txn in wallet.recent_transactions {
                println!("  {} {:>10} {:?} {}", txn.created_at, txn.amount, txn.kind, txn.description);
            }
        }
    }

    Ok(())
}
