use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

use tradedesk_core::command::parse_user_reference;
use tradedesk_core::ticket::{TicketMap, TicketState};
use tradedesk_core::vouch::VouchMap;
use tradedesk_core::{Store, StorePaths, UserId};

/// tradedesk: inspect the bot's persisted state
#[derive(Parser, Debug)]
#[command(name = "tradedesk")]
#[command(about = "Inspect tradedesk ticket and vouch data", long_about = None)]
struct Cli {
    /// Directory holding vouches.json and tickets.json
    #[arg(long, env = "STATE_DIR", default_value = ".")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List open tickets and who handles them
    Tickets,
    /// Show every vouch recorded for a user
    Vouches(VouchesArgs),
    /// Rank users by vouch count
    Top(TopArgs),
}

#[derive(Parser, Debug)]
struct VouchesArgs {
    /// User id or mention
    user: String,
}

#[derive(Parser, Debug)]
struct TopArgs {
    /// How many users to show
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

fn format_tickets(tickets: &TicketMap) -> String {
    if tickets.is_empty() {
        return "No open tickets.\n".to_string();
    }
    let mut out = String::new();
    for (channel, ticket) in tickets {
        let state = match ticket.state() {
            TicketState::OpenUnclaimed => "unclaimed".to_string(),
            TicketState::Claimed { by } => format!("claimed by {}", by),
        };
        out.push_str(&format!(
            "{}  owner {}  {}\n",
            channel, ticket.owner, state
        ));
    }
    out
}

fn format_vouches(vouches: &VouchMap, user: UserId) -> Result<String> {
    let record = vouches
        .get(&user)
        .ok_or_else(|| anyhow!("No vouches recorded for {}", user))?;
    let mut out = format!("{} has {} vouches\n", user, record.count());
    for (n, entry) in record.entries().iter().enumerate() {
        out.push_str(&format!("{:>4}. {}: {}\n", n + 1, entry.voucher, entry.reason));
    }
    Ok(out)
}

fn format_top(vouches: &VouchMap, limit: usize) -> String {
    let mut ranked: Vec<(UserId, u64)> = vouches
        .iter()
        .map(|(user, record)| (*user, record.count()))
        .collect();
    // Highest count first; ties keep id order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(n, (user, count))| format!("{:>4}. {}  {}\n", n + 1, user, count))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::WARN)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = Store::load(StorePaths::in_dir(&cli.state_dir)).await;

    let output = match cli.command {
        Commands::Tickets => format_tickets(&store.tickets),
        Commands::Vouches(args) => {
            let user = parse_user_reference(&args.user).map_err(|e| anyhow!("{}", e))?;
            format_vouches(&store.vouches, user)?
        }
        Commands::Top(args) => format_top(&store.vouches, args.limit),
    };
    print!("{}", output);

    Ok(())
}
