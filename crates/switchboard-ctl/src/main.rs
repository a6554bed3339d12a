//! switchboard-ctl — command-line interface for the Switchboard relay.

mod cmd;

use anyhow::{Context, Result};

const DEFAULT_PORT: u16 = 8124;

fn print_usage() {
    println!("Usage: switchboard-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status                      Show relay status");
    println!("  peers                       List peer sessions");
    println!("  peers drop <peer-id>        Close a peer session");
    println!("  offer <file|-> [peer-id]    Relay an offer and print the answer");
    println!("  ice                         Show configured ICE servers");
    println!();
    println!("Options:");
    println!("  --port <port>   Relay HTTP port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd::status::cmd_status(port).await,
        ["peers"] => cmd::status::cmd_peers(port).await,
        ["peers", "drop", peer_id] => cmd::status::cmd_peer_drop(port, peer_id).await,
        ["offer", source] => cmd::offer::cmd_offer(port, source, None).await,
        ["offer", source, peer_id] => cmd::offer::cmd_offer(port, source, Some(*peer_id)).await,
        ["ice"] => cmd::offer::cmd_ice(port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            print_usage();
            std::process::exit(1);
        }
    }
}
