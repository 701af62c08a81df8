//! Interactive console client (§6 CLI surface): logs into a tracker,
//! bootstraps against whatever peers it hands back, then drives the node
//! through a REPL of `create`, `transfer`, `get`, `chain`, `images`, `me`
//! and `exit` commands.

use clap::{Parser, ValueEnum};
use imgchain_core::{Config, ImageId, UserId};
use imgchain_node::tracker::LoginPrompts;
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Cli,
    Gui,
}

#[derive(Parser)]
#[command(name = "imgchain-cli")]
#[command(about = "Console client for the imgchain peer-to-peer network", version)]
struct Args {
    /// Local port to listen for peer connections on (0 picks any free port).
    listen_port: u16,
    /// Tracker host to rendezvous through.
    tracker_host: String,
    /// Tracker port.
    tracker_port: u16,
    /// Front end to drive the node with.
    #[arg(value_enum, default_value = "cli")]
    mode: Mode,
    /// Raise the log level to debug (overridden by RUST_LOG if set).
    #[arg(short, long)]
    verbose: bool,
}

struct StdinPrompts;

impl LoginPrompts for StdinPrompts {
    fn prompt_new_username(&self) -> String {
        prompt("Pick a username: ")
    }

    fn confirm_returning_user(&self, username: &str) -> bool {
        let answer = prompt(&format!("Welcome back, {username}. Is this you? (Y/N) "));
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

fn prompt(message: &str) -> String {
    print!("{message}");
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).ok();
    line.trim().to_string()
}

fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if args.verbose { "debug" } else { "info" })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if matches!(args.mode, Mode::Gui) {
        eprintln!("gui mode has moved to its own binary: run imgchain-gui instead");
        std::process::exit(1);
    }

    let tracker_addr: SocketAddr = match format!("{}:{}", args.tracker_host, args.tracker_port).parse() {
        Ok(addr) => addr,
        Err(_) => resolve_host(&args.tracker_host, args.tracker_port),
    };

    let running = match imgchain_node::bootstrap_and_run(
        args.listen_port,
        tracker_addr,
        &StdinPrompts,
        Config::default(),
    ) {
        Ok(running) => running,
        Err(e) => {
            tracing::error!(error = %e, "failed to start node");
            std::process::exit(1);
        }
    };

    run_repl(&running.node);
    running.shutdown();
}

fn resolve_host(host: &str, port: u16) -> SocketAddr {
    use std::net::ToSocketAddrs;
    (host, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .unwrap_or_else(|| {
            eprintln!("could not resolve tracker host {host}");
            std::process::exit(1);
        })
}

fn run_repl(node: &std::sync::Arc<imgchain_node::Node>) {
    println!("commands: create <path>, transfer <image_id> <user_id>, get <image_id> <out_path>, chain, images, me, exit");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("create") => match parts.next() {
                Some(path) => create_command(node, path),
                None => println!("usage: create <path>"),
            },
            Some("transfer") => match (parts.next(), parts.next()) {
                (Some(image_id), Some(user_id)) => transfer_command(node, image_id, user_id),
                _ => println!("usage: transfer <image_id> <user_id>"),
            },
            Some("get") => match (parts.next(), parts.next()) {
                (Some(image_id), Some(out_path)) => get_command(node, image_id, out_path),
                _ => println!("usage: get <image_id> <out_path>"),
            },
            Some("chain") => chain_command(node),
            Some("images") => images_command(node),
            Some("me") => me_command(node),
            Some("exit") => break,
            Some(other) => println!("unknown command: {other}"),
            None => {}
        }
    }
}

fn create_command(node: &std::sync::Arc<imgchain_node::Node>, path: &str) {
    match std::fs::read(path) {
        Ok(bytes) => match node.create_nft(bytes) {
            imgchain_node::MintOutcome::Minted(image_id) => println!("minted {image_id}"),
            imgchain_node::MintOutcome::AlreadyOwned { image_id, owner } => {
                println!("already owned: {image_id} by {owner}");
            }
        },
        Err(e) => println!("could not read {path}: {e}"),
    }
}

fn transfer_command(node: &std::sync::Arc<imgchain_node::Node>, image_id: &str, user_id: &str) {
    let (Ok(image_id), Ok(user_id)) = (ImageId::parse(image_id), UserId::parse(user_id)) else {
        println!("invalid image id or user id");
        return;
    };
    match node.transfer_nft(image_id, user_id) {
        imgchain_node::TransferOutcome::Transferred => println!("transferred"),
        imgchain_node::TransferOutcome::NotOwner(owner) => println!("not the owner, current owner is {owner}"),
    }
}

fn get_command(node: &std::sync::Arc<imgchain_node::Node>, image_id: &str, out_path: &str) {
    let Ok(image_id) = ImageId::parse(image_id) else {
        println!("invalid image id");
        return;
    };
    match node.get_image(&image_id) {
        Some(bytes) => match std::fs::write(out_path, &bytes) {
            Ok(()) => println!("wrote {} bytes to {out_path}", bytes.len()),
            Err(e) => println!("failed to write {out_path}: {e}"),
        },
        None => println!("image not found locally or on any known peer"),
    }
}

fn chain_command(node: &std::sync::Arc<imgchain_node::Node>) {
    let state = node.lock_state();
    println!(
        "length={} difficulty={} tip={}",
        state.chain.len(),
        state.chain.difficulty(),
        state.chain.tip_hash()
    );
}

fn me_command(node: &std::sync::Arc<imgchain_node::Node>) {
    println!("user_id={} username={}", node.identity.user_id, node.identity.username);
    let images = node.lock_state().chain.find_images_of(&node.identity.user_id);
    for image_id in images {
        println!("{image_id}");
    }
}

fn images_command(node: &std::sync::Arc<imgchain_node::Node>) {
    let state = node.lock_state();
    for image_id in state.chain.all_images() {
        let owner = state
            .chain
            .find_owner(&image_id)
            .map(|o| o.to_string())
            .unwrap_or_else(|| "unowned".to_string());
        println!("{image_id} {owner}");
    }
}
