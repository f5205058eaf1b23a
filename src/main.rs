// Entry point for the picocoin node binary
use clap::Parser;
use log::{error, info, LevelFilter};
use picocoin::core::format_amount;
use picocoin::network::{Gossip, GossipServer, PeerSet};
use picocoin::node::{MiningTiming, Node, NodePaths};
use picocoin::storage::{load_chain, load_json, load_or_init, save_json};
use picocoin::wallet::{short, Identity};
use picocoin::{BlockchainError, Config, Opt, Result};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;
use std::sync::Arc;

const PASSPHRASE_KEY: &str = "PICOCOIN_PASSPHRASE";

fn main() {
    let opt = Opt::parse();

    // RUST_LOG still wins over the default level
    let level = if opt.debg {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    let mut config = Config::load(opt.config.as_deref())?;
    if let Some(adr) = &opt.adr {
        config.set_listen_address(adr.clone());
    }
    if let Some(port) = opt.port {
        config.set_port(port);
    }

    let identity = load_identity(&opt.usr, &config)?;
    info!("Using identity {}", short(identity.address()));

    let chain = load_chain(&opt.chain, config.get_consensus_params())?;

    if opt.bal {
        let balance = chain.balance_of(identity.address());
        println!("Balance: {}.", format_amount(balance));
        if !opt.mining {
            return Ok(());
        }
    }

    let peers = load_or_init(&opt.peers, || {
        Ok(PeerSet::with_peers(config.get_bootstrap_peers()?))
    })?;
    let gossip = Gossip::new(peers, config.get_peer_timeout());
    let paths = NodePaths {
        chain: opt.chain.clone(),
        peers: opt.peers.clone(),
    };
    let node = Arc::new(Node::new(
        identity,
        chain,
        gossip,
        paths,
        opt.mining,
        MiningTiming::from_config(&config),
    ));

    let report = node.announce(config.get_own_peer()?)?;
    info!(
        "Announced to {} peers ({} unreachable)",
        report.delivered,
        report.failed.len()
    );

    if let Some(request) = opt.get_trans_request()? {
        if confirm("Do you want to make a transaction? [y/n]: ")? {
            let passphrase = unlock_passphrase(node.get_identity())?;
            let tx = node.create_transaction(&request.to, request.action, &passphrase)?;
            let report = node.submit_transaction(tx.clone())?;
            println!("{}", serde_json::to_string_pretty(&tx)?);
            info!(
                "Transaction {} sent to {} peers",
                short(tx.hash()),
                report.delivered
            );
        }
        if !opt.mining {
            return Ok(());
        }
    }

    if opt.debg {
        info!("Debug mode, not serving");
        return Ok(());
    }

    let server = GossipServer::bind(config.get_listen_addr()?, config.max_connections)?;
    if opt.mining {
        println!("Mining is on. Rewards go to {}", node.get_identity().address());
    }
    node.run(server)
}

/// Load the identity at `path`, registering a new one if there is none
fn load_identity(path: &Path, config: &Config) -> Result<Identity> {
    if let Some(identity) = load_json::<Identity>(path)? {
        return Ok(identity);
    }

    println!("No user presented, register new one.");
    let passphrase = new_passphrase()?;
    let identity = Identity::create_with_params(&passphrase, config.get_kdf_params())?;
    save_json(path, &identity)?;
    Ok(identity)
}

fn new_passphrase() -> Result<String> {
    if let Ok(passphrase) = env::var(PASSPHRASE_KEY) {
        return Ok(passphrase);
    }
    loop {
        let first = rpassword::prompt_password("Password: ")?;
        let second = rpassword::prompt_password("Repeat password: ")?;
        if first == second {
            return Ok(first);
        }
        println!("Passwords mismatch, please, try again.");
    }
}

/// Ask until the passphrase unlocks `identity`
fn unlock_passphrase(identity: &Identity) -> Result<String> {
    if let Ok(passphrase) = env::var(PASSPHRASE_KEY) {
        if identity.check_passphrase(&passphrase) {
            return Ok(passphrase);
        }
        return Err(BlockchainError::Auth);
    }
    loop {
        let passphrase = rpassword::prompt_password("Password: ")?;
        if identity.check_passphrase(&passphrase) {
            return Ok(passphrase);
        }
        println!("Invalid password!");
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question}");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y"))
}
