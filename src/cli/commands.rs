use crate::core::Action;
use crate::error::{BlockchainError, Result};
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

/// Transaction kinds accepted by `--trans`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKindArg {
    Invoice,
    Payment,
    Message,
}

impl FromStr for ActionKindArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ivc" => Ok(ActionKindArg::Invoice),
            "pay" => Ok(ActionKindArg::Payment),
            "msg" => Ok(ActionKindArg::Message),
            _ => Err(format!(
                "Invalid transaction kind: {s}. Valid options: ivc, pay, msg"
            )),
        }
    }
}

impl std::fmt::Display for ActionKindArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKindArg::Invoice => write!(f, "ivc"),
            ActionKindArg::Payment => write!(f, "pay"),
            ActionKindArg::Message => write!(f, "msg"),
        }
    }
}

impl ActionKindArg {
    /// Turn the free-form argument into an action of this kind
    pub fn to_action(self, arg: &str) -> Result<Action> {
        let amount = || {
            arg.parse::<u64>()
                .map_err(|e| BlockchainError::Transaction(format!("Invalid amount {arg}: {e}")))
        };
        Ok(match self {
            ActionKindArg::Invoice => Action::Invoice { amount: amount()? },
            ActionKindArg::Payment => Action::Payment { amount: amount()? },
            ActionKindArg::Message => Action::Message {
                text: arg.to_string(),
            },
        })
    }
}

#[derive(Debug, Parser)]
#[command(name = "picocoin", about = "PicoCoin core node")]
pub struct Opt {
    #[arg(long = "usr", default_value = "user.json", help = "Path to user keys")]
    pub usr: PathBuf,
    #[arg(long = "chain", default_value = "blockchain.json", help = "Path to blockchain")]
    pub chain: PathBuf,
    #[arg(long = "peers", default_value = "peers.json", help = "Path to peers")]
    pub peers: PathBuf,
    #[arg(long = "config", help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,
    #[arg(long = "mining", help = "Work as mining server")]
    pub mining: bool,
    #[arg(long = "adr", help = "Server listen address (default: 127.0.0.1)")]
    pub adr: Option<String>,
    #[arg(long = "port", help = "Server listen port (default: 10000)")]
    pub port: Option<u16>,
    #[arg(
        long = "trans",
        num_args = 3,
        value_names = ["TO", "ACT", "ARG"],
        help = "Make a transaction: recipient address, kind (ivc, pay, msg) and amount or text"
    )]
    pub trans: Option<Vec<String>>,
    #[arg(long = "bal", help = "Print user balance")]
    pub bal: bool,
    #[arg(long = "debg", help = "Debug mode: verbose logging, do not serve")]
    pub debg: bool,
}

/// A parsed `--trans` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransRequest {
    pub to: String,
    pub action: Action,
}

impl Opt {
    pub fn get_trans_request(&self) -> Result<Option<TransRequest>> {
        let Some(args) = &self.trans else {
            return Ok(None);
        };
        let [to, kind, arg] = args.as_slice() else {
            return Err(BlockchainError::Transaction(
                "--trans takes exactly three values".to_string(),
            ));
        };
        let kind = ActionKindArg::from_str(kind).map_err(BlockchainError::Transaction)?;
        Ok(Some(TransRequest {
            to: to.clone(),
            action: kind.to_action(arg)?,
        }))
    }
}
