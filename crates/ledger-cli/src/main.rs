use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ledger_core::constants::SYSTEM_SENDER;
use ledger_core::Wallet;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the proof-of-work ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, env = "LEDGER_NODE", default_value = "http://127.0.0.1:8080", global = true)]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a key pair locally
    Wallet,
    /// Submit a transaction
    Submit {
        /// Sender address; "0" sends an unsigned system transfer
        #[arg(long)]
        from: Option<String>,
        /// Secret key (hex) used to sign; the sender is derived from it
        #[arg(long, env = "LEDGER_SECRET")]
        secret: Option<String>,
        /// Recipient
        #[arg(long)]
        to: String,
        /// Amount
        #[arg(long, allow_negative_numbers = true)]
        amount: f64,
    },
    /// Mine the pending transactions into a block
    Mine {
        /// Address credited with the mining reward
        #[arg(long)]
        miner: Option<String>,
    },
    /// Print the full chain
    Chain,
    /// Print one block by its 1-based index
    Block { index: u64 },
    /// Print the balance of an address
    Balance { address: String },
    /// List transactions waiting for the next block
    Pending,
    /// Register peers with the node
    Register {
        #[arg(required = true)]
        peers: Vec<String>,
    },
    /// Run consensus against the node's peers
    Resolve,
    /// Print the chain length
    Length,
}

#[derive(Serialize, Debug, PartialEq)]
struct Tx {
    sender: String,
    receiver: String,
    amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

/// Builds the request body for a transfer, signing it when a secret is given.
fn build_transfer(
    from: Option<String>,
    secret: Option<&str>,
    to: String,
    amount: f64,
) -> Result<Tx> {
    match (secret, from) {
        (Some(secret), from) => {
            let wallet = Wallet::from_secret_hex(secret).context("reading --secret")?;
            let sender = wallet.address();
            if let Some(from) = from.filter(|f| *f != sender) {
                anyhow::bail!("--from {from} does not match the address of --secret");
            }
            let signature = wallet.sign_transfer(&to, amount);
            Ok(Tx {
                sender,
                receiver: to,
                amount,
                signature: Some(signature),
            })
        }
        (None, Some(from)) if from == SYSTEM_SENDER => Ok(Tx {
            sender: from,
            receiver: to,
            amount,
            signature: None,
        }),
        (None, _) => anyhow::bail!("--secret is required unless --from is \"0\""),
    }
}

struct NodeClient {
    base: String,
    http: reqwest::Client,
}

impl NodeClient {
    fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str) -> Result<(reqwest::StatusCode, String)> {
        let url = format!("{}{path}", self.base);
        debug!(%url, "GET");
        let res = self.http.get(&url).send().await?;
        Ok((res.status(), res.text().await?))
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<(reqwest::StatusCode, String)> {
        let url = format!("{}{path}", self.base);
        debug!(%url, "POST");
        let res = self.http.post(&url).json(body).send().await?;
        Ok((res.status(), res.text().await?))
    }
}

fn print_response((status, body): (reqwest::StatusCode, String)) {
    println!("status: {}", status);
    match serde_json::from_str::<Value>(&body) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value).unwrap_or(body)),
        Err(_) => println!("{body}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let client = NodeClient::new(&cli.node);
    match cli.cmd {
        Command::Wallet => {
            let wallet = Wallet::generate();
            println!("address: {}", wallet.address());
            println!("secret:  {}", wallet.secret_hex());
        }
        Command::Submit {
            from,
            secret,
            to,
            amount,
        } => {
            let tx = build_transfer(from, secret.as_deref(), to, amount)?;
            print_response(client.post("/api/transactions/new", &tx).await?);
        }
        Command::Mine { miner } => {
            let path = match miner {
                Some(miner) => format!("/api/mine?miner={miner}"),
                None => "/api/mine".to_string(),
            };
            print_response(client.post(&path, &json!({})).await?);
        }
        Command::Chain => print_response(client.get("/api/full-chain").await?),
        Command::Block { index } => {
            print_response(client.get(&format!("/api/blocks/{index}")).await?)
        }
        Command::Balance { address } => {
            print_response(client.get(&format!("/api/balance/{address}")).await?)
        }
        Command::Pending => print_response(client.get("/api/transactions/pending").await?),
        Command::Register { peers } => print_response(
            client
                .post("/api/nodes/register", &json!({ "nodes": peers }))
                .await?,
        ),
        Command::Resolve => print_response(client.get("/api/nodes/resolve").await?),
        Command::Length => print_response(client.get("/api/length").await?),
    }
    Ok(())
}
