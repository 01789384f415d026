#![forbid(unsafe_code)]
use clap::{Parser, Subcommand};
use powchain::blockchain::Block;
use powchain::config::{load_config, load_config_from};
use powchain::node::Node;
use powchain::transaction::{format_balance, Transaction};
use serde::Serialize;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(author, version, about = "Single-node proof-of-work ledger", long_about = None)]
struct Cli {
    /// Path to the configuration file (defaults to ./powchain.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log appended blocks, mined nonces and difficulty changes
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shows height, difficulty and the latest block hash
    Info,
    /// Mines blocks that pay the configured reward
    Mine {
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Beneficiary address (defaults to miner.beneficiary_address)
        #[arg(long)]
        address: Option<String>,
    },
    /// Transfers an amount and mines it into a block
    Send {
        from: String,
        to: String,
        /// Amount in base units
        amount: u64,
    },
    /// Shows the spendable balance of an address
    Balance { address: String },
    /// Lists the unspent outputs indexed for an address
    Utxo { address: String },
    /// Shows a block by height or hash
    Block {
        #[arg(long, conflicts_with = "hash", required_unless_present = "hash")]
        height: Option<u64>,
        #[arg(long)]
        hash: Option<String>,
    },
    /// Shows a transaction by id
    Tx { id: String },
    /// Validates the whole chain
    Validate,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    let beneficiary = config.miner.beneficiary_address.clone();
    let node = Node::new(config)?;
    let chain = node.chain();

    match cli.command {
        Commands::Info => {
            let info = chain.info();
            if cli.json {
                print_json(&info)?;
            } else {
                println!("Height:      {}", info.height);
                println!("Difficulty:  {}", info.difficulty);
                println!("Latest hash: {}", info.latest_hash);
            }
        }
        Commands::Mine { count, address } => {
            let address = address.unwrap_or(beneficiary);
            let mut mined = Vec::new();
            for _ in 0..count {
                let block = node.mine_block(&address)?;
                if !cli.json {
                    print_block_line(&block);
                }
                mined.push(block);
            }
            if cli.json {
                print_json(&mined)?;
            }
        }
        Commands::Send { from, to, amount } => {
            let block = node.send(&from, &to, amount, &beneficiary)?;
            if cli.json {
                print_json(&block)?;
            } else {
                println!("Sent {} from {} to {}", format_balance(amount), from, to);
                print_block_line(&block);
            }
        }
        Commands::Balance { address } => {
            let balance = chain.get_balance(&address);
            if cli.json {
                print_json(&serde_json::json!({ "address": address, "balance": balance }))?;
            } else {
                println!("{}: {}", address, format_balance(balance));
            }
        }
        Commands::Utxo { address } => {
            let outputs = chain.find_utxo(&address);
            if cli.json {
                print_json(&outputs)?;
            } else if outputs.is_empty() {
                println!("No unspent outputs for {}", address);
            } else {
                for (i, out) in outputs.iter().enumerate() {
                    println!("#{} {} -> {}", i, format_balance(out.value), out.address);
                }
            }
        }
        Commands::Block { height, hash } => {
            let block = match (height, hash) {
                (Some(h), _) => chain.get_block_by_height(h)?,
                (None, Some(hash)) => chain.get_block_by_hash(&hash)?,
                (None, None) => return Err("either --height or --hash is required".into()),
            };
            if cli.json {
                print_json(&block)?;
            } else {
                println!("{}", block);
                for tx in &block.transactions {
                    print_transaction(tx);
                }
            }
        }
        Commands::Tx { id } => {
            let tx = chain.get_transaction_by_id(&id)?;
            if cli.json {
                print_json(&tx)?;
            } else {
                print_transaction(&tx);
            }
        }
        Commands::Validate => {
            chain.validate_chain()?;
            if cli.json {
                print_json(&serde_json::json!({ "valid": true, "height": chain.get_height() }))?;
            } else {
                println!("Chain is valid ({} blocks)", chain.get_height() + 1);
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_block_line(block: &Block) {
    println!(
        "Block {} {} (nonce {}, difficulty {})",
        block.header.height, block.header.hash, block.header.nonce, block.header.difficulty
    );
}

fn print_transaction(tx: &Transaction) {
    println!("  {}", tx);
    for out in &tx.outputs {
        println!("    {} -> {}", format_balance(out.value), out.address);
    }
}
