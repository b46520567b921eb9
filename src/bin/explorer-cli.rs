use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use tx_explorer::config::{load_config, ExplorerConfig};
use tx_explorer::decoding::{compute_hash, Encoding, RawTransaction};
use tx_explorer::decoding::wire::decode_base64;
use tx_explorer::retrieval::RetrievalOrchestrator;
use tx_explorer::transaction::{AssemblyInput, MessageSource, TransactionAssembler};

#[derive(Parser)]
#[command(name = "explorer-cli")]
#[command(about = "Look up, decode and hash chain transactions", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum EncodingArg {
    Base64,
    Hex,
    Text,
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Base64 => Encoding::Base64,
            EncodingArg::Hex => Encoding::Hex,
            EncodingArg::Text => Encoding::Text,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one transaction by hash
    Tx {
        hash: String,
    },
    /// List an address's transactions, newest first
    History {
        address: String,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Decode a raw transaction offline
    Decode {
        data: String,
        #[arg(long, value_enum, default_value = "base64")]
        encoding: EncodingArg,
    },
    /// Compute the canonical hash of a raw transaction
    Hash {
        data: String,
        #[arg(long, value_enum, default_value = "base64")]
        encoding: EncodingArg,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ExplorerConfig::default(),
    };

    match cli.command {
        Commands::Tx { hash } => {
            let orchestrator = RetrievalOrchestrator::from_config(&config)?;
            match orchestrator.transaction(&hash).await {
                Ok(record) => print_json(&record)?,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::History { address, page, limit } => {
            let orchestrator = RetrievalOrchestrator::from_config(&config)?;
            let page = orchestrator.address_history(&address, page, limit).await;
            print_json(&page)?;
        }
        Commands::Decode { data, encoding } => {
            let assembler = TransactionAssembler::from_config(&config.decoding);
            let raw = RawTransaction::new(data, encoding.into());
            let record = assembler.assemble(AssemblyInput::new(MessageSource::Encoded(raw)))?;
            print_json(&record)?;
        }
        Commands::Hash { data, encoding } => {
            let bytes = raw_bytes(&data, encoding.into())?;
            println!("{}", compute_hash(&bytes));
        }
    }

    Ok(())
}

fn raw_bytes(data: &str, encoding: Encoding) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    Ok(match encoding {
        Encoding::Base64 => decode_base64(data)?,
        Encoding::Hex => hex::decode(data.trim().trim_start_matches("0x"))?,
        Encoding::Text => data.as_bytes().to_vec(),
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
