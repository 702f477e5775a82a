use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use alloy_primitives::{hex, B256};
use alloy_signer_local::PrivateKeySigner;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use typed_sign::documents::parse_documents;
use typed_sign::payloads::{self, DEFAULT_TEXT};
use typed_sign::{
    eip712_parts, Approval, LocalWalletSession, Prompter, SignedTypedData, TypedDataSigner,
    WalletSession,
};

/// CLI to build EIP-712 payloads, sign them with a local wallet, and recover the signer.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Private key of the local wallet; if omitted, a random key is generated.
    #[clap(long, env = "USER_PRIVATE_KEY", global = true)]
    private_key: Option<PrivateKeySigner>,

    /// Show each request on the terminal and sign only after confirmation.
    #[clap(long, global = true)]
    confirm: bool,

    /// Seconds to wait for the wallet to answer a request.
    #[clap(long, env = "SIGN_TIMEOUT_SECS", default_value_t = 120, global = true)]
    timeout_secs: u64,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign a `Text { string message }` payload under an empty domain.
    Text {
        #[clap(long, default_value = DEFAULT_TEXT)]
        message: String,
    },
    /// Sign a `ChiaCoinSpend { coin_id, delegated_puzzle_hash }` payload.
    CoinSpend {
        #[clap(long)]
        coin_id: B256,

        #[clap(long)]
        delegated_puzzle_hash: B256,

        /// Domain salt; defaults to the simulator's agg_sig_data constant.
        #[clap(long)]
        salt: Option<B256>,
    },
    /// Sign a text payload and print the public key recovered from the signature.
    RevealPk {
        #[clap(long, default_value = DEFAULT_TEXT)]
        message: String,
    },
    /// Sign every typed-data JSON document in a file (documents may be concatenated).
    File {
        #[clap(long, value_name = "FILE")]
        file_path: PathBuf,
    },
    /// Print the EIP-712 hashing intermediates of every document in a file without signing.
    Hash {
        #[clap(long, value_name = "FILE")]
        file_path: PathBuf,
    },
}

fn print_signed(signed: &SignedTypedData, signer: &impl WalletSession) {
    println!("Hash To Sign: {}", signed.hash);
    println!("Signature: {}", signed.signature_hex());
    if let Some(address) = signer.address() {
        println!("Signer: {:#x}", address);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    // Load environment variables if present
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment variables from {:?}", path),
        Err(e) if e.not_found() => debug!("No .env file found"),
        Err(e) => bail!("failed to load .env file: {}", e),
    }

    let args = Args::parse();

    let signer = match args.private_key {
        Some(pk) => pk,
        None => PrivateKeySigner::random(),
    };
    let approval = if args.confirm {
        Approval::Prompt(Arc::new(Prompter::stdio()))
    } else {
        Approval::AutoApprove
    };
    let helper = TypedDataSigner::new(LocalWalletSession::new(signer).with_approval(approval))
        .with_timeout(Duration::from_secs(args.timeout_secs));

    match args.command {
        Command::Text { message } => {
            let signed = helper.sign_simple_text(&message).await?;
            print_signed(&signed, helper.session());
        }
        Command::CoinSpend {
            coin_id,
            delegated_puzzle_hash,
            salt,
        } => {
            println!("coin_id: {coin_id}");
            println!("delegated_puzzle_hash: {delegated_puzzle_hash}");
            let signed = match salt {
                Some(salt) => {
                    let descriptor =
                        payloads::chia_coin_spend_with_salt(coin_id, delegated_puzzle_hash, salt);
                    helper.request_signature(&descriptor).await?
                }
                None => helper.sign_coin_spend(coin_id, delegated_puzzle_hash).await?,
            };
            print_signed(&signed, helper.session());
        }
        Command::RevealPk { message } => {
            let key = helper.reveal_public_key(&message).await?;
            println!("Pk: {key}");
            println!("Pk (compressed): 0x{}", hex::encode(key.to_compressed()));
            println!("Address: {:#x}", key.address());
        }
        Command::File { file_path } => {
            let contents = fs::read_to_string(&file_path)
                .with_context(|| format!("reading {}", file_path.display()))?;
            let documents = parse_documents(&contents)?;
            info!("Signing {} document(s) from {}", documents.len(), file_path.display());
            for (i, descriptor) in documents.iter().enumerate() {
                let signed = helper.request_signature(descriptor).await?;
                println!("Document #{i} ({})", descriptor.primary_type);
                print_signed(&signed, helper.session());
            }
        }
        Command::Hash { file_path } => {
            let contents = fs::read_to_string(&file_path)
                .with_context(|| format!("reading {}", file_path.display()))?;
            for (i, descriptor) in parse_documents(&contents)?.iter().enumerate() {
                let parts = eip712_parts(descriptor)?;
                println!("Document #{i} ({})", descriptor.primary_type);
                println!("  encodeType: {}", parts.encoded_type);
                println!("  domainSeparator: {}", parts.domain_separator);
                println!("  hashStruct(message): {}", parts.struct_hash);
                println!("  Hash To Sign: {}", parts.signing_hash);
            }
        }
    }

    Ok(())
}
