use alloy_primitives::{hex, Address, B256};
use anyhow::{bail, Context, Result};
use clap::Parser;

use typed_sign::{recover_signer_key, RecoveredKey};

/// CLI to recover a signer's public key from a message hash and signature,
/// or to normalize a public key to its compressed form.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// EIP-712 signing hash the signature was produced over.
    #[clap(long, requires = "signature", conflicts_with = "public_key")]
    hash: Option<B256>,

    /// 65-byte r||s||v signature as hex.
    #[clap(long, requires = "hash")]
    signature: Option<String>,

    /// Fail unless the recovered key belongs to this address.
    #[clap(long, requires = "hash")]
    expected_address: Option<Address>,

    /// SEC1 public key (compressed or uncompressed) to print in compressed form.
    #[clap(long)]
    public_key: Option<String>,
}

fn print_key(key: &RecoveredKey) {
    println!("Public Key: {key}");
    println!("Public Key (compressed): 0x{}", hex::encode(key.to_compressed()));
    println!("Address: {:#x}", key.address());
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if let Some(public_key) = args.public_key {
        let key = RecoveredKey::from_sec1_hex(&public_key)?;
        print_key(&key);
        return Ok(());
    }

    let (Some(hash), Some(signature)) = (args.hash, args.signature) else {
        bail!("either --public-key or both --hash and --signature are required");
    };
    let signature_bytes = hex::decode(signature.trim()).context("signature is not valid hex")?;
    let key = recover_signer_key(&hash, &signature_bytes)?;

    if let Some(expected) = args.expected_address {
        if key.address() != expected {
            bail!(
                "recovered address {:#x} does not match expected address {:#x}",
                key.address(),
                expected
            );
        }
        tracing::info!("Signature matches expected address {:#x}", expected);
    }

    println!("Hash: {hash}");
    print_key(&key);
    Ok(())
}
