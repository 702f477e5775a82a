//! Wallet sessions: the explicit handle through which signatures are requested.

use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, Signature, B256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, SignError};
use crate::typed_data::{compute_message_hash, TypedDataDescriptor};

/// A connected (or disconnected) wallet able to sign EIP-712 payloads.
#[async_trait]
pub trait WalletSession: Send + Sync {
    /// Address of the connected signer, `None` when no signer is connected.
    fn address(&self) -> Option<Address>;

    /// Ask the wallet to sign `payload`, whose EIP-712 signing hash is `hash`.
    ///
    /// May suspend until a user approves or rejects the request.
    async fn sign_typed_data(&self, payload: &TypedDataDescriptor, hash: B256)
        -> Result<Signature>;
}

/// How a [`LocalWalletSession`] answers signature requests.
#[derive(Debug, Clone, Default)]
pub enum Approval {
    #[default]
    AutoApprove,
    Reject,
    /// Show the request and wait for a `y`/`yes` answer.
    Prompt(Arc<Prompter>),
}

type PromptInput = Lines<Box<dyn AsyncBufRead + Send + Unpin>>;
type PromptOutput = Box<dyn AsyncWrite + Send + Unpin>;

/// Asks a human to confirm each request, one answer line per request.
///
/// The line reader lives as long as the prompter, so answers that arrive
/// together (e.g. piped into stdin) are handed out one request at a time.
pub struct Prompter {
    io: Mutex<(PromptInput, PromptOutput)>,
}

impl Prompter {
    pub fn new<R, W>(input: R, output: W) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let input: Box<dyn AsyncBufRead + Send + Unpin> = Box::new(input);
        let output: PromptOutput = Box::new(output);
        Self {
            io: Mutex::new((input.lines(), output)),
        }
    }

    /// Prompts on stdout and reads answers from stdin.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }

    /// Writes `request` and waits for the next answer line. A closed input declines.
    pub async fn confirm(&self, request: &str) -> Result<bool> {
        let io_err = |e: std::io::Error| SignError::Signer(format!("terminal: {e}"));
        let mut io = self.io.lock().await;
        let (lines, output) = &mut *io;

        output.write_all(request.as_bytes()).await.map_err(io_err)?;
        output.flush().await.map_err(io_err)?;

        let answer = lines.next_line().await.map_err(io_err)?.unwrap_or_default();
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

impl fmt::Debug for Prompter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prompter").finish_non_exhaustive()
    }
}

/// A wallet backed by an in-process secp256k1 key.
#[derive(Debug, Clone, Default)]
pub struct LocalWalletSession {
    signer: Option<PrivateKeySigner>,
    approval: Approval,
}

impl LocalWalletSession {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self {
            signer: Some(signer),
            approval: Approval::default(),
        }
    }

    pub fn random() -> Self {
        Self::new(PrivateKeySigner::random())
    }

    /// A session with no signer; every request fails with `WalletUnavailable`.
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn with_approval(mut self, approval: Approval) -> Self {
        self.approval = approval;
        self
    }

    async fn approve(&self, payload: &TypedDataDescriptor, hash: B256) -> Result<bool> {
        match &self.approval {
            Approval::AutoApprove => Ok(true),
            Approval::Reject => Ok(false),
            Approval::Prompt(prompter) => prompter.confirm(&describe_request(payload, hash)?).await,
        }
    }
}

#[async_trait]
impl WalletSession for LocalWalletSession {
    fn address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    async fn sign_typed_data(
        &self,
        payload: &TypedDataDescriptor,
        hash: B256,
    ) -> Result<Signature> {
        let signer = self.signer.as_ref().ok_or(SignError::WalletUnavailable)?;

        // Sign only what the payload actually hashes to.
        let derived = compute_message_hash(payload)?;
        if derived != hash {
            return Err(SignError::Signer(format!(
                "requested hash {hash} does not match payload hash {derived}"
            )));
        }

        if !self.approve(payload, hash).await? {
            warn!(primary_type = %payload.primary_type, %hash, "signature request rejected");
            return Err(SignError::UserRejected);
        }

        let signature = signer
            .sign_hash(&hash)
            .await
            .map_err(|e| SignError::Signer(e.to_string()))?;
        debug!(signer = %signer.address(), %hash, "signed typed data");
        Ok(signature)
    }
}

fn describe_request(payload: &TypedDataDescriptor, hash: B256) -> Result<String> {
    let message = serde_json::to_string_pretty(&payload.message)
        .map_err(|e| SignError::InvalidJson(e.to_string()))?;
    let domain = payload
        .domain
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>");
    Ok(format!(
        "Signature request\n  domain: {domain}\n  type: {}\n  message: {message}\n  \
         hash: {hash}\nSign? [y/N] ",
        payload.primary_type
    ))
}
