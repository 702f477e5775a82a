use std::time::Duration;

use alloy_primitives::{Signature, B256};
use tracing::info;

use crate::error::{Result, SignError};
use crate::payloads::{chia_coin_spend, text_message};
use crate::signing::{recover_from_signature, signature_hex, RecoveredKey};
use crate::typed_data::{compute_message_hash, TypedDataDescriptor};
use crate::wallet::WalletSession;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// A signature together with the exact hash the wallet was asked to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTypedData {
    pub hash: B256,
    pub signature: Signature,
}

impl SignedTypedData {
    pub fn signature_hex(&self) -> String {
        signature_hex(&self.signature)
    }

    pub fn recover_signer_key(&self) -> Result<RecoveredKey> {
        recover_from_signature(&self.hash, &self.signature)
    }
}

/// Requests EIP-712 signatures from an explicitly supplied wallet session.
///
/// The message hash is computed once per request; the same value is handed to
/// the wallet and returned in [`SignedTypedData::hash`], so recovery always
/// runs against the hash that was signed.
#[derive(Debug)]
pub struct TypedDataSigner<W> {
    session: W,
    timeout: Duration,
}

impl<W: WalletSession> TypedDataSigner<W> {
    pub fn new(session: W) -> Self {
        Self {
            session,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Upper bound on how long a request waits for the wallet to answer.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn session(&self) -> &W {
        &self.session
    }

    pub fn compute_message_hash(&self, descriptor: &TypedDataDescriptor) -> Result<B256> {
        compute_message_hash(descriptor)
    }

    /// Ask the wallet to sign `descriptor`.
    ///
    /// Dropping the returned future abandons the request.
    pub async fn request_signature(
        &self,
        descriptor: &TypedDataDescriptor,
    ) -> Result<SignedTypedData> {
        let Some(address) = self.session.address() else {
            return Err(SignError::WalletUnavailable);
        };
        let hash = compute_message_hash(descriptor)?;
        info!(
            primary_type = %descriptor.primary_type,
            %hash,
            %address,
            "requesting wallet signature"
        );

        let request = self.session.sign_typed_data(descriptor, hash);
        let signature = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| SignError::Timeout(self.timeout))??;

        info!(%hash, "wallet returned signature");
        Ok(SignedTypedData { hash, signature })
    }

    pub async fn sign_simple_text(&self, message: &str) -> Result<SignedTypedData> {
        self.request_signature(&text_message(message)).await
    }

    pub async fn sign_coin_spend(
        &self,
        coin_id: B256,
        delegated_puzzle_hash: B256,
    ) -> Result<SignedTypedData> {
        self.request_signature(&chia_coin_spend(coin_id, delegated_puzzle_hash))
            .await
    }

    /// Sign a text message and recover the signer's public key from it.
    pub async fn reveal_public_key(&self, message: &str) -> Result<RecoveredKey> {
        self.sign_simple_text(message).await?.recover_signer_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::DEFAULT_TEXT;
    use crate::signing::recover_signer_key;
    use crate::wallet::{Approval, LocalWalletSession};
    use alloy_primitives::{keccak256, Address};
    use alloy_signer_local::PrivateKeySigner;
    use async_trait::async_trait;

    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn test_signer() -> PrivateKeySigner {
        TEST_PRIVATE_KEY.parse().unwrap()
    }

    /// A wallet whose approval dialog never closes.
    struct StalledWallet;

    #[async_trait]
    impl WalletSession for StalledWallet {
        fn address(&self) -> Option<Address> {
            Some(Address::ZERO)
        }

        async fn sign_typed_data(&self, _: &TypedDataDescriptor, _: B256) -> Result<Signature> {
            std::future::pending().await
        }
    }

    #[test_log::test(tokio::test)]
    async fn text_round_trip_recovers_the_test_key() {
        let signer = test_signer();
        let expected = signer.credential().verifying_key().clone();
        let helper = TypedDataSigner::new(LocalWalletSession::new(signer));

        let signed = helper.sign_simple_text(DEFAULT_TEXT).await.unwrap();
        assert_eq!(signed.hash, compute_message_hash(&text_message(DEFAULT_TEXT)).unwrap());

        let key = recover_signer_key(&signed.hash, &signed.signature.as_bytes()).unwrap();
        assert_eq!(key.verifying_key(), &expected);
        assert_eq!(helper.reveal_public_key(DEFAULT_TEXT).await.unwrap(), key);
    }

    #[test_log::test(tokio::test)]
    async fn coin_spend_round_trip() {
        let helper = TypedDataSigner::new(LocalWalletSession::new(test_signer()));
        let coin_id = keccak256(b"coin_id");
        let delegated_puzzle_hash = keccak256(b"delegated_puzzle_hash");

        let spend = helper.sign_coin_spend(coin_id, delegated_puzzle_hash).await.unwrap();
        let text = helper.sign_simple_text(DEFAULT_TEXT).await.unwrap();
        assert_ne!(spend.hash, text.hash);

        let key = spend.recover_signer_key().unwrap();
        assert_eq!(Some(key.address()), helper.session().address());
        assert!(spend.signature_hex().starts_with("0x"));
    }

    #[test_log::test(tokio::test)]
    async fn disconnected_wallet_fails_fast() {
        let helper = TypedDataSigner::new(LocalWalletSession::disconnected());
        assert_eq!(
            helper.sign_simple_text(DEFAULT_TEXT).await,
            Err(SignError::WalletUnavailable)
        );
    }

    #[test_log::test(tokio::test)]
    async fn rejection_is_surfaced() {
        let helper =
            TypedDataSigner::new(LocalWalletSession::random().with_approval(Approval::Reject));
        assert_eq!(
            helper.reveal_public_key(DEFAULT_TEXT).await,
            Err(SignError::UserRejected)
        );
    }

    #[test_log::test(tokio::test)]
    async fn stalled_wallet_times_out() {
        let timeout = Duration::from_millis(50);
        let helper = TypedDataSigner::new(StalledWallet).with_timeout(timeout);
        assert_eq!(
            helper.sign_simple_text(DEFAULT_TEXT).await,
            Err(SignError::Timeout(timeout))
        );
    }

    #[test_log::test(tokio::test)]
    async fn schema_mismatch_is_reported_before_the_wallet_is_asked() {
        let helper = TypedDataSigner::new(StalledWallet);
        let descriptor = text_message(DEFAULT_TEXT).with_field("extra", 1);
        assert!(matches!(
            helper.request_signature(&descriptor).await,
            Err(SignError::SchemaMismatch(_))
        ));
    }
}
