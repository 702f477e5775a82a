//! The two example payload shapes: a plain text message and a Chia coin spend.

use alloy_primitives::{b256, hex, B256};
use alloy_sol_types::sol;
use serde_json::{Map, Value};

use crate::typed_data::{FieldSpec, TypedDataDescriptor};

pub const DEFAULT_TEXT: &str = "Hello, Chia!";

pub const CHIA_COIN_SPEND_DOMAIN_NAME: &str = "Chia Coin Spend";

/// Default domain salt: the simulator's `agg_sig_data` constant (sha256 of "").
pub const CHIA_COIN_SPEND_SALT: B256 =
    b256!("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");

sol! {
    /// Static counterpart of [`chia_coin_spend`].
    #[derive(Debug, PartialEq, Eq)]
    struct ChiaCoinSpend {
        bytes32 coin_id;
        bytes32 delegated_puzzle_hash;
    }
}

/// `Text { string message }` under an empty domain.
pub fn text_message(message: &str) -> TypedDataDescriptor {
    TypedDataDescriptor::new(Map::new(), "Text")
        .with_type("Text", vec![FieldSpec::new("message", "string")])
        .with_field("message", message)
}

/// `{ name: "Chia Coin Spend", salt }`
pub fn chia_coin_spend_domain(salt: B256) -> Map<String, Value> {
    let mut domain = Map::new();
    domain.insert("name".into(), CHIA_COIN_SPEND_DOMAIN_NAME.into());
    domain.insert("salt".into(), hex::encode_prefixed(salt).into());
    domain
}

pub fn chia_coin_spend(coin_id: B256, delegated_puzzle_hash: B256) -> TypedDataDescriptor {
    chia_coin_spend_with_salt(coin_id, delegated_puzzle_hash, CHIA_COIN_SPEND_SALT)
}

pub fn chia_coin_spend_with_salt(
    coin_id: B256,
    delegated_puzzle_hash: B256,
    salt: B256,
) -> TypedDataDescriptor {
    TypedDataDescriptor::new(chia_coin_spend_domain(salt), "ChiaCoinSpend")
        .with_type(
            "ChiaCoinSpend",
            vec![
                FieldSpec::new("coin_id", "bytes32"),
                FieldSpec::new("delegated_puzzle_hash", "bytes32"),
            ],
        )
        .with_field("coin_id", hex::encode_prefixed(coin_id))
        .with_field(
            "delegated_puzzle_hash",
            hex::encode_prefixed(delegated_puzzle_hash),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed_data::{compute_message_hash, eip712_parts};
    use alloy_primitives::keccak256;
    use alloy_sol_types::{Eip712Domain, SolStruct};

    const COIN_ID: B256 =
        b256!("8b2107b5aee551f03163841793d343bf8e2fdb4dee8629f8f3b90c1ef839c17d");
    const DELEGATED_PUZZLE_HASH: B256 =
        b256!("2298d705f78bb3da01f74717d7ae36991fd312e1a597152bd31652b0a5a522a3");

    #[test]
    fn coin_spend_matches_static_struct() {
        let descriptor = chia_coin_spend(COIN_ID, DELEGATED_PUZZLE_HASH);
        let dynamic = compute_message_hash(&descriptor).unwrap();
        let spend = ChiaCoinSpend {
            coin_id: COIN_ID,
            delegated_puzzle_hash: DELEGATED_PUZZLE_HASH,
        };
        let domain = Eip712Domain {
            name: Some(CHIA_COIN_SPEND_DOMAIN_NAME.into()),
            salt: Some(CHIA_COIN_SPEND_SALT),
            ..Default::default()
        };
        assert_eq!(descriptor.eip712_domain().unwrap(), domain);
        assert_eq!(dynamic, spend.eip712_signing_hash(&domain));
    }

    #[test]
    fn coin_spend_hash_matches_hand_calculation() {
        let parts = eip712_parts(&chia_coin_spend(COIN_ID, DELEGATED_PUZZLE_HASH)).unwrap();

        let domain_type_hash = keccak256(b"EIP712Domain(string name,bytes32 salt)");
        let domain_separator = keccak256(
            [
                domain_type_hash.as_slice(),
                keccak256(CHIA_COIN_SPEND_DOMAIN_NAME).as_slice(),
                CHIA_COIN_SPEND_SALT.as_slice(),
            ]
            .concat(),
        );
        assert_eq!(parts.domain_separator, domain_separator);

        let type_hash =
            keccak256(b"ChiaCoinSpend(bytes32 coin_id,bytes32 delegated_puzzle_hash)");
        let message_hash = keccak256(
            [
                type_hash.as_slice(),
                COIN_ID.as_slice(),
                DELEGATED_PUZZLE_HASH.as_slice(),
            ]
            .concat(),
        );
        assert_eq!(parts.struct_hash, message_hash);

        let hash_to_sign = keccak256(
            [&[0x19, 0x01][..], domain_separator.as_slice(), message_hash.as_slice()].concat(),
        );
        assert_eq!(parts.signing_hash, hash_to_sign);
    }

    #[test]
    fn domain_separation_changes_the_digest() {
        let text = compute_message_hash(&text_message(DEFAULT_TEXT)).unwrap();
        let spend =
            compute_message_hash(&chia_coin_spend(COIN_ID, DELEGATED_PUZZLE_HASH)).unwrap();
        assert_ne!(text, spend);

        let resalted = compute_message_hash(&chia_coin_spend_with_salt(
            COIN_ID,
            DELEGATED_PUZZLE_HASH,
            B256::ZERO,
        ))
        .unwrap();
        assert_ne!(spend, resalted);
    }

    #[test]
    fn each_coin_spend_field_changes_the_digest() {
        let hash = |coin_id, delegated_puzzle_hash| {
            compute_message_hash(&chia_coin_spend(coin_id, delegated_puzzle_hash)).unwrap()
        };
        let base = hash(COIN_ID, DELEGATED_PUZZLE_HASH);
        let other_coin = hash(keccak256(b"coin_id"), DELEGATED_PUZZLE_HASH);
        let other_puzzle = hash(COIN_ID, keccak256(b"delegated_puzzle_hash"));
        let swapped = hash(DELEGATED_PUZZLE_HASH, COIN_ID);
        for hash in [other_coin, other_puzzle, swapped] {
            assert_ne!(hash, base);
        }
        assert_ne!(other_coin, other_puzzle);
    }
}
