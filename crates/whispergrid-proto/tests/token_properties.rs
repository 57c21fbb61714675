//! Property-based tests for the token codec.
//!
//! Verified invariants:
//!
//! 1. **Round-trip**: `parse(sign(header, payload))` reproduces the header
//!    and payload and verifies under the signer's public key.
//! 2. **Id arithmetic**: `next()` stays in range and only wraps at the
//!    ceiling.

use proptest::prelude::*;
use whispergrid_crypto::SigningKeyPair;
use whispergrid_proto::{Body, MAX_MESSAGE_ID, MessageId, SignedToken, Subject, TokenHeader};

proptest! {
    // Each case generates a P-384 key; keep the count modest.
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_token_roundtrip(
        note in "[a-zA-Z0-9 .,!?]{0,80}",
        nickname in "[a-zA-Z]{1,16}",
    ) {
        let key = SigningKeyPair::generate();
        let header = TokenHeader::new(Subject::Invitation)
            .with_jwk(key.public_jwk().unwrap());
        let body = Body::Json(serde_json::json!({
            "nickname": nickname,
            "note": note,
        }));

        let token = SignedToken::sign(header, &body, &key).unwrap();
        let parsed = SignedToken::parse(token.as_str()).unwrap();

        parsed.verify(None).unwrap();
        prop_assert_eq!(parsed.header(), token.header());
        prop_assert_eq!(parsed.body(), &body);
    }

    #[test]
    fn prop_string_payload_roundtrip(blob in "[A-Za-z_-]{1,120}") {
        let key = SigningKeyPair::generate();
        let header = TokenHeader::new(Subject::SelfEncrypted)
            .with_jwk(key.public_jwk().unwrap());

        let token = SignedToken::sign(header, &Body::Text(blob.clone()), &key).unwrap();
        let parsed = SignedToken::parse(token.as_str()).unwrap();

        parsed.verify(None).unwrap();
        prop_assert_eq!(parsed.payload_text(), blob.as_str());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_next_stays_in_range(value in 1..MAX_MESSAGE_ID) {
        let id = MessageId::new(value).unwrap();
        let next = id.next();

        prop_assert!(next.value() >= 1);
        prop_assert!(next.value() < MAX_MESSAGE_ID);
        if value + 1 < MAX_MESSAGE_ID {
            prop_assert_eq!(next.value(), value + 1);
        } else {
            prop_assert_eq!(next.value(), 1);
        }
    }

    #[test]
    fn prop_hex_roundtrip(value in 1..MAX_MESSAGE_ID) {
        let id = MessageId::new(value).unwrap();
        prop_assert_eq!(MessageId::from_hex(&id.to_hex()).unwrap(), id);
    }
}
