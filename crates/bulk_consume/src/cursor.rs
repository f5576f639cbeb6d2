//! Cursor Codec (`spec.md` §4.3): a deterministic, URL-safe, versioned
//! encoding of [`BulkConsumeState`]. Grounded on the base64+serde_json
//! opaque-token pattern `local_backend::authentication` uses for its own
//! bearer tokens — not a security boundary, just a stable self-describing
//! wire format with an explicit version tag.

use base64::{
    engine::general_purpose::URL_SAFE_NO_PAD,
    Engine,
};
use errors::ErrorMetadata;

use crate::model::BulkConsumeState;

/// Bumped whenever [`BulkConsumeState`]'s wire shape changes incompatibly.
/// Decoding a token with a different version is a client error rather than a
/// best-effort reinterpretation.
const CURRENT_VERSION: u8 = 1;

pub fn encode(state: &BulkConsumeState) -> String {
    let body = serde_json::to_vec(state).expect("BulkConsumeState always serializes");
    let mut bytes = Vec::with_capacity(body.len() + 1);
    bytes.push(CURRENT_VERSION);
    bytes.extend_from_slice(&body);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn decode(token: &str) -> anyhow::Result<BulkConsumeState> {
    let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|e| {
        anyhow::anyhow!(ErrorMetadata::bad_request(
            "InvalidPosition",
            format!("position is not valid base64: {e}")
        ))
    })?;
    let (version, body) = bytes
        .split_first()
        .ok_or_else(|| anyhow::anyhow!(ErrorMetadata::bad_request("InvalidPosition", "position is empty")))?;
    if *version != CURRENT_VERSION {
        anyhow::bail!(ErrorMetadata::bad_request(
            "InvalidPosition",
            format!("position was minted by an incompatible version ({version} != {CURRENT_VERSION})")
        ));
    }
    let state = serde_json::from_slice(body).map_err(|e| {
        anyhow::anyhow!(ErrorMetadata::bad_request(
            "InvalidPosition",
            format!("position does not decode to a valid cursor: {e}")
        ))
    })?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn sample_state() -> BulkConsumeState {
        BulkConsumeState {
            from: 42,
            to: Some(1_000),
            path: Some("/foo".to_string()),
            with_history: true,
            with_deleted: false,
            recursive: true,
            chunk_size_hint: 256,
            field_filter: None,
        }
    }

    #[test]
    fn round_trips() {
        let state = sample_state();
        assert_eq!(decode(&encode(&state)).unwrap(), state);
    }

    #[test]
    fn rejects_bad_base64() {
        assert!(decode("not valid base64!!!").is_err());
    }

    #[test]
    fn rejects_wrong_version() {
        let body = serde_json::to_vec(&sample_state()).unwrap();
        let mut bytes = vec![CURRENT_VERSION + 1];
        bytes.extend_from_slice(&body);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        let err = decode(&token).unwrap_err();
        assert!(err.to_string().contains("incompatible version"));
    }

    #[test]
    fn rejects_empty_token() {
        assert!(decode("").is_err());
    }

    proptest! {
        #[test]
        fn round_trip_is_lossless(state: BulkConsumeState) {
            // from/to/chunk_size_hint are unconstrained here (the codec
            // itself doesn't validate — that's the Request Validator's job).
            prop_assert_eq!(decode(&encode(&state)).unwrap(), state);
        }
    }
}
