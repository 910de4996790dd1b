//! Mapping from a pair of participants to the canonical conversation id.
//!
//! Both schemes sort the two identifiers first, so argument order never
//! matters. `Concatenated` joins them directly and is what existing logs are
//! keyed by; it is only collision-free while no pair of identifiers can
//! concatenate to the same string as another pair. `Hashed` length-prefixes
//! each identifier before hashing, which makes it injective over unordered
//! pairs regardless of identifier format.

use std::str::FromStr;

use serde::Deserialize;
use sha2::{Digest, Sha256};

use chatline_types::ConversationId;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationScheme {
    #[default]
    Concatenated,
    Hashed,
}

impl ConversationScheme {
    pub fn derive(self, a: &str, b: &str) -> Result<ConversationId, ClientError> {
        if a.is_empty() || b.is_empty() {
            return Err(ClientError::InvalidParticipant);
        }

        let (low, high) = if a <= b { (a, b) } else { (b, a) };

        let raw = match self {
            Self::Concatenated => format!("{low}{high}"),
            Self::Hashed => {
                let mut hasher = Sha256::new();
                for id in [low, high] {
                    hasher.update((id.len() as u64).to_be_bytes());
                    hasher.update(id.as_bytes());
                }
                hex::encode(hasher.finalize())
            }
        };

        Ok(ConversationId::from_raw(raw))
    }
}

impl FromStr for ConversationScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "concatenated" => Ok(Self::Concatenated),
            "hashed" => Ok(Self::Hashed),
            other => Err(format!("unknown conversation scheme '{other}'")),
        }
    }
}

/// Derive the conversation id for two participants with the default scheme.
pub fn derive_id(a: &str, b: &str) -> Result<ConversationId, ClientError> {
    ConversationScheme::Concatenated.derive(a, b)
}
