//! EIP-712 typed-data payloads.
//!
//! The provider computes the hash and signs; this module only checks that a
//! payload is structurally sound before it is sent anywhere.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::EthError;

/// The domain separator fields. All are optional in EIP-712.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_chain_id"
    )]
    pub chain_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifying_contract: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    pub domain: Eip712Domain,
    pub types: BTreeMap<String, Vec<TypedField>>,
    pub primary_type: String,
    pub message: Value,
}

impl TypedData {
    /// Parse and validate a JSON typed-data document.
    pub fn from_json(json: &str) -> Result<Self, EthError> {
        let data: Self =
            serde_json::from_str(json).map_err(|e| EthError::InvalidTypedData(e.to_string()))?;
        data.validate()?;
        Ok(data)
    }

    /// Check that the primary type exists, every field type resolves, and the
    /// message is an object.
    pub fn validate(&self) -> Result<(), EthError> {
        if !self.types.contains_key(&self.primary_type) {
            return Err(EthError::InvalidTypedData(format!(
                "unknown primary type {}",
                self.primary_type
            )));
        }

        for (struct_name, fields) in &self.types {
            for field in fields {
                let base = strip_array_suffix(&field.kind);
                if !is_atomic(base) && !self.types.contains_key(base) {
                    return Err(EthError::InvalidTypedData(format!(
                        "{struct_name}.{} has undefined type {}",
                        field.name, field.kind
                    )));
                }
            }
        }

        // Format only; checksum casing is the provider's concern.
        if let Some(verifying_contract) = &self.domain.verifying_contract {
            crate::address::validate_address(&verifying_contract.to_ascii_lowercase())?;
        }

        if !self.message.is_object() {
            return Err(EthError::InvalidTypedData("message must be an object".into()));
        }
        Ok(())
    }
}

/// `chainId` as wallets send it: a JSON number, a decimal string or a
/// `0x` hex string.
fn deserialize_chain_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ChainId {
        Number(u64),
        Text(String),
    }

    let Some(raw) = Option::<ChainId>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match raw {
        ChainId::Number(id) => Ok(Some(id)),
        ChainId::Text(text) => parse_chain_id(&text)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid chainId {text:?}"))),
    }
}

fn parse_chain_id(text: &str) -> Option<u64> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(digits) => u64::from_str_radix(digits, 16).ok(),
        None => text.parse().ok(),
    }
}

fn strip_array_suffix(kind: &str) -> &str {
    let mut base = kind;
    while let Some(open) = base.rfind('[') {
        if !base.ends_with(']') {
            break;
        }
        base = &base[..open];
    }
    base
}

fn is_atomic(kind: &str) -> bool {
    match kind {
        "address" | "bool" | "string" | "bytes" => true,
        _ => {
            let sized = |prefix: &str, valid: fn(u32) -> bool| {
                kind.strip_prefix(prefix)
                    .and_then(|n| n.parse::<u32>().ok())
                    .is_some_and(valid)
            };
            sized("bytes", |n| (1..=32).contains(&n))
                || sized("uint", |n| n % 8 == 0 && (8..=256).contains(&n))
                || sized("int", |n| n % 8 == 0 && (8..=256).contains(&n))
        }
    }
}
