//! Primary key forms and identifier resolution
//!
//! A document's `_id` is either a short human-assigned string such as
//! `"0001"`, or a store-generated 12-byte object id written in JSON as
//! `{"$oid": "<24 hex digits>"}`. Callers only ever see a string, so a
//! lookup by id has to consider both encodings.
//!
//! [`resolve_candidates`] turns a caller-supplied string into the ordered
//! list of primary-key matchers to try. It never fails: malformed input
//! yields a single verbatim candidate that simply matches nothing.
//!
//! # Example
//!
//! ```
//! use taskboard_shared::store::identifier::{resolve_candidates, CandidateKind};
//!
//! let candidates = resolve_candidates("507f1f77bcf86cd799439011");
//! assert_eq!(candidates.len(), 2);
//! assert_eq!(candidates[0].kind, CandidateKind::Verbatim);
//! assert_eq!(candidates[1].kind, CandidateKind::HexDecoded);
//!
//! assert_eq!(resolve_candidates("0001").len(), 1);
//! ```

use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use super::filter::Filter;
use super::ID_FIELD;

/// Length of an object id in hex digits
pub const OBJECT_ID_HEX_LEN: usize = 24;

/// Key used for object ids in extended JSON
const OID_KEY: &str = "$oid";

static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

/// Error returned when a string is not a valid object id
#[derive(Debug, thiserror::Error)]
pub enum ObjectIdError {
    #[error("object id must be {OBJECT_ID_HEX_LEN} hex digits, got {0} characters")]
    InvalidLength(usize),

    #[error("object id is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// 12-byte store-generated identifier
///
/// Layout: 4-byte big-endian seconds since the epoch, 5 bytes unique to
/// the process, 3-byte big-endian counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Generates a fresh object id
    pub fn new() -> Self {
        let seconds = Utc::now().timestamp() as u32;
        let unique = PROCESS_UNIQUE.get_or_init(|| {
            let mut bytes = [0u8; 5];
            rand::thread_rng().fill_bytes(&mut bytes);
            bytes
        });
        let counter = COUNTER
            .get_or_init(|| AtomicU32::new(rand::thread_rng().next_u32()))
            .fetch_add(1, Ordering::Relaxed);

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(unique);
        bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..4]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Parses a 24-digit hex string
    pub fn parse_str(s: &str) -> Result<Self, ObjectIdError> {
        if s.len() != OBJECT_ID_HEX_LEN {
            return Err(ObjectIdError::InvalidLength(s.chars().count()));
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Lowercase hex form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = ObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

#[derive(Serialize, Deserialize)]
struct ExtendedOid {
    #[serde(rename = "$oid")]
    oid: String,
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ExtendedOid { oid: self.to_hex() }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let ext = ExtendedOid::deserialize(deserializer)?;
        ObjectId::parse_str(&ext.oid).map_err(serde::de::Error::custom)
    }
}

/// A primary key value in either of its stored forms
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentId {
    ObjectId(ObjectId),
    Text(String),
}

impl DocumentId {
    /// JSON form as written into `_id`
    pub fn to_value(&self) -> Value {
        match self {
            DocumentId::ObjectId(oid) => json!({ OID_KEY: oid.to_hex() }),
            DocumentId::Text(text) => Value::String(text.clone()),
        }
    }

    /// Reads a stored `_id` value; `None` for null or unsupported shapes
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(DocumentId::Text(text.clone())),
            Value::Object(map) => map
                .get(OID_KEY)
                .and_then(Value::as_str)
                .and_then(|hex| ObjectId::parse_str(hex).ok())
                .map(DocumentId::ObjectId),
            _ => None,
        }
    }

    /// The identifier as callers see it
    pub fn public_id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::ObjectId(oid) => write!(f, "{oid}"),
            DocumentId::Text(text) => f.write_str(text),
        }
    }
}

impl From<ObjectId> for DocumentId {
    fn from(oid: ObjectId) -> Self {
        DocumentId::ObjectId(oid)
    }
}

/// Rewrites an extended-JSON object id into its public hex string
///
/// Any other value is returned unchanged.
pub fn public_id_value(value: Value) -> Value {
    match DocumentId::from_value(&value) {
        Some(DocumentId::ObjectId(oid)) => Value::String(oid.to_hex()),
        _ => value,
    }
}

/// How a candidate interprets the caller's string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// The raw string compared to `_id` as-is
    Verbatim,

    /// The raw string decoded into an object id
    HexDecoded,
}

impl CandidateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateKind::Verbatim => "verbatim",
            CandidateKind::HexDecoded => "hex_decoded",
        }
    }
}

/// One primary-key matcher in resolution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub kind: CandidateKind,
    pub id: DocumentId,
}

impl Candidate {
    /// Filter selecting the document with this primary key
    pub fn filter(&self) -> Filter {
        Filter::eq(ID_FIELD, self.id.to_value())
    }
}

/// Produces the ordered primary-key candidates for a caller-supplied id
///
/// A 24-character input yields the verbatim string first and, if it decodes
/// as hex, the object id second. Every other input yields only the verbatim
/// string.
pub fn resolve_candidates(raw: &str) -> Vec<Candidate> {
    let mut candidates = vec![Candidate {
        kind: CandidateKind::Verbatim,
        id: DocumentId::Text(raw.to_string()),
    }];

    if raw.chars().count() == OBJECT_ID_HEX_LEN {
        if let Ok(oid) = ObjectId::parse_str(raw) {
            candidates.push(Candidate {
                kind: CandidateKind::HexDecoded,
                id: DocumentId::ObjectId(oid),
            });
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_has_single_candidate() {
        let candidates = resolve_candidates("0001");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].kind, CandidateKind::Verbatim);
        assert_eq!(candidates[0].id, DocumentId::Text("0001".to_string()));
    }

    #[test]
    fn test_hex_id_has_two_candidates_in_order() {
        let raw = "507f1f77bcf86cd799439011";
        let candidates = resolve_candidates(raw);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id, DocumentId::Text(raw.to_string()));
        assert_eq!(
            candidates[1].id,
            DocumentId::ObjectId(ObjectId::parse_str(raw).unwrap())
        );
    }

    #[test]
    fn test_24_chars_not_hex_drops_decoded_candidate() {
        let candidates = resolve_candidates("zzzzzzzzzzzzzzzzzzzzzzzz");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].kind, CandidateKind::Verbatim);
    }

    #[test]
    fn test_empty_and_odd_inputs_never_fail() {
        for raw in ["", " ", "507f1f77bcf86cd79943901", "507f1f77bcf86cd7994390111", "ü"] {
            let candidates = resolve_candidates(raw);
            assert_eq!(candidates.len(), 1, "input {raw:?}");
        }
    }

    #[test]
    fn test_multibyte_input_of_24_chars() {
        let raw = "é".repeat(24);
        let candidates = resolve_candidates(&raw);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_candidate_filters_target_primary_key() {
        let candidates = resolve_candidates("507f1f77bcf86cd799439011");
        assert_eq!(
            candidates[0].filter(),
            Filter::eq("_id", "507f1f77bcf86cd799439011")
        );
        assert_eq!(
            candidates[1].filter(),
            Filter::eq("_id", json!({"$oid": "507f1f77bcf86cd799439011"}))
        );
    }

    #[test]
    fn test_object_id_parse_and_display() {
        let oid = ObjectId::parse_str("507F1F77BCF86CD799439011").unwrap();
        assert_eq!(oid.to_string(), "507f1f77bcf86cd799439011");
        assert!(matches!(
            ObjectId::parse_str("abc"),
            Err(ObjectIdError::InvalidLength(3))
        ));
        assert!(matches!(
            ObjectId::parse_str("g07f1f77bcf86cd799439011"),
            Err(ObjectIdError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_generated_object_ids_are_unique() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert_eq!(a.bytes()[4..9], b.bytes()[4..9]);
    }

    #[test]
    fn test_document_id_json_forms() {
        let oid = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        let value = DocumentId::ObjectId(oid).to_value();
        assert_eq!(value, json!({"$oid": "507f1f77bcf86cd799439011"}));
        assert_eq!(DocumentId::from_value(&value), Some(DocumentId::ObjectId(oid)));

        let parsed: DocumentId = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, DocumentId::ObjectId(oid));

        let text: DocumentId = serde_json::from_value(json!("0001")).unwrap();
        assert_eq!(text, DocumentId::Text("0001".to_string()));
        assert_eq!(DocumentId::from_value(&Value::Null), None);
    }

    #[test]
    fn test_public_id_value() {
        assert_eq!(
            public_id_value(json!({"$oid": "507f1f77bcf86cd799439011"})),
            json!("507f1f77bcf86cd799439011")
        );
        assert_eq!(public_id_value(json!("0001")), json!("0001"));
    }
}
