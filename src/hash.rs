//! Canonical hashing of structured records
//!
//! A record is reduced to a JSON value, written with object keys in sorted
//! order and no insignificant whitespace, then hashed with SHA-256. The key
//! ordering is enforced here rather than inherited from `serde_json`'s map
//! type, so enabling `preserve_order` anywhere in the build cannot change a
//! digest.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::types::Hash;

/// Records with a fixed canonical JSON shape
pub trait CanonicalForm {
    fn canonical_value(&self) -> Value;
}

/// Canonical text of a JSON value: sorted keys, `,` and `:` separators
pub fn canonical_text(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // String values render as escaped JSON string literals
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// SHA-256 of raw bytes, lowercase hex
pub fn sha256_hex(data: &[u8]) -> Hash {
    hex::encode(Sha256::digest(data))
}

/// Hash of a JSON value's canonical text
pub fn hash_value(value: &Value) -> Hash {
    sha256_hex(canonical_text(value).as_bytes())
}

/// Hash of a record with a fixed canonical shape
pub fn canonical_hash<T: CanonicalForm + ?Sized>(record: &T) -> Hash {
    hash_value(&record.canonical_value())
}

/// Hash of any serde record
pub fn hash_record<T: Serialize + ?Sized>(record: &T) -> Result<Hash> {
    Ok(hash_value(&serde_json::to_value(record)?))
}

/// True if the hex digest starts with `difficulty` `'0'` characters
pub fn has_leading_zeros(hash: &str, difficulty: u64) -> bool {
    let required = difficulty as usize;
    hash.len() >= required && hash.bytes().take(required).all(|b| b == b'0')
}
