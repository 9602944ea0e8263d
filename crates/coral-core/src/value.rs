//! Stored value types.

use ahash::AHashMap;
use bytes::Bytes;

/// A value held at a key: an opaque byte string or a field map.
///
/// Neither keys, string payloads, nor hash fields are required to be
/// UTF-8 — everything is binary-safe end to end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Opaque byte sequence.
    Str(Bytes),

    /// Field → value map. Field order is not preserved.
    Hash(AHashMap<Bytes, Bytes>),
}

impl Value {
    /// Returns `true` if this is the string variant.
    pub fn is_str(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    /// Returns `true` if this is the hash variant.
    pub fn is_hash(&self) -> bool {
        matches!(self, Value::Hash(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_probes() {
        assert!(Value::Str(Bytes::new()).is_str());
        assert!(!Value::Str(Bytes::new()).is_hash());
        assert!(Value::Hash(AHashMap::new()).is_hash());
    }
}
