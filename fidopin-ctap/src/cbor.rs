//! CBOR encoding and decoding for CTAP messages
//!
//! CTAP2 requires the canonical form from RFC 7049 §3.9: map keys must be
//! sorted by encoded length, then bytewise. [`MapBuilder`] enforces that
//! ordering on every map it produces, regardless of insertion order.

use crate::error::{CtapError, Result};

use std::collections::BTreeMap;

use ciborium::Value;
use serde::{Deserialize, Serialize};

/// Encode a value to CBOR bytes
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(value, &mut buffer).map_err(|_| CtapError::InvalidCbor)?;
    Ok(buffer)
}

/// Decode CBOR bytes to a value
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T> {
    ciborium::from_reader(data).map_err(|_| CtapError::InvalidCbor)
}

/// Encode value to CBOR Value for manual map construction
pub fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    Value::serialized(value).map_err(|_| CtapError::InvalidCbor)
}

/// Decode CBOR Value to typed value
pub fn from_value<T: for<'de> Deserialize<'de>>(value: &Value) -> Result<T> {
    value.deserialized().map_err(|_| CtapError::InvalidCbor)
}

/// Sort map entries into CTAP canonical order
///
/// Keys compare by the length of their encoding first, then by the encoded
/// bytes. Nested maps are sorted as well.
pub fn canonicalize(entries: Vec<(Value, Value)>) -> Result<Vec<(Value, Value)>> {
    let mut keyed = entries
        .into_iter()
        .map(|(k, v)| {
            let encoded = encode(&k)?;
            Ok((encoded, k, canonicalize_value(v)?))
        })
        .collect::<Result<Vec<_>>>()?;

    keyed.sort_by(|(a, _, _), (b, _, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    Ok(keyed.into_iter().map(|(_, k, v)| (k, v)).collect())
}

fn canonicalize_value(value: Value) -> Result<Value> {
    match value {
        Value::Map(entries) => Ok(Value::Map(canonicalize(entries)?)),
        Value::Array(items) => Ok(Value::Array(
            items
                .into_iter()
                .map(canonicalize_value)
                .collect::<Result<Vec<_>>>()?,
        )),
        other => Ok(other),
    }
}

/// Build a CBOR map with integer keys (common in CTAP)
#[derive(Debug, Default)]
pub struct MapBuilder {
    entries: Vec<(i32, Value)>,
}

impl MapBuilder {
    /// Create a new map builder
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert an integer key and value
    pub fn insert<T: Serialize>(mut self, key: i32, value: T) -> Result<Self> {
        self.entries.push((key, to_value(&value)?));
        Ok(self)
    }

    /// Insert an optional value (only if Some)
    pub fn insert_opt<T: Serialize>(self, key: i32, value: Option<T>) -> Result<Self> {
        match value {
            Some(v) => self.insert(key, v),
            None => Ok(self),
        }
    }

    /// Insert bytes as a CBOR byte string
    ///
    /// Serializing a `&[u8]` through serde produces an array of integers,
    /// which authenticators reject.
    pub fn insert_bytes(mut self, key: i32, bytes: &[u8]) -> Self {
        self.entries.push((key, Value::Bytes(bytes.to_vec())));
        self
    }

    /// Insert an already constructed CBOR value
    pub fn insert_value(mut self, key: i32, value: Value) -> Self {
        self.entries.push((key, value));
        self
    }

    /// Build the map and encode it to canonical CBOR bytes
    pub fn build(self) -> Result<Vec<u8>> {
        encode(&self.build_value()?)
    }

    /// Build the map as a canonically ordered CBOR Value
    pub fn build_value(self) -> Result<Value> {
        let entries = self
            .entries
            .into_iter()
            .map(|(k, v)| (Value::Integer(k.into()), v))
            .collect();
        Ok(Value::Map(canonicalize(entries)?))
    }
}

/// Parse a CBOR map with integer keys
#[derive(Debug, Clone)]
pub struct MapParser {
    map: BTreeMap<i128, Value>,
}

impl MapParser {
    /// Parse from CBOR bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let value: Value = ciborium::from_reader(data).map_err(|_| CtapError::InvalidCbor)?;
        Self::from_value(value)
    }

    /// Parse from a CBOR Value
    ///
    /// Non-integer keys are skipped; CTAP response maps never use them at
    /// the top level, but extensions nested inside may.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(pairs) => {
                let mut map = BTreeMap::new();
                for (k, v) in pairs {
                    if let Value::Integer(int_key) = k {
                        map.insert(int_key.into(), v);
                    }
                }
                Ok(Self { map })
            }
            _ => Err(CtapError::UnexpectedType(0)),
        }
    }

    /// Get a required value by key
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: i32) -> Result<T> {
        let value = self.get_raw(key).ok_or(CtapError::MissingParameter(key))?;
        from_value(value).map_err(|_| CtapError::UnexpectedType(key))
    }

    /// Get an optional value by key
    pub fn get_opt<T: for<'de> Deserialize<'de>>(&self, key: i32) -> Result<Option<T>> {
        match self.get_raw(key) {
            Some(value) => from_value(value)
                .map(Some)
                .map_err(|_| CtapError::UnexpectedType(key)),
            None => Ok(None),
        }
    }

    /// Check if a key exists
    pub fn contains_key(&self, key: i32) -> bool {
        self.map.contains_key(&i128::from(key))
    }

    /// Get the raw value stored under a key
    pub fn get_raw(&self, key: i32) -> Option<&Value> {
        self.map.get(&i128::from(key))
    }

    /// Get a CBOR byte string by key
    pub fn get_bytes(&self, key: i32) -> Result<Vec<u8>> {
        match self.get_raw(key) {
            Some(Value::Bytes(bytes)) => Ok(bytes.clone()),
            Some(_) => Err(CtapError::UnexpectedType(key)),
            None => Err(CtapError::MissingParameter(key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_builder() {
        let cbor = MapBuilder::new()
            .insert(1, "test")
            .unwrap()
            .insert(2, 42i32)
            .unwrap()
            .insert_bytes(3, &[1u8, 2, 3])
            .build()
            .unwrap();

        let parser = MapParser::from_bytes(&cbor).unwrap();
        let s: String = parser.get(1).unwrap();
        let i: i32 = parser.get(2).unwrap();

        assert_eq!(s, "test");
        assert_eq!(i, 42);
        assert_eq!(parser.get_bytes(3).unwrap(), vec![1u8, 2, 3]);
    }

    #[test]
    fn test_insert_bytes_encodes_byte_string() {
        let cbor = MapBuilder::new().insert_bytes(1, &[0xAA, 0xBB]).build().unwrap();
        // {1: h'AABB'}
        assert_eq!(cbor, vec![0xA1, 0x01, 0x42, 0xAA, 0xBB]);
    }

    #[test]
    fn test_keys_are_sorted_canonically() {
        let cbor = MapBuilder::new()
            .insert(6, 0u8)
            .unwrap()
            .insert(2, 0u8)
            .unwrap()
            .insert(-1, 0u8)
            .unwrap()
            .insert(1, 0u8)
            .unwrap()
            .build()
            .unwrap();

        // Positive integers (major type 0) encode before negative (major type 1)
        assert_eq!(
            cbor,
            vec![0xA4, 0x01, 0x00, 0x02, 0x00, 0x06, 0x00, 0x20, 0x00]
        );
    }

    #[test]
    fn test_shorter_keys_sort_first() {
        let cbor = MapBuilder::new()
            .insert(24, 0u8)
            .unwrap()
            .insert(-3, 0u8)
            .unwrap()
            .build()
            .unwrap();

        // -3 encodes to one byte (0x22), 24 needs two (0x18 0x18)
        assert_eq!(cbor, vec![0xA2, 0x22, 0x00, 0x18, 0x18, 0x00]);
    }

    #[test]
    fn test_nested_maps_are_sorted() {
        let inner = MapBuilder::new()
            .insert(-2, 0u8)
            .unwrap()
            .insert(3, 0u8)
            .unwrap()
            .build_value()
            .unwrap();
        let reversed = Value::Map(vec![
            (Value::Integer((-2i32).into()), Value::Integer(0i32.into())),
            (Value::Integer(3i32.into()), Value::Integer(0i32.into())),
        ]);
        let cbor = MapBuilder::new().insert_value(1, reversed).build().unwrap();
        let expected = MapBuilder::new().insert_value(1, inner).build().unwrap();
        assert_eq!(cbor, expected);
        assert_eq!(&cbor[2..], &[0xA2, 0x03, 0x00, 0x21, 0x00]);
    }

    #[test]
    fn test_map_builder_optional() {
        let cbor = MapBuilder::new()
            .insert(1, "required")
            .unwrap()
            .insert_opt(2, Some(42i32))
            .unwrap()
            .insert_opt::<i32>(3, None)
            .unwrap()
            .build()
            .unwrap();

        let parser = MapParser::from_bytes(&cbor).unwrap();
        assert!(parser.contains_key(1));
        assert!(parser.contains_key(2));
        assert!(!parser.contains_key(3));
    }

    #[test]
    fn test_map_parser_missing_key() {
        let cbor = MapBuilder::new().insert(1, "test").unwrap().build().unwrap();

        let parser = MapParser::from_bytes(&cbor).unwrap();
        let result: Result<String> = parser.get(99);
        assert_eq!(result.unwrap_err(), CtapError::MissingParameter(99));

        let opt: Option<String> = parser.get_opt(99).unwrap();
        assert_eq!(opt, None);
    }

    #[test]
    fn test_map_parser_wrong_type() {
        let cbor = MapBuilder::new().insert(3, "eight").unwrap().build().unwrap();

        let parser = MapParser::from_bytes(&cbor).unwrap();
        let result: Result<u32> = parser.get(3);
        assert_eq!(result.unwrap_err(), CtapError::UnexpectedType(3));
        assert_eq!(parser.get_bytes(3).unwrap_err(), CtapError::UnexpectedType(3));
    }

    #[test]
    fn test_parser_rejects_non_map() {
        let cbor = encode(&42u32).unwrap();
        assert!(MapParser::from_bytes(&cbor).is_err());
    }

    #[test]
    fn test_invalid_cbor() {
        let bad_data = vec![0xff, 0xff, 0xff];
        let result: Result<String> = decode(&bad_data);
        assert_eq!(result.unwrap_err(), CtapError::InvalidCbor);
        assert_eq!(
            MapParser::from_bytes(&bad_data).unwrap_err(),
            CtapError::InvalidCbor
        );
    }
}
