//! Bincode wrappers for the persisted metadata blob.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Serialize a value using bincode.
pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| Error::Corruption(format!("encode: {e}")))
}

/// Deserialize a value from a byte slice using bincode.
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| Error::Corruption(format!("decode: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestStruct {
        id: u32,
        count: u64,
    }

    #[test]
    fn test_roundtrip() {
        let original = TestStruct { id: 7, count: 42 };
        let bytes = serialize(&original).unwrap();
        let decoded: TestStruct = deserialize(&bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_truncated_data_fails() {
        let bytes = serialize(&TestStruct { id: 7, count: 42 }).unwrap();
        let result: Result<TestStruct> = deserialize(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(Error::Corruption(_))));
    }
}
