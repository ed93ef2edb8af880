//! JSON value encoding for the two namespaces.
//!
//! The source id lives in the key, so decoding takes it back as an argument.

use crate::domain::entities::{BlockRecord, LatestPointer};
use crate::domain::errors::SerializationError;

pub fn encode_record(record: &BlockRecord) -> Result<Vec<u8>, SerializationError> {
    serde_json::to_vec(record).map_err(|e| SerializationError::new(e.to_string()))
}

pub fn decode_record(source_id: &str, bytes: &[u8]) -> Result<BlockRecord, SerializationError> {
    let mut record: BlockRecord =
        serde_json::from_slice(bytes).map_err(|e| SerializationError::new(e.to_string()))?;
    record.source_id = source_id.to_string();
    Ok(record)
}

pub fn encode_pointer(pointer: &LatestPointer) -> Result<Vec<u8>, SerializationError> {
    serde_json::to_vec(pointer).map_err(|e| SerializationError::new(e.to_string()))
}

pub fn decode_pointer(source_id: &str, bytes: &[u8]) -> Result<LatestPointer, SerializationError> {
    let mut pointer: LatestPointer =
        serde_json::from_slice(bytes).map_err(|e| SerializationError::new(e.to_string()))?;
    pointer.source_id = source_id.to_string();
    Ok(pointer)
}
