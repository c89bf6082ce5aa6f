/// Key layout for Fjall partitions
///
/// Partition structure:
/// - `records`: rec:{record_id} -> HistoryRecord (JSON)
/// - `metadata`: meta:{key} -> value (string)
///
/// Record ids are UUIDv7, so lexicographic key order is creation order
/// and range scans walk history oldest-first.

/// Encode a record key: rec:{record_id}
pub fn encode_record_key(record_id: &str) -> Vec<u8> {
    format!("rec:{}", record_id).into_bytes()
}

/// Decode a record key: rec:{record_id} -> record_id
pub fn decode_record_key(key: &[u8]) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str.strip_prefix("rec:").map(String::from)
}

/// Encode a metadata key: meta:{key}
pub fn encode_meta_key(key: &str) -> Vec<u8> {
    format!("meta:{}", key).into_bytes()
}
