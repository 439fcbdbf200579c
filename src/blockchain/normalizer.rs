use num_bigint::BigUint;

use crate::blockchain::event_schema::{EventSchema, ParamKind, ParamLocation, TOKENS_LOCKED};
use crate::error::NormalizationError;
use crate::models::{CanonicalTransferRecord, RawLog};

pub const TRANSACTION_ID_FIELD: &str = "transactionId";
pub const DESTINATION_CHAIN_ID_FIELD: &str = "destinationChainId";
pub const RECIPIENT_FIELD: &str = "recipient";
pub const AMOUNT_FIELD: &str = "amount";

/// Turns `TokensLocked`-shaped logs into canonical transfer records
pub struct EventNormalizer {
    schema: EventSchema,
    topic0: String,
}

impl EventNormalizer {
    pub fn new(schema: EventSchema) -> Self {
        let topic0 = schema.topic0();
        Self { schema, topic0 }
    }

    pub fn tokens_locked() -> Self {
        Self::new(TOKENS_LOCKED.clone())
    }

    pub fn schema(&self) -> &EventSchema {
        &self.schema
    }

    pub fn topic0(&self) -> &str {
        &self.topic0
    }

    /// Check that every field the record needs is declared with the right type
    pub fn check_schema(&self) -> Result<(), NormalizationError> {
        self.expect_kind(TRANSACTION_ID_FIELD, ParamKind::Bytes32)?;
        self.expect_kind(DESTINATION_CHAIN_ID_FIELD, ParamKind::Uint256)?;
        self.expect_kind(RECIPIENT_FIELD, ParamKind::Address)?;
        self.expect_kind(AMOUNT_FIELD, ParamKind::Uint256)?;
        Ok(())
    }

    /// Check if a log carries this event's signature
    pub fn matches(&self, log: &RawLog) -> bool {
        log.topics
            .first()
            .map(|topic| normalize_address(topic) == normalize_address(&self.topic0))
            .unwrap_or(false)
    }

    /// Decode a raw log into a CanonicalTransferRecord
    pub fn normalize(&self, log: &RawLog) -> Result<CanonicalTransferRecord, NormalizationError> {
        if log.removed {
            return Err(NormalizationError::RemovedLog);
        }

        let signature = log.topics.first().ok_or(NormalizationError::MissingTopic { index: 0 })?;
        if !self.matches(log) {
            return Err(NormalizationError::EventSignature {
                expected: self.topic0.clone(),
                got: signature.clone(),
            });
        }

        let expected_topics = 1 + self.schema.indexed_count();
        if log.topics.len() != expected_topics {
            return Err(NormalizationError::TopicCount {
                expected: expected_topics,
                got: log.topics.len(),
            });
        }

        let data = decode_hex(&log.data)?;
        if data.len() < self.schema.data_len() {
            return Err(NormalizationError::InsufficientData {
                expected: self.schema.data_len(),
                got: data.len(),
            });
        }

        let transaction_id = self.word(log, &data, TRANSACTION_ID_FIELD, ParamKind::Bytes32)?;
        let chain_id = self.word(log, &data, DESTINATION_CHAIN_ID_FIELD, ParamKind::Uint256)?;
        let recipient = self.word(log, &data, RECIPIENT_FIELD, ParamKind::Address)?;
        let amount = self.word(log, &data, AMOUNT_FIELD, ParamKind::Uint256)?;

        let chain_id = BigUint::from_bytes_be(&chain_id);
        let destination_chain_id = u64::try_from(&chain_id)
            .map_err(|_| NormalizationError::Overflow(format!("destinationChainId {} exceeds u64", chain_id)))?;

        Ok(CanonicalTransferRecord {
            transaction_id: format!("0x{}", hex::encode(transaction_id)),
            destination_chain_id,
            recipient: address_from_word(&recipient)?,
            amount: BigUint::from_bytes_be(&amount).to_string(),
            source_tx_hash: normalize_hash(&log.transaction_hash)?,
            block_number: log.block_number,
        })
    }

    fn expect_kind(&self, field: &str, kind: ParamKind) -> Result<(), NormalizationError> {
        let param = self
            .schema
            .find(field)
            .ok_or_else(|| NormalizationError::MissingField(field.to_string()))?;
        if param.kind != kind {
            return Err(NormalizationError::FieldType {
                field: field.to_string(),
                expected: kind.solidity_type().to_string(),
                actual: param.kind.solidity_type().to_string(),
            });
        }
        Ok(())
    }

    fn word(&self, log: &RawLog, data: &[u8], field: &str, kind: ParamKind) -> Result<[u8; 32], NormalizationError> {
        self.expect_kind(field, kind)?;
        let location = self
            .schema
            .locate(field)
            .ok_or_else(|| NormalizationError::MissingField(field.to_string()))?;

        let bytes = match location {
            ParamLocation::Topic(index) => {
                let topic = log.topics.get(index).ok_or(NormalizationError::MissingTopic { index })?;
                decode_hex(topic)?
            }
            ParamLocation::Data(word) => data[word * 32..(word + 1) * 32].to_vec(),
        };

        <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| NormalizationError::InsufficientData {
            expected: 32,
            got: bytes.len(),
        })
    }
}

/// Trim a hex string and drop its `0x` / `0X` prefix, if any
pub fn strip_hex_prefix(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Normalize an Ethereum address or hash to lowercase without 0x prefix
pub fn normalize_address(address: &str) -> String {
    strip_hex_prefix(address).to_lowercase()
}

/// Validate that an address is a valid Ethereum address format
pub fn validate_address(address: &str) -> Result<(), NormalizationError> {
    let normalized = normalize_address(address);

    if normalized.len() != 40 {
        return Err(NormalizationError::InvalidAddress(format!(
            "Address must be 40 characters long, got {}",
            normalized.len()
        )));
    }

    if !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(NormalizationError::InvalidAddress(
            "Address contains non-hexadecimal characters".to_string(),
        ));
    }

    Ok(())
}

fn decode_hex(value: &str) -> Result<Vec<u8>, NormalizationError> {
    hex::decode(normalize_address(value)).map_err(|e| NormalizationError::InvalidHex(format!("{}: {}", value, e)))
}

/// Addresses are left-padded to 32 bytes; the padding must be zero
fn address_from_word(word: &[u8; 32]) -> Result<String, NormalizationError> {
    if word[..12].iter().any(|b| *b != 0) {
        return Err(NormalizationError::InvalidAddress(format!(
            "0x{} has non-zero padding",
            hex::encode(word)
        )));
    }
    Ok(format!("0x{}", hex::encode(&word[12..])))
}

fn normalize_hash(hash: &str) -> Result<String, NormalizationError> {
    let bytes = decode_hex(hash)?;
    if bytes.len() != 32 {
        return Err(NormalizationError::InvalidHex(format!(
            "transaction hash {} is {} bytes, expected 32",
            hash,
            bytes.len()
        )));
    }
    Ok(format!("0x{}", hex::encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic_for_address(address: &str) -> String {
        format!("0x{:0>64}", normalize_address(address))
    }

    fn word_for(value: u128) -> String {
        format!("{:064x}", value)
    }

    fn tokens_locked_log(transaction_id: &str, chain_id: u128, recipient: &str, amount: u128) -> RawLog {
        RawLog {
            address: "0x5fbdb2315678afecb367f032d93f642f64180aa3".to_string(),
            topics: vec![
                TOKENS_LOCKED.topic0(),
                topic_for_address("0x1111111111111111111111111111111111111111"),
                topic_for_address(recipient),
                transaction_id.to_string(),
            ],
            data: format!("0x{}{}", word_for(chain_id), word_for(amount)),
            block_number: 42,
            transaction_hash: format!("0x{}", "CD".repeat(32)),
            log_index: 3,
            removed: false,
        }
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(
            normalize_address("0xF977814e90dA44bFA03b6295A0616a897441aceC"),
            "f977814e90da44bfa03b6295a0616a897441acec"
        );
        assert_eq!(
            normalize_address("0X455E53847F9F0F0B0FCF0B0B0B0B0B0B0B0B0B0B"),
            "455e53847f9f0f0b0fcf0b0b0b0b0b0b0b0b0b0b"
        );
    }

    #[test]
    fn test_strip_hex_prefix() {
        assert_eq!(strip_hex_prefix(" 0xAbCd "), "AbCd");
        assert_eq!(strip_hex_prefix("0XAbCd"), "AbCd");
        assert_eq!(strip_hex_prefix("abcd"), "abcd");
        assert_eq!(strip_hex_prefix("0x"), "");
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address("0xf977814e90da44bfa03b6295a0616a897441acec").is_ok());
        assert!(validate_address("f977814e90da44bfa03b6295a0616a897441acec").is_ok());

        assert!(validate_address("0xf977814e90da44bfa03b6295a0616a897441ace").is_err());
        assert!(validate_address("0xg977814e90da44bfa03b6295a0616a897441acec").is_err());
    }

    #[test]
    fn test_normalize_tokens_locked() {
        let normalizer = EventNormalizer::tokens_locked();
        let tx_id = format!("0x{}", "AA".repeat(32));
        let recipient = format!("0x{}", "bb".repeat(20));
        let log = tokens_locked_log(&tx_id, 5, &recipient, 1000);

        let record = normalizer.normalize(&log).unwrap();

        assert_eq!(record.transaction_id, format!("0x{}", "aa".repeat(32)));
        assert_eq!(record.destination_chain_id, 5);
        assert_eq!(record.recipient, recipient);
        assert_eq!(record.amount, "1000");
        assert_eq!(record.source_tx_hash, format!("0x{}", "cd".repeat(32)));
        assert_eq!(record.block_number, 42);
    }

    #[test]
    fn test_amount_keeps_full_uint256_precision() {
        let normalizer = EventNormalizer::tokens_locked();
        let mut log = tokens_locked_log(&format!("0x{}", "01".repeat(32)), 1, &format!("0x{}", "22".repeat(20)), 0);
        log.data = format!("0x{}{}", word_for(1), "f".repeat(64));

        let record = normalizer.normalize(&log).unwrap();
        assert_eq!(
            record.amount,
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
    }

    #[test]
    fn test_rejects_wrong_signature() {
        let normalizer = EventNormalizer::tokens_locked();
        let mut log = tokens_locked_log(&format!("0x{}", "aa".repeat(32)), 5, &format!("0x{}", "bb".repeat(20)), 1);
        log.topics[0] = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef".to_string();

        assert!(!normalizer.matches(&log));
        assert!(matches!(
            normalizer.normalize(&log),
            Err(NormalizationError::EventSignature { .. })
        ));
    }

    #[test]
    fn test_rejects_missing_topics_and_short_data() {
        let normalizer = EventNormalizer::tokens_locked();
        let base = tokens_locked_log(&format!("0x{}", "aa".repeat(32)), 5, &format!("0x{}", "bb".repeat(20)), 1);

        let mut missing_topic = base.clone();
        missing_topic.topics.pop();
        assert_eq!(
            normalizer.normalize(&missing_topic),
            Err(NormalizationError::TopicCount { expected: 4, got: 3 })
        );

        let mut short_data = base.clone();
        short_data.data = format!("0x{}", word_for(5));
        assert_eq!(
            normalizer.normalize(&short_data),
            Err(NormalizationError::InsufficientData { expected: 64, got: 32 })
        );

        let mut bad_hex = base.clone();
        bad_hex.data = "0xzz".to_string();
        assert!(matches!(normalizer.normalize(&bad_hex), Err(NormalizationError::InvalidHex(_))));

        let mut no_topics = base;
        no_topics.topics.clear();
        assert_eq!(
            normalizer.normalize(&no_topics),
            Err(NormalizationError::MissingTopic { index: 0 })
        );
    }

    #[test]
    fn test_rejects_dirty_address_padding() {
        let normalizer = EventNormalizer::tokens_locked();
        let mut log = tokens_locked_log(&format!("0x{}", "aa".repeat(32)), 5, &format!("0x{}", "bb".repeat(20)), 1);
        log.topics[2] = format!("0x{}", "ff".repeat(32));

        assert!(matches!(normalizer.normalize(&log), Err(NormalizationError::InvalidAddress(_))));
    }

    #[test]
    fn test_rejects_chain_id_above_u64() {
        let normalizer = EventNormalizer::tokens_locked();
        let log = tokens_locked_log(
            &format!("0x{}", "aa".repeat(32)),
            u64::MAX as u128 + 1,
            &format!("0x{}", "bb".repeat(20)),
            1,
        );

        assert!(matches!(normalizer.normalize(&log), Err(NormalizationError::Overflow(_))));
    }

    #[test]
    fn test_rejects_removed_log() {
        let normalizer = EventNormalizer::tokens_locked();
        let mut log = tokens_locked_log(&format!("0x{}", "aa".repeat(32)), 5, &format!("0x{}", "bb".repeat(20)), 1);
        log.removed = true;

        assert_eq!(normalizer.normalize(&log), Err(NormalizationError::RemovedLog));
    }

    #[test]
    fn test_check_schema() {
        assert!(EventNormalizer::tokens_locked().check_schema().is_ok());

        let wrong_type = EventSchema::new("TokensLocked")
            .param("destinationChainId", ParamKind::Uint256, false)
            .param("recipient", ParamKind::Address, true)
            .param("amount", ParamKind::Uint256, false)
            .param("transactionId", ParamKind::Uint256, true);
        assert!(matches!(
            EventNormalizer::new(wrong_type).check_schema(),
            Err(NormalizationError::FieldType { .. })
        ));

        let missing = EventSchema::new("TokensLocked").param("amount", ParamKind::Uint256, false);
        assert_eq!(
            EventNormalizer::new(missing).check_schema(),
            Err(NormalizationError::MissingField(TRANSACTION_ID_FIELD.to_string()))
        );
    }

    #[test]
    fn test_schema_with_reordered_fields() {
        let schema = EventSchema::new("BridgeDeposit")
            .param("transactionId", ParamKind::Bytes32, true)
            .param("amount", ParamKind::Uint256, false)
            .param("recipient", ParamKind::Address, true)
            .param("destinationChainId", ParamKind::Uint256, false);
        let normalizer = EventNormalizer::new(schema);

        let log = RawLog {
            address: "0x5fbdb2315678afecb367f032d93f642f64180aa3".to_string(),
            topics: vec![
                normalizer.topic0().to_string(),
                format!("0x{}", "0e".repeat(32)),
                topic_for_address("0x2222222222222222222222222222222222222222"),
            ],
            data: format!("0x{}{}", word_for(777), word_for(10)),
            block_number: 9,
            transaction_hash: format!("0x{}", "01".repeat(32)),
            log_index: 0,
            removed: false,
        };

        let record = normalizer.normalize(&log).unwrap();
        assert_eq!(record.transaction_id, format!("0x{}", "0e".repeat(32)));
        assert_eq!(record.amount, "777");
        assert_eq!(record.destination_chain_id, 10);
        assert_eq!(record.recipient, "0x2222222222222222222222222222222222222222");
    }
}
