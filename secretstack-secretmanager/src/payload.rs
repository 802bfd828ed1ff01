//! Secret payload bytes and their JSON form

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Payload of a secret version.
///
/// JSON carries `data` as standard base64 and `data_crc32c` as a decimal
/// string, matching the int64 rendering of the real API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPayload {
    #[serde(
        default,
        serialize_with = "serialize_base64",
        deserialize_with = "deserialize_base64"
    )]
    pub data: Bytes,
    #[serde(
        default,
        alias = "dataCrc32c",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_crc",
        deserialize_with = "deserialize_crc"
    )]
    pub data_crc32c: Option<u32>,
}

impl SecretPayload {
    /// Wrap `data`, computing its checksum
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let crc = crc32c::crc32c(&data);
        Self {
            data,
            data_crc32c: Some(crc),
        }
    }

    /// `Some(false)` when the caller supplied a checksum that does not match
    pub fn checksum_matches(&self) -> Option<bool> {
        self.data_crc32c
            .map(|expected| crc32c::crc32c(&self.data) == expected)
    }
}

fn serialize_base64<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(data))
}

fn deserialize_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD
        .decode(encoded.as_bytes())
        .map(Bytes::from)
        .map_err(|e| serde::de::Error::custom(format!("invalid base64 payload: {}", e)))
}

fn serialize_crc<S: Serializer>(crc: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
    match crc {
        Some(value) => serializer.serialize_str(&value.to_string()),
        None => serializer.serialize_none(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CrcRepr {
    Number(u64),
    Text(String),
}

fn deserialize_crc<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let value = match Option::<CrcRepr>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(CrcRepr::Number(n)) => n,
        Some(CrcRepr::Text(s)) => s
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid data_crc32c: {}", s)))?,
    };
    u32::try_from(value)
        .map(Some)
        .map_err(|_| serde::de::Error::custom(format!("data_crc32c out of range: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let payload = SecretPayload::new(&b"hunter2"[..]);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["data"], "aHVudGVyMg==");
        assert_eq!(
            json["data_crc32c"],
            crc32c::crc32c(b"hunter2").to_string()
        );
    }

    #[test]
    fn test_decode_without_checksum() {
        let payload: SecretPayload = serde_json::from_str(r#"{"data":"aHVudGVyMg=="}"#).unwrap();
        assert_eq!(payload.data, Bytes::from_static(b"hunter2"));
        assert_eq!(payload.checksum_matches(), None);
    }

    #[test]
    fn test_checksum_validation() {
        let good = format!(
            r#"{{"data":"aHVudGVyMg==","data_crc32c":{}}}"#,
            crc32c::crc32c(b"hunter2")
        );
        let payload: SecretPayload = serde_json::from_str(&good).unwrap();
        assert_eq!(payload.checksum_matches(), Some(true));

        let bad: SecretPayload =
            serde_json::from_str(r#"{"data":"aHVudGVyMg==","data_crc32c":"1"}"#).unwrap();
        assert_eq!(bad.checksum_matches(), Some(false));
    }

    #[test]
    fn test_omitted_data_is_empty() {
        let payload: SecretPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.data.is_empty());
        assert_eq!(payload.checksum_matches(), None);
    }

    #[test]
    fn test_camel_case_checksum() {
        let bad: SecretPayload =
            serde_json::from_str(r#"{"data":"aGk=","dataCrc32c":"1"}"#).unwrap();
        assert_eq!(bad.data_crc32c, Some(1));
        assert_eq!(bad.checksum_matches(), Some(false));
    }

    #[test]
    fn test_rejects_bad_base64() {
        let result: Result<SecretPayload, _> = serde_json::from_str(r#"{"data":"%%%"}"#);
        assert!(result.is_err());
    }
}
