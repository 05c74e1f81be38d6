use crate::model::{RecordKey, ServingRecord};
use crate::{AdError, Result};
use bytes::Bytes;

/// platform_id, device, banner_id, banner_url, banner_text, category_id,
/// img_data, user_id.
pub const TUPLE_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum TupleValue {
    Null,
    Unsigned(u64),
    Integer(i64),
    Real(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl TupleValue {
    fn as_unsigned(&self, field: &str) -> Result<u64> {
        match self {
            Self::Unsigned(value) => Ok(*value),
            Self::Integer(value) => u64::try_from(*value)
                .map_err(|_| AdError::Decode(format!("negative {}: {}", field, value))),
            other => Err(AdError::Decode(format!(
                "could not parse {} from {:?}",
                field, other
            ))),
        }
    }

    fn as_text(&self, field: &str) -> Result<String> {
        match self {
            Self::Text(value) => Ok(value.clone()),
            other => Err(AdError::Decode(format!(
                "could not parse {} from {:?}",
                field, other
            ))),
        }
    }

    fn as_bytes(&self, field: &str) -> Result<Bytes> {
        match self {
            Self::Bytes(value) => Ok(Bytes::copy_from_slice(value)),
            other => Err(AdError::Decode(format!(
                "could not parse {} from {:?}",
                field, other
            ))),
        }
    }
}

pub fn encode_record(record: &ServingRecord) -> Vec<TupleValue> {
    vec![
        TupleValue::Unsigned(record.platform_id),
        TupleValue::Text(record.device.clone()),
        TupleValue::Unsigned(record.banner_id),
        TupleValue::Text(record.banner_url.clone()),
        TupleValue::Text(record.banner_text.clone()),
        TupleValue::Unsigned(record.category_id),
        TupleValue::Bytes(record.image.to_vec()),
        TupleValue::Unsigned(record.owner_user_id),
    ]
}

pub fn decode_record(tuple: &[TupleValue]) -> Result<ServingRecord> {
    if tuple.len() != TUPLE_LEN {
        return Err(AdError::Decode(format!("wrong tuple len: {}", tuple.len())));
    }

    Ok(ServingRecord {
        platform_id: tuple[0].as_unsigned("platform_id")?,
        device: tuple[1].as_text("device")?,
        banner_id: tuple[2].as_unsigned("banner_id")?,
        banner_url: tuple[3].as_text("banner_url")?,
        banner_text: tuple[4].as_text("banner_text")?,
        category_id: tuple[5].as_unsigned("category_id")?,
        image: tuple[6].as_bytes("img_data")?,
        owner_user_id: tuple[7].as_unsigned("user_id")?,
    })
}

/// Decodes only the primary key prefix, enough to delete a damaged tuple.
pub fn decode_key(tuple: &[TupleValue]) -> Result<RecordKey> {
    if tuple.len() < 3 {
        return Err(AdError::Decode(format!(
            "tuple too short for key: {}",
            tuple.len()
        )));
    }

    Ok(RecordKey {
        platform_id: tuple[0].as_unsigned("platform_id")?,
        device: tuple[1].as_text("device")?,
        banner_id: tuple[2].as_unsigned("banner_id")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ServingRecord {
        ServingRecord {
            platform_id: 2,
            device: "desktop".to_string(),
            banner_id: 111,
            banner_url: "http://example.com".to_string(),
            banner_text: "hello".to_string(),
            category_id: 1,
            image: Bytes::from_static(b"img"),
            owner_user_id: 1231231,
        }
    }

    #[test]
    fn test_decode_accepts_signed_storage_integers() {
        let mut tuple = encode_record(&sample());
        tuple[0] = TupleValue::Integer(2);
        tuple[2] = TupleValue::Integer(111);

        assert_eq!(decode_record(&tuple).unwrap(), sample());
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let mut tuple = encode_record(&sample());
        tuple.pop();

        assert!(matches!(decode_record(&tuple), Err(AdError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_mistyped_field() {
        let mut tuple = encode_record(&sample());
        tuple[6] = TupleValue::Text("not bytes".to_string());
        assert!(matches!(decode_record(&tuple), Err(AdError::Decode(_))));

        let mut tuple = encode_record(&sample());
        tuple[5] = TupleValue::Integer(-1);
        assert!(matches!(decode_record(&tuple), Err(AdError::Decode(_))));
    }

    #[test]
    fn test_key_survives_damaged_payload() {
        let mut tuple = encode_record(&sample());
        tuple[4] = TupleValue::Null;
        tuple.truncate(5);

        let key = decode_key(&tuple).unwrap();
        assert_eq!(key, sample().key());
    }
}
