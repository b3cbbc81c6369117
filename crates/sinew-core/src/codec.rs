//! Storage codecs for relationship link attributes.
//!
//! Links are persisted in heterogeneous low-level encodings inherited from
//! years of host-store history. Each attribute-backed [`StorageMode`] gets
//! one codec behind the [`ReferenceCodec`] interface, selected through
//! [`codec_for`] — call sites never branch on the mode themselves.
//!
//! Decoding is total over the absent case: a missing or empty raw value is an
//! empty id list, never an error. Anything else malformed is a
//! [`CodecError`], which the checker surfaces as an `invalid_storage` issue
//! rather than a panic. For attribute-backed modes `encode` is the exact
//! inverse of `decode`, and the empty list encodes to the canonical empty
//! form.
//!
//! Classification links and ownership columns have no codec: the former is
//! resolved through the host's classification system, the latter is an
//! intrinsic column on the source record.

use crate::model::EntityId;
use crate::schema::StorageMode;

/// A raw attribute value as stored by the host.
///
/// Text covers the decimal/JSON/delimited encodings; the store-native list
/// format is a binary blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Text(String),
    Blob(Vec<u8>),
}

impl RawValue {
    /// Returns `true` for the canonical empty payloads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Blob(b) => b.is_empty(),
        }
    }
}

/// A raw value that could not be decoded as a reference list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The mode stores text but the attribute held a blob.
    #[error("expected text payload, found a {0}-byte blob")]
    ExpectedText(usize),

    /// The mode stores a blob but the attribute held text.
    #[error("expected blob payload, found text {0:?}")]
    ExpectedBlob(String),

    /// A segment did not parse as a positive integer.
    #[error("malformed reference {raw:?}: expected a positive integer")]
    MalformedInteger {
        /// The offending segment.
        raw: String,
    },

    /// JSON payload was not an integer array.
    #[error("malformed JSON reference array: {0}")]
    MalformedJson(String),

    /// Blob framing did not match its declared element count.
    #[error("truncated blob: declared {declared} ids, payload holds {payload_bytes} bytes")]
    TruncatedBlob {
        /// Element count from the header.
        declared: usize,
        /// Bytes available after the header.
        payload_bytes: usize,
    },

    /// A list element was zero. Zero is the host's "unset" sentinel and is
    /// only meaningful for the single-reference slot, never inside a list.
    #[error("zero reference inside a list payload")]
    ZeroInList,
}

/// Encode/decode between an id list and one raw attribute encoding.
pub trait ReferenceCodec: Sync {
    /// Decode a raw attribute into an id list. Absent or empty raw is an
    /// empty list.
    fn decode(&self, raw: Option<&RawValue>) -> Result<Vec<EntityId>, CodecError>;

    /// Encode an id list into the canonical raw form for this mode.
    fn encode(&self, ids: &[EntityId]) -> RawValue;
}

/// Select the codec for an attribute-backed storage mode.
///
/// Returns `None` for [`StorageMode::ClassificationLink`] and
/// [`StorageMode::ComputedOwner`], which bypass the codec layer entirely.
#[must_use]
pub fn codec_for(mode: StorageMode) -> Option<&'static dyn ReferenceCodec> {
    match mode {
        StorageMode::SingleReference => Some(&SingleReference),
        StorageMode::ArrayNative => Some(&NativeArray),
        StorageMode::ArrayJson => Some(&JsonArray),
        StorageMode::DelimitedText => Some(&DelimitedText),
        StorageMode::ClassificationLink | StorageMode::ComputedOwner => None,
    }
}

fn expect_text(raw: &RawValue) -> Result<&str, CodecError> {
    match raw {
        RawValue::Text(s) => Ok(s),
        // An empty blob is indistinguishable from "never written".
        RawValue::Blob(b) if b.is_empty() => Ok(""),
        RawValue::Blob(b) => Err(CodecError::ExpectedText(b.len())),
    }
}

fn parse_id(segment: &str) -> Result<EntityId, CodecError> {
    let raw: u64 = segment
        .trim()
        .parse()
        .map_err(|_| CodecError::MalformedInteger {
            raw: segment.to_string(),
        })?;
    EntityId::new(raw).ok_or(CodecError::ZeroInList)
}

/// One id as decimal text. `""` and `"0"` both mean "no reference".
struct SingleReference;

impl ReferenceCodec for SingleReference {
    fn decode(&self, raw: Option<&RawValue>) -> Result<Vec<EntityId>, CodecError> {
        let Some(raw) = raw else { return Ok(Vec::new()) };
        let text = expect_text(raw)?.trim();
        if text.is_empty() || text == "0" {
            return Ok(Vec::new());
        }
        let raw_id: u64 = text.parse().map_err(|_| CodecError::MalformedInteger {
            raw: text.to_string(),
        })?;
        Ok(EntityId::new(raw_id).map_or_else(Vec::new, |id| vec![id]))
    }

    fn encode(&self, ids: &[EntityId]) -> RawValue {
        RawValue::Text(ids.first().map(ToString::to_string).unwrap_or_default())
    }
}

/// Store-native list blob: u32 LE element count, then u64 LE ids.
struct NativeArray;

const NATIVE_HEADER: usize = 4;
const NATIVE_ID_WIDTH: usize = 8;

impl ReferenceCodec for NativeArray {
    fn decode(&self, raw: Option<&RawValue>) -> Result<Vec<EntityId>, CodecError> {
        let Some(raw) = raw else { return Ok(Vec::new()) };
        let bytes = match raw {
            RawValue::Blob(b) => b.as_slice(),
            RawValue::Text(s) if s.is_empty() => return Ok(Vec::new()),
            RawValue::Text(s) => return Err(CodecError::ExpectedBlob(s.clone())),
        };
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        if bytes.len() < NATIVE_HEADER {
            return Err(CodecError::TruncatedBlob {
                declared: 0,
                payload_bytes: bytes.len(),
            });
        }

        let declared = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let payload = &bytes[NATIVE_HEADER..];
        if declared.checked_mul(NATIVE_ID_WIDTH) != Some(payload.len()) {
            return Err(CodecError::TruncatedBlob {
                declared,
                payload_bytes: payload.len(),
            });
        }

        let mut ids = Vec::with_capacity(declared);
        for chunk in payload.chunks_exact(NATIVE_ID_WIDTH) {
            let mut buf = [0_u8; NATIVE_ID_WIDTH];
            buf.copy_from_slice(chunk);
            let raw_id = u64::from_le_bytes(buf);
            ids.push(EntityId::new(raw_id).ok_or(CodecError::ZeroInList)?);
        }
        Ok(ids)
    }

    fn encode(&self, ids: &[EntityId]) -> RawValue {
        if ids.is_empty() {
            return RawValue::Blob(Vec::new());
        }
        let mut bytes = Vec::with_capacity(NATIVE_HEADER + ids.len() * NATIVE_ID_WIDTH);
        #[allow(clippy::cast_possible_truncation)]
        bytes.extend_from_slice(&(ids.len() as u32).to_le_bytes());
        for id in ids {
            bytes.extend_from_slice(&id.get().to_le_bytes());
        }
        RawValue::Blob(bytes)
    }
}

/// JSON integer array text.
struct JsonArray;

impl ReferenceCodec for JsonArray {
    fn decode(&self, raw: Option<&RawValue>) -> Result<Vec<EntityId>, CodecError> {
        let Some(raw) = raw else { return Ok(Vec::new()) };
        let text = expect_text(raw)?.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let raw_ids: Vec<u64> = serde_json::from_str(text)
            .map_err(|e| CodecError::MalformedJson(e.to_string()))?;
        raw_ids
            .into_iter()
            .map(|raw_id| EntityId::new(raw_id).ok_or(CodecError::ZeroInList))
            .collect()
    }

    fn encode(&self, ids: &[EntityId]) -> RawValue {
        let raw_ids: Vec<u64> = ids.iter().map(|id| id.get()).collect();
        // Serializing Vec<u64> cannot fail.
        RawValue::Text(serde_json::to_string(&raw_ids).unwrap_or_else(|_| "[]".to_string()))
    }
}

/// Comma-joined decimal text.
struct DelimitedText;

impl ReferenceCodec for DelimitedText {
    fn decode(&self, raw: Option<&RawValue>) -> Result<Vec<EntityId>, CodecError> {
        let Some(raw) = raw else { return Ok(Vec::new()) };
        let text = expect_text(raw)?.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        text.split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(parse_id)
            .collect()
    }

    fn encode(&self, ids: &[EntityId]) -> RawValue {
        let joined = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        RawValue::Text(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> EntityId {
        EntityId::new(raw).expect("nonzero test id")
    }

    fn codec(mode: StorageMode) -> &'static dyn ReferenceCodec {
        codec_for(mode).expect("attribute-backed mode")
    }

    const ATTRIBUTE_MODES: [StorageMode; 4] = [
        StorageMode::SingleReference,
        StorageMode::ArrayNative,
        StorageMode::ArrayJson,
        StorageMode::DelimitedText,
    ];

    // ── absent / empty handling ─────────────────────────────────────────────

    #[test]
    fn absent_raw_decodes_to_empty_for_every_mode() {
        for mode in ATTRIBUTE_MODES {
            assert_eq!(codec(mode).decode(None).expect("decode"), vec![]);
        }
    }

    #[test]
    fn empty_list_round_trips_to_canonical_empty_form() {
        for mode in ATTRIBUTE_MODES {
            let c = codec(mode);
            let encoded = c.encode(&[]);
            assert!(encoded.is_empty() || encoded == RawValue::Text("[]".to_string()));
            assert_eq!(c.decode(Some(&encoded)).expect("decode"), vec![]);
        }
    }

    #[test]
    fn strategy_table_has_no_codec_for_non_attribute_modes() {
        assert!(codec_for(StorageMode::ClassificationLink).is_none());
        assert!(codec_for(StorageMode::ComputedOwner).is_none());
    }

    // ── single reference ────────────────────────────────────────────────────

    #[test]
    fn single_decodes_zero_and_blank_as_unset() {
        let c = codec(StorageMode::SingleReference);
        assert_eq!(c.decode(Some(&RawValue::Text("0".into()))).expect("decode"), vec![]);
        assert_eq!(c.decode(Some(&RawValue::Text(" ".into()))).expect("decode"), vec![]);
        assert_eq!(
            c.decode(Some(&RawValue::Text("7".into()))).expect("decode"),
            vec![id(7)]
        );
    }

    #[test]
    fn single_rejects_garbage() {
        let c = codec(StorageMode::SingleReference);
        let err = c
            .decode(Some(&RawValue::Text("seven".into())))
            .expect_err("garbage");
        assert!(matches!(err, CodecError::MalformedInteger { .. }));
    }

    #[test]
    fn single_round_trips_one_id() {
        let c = codec(StorageMode::SingleReference);
        let encoded = c.encode(&[id(42)]);
        assert_eq!(encoded, RawValue::Text("42".into()));
        assert_eq!(c.decode(Some(&encoded)).expect("decode"), vec![id(42)]);
    }

    // ── native blob ─────────────────────────────────────────────────────────

    #[test]
    fn native_round_trips_preserving_order_and_duplicates() {
        let c = codec(StorageMode::ArrayNative);
        let list = vec![id(5), id(5), id(999)];
        let encoded = c.encode(&list);
        assert_eq!(c.decode(Some(&encoded)).expect("decode"), list);
    }

    #[test]
    fn native_rejects_truncated_payload() {
        let c = codec(StorageMode::ArrayNative);
        let RawValue::Blob(mut bytes) = c.encode(&[id(1), id(2)]) else {
            panic!("native encodes to blob");
        };
        bytes.pop();
        let err = c
            .decode(Some(&RawValue::Blob(bytes)))
            .expect_err("truncated");
        assert!(matches!(err, CodecError::TruncatedBlob { declared: 2, .. }));
    }

    #[test]
    fn native_rejects_zero_id() {
        let c = codec(StorageMode::ArrayNative);
        let mut bytes = 1_u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0_u64.to_le_bytes());
        let err = c.decode(Some(&RawValue::Blob(bytes))).expect_err("zero id");
        assert_eq!(err, CodecError::ZeroInList);
    }

    #[test]
    fn native_rejects_text_payload() {
        let c = codec(StorageMode::ArrayNative);
        let err = c
            .decode(Some(&RawValue::Text("5,6".into())))
            .expect_err("text into blob codec");
        assert!(matches!(err, CodecError::ExpectedBlob(_)));
    }

    // ── json array ──────────────────────────────────────────────────────────

    #[test]
    fn json_round_trips() {
        let c = codec(StorageMode::ArrayJson);
        let list = vec![id(2), id(1), id(2)];
        let encoded = c.encode(&list);
        assert_eq!(encoded, RawValue::Text("[2,1,2]".into()));
        assert_eq!(c.decode(Some(&encoded)).expect("decode"), list);
    }

    #[test]
    fn json_rejects_non_integer_members() {
        let c = codec(StorageMode::ArrayJson);
        for bad in ["{\"a\":1}", "[1,\"x\"]", "[1,-2]", "[1.5]"] {
            let err = c
                .decode(Some(&RawValue::Text(bad.into())))
                .expect_err(bad);
            assert!(matches!(err, CodecError::MalformedJson(_)), "input {bad}");
        }
    }

    #[test]
    fn json_rejects_zero_member() {
        let c = codec(StorageMode::ArrayJson);
        let err = c
            .decode(Some(&RawValue::Text("[3,0]".into())))
            .expect_err("zero member");
        assert_eq!(err, CodecError::ZeroInList);
    }

    // ── delimited text ──────────────────────────────────────────────────────

    #[test]
    fn delimited_round_trips_and_tolerates_spacing() {
        let c = codec(StorageMode::DelimitedText);
        let list = vec![id(10), id(20), id(10)];
        let encoded = c.encode(&list);
        assert_eq!(encoded, RawValue::Text("10,20,10".into()));
        assert_eq!(c.decode(Some(&encoded)).expect("decode"), list);

        assert_eq!(
            c.decode(Some(&RawValue::Text(" 10 , 20 ,, 30 ".into())))
                .expect("decode"),
            vec![id(10), id(20), id(30)]
        );
    }

    #[test]
    fn delimited_rejects_garbage_segment() {
        let c = codec(StorageMode::DelimitedText);
        let err = c
            .decode(Some(&RawValue::Text("10,abc".into())))
            .expect_err("garbage segment");
        assert!(matches!(err, CodecError::MalformedInteger { .. }));
    }
}
