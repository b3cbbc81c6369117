//! Property tests for the storage codecs.
//!
//! The load-bearing invariant: `decode(encode(L)) == L` for every
//! attribute-backed storage mode and any id list `L` the mode can represent
//! (duplicates and order preserved), and decoding never panics on arbitrary
//! input.

use proptest::prelude::*;

use sinew_core::codec::{codec_for, RawValue};
use sinew_core::model::EntityId;
use sinew_core::schema::StorageMode;

fn arb_id() -> impl Strategy<Value = EntityId> {
    (1_u64..=u64::MAX).prop_map(|raw| EntityId::new(raw).expect("strategy excludes zero"))
}

fn arb_id_list() -> impl Strategy<Value = Vec<EntityId>> {
    prop::collection::vec(arb_id(), 0..32)
}

const LIST_MODES: [StorageMode; 3] = [
    StorageMode::ArrayNative,
    StorageMode::ArrayJson,
    StorageMode::DelimitedText,
];

proptest! {
    #[test]
    fn list_modes_round_trip(ids in arb_id_list()) {
        for mode in LIST_MODES {
            let codec = codec_for(mode).expect("attribute-backed mode");
            let encoded = codec.encode(&ids);
            let decoded = codec.decode(Some(&encoded)).expect("round trip decodes");
            prop_assert_eq!(&decoded, &ids, "mode {}", mode);
        }
    }

    #[test]
    fn single_mode_round_trips_zero_or_one(id in arb_id()) {
        let codec = codec_for(StorageMode::SingleReference).expect("attribute-backed mode");

        let encoded = codec.encode(&[id]);
        prop_assert_eq!(codec.decode(Some(&encoded)).expect("decode"), vec![id]);

        let empty = codec.encode(&[]);
        prop_assert_eq!(codec.decode(Some(&empty)).expect("decode"), vec![]);
    }

    #[test]
    fn decoding_arbitrary_text_never_panics(text in ".*") {
        for mode in [
            StorageMode::SingleReference,
            StorageMode::ArrayJson,
            StorageMode::DelimitedText,
        ] {
            let codec = codec_for(mode).expect("attribute-backed mode");
            let _ = codec.decode(Some(&RawValue::Text(text.clone())));
        }
    }

    #[test]
    fn decoding_arbitrary_blobs_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let codec = codec_for(StorageMode::ArrayNative).expect("attribute-backed mode");
        let _ = codec.decode(Some(&RawValue::Blob(bytes)));
    }

    #[test]
    fn decode_is_total_over_valid_payload_prefix_corruption(ids in arb_id_list()) {
        // Chopping bytes off a valid native payload must yield an error or a
        // list, never a panic.
        let codec = codec_for(StorageMode::ArrayNative).expect("attribute-backed mode");
        if let RawValue::Blob(bytes) = codec.encode(&ids) {
            for cut in 0..bytes.len() {
                let _ = codec.decode(Some(&RawValue::Blob(bytes[..cut].to_vec())));
            }
        }
    }
}
