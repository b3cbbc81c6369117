#![no_main]

use libfuzzer_sys::fuzz_target;
use sinew_core::codec::{RawValue, codec_for};
use sinew_core::schema::StorageMode;

fuzz_target!(|text: String| {
    for mode in [
        StorageMode::SingleReference,
        StorageMode::ArrayJson,
        StorageMode::DelimitedText,
    ] {
        let codec = codec_for(mode).expect("text codec");
        if let Ok(ids) = codec.decode(Some(&RawValue::Text(text.clone()))) {
            let encoded = codec.encode(&ids);
            let round = codec.decode(Some(&encoded)).expect("re-decode");
            assert_eq!(round, ids);
        }
    }
});
