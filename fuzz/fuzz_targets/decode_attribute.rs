#![no_main]

use libfuzzer_sys::fuzz_target;
use sinew_core::codec::{RawValue, codec_for};
use sinew_core::schema::StorageMode;

// Decoding must never panic on arbitrary blob bytes, and any list that
// decodes must re-encode to a payload that decodes to the same list.
fuzz_target!(|data: &[u8]| {
    let codec = codec_for(StorageMode::ArrayNative).expect("native codec");
    if let Ok(ids) = codec.decode(Some(&RawValue::Blob(data.to_vec()))) {
        let encoded = codec.encode(&ids);
        let round = codec.decode(Some(&encoded)).expect("re-decode");
        assert_eq!(round, ids);
    }
});
