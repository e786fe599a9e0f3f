#![no_main]
use bicom::{Codec, CodecOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let codec = Codec::new(CodecOptions {
        window_size: 4096,
        ..Default::default()
    })
    .unwrap();
    let text = codec.decompress(data).unwrap();
    assert_eq!(codec.compress(&text).unwrap(), data);
});
