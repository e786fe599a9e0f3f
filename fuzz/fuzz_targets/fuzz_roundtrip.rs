#![no_main]
use bicom::{Codec, CodecOptions, Passphrase};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // Byte 0: window size (log2, 4-16) and whether to encrypt
    let window_size = 1usize << (4 + (data[0] & 0x0f) % 13);
    let passphrase = if data[0] & 0x80 != 0 {
        Some(Passphrase::from_bytes(b"fuzz".to_vec()).unwrap())
    } else {
        None
    };

    let input = &data[1..];
    let codec = Codec::new(CodecOptions {
        window_size,
        passphrase,
    })
    .unwrap();
    let packed = codec.compress(input).unwrap();
    assert_eq!(codec.decompress(&packed).unwrap(), input);
});
