//! Property tests: compression and decompression are inverse bijections.

use bicom::{Codec, CodecOptions, Passphrase};
use proptest::prelude::*;

fn codec(window_size: usize, passphrase: Option<&str>) -> Codec {
    Codec::new(CodecOptions {
        window_size,
        passphrase: passphrase.map(|p| Passphrase::parse(p).unwrap()),
    })
    .unwrap()
}

/// Byte strings that are mostly low-entropy, to reach deep contexts.
fn skewed_bytes(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![
            8 => prop::sample::select(b"aab \n".to_vec()),
            1 => any::<u8>(),
        ],
        0..max_len,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_compress_then_decompress(input in prop::collection::vec(any::<u8>(), 0..600)) {
        let codec = codec(4096, None);
        let packed = codec.compress(&input).unwrap();
        prop_assert_eq!(codec.decompress(&packed).unwrap(), input);
    }

    #[test]
    fn test_decompress_then_compress(input in prop::collection::vec(any::<u8>(), 0..600)) {
        let codec = codec(4096, None);
        let text = codec.decompress(&input).unwrap();
        prop_assert_eq!(codec.compress(&text).unwrap(), input);
    }

    #[test]
    fn test_small_window_roundtrip(input in skewed_bytes(2000), window in 16usize..200) {
        let codec = codec(window, None);
        let packed = codec.compress(&input).unwrap();
        prop_assert_eq!(codec.decompress(&packed).unwrap(), input);
    }

    #[test]
    fn test_trailing_zeros_survive(prefix in skewed_bytes(100), zeros in 0usize..40) {
        let codec = codec(4096, None);
        let mut input = prefix;
        input.extend(std::iter::repeat(0).take(zeros));
        let text = codec.decompress(&input).unwrap();
        prop_assert_eq!(codec.compress(&text).unwrap(), input.clone());
        let packed = codec.compress(&input).unwrap();
        prop_assert_eq!(codec.decompress(&packed).unwrap(), input);
    }
}

#[cfg(feature = "crypto")]
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_encrypted_bijection(input in prop::collection::vec(any::<u8>(), 0..300)) {
        let codec = codec(4096, Some("0xfeedface"));
        let packed = codec.compress(&input).unwrap();
        prop_assert_eq!(codec.decompress(&packed).unwrap(), input.clone());
        let text = codec.decompress(&input).unwrap();
        prop_assert_eq!(codec.compress(&text).unwrap(), input);
    }
}

#[test]
fn test_distinct_inputs_distinct_outputs() {
    let codec = codec(4096, None);
    let mut seen = std::collections::HashSet::new();
    for a in 0..=255u8 {
        for b in [0u8, 1, 0x80, 0xff] {
            assert!(seen.insert(codec.compress(&[a, b]).unwrap()));
        }
    }
}
