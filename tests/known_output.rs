//! Known-answer vectors for the compressed format at the default window.
//!
//! The expected bytes were produced by bicom 1.01. Any change to the model
//! tables, tie-breaking or stream plumbing shows up here first.

use bicom::{compress, decompress};
use sha2::{Digest, Sha256};

/// Repetitive word stream with occasional arbitrary bytes, long enough to
/// push the suffix tree past a full 1 MiB window.
fn word_salad(len: usize) -> Vec<u8> {
    const WORDS: [&[u8]; 8] = [
        b"the ", b"quick ", b"brown ", b"fox ", b"jumps ", b"over ", b"lazy ", b"dog\n",
    ];
    let mut x: u32 = 1;
    let mut out = Vec::with_capacity(len + 8);
    while out.len() < len {
        x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let k = (x >> 16) as u8;
        if k & 15 == 15 {
            out.push((x >> 24) as u8);
        } else {
            out.extend_from_slice(WORDS[(k & 7) as usize]);
        }
    }
    out.truncate(len);
    out
}

fn lcg_bytes(len: usize, seed: u32) -> Vec<u8> {
    let mut x = seed;
    (0..len)
        .map(|_| {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (x >> 16) as u8
        })
        .collect()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[test]
fn test_compress_short_vectors() {
    assert_eq!(compress(&[]).unwrap(), Vec::<u8>::new());
    assert_eq!(compress(&[0, 0, 0]).unwrap(), [0x55, 0x57]);
    assert_eq!(
        compress(b"abracadabra abracadabra").unwrap(),
        [0x34, 0x33, 0x41, 0x6e, 0xb1, 0xfa, 0x64, 0x92, 0xd9, 0xda, 0x5d]
    );
}

#[test]
fn test_decompress_short_vectors() {
    assert_eq!(decompress(&[]).unwrap(), Vec::<u8>::new());
    assert_eq!(decompress(&[0x55, 0x57]).unwrap(), [0, 0, 0]);
    assert_eq!(
        decompress(b"bicom").unwrap(),
        [0x37, 0x37, 0xea, 0x8e, 0xea, 0x8e]
    );
}

#[test]
fn test_decompress_noise_vector() {
    let text = decompress(&lcg_bytes(64, 7)).unwrap();
    assert_eq!(text.len(), 80, "Size mismatch");
    assert_eq!(
        sha256_hex(&text),
        "5d510ab2f79078afef3ff0a18af97511a834272dcb8f2f905568f81ed8f2d403"
    );
}

#[test]
fn test_compress_past_full_window() {
    let data = word_salad((1 << 20) + (1 << 17));
    assert_eq!(&data[..16], b"lazy lazy quick ");

    let packed = compress(&data).unwrap();
    assert_eq!(packed.len(), 164_284, "Size mismatch");
    assert_eq!(
        sha256_hex(&packed),
        "894b66146640cd1e418c6154e0fd6ec492a40913d5eae24b22f75eeda511bb64"
    );
    assert_eq!(decompress(&packed).unwrap(), data);
}
