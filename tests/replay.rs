use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use retropic::{Engine, Picture, RasterImage, SCREEN_HEIGHT, SCREEN_WIDTH, replay};

fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn digest_u64(bytes: &[u8]) -> u64 {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    for chunk in bytes.chunks(8) {
        let mut v = 0u64;
        for (i, &b) in chunk.iter().enumerate() {
            v |= (b as u64) << (i * 8);
        }
        state = mix64(state ^ v);
    }
    state
}

fn abs(x: u16, y: u16) -> [u8; 3] {
    [
        (((x >> 4) & 0xF0) | ((y >> 8) & 0x0F)) as u8,
        (x & 0xFF) as u8,
        (y & 0xFF) as u8,
    ]
}

/// A closed black box from (10,10) to (100,60), filled with solid red.
fn fixture_bytes() -> Vec<u8> {
    let mut bytes = vec![0xF0, 0x00, 0xF6];
    bytes.extend_from_slice(&abs(10, 10));
    bytes.extend_from_slice(&abs(100, 10));
    bytes.extend_from_slice(&abs(100, 60));
    bytes.extend_from_slice(&abs(10, 60));
    bytes.extend_from_slice(&abs(10, 10));
    bytes.push(0xF0);
    bytes.push(0x04); // default palette entry 4 = pair 0x44, solid red
    bytes.push(0xF8);
    bytes.extend_from_slice(&abs(50, 30));
    bytes.push(0xFF);
    bytes
}

fn fixture_payload() -> String {
    BASE64.encode(fixture_bytes())
}

const WHITE: [u8; 4] = [255, 255, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];
const RED: [u8; 4] = [0xAA, 0x00, 0x00, 255];

#[test]
fn fixture_decodes_deterministically() {
    let payload = fixture_payload();
    let a = Picture::decode(&payload, Engine::Sci0, 0).unwrap();
    let b = Picture::decode(&payload, Engine::Sci0, 0).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 2);
}

#[test]
fn limit_zero_yields_all_background() {
    let pic = Picture::decode(&fixture_payload(), Engine::Sci0, 0).unwrap();
    let out = replay(pic.commands(), 0);
    assert_eq!((out.width, out.height), (SCREEN_WIDTH, SCREEN_HEIGHT));
    assert!(out.data.chunks_exact(4).all(|px| px == WHITE));
}

#[test]
fn full_replay_draws_border_and_fill() {
    let pic = Picture::decode(&fixture_payload(), Engine::Sci0, 0).unwrap();
    let out = replay(pic.commands(), pic.len());
    // Border pixels.
    assert_eq!(out.get(10, 35), BLACK);
    assert_eq!(out.get(100, 35), BLACK);
    assert_eq!(out.get(55, 10), BLACK);
    assert_eq!(out.get(55, 60), BLACK);
    // Fill interior.
    assert_eq!(out.get(50, 30), RED);
    assert_eq!(out.get(11, 11), RED);
    assert_eq!(out.get(99, 59), RED);
    // Outside the box stays background.
    assert_eq!(out.get(5, 5), WHITE);
    assert_eq!(out.get(110, 35), WHITE);
}

#[test]
fn replaying_the_same_prefix_is_byte_identical() {
    let pic = Picture::decode(&fixture_payload(), Engine::Sci0, 0).unwrap();
    for limit in 0..=pic.len() {
        let a = replay(pic.commands(), limit);
        let b = replay(pic.commands(), limit);
        assert_eq!(digest_u64(&a.data), digest_u64(&b.data), "limit {limit}");
    }
}

#[test]
fn prefixes_agree_on_previously_drawn_pixels() {
    let pic = Picture::decode(&fixture_payload(), Engine::Sci0, 0).unwrap();
    let frames: Vec<RasterImage> = (0..=pic.len())
        .map(|limit| replay(pic.commands(), limit))
        .collect();

    // The border drawn by command 0 is untouched by command 1 (the fill only
    // writes background pixels), so every border pixel must agree between the
    // n=1 prefix and the full replay.
    let partial = &frames[1];
    let full = &frames[2];
    for x in 10..=100 {
        assert_eq!(partial.get(x, 10), full.get(x, 10));
        assert_eq!(partial.get(x, 60), full.get(x, 60));
    }
    for y in 10..=60 {
        assert_eq!(partial.get(10, y), full.get(10, y));
        assert_eq!(partial.get(100, y), full.get(100, y));
    }
}

#[test]
fn limit_clamps_beyond_sequence_length() {
    let pic = Picture::decode(&fixture_payload(), Engine::Sci0, 0).unwrap();
    let full = replay(pic.commands(), pic.len());
    let over = replay(pic.commands(), usize::MAX);
    assert_eq!(full, over);
}
