mod common;

use common::{FileSpec, FrameSpec, COMPRESSION_LZ4, ENCODING_LE};
use zune_zel::{probe_zel, ZelDecoder};

const PATTERN: [u8; 8] = [0, 1, 0, 1, 1, 0, 1, 0];
const PALETTE: [u16; 2] = [0x0000, 0xFFFF];

fn single_frame_file(zone_width: u16, zone_height: u16) -> FileSpec {
    FileSpec::new(4, 2, zone_width, zone_height)
        .default_duration(16)
        .global_palette(&PALETTE, ENCODING_LE)
        .frame(FrameSpec::new(&PATTERN).duration(16))
}

#[test]
fn getters_reflect_the_header() {
    let file = single_frame_file(4, 2).build();

    assert!(probe_zel(&file));

    let decoder = ZelDecoder::open_memory(&file).unwrap();

    assert_eq!(decoder.get_width(), 4);
    assert_eq!(decoder.get_height(), 2);
    assert_eq!(decoder.get_frame_count(), 1);
    assert_eq!(decoder.get_default_frame_duration_ms(), 16);
    assert_eq!(decoder.get_zone_width(), 4);
    assert_eq!(decoder.get_zone_height(), 2);
    assert_eq!(decoder.get_color_format(), zune_zel::ZelColorFormat::Indexed8);
    assert!(decoder.has_global_palette());
    assert_eq!(decoder.get_total_duration_ms(), 16);
    assert!(decoder.get_frame_is_keyframe(0).unwrap());
    assert!(!decoder.get_frame_uses_local_palette(0).unwrap());
}

#[test]
fn whole_frame_index_decode() {
    let file = single_frame_file(4, 2).build();
    let mut decoder = ZelDecoder::open_memory(&file).unwrap();

    let mut dst = [0xFF_u8; 8];
    decoder.decode_frame_index8(0, &mut dst, 4).unwrap();

    assert_eq!(dst, PATTERN);
}

#[test]
fn whole_frame_index_decode_with_padded_stride() {
    let file = single_frame_file(4, 2).build();
    let mut decoder = ZelDecoder::open_memory(&file).unwrap();

    let mut dst = [0xFF_u8; 10];
    decoder.decode_frame_index8(0, &mut dst, 6).unwrap();

    assert_eq!(&dst[0..4], &PATTERN[0..4]);
    assert_eq!(&dst[4..6], &[0xFF, 0xFF]);
    assert_eq!(&dst[6..10], &PATTERN[4..8]);
}

#[test]
fn whole_frame_rgb565_decode() {
    let file = single_frame_file(4, 2).build();
    let mut decoder = ZelDecoder::open_memory(&file).unwrap();

    let mut dst = [0_u16; 8];
    decoder.decode_frame_rgb565(0, &mut dst, 4).unwrap();

    let expected: Vec<u16> = PATTERN.iter().map(|i| PALETTE[usize::from(*i)]).collect();
    assert_eq!(dst.to_vec(), expected);
}

#[test]
fn zone_decodes_reassemble_the_frame() {
    let file = single_frame_file(2, 1).build();
    let mut decoder = ZelDecoder::open_memory(&file).unwrap();

    let mut reassembled = [0_u8; 8];
    let mut tile = [0_u8; 2];

    for zone in 0_u32..4 {
        decoder.decode_frame_index8_zone(0, zone, &mut tile).unwrap();

        let zone_x = (zone as usize % 2) * 2;
        let zone_y = zone as usize / 2;
        let start = zone_y * 4 + zone_x;

        reassembled[start..start + 2].copy_from_slice(&tile);
    }

    assert_eq!(reassembled, PATTERN);
}

#[test]
fn zone_rgb565_matches_the_palette() {
    let file = single_frame_file(2, 1).build();
    let mut decoder = ZelDecoder::open_memory(&file).unwrap();

    let mut tile = [0_u16; 2];
    decoder.decode_frame_rgb565_zone(0, 1, &mut tile).unwrap();

    assert_eq!(tile, [PALETTE[0], PALETTE[1]]);
}

#[test]
fn index_decode_plus_palette_lookup_equals_rgb565_decode() {
    let file = single_frame_file(2, 1).build();
    let mut decoder = ZelDecoder::open_memory(&file).unwrap();

    let mut indices = [0_u8; 8];
    decoder.decode_frame_index8(0, &mut indices, 4).unwrap();

    let palette = decoder.get_frame_palette(0).unwrap().to_vec();
    let looked_up: Vec<u16> = indices.iter().map(|i| palette[usize::from(*i)]).collect();

    let mut rgb = [0_u16; 8];
    decoder.decode_frame_rgb565(0, &mut rgb, 4).unwrap();

    assert_eq!(rgb.to_vec(), looked_up);
}

#[test]
fn lz4_frames_decode_like_uncompressed_ones() {
    let plain = single_frame_file(2, 1).build();
    let compressed = FileSpec::new(4, 2, 2, 1)
        .default_duration(16)
        .global_palette(&PALETTE, ENCODING_LE)
        .frame(FrameSpec::new(&PATTERN).duration(16).compression(COMPRESSION_LZ4))
        .build();

    let mut plain_decoder = ZelDecoder::open_memory(&plain).unwrap();
    let mut lz4_decoder = ZelDecoder::open_memory(&compressed).unwrap();

    let mut expected = [0_u8; 8];
    let mut actual = [0_u8; 8];

    plain_decoder.decode_frame_index8(0, &mut expected, 4).unwrap();
    lz4_decoder.decode_frame_index8(0, &mut actual, 4).unwrap();
    assert_eq!(expected, actual);

    let mut rgb = [0_u16; 8];
    lz4_decoder.decode_frame_rgb565(0, &mut rgb, 4).unwrap();

    let looked_up: Vec<u16> = PATTERN.iter().map(|i| PALETTE[usize::from(*i)]).collect();
    assert_eq!(rgb.to_vec(), looked_up);

    let mut tile = [0_u8; 2];
    lz4_decoder.decode_frame_index8_zone(0, 3, &mut tile).unwrap();
    assert_eq!(tile, [1, 0]);
}

#[test]
fn small_strides_and_buffers_are_refused() {
    let file = single_frame_file(4, 2).build();
    let mut decoder = ZelDecoder::open_memory(&file).unwrap();

    let mut dst = [0_u8; 8];
    let err = decoder.decode_frame_index8(0, &mut dst, 3).unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGUMENT");

    let mut short = [0_u8; 7];
    let err = decoder.decode_frame_index8(0, &mut short, 4).unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGUMENT");

    let mut tile = [0_u8; 7];
    let err = decoder.decode_frame_index8_zone(0, 0, &mut tile).unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGUMENT");
}
