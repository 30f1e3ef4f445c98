/*
 * Copyright (c) 2024.
 *
 * This software is free software; You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Frame block traversal
//!
//! A frame block is a frame header, an optional local palette block and then
//! exactly one `{u32 size, payload}` chunk per zone, in row-major zone
//! order. [`FrameZoneStream`] validates the header chain and walks the
//! chunks; [`zone_pixels`] turns one chunk into zone pixels, inflating LZ4
//! chunks into the caller's scratch buffer.

use log::warn;

use crate::common::{ZelCompression, ZoneLayout};
use crate::constants::{FRAME_BLOCK_TYPE, FRAME_HEADER_SIZE, PALETTE_HEADER_SIZE};
use crate::errors::ZelErrors;
use crate::headers::{FrameHeader, PaletteHeader};

/// A validated view over the zone chunks of one frame block
pub(crate) struct FrameZoneStream<'d> {
    pub header: FrameHeader,
    zone_data:  &'d [u8],
    pos:        usize
}

/// Parse and validate a frame block, returning its zone-chunk stream
///
/// `frame_data` is the whole block as indexed by the frame-index table. The
/// local palette block, when present, is validated and skipped; resolving
/// its entries is the palette path's job.
pub(crate) fn init_frame_zone_stream<'d>(
    frame_data: &'d [u8], layout: &ZoneLayout, strict: bool
) -> Result<FrameZoneStream<'d>, ZelErrors> {
    if frame_data.len() < FRAME_HEADER_SIZE {
        return Err(ZelErrors::CorruptData("frame block smaller than a frame header"));
    }

    let header = FrameHeader::parse(frame_data);
    let header_size = usize::from(header.header_size);

    if header_size < FRAME_HEADER_SIZE || header_size > frame_data.len() {
        return Err(ZelErrors::CorruptData("frame header size out of range"));
    }

    if header.block_type != FRAME_BLOCK_TYPE {
        if strict {
            return Err(ZelErrors::CorruptData("unknown frame block type"));
        }
        warn!(
            "Unknown frame block type {}, expected {}",
            header.block_type, FRAME_BLOCK_TYPE
        );
    }

    let mut rel_offset = header_size;

    if header.flags.has_local_palette {
        if frame_data.len() - rel_offset < PALETTE_HEADER_SIZE {
            return Err(ZelErrors::CorruptData("local palette header out of range"));
        }

        let palette_header = PaletteHeader::parse(&frame_data[rel_offset..]);
        let palette_header_size = usize::from(palette_header.header_size);

        if palette_header_size < PALETTE_HEADER_SIZE || palette_header.entry_count == 0 {
            return Err(ZelErrors::CorruptData("invalid local palette header"));
        }
        if palette_header_size > frame_data.len() - rel_offset {
            return Err(ZelErrors::CorruptData("local palette header out of range"));
        }

        let palette_data_rel = rel_offset + palette_header_size;
        let palette_bytes = usize::from(palette_header.entry_count) * 2;

        if palette_bytes > frame_data.len() - palette_data_rel {
            return Err(ZelErrors::CorruptData("local palette entries out of range"));
        }

        rel_offset = palette_data_rel + palette_bytes;
    }

    if usize::from(header.zone_count) != layout.zone_count {
        return Err(ZelErrors::CorruptData(
            "frame zone count does not match the file zone grid"
        ));
    }

    Ok(FrameZoneStream {
        header,
        zone_data: &frame_data[rel_offset..],
        pos: 0
    })
}

impl<'d> FrameZoneStream<'d> {
    /// Read the chunk under the cursor and advance past it
    pub(crate) fn next_chunk(&mut self) -> Result<&'d [u8], ZelErrors> {
        if self.zone_data.len() - self.pos < 4 {
            return Err(ZelErrors::CorruptData("zone chunk size field truncated"));
        }

        let mut word = [0_u8; 4];
        word.copy_from_slice(&self.zone_data[self.pos..self.pos + 4]);
        self.pos += 4;

        let chunk_size = u32::from_le_bytes(word) as usize;

        if chunk_size == 0 {
            return Err(ZelErrors::CorruptData("zero-sized zone chunk"));
        }
        if chunk_size > self.zone_data.len() - self.pos {
            return Err(ZelErrors::CorruptData("zone chunk overruns the frame block"));
        }

        let chunk = &self.zone_data[self.pos..self.pos + chunk_size];
        self.pos += chunk_size;

        Ok(chunk)
    }

    /// Assert the cursor consumed the zone-data window exactly
    ///
    /// Called after iterating every zone of a whole-frame decode; trailing
    /// bytes mean the chunk sizes and the frame size disagree.
    pub(crate) fn finish(&self) -> Result<(), ZelErrors> {
        if self.pos != self.zone_data.len() {
            return Err(ZelErrors::CorruptData("trailing bytes after the last zone chunk"));
        }
        Ok(())
    }
}

fn lz4_decompress(src: &[u8], dst: &mut [u8]) -> Result<usize, ZelErrors> {
    let written = lz4_flex::block::decompress_into(src, dst)?;

    Ok(written)
}

/// Resolve one zone chunk to `zone_pixel_bytes` of index pixels
///
/// Uncompressed chunks are returned in place; LZ4 chunks inflate into
/// `scratch`, which the caller acquires once per decode.
pub(crate) fn zone_pixels<'p>(
    compression: u8, chunk: &'p [u8], zone_pixel_bytes: usize, scratch: &'p mut [u8]
) -> Result<&'p [u8], ZelErrors> {
    match ZelCompression::from_u8(compression) {
        Some(ZelCompression::None) => {
            if chunk.len() != zone_pixel_bytes {
                return Err(ZelErrors::CorruptData(
                    "zone chunk size does not match the zone dimensions"
                ));
            }
            Ok(chunk)
        }
        Some(ZelCompression::Lz4) => {
            if scratch.len() < zone_pixel_bytes {
                return Err(ZelErrors::Internal("zone scratch was not acquired"));
            }

            let out = &mut scratch[..zone_pixel_bytes];
            let written = lz4_decompress(chunk, &mut *out)?;

            if written != zone_pixel_bytes {
                return Err(ZelErrors::CorruptData(
                    "zone chunk inflated to the wrong size"
                ));
            }
            Ok(out)
        }
        Some(ZelCompression::Rle) | None => {
            Err(ZelErrors::UnsupportedFormat("unsupported compression type"))
        }
    }
}

/// Copy zone pixels into a whole-frame destination at its grid position
pub(crate) fn blit_zone_indices(
    layout: &ZoneLayout, zone_index: usize, pixels: &[u8], dst: &mut [u8], stride: usize
) {
    let (zone_x, zone_y) = layout.zone_origin(zone_index);

    for (row, src_row) in pixels.chunks_exact(layout.zone_width).enumerate() {
        let start = (zone_y + row) * stride + zone_x;

        dst[start..start + layout.zone_width].copy_from_slice(src_row);
    }
}

/// Expand zone pixels through `palette` into a whole-frame RGB565 destination
///
/// Every index is bounds checked against the palette; an out-of-range index
/// is corrupt data, never a silent clamp.
pub(crate) fn blit_zone_rgb565(
    layout: &ZoneLayout, zone_index: usize, pixels: &[u8], palette: &[u16], dst: &mut [u16],
    stride: usize
) -> Result<(), ZelErrors> {
    let (zone_x, zone_y) = layout.zone_origin(zone_index);

    for (row, src_row) in pixels.chunks_exact(layout.zone_width).enumerate() {
        let start = (zone_y + row) * stride + zone_x;
        let dst_row = &mut dst[start..start + layout.zone_width];

        for (dst_px, index) in dst_row.iter_mut().zip(src_row) {
            *dst_px = *palette
                .get(usize::from(*index))
                .ok_or(ZelErrors::CorruptData("palette index out of range"))?;
        }
    }

    Ok(())
}
