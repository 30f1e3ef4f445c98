/*
 * Copyright (c) 2024.
 *
 * This software is free software; You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::vec::Vec;

use log::{info, trace, warn};
use zune_core::options::DecoderOptions;

use crate::common::{ZelColorEncoding, ZelColorFormat, ZelPaletteType, ZoneLayout};
use crate::constants::{
    COMPRESSION_LZ4, FILE_HEADER_SIZE, FRAME_HEADER_SIZE, FRAME_INDEX_ENTRY_SIZE,
    PALETTE_HEADER_SIZE, ZEL_MAGIC, ZEL_VERSION
};
use crate::errors::ZelErrors;
use crate::frame::{blit_zone_indices, blit_zone_rgb565, init_frame_zone_stream, zone_pixels};
use crate::headers::{FileHeader, FrameHeader, FrameIndexEntry, PaletteHeader};
use crate::palette::convert_palette_into;
use crate::source::{range_fits, ByteSource, ZelInputStream};

/// Probe some bytes to see if they look like the start of a ZEL file
pub fn probe_zel(bytes: &[u8]) -> bool {
    if let Some(magic) = bytes.get(0..4) {
        if magic == &ZEL_MAGIC[..] {
            if let Some(version) = bytes.get(4..6) {
                return u16::from_le_bytes([version[0], version[1]]) == ZEL_VERSION;
            }
        }
    }
    false
}

/// Which internal cache holds the palette resolved for a frame
enum PaletteSlot {
    Global,
    Local
}

/// A ZEL animated-image decoder
///
/// A decoder is opened over an in-memory buffer with [`open_memory`] or over
/// a random-access stream with [`open_stream`]; opening validates the whole
/// header chain and caches the frame-index table, so every getter is cheap
/// afterwards.
///
/// Frames decode on demand, whole or one zone at a time, into caller-owned
/// buffers. Decoding mutates internal scratch buffers, hence the `&mut self`
/// receivers; the buffers grow to the largest frame and zone seen and are
/// reused across calls.
///
/// Dropping the decoder releases every internal allocation and drops the
/// stream source, if any.
///
/// [`open_memory`]: ZelDecoder::open_memory
/// [`open_stream`]: ZelDecoder::open_stream
pub struct ZelDecoder<'a> {
    source:  ByteSource<'a>,
    options: DecoderOptions,
    header:  FileHeader,
    layout:  ZoneLayout,
    /// Raw frame-index table, 11 bytes per entry. Borrowed from
    /// memory-backed input, owned for stream-backed input.
    frame_index: Cow<'a, [u8]>,

    global_palette_raw:            Option<Cow<'a, [u8]>>,
    global_palette_count:          u16,
    global_palette_encoding:       ZelColorEncoding,
    global_palette_cache:          Vec<u16>,
    global_palette_cache_encoding: Option<ZelColorEncoding>,

    output_encoding: Option<ZelColorEncoding>,

    zone_scratch:    Vec<u8>,
    frame_scratch:   Vec<u8>,
    palette_scratch: Vec<u16>
}

impl<'a> core::fmt::Debug for ZelDecoder<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ZelDecoder").finish_non_exhaustive()
    }
}

impl<'a> ZelDecoder<'a> {
    /// Open a decoder over a complete ZEL file held in memory
    ///
    /// The buffer is borrowed for the life of the decoder; palette and
    /// frame-index data are read from it in place, without copies.
    ///
    /// # Returns
    /// - On success: a decoder with the header chain fully validated
    /// - On error: why the file was refused, see [ZelErrors]
    ///
    /// [ZelErrors]: crate::errors::ZelErrors
    pub fn open_memory(data: &'a [u8]) -> Result<ZelDecoder<'a>, ZelErrors> {
        ZelDecoder::open_memory_with_options(data, DecoderOptions::default())
    }

    /// Open a memory-backed decoder that obeys specified restrictions
    ///
    /// E.g can be used to set width and height limits to prevent OOM attacks,
    /// or to enable strict mode, which turns tolerated wire anomalies
    /// (unknown frame block types, mislabeled palette blocks) into errors.
    pub fn open_memory_with_options(
        data: &'a [u8], options: DecoderOptions
    ) -> Result<ZelDecoder<'a>, ZelErrors> {
        ZelDecoder::open_inner(ByteSource::Memory(data), options)
    }

    /// Open a decoder over a random-access stream, e.g. a file on an SD card
    ///
    /// Only the headers, the global palette and the frame-index table are
    /// read up front. Each decoded frame is fetched with a single
    /// [`read_at`](ZelInputStream::read_at) call into an internal scratch
    /// buffer, bounding peak memory at the largest frame block plus one
    /// zone.
    pub fn open_stream<S>(stream: S) -> Result<ZelDecoder<'a>, ZelErrors>
    where
        S: ZelInputStream + 'a
    {
        ZelDecoder::open_stream_with_options(stream, DecoderOptions::default())
    }

    /// Open a stream-backed decoder that obeys specified restrictions
    pub fn open_stream_with_options<S>(
        stream: S, options: DecoderOptions
    ) -> Result<ZelDecoder<'a>, ZelErrors>
    where
        S: ZelInputStream + 'a
    {
        ZelDecoder::open_inner(ByteSource::Stream(Box::new(stream)), options)
    }

    fn open_inner(
        mut source: ByteSource<'a>, options: DecoderOptions
    ) -> Result<ZelDecoder<'a>, ZelErrors> {
        let size = source.len();

        if size < FILE_HEADER_SIZE {
            return Err(ZelErrors::CorruptData("input smaller than a file header"));
        }

        let mut header_bytes = [0_u8; FILE_HEADER_SIZE];
        source.read_at(0, &mut header_bytes)?;

        let header = FileHeader::parse(&header_bytes);

        if header.magic != ZEL_MAGIC || header.version != ZEL_VERSION {
            return Err(ZelErrors::InvalidMagic);
        }
        if header.width == 0 || header.height == 0 {
            return Err(ZelErrors::CorruptData("zero image dimensions"));
        }
        if usize::from(header.width) > options.get_max_width() {
            return Err(ZelErrors::TooLargeDimensions(
                "width",
                options.get_max_width(),
                usize::from(header.width)
            ));
        }
        if usize::from(header.height) > options.get_max_height() {
            return Err(ZelErrors::TooLargeDimensions(
                "height",
                options.get_max_height(),
                usize::from(header.height)
            ));
        }

        let layout = ZoneLayout::from_header(&header)?;

        if ZelColorFormat::from_u8(header.color_format).is_none() {
            return Err(ZelErrors::UnsupportedFormat("unknown color format"));
        }

        let header_size = usize::from(header.header_size);

        if header_size < FILE_HEADER_SIZE || header_size > size {
            return Err(ZelErrors::CorruptData("file header size field out of range"));
        }
        if !header.flags.has_frame_index_table {
            return Err(ZelErrors::UnsupportedFormat("file has no frame-index table"));
        }

        info!(
            "ZEL image: {}x{}, {} frames, {}x{} zones",
            header.width, header.height, header.frame_count, header.zone_width, header.zone_height
        );

        let mut offset = header_size;

        let mut global_palette_raw = None;
        let mut global_palette_count = 0_u16;
        let mut global_palette_encoding = ZelColorEncoding::Rgb565Le;

        if header.flags.has_global_palette {
            if !range_fits(offset, PALETTE_HEADER_SIZE, size) {
                return Err(ZelErrors::CorruptData("global palette header out of range"));
            }

            let mut ph_bytes = [0_u8; PALETTE_HEADER_SIZE];
            source.read_at(offset, &mut ph_bytes)?;

            let palette_header = PaletteHeader::parse(&ph_bytes);

            let encoding = match ZelColorEncoding::from_u8(palette_header.color_encoding) {
                Some(encoding) => encoding,
                None => {
                    return Err(ZelErrors::UnsupportedFormat("unknown palette color encoding"))
                }
            };
            if palette_header.entry_count == 0 {
                return Err(ZelErrors::CorruptData("empty global palette"));
            }
            if usize::from(palette_header.header_size) < PALETTE_HEADER_SIZE {
                return Err(ZelErrors::CorruptData("global palette header size out of range"));
            }
            if palette_header.palette_type != ZelPaletteType::Global as u8 {
                if options.get_strict_mode() {
                    return Err(ZelErrors::CorruptData(
                        "global palette block carries a non-global type"
                    ));
                }
                warn!(
                    "Global palette block carries palette type {}",
                    palette_header.palette_type
                );
            }

            let palette_offset = offset + usize::from(palette_header.header_size);
            let palette_bytes = usize::from(palette_header.entry_count) * 2;

            if !range_fits(palette_offset, palette_bytes, size) {
                return Err(ZelErrors::CorruptData("global palette entries out of range"));
            }

            let raw = match source.borrow_at(palette_offset, palette_bytes) {
                Some(slice) => Cow::Borrowed(slice),
                None => {
                    let mut owned = try_vec(palette_bytes)?;
                    source.read_at(palette_offset, &mut owned)?;
                    Cow::Owned(owned)
                }
            };

            global_palette_raw = Some(raw);
            global_palette_count = palette_header.entry_count;
            global_palette_encoding = encoding;

            offset = palette_offset + palette_bytes;
        }

        let index_bytes = match (header.frame_count as usize).checked_mul(FRAME_INDEX_ENTRY_SIZE)
        {
            Some(bytes) => bytes,
            None => return Err(ZelErrors::CorruptData("frame count overflows the index table"))
        };

        if !range_fits(offset, index_bytes, size) {
            return Err(ZelErrors::CorruptData("frame-index table out of range"));
        }

        let frame_index = match source.borrow_at(offset, index_bytes) {
            Some(slice) => Cow::Borrowed(slice),
            None => {
                let mut owned = try_vec(index_bytes)?;
                source.read_at(offset, &mut owned)?;
                Cow::Owned(owned)
            }
        };

        Ok(ZelDecoder {
            source,
            options,
            header,
            layout,
            frame_index,
            global_palette_raw,
            global_palette_count,
            global_palette_encoding,
            global_palette_cache: Vec::new(),
            global_palette_cache_encoding: None,
            output_encoding: None,
            zone_scratch: Vec::new(),
            frame_scratch: Vec::new(),
            palette_scratch: Vec::new()
        })
    }

    /// Image width in pixels
    pub const fn get_width(&self) -> u16 {
        self.header.width
    }

    /// Image height in pixels
    pub const fn get_height(&self) -> u16 {
        self.header.height
    }

    /// Number of frames in the animation
    pub const fn get_frame_count(&self) -> u32 {
        self.header.frame_count
    }

    /// Duration applied to frames whose index entry carries none
    pub const fn get_default_frame_duration_ms(&self) -> u16 {
        self.header.default_frame_duration
    }

    /// Width of one zone in pixels
    pub const fn get_zone_width(&self) -> u16 {
        self.header.zone_width
    }

    /// Height of one zone in pixels
    pub const fn get_zone_height(&self) -> u16 {
        self.header.zone_height
    }

    /// Pixel format of the frames, always indexed-8 for version 1 files
    pub fn get_color_format(&self) -> ZelColorFormat {
        ZelColorFormat::from_u8(self.header.color_format).unwrap_or(ZelColorFormat::Indexed8)
    }

    /// Request palettes in a specific RGB565 byte order
    ///
    /// Display panels usually want one fixed byte order; setting it here
    /// makes every palette the decoder hands out, and every RGB565 decode,
    /// use that order regardless of how the file stores its entries. The
    /// conversion is performed once and cached until the encoding changes
    /// again.
    pub fn set_output_color_encoding(&mut self, encoding: ZelColorEncoding) {
        if self.output_encoding != Some(encoding) {
            self.output_encoding = Some(encoding);
            self.global_palette_cache_encoding = None;
        }
    }

    /// The RGB565 byte order palettes are currently returned in
    ///
    /// This is the requested override if one was set, otherwise the
    /// encoding the global palette is stored in.
    pub fn get_output_color_encoding(&self) -> ZelColorEncoding {
        self.output_encoding.unwrap_or(self.global_palette_encoding)
    }

    /// Whether the file carries a global palette
    pub fn has_global_palette(&self) -> bool {
        self.global_palette_raw.is_some() && self.global_palette_count > 0
    }

    /// The global palette in the current output encoding
    ///
    /// The slice length is the palette entry count. It borrows an internal
    /// cache which stays valid until the output encoding changes or another
    /// palette is resolved.
    pub fn get_global_palette(&mut self) -> Result<&[u16], ZelErrors> {
        self.resolve_global_palette()?;

        Ok(&self.global_palette_cache)
    }

    /// The palette a frame's pixels index into, local if the frame carries
    /// one, otherwise global
    pub fn get_frame_palette(&mut self, frame_index: u32) -> Result<&[u16], ZelErrors> {
        match self.prepare_frame_palette(frame_index)? {
            PaletteSlot::Global => Ok(&self.global_palette_cache),
            PaletteSlot::Local => Ok(&self.palette_scratch)
        }
    }

    /// Display duration of a frame in milliseconds
    ///
    /// A zero duration in the index entry inherits the file-wide default.
    pub fn get_frame_duration_ms(&self, frame_index: u32) -> Result<u16, ZelErrors> {
        let entry = self.frame_entry(frame_index)?;

        Ok(self.effective_duration(&entry))
    }

    /// Whether a frame is marked as a keyframe
    pub fn get_frame_is_keyframe(&self, frame_index: u32) -> Result<bool, ZelErrors> {
        Ok(self.frame_entry(frame_index)?.flags.keyframe)
    }

    /// Whether a frame carries its own palette block
    pub fn get_frame_uses_local_palette(&self, frame_index: u32) -> Result<bool, ZelErrors> {
        Ok(self.frame_entry(frame_index)?.flags.has_local_palette)
    }

    /// Decode a whole frame to palette indices, one byte per pixel
    ///
    /// Rows are written `dst_stride_bytes` apart; the stride must be at
    /// least the image width and `dst` must hold
    /// `(height - 1) * stride + width` bytes.
    pub fn decode_frame_index8(
        &mut self, frame_index: u32, dst: &mut [u8], dst_stride_bytes: usize
    ) -> Result<(), ZelErrors> {
        if self.header.color_format != ZelColorFormat::Indexed8 as u8 {
            return Err(ZelErrors::UnsupportedFormat("frames are not indexed-8"));
        }

        let width = usize::from(self.header.width);
        let height = usize::from(self.header.height);

        if dst_stride_bytes < width {
            return Err(ZelErrors::InvalidArgument(
                "destination stride smaller than the image width"
            ));
        }

        let required = required_output_len(width, height, dst_stride_bytes)?;

        if dst.len() < required {
            return Err(ZelErrors::TooSmallOutput(required, dst.len()));
        }

        let entry = self.frame_entry(frame_index)?;
        let layout = self.layout;
        let strict = self.options.get_strict_mode();

        trace!("Decoding frame {frame_index} to indices");

        let frame_data = fetch_frame_block(&mut self.source, &mut self.frame_scratch, &entry)?;
        let mut stream = init_frame_zone_stream(frame_data, &layout, strict)?;
        let compression = stream.header.compression_type;

        let scratch: &mut [u8] = if compression == COMPRESSION_LZ4 {
            acquire_byte_scratch(&mut self.zone_scratch, layout.zone_pixel_bytes)?
        } else {
            &mut []
        };

        for zone_index in 0..layout.zone_count {
            let chunk = stream.next_chunk()?;
            let pixels = zone_pixels(compression, chunk, layout.zone_pixel_bytes, &mut *scratch)?;

            blit_zone_indices(&layout, zone_index, pixels, dst, dst_stride_bytes);
        }

        stream.finish()
    }

    /// Decode a whole frame to RGB565, resolving each pixel through the
    /// frame's palette
    ///
    /// Rows are written `dst_stride_pixels` apart; the stride must be at
    /// least the image width and `dst` must hold
    /// `(height - 1) * stride + width` entries. Entries are produced in the
    /// current output encoding.
    pub fn decode_frame_rgb565(
        &mut self, frame_index: u32, dst: &mut [u16], dst_stride_pixels: usize
    ) -> Result<(), ZelErrors> {
        if self.header.color_format != ZelColorFormat::Indexed8 as u8 {
            return Err(ZelErrors::UnsupportedFormat("frames are not indexed-8"));
        }

        let width = usize::from(self.header.width);
        let height = usize::from(self.header.height);

        if dst_stride_pixels < width {
            return Err(ZelErrors::InvalidArgument(
                "destination stride smaller than the image width"
            ));
        }

        let required = required_output_len(width, height, dst_stride_pixels)?;

        if dst.len() < required {
            return Err(ZelErrors::TooSmallOutput(required, dst.len()));
        }

        let slot = self.prepare_frame_palette(frame_index)?;
        let entry = self.frame_entry(frame_index)?;
        let layout = self.layout;
        let strict = self.options.get_strict_mode();

        trace!("Decoding frame {frame_index} to RGB565");

        let frame_data = fetch_frame_block(&mut self.source, &mut self.frame_scratch, &entry)?;
        let mut stream = init_frame_zone_stream(frame_data, &layout, strict)?;
        let compression = stream.header.compression_type;

        let scratch: &mut [u8] = if compression == COMPRESSION_LZ4 {
            acquire_byte_scratch(&mut self.zone_scratch, layout.zone_pixel_bytes)?
        } else {
            &mut []
        };
        let palette: &[u16] = match slot {
            PaletteSlot::Global => &self.global_palette_cache,
            PaletteSlot::Local => &self.palette_scratch
        };

        for zone_index in 0..layout.zone_count {
            let chunk = stream.next_chunk()?;
            let pixels = zone_pixels(compression, chunk, layout.zone_pixel_bytes, &mut *scratch)?;

            blit_zone_rgb565(&layout, zone_index, pixels, palette, dst, dst_stride_pixels)?;
        }

        stream.finish()
    }

    /// Decode a single zone of a frame to palette indices
    ///
    /// The zone is written tightly packed, `zoneWidth` bytes per row; `dst`
    /// must hold `zoneWidth * zoneHeight` bytes. Zones are numbered
    /// row-major across the frame.
    pub fn decode_frame_index8_zone(
        &mut self, frame_index: u32, zone_index: u32, dst: &mut [u8]
    ) -> Result<(), ZelErrors> {
        if self.header.color_format != ZelColorFormat::Indexed8 as u8 {
            return Err(ZelErrors::UnsupportedFormat("frames are not indexed-8"));
        }

        let layout = self.layout;

        if dst.len() < layout.zone_pixel_bytes {
            return Err(ZelErrors::TooSmallOutput(layout.zone_pixel_bytes, dst.len()));
        }

        let entry = self.frame_entry(frame_index)?;
        let strict = self.options.get_strict_mode();

        let frame_data = fetch_frame_block(&mut self.source, &mut self.frame_scratch, &entry)?;
        let mut stream = init_frame_zone_stream(frame_data, &layout, strict)?;

        if zone_index as usize >= layout.zone_count {
            return Err(ZelErrors::OutOfBounds(zone_index as usize, layout.zone_count));
        }

        let compression = stream.header.compression_type;
        let scratch: &mut [u8] = if compression == COMPRESSION_LZ4 {
            acquire_byte_scratch(&mut self.zone_scratch, layout.zone_pixel_bytes)?
        } else {
            &mut []
        };

        let mut chunk: &[u8] = &[];

        for _ in 0..=zone_index {
            chunk = stream.next_chunk()?;
        }

        let pixels = zone_pixels(compression, chunk, layout.zone_pixel_bytes, scratch)?;

        dst[..layout.zone_pixel_bytes].copy_from_slice(pixels);

        Ok(())
    }

    /// Decode a single zone of a frame to RGB565
    ///
    /// The zone is written tightly packed in its own coordinate system;
    /// `dst` must hold `zoneWidth * zoneHeight` entries.
    pub fn decode_frame_rgb565_zone(
        &mut self, frame_index: u32, zone_index: u32, dst: &mut [u16]
    ) -> Result<(), ZelErrors> {
        if self.header.color_format != ZelColorFormat::Indexed8 as u8 {
            return Err(ZelErrors::UnsupportedFormat("frames are not indexed-8"));
        }

        let layout = self.layout;

        if dst.len() < layout.zone_pixel_bytes {
            return Err(ZelErrors::TooSmallOutput(layout.zone_pixel_bytes, dst.len()));
        }

        let slot = self.prepare_frame_palette(frame_index)?;
        let entry = self.frame_entry(frame_index)?;
        let strict = self.options.get_strict_mode();

        let frame_data = fetch_frame_block(&mut self.source, &mut self.frame_scratch, &entry)?;
        let mut stream = init_frame_zone_stream(frame_data, &layout, strict)?;

        if zone_index as usize >= layout.zone_count {
            return Err(ZelErrors::OutOfBounds(zone_index as usize, layout.zone_count));
        }

        let compression = stream.header.compression_type;
        let scratch: &mut [u8] = if compression == COMPRESSION_LZ4 {
            acquire_byte_scratch(&mut self.zone_scratch, layout.zone_pixel_bytes)?
        } else {
            &mut []
        };
        let palette: &[u16] = match slot {
            PaletteSlot::Global => &self.global_palette_cache,
            PaletteSlot::Local => &self.palette_scratch
        };

        let mut chunk: &[u8] = &[];

        for _ in 0..=zone_index {
            chunk = stream.next_chunk()?;
        }

        let pixels = zone_pixels(compression, chunk, layout.zone_pixel_bytes, scratch)?;

        blit_zone_rgb565(&layout, 0, pixels, palette, dst, layout.zone_width)
    }

    /// Sum of all frame durations in milliseconds
    pub fn get_total_duration_ms(&self) -> u32 {
        let mut total = 0_u32;

        for entry in self.frame_entries() {
            total = total.wrapping_add(u32::from(self.effective_duration(&entry)));
        }
        total
    }

    /// Locate the frame on display at `time_ms`, with time wrapping around
    /// the total animation duration
    ///
    /// Returns the frame index and the time its display period starts at.
    /// Fails when the animation has a zero total duration.
    pub fn find_frame_by_time_ms(&self, time_ms: u32) -> Result<(u32, u32), ZelErrors> {
        let total = self.get_total_duration_ms();

        if total == 0 {
            return Err(ZelErrors::CorruptData("animation has zero total duration"));
        }

        let target = time_ms % total;
        let mut accumulated = 0_u32;

        for (frame, entry) in self.frame_entries().enumerate() {
            let next = accumulated.wrapping_add(u32::from(self.effective_duration(&entry)));

            if target < next {
                return Ok((frame as u32, accumulated));
            }
            accumulated = next;
        }

        Ok((self.header.frame_count - 1, total - 1))
    }

    fn frame_entries(&self) -> impl Iterator<Item = FrameIndexEntry> + '_ {
        self.frame_index
            .chunks_exact(FRAME_INDEX_ENTRY_SIZE)
            .map(FrameIndexEntry::parse)
    }

    fn frame_entry(&self, frame_index: u32) -> Result<FrameIndexEntry, ZelErrors> {
        if frame_index >= self.header.frame_count {
            return Err(ZelErrors::OutOfBounds(
                frame_index as usize,
                self.header.frame_count as usize
            ));
        }

        let start = frame_index as usize * FRAME_INDEX_ENTRY_SIZE;

        Ok(FrameIndexEntry::parse(
            &self.frame_index[start..start + FRAME_INDEX_ENTRY_SIZE]
        ))
    }

    fn effective_duration(&self, entry: &FrameIndexEntry) -> u16 {
        if entry.frame_duration != 0 {
            entry.frame_duration
        } else {
            self.header.default_frame_duration
        }
    }

    /// Rebuild the global palette cache in the current output encoding,
    /// unless it already holds that encoding
    fn resolve_global_palette(&mut self) -> Result<(), ZelErrors> {
        let raw = match &self.global_palette_raw {
            Some(raw) => raw,
            None => return Err(ZelErrors::MissingPalette)
        };

        let desired = self.output_encoding.unwrap_or(self.global_palette_encoding);

        if self.global_palette_cache_encoding == Some(desired) {
            return Ok(());
        }

        let swap = desired != self.global_palette_encoding;

        convert_palette_into(raw, swap, &mut self.global_palette_cache)?;
        self.global_palette_cache_encoding = Some(desired);

        Ok(())
    }

    /// Resolve the palette a frame's pixels index into, filling the global
    /// cache or the local palette scratch
    fn prepare_frame_palette(&mut self, frame_index: u32) -> Result<PaletteSlot, ZelErrors> {
        let entry = self.frame_entry(frame_index)?;

        if !entry.flags.has_local_palette {
            self.resolve_global_palette()?;

            return Ok(PaletteSlot::Global);
        }

        let size = self.source.len();
        let frame_offset = entry.frame_offset as usize;
        let frame_size = entry.frame_size as usize;

        if frame_size == 0 {
            return Err(ZelErrors::CorruptData("empty frame block"));
        }
        if !range_fits(frame_offset, frame_size, size) {
            return Err(ZelErrors::CorruptData("frame block out of range"));
        }

        let frame_end = frame_offset + frame_size;

        if !range_fits(frame_offset, FRAME_HEADER_SIZE, size) {
            return Err(ZelErrors::CorruptData("frame header out of range"));
        }

        let mut fh_bytes = [0_u8; FRAME_HEADER_SIZE];
        self.source.read_at(frame_offset, &mut fh_bytes)?;

        let frame_header = FrameHeader::parse(&fh_bytes);

        if frame_header.local_palette_entry_count == 0 {
            return Err(ZelErrors::CorruptData(
                "frame flagged with a local palette but its entry count is zero"
            ));
        }
        if usize::from(frame_header.header_size) < FRAME_HEADER_SIZE {
            return Err(ZelErrors::CorruptData("frame header size out of range"));
        }

        let ph_offset = frame_offset + usize::from(frame_header.header_size);

        if ph_offset > frame_end
            || !range_fits(ph_offset, PALETTE_HEADER_SIZE, size)
            || PALETTE_HEADER_SIZE > frame_end - ph_offset
        {
            return Err(ZelErrors::CorruptData("local palette header out of range"));
        }

        let mut ph_bytes = [0_u8; PALETTE_HEADER_SIZE];
        self.source.read_at(ph_offset, &mut ph_bytes)?;

        let palette_header = PaletteHeader::parse(&ph_bytes);

        if usize::from(palette_header.header_size) < PALETTE_HEADER_SIZE {
            return Err(ZelErrors::CorruptData("local palette header size out of range"));
        }

        let source_encoding = match ZelColorEncoding::from_u8(palette_header.color_encoding) {
            Some(encoding) => encoding,
            None => return Err(ZelErrors::UnsupportedFormat("unknown palette color encoding"))
        };

        if palette_header.entry_count == 0 {
            return Err(ZelErrors::CorruptData("empty local palette"));
        }
        if palette_header.palette_type != ZelPaletteType::Local as u8 {
            if self.options.get_strict_mode() {
                return Err(ZelErrors::CorruptData(
                    "local palette block carries a non-local type"
                ));
            }
            warn!(
                "Local palette block carries palette type {}",
                palette_header.palette_type
            );
        }

        let palette_offset = ph_offset + usize::from(palette_header.header_size);
        let palette_bytes = usize::from(palette_header.entry_count) * 2;

        if !range_fits(palette_offset, palette_bytes, size) {
            return Err(ZelErrors::CorruptData("local palette entries out of range"));
        }
        if palette_offset > frame_end || palette_bytes > frame_end - palette_offset {
            return Err(ZelErrors::CorruptData("local palette entries outside the frame block"));
        }

        let desired = self.output_encoding.unwrap_or(source_encoding);
        let swap = desired != source_encoding;

        match self.source.borrow_at(palette_offset, palette_bytes) {
            Some(raw) => {
                convert_palette_into(raw, swap, &mut self.palette_scratch)?;
            }
            None => {
                let raw = acquire_byte_scratch(&mut self.zone_scratch, palette_bytes)?;
                self.source.read_at(palette_offset, raw)?;

                convert_palette_into(
                    &self.zone_scratch[..palette_bytes],
                    swap,
                    &mut self.palette_scratch
                )?;
            }
        }

        Ok(PaletteSlot::Local)
    }
}

/// Elements a whole-frame destination must hold for the given stride
fn required_output_len(width: usize, height: usize, stride: usize) -> Result<usize, ZelErrors> {
    (height - 1)
        .checked_mul(stride)
        .and_then(|rows| rows.checked_add(width))
        .ok_or(ZelErrors::InvalidArgument("destination stride too large"))
}

/// Grow `buf` to at least `needed` bytes and return that prefix
///
/// Growth is monotonic; a decode never shrinks a scratch buffer.
fn acquire_byte_scratch(buf: &mut Vec<u8>, needed: usize) -> Result<&mut [u8], ZelErrors> {
    if buf.len() < needed {
        let additional = needed - buf.len();

        buf.try_reserve(additional)
            .map_err(|_| ZelErrors::OutOfMemory(needed))?;
        buf.resize(needed, 0);
    }

    Ok(&mut buf[..needed])
}

fn try_vec(len: usize) -> Result<Vec<u8>, ZelErrors> {
    let mut buf = Vec::new();

    buf.try_reserve(len)
        .map_err(|_| ZelErrors::OutOfMemory(len))?;
    buf.resize(len, 0);

    Ok(buf)
}

/// Materialize one frame block: a borrow for memory-backed sources, a
/// single read into the frame scratch for stream-backed ones
fn fetch_frame_block<'s, 'a: 's>(
    source: &'s mut ByteSource<'a>, frame_scratch: &'s mut Vec<u8>, entry: &FrameIndexEntry
) -> Result<&'s [u8], ZelErrors> {
    let frame_offset = entry.frame_offset as usize;
    let frame_size = entry.frame_size as usize;

    if frame_size == 0 {
        return Err(ZelErrors::CorruptData("empty frame block"));
    }
    if !range_fits(frame_offset, frame_size, source.len()) {
        return Err(ZelErrors::CorruptData("frame block out of range"));
    }

    if let Some(block) = source.borrow_at(frame_offset, frame_size) {
        return Ok(block);
    }

    let dst = acquire_byte_scratch(frame_scratch, frame_size)?;
    source.read_at(frame_offset, dst)?;

    Ok(&frame_scratch[..frame_size])
}
