#![allow(dead_code)]

//! In-memory ZEL file builder shared by the integration tests

pub const COMPRESSION_NONE: u8 = 0;
pub const COMPRESSION_LZ4: u8 = 1;
pub const ENCODING_LE: u8 = 0;
pub const ENCODING_BE: u8 = 1;

pub const FILE_HEADER_SIZE: usize = 34;
pub const PALETTE_HEADER_SIZE: usize = 8;
pub const FRAME_HEADER_SIZE: usize = 14;
pub const FRAME_INDEX_ENTRY_SIZE: usize = 11;

pub struct FrameSpec {
    pub pixels:        Vec<u8>,
    pub duration:      u16,
    pub compression:   u8,
    pub local_palette: Option<(Vec<u16>, u8)>,
    pub keyframe:      bool
}

impl FrameSpec {
    pub fn new(pixels: &[u8]) -> FrameSpec {
        FrameSpec {
            pixels:        pixels.to_vec(),
            duration:      0,
            compression:   COMPRESSION_NONE,
            local_palette: None,
            keyframe:      true
        }
    }

    pub fn duration(mut self, ms: u16) -> FrameSpec {
        self.duration = ms;
        self
    }

    pub fn compression(mut self, compression: u8) -> FrameSpec {
        self.compression = compression;
        self
    }

    pub fn local_palette(mut self, entries: &[u16], encoding: u8) -> FrameSpec {
        self.local_palette = Some((entries.to_vec(), encoding));
        self
    }
}

pub struct FileSpec {
    pub width:            u16,
    pub height:           u16,
    pub zone_width:       u16,
    pub zone_height:      u16,
    pub default_duration: u16,
    pub global_palette:   Option<(Vec<u16>, u8)>,
    pub frames:           Vec<FrameSpec>
}

impl FileSpec {
    pub fn new(width: u16, height: u16, zone_width: u16, zone_height: u16) -> FileSpec {
        FileSpec {
            width,
            height,
            zone_width,
            zone_height,
            default_duration: 0,
            global_palette: None,
            frames: Vec::new()
        }
    }

    pub fn default_duration(mut self, ms: u16) -> FileSpec {
        self.default_duration = ms;
        self
    }

    pub fn global_palette(mut self, entries: &[u16], encoding: u8) -> FileSpec {
        self.global_palette = Some((entries.to_vec(), encoding));
        self
    }

    pub fn frame(mut self, frame: FrameSpec) -> FileSpec {
        self.frames.push(frame);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        build_file(self)
    }
}

fn palette_entry_bytes(entries: &[u16], encoding: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * 2);

    for value in entries {
        if encoding == ENCODING_BE {
            out.extend_from_slice(&value.to_be_bytes());
        } else {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out
}

fn palette_block(entries: &[u16], encoding: u8, palette_type: u8) -> Vec<u8> {
    let mut out = vec![0_u8; PALETTE_HEADER_SIZE];

    out[0] = palette_type;
    out[1] = PALETTE_HEADER_SIZE as u8;
    out[2..4].copy_from_slice(&(entries.len() as u16).to_le_bytes());
    out[4] = encoding;
    out.extend_from_slice(&palette_entry_bytes(entries, encoding));
    out
}

/// Extract the pixels of one zone from a row-major frame image
pub fn zone_tile(
    pixels: &[u8], width: usize, zone_width: usize, zone_height: usize, zone_index: usize
) -> Vec<u8> {
    let zones_per_row = width / zone_width;
    let zone_x = (zone_index % zones_per_row) * zone_width;
    let zone_y = (zone_index / zones_per_row) * zone_height;

    let mut tile = Vec::with_capacity(zone_width * zone_height);

    for row in 0..zone_height {
        let start = (zone_y + row) * width + zone_x;
        tile.extend_from_slice(&pixels[start..start + zone_width]);
    }
    tile
}

fn frame_block(spec: &FileSpec, frame: &FrameSpec) -> Vec<u8> {
    let width = usize::from(spec.width);
    let zone_width = usize::from(spec.zone_width);
    let zone_height = usize::from(spec.zone_height);
    let zone_count =
        (width / zone_width) * (usize::from(spec.height) / usize::from(spec.zone_height));

    let mut block = vec![0_u8; FRAME_HEADER_SIZE];

    let mut flags = 0_u8;
    if frame.keyframe {
        flags |= 0x01;
    }
    if frame.local_palette.is_some() {
        flags |= 0x02;
    }

    block[0] = 1;
    block[1] = FRAME_HEADER_SIZE as u8;
    block[2] = flags;
    block[3..5].copy_from_slice(&(zone_count as u16).to_le_bytes());
    block[5] = frame.compression;

    if let Some((entries, encoding)) = &frame.local_palette {
        block[8..10].copy_from_slice(&(entries.len() as u16).to_le_bytes());
        block.extend_from_slice(&palette_block(entries, *encoding, 1));
    }

    for zone_index in 0..zone_count {
        let tile = zone_tile(&frame.pixels, width, zone_width, zone_height, zone_index);
        let payload = if frame.compression == COMPRESSION_LZ4 {
            lz4_flex::block::compress(&tile)
        } else {
            tile
        };

        block.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        block.extend_from_slice(&payload);
    }
    block
}

pub fn build_file(spec: &FileSpec) -> Vec<u8> {
    let mut file = vec![0_u8; FILE_HEADER_SIZE];

    let mut flags = 0x04_u8;
    if spec.global_palette.is_some() {
        flags |= 0x01;
    }

    file[0..4].copy_from_slice(b"ZEL0");
    file[4..6].copy_from_slice(&1_u16.to_le_bytes());
    file[6..8].copy_from_slice(&(FILE_HEADER_SIZE as u16).to_le_bytes());
    file[8..10].copy_from_slice(&spec.width.to_le_bytes());
    file[10..12].copy_from_slice(&spec.height.to_le_bytes());
    file[12..14].copy_from_slice(&spec.zone_width.to_le_bytes());
    file[14..16].copy_from_slice(&spec.zone_height.to_le_bytes());
    file[16] = 0;
    file[17] = flags;
    file[18..22].copy_from_slice(&(spec.frames.len() as u32).to_le_bytes());
    file[22..24].copy_from_slice(&spec.default_duration.to_le_bytes());

    if let Some((entries, encoding)) = &spec.global_palette {
        file.extend_from_slice(&palette_block(entries, *encoding, 0));
    }

    let index_offset = file.len();
    file.resize(index_offset + spec.frames.len() * FRAME_INDEX_ENTRY_SIZE, 0);

    for (i, frame) in spec.frames.iter().enumerate() {
        let block = frame_block(spec, frame);
        let frame_offset = file.len() as u32;
        let frame_size = block.len() as u32;

        file.extend_from_slice(&block);

        let mut entry_flags = 0_u8;
        if frame.keyframe {
            entry_flags |= 0x01;
        }
        if frame.local_palette.is_some() {
            entry_flags |= 0x02;
        }

        let entry = index_offset + i * FRAME_INDEX_ENTRY_SIZE;
        file[entry..entry + 4].copy_from_slice(&frame_offset.to_le_bytes());
        file[entry + 4..entry + 8].copy_from_slice(&frame_size.to_le_bytes());
        file[entry + 8] = entry_flags;
        file[entry + 9..entry + 11].copy_from_slice(&frame.duration.to_le_bytes());
    }

    file
}

/// Byte offset of the frame-index entry for `frame`
pub fn index_entry_offset(spec: &FileSpec, frame: usize) -> usize {
    let palette_bytes = spec
        .global_palette
        .as_ref()
        .map_or(0, |(entries, _)| PALETTE_HEADER_SIZE + entries.len() * 2);

    FILE_HEADER_SIZE + palette_bytes + frame * FRAME_INDEX_ENTRY_SIZE
}

/// Byte offset of the frame block for `frame`, as recorded in the index
pub fn frame_block_offset(file: &[u8], spec: &FileSpec, frame: usize) -> usize {
    let entry = index_entry_offset(spec, frame);

    u32::from_le_bytes(file[entry..entry + 4].try_into().unwrap()) as usize
}
