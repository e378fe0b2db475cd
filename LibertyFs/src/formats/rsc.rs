//! RSC resource header
//!
//! Textures, models and bounds inside both container formats are wrapped in
//! a 16-byte header:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 4 | magic `RSC\x05` |
//! | 4 | 4 | resource type |
//! | 8 | 4 | packed CPU/GPU section sizes |
//! | 12 | 2 | compression codec |
//! | 14 | 2 | padding |

/// `RSC\x05` read as a little-endian u32.
pub const RSC_MAGIC: u32 = 0x05435352;

/// Size of [`ResourceHeader`] on disk.
pub const RSC_HEADER_SIZE: usize = 16;

/// High byte of a pointer into the CPU section.
pub const CPU_SECTION_MARKER: u8 = 0x50;
/// High byte of a pointer into the GPU section.
pub const GPU_SECTION_MARKER: u8 = 0x60;

/// Resource type codes.
pub mod resource_type {
    pub const GENERIC: u32 = 0x01;
    /// `.wtd` / `.xtd`
    pub const TEXTURE_ARCHIVE: u32 = 0x08;
    /// `.wbd` / `.xbd`
    pub const BOUNDS: u32 = 0x20;
    pub const XPFL: u32 = 0x24;
    /// `.wdr` / `.xdr`
    pub const MODEL: u32 = 0x6E;

    pub const XBOX_TEXTURE: u32 = 0x07;
    pub const PC_TEXTURE: u32 = 0x08;
}

/// Byte order a header was stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// Decoded view over the first 16 bytes of a resource payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceHeader {
    pub magic: u32,
    pub resource_type: u32,
    pub flags: u32,
    pub compress_codec: u16,
    pub padding: u16,
    /// Order the fields were decoded in.
    pub byte_order: ByteOrder,
}

impl ResourceHeader {
    /// Decode a little-endian header. Returns `None` if `data` is short or the
    /// magic does not match.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let header = Self::read(data, ByteOrder::Little)?;
        (header.magic == RSC_MAGIC).then_some(header)
    }

    /// Decode trying little-endian first, then big-endian.
    pub fn parse_any_order(data: &[u8]) -> Option<Self> {
        Self::parse(data).or_else(|| {
            let header = Self::read(data, ByteOrder::Big)?;
            (header.magic == RSC_MAGIC).then_some(header)
        })
    }

    fn read(data: &[u8], order: ByteOrder) -> Option<Self> {
        if data.len() < RSC_HEADER_SIZE {
            return None;
        }
        let u32_at = |i: usize| {
            let bytes: [u8; 4] = [data[i], data[i + 1], data[i + 2], data[i + 3]];
            match order {
                ByteOrder::Little => u32::from_le_bytes(bytes),
                ByteOrder::Big => u32::from_be_bytes(bytes),
            }
        };
        let u16_at = |i: usize| {
            let bytes = [data[i], data[i + 1]];
            match order {
                ByteOrder::Little => u16::from_le_bytes(bytes),
                ByteOrder::Big => u16::from_be_bytes(bytes),
            }
        };
        Some(Self {
            magic: u32_at(0),
            resource_type: u32_at(4),
            flags: u32_at(8),
            compress_codec: u16_at(12),
            padding: u16_at(14),
            byte_order: order,
        })
    }

    /// Encode in the header's own byte order.
    pub fn to_bytes(&self) -> [u8; RSC_HEADER_SIZE] {
        let mut out = [0u8; RSC_HEADER_SIZE];
        let (w32, w16): (fn(u32) -> [u8; 4], fn(u16) -> [u8; 2]) = match self.byte_order {
            ByteOrder::Little => (u32::to_le_bytes, u16::to_le_bytes),
            ByteOrder::Big => (u32::to_be_bytes, u16::to_be_bytes),
        };
        out[0..4].copy_from_slice(&w32(self.magic));
        out[4..8].copy_from_slice(&w32(self.resource_type));
        out[8..12].copy_from_slice(&w32(self.flags));
        out[12..14].copy_from_slice(&w16(self.compress_codec));
        out[14..16].copy_from_slice(&w16(self.padding));
        out
    }

    /// CPU (virtual) section size in bytes.
    pub fn cpu_size(&self) -> u32 {
        cpu_size_from_flags(self.flags)
    }

    /// GPU (physical) section size in bytes.
    pub fn gpu_size(&self) -> u32 {
        gpu_size_from_flags(self.flags)
    }

    pub fn is_texture(&self) -> bool {
        is_texture_resource(self.resource_type)
    }
}

pub fn cpu_size_from_flags(flags: u32) -> u32 {
    (flags & 0x7FF) << ((flags >> 11) & 0xF)
}

pub fn gpu_size_from_flags(flags: u32) -> u32 {
    ((flags >> 15) & 0x7FF) << ((flags >> 26) & 0xF)
}

/// Whether `data` starts with a little-endian RSC header.
pub fn is_resource(data: &[u8]) -> bool {
    ResourceHeader::parse(data).is_some()
}

pub fn is_texture_resource(resource_type: u32) -> bool {
    matches!(
        resource_type,
        resource_type::TEXTURE_ARCHIVE | resource_type::XBOX_TEXTURE
    )
}

pub fn is_model_resource(resource_type: u32) -> bool {
    resource_type == resource_type::MODEL
}

pub fn is_cpu_offset(offset: u32) -> bool {
    offset >> 24 == u32::from(CPU_SECTION_MARKER)
}

pub fn is_gpu_offset(offset: u32) -> bool {
    offset >> 24 == u32::from(GPU_SECTION_MARKER)
}

pub fn strip_section_marker(offset: u32) -> u32 {
    offset & 0x00FF_FFFF
}
