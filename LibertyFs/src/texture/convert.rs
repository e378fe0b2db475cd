//! PC / Xbox 360 texture container conversion
//!
//! The two platforms store the same resource containers with different
//! byte order (PC little-endian, Xbox big-endian), different texture type
//! codes in the RSC header, and different texel layouts (PC linear, Xbox
//! Morton tiled).
//!
//! Conversion rewrites the header only. Texel data is left in place; the
//! swizzle helpers work on one mip level at a time and the caller supplies
//! its dimensions.

use std::path::Path;

use super::morton::morton_encode;
use crate::error::{Error, Result};
use crate::formats::rsc::{RSC_HEADER_SIZE, RSC_MAGIC, resource_type};

/// Resource extensions used by the Xbox 360 build
pub const XBOX_EXTENSIONS: [&str; 4] = [".xtd", ".xdr", ".xft", ".xbd"];

/// Resource extensions used by the PC build
pub const PC_EXTENSIONS: [&str; 4] = [".wtd", ".wdr", ".wft", ".wbd"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    #[default]
    Pc,
    Xbox360,
}

impl Platform {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pc => "PC",
            Self::Xbox360 => "Xbox 360",
        }
    }
}

/// Texel formats found in texture dictionaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Unknown,
    Dxt1,
    Dxt3,
    Dxt5,
    Dxn,
    A8R8G8B8,
    X8R8G8B8,
    R5G6B5,
    A1R5G5B5,
    A4R4G4B4,
    L8,
    A8L8,
}

impl TextureFormat {
    /// Bytes per pixel, or per 4x4 block for compressed formats.
    #[must_use]
    pub fn bytes_per_element(self) -> u32 {
        match self {
            Self::Dxt1 => 8,
            Self::Dxt3 | Self::Dxt5 | Self::Dxn => 16,
            Self::R5G6B5 | Self::A1R5G5B5 | Self::A4R4G4B4 | Self::A8L8 => 2,
            Self::L8 => 1,
            Self::A8R8G8B8 | Self::X8R8G8B8 | Self::Unknown => 4,
        }
    }

    /// `(width, height)` of one element in pixels.
    #[must_use]
    pub fn block_size(self) -> (u32, u32) {
        if self.is_compressed() { (4, 4) } else { (1, 1) }
    }

    #[must_use]
    pub fn is_compressed(self) -> bool {
        matches!(self, Self::Dxt1 | Self::Dxt3 | Self::Dxt5 | Self::Dxn)
    }
}

/// Platform implied by a resource extension. Unknown extensions are PC.
pub fn detect_platform(path: impl AsRef<Path>) -> Platform {
    let ext = path
        .as_ref()
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default();
    if XBOX_EXTENSIONS.contains(&ext.as_str()) {
        Platform::Xbox360
    } else {
        Platform::Pc
    }
}

/// Platform implied by the RSC header type, read in either byte order.
///
/// Anything that is not an Xbox texture header is PC.
#[must_use]
pub fn detect_platform_from_header(data: &[u8]) -> Platform {
    let Some(header) = data.get(..RSC_HEADER_SIZE) else {
        return Platform::Pc;
    };
    let magic = [header[0], header[1], header[2], header[3]];
    let kind = [header[4], header[5], header[6], header[7]];

    let type_code = if u32::from_le_bytes(magic) == RSC_MAGIC {
        u32::from_le_bytes(kind)
    } else if u32::from_be_bytes(magic) == RSC_MAGIC {
        u32::from_be_bytes(kind)
    } else {
        return Platform::Pc;
    };

    if type_code == resource_type::XBOX_TEXTURE {
        Platform::Xbox360
    } else {
        Platform::Pc
    }
}

/// Whether a file at `path` must be converted before `target` can use it.
pub fn needs_conversion(path: impl AsRef<Path>, target: Platform) -> bool {
    detect_platform(path) != target
}

/// Counterpart extension on the other platform (`.wtd` <-> `.xtd`).
#[must_use]
pub fn counterpart_extension(ext: &str) -> Option<&'static str> {
    let lower = ext.to_ascii_lowercase();
    if let Some(i) = XBOX_EXTENSIONS.iter().position(|e| *e == lower) {
        return Some(PC_EXTENSIONS[i]);
    }
    PC_EXTENSIONS
        .iter()
        .position(|e| *e == lower)
        .map(|i| XBOX_EXTENSIONS[i])
}

/// Reverse byte order of every complete `element_size` chunk (2 or 4).
///
/// Other sizes leave the data untouched.
pub fn swap_endian(data: &mut [u8], element_size: usize) {
    if matches!(element_size, 2 | 4) {
        for chunk in data.chunks_exact_mut(element_size) {
            chunk.reverse();
        }
    }
}

fn blocks(extent: u32, block: u32) -> u32 {
    extent.div_ceil(block.max(1))
}

/// Reorder linear elements into Morton order.
///
/// Returns the input unchanged when it is smaller than the described
/// surface. Elements whose Morton offset falls outside the buffer are
/// dropped.
#[must_use]
pub fn swizzle_linear_to_morton(
    linear: &[u8],
    width: u32,
    height: u32,
    bytes_per_element: u32,
    block_width: u32,
    block_height: u32,
) -> Vec<u8> {
    let wide = blocks(width, block_width);
    let high = blocks(height, block_height);
    let bpe = bytes_per_element as usize;
    let expected = wide as usize * high as usize * bpe;
    if bpe == 0 || linear.len() < expected {
        return linear.to_vec();
    }

    let mut out = vec![0u8; linear.len()];
    copy_blocks(wide, high, bpe, |linear_at, morton_at| {
        if let (Some(src), Some(dst)) = (linear.get(linear_at..linear_at + bpe), out.get_mut(morton_at..morton_at + bpe)) {
            dst.copy_from_slice(src);
        }
    });
    out
}

/// Inverse of [`swizzle_linear_to_morton`].
#[must_use]
pub fn deswizzle_morton_to_linear(
    morton: &[u8],
    width: u32,
    height: u32,
    bytes_per_element: u32,
    block_width: u32,
    block_height: u32,
) -> Vec<u8> {
    let wide = blocks(width, block_width);
    let high = blocks(height, block_height);
    let bpe = bytes_per_element as usize;
    if bpe == 0 {
        return morton.to_vec();
    }

    let mut out = vec![0u8; morton.len()];
    copy_blocks(wide, high, bpe, |linear_at, morton_at| {
        if let (Some(src), Some(dst)) = (morton.get(morton_at..morton_at + bpe), out.get_mut(linear_at..linear_at + bpe)) {
            dst.copy_from_slice(src);
        }
    });
    out
}

/// Swizzle one mip level of `format`.
#[must_use]
pub fn swizzle_format(linear: &[u8], width: u32, height: u32, format: TextureFormat) -> Vec<u8> {
    let (bw, bh) = format.block_size();
    swizzle_linear_to_morton(linear, width, height, format.bytes_per_element(), bw, bh)
}

/// Deswizzle one mip level of `format`.
#[must_use]
pub fn deswizzle_format(morton: &[u8], width: u32, height: u32, format: TextureFormat) -> Vec<u8> {
    let (bw, bh) = format.block_size();
    deswizzle_morton_to_linear(morton, width, height, format.bytes_per_element(), bw, bh)
}

/// Visit every block as `(linear offset, morton offset)`.
fn copy_blocks(wide: u32, high: u32, bpe: usize, mut copy: impl FnMut(usize, usize)) {
    for by in 0..high {
        for bx in 0..wide {
            let linear_at = (by as usize * wide as usize + bx as usize) * bpe;
            let morton_at = morton_encode(bx, by) as usize * bpe;
            copy(linear_at, morton_at);
        }
    }
}

fn read_type_le(data: &[u8]) -> u32 {
    u32::from_le_bytes([data[4], data[5], data[6], data[7]])
}

fn write_type_le(data: &mut [u8], value: u32) {
    data[4..8].copy_from_slice(&value.to_le_bytes());
}

/// Rewrite a PC resource for the Xbox 360: PC texture type becomes the
/// Xbox type, then the header words are byte-swapped.
///
/// # Errors
/// [`Error::ResourceTooSmall`] if `data` is shorter than an RSC header.
pub fn convert_pc_to_xbox360(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < RSC_HEADER_SIZE {
        return Err(Error::ResourceTooSmall(data.len()));
    }
    let mut out = data.to_vec();
    if read_type_le(&out) == resource_type::PC_TEXTURE {
        write_type_le(&mut out, resource_type::XBOX_TEXTURE);
    }
    swap_endian(&mut out[..RSC_HEADER_SIZE], 4);
    tracing::debug!("Converted PC texture to Xbox 360 layout ({} bytes)", out.len());
    Ok(out)
}

/// Rewrite an Xbox 360 resource for the PC: header words are byte-swapped,
/// then the Xbox texture type becomes the PC type.
///
/// # Errors
/// [`Error::ResourceTooSmall`] if `data` is shorter than an RSC header.
pub fn convert_xbox360_to_pc(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < RSC_HEADER_SIZE {
        return Err(Error::ResourceTooSmall(data.len()));
    }
    let mut out = data.to_vec();
    swap_endian(&mut out[..RSC_HEADER_SIZE], 4);
    if read_type_le(&out) == resource_type::XBOX_TEXTURE {
        write_type_le(&mut out, resource_type::PC_TEXTURE);
    }
    tracing::debug!("Converted Xbox 360 texture to PC layout ({} bytes)", out.len());
    Ok(out)
}

/// Convert `data` so it matches `target`, detecting the source from the
/// header.
pub fn convert_to(data: &[u8], target: Platform) -> Result<Vec<u8>> {
    match (detect_platform_from_header(data), target) {
        (Platform::Pc, Platform::Xbox360) => convert_pc_to_xbox360(data),
        (Platform::Xbox360, Platform::Pc) => convert_xbox360_to_pc(data),
        _ => Ok(data.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::rsc::{ByteOrder, ResourceHeader};

    fn pc_texture() -> Vec<u8> {
        let header = ResourceHeader {
            magic: RSC_MAGIC,
            resource_type: resource_type::PC_TEXTURE,
            flags: 0x0000_1234,
            compress_codec: 0,
            padding: 0,
            byte_order: ByteOrder::Little,
        };
        let mut data = header.to_bytes().to_vec();
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data
    }

    #[test]
    fn test_detect_platform_by_extension() {
        assert_eq!(detect_platform("a/b/car.XTD"), Platform::Xbox360);
        assert_eq!(detect_platform("car.xbd"), Platform::Xbox360);
        assert_eq!(detect_platform("car.wtd"), Platform::Pc);
        assert_eq!(detect_platform("readme.txt"), Platform::Pc);
        assert_eq!(detect_platform("noext"), Platform::Pc);
        assert!(needs_conversion("car.wtd", Platform::Xbox360));
        assert!(!needs_conversion("car.xtd", Platform::Xbox360));
    }

    #[test]
    fn test_counterpart_extension() {
        assert_eq!(counterpart_extension(".XTD"), Some(".wtd"));
        assert_eq!(counterpart_extension(".wbd"), Some(".xbd"));
        assert_eq!(counterpart_extension(".dat"), None);
    }

    #[test]
    fn test_pc_to_xbox_header() {
        let pc = pc_texture();
        let xbox = convert_pc_to_xbox360(&pc).unwrap();

        assert_eq!(detect_platform_from_header(&pc), Platform::Pc);
        assert_eq!(detect_platform_from_header(&xbox), Platform::Xbox360);

        let header = ResourceHeader::parse_any_order(&xbox).unwrap();
        assert_eq!(header.byte_order, ByteOrder::Big);
        assert_eq!(header.resource_type, resource_type::XBOX_TEXTURE);
        assert_eq!(header.flags, 0x0000_1234);
        // Body untouched
        assert_eq!(&xbox[16..], &pc[16..]);
    }

    #[test]
    fn test_round_trip_conversion() {
        let pc = pc_texture();
        let xbox = convert_to(&pc, Platform::Xbox360).unwrap();
        let back = convert_to(&xbox, Platform::Pc).unwrap();
        assert_eq!(back, pc);
        assert_eq!(convert_to(&pc, Platform::Pc).unwrap(), pc);
    }

    #[test]
    fn test_too_small() {
        assert!(matches!(convert_pc_to_xbox360(&[0u8; 8]), Err(Error::ResourceTooSmall(8))));
        assert!(convert_xbox360_to_pc(&[]).is_err());
        assert_eq!(detect_platform_from_header(&[0u8; 4]), Platform::Pc);
    }

    #[test]
    fn test_swap_endian() {
        let mut data = vec![1, 2, 3, 4, 5, 6, 7];
        swap_endian(&mut data, 4);
        assert_eq!(data, [4, 3, 2, 1, 5, 6, 7]);
        swap_endian(&mut data, 2);
        assert_eq!(data, [3, 4, 1, 2, 6, 5, 7]);
        swap_endian(&mut data, 3);
        assert_eq!(data, [3, 4, 1, 2, 6, 5, 7]);
    }

    #[test]
    fn test_swizzle_square() {
        // 4x4 single-byte texels: linear index == value
        let linear: Vec<u8> = (0..16).collect();
        let swizzled = swizzle_linear_to_morton(&linear, 4, 4, 1, 1, 1);
        // Morton order visits (0,0) (1,0) (0,1) (1,1) (2,0) ...
        assert_eq!(&swizzled[..8], &[0, 1, 4, 5, 2, 3, 6, 7]);
        assert_eq!(deswizzle_morton_to_linear(&swizzled, 4, 4, 1, 1, 1), linear);
    }

    #[test]
    fn test_swizzle_dxt_blocks() {
        // 8x8 DXT1 = 2x2 blocks of 8 bytes
        let linear: Vec<u8> = (0..32).collect();
        let swizzled = swizzle_format(&linear, 8, 8, TextureFormat::Dxt1);
        assert_eq!(&swizzled[8..16], &linear[8..16]);
        assert_eq!(&swizzled[16..24], &linear[16..24]);
        assert_eq!(deswizzle_format(&swizzled, 8, 8, TextureFormat::Dxt1), linear);
    }

    #[test]
    fn test_swizzle_short_input_passthrough() {
        let data = vec![9u8; 3];
        assert_eq!(swizzle_linear_to_morton(&data, 4, 4, 1, 1, 1), data);
    }

    #[test]
    fn test_swizzle_non_square_skips_out_of_range() {
        // 4x1: morton offsets 0,1,4,5 exceed a 4-byte buffer for x >= 2
        let linear = vec![1u8, 2, 3, 4];
        let swizzled = swizzle_linear_to_morton(&linear, 4, 1, 1, 1, 1);
        assert_eq!(swizzled, [1, 2, 0, 0]);
    }

    #[test]
    fn test_format_properties() {
        assert_eq!(TextureFormat::Dxt1.bytes_per_element(), 8);
        assert_eq!(TextureFormat::Dxn.bytes_per_element(), 16);
        assert_eq!(TextureFormat::A8L8.bytes_per_element(), 2);
        assert_eq!(TextureFormat::L8.bytes_per_element(), 1);
        assert_eq!(TextureFormat::Dxt5.block_size(), (4, 4));
        assert_eq!(TextureFormat::A8R8G8B8.block_size(), (1, 1));
    }
}
