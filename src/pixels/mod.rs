//! Pixel formats and the conversion pivots.
//!
//! Every uncompressed format conversion in the crate goes through one of two
//! canonical representations: a byte-RGBA [`Color`] array or a normalized
//! `Vector4<f32>` array. Converting `A → B` is "unpack A into the pivot,
//! pack the pivot as B"; no pairwise conversion matrix exists.
//!
//! Compressed formats are opaque payloads: they can be sized and uploaded,
//! never unpacked on the CPU.

use crate::math::Color;
use cgmath::Vector4;

pub mod generate;
pub mod image;

pub use image::Image;

// =============================================================================
// Pixel formats
// =============================================================================

/// Pixel layout of an image or texture.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8 bpp, single channel.
    Grayscale = 1,
    /// 16 bpp, gray + alpha.
    GrayAlpha,
    /// 16 bpp packed.
    R5G6B5,
    /// 24 bpp.
    R8G8B8,
    /// 16 bpp packed, 1-bit alpha.
    R5G5B5A1,
    /// 16 bpp packed, 4-bit alpha.
    R4G4B4A4,
    /// 32 bpp.
    R8G8B8A8,
    /// 32 bpp, single float channel.
    R32,
    /// 96 bpp, three float channels.
    R32G32B32,
    /// 128 bpp, four float channels.
    R32G32B32A32,
    /// 4 bpp block compression.
    Dxt1Rgb,
    /// 4 bpp block compression, 1-bit alpha.
    Dxt1Rgba,
    /// 8 bpp block compression, explicit alpha.
    Dxt3Rgba,
    /// 8 bpp block compression, interpolated alpha.
    Dxt5Rgba,
    /// 4 bpp, ETC1.
    Etc1Rgb,
    /// 4 bpp, ETC2.
    Etc2Rgb,
    /// 8 bpp, ETC2 + EAC alpha.
    Etc2EacRgba,
    /// 4 bpp, PVRTC.
    PvrtRgb,
    /// 4 bpp, PVRTC with alpha.
    PvrtRgba,
    /// 8 bpp, ASTC 4×4 blocks.
    Astc4x4Rgba,
    /// 2 bpp, ASTC 8×8 blocks.
    Astc8x8Rgba,
}

impl PixelFormat {
    /// Whether this format is a block-compressed payload.
    pub fn is_compressed(self) -> bool {
        !matches!(
            self,
            PixelFormat::Grayscale
                | PixelFormat::GrayAlpha
                | PixelFormat::R5G6B5
                | PixelFormat::R8G8B8
                | PixelFormat::R5G5B5A1
                | PixelFormat::R4G4B4A4
                | PixelFormat::R8G8B8A8
                | PixelFormat::R32
                | PixelFormat::R32G32B32
                | PixelFormat::R32G32B32A32
        )
    }

    /// Bits per pixel for this format.
    pub fn bits_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Grayscale => 8,
            PixelFormat::GrayAlpha
            | PixelFormat::R5G6B5
            | PixelFormat::R5G5B5A1
            | PixelFormat::R4G4B4A4 => 16,
            PixelFormat::R8G8B8 => 24,
            PixelFormat::R8G8B8A8 | PixelFormat::R32 => 32,
            PixelFormat::R32G32B32 => 96,
            PixelFormat::R32G32B32A32 => 128,
            PixelFormat::Dxt1Rgb
            | PixelFormat::Dxt1Rgba
            | PixelFormat::Etc1Rgb
            | PixelFormat::Etc2Rgb
            | PixelFormat::PvrtRgb
            | PixelFormat::PvrtRgba => 4,
            PixelFormat::Dxt3Rgba
            | PixelFormat::Dxt5Rgba
            | PixelFormat::Etc2EacRgba
            | PixelFormat::Astc4x4Rgba => 8,
            PixelFormat::Astc8x8Rgba => 2,
        }
    }

    /// Bytes needed to store a `width × height` level in this format.
    pub fn buffer_size(self, width: i32, height: i32) -> usize {
        let bits = width.max(0) as u64 * height.max(0) as u64 * self.bits_per_pixel() as u64;
        bits.div_ceil(8) as usize
    }

    /// Bytes needed for a full mip chain of `mipmaps` levels, the base level
    /// being `width × height`. Each dimension halves per level, clamped to 1.
    pub fn buffer_size_with_mipmaps(self, width: i32, height: i32, mipmaps: i32) -> usize {
        let mut total = 0;
        let (mut w, mut h) = (width.max(1), height.max(1));
        for _ in 0..mipmaps.max(1) {
            total += self.buffer_size(w, h);
            w = (w / 2).max(1);
            h = (h / 2).max(1);
        }
        total
    }
}

// =============================================================================
// Unpack: format -> pivot
// =============================================================================

#[inline]
fn expand5(v: u16) -> u8 {
    ((v as u32 * 255 + 15) / 31) as u8
}

#[inline]
fn expand6(v: u16) -> u8 {
    ((v as u32 * 255 + 31) / 63) as u8
}

#[inline]
fn expand4(v: u16) -> u8 {
    (v as u8) * 17
}

/// Unpacks raw pixel bytes into the byte-RGBA pivot.
///
/// Compressed formats cannot be unpacked; the call logs a warning and
/// returns an empty vector.
pub fn pixels_to_colors(data: &[u8], format: PixelFormat) -> Vec<Color> {
    if format.is_compressed() {
        log::warn!("cannot unpack compressed pixel data ({format:?})");
        return Vec::new();
    }

    match format {
        PixelFormat::Grayscale => data.iter().map(|&g| Color::new(g, g, g, 255)).collect(),
        PixelFormat::GrayAlpha => data
            .chunks_exact(2)
            .map(|p| Color::new(p[0], p[0], p[0], p[1]))
            .collect(),
        PixelFormat::R5G6B5 => data
            .chunks_exact(2)
            .map(|p| {
                let v = u16::from_le_bytes([p[0], p[1]]);
                Color::new(expand5(v >> 11), expand6((v >> 5) & 0x3F), expand5(v & 0x1F), 255)
            })
            .collect(),
        PixelFormat::R8G8B8 => data
            .chunks_exact(3)
            .map(|p| Color::new(p[0], p[1], p[2], 255))
            .collect(),
        PixelFormat::R5G5B5A1 => data
            .chunks_exact(2)
            .map(|p| {
                let v = u16::from_le_bytes([p[0], p[1]]);
                Color::new(
                    expand5(v >> 11),
                    expand5((v >> 6) & 0x1F),
                    expand5((v >> 1) & 0x1F),
                    if v & 1 != 0 { 255 } else { 0 },
                )
            })
            .collect(),
        PixelFormat::R4G4B4A4 => data
            .chunks_exact(2)
            .map(|p| {
                let v = u16::from_le_bytes([p[0], p[1]]);
                Color::new(
                    expand4(v >> 12),
                    expand4((v >> 8) & 0xF),
                    expand4((v >> 4) & 0xF),
                    expand4(v & 0xF),
                )
            })
            .collect(),
        PixelFormat::R8G8B8A8 => data
            .chunks_exact(4)
            .map(|p| Color::new(p[0], p[1], p[2], p[3]))
            .collect(),
        // Float formats round-trip through the normalized pivot.
        PixelFormat::R32 | PixelFormat::R32G32B32 | PixelFormat::R32G32B32A32 => {
            pixels_to_normalized(data, format)
                .into_iter()
                .map(Color::from_normalized)
                .collect()
        }
        _ => unreachable!("compressed formats handled above"),
    }
}

/// Unpacks raw pixel bytes into the normalized `Vector4<f32>` pivot.
pub fn pixels_to_normalized(data: &[u8], format: PixelFormat) -> Vec<Vector4<f32>> {
    match format {
        PixelFormat::R32 => data
            .chunks_exact(4)
            .map(|p| {
                let v = f32::from_le_bytes([p[0], p[1], p[2], p[3]]);
                Vector4::new(v, 0.0, 0.0, 1.0)
            })
            .collect(),
        PixelFormat::R32G32B32 => data
            .chunks_exact(12)
            .map(|p| {
                Vector4::new(
                    f32::from_le_bytes([p[0], p[1], p[2], p[3]]),
                    f32::from_le_bytes([p[4], p[5], p[6], p[7]]),
                    f32::from_le_bytes([p[8], p[9], p[10], p[11]]),
                    1.0,
                )
            })
            .collect(),
        PixelFormat::R32G32B32A32 => data
            .chunks_exact(16)
            .map(|p| {
                Vector4::new(
                    f32::from_le_bytes([p[0], p[1], p[2], p[3]]),
                    f32::from_le_bytes([p[4], p[5], p[6], p[7]]),
                    f32::from_le_bytes([p[8], p[9], p[10], p[11]]),
                    f32::from_le_bytes([p[12], p[13], p[14], p[15]]),
                )
            })
            .collect(),
        _ => pixels_to_colors(data, format)
            .into_iter()
            .map(Color::normalize)
            .collect(),
    }
}

// =============================================================================
// Pack: pivot -> format
// =============================================================================

#[inline]
fn quant(v: f32, max: u32) -> u16 {
    (v.clamp(0.0, 1.0) * max as f32).round() as u16
}

/// Luminance of a normalized pixel (Rec. 601 weights).
#[inline]
fn luminance(p: Vector4<f32>) -> f32 {
    p.x * 0.299 + p.y * 0.587 + p.z * 0.114
}

/// Packs normalized pivot pixels into raw bytes of `format`.
///
/// Compressed targets are rejected with a warning and an empty result;
/// encoding block formats on the CPU is out of scope.
pub fn normalized_to_pixels(pixels: &[Vector4<f32>], format: PixelFormat) -> Vec<u8> {
    if format.is_compressed() {
        log::warn!("cannot pack pixels into compressed format {format:?}");
        return Vec::new();
    }

    let mut out = Vec::with_capacity(format.buffer_size(pixels.len() as i32, 1));
    for &p in pixels {
        match format {
            PixelFormat::Grayscale => out.push(quant(luminance(p), 255) as u8),
            PixelFormat::GrayAlpha => {
                out.push(quant(luminance(p), 255) as u8);
                out.push(quant(p.w, 255) as u8);
            }
            PixelFormat::R5G6B5 => {
                let v = (quant(p.x, 31) << 11) | (quant(p.y, 63) << 5) | quant(p.z, 31);
                out.extend_from_slice(&v.to_le_bytes());
            }
            PixelFormat::R8G8B8 => {
                out.push(quant(p.x, 255) as u8);
                out.push(quant(p.y, 255) as u8);
                out.push(quant(p.z, 255) as u8);
            }
            PixelFormat::R5G5B5A1 => {
                let a = if p.w >= 0.5 { 1 } else { 0 };
                let v = (quant(p.x, 31) << 11) | (quant(p.y, 31) << 6) | (quant(p.z, 31) << 1) | a;
                out.extend_from_slice(&v.to_le_bytes());
            }
            PixelFormat::R4G4B4A4 => {
                let v = (quant(p.x, 15) << 12)
                    | (quant(p.y, 15) << 8)
                    | (quant(p.z, 15) << 4)
                    | quant(p.w, 15);
                out.extend_from_slice(&v.to_le_bytes());
            }
            PixelFormat::R8G8B8A8 => {
                out.push(quant(p.x, 255) as u8);
                out.push(quant(p.y, 255) as u8);
                out.push(quant(p.z, 255) as u8);
                out.push(quant(p.w, 255) as u8);
            }
            PixelFormat::R32 => out.extend_from_slice(&luminance(p).to_le_bytes()),
            PixelFormat::R32G32B32 => {
                out.extend_from_slice(&p.x.to_le_bytes());
                out.extend_from_slice(&p.y.to_le_bytes());
                out.extend_from_slice(&p.z.to_le_bytes());
            }
            PixelFormat::R32G32B32A32 => {
                out.extend_from_slice(&p.x.to_le_bytes());
                out.extend_from_slice(&p.y.to_le_bytes());
                out.extend_from_slice(&p.z.to_le_bytes());
                out.extend_from_slice(&p.w.to_le_bytes());
            }
            _ => unreachable!("compressed formats handled above"),
        }
    }
    out
}

/// Packs byte-RGBA pivot pixels into raw bytes of `format`.
pub fn colors_to_pixels(colors: &[Color], format: PixelFormat) -> Vec<u8> {
    match format {
        // The byte formats pack without a float detour.
        PixelFormat::R8G8B8A8 => {
            let mut out = Vec::with_capacity(colors.len() * 4);
            for c in colors {
                out.extend_from_slice(&[c.r, c.g, c.b, c.a]);
            }
            out
        }
        PixelFormat::R8G8B8 => {
            let mut out = Vec::with_capacity(colors.len() * 3);
            for c in colors {
                out.extend_from_slice(&[c.r, c.g, c.b]);
            }
            out
        }
        _ => {
            let normalized: Vec<Vector4<f32>> = colors.iter().map(|c| c.normalize()).collect();
            normalized_to_pixels(&normalized, format)
        }
    }
}
