//! CPU-side images and the operations on them.
//!
//! An [`Image`] owns its pixel bytes. Operations that need per-pixel access
//! unpack the base level into the byte-RGBA pivot, transform it, and repack
//! into the image's own format; see the module docs in [`crate::pixels`].
//! Operations on compressed images are rejected with a warning; decode the
//! payload before manipulating it.

use crate::error::{RenderError, RenderResult};
use crate::math::{Color, Rect};
use crate::pixels::{colors_to_pixels, normalized_to_pixels, pixels_to_colors, pixels_to_normalized, PixelFormat};
use cgmath::Vector4;

/// A CPU-side raster: raw bytes plus layout metadata.
///
/// Invariant: `data` is non-empty iff `width > 0 && height > 0`, and its
/// length equals [`PixelFormat::buffer_size_with_mipmaps`] for the image's
/// dimensions, format and mip count.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub(crate) data: Vec<u8>,
    pub(crate) width: i32,
    pub(crate) height: i32,
    pub(crate) mipmaps: i32,
    pub(crate) format: PixelFormat,
}

impl Image {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Builds an RGBA8 image from pivot colors. `colors` must hold
    /// `width × height` entries.
    pub fn from_colors(colors: &[Color], width: i32, height: i32) -> Image {
        debug_assert_eq!(colors.len(), (width * height) as usize);
        Image {
            data: colors_to_pixels(colors, PixelFormat::R8G8B8A8),
            width,
            height,
            mipmaps: 1,
            format: PixelFormat::R8G8B8A8,
        }
    }

    /// Adopts raw pixel bytes, validating the length against the metadata.
    pub fn from_raw(
        data: Vec<u8>,
        width: i32,
        height: i32,
        format: PixelFormat,
        mipmaps: i32,
    ) -> RenderResult<Image> {
        let expected = format.buffer_size_with_mipmaps(width, height, mipmaps);
        if data.len() != expected {
            return Err(RenderError::InvalidArgument(format!(
                "pixel buffer is {} bytes, {}x{} {:?} with {} mipmaps needs {}",
                data.len(),
                width,
                height,
                format,
                mipmaps,
                expected
            )));
        }
        Ok(Image {
            data,
            width,
            height,
            mipmaps,
            format,
        })
    }

    /// Decodes PNG or JPEG bytes (already in memory; no file I/O) into an
    /// RGBA8 image.
    pub fn decode(bytes: &[u8]) -> RenderResult<Image> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| RenderError::Decode(e.to_string()))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = (rgba.width() as i32, rgba.height() as i32);
        Ok(Image {
            data: rgba.into_raw(),
            width,
            height,
            mipmaps: 1,
            format: PixelFormat::R8G8B8A8,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn mipmaps(&self) -> i32 {
        self.mipmaps
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Byte length of the base mip level.
    pub(crate) fn base_level_size(&self) -> usize {
        self.format.buffer_size(self.width, self.height)
    }

    /// Unpacks the base level into the byte-RGBA pivot.
    pub fn to_colors(&self) -> Vec<Color> {
        pixels_to_colors(&self.data[..self.base_level_size()], self.format)
    }

    /// Reads one pixel through the pivot. Out-of-range coordinates return
    /// [`Color::BLANK`].
    pub fn pixel_at(&self, x: i32, y: i32) -> Color {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return Color::BLANK;
        }
        if self.format.is_compressed() {
            return Color::BLANK;
        }
        // Every uncompressed format has a whole-byte stride, so only the
        // containing pixel needs unpacking.
        let stride = self.format.bits_per_pixel() as usize / 8;
        let start = (y * self.width + x) as usize * stride;
        pixels_to_colors(&self.data[start..start + stride], self.format)[0]
    }

    // =========================================================================
    // Pivot plumbing
    // =========================================================================

    /// Runs `f` over the pivot colors of the base level and repacks the
    /// result into the current format. Mip levels beyond the base are
    /// dropped. No-op with a warning for compressed images.
    fn with_colors<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Vec<Color>, i32, i32) -> (i32, i32),
    {
        if self.format.is_compressed() {
            log::warn!("pixel operation skipped: image is compressed ({:?})", self.format);
            return;
        }
        let mut colors = self.to_colors();
        let (w, h) = f(&mut colors, self.width, self.height);
        debug_assert_eq!(colors.len(), (w * h) as usize);
        self.data = colors_to_pixels(&colors, self.format);
        self.width = w;
        self.height = h;
        self.mipmaps = 1;
    }

    // =========================================================================
    // Format conversion
    // =========================================================================

    /// Converts the pixel data to `new_format` through the normalized pivot.
    /// Compressed targets or sources are rejected with a warning. Existing
    /// mip levels are discarded and regenerated after the conversion.
    pub fn convert_format(&mut self, new_format: PixelFormat) {
        if self.format == new_format {
            return;
        }
        if self.format.is_compressed() || new_format.is_compressed() {
            log::warn!(
                "format conversion {:?} -> {:?} involves a compressed format, skipped",
                self.format,
                new_format
            );
            return;
        }
        let had_mipmaps = self.mipmaps > 1;
        let normalized = pixels_to_normalized(&self.data[..self.base_level_size()], self.format);
        self.data = normalized_to_pixels(&normalized, new_format);
        self.format = new_format;
        self.mipmaps = 1;
        if had_mipmaps {
            self.gen_mipmaps();
        }
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    /// Pads the image to the next power of two in each dimension, filling
    /// the new border pixels with `fill`.
    pub fn to_pot(&mut self, fill: Color) {
        let pot_w = (self.width as u32).next_power_of_two() as i32;
        let pot_h = (self.height as u32).next_power_of_two() as i32;
        if pot_w == self.width && pot_h == self.height {
            return;
        }
        self.resize_canvas(pot_w, pot_h, 0, 0, fill);
    }

    /// Crops to `rect`, clamped against the image bounds. An empty
    /// intersection is a no-op with a warning.
    pub fn crop(&mut self, rect: Rect) {
        let bounds = Rect::new(0.0, 0.0, self.width as f32, self.height as f32);
        let rect = bounds.intersection(&rect);
        if rect.width < 1.0 || rect.height < 1.0 {
            log::warn!("crop rectangle does not intersect the image, skipped");
            return;
        }
        let (rx, ry) = (rect.x as i32, rect.y as i32);
        let (rw, rh) = (rect.width as i32, rect.height as i32);
        self.with_colors(|colors, w, _| {
            let mut out = Vec::with_capacity((rw * rh) as usize);
            for y in ry..ry + rh {
                for x in rx..rx + rw {
                    out.push(colors[(y * w + x) as usize]);
                }
            }
            *colors = out;
            (rw, rh)
        });
    }

    /// Extracts a sub-image without mutating `self`.
    pub fn sub_image(&self, rect: Rect) -> Image {
        let mut copy = self.clone();
        copy.crop(rect);
        copy
    }

    /// Bicubic (Catmull-Rom) resize through the byte-RGBA pivot.
    pub fn resize(&mut self, new_width: i32, new_height: i32) {
        if new_width <= 0 || new_height <= 0 {
            log::warn!("resize to {new_width}x{new_height} skipped");
            return;
        }
        if new_width == self.width && new_height == self.height {
            return;
        }
        self.with_colors(|colors, w, h| {
            *colors = resample_bicubic(colors, w, h, new_width, new_height);
            (new_width, new_height)
        });
    }

    /// Nearest-neighbor resize using 16.16 fixed-point ratios.
    pub fn resize_nn(&mut self, new_width: i32, new_height: i32) {
        if new_width <= 0 || new_height <= 0 {
            log::warn!("resize to {new_width}x{new_height} skipped");
            return;
        }
        self.with_colors(|colors, w, h| {
            let x_ratio = ((w << 16) / new_width) + 1;
            let y_ratio = ((h << 16) / new_height) + 1;
            let mut out = Vec::with_capacity((new_width * new_height) as usize);
            for y in 0..new_height {
                let sy = ((y * y_ratio) >> 16).min(h - 1);
                for x in 0..new_width {
                    let sx = ((x * x_ratio) >> 16).min(w - 1);
                    out.push(colors[(sy * w + sx) as usize]);
                }
            }
            *colors = out;
            (new_width, new_height)
        });
    }

    /// Grows or shrinks the canvas. The old content is placed at
    /// `(offset_x, offset_y)` in the new canvas; exposed pixels are `fill`.
    pub fn resize_canvas(
        &mut self,
        new_width: i32,
        new_height: i32,
        offset_x: i32,
        offset_y: i32,
        fill: Color,
    ) {
        if new_width <= 0 || new_height <= 0 {
            log::warn!("canvas resize to {new_width}x{new_height} skipped");
            return;
        }
        self.with_colors(|colors, w, h| {
            let mut out = vec![fill; (new_width * new_height) as usize];
            for y in 0..h {
                let dy = y + offset_y;
                if dy < 0 || dy >= new_height {
                    continue;
                }
                for x in 0..w {
                    let dx = x + offset_x;
                    if dx < 0 || dx >= new_width {
                        continue;
                    }
                    out[(dy * new_width + dx) as usize] = colors[(y * w + x) as usize];
                }
            }
            *colors = out;
            (new_width, new_height)
        });
    }

    // =========================================================================
    // Alpha
    // =========================================================================

    /// Replaces the alpha channel from `mask`'s grayscale. Dimensions must
    /// match. A grayscale image is promoted to gray-alpha.
    pub fn alpha_mask(&mut self, mask: &Image) {
        if mask.width != self.width || mask.height != self.height {
            log::warn!("alpha mask dimensions do not match the image, skipped");
            return;
        }
        let mask_colors = mask.to_colors();
        if self.format == PixelFormat::Grayscale {
            self.convert_format(PixelFormat::GrayAlpha);
        }
        self.with_colors(|colors, _, _| {
            for (c, m) in colors.iter_mut().zip(mask_colors.iter()) {
                c.a = m.r;
            }
            (mask.width, mask.height)
        });
    }

    /// Replaces pixels whose alpha is `<= threshold` by `color`.
    pub fn alpha_clear(&mut self, color: Color, threshold: u8) {
        self.with_colors(|colors, w, h| {
            for c in colors.iter_mut() {
                if c.a <= threshold {
                    *c = color;
                }
            }
            (w, h)
        });
    }

    /// Premultiplies RGB by alpha.
    pub fn alpha_premultiply(&mut self) {
        self.with_colors(|colors, w, h| {
            for c in colors.iter_mut() {
                let a = c.a as u32;
                c.r = ((c.r as u32 * a) / 255) as u8;
                c.g = ((c.g as u32 * a) / 255) as u8;
                c.b = ((c.b as u32 * a) / 255) as u8;
            }
            (w, h)
        });
    }

    /// Crops to the bounding rectangle of pixels with alpha above
    /// `threshold` in `[0,1]`.
    pub fn alpha_crop(&mut self, threshold: f32) {
        let cutoff = (threshold.clamp(0.0, 1.0) * 255.0) as u8;
        let colors = self.to_colors();
        let (mut min_x, mut min_y) = (self.width, self.height);
        let (mut max_x, mut max_y) = (-1, -1);
        for y in 0..self.height {
            for x in 0..self.width {
                if colors[(y * self.width + x) as usize].a > cutoff {
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }
        if max_x < 0 {
            log::warn!("no pixel above the alpha threshold, crop skipped");
            return;
        }
        self.crop(Rect::new(
            min_x as f32,
            min_y as f32,
            (max_x - min_x + 1) as f32,
            (max_y - min_y + 1) as f32,
        ));
    }

    // =========================================================================
    // Mipmaps
    // =========================================================================

    /// Appends mip levels halving down to 1×1, each produced by the bicubic
    /// resizer from a copy of the base level.
    pub fn gen_mipmaps(&mut self) {
        if self.format.is_compressed() {
            log::warn!("cannot generate mipmaps for a compressed image");
            return;
        }
        let mut levels = 1;
        let (mut w, mut h) = (self.width, self.height);
        while w > 1 || h > 1 {
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            levels += 1;
        }
        if levels == self.mipmaps {
            return;
        }

        let base = self.to_colors();
        let mut data = std::mem::take(&mut self.data);
        data.truncate(self.base_level_size());
        let (mut w, mut h) = (self.width, self.height);
        for _ in 1..levels {
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            let level = resample_bicubic(&base, self.width, self.height, w, h);
            data.extend_from_slice(&colors_to_pixels(&level, self.format));
        }
        self.data = data;
        self.mipmaps = levels;
    }

    // =========================================================================
    // Dithering
    // =========================================================================

    /// Floyd–Steinberg dithering down to a 16-bpp-or-smaller packed format.
    /// The target channel widths must sum to 16 bits at most and match one
    /// of the packed formats (5/6/5/0, 5/5/5/1 or 4/4/4/4). Requires an
    /// RGBA8 source.
    pub fn dither(&mut self, r_bits: u32, g_bits: u32, b_bits: u32, a_bits: u32) {
        if self.format != PixelFormat::R8G8B8A8 {
            log::warn!("dithering requires an RGBA8 image, got {:?}", self.format);
            return;
        }
        if r_bits + g_bits + b_bits + a_bits > 16 {
            log::warn!("dither target exceeds 16 bits per pixel, skipped");
            return;
        }
        let target = match (r_bits, g_bits, b_bits, a_bits) {
            (5, 6, 5, 0) => PixelFormat::R5G6B5,
            (5, 5, 5, 1) => PixelFormat::R5G5B5A1,
            (4, 4, 4, 4) => PixelFormat::R4G4B4A4,
            _ => {
                log::warn!(
                    "no packed format for {r_bits}/{g_bits}/{b_bits}/{a_bits} bit dithering"
                );
                return;
            }
        };

        let w = self.width as usize;
        let h = self.height as usize;
        // Error accumulation needs signed headroom, so work on i32 copies.
        let mut channels: Vec<[i32; 4]> = self
            .to_colors()
            .into_iter()
            .map(|c| [c.r as i32, c.g as i32, c.b as i32, c.a as i32])
            .collect();

        let bits = [r_bits, g_bits, b_bits, a_bits];
        let mut out = Vec::with_capacity(channels.len());
        for y in 0..h {
            for x in 0..w {
                let idx = y * w + x;
                let mut quantized = [0u8; 4];
                for ch in 0..4 {
                    if bits[ch] == 0 {
                        continue;
                    }
                    let old = channels[idx][ch].clamp(0, 255);
                    let max = (1i32 << bits[ch]) - 1;
                    let new = ((old * max + 127) / 255) * 255 / max;
                    quantized[ch] = new as u8;
                    let err = old - new;
                    // Diffuse to the four forward neighbors: 7/16 right,
                    // 3/16 down-left, 5/16 down, 1/16 down-right.
                    if x + 1 < w {
                        channels[idx + 1][ch] += err * 7 / 16;
                    }
                    if y + 1 < h {
                        if x > 0 {
                            channels[idx + w - 1][ch] += err * 3 / 16;
                        }
                        channels[idx + w][ch] += err * 5 / 16;
                        if x + 1 < w {
                            channels[idx + w + 1][ch] += err / 16;
                        }
                    }
                }
                out.push(Color::new(
                    quantized[0],
                    quantized[1],
                    quantized[2],
                    if bits[3] == 0 { 255 } else { quantized[3] },
                ));
            }
        }
        self.data = colors_to_pixels(&out, target);
        self.format = target;
        self.mipmaps = 1;
    }

    // =========================================================================
    // Palette
    // =========================================================================

    /// Collects up to `max` distinct non-transparent colors by linear scan.
    pub fn extract_palette(&self, max: usize) -> Vec<Color> {
        let mut palette: Vec<Color> = Vec::new();
        for c in self.to_colors() {
            if c.a == 0 {
                continue;
            }
            if !palette.contains(&c) {
                if palette.len() >= max {
                    log::warn!("image has more than {max} distinct colors");
                    break;
                }
                palette.push(c);
            }
        }
        palette
    }

    // =========================================================================
    // Blitting
    // =========================================================================

    /// Copies `src[src_rect]` into `self[dst_rect]`, scaling when the
    /// rectangles differ in size and clipping both against their images.
    /// The source is tinted, then blended with the over operator.
    pub fn draw(&mut self, src: &Image, src_rect: Rect, dst_rect: Rect, tint: Color) {
        if self.format.is_compressed() || src.format.is_compressed() {
            log::warn!("cannot blit compressed images");
            return;
        }

        // Clip the source rectangle.
        let src_bounds = Rect::new(0.0, 0.0, src.width as f32, src.height as f32);
        let src_rect = src_bounds.intersection(&src_rect);
        if src_rect.width < 1.0 || src_rect.height < 1.0 {
            log::warn!("source rectangle does not intersect the source image, blit skipped");
            return;
        }

        let mut piece = src.sub_image(src_rect);
        let (dw, dh) = (dst_rect.width as i32, dst_rect.height as i32);
        if dw != piece.width || dh != piece.height {
            piece.resize(dw, dh);
        }

        // Clip the destination rectangle, dropping the out-of-bounds part of
        // the (possibly scaled) source piece.
        let dst_bounds = Rect::new(0.0, 0.0, self.width as f32, self.height as f32);
        let clipped = dst_bounds.intersection(&dst_rect);
        if clipped.width < 1.0 || clipped.height < 1.0 {
            log::warn!("destination rectangle does not intersect the image, blit skipped");
            return;
        }
        if clipped != dst_rect {
            piece.crop(Rect::new(
                clipped.x - dst_rect.x,
                clipped.y - dst_rect.y,
                clipped.width,
                clipped.height,
            ));
        }

        let piece_colors = piece.to_colors();
        let (ox, oy) = (clipped.x as i32, clipped.y as i32);
        let (pw, ph) = (piece.width, piece.height);
        self.with_colors(|colors, w, h| {
            for y in 0..ph {
                for x in 0..pw {
                    let dst_idx = ((oy + y) * w + ox + x) as usize;
                    let src_px = piece_colors[(y * pw + x) as usize];
                    colors[dst_idx] = colors[dst_idx].alpha_blend(src_px, tint);
                }
            }
            (w, h)
        });
    }

    // =========================================================================
    // Color transforms
    // =========================================================================

    /// Multiplies every pixel by `tint`.
    pub fn tint(&mut self, tint: Color) {
        let t = tint.normalize();
        self.with_colors(|colors, w, h| {
            for c in colors.iter_mut() {
                let p = c.normalize();
                *c = Color::from_normalized(Vector4::new(
                    p.x * t.x,
                    p.y * t.y,
                    p.z * t.z,
                    p.w * t.w,
                ));
            }
            (w, h)
        });
    }

    /// Inverts RGB, leaving alpha.
    pub fn invert(&mut self) {
        self.with_colors(|colors, w, h| {
            for c in colors.iter_mut() {
                c.r = 255 - c.r;
                c.g = 255 - c.g;
                c.b = 255 - c.b;
            }
            (w, h)
        });
    }

    /// Converts to grayscale pixel values (format becomes single-channel).
    pub fn grayscale(&mut self) {
        self.convert_format(PixelFormat::Grayscale);
    }

    /// Adjusts contrast; `contrast` in `[-100, 100]`.
    pub fn contrast(&mut self, contrast: f32) {
        let contrast = contrast.clamp(-100.0, 100.0);
        let factor = (259.0 * (contrast + 255.0)) / (255.0 * (259.0 - contrast));
        self.with_colors(|colors, w, h| {
            for c in colors.iter_mut() {
                let apply = |v: u8| ((factor * (v as f32 - 128.0)) + 128.0).clamp(0.0, 255.0) as u8;
                c.r = apply(c.r);
                c.g = apply(c.g);
                c.b = apply(c.b);
            }
            (w, h)
        });
    }

    /// Adjusts brightness; `brightness` in `[-255, 255]`.
    pub fn brightness(&mut self, brightness: i32) {
        let brightness = brightness.clamp(-255, 255);
        self.with_colors(|colors, w, h| {
            for c in colors.iter_mut() {
                c.r = (c.r as i32 + brightness).clamp(0, 255) as u8;
                c.g = (c.g as i32 + brightness).clamp(0, 255) as u8;
                c.b = (c.b as i32 + brightness).clamp(0, 255) as u8;
            }
            (w, h)
        });
    }

    /// Replaces exact occurrences of `old` by `new`.
    pub fn replace_color(&mut self, old: Color, new: Color) {
        self.with_colors(|colors, w, h| {
            for c in colors.iter_mut() {
                if *c == old {
                    *c = new;
                }
            }
            (w, h)
        });
    }

    // =========================================================================
    // Flips and rotations
    // =========================================================================

    pub fn flip_horizontal(&mut self) {
        self.with_colors(|colors, w, h| {
            for y in 0..h {
                let row = &mut colors[(y * w) as usize..((y + 1) * w) as usize];
                row.reverse();
            }
            (w, h)
        });
    }

    pub fn flip_vertical(&mut self) {
        self.with_colors(|colors, w, h| {
            let mut out = Vec::with_capacity(colors.len());
            for y in (0..h).rev() {
                out.extend_from_slice(&colors[(y * w) as usize..((y + 1) * w) as usize]);
            }
            *colors = out;
            (w, h)
        });
    }

    /// Rotates 90° clockwise (width and height swap).
    pub fn rotate_cw(&mut self) {
        self.with_colors(|colors, w, h| {
            let mut out = Vec::with_capacity(colors.len());
            for x in 0..w {
                for y in (0..h).rev() {
                    out.push(colors[(y * w + x) as usize]);
                }
            }
            *colors = out;
            (h, w)
        });
    }

    /// Rotates 90° counter-clockwise (width and height swap).
    pub fn rotate_ccw(&mut self) {
        self.with_colors(|colors, w, h| {
            let mut out = Vec::with_capacity(colors.len());
            for x in (0..w).rev() {
                for y in 0..h {
                    out.push(colors[(y * w + x) as usize]);
                }
            }
            *colors = out;
            (h, w)
        });
    }
}

// =============================================================================
// Bicubic resampling
// =============================================================================

/// Catmull-Rom kernel weight for distance `t`.
fn catmull_rom(t: f32) -> f32 {
    let t = t.abs();
    if t < 1.0 {
        1.5 * t * t * t - 2.5 * t * t + 1.0
    } else if t < 2.0 {
        -0.5 * t * t * t + 2.5 * t * t - 4.0 * t + 2.0
    } else {
        0.0
    }
}

/// Bicubic resample of a pivot buffer, sampling with edge clamp.
fn resample_bicubic(src: &[Color], w: i32, h: i32, new_w: i32, new_h: i32) -> Vec<Color> {
    let mut out = Vec::with_capacity((new_w * new_h) as usize);
    let x_scale = w as f32 / new_w as f32;
    let y_scale = h as f32 / new_h as f32;

    let sample = |x: i32, y: i32| -> Color {
        let x = x.clamp(0, w - 1);
        let y = y.clamp(0, h - 1);
        src[(y * w + x) as usize]
    };

    for dy in 0..new_h {
        let sy = (dy as f32 + 0.5) * y_scale - 0.5;
        let iy = sy.floor() as i32;
        let fy = sy - iy as f32;
        for dx in 0..new_w {
            let sx = (dx as f32 + 0.5) * x_scale - 0.5;
            let ix = sx.floor() as i32;
            let fx = sx - ix as f32;

            let mut acc = [0.0f32; 4];
            let mut weight_sum = 0.0;
            for m in -1..=2 {
                let wy = catmull_rom(m as f32 - fy);
                if wy == 0.0 {
                    continue;
                }
                for n in -1..=2 {
                    let wx = catmull_rom(n as f32 - fx);
                    if wx == 0.0 {
                        continue;
                    }
                    let weight = wx * wy;
                    let c = sample(ix + n, iy + m);
                    acc[0] += c.r as f32 * weight;
                    acc[1] += c.g as f32 * weight;
                    acc[2] += c.b as f32 * weight;
                    acc[3] += c.a as f32 * weight;
                    weight_sum += weight;
                }
            }
            let norm = if weight_sum != 0.0 { 1.0 / weight_sum } else { 0.0 };
            out.push(Color::new(
                (acc[0] * norm).clamp(0.0, 255.0).round() as u8,
                (acc[1] * norm).clamp(0.0, 255.0).round() as u8,
                (acc[2] * norm).clamp(0.0, 255.0).round() as u8,
                (acc[3] * norm).clamp(0.0, 255.0).round() as u8,
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker2x2() -> Image {
        Image::from_colors(
            &[Color::RED, Color::GREEN, Color::BLUE, Color::WHITE],
            2,
            2,
        )
    }

    #[test]
    fn test_from_raw_validates_length() {
        assert!(Image::from_raw(vec![0; 16], 2, 2, PixelFormat::R8G8B8A8, 1).is_ok());
        assert!(Image::from_raw(vec![0; 15], 2, 2, PixelFormat::R8G8B8A8, 1).is_err());
    }

    #[test]
    fn test_copy_is_byte_identical() {
        let img = checker2x2();
        let copy = img.clone();
        assert_eq!(copy, img);
    }

    #[test]
    fn test_convert_format_round_trip_within_quantization() {
        let mut img = Image::from_colors(
            &[
                Color::new(255, 0, 0, 255),
                Color::new(0, 255, 0, 255),
                Color::new(0, 0, 255, 255),
                Color::new(255, 255, 255, 255),
            ],
            2,
            2,
        );
        img.convert_format(PixelFormat::R5G6B5);
        img.convert_format(PixelFormat::R8G8B8A8);
        let expected = [
            Color::new(255, 0, 0, 255),
            Color::new(0, 255, 0, 255),
            Color::new(0, 0, 255, 255),
            Color::new(255, 255, 255, 255),
        ];
        for (c, e) in img.to_colors().iter().zip(expected.iter()) {
            assert!((c.r as i32 - e.r as i32).abs() <= 8);
            assert!((c.g as i32 - e.g as i32).abs() <= 4);
            assert!((c.b as i32 - e.b as i32).abs() <= 8);
        }
    }

    #[test]
    fn test_convert_to_same_format_is_noop() {
        let img = checker2x2();
        let mut other = img.clone();
        other.convert_format(PixelFormat::R8G8B8A8);
        assert_eq!(other, img);
    }

    #[test]
    fn test_crop_full_rect_is_identity() {
        let img = checker2x2();
        let mut other = img.clone();
        other.crop(Rect::new(0.0, 0.0, 2.0, 2.0));
        assert_eq!(other, img);
    }

    #[test]
    fn test_crop_out_of_bounds_is_noop() {
        let img = checker2x2();
        let mut other = img.clone();
        other.crop(Rect::new(10.0, 10.0, 4.0, 4.0));
        assert_eq!(other, img);
    }

    #[test]
    fn test_crop_clamps_to_bounds() {
        let mut img = checker2x2();
        img.crop(Rect::new(1.0, 0.0, 100.0, 100.0));
        assert_eq!(img.width(), 1);
        assert_eq!(img.height(), 2);
        assert_eq!(img.to_colors(), vec![Color::GREEN, Color::WHITE]);
    }

    #[test]
    fn test_flip_horizontal_twice_is_identity() {
        let img = checker2x2();
        let mut other = img.clone();
        other.flip_horizontal();
        assert_eq!(other.to_colors()[0], Color::GREEN);
        other.flip_horizontal();
        assert_eq!(other, img);
    }

    #[test]
    fn test_flip_vertical_twice_is_identity() {
        let img = checker2x2();
        let mut other = img.clone();
        other.flip_vertical();
        assert_eq!(other.to_colors()[0], Color::BLUE);
        other.flip_vertical();
        assert_eq!(other, img);
    }

    #[test]
    fn test_rotate_cw_then_ccw_is_identity() {
        let img = checker2x2();
        let mut other = img.clone();
        other.rotate_cw();
        // CW: top row becomes right column.
        assert_eq!(other.to_colors(), vec![Color::BLUE, Color::RED, Color::WHITE, Color::GREEN]);
        other.rotate_ccw();
        assert_eq!(other, img);
    }

    #[test]
    fn test_resize_to_same_size_is_noop() {
        let img = checker2x2();
        let mut other = img.clone();
        other.resize(2, 2);
        assert_eq!(other, img);
    }

    #[test]
    fn test_resize_nn_upscale() {
        let mut img = checker2x2();
        img.resize_nn(4, 4);
        assert_eq!(img.width(), 4);
        assert_eq!(img.height(), 4);
        let colors = img.to_colors();
        assert_eq!(colors[0], Color::RED);
        assert_eq!(colors[3], Color::GREEN);
        assert_eq!(colors[15], Color::WHITE);
    }

    #[test]
    fn test_resize_to_zero_is_noop() {
        let img = checker2x2();
        let mut other = img.clone();
        other.resize(0, 4);
        assert_eq!(other, img);
    }

    #[test]
    fn test_resize_canvas_grow_with_offset() {
        let mut img = checker2x2();
        img.resize_canvas(4, 4, 1, 1, Color::BLACK);
        assert_eq!(img.width(), 4);
        let colors = img.to_colors();
        assert_eq!(colors[0], Color::BLACK);
        assert_eq!(colors[(1 * 4 + 1) as usize], Color::RED);
        assert_eq!(colors[(2 * 4 + 2) as usize], Color::WHITE);
    }

    #[test]
    fn test_resize_canvas_shrink() {
        let mut img = checker2x2();
        img.resize_canvas(1, 1, 0, 0, Color::BLACK);
        assert_eq!(img.to_colors(), vec![Color::RED]);
    }

    #[test]
    fn test_to_pot_pads_with_fill() {
        let mut img = Image::from_colors(&vec![Color::RED; 6], 3, 2);
        img.to_pot(Color::BLANK);
        assert_eq!(img.width(), 4);
        assert_eq!(img.height(), 2);
        let colors = img.to_colors();
        assert_eq!(colors[3], Color::BLANK);
        assert_eq!(colors[0], Color::RED);
    }

    #[test]
    fn test_alpha_mask_sets_alpha_from_gray() {
        let mut img = checker2x2();
        let mask = Image::from_colors(
            &[
                Color::rgb(0, 0, 0),
                Color::rgb(85, 85, 85),
                Color::rgb(170, 170, 170),
                Color::rgb(255, 255, 255),
            ],
            2,
            2,
        );
        img.alpha_mask(&mask);
        let alphas: Vec<u8> = img.to_colors().iter().map(|c| c.a).collect();
        assert_eq!(alphas, vec![0, 85, 170, 255]);
    }

    #[test]
    fn test_alpha_mask_dimension_mismatch_is_noop() {
        let img = checker2x2();
        let mut other = img.clone();
        let mask = Image::from_colors(&[Color::WHITE], 1, 1);
        other.alpha_mask(&mask);
        assert_eq!(other, img);
    }

    #[test]
    fn test_alpha_clear_replaces_transparent() {
        let mut img = Image::from_colors(
            &[Color::new(9, 9, 9, 10), Color::new(9, 9, 9, 200)],
            2,
            1,
        );
        img.alpha_clear(Color::MAGENTA, 128);
        let colors = img.to_colors();
        assert_eq!(colors[0], Color::MAGENTA);
        assert_eq!(colors[1], Color::new(9, 9, 9, 200));
    }

    #[test]
    fn test_alpha_premultiply() {
        let mut img = Image::from_colors(&[Color::new(255, 128, 0, 128)], 1, 1);
        img.alpha_premultiply();
        let c = img.to_colors()[0];
        assert_eq!(c.r, 128);
        assert_eq!(c.g, 64);
        assert_eq!(c.b, 0);
        assert_eq!(c.a, 128);
    }

    #[test]
    fn test_alpha_crop_finds_bounding_box() {
        let mut colors = vec![Color::BLANK; 16];
        colors[5] = Color::RED; // (1,1)
        colors[10] = Color::GREEN; // (2,2)
        let mut img = Image::from_colors(&colors, 4, 4);
        img.alpha_crop(0.5);
        assert_eq!(img.width(), 2);
        assert_eq!(img.height(), 2);
        assert_eq!(img.to_colors()[0], Color::RED);
    }

    #[test]
    fn test_gen_mipmaps_sizes() {
        let mut img = Image::from_colors(&vec![Color::RED; 16], 4, 4);
        img.gen_mipmaps();
        assert_eq!(img.mipmaps(), 3);
        assert_eq!(
            img.data().len(),
            PixelFormat::R8G8B8A8.buffer_size_with_mipmaps(4, 4, 3)
        );
    }

    #[test]
    fn test_mipmap_coverage_matches_data_length() {
        let mut img = Image::from_colors(&vec![Color::LIME; 8 * 4], 8, 4);
        img.gen_mipmaps();
        // 8x4, 4x2, 2x1, 1x1
        assert_eq!(img.mipmaps(), 4);
        assert_eq!(
            img.data().len(),
            img.format().buffer_size_with_mipmaps(8, 4, 4)
        );
    }

    #[test]
    fn test_dither_to_r5g6b5() {
        let mut img = Image::from_colors(&vec![Color::new(100, 150, 200, 255); 16], 4, 4);
        img.dither(5, 6, 5, 0);
        assert_eq!(img.format(), PixelFormat::R5G6B5);
        assert_eq!(img.data().len(), 32);
    }

    #[test]
    fn test_dither_rejects_wide_target() {
        let mut img = checker2x2();
        img.dither(8, 8, 8, 8);
        assert_eq!(img.format(), PixelFormat::R8G8B8A8);
    }

    #[test]
    fn test_extract_palette() {
        let img = Image::from_colors(
            &[Color::RED, Color::RED, Color::BLUE, Color::BLANK],
            2,
            2,
        );
        let palette = img.extract_palette(8);
        assert_eq!(palette, vec![Color::RED, Color::BLUE]);
        let capped = img.extract_palette(1);
        assert_eq!(capped, vec![Color::RED]);
    }

    #[test]
    fn test_draw_blits_with_tint() {
        let mut dst = Image::from_colors(&vec![Color::BLACK; 16], 4, 4);
        let src = Image::from_colors(&vec![Color::WHITE; 4], 2, 2);
        dst.draw(
            &src,
            Rect::new(0.0, 0.0, 2.0, 2.0),
            Rect::new(1.0, 1.0, 2.0, 2.0),
            Color::RED,
        );
        let colors = dst.to_colors();
        assert_eq!(colors[0], Color::BLACK);
        assert_eq!(colors[5], Color::RED);
        assert_eq!(colors[10], Color::RED);
    }

    #[test]
    fn test_draw_scales_source() {
        let mut dst = Image::from_colors(&vec![Color::BLACK; 16], 4, 4);
        let src = Image::from_colors(&[Color::WHITE], 1, 1);
        dst.draw(
            &src,
            Rect::new(0.0, 0.0, 1.0, 1.0),
            Rect::new(0.0, 0.0, 4.0, 4.0),
            Color::WHITE,
        );
        assert!(dst.to_colors().iter().all(|&c| c == Color::WHITE));
    }

    #[test]
    fn test_tint_multiplies() {
        let mut img = Image::from_colors(&[Color::WHITE], 1, 1);
        img.tint(Color::new(128, 64, 255, 255));
        let c = img.to_colors()[0];
        assert_eq!((c.r, c.g, c.b), (128, 64, 255));
    }

    #[test]
    fn test_invert() {
        let mut img = Image::from_colors(&[Color::new(10, 20, 30, 40)], 1, 1);
        img.invert();
        assert_eq!(img.to_colors()[0], Color::new(245, 235, 225, 40));
    }

    #[test]
    fn test_grayscale_changes_format() {
        let mut img = checker2x2();
        img.grayscale();
        assert_eq!(img.format(), PixelFormat::Grayscale);
        assert_eq!(img.data().len(), 4);
    }

    #[test]
    fn test_brightness_clamps() {
        let mut img = Image::from_colors(&[Color::new(250, 5, 128, 255)], 1, 1);
        img.brightness(10);
        assert_eq!(img.to_colors()[0], Color::new(255, 15, 138, 255));
        img.brightness(-300); // clamped to -255
        assert_eq!(img.to_colors()[0], Color::new(0, 0, 0, 255));
    }

    #[test]
    fn test_contrast_extremes() {
        let mut img = Image::from_colors(&[Color::new(100, 150, 128, 255)], 1, 1);
        img.contrast(100.0);
        let c = img.to_colors()[0];
        assert!(c.r < 100);
        assert!(c.g > 150);
    }

    #[test]
    fn test_replace_color() {
        let mut img = Image::from_colors(&[Color::RED, Color::BLUE], 2, 1);
        img.replace_color(Color::RED, Color::GREEN);
        assert_eq!(img.to_colors(), vec![Color::GREEN, Color::BLUE]);
    }

    #[test]
    fn test_pixel_at() {
        let img = checker2x2();
        assert_eq!(img.pixel_at(0, 0), Color::RED);
        assert_eq!(img.pixel_at(1, 1), Color::WHITE);
        assert_eq!(img.pixel_at(5, 0), Color::BLANK);
        assert_eq!(img.pixel_at(-1, 0), Color::BLANK);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Image::decode(&[0, 1, 2, 3]).is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_double_flip_is_identity(
            w in 1i32..8,
            h in 1i32..8,
            bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 256),
        ) {
            let colors: Vec<Color> = (0..(w * h) as usize)
                .map(|i| {
                    let at = i * 4 % bytes.len();
                    Color::new(
                        bytes[at],
                        bytes[(at + 1) % bytes.len()],
                        bytes[(at + 2) % bytes.len()],
                        bytes[(at + 3) % bytes.len()],
                    )
                })
                .collect();
            let img = Image::from_colors(&colors, w, h);

            let mut flipped = img.clone();
            flipped.flip_horizontal();
            flipped.flip_horizontal();
            proptest::prop_assert_eq!(&flipped, &img);

            flipped.flip_vertical();
            flipped.flip_vertical();
            proptest::prop_assert_eq!(&flipped, &img);

            let mut rotated = img.clone();
            rotated.rotate_cw();
            rotated.rotate_ccw();
            proptest::prop_assert_eq!(&rotated, &img);
        }
    }
}
