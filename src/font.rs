//! Font loading and atlas generation.
//!
//! TTF rasterization goes through `fontdue`. Atlas building is split in
//! two halves so the CPU work can run off the GL thread:
//!
//! 1. [`rasterize_font_atlas`]: rasterize the requested codepoints, pack
//!    them into a square power-of-two gray-alpha image (no GL calls);
//! 2. [`RenderContext::load_font_from_atlas`]: upload the atlas and keep
//!    the glyph records (GL thread only).
//!
//! [`RenderContext::load_ttf_font`] runs both halves back to back.

use crate::context::RenderContext;
use crate::error::{RenderError, RenderResult};
use crate::math::{Color, Rect};
use crate::pixels::{Image, PixelFormat};
use crate::texture::Texture;

/// Threshold applied to coverage for [`FontType::Bitmap`].
const BITMAP_ALPHA_THRESHOLD: u8 = 80;
/// Padding around SDF glyphs, in pixels.
const SDF_PADDING: i32 = 4;
/// Coverage value representing the glyph edge in SDF mode.
const SDF_ON_EDGE: f32 = 128.0;
/// SDF intensity change per pixel of distance.
const SDF_PIXEL_DIST_SCALE: f32 = 64.0;
/// Padding around regular glyphs in the atlas.
const GLYPH_PADDING: i32 = 2;

// =============================================================================
// Types
// =============================================================================

/// Per-glyph metadata: codepoint, layout offsets, advance and (optionally)
/// the rasterized source image.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphInfo {
    /// Unicode codepoint.
    pub value: i32,
    /// Horizontal draw offset from the pen position.
    pub offset_x: i32,
    /// Vertical draw offset from the line top.
    pub offset_y: i32,
    /// Pen advance after this glyph.
    pub advance_x: i32,
    /// Rasterized glyph, kept by the CPU half for re-packing.
    pub image: Option<Image>,
}

/// Rasterization mode for TTF loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontType {
    /// Antialiased coverage.
    Default,
    /// Coverage thresholded to two levels.
    Bitmap,
    /// Signed distance field, for sharp scaling in a shader.
    Sdf,
}

/// Rectangle packer used for the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtlasPackMethod {
    /// Greedy left-to-right rows.
    Rows,
    /// Skyline bottom-left.
    Skyline,
}

/// The CPU half of a loaded font: atlas image plus glyph records, ready
/// for upload on the GL thread.
#[derive(Debug, Clone)]
pub struct FontAtlas {
    pub image: Image,
    pub recs: Vec<Rect>,
    pub glyphs: Vec<GlyphInfo>,
    pub base_size: i32,
}

/// A loaded font: one atlas texture plus parallel glyph arrays.
#[derive(Debug, Clone)]
pub struct Font {
    /// Pixel size the glyphs were rasterized at.
    pub base_size: i32,
    pub texture: Texture,
    /// Atlas sub-rectangle per glyph.
    pub recs: Vec<Rect>,
    pub glyphs: Vec<GlyphInfo>,
}

impl Font {
    pub fn empty() -> Font {
        Font {
            base_size: 0,
            texture: Texture::invalid(),
            recs: Vec::new(),
            glyphs: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.texture.id != 0 && !self.glyphs.is_empty()
    }

    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Index of `codepoint`, falling back to `'?'` and then to 0.
    pub fn glyph_index(&self, codepoint: char) -> usize {
        let find = |cp: i32| self.glyphs.iter().position(|g| g.value == cp);
        find(codepoint as i32)
            .or_else(|| find('?' as i32))
            .unwrap_or(0)
    }
}

// =============================================================================
// Rasterization (CPU half)
// =============================================================================

/// Rasterizes `codepoints` (printable ASCII when `None`) at `size` pixels
/// and packs them into a square power-of-two atlas. The atlas is
/// gray-alpha: full white with coverage in alpha, so the draw path
/// modulates it by the text color.
pub fn rasterize_font_atlas(
    ttf_data: &[u8],
    size: i32,
    codepoints: Option<&[char]>,
    font_type: FontType,
    pack_method: AtlasPackMethod,
) -> RenderResult<FontAtlas> {
    if size <= 0 {
        return Err(RenderError::InvalidArgument(format!(
            "font size {size} must be positive"
        )));
    }
    let font = fontdue::Font::from_bytes(ttf_data, fontdue::FontSettings::default())
        .map_err(|e| RenderError::Decode(e.to_string()))?;

    let default_set: Vec<char> = (0x20u32..0x7F).map(|c| char::from_u32(c).unwrap()).collect();
    let codepoints = codepoints.unwrap_or(&default_set);

    let px = size as f32;
    let ascent = font
        .horizontal_line_metrics(px)
        .map(|m| m.ascent)
        .unwrap_or(px);

    let mut glyphs = Vec::with_capacity(codepoints.len());
    for &ch in codepoints {
        let (metrics, mut coverage) = if ch == ' ' {
            // The space carries no image, only an advance.
            (font.metrics(ch, px), Vec::new())
        } else {
            font.rasterize(ch, px)
        };

        let image = if coverage.is_empty() {
            None
        } else {
            match font_type {
                FontType::Default => {}
                FontType::Bitmap => {
                    for v in coverage.iter_mut() {
                        *v = if *v > BITMAP_ALPHA_THRESHOLD { 255 } else { 0 };
                    }
                }
                FontType::Sdf => {
                    let (w, h) = (metrics.width as i32, metrics.height as i32);
                    coverage = distance_field(&coverage, w, h);
                }
            }
            let (w, h) = match font_type {
                FontType::Sdf => (
                    metrics.width as i32 + 2 * SDF_PADDING,
                    metrics.height as i32 + 2 * SDF_PADDING,
                ),
                _ => (metrics.width as i32, metrics.height as i32),
            };
            let image = Image::from_raw(coverage, w, h, PixelFormat::Grayscale, 1)
                .map_err(|e| RenderError::Decode(e.to_string()))?;
            Some(image)
        };

        let offset_y = (ascent - metrics.height as f32 - metrics.ymin as f32).round() as i32;
        glyphs.push(GlyphInfo {
            value: ch as i32,
            offset_x: metrics.xmin,
            offset_y: if image.is_some() { offset_y } else { 0 },
            advance_x: metrics.advance_width.round() as i32,
            image,
        });
    }

    let (image, recs) = pack_atlas(&glyphs, pack_method, font_type);
    Ok(FontAtlas {
        image,
        recs,
        glyphs,
        base_size: size,
    })
}

/// Brute-force signed distance transform of a coverage bitmap, with the
/// standard edge value and per-pixel scale. The result is padded by
/// [`SDF_PADDING`] on every side.
fn distance_field(coverage: &[u8], width: i32, height: i32) -> Vec<u8> {
    let out_w = width + 2 * SDF_PADDING;
    let out_h = height + 2 * SDF_PADDING;
    let inside = |x: i32, y: i32| -> bool {
        if x < 0 || y < 0 || x >= width || y >= height {
            return false;
        }
        coverage[(y * width + x) as usize] > 127
    };

    let mut out = Vec::with_capacity((out_w * out_h) as usize);
    for oy in 0..out_h {
        for ox in 0..out_w {
            let x = ox - SDF_PADDING;
            let y = oy - SDF_PADDING;
            let this_inside = inside(x, y);

            // Distance to the nearest pixel of the opposite class, capped
            // by the padding radius.
            let mut best = (SDF_PADDING as f32) + 1.0;
            let radius = best.ceil() as i32;
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if inside(x + dx, y + dy) != this_inside {
                        let d = ((dx * dx + dy * dy) as f32).sqrt();
                        if d < best {
                            best = d;
                        }
                    }
                }
            }

            let signed = if this_inside { best } else { -best };
            let value = SDF_ON_EDGE + signed * SDF_PIXEL_DIST_SCALE;
            out.push(value.clamp(0.0, 255.0) as u8);
        }
    }
    out
}

// =============================================================================
// Atlas packing
// =============================================================================

/// Packs the glyph images into a square power-of-two gray-alpha atlas and
/// returns it with the per-glyph rectangles.
fn pack_atlas(
    glyphs: &[GlyphInfo],
    method: AtlasPackMethod,
    font_type: FontType,
) -> (Image, Vec<Rect>) {
    let padding = if font_type == FontType::Sdf { 0 } else { GLYPH_PADDING };

    // Start from the area estimate and grow until everything fits.
    let total_area: i64 = glyphs
        .iter()
        .filter_map(|g| g.image.as_ref())
        .map(|img| ((img.width() + padding) as i64) * ((img.height() + padding) as i64))
        .sum();
    let mut side = ((total_area as f64).sqrt().ceil() as u32)
        .max(1)
        .next_power_of_two() as i32;

    loop {
        let placed = match method {
            AtlasPackMethod::Rows => pack_rows(glyphs, side, padding),
            AtlasPackMethod::Skyline => pack_skyline(glyphs, side, padding),
        };
        if let Some(recs) = placed {
            // Composite coverage into the alpha channel of a white image.
            let mut pixels = vec![Color::BLANK; (side * side) as usize];
            for (glyph, rect) in glyphs.iter().zip(recs.iter()) {
                let Some(img) = glyph.image.as_ref() else { continue };
                for y in 0..img.height() {
                    for x in 0..img.width() {
                        let alpha = img.pixel_at(x, y).r;
                        let px = rect.x as i32 + x;
                        let py = rect.y as i32 + y;
                        pixels[(py * side + px) as usize] = Color::new(255, 255, 255, alpha);
                    }
                }
            }
            let mut image = Image::from_colors(&pixels, side, side);
            image.convert_format(PixelFormat::GrayAlpha);
            return (image, recs);
        }
        side *= 2;
    }
}

/// Greedy row packer; `None` when the glyphs do not fit in `side²`.
fn pack_rows(glyphs: &[GlyphInfo], side: i32, padding: i32) -> Option<Vec<Rect>> {
    let mut recs = Vec::with_capacity(glyphs.len());
    let mut x = padding;
    let mut y = padding;
    let mut row_height = 0;

    for glyph in glyphs {
        let Some(img) = glyph.image.as_ref() else {
            recs.push(Rect::new(0.0, 0.0, 0.0, 0.0));
            continue;
        };
        let (w, h) = (img.width(), img.height());
        if x + w + padding > side {
            x = padding;
            y += row_height + padding;
            row_height = 0;
        }
        if y + h + padding > side {
            return None;
        }
        recs.push(Rect::new(x as f32, y as f32, w as f32, h as f32));
        x += w + padding;
        row_height = row_height.max(h);
    }
    Some(recs)
}

/// Skyline bottom-left packer; `None` when the glyphs do not fit.
fn pack_skyline(glyphs: &[GlyphInfo], side: i32, padding: i32) -> Option<Vec<Rect>> {
    // Heights of the skyline per x column.
    let mut skyline = vec![0i32; side as usize];
    let mut recs = vec![Rect::new(0.0, 0.0, 0.0, 0.0); glyphs.len()];

    // Tallest first gives the classic skyline quality.
    let mut order: Vec<usize> = (0..glyphs.len()).collect();
    order.sort_by_key(|&i| {
        std::cmp::Reverse(glyphs[i].image.as_ref().map_or(0, |img| img.height()))
    });

    for index in order {
        let Some(img) = glyphs[index].image.as_ref() else { continue };
        let w = (img.width() + padding) as usize;
        let h = img.height() + padding;
        if w > side as usize {
            return None;
        }

        // Find the x whose maximum skyline height over the span is lowest.
        let mut best_x = 0usize;
        let mut best_y = i32::MAX;
        for x in 0..=(side as usize - w) {
            let top = skyline[x..x + w].iter().copied().max().unwrap_or(0);
            if top < best_y {
                best_y = top;
                best_x = x;
            }
        }
        if best_y + h > side {
            return None;
        }
        for column in skyline[best_x..best_x + w].iter_mut() {
            *column = best_y + h;
        }
        recs[index] = Rect::new(
            best_x as f32,
            best_y as f32,
            img.width() as f32,
            img.height() as f32,
        );
    }
    Some(recs)
}

// =============================================================================
// GPU half
// =============================================================================

impl RenderContext {
    /// Uploads a rasterized atlas (the GL-thread half of font loading).
    pub fn load_font_from_atlas(&mut self, atlas: FontAtlas) -> Font {
        let texture = self.load_texture_from_image(&atlas.image);
        if texture.id == 0 {
            log::warn!("failed to upload the font atlas");
            return Font::empty();
        }
        Font {
            base_size: atlas.base_size,
            texture,
            recs: atlas.recs,
            glyphs: atlas.glyphs,
        }
    }

    /// Rasterizes and uploads a TTF font in one call.
    pub fn load_ttf_font(
        &mut self,
        ttf_data: &[u8],
        size: i32,
        codepoints: Option<&[char]>,
        font_type: FontType,
    ) -> Font {
        match rasterize_font_atlas(ttf_data, size, codepoints, font_type, AtlasPackMethod::Rows) {
            Ok(atlas) => self.load_font_from_atlas(atlas),
            Err(e) => {
                log::warn!("font loading failed: {e}");
                Font::empty()
            }
        }
    }

    /// Releases a font's atlas texture.
    pub fn unload_font(&mut self, font: Font) {
        self.unload_texture(font.texture);
    }

    /// The compiled-in font available from init.
    pub fn default_font(&self) -> &Font {
        &self.default_font
    }

    pub(crate) fn load_default_font(&mut self) {
        let (image, recs, glyphs) = crate::default_font::build_default_font_atlas();
        let texture = self.load_texture_from_image(&image);
        self.default_font = Font {
            base_size: crate::default_font::GLYPH_SIZE,
            texture,
            recs,
            glyphs,
        };
    }

    pub(crate) fn unload_default_font(&mut self) {
        let texture = self.default_font.texture;
        self.unload_texture(texture);
        self.default_font = Font::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;

    fn fake_glyph(value: i32, w: i32, h: i32) -> GlyphInfo {
        GlyphInfo {
            value,
            offset_x: 0,
            offset_y: 0,
            advance_x: w + 1,
            image: Some(Image::from_raw(
                vec![200u8; (w * h) as usize],
                w,
                h,
                PixelFormat::Grayscale,
                1,
            )
            .unwrap()),
        }
    }

    #[test]
    fn test_pack_rows_places_disjoint_rects() {
        let glyphs: Vec<GlyphInfo> = (0..8).map(|i| fake_glyph(65 + i, 6, 9)).collect();
        let recs = pack_rows(&glyphs, 64, 2).unwrap();
        for (i, a) in recs.iter().enumerate() {
            for b in recs.iter().skip(i + 1) {
                let overlap = a.intersection(b);
                assert_eq!(overlap.width * overlap.height, 0.0);
            }
        }
    }

    #[test]
    fn test_pack_rows_overflow_returns_none() {
        let glyphs: Vec<GlyphInfo> = (0..64).map(|i| fake_glyph(i, 10, 10)).collect();
        assert!(pack_rows(&glyphs, 16, 2).is_none());
    }

    #[test]
    fn test_pack_skyline_places_disjoint_rects() {
        let glyphs: Vec<GlyphInfo> = (0..10)
            .map(|i| fake_glyph(65 + i, 4 + (i % 3), 6 + (i % 4)))
            .collect();
        let recs = pack_skyline(&glyphs, 64, 2).unwrap();
        for (i, a) in recs.iter().enumerate() {
            if a.width == 0.0 {
                continue;
            }
            for b in recs.iter().skip(i + 1) {
                let overlap = a.intersection(b);
                assert_eq!(overlap.width * overlap.height, 0.0);
            }
        }
    }

    #[test]
    fn test_pack_atlas_is_square_pot_gray_alpha() {
        let glyphs: Vec<GlyphInfo> = (0..20).map(|i| fake_glyph(65 + i, 7, 11)).collect();
        let (image, recs) = pack_atlas(&glyphs, AtlasPackMethod::Rows, FontType::Default);
        assert_eq!(image.width(), image.height());
        assert_eq!(image.width() & (image.width() - 1), 0);
        assert_eq!(image.format(), PixelFormat::GrayAlpha);
        assert_eq!(recs.len(), glyphs.len());
    }

    #[test]
    fn test_distance_field_edge_value() {
        // A solid 4x4 block: the center is well inside, the padding ring
        // well outside.
        let coverage = vec![255u8; 16];
        let sdf = distance_field(&coverage, 4, 4);
        let w = 4 + 2 * SDF_PADDING;
        let center = sdf[((SDF_PADDING + 2) * w + SDF_PADDING + 2) as usize];
        let corner = sdf[0];
        assert!(center > 128);
        assert!(corner < 128);
    }

    #[test]
    fn test_rasterize_rejects_invalid_data() {
        let result = rasterize_font_atlas(
            &[1, 2, 3, 4],
            16,
            None,
            FontType::Default,
            AtlasPackMethod::Rows,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rasterize_rejects_zero_size() {
        let result =
            rasterize_font_atlas(&[], 0, None, FontType::Default, AtlasPackMethod::Rows);
        assert!(result.is_err());
    }

    #[test]
    fn test_default_font_loaded_at_init() {
        let (ctx, _) = test_context();
        let font = ctx.default_font();
        assert!(font.is_valid());
        assert_eq!(font.base_size, 8);
        assert_eq!(font.glyph_count(), 96);
    }

    #[test]
    fn test_glyph_index_fallback() {
        let (ctx, _) = test_context();
        let font = ctx.default_font();
        assert_eq!(font.glyphs[font.glyph_index('A')].value, 'A' as i32);
        // Unknown codepoints fall back to '?'.
        assert_eq!(font.glyphs[font.glyph_index('\u{1F600}')].value, '?' as i32);
    }
}
