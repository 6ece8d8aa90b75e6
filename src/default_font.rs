//! Embedded default font.
//!
//! A public-domain 8×8 bitmap set covering printable ASCII (0x20–0x7F).
//! Each glyph is eight row bytes, least-significant bit leftmost. The
//! bitmap is unpacked at context init into a gray-alpha atlas (white
//! pixels, coverage in alpha) so text color modulates cleanly, with a
//! per-glyph advance derived from the occupied columns.

use crate::font::GlyphInfo;
use crate::math::{Color, Rect};
use crate::pixels::{Image, PixelFormat};

pub(crate) const FIRST_CODEPOINT: u32 = 0x20;
pub(crate) const GLYPH_COUNT: usize = 96;
pub(crate) const GLYPH_SIZE: i32 = 8;
/// One pixel of spacing between atlas cells.
const CELL_PADDING: i32 = 1;

#[rustfmt::skip]
const GLYPH_ROWS: [[u8; 8]; GLYPH_COUNT] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // ' '
    [0x18, 0x3C, 0x3C, 0x18, 0x18, 0x00, 0x18, 0x00], // '!'
    [0x36, 0x36, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // '"'
    [0x36, 0x36, 0x7F, 0x36, 0x7F, 0x36, 0x36, 0x00], // '#'
    [0x0C, 0x3E, 0x03, 0x1E, 0x30, 0x1F, 0x0C, 0x00], // '$'
    [0x00, 0x63, 0x33, 0x18, 0x0C, 0x66, 0x63, 0x00], // '%'
    [0x1C, 0x36, 0x1C, 0x6E, 0x3B, 0x33, 0x6E, 0x00], // '&'
    [0x06, 0x06, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00], // '\''
    [0x18, 0x0C, 0x06, 0x06, 0x06, 0x0C, 0x18, 0x00], // '('
    [0x06, 0x0C, 0x18, 0x18, 0x18, 0x0C, 0x06, 0x00], // ')'
    [0x00, 0x66, 0x3C, 0xFF, 0x3C, 0x66, 0x00, 0x00], // '*'
    [0x00, 0x0C, 0x0C, 0x3F, 0x0C, 0x0C, 0x00, 0x00], // '+'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C, 0x06], // ','
    [0x00, 0x00, 0x00, 0x3F, 0x00, 0x00, 0x00, 0x00], // '-'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C, 0x00], // '.'
    [0x60, 0x30, 0x18, 0x0C, 0x06, 0x03, 0x01, 0x00], // '/'
    [0x3E, 0x63, 0x73, 0x7B, 0x6F, 0x67, 0x3E, 0x00], // '0'
    [0x0C, 0x0E, 0x0C, 0x0C, 0x0C, 0x0C, 0x3F, 0x00], // '1'
    [0x1E, 0x33, 0x30, 0x1C, 0x06, 0x33, 0x3F, 0x00], // '2'
    [0x1E, 0x33, 0x30, 0x1C, 0x30, 0x33, 0x1E, 0x00], // '3'
    [0x38, 0x3C, 0x36, 0x33, 0x7F, 0x30, 0x78, 0x00], // '4'
    [0x3F, 0x03, 0x1F, 0x30, 0x30, 0x33, 0x1E, 0x00], // '5'
    [0x1C, 0x06, 0x03, 0x1F, 0x33, 0x33, 0x1E, 0x00], // '6'
    [0x3F, 0x33, 0x30, 0x18, 0x0C, 0x0C, 0x0C, 0x00], // '7'
    [0x1E, 0x33, 0x33, 0x1E, 0x33, 0x33, 0x1E, 0x00], // '8'
    [0x1E, 0x33, 0x33, 0x3E, 0x30, 0x18, 0x0E, 0x00], // '9'
    [0x00, 0x0C, 0x0C, 0x00, 0x00, 0x0C, 0x0C, 0x00], // ':'
    [0x00, 0x0C, 0x0C, 0x00, 0x00, 0x0C, 0x0C, 0x06], // ';'
    [0x18, 0x0C, 0x06, 0x03, 0x06, 0x0C, 0x18, 0x00], // '<'
    [0x00, 0x00, 0x3F, 0x00, 0x00, 0x3F, 0x00, 0x00], // '='
    [0x06, 0x0C, 0x18, 0x30, 0x18, 0x0C, 0x06, 0x00], // '>'
    [0x1E, 0x33, 0x30, 0x18, 0x0C, 0x00, 0x0C, 0x00], // '?'
    [0x3E, 0x63, 0x7B, 0x7B, 0x7B, 0x03, 0x1E, 0x00], // '@'
    [0x0C, 0x1E, 0x33, 0x33, 0x3F, 0x33, 0x33, 0x00], // 'A'
    [0x3F, 0x66, 0x66, 0x3E, 0x66, 0x66, 0x3F, 0x00], // 'B'
    [0x3C, 0x66, 0x03, 0x03, 0x03, 0x66, 0x3C, 0x00], // 'C'
    [0x1F, 0x36, 0x66, 0x66, 0x66, 0x36, 0x1F, 0x00], // 'D'
    [0x7F, 0x46, 0x16, 0x1E, 0x16, 0x46, 0x7F, 0x00], // 'E'
    [0x7F, 0x46, 0x16, 0x1E, 0x16, 0x06, 0x0F, 0x00], // 'F'
    [0x3C, 0x66, 0x03, 0x03, 0x73, 0x66, 0x7C, 0x00], // 'G'
    [0x33, 0x33, 0x33, 0x3F, 0x33, 0x33, 0x33, 0x00], // 'H'
    [0x1E, 0x0C, 0x0C, 0x0C, 0x0C, 0x0C, 0x1E, 0x00], // 'I'
    [0x78, 0x30, 0x30, 0x30, 0x33, 0x33, 0x1E, 0x00], // 'J'
    [0x67, 0x66, 0x36, 0x1E, 0x36, 0x66, 0x67, 0x00], // 'K'
    [0x0F, 0x06, 0x06, 0x06, 0x46, 0x66, 0x7F, 0x00], // 'L'
    [0x63, 0x77, 0x7F, 0x7F, 0x6B, 0x63, 0x63, 0x00], // 'M'
    [0x63, 0x67, 0x6F, 0x7B, 0x73, 0x63, 0x63, 0x00], // 'N'
    [0x1C, 0x36, 0x63, 0x63, 0x63, 0x36, 0x1C, 0x00], // 'O'
    [0x3F, 0x66, 0x66, 0x3E, 0x06, 0x06, 0x0F, 0x00], // 'P'
    [0x1E, 0x33, 0x33, 0x33, 0x3B, 0x1E, 0x38, 0x00], // 'Q'
    [0x3F, 0x66, 0x66, 0x3E, 0x36, 0x66, 0x67, 0x00], // 'R'
    [0x1E, 0x33, 0x07, 0x0E, 0x38, 0x33, 0x1E, 0x00], // 'S'
    [0x3F, 0x2D, 0x0C, 0x0C, 0x0C, 0x0C, 0x1E, 0x00], // 'T'
    [0x33, 0x33, 0x33, 0x33, 0x33, 0x33, 0x3F, 0x00], // 'U'
    [0x33, 0x33, 0x33, 0x33, 0x33, 0x1E, 0x0C, 0x00], // 'V'
    [0x63, 0x63, 0x63, 0x6B, 0x7F, 0x77, 0x63, 0x00], // 'W'
    [0x63, 0x63, 0x36, 0x1C, 0x1C, 0x36, 0x63, 0x00], // 'X'
    [0x33, 0x33, 0x33, 0x1E, 0x0C, 0x0C, 0x1E, 0x00], // 'Y'
    [0x7F, 0x63, 0x31, 0x18, 0x4C, 0x66, 0x7F, 0x00], // 'Z'
    [0x1E, 0x06, 0x06, 0x06, 0x06, 0x06, 0x1E, 0x00], // '['
    [0x03, 0x06, 0x0C, 0x18, 0x30, 0x60, 0x40, 0x00], // '\\'
    [0x1E, 0x18, 0x18, 0x18, 0x18, 0x18, 0x1E, 0x00], // ']'
    [0x08, 0x1C, 0x36, 0x63, 0x00, 0x00, 0x00, 0x00], // '^'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF], // '_'
    [0x0C, 0x0C, 0x18, 0x00, 0x00, 0x00, 0x00, 0x00], // '`'
    [0x00, 0x00, 0x1E, 0x30, 0x3E, 0x33, 0x6E, 0x00], // 'a'
    [0x07, 0x06, 0x06, 0x3E, 0x66, 0x66, 0x3B, 0x00], // 'b'
    [0x00, 0x00, 0x1E, 0x33, 0x03, 0x33, 0x1E, 0x00], // 'c'
    [0x38, 0x30, 0x30, 0x3E, 0x33, 0x33, 0x6E, 0x00], // 'd'
    [0x00, 0x00, 0x1E, 0x33, 0x3F, 0x03, 0x1E, 0x00], // 'e'
    [0x1C, 0x36, 0x06, 0x0F, 0x06, 0x06, 0x0F, 0x00], // 'f'
    [0x00, 0x00, 0x6E, 0x33, 0x33, 0x3E, 0x30, 0x1F], // 'g'
    [0x07, 0x06, 0x36, 0x6E, 0x66, 0x66, 0x67, 0x00], // 'h'
    [0x0C, 0x00, 0x0E, 0x0C, 0x0C, 0x0C, 0x1E, 0x00], // 'i'
    [0x30, 0x00, 0x30, 0x30, 0x30, 0x33, 0x33, 0x1E], // 'j'
    [0x07, 0x06, 0x66, 0x36, 0x1E, 0x36, 0x67, 0x00], // 'k'
    [0x0E, 0x0C, 0x0C, 0x0C, 0x0C, 0x0C, 0x1E, 0x00], // 'l'
    [0x00, 0x00, 0x33, 0x7F, 0x7F, 0x6B, 0x63, 0x00], // 'm'
    [0x00, 0x00, 0x1F, 0x33, 0x33, 0x33, 0x33, 0x00], // 'n'
    [0x00, 0x00, 0x1E, 0x33, 0x33, 0x33, 0x1E, 0x00], // 'o'
    [0x00, 0x00, 0x3B, 0x66, 0x66, 0x3E, 0x06, 0x0F], // 'p'
    [0x00, 0x00, 0x6E, 0x33, 0x33, 0x3E, 0x30, 0x78], // 'q'
    [0x00, 0x00, 0x3B, 0x6E, 0x66, 0x06, 0x0F, 0x00], // 'r'
    [0x00, 0x00, 0x3E, 0x03, 0x1E, 0x30, 0x1F, 0x00], // 's'
    [0x08, 0x0C, 0x3E, 0x0C, 0x0C, 0x2C, 0x18, 0x00], // 't'
    [0x00, 0x00, 0x33, 0x33, 0x33, 0x33, 0x6E, 0x00], // 'u'
    [0x00, 0x00, 0x33, 0x33, 0x33, 0x1E, 0x0C, 0x00], // 'v'
    [0x00, 0x00, 0x63, 0x6B, 0x7F, 0x7F, 0x36, 0x00], // 'w'
    [0x00, 0x00, 0x63, 0x36, 0x1C, 0x36, 0x63, 0x00], // 'x'
    [0x00, 0x00, 0x33, 0x33, 0x33, 0x3E, 0x30, 0x1F], // 'y'
    [0x00, 0x00, 0x3F, 0x19, 0x0C, 0x26, 0x3F, 0x00], // 'z'
    [0x38, 0x0C, 0x0C, 0x07, 0x0C, 0x0C, 0x38, 0x00], // '{'
    [0x18, 0x18, 0x18, 0x00, 0x18, 0x18, 0x18, 0x00], // '|'
    [0x07, 0x0C, 0x0C, 0x38, 0x0C, 0x0C, 0x07, 0x00], // '}'
    [0x6E, 0x3B, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // '~'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // DEL
];

/// Rightmost occupied column of a glyph, or 0 for blank cells.
fn glyph_width(rows: &[u8; 8]) -> i32 {
    let occupied = rows.iter().fold(0u8, |acc, row| acc | row);
    (8 - occupied.leading_zeros() as i32).max(0)
}

/// Unpacks the bitmap into a gray-alpha atlas image plus the per-glyph
/// records the text path consumes.
pub(crate) fn build_default_font_atlas() -> (Image, Vec<Rect>, Vec<GlyphInfo>) {
    const COLUMNS: i32 = 16;
    let cell = GLYPH_SIZE + CELL_PADDING;
    let rows_needed = (GLYPH_COUNT as i32 + COLUMNS - 1) / COLUMNS;

    let atlas_width = (COLUMNS * cell) as u32;
    let atlas_height = (rows_needed * cell) as u32;
    let atlas_width = atlas_width.next_power_of_two() as i32;
    let atlas_height = atlas_height.next_power_of_two() as i32;

    let mut pixels = vec![Color::BLANK; (atlas_width * atlas_height) as usize];
    let mut recs = Vec::with_capacity(GLYPH_COUNT);
    let mut glyphs = Vec::with_capacity(GLYPH_COUNT);

    for (index, rows) in GLYPH_ROWS.iter().enumerate() {
        let cell_x = (index as i32 % COLUMNS) * cell;
        let cell_y = (index as i32 / COLUMNS) * cell;

        for (y, row) in rows.iter().enumerate() {
            for x in 0..8 {
                if row & (1 << x) != 0 {
                    let px = cell_x + x;
                    let py = cell_y + y as i32;
                    pixels[(py * atlas_width + px) as usize] = Color::WHITE;
                }
            }
        }

        let width = glyph_width(rows);
        let codepoint = FIRST_CODEPOINT + index as u32;
        recs.push(Rect::new(
            cell_x as f32,
            cell_y as f32,
            width.max(1) as f32,
            GLYPH_SIZE as f32,
        ));
        glyphs.push(GlyphInfo {
            value: codepoint as i32,
            offset_x: 0,
            offset_y: 0,
            // Blank glyphs (space) still advance; occupied ones get one
            // column of tracking.
            advance_x: if width == 0 { 4 } else { width + 1 },
            image: None,
        });
    }

    let mut image = Image::from_colors(&pixels, atlas_width, atlas_height);
    image.convert_format(PixelFormat::GrayAlpha);
    (image, recs, glyphs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atlas_is_pot_gray_alpha() {
        let (image, recs, glyphs) = build_default_font_atlas();
        assert_eq!(image.format(), PixelFormat::GrayAlpha);
        assert!(image.width() >= 128);
        assert_eq!(image.width() & (image.width() - 1), 0);
        assert_eq!(image.height() & (image.height() - 1), 0);
        assert_eq!(recs.len(), GLYPH_COUNT);
        assert_eq!(glyphs.len(), GLYPH_COUNT);
    }

    #[test]
    fn test_space_has_no_coverage_but_advances() {
        let (image, recs, glyphs) = build_default_font_atlas();
        assert_eq!(glyphs[0].value, 0x20);
        assert!(glyphs[0].advance_x > 0);
        // The space cell carries no visible pixels.
        let rect = recs[0];
        for y in 0..GLYPH_SIZE {
            for x in 0..GLYPH_SIZE {
                let c = image.pixel_at(rect.x as i32 + x, rect.y as i32 + y);
                assert_eq!(c.a, 0);
            }
        }
    }

    #[test]
    fn test_letter_has_coverage() {
        let (image, recs, _) = build_default_font_atlas();
        let index = ('A' as u32 - FIRST_CODEPOINT) as usize;
        let rect = recs[index];
        let mut covered = 0;
        for y in 0..GLYPH_SIZE {
            for x in 0..GLYPH_SIZE {
                if image.pixel_at(rect.x as i32 + x, rect.y as i32 + y).a > 0 {
                    covered += 1;
                }
            }
        }
        assert!(covered > 10);
    }

    #[test]
    fn test_advances_derived_from_columns() {
        let (_, _, glyphs) = build_default_font_atlas();
        let advance = |ch: char| glyphs[(ch as u32 - FIRST_CODEPOINT) as usize].advance_x;
        // 'i' is narrower than 'W'.
        assert!(advance('i') < advance('W'));
    }
}
