//! Text measurement and drawing.
//!
//! Input strings are walked with a lossy UTF-8 decoder ([`decode_utf8`])
//! that substitutes `'?'` for ill-formed sequences and always consumes at
//! least one byte, so drawing never stalls on bad input. Glyphs are
//! emitted as textured quads from the font atlas through the batch.

use crate::context::RenderContext;
use crate::font::Font;
use crate::math::{Color, Rect, Vector2};

/// Vertical advance between lines, as a multiple of the font size.
const LINE_FACTOR: f32 = 1.5;

// =============================================================================
// UTF-8
// =============================================================================

/// Decodes the first scalar value of `bytes` per RFC 3629.
///
/// Returns the codepoint and the number of bytes consumed. Ill-formed
/// input (stray continuation, overlong form, truncated sequence, value
/// beyond U+10FFFF or in the surrogate range) yields `('?', 1)` so the
/// caller always makes progress.
pub fn decode_utf8(bytes: &[u8]) -> (char, usize) {
    const REPLACEMENT: (char, usize) = ('?', 1);

    let Some(&b0) = bytes.first() else {
        return REPLACEMENT;
    };
    if b0 < 0x80 {
        return (b0 as char, 1);
    }

    let (len, min_cont, max_cont) = match b0 {
        0xC2..=0xDF => (2, 0x80, 0xBF),
        0xE0 => (3, 0xA0, 0xBF),
        0xE1..=0xEC | 0xEE..=0xEF => (3, 0x80, 0xBF),
        0xED => (3, 0x80, 0x9F),
        0xF0 => (4, 0x90, 0xBF),
        0xF1..=0xF3 => (4, 0x80, 0xBF),
        0xF4 => (4, 0x80, 0x8F),
        _ => return REPLACEMENT,
    };
    if bytes.len() < len {
        return REPLACEMENT;
    }

    // The first continuation byte carries the tightened bounds; the rest
    // use the generic range.
    let b1 = bytes[1];
    if b1 < min_cont || b1 > max_cont {
        return REPLACEMENT;
    }
    let mut value = match len {
        2 => b0 as u32 & 0x1F,
        3 => b0 as u32 & 0x0F,
        _ => b0 as u32 & 0x07,
    };
    value = value << 6 | (b1 as u32 & 0x3F);
    for &b in &bytes[2..len] {
        if !(0x80..=0xBF).contains(&b) {
            return REPLACEMENT;
        }
        value = value << 6 | (b as u32 & 0x3F);
    }

    match char::from_u32(value) {
        Some(c) => (c, len),
        None => REPLACEMENT,
    }
}

// =============================================================================
// Measurement
// =============================================================================

/// Measures `text` rendered with `font` at `size` pixels and `spacing`
/// extra pixels between glyphs. Height grows by a factor of
/// [`LINE_FACTOR`] per additional line.
pub fn measure_text(font: &Font, text: &str, size: f32, spacing: f32) -> Vector2<f32> {
    if font.base_size <= 0 || text.is_empty() {
        return Vector2::new(0.0, 0.0);
    }
    let scale = size / font.base_size as f32;

    let mut widest: f32 = 0.0;
    let mut line_width: f32 = 0.0;
    let mut line_glyphs = 0;
    let mut lines = 1;

    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let (ch, consumed) = decode_utf8(&bytes[i..]);
        i += consumed;
        if ch == '\n' {
            widest = widest.max(line_width);
            line_width = 0.0;
            line_glyphs = 0;
            lines += 1;
            continue;
        }
        let glyph = &font.glyphs[font.glyph_index(ch)];
        if line_glyphs > 0 {
            line_width += spacing;
        }
        line_width += glyph.advance_x as f32 * scale;
        line_glyphs += 1;
    }
    widest = widest.max(line_width);

    Vector2::new(widest, size * LINE_FACTOR.powi(lines - 1))
}

/// Measures the box `text` occupies when word-wrapped into `width`
/// pixels, by simulating the wrap pass of [`RenderContext::draw_text_wrap`].
pub fn measure_text_wrap(
    font: &Font,
    text: &str,
    width: f32,
    size: f32,
    spacing: f32,
) -> Vector2<f32> {
    if font.base_size <= 0 || text.is_empty() {
        return Vector2::new(0.0, 0.0);
    }
    let lines = wrap_lines(font, text, width, size, spacing);
    let widest = lines
        .iter()
        .map(|line| measure_text(font, line, size, spacing).x)
        .fold(0.0f32, f32::max);
    Vector2::new(
        widest.min(width),
        size * LINE_FACTOR.powi(lines.len().max(1) as i32 - 1),
    )
}

/// Splits `text` into wrapped lines: breaks at word boundaries when the
/// accumulated width would exceed `width`, mid-word when a single word is
/// wider than the container, and always at explicit newlines.
fn wrap_lines<'t>(font: &Font, text: &'t str, width: f32, size: f32, spacing: f32) -> Vec<&'t str> {
    let scale = size / font.base_size.max(1) as f32;
    let bytes = text.as_bytes();

    let mut lines = Vec::new();
    let mut line_start = 0usize;
    let mut line_width = 0.0f32;
    // Byte offset just past the last space of the current line.
    let mut break_at: Option<usize> = None;

    let mut i = 0usize;
    while i < bytes.len() {
        let (ch, consumed) = decode_utf8(&bytes[i..]);

        if ch == '\n' {
            lines.push(&text[line_start..i]);
            line_start = i + consumed;
            line_width = 0.0;
            break_at = None;
            i += consumed;
            continue;
        }

        let glyph = &font.glyphs[font.glyph_index(ch)];
        let advance = glyph.advance_x as f32 * scale + spacing;

        if line_width + advance > width && i > line_start {
            match break_at.take() {
                Some(b) if b > line_start => {
                    lines.push(text[line_start..b].trim_end());
                    line_start = b;
                    // Re-measure the tail of the line from the break.
                    line_width = 0.0;
                    i = b;
                    continue;
                }
                _ => {
                    lines.push(&text[line_start..i]);
                    line_start = i;
                    line_width = 0.0;
                    continue;
                }
            }
        }

        if ch == ' ' || ch == '\t' {
            break_at = Some(i + consumed);
        }
        line_width += advance;
        i += consumed;
    }
    lines.push(&text[line_start..]);
    lines
}

// =============================================================================
// Drawing
// =============================================================================

impl RenderContext {
    /// Draws one glyph at the pen position; returns the pen advance.
    pub fn draw_glyph(
        &mut self,
        font: &Font,
        codepoint: char,
        x: f32,
        y: f32,
        size: f32,
        tint: Color,
    ) -> f32 {
        let scale = size / font.base_size.max(1) as f32;
        let index = font.glyph_index(codepoint);
        let glyph = &font.glyphs[index];
        let rec = font.recs[index];
        let advance = glyph.advance_x as f32 * scale;

        if rec.width > 0.0 && codepoint != ' ' && codepoint != '\t' {
            let dest = Rect::new(
                x + glyph.offset_x as f32 * scale,
                y + glyph.offset_y as f32 * scale,
                rec.width * scale,
                rec.height * scale,
            );
            let texture = font.texture;
            self.draw_texture_region(texture, rec, dest, Vector2::new(0.0, 0.0), 0.0, tint);
        }
        advance
    }

    /// Draws text with the default font. Spacing scales with the size the
    /// way the stock text helpers do.
    pub fn draw_text(&mut self, text: &str, x: f32, y: f32, size: f32, tint: Color) {
        let font = self.default_font.clone();
        let spacing = size / 10.0;
        self.draw_text_ex(&font, text, Vector2::new(x, y), size, spacing, tint);
    }

    /// Draws text with an explicit font, size and glyph spacing.
    pub fn draw_text_ex(
        &mut self,
        font: &Font,
        text: &str,
        position: Vector2<f32>,
        size: f32,
        spacing: f32,
        tint: Color,
    ) {
        if !font.is_valid() {
            return;
        }
        let mut x = position.x;
        let mut y = position.y;

        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let (ch, consumed) = decode_utf8(&bytes[i..]);
            i += consumed;
            if ch == '\n' {
                x = position.x;
                y += size * LINE_FACTOR;
                continue;
            }
            let advance = self.draw_glyph(font, ch, x, y, size, tint);
            x += advance + spacing;
        }
    }

    /// Draws text constrained to `bounds`. With `word_wrap` the layout
    /// alternates between a measuring pass (finding where the line breaks)
    /// and a drawing pass over the measured span; without it, lines break
    /// only at explicit newlines. Drawing stops once the next line would
    /// leave the box.
    pub fn draw_text_wrap(
        &mut self,
        font: &Font,
        text: &str,
        bounds: Rect,
        size: f32,
        spacing: f32,
        word_wrap: bool,
        tint: Color,
    ) {
        if !font.is_valid() {
            return;
        }

        let lines: Vec<&str> = if word_wrap {
            wrap_lines(font, text, bounds.width, size, spacing)
        } else {
            text.split('\n').collect()
        };

        let mut y = 0.0f32;
        for line in lines {
            if y + size > bounds.height {
                break;
            }
            let mut x = 0.0f32;
            let bytes = line.as_bytes();
            let mut i = 0;
            while i < bytes.len() {
                let (ch, consumed) = decode_utf8(&bytes[i..]);
                i += consumed;
                let advance = self.draw_glyph(font, ch, bounds.x + x, bounds.y + y, size, tint);
                x += advance + spacing;
                if !word_wrap && x > bounds.width {
                    break;
                }
            }
            y += size * LINE_FACTOR;
        }
    }

    /// Measures with the context's default font.
    pub fn measure_default_text(&self, text: &str, size: f32, spacing: f32) -> Vector2<f32> {
        measure_text(&self.default_font, text, size, spacing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::DrawMode;
    use crate::test_support::test_context;

    // =========================================================================
    // Decoder
    // =========================================================================

    #[test]
    fn test_decode_ascii() {
        assert_eq!(decode_utf8(b"A"), ('A', 1));
        assert_eq!(decode_utf8(b"\x7F"), ('\u{7F}', 1));
    }

    #[test]
    fn test_decode_multibyte_sequence() {
        let input = b"A\xC3\xA9\xE2\x98\x83\xF0\x9F\x98\x80X";
        let expected = [
            ('\u{41}', 1),
            ('\u{E9}', 2),
            ('\u{2603}', 3),
            ('\u{1F600}', 4),
            ('\u{58}', 1),
        ];
        let mut offset = 0;
        for (ch, len) in expected {
            let (decoded, consumed) = decode_utf8(&input[offset..]);
            assert_eq!(decoded, ch);
            assert_eq!(consumed, len);
            offset += consumed;
        }
        assert_eq!(offset, input.len());
    }

    #[test]
    fn test_decode_ill_formed_substitutes() {
        // Stray continuation byte.
        assert_eq!(decode_utf8(b"\x80abc"), ('?', 1));
        // Overlong form of '/'.
        assert_eq!(decode_utf8(b"\xC0\xAF"), ('?', 1));
        // Truncated three-byte sequence.
        assert_eq!(decode_utf8(b"\xE2\x98"), ('?', 1));
        // CESU-8 surrogate half.
        assert_eq!(decode_utf8(b"\xED\xA0\x80"), ('?', 1));
        // Beyond U+10FFFF.
        assert_eq!(decode_utf8(b"\xF5\x80\x80\x80"), ('?', 1));
    }

    #[test]
    fn test_decode_always_consumes() {
        for b in 0u8..=255 {
            let (_, consumed) = decode_utf8(&[b]);
            assert!(consumed >= 1);
        }
    }

    proptest::proptest! {
        #[test]
        fn prop_decoder_always_progresses(
            bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 1..64)
        ) {
            let mut i = 0;
            while i < bytes.len() {
                let (_, consumed) = decode_utf8(&bytes[i..]);
                proptest::prop_assert!(consumed >= 1);
                i += consumed;
            }
            proptest::prop_assert_eq!(i, bytes.len());
        }

        #[test]
        fn prop_decoder_round_trips_valid_utf8(text in "\\PC{0,16}") {
            let bytes = text.as_bytes();
            let mut decoded = String::new();
            let mut i = 0;
            while i < bytes.len() {
                let (ch, consumed) = decode_utf8(&bytes[i..]);
                decoded.push(ch);
                i += consumed;
            }
            proptest::prop_assert_eq!(decoded, text);
        }
    }

    // =========================================================================
    // Measurement
    // =========================================================================

    #[test]
    fn test_measure_single_line() {
        let (ctx, _) = test_context();
        let font = ctx.default_font();
        let advance =
            |ch: char| font.glyphs[font.glyph_index(ch)].advance_x as f32;
        let measured = measure_text(font, "Hi", font.base_size as f32, 1.0);
        assert_eq!(measured.x, advance('H') + 1.0 + advance('i'));
        assert_eq!(measured.y, font.base_size as f32);
    }

    #[test]
    fn test_measure_scales_with_size() {
        let (ctx, _) = test_context();
        let font = ctx.default_font();
        let at_base = measure_text(font, "Hi", font.base_size as f32, 0.0);
        let doubled = measure_text(font, "Hi", font.base_size as f32 * 2.0, 0.0);
        assert!((doubled.x - at_base.x * 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_measure_multiline_height() {
        let (ctx, _) = test_context();
        let font = ctx.default_font();
        let one = measure_text(font, "a", 10.0, 0.0);
        let two = measure_text(font, "a\nb", 10.0, 0.0);
        let three = measure_text(font, "a\nb\nc", 10.0, 0.0);
        assert_eq!(one.y, 10.0);
        assert_eq!(two.y, 15.0);
        assert_eq!(three.y, 22.5);
    }

    #[test]
    fn test_measure_empty() {
        let (ctx, _) = test_context();
        let measured = measure_text(ctx.default_font(), "", 10.0, 1.0);
        assert_eq!(measured, Vector2::new(0.0, 0.0));
    }

    #[test]
    fn test_wrap_lines_breaks_at_spaces() {
        let (ctx, _) = test_context();
        let font = ctx.default_font();
        // Each word is ~4 glyphs; a narrow container forces one word per
        // line.
        let lines = wrap_lines(font, "one two three", 40.0, 8.0, 0.0);
        assert!(lines.len() >= 2);
        assert!(lines.iter().all(|l| !l.starts_with(' ')));
    }

    #[test]
    fn test_wrap_lines_honors_newlines() {
        let (ctx, _) = test_context();
        let lines = wrap_lines(ctx.default_font(), "ab\ncd", 1000.0, 8.0, 0.0);
        assert_eq!(lines, vec!["ab", "cd"]);
    }

    #[test]
    fn test_wrap_splits_overlong_word() {
        let (ctx, _) = test_context();
        let font = ctx.default_font();
        let lines = wrap_lines(font, "aaaaaaaaaaaaaaaaaaaa", 30.0, 8.0, 0.0);
        assert!(lines.len() > 1);
    }

    #[test]
    fn test_measure_wrap_bounded_by_width() {
        let (ctx, _) = test_context();
        let font = ctx.default_font();
        let measured = measure_text_wrap(font, "several words to wrap", 50.0, 8.0, 0.0);
        assert!(measured.x <= 50.0);
        assert!(measured.y > 8.0);
    }

    // =========================================================================
    // Drawing
    // =========================================================================

    #[test]
    fn test_draw_text_emits_quads_with_atlas_texture() {
        let (mut ctx, _) = test_context();
        let atlas_id = ctx.default_font().texture.id;
        ctx.draw_text("Hi", 0.0, 0.0, 16.0, Color::BLACK);
        let draws = ctx.pending_draws();
        let glyph_call = draws
            .iter()
            .find(|d| d.texture_id == atlas_id)
            .expect("glyph draw call");
        assert_eq!(glyph_call.mode, DrawMode::Quads);
        assert_eq!(glyph_call.vertex_count, 8);
    }

    #[test]
    fn test_draw_text_skips_spaces() {
        let (mut ctx, _) = test_context();
        let atlas_id = ctx.default_font().texture.id;
        ctx.draw_text("a a", 0.0, 0.0, 16.0, Color::BLACK);
        let total: i32 = ctx
            .pending_draws()
            .iter()
            .filter(|d| d.texture_id == atlas_id)
            .map(|d| d.vertex_count)
            .sum();
        // Two visible glyphs only.
        assert_eq!(total, 8);
    }

    #[test]
    fn test_draw_text_wrap_stops_at_box_height() {
        let (mut ctx, _) = test_context();
        let atlas_id = ctx.default_font().texture.id;
        let font = ctx.default_font().clone();
        // A box one line tall: the second line must not be drawn.
        ctx.draw_text_wrap(
            &font,
            "aa aa aa aa aa aa",
            Rect::new(0.0, 0.0, 30.0, 10.0),
            8.0,
            0.0,
            true,
            Color::BLACK,
        );
        let glyphs: i32 = ctx
            .pending_draws()
            .iter()
            .filter(|d| d.texture_id == atlas_id)
            .map(|d| d.vertex_count)
            .sum();
        assert!(glyphs <= 4 * 4);
    }

    #[test]
    fn test_draw_text_wrap_disabled_breaks_only_on_newline() {
        let (mut ctx, _) = test_context();
        let font = ctx.default_font().clone();
        ctx.draw_text_wrap(
            &font,
            "abc",
            Rect::new(0.0, 0.0, 1000.0, 100.0),
            8.0,
            0.0,
            false,
            Color::BLACK,
        );
        // Nothing to assert beyond not panicking and emitting quads.
        assert!(ctx.pending_vertex_count() > 0);
    }
}
