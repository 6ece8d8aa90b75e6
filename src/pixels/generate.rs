//! Procedural image generators.
//!
//! Every generator builds a pivot color array and hands it to
//! [`Image::from_colors`], so the results are always RGBA8. Noise-based
//! generators use the `noise` crate (Perlin with fractal Brownian motion,
//! Worley for the cellular pattern).

use crate::math::Color;
use crate::pixels::Image;
use cgmath::Vector4;
use noise::core::worley::ReturnType;
use noise::{NoiseFn, Perlin, Worley};
use rand::Rng;

/// fBm octave count for the Perlin generator.
const PERLIN_OCTAVES: u32 = 6;
/// Frequency multiplier per octave.
const PERLIN_LACUNARITY: f64 = 2.0;
/// Amplitude multiplier per octave.
const PERLIN_GAIN: f64 = 0.5;

/// Solid color fill.
pub fn gen_image_color(width: i32, height: i32, color: Color) -> Image {
    Image::from_colors(&vec![color; (width * height).max(0) as usize], width, height)
}

fn lerp_color(a: Color, b: Color, t: f32) -> Color {
    let a = a.normalize();
    let b = b.normalize();
    Color::from_normalized(Vector4::new(
        a.x + (b.x - a.x) * t,
        a.y + (b.y - a.y) * t,
        a.z + (b.z - a.z) * t,
        a.w + (b.w - a.w) * t,
    ))
}

/// Vertical gradient from `top` to `bottom`.
pub fn gen_image_gradient_v(width: i32, height: i32, top: Color, bottom: Color) -> Image {
    let mut colors = Vec::with_capacity((width * height).max(0) as usize);
    for y in 0..height {
        let t = if height > 1 {
            y as f32 / (height - 1) as f32
        } else {
            0.0
        };
        let row = lerp_color(top, bottom, t);
        for _ in 0..width {
            colors.push(row);
        }
    }
    Image::from_colors(&colors, width, height)
}

/// Horizontal gradient from `left` to `right`.
pub fn gen_image_gradient_h(width: i32, height: i32, left: Color, right: Color) -> Image {
    let mut colors = Vec::with_capacity((width * height).max(0) as usize);
    for _ in 0..height {
        for x in 0..width {
            let t = if width > 1 {
                x as f32 / (width - 1) as f32
            } else {
                0.0
            };
            colors.push(lerp_color(left, right, t));
        }
    }
    Image::from_colors(&colors, width, height)
}

/// Radial gradient: `inner` at the center fading to `outer` at the edge.
/// `density` in `[0,1]` widens the solid inner disc.
pub fn gen_image_gradient_radial(
    width: i32,
    height: i32,
    density: f32,
    inner: Color,
    outer: Color,
) -> Image {
    let radius = (width.min(height) as f32) / 2.0;
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let density = density.clamp(0.0, 1.0);

    let mut colors = Vec::with_capacity((width * height).max(0) as usize);
    for y in 0..height {
        for x in 0..width {
            let dist = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
            let t = if radius * (1.0 - density) > 0.0 {
                ((dist - radius * density) / (radius * (1.0 - density))).clamp(0.0, 1.0)
            } else {
                (dist >= radius) as i32 as f32
            };
            colors.push(lerp_color(inner, outer, t));
        }
    }
    Image::from_colors(&colors, width, height)
}

/// Checkerboard with `checks_x × checks_y`-pixel cells.
pub fn gen_image_checked(
    width: i32,
    height: i32,
    checks_x: i32,
    checks_y: i32,
    col1: Color,
    col2: Color,
) -> Image {
    let checks_x = checks_x.max(1);
    let checks_y = checks_y.max(1);
    let mut colors = Vec::with_capacity((width * height).max(0) as usize);
    for y in 0..height {
        for x in 0..width {
            if (x / checks_x + y / checks_y) % 2 == 0 {
                colors.push(col1);
            } else {
                colors.push(col2);
            }
        }
    }
    Image::from_colors(&colors, width, height)
}

/// White noise: each pixel is white with probability `factor`, else black.
pub fn gen_image_white_noise(width: i32, height: i32, factor: f32) -> Image {
    let mut rng = rand::rng();
    let mut colors = Vec::with_capacity((width * height).max(0) as usize);
    for _ in 0..(width * height).max(0) {
        if rng.random::<f32>() < factor {
            colors.push(Color::WHITE);
        } else {
            colors.push(Color::BLACK);
        }
    }
    Image::from_colors(&colors, width, height)
}

/// Fractal Perlin noise (6 octaves, lacunarity 2, gain 0.5) mapped to a
/// grayscale ramp. `scale` zooms the pattern; the offsets shift it.
pub fn gen_image_perlin_noise(
    width: i32,
    height: i32,
    offset_x: i32,
    offset_y: i32,
    scale: f32,
) -> Image {
    let perlin = Perlin::new(0);
    let mut colors = Vec::with_capacity((width * height).max(0) as usize);
    for y in 0..height {
        for x in 0..width {
            let nx = (x + offset_x) as f64 * scale as f64 / width.max(1) as f64;
            let ny = (y + offset_y) as f64 * scale as f64 / height.max(1) as f64;

            let mut total = 0.0;
            let mut amplitude = 1.0;
            let mut frequency = 1.0;
            let mut max_value = 0.0;
            for _ in 0..PERLIN_OCTAVES {
                total += perlin.get([nx * frequency, ny * frequency]) * amplitude;
                max_value += amplitude;
                amplitude *= PERLIN_GAIN;
                frequency *= PERLIN_LACUNARITY;
            }

            // fBm sum is in [-1, 1]; remap to intensity.
            let v = ((total / max_value + 1.0) / 2.0).clamp(0.0, 1.0);
            let g = (v * 255.0) as u8;
            colors.push(Color::new(g, g, g, 255));
        }
    }
    Image::from_colors(&colors, width, height)
}

/// Cellular (Worley) noise: intensity grows with the distance to the
/// nearest feature point; cell size is `tile_size` pixels.
pub fn gen_image_cellular(width: i32, height: i32, tile_size: i32) -> Image {
    let tile = tile_size.max(1) as f64;
    let worley = Worley::new(0).set_return_type(ReturnType::Distance);
    let mut colors = Vec::with_capacity((width * height).max(0) as usize);
    for y in 0..height {
        for x in 0..width {
            let d = worley.get([x as f64 / tile, y as f64 / tile]);
            let v = ((d + 1.0) / 2.0).clamp(0.0, 1.0);
            let g = (v * 255.0) as u8;
            colors.push(Color::new(g, g, g, 255));
        }
    }
    Image::from_colors(&colors, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixels::PixelFormat;

    #[test]
    fn test_gen_color_fills() {
        let img = gen_image_color(4, 3, Color::MAROON);
        assert_eq!(img.width(), 4);
        assert_eq!(img.height(), 3);
        assert_eq!(img.format(), PixelFormat::R8G8B8A8);
        assert!(img.to_colors().iter().all(|&c| c == Color::MAROON));
    }

    #[test]
    fn test_gradient_v_endpoints() {
        let img = gen_image_gradient_v(2, 8, Color::BLACK, Color::WHITE);
        let colors = img.to_colors();
        assert_eq!(colors[0], Color::BLACK);
        assert_eq!(colors[colors.len() - 1], Color::WHITE);
    }

    #[test]
    fn test_gradient_h_endpoints() {
        let img = gen_image_gradient_h(8, 2, Color::BLACK, Color::WHITE);
        let colors = img.to_colors();
        assert_eq!(colors[0], Color::BLACK);
        assert_eq!(colors[7], Color::WHITE);
    }

    #[test]
    fn test_gradient_radial_center_is_inner() {
        let img = gen_image_gradient_radial(9, 9, 0.0, Color::WHITE, Color::BLACK);
        // Center pixel should be (nearly) the inner color.
        let c = img.pixel_at(4, 4);
        assert!(c.r > 200);
        // A corner lies beyond the radius.
        assert_eq!(img.pixel_at(0, 0), Color::BLACK);
    }

    #[test]
    fn test_checked_alternates() {
        let img = gen_image_checked(4, 4, 2, 2, Color::RED, Color::BLUE);
        assert_eq!(img.pixel_at(0, 0), Color::RED);
        assert_eq!(img.pixel_at(2, 0), Color::BLUE);
        assert_eq!(img.pixel_at(0, 2), Color::BLUE);
        assert_eq!(img.pixel_at(2, 2), Color::RED);
    }

    #[test]
    fn test_white_noise_is_black_and_white() {
        let img = gen_image_white_noise(16, 16, 0.5);
        assert!(img
            .to_colors()
            .iter()
            .all(|&c| c == Color::WHITE || c == Color::BLACK));
    }

    #[test]
    fn test_white_noise_extremes() {
        let all_black = gen_image_white_noise(8, 8, 0.0);
        assert!(all_black.to_colors().iter().all(|&c| c == Color::BLACK));
        let all_white = gen_image_white_noise(8, 8, 1.1);
        assert!(all_white.to_colors().iter().all(|&c| c == Color::WHITE));
    }

    #[test]
    fn test_perlin_noise_is_grayscale_ramp() {
        let img = gen_image_perlin_noise(16, 16, 0, 0, 4.0);
        assert_eq!(img.width(), 16);
        for c in img.to_colors() {
            assert_eq!(c.r, c.g);
            assert_eq!(c.g, c.b);
            assert_eq!(c.a, 255);
        }
    }

    #[test]
    fn test_cellular_dimensions() {
        let img = gen_image_cellular(12, 10, 4);
        assert_eq!(img.width(), 12);
        assert_eq!(img.height(), 10);
        for c in img.to_colors() {
            assert_eq!(c.r, c.g);
            assert_eq!(c.g, c.b);
        }
    }
}
