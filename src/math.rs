//! Math value types used across the renderer.
//!
//! Matrix and vector math comes from `cgmath`; this module adds the small
//! `#[repr(C)]` value types the rendering API traffics in (`Color`, `Rect`,
//! `Size`) plus the color conversions the pixel engine pivots on. We wrap
//! cgmath rather than replacing it: the battle-tested matrix/quaternion
//! operations stay in cgmath, while these types guarantee a stable memory
//! layout for vertex streams and texture uploads.

use cgmath::Vector4;

// Re-export the cgmath types that appear in public signatures.
pub use cgmath::{Deg, Matrix4, Point3, Quaternion, Rad, Vector2, Vector3};

/// Flattens a matrix into the column-major cell array GL uniforms take.
#[inline]
pub fn matrix_cells(m: &Matrix4<f32>) -> [f32; 16] {
    let columns: [[f32; 4]; 4] = (*m).into();
    bytemuck::cast(columns)
}

// =============================================================================
// Size
// =============================================================================

/// A width/height pair in pixels.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    #[inline]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self {
            width: 0,
            height: 0,
        }
    }
}

// =============================================================================
// Rect
// =============================================================================

/// An axis-aligned rectangle, y-down, in pixels or texels.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersection of two rectangles; zero-sized when they do not overlap.
    pub fn intersection(&self, other: &Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        Rect {
            x: x0,
            y: y0,
            width: (x1 - x0).max(0.0),
            height: (y1 - y0).max(0.0),
        }
    }
}

// =============================================================================
// Color
// =============================================================================

/// An 8-bit RGBA color, sRGB by convention. The renderer never
/// gamma-converts; values pass through to the vertex stream untouched.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const LIGHTGRAY: Color = Color::rgb(200, 200, 200);
    pub const GRAY: Color = Color::rgb(130, 130, 130);
    pub const DARKGRAY: Color = Color::rgb(80, 80, 80);
    pub const YELLOW: Color = Color::rgb(253, 249, 0);
    pub const GOLD: Color = Color::rgb(255, 203, 0);
    pub const ORANGE: Color = Color::rgb(255, 161, 0);
    pub const PINK: Color = Color::rgb(255, 109, 194);
    pub const RED: Color = Color::rgb(230, 41, 55);
    pub const MAROON: Color = Color::rgb(190, 33, 55);
    pub const GREEN: Color = Color::rgb(0, 228, 48);
    pub const LIME: Color = Color::rgb(0, 158, 47);
    pub const DARKGREEN: Color = Color::rgb(0, 117, 44);
    pub const SKYBLUE: Color = Color::rgb(102, 191, 255);
    pub const BLUE: Color = Color::rgb(0, 121, 241);
    pub const DARKBLUE: Color = Color::rgb(0, 82, 172);
    pub const PURPLE: Color = Color::rgb(200, 122, 255);
    pub const VIOLET: Color = Color::rgb(135, 60, 190);
    pub const DARKPURPLE: Color = Color::rgb(112, 31, 126);
    pub const BEIGE: Color = Color::rgb(211, 176, 131);
    pub const BROWN: Color = Color::rgb(127, 106, 79);
    pub const DARKBROWN: Color = Color::rgb(76, 63, 47);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const BLANK: Color = Color::new(0, 0, 0, 0);
    pub const MAGENTA: Color = Color::rgb(255, 0, 255);
    pub const RAYWHITE: Color = Color::rgb(245, 245, 245);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Normalizes to a `[0,1]` float vector.
    #[inline]
    pub fn normalize(self) -> Vector4<f32> {
        Vector4::new(
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        )
    }

    /// Builds a color from a normalized `[0,1]` float vector.
    #[inline]
    pub fn from_normalized(v: Vector4<f32>) -> Self {
        Self {
            r: (v.x.clamp(0.0, 1.0) * 255.0).round() as u8,
            g: (v.y.clamp(0.0, 1.0) * 255.0).round() as u8,
            b: (v.z.clamp(0.0, 1.0) * 255.0).round() as u8,
            a: (v.w.clamp(0.0, 1.0) * 255.0).round() as u8,
        }
    }

    /// Returns the same color with alpha scaled by `alpha` in `[0,1]`.
    #[inline]
    pub fn fade(self, alpha: f32) -> Self {
        Self {
            a: (alpha.clamp(0.0, 1.0) * 255.0) as u8,
            ..self
        }
    }

    /// Converts to HSV; hue in degrees `[0,360)`, saturation/value in `[0,1]`.
    pub fn to_hsv(self) -> Vector3<f32> {
        let r = self.r as f32 / 255.0;
        let g = self.g as f32 / 255.0;
        let b = self.b as f32 / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let hue = if delta == 0.0 {
            0.0
        } else if max == r {
            let mut h = 60.0 * (((g - b) / delta) % 6.0);
            if h < 0.0 {
                h += 360.0;
            }
            h
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };

        let saturation = if max == 0.0 { 0.0 } else { delta / max };
        Vector3::new(hue, saturation, max)
    }

    /// Builds a fully opaque color from HSV components.
    pub fn from_hsv(hue: f32, saturation: f32, value: f32) -> Self {
        let h = hue.rem_euclid(360.0);
        let c = value * saturation;
        let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
        let m = value - c;

        let (r, g, b) = match h {
            h if h < 60.0 => (c, x, 0.0),
            h if h < 120.0 => (x, c, 0.0),
            h if h < 180.0 => (0.0, c, x),
            h if h < 240.0 => (0.0, x, c),
            h if h < 300.0 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };

        Self {
            r: ((r + m) * 255.0).round() as u8,
            g: ((g + m) * 255.0).round() as u8,
            b: ((b + m) * 255.0).round() as u8,
            a: 255,
        }
    }

    /// Source-over blend of `src` onto `self`, with `tint` applied to the
    /// source first. Works in normalized space and converts back once.
    pub fn alpha_blend(self, src: Color, tint: Color) -> Color {
        let tint = tint.normalize();
        let src = src.normalize();
        let dst = self.normalize();

        let tinted = Vector4::new(src.x * tint.x, src.y * tint.y, src.z * tint.z, src.w * tint.w);

        let out_a = tinted.w + dst.w * (1.0 - tinted.w);
        if out_a <= 0.0 {
            return Color::BLANK;
        }
        let blend = |s: f32, d: f32| (s * tinted.w + d * dst.w * (1.0 - tinted.w)) / out_a;
        Color::from_normalized(Vector4::new(
            blend(tinted.x, dst.x),
            blend(tinted.y, dst.y),
            blend(tinted.z, dst.z),
            out_a,
        ))
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}
