//! Shape and textured-quad drawing.
//!
//! Everything here emits through the batch API only: no direct backend
//! access, so shapes, sprites and nine-patches all merge into the same
//! draw-call stream.

use crate::batch::DrawMode;
use crate::context::RenderContext;
use crate::math::{Color, Rect, Vector2};
use crate::texture::Texture;

/// Segments used for a full circle; sectors scale proportionally.
const CIRCLE_SEGMENTS: i32 = 36;

/// Stretchable-region description for [`RenderContext::draw_texture_npatch`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NPatchInfo {
    /// Region of the texture the patch grid applies to.
    pub source: Rect,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub layout: NPatchLayout,
}

/// How an n-patch splits its source region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NPatchLayout {
    /// 3×3 grid: corners fixed, edges stretch on one axis, center on both.
    NinePatch,
    /// 1×3 vertical strip: top/bottom fixed, middle stretches vertically.
    ThreePatchVertical,
    /// 3×1 horizontal strip: left/right fixed, middle stretches.
    ThreePatchHorizontal,
}

/// Corner positions of a rotated rectangle, in top-left, top-right,
/// bottom-right, bottom-left order.
fn rotated_corners(rect: Rect, origin: Vector2<f32>, rotation_deg: f32) -> [(f32, f32); 4] {
    if rotation_deg == 0.0 {
        let x = rect.x - origin.x;
        let y = rect.y - origin.y;
        return [
            (x, y),
            (x + rect.width, y),
            (x + rect.width, y + rect.height),
            (x, y + rect.height),
        ];
    }

    let sin = rotation_deg.to_radians().sin();
    let cos = rotation_deg.to_radians().cos();
    let dx = -origin.x;
    let dy = -origin.y;
    let corner = |cx: f32, cy: f32| {
        (
            rect.x + cx * cos - cy * sin,
            rect.y + cx * sin + cy * cos,
        )
    };
    [
        corner(dx, dy),
        corner(dx + rect.width, dy),
        corner(dx + rect.width, dy + rect.height),
        corner(dx, dy + rect.height),
    ]
}

impl RenderContext {
    /// Points the batch at the plain white texture before a shape scope,
    /// closing any textured call still open.
    fn begin_shape(&mut self, mode: DrawMode) {
        let white = self.default_texture().id;
        self.enable_texture(white);
        self.begin(mode);
    }

    // =========================================================================
    // Primitives
    // =========================================================================

    /// Draws a single pixel.
    pub fn draw_pixel(&mut self, x: f32, y: f32, color: Color) {
        self.check_buffer_limit(2);
        self.begin_shape(DrawMode::Lines);
        self.color(color);
        self.vertex2f(x, y);
        self.color(color);
        self.vertex2f(x + 1.0, y + 1.0);
        self.end();
    }

    /// Draws a one-pixel line.
    pub fn draw_line(&mut self, start_x: f32, start_y: f32, end_x: f32, end_y: f32, color: Color) {
        self.check_buffer_limit(2);
        self.begin_shape(DrawMode::Lines);
        self.color(color);
        self.vertex2f(start_x, start_y);
        self.color(color);
        self.vertex2f(end_x, end_y);
        self.end();
    }

    /// Draws a line with `thickness`, as a quad oriented along the line.
    pub fn draw_line_ex(
        &mut self,
        start: Vector2<f32>,
        end: Vector2<f32>,
        thickness: f32,
        color: Color,
    ) {
        let delta = Vector2::new(end.x - start.x, end.y - start.y);
        let length = (delta.x * delta.x + delta.y * delta.y).sqrt();
        if length <= 0.0 || thickness <= 0.0 {
            return;
        }
        let scale = thickness / (2.0 * length);
        let radius = Vector2::new(-scale * delta.y, scale * delta.x);

        self.check_buffer_limit(4);
        self.begin_shape(DrawMode::Quads);
        for (px, py) in [
            (start.x - radius.x, start.y - radius.y),
            (start.x + radius.x, start.y + radius.y),
            (end.x + radius.x, end.y + radius.y),
            (end.x - radius.x, end.y - radius.y),
        ] {
            self.color(color);
            self.texcoord2f(0.0, 0.0);
            self.vertex2f(px, py);
        }
        self.end();
    }

    /// Draws an axis-aligned filled rectangle.
    pub fn draw_rectangle(&mut self, rect: Rect, color: Color) {
        self.draw_rectangle_pro(rect, Vector2::new(0.0, 0.0), 0.0, color);
    }

    /// Draws a filled rectangle with origin offset and rotation.
    pub fn draw_rectangle_pro(
        &mut self,
        rect: Rect,
        origin: Vector2<f32>,
        rotation_deg: f32,
        color: Color,
    ) {
        let corners = rotated_corners(rect, origin, rotation_deg);
        let uvs = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];

        self.check_buffer_limit(4);
        self.begin_shape(DrawMode::Quads);
        for ((x, y), (u, v)) in corners.into_iter().zip(uvs) {
            self.color(color);
            self.texcoord2f(u, v);
            self.vertex2f(x, y);
        }
        self.end();
    }

    /// Vertical gradient fill from `top` to `bottom`.
    pub fn draw_rectangle_gradient_v(&mut self, rect: Rect, top: Color, bottom: Color) {
        self.draw_rectangle_gradient(rect, top, top, bottom, bottom);
    }

    /// Horizontal gradient fill from `left` to `right`.
    pub fn draw_rectangle_gradient_h(&mut self, rect: Rect, left: Color, right: Color) {
        self.draw_rectangle_gradient(rect, left, right, right, left);
    }

    /// Per-corner colored rectangle; corners in top-left, top-right,
    /// bottom-right, bottom-left order.
    pub fn draw_rectangle_gradient(
        &mut self,
        rect: Rect,
        c1: Color,
        c2: Color,
        c3: Color,
        c4: Color,
    ) {
        self.check_buffer_limit(4);
        self.begin_shape(DrawMode::Quads);
        let corners = [
            (rect.x, rect.y, c1),
            (rect.x + rect.width, rect.y, c2),
            (rect.x + rect.width, rect.y + rect.height, c3),
            (rect.x, rect.y + rect.height, c4),
        ];
        let uvs = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        for ((x, y, c), (u, v)) in corners.into_iter().zip(uvs) {
            self.color(c);
            self.texcoord2f(u, v);
            self.vertex2f(x, y);
        }
        self.end();
    }

    /// Rectangle outline, one pixel wide.
    pub fn draw_rectangle_lines(&mut self, rect: Rect, color: Color) {
        let (x, y, w, h) = (rect.x, rect.y, rect.width, rect.height);
        self.check_buffer_limit(8);
        self.begin_shape(DrawMode::Lines);
        for (sx, sy, ex, ey) in [
            (x, y, x + w, y),
            (x + w, y, x + w, y + h),
            (x + w, y + h, x, y + h),
            (x, y + h, x, y),
        ] {
            self.color(color);
            self.vertex2f(sx, sy);
            self.color(color);
            self.vertex2f(ex, ey);
        }
        self.end();
    }

    /// Filled triangle; vertices in counter-clockwise order.
    pub fn draw_triangle(
        &mut self,
        v1: Vector2<f32>,
        v2: Vector2<f32>,
        v3: Vector2<f32>,
        color: Color,
    ) {
        self.check_buffer_limit(3);
        self.begin_shape(DrawMode::Triangles);
        for v in [v1, v2, v3] {
            self.color(color);
            self.vertex2f(v.x, v.y);
        }
        self.end();
    }

    /// Filled circle.
    pub fn draw_circle(&mut self, center_x: f32, center_y: f32, radius: f32, color: Color) {
        self.draw_circle_sector(
            Vector2::new(center_x, center_y),
            radius,
            0.0,
            360.0,
            CIRCLE_SEGMENTS,
            color,
        );
    }

    /// Filled circle sector between two angles in degrees.
    pub fn draw_circle_sector(
        &mut self,
        center: Vector2<f32>,
        radius: f32,
        start_angle: f32,
        end_angle: f32,
        segments: i32,
        color: Color,
    ) {
        let segments = segments.max(4);
        let (start, end) = if start_angle > end_angle {
            (end_angle, start_angle)
        } else {
            (start_angle, end_angle)
        };
        let step = (end - start) / segments as f32;

        self.check_buffer_limit(segments as usize * 3);
        self.begin_shape(DrawMode::Triangles);
        let mut angle = start;
        for _ in 0..segments {
            self.color(color);
            self.vertex2f(center.x, center.y);
            self.color(color);
            self.vertex2f(
                center.x + angle.to_radians().cos() * radius,
                center.y + angle.to_radians().sin() * radius,
            );
            self.color(color);
            self.vertex2f(
                center.x + (angle + step).to_radians().cos() * radius,
                center.y + (angle + step).to_radians().sin() * radius,
            );
            angle += step;
        }
        self.end();
    }

    /// Filled ring (annulus sector).
    pub fn draw_ring(
        &mut self,
        center: Vector2<f32>,
        inner_radius: f32,
        outer_radius: f32,
        start_angle: f32,
        end_angle: f32,
        segments: i32,
        color: Color,
    ) {
        let segments = segments.max(4);
        let (inner, outer) = if inner_radius > outer_radius {
            (outer_radius, inner_radius)
        } else {
            (inner_radius, outer_radius)
        };
        let step = (end_angle - start_angle) / segments as f32;

        self.check_buffer_limit(segments as usize * 4);
        self.begin_shape(DrawMode::Quads);
        let mut angle = start_angle;
        for _ in 0..segments {
            let (s, c) = angle.to_radians().sin_cos();
            let (s2, c2) = (angle + step).to_radians().sin_cos();
            for (px, py) in [
                (center.x + c * inner, center.y + s * inner),
                (center.x + c * outer, center.y + s * outer),
                (center.x + c2 * outer, center.y + s2 * outer),
                (center.x + c2 * inner, center.y + s2 * inner),
            ] {
                self.color(color);
                self.texcoord2f(0.0, 0.0);
                self.vertex2f(px, py);
            }
            angle += step;
        }
        self.end();
    }

    // =========================================================================
    // Textured quads
    // =========================================================================

    /// Draws a whole texture at a position.
    pub fn draw_texture(&mut self, texture: Texture, x: f32, y: f32, tint: Color) {
        let source = Rect::new(0.0, 0.0, texture.width as f32, texture.height as f32);
        let dest = Rect::new(x, y, texture.width as f32, texture.height as f32);
        self.draw_texture_region(texture, source, dest, Vector2::new(0.0, 0.0), 0.0, tint);
    }

    /// Draws `source` of a texture into `dest`, with origin offset,
    /// rotation and tint. Negative source width/height flip the image on
    /// that axis.
    pub fn draw_texture_region(
        &mut self,
        texture: Texture,
        source: Rect,
        dest: Rect,
        origin: Vector2<f32>,
        rotation_deg: f32,
        tint: Color,
    ) {
        if texture.id == 0 {
            return;
        }
        let (tw, th) = (texture.width as f32, texture.height as f32);

        let flip_x = source.width < 0.0;
        let flip_y = source.height < 0.0;
        let src = Rect::new(
            if flip_x { source.x + source.width } else { source.x },
            if flip_y { source.y + source.height } else { source.y },
            source.width.abs(),
            source.height.abs(),
        );

        let (mut u0, mut u1) = (src.x / tw, (src.x + src.width) / tw);
        let (mut v0, mut v1) = (src.y / th, (src.y + src.height) / th);
        if flip_x {
            std::mem::swap(&mut u0, &mut u1);
        }
        if flip_y {
            std::mem::swap(&mut v0, &mut v1);
        }

        let corners = rotated_corners(dest, origin, rotation_deg);
        let uvs = [(u0, v0), (u1, v0), (u1, v1), (u0, v1)];

        self.check_buffer_limit(4);
        self.enable_texture(texture.id);
        self.begin(DrawMode::Quads);
        for ((x, y), (u, v)) in corners.into_iter().zip(uvs) {
            self.color(tint);
            self.texcoord2f(u, v);
            self.vertex2f(x, y);
        }
        self.end();
        self.disable_texture();
    }

    /// Draws a texture with n-patch stretching: border cells keep their
    /// size, middle cells stretch to fill `dest`.
    pub fn draw_texture_npatch(
        &mut self,
        texture: Texture,
        info: NPatchInfo,
        dest: Rect,
        origin: Vector2<f32>,
        rotation_deg: f32,
        tint: Color,
    ) {
        if texture.id == 0 {
            return;
        }

        let (left, top) = (info.left as f32, info.top as f32);
        let (right, bottom) = (info.right as f32, info.bottom as f32);

        // Split points along each axis of the source and destination.
        let (src_xs, dst_xs): (Vec<f32>, Vec<f32>) = match info.layout {
            NPatchLayout::ThreePatchVertical => (
                vec![info.source.x, info.source.x + info.source.width],
                vec![dest.x, dest.x + dest.width],
            ),
            _ => (
                vec![
                    info.source.x,
                    info.source.x + left,
                    info.source.x + info.source.width - right,
                    info.source.x + info.source.width,
                ],
                vec![
                    dest.x,
                    dest.x + left.min(dest.width / 2.0),
                    dest.x + dest.width - right.min(dest.width / 2.0),
                    dest.x + dest.width,
                ],
            ),
        };
        let (src_ys, dst_ys): (Vec<f32>, Vec<f32>) = match info.layout {
            NPatchLayout::ThreePatchHorizontal => (
                vec![info.source.y, info.source.y + info.source.height],
                vec![dest.y, dest.y + dest.height],
            ),
            _ => (
                vec![
                    info.source.y,
                    info.source.y + top,
                    info.source.y + info.source.height - bottom,
                    info.source.y + info.source.height,
                ],
                vec![
                    dest.y,
                    dest.y + top.min(dest.height / 2.0),
                    dest.y + dest.height - bottom.min(dest.height / 2.0),
                    dest.y + dest.height,
                ],
            ),
        };

        let cells = (src_xs.len() - 1) * (src_ys.len() - 1);
        self.check_buffer_limit(cells * 4);
        self.enable_texture(texture.id);
        self.begin(DrawMode::Quads);
        let (tw, th) = (texture.width as f32, texture.height as f32);
        for row in 0..src_ys.len() - 1 {
            for col in 0..src_xs.len() - 1 {
                let cell = Rect::new(
                    dst_xs[col],
                    dst_ys[row],
                    dst_xs[col + 1] - dst_xs[col],
                    dst_ys[row + 1] - dst_ys[row],
                );
                if cell.width <= 0.0 || cell.height <= 0.0 {
                    continue;
                }
                let corners = rotated_corners(cell, origin, rotation_deg);
                let uvs = [
                    (src_xs[col] / tw, src_ys[row] / th),
                    (src_xs[col + 1] / tw, src_ys[row] / th),
                    (src_xs[col + 1] / tw, src_ys[row + 1] / th),
                    (src_xs[col] / tw, src_ys[row + 1] / th),
                ];
                for ((x, y), (u, v)) in corners.into_iter().zip(uvs) {
                    self.color(tint);
                    self.texcoord2f(u, v);
                    self.vertex2f(x, y);
                }
            }
        }
        self.end();
        self.disable_texture();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::DrawMode;
    use crate::camera::{Camera3D, CameraProjection};
    use crate::math::Vector3;
    use crate::test_support::test_context;

    #[test]
    fn test_solid_quad_scene() {
        let (mut ctx, _) = test_context();
        let camera = Camera3D {
            position: Vector3::new(0.0, 0.0, 1.0),
            target: Vector3::new(0.0, 0.0, 0.0),
            up: Vector3::new(0.0, 1.0, 0.0),
            fovy: 2.0,
            projection: CameraProjection::Orthographic,
        };
        ctx.begin_3d(&camera);
        ctx.draw_rectangle(Rect::new(-0.5, -0.5, 1.0, 1.0), Color::RED);

        let draws = ctx.pending_draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].mode, DrawMode::Quads);
        assert_eq!(draws[0].vertex_count, 4);
        assert_eq!(draws[0].texture_id, ctx.default_texture().id);

        let buffer = &ctx.memory.buffers[ctx.current_buffer];
        let depth = buffer.vertices[2];
        let expected = [
            (-0.5, -0.5),
            (0.5, -0.5),
            (0.5, 0.5),
            (-0.5, 0.5),
        ];
        for (i, (x, y)) in expected.iter().enumerate() {
            assert_eq!(buffer.vertices[i * 3], *x);
            assert_eq!(buffer.vertices[i * 3 + 1], *y);
            assert_eq!(buffer.vertices[i * 3 + 2], depth);
        }
        for i in 0..4 {
            assert_eq!(
                &buffer.colors[i * 4..i * 4 + 4],
                &[230, 41, 55, 255],
                "vertex {i} color"
            );
        }
        ctx.end_3d();
    }

    #[test]
    fn test_batch_merging_across_rectangles() {
        let (mut ctx, _) = test_context();
        ctx.draw_rectangle(Rect::new(0.0, 0.0, 10.0, 10.0), Color::RED);
        ctx.draw_rectangle(Rect::new(20.0, 0.0, 10.0, 10.0), Color::BLUE);
        {
            let draws = ctx.pending_draws();
            assert_eq!(draws.len(), 1);
            assert_eq!(draws[0].vertex_count, 8);
        }

        // A different texture splits the batch; quads need no padding.
        let tex = ctx.load_texture(&[255u8; 4], 1, 1, crate::pixels::PixelFormat::R8G8B8A8, 1);
        ctx.draw_texture(tex, 0.0, 0.0, Color::WHITE);
        let draws = ctx.pending_draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].vertex_count, 8);
        assert_eq!(draws[0].vertex_alignment, 0);
        assert_eq!(draws[1].vertex_count, 4);
        assert_eq!(draws[1].texture_id, tex.id);
    }

    #[test]
    fn test_rotated_corners_no_rotation() {
        let corners = rotated_corners(
            Rect::new(10.0, 20.0, 4.0, 2.0),
            Vector2::new(1.0, 1.0),
            0.0,
        );
        assert_eq!(corners[0], (9.0, 19.0));
        assert_eq!(corners[2], (13.0, 21.0));
    }

    #[test]
    fn test_rotated_corners_quarter_turn() {
        let corners = rotated_corners(
            Rect::new(0.0, 0.0, 2.0, 1.0),
            Vector2::new(0.0, 0.0),
            90.0,
        );
        // Top-right corner (2,0) maps to (0,2).
        assert!((corners[1].0).abs() < 1e-5);
        assert!((corners[1].1 - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_lines_and_triangles_modes() {
        let (mut ctx, _) = test_context();
        ctx.draw_line(0.0, 0.0, 5.0, 5.0, Color::BLACK);
        assert_eq!(ctx.pending_draws()[0].mode, DrawMode::Lines);
        ctx.draw_triangle(
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
            Color::BLACK,
        );
        let draws = ctx.pending_draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[1].mode, DrawMode::Triangles);
        assert_eq!(draws[1].vertex_count, 3);
    }

    #[test]
    fn test_circle_sector_vertex_count() {
        let (mut ctx, _) = test_context();
        ctx.draw_circle_sector(Vector2::new(0.0, 0.0), 5.0, 0.0, 90.0, 8, Color::RED);
        assert_eq!(ctx.pending_draws()[0].vertex_count, 8 * 3);
    }

    #[test]
    fn test_texture_region_flips_uv_on_negative_source() {
        let (mut ctx, _) = test_context();
        let tex = ctx.load_texture(&[0u8; 16], 2, 2, crate::pixels::PixelFormat::R8G8B8A8, 1);
        ctx.draw_texture_region(
            tex,
            Rect::new(0.0, 0.0, -2.0, 2.0),
            Rect::new(0.0, 0.0, 2.0, 2.0),
            Vector2::new(0.0, 0.0),
            0.0,
            Color::WHITE,
        );
        let buffer = &ctx.memory.buffers[ctx.current_buffer];
        // First vertex carries the flipped (right-edge) U coordinate.
        assert_eq!(buffer.texcoords[0], 1.0);
        assert_eq!(buffer.texcoords[2], 0.0);
    }

    #[test]
    fn test_npatch_nine_cells() {
        let (mut ctx, _) = test_context();
        let tex = ctx.load_texture(
            &vec![0u8; 24 * 24 * 4],
            24,
            24,
            crate::pixels::PixelFormat::R8G8B8A8,
            1,
        );
        let info = NPatchInfo {
            source: Rect::new(0.0, 0.0, 24.0, 24.0),
            left: 8,
            top: 8,
            right: 8,
            bottom: 8,
            layout: NPatchLayout::NinePatch,
        };
        ctx.draw_texture_npatch(
            tex,
            info,
            Rect::new(0.0, 0.0, 100.0, 60.0),
            Vector2::new(0.0, 0.0),
            0.0,
            Color::WHITE,
        );
        // Nine cells, four vertices each.
        let total: i32 = ctx.pending_draws().iter().map(|d| d.vertex_count).sum();
        assert_eq!(total, 36);
    }

    #[test]
    fn test_draw_pixel_uses_lines() {
        let (mut ctx, _) = test_context();
        ctx.draw_pixel(3.0, 4.0, Color::GOLD);
        let draws = ctx.pending_draws();
        assert_eq!(draws[0].mode, DrawMode::Lines);
        assert_eq!(draws[0].vertex_count, 2);
    }
}
