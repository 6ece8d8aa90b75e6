//! Immediate-mode batched vertex emission.
//!
//! Callers stream vertices between [`RenderContext::begin`] and
//! [`RenderContext::end`]; the context accumulates them in CPU-side vertex
//! buffers and groups consecutive emissions into draw calls that merge as
//! long as mode and texture match. [`RenderContext::draw_batch`] uploads
//! the dirty ranges and submits the whole call list in order.
//!
//! Quads have no native GL mode, so they are emulated: four vertices per
//! quad, six indices per quad pre-filled with the `0,1,2, 0,2,3` pattern,
//! submitted with `DrawElements`. Closing a LINES or TRIANGLES run pads its
//! vertex count to a multiple of four so the index math for any following
//! QUADS run stays aligned.

use crate::context::RenderContext;
use crate::math::{Color, Matrix4};
use crate::matrix_stack::MatrixMode;
use crate::texture::RenderTexture;
use crate::camera::{Camera2D, Camera3D};
use crate::shader::{Shader, ShaderLoc};
use cgmath::Vector4;

// =============================================================================
// Limits
// =============================================================================

/// Quad capacity of one vertex buffer (4 vertices / 6 indices each).
pub const MAX_BATCH_ELEMENTS: usize = 8192;
/// Draw-call array capacity; reaching it forces a flush.
pub const MAX_DRAW_CALLS: usize = 256;
/// Default number of multi-buffered vertex buffers.
pub const DEFAULT_BATCH_BUFFERS: usize = 1;

/// Depth assigned to the first 2D emission of a batch.
pub(crate) const DEPTH_START: f32 = -1.0;
/// Depth step between successive `begin`/`end` pairs, so later draws win
/// under orthographic projection without relying on submission order alone.
pub(crate) const DEPTH_DELTA: f32 = 1.0 / 20_000.0;

// =============================================================================
// Draw modes
// =============================================================================

/// Primitive mode of a vertex emission scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Lines,
    Triangles,
    Quads,
}

impl DrawMode {
    /// GL mode for `DrawArrays` submission (quads never use this path).
    pub(crate) fn gl_mode(self) -> u32 {
        match self {
            DrawMode::Lines => gl::LINES,
            DrawMode::Triangles | DrawMode::Quads => gl::TRIANGLES,
        }
    }
}

/// Framebuffer blend equation presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Source-over alpha blending (the default).
    Alpha,
    /// Additive blending.
    Additive,
    /// Multiplicative blending.
    Multiplied,
}

impl BlendMode {
    pub(crate) fn factors(self) -> (u32, u32) {
        match self {
            BlendMode::Alpha => (gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA),
            BlendMode::Additive => (gl::SRC_ALPHA, gl::ONE),
            BlendMode::Multiplied => (gl::DST_COLOR, gl::ONE_MINUS_SRC_ALPHA),
        }
    }
}

// =============================================================================
// Batch storage
// =============================================================================

/// One draw call: a contiguous vertex run sharing mode and texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub mode: DrawMode,
    pub vertex_count: i32,
    /// Padding vertices appended when the call was closed, so QUAD index
    /// ranges after it stay aligned to four vertices.
    pub vertex_alignment: i32,
    pub texture_id: u32,
}

impl DrawCall {
    pub(crate) fn new(mode: DrawMode, texture_id: u32) -> DrawCall {
        DrawCall {
            mode,
            vertex_count: 0,
            vertex_alignment: 0,
            texture_id,
        }
    }
}

/// One multi-buffer slot: four parallel CPU streams and their GPU objects.
#[derive(Debug)]
pub struct VertexBuffer {
    /// Capacity in quads; each holds `elements * 4` vertices.
    pub(crate) elements: usize,
    pub(crate) v_counter: usize,
    pub(crate) tc_counter: usize,
    pub(crate) c_counter: usize,
    /// XYZ positions, 3 floats per vertex.
    pub(crate) vertices: Vec<f32>,
    /// UV coordinates, 2 floats per vertex.
    pub(crate) texcoords: Vec<f32>,
    /// RGBA colors, 4 bytes per vertex.
    pub(crate) colors: Vec<u8>,
    /// Quad indices, 6 per quad, two triangles each.
    pub(crate) indices: Vec<u32>,
    pub(crate) vao: u32,
    pub(crate) vbo: [u32; 4],
}

impl VertexBuffer {
    fn new(elements: usize) -> VertexBuffer {
        let mut indices = Vec::with_capacity(elements * 6);
        for quad in 0..elements as u32 {
            let base = quad * 4;
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        VertexBuffer {
            elements,
            v_counter: 0,
            tc_counter: 0,
            c_counter: 0,
            vertices: vec![0.0; elements * 4 * 3],
            texcoords: vec![0.0; elements * 4 * 2],
            colors: vec![0; elements * 4 * 4],
            indices,
            vao: 0,
            vbo: [0; 4],
        }
    }

    pub(crate) fn reset_counters(&mut self) {
        self.v_counter = 0;
        self.tc_counter = 0;
        self.c_counter = 0;
    }

    /// Vertex capacity of this buffer.
    pub(crate) fn capacity(&self) -> usize {
        self.elements * 4
    }
}

/// Preallocated batch storage. Constructed by the caller and handed to
/// [`RenderContext::new`]; the context boxes keep every array at a stable
/// address and never reallocate them. Returned intact from
/// [`RenderContext::close`].
#[derive(Debug)]
pub struct BatchMemory {
    pub(crate) buffers: Vec<VertexBuffer>,
    pub(crate) draws: Vec<DrawCall>,
}

impl BatchMemory {
    /// Default configuration: one buffer of [`MAX_BATCH_ELEMENTS`] quads.
    pub fn new() -> Box<BatchMemory> {
        BatchMemory::with_config(DEFAULT_BATCH_BUFFERS, MAX_BATCH_ELEMENTS)
    }

    /// Custom multi-buffer count and per-buffer quad capacity.
    pub fn with_config(buffer_count: usize, elements: usize) -> Box<BatchMemory> {
        let buffer_count = buffer_count.max(1);
        let elements = elements.max(1);
        Box::new(BatchMemory {
            buffers: (0..buffer_count).map(|_| VertexBuffer::new(elements)).collect(),
            draws: Vec::with_capacity(MAX_DRAW_CALLS),
        })
    }

    /// Number of multi-buffer slots.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }
}

/// Padding needed to close a call of `mode` at `count` vertices.
fn alignment_for(mode: DrawMode, count: i32) -> i32 {
    if count <= 0 || mode == DrawMode::Quads {
        return 0;
    }
    if count < 4 {
        4 - count
    } else {
        (4 - count % 4) % 4
    }
}

// =============================================================================
// Vertex emission
// =============================================================================

impl RenderContext {
    /// Texture bound to freshly opened draw calls.
    fn draw_texture_id(&self) -> u32 {
        if self.active_texture_id != 0 {
            self.active_texture_id
        } else {
            self.default_texture.id
        }
    }

    /// Closes the current draw call, padding LINES/TRIANGLES runs so the
    /// vertex offset stays quad-aligned. The parallel counters advance in
    /// lock-step; the padded slots keep their previous contents because the
    /// draw submission skips them.
    fn close_current_draw(&mut self) {
        let (alignment, has_vertices) = {
            let draw = self.memory.draws.last().expect("draw list never empty");
            (alignment_for(draw.mode, draw.vertex_count), draw.vertex_count > 0)
        };
        if !has_vertices {
            return;
        }
        self.memory.draws.last_mut().unwrap().vertex_alignment = alignment;
        let buffer = &mut self.memory.buffers[self.current_buffer];
        buffer.v_counter += alignment as usize;
        buffer.tc_counter += alignment as usize;
        buffer.c_counter += alignment as usize;
    }

    /// Re-targets the tail draw call (after a close or a flush) to `mode`.
    fn open_draw(&mut self, mode: DrawMode) {
        let texture_id = self.draw_texture_id();
        let tail = self.memory.draws.last_mut().unwrap();
        if tail.vertex_count > 0 {
            self.memory.draws.push(DrawCall::new(mode, texture_id));
        } else {
            tail.mode = mode;
            tail.texture_id = texture_id;
        }
    }

    /// Starts an emission scope. Switching modes closes the current call;
    /// a full draw-call array forces a flush first.
    pub fn begin(&mut self, mode: DrawMode) {
        if self.memory.draws.last().unwrap().mode == mode {
            return;
        }
        self.close_current_draw();
        let buffer = &self.memory.buffers[self.current_buffer];
        if buffer.v_counter + 4 > buffer.capacity() || self.memory.draws.len() >= MAX_DRAW_CALLS {
            self.draw_batch();
        }
        self.open_draw(mode);
    }

    /// Ends an emission scope: equalizes the parallel counters (the last
    /// color is replicated forward, missing texcoords pad with zero),
    /// advances the monotonic depth, and flushes when the buffer is full.
    pub fn end(&mut self) {
        {
            let buffer = &mut self.memory.buffers[self.current_buffer];

            if buffer.c_counter < buffer.v_counter {
                let last: [u8; 4] = if buffer.c_counter == 0 {
                    [255, 255, 255, 255]
                } else {
                    let at = (buffer.c_counter - 1) * 4;
                    [
                        buffer.colors[at],
                        buffer.colors[at + 1],
                        buffer.colors[at + 2],
                        buffer.colors[at + 3],
                    ]
                };
                for i in buffer.c_counter..buffer.v_counter {
                    buffer.colors[i * 4..i * 4 + 4].copy_from_slice(&last);
                }
                buffer.c_counter = buffer.v_counter;
            }

            if buffer.tc_counter < buffer.v_counter {
                for i in buffer.tc_counter..buffer.v_counter {
                    buffer.texcoords[i * 2] = 0.0;
                    buffer.texcoords[i * 2 + 1] = 0.0;
                }
                buffer.tc_counter = buffer.v_counter;
            }
        }

        self.current_depth -= DEPTH_DELTA;

        let buffer = &self.memory.buffers[self.current_buffer];
        if buffer.v_counter >= buffer.capacity() {
            self.draw_batch();
        }
    }

    /// Appends a vertex. Inside a matrix push scope the point is
    /// pre-multiplied by the scratch transform.
    pub fn vertex3f(&mut self, x: f32, y: f32, z: f32) {
        let (x, y, z) = if self.stack.use_transform() {
            let v = self.stack.transform() * Vector4::new(x, y, z, 1.0);
            (v.x, v.y, v.z)
        } else {
            (x, y, z)
        };

        let buffer = &mut self.memory.buffers[self.current_buffer];
        assert!(
            buffer.v_counter < buffer.capacity(),
            "vertex buffer overflow: {} vertices", buffer.capacity()
        );
        let at = buffer.v_counter * 3;
        buffer.vertices[at] = x;
        buffer.vertices[at + 1] = y;
        buffer.vertices[at + 2] = z;
        buffer.v_counter += 1;

        self.memory.draws.last_mut().unwrap().vertex_count += 1;
    }

    /// 2D vertex at the current monotonic depth.
    pub fn vertex2f(&mut self, x: f32, y: f32) {
        let z = self.current_depth;
        self.vertex3f(x, y, z);
    }

    /// Integer 2D vertex at the current monotonic depth.
    pub fn vertex2i(&mut self, x: i32, y: i32) {
        self.vertex2f(x as f32, y as f32);
    }

    /// Appends a texture coordinate for the next vertex.
    pub fn texcoord2f(&mut self, u: f32, v: f32) {
        let buffer = &mut self.memory.buffers[self.current_buffer];
        if buffer.tc_counter >= buffer.capacity() {
            return;
        }
        buffer.texcoords[buffer.tc_counter * 2] = u;
        buffer.texcoords[buffer.tc_counter * 2 + 1] = v;
        buffer.tc_counter += 1;
    }

    /// Appends a vertex color.
    pub fn color4ub(&mut self, r: u8, g: u8, b: u8, a: u8) {
        let buffer = &mut self.memory.buffers[self.current_buffer];
        if buffer.c_counter >= buffer.capacity() {
            return;
        }
        let at = buffer.c_counter * 4;
        buffer.colors[at] = r;
        buffer.colors[at + 1] = g;
        buffer.colors[at + 2] = b;
        buffer.colors[at + 3] = a;
        buffer.c_counter += 1;
    }

    pub fn color(&mut self, color: Color) {
        self.color4ub(color.r, color.g, color.b, color.a);
    }

    pub fn color4f(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.color4ub(
            (r.clamp(0.0, 1.0) * 255.0) as u8,
            (g.clamp(0.0, 1.0) * 255.0) as u8,
            (b.clamp(0.0, 1.0) * 255.0) as u8,
            (a.clamp(0.0, 1.0) * 255.0) as u8,
        );
    }

    /// Accepted for forward compatibility; the default pipeline carries no
    /// normal stream.
    pub fn normal3f(&mut self, _x: f32, _y: f32, _z: f32) {}

    /// Binds `id` for subsequent emissions. A texture switch closes the
    /// current call; when the buffer is close to exhaustion it flushes
    /// instead. Passing 0 releases the binding without closing the call,
    /// so back-to-back draws of the same texture keep merging.
    pub fn enable_texture(&mut self, id: u32) {
        if id == 0 {
            self.active_texture_id = 0;
            let buffer = &self.memory.buffers[self.current_buffer];
            if buffer.v_counter + 4 > buffer.capacity() {
                self.draw_batch();
            }
            return;
        }

        self.active_texture_id = id;
        if self.memory.draws.last().unwrap().texture_id == id {
            return;
        }
        self.close_current_draw();

        let buffer = &self.memory.buffers[self.current_buffer];
        if buffer.v_counter + 4 > buffer.capacity() {
            self.draw_batch();
        } else if self.memory.draws.len() >= MAX_DRAW_CALLS {
            self.draw_batch();
        }

        let mode = self.memory.draws.last().unwrap().mode;
        self.open_draw(mode);
    }

    /// Releases the texture binding.
    pub fn disable_texture(&mut self) {
        self.enable_texture(0);
    }

    /// Flushes when fewer than `required` vertices fit in the buffer.
    /// Returns whether a flush happened.
    pub(crate) fn check_buffer_limit(&mut self, required: usize) -> bool {
        let buffer = &self.memory.buffers[self.current_buffer];
        let overflow = buffer.v_counter + required >= buffer.capacity();
        if overflow {
            self.draw_batch();
        }
        overflow
    }

    // =========================================================================
    // Flush
    // =========================================================================

    /// Uploads the accumulated streams and submits every draw call in
    /// order, then resets the batch and rotates to the next buffer slot.
    pub fn draw_batch(&mut self) {
        let has_vertices = self.memory.buffers[self.current_buffer].v_counter > 0;

        if has_vertices {
            // Upload the dirty prefix of each parallel stream.
            let buffer = &self.memory.buffers[self.current_buffer];
            debug_assert_eq!(
                self.memory
                    .draws
                    .iter()
                    .map(|d| (d.vertex_count + d.vertex_alignment) as usize)
                    .sum::<usize>(),
                buffer.v_counter,
                "draw-call vertex accounting out of sync with the buffer"
            );

            if self.caps.vao {
                self.backend.bind_vertex_array(buffer.vao);
            }

            self.backend.bind_buffer(gl::ARRAY_BUFFER, buffer.vbo[0]);
            self.backend.buffer_sub_data(
                gl::ARRAY_BUFFER,
                0,
                bytemuck::cast_slice(&buffer.vertices[..buffer.v_counter * 3]),
            );
            self.backend.bind_buffer(gl::ARRAY_BUFFER, buffer.vbo[1]);
            self.backend.buffer_sub_data(
                gl::ARRAY_BUFFER,
                0,
                bytemuck::cast_slice(&buffer.texcoords[..buffer.tc_counter * 2]),
            );
            self.backend.bind_buffer(gl::ARRAY_BUFFER, buffer.vbo[2]);
            self.backend
                .buffer_sub_data(gl::ARRAY_BUFFER, 0, &buffer.colors[..buffer.c_counter * 4]);

            if !self.caps.vao {
                // No VAO: rebuild the attribute bindings every flush.
                use crate::shader::{ATTRIB_COLOR, ATTRIB_POSITION, ATTRIB_TEXCOORD};
                self.backend.bind_buffer(gl::ARRAY_BUFFER, buffer.vbo[0]);
                self.backend
                    .vertex_attrib_pointer(ATTRIB_POSITION, 3, gl::FLOAT, false, 0, 0);
                self.backend.enable_vertex_attrib_array(ATTRIB_POSITION);
                self.backend.bind_buffer(gl::ARRAY_BUFFER, buffer.vbo[1]);
                self.backend
                    .vertex_attrib_pointer(ATTRIB_TEXCOORD, 2, gl::FLOAT, false, 0, 0);
                self.backend.enable_vertex_attrib_array(ATTRIB_TEXCOORD);
                self.backend.bind_buffer(gl::ARRAY_BUFFER, buffer.vbo[2]);
                self.backend
                    .vertex_attrib_pointer(ATTRIB_COLOR, 4, gl::UNSIGNED_BYTE, true, 0, 0);
                self.backend.enable_vertex_attrib_array(ATTRIB_COLOR);
                self.backend
                    .bind_buffer(gl::ELEMENT_ARRAY_BUFFER, buffer.vbo[3]);
            }

            // Default-pipeline uniforms.
            let shader = self.current_shader;
            let mvp: Matrix4<f32> = self.stack.projection() * self.stack.modelview();
            self.backend.use_program(shader.id);
            let loc = shader.loc(ShaderLoc::MatrixMvp);
            if loc >= 0 {
                self.backend
                    .uniform_matrix4(loc, &crate::math::matrix_cells(&mvp));
            }
            let loc = shader.loc(ShaderLoc::ColorDiffuse);
            if loc >= 0 {
                self.backend.uniform_4f(loc, 1.0, 1.0, 1.0, 1.0);
            }
            let loc = shader.loc(ShaderLoc::MapAlbedo);
            if loc >= 0 {
                self.backend.uniform_1i(loc, 0);
            }
            self.backend.active_texture(0);

            let mut vertex_offset: i32 = 0;
            for draw in self.memory.draws.iter() {
                self.backend.bind_texture(gl::TEXTURE_2D, draw.texture_id);
                match draw.mode {
                    DrawMode::Lines | DrawMode::Triangles => {
                        self.backend
                            .draw_arrays(draw.mode.gl_mode(), vertex_offset, draw.vertex_count);
                    }
                    DrawMode::Quads => {
                        self.backend.draw_elements(
                            gl::TRIANGLES,
                            draw.vertex_count / 4 * 6,
                            (vertex_offset / 4 * 6) as usize,
                        );
                    }
                }
                vertex_offset += draw.vertex_count + draw.vertex_alignment;
            }

            self.backend.bind_texture(gl::TEXTURE_2D, 0);
            if self.caps.vao {
                self.backend.bind_vertex_array(0);
            }
            self.backend.use_program(0);
        }

        // Reset regardless of whether anything was submitted, and rotate to
        // the next multi-buffer slot so the GPU can keep reading this one.
        self.memory.buffers[self.current_buffer].reset_counters();
        self.current_depth = DEPTH_START;
        let default_id = self.default_texture.id;
        self.memory.draws.clear();
        self.memory.draws.push(DrawCall::new(DrawMode::Quads, default_id));
        self.current_buffer = (self.current_buffer + 1) % self.memory.buffers.len();
    }

    // =========================================================================
    // Scoped draws
    // =========================================================================

    /// Starts a frame: resets the modelview to screen space with the fit
    /// policy's scaling applied.
    pub fn begin_frame(&mut self) {
        let scaling = self.screen_scaling;
        self.stack.set_mode(MatrixMode::ModelView);
        self.stack.identity();
        self.stack.multiply(scaling);
    }

    /// Ends a frame by flushing whatever is still batched.
    pub fn end_frame(&mut self) {
        self.draw_batch();
    }

    /// Installs a 2D camera into the modelview. Flushes first.
    pub fn begin_2d(&mut self, camera: &Camera2D) {
        self.draw_batch();
        let scaling = self.screen_scaling;
        self.stack.set_mode(MatrixMode::ModelView);
        self.stack.identity();
        self.stack.multiply(camera.matrix());
        self.stack.multiply(scaling);
    }

    /// Restores the plain screen-space modelview. Flushes first.
    pub fn end_2d(&mut self) {
        self.draw_batch();
        let scaling = self.screen_scaling;
        self.stack.set_mode(MatrixMode::ModelView);
        self.stack.identity();
        self.stack.multiply(scaling);
    }

    /// Pushes the projection, installs the camera's projection and view
    /// and enables depth testing. Flushes first.
    pub fn begin_3d(&mut self, camera: &Camera3D) {
        self.draw_batch();

        let aspect = self.current.width as f32 / self.current.height as f32;
        self.stack.set_mode(MatrixMode::Projection);
        self.stack.push();
        self.stack.identity();
        self.stack.multiply(camera.projection_matrix(aspect));

        self.stack.set_mode(MatrixMode::ModelView);
        self.stack.identity();
        self.stack.multiply(camera.view_matrix());

        self.backend.enable(gl::DEPTH_TEST);
    }

    /// Restores the 2D state saved by [`Self::begin_3d`]. Flushes first.
    pub fn end_3d(&mut self) {
        self.draw_batch();

        self.stack.set_mode(MatrixMode::Projection);
        self.stack.pop();

        let scaling = self.screen_scaling;
        self.stack.set_mode(MatrixMode::ModelView);
        self.stack.identity();
        self.stack.multiply(scaling);

        self.backend.disable(gl::DEPTH_TEST);
    }

    /// Redirects rendering into `target`'s framebuffer with a matching
    /// orthographic projection. Flushes first.
    pub fn begin_render_to_texture(&mut self, target: &RenderTexture) {
        self.draw_batch();

        self.backend.bind_framebuffer(target.id);
        let (w, h) = (target.texture.width, target.texture.height);
        self.backend.viewport(0, 0, w, h);

        self.stack.set_mode(MatrixMode::Projection);
        self.stack.identity();
        self.stack.ortho(0.0, w as f64, h as f64, 0.0, 0.0, 1.0);
        self.stack.set_mode(MatrixMode::ModelView);
        self.stack.identity();

        self.current = crate::math::Size::new(w, h);
    }

    /// Returns to the default framebuffer and viewport. Flushes first.
    pub fn end_render_to_texture(&mut self) {
        self.draw_batch();
        self.backend.bind_framebuffer(0);
        self.current = self.render;
        self.setup_viewport();
    }

    /// Clips rendering to a screen-space rectangle (y-down coordinates).
    /// Flushes first.
    pub fn begin_scissor(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.draw_batch();
        self.backend.enable(gl::SCISSOR_TEST);
        let flipped_y = self.current.height - (y + height);
        self.backend.scissor(x, flipped_y, width, height);
    }

    pub fn end_scissor(&mut self) {
        self.draw_batch();
        self.backend.disable(gl::SCISSOR_TEST);
    }

    /// Routes subsequent batches through `shader`; the invalid sentinel
    /// falls back to the default. Flushes first.
    pub fn begin_shader(&mut self, shader: Shader) {
        self.draw_batch();
        self.current_shader = if shader.is_valid() {
            shader
        } else {
            self.default_shader
        };
    }

    pub fn end_shader(&mut self) {
        self.draw_batch();
        self.current_shader = self.default_shader;
    }

    /// Switches the blend equation. Flushes first.
    pub fn begin_blend(&mut self, mode: BlendMode) {
        if self.blend_mode == mode {
            return;
        }
        self.draw_batch();
        let (src, dst) = mode.factors();
        self.backend.blend_func(src, dst);
        self.blend_mode = mode;
    }

    pub fn end_blend(&mut self) {
        self.begin_blend(BlendMode::Alpha);
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// The in-flight draw calls (the tail call may still be open).
    pub fn pending_draws(&self) -> &[DrawCall] {
        &self.memory.draws
    }

    /// Vertices emitted into the current buffer since the last flush.
    pub fn pending_vertex_count(&self) -> usize {
        self.memory.buffers[self.current_buffer].v_counter
    }

    /// Monotonic depth the next 2D vertex would receive.
    pub fn current_depth(&self) -> f32 {
        self.current_depth
    }
}
