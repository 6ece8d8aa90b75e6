//! Render context: bootstrap, capability probing and viewport policy.
//!
//! The [`RenderContext`] owns everything the renderer needs: the backend
//! trait object, the probed capability flags, the batch memory, the matrix
//! stack and the default texture/shader/font. All public drawing operations
//! take `&mut RenderContext`; there is no global state.
//!
//! # Lifecycle
//!
//! ```rust,ignore
//! let backend = Box::new(OpenGlBackend::new(GlProfile::Gl33));
//! let memory = BatchMemory::new();
//! let mut ctx = RenderContext::new(backend, memory, 800, 600);
//! // ... frames ...
//! let _memory = ctx.close(); // GPU resources released, memory returned
//! ```

use crate::backend::GlBackend;
use crate::batch::{BatchMemory, BlendMode, DrawCall, DrawMode};
use crate::font::Font;
use crate::math::{Matrix4, Size};
use crate::matrix_stack::{MatrixMode, MatrixStack};
use crate::pixels::PixelFormat;
use crate::shader::{self, Shader};
use crate::texture::Texture;
use cgmath::SquareMatrix;

// =============================================================================
// Capabilities
// =============================================================================

/// Capability flags probed from the context at init.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuCapabilities {
    /// Vertex array objects (native or via extension).
    pub vao: bool,
    /// DDS/S3TC compression.
    pub tex_comp_dxt: bool,
    /// ETC1 compression.
    pub tex_comp_etc1: bool,
    /// ETC2/EAC compression.
    pub tex_comp_etc2: bool,
    /// PVR compression.
    pub tex_comp_pvrt: bool,
    /// ASTC compression.
    pub tex_comp_astc: bool,
    /// Full non-power-of-two texture support.
    pub tex_npot: bool,
    /// 32-bit float textures.
    pub tex_float: bool,
    /// Depth textures.
    pub tex_depth: bool,
    /// Maximum bits for a depth attachment.
    pub max_depth_bits: i32,
    /// Mirror-clamp wrap mode.
    pub tex_mirror_clamp: bool,
    /// Anisotropic filtering.
    pub tex_anisotropic: bool,
    /// Probed maximum anisotropy level (at least 2 when supported).
    pub max_anisotropy: f32,
    /// Debug marker annotations.
    pub debug_marker: bool,
}

/// `GL_MAX_TEXTURE_MAX_ANISOTROPY_EXT`
const GL_MAX_TEXTURE_MAX_ANISOTROPY: u32 = 0x84FF;

/// Classifies the extension token list into capability flags. Every token
/// is matched literally; the base flags come from the profile itself.
pub(crate) fn detect_capabilities(backend: &dyn GlBackend) -> GpuCapabilities {
    use crate::backend::GlProfile;

    let profile = backend.profile();
    let mut caps = GpuCapabilities {
        vao: backend.has_native_vao(),
        tex_comp_dxt: false,
        tex_comp_etc1: false,
        tex_comp_etc2: matches!(profile, GlProfile::Gles3),
        tex_comp_pvrt: false,
        tex_comp_astc: false,
        tex_npot: !matches!(profile, GlProfile::Gles2),
        tex_float: !matches!(profile, GlProfile::Gles2),
        tex_depth: !matches!(profile, GlProfile::Gles2),
        max_depth_bits: if matches!(profile, GlProfile::Gl33) { 32 } else { 16 },
        tex_mirror_clamp: false,
        tex_anisotropic: false,
        max_anisotropy: 0.0,
        debug_marker: false,
    };

    for token in backend.extension_strings() {
        match token.as_str() {
            "GL_ARB_vertex_array_object"
            | "GL_OES_vertex_array_object"
            | "GL_APPLE_vertex_array_object" => caps.vao = true,
            "GL_OES_texture_npot" | "GL_ARB_texture_non_power_of_two" => caps.tex_npot = true,
            "GL_EXT_texture_compression_s3tc"
            | "GL_WEBGL_compressed_texture_s3tc"
            | "GL_WEBKIT_WEBGL_compressed_texture_s3tc" => caps.tex_comp_dxt = true,
            "GL_OES_compressed_ETC1_RGB8_texture" | "GL_WEBGL_compressed_texture_etc1" => {
                caps.tex_comp_etc1 = true
            }
            "GL_ARB_ES3_compatibility" => caps.tex_comp_etc2 = true,
            "GL_IMG_texture_compression_pvrtc" => caps.tex_comp_pvrt = true,
            "GL_KHR_texture_compression_astc_hdr" | "GL_KHR_texture_compression_astc_ldr" => {
                caps.tex_comp_astc = true
            }
            "GL_OES_texture_float" => caps.tex_float = true,
            "GL_OES_depth_texture" | "GL_WEBGL_depth_texture" => caps.tex_depth = true,
            "GL_OES_depth24" => caps.max_depth_bits = caps.max_depth_bits.max(24),
            "GL_OES_depth32" => caps.max_depth_bits = caps.max_depth_bits.max(32),
            "GL_EXT_texture_mirror_clamp" => caps.tex_mirror_clamp = true,
            "GL_EXT_texture_filter_anisotropic" => caps.tex_anisotropic = true,
            "GL_EXT_debug_marker" => caps.debug_marker = true,
            _ => {}
        }
    }

    if caps.tex_anisotropic {
        caps.max_anisotropy = backend.get_float(GL_MAX_TEXTURE_MAX_ANISOTROPY).max(2.0);
    }
    caps
}

// =============================================================================
// Render context
// =============================================================================

/// The renderer state. See the module docs for the lifecycle.
pub struct RenderContext {
    pub(crate) backend: Box<dyn GlBackend>,
    pub(crate) caps: GpuCapabilities,
    pub(crate) memory: Box<BatchMemory>,
    pub(crate) stack: MatrixStack,

    // Size hierarchy: physical framebuffer, logical resolution, actual
    // backbuffer and the active target (which changes inside
    // render-to-texture scopes).
    pub(crate) display: Size,
    pub(crate) screen: Size,
    pub(crate) render: Size,
    pub(crate) current: Size,
    pub(crate) render_offset: Size,
    pub(crate) screen_scaling: Matrix4<f32>,

    // Batch state.
    pub(crate) current_buffer: usize,
    pub(crate) current_depth: f32,
    pub(crate) active_texture_id: u32,
    pub(crate) blend_mode: BlendMode,

    pub(crate) default_texture: Texture,
    pub(crate) default_shader: Shader,
    pub(crate) current_shader: Shader,
    pub(crate) default_font: Font,
}

impl RenderContext {
    /// Adopts a backend and a batch memory block and bootstraps the
    /// pipeline: capability probing, default texture and shader, vertex
    /// buffer upload, initial GPU state and the viewport policy.
    pub fn new(
        backend: Box<dyn GlBackend>,
        memory: Box<BatchMemory>,
        screen_width: i32,
        screen_height: i32,
    ) -> RenderContext {
        let caps = detect_capabilities(backend.as_ref());
        let screen = Size::new(screen_width, screen_height);

        let mut ctx = RenderContext {
            backend,
            caps,
            memory,
            stack: MatrixStack::new(),
            display: screen,
            screen,
            render: screen,
            current: screen,
            render_offset: Size::zero(),
            screen_scaling: Matrix4::identity(),
            current_buffer: 0,
            current_depth: crate::batch::DEPTH_START,
            active_texture_id: 0,
            blend_mode: BlendMode::Alpha,
            default_texture: Texture::invalid(),
            default_shader: Shader::invalid(),
            current_shader: Shader::invalid(),
            default_font: Font::empty(),
        };
        ctx.bootstrap();
        ctx
    }

    fn bootstrap(&mut self) {
        // 1x1 opaque white texture every untextured draw binds.
        self.default_texture =
            self.load_texture(&[255, 255, 255, 255], 1, 1, PixelFormat::R8G8B8A8, 1);
        if self.default_texture.id == 0 {
            log::warn!("failed to create the default texture");
        } else {
            log::info!("default texture loaded (id {})", self.default_texture.id);
        }

        let (vs, fs) = shader::default_shader_sources(self.backend.profile());
        self.default_shader = shader::load_shader_from_code(self.backend.as_ref(), vs, fs);
        self.current_shader = self.default_shader;

        self.init_vertex_buffers();
        self.memory.draws.clear();
        self.memory.draws.push(DrawCall::new(DrawMode::Quads, self.default_texture.id));

        // Initial state: no depth test, alpha blending, back-face culling
        // with counter-clockwise winding, black clear color.
        self.backend.disable(gl::DEPTH_TEST);
        self.backend.depth_func(gl::LEQUAL);
        self.backend.enable(gl::BLEND);
        self.backend.blend_func(gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA);
        self.backend.cull_face(gl::BACK);
        self.backend.front_face(gl::CCW);
        self.backend.enable(gl::CULL_FACE);
        self.backend.clear_color(0.0, 0.0, 0.0, 1.0);

        self.setup_framebuffer();
        self.setup_viewport();

        self.load_default_font();
    }

    /// Uploads every vertex buffer and wires its attribute bindings
    /// against the default shader layout.
    fn init_vertex_buffers(&mut self) {
        use crate::shader::{ATTRIB_COLOR, ATTRIB_POSITION, ATTRIB_TEXCOORD};

        for buffer in self.memory.buffers.iter_mut() {
            buffer.reset_counters();

            if self.caps.vao {
                buffer.vao = self.backend.gen_vertex_array();
                self.backend.bind_vertex_array(buffer.vao);
            }

            buffer.vbo[0] = self.backend.gen_buffer();
            self.backend.bind_buffer(gl::ARRAY_BUFFER, buffer.vbo[0]);
            self.backend.buffer_data(
                gl::ARRAY_BUFFER,
                bytemuck::cast_slice(&buffer.vertices),
                gl::DYNAMIC_DRAW,
            );
            self.backend
                .vertex_attrib_pointer(ATTRIB_POSITION, 3, gl::FLOAT, false, 0, 0);
            self.backend.enable_vertex_attrib_array(ATTRIB_POSITION);

            buffer.vbo[1] = self.backend.gen_buffer();
            self.backend.bind_buffer(gl::ARRAY_BUFFER, buffer.vbo[1]);
            self.backend.buffer_data(
                gl::ARRAY_BUFFER,
                bytemuck::cast_slice(&buffer.texcoords),
                gl::DYNAMIC_DRAW,
            );
            self.backend
                .vertex_attrib_pointer(ATTRIB_TEXCOORD, 2, gl::FLOAT, false, 0, 0);
            self.backend.enable_vertex_attrib_array(ATTRIB_TEXCOORD);

            buffer.vbo[2] = self.backend.gen_buffer();
            self.backend.bind_buffer(gl::ARRAY_BUFFER, buffer.vbo[2]);
            self.backend
                .buffer_data(gl::ARRAY_BUFFER, &buffer.colors, gl::DYNAMIC_DRAW);
            self.backend
                .vertex_attrib_pointer(ATTRIB_COLOR, 4, gl::UNSIGNED_BYTE, true, 0, 0);
            self.backend.enable_vertex_attrib_array(ATTRIB_COLOR);

            buffer.vbo[3] = self.backend.gen_buffer();
            self.backend
                .bind_buffer(gl::ELEMENT_ARRAY_BUFFER, buffer.vbo[3]);
            self.backend
                .buffer_data_indices(&buffer.indices, gl::STATIC_DRAW);

            if self.caps.vao {
                self.backend.bind_vertex_array(0);
            }
        }
    }

    /// Releases the GPU resources and hands the batch memory back to the
    /// caller.
    pub fn close(mut self) -> Box<BatchMemory> {
        self.unload_default_font();
        shader::unload_shader(self.backend.as_ref(), self.default_shader);
        if self.default_texture.id != 0 {
            self.backend.delete_texture(self.default_texture.id);
        }
        for buffer in self.memory.buffers.iter_mut() {
            for vbo in buffer.vbo {
                if vbo != 0 {
                    self.backend.delete_buffer(vbo);
                }
            }
            if buffer.vao != 0 {
                self.backend.delete_vertex_array(buffer.vao);
            }
            buffer.vao = 0;
            buffer.vbo = [0; 4];
        }
        self.memory
    }

    // =========================================================================
    // Size hierarchy and framebuffer policy
    // =========================================================================

    pub fn screen_size(&self) -> Size {
        self.screen
    }

    pub fn display_size(&self) -> Size {
        self.display
    }

    pub fn render_size(&self) -> Size {
        self.render
    }

    pub fn current_size(&self) -> Size {
        self.current
    }

    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.caps
    }

    pub fn default_shader(&self) -> Shader {
        self.default_shader
    }

    pub fn default_texture(&self) -> Texture {
        self.default_texture
    }

    /// Updates the physical framebuffer size and recomputes the fit policy
    /// and viewport.
    pub fn set_display_size(&mut self, width: i32, height: i32) {
        self.display = Size::new(width, height);
        self.setup_framebuffer();
        self.setup_viewport();
    }

    /// Computes how the logical screen fits the physical display: downscale
    /// with uniform scaling and border bars, upscale at native size, or a
    /// straight identity mapping.
    pub(crate) fn setup_framebuffer(&mut self) {
        let (sw, sh) = (self.screen.width, self.screen.height);
        let (dw, dh) = (self.display.width, self.display.height);

        if sw > dw || sh > dh {
            // Downscale: render at display size, scale content uniformly
            // and center it with border bars on the excess axis.
            let scale = (dw as f32 / sw as f32).min(dh as f32 / sh as f32);
            self.render = Size::new(dw, dh);
            self.render_offset = Size::new(
                dw - (sw as f32 * scale).round() as i32,
                dh - (sh as f32 * scale).round() as i32,
            );
            self.screen_scaling = Matrix4::from_nonuniform_scale(scale, scale, 1.0);
            log::info!(
                "downscaling {}x{} screen to fit {}x{} display (scale {:.2})",
                sw,
                sh,
                dw,
                dh,
                scale
            );
        } else if sw < dw && sh < dh {
            // Upscale: render at the logical size and let the host present
            // it; the offsets record the slack per axis.
            self.render = Size::new(sw, sh);
            self.render_offset = Size::new(dw - sw, dh - sh);
            self.screen_scaling = Matrix4::identity();
        } else {
            self.render = Size::new(sw, sh);
            self.render_offset = Size::zero();
            self.screen_scaling = Matrix4::identity();
        }
        self.current = self.render;
    }

    /// Applies the viewport and resets both matrix roots: orthographic
    /// projection with the origin at the top-left, identity modelview.
    pub(crate) fn setup_viewport(&mut self) {
        let width = self.render.width - self.render_offset.width;
        let height = self.render.height - self.render_offset.height;
        self.backend.viewport(
            self.render_offset.width / 2,
            self.render_offset.height / 2,
            width,
            height,
        );

        self.stack.set_mode(MatrixMode::Projection);
        self.stack.identity();
        self.stack
            .ortho(0.0, width as f64, height as f64, 0.0, 0.0, 1.0);
        self.stack.set_mode(MatrixMode::ModelView);
        self.stack.identity();
    }

    // =========================================================================
    // Frame helpers
    // =========================================================================

    /// Sets the clear color and clears color and depth.
    pub fn clear_background(&mut self, color: crate::math::Color) {
        let c = color.normalize();
        self.backend.clear_color(c.x, c.y, c.z, c.w);
        self.backend.clear_depth(1.0);
        self.backend.clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT);
    }

    /// Desktop-only wireframe rasterization; logs when unavailable.
    pub fn set_wireframe(&mut self, enabled: bool) {
        let mode = if enabled { gl::LINE } else { gl::FILL };
        if !self.backend.polygon_mode(gl::FRONT_AND_BACK, mode) {
            log::warn!("wireframe rasterization is not available on this profile");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::RecordingBackend;
    use crate::backend::GlProfile;
    use crate::test_support::test_context;

    #[test]
    fn test_bootstrap_creates_defaults() {
        let (ctx, _) = test_context();
        assert_ne!(ctx.default_texture.id, 0);
        assert!(ctx.default_shader.is_valid());
        assert_eq!(ctx.current_shader, ctx.default_shader);
        assert_eq!(ctx.memory.draws.len(), 1);
        assert_eq!(ctx.memory.draws[0].texture_id, ctx.default_texture.id);
    }

    #[test]
    fn test_equal_sizes_mean_identity_scaling() {
        let (ctx, _) = test_context();
        assert_eq!(ctx.render_size(), ctx.screen_size());
        assert_eq!(ctx.render_offset, Size::zero());
        assert_eq!(ctx.screen_scaling, Matrix4::identity());
    }

    #[test]
    fn test_downscale_policy() {
        let backend = RecordingBackend::new(GlProfile::Gl33);
        let mut ctx =
            RenderContext::new(Box::new(backend), BatchMemory::new(), 1600, 1200);
        ctx.set_display_size(800, 800);
        // Scale = min(800/1600, 800/1200) = 0.5; bars on the vertical axis.
        assert_eq!(ctx.render_size(), Size::new(800, 800));
        assert_eq!(ctx.render_offset, Size::new(0, 200));
        assert_ne!(ctx.screen_scaling, Matrix4::identity());
    }

    #[test]
    fn test_upscale_policy() {
        let backend = RecordingBackend::new(GlProfile::Gl33);
        let mut ctx = RenderContext::new(Box::new(backend), BatchMemory::new(), 320, 240);
        ctx.set_display_size(640, 480);
        assert_eq!(ctx.render_size(), Size::new(320, 240));
        assert_eq!(ctx.render_offset, Size::new(320, 240));
        assert_eq!(ctx.screen_scaling, Matrix4::identity());
    }

    #[test]
    fn test_viewport_sets_top_left_ortho() {
        use cgmath::Vector4;
        let (ctx, _) = test_context();
        // (0,0) maps to NDC (-1, 1): top-left.
        let ndc = ctx.stack.projection() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((ndc.x + 1.0).abs() < 1e-6);
        assert!((ndc.y - 1.0).abs() < 1e-6);
        // (w,h) maps to (1, -1): bottom-right.
        let ndc = ctx.stack.projection() * Vector4::new(800.0, 600.0, 0.0, 1.0);
        assert!((ndc.x - 1.0).abs() < 1e-6);
        assert!((ndc.y + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_close_returns_memory() {
        let (ctx, _) = test_context();
        let memory = ctx.close();
        assert_eq!(memory.buffers.len(), 1);
    }

    #[test]
    fn test_capability_detection_profile_baselines() {
        let caps = detect_capabilities(&RecordingBackend::new(GlProfile::Gl33));
        assert!(caps.vao);
        assert!(caps.tex_npot);
        assert!(caps.tex_float);
        assert_eq!(caps.max_depth_bits, 32);
        assert!(!caps.tex_comp_dxt);

        let caps = detect_capabilities(&RecordingBackend::new(GlProfile::Gles2));
        assert!(!caps.vao);
        assert!(!caps.tex_npot);
        assert_eq!(caps.max_depth_bits, 16);

        let caps = detect_capabilities(&RecordingBackend::new(GlProfile::Gles3));
        assert!(caps.tex_comp_etc2);
    }
}
