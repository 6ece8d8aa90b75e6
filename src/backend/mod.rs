//! GPU backend abstraction.
//!
//! The renderer talks to the GPU exclusively through the [`GlBackend`]
//! trait, which mirrors the curated subset of the GL 3.3 / GL ES 2-3 API
//! the library needs. One concrete implementation exists per context
//! profile family ([`opengl::OpenGlBackend`]), chosen at init time and held
//! as a trait object; the higher layers never branch on the profile.
//!
//! The handful of entry points where the desktop and ES profiles genuinely
//! diverge (`ClearDepth` vs `ClearDepthf`, `GetTexImage` and `PolygonMode`
//! existing only on desktop, the extension enumeration path, the index
//! width) are expressed as semantic methods so each implementation resolves
//! them internally.
//!
//! # Threading
//!
//! Every method must be called from the thread that owns the GL context.
//! The trait makes no synchronization promises beyond that.

pub mod opengl;

#[cfg(test)]
pub(crate) mod recording;

pub use opengl::OpenGlBackend;

// =============================================================================
// Profiles
// =============================================================================

/// Context profile the backend was initialized against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlProfile {
    /// Desktop OpenGL 3.3 core.
    Gl33,
    /// OpenGL ES 2.0.
    Gles2,
    /// OpenGL ES 3.0.
    Gles3,
}

/// Width of the element-index type the backend submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexWidth {
    /// `GL_UNSIGNED_SHORT` (ES 2).
    U16,
    /// `GL_UNSIGNED_INT` (GL 3.3 / ES 3).
    U32,
}

impl IndexWidth {
    /// Byte size of one index.
    pub fn byte_size(self) -> usize {
        match self {
            IndexWidth::U16 => 2,
            IndexWidth::U32 => 4,
        }
    }
}

// =============================================================================
// Backend trait
// =============================================================================

/// The GPU call surface the renderer is written against.
///
/// Raw GL enums (`gl::TEXTURE_2D`, `gl::BLEND`, ...) pass through
/// unchanged: both supported profile families share the enum space, and
/// keeping the table thin mirrors how the call sites read. Resource ids are
/// plain `u32` handles; 0 is never a valid created resource.
#[allow(clippy::too_many_arguments)]
pub trait GlBackend {
    // -------------------------------------------------------------------------
    // Profile and queries
    // -------------------------------------------------------------------------

    fn profile(&self) -> GlProfile;

    /// Index type used by [`Self::buffer_data_indices`] and
    /// [`Self::draw_elements`].
    fn index_width(&self) -> IndexWidth;

    /// Whether the context has native vertex-array objects.
    fn has_native_vao(&self) -> bool;

    /// All supported extension tokens, via `GetStringi` enumeration on
    /// profiles that have it and the legacy space-separated string
    /// otherwise.
    fn extension_strings(&self) -> Vec<String>;

    fn get_string(&self, name: u32) -> String;
    fn get_integer(&self, pname: u32) -> i32;
    fn get_float(&self, pname: u32) -> f32;

    // -------------------------------------------------------------------------
    // State
    // -------------------------------------------------------------------------

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn enable(&self, cap: u32);
    fn disable(&self, cap: u32);
    fn scissor(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn clear(&self, mask: u32);
    /// Dispatches to `ClearDepth` (desktop) or `ClearDepthf` (ES).
    fn clear_depth(&self, depth: f64);
    fn depth_func(&self, func: u32);
    fn blend_func(&self, sfactor: u32, dfactor: u32);
    fn cull_face(&self, mode: u32);
    fn front_face(&self, mode: u32);
    /// Desktop only; returns `false` (and does nothing) on ES profiles.
    fn polygon_mode(&self, face: u32, mode: u32) -> bool;
    fn pixel_store_unpack_alignment(&self, alignment: i32);

    // -------------------------------------------------------------------------
    // Textures
    // -------------------------------------------------------------------------

    fn gen_texture(&self) -> u32;
    fn delete_texture(&self, id: u32);
    fn bind_texture(&self, target: u32, id: u32);
    /// Activates texture unit `unit` (0-based).
    fn active_texture(&self, unit: u32);
    fn tex_parameter_i(&self, target: u32, pname: u32, value: i32);
    fn tex_parameter_f(&self, target: u32, pname: u32, value: f32);
    fn tex_parameter_iv(&self, target: u32, pname: u32, values: &[i32]);
    fn tex_image_2d(
        &self,
        target: u32,
        level: i32,
        internal_format: i32,
        width: i32,
        height: i32,
        format: u32,
        pixel_type: u32,
        data: Option<&[u8]>,
    );
    fn compressed_tex_image_2d(
        &self,
        target: u32,
        level: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        data: &[u8],
    );
    fn tex_sub_image_2d(
        &self,
        target: u32,
        level: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        pixel_type: u32,
        data: &[u8],
    );
    fn generate_mipmap(&self, target: u32);
    /// Desktop only; returns `false` without touching `out` on ES profiles.
    fn get_tex_image(
        &self,
        target: u32,
        level: i32,
        format: u32,
        pixel_type: u32,
        out: &mut [u8],
    ) -> bool;
    fn read_pixels(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        pixel_type: u32,
        out: &mut [u8],
    );

    // -------------------------------------------------------------------------
    // Buffers and vertex arrays
    // -------------------------------------------------------------------------

    fn gen_buffer(&self) -> u32;
    fn delete_buffer(&self, id: u32);
    fn bind_buffer(&self, target: u32, id: u32);
    fn buffer_data(&self, target: u32, data: &[u8], usage: u32);
    /// Uploads index data, narrowing to u16 when [`Self::index_width`] is
    /// [`IndexWidth::U16`].
    fn buffer_data_indices(&self, indices: &[u32], usage: u32);
    fn buffer_sub_data(&self, target: u32, offset: isize, data: &[u8]);

    fn gen_vertex_array(&self) -> u32;
    fn delete_vertex_array(&self, id: u32);
    fn bind_vertex_array(&self, id: u32);

    fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        ty: u32,
        normalized: bool,
        stride: i32,
        offset: usize,
    );
    fn enable_vertex_attrib_array(&self, index: u32);
    fn disable_vertex_attrib_array(&self, index: u32);
    fn vertex_attrib_2f(&self, index: u32, x: f32, y: f32);
    fn vertex_attrib_3f(&self, index: u32, x: f32, y: f32, z: f32);
    fn vertex_attrib_4f(&self, index: u32, x: f32, y: f32, z: f32, w: f32);

    // -------------------------------------------------------------------------
    // Framebuffers
    // -------------------------------------------------------------------------

    fn gen_framebuffer(&self) -> u32;
    fn delete_framebuffer(&self, id: u32);
    fn bind_framebuffer(&self, id: u32);
    fn framebuffer_texture_2d(&self, attachment: u32, tex_target: u32, texture: u32, level: i32);
    fn framebuffer_renderbuffer(&self, attachment: u32, renderbuffer: u32);
    fn check_framebuffer_status(&self) -> u32;

    fn gen_renderbuffer(&self) -> u32;
    fn delete_renderbuffer(&self, id: u32);
    fn bind_renderbuffer(&self, id: u32);
    fn renderbuffer_storage(&self, internal_format: u32, width: i32, height: i32);

    // -------------------------------------------------------------------------
    // Shaders and programs
    // -------------------------------------------------------------------------

    fn create_shader(&self, shader_type: u32) -> u32;
    fn shader_source(&self, id: u32, source: &str);
    fn compile_shader(&self, id: u32);
    fn shader_compile_status(&self, id: u32) -> bool;
    fn shader_info_log(&self, id: u32) -> String;
    fn delete_shader(&self, id: u32);

    fn create_program(&self) -> u32;
    fn attach_shader(&self, program: u32, shader: u32);
    fn bind_attrib_location(&self, program: u32, index: u32, name: &str);
    fn link_program(&self, program: u32);
    fn program_link_status(&self, program: u32) -> bool;
    fn program_info_log(&self, program: u32) -> String;
    fn delete_program(&self, id: u32);

    fn get_attrib_location(&self, program: u32, name: &str) -> i32;
    fn get_uniform_location(&self, program: u32, name: &str) -> i32;
    fn use_program(&self, id: u32);

    fn uniform_1i(&self, location: i32, value: i32);
    fn uniform_1f(&self, location: i32, value: f32);
    fn uniform_2f(&self, location: i32, x: f32, y: f32);
    fn uniform_3f(&self, location: i32, x: f32, y: f32, z: f32);
    fn uniform_4f(&self, location: i32, x: f32, y: f32, z: f32, w: f32);
    fn uniform_matrix4(&self, location: i32, value: &[f32; 16]);

    // -------------------------------------------------------------------------
    // Draw submission
    // -------------------------------------------------------------------------

    fn draw_arrays(&self, mode: u32, first: i32, count: i32);
    /// `element_offset` counts indices, not bytes; the backend scales by
    /// its index width.
    fn draw_elements(&self, mode: u32, count: i32, element_offset: usize);
    /// Indexed draw over an explicit u16 element buffer (mesh paths store
    /// u16 indices on every profile).
    fn draw_elements_u16(&self, mode: u32, count: i32, element_offset: usize);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_width_byte_size() {
        assert_eq!(IndexWidth::U16.byte_size(), 2);
        assert_eq!(IndexWidth::U32.byte_size(), 4);
    }

    #[test]
    fn test_profile_is_copy_eq() {
        let p = GlProfile::Gl33;
        let q = p;
        assert_eq!(p, q);
        assert_ne!(GlProfile::Gles2, GlProfile::Gles3);
    }
}
