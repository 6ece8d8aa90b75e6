//! OpenGL implementation of the backend trait.
//!
//! Wraps the `gl` crate bindings. An active GL context (created by the
//! windowing host) must be current on the calling thread before any method
//! runs. The profile passed at construction decides the few divergent entry
//! points; everything else is a straight passthrough.

use super::{GlBackend, GlProfile, IndexWidth};
use gl::types::{GLchar, GLint, GLsizeiptr, GLuint};
use std::ffi::{c_void, CStr, CString};
use std::ptr;

/// Backend over a live OpenGL or OpenGL ES context.
pub struct OpenGlBackend {
    profile: GlProfile,
}

impl OpenGlBackend {
    /// Wraps the current GL context. The context must already be current on
    /// this thread and the symbols loaded (`gl::load_with` with the host's
    /// proc-address getter); this constructor performs no GL calls.
    pub fn new(profile: GlProfile) -> OpenGlBackend {
        OpenGlBackend { profile }
    }
}

impl GlBackend for OpenGlBackend {
    // -------------------------------------------------------------------------
    // Profile and queries
    // -------------------------------------------------------------------------

    fn profile(&self) -> GlProfile {
        self.profile
    }

    fn index_width(&self) -> IndexWidth {
        match self.profile {
            GlProfile::Gles2 => IndexWidth::U16,
            GlProfile::Gl33 | GlProfile::Gles3 => IndexWidth::U32,
        }
    }

    fn has_native_vao(&self) -> bool {
        !matches!(self.profile, GlProfile::Gles2)
    }

    fn extension_strings(&self) -> Vec<String> {
        match self.profile {
            // Indexed enumeration, the non-deprecated path.
            GlProfile::Gl33 | GlProfile::Gles3 => {
                let count = self.get_integer(gl::NUM_EXTENSIONS);
                (0..count.max(0) as u32)
                    .map(|i| unsafe {
                        let ptr = gl::GetStringi(gl::EXTENSIONS, i);
                        if ptr.is_null() {
                            String::new()
                        } else {
                            CStr::from_ptr(ptr as *const _).to_string_lossy().into_owned()
                        }
                    })
                    .filter(|s| !s.is_empty())
                    .collect()
            }
            // Legacy single space-separated string.
            GlProfile::Gles2 => self
                .get_string(gl::EXTENSIONS)
                .split(' ')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    fn get_string(&self, name: u32) -> String {
        unsafe {
            let ptr = gl::GetString(name);
            if ptr.is_null() {
                String::new()
            } else {
                CStr::from_ptr(ptr as *const _).to_string_lossy().into_owned()
            }
        }
    }

    fn get_integer(&self, pname: u32) -> i32 {
        let mut value: GLint = 0;
        unsafe {
            gl::GetIntegerv(pname, &mut value);
        }
        value
    }

    fn get_float(&self, pname: u32) -> f32 {
        let mut value: f32 = 0.0;
        unsafe {
            gl::GetFloatv(pname, &mut value);
        }
        value
    }

    // -------------------------------------------------------------------------
    // State
    // -------------------------------------------------------------------------

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe {
            gl::Viewport(x, y, width, height);
        }
    }

    fn enable(&self, cap: u32) {
        unsafe {
            gl::Enable(cap);
        }
    }

    fn disable(&self, cap: u32) {
        unsafe {
            gl::Disable(cap);
        }
    }

    fn scissor(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe {
            gl::Scissor(x, y, width, height);
        }
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        unsafe {
            gl::ClearColor(r, g, b, a);
        }
    }

    fn clear(&self, mask: u32) {
        unsafe {
            gl::Clear(mask);
        }
    }

    fn clear_depth(&self, depth: f64) {
        match self.profile {
            GlProfile::Gl33 => unsafe { gl::ClearDepth(depth) },
            GlProfile::Gles2 | GlProfile::Gles3 => unsafe { gl::ClearDepthf(depth as f32) },
        }
    }

    fn depth_func(&self, func: u32) {
        unsafe {
            gl::DepthFunc(func);
        }
    }

    fn blend_func(&self, sfactor: u32, dfactor: u32) {
        unsafe {
            gl::BlendFunc(sfactor, dfactor);
        }
    }

    fn cull_face(&self, mode: u32) {
        unsafe {
            gl::CullFace(mode);
        }
    }

    fn front_face(&self, mode: u32) {
        unsafe {
            gl::FrontFace(mode);
        }
    }

    fn polygon_mode(&self, face: u32, mode: u32) -> bool {
        match self.profile {
            GlProfile::Gl33 => {
                unsafe {
                    gl::PolygonMode(face, mode);
                }
                true
            }
            GlProfile::Gles2 | GlProfile::Gles3 => false,
        }
    }

    fn pixel_store_unpack_alignment(&self, alignment: i32) {
        unsafe {
            gl::PixelStorei(gl::UNPACK_ALIGNMENT, alignment);
        }
    }

    // -------------------------------------------------------------------------
    // Textures
    // -------------------------------------------------------------------------

    fn gen_texture(&self) -> u32 {
        let mut id: GLuint = 0;
        unsafe {
            gl::GenTextures(1, &mut id);
        }
        id
    }

    fn delete_texture(&self, id: u32) {
        unsafe {
            gl::DeleteTextures(1, &id);
        }
    }

    fn bind_texture(&self, target: u32, id: u32) {
        unsafe {
            gl::BindTexture(target, id);
        }
    }

    fn active_texture(&self, unit: u32) {
        unsafe {
            gl::ActiveTexture(gl::TEXTURE0 + unit);
        }
    }

    fn tex_parameter_i(&self, target: u32, pname: u32, value: i32) {
        unsafe {
            gl::TexParameteri(target, pname, value);
        }
    }

    fn tex_parameter_f(&self, target: u32, pname: u32, value: f32) {
        unsafe {
            gl::TexParameterf(target, pname, value);
        }
    }

    fn tex_parameter_iv(&self, target: u32, pname: u32, values: &[i32]) {
        unsafe {
            gl::TexParameteriv(target, pname, values.as_ptr());
        }
    }

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
    ) {
        let ptr = data.map_or(ptr::null(), |d| d.as_ptr() as *const c_void);
        unsafe {
            gl::TexImage2D(
                target,
                level,
                internal_format,
                width,
                height,
                0,
                format,
                pixel_type,
                ptr,
            );
        }
    }

    fn compressed_tex_image_2d(
        &self,
        target: u32,
        level: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        data: &[u8],
    ) {
        unsafe {
            gl::CompressedTexImage2D(
                target,
                level,
                internal_format,
                width,
                height,
                0,
                data.len() as i32,
                data.as_ptr() as *const c_void,
            );
        }
    }

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
    ) {
        unsafe {
            gl::TexSubImage2D(
                target,
                level,
                x,
                y,
                width,
                height,
                format,
                pixel_type,
                data.as_ptr() as *const c_void,
            );
        }
    }

    fn generate_mipmap(&self, target: u32) {
        unsafe {
            gl::GenerateMipmap(target);
        }
    }

    fn get_tex_image(
        &self,
        target: u32,
        level: i32,
        format: u32,
        pixel_type: u32,
        out: &mut [u8],
    ) -> bool {
        match self.profile {
            GlProfile::Gl33 => {
                unsafe {
                    gl::GetTexImage(target, level, format, pixel_type, out.as_mut_ptr() as *mut c_void);
                }
                true
            }
            GlProfile::Gles2 | GlProfile::Gles3 => false,
        }
    }

    fn read_pixels(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        pixel_type: u32,
        out: &mut [u8],
    ) {
        unsafe {
            gl::ReadPixels(
                x,
                y,
                width,
                height,
                format,
                pixel_type,
                out.as_mut_ptr() as *mut c_void,
            );
        }
    }

    // -------------------------------------------------------------------------
    // Buffers and vertex arrays
    // -------------------------------------------------------------------------

    fn gen_buffer(&self) -> u32 {
        let mut id: GLuint = 0;
        unsafe {
            gl::GenBuffers(1, &mut id);
        }
        id
    }

    fn delete_buffer(&self, id: u32) {
        unsafe {
            gl::DeleteBuffers(1, &id);
        }
    }

    fn bind_buffer(&self, target: u32, id: u32) {
        unsafe {
            gl::BindBuffer(target, id);
        }
    }

    fn buffer_data(&self, target: u32, data: &[u8], usage: u32) {
        unsafe {
            gl::BufferData(
                target,
                data.len() as GLsizeiptr,
                data.as_ptr() as *const c_void,
                usage,
            );
        }
    }

    fn buffer_data_indices(&self, indices: &[u32], usage: u32) {
        match self.index_width() {
            IndexWidth::U32 => {
                self.buffer_data(gl::ELEMENT_ARRAY_BUFFER, bytemuck::cast_slice(indices), usage);
            }
            IndexWidth::U16 => {
                let narrow: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
                self.buffer_data(gl::ELEMENT_ARRAY_BUFFER, bytemuck::cast_slice(&narrow), usage);
            }
        }
    }

    fn buffer_sub_data(&self, target: u32, offset: isize, data: &[u8]) {
        unsafe {
            gl::BufferSubData(
                target,
                offset,
                data.len() as GLsizeiptr,
                data.as_ptr() as *const c_void,
            );
        }
    }

    fn gen_vertex_array(&self) -> u32 {
        let mut id: GLuint = 0;
        unsafe {
            gl::GenVertexArrays(1, &mut id);
        }
        id
    }

    fn delete_vertex_array(&self, id: u32) {
        unsafe {
            gl::DeleteVertexArrays(1, &id);
        }
    }

    fn bind_vertex_array(&self, id: u32) {
        unsafe {
            gl::BindVertexArray(id);
        }
    }

    fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        ty: u32,
        normalized: bool,
        stride: i32,
        offset: usize,
    ) {
        unsafe {
            gl::VertexAttribPointer(
                index,
                size,
                ty,
                normalized as u8,
                stride,
                offset as *const c_void,
            );
        }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe {
            gl::EnableVertexAttribArray(index);
        }
    }

    fn disable_vertex_attrib_array(&self, index: u32) {
        unsafe {
            gl::DisableVertexAttribArray(index);
        }
    }

    fn vertex_attrib_2f(&self, index: u32, x: f32, y: f32) {
        unsafe {
            gl::VertexAttrib2f(index, x, y);
        }
    }

    fn vertex_attrib_3f(&self, index: u32, x: f32, y: f32, z: f32) {
        unsafe {
            gl::VertexAttrib3f(index, x, y, z);
        }
    }

    fn vertex_attrib_4f(&self, index: u32, x: f32, y: f32, z: f32, w: f32) {
        unsafe {
            gl::VertexAttrib4f(index, x, y, z, w);
        }
    }

    // -------------------------------------------------------------------------
    // Framebuffers
    // -------------------------------------------------------------------------

    fn gen_framebuffer(&self) -> u32 {
        let mut id: GLuint = 0;
        unsafe {
            gl::GenFramebuffers(1, &mut id);
        }
        id
    }

    fn delete_framebuffer(&self, id: u32) {
        unsafe {
            gl::DeleteFramebuffers(1, &id);
        }
    }

    fn bind_framebuffer(&self, id: u32) {
        unsafe {
            gl::BindFramebuffer(gl::FRAMEBUFFER, id);
        }
    }

    fn framebuffer_texture_2d(&self, attachment: u32, tex_target: u32, texture: u32, level: i32) {
        unsafe {
            gl::FramebufferTexture2D(gl::FRAMEBUFFER, attachment, tex_target, texture, level);
        }
    }

    fn framebuffer_renderbuffer(&self, attachment: u32, renderbuffer: u32) {
        unsafe {
            gl::FramebufferRenderbuffer(gl::FRAMEBUFFER, attachment, gl::RENDERBUFFER, renderbuffer);
        }
    }

    fn check_framebuffer_status(&self) -> u32 {
        unsafe { gl::CheckFramebufferStatus(gl::FRAMEBUFFER) }
    }

    fn gen_renderbuffer(&self) -> u32 {
        let mut id: GLuint = 0;
        unsafe {
            gl::GenRenderbuffers(1, &mut id);
        }
        id
    }

    fn delete_renderbuffer(&self, id: u32) {
        unsafe {
            gl::DeleteRenderbuffers(1, &id);
        }
    }

    fn bind_renderbuffer(&self, id: u32) {
        unsafe {
            gl::BindRenderbuffer(gl::RENDERBUFFER, id);
        }
    }

    fn renderbuffer_storage(&self, internal_format: u32, width: i32, height: i32) {
        unsafe {
            gl::RenderbufferStorage(gl::RENDERBUFFER, internal_format, width, height);
        }
    }

    // -------------------------------------------------------------------------
    // Shaders and programs
    // -------------------------------------------------------------------------

    fn create_shader(&self, shader_type: u32) -> u32 {
        unsafe { gl::CreateShader(shader_type) }
    }

    fn shader_source(&self, id: u32, source: &str) {
        let c_str = CString::new(source.as_bytes()).unwrap_or_default();
        unsafe {
            gl::ShaderSource(id, 1, &c_str.as_ptr(), ptr::null());
        }
    }

    fn compile_shader(&self, id: u32) {
        unsafe {
            gl::CompileShader(id);
        }
    }

    fn shader_compile_status(&self, id: u32) -> bool {
        let mut status: GLint = gl::FALSE as GLint;
        unsafe {
            gl::GetShaderiv(id, gl::COMPILE_STATUS, &mut status);
        }
        status == gl::TRUE as GLint
    }

    fn shader_info_log(&self, id: u32) -> String {
        let mut len: GLint = 0;
        unsafe {
            gl::GetShaderiv(id, gl::INFO_LOG_LENGTH, &mut len);
        }
        if len <= 1 {
            return String::new();
        }
        let mut buffer = vec![0u8; len as usize - 1];
        unsafe {
            gl::GetShaderInfoLog(id, len, ptr::null_mut(), buffer.as_mut_ptr() as *mut GLchar);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    fn delete_shader(&self, id: u32) {
        unsafe {
            gl::DeleteShader(id);
        }
    }

    fn create_program(&self) -> u32 {
        unsafe { gl::CreateProgram() }
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        unsafe {
            gl::AttachShader(program, shader);
        }
    }

    fn bind_attrib_location(&self, program: u32, index: u32, name: &str) {
        let c_str = CString::new(name).unwrap_or_default();
        unsafe {
            gl::BindAttribLocation(program, index, c_str.as_ptr());
        }
    }

    fn link_program(&self, program: u32) {
        unsafe {
            gl::LinkProgram(program);
        }
    }

    fn program_link_status(&self, program: u32) -> bool {
        let mut status: GLint = gl::FALSE as GLint;
        unsafe {
            gl::GetProgramiv(program, gl::LINK_STATUS, &mut status);
        }
        status == gl::TRUE as GLint
    }

    fn program_info_log(&self, program: u32) -> String {
        let mut len: GLint = 0;
        unsafe {
            gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut len);
        }
        if len <= 1 {
            return String::new();
        }
        let mut buffer = vec![0u8; len as usize - 1];
        unsafe {
            gl::GetProgramInfoLog(program, len, ptr::null_mut(), buffer.as_mut_ptr() as *mut GLchar);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    fn delete_program(&self, id: u32) {
        unsafe {
            gl::DeleteProgram(id);
        }
    }

    fn get_attrib_location(&self, program: u32, name: &str) -> i32 {
        let c_str = CString::new(name).unwrap_or_default();
        unsafe { gl::GetAttribLocation(program, c_str.as_ptr()) }
    }

    fn get_uniform_location(&self, program: u32, name: &str) -> i32 {
        let c_str = CString::new(name).unwrap_or_default();
        unsafe { gl::GetUniformLocation(program, c_str.as_ptr()) }
    }

    fn use_program(&self, id: u32) {
        unsafe {
            gl::UseProgram(id);
        }
    }

    fn uniform_1i(&self, location: i32, value: i32) {
        unsafe {
            gl::Uniform1i(location, value);
        }
    }

    fn uniform_1f(&self, location: i32, value: f32) {
        unsafe {
            gl::Uniform1f(location, value);
        }
    }

    fn uniform_2f(&self, location: i32, x: f32, y: f32) {
        unsafe {
            gl::Uniform2f(location, x, y);
        }
    }

    fn uniform_3f(&self, location: i32, x: f32, y: f32, z: f32) {
        unsafe {
            gl::Uniform3f(location, x, y, z);
        }
    }

    fn uniform_4f(&self, location: i32, x: f32, y: f32, z: f32, w: f32) {
        unsafe {
            gl::Uniform4f(location, x, y, z, w);
        }
    }

    fn uniform_matrix4(&self, location: i32, value: &[f32; 16]) {
        unsafe {
            gl::UniformMatrix4fv(location, 1, gl::FALSE, value.as_ptr());
        }
    }

    // -------------------------------------------------------------------------
    // Draw submission
    // -------------------------------------------------------------------------

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        unsafe {
            gl::DrawArrays(mode, first, count);
        }
    }

    fn draw_elements(&self, mode: u32, count: i32, element_offset: usize) {
        let width = self.index_width();
        let index_type = match width {
            IndexWidth::U16 => gl::UNSIGNED_SHORT,
            IndexWidth::U32 => gl::UNSIGNED_INT,
        };
        unsafe {
            gl::DrawElements(
                mode,
                count,
                index_type,
                (element_offset * width.byte_size()) as *const c_void,
            );
        }
    }

    fn draw_elements_u16(&self, mode: u32, count: i32, element_offset: usize) {
        unsafe {
            gl::DrawElements(
                mode,
                count,
                gl::UNSIGNED_SHORT,
                (element_offset * 2) as *const c_void,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_width_follows_profile() {
        assert_eq!(OpenGlBackend::new(GlProfile::Gl33).index_width(), IndexWidth::U32);
        assert_eq!(OpenGlBackend::new(GlProfile::Gles2).index_width(), IndexWidth::U16);
        assert_eq!(OpenGlBackend::new(GlProfile::Gles3).index_width(), IndexWidth::U32);
    }

    #[test]
    fn test_native_vao_follows_profile() {
        assert!(OpenGlBackend::new(GlProfile::Gl33).has_native_vao());
        assert!(!OpenGlBackend::new(GlProfile::Gles2).has_native_vao());
        assert!(OpenGlBackend::new(GlProfile::Gles3).has_native_vao());
    }
}
