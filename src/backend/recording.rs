//! A backend double for tests that records draw submissions.
//!
//! Stands in for a live GL context so the batch and context paths can be
//! exercised headless: resource creation hands out incrementing ids,
//! shader compilation always succeeds, and draw calls are appended to an
//! inspectable log.

use super::{GlBackend, GlProfile, IndexWidth};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One recorded draw submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawSubmission {
    Arrays { mode: u32, first: i32, count: i32 },
    Elements { mode: u32, count: i32, element_offset: usize },
}

#[derive(Default)]
struct State {
    next_id: u32,
    locations: HashMap<(u32, String), i32>,
    next_location: i32,
    draws: Vec<DrawSubmission>,
    texture_binds: Vec<u32>,
    sub_data_uploads: Vec<(u32, usize)>,
}

/// Clones share the same call log, so a test can keep one handle for
/// inspection while the context owns the other.
#[derive(Clone)]
pub struct RecordingBackend {
    profile: GlProfile,
    state: Rc<RefCell<State>>,
}

impl RecordingBackend {
    pub fn new(profile: GlProfile) -> RecordingBackend {
        RecordingBackend {
            profile,
            state: Rc::new(RefCell::new(State::default())),
        }
    }

    /// Draw submissions recorded so far, in order.
    pub fn draws(&self) -> Vec<DrawSubmission> {
        self.state.borrow().draws.clone()
    }

    /// Texture ids bound (any target), in order.
    pub fn texture_binds(&self) -> Vec<u32> {
        self.state.borrow().texture_binds.clone()
    }

    /// `(target, byte_len)` pairs of `buffer_sub_data` uploads.
    pub fn sub_data_uploads(&self) -> Vec<(u32, usize)> {
        self.state.borrow().sub_data_uploads.clone()
    }

    pub fn clear_log(&self) {
        let mut state = self.state.borrow_mut();
        state.draws.clear();
        state.texture_binds.clear();
        state.sub_data_uploads.clear();
    }

    fn alloc_id(&self) -> u32 {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        state.next_id
    }
}

impl GlBackend for RecordingBackend {
    fn profile(&self) -> GlProfile {
        self.profile
    }

    fn index_width(&self) -> IndexWidth {
        match self.profile {
            GlProfile::Gles2 => IndexWidth::U16,
            _ => IndexWidth::U32,
        }
    }

    fn has_native_vao(&self) -> bool {
        !matches!(self.profile, GlProfile::Gles2)
    }

    fn extension_strings(&self) -> Vec<String> {
        Vec::new()
    }

    fn get_string(&self, _name: u32) -> String {
        String::new()
    }

    fn get_integer(&self, _pname: u32) -> i32 {
        0
    }

    fn get_float(&self, _pname: u32) -> f32 {
        0.0
    }

    fn viewport(&self, _x: i32, _y: i32, _w: i32, _h: i32) {}
    fn enable(&self, _cap: u32) {}
    fn disable(&self, _cap: u32) {}
    fn scissor(&self, _x: i32, _y: i32, _w: i32, _h: i32) {}
    fn clear_color(&self, _r: f32, _g: f32, _b: f32, _a: f32) {}
    fn clear(&self, _mask: u32) {}
    fn clear_depth(&self, _depth: f64) {}
    fn depth_func(&self, _func: u32) {}
    fn blend_func(&self, _s: u32, _d: u32) {}
    fn cull_face(&self, _mode: u32) {}
    fn front_face(&self, _mode: u32) {}

    fn polygon_mode(&self, _face: u32, _mode: u32) -> bool {
        matches!(self.profile, GlProfile::Gl33)
    }

    fn pixel_store_unpack_alignment(&self, _alignment: i32) {}

    fn gen_texture(&self) -> u32 {
        self.alloc_id()
    }

    fn delete_texture(&self, _id: u32) {}

    fn bind_texture(&self, _target: u32, id: u32) {
        self.state.borrow_mut().texture_binds.push(id);
    }

    fn active_texture(&self, _unit: u32) {}
    fn tex_parameter_i(&self, _t: u32, _p: u32, _v: i32) {}
    fn tex_parameter_f(&self, _t: u32, _p: u32, _v: f32) {}
    fn tex_parameter_iv(&self, _t: u32, _p: u32, _v: &[i32]) {}

    fn tex_image_2d(
        &self,
        _target: u32,
        _level: i32,
        _internal: i32,
        _w: i32,
        _h: i32,
        _format: u32,
        _ty: u32,
        _data: Option<&[u8]>,
    ) {
    }

    fn compressed_tex_image_2d(
        &self,
        _target: u32,
        _level: i32,
        _internal: u32,
        _w: i32,
        _h: i32,
        _data: &[u8],
    ) {
    }

    fn tex_sub_image_2d(
        &self,
        _target: u32,
        _level: i32,
        _x: i32,
        _y: i32,
        _w: i32,
        _h: i32,
        _format: u32,
        _ty: u32,
        _data: &[u8],
    ) {
    }

    fn generate_mipmap(&self, _target: u32) {}

    fn get_tex_image(&self, _t: u32, _l: i32, _f: u32, _ty: u32, _out: &mut [u8]) -> bool {
        matches!(self.profile, GlProfile::Gl33)
    }

    fn read_pixels(&self, _x: i32, _y: i32, _w: i32, _h: i32, _f: u32, _ty: u32, _out: &mut [u8]) {}

    fn gen_buffer(&self) -> u32 {
        self.alloc_id()
    }

    fn delete_buffer(&self, _id: u32) {}
    fn bind_buffer(&self, _target: u32, _id: u32) {}
    fn buffer_data(&self, _target: u32, _data: &[u8], _usage: u32) {}
    fn buffer_data_indices(&self, _indices: &[u32], _usage: u32) {}

    fn buffer_sub_data(&self, target: u32, _offset: isize, data: &[u8]) {
        self.state.borrow_mut().sub_data_uploads.push((target, data.len()));
    }

    fn gen_vertex_array(&self) -> u32 {
        self.alloc_id()
    }

    fn delete_vertex_array(&self, _id: u32) {}
    fn bind_vertex_array(&self, _id: u32) {}

    fn vertex_attrib_pointer(
        &self,
        _index: u32,
        _size: i32,
        _ty: u32,
        _normalized: bool,
        _stride: i32,
        _offset: usize,
    ) {
    }

    fn enable_vertex_attrib_array(&self, _index: u32) {}
    fn disable_vertex_attrib_array(&self, _index: u32) {}
    fn vertex_attrib_2f(&self, _i: u32, _x: f32, _y: f32) {}
    fn vertex_attrib_3f(&self, _i: u32, _x: f32, _y: f32, _z: f32) {}
    fn vertex_attrib_4f(&self, _i: u32, _x: f32, _y: f32, _z: f32, _w: f32) {}

    fn gen_framebuffer(&self) -> u32 {
        self.alloc_id()
    }

    fn delete_framebuffer(&self, _id: u32) {}
    fn bind_framebuffer(&self, _id: u32) {}
    fn framebuffer_texture_2d(&self, _a: u32, _t: u32, _tex: u32, _l: i32) {}
    fn framebuffer_renderbuffer(&self, _a: u32, _rbo: u32) {}

    fn check_framebuffer_status(&self) -> u32 {
        gl::FRAMEBUFFER_COMPLETE
    }

    fn gen_renderbuffer(&self) -> u32 {
        self.alloc_id()
    }

    fn delete_renderbuffer(&self, _id: u32) {}
    fn bind_renderbuffer(&self, _id: u32) {}
    fn renderbuffer_storage(&self, _internal: u32, _w: i32, _h: i32) {}

    fn create_shader(&self, _ty: u32) -> u32 {
        self.alloc_id()
    }

    fn shader_source(&self, _id: u32, _src: &str) {}
    fn compile_shader(&self, _id: u32) {}

    fn shader_compile_status(&self, _id: u32) -> bool {
        true
    }

    fn shader_info_log(&self, _id: u32) -> String {
        String::new()
    }

    fn delete_shader(&self, _id: u32) {}

    fn create_program(&self) -> u32 {
        self.alloc_id()
    }

    fn attach_shader(&self, _p: u32, _s: u32) {}
    fn bind_attrib_location(&self, _p: u32, _i: u32, _name: &str) {}
    fn link_program(&self, _p: u32) {}

    fn program_link_status(&self, _p: u32) -> bool {
        true
    }

    fn program_info_log(&self, _p: u32) -> String {
        String::new()
    }

    fn delete_program(&self, _id: u32) {}

    fn get_attrib_location(&self, program: u32, name: &str) -> i32 {
        let mut state = self.state.borrow_mut();
        let key = (program, name.to_owned());
        if let Some(&loc) = state.locations.get(&key) {
            return loc;
        }
        let loc = state.next_location;
        state.next_location += 1;
        state.locations.insert(key, loc);
        loc
    }

    fn get_uniform_location(&self, program: u32, name: &str) -> i32 {
        self.get_attrib_location(program, name)
    }

    fn use_program(&self, _id: u32) {}
    fn uniform_1i(&self, _l: i32, _v: i32) {}
    fn uniform_1f(&self, _l: i32, _v: f32) {}
    fn uniform_2f(&self, _l: i32, _x: f32, _y: f32) {}
    fn uniform_3f(&self, _l: i32, _x: f32, _y: f32, _z: f32) {}
    fn uniform_4f(&self, _l: i32, _x: f32, _y: f32, _z: f32, _w: f32) {}
    fn uniform_matrix4(&self, _l: i32, _v: &[f32; 16]) {}

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        self.state
            .borrow_mut()
            .draws
            .push(DrawSubmission::Arrays { mode, first, count });
    }

    fn draw_elements(&self, mode: u32, count: i32, element_offset: usize) {
        self.state.borrow_mut().draws.push(DrawSubmission::Elements {
            mode,
            count,
            element_offset,
        });
    }

    fn draw_elements_u16(&self, mode: u32, count: i32, element_offset: usize) {
        self.state.borrow_mut().draws.push(DrawSubmission::Elements {
            mode,
            count,
            element_offset,
        });
    }
}
