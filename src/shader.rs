//! Shader programs and the default shader.
//!
//! A [`Shader`] is a program handle plus a fixed array of location slots.
//! Slot indices have predefined meanings (see [`ShaderLoc`]); a slot holds
//! `-1` when the program does not expose the corresponding input, and every
//! consumer checks for that before setting a value.
//!
//! Compile or link failures are logged with the driver's info log and
//! produce the sentinel shader (`id == 0`) rather than an error value, so a
//! caller can keep going with the default pipeline.

use crate::backend::{GlBackend, GlProfile};

/// Number of location slots carried per shader.
pub const MAX_SHADER_LOCATIONS: usize = 32;

/// Predefined meanings of the shader location slots.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderLoc {
    VertexPosition = 0,
    VertexTexcoord01 = 1,
    VertexTexcoord02 = 2,
    VertexNormal = 3,
    VertexTangent = 4,
    VertexColor = 5,
    MatrixMvp = 6,
    MatrixModel = 7,
    MatrixView = 8,
    MatrixProjection = 9,
    VectorView = 10,
    ColorDiffuse = 11,
    ColorSpecular = 12,
    ColorAmbient = 13,
    MapAlbedo = 14,
    MapMetalness = 15,
    MapNormal = 16,
    MapRoughness = 17,
    MapOcclusion = 18,
    MapEmission = 19,
    MapHeight = 20,
    MapCubemap = 21,
    MapIrradiance = 22,
    MapPrefilter = 23,
    MapBrdf = 24,
}

/// Attribute indices the default vertex layout binds against.
pub(crate) const ATTRIB_POSITION: u32 = 0;
pub(crate) const ATTRIB_TEXCOORD: u32 = 1;
pub(crate) const ATTRIB_NORMAL: u32 = 2;
pub(crate) const ATTRIB_COLOR: u32 = 3;
pub(crate) const ATTRIB_TANGENT: u32 = 4;
pub(crate) const ATTRIB_TEXCOORD2: u32 = 5;

/// A GPU program handle plus its resolved location slots.
///
/// `id == 0` is the sentinel for "failed to build"; drawing with it falls
/// back to whatever program is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shader {
    pub id: u32,
    pub locs: [i32; MAX_SHADER_LOCATIONS],
}

impl Shader {
    /// The invalid-shader sentinel.
    pub fn invalid() -> Shader {
        Shader {
            id: 0,
            locs: [-1; MAX_SHADER_LOCATIONS],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.id != 0
    }

    /// Location stored for `slot`, `-1` when absent.
    #[inline]
    pub fn loc(&self, slot: ShaderLoc) -> i32 {
        self.locs[slot as usize]
    }
}

// =============================================================================
// Default shader sources
// =============================================================================

const DEFAULT_VS_GL33: &str = "\
#version 330
in vec3 vertexPosition;
in vec2 vertexTexCoord;
in vec4 vertexColor;
out vec2 fragTexCoord;
out vec4 fragColor;
uniform mat4 mvp;
void main()
{
    fragTexCoord = vertexTexCoord;
    fragColor = vertexColor;
    gl_Position = mvp * vec4(vertexPosition, 1.0);
}
";

const DEFAULT_FS_GL33: &str = "\
#version 330
in vec2 fragTexCoord;
in vec4 fragColor;
out vec4 finalColor;
uniform sampler2D texture0;
uniform vec4 colDiffuse;
void main()
{
    vec4 texelColor = texture(texture0, fragTexCoord);
    finalColor = texelColor * colDiffuse * fragColor;
}
";

const DEFAULT_VS_GLES2: &str = "\
#version 100
attribute vec3 vertexPosition;
attribute vec2 vertexTexCoord;
attribute vec4 vertexColor;
varying vec2 fragTexCoord;
varying vec4 fragColor;
uniform mat4 mvp;
void main()
{
    fragTexCoord = vertexTexCoord;
    fragColor = vertexColor;
    gl_Position = mvp * vec4(vertexPosition, 1.0);
}
";

const DEFAULT_FS_GLES2: &str = "\
#version 100
precision mediump float;
varying vec2 fragTexCoord;
varying vec4 fragColor;
uniform sampler2D texture0;
uniform vec4 colDiffuse;
void main()
{
    vec4 texelColor = texture2D(texture0, fragTexCoord);
    gl_FragColor = texelColor * colDiffuse * fragColor;
}
";

const DEFAULT_VS_GLES3: &str = "\
#version 300 es
in vec3 vertexPosition;
in vec2 vertexTexCoord;
in vec4 vertexColor;
out vec2 fragTexCoord;
out vec4 fragColor;
uniform mat4 mvp;
void main()
{
    fragTexCoord = vertexTexCoord;
    fragColor = vertexColor;
    gl_Position = mvp * vec4(vertexPosition, 1.0);
}
";

const DEFAULT_FS_GLES3: &str = "\
#version 300 es
precision mediump float;
in vec2 fragTexCoord;
in vec4 fragColor;
out vec4 finalColor;
uniform sampler2D texture0;
uniform vec4 colDiffuse;
void main()
{
    vec4 texelColor = texture(texture0, fragTexCoord);
    finalColor = texelColor * colDiffuse * fragColor;
}
";

/// Embedded default shader sources for `profile`.
pub(crate) fn default_shader_sources(profile: GlProfile) -> (&'static str, &'static str) {
    match profile {
        GlProfile::Gl33 => (DEFAULT_VS_GL33, DEFAULT_FS_GL33),
        GlProfile::Gles2 => (DEFAULT_VS_GLES2, DEFAULT_FS_GLES2),
        GlProfile::Gles3 => (DEFAULT_VS_GLES3, DEFAULT_FS_GLES3),
    }
}

// =============================================================================
// Compilation and linking
// =============================================================================

fn compile(backend: &dyn GlBackend, source: &str, shader_type: u32) -> Option<u32> {
    let id = backend.create_shader(shader_type);
    if id == 0 {
        log::warn!("failed to create shader object");
        return None;
    }
    backend.shader_source(id, source);
    backend.compile_shader(id);
    if !backend.shader_compile_status(id) {
        log::warn!("shader compilation failed: {}", backend.shader_info_log(id));
        backend.delete_shader(id);
        return None;
    }
    Some(id)
}

/// Compiles and links a program from source, resolving the predefined
/// location slots. Returns the sentinel shader on failure.
pub(crate) fn load_shader_from_code(
    backend: &dyn GlBackend,
    vs_source: &str,
    fs_source: &str,
) -> Shader {
    let Some(vs) = compile(backend, vs_source, gl::VERTEX_SHADER) else {
        return Shader::invalid();
    };
    let Some(fs) = compile(backend, fs_source, gl::FRAGMENT_SHADER) else {
        backend.delete_shader(vs);
        return Shader::invalid();
    };

    let program = backend.create_program();
    backend.attach_shader(program, vs);
    backend.attach_shader(program, fs);

    // Pin the default vertex layout so every program shares attribute
    // indices with the batch and mesh paths.
    backend.bind_attrib_location(program, ATTRIB_POSITION, "vertexPosition");
    backend.bind_attrib_location(program, ATTRIB_TEXCOORD, "vertexTexCoord");
    backend.bind_attrib_location(program, ATTRIB_NORMAL, "vertexNormal");
    backend.bind_attrib_location(program, ATTRIB_COLOR, "vertexColor");
    backend.bind_attrib_location(program, ATTRIB_TANGENT, "vertexTangent");
    backend.bind_attrib_location(program, ATTRIB_TEXCOORD2, "vertexTexCoord2");

    backend.link_program(program);

    // Shader objects can go regardless of the link outcome.
    backend.delete_shader(vs);
    backend.delete_shader(fs);

    if !backend.program_link_status(program) {
        log::warn!(
            "shader program linking failed: {}",
            backend.program_info_log(program)
        );
        backend.delete_program(program);
        return Shader::invalid();
    }

    let mut shader = Shader {
        id: program,
        locs: [-1; MAX_SHADER_LOCATIONS],
    };
    resolve_locations(backend, &mut shader);
    shader
}

/// Fills the location slots by querying the program for the canonical
/// attribute and uniform names.
fn resolve_locations(backend: &dyn GlBackend, shader: &mut Shader) {
    let attrib = |name: &str| backend.get_attrib_location(shader.id, name);
    let uniform = |name: &str| backend.get_uniform_location(shader.id, name);

    shader.locs[ShaderLoc::VertexPosition as usize] = attrib("vertexPosition");
    shader.locs[ShaderLoc::VertexTexcoord01 as usize] = attrib("vertexTexCoord");
    shader.locs[ShaderLoc::VertexTexcoord02 as usize] = attrib("vertexTexCoord2");
    shader.locs[ShaderLoc::VertexNormal as usize] = attrib("vertexNormal");
    shader.locs[ShaderLoc::VertexTangent as usize] = attrib("vertexTangent");
    shader.locs[ShaderLoc::VertexColor as usize] = attrib("vertexColor");

    shader.locs[ShaderLoc::MatrixMvp as usize] = uniform("mvp");
    shader.locs[ShaderLoc::MatrixModel as usize] = uniform("matModel");
    shader.locs[ShaderLoc::MatrixView as usize] = uniform("matView");
    shader.locs[ShaderLoc::MatrixProjection as usize] = uniform("matProjection");
    shader.locs[ShaderLoc::VectorView as usize] = uniform("viewPos");

    shader.locs[ShaderLoc::ColorDiffuse as usize] = uniform("colDiffuse");
    shader.locs[ShaderLoc::ColorSpecular as usize] = uniform("colSpecular");
    shader.locs[ShaderLoc::ColorAmbient as usize] = uniform("colAmbient");

    shader.locs[ShaderLoc::MapAlbedo as usize] = uniform("texture0");
    shader.locs[ShaderLoc::MapMetalness as usize] = uniform("texture1");
    shader.locs[ShaderLoc::MapNormal as usize] = uniform("texture2");
    shader.locs[ShaderLoc::MapRoughness as usize] = uniform("texture3");
    shader.locs[ShaderLoc::MapOcclusion as usize] = uniform("texture4");
    shader.locs[ShaderLoc::MapEmission as usize] = uniform("texture5");
    shader.locs[ShaderLoc::MapHeight as usize] = uniform("texture6");
    shader.locs[ShaderLoc::MapCubemap as usize] = uniform("cubemap");
    shader.locs[ShaderLoc::MapIrradiance as usize] = uniform("irradianceMap");
    shader.locs[ShaderLoc::MapPrefilter as usize] = uniform("prefilterMap");
    shader.locs[ShaderLoc::MapBrdf as usize] = uniform("brdfLUT");
}

/// Releases the program. The sentinel shader is ignored.
pub(crate) fn unload_shader(backend: &dyn GlBackend, shader: Shader) {
    if shader.id != 0 {
        backend.delete_program(shader.id);
    }
}

// =============================================================================
// Context operations
// =============================================================================

impl crate::context::RenderContext {
    /// Compiles a custom shader. `None` for either stage substitutes the
    /// default source of the context's profile.
    pub fn load_shader(&mut self, vs_source: Option<&str>, fs_source: Option<&str>) -> Shader {
        let (default_vs, default_fs) = default_shader_sources(self.backend.profile());
        load_shader_from_code(
            self.backend.as_ref(),
            vs_source.unwrap_or(default_vs),
            fs_source.unwrap_or(default_fs),
        )
    }

    /// Releases a custom shader. The context's default shader is ignored:
    /// it lives until [`Self::close`].
    pub fn unload_custom_shader(&mut self, shader: Shader) {
        if shader.id == self.default_shader.id {
            return;
        }
        unload_shader(self.backend.as_ref(), shader);
    }

    /// Uniform location by name, `-1` when absent.
    pub fn shader_location(&self, shader: Shader, name: &str) -> i32 {
        if !shader.is_valid() {
            return -1;
        }
        self.backend.get_uniform_location(shader.id, name)
    }

    pub fn set_shader_value_i32(&mut self, shader: Shader, location: i32, value: i32) {
        if location < 0 {
            return;
        }
        self.backend.use_program(shader.id);
        self.backend.uniform_1i(location, value);
    }

    pub fn set_shader_value_f32(&mut self, shader: Shader, location: i32, value: f32) {
        if location < 0 {
            return;
        }
        self.backend.use_program(shader.id);
        self.backend.uniform_1f(location, value);
    }

    pub fn set_shader_value_vec2(&mut self, shader: Shader, location: i32, value: [f32; 2]) {
        if location < 0 {
            return;
        }
        self.backend.use_program(shader.id);
        self.backend.uniform_2f(location, value[0], value[1]);
    }

    pub fn set_shader_value_vec3(&mut self, shader: Shader, location: i32, value: [f32; 3]) {
        if location < 0 {
            return;
        }
        self.backend.use_program(shader.id);
        self.backend.uniform_3f(location, value[0], value[1], value[2]);
    }

    pub fn set_shader_value_vec4(&mut self, shader: Shader, location: i32, value: [f32; 4]) {
        if location < 0 {
            return;
        }
        self.backend.use_program(shader.id);
        self.backend
            .uniform_4f(location, value[0], value[1], value[2], value[3]);
    }

    pub fn set_shader_value_matrix(
        &mut self,
        shader: Shader,
        location: i32,
        value: crate::math::Matrix4<f32>,
    ) {
        if location < 0 {
            return;
        }
        self.backend.use_program(shader.id);
        self.backend
            .uniform_matrix4(location, &crate::math::matrix_cells(&value));
    }
}
