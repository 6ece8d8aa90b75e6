//! Meshes, materials, models and CPU skinning.
//!
//! A [`Mesh`] owns parallel vertex streams plus up to seven GPU buffers;
//! [`RenderContext::upload_mesh`] wires them against the default attribute
//! layout and [`RenderContext::draw_mesh`] submits with a material's
//! shader, bypassing the immediate-mode batch entirely.
//!
//! Skeletal animation runs on the CPU: [`RenderContext::update_model_animation`]
//! rewrites the animated position/normal streams from the bind pose and a
//! frame pose, then patches the GPU buffers in place.

use crate::context::RenderContext;
use crate::math::{Color, Matrix4, Quaternion, Vector3};
use crate::shader::{
    Shader, ShaderLoc, ATTRIB_COLOR, ATTRIB_NORMAL, ATTRIB_POSITION, ATTRIB_TANGENT,
    ATTRIB_TEXCOORD, ATTRIB_TEXCOORD2,
};
use crate::texture::Texture;
use cgmath::{Deg, ElementWise, InnerSpace, Rotation, SquareMatrix};

/// Material map slots carried by every material.
pub const MAX_MATERIAL_MAPS: usize = 12;
/// Bone influences per vertex.
pub const BONES_PER_VERTEX: usize = 4;

// =============================================================================
// Mesh
// =============================================================================

/// Which vertex stream a partial update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshStream {
    Positions,
    Texcoords,
    Texcoords2,
    Normals,
    Tangents,
    Colors,
    Indices,
}

/// A vertex-stream mesh. Either unindexed (`indices` empty,
/// `triangle_count == vertex_count / 3`) or indexed
/// (`triangle_count == indices.len() / 3`).
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertex_count: usize,
    pub triangle_count: usize,

    /// XYZ positions, 3 floats per vertex. Always present.
    pub vertices: Vec<f32>,
    /// First UV set, 2 floats per vertex.
    pub texcoords: Vec<f32>,
    /// Second UV set, 2 floats per vertex.
    pub texcoords2: Vec<f32>,
    /// Normals, 3 floats per vertex.
    pub normals: Vec<f32>,
    /// Tangents, 4 floats per vertex.
    pub tangents: Vec<f32>,
    /// Vertex colors, 4 bytes per vertex.
    pub colors: Vec<u8>,
    pub indices: Vec<u16>,

    /// Skinned positions, rewritten per animation frame.
    pub anim_vertices: Vec<f32>,
    /// Skinned normals, rewritten per animation frame.
    pub anim_normals: Vec<f32>,
    /// Bone indices, 4 per vertex.
    pub bone_ids: Vec<i32>,
    /// Bone weights, 4 per vertex.
    pub bone_weights: Vec<f32>,

    pub(crate) vao: u32,
    pub(crate) vbo: [u32; 7],
}

impl Mesh {
    /// Builds a mesh from caller arrays, deriving the counts.
    pub fn from_arrays(vertices: Vec<f32>, texcoords: Vec<f32>, normals: Vec<f32>, indices: Vec<u16>) -> Mesh {
        let vertex_count = vertices.len() / 3;
        let triangle_count = if indices.is_empty() {
            vertex_count / 3
        } else {
            indices.len() / 3
        };
        Mesh {
            vertex_count,
            triangle_count,
            vertices,
            texcoords,
            normals,
            indices,
            ..Default::default()
        }
    }

    pub fn is_uploaded(&self) -> bool {
        self.vbo[0] != 0
    }

    /// Element capacity of a stream, counted in that stream's elements.
    fn stream_len(&self, stream: MeshStream) -> usize {
        match stream {
            MeshStream::Indices => self.indices.len(),
            _ => self.vertex_count,
        }
    }

    /// Bytes per element of a stream.
    fn stream_stride(stream: MeshStream) -> usize {
        match stream {
            MeshStream::Positions | MeshStream::Normals => 3 * 4,
            MeshStream::Texcoords | MeshStream::Texcoords2 => 2 * 4,
            MeshStream::Tangents => 4 * 4,
            MeshStream::Colors => 4,
            MeshStream::Indices => 2,
        }
    }

    fn stream_buffer(&self, stream: MeshStream) -> u32 {
        match stream {
            MeshStream::Positions => self.vbo[0],
            MeshStream::Texcoords => self.vbo[1],
            MeshStream::Texcoords2 => self.vbo[2],
            MeshStream::Normals => self.vbo[3],
            MeshStream::Tangents => self.vbo[4],
            MeshStream::Colors => self.vbo[5],
            MeshStream::Indices => self.vbo[6],
        }
    }
}

// =============================================================================
// Materials
// =============================================================================

/// Meaning of each material map slot; the discriminant is the slot index
/// and the texture unit the map binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum MaterialMapType {
    Albedo = 0,
    Metalness = 1,
    Normal = 2,
    Roughness = 3,
    Occlusion = 4,
    Emission = 5,
    Height = 6,
    Cubemap = 7,
    Irradiance = 8,
    Prefilter = 9,
    Brdf = 10,
}

impl MaterialMapType {
    /// Shader location slot carrying this map's sampler.
    fn sampler_loc(self) -> ShaderLoc {
        match self {
            MaterialMapType::Albedo => ShaderLoc::MapAlbedo,
            MaterialMapType::Metalness => ShaderLoc::MapMetalness,
            MaterialMapType::Normal => ShaderLoc::MapNormal,
            MaterialMapType::Roughness => ShaderLoc::MapRoughness,
            MaterialMapType::Occlusion => ShaderLoc::MapOcclusion,
            MaterialMapType::Emission => ShaderLoc::MapEmission,
            MaterialMapType::Height => ShaderLoc::MapHeight,
            MaterialMapType::Cubemap => ShaderLoc::MapCubemap,
            MaterialMapType::Irradiance => ShaderLoc::MapIrradiance,
            MaterialMapType::Prefilter => ShaderLoc::MapPrefilter,
            MaterialMapType::Brdf => ShaderLoc::MapBrdf,
        }
    }

    /// Cube-mapped slots bind to the cubemap target instead of 2D.
    fn is_cubemap(self) -> bool {
        matches!(
            self,
            MaterialMapType::Cubemap | MaterialMapType::Irradiance | MaterialMapType::Prefilter
        )
    }

    const ALL: [MaterialMapType; 11] = [
        MaterialMapType::Albedo,
        MaterialMapType::Metalness,
        MaterialMapType::Normal,
        MaterialMapType::Roughness,
        MaterialMapType::Occlusion,
        MaterialMapType::Emission,
        MaterialMapType::Height,
        MaterialMapType::Cubemap,
        MaterialMapType::Irradiance,
        MaterialMapType::Prefilter,
        MaterialMapType::Brdf,
    ];
}

/// One texture slot of a material: texture, tint and a free scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialMap {
    pub texture: Texture,
    pub color: Color,
    pub value: f32,
}

impl Default for MaterialMap {
    fn default() -> Self {
        MaterialMap {
            texture: Texture::invalid(),
            color: Color::WHITE,
            value: 0.0,
        }
    }
}

/// A shader plus its map slots and generic parameters.
#[derive(Debug, Clone)]
pub struct Material {
    pub shader: Shader,
    pub maps: [MaterialMap; MAX_MATERIAL_MAPS],
    pub params: Vec<f32>,
}

impl Material {
    pub fn map(&self, map: MaterialMapType) -> &MaterialMap {
        &self.maps[map as usize]
    }

    pub fn map_mut(&mut self, map: MaterialMapType) -> &mut MaterialMap {
        &mut self.maps[map as usize]
    }
}

// =============================================================================
// Models and animation
// =============================================================================

/// A joint transform: translation, rotation, scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            translation: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::new(1.0, 0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

/// Skeleton joint metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoneInfo {
    pub name: String,
    /// Parent joint index, `-1` for roots.
    pub parent: i32,
}

/// Meshes, materials and an optional skeleton under one world transform.
#[derive(Debug, Clone)]
pub struct Model {
    pub transform: Matrix4<f32>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    /// Material index per mesh.
    pub mesh_material: Vec<usize>,
    pub bones: Vec<BoneInfo>,
    pub bind_pose: Vec<Transform>,
}

impl Default for Model {
    fn default() -> Self {
        Model {
            transform: Matrix4::identity(),
            meshes: Vec::new(),
            materials: Vec::new(),
            mesh_material: Vec::new(),
            bones: Vec::new(),
            bind_pose: Vec::new(),
        }
    }
}

impl Model {
    pub fn from_mesh(mesh: Mesh, material: Material) -> Model {
        Model {
            transform: Matrix4::identity(),
            meshes: vec![mesh],
            materials: vec![material],
            mesh_material: vec![0],
            bones: Vec::new(),
            bind_pose: Vec::new(),
        }
    }
}

/// Per-frame joint poses for a skeleton.
#[derive(Debug, Clone)]
pub struct ModelAnimation {
    pub bones: Vec<BoneInfo>,
    /// `frame_poses[frame][bone]`.
    pub frame_poses: Vec<Vec<Transform>>,
}

impl ModelAnimation {
    pub fn frame_count(&self) -> usize {
        self.frame_poses.len()
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }
}

// =============================================================================
// Parametric meshes
// =============================================================================

/// Axis-aligned cube centered on the origin: 24 vertices, 12 triangles.
pub fn gen_mesh_cube(width: f32, height: f32, length: f32) -> Mesh {
    let (x, y, z) = (width / 2.0, height / 2.0, length / 2.0);

    #[rustfmt::skip]
    let vertices: Vec<f32> = vec![
        // front
        -x, -y,  z,   x, -y,  z,   x,  y,  z,  -x,  y,  z,
        // back
        -x, -y, -z,  -x,  y, -z,   x,  y, -z,   x, -y, -z,
        // top
        -x,  y, -z,  -x,  y,  z,   x,  y,  z,   x,  y, -z,
        // bottom
        -x, -y, -z,   x, -y, -z,   x, -y,  z,  -x, -y,  z,
        // right
         x, -y, -z,   x,  y, -z,   x,  y,  z,   x, -y,  z,
        // left
        -x, -y, -z,  -x, -y,  z,  -x,  y,  z,  -x,  y, -z,
    ];
    #[rustfmt::skip]
    let normals: Vec<f32> = vec![
         0.0,  0.0,  1.0,   0.0,  0.0,  1.0,   0.0,  0.0,  1.0,   0.0,  0.0,  1.0,
         0.0,  0.0, -1.0,   0.0,  0.0, -1.0,   0.0,  0.0, -1.0,   0.0,  0.0, -1.0,
         0.0,  1.0,  0.0,   0.0,  1.0,  0.0,   0.0,  1.0,  0.0,   0.0,  1.0,  0.0,
         0.0, -1.0,  0.0,   0.0, -1.0,  0.0,   0.0, -1.0,  0.0,   0.0, -1.0,  0.0,
         1.0,  0.0,  0.0,   1.0,  0.0,  0.0,   1.0,  0.0,  0.0,   1.0,  0.0,  0.0,
        -1.0,  0.0,  0.0,  -1.0,  0.0,  0.0,  -1.0,  0.0,  0.0,  -1.0,  0.0,  0.0,
    ];
    let mut texcoords = Vec::with_capacity(24 * 2);
    for _ in 0..6 {
        texcoords.extend_from_slice(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]);
    }
    let mut indices = Vec::with_capacity(36);
    for face in 0..6u16 {
        let base = face * 4;
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    Mesh::from_arrays(vertices, texcoords, normals, indices)
}

/// Flat XZ plane centered on the origin, facing +Y.
pub fn gen_mesh_plane(width: f32, length: f32) -> Mesh {
    let (x, z) = (width / 2.0, length / 2.0);
    let vertices = vec![-x, 0.0, -z, -x, 0.0, z, x, 0.0, z, x, 0.0, -z];
    let texcoords = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0];
    let normals = vec![0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0];
    let indices = vec![0, 1, 2, 0, 2, 3];
    Mesh::from_arrays(vertices, texcoords, normals, indices)
}

// =============================================================================
// Context operations
// =============================================================================

impl RenderContext {
    /// A material over the default shader with the default texture in the
    /// albedo slot.
    pub fn default_material(&self) -> Material {
        let mut material = Material {
            shader: self.default_shader(),
            maps: [MaterialMap::default(); MAX_MATERIAL_MAPS],
            params: Vec::new(),
        };
        material.map_mut(MaterialMapType::Albedo).texture = self.default_texture();
        material
    }

    /// Uploads every present vertex stream to its own buffer and wires the
    /// default attribute layout. Missing attributes are disabled with
    /// constant defaults (white color, zero tangent, zero second UV).
    pub fn upload_mesh(&mut self, mesh: &mut Mesh, dynamic: bool) {
        if mesh.is_uploaded() {
            log::warn!("mesh is already uploaded");
            return;
        }
        let usage = if dynamic { gl::DYNAMIC_DRAW } else { gl::STATIC_DRAW };

        if self.caps.vao {
            mesh.vao = self.backend.gen_vertex_array();
            self.backend.bind_vertex_array(mesh.vao);
        }

        mesh.vbo[0] = self.backend.gen_buffer();
        self.backend.bind_buffer(gl::ARRAY_BUFFER, mesh.vbo[0]);
        self.backend
            .buffer_data(gl::ARRAY_BUFFER, bytemuck::cast_slice(&mesh.vertices), usage);
        self.backend
            .vertex_attrib_pointer(ATTRIB_POSITION, 3, gl::FLOAT, false, 0, 0);
        self.backend.enable_vertex_attrib_array(ATTRIB_POSITION);

        if !mesh.texcoords.is_empty() {
            mesh.vbo[1] = self.backend.gen_buffer();
            self.backend.bind_buffer(gl::ARRAY_BUFFER, mesh.vbo[1]);
            self.backend
                .buffer_data(gl::ARRAY_BUFFER, bytemuck::cast_slice(&mesh.texcoords), usage);
            self.backend
                .vertex_attrib_pointer(ATTRIB_TEXCOORD, 2, gl::FLOAT, false, 0, 0);
            self.backend.enable_vertex_attrib_array(ATTRIB_TEXCOORD);
        } else {
            self.backend.disable_vertex_attrib_array(ATTRIB_TEXCOORD);
            self.backend.vertex_attrib_2f(ATTRIB_TEXCOORD, 0.0, 0.0);
        }

        if !mesh.texcoords2.is_empty() {
            mesh.vbo[2] = self.backend.gen_buffer();
            self.backend.bind_buffer(gl::ARRAY_BUFFER, mesh.vbo[2]);
            self.backend
                .buffer_data(gl::ARRAY_BUFFER, bytemuck::cast_slice(&mesh.texcoords2), usage);
            self.backend
                .vertex_attrib_pointer(ATTRIB_TEXCOORD2, 2, gl::FLOAT, false, 0, 0);
            self.backend.enable_vertex_attrib_array(ATTRIB_TEXCOORD2);
        } else {
            self.backend.disable_vertex_attrib_array(ATTRIB_TEXCOORD2);
            self.backend.vertex_attrib_2f(ATTRIB_TEXCOORD2, 0.0, 0.0);
        }

        if !mesh.normals.is_empty() {
            mesh.vbo[3] = self.backend.gen_buffer();
            self.backend.bind_buffer(gl::ARRAY_BUFFER, mesh.vbo[3]);
            self.backend
                .buffer_data(gl::ARRAY_BUFFER, bytemuck::cast_slice(&mesh.normals), usage);
            self.backend
                .vertex_attrib_pointer(ATTRIB_NORMAL, 3, gl::FLOAT, false, 0, 0);
            self.backend.enable_vertex_attrib_array(ATTRIB_NORMAL);
        } else {
            self.backend.disable_vertex_attrib_array(ATTRIB_NORMAL);
            self.backend.vertex_attrib_3f(ATTRIB_NORMAL, 0.0, 0.0, 1.0);
        }

        if !mesh.tangents.is_empty() {
            mesh.vbo[4] = self.backend.gen_buffer();
            self.backend.bind_buffer(gl::ARRAY_BUFFER, mesh.vbo[4]);
            self.backend
                .buffer_data(gl::ARRAY_BUFFER, bytemuck::cast_slice(&mesh.tangents), usage);
            self.backend
                .vertex_attrib_pointer(ATTRIB_TANGENT, 4, gl::FLOAT, false, 0, 0);
            self.backend.enable_vertex_attrib_array(ATTRIB_TANGENT);
        } else {
            self.backend.disable_vertex_attrib_array(ATTRIB_TANGENT);
            self.backend.vertex_attrib_4f(ATTRIB_TANGENT, 0.0, 0.0, 0.0, 0.0);
        }

        if !mesh.colors.is_empty() {
            mesh.vbo[5] = self.backend.gen_buffer();
            self.backend.bind_buffer(gl::ARRAY_BUFFER, mesh.vbo[5]);
            self.backend.buffer_data(gl::ARRAY_BUFFER, &mesh.colors, usage);
            self.backend
                .vertex_attrib_pointer(ATTRIB_COLOR, 4, gl::UNSIGNED_BYTE, true, 0, 0);
            self.backend.enable_vertex_attrib_array(ATTRIB_COLOR);
        } else {
            self.backend.disable_vertex_attrib_array(ATTRIB_COLOR);
            self.backend.vertex_attrib_4f(ATTRIB_COLOR, 1.0, 1.0, 1.0, 1.0);
        }

        if !mesh.indices.is_empty() {
            mesh.vbo[6] = self.backend.gen_buffer();
            self.backend.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, mesh.vbo[6]);
            self.backend.buffer_data(
                gl::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(&mesh.indices),
                usage,
            );
        }

        if self.caps.vao {
            self.backend.bind_vertex_array(0);
        }
    }

    /// Patches `element_count` elements of one stream starting at
    /// `element_offset`. An update that would run past the stream is
    /// skipped entirely; one that covers the whole stream replaces the
    /// buffer storage instead of patching.
    pub fn update_mesh_at(
        &mut self,
        mesh: &Mesh,
        stream: MeshStream,
        data: &[u8],
        element_offset: usize,
    ) {
        let stride = Mesh::stream_stride(stream);
        let element_count = data.len() / stride;
        let capacity = mesh.stream_len(stream);

        if element_offset + element_count > capacity {
            log::warn!(
                "mesh update of {element_count} elements at {element_offset} exceeds the stream ({capacity}), skipped"
            );
            return;
        }
        let buffer = mesh.stream_buffer(stream);
        if buffer == 0 {
            log::warn!("mesh stream {stream:?} has no GPU buffer");
            return;
        }

        let target = if stream == MeshStream::Indices {
            gl::ELEMENT_ARRAY_BUFFER
        } else {
            gl::ARRAY_BUFFER
        };
        self.backend.bind_buffer(target, buffer);
        if element_offset == 0 && element_count == capacity {
            self.backend.buffer_data(target, data, gl::DYNAMIC_DRAW);
        } else {
            self.backend
                .buffer_sub_data(target, (element_offset * stride) as isize, data);
        }
        self.backend.bind_buffer(target, 0);
    }

    /// Draws a mesh with a material and a model transform. The material's
    /// shader receives model/view/projection/MVP and every bound map.
    pub fn draw_mesh(&mut self, mesh: &Mesh, material: &Material, transform: Matrix4<f32>) {
        let shader = if material.shader.is_valid() {
            material.shader
        } else {
            self.default_shader
        };
        self.backend.use_program(shader.id);

        let view = self.stack.modelview();
        let projection = self.stack.projection();
        let mvp = projection * view * transform;

        let upload_matrix = |backend: &dyn crate::backend::GlBackend, loc: i32, m: &Matrix4<f32>| {
            if loc >= 0 {
                backend.uniform_matrix4(loc, &crate::math::matrix_cells(m));
            }
        };
        upload_matrix(self.backend.as_ref(), shader.loc(ShaderLoc::MatrixModel), &transform);
        upload_matrix(self.backend.as_ref(), shader.loc(ShaderLoc::MatrixView), &view);
        upload_matrix(
            self.backend.as_ref(),
            shader.loc(ShaderLoc::MatrixProjection),
            &projection,
        );
        upload_matrix(self.backend.as_ref(), shader.loc(ShaderLoc::MatrixMvp), &mvp);

        let diffuse = material.map(MaterialMapType::Albedo).color.normalize();
        let loc = shader.loc(ShaderLoc::ColorDiffuse);
        if loc >= 0 {
            self.backend
                .uniform_4f(loc, diffuse.x, diffuse.y, diffuse.z, diffuse.w);
        }

        // Bind every occupied map slot to the unit matching its index.
        for map_type in MaterialMapType::ALL {
            let map = material.map(map_type);
            if map.texture.id == 0 {
                continue;
            }
            let unit = map_type as u32;
            self.backend.active_texture(unit);
            let target = if map_type.is_cubemap() {
                gl::TEXTURE_CUBE_MAP
            } else {
                gl::TEXTURE_2D
            };
            self.backend.bind_texture(target, map.texture.id);
            let loc = shader.loc(map_type.sampler_loc());
            if loc >= 0 {
                self.backend.uniform_1i(loc, unit as i32);
            }
        }

        if self.caps.vao {
            self.backend.bind_vertex_array(mesh.vao);
        } else {
            self.backend.bind_buffer(gl::ARRAY_BUFFER, mesh.vbo[0]);
            self.backend
                .vertex_attrib_pointer(ATTRIB_POSITION, 3, gl::FLOAT, false, 0, 0);
            self.backend.enable_vertex_attrib_array(ATTRIB_POSITION);
            if mesh.vbo[1] != 0 {
                self.backend.bind_buffer(gl::ARRAY_BUFFER, mesh.vbo[1]);
                self.backend
                    .vertex_attrib_pointer(ATTRIB_TEXCOORD, 2, gl::FLOAT, false, 0, 0);
                self.backend.enable_vertex_attrib_array(ATTRIB_TEXCOORD);
            }
            if mesh.vbo[3] != 0 {
                self.backend.bind_buffer(gl::ARRAY_BUFFER, mesh.vbo[3]);
                self.backend
                    .vertex_attrib_pointer(ATTRIB_NORMAL, 3, gl::FLOAT, false, 0, 0);
                self.backend.enable_vertex_attrib_array(ATTRIB_NORMAL);
            }
            if mesh.vbo[6] != 0 {
                self.backend.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, mesh.vbo[6]);
            }
        }

        if mesh.indices.is_empty() {
            self.backend
                .draw_arrays(gl::TRIANGLES, 0, mesh.vertex_count as i32);
        } else {
            self.backend
                .draw_elements_u16(gl::TRIANGLES, (mesh.triangle_count * 3) as i32, 0);
        }

        for map_type in MaterialMapType::ALL {
            if material.map(map_type).texture.id == 0 {
                continue;
            }
            self.backend.active_texture(map_type as u32);
            let target = if map_type.is_cubemap() {
                gl::TEXTURE_CUBE_MAP
            } else {
                gl::TEXTURE_2D
            };
            self.backend.bind_texture(target, 0);
        }
        self.backend.active_texture(0);
        if self.caps.vao {
            self.backend.bind_vertex_array(0);
        }
        self.backend.use_program(0);
    }

    /// Draws a model: composes scale, axis-angle rotation and translation
    /// into the stored transform and draws each mesh with its material,
    /// the diffuse color modulated by `tint`. The model itself is left
    /// untouched.
    pub fn draw_model(
        &mut self,
        model: &Model,
        position: Vector3<f32>,
        rotation_axis: Vector3<f32>,
        rotation_deg: f32,
        scale: Vector3<f32>,
        tint: Color,
    ) {
        let scale_m = Matrix4::from_nonuniform_scale(scale.x, scale.y, scale.z);
        let rotation = if rotation_axis.magnitude2() > 0.0 {
            Matrix4::from_axis_angle(rotation_axis.normalize(), Deg(rotation_deg))
        } else {
            Matrix4::identity()
        };
        let translation = Matrix4::from_translation(position);
        let transform = model.transform * (translation * rotation * scale_m);

        for (mesh_index, mesh) in model.meshes.iter().enumerate() {
            let material_index = model
                .mesh_material
                .get(mesh_index)
                .copied()
                .unwrap_or(0)
                .min(model.materials.len().saturating_sub(1));
            let Some(material) = model.materials.get(material_index) else {
                continue;
            };

            let mut tinted = material.clone();
            let base = tinted.map(MaterialMapType::Albedo).color;
            tinted.map_mut(MaterialMapType::Albedo).color = Color::new(
                (base.r as u16 * tint.r as u16 / 255) as u8,
                (base.g as u16 * tint.g as u16 / 255) as u8,
                (base.b as u16 * tint.b as u16 / 255) as u8,
                (base.a as u16 * tint.a as u16 / 255) as u8,
            );
            self.draw_mesh(mesh, &tinted, transform);
        }
    }

    /// Applies `anim`'s pose at `frame` to every skinned mesh: positions
    /// and normals are rewritten on the CPU and the GPU buffers patched.
    pub fn update_model_animation(
        &mut self,
        model: &mut Model,
        anim: &ModelAnimation,
        frame: usize,
    ) {
        if anim.frame_poses.is_empty() || model.bind_pose.is_empty() {
            return;
        }
        let frame = frame % anim.frame_count();
        let pose = &anim.frame_poses[frame];

        for mesh in model.meshes.iter_mut() {
            if mesh.bone_ids.is_empty() || mesh.bone_weights.is_empty() {
                continue;
            }
            if mesh.anim_vertices.len() != mesh.vertices.len() {
                mesh.anim_vertices = mesh.vertices.clone();
            }
            if mesh.anim_normals.len() != mesh.normals.len() {
                mesh.anim_normals = mesh.normals.clone();
            }

            for v in 0..mesh.vertex_count {
                let vertex = Vector3::new(
                    mesh.vertices[v * 3],
                    mesh.vertices[v * 3 + 1],
                    mesh.vertices[v * 3 + 2],
                );
                let normal = if mesh.normals.is_empty() {
                    None
                } else {
                    Some(Vector3::new(
                        mesh.normals[v * 3],
                        mesh.normals[v * 3 + 1],
                        mesh.normals[v * 3 + 2],
                    ))
                };

                let mut out_vertex = Vector3::new(0.0, 0.0, 0.0);
                let mut out_normal = Vector3::new(0.0, 0.0, 0.0);
                let mut total_weight = 0.0;

                for influence in 0..BONES_PER_VERTEX {
                    let weight = mesh.bone_weights[v * BONES_PER_VERTEX + influence];
                    if weight <= 0.0 {
                        continue;
                    }
                    let bone = mesh.bone_ids[v * BONES_PER_VERTEX + influence] as usize;
                    let (Some(bind), Some(out)) = (model.bind_pose.get(bone), pose.get(bone))
                    else {
                        continue;
                    };

                    // Rotation relative to the bind pose; scale is applied
                    // in bone-local space before the bind translation is
                    // removed.
                    let rotation = out.rotation * bind.rotation.conjugate();
                    let skinned = rotation
                        .rotate_vector(vertex.mul_element_wise(out.scale) - bind.translation)
                        + out.translation;
                    out_vertex += skinned * weight;
                    if let Some(n) = normal {
                        out_normal += rotation.rotate_vector(n) * weight;
                    }
                    total_weight += weight;
                }

                if total_weight > 0.0 {
                    mesh.anim_vertices[v * 3] = out_vertex.x;
                    mesh.anim_vertices[v * 3 + 1] = out_vertex.y;
                    mesh.anim_vertices[v * 3 + 2] = out_vertex.z;
                    if normal.is_some() {
                        mesh.anim_normals[v * 3] = out_normal.x;
                        mesh.anim_normals[v * 3 + 1] = out_normal.y;
                        mesh.anim_normals[v * 3 + 2] = out_normal.z;
                    }
                }
            }

            // Patch the static buffers in place; the draw path reads
            // whichever data was uploaded last.
            if mesh.vbo[0] != 0 {
                let data = bytemuck::cast_slice(&mesh.anim_vertices).to_vec();
                self.update_mesh_at(mesh, MeshStream::Positions, &data, 0);
            }
            if mesh.vbo[3] != 0 && !mesh.anim_normals.is_empty() {
                let data = bytemuck::cast_slice(&mesh.anim_normals).to_vec();
                self.update_mesh_at(mesh, MeshStream::Normals, &data, 0);
            }
        }
    }

    /// Releases a mesh's GPU buffers.
    pub fn unload_mesh(&mut self, mesh: &mut Mesh) {
        for vbo in mesh.vbo {
            if vbo != 0 {
                self.backend.delete_buffer(vbo);
            }
        }
        if mesh.vao != 0 {
            self.backend.delete_vertex_array(mesh.vao);
        }
        mesh.vao = 0;
        mesh.vbo = [0; 7];
    }

    /// Releases a model's meshes. Materials keep their textures: whoever
    /// loaded them owns them.
    pub fn unload_model(&mut self, model: &mut Model) {
        let mut meshes = std::mem::take(&mut model.meshes);
        for mesh in meshes.iter_mut() {
            self.unload_mesh(mesh);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::DrawSubmission;
    use crate::test_support::test_context;

    #[test]
    fn test_mesh_from_arrays_counts() {
        let mesh = Mesh::from_arrays(vec![0.0; 9], vec![0.0; 6], vec![0.0; 9], Vec::new());
        assert_eq!(mesh.vertex_count, 3);
        assert_eq!(mesh.triangle_count, 1);

        let indexed = Mesh::from_arrays(vec![0.0; 12], Vec::new(), Vec::new(), vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(indexed.vertex_count, 4);
        assert_eq!(indexed.triangle_count, 2);
    }

    #[test]
    fn test_gen_mesh_cube_shape() {
        let cube = gen_mesh_cube(2.0, 2.0, 2.0);
        assert_eq!(cube.vertex_count, 24);
        assert_eq!(cube.triangle_count, 12);
        assert_eq!(cube.normals.len(), 24 * 3);
        // All corners lie on the half-extent.
        assert!(cube.vertices.iter().all(|v| v.abs() == 1.0));
    }

    #[test]
    fn test_upload_mesh_allocates_buffers() {
        let (mut ctx, _) = test_context();
        let mut mesh = gen_mesh_plane(1.0, 1.0);
        ctx.upload_mesh(&mut mesh, false);
        assert!(mesh.is_uploaded());
        assert_ne!(mesh.vbo[0], 0);
        assert_ne!(mesh.vbo[6], 0); // index buffer
        assert_eq!(mesh.vbo[4], 0); // no tangents
        ctx.unload_mesh(&mut mesh);
        assert!(!mesh.is_uploaded());
    }

    #[test]
    fn test_draw_mesh_submits_indexed() {
        let (mut ctx, backend) = test_context();
        let mut mesh = gen_mesh_cube(1.0, 1.0, 1.0);
        ctx.upload_mesh(&mut mesh, false);
        let material = ctx.default_material();
        backend.clear_log();
        ctx.draw_mesh(&mesh, &material, Matrix4::identity());
        let draws = backend.draws();
        assert_eq!(
            draws,
            vec![DrawSubmission::Elements {
                mode: gl::TRIANGLES,
                count: 36,
                element_offset: 0
            }]
        );
    }

    #[test]
    fn test_draw_mesh_unindexed_uses_arrays() {
        let (mut ctx, backend) = test_context();
        let mut mesh = Mesh::from_arrays(vec![0.0; 9], Vec::new(), Vec::new(), Vec::new());
        ctx.upload_mesh(&mut mesh, false);
        let material = ctx.default_material();
        backend.clear_log();
        ctx.draw_mesh(&mesh, &material, Matrix4::identity());
        assert_eq!(
            backend.draws(),
            vec![DrawSubmission::Arrays {
                mode: gl::TRIANGLES,
                first: 0,
                count: 3
            }]
        );
    }

    #[test]
    fn test_update_mesh_at_skips_overflow() {
        let (mut ctx, backend) = test_context();
        let mut mesh = gen_mesh_plane(1.0, 1.0);
        ctx.upload_mesh(&mut mesh, true);
        backend.clear_log();

        // 5 positions into a 4-vertex stream: skipped, no upload.
        let too_much = vec![0u8; 5 * 12];
        ctx.update_mesh_at(&mesh, MeshStream::Positions, &too_much, 0);
        assert!(backend.sub_data_uploads().is_empty());

        // Partial update patches in place.
        let partial = vec![0u8; 2 * 12];
        ctx.update_mesh_at(&mesh, MeshStream::Positions, &partial, 1);
        assert_eq!(backend.sub_data_uploads().len(), 1);
    }

    #[test]
    fn test_skinning_identity_pose_keeps_vertices() {
        let (mut ctx, _) = test_context();
        let mut mesh = gen_mesh_plane(2.0, 2.0);
        mesh.bone_ids = vec![0; mesh.vertex_count * BONES_PER_VERTEX];
        let mut weights = vec![0.0; mesh.vertex_count * BONES_PER_VERTEX];
        for v in 0..mesh.vertex_count {
            weights[v * BONES_PER_VERTEX] = 1.0;
        }
        mesh.bone_weights = weights;

        let mut model = Model::from_mesh(mesh, ctx.default_material());
        model.bones = vec![BoneInfo {
            name: "root".to_string(),
            parent: -1,
        }];
        model.bind_pose = vec![Transform::default()];

        let anim = ModelAnimation {
            bones: model.bones.clone(),
            frame_poses: vec![vec![Transform::default()]],
        };

        ctx.update_model_animation(&mut model, &anim, 0);
        let mesh = &model.meshes[0];
        assert_eq!(mesh.anim_vertices, mesh.vertices);
        assert_eq!(mesh.anim_normals, mesh.normals);
    }

    #[test]
    fn test_skinning_translation_moves_vertices() {
        let (mut ctx, _) = test_context();
        let mut mesh = gen_mesh_plane(2.0, 2.0);
        mesh.bone_ids = vec![0; mesh.vertex_count * BONES_PER_VERTEX];
        let mut weights = vec![0.0; mesh.vertex_count * BONES_PER_VERTEX];
        for v in 0..mesh.vertex_count {
            weights[v * BONES_PER_VERTEX] = 1.0;
        }
        mesh.bone_weights = weights;

        let mut model = Model::from_mesh(mesh, ctx.default_material());
        model.bind_pose = vec![Transform::default()];

        let mut moved = Transform::default();
        moved.translation = Vector3::new(0.0, 5.0, 0.0);
        let anim = ModelAnimation {
            bones: Vec::new(),
            frame_poses: vec![vec![moved]],
        };

        ctx.update_model_animation(&mut model, &anim, 0);
        let mesh = &model.meshes[0];
        for v in 0..mesh.vertex_count {
            assert_eq!(mesh.anim_vertices[v * 3 + 1], mesh.vertices[v * 3 + 1] + 5.0);
        }
    }

    #[test]
    fn test_animation_frame_wraps() {
        let (mut ctx, _) = test_context();
        let mesh = gen_mesh_plane(1.0, 1.0);
        let mut model = Model::from_mesh(mesh, ctx.default_material());
        model.bind_pose = vec![Transform::default()];
        let anim = ModelAnimation {
            bones: Vec::new(),
            frame_poses: vec![vec![Transform::default()], vec![Transform::default()]],
        };
        // Out-of-range frames wrap instead of panicking.
        ctx.update_model_animation(&mut model, &anim, 7);
    }

    #[test]
    fn test_material_map_access() {
        let (ctx, _) = test_context();
        let mut material = ctx.default_material();
        assert_eq!(material.map(MaterialMapType::Albedo).texture, ctx.default_texture());
        material.map_mut(MaterialMapType::Normal).value = 0.5;
        assert_eq!(material.maps[2].value, 0.5);
    }
}
