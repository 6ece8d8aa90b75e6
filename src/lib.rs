//! Vermilion, a batched 2D/3D rendering library over OpenGL 3.3 core and
//! OpenGL ES 2/3.
//!
//! The crate turns application-level draw intent (shapes, textured quads,
//! text, meshes) into grouped GPU submissions, and ships the CPU-side asset
//! pipeline feeding them: pixel-format conversion and image manipulation,
//! font atlas building, mesh upload.
//!
//! # Architecture
//!
//! - [`backend`]: the GPU call surface as a trait object, one concrete
//!   implementation per context profile family
//! - [`context`]: bootstrap, capability probing, viewport policy
//! - [`batch`]: immediate-mode vertex emission and the flush pipeline
//! - [`matrix_stack`]: fixed-function style transform stack
//! - [`texture`] / [`shader`]: GPU resource managers
//! - [`pixels`]: CPU images, 21 pixel formats, conversions and generators
//! - [`font`] / [`text`]: atlas building, measurement, word-wrap drawing
//! - [`mesh`]: vertex-stream meshes, materials, models, skinning
//! - [`collision`]: ray intersection helpers
//!
//! The windowing host, file I/O and codecs stay outside: every loader takes
//! byte slices already in memory, and the GL context must be current on the
//! calling thread before [`context::RenderContext::new`] runs.
//!
//! # Example
//!
//! ```rust,ignore
//! use vermilion::prelude::*;
//!
//! let backend = Box::new(OpenGlBackend::new(GlProfile::Gl33));
//! let mut ctx = RenderContext::new(backend, BatchMemory::new(), 800, 450);
//!
//! // per frame:
//! ctx.clear_background(Color::RAYWHITE);
//! ctx.draw_rectangle(Rect::new(100.0, 100.0, 64.0, 64.0), Color::RED);
//! ctx.draw_text("hello", 10.0, 10.0, 20.0, Color::DARKGRAY);
//! ctx.draw_batch();
//! ```

pub mod backend;
pub mod batch;
pub mod camera;
pub mod collision;
pub mod context;
mod default_font;
pub mod error;
pub mod font;
pub mod logger;
pub mod math;
pub mod matrix_stack;
pub mod mesh;
pub mod pixels;
pub mod shader;
pub mod shapes;
pub mod text;
pub mod texture;

/// The common imports in one place.
pub mod prelude {
    pub use crate::backend::{GlProfile, OpenGlBackend};
    pub use crate::batch::{BatchMemory, BlendMode, DrawMode};
    pub use crate::camera::{Camera2D, Camera3D, CameraProjection};
    pub use crate::collision::{BoundingBox, Ray, RayHitInfo};
    pub use crate::context::RenderContext;
    pub use crate::error::{RenderError, RenderResult};
    pub use crate::font::{AtlasPackMethod, Font, FontAtlas, FontType, GlyphInfo};
    pub use crate::math::{Color, Rect, Size};
    pub use crate::mesh::{Material, MaterialMap, MaterialMapType, Mesh, Model, ModelAnimation};
    pub use crate::pixels::{generate, Image, PixelFormat};
    pub use crate::shader::{Shader, ShaderLoc};
    pub use crate::shapes::{NPatchInfo, NPatchLayout};
    pub use crate::texture::{
        CubemapLayout, RenderTexture, Texture, TextureFilter, TextureWrap,
    };
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::backend::recording::RecordingBackend;
    use crate::backend::GlProfile;
    use crate::batch::BatchMemory;
    use crate::context::RenderContext;

    /// A context over the recording backend, plus a handle sharing its
    /// call log.
    pub(crate) fn test_context() -> (RenderContext, RecordingBackend) {
        test_context_with_memory(BatchMemory::new())
    }

    pub(crate) fn test_context_with_memory(
        memory: Box<BatchMemory>,
    ) -> (RenderContext, RecordingBackend) {
        let backend = RecordingBackend::new(GlProfile::Gl33);
        let handle = backend.clone();
        let ctx = RenderContext::new(Box::new(backend), memory, 800, 600);
        (ctx, handle)
    }
}
