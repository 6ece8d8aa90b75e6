//! Texture, cubemap and render-target management.
//!
//! Formats are validated against the probed capability flags before any
//! upload: a compressed payload whose extension family is missing produces
//! the invalid-texture sentinel and a warning, never a GL error. All pixel
//! data arrives as byte slices already in memory.

use crate::backend::GlProfile;
use crate::context::RenderContext;
use crate::math::Rect;
use crate::pixels::{Image, PixelFormat};

// Extension enums absent from the core bindings.
const GL_COMPRESSED_RGB_S3TC_DXT1: u32 = 0x83F0;
const GL_COMPRESSED_RGBA_S3TC_DXT1: u32 = 0x83F1;
const GL_COMPRESSED_RGBA_S3TC_DXT3: u32 = 0x83F2;
const GL_COMPRESSED_RGBA_S3TC_DXT5: u32 = 0x83F3;
const GL_ETC1_RGB8: u32 = 0x8D64;
const GL_COMPRESSED_RGB8_ETC2: u32 = 0x9274;
const GL_COMPRESSED_RGBA8_ETC2_EAC: u32 = 0x9278;
const GL_COMPRESSED_RGB_PVRTC_4BPP: u32 = 0x8C00;
const GL_COMPRESSED_RGBA_PVRTC_4BPP: u32 = 0x8C02;
const GL_COMPRESSED_RGBA_ASTC_4X4: u32 = 0x93B0;
const GL_COMPRESSED_RGBA_ASTC_8X8: u32 = 0x93B7;
const GL_TEXTURE_MAX_ANISOTROPY: u32 = 0x84FE;
const GL_MIRROR_CLAMP: u32 = 0x8743;
// Unsized formats for the ES2 path.
const GL_LUMINANCE: u32 = 0x1909;
const GL_LUMINANCE_ALPHA: u32 = 0x190A;
// Not exposed by the core-profile bindings.
const GL_DEPTH_COMPONENT32: u32 = 0x81A7;

// =============================================================================
// Types
// =============================================================================

/// GPU-side raster. Plain `Copy` handle; released explicitly through
/// [`RenderContext::unload_texture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    pub id: u32,
    pub width: i32,
    pub height: i32,
    pub mipmaps: i32,
    pub format: PixelFormat,
}

impl Texture {
    /// The invalid-texture sentinel.
    pub fn invalid() -> Texture {
        Texture {
            id: 0,
            width: 0,
            height: 0,
            mipmaps: 0,
            format: PixelFormat::R8G8B8A8,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.id != 0
    }
}

/// A framebuffer with a color texture and a depth attachment that is
/// either a depth texture or a renderbuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTexture {
    /// Framebuffer object id.
    pub id: u32,
    pub texture: Texture,
    /// Depth attachment; `id` names a texture or a renderbuffer depending
    /// on `depth_is_texture`.
    pub depth: Texture,
    pub depth_is_texture: bool,
}

impl RenderTexture {
    pub fn invalid() -> RenderTexture {
        RenderTexture {
            id: 0,
            texture: Texture::invalid(),
            depth: Texture::invalid(),
            depth_is_texture: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.id != 0
    }
}

/// Texture minification/magnification presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    Point,
    Bilinear,
    Trilinear,
    Anisotropic4x,
    Anisotropic8x,
    Anisotropic16x,
}

/// Texture coordinate wrap presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureWrap {
    Repeat,
    Clamp,
    MirrorRepeat,
    MirrorClamp,
}

/// How the six cubemap faces are laid out inside a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubemapLayout {
    AutoDetect,
    LineVertical,
    LineHorizontal,
    CrossThreeByFour,
    CrossFourByThree,
    /// Recognized but reserved; loading returns the sentinel.
    Panorama,
}

// =============================================================================
// Format mapping
// =============================================================================

struct GlFormat {
    internal: u32,
    layout: u32,
    pixel_type: u32,
}

/// Maps an uncompressed pixel format onto GL upload enums for the profile.
/// Compressed formats resolve to their internal enum only.
fn gl_format_for(
    profile: GlProfile,
    caps: &crate::context::GpuCapabilities,
    format: PixelFormat,
) -> Option<GlFormat> {
    let sized = !matches!(profile, GlProfile::Gles2);
    let fmt = |internal, layout, pixel_type| Some(GlFormat { internal, layout, pixel_type });

    match format {
        PixelFormat::Grayscale => {
            if sized {
                fmt(gl::R8, gl::RED, gl::UNSIGNED_BYTE)
            } else {
                fmt(GL_LUMINANCE, GL_LUMINANCE, gl::UNSIGNED_BYTE)
            }
        }
        PixelFormat::GrayAlpha => {
            if sized {
                fmt(gl::RG8, gl::RG, gl::UNSIGNED_BYTE)
            } else {
                fmt(GL_LUMINANCE_ALPHA, GL_LUMINANCE_ALPHA, gl::UNSIGNED_BYTE)
            }
        }
        PixelFormat::R5G6B5 => fmt(
            if sized { gl::RGB565 } else { gl::RGB },
            gl::RGB,
            gl::UNSIGNED_SHORT_5_6_5,
        ),
        PixelFormat::R8G8B8 => fmt(
            if sized { gl::RGB8 } else { gl::RGB },
            gl::RGB,
            gl::UNSIGNED_BYTE,
        ),
        PixelFormat::R5G5B5A1 => fmt(
            if sized { gl::RGB5_A1 } else { gl::RGBA },
            gl::RGBA,
            gl::UNSIGNED_SHORT_5_5_5_1,
        ),
        PixelFormat::R4G4B4A4 => fmt(
            if sized { gl::RGBA4 } else { gl::RGBA },
            gl::RGBA,
            gl::UNSIGNED_SHORT_4_4_4_4,
        ),
        PixelFormat::R8G8B8A8 => fmt(
            if sized { gl::RGBA8 } else { gl::RGBA },
            gl::RGBA,
            gl::UNSIGNED_BYTE,
        ),
        PixelFormat::R32 if caps.tex_float => fmt(
            if sized { gl::R32F } else { GL_LUMINANCE },
            if sized { gl::RED } else { GL_LUMINANCE },
            gl::FLOAT,
        ),
        PixelFormat::R32G32B32 if caps.tex_float => fmt(
            if sized { gl::RGB32F } else { gl::RGB },
            gl::RGB,
            gl::FLOAT,
        ),
        PixelFormat::R32G32B32A32 if caps.tex_float => fmt(
            if sized { gl::RGBA32F } else { gl::RGBA },
            gl::RGBA,
            gl::FLOAT,
        ),
        PixelFormat::Dxt1Rgb if caps.tex_comp_dxt => fmt(GL_COMPRESSED_RGB_S3TC_DXT1, 0, 0),
        PixelFormat::Dxt1Rgba if caps.tex_comp_dxt => fmt(GL_COMPRESSED_RGBA_S3TC_DXT1, 0, 0),
        PixelFormat::Dxt3Rgba if caps.tex_comp_dxt => fmt(GL_COMPRESSED_RGBA_S3TC_DXT3, 0, 0),
        PixelFormat::Dxt5Rgba if caps.tex_comp_dxt => fmt(GL_COMPRESSED_RGBA_S3TC_DXT5, 0, 0),
        PixelFormat::Etc1Rgb if caps.tex_comp_etc1 => fmt(GL_ETC1_RGB8, 0, 0),
        PixelFormat::Etc2Rgb if caps.tex_comp_etc2 => fmt(GL_COMPRESSED_RGB8_ETC2, 0, 0),
        PixelFormat::Etc2EacRgba if caps.tex_comp_etc2 => fmt(GL_COMPRESSED_RGBA8_ETC2_EAC, 0, 0),
        PixelFormat::PvrtRgb if caps.tex_comp_pvrt => fmt(GL_COMPRESSED_RGB_PVRTC_4BPP, 0, 0),
        PixelFormat::PvrtRgba if caps.tex_comp_pvrt => fmt(GL_COMPRESSED_RGBA_PVRTC_4BPP, 0, 0),
        PixelFormat::Astc4x4Rgba if caps.tex_comp_astc => fmt(GL_COMPRESSED_RGBA_ASTC_4X4, 0, 0),
        PixelFormat::Astc8x8Rgba if caps.tex_comp_astc => fmt(GL_COMPRESSED_RGBA_ASTC_8X8, 0, 0),
        _ => None,
    }
}

fn is_pot(value: i32) -> bool {
    value > 0 && (value & (value - 1)) == 0
}

// =============================================================================
// Context operations
// =============================================================================

impl RenderContext {
    /// Uploads pixel data as a texture, one mip level after another
    /// (dimensions halve per level, clamped at 1). Returns the sentinel
    /// when the format is not supported by the context or the data is
    /// shorter than the metadata implies.
    pub fn load_texture(
        &mut self,
        data: &[u8],
        width: i32,
        height: i32,
        format: PixelFormat,
        mipmaps: i32,
    ) -> Texture {
        let expected = format.buffer_size_with_mipmaps(width, height, mipmaps);
        if data.len() < expected {
            log::warn!(
                "texture data is {} bytes but {}x{} {:?} with {} mipmaps needs {}",
                data.len(),
                width,
                height,
                format,
                mipmaps,
                expected
            );
            return Texture::invalid();
        }
        self.upload_texture(Some(data), width, height, format, mipmaps)
    }

    /// Allocates texture storage without initial contents (render targets).
    fn load_texture_empty(&mut self, width: i32, height: i32, format: PixelFormat) -> Texture {
        self.upload_texture(None, width, height, format, 1)
    }

    fn upload_texture(
        &mut self,
        data: Option<&[u8]>,
        width: i32,
        height: i32,
        format: PixelFormat,
        mipmaps: i32,
    ) -> Texture {
        let Some(gl_format) = gl_format_for(self.backend.profile(), &self.caps, format) else {
            log::warn!("pixel format {format:?} is not supported by this context");
            return Texture::invalid();
        };

        let id = self.backend.gen_texture();
        if id == 0 {
            log::warn!("failed to generate a texture object");
            return Texture::invalid();
        }

        self.backend.pixel_store_unpack_alignment(1);
        self.backend.bind_texture(gl::TEXTURE_2D, id);

        let (mut w, mut h) = (width, height);
        let mut offset = 0usize;
        for level in 0..mipmaps.max(1) {
            let level_size = format.buffer_size(w, h);
            let level_data = data.map(|d| &d[offset..offset + level_size]);
            if format.is_compressed() {
                self.backend.compressed_tex_image_2d(
                    gl::TEXTURE_2D,
                    level,
                    gl_format.internal,
                    w,
                    h,
                    level_data.unwrap_or(&[]),
                );
            } else {
                self.backend.tex_image_2d(
                    gl::TEXTURE_2D,
                    level,
                    gl_format.internal as i32,
                    w,
                    h,
                    gl_format.layout,
                    gl_format.pixel_type,
                    level_data,
                );
            }
            offset += level_size;
            w = (w / 2).max(1);
            h = (h / 2).max(1);
        }

        // Sampling grayscale through all four channels needs a swizzle on
        // the desktop profile (no LUMINANCE formats there).
        if matches!(self.backend.profile(), GlProfile::Gl33) {
            if format == PixelFormat::Grayscale {
                let swizzle = [gl::RED as i32, gl::RED as i32, gl::RED as i32, gl::ONE as i32];
                self.backend
                    .tex_parameter_iv(gl::TEXTURE_2D, gl::TEXTURE_SWIZZLE_RGBA, &swizzle);
            } else if format == PixelFormat::GrayAlpha {
                let swizzle = [gl::RED as i32, gl::RED as i32, gl::RED as i32, gl::GREEN as i32];
                self.backend
                    .tex_parameter_iv(gl::TEXTURE_2D, gl::TEXTURE_SWIZZLE_RGBA, &swizzle);
            }
        }

        // Wrap defaults to repeat, except NPOT textures on contexts
        // without full NPOT support.
        let wrap = if !self.caps.tex_npot && (!is_pot(width) || !is_pot(height)) {
            gl::CLAMP_TO_EDGE as i32
        } else {
            gl::REPEAT as i32
        };
        self.backend.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, wrap);
        self.backend.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, wrap);

        if mipmaps > 1 {
            self.backend.tex_parameter_i(
                gl::TEXTURE_2D,
                gl::TEXTURE_MIN_FILTER,
                gl::LINEAR_MIPMAP_LINEAR as i32,
            );
            self.backend
                .tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::LINEAR as i32);
        } else {
            self.backend
                .tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::NEAREST as i32);
            self.backend
                .tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::NEAREST as i32);
        }

        self.backend.bind_texture(gl::TEXTURE_2D, 0);

        Texture {
            id,
            width,
            height,
            mipmaps: mipmaps.max(1),
            format,
        }
    }

    /// Uploads an image's pixel data.
    pub fn load_texture_from_image(&mut self, image: &Image) -> Texture {
        self.load_texture(
            image.data(),
            image.width(),
            image.height(),
            image.format(),
            image.mipmaps(),
        )
    }

    /// Replaces the full base level of `texture` with `data`.
    pub fn update_texture(&mut self, texture: Texture, data: &[u8]) {
        if texture.format.is_compressed() {
            log::warn!("cannot update a compressed texture in place");
            return;
        }
        let expected = texture.format.buffer_size(texture.width, texture.height);
        if data.len() < expected {
            log::warn!("texture update data too short: {} < {expected}", data.len());
            return;
        }
        let Some(gl_format) = gl_format_for(self.backend.profile(), &self.caps, texture.format)
        else {
            return;
        };
        self.backend.bind_texture(gl::TEXTURE_2D, texture.id);
        self.backend.tex_sub_image_2d(
            gl::TEXTURE_2D,
            0,
            0,
            0,
            texture.width,
            texture.height,
            gl_format.layout,
            gl_format.pixel_type,
            data,
        );
        self.backend.bind_texture(gl::TEXTURE_2D, 0);
    }

    /// Generates the GPU-side mip chain and records the new level count.
    pub fn gen_texture_mipmaps(&mut self, texture: &mut Texture) {
        if !self.caps.tex_npot && (!is_pot(texture.width) || !is_pot(texture.height)) {
            log::warn!("cannot generate mipmaps for an NPOT texture on this context");
            return;
        }
        self.backend.bind_texture(gl::TEXTURE_2D, texture.id);
        self.backend.generate_mipmap(gl::TEXTURE_2D);
        let mut levels = 1;
        let (mut w, mut h) = (texture.width, texture.height);
        while w > 1 || h > 1 {
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            levels += 1;
        }
        texture.mipmaps = levels;
        self.backend.tex_parameter_i(
            gl::TEXTURE_2D,
            gl::TEXTURE_MIN_FILTER,
            gl::LINEAR_MIPMAP_LINEAR as i32,
        );
        self.backend.bind_texture(gl::TEXTURE_2D, 0);
    }

    /// Applies a filtering preset; anisotropy is clamped to the probed
    /// maximum.
    pub fn set_texture_filter(&mut self, texture: Texture, filter: TextureFilter) {
        self.backend.bind_texture(gl::TEXTURE_2D, texture.id);
        let has_mips = texture.mipmaps > 1;

        let (min, mag) = match filter {
            TextureFilter::Point => (
                if has_mips { gl::NEAREST_MIPMAP_NEAREST } else { gl::NEAREST },
                gl::NEAREST,
            ),
            TextureFilter::Bilinear => (
                if has_mips { gl::LINEAR_MIPMAP_NEAREST } else { gl::LINEAR },
                gl::LINEAR,
            ),
            TextureFilter::Trilinear
            | TextureFilter::Anisotropic4x
            | TextureFilter::Anisotropic8x
            | TextureFilter::Anisotropic16x => (
                if has_mips { gl::LINEAR_MIPMAP_LINEAR } else { gl::LINEAR },
                gl::LINEAR,
            ),
        };
        self.backend
            .tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, min as i32);
        self.backend
            .tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, mag as i32);

        let requested: f32 = match filter {
            TextureFilter::Anisotropic4x => 4.0,
            TextureFilter::Anisotropic8x => 8.0,
            TextureFilter::Anisotropic16x => 16.0,
            _ => 0.0,
        };
        if requested > 0.0 {
            if self.caps.tex_anisotropic {
                let level = requested.min(self.caps.max_anisotropy);
                if level < requested {
                    log::warn!(
                        "anisotropy {requested}x clamped to the supported maximum {level}x"
                    );
                }
                self.backend
                    .tex_parameter_f(gl::TEXTURE_2D, GL_TEXTURE_MAX_ANISOTROPY, level);
            } else {
                log::warn!("anisotropic filtering is not supported by this context");
            }
        }
        self.backend.bind_texture(gl::TEXTURE_2D, 0);
    }

    /// Applies a wrap preset; mirror-clamp requires its extension.
    pub fn set_texture_wrap(&mut self, texture: Texture, wrap: TextureWrap) {
        let mode = match wrap {
            TextureWrap::Repeat => gl::REPEAT,
            TextureWrap::Clamp => gl::CLAMP_TO_EDGE,
            TextureWrap::MirrorRepeat => gl::MIRRORED_REPEAT,
            TextureWrap::MirrorClamp => {
                if !self.caps.tex_mirror_clamp {
                    log::warn!("mirror-clamp wrapping is not supported by this context");
                    return;
                }
                GL_MIRROR_CLAMP
            }
        };
        self.backend.bind_texture(gl::TEXTURE_2D, texture.id);
        self.backend
            .tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, mode as i32);
        self.backend
            .tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, mode as i32);
        self.backend.bind_texture(gl::TEXTURE_2D, 0);
    }

    /// Releases a texture; the sentinel is ignored.
    pub fn unload_texture(&mut self, texture: Texture) {
        if texture.id != 0 {
            self.backend.delete_texture(texture.id);
        }
    }

    // =========================================================================
    // Cubemaps
    // =========================================================================

    /// Builds a cubemap from an image holding all six faces in `layout`.
    /// Auto-detection inspects the aspect ratio. The panorama layout is
    /// recognized but reserved and yields the sentinel.
    pub fn load_texture_cubemap(&mut self, image: &Image, layout: CubemapLayout) -> Texture {
        let layout = if layout == CubemapLayout::AutoDetect {
            detect_cubemap_layout(image.width(), image.height())
        } else {
            layout
        };

        let (face_size, face_rects) = match cubemap_face_rects(layout, image.width(), image.height())
        {
            Some(v) => v,
            None => {
                if layout == CubemapLayout::Panorama {
                    log::warn!("panorama cubemap conversion is reserved and not implemented");
                } else {
                    log::warn!("could not derive a cubemap layout from a {}x{} image", image.width(), image.height());
                }
                return Texture::invalid();
            }
        };

        let Some(gl_format) = gl_format_for(self.backend.profile(), &self.caps, image.format())
        else {
            log::warn!("pixel format {:?} is not supported by this context", image.format());
            return Texture::invalid();
        };
        if image.format().is_compressed() {
            log::warn!("cubemap faces cannot be extracted from a compressed image");
            return Texture::invalid();
        }

        let id = self.backend.gen_texture();
        if id == 0 {
            return Texture::invalid();
        }
        self.backend.pixel_store_unpack_alignment(1);
        self.backend.bind_texture(gl::TEXTURE_CUBE_MAP, id);

        for (face, rect) in face_rects.iter().enumerate() {
            let face_image = image.sub_image(*rect);
            self.backend.tex_image_2d(
                gl::TEXTURE_CUBE_MAP_POSITIVE_X + face as u32,
                0,
                gl_format.internal as i32,
                face_size,
                face_size,
                gl_format.layout,
                gl_format.pixel_type,
                Some(face_image.data()),
            );
        }

        self.backend
            .tex_parameter_i(gl::TEXTURE_CUBE_MAP, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as i32);
        self.backend
            .tex_parameter_i(gl::TEXTURE_CUBE_MAP, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as i32);
        self.backend
            .tex_parameter_i(gl::TEXTURE_CUBE_MAP, gl::TEXTURE_MIN_FILTER, gl::LINEAR as i32);
        self.backend
            .tex_parameter_i(gl::TEXTURE_CUBE_MAP, gl::TEXTURE_MAG_FILTER, gl::LINEAR as i32);
        self.backend.bind_texture(gl::TEXTURE_CUBE_MAP, 0);

        Texture {
            id,
            width: face_size,
            height: face_size,
            mipmaps: 1,
            format: image.format(),
        }
    }

    // =========================================================================
    // Render targets
    // =========================================================================

    /// Creates a render target: a color texture plus a depth attachment,
    /// either a depth texture (when requested and supported) or a
    /// renderbuffer. Completeness failures are logged with the specific
    /// reason; the partially built target is still returned so the caller
    /// can decide.
    pub fn load_render_texture(
        &mut self,
        width: i32,
        height: i32,
        format: PixelFormat,
        depth_bits: i32,
        use_depth_texture: bool,
    ) -> RenderTexture {
        let color = self.load_texture_empty(width, height, format);
        if color.id == 0 {
            return RenderTexture::invalid();
        }

        let depth_bits = depth_bits.min(self.caps.max_depth_bits);
        let depth_internal = match depth_bits {
            b if b >= 32 => GL_DEPTH_COMPONENT32,
            b if b >= 24 => gl::DEPTH_COMPONENT24,
            _ => gl::DEPTH_COMPONENT16,
        };

        let depth_is_texture = use_depth_texture && self.caps.tex_depth;
        let depth_id = if depth_is_texture {
            let id = self.backend.gen_texture();
            self.backend.bind_texture(gl::TEXTURE_2D, id);
            self.backend.tex_image_2d(
                gl::TEXTURE_2D,
                0,
                depth_internal as i32,
                width,
                height,
                gl::DEPTH_COMPONENT,
                gl::UNSIGNED_INT,
                None,
            );
            self.backend
                .tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::NEAREST as i32);
            self.backend
                .tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::NEAREST as i32);
            self.backend.bind_texture(gl::TEXTURE_2D, 0);
            id
        } else {
            if use_depth_texture {
                log::warn!("depth textures are unsupported, falling back to a renderbuffer");
            }
            let id = self.backend.gen_renderbuffer();
            self.backend.bind_renderbuffer(id);
            self.backend.renderbuffer_storage(depth_internal, width, height);
            self.backend.bind_renderbuffer(0);
            id
        };

        let fbo = self.backend.gen_framebuffer();
        self.backend.bind_framebuffer(fbo);
        self.backend
            .framebuffer_texture_2d(gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, color.id, 0);
        if depth_is_texture {
            self.backend
                .framebuffer_texture_2d(gl::DEPTH_ATTACHMENT, gl::TEXTURE_2D, depth_id, 0);
        } else {
            self.backend
                .framebuffer_renderbuffer(gl::DEPTH_ATTACHMENT, depth_id);
        }

        let status = self.backend.check_framebuffer_status();
        if status != gl::FRAMEBUFFER_COMPLETE {
            log::warn!(
                "render texture framebuffer incomplete: {}",
                framebuffer_status_name(status)
            );
        }
        self.backend.bind_framebuffer(0);

        RenderTexture {
            id: fbo,
            texture: color,
            depth: Texture {
                id: depth_id,
                width,
                height,
                mipmaps: 1,
                format: PixelFormat::R32,
            },
            depth_is_texture,
        }
    }

    /// Releases a render target and both attachments.
    pub fn unload_render_texture(&mut self, target: RenderTexture) {
        if target.id == 0 {
            return;
        }
        if target.depth_is_texture {
            self.backend.delete_texture(target.depth.id);
        } else {
            self.backend.delete_renderbuffer(target.depth.id);
        }
        self.backend.delete_texture(target.texture.id);
        self.backend.delete_framebuffer(target.id);
    }

    // =========================================================================
    // Readback
    // =========================================================================

    /// Reads a texture's base level back into an image. Desktop only: ES
    /// profiles have no `GetTexImage`, and the call logs and returns `None`
    /// there. Compressed textures cannot be read back.
    pub fn texture_pixels(&mut self, texture: Texture) -> Option<Image> {
        if texture.format.is_compressed() {
            log::warn!("cannot read back a compressed texture");
            return None;
        }
        let gl_format = gl_format_for(self.backend.profile(), &self.caps, texture.format)?;
        let mut data = vec![0u8; texture.format.buffer_size(texture.width, texture.height)];
        self.backend.bind_texture(gl::TEXTURE_2D, texture.id);
        let ok = self.backend.get_tex_image(
            gl::TEXTURE_2D,
            0,
            gl_format.layout,
            gl_format.pixel_type,
            &mut data,
        );
        self.backend.bind_texture(gl::TEXTURE_2D, 0);
        if !ok {
            log::warn!("texture readback is unavailable on this profile");
            return None;
        }
        Image::from_raw(data, texture.width, texture.height, texture.format, 1).ok()
    }
}

// =============================================================================
// Cubemap layout math
// =============================================================================

/// Picks a layout from the image aspect ratio.
fn detect_cubemap_layout(width: i32, height: i32) -> CubemapLayout {
    if width > height {
        if width / 6 == height {
            CubemapLayout::LineHorizontal
        } else if width / 4 == height / 3 {
            CubemapLayout::CrossFourByThree
        } else if width >= 2 * height {
            CubemapLayout::Panorama
        } else {
            CubemapLayout::AutoDetect
        }
    } else if height > width {
        if height / 6 == width {
            CubemapLayout::LineVertical
        } else if width / 3 == height / 4 {
            CubemapLayout::CrossThreeByFour
        } else {
            CubemapLayout::AutoDetect
        }
    } else {
        CubemapLayout::AutoDetect
    }
}

/// Face order matches the GL cubemap face sequence: +X, -X, +Y, -Y, +Z, -Z.
fn cubemap_face_rects(layout: CubemapLayout, width: i32, height: i32) -> Option<(i32, [Rect; 6])> {
    let rect = |x: i32, y: i32, s: i32| Rect::new(x as f32, y as f32, s as f32, s as f32);
    match layout {
        CubemapLayout::LineVertical => {
            let s = height / 6;
            Some((s, [
                rect(0, 0, s),
                rect(0, s, s),
                rect(0, 2 * s, s),
                rect(0, 3 * s, s),
                rect(0, 4 * s, s),
                rect(0, 5 * s, s),
            ]))
        }
        CubemapLayout::LineHorizontal => {
            let s = width / 6;
            Some((s, [
                rect(0, 0, s),
                rect(s, 0, s),
                rect(2 * s, 0, s),
                rect(3 * s, 0, s),
                rect(4 * s, 0, s),
                rect(5 * s, 0, s),
            ]))
        }
        CubemapLayout::CrossFourByThree => {
            let s = width / 4;
            Some((s, [
                rect(2 * s, s, s),
                rect(0, s, s),
                rect(s, 0, s),
                rect(s, 2 * s, s),
                rect(s, s, s),
                rect(3 * s, s, s),
            ]))
        }
        CubemapLayout::CrossThreeByFour => {
            let s = width / 3;
            Some((s, [
                rect(2 * s, s, s),
                rect(0, s, s),
                rect(s, 0, s),
                rect(s, 2 * s, s),
                rect(s, s, s),
                rect(s, 3 * s, s),
            ]))
        }
        CubemapLayout::Panorama | CubemapLayout::AutoDetect => None,
    }
}

/// Human-readable completeness failure for the log.
fn framebuffer_status_name(status: u32) -> &'static str {
    match status {
        gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => "incomplete attachment",
        gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => "missing attachment",
        gl::FRAMEBUFFER_UNSUPPORTED => "unsupported configuration",
        gl::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => "inconsistent multisampling",
        _ => "unknown status",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Color;
    use crate::test_support::test_context;

    #[test]
    fn test_load_texture_returns_handle() {
        let (mut ctx, _) = test_context();
        let tex = ctx.load_texture(&[0u8; 16], 2, 2, PixelFormat::R8G8B8A8, 1);
        assert!(tex.is_valid());
        assert_eq!(tex.width, 2);
        assert_eq!(tex.mipmaps, 1);
    }

    #[test]
    fn test_load_texture_rejects_short_data() {
        let (mut ctx, _) = test_context();
        let tex = ctx.load_texture(&[0u8; 3], 2, 2, PixelFormat::R8G8B8A8, 1);
        assert!(!tex.is_valid());
    }

    #[test]
    fn test_load_texture_rejects_unsupported_compression() {
        let (mut ctx, _) = test_context();
        // The recording backend reports no compression extensions.
        let tex = ctx.load_texture(&[0u8; 8], 4, 4, PixelFormat::Dxt1Rgb, 1);
        assert!(!tex.is_valid());
    }

    #[test]
    fn test_load_texture_with_mipmaps_accounts_levels() {
        let (mut ctx, _) = test_context();
        let size = PixelFormat::R8G8B8A8.buffer_size_with_mipmaps(4, 4, 3);
        let tex = ctx.load_texture(&vec![0u8; size], 4, 4, PixelFormat::R8G8B8A8, 3);
        assert!(tex.is_valid());
        assert_eq!(tex.mipmaps, 3);
    }

    #[test]
    fn test_gen_texture_mipmaps_updates_count() {
        let (mut ctx, _) = test_context();
        let mut tex = ctx.load_texture(&[0u8; 64], 4, 4, PixelFormat::R8G8B8A8, 1);
        ctx.gen_texture_mipmaps(&mut tex);
        assert_eq!(tex.mipmaps, 3);
    }

    #[test]
    fn test_render_texture_complete() {
        let (mut ctx, _) = test_context();
        let target = ctx.load_render_texture(256, 256, PixelFormat::R8G8B8A8, 24, false);
        assert!(target.is_valid());
        assert!(target.texture.is_valid());
        assert!(!target.depth_is_texture);
        ctx.unload_render_texture(target);
    }

    #[test]
    fn test_render_texture_depth_texture_requires_capability() {
        let (mut ctx, _) = test_context();
        ctx.caps.tex_depth = false;
        let target = ctx.load_render_texture(64, 64, PixelFormat::R8G8B8A8, 16, true);
        // Falls back to a renderbuffer when depth textures are missing.
        assert!(!target.depth_is_texture);
    }

    #[test]
    fn test_cubemap_autodetect() {
        assert_eq!(detect_cubemap_layout(64, 384), CubemapLayout::LineVertical);
        assert_eq!(detect_cubemap_layout(384, 64), CubemapLayout::LineHorizontal);
        assert_eq!(detect_cubemap_layout(256, 192), CubemapLayout::CrossFourByThree);
        assert_eq!(detect_cubemap_layout(192, 256), CubemapLayout::CrossThreeByFour);
        assert_eq!(detect_cubemap_layout(512, 256), CubemapLayout::Panorama);
    }

    #[test]
    fn test_cubemap_from_vertical_strip() {
        let (mut ctx, _) = test_context();
        let image = crate::pixels::generate::gen_image_color(4, 24, Color::SKYBLUE);
        let cubemap = ctx.load_texture_cubemap(&image, CubemapLayout::AutoDetect);
        assert!(cubemap.is_valid());
        assert_eq!(cubemap.width, 4);
        assert_eq!(cubemap.height, 4);
    }

    #[test]
    fn test_cubemap_panorama_reserved() {
        let (mut ctx, _) = test_context();
        let image = crate::pixels::generate::gen_image_color(512, 256, Color::SKYBLUE);
        let cubemap = ctx.load_texture_cubemap(&image, CubemapLayout::Panorama);
        assert!(!cubemap.is_valid());
    }

    #[test]
    fn test_cross_face_rects_cover_expected_cells() {
        let (size, rects) = cubemap_face_rects(CubemapLayout::CrossFourByThree, 256, 192).unwrap();
        assert_eq!(size, 64);
        // +X sits right of center, +Y above it.
        assert_eq!(rects[0], Rect::new(128.0, 64.0, 64.0, 64.0));
        assert_eq!(rects[2], Rect::new(64.0, 0.0, 64.0, 64.0));
    }

    #[test]
    fn test_set_texture_wrap_mirror_clamp_gated() {
        let (mut ctx, _) = test_context();
        let tex = ctx.load_texture(&[0u8; 4], 1, 1, PixelFormat::R8G8B8A8, 1);
        // Unsupported on the recording backend: warns, does not bind.
        ctx.set_texture_wrap(tex, TextureWrap::MirrorClamp);
        ctx.set_texture_wrap(tex, TextureWrap::Repeat);
    }

    #[test]
    fn test_float_texture_requires_capability() {
        let (mut ctx, _) = test_context();
        ctx.caps.tex_float = false;
        let tex = ctx.load_texture(&[0u8; 4], 1, 1, PixelFormat::R32, 1);
        assert!(!tex.is_valid());
    }
}
