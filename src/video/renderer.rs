use glow::HasContext;
use itertools::Itertools;
use libretro_sys::PixelFormat;
use tracing::debug;

use super::shaders::ShaderChain;
use crate::error::{Result, RetroError};

/// GL dialect the embedder created the surface with. ES3 unlocks texture
/// swizzles, `UNPACK_ROW_LENGTH` and immutable storage; ES2 falls back to
/// CPU-side conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlVersion {
    Es2,
    Es3,
}

/// Offscreen render target with its color texture.
pub struct FramebufferHandle {
    pub framebuffer: glow::Framebuffer,
    pub texture: glow::Texture,
    pub depth: Option<glow::Renderbuffer>,
    pub width: u32,
    pub height: u32,
}

pub fn create_framebuffer(
    gl: &glow::Context,
    version: GlVersion,
    width: u32,
    height: u32,
    linear: bool,
    repeat: bool,
    include_depth: bool,
    include_stencil: bool,
) -> Result<FramebufferHandle> {
    unsafe {
        let framebuffer = gl
            .create_framebuffer()
            .map_err(RetroError::GlNotCompatible)?;
        let texture = gl.create_texture().map_err(RetroError::GlNotCompatible)?;

        gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));

        match version {
            GlVersion::Es3 => {
                gl.tex_storage_2d(glow::TEXTURE_2D, 1, glow::RGBA8, width as i32, height as i32);
            }
            GlVersion::Es2 => {
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    glow::RGBA as i32,
                    width as i32,
                    height as i32,
                    0,
                    glow::RGBA,
                    glow::UNSIGNED_BYTE,
                    glow::PixelUnpackData::Slice(None),
                );
            }
        }

        let wrap = if repeat {
            glow::MIRRORED_REPEAT
        } else {
            glow::CLAMP_TO_EDGE
        };
        let filter = if linear { glow::LINEAR } else { glow::NEAREST };
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter as i32);

        gl.framebuffer_texture_2d(
            glow::FRAMEBUFFER,
            glow::COLOR_ATTACHMENT0,
            glow::TEXTURE_2D,
            Some(texture),
            0,
        );

        let mut depth = None;
        if include_depth {
            let renderbuffer = gl
                .create_renderbuffer()
                .map_err(RetroError::GlNotCompatible)?;
            gl.bind_renderbuffer(glow::RENDERBUFFER, Some(renderbuffer));

            let (storage, attachment) = if include_stencil {
                (glow::DEPTH24_STENCIL8, glow::DEPTH_STENCIL_ATTACHMENT)
            } else {
                (glow::DEPTH_COMPONENT16, glow::DEPTH_ATTACHMENT)
            };
            gl.renderbuffer_storage(glow::RENDERBUFFER, storage, width as i32, height as i32);
            gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                attachment,
                glow::RENDERBUFFER,
                Some(renderbuffer),
            );
            depth = Some(renderbuffer);
        }

        let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);

        gl.bind_texture(glow::TEXTURE_2D, None);
        gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        gl.bind_renderbuffer(glow::RENDERBUFFER, None);

        if status != glow::FRAMEBUFFER_COMPLETE {
            return Err(RetroError::GlNotCompatible(format!(
                "framebuffer incomplete: 0x{status:x}"
            )));
        }

        Ok(FramebufferHandle {
            framebuffer,
            texture,
            depth,
            width,
            height,
        })
    }
}

pub fn delete_framebuffer(gl: &glow::Context, handle: FramebufferHandle) {
    unsafe {
        gl.delete_framebuffer(handle.framebuffer);
        gl.delete_texture(handle.texture);
        if let Some(depth) = handle.depth {
            gl.delete_renderbuffer(depth);
        }
    }
}

/// The intermediate framebuffers of a shader chain: one per pass except the
/// last, which draws to the screen.
#[derive(Default)]
pub struct PassChain {
    handles: Vec<FramebufferHandle>,
}

impl PassChain {
    pub fn build(
        gl: &glow::Context,
        version: GlVersion,
        base_width: u32,
        base_height: u32,
        chain: &ShaderChain,
    ) -> Result<Self> {
        let mut handles = Vec::new();
        for pass in chain.passes.iter().take(chain.passes.len().saturating_sub(1)) {
            let width = ((base_width as f32 * pass.scale).round() as u32).max(1);
            let height = ((base_height as f32 * pass.scale).round() as u32).max(1);
            handles.push(create_framebuffer(
                gl,
                version,
                width,
                height,
                pass.linear,
                false,
                false,
                false,
            )?);
        }
        Ok(Self { handles })
    }

    pub fn destroy(&mut self, gl: &glow::Context) {
        for handle in self.handles.drain(..) {
            delete_framebuffer(gl, handle);
        }
    }

    fn get(&self, index: usize) -> Option<&FramebufferHandle> {
        self.handles.get(index)
    }
}

/// Where pass `layer` renders and what it samples.
#[derive(Default, Clone, Copy)]
pub struct PassData {
    /// `None` for the final pass (the screen).
    pub framebuffer: Option<glow::Framebuffer>,
    /// `None` for pass 0, which samples the frame texture instead.
    pub texture: Option<glow::Texture>,
    pub width: u32,
    pub height: u32,
}

/// Bridge between core frames and GL textures. The software path uploads
/// pixel buffers, the hardware path hands the core a framebuffer to render
/// into; both feed the same shader-chain machinery.
pub trait Renderer {
    /// Texture sampled by the first shader pass.
    fn texture(&self) -> Option<glow::Texture>;

    /// Framebuffer exposed to hardware cores via `get_current_framebuffer`.
    fn framebuffer(&self) -> Option<glow::Framebuffer>;

    fn on_new_frame(
        &mut self,
        gl: &glow::Context,
        data: &[u8],
        width: u32,
        height: u32,
        pitch: usize,
    );

    fn set_pixel_format(&mut self, format: PixelFormat);

    /// Frame size reported by the latest geometry; rebuilds buffers lazily.
    fn set_resolution(&mut self, width: u32, height: u32);

    fn set_shaders(&mut self, chain: ShaderChain);

    /// Applies pending rebuilds. Called with the context current, before
    /// the pass loop.
    fn prepare(&mut self, gl: &glow::Context) -> Result<()>;

    fn pass_data(&self, layer: usize, screen_width: u32, screen_height: u32) -> PassData;

    fn last_frame_size(&self) -> (u32, u32);

    fn bytes_per_pixel(&self) -> usize;

    /// Fraction of the uploaded texture width holding real content; < 1.0
    /// when padded pitch rows were uploaded verbatim.
    fn padding(&self) -> f32 {
        1.0
    }

    fn destroy(&mut self, gl: &glow::Context);
}

struct FormatInfo {
    internal_format: u32,
    format: u32,
    data_type: u32,
    bytes_per_pixel: usize,
    swap_red_blue: bool,
}

fn format_info(pixel_format: PixelFormat) -> FormatInfo {
    match pixel_format {
        PixelFormat::ARGB8888 => FormatInfo {
            internal_format: glow::RGBA,
            format: glow::RGBA,
            data_type: glow::UNSIGNED_BYTE,
            bytes_per_pixel: 4,
            swap_red_blue: true,
        },
        // 0RGB1555 is rewritten to RGB565 on the CPU before upload.
        PixelFormat::ARGB1555 | PixelFormat::RGB565 => FormatInfo {
            internal_format: glow::RGB565,
            format: glow::RGB,
            data_type: glow::UNSIGNED_SHORT_5_6_5,
            bytes_per_pixel: 2,
            swap_red_blue: false,
        },
    }
}

/// Widens the 5-bit green of a 0RGB1555 pixel into RGB565 layout.
pub(crate) fn orgb1555_to_rgb565(pixel: u16) -> u16 {
    let r = (pixel >> 10) & 0x1F;
    let g5 = (pixel >> 5) & 0x1F;
    let b = pixel & 0x1F;
    let g6 = (g5 << 1) | (g5 >> 4);
    (r << 11) | (g6 << 5) | b
}

/// Software renderer: one streaming texture, recreated when the frame size
/// changes.
pub struct ImageRenderer {
    version: GlVersion,
    pixel_format: PixelFormat,
    texture: Option<glow::Texture>,
    passes: PassChain,
    chain: ShaderChain,
    chain_dirty: bool,
    passes_size: (u32, u32),
    last_frame_size: (u32, u32),
    texture_size: (u32, u32),
    padding: f32,
    staging: Vec<u8>,
}

impl ImageRenderer {
    pub fn new(version: GlVersion, pixel_format: PixelFormat, chain: ShaderChain) -> Self {
        Self {
            version,
            pixel_format,
            texture: None,
            passes: PassChain::default(),
            chain,
            chain_dirty: false,
            passes_size: (0, 0),
            last_frame_size: (0, 0),
            texture_size: (0, 0),
            padding: 1.0,
            staging: Vec::new(),
        }
    }

    /// Converts one frame into a tightly packed buffer the upload path can
    /// consume, handling pitch padding and CPU-side format rewrites.
    fn pack_frame(&mut self, data: &[u8], width: u32, height: u32, pitch: usize) -> bool {
        let info = format_info(self.pixel_format);
        let row_bytes = width as usize * info.bytes_per_pixel;

        match self.pixel_format {
            PixelFormat::ARGB1555 => {
                self.staging.clear();
                self.staging.reserve(row_bytes * height as usize);
                for row in data.chunks_exact(pitch).take(height as usize) {
                    for (lo, hi) in row[..row_bytes].iter().copied().tuples() {
                        let converted = orgb1555_to_rgb565(u16::from_ne_bytes([lo, hi]));
                        self.staging.extend_from_slice(&converted.to_ne_bytes());
                    }
                }
                true
            }
            PixelFormat::ARGB8888 if self.version == GlVersion::Es2 => {
                // No swizzle on ES2: swap R and B while repacking rows.
                self.staging.clear();
                self.staging.reserve(row_bytes * height as usize);
                for row in data.chunks_exact(pitch).take(height as usize) {
                    for (b, g, r, _x) in row[..row_bytes].iter().copied().tuples() {
                        self.staging.extend_from_slice(&[r, g, b, 0xFF]);
                    }
                }
                true
            }
            // ES2 has no UNPACK_ROW_LENGTH; padded RGB565 rows are uploaded
            // verbatim and cropped via the padding factor instead.
            _ => false,
        }
    }
}

impl Renderer for ImageRenderer {
    fn texture(&self) -> Option<glow::Texture> {
        self.texture
    }

    fn framebuffer(&self) -> Option<glow::Framebuffer> {
        None
    }

    fn on_new_frame(
        &mut self,
        gl: &glow::Context,
        data: &[u8],
        width: u32,
        height: u32,
        pitch: usize,
    ) {
        let info = format_info(self.pixel_format);
        let packed = self.pack_frame(data, width, height, pitch);
        let info = if packed && self.pixel_format == PixelFormat::ARGB8888 {
            // CPU swap already produced RGBA order.
            FormatInfo {
                swap_red_blue: false,
                ..info
            }
        } else {
            info
        };

        let row_bytes = width as usize * info.bytes_per_pixel;
        let (upload_width, padding) =
            if !packed && self.version == GlVersion::Es2 && pitch > row_bytes {
                // Upload the padded rows verbatim; the draw crops them off.
                ((pitch / info.bytes_per_pixel) as u32, row_bytes as f32 / pitch as f32)
            } else {
                (width, 1.0)
            };
        self.padding = padding;

        unsafe {
            if self.texture.is_none() {
                match gl.create_texture() {
                    Ok(texture) => self.texture = Some(texture),
                    Err(err) => {
                        debug!(%err, "failed to create frame texture");
                        return;
                    }
                }
            }
            gl.bind_texture(glow::TEXTURE_2D, self.texture);

            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, info.bytes_per_pixel as i32);
            if self.version == GlVersion::Es3 {
                let row_pixels = if packed { 0 } else { (pitch / info.bytes_per_pixel) as i32 };
                gl.pixel_store_i32(glow::UNPACK_ROW_LENGTH, row_pixels);
            }

            if self.version == GlVersion::Es3 {
                let (r, g, b) = if info.swap_red_blue {
                    (glow::BLUE, glow::GREEN, glow::RED)
                } else {
                    (glow::RED, glow::GREEN, glow::BLUE)
                };
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_SWIZZLE_R, r as i32);
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_SWIZZLE_G, g as i32);
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_SWIZZLE_B, b as i32);
                gl.tex_parameter_i32(
                    glow::TEXTURE_2D,
                    glow::TEXTURE_SWIZZLE_A,
                    glow::ALPHA as i32,
                );
            }

            let filter = if self.chain.linear_texture {
                glow::LINEAR
            } else {
                glow::NEAREST
            };
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter as i32);
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );

            let pixels = if packed { &self.staging[..] } else { data };
            if self.texture_size != (upload_width, height) {
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    info.internal_format as i32,
                    upload_width as i32,
                    height as i32,
                    0,
                    info.format,
                    info.data_type,
                    glow::PixelUnpackData::Slice(Some(pixels)),
                );
                self.texture_size = (upload_width, height);
            } else {
                gl.tex_sub_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    0,
                    0,
                    upload_width as i32,
                    height as i32,
                    info.format,
                    info.data_type,
                    glow::PixelUnpackData::Slice(Some(pixels)),
                );
            }
            self.last_frame_size = (width, height);

            if self.version == GlVersion::Es3 {
                gl.pixel_store_i32(glow::UNPACK_ROW_LENGTH, 0);
            }
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    fn set_pixel_format(&mut self, format: PixelFormat) {
        if self.pixel_format != format {
            self.pixel_format = format;
            // Force reallocation with the new upload format.
            self.texture_size = (0, 0);
        }
    }

    fn set_resolution(&mut self, _width: u32, _height: u32) {
        // The texture tracks incoming frame sizes by itself.
    }

    fn set_shaders(&mut self, chain: ShaderChain) {
        if chain != self.chain {
            self.chain = chain;
            self.chain_dirty = true;
        }
    }

    fn prepare(&mut self, gl: &glow::Context) -> Result<()> {
        let size = self.last_frame_size;
        if size.0 == 0 || size.1 == 0 {
            return Ok(());
        }
        if !self.chain_dirty && self.passes_size == size {
            return Ok(());
        }
        self.chain_dirty = false;
        self.passes_size = size;

        self.passes.destroy(gl);
        self.passes = PassChain::build(gl, self.version, size.0, size.1, &self.chain)?;
        Ok(())
    }

    fn pass_data(&self, layer: usize, screen_width: u32, screen_height: u32) -> PassData {
        pass_data_from_chain(
            &self.passes,
            layer,
            self.texture(),
            screen_width,
            screen_height,
        )
    }

    fn last_frame_size(&self) -> (u32, u32) {
        self.last_frame_size
    }

    fn bytes_per_pixel(&self) -> usize {
        format_info(self.pixel_format).bytes_per_pixel
    }

    fn padding(&self) -> f32 {
        self.padding
    }

    fn destroy(&mut self, gl: &glow::Context) {
        self.passes.destroy(gl);
        if let Some(texture) = self.texture.take() {
            unsafe { gl.delete_texture(texture) };
        }
        self.last_frame_size = (0, 0);
        self.texture_size = (0, 0);
        self.passes_size = (0, 0);
    }
}

/// Hardware renderer: owns the framebuffer the core draws into. The
/// framebuffer id handed to the core stays stable until surface loss or a
/// resolution/shader change marks the buffers dirty.
pub struct FramebufferRenderer {
    version: GlVersion,
    width: u32,
    height: u32,
    depth: bool,
    stencil: bool,
    target: Option<FramebufferHandle>,
    passes: PassChain,
    chain: ShaderChain,
    dirty: bool,
}

impl FramebufferRenderer {
    pub fn new(
        gl: &glow::Context,
        version: GlVersion,
        width: u32,
        height: u32,
        depth: bool,
        stencil: bool,
        chain: ShaderChain,
    ) -> Result<Self> {
        if version == GlVersion::Es2 {
            return Err(RetroError::GlNotCompatible(
                "hardware-rendered cores require GLES3".into(),
            ));
        }

        let mut renderer = Self {
            version,
            width,
            height,
            depth,
            stencil,
            target: None,
            passes: PassChain::default(),
            chain,
            dirty: false,
        };
        renderer.rebuild(gl)?;
        Ok(renderer)
    }

    fn rebuild(&mut self, gl: &glow::Context) -> Result<()> {
        self.passes.destroy(gl);
        if let Some(target) = self.target.take() {
            delete_framebuffer(gl, target);
        }

        self.passes = PassChain::build(gl, self.version, self.width, self.height, &self.chain)?;
        self.target = Some(create_framebuffer(
            gl,
            self.version,
            self.width,
            self.height,
            self.chain.linear_texture,
            false,
            self.depth,
            self.stencil,
        )?);
        Ok(())
    }
}

impl Renderer for FramebufferRenderer {
    fn texture(&self) -> Option<glow::Texture> {
        self.target.as_ref().map(|t| t.texture)
    }

    fn framebuffer(&self) -> Option<glow::Framebuffer> {
        self.target.as_ref().map(|t| t.framebuffer)
    }

    fn on_new_frame(
        &mut self,
        _gl: &glow::Context,
        _data: &[u8],
        _width: u32,
        _height: u32,
        _pitch: usize,
    ) {
        // The core already rendered into our framebuffer.
    }

    fn set_pixel_format(&mut self, _format: PixelFormat) {
        // Hardware cores always render RGBA8.
    }

    fn set_resolution(&mut self, width: u32, height: u32) {
        if self.width != width || self.height != height {
            self.width = width;
            self.height = height;
            self.dirty = true;
        }
    }

    fn set_shaders(&mut self, chain: ShaderChain) {
        if chain != self.chain {
            self.chain = chain;
            self.dirty = true;
        }
    }

    fn prepare(&mut self, gl: &glow::Context) -> Result<()> {
        if self.dirty {
            self.dirty = false;
            self.rebuild(gl)?;
        }
        Ok(())
    }

    fn pass_data(&self, layer: usize, screen_width: u32, screen_height: u32) -> PassData {
        pass_data_from_chain(
            &self.passes,
            layer,
            self.texture(),
            screen_width,
            screen_height,
        )
    }

    fn last_frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn bytes_per_pixel(&self) -> usize {
        4
    }

    fn destroy(&mut self, gl: &glow::Context) {
        self.passes.destroy(gl);
        if let Some(target) = self.target.take() {
            delete_framebuffer(gl, target);
        }
    }
}

fn pass_data_from_chain(
    passes: &PassChain,
    layer: usize,
    frame_texture: Option<glow::Texture>,
    screen_width: u32,
    screen_height: u32,
) -> PassData {
    let target = passes.get(layer);
    let source = if layer == 0 {
        frame_texture
    } else {
        passes.get(layer - 1).map(|h| h.texture)
    };

    match target {
        Some(handle) => PassData {
            framebuffer: Some(handle.framebuffer),
            texture: source,
            width: handle.width,
            height: handle.height,
        },
        None => PassData {
            framebuffer: None,
            texture: source,
            width: screen_width,
            height: screen_height,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orgb1555_widens_green() {
        // Pure green: 5-bit max green becomes 6-bit max green.
        assert_eq!(orgb1555_to_rgb565(0b0_00000_11111_00000), 0b00000_111111_00000);
        // Pure red and blue stay in place.
        assert_eq!(orgb1555_to_rgb565(0b0_11111_00000_00000), 0b11111_000000_00000);
        assert_eq!(orgb1555_to_rgb565(0b0_00000_00000_11111), 0b00000_000000_11111);
        assert_eq!(orgb1555_to_rgb565(0), 0);
    }

    #[test]
    fn orgb1555_midtones_round_trip_within_one_step() {
        for g5 in 0u16..32 {
            let pixel = g5 << 5;
            let g6 = (orgb1555_to_rgb565(pixel) >> 5) & 0x3F;
            // Widening must be monotonic and span the full range.
            assert_eq!(g6 >> 1, g5);
        }
    }

    #[test]
    fn format_info_selects_upload_paths() {
        let rgb565 = format_info(PixelFormat::RGB565);
        assert_eq!(rgb565.bytes_per_pixel, 2);
        assert_eq!(rgb565.data_type, glow::UNSIGNED_SHORT_5_6_5);
        assert!(!rgb565.swap_red_blue);

        let xrgb = format_info(PixelFormat::ARGB8888);
        assert_eq!(xrgb.bytes_per_pixel, 4);
        assert!(xrgb.swap_red_blue);
    }

    #[test]
    fn es2_packs_xrgb8888_with_channel_swap() {
        let chain = ShaderChain::from_config(&super::super::shaders::ShaderConfig::default());
        let mut renderer = ImageRenderer::new(GlVersion::Es2, PixelFormat::ARGB8888, chain);

        // One row, two pixels, pitch padded by 4 bytes. Memory order is
        // B G R X per pixel.
        let data = [
            0x10, 0x20, 0x30, 0xFF, // pixel 0
            0x40, 0x50, 0x60, 0xFF, // pixel 1
            0xAA, 0xBB, 0xCC, 0xDD, // padding
        ];
        assert!(renderer.pack_frame(&data, 2, 1, 12));
        assert_eq!(
            renderer.staging,
            vec![0x30, 0x20, 0x10, 0xFF, 0x60, 0x50, 0x40, 0xFF]
        );
    }

    #[test]
    fn es2_padded_rgb565_uploads_verbatim() {
        let chain = ShaderChain::from_config(&super::super::shaders::ShaderConfig::default());
        let mut renderer = ImageRenderer::new(GlVersion::Es2, PixelFormat::RGB565, chain);

        // Padded pitch is not repacked on ES2; the draw crops it instead.
        let data = [1, 2, 3, 4, 9, 9, 5, 6, 7, 8, 9, 9];
        assert!(!renderer.pack_frame(&data, 2, 2, 6));
    }

    #[test]
    fn es3_direct_upload_needs_no_packing() {
        let chain = ShaderChain::from_config(&super::super::shaders::ShaderConfig::default());
        let mut renderer = ImageRenderer::new(GlVersion::Es3, PixelFormat::RGB565, chain);

        let data = [0u8; 12];
        assert!(!renderer.pack_frame(&data, 2, 2, 6));
    }

    #[test]
    fn argb1555_always_converts() {
        let chain = ShaderChain::from_config(&super::super::shaders::ShaderConfig::default());
        let mut renderer = ImageRenderer::new(GlVersion::Es3, PixelFormat::ARGB1555, chain);

        let pixel: u16 = 0b0_10000_10000_10000;
        let data = pixel.to_ne_bytes();
        assert!(renderer.pack_frame(&data, 1, 1, 2));
        let converted = u16::from_ne_bytes([renderer.staging[0], renderer.staging[1]]);
        assert_eq!(converted, orgb1555_to_rgb565(pixel));
    }
}
