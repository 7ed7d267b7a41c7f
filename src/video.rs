use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;
use std::sync::Arc;

use glow::HasContext;
use tracing::{error, warn};

use crate::error::{Result, RetroError};

pub mod background;
pub mod layout;
pub mod renderer;
pub mod shaders;

use background::{float_bytes, VideoBackground};
use layout::{VideoLayout, Viewport, BACKGROUND_VERTICES, QUAD_TEX_COORDS};
use renderer::{GlVersion, Renderer};
use shaders::{compile_program, ShaderChain, VERTEX_SHADER};

/// Per-pass GL program with the uniform locations the draw loop feeds.
struct PassProgram {
    program: glow::Program,
    position: u32,
    coordinate: u32,
    texture: Option<glow::UniformLocation>,
    texture_size: Option<glow::UniformLocation>,
    flip_y: Option<glow::UniformLocation>,
    padding: Option<glow::UniformLocation>,
    screen_density: Option<glow::UniformLocation>,
    params: Vec<(glow::UniformLocation, f32)>,
}

/// Owns the renderer and drives the per-frame draw.
///
/// Created on the GL thread at surface-created, torn down at surface loss.
/// Frame intake happens inside the core's video-refresh callback; the draw
/// happens once per `step` after `retro_run` returns.
pub struct Video {
    gl: Arc<glow::Context>,
    version: GlVersion,
    renderer: Box<dyn Renderer>,
    layout: VideoLayout,
    background: Option<VideoBackground>,
    chain: ShaderChain,
    pending_chain: Option<ShaderChain>,
    programs: Vec<PassProgram>,
    vertex_buffer: glow::Buffer,
    coord_buffer: glow::Buffer,
    bottom_left_origin: bool,
    skip_duplicate_frames: bool,
    last_frame_hash: Option<u64>,
    frame_available: bool,
}

// The runtime parks Video behind a global mutex, but every GL call happens
// on the surface thread: frame intake inside retro_run's callbacks and the
// draw in step, both driven from that thread.
unsafe impl Send for Video {}

impl Video {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gl: Arc<glow::Context>,
        version: GlVersion,
        renderer: Box<dyn Renderer>,
        chain: ShaderChain,
        layout: VideoLayout,
        bottom_left_origin: bool,
        skip_duplicate_frames: bool,
        ambient_mode: bool,
    ) -> Result<Self> {
        let programs = build_pass_programs(&gl, &chain)?;

        let background = if ambient_mode {
            Some(VideoBackground::new(&gl, version)?)
        } else {
            None
        };

        let (vertex_buffer, coord_buffer) = unsafe {
            let vertex_buffer = gl.create_buffer().map_err(RetroError::GlNotCompatible)?;
            let coord_buffer = gl.create_buffer().map_err(RetroError::GlNotCompatible)?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(coord_buffer));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                float_bytes(&QUAD_TEX_COORDS),
                glow::STATIC_DRAW,
            );
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            (vertex_buffer, coord_buffer)
        };

        Ok(Self {
            gl,
            version,
            renderer,
            layout,
            background,
            chain,
            pending_chain: None,
            programs,
            vertex_buffer,
            coord_buffer,
            bottom_left_origin,
            skip_duplicate_frames,
            last_frame_hash: None,
            frame_available: false,
        })
    }

    pub fn layout(&self) -> &VideoLayout {
        &self.layout
    }

    pub fn update_screen_size(&mut self, width: u32, height: u32) {
        self.layout.update_screen_size(width, height);
    }

    pub fn update_viewport(&mut self, viewport: Viewport) {
        self.layout.update_viewport(viewport);
    }

    pub fn update_rotation(&mut self, rotation: f32) {
        self.layout.update_rotation(rotation);
    }

    pub fn update_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.layout.update_aspect_ratio(aspect_ratio);
    }

    pub fn update_rendered_resolution(&mut self, width: u32, height: u32) {
        self.renderer.set_resolution(width, height);
    }

    pub fn set_pixel_format(&mut self, format: libretro_sys::PixelFormat) {
        self.renderer.set_pixel_format(format);
    }

    /// Queues a new chain; applied at the next `render_frame`, never
    /// mid-frame.
    pub fn set_shader_chain(&mut self, chain: ShaderChain) {
        if chain != self.chain {
            self.pending_chain = Some(chain);
        }
    }

    /// Framebuffer id handed to hardware cores. Stable across `retro_run`
    /// calls until surface loss or a rebuild.
    pub fn current_framebuffer_id(&self) -> usize {
        self.renderer
            .framebuffer()
            .map(|fb| fb.0.get() as usize)
            .unwrap_or(0)
    }

    /// Software frame from the video-refresh callback.
    pub fn on_software_frame(&mut self, data: &[u8], width: u32, height: u32, pitch: usize) {
        self.frame_available = true;

        if self.skip_duplicate_frames {
            let hash = hash_frame(data, height, pitch, width as usize * self.renderer.bytes_per_pixel());
            if self.last_frame_hash == Some(hash) {
                return;
            }
            self.last_frame_hash = Some(hash);
        }

        self.renderer.on_new_frame(&self.gl, data, width, height, pitch);
    }

    /// `RETRO_HW_FRAME_BUFFER_VALID`: the core rendered into our FBO.
    pub fn on_hardware_frame(&mut self, width: u32, height: u32) {
        self.frame_available = true;
        if width > 0 && height > 0 {
            self.renderer.set_resolution(width, height);
        }
    }

    /// Null frame pointer: the core duped the previous frame.
    pub fn on_duplicate_frame(&mut self) {}

    /// Draws the current frame through the shader chain to the screen.
    /// GL errors are logged and the frame skipped; the loop continues.
    pub fn render_frame(&mut self) {
        if let Some(chain) = self.pending_chain.take() {
            match build_pass_programs(&self.gl, &chain) {
                Ok(programs) => {
                    self.delete_programs();
                    self.programs = programs;
                    self.renderer.set_shaders(chain.clone());
                    self.chain = chain;
                }
                Err(err) => error!(%err, "shader chain rejected, keeping previous"),
            }
        }

        if let Err(err) = self.renderer.prepare(&self.gl) {
            error!(%err, "renderer rebuild failed, skipping frame");
            return;
        }

        let (screen_width, screen_height) = self.layout.screen_size();
        if screen_width == 0 || screen_height == 0 {
            return;
        }

        let gl = Arc::clone(&self.gl);
        unsafe {
            gl.disable(glow::DEPTH_TEST);

            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.viewport(0, 0, screen_width as i32, screen_height as i32);
            gl.clear_color(0.0, 0.0, 0.0, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }

        if !self.frame_available {
            return;
        }

        let pass_count = self.chain.passes.len();
        for index in 0..pass_count {
            self.draw_pass(&gl, index, screen_width, screen_height);
        }

        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, None);
            gl.use_program(None);
        }
    }

    fn draw_pass(&mut self, gl: &glow::Context, index: usize, screen_width: u32, screen_height: u32) {
        let pass_count = self.chain.passes.len();
        let is_final = index == pass_count - 1;
        let data = self.renderer.pass_data(index, screen_width, screen_height);

        let Some(source) = data.texture else {
            return;
        };
        let Some(program) = self.programs.get(index) else {
            return;
        };

        let sampled_size = if index == 0 {
            self.renderer.last_frame_size()
        } else {
            let previous = self.renderer.pass_data(index - 1, screen_width, screen_height);
            (previous.width, previous.height)
        };

        // Flip the texture rows once, where the core's frame is sampled.
        let flip_y = if index == 0 && !self.bottom_left_origin {
            1.0
        } else {
            0.0
        };
        let padding = if index == 0 { self.renderer.padding() } else { 1.0 };

        unsafe {
            match data.framebuffer {
                Some(framebuffer) => {
                    gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
                    gl.viewport(0, 0, data.width as i32, data.height as i32);
                    gl.clear_color(0.0, 0.0, 0.0, 1.0);
                    gl.clear(glow::COLOR_BUFFER_BIT);
                }
                None => {
                    gl.bind_framebuffer(glow::FRAMEBUFFER, None);
                    gl.viewport(0, 0, screen_width as i32, screen_height as i32);

                    if let (Some(background), Some(frame_texture)) =
                        (self.background.as_mut(), self.renderer.texture())
                    {
                        background.render(
                            gl,
                            screen_width,
                            screen_height,
                            self.layout.foreground_vertices(),
                            frame_texture,
                        );
                    }
                }
            }

            gl.use_program(Some(program.program));

            // Intermediate passes cover the whole target; the final pass
            // uses the layout's letterboxed, rotated quad.
            let vertices: &[f32; 12] = if is_final {
                self.layout.foreground_vertices()
            } else {
                &BACKGROUND_VERTICES
            };
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vertex_buffer));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, float_bytes(vertices), glow::DYNAMIC_DRAW);
            gl.enable_vertex_attrib_array(program.position);
            gl.vertex_attrib_pointer_f32(program.position, 2, glow::FLOAT, false, 0, 0);

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.coord_buffer));
            gl.enable_vertex_attrib_array(program.coordinate);
            gl.vertex_attrib_pointer_f32(program.coordinate, 2, glow::FLOAT, false, 0, 0);

            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(source));

            if let Some(location) = &program.texture {
                gl.uniform_1_i32(Some(location), 0);
            }
            if let Some(location) = &program.texture_size {
                gl.uniform_2_f32(
                    Some(location),
                    sampled_size.0 as f32,
                    sampled_size.1 as f32,
                );
            }
            if let Some(location) = &program.flip_y {
                gl.uniform_1_f32(Some(location), flip_y);
            }
            if let Some(location) = &program.padding {
                gl.uniform_1_f32(Some(location), padding);
            }
            if let Some(location) = &program.screen_density {
                let density = if sampled_size.0 > 0 && sampled_size.1 > 0 {
                    (data.width as f32 / sampled_size.0 as f32)
                        .min(data.height as f32 / sampled_size.1 as f32)
                        .max(1.0)
                } else {
                    1.0
                };
                gl.uniform_1_f32(Some(location), density);
            }
            // Config-provided tunables override the computed defaults.
            for (location, value) in &program.params {
                gl.uniform_1_f32(Some(location), *value);
            }

            gl.draw_arrays(glow::TRIANGLES, 0, 6);

            if let Some(err) = gl_error(gl) {
                warn!(error = err, pass = index, "GL error in draw path");
            }
        }
    }

    fn delete_programs(&mut self) {
        for pass in self.programs.drain(..) {
            unsafe { self.gl.delete_program(pass.program) };
        }
    }

    pub fn destroy(&mut self) {
        let gl = Arc::clone(&self.gl);
        self.delete_programs();
        self.renderer.destroy(&gl);
        if let Some(mut background) = self.background.take() {
            background.destroy(&gl);
        }
        unsafe {
            gl.delete_buffer(self.vertex_buffer);
            gl.delete_buffer(self.coord_buffer);
        }
    }

    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    pub fn gl_version(&self) -> GlVersion {
        self.version
    }
}

fn build_pass_programs(gl: &glow::Context, chain: &ShaderChain) -> Result<Vec<PassProgram>> {
    chain
        .passes
        .iter()
        .map(|pass| {
            let program = compile_program(gl, VERTEX_SHADER, pass.fragment, &[])?;

            let params = chain
                .params
                .iter()
                .filter_map(|(name, value)| {
                    unsafe { gl.get_uniform_location(program, name) }
                        .map(|location| (location, value.as_f32()))
                })
                .collect();

            unsafe {
                Ok(PassProgram {
                    position: gl.get_attrib_location(program, "vPosition").unwrap_or(0),
                    coordinate: gl.get_attrib_location(program, "vCoordinate").unwrap_or(1),
                    texture: gl.get_uniform_location(program, "texture"),
                    texture_size: gl.get_uniform_location(program, "textureSize"),
                    flip_y: gl.get_uniform_location(program, "vFlipY"),
                    padding: gl.get_uniform_location(program, "vPadding"),
                    screen_density: gl.get_uniform_location(program, "screenDensity"),
                    params,
                    program,
                })
            }
        })
        .collect()
}

fn gl_error(gl: &glow::Context) -> Option<u32> {
    let error = unsafe { gl.get_error() };
    (error != glow::NO_ERROR).then_some(error)
}

/// Hashes the content rows of a frame, pitch padding excluded, so equal
/// frames with different padding still match.
fn hash_frame(data: &[u8], height: u32, pitch: usize, row_bytes: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    let row_bytes = row_bytes.min(pitch);
    for row in data.chunks_exact(pitch).take(height as usize) {
        hasher.write(&row[..row_bytes]);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_ignores_pitch_padding() {
        // Same 2×2 content, different padding bytes.
        let a = [1u8, 2, 3, 4, 0xAA, 0xBB, 5, 6, 7, 8, 0xCC, 0xDD];
        let b = [1u8, 2, 3, 4, 0x11, 0x22, 5, 6, 7, 8, 0x33, 0x44];
        assert_eq!(hash_frame(&a, 2, 6, 4), hash_frame(&b, 2, 6, 4));
    }

    #[test]
    fn hash_differs_for_different_content() {
        let a = [1u8, 2, 3, 4];
        let b = [1u8, 2, 3, 5];
        assert_ne!(hash_frame(&a, 1, 4, 4), hash_frame(&b, 1, 4, 4));
    }
}
