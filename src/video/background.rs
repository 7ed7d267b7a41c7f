use glow::HasContext;

use super::layout::{BACKGROUND_VERTICES, QUAD_TEX_COORDS};
use super::renderer::{create_framebuffer, delete_framebuffer, FramebufferHandle, GlVersion};
use super::shaders::compile_program;
use crate::error::{Result, RetroError};

/// Side of the downscaled working buffers. Blurring an 8×8 image and
/// stretching it over the screen is what makes the backdrop "ambient".
const DOWNSCALED_SIZE: u32 = 8;

/// Blend weight of the incoming frame against the accumulated history.
const TEMPORAL_BLEND: f32 = 0.1;

const BLUR_KERNEL_SIZE: usize = 7;
const BLUR_BRIGHTNESS: f32 = 0.75;

const SHADOW_STRENGTH: f32 = 0.5;
const SHADOW_SPREAD: f32 = 0.05;

/// Temporally-smoothed, blurred backdrop drawn behind the foreground quad.
///
/// Four small framebuffers: two ping-pong targets accumulating the blended
/// history, two for the separable blur. The display pass stretches the blur
/// result past the letterbox edges with mirrored UVs and darkens a soft
/// band around the foreground bounds.
pub struct VideoBackground {
    framebuffers: Vec<FramebufferHandle>,
    blend_program: glow::Program,
    blur_program: glow::Program,
    display_program: glow::Program,
    vertex_buffer: glow::Buffer,
    coord_buffer: glow::Buffer,
    write_index: usize,
    frame_parity: u32,
}

impl VideoBackground {
    pub fn new(gl: &glow::Context, version: GlVersion) -> Result<Self> {
        let mut framebuffers = Vec::with_capacity(4);
        for _ in 0..4 {
            framebuffers.push(create_framebuffer(
                gl,
                version,
                DOWNSCALED_SIZE,
                DOWNSCALED_SIZE,
                true,
                true,
                false,
                false,
            )?);
        }

        let attributes: &[(u32, &str)] = &[(0, "aPosition"), (1, "aTexCoord")];
        let blend_program = compile_program(gl, VERTEX_SOURCE, BLEND_FRAGMENT, attributes)?;
        let blur_fragment = generate_blur_fragment(BLUR_KERNEL_SIZE, BLUR_BRIGHTNESS);
        let blur_program = compile_program(gl, VERTEX_SOURCE, &blur_fragment, attributes)?;
        let display_program = compile_program(gl, VERTEX_SOURCE, DISPLAY_FRAGMENT, attributes)?;

        let (vertex_buffer, coord_buffer) = unsafe {
            let vertex_buffer = gl.create_buffer().map_err(RetroError::GlNotCompatible)?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vertex_buffer));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                float_bytes(&BACKGROUND_VERTICES),
                glow::DYNAMIC_DRAW,
            );

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
            framebuffers,
            blend_program,
            blur_program,
            display_program,
            vertex_buffer,
            coord_buffer,
            write_index: 0,
            frame_parity: 0,
        })
    }

    /// Draws the backdrop. Must run before the foreground pass: it renders
    /// to the default framebuffer without clearing.
    pub fn render(
        &mut self,
        gl: &glow::Context,
        screen_width: u32,
        screen_height: u32,
        foreground_vertices: &[f32; 12],
        frame_texture: glow::Texture,
    ) {
        // Updating an 8×8 history every other frame is indistinguishable
        // on screen and halves the extra passes.
        if self.frame_parity == 0 {
            self.update_working_buffers(gl, frame_texture);
        }
        self.frame_parity = (self.frame_parity + 1) % 2;

        self.render_to_screen(gl, screen_width, screen_height, foreground_vertices);
    }

    fn bind_quad(&self, gl: &glow::Context, program: glow::Program) {
        unsafe {
            let position = gl.get_attrib_location(program, "aPosition").unwrap_or(0);
            let tex_coord = gl.get_attrib_location(program, "aTexCoord").unwrap_or(1);

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vertex_buffer));
            gl.enable_vertex_attrib_array(position);
            gl.vertex_attrib_pointer_f32(position, 2, glow::FLOAT, false, 0, 0);

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.coord_buffer));
            gl.enable_vertex_attrib_array(tex_coord);
            gl.vertex_attrib_pointer_f32(tex_coord, 2, glow::FLOAT, false, 0, 0);
        }
    }

    fn update_working_buffers(&mut self, gl: &glow::Context, frame_texture: glow::Texture) {
        let read_index = (self.write_index + 1) % 2;

        unsafe {
            gl.viewport(0, 0, DOWNSCALED_SIZE as i32, DOWNSCALED_SIZE as i32);

            // Blend the new frame into the accumulated history.
            gl.bind_framebuffer(
                glow::FRAMEBUFFER,
                Some(self.framebuffers[self.write_index].framebuffer),
            );
            gl.use_program(Some(self.blend_program));
            self.bind_quad(gl, self.blend_program);

            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(frame_texture));
            set_uniform_i32(gl, self.blend_program, "currentFrame", 0);

            gl.active_texture(glow::TEXTURE1);
            gl.bind_texture(
                glow::TEXTURE_2D,
                Some(self.framebuffers[read_index].texture),
            );
            set_uniform_i32(gl, self.blend_program, "previousFrame", 1);
            set_uniform_f32(gl, self.blend_program, "blendFactor", TEMPORAL_BLEND);

            gl.draw_arrays(glow::TRIANGLES, 0, 6);

            // Separable blur: horizontal into buffer 2, vertical into 3.
            gl.use_program(Some(self.blur_program));
            self.bind_quad(gl, self.blur_program);
            gl.active_texture(glow::TEXTURE0);
            set_uniform_i32(gl, self.blur_program, "texture", 0);

            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.framebuffers[2].framebuffer));
            gl.bind_texture(
                glow::TEXTURE_2D,
                Some(self.framebuffers[self.write_index].texture),
            );
            set_uniform_2_f32(
                gl,
                self.blur_program,
                "direction",
                1.0 / DOWNSCALED_SIZE as f32,
                0.0,
            );
            gl.draw_arrays(glow::TRIANGLES, 0, 6);

            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.framebuffers[3].framebuffer));
            gl.bind_texture(glow::TEXTURE_2D, Some(self.framebuffers[2].texture));
            set_uniform_2_f32(
                gl,
                self.blur_program,
                "direction",
                0.0,
                1.0 / DOWNSCALED_SIZE as f32,
            );
            gl.draw_arrays(glow::TRIANGLES, 0, 6);

            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }

        self.write_index = read_index;
    }

    fn render_to_screen(
        &self,
        gl: &glow::Context,
        screen_width: u32,
        screen_height: u32,
        foreground_vertices: &[f32; 12],
    ) {
        let mut min_x = 1.0f32;
        let mut min_y = 1.0f32;
        let mut max_x = -1.0f32;
        let mut max_y = -1.0f32;
        for pair in foreground_vertices.chunks_exact(2) {
            min_x = min_x.min(pair[0]);
            max_x = max_x.max(pair[0]);
            min_y = min_y.min(-pair[1]);
            max_y = max_y.max(-pair[1]);
        }

        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.viewport(0, 0, screen_width as i32, screen_height as i32);
            gl.use_program(Some(self.display_program));
            self.bind_quad(gl, self.display_program);

            set_uniform_i32(gl, self.display_program, "texture", 0);
            set_uniform_4_f32(
                gl,
                self.display_program,
                "uForegroundBounds",
                min_x,
                min_y,
                max_x,
                max_y,
            );
            set_uniform_f32(gl, self.display_program, "uShadowStrength", SHADOW_STRENGTH);
            set_uniform_f32(gl, self.display_program, "uShadowSpread", SHADOW_SPREAD);

            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(self.framebuffers[3].texture));
            gl.draw_arrays(glow::TRIANGLES, 0, 6);

            gl.bind_texture(glow::TEXTURE_2D, None);
            gl.use_program(None);
        }
    }

    pub fn destroy(&mut self, gl: &glow::Context) {
        for handle in self.framebuffers.drain(..) {
            delete_framebuffer(gl, handle);
        }
        unsafe {
            gl.delete_program(self.blend_program);
            gl.delete_program(self.blur_program);
            gl.delete_program(self.display_program);
            gl.delete_buffer(self.vertex_buffer);
            gl.delete_buffer(self.coord_buffer);
        }
    }
}

/// Gaussian weights with σ = size / 3, normalized, scaled by `brightness`.
pub fn generate_smoothing_weights(size: usize, brightness: f32) -> Vec<f32> {
    let sigma = size as f32 / 3.0;
    let half = (size / 2) as i32;

    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let x = (i as i32 - half) as f32;
            (-(x * x) / (2.0 * sigma * sigma)).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight = *weight / sum * brightness;
    }

    kernel
}

/// Builds the one-dimensional blur fragment for a runtime-chosen kernel.
fn generate_blur_fragment(size: usize, brightness: f32) -> String {
    let weights = generate_smoothing_weights(size, brightness);
    let half = (size / 2) as i32;

    let mut taps = String::new();
    for (i, weight) in weights.iter().enumerate() {
        let offset = i as i32 - half;
        taps.push_str(&format!(
            "  color += texture2D(texture, vTexCoord + direction * {offset:.1}) * {weight:.6};\n"
        ));
    }

    format!(
        "precision mediump float;\n\
         uniform lowp sampler2D texture;\n\
         uniform mediump vec2 direction;\n\
         varying vec2 vTexCoord;\n\
         void main() {{\n\
           vec4 color = vec4(0.0);\n\
         {taps}\
           gl_FragColor = vec4(color.rgb, 1.0);\n\
         }}\n"
    )
}

const VERTEX_SOURCE: &str = r#"
attribute vec4 aPosition;
attribute vec2 aTexCoord;
varying vec2 vTexCoord;
varying vec2 vClipCoord;

void main() {
  vTexCoord = aTexCoord;
  vClipCoord = aPosition.xy;
  gl_Position = aPosition;
}
"#;

const BLEND_FRAGMENT: &str = r#"
precision mediump float;
uniform lowp sampler2D currentFrame;
uniform lowp sampler2D previousFrame;
uniform mediump float blendFactor;
varying vec2 vTexCoord;

void main() {
  vec4 current = texture2D(currentFrame, vTexCoord);
  vec4 previous = texture2D(previousFrame, vTexCoord);
  gl_FragColor = vec4(mix(previous, current, blendFactor).rgb, 1.0);
}
"#;

/// Stretches the blurred history behind the foreground quad. UVs are
/// remapped so the content spills outward from the foreground bounds and
/// mirror-extends at the edges; a soft shadow band hugs the bounds.
const DISPLAY_FRAGMENT: &str = r#"
precision mediump float;
uniform lowp sampler2D texture;
uniform mediump vec4 uForegroundBounds;
uniform mediump float uShadowStrength;
uniform mediump float uShadowSpread;
varying vec2 vTexCoord;
varying vec2 vClipCoord;

void main() {
  vec2 boundsMin = uForegroundBounds.xy;
  vec2 boundsMax = uForegroundBounds.zw;
  vec2 center = 0.5 * (boundsMin + boundsMax);
  vec2 halfSize = max(0.5 * (boundsMax - boundsMin), vec2(0.001));

  vec2 clip = vec2(vClipCoord.x, -vClipCoord.y);

  vec2 uv = 0.5 + 0.5 * (clip - center) / halfSize;
  uv = mix(1.0 - abs(1.0 - uv), abs(uv), step(uv, vec2(1.0)));

  vec4 color = texture2D(texture, uv);

  vec2 distance = abs(clip - center) - halfSize;
  float outside = max(distance.x, distance.y);
  float shadow = (1.0 - smoothstep(0.0, uShadowSpread, outside)) * uShadowStrength;
  shadow *= step(0.0, outside);

  gl_FragColor = vec4(color.rgb * (1.0 - shadow), 1.0);
}
"#;

fn set_uniform_i32(gl: &glow::Context, program: glow::Program, name: &str, value: i32) {
    unsafe {
        if let Some(location) = gl.get_uniform_location(program, name) {
            gl.uniform_1_i32(Some(&location), value);
        }
    }
}

fn set_uniform_f32(gl: &glow::Context, program: glow::Program, name: &str, value: f32) {
    unsafe {
        if let Some(location) = gl.get_uniform_location(program, name) {
            gl.uniform_1_f32(Some(&location), value);
        }
    }
}

fn set_uniform_2_f32(gl: &glow::Context, program: glow::Program, name: &str, x: f32, y: f32) {
    unsafe {
        if let Some(location) = gl.get_uniform_location(program, name) {
            gl.uniform_2_f32(Some(&location), x, y);
        }
    }
}

fn set_uniform_4_f32(
    gl: &glow::Context,
    program: glow::Program,
    name: &str,
    x: f32,
    y: f32,
    z: f32,
    w: f32,
) {
    unsafe {
        if let Some(location) = gl.get_uniform_location(program, name) {
            gl.uniform_4_f32(Some(&location), x, y, z, w);
        }
    }
}

pub(crate) fn float_bytes(values: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(values.as_ptr().cast::<u8>(), std::mem::size_of_val(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothing_weights_sum_to_brightness() {
        for (size, brightness) in [(7usize, 0.75f32), (5, 1.0), (9, 0.5)] {
            let weights = generate_smoothing_weights(size, brightness);
            assert_eq!(weights.len(), size);

            let sum: f32 = weights.iter().sum();
            assert!((sum - brightness).abs() < 1e-5, "sum {sum}");
        }
    }

    #[test]
    fn smoothing_weights_are_symmetric_and_peaked() {
        let weights = generate_smoothing_weights(7, 1.0);
        for i in 0..3 {
            assert!((weights[i] - weights[6 - i]).abs() < 1e-6);
        }
        let peak = weights[3];
        assert!(weights.iter().all(|&w| w <= peak));
    }

    #[test]
    fn blur_fragment_contains_one_tap_per_weight() {
        let source = generate_blur_fragment(7, 0.75);
        assert_eq!(source.matches("color +=").count(), 7);
        assert!(source.contains("direction * -3.0"));
        assert!(source.contains("direction * 3.0"));
        assert!(source.contains("gl_FragColor"));
    }
}
