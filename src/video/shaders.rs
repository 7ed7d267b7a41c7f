use glow::HasContext;
use indexmap::IndexMap;

use crate::error::{Result, RetroError};

/// Built-in fragment presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShaderKind {
    #[default]
    Default,
    Crt,
    Lcd,
    Sharp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShaderParam {
    Bool(bool),
    Float(f32),
}

impl ShaderParam {
    pub fn as_f32(self) -> f32 {
        match self {
            ShaderParam::Bool(value) => value as u8 as f32,
            ShaderParam::Float(value) => value,
        }
    }
}

/// Embedder-facing shader selection. `params` values are bound as float
/// uniforms of the same name when the linked program declares them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderConfig {
    pub kind: ShaderKind,
    pub params: IndexMap<String, ShaderParam>,
}

impl ShaderConfig {
    pub fn new(kind: ShaderKind) -> Self {
        Self {
            kind,
            params: IndexMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: ShaderParam) -> Self {
        self.params.insert(name.into(), value);
        self
    }
}

/// One full-screen-quad pass of the compiled chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderPass {
    pub fragment: &'static str,
    /// Intermediate framebuffer size as a multiple of the frame size.
    pub scale: f32,
    pub linear: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderChain {
    pub passes: Vec<ShaderPass>,
    /// Filter applied to the core's frame texture itself.
    pub linear_texture: bool,
    pub params: IndexMap<String, ShaderParam>,
}

impl ShaderChain {
    pub fn from_config(config: &ShaderConfig) -> Self {
        let (passes, linear_texture) = match config.kind {
            ShaderKind::Default => (
                vec![ShaderPass {
                    fragment: DEFAULT_FRAGMENT,
                    scale: 1.0,
                    linear: true,
                }],
                true,
            ),
            ShaderKind::Crt => (
                vec![ShaderPass {
                    fragment: CRT_FRAGMENT,
                    scale: 1.0,
                    linear: true,
                }],
                true,
            ),
            ShaderKind::Lcd => (
                vec![ShaderPass {
                    fragment: LCD_FRAGMENT,
                    scale: 1.0,
                    linear: true,
                }],
                true,
            ),
            // Sharp bilinear: integer prescale with nearest sampling, then a
            // smoothstep-sharpened bilinear pass to the screen.
            ShaderKind::Sharp => (
                vec![
                    ShaderPass {
                        fragment: DEFAULT_FRAGMENT,
                        scale: 2.0,
                        linear: false,
                    },
                    ShaderPass {
                        fragment: SHARP_FRAGMENT,
                        scale: 1.0,
                        linear: true,
                    },
                ],
                false,
            ),
        };

        Self {
            passes,
            linear_texture,
            params: config.params.clone(),
        }
    }
}

/// Shared vertex stage. `vFlipY` selects texture-row orientation, `vPadding`
/// crops the padded pitch region, `screenCoords` feeds the mask effects.
pub const VERTEX_SHADER: &str = r#"
#ifdef GL_FRAGMENT_PRECISION_HIGH
#define HIGHP highp
#else
#define HIGHP mediump
#endif

attribute vec4 vPosition;
attribute vec2 vCoordinate;
uniform mediump float vPadding;
uniform mediump float vFlipY;
uniform mediump float screenDensity;
uniform HIGHP vec2 textureSize;

varying HIGHP vec2 coords;
varying HIGHP vec2 screenCoords;
varying mediump float screenMaskStrength;

void main() {
  coords.x = vCoordinate.x * vPadding;
  coords.y = mix(vCoordinate.y, 1.0 - vCoordinate.y, vFlipY);
  screenCoords = coords * textureSize;
  screenMaskStrength = smoothstep(2.0, 6.0, screenDensity);
  gl_Position = vPosition;
}
"#;

pub const DEFAULT_FRAGMENT: &str = r#"
precision mediump float;
uniform lowp sampler2D texture;
varying vec2 coords;

void main() {
  vec4 tex = texture2D(texture, coords);
  gl_FragColor = vec4(tex.rgb, 1.0);
}
"#;

pub const CRT_FRAGMENT: &str = r#"
#ifdef GL_FRAGMENT_PRECISION_HIGH
#define HIGHP highp
#else
#define HIGHP mediump
#endif
precision mediump float;

uniform HIGHP vec2 textureSize;
uniform lowp sampler2D texture;

varying HIGHP vec2 coords;
varying HIGHP vec2 screenCoords;
varying mediump float screenMaskStrength;

#define INTENSITY 0.30
#define BRIGHTBOOST 0.30

void main() {
  lowp vec3 texel = texture2D(texture, coords).rgb;
  lowp vec3 pixelHigh = ((1.0 + BRIGHTBOOST) - (0.2 * texel)) * texel;
  lowp vec3 pixelLow = ((1.0 - INTENSITY) + (0.1 * texel)) * texel;

  HIGHP vec2 cellCoords = fract(screenCoords) * 2.0 - vec2(1.0);

  lowp float mask = 1.0 - abs(cellCoords.y);

  gl_FragColor = vec4(mix(texel, mix(pixelLow, pixelHigh, mask), screenMaskStrength), 1.0);
}
"#;

pub const LCD_FRAGMENT: &str = r#"
#ifdef GL_FRAGMENT_PRECISION_HIGH
#define HIGHP highp
#else
#define HIGHP mediump
#endif
precision mediump float;

uniform HIGHP vec2 textureSize;
uniform lowp sampler2D texture;
uniform mediump float screenDensity;

varying HIGHP vec2 coords;
varying HIGHP vec2 screenCoords;
varying mediump float screenMaskStrength;

#define INTENSITY 0.25
#define BRIGHTBOOST 0.25

void main() {
  mediump vec2 threshold = vec2(1.0 / screenDensity);
  mediump vec2 x = fract(screenCoords);
  x = 0.5 * (smoothstep(vec2(0.0), threshold, x) + smoothstep(vec2(1.0) - threshold, vec2(1.0), x));
  mediump vec2 sharpCoords = (floor(screenCoords) + x) / textureSize;

  lowp vec3 texel = texture2D(texture, sharpCoords).rgb;
  lowp vec3 pixelHigh = ((1.0 + BRIGHTBOOST) - (0.2 * texel)) * texel;
  lowp vec3 pixelLow = ((1.0 - INTENSITY) + (0.1 * texel)) * texel;

  HIGHP vec2 cellCoords = fract(screenCoords) * 2.0 - vec2(1.0);
  cellCoords = cellCoords * cellCoords;

  lowp float mask = 1.0 - cellCoords.x - cellCoords.y;

  gl_FragColor = vec4(mix(texel, mix(pixelLow, pixelHigh, mask), screenMaskStrength), 1.0);
}
"#;

pub const SHARP_FRAGMENT: &str = r#"
#ifdef GL_FRAGMENT_PRECISION_HIGH
#define HIGHP highp
#else
#define HIGHP mediump
#endif
precision mediump float;

uniform lowp sampler2D texture;
uniform HIGHP vec2 textureSize;
uniform mediump float screenDensity;

varying vec2 coords;
varying vec2 screenCoords;

void main() {
  mediump vec2 threshold = vec2(1.0 / screenDensity);
  mediump vec2 x = fract(screenCoords);
  x = 0.5 * (smoothstep(vec2(0.0), threshold, x) + smoothstep(vec2(1.0) - threshold, vec2(1.0), x));
  mediump vec2 sharpCoords = (floor(screenCoords) + x) / textureSize;

  vec4 tex = texture2D(texture, sharpCoords);
  gl_FragColor = vec4(tex.rgb, 1.0);
}
"#;

fn compile_stage(gl: &glow::Context, kind: u32, source: &str) -> Result<glow::Shader> {
    unsafe {
        let shader = gl.create_shader(kind).map_err(RetroError::GlNotCompatible)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(RetroError::GlNotCompatible(format!(
                "shader compile failed: {log}"
            )));
        }
        Ok(shader)
    }
}

/// Compiles and links a program. Attributes may be pinned via
/// `bound_attributes` before linking.
pub(crate) fn compile_program(
    gl: &glow::Context,
    vertex_source: &str,
    fragment_source: &str,
    bound_attributes: &[(u32, &str)],
) -> Result<glow::Program> {
    let vertex = compile_stage(gl, glow::VERTEX_SHADER, vertex_source)?;
    let fragment = compile_stage(gl, glow::FRAGMENT_SHADER, fragment_source)?;

    unsafe {
        let program = gl.create_program().map_err(RetroError::GlNotCompatible)?;
        gl.attach_shader(program, vertex);
        gl.attach_shader(program, fragment);
        for (index, name) in bound_attributes {
            gl.bind_attrib_location(program, *index, name);
        }
        gl.link_program(program);
        gl.delete_shader(vertex);
        gl.delete_shader(fragment);

        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            return Err(RetroError::GlNotCompatible(format!(
                "program link failed: {log}"
            )));
        }

        Ok(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chain_is_single_pass() {
        let chain = ShaderChain::from_config(&ShaderConfig::default());
        assert_eq!(chain.passes.len(), 1);
        assert_eq!(chain.passes[0].scale, 1.0);
        assert!(chain.linear_texture);
    }

    #[test]
    fn sharp_chain_prescales_with_nearest() {
        let chain = ShaderChain::from_config(&ShaderConfig::new(ShaderKind::Sharp));
        assert_eq!(chain.passes.len(), 2);
        assert_eq!(chain.passes[0].scale, 2.0);
        assert!(!chain.passes[0].linear);
        assert!(chain.passes[1].linear);
        assert!(!chain.linear_texture);
    }

    #[test]
    fn params_ride_along_into_the_chain() {
        let config = ShaderConfig::new(ShaderKind::Crt)
            .with_param("screenDensity", ShaderParam::Float(4.0))
            .with_param("maskEnabled", ShaderParam::Bool(true));
        let chain = ShaderChain::from_config(&config);

        assert_eq!(
            chain.params.get("screenDensity").copied(),
            Some(ShaderParam::Float(4.0))
        );
        assert_eq!(chain.params.get("maskEnabled").unwrap().as_f32(), 1.0);
    }

    #[test]
    fn every_fragment_source_declares_main() {
        for source in [DEFAULT_FRAGMENT, CRT_FRAGMENT, LCD_FRAGMENT, SHARP_FRAGMENT] {
            assert!(source.contains("void main()"));
            assert!(source.contains("gl_FragColor"));
        }
    }
}
