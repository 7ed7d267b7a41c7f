use tracing::debug;

use crate::input::TOUCH_SENTINEL;

/// Sub-rect of the screen the content is laid out in, in normalized screen
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }
}

/// Computes the clip-space quad the frame is presented on.
///
/// The quad letterboxes the content aspect inside the viewport, rotates
/// about its center, and is normalized so the rotated content's axis-aligned
/// bounds still fill the letterbox box without cropping. Screen size,
/// aspect, rotation and viewport can be updated independently; the result
/// only depends on their latest values.
pub struct VideoLayout {
    screen_width: u32,
    screen_height: u32,
    aspect_ratio: f32,
    rotation: f32,
    viewport: Viewport,
    vertices: [f32; 12],
}

/// Full-screen triangle pair used by backdrop passes.
pub const BACKGROUND_VERTICES: [f32; 12] = [
    -1.0, -1.0, //
    -1.0, 1.0, //
    1.0, -1.0, //
    1.0, -1.0, //
    -1.0, 1.0, //
    1.0, 1.0,
];

/// Matching texture coordinates for a quad in the vertex order used here.
pub const QUAD_TEX_COORDS: [f32; 12] = [
    0.0, 0.0, //
    0.0, 1.0, //
    1.0, 0.0, //
    1.0, 0.0, //
    0.0, 1.0, //
    1.0, 1.0,
];

impl VideoLayout {
    pub fn new(rotation: f32, viewport: Viewport) -> Self {
        let mut layout = Self {
            screen_width: 0,
            screen_height: 0,
            aspect_ratio: 1.0,
            rotation,
            viewport,
            vertices: [0.0; 12],
        };
        layout.update_foreground_vertices();
        layout
    }

    pub fn foreground_vertices(&self) -> &[f32; 12] {
        &self.vertices
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    pub fn screen_size(&self) -> (u32, u32) {
        (self.screen_width, self.screen_height)
    }

    pub fn update_aspect_ratio(&mut self, aspect_ratio: f32) {
        debug!(aspect_ratio, "layout aspect ratio updated");
        self.aspect_ratio = aspect_ratio;
        self.update_foreground_vertices();
    }

    pub fn update_screen_size(&mut self, width: u32, height: u32) {
        debug!(width, height, "layout screen size updated");
        self.screen_width = width;
        self.screen_height = height;
        self.update_foreground_vertices();
    }

    pub fn update_rotation(&mut self, rotation: f32) {
        self.rotation = rotation;
        self.update_foreground_vertices();
    }

    pub fn update_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.update_foreground_vertices();
    }

    fn update_foreground_vertices(&mut self) {
        if self.screen_width == 0 || self.screen_height == 0 || self.aspect_ratio <= 0.0 {
            self.vertices = [0.0; 12];
            return;
        }

        let screen_w = self.screen_width as f32 * self.viewport.width;
        let screen_h = self.screen_height as f32 * self.viewport.height;
        let screen_aspect = screen_w / screen_h;
        let content_aspect = self.aspect_ratio;

        let mut scale_x = self.viewport.width;
        let mut scale_y = self.viewport.height;
        if content_aspect > screen_aspect {
            scale_y *= screen_aspect / content_aspect;
        } else {
            scale_x *= content_aspect / screen_aspect;
        }

        let viewport_x_offset = (self.viewport.x * 2.0) - (1.0 - self.viewport.width);
        let viewport_y_offset = (self.viewport.y * 2.0) - (1.0 - self.viewport.height);

        let cos_theta = (-self.rotation).cos();
        let sin_theta = (-self.rotation).sin();

        // Normalizes the rotated quad so its axis-aligned bounds stay inside
        // the letterbox box.
        let factor_x = scale_x / (scale_x * cos_theta.abs() + scale_y * sin_theta.abs());
        let factor_y = scale_y / (scale_x * sin_theta.abs() + scale_y * cos_theta.abs());

        let corners = [[-1.0f32, -1.0], [-1.0, 1.0], [1.0, -1.0], [1.0, 1.0]];
        let mut rotated = [[0.0f32; 2]; 4];

        for (corner, out) in corners.iter().zip(rotated.iter_mut()) {
            let orig_x = corner[0] * scale_x;
            let orig_y = corner[1] * scale_y;

            let raw_x = orig_x * cos_theta - orig_y * sin_theta;
            let raw_y = orig_x * sin_theta + orig_y * cos_theta;

            out[0] = raw_x * factor_x + viewport_x_offset;
            out[1] = raw_y * factor_y - viewport_y_offset;
        }

        self.vertices = [
            rotated[0][0], rotated[0][1], //
            rotated[1][0], rotated[1][1], //
            rotated[2][0], rotated[2][1], //
            rotated[2][0], rotated[2][1], //
            rotated[1][0], rotated[1][1], //
            rotated[3][0], rotated[3][1],
        ];
    }

    /// Maps a clip-space touch position into [0, 1]² relative to the quad's
    /// bounds; outside the bounds the sentinel is returned.
    pub fn relative_position(&self, touch_x: f32, touch_y: f32) -> (f32, f32) {
        let (min_x, min_y, max_x, max_y) = self.bounds();

        if touch_x < min_x || touch_x > max_x || touch_y < min_y || touch_y > max_y {
            return TOUCH_SENTINEL;
        }
        if max_x <= min_x || max_y <= min_y {
            return TOUCH_SENTINEL;
        }

        (
            (touch_x - min_x) / (max_x - min_x),
            (touch_y - min_y) / (max_y - min_y),
        )
    }

    /// Axis-aligned bounds of the foreground quad in clip space.
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;

        for pair in self.vertices.chunks_exact(2) {
            min_x = min_x.min(pair[0]);
            max_x = max_x.max(pair[0]);
            min_y = min_y.min(pair[1]);
            max_y = max_y.max(pair[1]);
        }

        (min_x, min_y, max_x, max_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn layout(
        screen: (u32, u32),
        aspect: f32,
        rotation: f32,
        viewport: Viewport,
    ) -> VideoLayout {
        let mut layout = VideoLayout::new(rotation, viewport);
        layout.update_screen_size(screen.0, screen.1);
        layout.update_aspect_ratio(aspect);
        layout
    }

    fn displayed_aspect(layout: &VideoLayout) -> f32 {
        let (min_x, min_y, max_x, max_y) = layout.bounds();
        let (sw, sh) = layout.screen_size();
        ((max_x - min_x) * sw as f32) / ((max_y - min_y) * sh as f32)
    }

    #[test]
    fn wide_content_letterboxes_vertically() {
        let layout = layout((1000, 1000), 2.0, 0.0, Viewport::default());
        let (min_x, min_y, max_x, max_y) = layout.bounds();

        assert!((min_x + 1.0).abs() < 1e-6);
        assert!((max_x - 1.0).abs() < 1e-6);
        assert!((min_y + 0.5).abs() < 1e-6);
        assert!((max_y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn aspect_is_preserved_under_all_quarter_turns() {
        for rotation in [0.0, -FRAC_PI_2, -PI, -3.0 * FRAC_PI_2] {
            let layout = layout((1920, 1080), 4.0 / 3.0, rotation, Viewport::default());
            assert!(
                (displayed_aspect(&layout) - 4.0 / 3.0).abs() < 1e-3,
                "rotation {rotation}"
            );
        }
    }

    #[test]
    fn quad_stays_inside_viewport() {
        let viewport = Viewport {
            x: 0.1,
            y: 0.2,
            width: 0.5,
            height: 0.6,
        };
        let layout = layout((1280, 720), 16.0 / 9.0, 0.0, viewport);
        let (min_x, min_y, max_x, max_y) = layout.bounds();

        // Viewport rect in clip space.
        let clip_min_x = viewport.x * 2.0 - 1.0;
        let clip_max_x = clip_min_x + viewport.width * 2.0;

        assert!(min_x >= clip_min_x - 1e-4);
        assert!(max_x <= clip_max_x + 1e-4);
        assert!(max_y - min_y <= viewport.height * 2.0 + 1e-4);
        assert!(min_y >= -1.0 - 1e-4 && max_y <= 1.0 + 1e-4);
    }

    #[test]
    fn relative_position_maps_bounds_to_unit_square() {
        let layout = layout((1000, 1000), 2.0, 0.0, Viewport::default());

        assert_eq!(layout.relative_position(-1.0, -0.5), (0.0, 0.0));
        assert_eq!(layout.relative_position(1.0, 0.5), (1.0, 1.0));
        assert_eq!(layout.relative_position(0.0, 0.0), (0.5, 0.5));
    }

    #[test]
    fn touch_outside_quad_returns_sentinel() {
        let layout = layout((1000, 1000), 2.0, 0.0, Viewport::default());
        assert_eq!(layout.relative_position(0.0, 0.9), TOUCH_SENTINEL);
        assert_eq!(layout.relative_position(-1.5, 0.0), TOUCH_SENTINEL);
    }

    #[test]
    fn degenerate_layout_yields_sentinel() {
        let layout = VideoLayout::new(0.0, Viewport::default());
        assert_eq!(layout.relative_position(0.0, 0.0), TOUCH_SENTINEL);
    }

    #[test]
    fn update_order_is_irrelevant() {
        let viewport = Viewport {
            x: 0.0,
            y: 0.1,
            width: 0.8,
            height: 0.9,
        };

        let mut a = VideoLayout::new(0.0, Viewport::default());
        a.update_screen_size(800, 600);
        a.update_aspect_ratio(1.5);
        a.update_rotation(-FRAC_PI_2);
        a.update_viewport(viewport);

        let mut b = VideoLayout::new(-FRAC_PI_2, viewport);
        b.update_aspect_ratio(1.5);
        b.update_screen_size(800, 600);

        assert_eq!(a.foreground_vertices(), b.foreground_vertices());
    }

    proptest! {
        #[test]
        fn bounds_never_escape_clip_space(
            width in 100u32..4000,
            height in 100u32..4000,
            aspect in 0.1f32..10.0,
            quarter_turns in 0u32..4,
        ) {
            let rotation = quarter_turns as f32 * -FRAC_PI_2;
            let layout = layout((width, height), aspect, rotation, Viewport::default());
            let (min_x, min_y, max_x, max_y) = layout.bounds();

            prop_assert!(min_x >= -1.0 - 1e-3 && max_x <= 1.0 + 1e-3);
            prop_assert!(min_y >= -1.0 - 1e-3 && max_y <= 1.0 + 1e-3);
            prop_assert!((displayed_aspect(&layout) - aspect).abs() < aspect * 1e-3 + 1e-3);
        }
    }
}
