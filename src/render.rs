use kurbo::{Affine, BezPath, Circle, Point, Rect, Shape as _, Stroke};

use crate::{
    error::{MotionvizError, MotionvizResult},
    simplify::SimplifiedScenario,
};

/// Per-track trajectory colors, cycled in track order.
const PALETTE: [[u8; 3]; 10] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
    [227, 119, 194],
    [127, 127, 127],
    [188, 189, 34],
    [23, 190, 207],
];

const MAP_GRAY: [u8; 3] = [200, 200, 200];
const MARKER_RED: [u8; 3] = [255, 0, 0];

#[derive(Clone, Debug)]
pub struct RenderSettings {
    /// Square canvas edge in pixels.
    pub size_px: u32,
    /// Extra margin around the auto-fit bounds, as a fraction of the window.
    pub margin_frac: f64,
    pub centerline_width: f64,
    pub track_width: f64,
    pub marker_radius: f64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            size_px: 720,
            margin_frac: 0.05,
            centerline_width: 1.0,
            track_width: 2.0,
            marker_radius: 4.0,
        }
    }
}

impl RenderSettings {
    pub fn validate(&self) -> MotionvizResult<()> {
        if self.size_px == 0 || self.size_px > u32::from(u16::MAX) {
            return Err(MotionvizError::validation(
                "render size_px must be in 1..=65535",
            ));
        }
        if !self.margin_frac.is_finite() || self.margin_frac < 0.0 {
            return Err(MotionvizError::validation(
                "render margin_frac must be finite and >= 0",
            ));
        }
        Ok(())
    }
}

/// One rendered frame: opaque RGBA8 over a white background.
#[derive(Clone, Debug)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// World-to-pixel mapping, fixed for the whole animation.
///
/// Computed once from the first frame's auto-fit bounds and reused for every
/// subsequent frame, so the camera never re-zooms as trajectories grow.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    affine: Affine,
}

impl Viewport {
    /// Fit a square window around everything the first frame draws:
    /// centerlines, static points, and each dynamic track's first position.
    pub fn fit(simple: &SimplifiedScenario, settings: &RenderSettings) -> MotionvizResult<Self> {
        let mut bounds: Option<Rect> = None;
        let mut grow = |p: Point| {
            let r = Rect::new(p.x, p.y, p.x, p.y);
            bounds = Some(match bounds {
                Some(b) => b.union(r),
                None => r,
            });
        };

        for centerline in &simple.centerlines {
            for &p in centerline {
                grow(p);
            }
        }
        for &p in &simple.static_points {
            grow(p);
        }
        for track in &simple.dynamic_tracks {
            if let Some(&p) = track.first() {
                grow(p);
            }
        }

        let bounds =
            bounds.ok_or_else(|| MotionvizError::render("scenario has no geometry to fit"))?;

        let mut window = bounds.width().max(bounds.height());
        if window <= 0.0 {
            // Degenerate single-point scene; any positive window will do.
            window = 1.0;
        }
        window *= 1.0 + 2.0 * settings.margin_frac;

        let scale = f64::from(settings.size_px) / window;
        let center = bounds.center();
        let half = f64::from(settings.size_px) / 2.0;

        // World y points up; pixel y points down.
        let affine = Affine::translate((half, half))
            * Affine::scale_non_uniform(scale, -scale)
            * Affine::translate((-center.x, -center.y));

        Ok(Self { affine })
    }

    pub fn map(&self, p: Point) -> Point {
        self.affine * p
    }
}

/// Render the whole animation: frame `t` draws all centerlines, all static
/// markers, each dynamic prefix `[0..t)` and a ring at the current position.
pub fn render_animation(
    simple: &SimplifiedScenario,
    settings: &RenderSettings,
) -> MotionvizResult<Vec<FrameRgba>> {
    settings.validate()?;

    let frame_count = simple.frame_count();
    if frame_count == 0 {
        return Err(MotionvizError::render(
            "scenario has no dynamic tracks to animate",
        ));
    }

    let viewport = Viewport::fit(simple, settings)?;
    let mut frames = Vec::with_capacity(frame_count);
    for t in 0..frame_count {
        frames.push(render_frame(simple, t, &viewport, settings)?);
    }
    Ok(frames)
}

pub fn render_frame(
    simple: &SimplifiedScenario,
    t: usize,
    viewport: &Viewport,
    settings: &RenderSettings,
) -> MotionvizResult<FrameRgba> {
    let size: u16 = settings
        .size_px
        .try_into()
        .map_err(|_| MotionvizError::render("canvas size exceeds u16"))?;

    let mut ctx = vello_cpu::RenderContext::new(size, size);
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(255, 255, 255, 255));
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        0.0,
        0.0,
        f64::from(size),
        f64::from(size),
    ));

    // Draw order doubles as z-order: map, idle markers, trails, current.
    let dashed = Stroke::new(settings.centerline_width).with_dashes(0.0, [4.0, 4.0]);
    for centerline in &simple.centerlines {
        stroke_polyline(&mut ctx, viewport, centerline, &dashed, MAP_GRAY);
    }

    let thin = Stroke::new(settings.centerline_width);
    for &p in &simple.static_points {
        stroke_ring(&mut ctx, viewport, p, settings.marker_radius, &thin, MAP_GRAY);
    }

    let trail = Stroke::new(settings.track_width);
    for (idx, track) in simple.dynamic_tracks.iter().enumerate() {
        let color = PALETTE[idx % PALETTE.len()];
        let end = (t + 1).min(track.len());
        stroke_polyline(&mut ctx, viewport, &track[..end], &trail, color);
    }

    for track in &simple.dynamic_tracks {
        let current = track.get(t).copied().ok_or_else(|| {
            MotionvizError::render(format!("frame {t} outside dynamic track length"))
        })?;
        stroke_ring(
            &mut ctx,
            viewport,
            current,
            settings.marker_radius,
            &thin,
            MARKER_RED,
        );
    }

    let mut pixmap = vello_cpu::Pixmap::new(size, size);
    ctx.flush();
    ctx.render_to_pixmap(&mut pixmap);

    Ok(FrameRgba {
        width: u32::from(size),
        height: u32::from(size),
        data: pixmap.data_as_u8_slice().to_vec(),
    })
}

fn stroke_polyline(
    ctx: &mut vello_cpu::RenderContext,
    viewport: &Viewport,
    points: &[Point],
    stroke: &Stroke,
    rgb: [u8; 3],
) {
    if points.len() < 2 {
        return;
    }
    let mut path = BezPath::new();
    path.move_to(viewport.map(points[0]));
    for &p in &points[1..] {
        path.line_to(viewport.map(p));
    }

    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
        rgb[0], rgb[1], rgb[2], 255,
    ));
    ctx.set_stroke(stroke_to_cpu(stroke));
    ctx.stroke_path(&bezpath_to_cpu(&path));
}

fn stroke_ring(
    ctx: &mut vello_cpu::RenderContext,
    viewport: &Viewport,
    center: Point,
    radius_px: f64,
    stroke: &Stroke,
    rgb: [u8; 3],
) {
    let path = Circle::new(viewport.map(center), radius_px).to_path(0.1);

    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
        rgb[0], rgb[1], rgb[2], 255,
    ));
    ctx.set_stroke(stroke_to_cpu(stroke));
    ctx.stroke_path(&bezpath_to_cpu(&path));
}

// vello_cpu bundles its own kurbo; convert at the boundary.

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn stroke_to_cpu(s: &Stroke) -> vello_cpu::kurbo::Stroke {
    let mut out = vello_cpu::kurbo::Stroke::new(s.width);
    if !s.dash_pattern.is_empty() {
        out = out.with_dashes(s.dash_offset, s.dash_pattern.iter().copied());
    }
    out
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_scenario() -> SimplifiedScenario {
        SimplifiedScenario {
            centerlines: vec![vec![Point::new(-10.0, 0.0), Point::new(10.0, 0.0)]],
            static_points: vec![Point::new(0.0, 5.0)],
            dynamic_tracks: vec![
                vec![
                    Point::new(-5.0, 0.0),
                    Point::new(0.0, 0.0),
                    Point::new(5.0, 0.0),
                ],
                vec![
                    Point::new(0.0, -5.0),
                    Point::new(0.0, 0.0),
                    Point::new(0.0, 5.0),
                ],
            ],
        }
    }

    #[test]
    fn settings_validation_catches_bad_values() {
        let s = RenderSettings {
            size_px: 0,
            ..RenderSettings::default()
        };
        assert!(s.validate().is_err());

        let s = RenderSettings {
            margin_frac: -0.1,
            ..RenderSettings::default()
        };
        assert!(s.validate().is_err());

        assert!(RenderSettings::default().validate().is_ok());
    }

    #[test]
    fn viewport_maps_scene_center_to_canvas_center() {
        let settings = RenderSettings {
            size_px: 100,
            ..RenderSettings::default()
        };
        let viewport = Viewport::fit(&sample_scenario(), &settings).unwrap();
        // Scene bounds are [-10,10]x[-5,5]; center is the origin.
        let mapped = viewport.map(Point::new(0.0, 0.0));
        assert!((mapped.x - 50.0).abs() < 1e-9);
        assert!((mapped.y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn viewport_flips_y_axis() {
        let settings = RenderSettings {
            size_px: 100,
            ..RenderSettings::default()
        };
        let viewport = Viewport::fit(&sample_scenario(), &settings).unwrap();
        let up = viewport.map(Point::new(0.0, 5.0));
        let down = viewport.map(Point::new(0.0, -5.0));
        assert!(up.y < down.y);
    }

    #[test]
    fn viewport_fit_fails_on_empty_scene() {
        let empty = SimplifiedScenario::default();
        assert!(Viewport::fit(&empty, &RenderSettings::default()).is_err());
    }

    #[test]
    fn animation_has_one_frame_per_timestep() {
        let settings = RenderSettings {
            size_px: 64,
            ..RenderSettings::default()
        };
        let frames = render_animation(&sample_scenario(), &settings).unwrap();
        assert_eq!(frames.len(), 3);
        for frame in &frames {
            assert_eq!(frame.width, 64);
            assert_eq!(frame.height, 64);
            assert_eq!(frame.data.len(), 64 * 64 * 4);
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let settings = RenderSettings {
            size_px: 64,
            ..RenderSettings::default()
        };
        let a = render_animation(&sample_scenario(), &settings).unwrap();
        let b = render_animation(&sample_scenario(), &settings).unwrap();
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].data, b[0].data);
        assert_eq!(a[2].data, b[2].data);
    }

    #[test]
    fn framing_ignores_later_track_positions() {
        let settings = RenderSettings {
            size_px: 100,
            ..RenderSettings::default()
        };
        let near = sample_scenario();
        let mut far = sample_scenario();
        // Same first positions, wildly different endpoints.
        far.dynamic_tracks[0][2] = Point::new(500.0, 500.0);
        let a = Viewport::fit(&near, &settings).unwrap();
        let b = Viewport::fit(&far, &settings).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn animation_requires_dynamic_tracks() {
        let scene = SimplifiedScenario {
            centerlines: vec![vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]],
            static_points: vec![],
            dynamic_tracks: vec![],
        };
        assert!(render_animation(&scene, &RenderSettings::default()).is_err());
    }
}
