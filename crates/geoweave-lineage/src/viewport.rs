//! Zoom transforms for panning and zooming the graph.

use std::fmt;

/// `translate(x,y)scale(k)` applied to the graph group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomTransform {
    pub x: f64,
    pub y: f64,
    pub k: f64,
}

impl Default for ZoomTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ZoomTransform {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        k: 1.0,
    };

    pub fn new(x: f64, y: f64, k: f64) -> Self {
        Self { x, y, k }
    }

    /// Fit a graph into a viewport, centered, never enlarging past 100%
    pub fn fit(viewport: (f64, f64), graph_size: (f64, f64), margin: f64) -> Self {
        let (viewport_width, viewport_height) = viewport;
        let graph_width = if graph_size.0 > 0.0 { graph_size.0 } else { 1.0 };
        let graph_height = if graph_size.1 > 0.0 { graph_size.1 } else { 1.0 };

        let padded_width = viewport_width - margin;
        let padded_height = viewport_height - margin;
        let scale = (padded_width / graph_width)
            .min(padded_height / graph_height)
            .min(1.0);

        Self {
            x: (viewport_width - scale * graph_width) / 2.0,
            y: (viewport_height - scale * graph_height) / 2.0,
            k: scale,
        }
    }

    /// Replace NaN components by zero; a NaN translation drops both axes
    pub fn sanitized(self) -> Self {
        let (x, y) = if self.x.is_nan() || self.y.is_nan() {
            (0.0, 0.0)
        } else {
            (self.x, self.y)
        };
        let k = if self.k.is_nan() { 0.0 } else { self.k };
        Self { x, y, k }
    }

    pub fn to_css(&self) -> String {
        let sanitized = self.sanitized();
        format!(
            "translate({},{})scale({})",
            sanitized.x, sanitized.y, sanitized.k
        )
    }

    /// Map a point from graph to screen coordinates
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.k + self.x, y * self.k + self.y)
    }

    /// Map a point from screen to graph coordinates
    pub fn invert(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.x) / self.k, (y - self.y) / self.k)
    }
}

impl fmt::Display for ZoomTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

/// Gesture state; every gesture frame yields the transform to apply
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanZoom {
    transform: ZoomTransform,
    min_scale: f64,
    max_scale: f64,
}

impl PanZoom {
    pub fn new(initial: ZoomTransform) -> Self {
        Self {
            transform: initial,
            min_scale: 0.0,
            max_scale: f64::INFINITY,
        }
    }

    pub fn with_scale_extent(mut self, min_scale: f64, max_scale: f64) -> Self {
        self.min_scale = min_scale;
        self.max_scale = max_scale;
        self
    }

    pub fn transform(&self) -> ZoomTransform {
        self.transform
    }

    /// A transform reported by a gesture handler
    pub fn set_transform(&mut self, transform: ZoomTransform) -> String {
        self.transform = transform;
        self.transform.to_css()
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) -> String {
        self.transform.x += dx;
        self.transform.y += dy;
        self.transform.to_css()
    }

    /// Scale by `factor` keeping the screen point `(focus_x, focus_y)` in place
    pub fn zoom_by(&mut self, factor: f64, focus_x: f64, focus_y: f64) -> String {
        let (graph_x, graph_y) = self.transform.invert(focus_x, focus_y);
        let k = (self.transform.k * factor).clamp(self.min_scale, self.max_scale);
        self.transform = ZoomTransform {
            x: focus_x - graph_x * k,
            y: focus_y - graph_y * k,
            k,
        };
        self.transform.to_css()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_never_enlarges() {
        let transform = ZoomTransform::fit((800.0, 600.0), (200.0, 100.0), 40.0);
        assert_eq!(transform, ZoomTransform::new(300.0, 250.0, 1.0));
    }

    #[test]
    fn test_fit_shrinks_large_graphs() {
        let transform = ZoomTransform::fit((540.0, 440.0), (1000.0, 200.0), 40.0);
        assert_eq!(transform.k, 0.5);
        assert_eq!(transform.x, 20.0);
        assert_eq!(transform.y, 170.0);
    }

    #[test]
    fn test_css_guards_nan() {
        assert_eq!(
            ZoomTransform::new(f64::NAN, 3.0, f64::NAN).to_css(),
            "translate(0,0)scale(0)"
        );
        assert_eq!(
            ZoomTransform::new(10.0, 20.5, 0.5).to_css(),
            "translate(10,20.5)scale(0.5)"
        );
    }

    #[test]
    fn test_zoom_keeps_focus_point() {
        let mut pan_zoom = PanZoom::new(ZoomTransform::new(10.0, 10.0, 1.0)).with_scale_extent(0.1, 4.0);
        pan_zoom.zoom_by(2.0, 110.0, 60.0);
        let transform = pan_zoom.transform();
        assert_eq!(transform.apply(100.0, 50.0), (110.0, 60.0));
        assert_eq!(transform.k, 2.0);

        pan_zoom.zoom_by(10.0, 0.0, 0.0);
        assert_eq!(pan_zoom.transform().k, 4.0);

        assert_eq!(pan_zoom.pan_by(5.0, -5.0), pan_zoom.transform().to_css());
    }
}
