use serde::{Deserialize, Serialize};

/// A point in canvas (or screen) units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle, `min` is the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub min: Position,
    pub max: Position,
}

impl Rect {
    pub fn from_origin_size(origin: Position, size: Size) -> Self {
        Self {
            min: origin,
            max: Position::new(origin.x + size.width, origin.y + size.height),
        }
    }

    pub fn width(&self) -> f32 { self.max.x - self.min.x }
    pub fn height(&self) -> f32 { self.max.y - self.min.y }
    pub fn size(&self) -> Size { Size::new(self.width(), self.height()) }

    pub fn center(&self) -> Position {
        Position::new((self.min.x + self.max.x) * 0.5, (self.min.y + self.max.y) * 0.5)
    }

    pub fn union(self, other: Rect) -> Rect {
        Rect {
            min: Position::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Position::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Grow every edge by `pad`, and the top edge by an extra `top_extra`.
    pub fn expand(self, pad: f32, top_extra: f32) -> Rect {
        Rect {
            min: Position::new(self.min.x - pad, self.min.y - pad - top_extra),
            max: Position::new(self.max.x + pad, self.max.y + pad),
        }
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
    }

    // Smallest rectangle covering all inputs; None for an empty iterator
    pub fn bounding<I: IntoIterator<Item = Rect>>(rects: I) -> Option<Rect> {
        rects.into_iter().reduce(Rect::union)
    }
}

/// Screen to canvas conversion supplied by whoever owns the viewport.
pub trait CoordinateTransform {
    fn screen_to_canvas(&self, screen: Position) -> Position;
}

/// Pan/zoom viewport state. Owned by the embedding UI and handed to drop
/// handling at the call site.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub pan: Position,
    pub zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { pan: Position::default(), zoom: 1.0 }
    }
}

impl Viewport {
    fn effective_zoom(&self) -> f32 {
        if self.zoom.abs() <= f32::EPSILON { 1.0 } else { self.zoom }
    }

    pub fn canvas_to_screen(&self, canvas: Position) -> Position {
        let z = self.effective_zoom();
        Position::new(canvas.x * z + self.pan.x, canvas.y * z + self.pan.y)
    }
}

impl CoordinateTransform for Viewport {
    fn screen_to_canvas(&self, screen: Position) -> Position {
        let z = self.effective_zoom();
        Position::new((screen.x - self.pan.x) / z, (screen.y - self.pan.y) / z)
    }
}

// Golden-angle spiral placement around the provided center.
// k is the 0-based index along the spiral.
pub fn golden_spiral_position(center: Position, k: u32, spacing: f32) -> Position {
    let golden_angle = std::f32::consts::TAU * (1.0 - 1.0 / 1.618_033_9);
    let t = k as f32;
    // sqrt growth keeps later points from flying out too fast
    let r = spacing * t.sqrt();
    let theta = t * golden_angle;
    Position::new(center.x + r * theta.cos(), center.y + r * theta.sin())
}
