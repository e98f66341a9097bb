/// Axis-aligned bounding box of one cup in frame pixel coordinates (TLWH).
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Region {
    /// Top-left x coordinate
    pub x: f32,
    /// Top-left y coordinate
    pub y: f32,
    /// Width of the bounding box
    pub width: f32,
    /// Height of the bounding box
    pub height: f32,
}

impl Region {
    /// Create a new Region from top-left coordinates and dimensions (TLWH format).
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a Region of the given size centred on (cx, cy).
    #[inline]
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            x: cx - width / 2.0,
            y: cy - height / 2.0,
            width,
            height,
        }
    }

    /// Get the center point of the bounding box.
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether the box has a strictly positive extent.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Euclidean distance between the centers of two boxes.
    pub fn center_distance(&self, other: &Region) -> f32 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    /// Shift the box by (dx, dy) without changing its size.
    #[inline]
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Keep the box inside a `frame_width` x `frame_height` frame.
    ///
    /// The box is shifted back inside first; it is only shrunk when it is
    /// larger than the frame itself.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Self {
        let fw = frame_width as f32;
        let fh = frame_height as f32;
        let width = self.width.min(fw);
        let height = self.height.min(fh);
        Self {
            x: self.x.clamp(0.0, fw - width),
            y: self.y.clamp(0.0, fh - height),
            width,
            height,
        }
    }
}
