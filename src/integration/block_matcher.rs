//! Windowed block matching for propagating cup regions between frames.
//!
//! The region (plus a little context) is cut out of the previous luma plane
//! and searched for in the current one inside a square window around its old
//! position. A coarse grid pass finds the basin, a dense pass around the
//! coarse winner finds the exact displacement.

use image::GrayImage;

use crate::tracker::{FlowStatus, MotionConfig, MotionEstimator, PointFlow, Region, TrackerError};

#[derive(Debug, Clone)]
pub struct BlockMatcher {
    config: MotionConfig,
}

impl BlockMatcher {
    pub fn new(config: MotionConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }
}

impl Default for BlockMatcher {
    fn default() -> Self {
        Self {
            config: MotionConfig::default(),
        }
    }
}

/// Pixel rectangle, end-exclusive.
#[derive(Debug, Clone, Copy)]
struct Window {
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
}

impl Window {
    /// `region` grown by `margin` and clipped to the frame.
    fn around(region: &Region, margin: u32, width: u32, height: u32) -> Option<Self> {
        let margin = i64::from(margin);
        Self {
            x0: region.x.floor() as i64 - margin,
            y0: region.y.floor() as i64 - margin,
            x1: (region.x + region.width).ceil() as i64 + margin,
            y1: (region.y + region.height).ceil() as i64 + margin,
        }
        .clip(width, height)
    }

    fn clip(self, width: u32, height: u32) -> Option<Self> {
        let window = Self {
            x0: self.x0.max(0),
            y0: self.y0.max(0),
            x1: self.x1.min(i64::from(width)),
            y1: self.y1.min(i64::from(height)),
        };
        (window.x1 > window.x0 && window.y1 > window.y0).then_some(window)
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    dx: i64,
    dy: i64,
    sad: u64,
    /// Pixels compared; candidates near the border compare fewer.
    count: u64,
}

impl Candidate {
    /// Lower mean error wins, then the shorter displacement.
    fn beats(&self, other: &Candidate) -> bool {
        let mine = u128::from(self.sad) * u128::from(other.count);
        let theirs = u128::from(other.sad) * u128::from(self.count);
        (mine, self.dx.abs() + self.dy.abs()) < (theirs, other.dx.abs() + other.dy.abs())
    }

    fn residual(&self) -> f32 {
        self.sad as f32 / self.count as f32
    }
}

#[derive(Clone, Copy)]
struct Matcher<'a> {
    previous: &'a [u8],
    current: &'a [u8],
    width: i64,
    height: i64,
    window: Window,
    step: i64,
}

impl Matcher<'_> {
    fn samples(&self, area: Window) -> impl Iterator<Item = (i64, i64)> {
        let step = self.step as usize;
        (area.y0..area.y1)
            .step_by(step)
            .flat_map(move |y| (area.x0..area.x1).step_by(step).map(move |x| (x, y)))
    }

    fn count(&self, area: Window) -> u64 {
        let span = |lo: i64, hi: i64| {
            if hi > lo {
                ((hi - lo + self.step - 1) / self.step) as u64
            } else {
                0
            }
        };
        span(area.x0, area.x1) * span(area.y0, area.y1)
    }

    /// Template pixels still inside the current frame at (dx, dy), kept on the sampling grid.
    fn overlap(&self, dx: i64, dy: i64) -> Window {
        let w = self.window;
        let align = |lo: i64, origin: i64| origin + (lo - origin + self.step - 1) / self.step * self.step;
        Window {
            x0: align(w.x0.max(-dx), w.x0),
            y0: align(w.y0.max(-dy), w.y0),
            x1: w.x1.min(self.width - dx),
            y1: w.y1.min(self.height - dy),
        }
    }

    fn index(&self, x: i64, y: i64) -> usize {
        (y * self.width + x) as usize
    }

    /// Luma standard deviation of the template.
    fn contrast(&self) -> f32 {
        let n = self.count(self.window) as f64;
        let (sum, sum_sq) = self
            .samples(self.window)
            .fold((0.0f64, 0.0f64), |(s, sq), (x, y)| {
                let v = self.previous[self.index(x, y)] as f64;
                (s + v, sq + v * v)
            });
        let mean = sum / n;
        ((sum_sq / n - mean * mean).max(0.0)).sqrt() as f32
    }

    /// Sum of absolute differences at (dx, dy), abandoned once it can no longer beat `best`.
    fn score(&self, dx: i64, dy: i64, best: Option<Candidate>) -> Option<Candidate> {
        let area = self.overlap(dx, dy);
        let count = self.count(area);
        if count == 0 {
            return None;
        }
        let bound = best.map_or(u64::MAX, |b| {
            (u128::from(b.sad) * u128::from(count) / u128::from(b.count)) as u64
        });
        let mut sad = 0u64;
        for (x, y) in self.samples(area) {
            let a = self.previous[self.index(x, y)];
            let b = self.current[self.index(x + dx, y + dy)];
            sad += u64::from(a.abs_diff(b));
            if sad > bound {
                break;
            }
        }
        Some(Candidate { dx, dy, sad, count })
    }

    fn best_of(&self, offsets: impl Iterator<Item = (i64, i64)>) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for (dx, dy) in offsets {
            let Some(candidate) = self.score(dx, dy, best) else {
                continue;
            };
            if best.is_none_or(|b| candidate.beats(&b)) {
                best = Some(candidate);
            }
        }
        best
    }
}

/// Offsets in `lo..=hi` on a grid of `step` anchored at zero.
fn grid(lo: i64, hi: i64, step: i64) -> Vec<i64> {
    let mut values: Vec<i64> = (0..=hi).step_by(step as usize).collect();
    values.extend((1..).map(|k| -k * step).take_while(|&v| v >= lo));
    values
}

impl MotionEstimator for BlockMatcher {
    fn estimate(&self, previous: &GrayImage, current: &GrayImage, region: &Region) -> PointFlow {
        if previous.dimensions() != current.dimensions() {
            return PointFlow::failed(FlowStatus::OutOfBounds);
        }
        let (width, height) = previous.dimensions();
        let Some(window) = Window::around(region, self.config.template_margin, width, height)
        else {
            return PointFlow::failed(FlowStatus::OutOfBounds);
        };
        let Some(body) = Window::around(region, 0, width, height) else {
            return PointFlow::failed(FlowStatus::OutOfBounds);
        };

        let coarse_matcher = Matcher {
            previous: previous.as_raw(),
            current: current.as_raw(),
            width: i64::from(width),
            height: i64::from(height),
            window,
            step: i64::from(self.config.sample_stride),
        };

        if coarse_matcher.contrast() < self.config.min_contrast {
            return PointFlow::failed(FlowStatus::Lost);
        }

        // The region must stay inside the frame; its margin may fall off the edge.
        let radius = i64::from(self.config.search_radius);
        let (dx_lo, dx_hi) = ((-radius).max(-body.x0), radius.min(i64::from(width) - body.x1));
        let (dy_lo, dy_hi) = ((-radius).max(-body.y0), radius.min(i64::from(height) - body.y1));
        if dx_lo > dx_hi || dy_lo > dy_hi {
            return PointFlow::failed(FlowStatus::OutOfBounds);
        }

        let step = i64::from(self.config.coarse_step);
        let xs = grid(dx_lo, dx_hi, step);
        let ys = grid(dy_lo, dy_hi, step);
        let coarse = coarse_matcher
            .best_of(ys.iter().flat_map(|&dy| xs.iter().map(move |&dx| (dx, dy))));
        let Some(coarse) = coarse else {
            return PointFlow::failed(FlowStatus::OutOfBounds);
        };

        // Every pixel in the dense pass: a subsampled template cannot tell
        // one-pixel neighbours apart.
        let fine_matcher = Matcher {
            step: 1,
            ..coarse_matcher
        };
        let reach = step - 1;
        let fine_x = (coarse.dx - reach).max(dx_lo)..=(coarse.dx + reach).min(dx_hi);
        let fine_y = (coarse.dy - reach).max(dy_lo)..=(coarse.dy + reach).min(dy_hi);
        let fine = fine_matcher.best_of(fine_y.flat_map(|dy| fine_x.clone().map(move |dx| (dx, dy))));
        let Some(best) = fine else {
            return PointFlow::failed(FlowStatus::OutOfBounds);
        };

        let residual = best.residual();
        if residual > self.config.max_residual {
            return PointFlow {
                residual,
                ..PointFlow::failed(FlowStatus::Lost)
            };
        }
        PointFlow::tracked(best.dx as f32, best.dy as f32, residual)
    }
}
