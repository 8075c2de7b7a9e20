// SPDX-License-Identifier: MPL-2.0

//! Canny-style edge detection on the luma plane
//!
//! Sobel gradients, non-maximum suppression along the gradient direction,
//! then hysteresis: pixels above the high threshold seed edges, which grow
//! through 8-connected neighbours above the low threshold. Output is white
//! edges on opaque black.

use super::FrameProcessor;
use crate::constants::edges;
use crate::errors::ProcessingError;
use crate::media::ConvertedFrame;
use tracing::debug;

/// Gradient direction, quantized to the four neighbour axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Horizontal,
    Diagonal,
    Vertical,
    AntiDiagonal,
}

impl Direction {
    fn from_gradient(gx: f32, gy: f32) -> Self {
        // Angle folded into 0..180 degrees
        let mut angle = gy.atan2(gx).to_degrees();
        if angle < 0.0 {
            angle += 180.0;
        }
        if !(22.5..157.5).contains(&angle) {
            Direction::Horizontal
        } else if angle < 67.5 {
            Direction::Diagonal
        } else if angle < 112.5 {
            Direction::Vertical
        } else {
            Direction::AntiDiagonal
        }
    }
}

const WEAK: u8 = 1;
const STRONG: u8 = 2;

pub struct EdgeDetector {
    low: f32,
    high: f32,
    width: usize,
    height: usize,
    magnitude: Vec<f32>,
    direction: Vec<Direction>,
    marks: Vec<u8>,
    stack: Vec<usize>,
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new(edges::DEFAULT_LOW_THRESHOLD, edges::DEFAULT_HIGH_THRESHOLD)
    }
}

impl EdgeDetector {
    /// Thresholds are gradient magnitudes on 8-bit luma; swapped if reversed
    pub fn new(low: f32, high: f32) -> Self {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        Self {
            low,
            high,
            width: 0,
            height: 0,
            magnitude: Vec::new(),
            direction: Vec::new(),
            marks: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn compute_gradients(&mut self, luma: &[u8]) {
        let (w, h) = (self.width, self.height);
        self.magnitude.fill(0.0);
        self.direction.fill(Direction::Horizontal);
        if w < 3 || h < 3 {
            return;
        }

        for y in 1..h - 1 {
            let above = &luma[(y - 1) * w..y * w];
            let row = &luma[y * w..(y + 1) * w];
            let below = &luma[(y + 1) * w..(y + 2) * w];
            for x in 1..w - 1 {
                let tl = above[x - 1] as f32;
                let tm = above[x] as f32;
                let tr = above[x + 1] as f32;
                let ml = row[x - 1] as f32;
                let mr = row[x + 1] as f32;
                let bl = below[x - 1] as f32;
                let bm = below[x] as f32;
                let br = below[x + 1] as f32;

                let gx = -tl - 2.0 * ml - bl + tr + 2.0 * mr + br;
                let gy = -tl - 2.0 * tm - tr + bl + 2.0 * bm + br;

                let i = y * w + x;
                self.magnitude[i] = (gx * gx + gy * gy).sqrt();
                self.direction[i] = Direction::from_gradient(gx, gy);
            }
        }
    }

    /// Thin edges and classify survivors as weak or strong
    fn suppress_and_classify(&mut self) {
        let w = self.width;
        self.marks.fill(0);
        if w < 3 || self.height < 3 {
            return;
        }

        for y in 1..self.height - 1 {
            for x in 1..w - 1 {
                let i = y * w + x;
                let m = self.magnitude[i];
                if m < self.low {
                    continue;
                }
                let (a, b) = match self.direction[i] {
                    Direction::Horizontal => (i - 1, i + 1),
                    Direction::Vertical => (i - w, i + w),
                    // Image rows grow downwards, so a positive angle points down-right
                    Direction::Diagonal => (i - w - 1, i + w + 1),
                    Direction::AntiDiagonal => (i - w + 1, i + w - 1),
                };
                if m < self.magnitude[a] || m < self.magnitude[b] {
                    continue;
                }
                self.marks[i] = if m >= self.high { STRONG } else { WEAK };
            }
        }
    }

    /// Promote weak pixels connected to strong ones
    fn hysteresis(&mut self) {
        let (w, h) = (self.width, self.height);
        self.stack.clear();
        self.stack
            .extend((0..self.marks.len()).filter(|&i| self.marks[i] == STRONG));

        while let Some(i) = self.stack.pop() {
            let (x, y) = (i % w, i / w);
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = ny * w + nx;
                    if self.marks[n] == WEAK {
                        self.marks[n] = STRONG;
                        self.stack.push(n);
                    }
                }
            }
        }
    }
}

impl FrameProcessor for EdgeDetector {
    fn name(&self) -> &str {
        "edge-detector"
    }

    fn allocate(&mut self, width: u32, height: u32) -> Result<(), ProcessingError> {
        let pixels = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| ProcessingError::Failed("frame too large".to_string()))?;
        self.width = width as usize;
        self.height = height as usize;
        self.magnitude = vec![0.0; pixels];
        self.direction = vec![Direction::Horizontal; pixels];
        self.marks = vec![0; pixels];
        self.stack = Vec::with_capacity(pixels / 16);
        debug!(width, height, low = self.low, high = self.high, "Edge detector allocated");
        Ok(())
    }

    fn process(
        &mut self,
        input: &ConvertedFrame,
        output: &mut [u8],
    ) -> Result<(), ProcessingError> {
        let pixels = self.width * self.height;
        if input.width as usize != self.width || input.height as usize != self.height {
            return Err(ProcessingError::ResolutionMismatch {
                session: (self.width as u32, self.height as u32),
                frame: (input.width, input.height),
            });
        }
        let luma = input.y_plane();
        if luma.len() < pixels || output.len() != pixels * 4 {
            return Err(ProcessingError::Failed(format!(
                "buffer sizes do not fit {}x{}",
                self.width, self.height
            )));
        }

        self.compute_gradients(luma);
        self.suppress_and_classify();
        self.hysteresis();

        for (px, &mark) in output.chunks_exact_mut(4).zip(&self.marks) {
            let v = if mark == STRONG { 255 } else { 0 };
            px.copy_from_slice(&[v, v, v, 255]);
        }
        Ok(())
    }

    fn free(&mut self) {
        self.width = 0;
        self.height = 0;
        self.magnitude = Vec::new();
        self.direction = Vec::new();
        self.marks = Vec::new();
        self.stack = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::planar_420_size;

    /// Frame whose left half is black and right half white
    fn step_frame(width: u32, height: u32) -> ConvertedFrame {
        let mut data = vec![128u8; planar_420_size(width, height)];
        for y in 0..height as usize {
            for x in 0..width as usize {
                data[y * width as usize + x] = if x < width as usize / 2 { 0 } else { 255 };
            }
        }
        ConvertedFrame {
            width,
            height,
            data,
            timestamp_ns: 0,
        }
    }

    fn run(detector: &mut EdgeDetector, frame: &ConvertedFrame) -> Vec<u8> {
        detector.allocate(frame.width, frame.height).unwrap();
        let mut out = vec![0u8; (frame.width * frame.height * 4) as usize];
        detector.process(frame, &mut out).unwrap();
        out
    }

    #[test]
    fn test_flat_frame_has_no_edges() {
        let mut detector = EdgeDetector::default();
        let frame = ConvertedFrame {
            width: 16,
            height: 16,
            data: vec![90u8; planar_420_size(16, 16)],
            timestamp_ns: 0,
        };
        let out = run(&mut detector, &frame);
        assert!(out.chunks_exact(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn test_vertical_step_produces_thin_edge() {
        let mut detector = EdgeDetector::default();
        let frame = step_frame(16, 16);
        let out = run(&mut detector, &frame);

        // Interior row: the edge is a thin line next to the step, not a band
        let row = 8usize;
        let lit: Vec<usize> = (0..16)
            .filter(|&x| out[(row * 16 + x) * 4] == 255)
            .collect();
        assert!(!lit.is_empty());
        assert!(lit.len() <= 2, "edge too thick: {:?}", lit);
        assert!(lit.iter().all(|&x| x == 7 || x == 8));
        // Alpha is always opaque
        assert!(out.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn test_weak_edges_need_strong_neighbours() {
        // A faint step (gradient 4 * 30 = 120) sits between low and high thresholds
        let mut data = vec![128u8; planar_420_size(16, 16)];
        for y in 0..16 {
            for x in 0..16 {
                data[y * 16 + x] = if x < 8 { 100 } else { 130 };
            }
        }
        let frame = ConvertedFrame {
            width: 16,
            height: 16,
            data,
            timestamp_ns: 0,
        };
        let mut detector = EdgeDetector::default();
        let out = run(&mut detector, &frame);
        assert!(out.chunks_exact(4).all(|px| px[0] == 0));

        // Lowering the high threshold turns the same step into an edge
        let mut detector = EdgeDetector::new(80.0, 100.0);
        let out = run(&mut detector, &frame);
        assert!(out.chunks_exact(4).any(|px| px[0] == 255));
    }

    #[test]
    fn test_rejects_wrong_resolution() {
        let mut detector = EdgeDetector::default();
        detector.allocate(8, 8).unwrap();
        let frame = step_frame(16, 16);
        let mut out = vec![0u8; 16 * 16 * 4];
        assert!(matches!(
            detector.process(&frame, &mut out),
            Err(ProcessingError::ResolutionMismatch { .. })
        ));
    }

    #[test]
    fn test_direction_quantization() {
        assert_eq!(Direction::from_gradient(1.0, 0.0), Direction::Horizontal);
        assert_eq!(Direction::from_gradient(-1.0, 0.0), Direction::Horizontal);
        assert_eq!(Direction::from_gradient(0.0, 1.0), Direction::Vertical);
        assert_eq!(Direction::from_gradient(1.0, 1.0), Direction::Diagonal);
        assert_eq!(Direction::from_gradient(-1.0, 1.0), Direction::AntiDiagonal);
    }
}
