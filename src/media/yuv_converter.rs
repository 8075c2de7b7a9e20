// SPDX-License-Identifier: MPL-2.0

//! Flexible YUV 4:2:0 to NV21 repacking

use crate::backends::camera::types::{PlaneLayout, RawFrame};
use crate::constants::planar_420_size;
use tracing::{debug, trace};

/// Tightly packed NV21 frame handed to the processing stage
///
/// `data` holds `width * height` luma bytes followed by `width * height / 2`
/// bytes of interleaved V/U pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub timestamp_ns: u64,
}

impl ConvertedFrame {
    /// Luma plane
    pub fn y_plane(&self) -> &[u8] {
        let luma = self.width as usize * self.height as usize;
        &self.data[..luma.min(self.data.len())]
    }

    /// Interleaved V/U plane
    pub fn vu_plane(&self) -> &[u8] {
        let luma = self.width as usize * self.height as usize;
        &self.data[luma.min(self.data.len())..]
    }
}

/// Repack a captured frame into NV21
///
/// Returns `None` for anything that isn't a YUV 4:2:0 frame with even,
/// non-zero dimensions and a buffer large enough for its declared planes.
/// Each plane is read through its own row and pixel stride.
pub fn convert(frame: &RawFrame) -> Option<ConvertedFrame> {
    if !frame.format.is_yuv() {
        debug!(format = ?frame.format, "Dropping frame in unsupported format");
        return None;
    }
    if frame.width == 0 || frame.height == 0 || frame.width % 2 != 0 || frame.height % 2 != 0 {
        debug!(
            width = frame.width,
            height = frame.height,
            "Dropping frame with odd or empty dimensions"
        );
        return None;
    }

    let width = frame.width as usize;
    let height = frame.height as usize;
    let chroma_w = width / 2;
    let chroma_h = height / 2;

    if !plane_fits(&frame.y_plane, width, height, frame.data.len())
        || !plane_fits(&frame.u_plane, chroma_w, chroma_h, frame.data.len())
        || !plane_fits(&frame.v_plane, chroma_w, chroma_h, frame.data.len())
    {
        debug!(
            len = frame.data.len(),
            "Dropping frame whose buffer is shorter than its plane layout"
        );
        return None;
    }

    let src = &frame.data[..];
    let mut out = Vec::with_capacity(planar_420_size(frame.width, frame.height));

    // Luma: copy row by row, dropping padding
    let y = &frame.y_plane;
    if y.pixel_stride == 1 {
        for row in 0..height {
            let start = y.index(0, row);
            out.extend_from_slice(&src[start..start + width]);
        }
    } else {
        for row in 0..height {
            out.extend((0..width).map(|col| src[y.index(col, row)]));
        }
    }

    // Chroma: one V/U pair per 2x2 luma block
    let (u, v) = (&frame.u_plane, &frame.v_plane);
    for row in 0..chroma_h {
        for col in 0..chroma_w {
            out.push(src[v.index(col, row)]);
            out.push(src[u.index(col, row)]);
        }
    }

    trace!(
        width = frame.width,
        height = frame.height,
        bytes = out.len(),
        "Converted frame to NV21"
    );

    Some(ConvertedFrame {
        width: frame.width,
        height: frame.height,
        data: out,
        timestamp_ns: frame.timestamp_ns,
    })
}

/// Whether the last sample of a `cols` x `rows` plane lies inside the buffer
fn plane_fits(plane: &PlaneLayout, cols: usize, rows: usize, len: usize) -> bool {
    let last = (rows - 1)
        .checked_mul(plane.row_stride)
        .and_then(|r| (cols - 1).checked_mul(plane.pixel_stride).map(|c| (r, c)))
        .and_then(|(r, c)| r.checked_add(c))
        .and_then(|off| off.checked_add(plane.offset));
    matches!(last, Some(last) if last < len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::PixelFormat;
    use std::sync::Arc;

    /// Semi-planar VU frame with `pad` bytes of row padding, filled with a
    /// recognizable pattern: luma = col + row * 16, V = 200 + col, U = 100 + row
    fn padded_vu_frame(width: u32, height: u32, pad: usize) -> RawFrame {
        let w = width as usize;
        let h = height as usize;
        let stride = w + pad;
        let chroma_offset = stride * h;
        let mut data = vec![0xEEu8; chroma_offset + stride * h / 2];
        for row in 0..h {
            for col in 0..w {
                data[row * stride + col] = (col + row * 16) as u8;
            }
        }
        for row in 0..h / 2 {
            for col in 0..w / 2 {
                data[chroma_offset + row * stride + col * 2] = (200 + col) as u8;
                data[chroma_offset + row * stride + col * 2 + 1] = (100 + row) as u8;
            }
        }
        RawFrame::semi_planar_vu(Arc::from(data), width, height, stride, chroma_offset, stride, 7)
    }

    #[test]
    fn test_output_size_for_even_dimensions() {
        for (w, h) in [(2, 2), (4, 6), (640, 480), (1280, 720)] {
            let frame = padded_vu_frame(w, h, 0);
            let out = convert(&frame).expect("convertible");
            assert_eq!(out.data.len(), (w * h + w * h / 2) as usize);
        }
        let frame = padded_vu_frame(1280, 720, 64);
        assert_eq!(convert(&frame).unwrap().data.len(), 1_382_400);
    }

    #[test]
    fn test_row_padding_is_skipped() {
        let frame = padded_vu_frame(4, 4, 12);
        let out = convert(&frame).unwrap();
        assert!(!out.data.contains(&0xEE));
        assert_eq!(out.y_plane(), &[0, 1, 2, 3, 16, 17, 18, 19, 32, 33, 34, 35, 48, 49, 50, 51]);
        assert_eq!(out.timestamp_ns, 7);
    }

    #[test]
    fn test_chroma_is_vu_per_block() {
        let frame = padded_vu_frame(4, 4, 3);
        let out = convert(&frame).unwrap();
        // Block (0,0): V=200 U=100, block (1,0): V=201 U=100, row 1: U=101
        assert_eq!(out.vu_plane(), &[200, 100, 201, 100, 200, 101, 201, 101]);
    }

    #[test]
    fn test_uv_order_input_is_swapped_to_vu() {
        let data: Vec<u8> = vec![10, 11, 12, 13, 20, 21, 22, 23, 1, 2, 3, 4];
        let frame = RawFrame::semi_planar_uv(Arc::from(data), 4, 2, 4, 8, 4, 0);
        let out = convert(&frame).unwrap();
        assert_eq!(out.vu_plane(), &[2, 1, 4, 3]);
    }

    #[test]
    fn test_fully_planar_input() {
        // I420 with separate U and V planes (pixel stride 1)
        let mut data = vec![0u8; 8 + 2 + 2];
        data[8..10].copy_from_slice(&[50, 51]);
        data[10..12].copy_from_slice(&[60, 61]);
        let frame = RawFrame {
            width: 4,
            height: 2,
            format: PixelFormat::Yuv420,
            data: Arc::from(data),
            y_plane: PlaneLayout::new(0, 4, 1),
            u_plane: PlaneLayout::new(8, 2, 1),
            v_plane: PlaneLayout::new(10, 2, 1),
            timestamp_ns: 0,
        };
        let out = convert(&frame).unwrap();
        assert_eq!(out.vu_plane(), &[60, 50, 61, 51]);
    }

    #[test]
    fn test_rejects_unsupported_input() {
        let mut frame = padded_vu_frame(4, 4, 0);
        frame.format = PixelFormat::Jpeg;
        assert!(convert(&frame).is_none());

        let odd = padded_vu_frame(4, 4, 0);
        let odd = RawFrame { width: 3, ..odd };
        assert!(convert(&odd).is_none());

        let short = RawFrame {
            data: Arc::from(vec![0u8; 10]),
            ..padded_vu_frame(4, 4, 0)
        };
        assert!(convert(&short).is_none());
    }
}
