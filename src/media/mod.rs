// SPDX-License-Identifier: MPL-2.0

//! Pixel format conversion
//!
//! Camera frames arrive as flexible YUV 4:2:0 (padded rows, interleaved or
//! separate chroma planes). The processing stage wants tightly packed NV21:
//! the luma plane followed by one V/U pair per 2x2 block. The
//! [`yuv_converter`] module does that repacking on the CPU.

pub mod yuv_converter;

pub use yuv_converter::{ConvertedFrame, convert};
