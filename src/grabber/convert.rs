use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use super::device::ChromaOrder;
use crate::error::GrabberError;

fn clamp(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// BT.601 conversion of one sample, returned as `[B, G, R]`.
fn ycbcr_to_bgr(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let y = y as f32;
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;
    [
        clamp(y + 1.772 * cb),
        clamp(y - 0.344_136 * cb - 0.714_136 * cr),
        clamp(y + 1.402 * cr),
    ]
}

/// Converts a YCbCr 4:2:2 frame of `rows` x `cols` pixels into BGRA, rows
/// processed in parallel. An odd last column has no Cr sample and is
/// converted with a neutral one.
pub fn ycbcr422_to_bgra(
    raw: &[u8],
    rows: usize,
    cols: usize,
    order: ChromaOrder,
    out: &mut [u8],
) -> Result<(), GrabberError> {
    let src_stride = cols * 2;
    if raw.len() < rows * src_stride {
        return Err(GrabberError::FrameSize {
            expected: rows * src_stride,
            actual: raw.len(),
        });
    }
    if out.len() < rows * cols * 4 {
        return Err(GrabberError::FrameSize {
            expected: rows * cols * 4,
            actual: out.len(),
        });
    }
    if cols == 0 {
        return Ok(());
    }
    out.par_chunks_mut(cols * 4)
        .take(rows)
        .zip(raw.par_chunks(src_stride))
        .for_each(|(dst, src)| {
            for (pair, pixels) in src.chunks(4).zip(dst.chunks_mut(8)) {
                let c0 = pair[0];
                let y0 = pair.get(1).copied().unwrap_or(0);
                let c1 = pair.get(2).copied().unwrap_or(128);
                let y1 = pair.get(3).copied().unwrap_or(y0);
                let (cb, cr) = match order {
                    ChromaOrder::Normal => (c0, c1),
                    ChromaOrder::Inverted => (c1, c0),
                };
                for (k, px) in pixels.chunks_mut(4).enumerate() {
                    let y = if k == 0 { y0 } else { y1 };
                    let [b, g, r] = ycbcr_to_bgr(y, cb, cr);
                    px.copy_from_slice(&[b, g, r, 255]);
                }
            }
        });
    Ok(())
}

/// Keeps every `scale`-th pixel of a BGRA buffer `src_cols` pixels wide, in
/// both directions, reordering the channels to RGBA.
///
/// The source must cover `rows * scale` lines of `cols * scale` pixels.
pub fn decimate_bgra(
    src: &[u8],
    src_cols: usize,
    rows: u32,
    cols: u32,
    scale: u32,
) -> Result<RgbaImage, GrabberError> {
    let scale = scale.max(1) as usize;
    let needed = rows as usize * scale * src_cols.max(cols as usize * scale) * 4;
    if cols as usize * scale > src_cols || src.len() < needed {
        log::error!(
            "cannot decimate {} bytes {} pixels wide into {}x{} by {}",
            src.len(),
            src_cols,
            cols,
            rows,
            scale
        );
        return Err(GrabberError::FrameSize {
            expected: needed,
            actual: src.len(),
        });
    }
    Ok(RgbaImage::from_par_fn(cols, rows, |j, i| {
        let idx = ((i as usize * scale) * src_cols + j as usize * scale) * 4;
        Rgba([src[idx + 2], src[idx + 1], src[idx], 255])
    }))
}
