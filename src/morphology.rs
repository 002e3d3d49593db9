//! Morphological primitives for the framework test and the softening pass.
//!
//! `quick_thin` and `quick_thicken` run directly on packed rows; the border
//! rule mirrors the matcher's historical behavior: pixels outside the raster
//! count as black for erosion, so a glyph touching its bounding box is never
//! eroded from that side.

use crate::bitmap::Bitmap;

/// One 4-neighbour dilation step, packed rows, zero outside the raster.
fn sweep(src: &Bitmap) -> Bitmap {
    let mut dst = Bitmap::new(src.width(), src.height()).expect("source bitmap is non-degenerate");
    let tail_mask = if src.width() % 8 == 0 {
        0xFF
    } else {
        0xFFu8 << (8 - src.width() % 8)
    };

    for y in 0..src.height() {
        let up = y.checked_sub(1).map(|y| src.row(y));
        let down = if y + 1 < src.height() {
            Some(src.row(y + 1))
        } else {
            None
        };
        let cur = src.row(y);
        let out = dst.row_mut(y);
        let len = cur.len();
        for i in 0..len {
            let left_carry = if i > 0 { (cur[i - 1] & 1) << 7 } else { 0 };
            let right_carry = if i + 1 < len { cur[i + 1] >> 7 } else { 0 };
            let mut lane = cur[i] | (cur[i] << 1) | right_carry | (cur[i] >> 1) | left_carry;
            if let Some(up) = up {
                lane |= up[i];
            }
            if let Some(down) = down {
                lane |= down[i];
            }
            out[i] = lane;
        }
        out[len - 1] &= tail_mask;
    }
    dst
}

/// Complements every pixel in place; padding bits stay clear.
fn invert(bitmap: &mut Bitmap) {
    let width = bitmap.width();
    let tail_mask = if width % 8 == 0 {
        0xFF
    } else {
        0xFFu8 << (8 - width % 8)
    };
    for y in 0..bitmap.height() {
        let row = bitmap.row_mut(y);
        let len = row.len();
        for byte in row.iter_mut() {
            *byte = !*byte;
        }
        row[len - 1] &= tail_mask;
    }
}

/// N-step erosion; result has the same dimensions as the input.
pub(crate) fn quick_thin(bitmap: &Bitmap, steps: usize) -> Bitmap {
    let mut aux = bitmap.clone();
    invert(&mut aux);
    for _ in 0..steps {
        aux = sweep(&aux);
    }
    invert(&mut aux);
    aux
}

/// N-step dilation; result is (w + 2N, h + 2N) with the origin shifted by
/// (-N, -N).
pub(crate) fn quick_thicken(bitmap: &Bitmap, steps: usize) -> Bitmap {
    let mut aux = Bitmap::new(bitmap.width() + 2 * steps, bitmap.height() + 2 * steps)
        .expect("widened dimensions are non-degenerate");
    for y in 0..bitmap.height() {
        for x in 0..bitmap.width() {
            if bitmap.get(x, y) {
                aux.set(x + steps, y + steps, true);
            }
        }
    }
    for _ in 0..steps {
        aux = sweep(&aux);
    }
    aux
}

/// Levels of the softening pass; a black pixel's erosion depth is capped at
/// `SOFTEN_LEVELS`.
const SOFTEN_LEVELS: u8 = 8;

/// Weight of a non-core black pixel per erosion depth (index 0 unused).
const DEPTH_WEIGHT: [u8; 9] = [0, 28, 56, 84, 112, 140, 168, 196, 224];

/// Replaces a 0/255 raster in place with per-pixel stroke weights.
///
/// Every black pixel gets its 4-neighbour erosion depth (pixels outside the
/// raster count as black, as in `quick_thin`); local depth maxima form the
/// stroke core and weigh 255, everything else weighs `DEPTH_WEIGHT[depth]`.
/// Any nonzero input byte counts as black, which makes a second pass a no-op.
pub(crate) fn soften(pixels: &mut [u8], width: usize, height: usize) {
    debug_assert_eq!(pixels.len(), width * height);

    let mut depth: Vec<u8> = pixels.iter().map(|&p| (p != 0) as u8).collect();
    let mut cur = depth.clone();

    for _ in 1..SOFTEN_LEVELS {
        let mut eroded = vec![0u8; cur.len()];
        let mut survivors = 0u32;
        for y in 0..height {
            for x in 0..width {
                let i = y * width + x;
                if cur[i] == 0 {
                    continue;
                }
                let keep = (x == 0 || cur[i - 1] != 0)
                    && (x + 1 == width || cur[i + 1] != 0)
                    && (y == 0 || cur[i - width] != 0)
                    && (y + 1 == height || cur[i + width] != 0);
                if keep {
                    eroded[i] = 1;
                    depth[i] += 1;
                    survivors += 1;
                }
            }
        }
        if survivors == 0 {
            break;
        }
        cur = eroded;
    }

    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let d = depth[i];
            if d == 0 {
                pixels[i] = 0;
                continue;
            }
            let core = (x == 0 || depth[i - 1] <= d)
                && (x + 1 == width || depth[i + 1] <= d)
                && (y == 0 || depth[i - width] <= d)
                && (y + 1 == height || depth[i + width] <= d);
            pixels[i] = if core { 255 } else { DEPTH_WEIGHT[d as usize] };
        }
    }
}
