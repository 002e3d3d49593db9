//! The precomputed pattern object the comparator works on.

use crate::bitmap::Bitmap;
use crate::morphology::{quick_thicken, quick_thin, soften};
use crate::options::{MatcherMethods, MatcherOptions};
use crate::signature::{bw_signature, gray_signature, SIGNATURE_SIZE};

/// Mass-center coordinates are stored in 1/CENTER_QUANT pixels; sub-pixel
/// alignment is noticeably better than whole pixels.
pub const CENTER_QUANT: i32 = 8;

const TIMES_TO_THIN: usize = 1;
const TIMES_TO_THICKEN: usize = 1;

/// Erosion and dilation of the raw bitmap, kept for the inscribed-framework
/// subset test. `outer` is (w + 2, h + 2) with its origin shifted by (-1, -1)
/// relative to `inner`.
pub(crate) struct Framework {
    pub(crate) inner: Bitmap,
    pub(crate) outer: Bitmap,
}

/// Everything the comparator needs to know about one input bitmap, computed
/// once up front: the softened raster (0 = white .. 255 = black, inverse to
/// PGM), mass, sub-pixel mass center, both shift signatures and, when the
/// `PITH_2` method is active, the morphological frameworks.
///
/// A pattern built in lossless mode stores only a copy of the raw bitmap;
/// comparison then degenerates to exact equality.
pub struct Pattern {
    width: usize,
    height: usize,
    mass: u32,
    center_x: i32,
    center_y: i32,
    pixels: Vec<u8>,
    signature: [u8; SIGNATURE_SIZE],
    signature2: [u8; SIGNATURE_SIZE],
    framework: Option<Framework>,
    lossless: Option<Bitmap>,
}

impl Pattern {
    /// Builds a pattern for `bitmap`. At aggression 0 this is the same as
    /// [`Pattern::lossless`].
    ///
    /// # Panics
    ///
    /// Panics if `bitmap` has no black pixels; mass-centered alignment is
    /// undefined for an empty glyph.
    pub fn new(bitmap: &Bitmap, options: &MatcherOptions) -> Self {
        if options.aggression() == 0 {
            return Pattern::lossless(bitmap);
        }

        let width = bitmap.width();
        let height = bitmap.height();
        let mass = bitmap.mass();
        assert!(mass > 0, "pattern built from an all-white bitmap");

        let mut pixels = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                if bitmap.get(x, y) {
                    pixels[y * width + x] = 255;
                }
            }
        }
        soften(&mut pixels, width, height);

        let (center_x, center_y) = mass_center(&pixels, width, height);
        let signature = gray_signature(&pixels, width, height);
        let signature2 = bw_signature(&pixels, width, height);

        let framework = options
            .methods()
            .contains(MatcherMethods::PITH_2)
            .then(|| Framework {
                inner: quick_thin(bitmap, TIMES_TO_THIN),
                outer: quick_thicken(bitmap, TIMES_TO_THICKEN),
            });

        tracing::trace!(width, height, mass, "built pattern");

        Pattern {
            width,
            height,
            mass,
            center_x,
            center_y,
            pixels,
            signature,
            signature2,
            framework,
            lossless: None,
        }
    }

    /// Builds a pattern that only ever matches a bit-identical bitmap.
    pub fn lossless(bitmap: &Bitmap) -> Self {
        Pattern {
            width: bitmap.width(),
            height: bitmap.height(),
            mass: bitmap.mass(),
            center_x: 0,
            center_y: 0,
            pixels: Vec::new(),
            signature: [0; SIGNATURE_SIZE],
            signature2: [0; SIGNATURE_SIZE],
            framework: None,
            lossless: Some(bitmap.clone()),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of black pixels in the raw bitmap.
    pub fn mass(&self) -> u32 {
        self.mass
    }

    /// Mass center in 1/[`CENTER_QUANT`] pixels; (0, 0) for lossless
    /// patterns, which are never aligned.
    pub fn center(&self) -> (i32, i32) {
        (self.center_x, self.center_y)
    }

    pub fn is_lossless(&self) -> bool {
        self.lossless.is_some()
    }

    /// Heap footprint in bytes: softened raster plus optional frameworks.
    pub fn footprint(&self) -> usize {
        let mut bytes = self.pixels.len();
        if let Some(framework) = &self.framework {
            bytes += framework.inner.row_bytes() * framework.inner.height();
            bytes += framework.outer.row_bytes() * framework.outer.height();
        }
        if let Some(bitmap) = &self.lossless {
            bytes += bitmap.row_bytes() * bitmap.height();
        }
        bytes
    }

    pub(crate) fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn row(&self, y: usize) -> &[u8] {
        &self.pixels[y * self.width..(y + 1) * self.width]
    }

    pub(crate) fn signature(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.signature
    }

    pub(crate) fn signature2(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.signature2
    }

    pub(crate) fn framework(&self) -> Option<&Framework> {
        self.framework.as_ref()
    }

    pub(crate) fn lossless_bitmap(&self) -> Option<&Bitmap> {
        self.lossless.as_ref()
    }
}

impl std::fmt::Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pattern")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("mass", &self.mass)
            .field("center", &(self.center_x, self.center_y))
            .field("lossless", &self.is_lossless())
            .finish()
    }
}

/// Weighted centroid of the softened raster in CENTER_QUANT units, truncated
/// toward zero.
fn mass_center(pixels: &[u8], width: usize, height: usize) -> (i32, i32) {
    let mut x_sum = 0.0f64;
    let mut y_sum = 0.0f64;
    let mut mass = 0.0f64;

    for y in 0..height {
        for x in 0..width {
            let pixel = f64::from(pixels[y * width + x]);
            x_sum += pixel * x as f64;
            y_sum += pixel * y as f64;
            mass += pixel;
        }
    }

    (
        (x_sum * f64::from(CENTER_QUANT) / mass) as i32,
        (y_sum * f64::from(CENTER_QUANT) / mass) as i32,
    )
}
