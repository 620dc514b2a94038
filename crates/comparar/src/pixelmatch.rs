//! Pixel-level image comparison.
//!
//! Colour distance is measured in YIQ space after blending semi-transparent
//! pixels against white. Pixels whose distance exceeds the per-pixel threshold
//! are counted as different, unless they look like anti-aliasing: a pixel on a
//! smooth edge whose darkest and brightest neighbours both sit inside flat
//! regions of both images.
//!
//! ```text
//! ┌───────────┐   ┌───────────┐        ┌──────────────────────────┐
//! │ capture A │   │ capture B │  ───►  │ diff image               │
//! └───────────┘   └───────────┘        │  gray   = matching pixel │
//!                                      │  red    = counted diff   │
//!                                      │  yellow = anti-aliasing  │
//!                                      └──────────────────────────┘
//! ```

use crate::codec::Capture;
use crate::result::{CompararError, CompararResult};
use serde::{Deserialize, Serialize};

/// Largest possible YIQ delta between two colours
const MAX_YIQ_DELTA: f64 = 35215.0;

const Y_R: f64 = 0.298_895_31;
const Y_G: f64 = 0.586_622_47;
const Y_B: f64 = 0.114_482_23;

const I_R: f64 = 0.595_977_99;
const I_G: f64 = 0.274_176_10;
const I_B: f64 = 0.321_801_89;

const Q_R: f64 = 0.211_470_17;
const Q_G: f64 = 0.522_617_11;
const Q_B: f64 = 0.311_146_94;

/// Options for [`compare`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    /// Per-pixel colour distance threshold (0.0-1.0); smaller is stricter
    pub per_pixel_threshold: f64,
    /// Count anti-aliased pixels as differences
    pub include_anti_aliasing: bool,
    /// Opacity of the original image in the diff output (0.0-1.0)
    pub alpha: f64,
    /// Colour of counted differences
    pub diff_color: [u8; 3],
    /// Colour of anti-aliased pixels that were excluded from the count
    pub aa_color: [u8; 3],
    /// Draw only the differences on a transparent background
    pub diff_mask: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            per_pixel_threshold: 0.1,
            include_anti_aliasing: false,
            alpha: 0.1,
            diff_color: [255, 0, 0],
            aa_color: [255, 255, 0],
            diff_mask: false,
        }
    }
}

impl CompareOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-pixel threshold
    #[must_use]
    pub const fn with_per_pixel_threshold(mut self, threshold: f64) -> Self {
        self.per_pixel_threshold = threshold;
        self
    }

    /// Count anti-aliased pixels as differences
    #[must_use]
    pub const fn with_include_anti_aliasing(mut self, include: bool) -> Self {
        self.include_anti_aliasing = include;
        self
    }

    /// Set the background opacity of the diff output
    #[must_use]
    pub const fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the colour used for counted differences
    #[must_use]
    pub const fn with_diff_color(mut self, color: [u8; 3]) -> Self {
        self.diff_color = color;
        self
    }

    /// Draw differences on a transparent background
    #[must_use]
    pub const fn with_diff_mask(mut self, mask: bool) -> Self {
        self.diff_mask = mask;
        self
    }
}

/// Outcome of a pixel comparison
#[derive(Debug, Clone)]
pub struct PixelDiff {
    /// Diff visualisation, same size as the inputs
    pub diff: Capture,
    /// Pixels counted as different
    pub num_diff_pixels: u64,
    /// Pixels above the threshold but excluded as anti-aliasing
    pub num_anti_aliased: u64,
}

impl PixelDiff {
    /// Fraction of pixels that differ (0.0-1.0)
    #[must_use]
    pub fn diff_ratio(&self) -> f64 {
        let total = self.diff.total_pixels();
        if total == 0 {
            0.0
        } else {
            self.num_diff_pixels as f64 / total as f64
        }
    }

    /// Check if no pixel was counted as different
    #[must_use]
    pub const fn is_identical(&self) -> bool {
        self.num_diff_pixels == 0
    }
}

/// Compare two captures of equal size
///
/// # Errors
///
/// Returns [`CompararError::DimensionMismatch`] if the captures differ in
/// size, or a codec error if a pixel buffer does not match its dimensions.
pub fn compare(a: &Capture, b: &Capture, options: &CompareOptions) -> CompararResult<PixelDiff> {
    if a.width != b.width || a.height != b.height {
        return Err(CompararError::DimensionMismatch {
            left_width: a.width,
            left_height: a.height,
            right_width: b.width,
            right_height: b.height,
        });
    }
    if !a.is_well_formed() || !b.is_well_formed() {
        return Err(CompararError::codec(
            "pixel buffer length does not match image dimensions",
        ));
    }

    let width = a.width as usize;
    let height = a.height as usize;
    let mut output = Capture::new(a.width, a.height);

    if a.pixels == b.pixels {
        if !options.diff_mask {
            for pos in (0..a.pixels.len()).step_by(4) {
                draw_gray_pixel(&a.pixels, pos, options.alpha, &mut output.pixels);
            }
        }
        return Ok(PixelDiff {
            diff: output,
            num_diff_pixels: 0,
            num_anti_aliased: 0,
        });
    }

    let max_delta = MAX_YIQ_DELTA * options.per_pixel_threshold * options.per_pixel_threshold;
    let mut num_diff_pixels = 0u64;
    let mut num_anti_aliased = 0u64;

    for y in 0..height {
        for x in 0..width {
            let pos = (y * width + x) * 4;
            let delta = color_delta(&a.pixels, &b.pixels, pos, pos, false);

            if delta.abs() > max_delta {
                let excluded = !options.include_anti_aliasing
                    && (antialiased(&a.pixels, x, y, width, height, &b.pixels)
                        || antialiased(&b.pixels, x, y, width, height, &a.pixels));
                if excluded {
                    if !options.diff_mask {
                        draw_pixel(&mut output.pixels, pos, options.aa_color);
                    }
                    num_anti_aliased += 1;
                } else {
                    draw_pixel(&mut output.pixels, pos, options.diff_color);
                    num_diff_pixels += 1;
                }
            } else if !options.diff_mask {
                draw_gray_pixel(&a.pixels, pos, options.alpha, &mut output.pixels);
            }
        }
    }

    Ok(PixelDiff {
        diff: output,
        num_diff_pixels,
        num_anti_aliased,
    })
}

/// Signed YIQ distance between the pixel at `k` in `img1` and the pixel at `m`
/// in `img2`; with `y_only` the signed brightness difference is returned.
fn color_delta(img1: &[u8], img2: &[u8], k: usize, m: usize, y_only: bool) -> f64 {
    if img1[k..k + 4] == img2[m..m + 4] {
        return 0.0;
    }
    let (r1, g1, b1) = blend_on_white(&img1[k..k + 4]);
    let (r2, g2, b2) = blend_on_white(&img2[m..m + 4]);

    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let y = y1 - y2;
    if y_only {
        return y;
    }

    let i = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let q = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);
    let delta = 0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q;

    // Sign marks which side is brighter; callers compare magnitudes.
    if y1 > y2 {
        -delta
    } else {
        delta
    }
}

fn blend_on_white(px: &[u8]) -> (f64, f64, f64) {
    let (r, g, b, a) = (
        f64::from(px[0]),
        f64::from(px[1]),
        f64::from(px[2]),
        px[3],
    );
    if a == 255 {
        return (r, g, b);
    }
    let alpha = f64::from(a) / 255.0;
    (blend(r, alpha), blend(g, alpha), blend(b, alpha))
}

fn blend(c: f64, a: f64) -> f64 {
    255.0 + (c - 255.0) * a
}

fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * Y_R + g * Y_G + b * Y_B
}

fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * I_R - g * I_G - b * I_B
}

fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * Q_R - g * Q_G + b * Q_B
}

/// Whether the pixel at (`x1`, `y1`) in `img` looks like an anti-aliased edge
/// that `other` renders slightly differently.
fn antialiased(img: &[u8], x1: usize, y1: usize, width: usize, height: usize, other: &[u8]) -> bool {
    let x0 = x1.saturating_sub(1);
    let y0 = y1.saturating_sub(1);
    let x2 = (x1 + 1).min(width - 1);
    let y2 = (y1 + 1).min(height - 1);
    let pos = (y1 * width + x1) * 4;

    let mut zeroes = u32::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);
    let mut min = 0.0;
    let mut max = 0.0;
    let mut min_at = (0, 0);
    let mut max_at = (0, 0);

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            let delta = color_delta(img, img, pos, (y * width + x) * 4, true);
            if delta == 0.0 {
                zeroes += 1;
                // More than two identical neighbours: flat area, not an edge.
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                min_at = (x, y);
            } else if delta > max {
                max = delta;
                max_at = (x, y);
            }
        }
    }

    // Needs both a darker and a brighter neighbour.
    if min == 0.0 || max == 0.0 {
        return false;
    }

    (has_many_siblings(img, min_at, width, height) && has_many_siblings(other, min_at, width, height))
        || (has_many_siblings(img, max_at, width, height)
            && has_many_siblings(other, max_at, width, height))
}

/// Whether the pixel has three or more identical neighbours
fn has_many_siblings(img: &[u8], (x1, y1): (usize, usize), width: usize, height: usize) -> bool {
    let x0 = x1.saturating_sub(1);
    let y0 = y1.saturating_sub(1);
    let x2 = (x1 + 1).min(width - 1);
    let y2 = (y1 + 1).min(height - 1);
    let pos = (y1 * width + x1) * 4;

    let mut zeroes = u32::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            let pos2 = (y * width + x) * 4;
            if img[pos..pos + 4] == img[pos2..pos2 + 4] {
                zeroes += 1;
            }
            if zeroes > 2 {
                return true;
            }
        }
    }
    false
}

fn draw_pixel(out: &mut [u8], pos: usize, [r, g, b]: [u8; 3]) {
    out[pos] = r;
    out[pos + 1] = g;
    out[pos + 2] = b;
    out[pos + 3] = 255;
}

fn draw_gray_pixel(img: &[u8], pos: usize, alpha: f64, out: &mut [u8]) {
    let y = rgb2y(
        f64::from(img[pos]),
        f64::from(img[pos + 1]),
        f64::from(img[pos + 2]),
    );
    let a = alpha * f64::from(img[pos + 3]) / 255.0;
    let val = blend(y, a).clamp(0.0, 255.0) as u8;
    draw_pixel(out, pos, [val, val, val]);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];
    const RED: [u8; 4] = [255, 0, 0, 255];
    const YELLOW: [u8; 4] = [255, 255, 0, 255];

    mod options_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let opts = CompareOptions::default();
            assert!((opts.per_pixel_threshold - 0.1).abs() < f64::EPSILON);
            assert!(!opts.include_anti_aliasing);
            assert!((opts.alpha - 0.1).abs() < f64::EPSILON);
            assert_eq!(opts.diff_color, [255, 0, 0]);
            assert_eq!(opts.aa_color, [255, 255, 0]);
            assert!(!opts.diff_mask);
        }

        #[test]
        fn test_builder() {
            let opts = CompareOptions::new()
                .with_per_pixel_threshold(0.3)
                .with_include_anti_aliasing(true)
                .with_alpha(0.5)
                .with_diff_color([255, 0, 255])
                .with_diff_mask(true);
            assert!((opts.per_pixel_threshold - 0.3).abs() < f64::EPSILON);
            assert!(opts.include_anti_aliasing);
            assert_eq!(opts.diff_color, [255, 0, 255]);
            assert!(opts.diff_mask);
        }
    }

    mod compare_tests {
        use super::*;

        #[test]
        fn test_identical_images() {
            let img = Capture::filled(100, 100, [30, 60, 90, 255]);
            let result = compare(&img, &img, &CompareOptions::default()).unwrap();
            assert!(result.is_identical());
            assert_eq!(result.num_anti_aliased, 0);
            assert_eq!(result.diff_ratio(), 0.0);
            assert_eq!(result.diff.width, 100);
            assert_eq!(result.diff.height, 100);
        }

        #[test]
        fn test_identical_images_render_gray() {
            let img = Capture::filled(4, 4, BLACK);
            let result = compare(&img, &img, &CompareOptions::default()).unwrap();
            let [r, g, b, a] = result.diff.pixel(0, 0).unwrap();
            assert_eq!(r, g);
            assert_eq!(g, b);
            assert_eq!(a, 255);
            // alpha 0.1 over black keeps the copy dim: close to white
            assert!(r > 200);
        }

        #[test]
        fn test_every_pixel_different() {
            let a = Capture::filled(20, 10, WHITE);
            let b = Capture::filled(20, 10, BLACK);
            let result = compare(&a, &b, &CompareOptions::default()).unwrap();
            assert_eq!(result.num_diff_pixels, 200);
            assert_eq!(result.diff_ratio(), 1.0);
            assert_eq!(result.diff.pixel(7, 3), Some(RED));
        }

        #[test]
        fn test_every_pixel_different_counting_anti_aliasing() {
            let a = Capture::filled(8, 8, WHITE);
            let b = Capture::filled(8, 8, [0, 0, 255, 255]);
            let opts = CompareOptions::default().with_include_anti_aliasing(true);
            let result = compare(&a, &b, &opts).unwrap();
            assert_eq!(result.num_diff_pixels, 64);
        }

        #[test]
        fn test_block_difference() {
            let a = Capture::filled(100, 100, WHITE);
            let mut b = a.clone();
            b.fill_rect(10, 10, 10, 10, BLACK);
            let result = compare(&a, &b, &CompareOptions::default()).unwrap();
            assert_eq!(result.num_diff_pixels, 100);
            assert!((result.diff_ratio() - 0.01).abs() < f64::EPSILON);
            assert_eq!(result.diff.pixel(15, 15), Some(RED));
            assert_ne!(result.diff.pixel(50, 50), Some(RED));
        }

        #[test]
        fn test_small_change_below_per_pixel_threshold() {
            let a = Capture::filled(10, 10, [100, 100, 100, 255]);
            let b = Capture::filled(10, 10, [102, 101, 100, 255]);
            let result = compare(&a, &b, &CompareOptions::default()).unwrap();
            assert_eq!(result.num_diff_pixels, 0);
        }

        #[test]
        fn test_zero_threshold_catches_any_change() {
            let a = Capture::filled(10, 10, [100, 100, 100, 255]);
            let b = Capture::filled(10, 10, [101, 100, 100, 255]);
            let opts = CompareOptions::default()
                .with_per_pixel_threshold(0.0)
                .with_include_anti_aliasing(true);
            let result = compare(&a, &b, &opts).unwrap();
            assert_eq!(result.num_diff_pixels, 100);
        }

        #[test]
        fn test_transparent_pixels_blend_on_white() {
            // Fully transparent black and opaque white both render as white.
            let a = Capture::filled(4, 4, [0, 0, 0, 0]);
            let b = Capture::filled(4, 4, WHITE);
            let result = compare(&a, &b, &CompareOptions::default()).unwrap();
            assert_eq!(result.num_diff_pixels, 0);
        }

        #[test]
        fn test_dimension_mismatch() {
            let a = Capture::filled(10, 10, WHITE);
            let b = Capture::filled(10, 11, WHITE);
            let err = compare(&a, &b, &CompareOptions::default()).unwrap_err();
            assert!(matches!(
                err,
                CompararError::DimensionMismatch {
                    left_width: 10,
                    left_height: 10,
                    right_width: 10,
                    right_height: 11,
                }
            ));
        }

        #[test]
        fn test_malformed_buffer() {
            let a = Capture::filled(2, 2, WHITE);
            let b = Capture {
                width: 2,
                height: 2,
                pixels: vec![0; 8],
            };
            assert!(matches!(
                compare(&a, &b, &CompareOptions::default()),
                Err(CompararError::Codec { .. })
            ));
        }

        #[test]
        fn test_diff_mask_leaves_matches_transparent() {
            let a = Capture::filled(10, 10, WHITE);
            let mut b = a.clone();
            b.set_pixel(5, 5, BLACK);
            let opts = CompareOptions::default().with_diff_mask(true);
            let result = compare(&a, &b, &opts).unwrap();
            assert_eq!(result.diff.pixel(0, 0), Some([0, 0, 0, 0]));
            assert_eq!(result.diff.pixel(5, 5), Some(RED));
        }

        #[test]
        fn test_empty_images() {
            let a = Capture::new(0, 0);
            let result = compare(&a, &a, &CompareOptions::default()).unwrap();
            assert_eq!(result.num_diff_pixels, 0);
            assert_eq!(result.diff_ratio(), 0.0);
        }
    }

    mod anti_aliasing_tests {
        use super::*;

        /// Black left half, white right half, with a gray edge column at x=4
        /// in `b` only.
        fn edge_pair() -> (Capture, Capture) {
            let mut a = Capture::filled(9, 9, WHITE);
            a.fill_rect(0, 0, 4, 9, BLACK);
            a.fill_rect(4, 0, 1, 9, [64, 64, 64, 255]);
            let mut b = a.clone();
            b.fill_rect(4, 0, 1, 9, [192, 192, 192, 255]);
            (a, b)
        }

        #[test]
        fn test_edge_excluded_by_default() {
            let (a, b) = edge_pair();
            let result = compare(&a, &b, &CompareOptions::default()).unwrap();
            assert_eq!(result.num_diff_pixels, 0);
            assert_eq!(result.num_anti_aliased, 9);
            assert_eq!(result.diff.pixel(4, 4), Some(YELLOW));
        }

        #[test]
        fn test_edge_counted_when_included() {
            let (a, b) = edge_pair();
            let opts = CompareOptions::default().with_include_anti_aliasing(true);
            let result = compare(&a, &b, &opts).unwrap();
            assert_eq!(result.num_diff_pixels, 9);
            assert_eq!(result.num_anti_aliased, 0);
            assert_eq!(result.diff.pixel(4, 4), Some(RED));
        }

        #[test]
        fn test_isolated_pixel_is_not_anti_aliasing() {
            let a = Capture::filled(9, 9, WHITE);
            let mut b = a.clone();
            b.set_pixel(4, 4, BLACK);
            let result = compare(&a, &b, &CompareOptions::default()).unwrap();
            assert_eq!(result.num_diff_pixels, 1);
            assert_eq!(result.num_anti_aliased, 0);
        }
    }

    fn capture_strategy() -> impl Strategy<Value = Capture> {
        (1u32..12, 1u32..12).prop_flat_map(|(w, h)| {
            proptest::collection::vec(any::<u8>(), (w * h * 4) as usize)
                .prop_map(move |pixels| Capture::from_rgba(w, h, pixels).unwrap())
        })
    }

    proptest! {
        #[test]
        fn prop_self_comparison_is_clean(img in capture_strategy()) {
            let result = compare(&img, &img, &CompareOptions::default()).unwrap();
            prop_assert_eq!(result.num_diff_pixels, 0);
        }

        #[test]
        fn prop_diff_ratio_in_unit_interval(
            (a, b) in (1u32..10, 1u32..10).prop_flat_map(|(w, h)| {
                let len = (w * h * 4) as usize;
                (
                    proptest::collection::vec(any::<u8>(), len)
                        .prop_map(move |p| Capture::from_rgba(w, h, p).unwrap()),
                    proptest::collection::vec(any::<u8>(), len)
                        .prop_map(move |p| Capture::from_rgba(w, h, p).unwrap()),
                )
            })
        ) {
            let result = compare(&a, &b, &CompareOptions::default()).unwrap();
            let ratio = result.diff_ratio();
            prop_assert!((0.0..=1.0).contains(&ratio));
            prop_assert!(result.num_diff_pixels + result.num_anti_aliased <= a.total_pixels());
            prop_assert_eq!(ratio, result.num_diff_pixels as f64 / a.total_pixels() as f64);
        }
    }
}
