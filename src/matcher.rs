//! The pairwise comparator cascade.
//!
//! Each pattern pair undergoes simple tests (dimensions and mass) and at most
//! four more advanced tests. Every test ends in one of three outcomes: veto,
//! doubt or match. Two patterns are equivalent if and only if there was no
//! veto and at least one match.

use crate::bitmap::{popcount_range, subset_minus};
use crate::options::{MatcherMethods, MatcherOptions};
use crate::pattern::{Pattern, CENTER_QUANT};
use crate::signature::SIGNATURE_SIZE;

/// Outcome of a comparison: definitely different, no evidence either way, or
/// definitely equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verdict {
    Veto,
    Doubt,
    Match,
}

impl Verdict {
    /// The classic ternary encoding: -1 veto, 0 doubt, 1 match.
    pub fn as_i32(self) -> i32 {
        match self {
            Verdict::Veto => -1,
            Verdict::Doubt => 0,
            Verdict::Match => 1,
        }
    }
}

/* Hand-tweaked calibration constants of this comparator. */

const PITHDIFF_VETO_THRESHOLD: f64 = 23.0;
const PITH2_VETO_THRESHOLD: f64 = 4.0;
const SHIFTDIFF1_VETO_THRESHOLD: f64 = 1000.0;
const SHIFTDIFF2_VETO_THRESHOLD: f64 = 1500.0;
const SHIFTDIFF3_VETO_THRESHOLD: f64 = 2000.0;

const SIZE_DIFFERENCE_THRESHOLD: f64 = 10.0;
const MASS_DIFFERENCE_THRESHOLD: f64 = 10.0;

const SHIFTDIFF1_FALLOFF: f64 = 0.9;
const SHIFTDIFF2_FALLOFF: f64 = 1.0;
const SHIFTDIFF3_FALLOFF: f64 = 1.15;

/// Checks that dimensions and masses differ by no more than the percentage
/// thresholds. Returns true on veto.
fn simple_tests(p1: &Pattern, p2: &Pattern) -> bool {
    let (w1, h1, m1) = (p1.width() as f64, p1.height() as f64, f64::from(p1.mass()));
    let (w2, h2, m2) = (p2.width() as f64, p2.height() as f64, f64::from(p2.mass()));

    100.0 * w1 > (100.0 + SIZE_DIFFERENCE_THRESHOLD) * w2
        || 100.0 * w2 > (100.0 + SIZE_DIFFERENCE_THRESHOLD) * w1
        || 100.0 * h1 > (100.0 + SIZE_DIFFERENCE_THRESHOLD) * h2
        || 100.0 * h2 > (100.0 + SIZE_DIFFERENCE_THRESHOLD) * h1
        || 100.0 * m1 > (100.0 + MASS_DIFFERENCE_THRESHOLD) * m2
        || 100.0 * m2 > (100.0 + MASS_DIFFERENCE_THRESHOLD) * m1
}

/// The square of a Euclidean distance between two signatures, with a weight
/// falloff that halves its grip at every pyramid level. The first byte is
/// ignored (kluge).
fn shiftdiff_equivalence(
    s1: &[u8; SIGNATURE_SIZE],
    s2: &[u8; SIGNATURE_SIZE],
    falloff: f64,
    veto: f64,
    threshold: f64,
) -> Verdict {
    let mut delay_before_falloff = 1u32;
    let mut delay_counter = 1u32;
    let mut penalty = 0.0f64;
    let mut weight = 1.0f64;

    for i in 1..SIGNATURE_SIZE {
        let difference = f64::from(s1[i]) - f64::from(s2[i]);
        penalty += difference * difference * weight;
        delay_counter -= 1;
        if delay_counter == 0 {
            weight *= falloff;
            delay_before_falloff <<= 1;
            delay_counter = delay_before_falloff;
        }
    }

    if penalty >= veto * SIGNATURE_SIZE as f64 {
        Verdict::Veto
    } else if penalty <= threshold * SIGNATURE_SIZE as f64 {
        Verdict::Match
    } else {
        Verdict::Doubt
    }
}

/// Round-to-nearest in CENTER_QUANT units, ties away from zero.
fn quantize_shift(delta: i32) -> i32 {
    if delta < 0 {
        (delta - CENTER_QUANT / 2) / CENTER_QUANT
    } else {
        (delta + CENTER_QUANT / 2) / CENTER_QUANT
    }
}

/// Accumulates a row-wise distance over two softened rasters aligned by mass
/// centers, charging rows and margins outside the overlap against white.
/// Returns `None` once the running score reaches `ceiling` (or when the
/// aligned rasters do not overlap horizontally at all).
fn distance_by_pixeldiff(
    i1: &Pattern,
    i2: &Pattern,
    compare_row: impl Fn(&[u8], &[u8]) -> i64,
    compare_with_white: impl Fn(&[u8]) -> i64,
    ceiling: i64,
) -> Option<i64> {
    // make i1 the narrower one
    let (i1, i2) = if i1.width() > i2.width() {
        (i2, i1)
    } else {
        (i1, i2)
    };

    let (w1, h1) = (i1.width() as i32, i1.height() as i32);
    let (w2, h2) = (i2.width() as i32, i2.height() as i32);

    // (shift_x, shift_y) is what should be added to i1's coordinates to get
    // i2's coordinates
    let shift_x = quantize_shift(i2.center().0 - i1.center().0);
    let shift_y = quantize_shift(i2.center().1 - i1.center().1);

    let min_y = shift_y.min(0);
    let max_y = h2.max(shift_y + h1);
    let min_overlap_x = shift_x.max(0);
    let max_overlap_x = w2.min(shift_x + w1);
    let min_overlap_x_for_i1 = (min_overlap_x - shift_x) as usize;
    let max_overlap_x_for_i1 = (max_overlap_x - shift_x) as usize;
    if max_overlap_x <= min_overlap_x {
        return None;
    }

    let mut score = 0i64;
    for i in min_y..max_y {
        let y1 = (i - shift_y) as usize;

        if i < 0 || i >= h2 {
            score += compare_with_white(i1.row(y1));
        } else if i < shift_y || i >= shift_y + h1 {
            score += compare_with_white(i2.row(i as usize));
        } else {
            let row1 = i1.row(y1);
            let row2 = i2.row(i as usize);
            score += compare_row(
                &row1[min_overlap_x_for_i1..max_overlap_x_for_i1],
                &row2[min_overlap_x as usize..max_overlap_x as usize],
            );

            if min_overlap_x > 0 {
                score += compare_with_white(&row2[..min_overlap_x as usize]);
            } else {
                score += compare_with_white(&row1[..min_overlap_x_for_i1]);
            }

            if max_overlap_x < w2 {
                score += compare_with_white(&row2[max_overlap_x as usize..]);
            } else {
                score += compare_with_white(&row1[max_overlap_x_for_i1..]);
            }
        }

        if score >= ceiling {
            return None;
        }
    }
    Some(score)
}

/// Penalty points for any pixel that is stroke core in one image and not
/// black in the other.
fn pithdiff_compare_row(row1: &[u8], row2: &[u8]) -> i64 {
    let mut score = 0i64;
    for (&a, &b) in row1.iter().zip(row2) {
        if a == 255 {
            score += i64::from(255 - b);
        } else if b == 255 {
            score += i64::from(255 - a);
        }
    }
    score
}

fn pithdiff_compare_with_white(row: &[u8]) -> i64 {
    row.iter().filter(|&&v| v == 255).count() as i64 * 255
}

fn pithdiff_equivalence(p1: &Pattern, p2: &Pattern, threshold: f64, dpi: i32) -> Verdict {
    let perimeter = (p1.width() + p1.height() + p2.width() + p2.height()) as f64;
    let budget = f64::from(dpi) * perimeter / 100.0;
    let ceiling = (PITHDIFF_VETO_THRESHOLD * budget) as i64;

    match distance_by_pixeldiff(
        p1,
        p2,
        pithdiff_compare_row,
        pithdiff_compare_with_white,
        ceiling,
    ) {
        None => Verdict::Veto,
        Some(d) if (d as f64) < threshold * budget => Verdict::Match,
        Some(_) => Verdict::Doubt,
    }
}

/// One direction of the inscribed-framework test: counts the bits of
/// `p1`'s thinned framework that fall on white in (or outside of) `p2`'s
/// thickened envelope, aligned by mass centers.
///
/// # Panics
///
/// Panics if either pattern was built without the `PITH_2` method bit.
fn pith2_is_subset(p1: &Pattern, p2: &Pattern, threshold: f64, dpi: i32) -> Verdict {
    fn framework_of(p: &Pattern) -> &crate::pattern::Framework {
        p.framework()
            .expect("PITH_2 comparison requires patterns built with MatcherMethods::PITH_2")
    }
    let inner = &framework_of(p1).inner;
    let outer = &framework_of(p2).outer;

    let perimeter = (p1.width() + p1.height() + p2.width() + p2.height()) as f64;
    let budget = f64::from(dpi) * perimeter / 100.0;
    let ceiling = (PITH2_VETO_THRESHOLD * budget) as i64;

    let (w1, h1) = (inner.width() as i32, inner.height() as i32);
    let (w2, h2) = (outer.width() as i32, outer.height() as i32);

    // the envelope's origin is shifted by (-1, -1), so its mass center moves
    // by one full quantum
    let shift_x = quantize_shift(p2.center().0 + CENTER_QUANT - p1.center().0);
    let shift_y = quantize_shift(p2.center().1 + CENTER_QUANT - p1.center().1);

    let min_y = shift_y.min(0);
    let max_y = h2.max(shift_y + h1);
    let min_overlap_x = shift_x.max(0);
    let max_overlap_x = w2.min(shift_x + w1);
    let min_overlap_x_for_i1 = (min_overlap_x - shift_x) as usize;
    let max_overlap_x_for_i1 = (max_overlap_x - shift_x) as usize;
    if max_overlap_x <= min_overlap_x {
        return Verdict::Veto;
    }

    let mut score = 0i64;
    for i in min_y..max_y {
        let y1 = i - shift_y;

        if i < 0 || i >= h2 {
            // the whole framework row lies outside the envelope
            if (0..h1).contains(&y1) {
                score += i64::from(popcount_range(inner.row(y1 as usize), 0, w1 as usize)) * 255;
            }
        } else if (0..h1).contains(&y1) {
            let row1 = inner.row(y1 as usize);
            let row2 = outer.row(i as usize);
            score += i64::from(subset_minus(
                row1,
                min_overlap_x_for_i1,
                row2,
                min_overlap_x as usize,
                (max_overlap_x - min_overlap_x) as usize,
            )) * 255;

            if min_overlap_x <= 0 {
                score += i64::from(popcount_range(row1, 0, min_overlap_x_for_i1)) * 255;
            }
            if max_overlap_x >= w2 {
                score += i64::from(popcount_range(
                    row1,
                    max_overlap_x_for_i1,
                    (w1 as usize) - max_overlap_x_for_i1,
                )) * 255;
            }
        }

        if score >= ceiling {
            return Verdict::Veto;
        }
    }

    if (score as f64) < threshold * budget {
        Verdict::Match
    } else {
        Verdict::Doubt
    }
}

/// Requires resolved options.
fn compare_patterns(p1: &Pattern, p2: &Pattern, dpi: i32, opt: &MatcherOptions) -> Verdict {
    match (p1.lossless_bitmap(), p2.lossless_bitmap()) {
        (Some(b1), Some(b2)) => {
            return if b1 == b2 {
                Verdict::Match
            } else {
                Verdict::Veto
            };
        }
        (None, None) => {}
        _ => return Verdict::Veto,
    }

    if simple_tests(p1, p2) {
        return Verdict::Veto;
    }

    // doubt until some test matches, equal unless a veto arrives
    let mut state = Verdict::Doubt;

    let shift_runs = [
        (
            p1.signature(),
            p2.signature(),
            SHIFTDIFF1_FALLOFF,
            SHIFTDIFF1_VETO_THRESHOLD,
            opt.shiftdiff1_threshold,
        ),
        (
            p1.signature2(),
            p2.signature2(),
            SHIFTDIFF2_FALLOFF,
            SHIFTDIFF2_VETO_THRESHOLD,
            opt.shiftdiff2_threshold,
        ),
        (
            p1.signature(),
            p2.signature(),
            SHIFTDIFF3_FALLOFF,
            SHIFTDIFF3_VETO_THRESHOLD,
            opt.shiftdiff3_threshold,
        ),
    ];
    for (s1, s2, falloff, veto, threshold) in shift_runs {
        let verdict = shiftdiff_equivalence(s1, s2, falloff, veto, threshold);
        if verdict == Verdict::Veto {
            return Verdict::Veto;
        }
        state = state.max(verdict);
    }

    if opt.methods().contains(MatcherMethods::PITH_2) {
        // both directions must accept; acceptance gates the cascade but does
        // not count as a match on its own
        let forward = pith2_is_subset(p1, p2, opt.pithdiff2_threshold, dpi);
        if forward < Verdict::Match {
            return forward;
        }
        let backward = pith2_is_subset(p2, p1, opt.pithdiff2_threshold, dpi);
        if backward < Verdict::Match {
            return backward;
        }

        if opt.methods().contains(MatcherMethods::RAMPAGE) {
            return Verdict::Match;
        }
    }

    if opt.aggression() > 0 && !opt.methods().contains(MatcherMethods::RAMPAGE) {
        let verdict = pithdiff_equivalence(p1, p2, opt.pithdiff_threshold, dpi);
        if verdict == Verdict::Veto {
            // pithdiff has no right to veto at upper level
            return Verdict::Doubt;
        }
        state = state.max(verdict);
    }

    state
}

/// Compares two patterns at the given resolution.
///
/// Passing `None` for `options` compares with a default options value
/// (aggression 100, no method bits) constructed for this call.
pub fn match_patterns(
    p1: &Pattern,
    p2: &Pattern,
    dpi: i32,
    options: Option<&MatcherOptions>,
) -> Verdict {
    match options {
        Some(options) => compare_patterns(p1, p2, dpi, options),
        None => compare_patterns(p1, p2, dpi, &MatcherOptions::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;

    fn bitmap_from_rows(rows: &[&str]) -> Bitmap {
        let mut bitmap = Bitmap::new(rows[0].len(), rows.len()).unwrap();
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                bitmap.set(x, y, c == '#');
            }
        }
        bitmap
    }

    fn glyph_o() -> Bitmap {
        bitmap_from_rows(&[
            ".####.", //
            "##..##", //
            "##..##", //
            "##..##", //
            ".####.",
        ])
    }

    fn glyph_bar() -> Bitmap {
        bitmap_from_rows(&["##", "##", "##", "##", "##", "##"])
    }

    #[test]
    fn verdict_ordering_and_encoding() {
        assert!(Verdict::Veto < Verdict::Doubt);
        assert!(Verdict::Doubt < Verdict::Match);
        assert_eq!(Verdict::Veto.as_i32(), -1);
        assert_eq!(Verdict::Doubt.as_i32(), 0);
        assert_eq!(Verdict::Match.as_i32(), 1);
    }

    #[test]
    fn quantize_shift_rounds_away_from_zero() {
        assert_eq!(quantize_shift(0), 0);
        assert_eq!(quantize_shift(3), 0);
        assert_eq!(quantize_shift(4), 1);
        assert_eq!(quantize_shift(11), 1);
        assert_eq!(quantize_shift(12), 2);
        assert_eq!(quantize_shift(-3), 0);
        assert_eq!(quantize_shift(-4), -1);
        assert_eq!(quantize_shift(-12), -2);
    }

    #[test]
    fn shiftdiff_on_equal_signatures_matches() {
        let s = {
            let mut s = [0u8; SIGNATURE_SIZE];
            for (i, v) in s.iter_mut().enumerate() {
                *v = (i * 7) as u8;
            }
            s
        };
        assert_eq!(
            shiftdiff_equivalence(&s, &s, 0.9, 1000.0, 100.0),
            Verdict::Match
        );
    }

    #[test]
    fn shiftdiff_ignores_the_first_byte() {
        let zero = [0u8; SIGNATURE_SIZE];
        let mut first = [0u8; SIGNATURE_SIZE];
        first[0] = 255;
        assert_eq!(
            shiftdiff_equivalence(&zero, &first, 0.9, 1000.0, 0.0),
            Verdict::Match
        );
    }

    #[test]
    fn shiftdiff_vetoes_large_distances() {
        let zero = [0u8; SIGNATURE_SIZE];
        let far = [200u8; SIGNATURE_SIZE];
        assert_eq!(
            shiftdiff_equivalence(&zero, &far, 1.0, 1000.0, 100.0),
            Verdict::Veto
        );
    }

    #[test]
    fn shiftdiff_falloff_weights_levels() {
        // one unit of difference in a deep slot weighs less than in a
        // shallow one
        let zero = [0u8; SIGNATURE_SIZE];
        let mut shallow = zero;
        shallow[1] = 40;
        let mut deep = zero;
        deep[31] = 40;

        // threshold tuned between the two weighted penalties
        let threshold = 40.0 * 40.0 * 0.9f64.powi(4) / SIGNATURE_SIZE as f64 + 1.0;
        assert_eq!(
            shiftdiff_equivalence(&zero, &deep, 0.9, 1000.0, threshold),
            Verdict::Match
        );
        assert_eq!(
            shiftdiff_equivalence(&zero, &shallow, 0.9, 1000.0, threshold),
            Verdict::Doubt
        );
    }

    #[test]
    fn identical_patterns_match() {
        let options = MatcherOptions::new();
        for bitmap in [glyph_o(), glyph_bar()] {
            let p1 = Pattern::new(&bitmap, &options);
            let p2 = Pattern::new(&bitmap, &options);
            assert_eq!(match_patterns(&p1, &p2, 300, Some(&options)), Verdict::Match);
            assert_eq!(match_patterns(&p1, &p1, 300, Some(&options)), Verdict::Match);
        }
    }

    #[test]
    fn identical_patterns_match_with_frameworks() {
        let mut options = MatcherOptions::new();
        options.use_method(MatcherMethods::PITH_2);
        let p1 = Pattern::new(&glyph_o(), &options);
        let p2 = Pattern::new(&glyph_o(), &options);
        assert_eq!(match_patterns(&p1, &p2, 300, Some(&options)), Verdict::Match);

        options.use_method(MatcherMethods::RAMPAGE);
        let p1 = Pattern::new(&glyph_o(), &options);
        let p2 = Pattern::new(&glyph_o(), &options);
        assert_eq!(match_patterns(&p1, &p2, 300, Some(&options)), Verdict::Match);
    }

    #[test]
    fn size_gate_vetoes_disproportionate_pairs() {
        let options = MatcherOptions::new();
        let narrow = Pattern::new(&bitmap_from_rows(&["##########"; 10]), &options);
        let wide = Pattern::new(&bitmap_from_rows(&["############"; 10]), &options);
        assert_eq!(
            match_patterns(&narrow, &wide, 300, Some(&options)),
            Verdict::Veto
        );
    }

    #[test]
    fn mass_gate_vetoes_disproportionate_ink() {
        let options = MatcherOptions::new();
        // same bounding box, very different mass
        let solid = Pattern::new(&bitmap_from_rows(&["######"; 6]), &options);
        let sparse = Pattern::new(
            &bitmap_from_rows(&[
                "#....#", //
                "......", //
                "......", //
                "......", //
                "......", //
                "#....#",
            ]),
            &options,
        );
        assert_eq!(
            match_patterns(&solid, &sparse, 300, Some(&options)),
            Verdict::Veto
        );
    }

    #[test]
    fn comparison_is_symmetric() {
        let options = MatcherOptions::new();
        let shapes = [
            glyph_o(),
            glyph_bar(),
            bitmap_from_rows(&["######"; 6]),
            bitmap_from_rows(&[".##.", "#..#", "#..#", ".##."]),
        ];
        let patterns: Vec<Pattern> = shapes
            .iter()
            .map(|b| Pattern::new(b, &options))
            .collect();
        for p in &patterns {
            for q in &patterns {
                assert_eq!(
                    match_patterns(p, q, 300, Some(&options)),
                    match_patterns(q, p, 300, Some(&options))
                );
            }
        }
    }

    #[test]
    fn lossless_mode_is_exact_equality() {
        let mut options = MatcherOptions::new();
        options.set_aggression(0);
        let a = Pattern::new(&glyph_o(), &options);
        let b = Pattern::new(&glyph_o(), &options);
        assert_eq!(match_patterns(&a, &b, 300, Some(&options)), Verdict::Match);

        let mut nudged = glyph_o();
        nudged.set(0, 0, true);
        let c = Pattern::new(&nudged, &options);
        assert_eq!(match_patterns(&a, &c, 300, Some(&options)), Verdict::Veto);
    }

    #[test]
    fn lossless_never_matches_lossy() {
        let lossless = Pattern::lossless(&glyph_o());
        let options = MatcherOptions::new();
        let lossy = Pattern::new(&glyph_o(), &options);
        assert_eq!(
            match_patterns(&lossless, &lossy, 300, Some(&options)),
            Verdict::Veto
        );
    }

    #[test]
    fn none_options_compare_at_default_aggression() {
        let options = MatcherOptions::new();
        let p1 = Pattern::new(&glyph_o(), &options);
        let p2 = Pattern::new(&glyph_o(), &options);
        assert_eq!(match_patterns(&p1, &p2, 300, None), Verdict::Match);
    }
}
