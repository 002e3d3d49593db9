//! Pattern matching and clustering of bilevel glyph bitmaps.
//!
//! This crate decides which small bitmaps (typically glyph-shaped connected
//! components extracted from scanned pages) are mutually equivalent, and
//! groups them into equivalence classes that downstream encoders can
//! represent by a shared prototype plus per-instance references.
//!
//! Two layers are exposed:
//!
//! * [`match_patterns`] — the pairwise comparator. It returns a ternary
//!   [`Verdict`]: veto (definitely different), doubt (no evidence either
//!   way) or match (definitely equivalent), produced by a cascade of
//!   cheap-to-expensive tests aligned by mass centers and tuned by the
//!   aggression level in [`MatcherOptions`].
//! * [`classify_patterns`] / [`classify_pages`] — the classifier. It maps
//!   every input to a positive class tag (0 is reserved for null inputs)
//!   using only comparator verdicts; the match relation is not transitive,
//!   and the two-phase algorithm accounts for that.
//!
//! ```
//! use bimatch::{classify_patterns, Bitmap, MatcherOptions, Pattern};
//!
//! let mut glyph = Bitmap::new(4, 4).unwrap();
//! for i in 0..4 {
//!     glyph.set(i, 0, true);
//!     glyph.set(i, 3, true);
//!     glyph.set(0, i, true);
//!     glyph.set(3, i, true);
//! }
//!
//! let options = MatcherOptions::new();
//! let a = Pattern::new(&glyph, &options);
//! let b = Pattern::new(&glyph, &options);
//!
//! let classification = classify_patterns(&[Some(&a), None, Some(&b)], 300, &options);
//! assert_eq!(classification.tags(), &[1, 0, 1]);
//! assert_eq!(classification.max_tag(), 1);
//! ```

mod bitmap;
pub mod classifier;
mod error;
mod matcher;
mod morphology;
mod options;
mod pattern;
mod signature;

pub use self::bitmap::Bitmap;
pub use self::classifier::{
    classify_pages, classify_patterns, dictionary_flags, Classification, Page,
};
pub use self::error::{MatchError, MatchResult};
pub use self::matcher::{match_patterns, Verdict};
pub use self::options::{MatcherMethods, MatcherOptions};
pub use self::pattern::{Pattern, CENTER_QUANT};
