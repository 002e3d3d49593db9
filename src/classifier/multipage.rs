//! Classification across pages and the shared-dictionary flags.

use super::{classify_entries, Classification, Entry};
use crate::matcher::match_patterns;
use crate::options::MatcherOptions;
use crate::pattern::Pattern;

/// One page's worth of classifier input: its patterns (with `None` for
/// not-a-letter components) and the resolution they were scanned at.
pub struct Page<'a> {
    pub patterns: &'a [Option<&'a Pattern>],
    pub dpi: i32,
}

/// Classifies the patterns of all pages in one run.
///
/// The result covers the concatenation of the page inputs in page order;
/// classes freely span pages. Each pattern is compared at its own page's
/// dpi.
pub fn classify_pages(pages: &[Page<'_>], options: &MatcherOptions) -> Classification {
    let total = pages.iter().map(|page| page.patterns.len()).sum();
    let mut entries = Vec::new();
    let mut live: Vec<&Pattern> = Vec::new();
    let mut pos = 0;
    for page in pages {
        for pattern in page.patterns {
            if let Some(pattern) = *pattern {
                entries.push(Entry { pos, dpi: page.dpi });
                live.push(pattern);
            }
            pos += 1;
        }
    }

    tracing::debug!(
        pages = pages.len(),
        total,
        live = live.len(),
        "classifying patterns across pages"
    );

    classify_entries(total, &entries, |a, b, dpi| {
        match_patterns(live[a], live[b], dpi, Some(options))
    })
}

/// Computes which tags belong in a shared dictionary: `flags[t]` is true iff
/// tag `t` appears on at least two distinct pages. `flags[0]` is always
/// false. `tags` is the flattened tag vector over `page_counts` pages.
pub fn dictionary_flags(page_counts: &[usize], tags: &[u32], max_tag: u32) -> Vec<bool> {
    let mut first_page_met: Vec<Option<usize>> = vec![None; max_tag as usize + 1];
    let mut flags = vec![false; max_tag as usize + 1];

    let mut index = 0;
    for (page, &count) in page_counts.iter().enumerate() {
        for _ in 0..count {
            let tag = tags[index] as usize;
            index += 1;
            if tag == 0 {
                // non-substitutable component
                continue;
            }
            match first_page_met[tag] {
                None => first_page_met[tag] = Some(page),
                Some(first) if first != page => flags[tag] = true,
                Some(_) => {}
            }
        }
    }

    flags
}
