//! Two-phase classification of patterns into equivalence classes.
//!
//! The comparator is not transitive, so the classifier cannot lean on a
//! union-find over first-phase edges alone. Phase 1 seeds classes by a
//! forward sweep over a survivor list; Phase 2 merges classes whenever some
//! cross-class pair matches and no pair vetoes, re-scanning until a full
//! pass stays quiet.

mod multipage;

pub use self::multipage::{classify_pages, dictionary_flags, Page};

use crate::matcher::{match_patterns, Verdict};
use crate::options::MatcherOptions;
use crate::pattern::Pattern;

/// The tags produced by a classifier run: one entry per input, in input
/// order. Tag 0 marks null inputs; real classes get 1..=max_tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    tags: Vec<u32>,
    max_tag: u32,
}

impl Classification {
    pub fn tags(&self) -> &[u32] {
        &self.tags
    }

    pub fn into_tags(self) -> Vec<u32> {
        self.tags
    }

    pub fn max_tag(&self) -> u32 {
        self.max_tag
    }
}

/// A live (non-null) classifier input.
pub(crate) struct Entry {
    /// Position in the caller's input vector.
    pub(crate) pos: usize,
    pub(crate) dpi: i32,
}

/// Memoized ternary verdicts for unordered entry pairs, two bits each.
/// 0b11 means "never computed"; otherwise the cell stores verdict + 1.
struct VerdictCache {
    n: usize,
    bits: Vec<u8>,
}

impl VerdictCache {
    fn new(n: usize) -> Self {
        let pairs = n * n.saturating_sub(1) / 2;
        VerdictCache {
            n,
            bits: vec![0xFF; pairs.div_ceil(4)],
        }
    }

    fn slot(&self, a: usize, b: usize) -> (usize, u32) {
        debug_assert!(a != b && a < self.n && b < self.n);
        let (a, b) = if a < b { (a, b) } else { (b, a) };
        let index = a * self.n - a * (a + 1) / 2 + (b - a - 1);
        (index / 4, (index % 4) as u32 * 2)
    }

    fn get(&self, a: usize, b: usize) -> Option<Verdict> {
        let (byte, shift) = self.slot(a, b);
        match (self.bits[byte] >> shift) & 0x3 {
            0 => Some(Verdict::Veto),
            1 => Some(Verdict::Doubt),
            2 => Some(Verdict::Match),
            _ => None,
        }
    }

    fn set(&mut self, a: usize, b: usize, verdict: Verdict) {
        let (byte, shift) = self.slot(a, b);
        let value = (verdict.as_i32() + 1) as u8;
        self.bits[byte] = (self.bits[byte] & !(0x3 << shift)) | (value << shift);
    }
}

#[derive(Clone, Copy)]
struct Class {
    head: usize,
    tail: usize,
    count: usize,
}

/// Runs the two-phase classification over `entries`, asking `compare` for
/// pairwise verdicts, and writes tags into a vector of `n_inputs` slots
/// (positions without an entry keep tag 0).
///
/// `compare` receives two entry indices plus the dpi to compare at; it must
/// be deterministic, since verdicts are memoized per unordered pair.
pub(crate) fn classify_entries<F>(
    n_inputs: usize,
    entries: &[Entry],
    mut compare: F,
) -> Classification
where
    F: FnMut(usize, usize, i32) -> Verdict,
{
    let m = entries.len();
    let mut cache = VerdictCache::new(m);
    let mut compare = move |a: usize, b: usize, dpi: i32| match cache.get(a, b) {
        Some(verdict) => verdict,
        None => {
            let verdict = compare(a, b, dpi);
            cache.set(a, b, verdict);
            verdict
        }
    };

    // class chains; every entry is on exactly one after Phase 1
    let mut next_node: Vec<Option<usize>> = vec![None; m];
    let mut classes: Vec<Class> = Vec::new();

    // Phase 1: seed classes by a forward sweep over a survivor list.
    let mut next: Vec<Option<usize>> = (0..m)
        .map(|i| if i + 1 < m { Some(i + 1) } else { None })
        .collect();
    let mut prev: Vec<Option<usize>> = (0..m).map(|i| i.checked_sub(1)).collect();
    let mut head = if m > 0 { Some(0) } else { None };

    while let Some(seed) = head {
        let mut class = Class {
            head: seed,
            tail: seed,
            count: 1,
        };
        let mut cand = next[seed];
        while let Some(c) = cand {
            if compare(seed, c, entries[seed].dpi) == Verdict::Match {
                // unlink from the survivor list, append to the new class
                let (before, after) = (prev[c], next[c]);
                if let Some(before) = before {
                    next[before] = after;
                }
                if let Some(after) = after {
                    prev[after] = before;
                }
                next_node[class.tail] = Some(c);
                class.tail = c;
                class.count += 1;
            }
            cand = next[c];
        }
        head = next[seed];
        classes.push(class);
    }

    tracing::debug!(
        patterns = m,
        classes = classes.len(),
        "seeded classes by forward sweep"
    );

    // Phase 2: merge classes in creation order. Each later class keeps a
    // cursor into the current class: the node its next walk starts from. A
    // vetoed walk clears the cursor for good; an indecisive pass parks it at
    // the current last node, so later passes only cover what was appended
    // since.
    let mut alive = vec![true; classes.len()];
    let mut cursor: Vec<Option<usize>> = vec![None; classes.len()];

    let mut ci = 0;
    while ci < classes.len() {
        if !alive[ci] {
            ci += 1;
            continue;
        }
        for later in ci + 1..classes.len() {
            if alive[later] {
                cursor[later] = Some(classes[ci].head);
            }
        }

        loop {
            let mut changed = false;
            for nj in ci + 1..classes.len() {
                if !alive[nj] {
                    continue;
                }
                let Some(start) = cursor[nj] else {
                    continue;
                };

                // iterate the smaller class, walk the larger one; on equal
                // counts the current class plays the larger role
                let (small, walk_from) = if classes[ci].count >= classes[nj].count {
                    (classes[nj], start)
                } else {
                    (classes[ci], classes[nj].head)
                };

                let mut any_match = false;
                let mut vetoed = false;
                let mut node = Some(small.head);
                'small_nodes: while let Some(s) = node {
                    let mut walk = Verdict::Doubt;
                    let mut other = Some(walk_from);
                    while let Some(l) = other {
                        let verdict = compare(s, l, entries[l].dpi);
                        if verdict == Verdict::Veto {
                            walk = Verdict::Veto;
                            break;
                        }
                        walk = walk.max(verdict);
                        other = next_node[l];
                    }
                    match walk {
                        Verdict::Veto => {
                            vetoed = true;
                            break 'small_nodes;
                        }
                        Verdict::Match => any_match = true,
                        Verdict::Doubt => {}
                    }
                    node = next_node[s];
                }

                if any_match && !vetoed {
                    let tail = classes[ci].tail;
                    next_node[tail] = Some(classes[nj].head);
                    classes[ci].tail = classes[nj].tail;
                    classes[ci].count += classes[nj].count;
                    alive[nj] = false;
                    changed = true;
                } else if vetoed {
                    cursor[nj] = None;
                } else {
                    cursor[nj] = Some(classes[ci].tail);
                }
            }
            if !changed {
                break;
            }
        }
        ci += 1;
    }

    // tags follow class creation order
    let mut tags = vec![0u32; n_inputs];
    let mut max_tag = 0u32;
    for (index, class) in classes.iter().enumerate() {
        if !alive[index] {
            continue;
        }
        max_tag += 1;
        let mut node = Some(class.head);
        while let Some(i) = node {
            tags[entries[i].pos] = max_tag;
            node = next_node[i];
        }
    }

    tracing::debug!(patterns = m, classes = max_tag, "classification complete");

    Classification { tags, max_tag }
}

/// Classifies `patterns` at one resolution.
///
/// `None` inputs are not-a-letter placeholders: they are never compared and
/// receive tag 0.
pub fn classify_patterns(
    patterns: &[Option<&Pattern>],
    dpi: i32,
    options: &MatcherOptions,
) -> Classification {
    let mut entries = Vec::new();
    let mut live: Vec<&Pattern> = Vec::new();
    for (pos, pattern) in patterns.iter().enumerate() {
        if let Some(pattern) = *pattern {
            entries.push(Entry { pos, dpi });
            live.push(pattern);
        }
    }
    classify_entries(patterns.len(), &entries, |a, b, dpi| {
        match_patterns(live[a], live[b], dpi, Some(options))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn entries(positions: &[usize]) -> Vec<Entry> {
        positions.iter().map(|&pos| Entry { pos, dpi: 300 }).collect()
    }

    /// Builds a comparator from a symmetric verdict table over entry indices.
    fn table(
        verdicts: &[(usize, usize, Verdict)],
    ) -> impl FnMut(usize, usize, i32) -> Verdict + '_ {
        move |a, b, _dpi| {
            let (a, b) = if a < b { (a, b) } else { (b, a) };
            verdicts
                .iter()
                .find(|&&(x, y, _)| (x, y) == (a, b))
                .map(|&(_, _, v)| v)
                .unwrap_or(Verdict::Doubt)
        }
    }

    #[test]
    fn empty_input() {
        let classification = classify_entries(0, &[], |_, _, _| unreachable!());
        assert_eq!(classification.tags(), &[] as &[u32]);
        assert_eq!(classification.max_tag(), 0);
    }

    #[test]
    fn single_pattern_gets_tag_one() {
        let classification = classify_entries(1, &entries(&[0]), |_, _, _| unreachable!());
        assert_eq!(classification.tags(), &[1]);
        assert_eq!(classification.max_tag(), 1);
    }

    #[test]
    fn all_doubt_stays_apart() {
        let classification = classify_entries(3, &entries(&[0, 1, 2]), |_, _, _| Verdict::Doubt);
        assert_eq!(classification.tags(), &[1, 2, 3]);
        assert_eq!(classification.max_tag(), 3);
    }

    #[test]
    fn direct_matches_join_the_seed() {
        let classification = classify_entries(3, &entries(&[0, 1, 2]), |_, _, _| Verdict::Match);
        assert_eq!(classification.tags(), &[1, 1, 1]);
        assert_eq!(classification.max_tag(), 1);
    }

    #[test]
    fn null_positions_keep_tag_zero() {
        // inputs at positions 0 and 2 of a 3-slot vector
        let classification = classify_entries(3, &entries(&[0, 2]), |_, _, _| Verdict::Doubt);
        assert_eq!(classification.tags(), &[1, 0, 2]);
        assert_eq!(classification.max_tag(), 2);
    }

    #[test]
    fn non_transitive_chain_merges_in_phase_two() {
        // match(A,B) = match(B,C) = Match, match(A,C) = Doubt:
        // Phase 1 seeds {A,B} and {C}; Phase 2 merges on the B-C match.
        let verdicts = [
            (0, 1, Verdict::Match),
            (1, 2, Verdict::Match),
            (0, 2, Verdict::Doubt),
        ];
        let classification = classify_entries(3, &entries(&[0, 1, 2]), table(&verdicts));
        assert_eq!(classification.tags(), &[1, 1, 1]);
        assert_eq!(classification.max_tag(), 1);
    }

    #[test]
    fn a_single_veto_kills_the_merge() {
        // B-C would merge, but A-C vetoes
        let verdicts = [
            (0, 1, Verdict::Match),
            (1, 2, Verdict::Match),
            (0, 2, Verdict::Veto),
        ];
        let classification = classify_entries(3, &entries(&[0, 1, 2]), table(&verdicts));
        assert_eq!(classification.tags(), &[1, 1, 2]);
        assert_eq!(classification.max_tag(), 2);
    }

    #[test]
    fn indirect_matches_merge_through_phase_two() {
        // Phase 1 seeds {0, 3} and {1, 2}; the only cross-class match is
        // 2-3, found while walking the other class.
        let verdicts = [
            (0, 3, Verdict::Match),
            (1, 2, Verdict::Match),
            (2, 3, Verdict::Match),
        ];
        let classification = classify_entries(4, &entries(&[0, 1, 2, 3]), table(&verdicts));
        assert_eq!(classification.tags(), &[1, 1, 1, 1]);
        assert_eq!(classification.max_tag(), 1);
    }

    #[test]
    fn merges_cascade_across_passes() {
        // Phase 1 seeds {0,1}, {2,5}, {3} and {4}. In the first Phase-2
        // pass {2,5} is indecisive against {0,1} and parks its cursor; then
        // {3} merges in via 1-3. The second pass walks {2,5} against the
        // appended node 3, whose 3-5 match (a pair Phase 1 never saw) pulls
        // the class in. {4} stays apart throughout.
        let verdicts = [
            (0, 1, Verdict::Match),
            (2, 5, Verdict::Match),
            (1, 3, Verdict::Match),
            (3, 5, Verdict::Match),
        ];
        let classification = classify_entries(6, &entries(&[0, 1, 2, 3, 4, 5]), table(&verdicts));
        assert_eq!(classification.tags(), &[1, 1, 1, 1, 2, 1]);
        assert_eq!(classification.max_tag(), 2);
    }

    #[test]
    fn each_pair_is_compared_at_most_once() {
        let mut seen = HashSet::new();
        let classification = classify_entries(5, &entries(&[0, 1, 2, 3, 4]), |a, b, _| {
            let key = (a.min(b), a.max(b));
            assert!(seen.insert(key), "pair {key:?} compared twice");
            Verdict::Doubt
        });
        assert_eq!(classification.max_tag(), 5);
        assert!(seen.len() <= 10);
    }

    #[test]
    fn tags_follow_creation_order() {
        let verdicts = [(1, 3, Verdict::Match)];
        let classification = classify_entries(4, &entries(&[0, 1, 2, 3]), table(&verdicts));
        // seeds: {0}, {1,3}, {2}
        assert_eq!(classification.tags(), &[1, 2, 3, 2]);
        assert_eq!(classification.max_tag(), 3);
    }
}
