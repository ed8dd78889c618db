use rand::Rng;
use rand::rngs::SmallRng;
use thiserror::Error;

use crate::dictionary::{Blacklist, Dictionary};
use crate::engine::word_stats::WordStats;

/// Session-wide penalty extremes, recomputed just before every selection
/// batch since stats change with each completed word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PenaltyLimits {
    pub min: u128,
    pub max: u128,
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error(
        "word selection pool is empty ({active} unlocked words); \
         the lesson needs at least two eligible words"
    )]
    Empty { active: usize },
}

/// Borrowed per-call view over everything a selection needs: the
/// vocabulary, the exclusion set, the stats, and how much of the
/// dictionary is unlocked. Constructed fresh by the session for each
/// batch of picks; holds no state of its own.
pub struct WordPool<'a> {
    dictionary: &'a Dictionary,
    blacklist: &'a Blacklist,
    stats: &'a [WordStats],
    active: usize,
}

impl<'a> WordPool<'a> {
    pub fn new(
        dictionary: &'a Dictionary,
        blacklist: &'a Blacklist,
        stats: &'a [WordStats],
        unlocked: usize,
    ) -> Self {
        Self {
            dictionary,
            blacklist,
            stats,
            active: unlocked.min(dictionary.len()),
        }
    }

    pub fn word_text(&self, index: usize) -> &str {
        &self.dictionary.word(index).text
    }

    fn is_eligible(&self, index: usize, exclude: usize) -> bool {
        index != exclude && !self.blacklist.contains(&self.dictionary.word(index).text)
    }

    /// Min and max penalty across the unlocked range, skipping blacklisted
    /// words and the word currently being typed.
    pub fn penalty_limits(&self, active_word: usize) -> PenaltyLimits {
        let mut min = u128::MAX;
        let mut max = 0;
        for i in 0..self.active {
            if !self.is_eligible(i, active_word) {
                continue;
            }
            let penalty = self.stats[i].penalty();
            min = min.min(penalty);
            max = max.max(penalty);
        }
        PenaltyLimits { min, max }
    }

    /// Picks the next practice word. Every eligible index enters a flat
    /// pool between 1 and 100 times according to its rescaled penalty, and
    /// one entry is drawn uniformly, so slow words surface far more often
    /// than fast ones. `exclude` keeps the previous word from repeating
    /// back to back.
    pub fn select_next(
        &self,
        rng: &mut SmallRng,
        exclude: usize,
        limits: PenaltyLimits,
    ) -> Result<usize, PoolError> {
        let mut pool: Vec<usize> = Vec::new();
        for i in 0..self.active {
            if !self.is_eligible(i, exclude) {
                continue;
            }
            let weight = rescale_penalty(self.stats[i].penalty(), limits);
            for _ in 0..weight {
                pool.push(i);
            }
        }
        if pool.is_empty() {
            return Err(PoolError::Empty {
                active: self.active,
            });
        }
        Ok(pool[rng.gen_range(0..pool.len())])
    }
}

/// Linear map from `[limits.min, limits.max]` to a repetition count in
/// `[1, 100]`. Values outside the range clamp (the active word is excluded
/// from the limit scan but not from selection, so its penalty can fall
/// outside it); a degenerate range weights everything equally.
fn rescale_penalty(penalty: u128, limits: PenaltyLimits) -> u32 {
    if limits.max <= limits.min {
        return 1;
    }
    let span = limits.max - limits.min;
    let offset = penalty.saturating_sub(limits.min).min(span);
    (1 + offset * 99 / span) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Word;
    use rand::SeedableRng;

    fn make_dictionary(n: usize) -> Dictionary {
        Dictionary::new(
            (0..n)
                .map(|i| Word {
                    text: format!("word{i}"),
                    stroke: format!("STROKE{i}"),
                })
                .collect(),
        )
    }

    fn seeded_stats(n: usize) -> Vec<WordStats> {
        vec![WordStats::new(20, 5); n]
    }

    // An index that never matches, for draws with nothing to exclude.
    const NO_EXCLUDE: usize = usize::MAX;

    #[test]
    fn test_equal_penalties_select_uniformly() {
        let dictionary = make_dictionary(5);
        let blacklist = Blacklist::default();
        let stats = seeded_stats(5);
        let pool = WordPool::new(&dictionary, &blacklist, &stats, 5);
        let limits = pool.penalty_limits(NO_EXCLUDE);
        assert_eq!(limits.min, limits.max);

        let mut rng = SmallRng::seed_from_u64(42);
        let mut counts = [0u32; 5];
        let draws = 10_000;
        for _ in 0..draws {
            let pick = pool.select_next(&mut rng, NO_EXCLUDE, limits).unwrap();
            counts[pick] += 1;
        }
        // Uniform within sampling tolerance: each ~2000 of 10000.
        for &count in &counts {
            assert!(
                (1700..=2300).contains(&count),
                "expected near-uniform counts, got {counts:?}"
            );
        }
    }

    #[test]
    fn test_excludes_previous_word_and_blacklisted() {
        let dictionary = make_dictionary(4);
        let mut blacklist = Blacklist::default();
        blacklist.insert("word2");
        let stats = seeded_stats(4);
        let pool = WordPool::new(&dictionary, &blacklist, &stats, 4);
        let limits = pool.penalty_limits(NO_EXCLUDE);

        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..500 {
            let pick = pool.select_next(&mut rng, 0, limits).unwrap();
            assert_ne!(pick, 0, "previous word must not repeat immediately");
            assert_ne!(pick, 2, "blacklisted word must never be selected");
        }
    }

    #[test]
    fn test_slow_word_dominates_selection() {
        let dictionary = make_dictionary(2);
        let blacklist = Blacklist::default();
        let mut stats = seeded_stats(2);
        for _ in 0..5 {
            stats[0].record_completion(500);
            stats[1].record_completion(4000);
        }
        let pool = WordPool::new(&dictionary, &blacklist, &stats, 2);
        let limits = pool.penalty_limits(NO_EXCLUDE);

        let mut rng = SmallRng::seed_from_u64(3);
        let draws = 2_000;
        let mut slow = 0;
        for _ in 0..draws {
            if pool.select_next(&mut rng, NO_EXCLUDE, limits).unwrap() == 1 {
                slow += 1;
            }
        }
        // Weight ratio is 100:1; allow generous sampling slack.
        assert!(
            slow > draws * 9 / 10,
            "slow word picked only {slow}/{draws} times"
        );
    }

    #[test]
    fn test_empty_pool_is_an_error() {
        let dictionary = make_dictionary(1);
        let blacklist = Blacklist::default();
        let stats = seeded_stats(1);
        let pool = WordPool::new(&dictionary, &blacklist, &stats, 1);
        let limits = pool.penalty_limits(NO_EXCLUDE);

        let mut rng = SmallRng::seed_from_u64(1);
        // The only word is also the exclusion: nothing left to pick.
        let result = pool.select_next(&mut rng, 0, limits);
        assert!(matches!(result, Err(PoolError::Empty { active: 1 })));
    }

    #[test]
    fn test_penalty_limits_skip_active_word() {
        let dictionary = make_dictionary(3);
        let blacklist = Blacklist::default();
        let mut stats = seeded_stats(3);
        // Word 0 is by far the slowest, but it's the one being typed.
        for _ in 0..5 {
            stats[0].record_completion(10_000);
            stats[1].record_completion(1000);
            stats[2].record_completion(2000);
        }
        let pool = WordPool::new(&dictionary, &blacklist, &stats, 3);
        let limits = pool.penalty_limits(0);
        assert_eq!(limits.max, stats[2].penalty());
        assert_eq!(limits.min, stats[1].penalty());
    }

    #[test]
    fn test_active_range_clamps_to_dictionary() {
        let dictionary = make_dictionary(3);
        let blacklist = Blacklist::default();
        let stats = seeded_stats(3);
        // Unlock count beyond the dictionary must not read out of range.
        let pool = WordPool::new(&dictionary, &blacklist, &stats, 10);
        let limits = pool.penalty_limits(NO_EXCLUDE);
        let mut rng = SmallRng::seed_from_u64(9);
        let pick = pool.select_next(&mut rng, NO_EXCLUDE, limits).unwrap();
        assert!(pick < 3);
    }
}
