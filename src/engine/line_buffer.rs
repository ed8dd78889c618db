use rand::rngs::SmallRng;

use crate::engine::word_pool::{PoolError, WordPool};

/// Display-width oracle for one word. Implementations report the width of
/// the word plus one trailing space in whatever metric the renderer uses;
/// the fill algorithm is otherwise agnostic to fonts and sizes.
pub trait TextWidth {
    fn measure(&self, word: &str) -> f32;
}

/// One cell per character plus the trailing space — the right metric for a
/// terminal.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonospaceWidth;

impl TextWidth for MonospaceWidth {
    fn measure(&self, word: &str) -> f32 {
        (word.trim().chars().count() + 1) as f32
    }
}

/// The target line of upcoming words and its look-ahead successor.
///
/// Both lines hold dictionary indices. `highlighted` points at the word
/// currently being typed. The look-ahead line is grown opportunistically as
/// the user moves through the current line and becomes the start of the
/// next line verbatim when the current one is exhausted. Invariant: after
/// any fill the current line is never empty.
pub struct LineBuffer {
    line: Vec<usize>,
    next_line: Vec<usize>,
    highlighted: usize,
    width_budget: f32,
    single_word: bool,
}

impl LineBuffer {
    pub fn new(width_budget: f32, single_word: bool) -> Self {
        Self {
            line: Vec::new(),
            next_line: Vec::new(),
            highlighted: 0,
            width_budget,
            single_word,
        }
    }

    /// Dictionary index of the highlighted word.
    pub fn highlighted_word(&self) -> usize {
        self.line[self.highlighted]
    }

    pub fn highlighted_position(&self) -> usize {
        self.highlighted
    }

    pub fn line(&self) -> &[usize] {
        &self.line
    }

    pub fn look_ahead(&self) -> &[usize] {
        &self.next_line
    }

    /// Jump the highlight to the last word so the next advance rebuilds the
    /// line. Used when the active word gets blacklisted mid-line.
    pub fn go_to_list_end(&mut self) {
        self.highlighted = self.line.len().saturating_sub(1);
    }

    /// Rebuilds the current line: whatever the look-ahead line holds is
    /// carried over in order, then the selector fills the remaining width.
    /// The word that overshoots the budget is dropped unless it is the only
    /// one. `previous_word` seeds the no-immediate-repeat exclusion;
    /// `active_word` is left out of the penalty limit scan.
    pub fn fill_line(
        &mut self,
        pool: &WordPool,
        rng: &mut SmallRng,
        measure: &dyn TextWidth,
        previous_word: usize,
        active_word: usize,
    ) -> Result<(), PoolError> {
        let mut last = previous_word;
        let mut used = 0.0f32;
        self.line.clear();

        let limits = pool.penalty_limits(active_word);

        for &index in &self.next_line {
            self.line.push(index);
            used += measure.measure(pool.word_text(index));
            last = index;
        }
        self.next_line.clear();

        while used < self.width_budget {
            let next = pool.select_next(rng, last, limits)?;
            self.line.push(next);
            last = next;
            used += measure.measure(pool.word_text(next));
            if self.single_word {
                break;
            }
        }

        // The final word likely finishes past the budget; a line must still
        // never be empty.
        if self.line.len() > 1 {
            self.line.pop();
        }
        self.highlighted = 0;
        Ok(())
    }

    /// Moves the highlight to the next word, extending the look-ahead line
    /// while inside the current one and rebuilding from the look-ahead once
    /// past its end. Returns the newly highlighted dictionary index.
    pub fn advance(
        &mut self,
        pool: &WordPool,
        rng: &mut SmallRng,
        measure: &dyn TextWidth,
        active_word: usize,
    ) -> Result<usize, PoolError> {
        self.highlighted += 1;
        if self.highlighted < self.line.len() {
            self.grow_look_ahead(pool, rng, measure, active_word)?;
        } else {
            let seed = self.line[self.highlighted - 1];
            self.fill_line(pool, rng, measure, seed, active_word)?;
        }
        Ok(self.line[self.highlighted])
    }

    /// Tops the look-ahead line up to the width already consumed on the
    /// current line (everything before the previously highlighted word),
    /// then applies the same overshoot trim as `fill_line`.
    fn grow_look_ahead(
        &mut self,
        pool: &WordPool,
        rng: &mut SmallRng,
        measure: &dyn TextWidth,
        active_word: usize,
    ) -> Result<(), PoolError> {
        if self.single_word {
            return Ok(());
        }
        let mut last = match self.next_line.last() {
            Some(&index) => index,
            None => self.line[self.line.len() - 1],
        };
        let mut used: f32 = self
            .next_line
            .iter()
            .map(|&index| measure.measure(pool.word_text(index)))
            .sum();
        let limits = pool.penalty_limits(active_word);
        let target: f32 = self.line[..self.highlighted.saturating_sub(1)]
            .iter()
            .map(|&index| measure.measure(pool.word_text(index)))
            .sum();

        while used < target {
            let next = pool.select_next(rng, last, limits)?;
            self.next_line.push(next);
            last = next;
            used += measure.measure(pool.word_text(next));
        }

        if !self.next_line.is_empty() {
            self.next_line.pop();
        }
        Ok(())
    }
}
