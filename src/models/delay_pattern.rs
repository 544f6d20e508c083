//! Codebook delay pattern.
//!
//! MusicGen predicts all EnCodec codebooks in one step, with codebook `i`
//! lagging `i` steps behind codebook 0. Inputs are built from the delayed
//! view; outputs are read back along the diagonal.

/// Number of EnCodec codebooks used by MusicGen.
pub const CODEBOOKS: usize = 4;

/// Sampled token history, one row per codebook.
#[derive(Debug)]
pub struct DelayPatternMaskIds<const N: usize> {
    rows: [Vec<i64>; N],
}

impl<const N: usize> Default for DelayPatternMaskIds<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> DelayPatternMaskIds<N> {
    /// Creates an empty history.
    pub fn new() -> Self {
        assert!(N > 0, "N needs to be greater than 0");
        Self {
            rows: std::array::from_fn(|_| Vec::new()),
        }
    }

    /// Appends one sampled token per codebook.
    ///
    /// # Panics
    ///
    /// Panics if the iterator does not yield exactly N token IDs.
    pub fn push(&mut self, token_ids: impl IntoIterator<Item = i64>) {
        let mut count = 0;
        for token_id in token_ids {
            assert!(count < N, "Expected exactly {N} token_ids");
            self.rows[count].push(token_id);
            count += 1;
        }
        assert_eq!(count, N, "Expected exactly {N} token_ids");
    }

    /// Next decoder input: the last token of each codebook, with codebooks
    /// that have not started yet replaced by `pad_token_id`.
    ///
    /// ```text
    ///   0 1 2 3 4 5
    /// 0 x x x x x x
    /// 1 P x x x x x
    /// 2 P P x x x x
    /// 3 P P P x x x
    /// ```
    pub fn last_delayed_masked(&self, pad_token_id: i64) -> [i64; N] {
        let steps = self.len();
        std::array::from_fn(|i| {
            if steps > i {
                self.rows[i].last().copied().unwrap_or(pad_token_id)
            } else {
                pad_token_id
            }
        })
    }

    /// Most recent complete frame read along the diagonal, or None until N
    /// steps have been pushed.
    ///
    /// ```text
    ///   0 1 2 3 4
    /// 0 a x x x x
    /// 1 P b x x x
    /// 2 P P c x x
    /// 3 P P P d x
    /// ```
    /// After the fifth push the frame is `[a, b, c, d]`.
    pub fn last_de_delayed(&self) -> Option<[i64; N]> {
        let steps = self.len();
        if steps < N {
            return None;
        }
        Some(std::array::from_fn(|i| self.rows[i][steps - N + i]))
    }

    /// Number of steps pushed so far.
    pub fn len(&self) -> usize {
        self.rows[0].len()
    }

    /// True if nothing has been pushed yet.
    pub fn is_empty(&self) -> bool {
        self.rows[0].is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let ids = DelayPatternMaskIds::<CODEBOOKS>::new();
        assert!(ids.is_empty());
        assert_eq!(ids.len(), 0);
    }

    #[test]
    fn delayed_inputs_are_padded_until_each_codebook_starts() {
        let mut ids = DelayPatternMaskIds::<4>::new();
        assert_eq!(ids.last_delayed_masked(-1), [-1, -1, -1, -1]);
        ids.push([1, 2, 3, 4]);
        assert_eq!(ids.last_delayed_masked(-1), [1, -1, -1, -1]);
        ids.push([5, 6, 7, 8]);
        assert_eq!(ids.last_delayed_masked(-1), [5, 6, -1, -1]);
        ids.push([9, 10, 11, 12]);
        assert_eq!(ids.last_delayed_masked(-1), [9, 10, 11, -1]);
        ids.push([13, 14, 15, 16]);
        assert_eq!(ids.last_delayed_masked(-1), [13, 14, 15, 16]);
    }

    #[test]
    fn frames_are_read_along_the_diagonal() {
        let mut ids = DelayPatternMaskIds::<4>::new();
        for step in 0..3 {
            ids.push((0..4).map(|c| step * 10 + c));
            assert_eq!(ids.last_de_delayed(), None);
        }
        ids.push([30, 31, 32, 33]);
        assert_eq!(ids.last_de_delayed(), Some([0, 11, 22, 33]));
        ids.push([40, 41, 42, 43]);
        assert_eq!(ids.last_de_delayed(), Some([10, 21, 32, 43]));
    }

    #[test]
    #[should_panic(expected = "Expected exactly 4 token_ids")]
    fn short_push_panics() {
        DelayPatternMaskIds::<4>::new().push([1, 2, 3]);
    }
}
