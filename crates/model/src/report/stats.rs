use serde::Serialize;

/// Row accounting for one cleaning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleaningStats {
    pub input_rows: usize,
    pub dropped_empty: usize,
    pub dropped_coercion: usize,
    pub dropped_missing: usize,
    pub dropped_duplicate: usize,
    pub dropped_rule: usize,
    pub output_rows: usize,
}

impl CleaningStats {
    pub fn dropped_total(&self) -> usize {
        self.dropped_empty
            + self.dropped_coercion
            + self.dropped_missing
            + self.dropped_duplicate
            + self.dropped_rule
    }

    /// Every input row is either retained or accounted for by one drop count.
    pub fn is_balanced(&self) -> bool {
        self.input_rows == self.output_rows + self.dropped_total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance() {
        let stats = CleaningStats {
            input_rows: 10,
            dropped_empty: 1,
            dropped_coercion: 2,
            dropped_missing: 1,
            dropped_duplicate: 3,
            dropped_rule: 1,
            output_rows: 2,
        };
        assert_eq!(stats.dropped_total(), 8);
        assert!(stats.is_balanced());
        assert!(!CleaningStats { output_rows: 3, ..stats }.is_balanced());
    }
}
