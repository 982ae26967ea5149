use bitflags::bitflags;

bitflags! {
    /// Evaluation options. Flags compose by bitwise OR; an absent flag means
    /// the default behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EvaluateOptions: u32 {
        /// Match function names case-insensitively.
        const IGNORE_CASE = 1 << 0;
        /// Bypass the expression cache for this evaluation.
        const NO_CACHE = 1 << 1;
        /// Evaluate the expression once per index across equal-length
        /// list-bound parameters.
        const ITERATE_PARAMETERS = 1 << 2;
        /// `ROUND` uses away-from-zero midpoint rounding instead of
        /// banker's rounding.
        const ROUND_AWAY_FROM_ZERO = 1 << 3;
        /// String comparisons ignore case.
        const MATCH_STRINGS_WITH_IGNORE_CASE = 1 << 4;
        /// String comparisons are ordinal.
        const MATCH_STRINGS_ORDINAL = 1 << 5;
        /// Integer arithmetic is checked; overflow raises instead of
        /// wrapping.
        const OVERFLOW_PROTECTION = 1 << 6;
        /// Booleans participate in arithmetic as 0/1.
        const BOOLEAN_CALCULATION = 1 << 7;
        /// `ABS` computes in double precision instead of decimal.
        const USE_DOUBLE_FOR_ABS = 1 << 8;
        /// A parameter bound to an explicit null evaluates to null instead
        /// of raising.
        const ALLOW_NULL_PARAMETER = 1 << 9;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose() {
        let options = EvaluateOptions::IGNORE_CASE | EvaluateOptions::NO_CACHE;
        assert!(options.contains(EvaluateOptions::IGNORE_CASE));
        assert!(options.contains(EvaluateOptions::NO_CACHE));
        assert!(!options.contains(EvaluateOptions::OVERFLOW_PROTECTION));
    }

    #[test]
    fn test_default_is_empty() {
        assert_eq!(EvaluateOptions::default(), EvaluateOptions::empty());
    }
}
