//! Deterministic change-size classification (C7 §4.7). Rules are
//! evaluated small -> medium -> large; a tier matches against its own
//! condition — either the file/line counts fit its own limits, or the
//! message contains one of its own keywords — and the first matching
//! tier wins. Falls back to medium if nothing matches, per spec (in
//! practice unreachable, since large's limits are unconditionally
//! satisfied).

use rust_decimal::Decimal;

use crate::ledger::Costs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSize {
    Small,
    Medium,
    Large,
}

impl ChangeSize {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeSize::Small => "small",
            ChangeSize::Medium => "medium",
            ChangeSize::Large => "large",
        }
    }

    pub fn cost(self) -> Decimal {
        match self {
            ChangeSize::Small => Costs::SMALL_EDIT,
            ChangeSize::Medium => Costs::MEDIUM_EDIT,
            ChangeSize::Large => Costs::LARGE_EDIT,
        }
    }
}

struct Rule {
    size: ChangeSize,
    max_files: Option<usize>,
    max_lines: Option<usize>,
    keywords: &'static [&'static str],
}

const RULES: &[Rule] = &[
    Rule {
        size: ChangeSize::Small,
        max_files: Some(1),
        max_lines: Some(50),
        keywords: &["change", "update", "replace", "fix typo"],
    },
    Rule {
        size: ChangeSize::Medium,
        max_files: Some(3),
        max_lines: Some(200),
        keywords: &["add", "remove", "modify", "update component"],
    },
    Rule {
        size: ChangeSize::Large,
        max_files: None,
        max_lines: None,
        keywords: &["refactor", "restructure", "redesign", "major"],
    },
];

/// Classifies a change given its message, the number of files it
/// touches, and the total number of changed lines across those files.
///
/// Tiers are checked small -> medium -> large; a tier matches if the
/// message contains one of its own keywords, or the file/line counts fit
/// its own limits — whichever comes first wins, so a small-sized edit
/// that happens to mention a "large" keyword (e.g. "refactor the title"
/// touching one file) is still classified Small, because small's own
/// limits are checked before large is ever considered.
pub fn classify(message: &str, file_count: usize, total_lines: usize) -> ChangeSize {
    let lower = message.to_lowercase();
    for rule in RULES {
        let matches_pattern = rule.keywords.iter().any(|kw| lower.contains(kw));
        let within_limits = rule.max_files.is_none_or(|mf| file_count <= mf)
            && rule.max_lines.is_none_or(|ml| total_lines <= ml);
        if matches_pattern || within_limits {
            return rule.size;
        }
    }
    ChangeSize::Medium
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_by_limits() {
        assert_eq!(classify("tweak copy", 1, 10), ChangeSize::Small);
    }

    #[test]
    fn small_by_keyword_despite_large_file_count() {
        assert_eq!(classify("change many things", 8, 900), ChangeSize::Small);
    }

    #[test]
    fn medium_by_limits() {
        assert_eq!(classify("do something obscure", 3, 150), ChangeSize::Medium);
    }

    #[test]
    fn small_limits_win_over_a_large_keyword() {
        // "refactor" is a large-tier keyword, but small's own limits (<=1
        // file, <=50 lines) are satisfied and small is checked first.
        assert_eq!(classify("refactor the layout", 1, 5), ChangeSize::Small);
    }

    #[test]
    fn large_by_keyword_when_small_and_medium_limits_are_exceeded() {
        assert_eq!(classify("refactor the layout", 5, 300), ChangeSize::Large);
    }

    #[test]
    fn large_is_the_catchall_when_small_and_medium_both_miss() {
        // Large's limits are unconditionally satisfied (no cap), so any
        // message that fits neither small's nor medium's own keyword or
        // limits falls through to large, never to the medium default.
        assert_eq!(classify("do something obscure entirely", 9, 900), ChangeSize::Large);
    }
}
