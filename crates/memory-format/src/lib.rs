//! Greedy packer of memory texts into a bounded-token context string.
//! A text is included iff its estimated token count plus the running
//! total (including its separator) does not exceed the budget; the walk
//! stops at the first text that would overflow, so later, smaller texts
//! are never considered once one item has overflowed.

/// Deterministic token-count heuristic blending word and character
/// counts, so no external tokenizer dependency is required. Tuned
/// against English prose; not exact for any particular model's BPE.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let words = text.split_whitespace().count() as f64;
    let chars = text.chars().count() as f64;
    let by_words = words * 1.3;
    let by_chars = chars / 4.0;
    ((by_words + by_chars) / 2.0).ceil() as usize
}

/// Greedily pack `texts` into a numbered list under `budget` estimated
/// tokens. Returns the formatted string and the count of texts actually
/// included. Non-positive budgets and empty input return `("", 0)`.
pub fn format_with_budget(texts: &[String], budget: i64) -> (String, usize) {
    if texts.is_empty() || budget <= 0 {
        return (String::new(), 0);
    }
    let budget = budget as usize;

    let mut out = String::new();
    let mut total_tokens = 0usize;
    let mut included = 0usize;

    for (idx, text) in texts.iter().enumerate() {
        let separator = if out.is_empty() { "" } else { "\n\n" };
        let piece = format!("{separator}{}. {text}", idx + 1);
        let piece_tokens = estimate_tokens(&piece);

        if total_tokens + piece_tokens > budget {
            break;
        }

        out.push_str(&piece);
        total_tokens += piece_tokens;
        included += 1;
    }

    (out, included)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_returns_empty_output() {
        assert_eq!(format_with_budget(&[], 1000), (String::new(), 0));
    }

    #[test]
    fn non_positive_budget_returns_empty_output() {
        let texts = vec!["hello".to_string()];
        assert_eq!(format_with_budget(&texts, 0), (String::new(), 0));
        assert_eq!(format_with_budget(&texts, -5), (String::new(), 0));
    }

    #[test]
    fn all_texts_fit_under_generous_budget() {
        let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let (out, count) = format_with_budget(&texts, 10_000);
        assert_eq!(count, 3);
        assert!(out.contains("one"));
        assert!(out.contains("two"));
        assert!(out.contains("three"));
    }

    #[test]
    fn stops_at_first_overflowing_text_even_if_later_ones_are_smaller() {
        let texts = vec![
            "short".to_string(),
            "a very long piece of text that should not fit in a tiny budget at all".to_string(),
            "x".to_string(),
        ];
        let budget = estimate_tokens("1. short") as i64 + 1;
        let (out, count) = format_with_budget(&texts, budget);
        assert_eq!(count, 1);
        assert!(out.contains("short"));
        assert!(!out.contains("\"x\""));
    }

    #[test]
    fn output_never_exceeds_budget() {
        let texts: Vec<String> = (0..20).map(|i| format!("memory number {i} with some content")).collect();
        for budget in [1, 5, 20, 50, 200] {
            let (out, _count) = format_with_budget(&texts, budget);
            assert!(estimate_tokens(&out) <= budget as usize);
        }
    }

    #[test]
    fn estimate_tokens_is_deterministic() {
        let text = "the quick brown fox jumps over the lazy dog";
        assert_eq!(estimate_tokens(text), estimate_tokens(text));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn budget_is_never_exceeded(
            texts in proptest::collection::vec("[a-zA-Z ]{0,40}", 0..20),
            budget in 0i64..5000,
        ) {
            let (out, count) = format_with_budget(&texts, budget);
            prop_assert!(estimate_tokens(&out) <= budget.max(0) as usize);
            prop_assert!(count <= texts.len());
        }
    }
}
