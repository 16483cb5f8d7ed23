/// A rough token estimate used only when an upstream response omits usage
/// entirely (a handful of third-party-compatible endpoints do). This is
/// deliberately crude — about 4 bytes per token for English text — and
/// exists so the Journal always has a number to aggregate rather than a
/// gap; it is never used to bill or enforce quota precisely.
pub fn estimate_tokens(text: &str) -> u64 {
    let len = text.chars().count() as u64;
    len.div_ceil(4).max(if text.is_empty() { 0 } else { 1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_tokens() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn short_text_is_at_least_one_token() {
        assert_eq!(estimate_tokens("hi"), 1);
    }

    #[test]
    fn scales_roughly_with_length() {
        let short = estimate_tokens("a short sentence");
        let long = estimate_tokens(&"a short sentence ".repeat(20));
        assert!(long > short * 10);
    }
}
