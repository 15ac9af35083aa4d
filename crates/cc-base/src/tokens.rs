use crate::config::ENGINE;

/// Estimate tokens from character count.
pub fn estimate_tokens_with(text: &str, chars_per_token: f32) -> usize {
    if text.is_empty() {
        return 0;
    }
    let chars = text.chars().count() as f32;
    (chars / chars_per_token).ceil() as usize
}

/// Estimate tokens with the configured ratio.
pub fn estimate_tokens(text: &str) -> usize {
    estimate_tokens_with(text, ENGINE.chars_per_token)
}

/// Share of `part` in `total`, in percent.
pub fn percentage(part: usize, total: usize) -> f32 {
    if total == 0 { 0.0 } else { part as f32 * 100.0 / total as f32 }
}
