//! Concrete provider executors.

pub mod gemini;
pub mod http;

pub use gemini::GeminiExecutor;
pub use http::HttpJsonExecutor;

/// Strip a surrounding markdown code fence from model output.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\nplain\n```"), "plain");
        assert_eq!(strip_code_fence("  {\"b\":2} "), "{\"b\":2}");
    }
}
