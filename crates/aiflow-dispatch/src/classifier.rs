//! Provider error classification.
//!
//! Errors are labelled by matching their message text (and HTTP status, when
//! the executor supplied one) against two pattern sets. Terminal patterns win
//! over retryable ones; anything unrecognized is treated as retryable.

use std::sync::LazyLock;

use regex::RegexSet;
use serde::Serialize;

use crate::error::ProviderError;

static RETRYABLE: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)time(d)?[\s_-]?out",
        r"(?i)network|connection|econnreset|econnrefused|socket hang up|dns",
        r"(?i)rate[\s_-]?limit|throttl|too many requests",
        r"\b(5\d\d|429)\b",
        r"(?i)service unavailable|bad gateway|internal server error|overloaded|temporarily unavailable",
    ])
    .expect("retryable patterns are valid")
});

static TERMINAL: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)unauthori[sz]ed|forbidden|authentication|permission denied",
        r"(?i)invalid api[\s_-]?key|api[\s_-]?key not valid",
        r"\b(400|401|402|403|404|405|409|410|413|415|422)\b",
        r"(?i)quota|billing|insufficient (credits|funds|balance)|payment required",
    ])
    .expect("terminal patterns are valid")
});

/// Request-level problems that would fail identically on every provider.
static INVALID_INPUT: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)invalid (input|request body|payload)",
        r"(?i)malformed",
        r"(?i)validation (failed|error)",
        r"(?i)unsupported (media|file|content) type",
    ])
    .expect("invalid-input patterns are valid")
});

/// Broad category of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Timeout, network, rate limit, 5xx
    Transient,
    /// Auth, quota, 4xx other than 429
    Terminal,
    /// The request itself is bad
    InvalidInput,
    /// Nothing matched
    Unknown,
}

/// Outcome of classifying one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub kind: ErrorKind,
    pub retryable: bool,
    pub fallback_eligible: bool,
}

/// Pure classifier over provider failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, error: &ProviderError) -> Classification {
        if error.is_timeout() {
            return Classification {
                kind: ErrorKind::Transient,
                retryable: true,
                fallback_eligible: true,
            };
        }

        let message = error.message.as_str();

        if INVALID_INPUT.is_match(message) {
            return Classification {
                kind: ErrorKind::InvalidInput,
                retryable: false,
                fallback_eligible: false,
            };
        }

        let status_terminal = error
            .status_code
            .is_some_and(|code| (400..500).contains(&code) && code != 429);
        let status_retryable = error
            .status_code
            .is_some_and(|code| code == 429 || code >= 500);

        if status_terminal || TERMINAL.is_match(message) {
            return Classification {
                kind: ErrorKind::Terminal,
                retryable: false,
                fallback_eligible: true,
            };
        }

        if status_retryable || RETRYABLE.is_match(message) {
            return Classification {
                kind: ErrorKind::Transient,
                retryable: true,
                fallback_eligible: true,
            };
        }

        Classification {
            kind: ErrorKind::Unknown,
            retryable: true,
            fallback_eligible: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(msg: &str) -> Classification {
        ErrorClassifier::new().classify(&ProviderError::new(msg))
    }

    #[test]
    fn test_transient_messages_are_retryable() {
        for msg in [
            "request timed out",
            "ETIMEDOUT while reading",
            "connection reset by peer",
            "Rate limit reached for requests",
            "HTTP 503 Service Unavailable",
            "upstream returned 502",
            "status 429",
            "model is overloaded",
        ] {
            let c = classify(msg);
            assert!(c.retryable, "{msg} should be retryable");
            assert!(c.fallback_eligible);
            assert_eq!(c.kind, ErrorKind::Transient);
        }
    }

    #[test]
    fn test_terminal_messages_are_not_retried_but_fall_back() {
        for msg in [
            "401 Unauthorized",
            "Invalid API key provided",
            "Permission denied for project",
            "Quota exceeded for this month",
            "billing account disabled",
            "returned 404",
        ] {
            let c = classify(msg);
            assert!(!c.retryable, "{msg} should be terminal");
            assert!(c.fallback_eligible);
            assert_eq!(c.kind, ErrorKind::Terminal);
        }
    }

    #[test]
    fn test_terminal_wins_when_both_match() {
        // "429" and "quota" both match; the terminal pattern takes precedence.
        let c = classify("429 RESOURCE_EXHAUSTED: quota exceeded");
        assert!(!c.retryable);
        assert_eq!(c.kind, ErrorKind::Terminal);
    }

    #[test]
    fn test_invalid_input_short_circuits_chain() {
        let c = classify("Malformed request body");
        assert!(!c.retryable);
        assert!(!c.fallback_eligible);
        assert_eq!(c.kind, ErrorKind::InvalidInput);
    }

    #[test]
    fn test_unknown_defaults_to_retryable() {
        let c = classify("something odd happened");
        assert!(c.retryable);
        assert!(c.fallback_eligible);
        assert_eq!(c.kind, ErrorKind::Unknown);
    }

    #[test]
    fn test_status_code_is_considered() {
        let classifier = ErrorClassifier::new();
        let terminal = classifier.classify(&ProviderError::with_status("denied", 403));
        assert!(!terminal.retryable);

        let throttled = classifier.classify(&ProviderError::with_status("slow down", 429));
        assert!(throttled.retryable);

        let server = classifier.classify(&ProviderError::with_status("oops", 500));
        assert!(server.retryable);
    }

    #[test]
    fn test_timeout_variant_is_retryable() {
        let c = ErrorClassifier::new().classify(&ProviderError::timeout(30_000));
        assert!(c.retryable);
        assert_eq!(c.kind, ErrorKind::Transient);
    }
}
