//! Heuristic spam scoring for user-supplied text.

use serde::Serialize;

use crate::{ModerationError, Result};

pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Scores above this are spam.
pub const SPAM_THRESHOLD: u32 = 50;

pub const SPAM_KEYWORDS: [&str; 8] = [
    "free money",
    "click here",
    "subscribe now",
    "guaranteed",
    "act now",
    "limited time",
    "make money fast",
    "buy now",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpamFlags {
    pub has_spam_keywords: bool,
    pub excessive_capitals: bool,
    pub excessive_exclamation: bool,
    pub repeated_chars: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpamCheck {
    pub is_spam: bool,
    pub spam_score: u32,
    pub flags: SpamFlags,
    pub matched_keywords: Vec<&'static str>,
}

/// Whether any character occurs `run` or more times in a row.
fn has_repeated_run(text: &str, run: usize) -> bool {
    let mut prev = None;
    let mut len = 0;
    for c in text.chars() {
        if Some(c) == prev {
            len += 1;
        } else {
            prev = Some(c);
            len = 1;
        }
        if len >= run {
            return true;
        }
    }
    false
}

/// Score `content` for spam.
pub fn check_spam(content: &str) -> Result<SpamCheck> {
    let chars = content.chars().count();
    if chars == 0 || chars > MAX_CONTENT_CHARS {
        return Err(ModerationError::InvalidField {
            field: "content",
            reason: format!("must be 1..={MAX_CONTENT_CHARS} characters"),
        });
    }

    let lower = content.to_lowercase();
    let matched_keywords: Vec<&'static str> = SPAM_KEYWORDS
        .iter()
        .copied()
        .filter(|k| lower.contains(k))
        .collect();

    let letters = content.chars().filter(|c| c.is_alphabetic()).count();
    let capitals = content.chars().filter(|c| c.is_uppercase()).count();
    let excessive_capitals = letters > 0 && capitals * 2 > letters;
    let excessive_exclamation = content.matches('!').count() > 3;
    let repeated_chars = has_repeated_run(&lower, 5);

    let mut score = 20 * matched_keywords.len() as u32;
    if excessive_capitals {
        score += 30;
    }
    if excessive_exclamation {
        score += 20;
    }
    if repeated_chars {
        score += 25;
    }

    Ok(SpamCheck {
        is_spam: score > SPAM_THRESHOLD,
        spam_score: score.min(100),
        flags: SpamFlags {
            has_spam_keywords: !matched_keywords.is_empty(),
            excessive_capitals,
            excessive_exclamation,
            repeated_chars,
        },
        matched_keywords,
    })
}
