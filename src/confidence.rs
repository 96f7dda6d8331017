// 🎯 Confidence Calculator - 0..=100 score for a candidate group
//
//   text      = similarity(member[0], member[1]) * 0.2   (max 20)
//   days      = max(0, 40 - days_apart)                   (max 40)
//   category  = 20 if every member has the same category
//   counterparty = 20 if every member has the same counterparty
//
// Only the first two members feed the text term, even for larger groups.

use crate::db::Transaction;
use crate::similarity::similarity;
use serde::{Deserialize, Serialize};

pub const TEXT_WEIGHT: f64 = 0.2;
pub const MAX_DAYS_SCORE: i64 = 40;
pub const CATEGORY_BONUS: u32 = 20;
pub const COUNTERPARTY_BONUS: u32 = 20;

/// Every term that went into a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub description_similarity: u8,
    pub days_apart: i64,
    pub days_score: u32,
    pub category_bonus: u32,
    pub counterparty_bonus: u32,
    pub confidence: u8,
}

impl ConfidenceBreakdown {
    /// Human-readable summary of the terms
    pub fn reason(&self) -> String {
        let mut parts = vec![
            format!("text {}%", self.description_similarity),
            format!("{} day(s) apart", self.days_apart),
        ];
        if self.category_bonus > 0 {
            parts.push("same category".to_string());
        }
        if self.counterparty_bonus > 0 {
            parts.push("same counterparty".to_string());
        }
        parts.join(", ")
    }
}

/// True when every item yields the same `Some` value.
fn all_share<'a, F>(members: &'a [Transaction], key: F) -> bool
where
    F: Fn(&'a Transaction) -> Option<&'a str>,
{
    let mut iter = members.iter().map(key);
    match iter.next() {
        Some(Some(first)) => iter.all(|v| v == Some(first)),
        _ => false,
    }
}

/// Max event date minus min event date, in whole days
pub fn days_apart(members: &[Transaction]) -> i64 {
    let min = members.iter().map(|t| t.event_date).min();
    let max = members.iter().map(|t| t.event_date).max();
    match (min, max) {
        (Some(min), Some(max)) => (max - min).num_days(),
        _ => 0,
    }
}

/// Score a cluster. Returns `None` for fewer than two members.
pub fn calculate(members: &[Transaction]) -> Option<ConfidenceBreakdown> {
    if members.len() < 2 {
        return None;
    }

    let description_similarity = similarity(&members[0].description, &members[1].description);
    let category_bonus = if all_share(members, |t| t.category_id.as_deref()) {
        CATEGORY_BONUS
    } else {
        0
    };
    let counterparty_bonus = if all_share(members, |t| t.counterparty_id.as_deref()) {
        COUNTERPARTY_BONUS
    } else {
        0
    };

    let days_apart = days_apart(members);
    let days_score = (MAX_DAYS_SCORE - days_apart).max(0) as u32;

    let raw = description_similarity as f64 * TEXT_WEIGHT
        + days_score as f64
        + category_bonus as f64
        + counterparty_bonus as f64;
    let confidence = raw.round().clamp(0.0, 100.0) as u8;

    Some(ConfidenceBreakdown {
        description_similarity,
        days_apart,
        days_score,
        category_bonus,
        counterparty_bonus,
        confidence,
    })
}
