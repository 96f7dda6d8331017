// 🔍 Deduplication Engine - find groups of duplicate transactions
// Pipeline: partition by account -> cluster -> score -> rank

use crate::clustering::{partition_by_account, ClusterStrategy, MatchWindow};
use crate::config::DetectionConfig;
use crate::confidence::{self, ConfidenceBreakdown};
use crate::db::Transaction;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// DUPLICATE CANDIDATE GROUP
// ============================================================================

/// Two or more same-account transactions suspected to be one real event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCandidateGroup {
    /// Generated per scan, never persisted
    pub id: String,
    pub account_id: String,
    pub account_name: String,

    /// Members in discovery order (seed first)
    pub transactions: Vec<Transaction>,

    pub confidence: u8,
    pub days_apart: i64,

    /// Terms behind `confidence`
    pub breakdown: ConfidenceBreakdown,
}

impl DuplicateCandidateGroup {
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn contains(&self, transaction_id: &str) -> bool {
        self.transactions.iter().any(|t| t.id == transaction_id)
    }
}

// ============================================================================
// SCAN REPORT
// ============================================================================

/// Ranked groups plus scan-level counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Sorted by confidence, highest first
    pub groups: Vec<DuplicateCandidateGroup>,

    /// All members except one "original" per group
    pub total_duplicates_found: usize,

    pub scanned_transactions: usize,
}

impl ScanReport {
    pub fn is_all_clear(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Order groups by confidence (stable: ties keep discovery order) and count.
pub fn assemble(mut groups: Vec<DuplicateCandidateGroup>, scanned_transactions: usize) -> ScanReport {
    groups.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    let total_duplicates_found = groups.iter().map(|g| g.len().saturating_sub(1)).sum();

    ScanReport {
        groups,
        total_duplicates_found,
        scanned_transactions,
    }
}

// ============================================================================
// DEDUPLICATION ENGINE
// ============================================================================

pub struct DeduplicationEngine {
    pub window: MatchWindow,
    strategy: Box<dyn ClusterStrategy>,
}

impl DeduplicationEngine {
    /// Engine with the default window and seed-only clustering
    pub fn new() -> Self {
        Self::from_config(&DetectionConfig::default())
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        DeduplicationEngine {
            window: config.window(),
            strategy: config.strategy.build(),
        }
    }

    /// Swap the clustering strategy
    pub fn with_strategy(mut self, strategy: Box<dyn ClusterStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Groups for one account's transactions, in discovery order.
    pub fn find_groups_in_account(&self, transactions: &[Transaction]) -> Vec<DuplicateCandidateGroup> {
        self.strategy
            .cluster(transactions, &self.window)
            .into_iter()
            .filter_map(|indices| {
                let members: Vec<Transaction> = indices.iter().map(|&i| transactions[i].clone()).collect();
                let breakdown = confidence::calculate(&members)?;
                let first = &members[0];

                Some(DuplicateCandidateGroup {
                    id: uuid::Uuid::new_v4().to_string(),
                    account_id: first.account_id.clone(),
                    account_name: first.account_name.clone(),
                    confidence: breakdown.confidence,
                    days_apart: breakdown.days_apart,
                    breakdown,
                    transactions: members,
                })
            })
            .collect()
    }

    /// Scan every account and return ranked groups.
    pub fn scan(&self, transactions: &[Transaction]) -> ScanReport {
        let mut groups = Vec::new();

        for (account_id, partition) in partition_by_account(transactions) {
            let found = self.find_groups_in_account(&partition);
            debug!(
                account_id = %account_id,
                transactions = partition.len(),
                groups = found.len(),
                "clustered account"
            );
            groups.extend(found);
        }

        assemble(groups, transactions.len())
    }
}

impl Default for DeduplicationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::TransitiveClustering;
    use chrono::NaiveDate;

    fn create_test_transaction(
        id: &str,
        account: &str,
        date: &str,
        amount_minor: i64,
        description: &str,
    ) -> Transaction {
        Transaction {
            id: id.to_string(),
            description: description.to_string(),
            amount_minor,
            event_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            account_id: account.to_string(),
            account_name: format!("{} account", account),
            category_id: None,
            category_name: None,
            counterparty_id: None,
            counterparty_name: None,
        }
    }

    fn with_links(mut tx: Transaction, category: &str, counterparty: &str) -> Transaction {
        tx.category_id = Some(category.to_string());
        tx.counterparty_id = Some(counterparty.to_string());
        tx
    }

    #[test]
    fn test_fifteen_days_identical_text() {
        let engine = DeduplicationEngine::new();
        let txs = vec![
            create_test_transaction("a", "acc", "2024-04-16", 15000, "Car insurance"),
            create_test_transaction("b", "acc", "2024-04-01", 15000, "Car insurance"),
        ];

        let report = engine.scan(&txs);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].confidence, 45);
        assert_eq!(report.groups[0].days_apart, 15);
        assert_eq!(report.groups[0].account_name, "acc account");
        assert_eq!(report.total_duplicates_found, 1);
        assert_eq!(report.scanned_transactions, 2);
    }

    #[test]
    fn test_fifteen_days_with_category_and_counterparty() {
        let engine = DeduplicationEngine::new();
        let txs = vec![
            with_links(create_test_transaction("a", "acc", "2024-04-16", 15000, "Car insurance"), "c", "p"),
            with_links(create_test_transaction("b", "acc", "2024-04-01", 15000, "Car insurance"), "c", "p"),
        ];

        let report = engine.scan(&txs);
        assert_eq!(report.groups[0].confidence, 85);
    }

    #[test]
    fn test_amount_outside_tolerance() {
        let engine = DeduplicationEngine::new();
        let txs = vec![
            create_test_transaction("a", "acc", "2024-04-16", 15000, "Car insurance"),
            create_test_transaction("b", "acc", "2024-04-16", 15002, "Car insurance"),
        ];

        assert!(engine.scan(&txs).is_all_clear());
    }

    #[test]
    fn test_dates_outside_window() {
        let engine = DeduplicationEngine::new();
        let txs = vec![
            create_test_transaction("a", "acc", "2024-05-02", 15000, "Car insurance"),
            create_test_transaction("b", "acc", "2024-04-01", 15000, "Car insurance"),
        ];

        assert!(engine.scan(&txs).is_all_clear());
    }

    #[test]
    fn test_different_accounts_never_group() {
        let engine = DeduplicationEngine::new();
        let txs = vec![
            create_test_transaction("a", "checking", "2024-04-01", 15000, "Transfer"),
            create_test_transaction("b", "savings", "2024-04-01", 15000, "Transfer"),
        ];

        assert!(engine.scan(&txs).is_all_clear());
    }

    #[test]
    fn test_large_scan_without_duplicates() {
        let engine = DeduplicationEngine::new();
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let txs: Vec<Transaction> = (0..500)
            .map(|i| {
                let mut tx = create_test_transaction(&format!("t{i}"), "acc", "2023-01-01", 0, "Purchase");
                tx.event_date = start + chrono::Duration::days(i % 90);
                tx.amount_minor = 1000 + i * 7; // every amount differs by more than a cent
                tx
            })
            .collect();

        let report = engine.scan(&txs);
        assert!(report.groups.is_empty());
        assert_eq!(report.scanned_transactions, 500);
        assert_eq!(report.total_duplicates_found, 0);
    }

    #[test]
    fn test_groups_ranked_by_confidence_with_stable_ties() {
        let engine = DeduplicationEngine::new();
        let txs = vec![
            // low: 20 days apart
            create_test_transaction("l1", "acc", "2024-04-21", 100, "Lunch"),
            create_test_transaction("l2", "acc", "2024-04-01", 100, "Lunch"),
            // high: same day, other account
            create_test_transaction("h1", "visa", "2024-04-10", 200, "Hotel"),
            create_test_transaction("h2", "visa", "2024-04-10", 200, "Hotel"),
            // tie with low, discovered later
            create_test_transaction("t1", "visa", "2024-03-21", 300, "Taxi"),
            create_test_transaction("t2", "visa", "2024-03-01", 300, "Taxi"),
        ];

        let report = engine.scan(&txs);
        let firsts: Vec<_> = report.groups.iter().map(|g| g.transactions[0].id.as_str()).collect();
        assert_eq!(firsts, vec!["h1", "l1", "t1"]);
        assert_eq!(report.groups[1].confidence, report.groups[2].confidence);
    }

    #[test]
    fn test_three_member_group_counts_two_duplicates() {
        let engine = DeduplicationEngine::new();
        let txs = vec![
            create_test_transaction("a", "acc", "2024-04-03", 999, "Phone"),
            create_test_transaction("b", "acc", "2024-04-02", 999, "Phone"),
            create_test_transaction("c", "acc", "2024-04-01", 1000, "Phone"),
        ];

        let report = engine.scan(&txs);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].len(), 3);
        assert_eq!(report.groups[0].days_apart, 2);
        assert_eq!(report.total_duplicates_found, 2);
    }

    #[test]
    fn test_group_invariants_hold() {
        let engine = DeduplicationEngine::new();
        let txs = vec![
            create_test_transaction("a", "acc", "2024-04-30", 500, "Coffee"),
            create_test_transaction("b", "acc", "2024-04-20", 501, "Coffee shop"),
            create_test_transaction("c", "acc", "2024-04-10", 500, "COFFEE"),
            create_test_transaction("d", "acc", "2024-03-25", 499, "coffee"),
        ];

        for group in engine.scan(&txs).groups {
            assert!(group.len() >= 2);
            assert!(group.confidence <= 100);
            let seed = &group.transactions[0];
            for member in &group.transactions {
                assert_eq!(member.account_id, group.account_id);
                assert!((member.amount_minor - seed.amount_minor).abs() <= 1);
                assert!((member.event_date - seed.event_date).num_days().abs() <= 30);
            }
        }
    }

    #[test]
    fn test_transitive_strategy_swaps_in() {
        let txs = vec![
            create_test_transaction("T", "acc", "2024-03-05", 1000, "Gym"),
            create_test_transaction("U", "acc", "2024-02-14", 1000, "Gym"),
            create_test_transaction("V", "acc", "2024-01-30", 1000, "Gym"),
        ];

        let seed = DeduplicationEngine::new().scan(&txs);
        assert_eq!(seed.groups[0].len(), 2);

        let transitive = DeduplicationEngine::new()
            .with_strategy(Box::new(TransitiveClustering))
            .scan(&txs);
        assert_eq!(transitive.groups[0].len(), 3);
        assert_eq!(transitive.groups[0].days_apart, 35);
        assert_eq!(transitive.total_duplicates_found, 2);
    }

    #[test]
    fn test_group_ids_are_unique_per_scan() {
        let engine = DeduplicationEngine::new();
        let txs = vec![
            create_test_transaction("a", "acc", "2024-04-01", 100, "X"),
            create_test_transaction("b", "acc", "2024-04-01", 100, "X"),
            create_test_transaction("c", "acc", "2024-04-01", 200, "Y"),
            create_test_transaction("d", "acc", "2024-04-01", 200, "Y"),
        ];

        let report = engine.scan(&txs);
        assert_eq!(report.groups.len(), 2);
        assert_ne!(report.groups[0].id, report.groups[1].id);
    }
}
