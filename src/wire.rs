// JSON shapes returned to clients of the scan and delete endpoints

use crate::db::{Transaction, DATE_FORMAT};
use crate::deduplication::{DuplicateCandidateGroup, ScanReport};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub event_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty_name: Option<String>,
}

impl From<Transaction> for TransactionResponse {
    fn from(tx: Transaction) -> Self {
        Self {
            amount: tx.amount(),
            event_date: tx.event_date.format(DATE_FORMAT).to_string(),
            id: tx.id,
            description: tx.description,
            category_name: tx.category_name,
            counterparty_name: tx.counterparty_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResponse {
    pub id: String,
    pub account_id: String,
    pub account_name: String,
    pub transactions: Vec<TransactionResponse>,
    pub confidence: u8,
    pub days_apart: i64,
}

impl From<DuplicateCandidateGroup> for GroupResponse {
    fn from(group: DuplicateCandidateGroup) -> Self {
        Self {
            id: group.id,
            account_id: group.account_id,
            account_name: group.account_name,
            transactions: group.transactions.into_iter().map(Into::into).collect(),
            confidence: group.confidence,
            days_apart: group.days_apart,
        }
    }
}

/// `{ success: true, duplicate_groups, total_duplicates_found, scanned_transactions }`
/// or `{ success: false, error }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScanResponse {
    Found {
        success: bool,
        duplicate_groups: Vec<GroupResponse>,
        total_duplicates_found: usize,
        scanned_transactions: usize,
    },
    Failed {
        success: bool,
        error: String,
    },
}

impl ScanResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        ScanResponse::Failed {
            success: false,
            error: error.into(),
        }
    }
}

impl From<ScanReport> for ScanResponse {
    fn from(report: ScanReport) -> Self {
        ScanResponse::Found {
            success: true,
            duplicate_groups: report.groups.into_iter().map(Into::into).collect(),
            total_duplicates_found: report.total_duplicates_found,
            scanned_transactions: report.scanned_transactions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeleteResponse {
    Deleted { success: bool, deleted: usize },
    Failed { success: bool, error: String },
}

impl DeleteResponse {
    pub fn deleted(deleted: usize) -> Self {
        DeleteResponse::Deleted { success: true, deleted }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        DeleteResponse::Failed {
            success: false,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deduplication::DeduplicationEngine;
    use chrono::NaiveDate;

    fn tx(id: &str, category: Option<&str>) -> Transaction {
        Transaction {
            id: id.to_string(),
            description: "Insurance".to_string(),
            amount_minor: -15000,
            event_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            account_id: "acc-1".to_string(),
            account_name: "Checking".to_string(),
            category_id: category.map(|_| "cat-1".to_string()),
            category_name: category.map(String::from),
            counterparty_id: None,
            counterparty_name: None,
        }
    }

    #[test]
    fn test_scan_response_shape() {
        let report = DeduplicationEngine::new().scan(&[tx("t1", Some("Insurance")), tx("t2", None)]);
        let json = serde_json::to_value(ScanResponse::from(report)).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["total_duplicates_found"], 1);
        assert_eq!(json["scanned_transactions"], 2);

        let group = &json["duplicate_groups"][0];
        assert_eq!(group["account_id"], "acc-1");
        assert_eq!(group["account_name"], "Checking");
        assert_eq!(group["confidence"], 60);
        assert_eq!(group["days_apart"], 0);
        assert!(group["id"].is_string());
        assert!(group.get("breakdown").is_none());

        let first = &group["transactions"][0];
        assert_eq!(first["id"], "t1");
        assert_eq!(first["amount"], -150.0);
        assert_eq!(first["event_date"], "2024-07-01");
        assert_eq!(first["category_name"], "Insurance");
        assert!(group["transactions"][1].get("category_name").is_none());
    }

    #[test]
    fn test_failed_shapes() {
        let json = serde_json::to_value(ScanResponse::failed("store offline")).unwrap();
        assert_eq!(json, serde_json::json!({ "success": false, "error": "store offline" }));

        let json = serde_json::to_value(DeleteResponse::deleted(2)).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "deleted": 2 }));
    }
}
