//! Headline figures over a usage log

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::diagnosis::DiagnosisEngine;
use crate::models::UsageRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentTotal {
    pub department: String,
    pub volume_gb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub records: usize,
    /// Distinct lines in the log
    pub entities: usize,
    pub latest_date: Option<NaiveDate>,
    /// Total volume on `latest_date`
    pub latest_volume_gb: f64,
    /// Records whose status matches a risk keyword
    pub risk_records: usize,
    /// Sorted by volume descending, then name
    pub departments: Vec<DepartmentTotal>,
    pub total_volume_gb: f64,
}

impl UsageSummary {
    pub fn build(records: &[UsageRecord], diagnosis: &DiagnosisEngine) -> Self {
        let entities: BTreeSet<&str> = records.iter().map(|r| r.entity_id.as_str()).collect();
        let latest_date = records.iter().map(|r| r.date).max();
        let latest_volume_gb = latest_date
            .map(|d| {
                records
                    .iter()
                    .filter(|r| r.date == d)
                    .map(|r| r.volume_gb)
                    .sum()
            })
            .unwrap_or(0.0);

        let mut per_department: BTreeMap<&str, f64> = BTreeMap::new();
        for r in records {
            *per_department.entry(r.department.as_str()).or_insert(0.0) += r.volume_gb;
        }
        let mut departments: Vec<DepartmentTotal> = per_department
            .into_iter()
            .map(|(department, volume_gb)| DepartmentTotal {
                department: department.to_string(),
                volume_gb,
            })
            .collect();
        departments.sort_by(|a, b| b.volume_gb.total_cmp(&a.volume_gb));

        Self {
            records: records.len(),
            entities: entities.len(),
            latest_date,
            latest_volume_gb,
            risk_records: records
                .iter()
                .filter(|r| diagnosis.is_risky(&r.status))
                .count(),
            departments,
            total_volume_gb: records.iter().map(|r| r.volume_gb).sum(),
        }
    }
}
