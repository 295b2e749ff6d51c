use chrono::Duration;

use freightdesk_core::AppResult;
use freightdesk_domain::{RetentionDays, is_compliance_event_type};

use crate::retention_ports::{
    AuditRecordFilter, OptimizationReason, OptimizationReport, RetentionOptimization,
};

use super::{RetentionEngine, estimated_megabytes};

/// Sampling window used to estimate daily volume.
const VOLUME_SAMPLE_DAYS: u16 = 30;

/// Daily rows above which a type counts as high volume.
const HIGH_VOLUME_DAILY_RECORDS: u64 = 1_000;

/// Window suggested for high-volume types.
const HIGH_VOLUME_RETENTION_DAYS: u16 = 90;

/// Longest window suggested for non-compliance types.
const MAX_STANDARD_RETENTION_DAYS: u16 = 365;

impl RetentionEngine {
    /// Suggests shorter windows for types that are cheap to forget.
    ///
    /// Advisory only: nothing here writes to the policy store.
    pub async fn optimize_retention_policies(&self) -> AppResult<OptimizationReport> {
        let now = self.now();
        let counts = self.repository.record_counts_by_event_type().await?;
        let mut optimizations = Vec::new();

        for (event_type, total) in counts {
            if total == 0 || is_compliance_event_type(&event_type) {
                continue;
            }

            let current_days = self.policy.retention_days_for(&event_type);
            let recent = self
                .repository
                .count_records(&AuditRecordFilter::created_since(
                    &event_type,
                    now - Duration::days(i64::from(VOLUME_SAMPLE_DAYS)),
                ))
                .await?;
            let daily_average = recent / u64::from(VOLUME_SAMPLE_DAYS);

            let suggestion = if daily_average > HIGH_VOLUME_DAILY_RECORDS
                && current_days.days() > HIGH_VOLUME_RETENTION_DAYS
            {
                Some((
                    HIGH_VOLUME_RETENTION_DAYS,
                    OptimizationReason::HighVolume { daily_average },
                ))
            } else if current_days.days() > MAX_STANDARD_RETENTION_DAYS {
                Some((
                    MAX_STANDARD_RETENTION_DAYS,
                    OptimizationReason::ExcessiveRetention,
                ))
            } else {
                None
            };

            let Some((recommended, reason)) = suggestion else {
                continue;
            };
            let recommended_days = RetentionDays::new(recommended)?;
            let affected_records = self
                .repository
                .count_records(&AuditRecordFilter::older_than(
                    Some(&event_type),
                    recommended_days.cutoff_from(now),
                ))
                .await?;

            optimizations.push(RetentionOptimization {
                event_type,
                current_days,
                recommended_days,
                reason,
                affected_records,
                estimated_savings_mb: estimated_megabytes(affected_records),
            });
        }

        let estimated_savings_mb = optimizations
            .iter()
            .map(|optimization| optimization.estimated_savings_mb)
            .sum::<f64>();

        Ok(OptimizationReport {
            optimizations,
            estimated_savings_mb: (estimated_savings_mb * 100.0).round() / 100.0,
        })
    }
}
