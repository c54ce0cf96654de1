//! Charging profiles for managed charging
//!
//! Profiles are compared structurally (`is_same_as` / `differs_from`)
//! rather than by identity: a charge point management system may resend an
//! unchanged profile, and the resend should be recognizable as a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unit the schedule's rate limits are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargingRateUnit {
    W,
    A,
}

/// One period of a charging schedule: from `start_offset_secs` after the
/// schedule start, limit the rate to `rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingSchedulePeriod {
    pub start_offset_secs: i32,
    pub rate: f64,
}

/// A rate schedule for managed charging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingScheduleInfo {
    /// Duration of the schedule in seconds; open-ended when absent.
    pub duration_secs: Option<i32>,
    /// Absolute start; relative to reception when absent.
    pub start: Option<DateTime<Utc>>,
    pub rate_unit: ChargingRateUnit,
    pub min_rate: Option<f64>,
    /// Ordered by `start_offset_secs`.
    pub periods: Vec<ChargingSchedulePeriod>,
}

impl ChargingScheduleInfo {
    pub fn is_same_as(&self, other: &Self) -> bool {
        self.duration_secs == other.duration_secs
            && self.start == other.start
            && self.rate_unit == other.rate_unit
            && self.min_rate == other.min_rate
            && self.periods == other.periods
    }

    pub fn differs_from(&self, other: &Self) -> bool {
        !self.is_same_as(other)
    }
}

/// A charging profile: a schedule plus its stacking metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingProfile {
    pub profile_id: i32,
    pub stack_level: u32,
    pub schedule: ChargingScheduleInfo,
}

impl ChargingProfile {
    /// Structural equality over the schedule content; the profile id does
    /// not participate, so an unchanged resend under a new id still
    /// compares equal.
    pub fn is_same_as(&self, other: &Self) -> bool {
        self.stack_level == other.stack_level && self.schedule.is_same_as(&other.schedule)
    }

    pub fn differs_from(&self, other: &Self) -> bool {
        !self.is_same_as(other)
    }
}
