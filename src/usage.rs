//! Usage data model and the source abstraction
//!
//! `UsagePeriod`/`UsageGroup` hold what Cost Explorer returned, unparsed.
//! `UsageSource` lets the report run against Cost Explorer or an in-memory
//! source in tests.

use crate::dates::DateInterval;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One instance type's metrics within a period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageGroup {
    pub instance_type: String,
    /// Running hours, decimal string
    pub usage_quantity: String,
    /// Reported unblended cost, decimal string
    pub unblended_cost: String,
}

impl UsageGroup {
    pub fn new(
        instance_type: impl Into<String>,
        usage_quantity: impl Into<String>,
        unblended_cost: impl Into<String>,
    ) -> Self {
        Self {
            instance_type: instance_type.into(),
            usage_quantity: usage_quantity.into(),
            unblended_cost: unblended_cost.into(),
        }
    }
}

/// One monthly result with the period bounds exactly as the API returned them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsagePeriod {
    pub start: String,
    pub end: String,
    pub groups: Vec<UsageGroup>,
}

/// Anything that can answer the running-hours query for a window
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Source name for logs
    fn name(&self) -> &'static str;

    /// Monthly usage grouped by instance type, periods in API order
    async fn fetch_usage(&self, interval: &DateInterval) -> Result<Vec<UsagePeriod>>;
}

/// Fold one result page into the periods collected so far
///
/// Paginated responses can repeat a period to carry more groups. Groups for a
/// period already seen are appended to it; new periods keep arrival order.
pub fn merge_page(periods: &mut Vec<UsagePeriod>, page: Vec<UsagePeriod>) {
    for period in page {
        match periods
            .iter_mut()
            .find(|p| p.start == period.start && p.end == period.end)
        {
            Some(existing) => existing.groups.extend(period.groups),
            None => periods.push(period),
        }
    }
}

/// In-memory source for tests
#[derive(Debug, Clone, Default)]
pub struct StaticUsageSource {
    periods: Vec<UsagePeriod>,
}

impl StaticUsageSource {
    pub fn new(periods: Vec<UsagePeriod>) -> Self {
        Self { periods }
    }
}

#[async_trait]
impl UsageSource for StaticUsageSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_usage(&self, _interval: &DateInterval) -> Result<Vec<UsagePeriod>> {
        Ok(self.periods.clone())
    }
}
