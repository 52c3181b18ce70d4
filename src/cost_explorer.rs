//! AWS Cost Explorer usage source
//!
//! Issues `GetCostAndUsage` for EC2 running hours, monthly, grouped by
//! instance type, and follows `NextPageToken` until the result is complete.

use crate::dates::DateInterval;
use crate::error::{CostReportError, Result};
use crate::retry::{ExponentialBackoffPolicy, RetryPolicy};
use crate::usage::{merge_page, UsageGroup, UsagePeriod, UsageSource};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_costexplorer::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_costexplorer::operation::get_cost_and_usage::builders::GetCostAndUsageFluentBuilder;
use aws_sdk_costexplorer::operation::get_cost_and_usage::{
    GetCostAndUsageError, GetCostAndUsageOutput,
};
use aws_sdk_costexplorer::types::{
    DateInterval as TimePeriod, Dimension, DimensionValues, Expression, Granularity, Group,
    GroupDefinition, GroupDefinitionType, ResultByTime,
};
use aws_sdk_costexplorer::Client as CostExplorerClient;
use tracing::{debug, warn};

/// Metric holding the reported cost
pub const UNBLENDED_COST: &str = "UnblendedCost";
/// Metric holding the running hours
pub const USAGE_QUANTITY: &str = "UsageQuantity";
/// `SERVICE` dimension value for EC2 compute
pub const EC2_COMPUTE_SERVICE: &str = "Amazon Elastic Compute Cloud - Compute";
/// `USAGE_TYPE_GROUP` dimension value for instance hours
pub const RUNNING_HOURS_USAGE_GROUP: &str = "EC2: Running Hours";

const PROVIDER: &str = "aws";

/// Load SDK config for a named profile and region
pub async fn load_sdk_config(profile: &str, region: &str) -> SdkConfig {
    debug!("Loading AWS config for profile {} in {}", profile, region);
    aws_config::defaults(BehaviorVersion::latest())
        .profile_name(profile)
        .region(Region::new(region.to_string()))
        .load()
        .await
}

/// `UsageSource` backed by the Cost Explorer API
#[derive(Debug, Clone)]
pub struct CostExplorerSource {
    client: CostExplorerClient,
    retry: ExponentialBackoffPolicy,
}

impl CostExplorerSource {
    pub fn new(aws_config: &SdkConfig, max_attempts: u32) -> Self {
        Self {
            client: CostExplorerClient::new(aws_config),
            retry: ExponentialBackoffPolicy::new(max_attempts),
        }
    }

    async fn fetch_page(
        &self,
        time_period: &TimePeriod,
        next_page_token: Option<String>,
    ) -> Result<GetCostAndUsageOutput> {
        cost_and_usage_request(&self.client, time_period, next_page_token)
            .send()
            .await
            .map_err(classify_error)
    }
}

#[async_trait]
impl UsageSource for CostExplorerSource {
    fn name(&self) -> &'static str {
        "cost-explorer"
    }

    async fn fetch_usage(&self, interval: &DateInterval) -> Result<Vec<UsagePeriod>> {
        let time_period = time_period_for(interval)?;
        let time_period = &time_period;

        let periods = collect_pages(|token| async move {
            self.retry
                .execute_with_retry(|| self.fetch_page(time_period, token.clone()))
                .await
        })
        .await?;

        debug!("Fetched {} periods for {}", periods.len(), interval);
        Ok(periods)
    }
}

fn time_period_for(interval: &DateInterval) -> Result<TimePeriod> {
    TimePeriod::builder()
        .start(interval.start_str())
        .end(interval.end_str())
        .build()
        .map_err(|e| CostReportError::Aws(format!("Invalid time period {}: {}", interval, e)))
}

/// Running-hours query for one page
fn cost_and_usage_request(
    client: &CostExplorerClient,
    time_period: &TimePeriod,
    next_page_token: Option<String>,
) -> GetCostAndUsageFluentBuilder {
    client
        .get_cost_and_usage()
        .time_period(time_period.clone())
        .granularity(Granularity::Monthly)
        .metrics(UNBLENDED_COST)
        .metrics(USAGE_QUANTITY)
        .group_by(instance_type_grouping())
        .filter(running_hours_filter())
        .set_next_page_token(next_page_token)
}

/// Call `fetch_page` with each `NextPageToken` until the API stops sending one
///
/// A token that repeats the previous one ends the loop.
async fn collect_pages<F, Fut>(fetch_page: F) -> Result<Vec<UsagePeriod>>
where
    F: Fn(Option<String>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<GetCostAndUsageOutput>> + Send,
{
    let mut periods = Vec::new();
    let mut next_page_token: Option<String> = None;
    let mut pages = 0;

    loop {
        let output = fetch_page(next_page_token.clone()).await?;
        pages += 1;

        let page: Vec<UsagePeriod> = output
            .results_by_time()
            .iter()
            .map(period_from_result)
            .collect();
        debug!("Page {}: {} periods", pages, page.len());
        merge_page(&mut periods, page);

        match output.next_page_token() {
            Some(token) if !token.is_empty() => {
                if next_page_token.as_deref() == Some(token) {
                    warn!("Cost Explorer repeated page token, stopping pagination");
                    break;
                }
                next_page_token = Some(token.to_string());
            }
            _ => break,
        }
    }

    Ok(periods)
}

fn instance_type_grouping() -> GroupDefinition {
    GroupDefinition::builder()
        .r#type(GroupDefinitionType::Dimension)
        .key("INSTANCE_TYPE")
        .build()
}

/// `SERVICE = EC2 compute AND USAGE_TYPE_GROUP = running hours`
fn running_hours_filter() -> Expression {
    let service = Expression::builder()
        .dimensions(
            DimensionValues::builder()
                .key(Dimension::Service)
                .values(EC2_COMPUTE_SERVICE)
                .build(),
        )
        .build();
    let usage_type_group = Expression::builder()
        .dimensions(
            DimensionValues::builder()
                .key(Dimension::UsageTypeGroup)
                .values(RUNNING_HOURS_USAGE_GROUP)
                .build(),
        )
        .build();

    Expression::builder()
        .and(service)
        .and(usage_type_group)
        .build()
}

fn period_from_result(result: &ResultByTime) -> UsagePeriod {
    let (start, end) = result
        .time_period()
        .map(|p| (p.start().to_string(), p.end().to_string()))
        .unwrap_or_default();

    let groups = result
        .groups()
        .iter()
        .filter_map(|group| group_from_result(group, &start))
        .collect();

    UsagePeriod { start, end, groups }
}

fn group_from_result(group: &Group, period_start: &str) -> Option<UsageGroup> {
    let Some(instance_type) = group.keys().first() else {
        warn!("Skipping group without keys in period {}", period_start);
        return None;
    };

    Some(UsageGroup {
        instance_type: instance_type.clone(),
        usage_quantity: metric_amount(group, USAGE_QUANTITY, instance_type),
        unblended_cost: metric_amount(group, UNBLENDED_COST, instance_type),
    })
}

fn metric_amount(group: &Group, metric: &str, instance_type: &str) -> String {
    match group
        .metrics()
        .and_then(|metrics| metrics.get(metric))
        .and_then(|value| value.amount())
    {
        Some(amount) => amount.to_string(),
        None => {
            warn!("No {} amount for {}", metric, instance_type);
            String::new()
        }
    }
}

/// Error codes Cost Explorer uses for throttling and transient faults
fn is_transient_code(code: Option<&str>) -> bool {
    matches!(
        code,
        Some(
            "LimitExceededException"
                | "ThrottlingException"
                | "RequestLimitExceeded"
                | "ServiceUnavailable"
                | "InternalFailure"
        )
    )
}

fn classify_error(err: SdkError<GetCostAndUsageError>) -> CostReportError {
    let transient = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => true,
        SdkError::ServiceError(service) => {
            service.err().is_limit_exceeded_exception() || is_transient_code(service.err().code())
        }
        _ => false,
    };
    let message = format!("GetCostAndUsage failed: {}", DisplayErrorContext(&err));

    if transient {
        CostReportError::CloudProvider {
            provider: PROVIDER.to_string(),
            message,
            source: None,
        }
    } else {
        CostReportError::Aws(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_costexplorer::config::http::HttpResponse;
    use aws_sdk_costexplorer::error::ErrorMetadata;
    use aws_sdk_costexplorer::types::error::LimitExceededException;
    use aws_sdk_costexplorer::types::MetricValue;
    use aws_smithy_runtime_api::http::StatusCode;
    use aws_smithy_types::body::SdkBody;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    fn offline_client() -> CostExplorerClient {
        let config = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        CostExplorerClient::new(&config)
    }

    fn interval() -> DateInterval {
        DateInterval {
            start: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        }
    }

    fn result(start: &str, end: &str, groups: Vec<Group>) -> ResultByTime {
        ResultByTime::builder()
            .time_period(TimePeriod::builder().start(start).end(end).build().unwrap())
            .set_groups(Some(groups))
            .build()
    }

    fn page(results: Vec<ResultByTime>, token: Option<&str>) -> GetCostAndUsageOutput {
        GetCostAndUsageOutput::builder()
            .set_results_by_time(Some(results))
            .set_next_page_token(token.map(str::to_string))
            .build()
    }

    fn service_error(err: GetCostAndUsageError, status: u16) -> SdkError<GetCostAndUsageError> {
        let raw = HttpResponse::new(StatusCode::try_from(status).unwrap(), SdkBody::empty());
        SdkError::service_error(err, raw)
    }

    fn group(instance_type: &str, hours: &str, cost: &str) -> Group {
        Group::builder()
            .keys(instance_type)
            .metrics(USAGE_QUANTITY, MetricValue::builder().amount(hours).unit("Hrs").build())
            .metrics(UNBLENDED_COST, MetricValue::builder().amount(cost).unit("USD").build())
            .build()
    }

    #[test]
    fn test_filter_matches_running_hours() {
        let filter = running_hours_filter();
        let clauses = filter.and();
        assert_eq!(clauses.len(), 2);

        let service = clauses[0].dimensions().unwrap();
        assert_eq!(service.key(), Some(&Dimension::Service));
        assert_eq!(service.values(), &[EC2_COMPUTE_SERVICE.to_string()]);

        let usage_group = clauses[1].dimensions().unwrap();
        assert_eq!(usage_group.key(), Some(&Dimension::UsageTypeGroup));
        assert_eq!(usage_group.values(), &[RUNNING_HOURS_USAGE_GROUP.to_string()]);
    }

    #[test]
    fn test_grouping_by_instance_type() {
        let grouping = instance_type_grouping();
        assert_eq!(grouping.r#type(), Some(&GroupDefinitionType::Dimension));
        assert_eq!(grouping.key(), Some("INSTANCE_TYPE"));
    }

    #[test]
    fn test_period_from_result() {
        let result = ResultByTime::builder()
            .time_period(
                TimePeriod::builder()
                    .start("2024-01-01")
                    .end("2024-02-01")
                    .build()
                    .unwrap(),
            )
            .groups(group("m5.large", "744", "71.424"))
            .groups(Group::builder().build())
            .groups(group("t3.micro", "10.5", "0"))
            .build();

        let period = period_from_result(&result);
        assert_eq!(period.start, "2024-01-01");
        assert_eq!(period.end, "2024-02-01");
        assert_eq!(
            period.groups,
            vec![
                UsageGroup::new("m5.large", "744", "71.424"),
                UsageGroup::new("t3.micro", "10.5", "0"),
            ]
        );
    }

    #[test]
    fn test_missing_metric_is_empty() {
        let bare = Group::builder().keys("c5.large").build();
        let usage = group_from_result(&bare, "2024-01-01").unwrap();
        assert_eq!(usage.usage_quantity, "");
        assert_eq!(usage.unblended_cost, "");
    }

    #[test]
    fn test_transient_codes() {
        assert!(is_transient_code(Some("LimitExceededException")));
        assert!(is_transient_code(Some("ThrottlingException")));
        assert!(!is_transient_code(Some("AccessDeniedException")));
        assert!(!is_transient_code(Some("DataUnavailableException")));
        assert!(!is_transient_code(None));
    }

    #[test]
    fn test_request_asks_for_monthly_cost_and_hours() {
        let time_period = time_period_for(&interval()).unwrap();
        let request = cost_and_usage_request(&offline_client(), &time_period, None);
        let input = request.as_input();

        assert_eq!(
            input.get_metrics(),
            &Some(vec![UNBLENDED_COST.to_string(), USAGE_QUANTITY.to_string()])
        );
        assert_eq!(input.get_granularity(), &Some(Granularity::Monthly));
        assert_eq!(input.get_group_by(), &Some(vec![instance_type_grouping()]));
        assert_eq!(input.get_filter(), &Some(running_hours_filter()));
        assert_eq!(input.get_next_page_token(), &None);

        let period = input.get_time_period().as_ref().unwrap();
        assert_eq!(period.start(), "2023-06-01");
        assert_eq!(period.end(), "2024-06-01");
    }

    #[test]
    fn test_request_carries_page_token() {
        let time_period = time_period_for(&interval()).unwrap();
        let request =
            cost_and_usage_request(&offline_client(), &time_period, Some("page-2".to_string()));
        assert_eq!(request.as_input().get_next_page_token(), &Some("page-2".to_string()));
    }

    #[tokio::test]
    async fn test_collect_pages_follows_tokens() {
        let seen = Mutex::new(Vec::new());

        let periods = collect_pages(|token| {
            seen.lock().unwrap().push(token.clone());
            let output = match token.as_deref() {
                None => page(
                    vec![result("2024-01-01", "2024-02-01", vec![group("t3.micro", "10", "0")])],
                    Some("t1"),
                ),
                Some("t1") => page(
                    vec![
                        result("2024-01-01", "2024-02-01", vec![group("m5.large", "5", "3")]),
                        result("2024-02-01", "2024-03-01", vec![group("t3.micro", "1", "0")]),
                    ],
                    Some("t2"),
                ),
                _ => page(vec![], None),
            };
            async move { Ok(output) }
        })
        .await
        .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![None, Some("t1".to_string()), Some("t2".to_string())]
        );
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].groups.len(), 2);
        assert_eq!(periods[0].groups[1].instance_type, "m5.large");
        assert_eq!(periods[1].start, "2024-02-01");
    }

    #[tokio::test]
    async fn test_collect_pages_stops_on_repeated_token() {
        let calls = Mutex::new(0);

        let periods = collect_pages(|_token| {
            *calls.lock().unwrap() += 1;
            let output = page(
                vec![result("2024-01-01", "2024-02-01", vec![group("t3.micro", "1", "0")])],
                Some("same"),
            );
            async move { Ok(output) }
        })
        .await
        .unwrap();

        assert_eq!(*calls.lock().unwrap(), 2);
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].groups.len(), 2);
    }

    #[tokio::test]
    async fn test_collect_pages_propagates_failure() {
        let result = collect_pages(|_token| async {
            Err(CostReportError::Aws("AccessDeniedException".to_string()))
        })
        .await;

        assert!(matches!(result, Err(CostReportError::Aws(_))));
    }

    #[test]
    fn test_classify_throttling_as_retryable() {
        let limit = GetCostAndUsageError::LimitExceededException(
            LimitExceededException::builder()
                .message("Rate exceeded")
                .build(),
        );
        let err = classify_error(service_error(limit, 400));
        assert!(matches!(err, CostReportError::CloudProvider { .. }));

        let throttled = GetCostAndUsageError::generic(
            ErrorMetadata::builder().code("ThrottlingException").build(),
        );
        let err = classify_error(service_error(throttled, 400));
        assert!(matches!(err, CostReportError::CloudProvider { .. }));

        let err = classify_error(SdkError::timeout_error("request timed out"));
        assert!(matches!(err, CostReportError::CloudProvider { .. }));
    }

    #[test]
    fn test_classify_other_service_errors_as_fatal() {
        let denied = GetCostAndUsageError::generic(
            ErrorMetadata::builder()
                .code("AccessDeniedException")
                .message("not authorized")
                .build(),
        );
        let err = classify_error(service_error(denied, 403));
        match err {
            CostReportError::Aws(message) => assert!(message.contains("GetCostAndUsage failed")),
            other => panic!("Expected Aws, got: {:?}", other),
        }
    }
}
