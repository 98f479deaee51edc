//! C1: UsageAggregateStore. Read-only adapter over the columnar analytics
//! store's hourly/daily `billable_usage_*` tables. Modeled here as ordinary
//! Postgres tables per SPEC_FULL.md's ambient-persistence note: the span
//! ingestion pipeline (external, out of scope) is the only writer, so every
//! query here is a plain `SELECT`.

use chrono::{DateTime, Utc};
use shared::{BillingResult, UsageBucket, UsageSummary};
use sqlx::PgExecutor;

/// Windows longer than this prefer the daily aggregate table over hourly, per
/// §4.4 of the design: a week of hourly buckets is already 168 rows per
/// project, daily buckets keep wide scans cheap.
pub const DAILY_PREFERENCE_THRESHOLD_DAYS: i64 = 7;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Granularity {
    Hourly,
    Daily,
}

impl Granularity {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hourly" => Some(Granularity::Hourly),
            "daily" => Some(Granularity::Daily),
            _ => None,
        }
    }

    pub fn for_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if (end - start).num_days() > DAILY_PREFERENCE_THRESHOLD_DAYS {
            Granularity::Daily
        } else {
            Granularity::Hourly
        }
    }
}

#[derive(Clone)]
pub struct UsageAggregateStore;

impl UsageAggregateStore {
    pub fn new() -> Self {
        Self
    }

    /// `(total_spans, total_bytes, total_scores)` for `org_id` over
    /// `[start, end)`, optionally narrowed to one project.
    pub async fn summarize(
        &self,
        exec: impl PgExecutor<'_>,
        org_id: &str,
        project_id: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BillingResult<UsageSummary> {
        let row: (Option<i64>, Option<i64>, Option<i64>) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(span_count), 0),
                COALESCE(SUM(bytes_processed), 0),
                COALESCE(SUM(score_count), 0)
            FROM billable_usage_hourly
            WHERE organization_id = $1
              AND bucket_hour >= $2 AND bucket_hour < $3
              AND ($4::text IS NULL OR project_id = $4)
            "#,
        )
        .bind(org_id)
        .bind(start)
        .bind(end)
        .bind(project_id)
        .fetch_one(exec)
        .await?;

        Ok(UsageSummary {
            spans: row.0.unwrap_or(0),
            bytes: row.1.unwrap_or(0),
            scores: row.2.unwrap_or(0),
        })
    }

    pub async fn time_series(
        &self,
        exec: impl PgExecutor<'_>,
        org_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
    ) -> BillingResult<Vec<UsageBucket>> {
        let rows = match granularity {
            Granularity::Hourly => {
                sqlx::query_as::<_, UsageBucket>(
                    r#"
                    SELECT organization_id AS org_id, NULLIF(project_id, '') AS project_id,
                           bucket_hour AS bucket_time, span_count, bytes_processed, score_count, ai_provider_cost
                    FROM billable_usage_hourly
                    WHERE organization_id = $1 AND bucket_hour >= $2 AND bucket_hour < $3
                    ORDER BY bucket_hour ASC
                    "#,
                )
                .bind(org_id)
                .bind(start)
                .bind(end)
                .fetch_all(exec)
                .await?
            }
            Granularity::Daily => {
                sqlx::query_as::<_, UsageBucket>(
                    r#"
                    SELECT organization_id AS org_id, NULLIF(project_id, '') AS project_id,
                           bucket_date::timestamptz AS bucket_time, span_count, bytes_processed, score_count, ai_provider_cost
                    FROM billable_usage_daily
                    WHERE organization_id = $1 AND bucket_date >= $2 AND bucket_date < $3
                    ORDER BY bucket_date ASC
                    "#,
                )
                .bind(org_id)
                .bind(start)
                .bind(end)
                .fetch_all(exec)
                .await?
            }
        };
        Ok(rows)
    }

    /// Grouped by project over the window, ordered descending by span count.
    /// Prefers the daily table for windows longer than
    /// [`DAILY_PREFERENCE_THRESHOLD_DAYS`].
    pub async fn by_project(
        &self,
        exec: impl PgExecutor<'_>,
        org_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BillingResult<Vec<UsageBucket>> {
        let rows = if Granularity::for_window(start, end) == Granularity::Daily {
            sqlx::query_as::<_, UsageBucket>(
                r#"
                SELECT organization_id AS org_id, NULLIF(project_id, '') AS project_id,
                       MIN(bucket_date)::timestamptz AS bucket_time,
                       SUM(span_count) AS span_count, SUM(bytes_processed) AS bytes_processed,
                       SUM(score_count) AS score_count, SUM(ai_provider_cost) AS ai_provider_cost
                FROM billable_usage_daily
                WHERE organization_id = $1 AND bucket_date >= $2 AND bucket_date < $3
                GROUP BY organization_id, project_id
                ORDER BY SUM(span_count) DESC
                "#,
            )
            .bind(org_id)
            .bind(start)
            .bind(end)
            .fetch_all(exec)
            .await?
        } else {
            sqlx::query_as::<_, UsageBucket>(
                r#"
                SELECT organization_id AS org_id, NULLIF(project_id, '') AS project_id,
                       MIN(bucket_hour) AS bucket_time,
                       SUM(span_count) AS span_count, SUM(bytes_processed) AS bytes_processed,
                       SUM(score_count) AS score_count, SUM(ai_provider_cost) AS ai_provider_cost
                FROM billable_usage_hourly
                WHERE organization_id = $1 AND bucket_hour >= $2 AND bucket_hour < $3
                GROUP BY organization_id, project_id
                ORDER BY SUM(span_count) DESC
                "#,
            )
            .bind(org_id)
            .bind(start)
            .bind(end)
            .fetch_all(exec)
            .await?
        };
        Ok(rows)
    }
}

impl Default for UsageAggregateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn granularity_parses_known_values_only() {
        assert_eq!(Granularity::parse("hourly"), Some(Granularity::Hourly));
        assert_eq!(Granularity::parse("daily"), Some(Granularity::Daily));
        assert_eq!(Granularity::parse("weekly"), None);
    }

    #[test]
    fn windows_over_seven_days_prefer_daily() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let short_end = start + chrono::Duration::days(3);
        let long_end = start + chrono::Duration::days(10);
        assert_eq!(Granularity::for_window(start, short_end), Granularity::Hourly);
        assert_eq!(Granularity::for_window(start, long_end), Granularity::Daily);
    }
}
