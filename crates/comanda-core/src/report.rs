use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TopProduct {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i64,
    pub revenue_cents: i64,
}

/// Sales over a period, counting completed orders only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SalesSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub order_count: i64,
    pub revenue_cents: i64,
    pub discount_cents: i64,
    pub points_issued: i64,
    pub top_products: Vec<TopProduct>,
}

/// Half-open UTC timestamp range `[from 00:00, to+1 00:00)` covering both dates.
pub fn day_range(from: NaiveDate, to: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    if to < from {
        return Err(AppError::ValidationError(format!(
            "Invalid range: {to} is before {from}"
        )));
    }
    let start = from.and_time(NaiveTime::MIN).and_utc();
    let end = to.and_time(NaiveTime::MIN).and_utc() + TimeDelta::days(1);
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_range_covers_whole_days() {
        let day = NaiveDate::from_ymd_opt(2026, 5, 10).unwrap();
        let (start, end) = day_range(day, day).unwrap();
        assert_eq!(end - start, TimeDelta::days(1));
        assert_eq!(start.date_naive(), day);
    }

    #[test]
    fn test_day_range_rejects_reversed() {
        let a = NaiveDate::from_ymd_opt(2026, 5, 10).unwrap();
        let b = NaiveDate::from_ymd_opt(2026, 5, 9).unwrap();
        assert!(day_range(a, b).is_err());
    }
}
