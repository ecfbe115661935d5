use super::money::Amount;
use super::order::Order;
use crate::error::InputError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Gross, platform fee and merchant net for one calendar month (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`
    pub month: String,
    pub gross: Amount,
    pub fee: Amount,
    pub net: Amount,
}

/// Sums orders created at or after `since`, grouped by month, oldest first.
///
/// Orders count regardless of status, the way the admin dashboard shows them.
pub fn monthly_revenue(
    orders: &[Order],
    since: DateTime<Utc>,
) -> Result<Vec<MonthlyRevenue>, InputError> {
    let mut months: BTreeMap<String, (Amount, Amount)> = BTreeMap::new();
    for order in orders.iter().filter(|o| o.created_at >= since) {
        let (gross, fee) = months
            .entry(order.created_at.format("%Y-%m").to_string())
            .or_default();
        *gross = gross.checked_add(order.grand_total)?;
        *fee = fee.checked_add(order.fee_amount)?;
    }

    Ok(months
        .into_iter()
        .map(|(month, (gross, fee))| MonthlyRevenue {
            month,
            gross,
            fee,
            // fee is a share of gross, never larger
            net: Amount::new(gross.value().saturating_sub(fee.value())),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cart::CheckoutTotals;
    use crate::domain::money::FeePercent;
    use crate::domain::order::{NewOrder, OrderId, UserId};
    use chrono::TimeZone;

    fn order(id: u64, grand: u64, fee: u64, at: DateTime<Utc>) -> Order {
        Order::create(
            OrderId(id),
            NewOrder {
                user_id: UserId(1),
                totals: CheckoutTotals {
                    subtotal: Amount::new(grand - fee),
                    fee_percent: FeePercent::ZERO,
                    fee_amount: Amount::new(fee),
                    grand_total: Amount::new(grand),
                },
                created_at: at,
            },
        )
    }

    #[test]
    fn test_groups_by_month() {
        let jan = Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();
        let jan_late = Utc.with_ymd_and_hms(2026, 1, 31, 23, 59, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let old = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let orders = vec![
            order(1, 10050, 50, jan),
            order(2, 20100, 100, jan_late),
            order(3, 32663, 163, feb),
            order(4, 999, 9, old),
        ];

        let since = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let report = monthly_revenue(&orders, since).unwrap();

        assert_eq!(
            report,
            vec![
                MonthlyRevenue {
                    month: "2026-01".into(),
                    gross: Amount::new(30150),
                    fee: Amount::new(150),
                    net: Amount::new(30000),
                },
                MonthlyRevenue {
                    month: "2026-02".into(),
                    gross: Amount::new(32663),
                    fee: Amount::new(163),
                    net: Amount::new(32500),
                },
            ]
        );
    }

    #[test]
    fn test_empty_report() {
        assert!(monthly_revenue(&[], Utc::now()).unwrap().is_empty());
    }
}
