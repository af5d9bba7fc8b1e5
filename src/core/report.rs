//! Report generation business logic.
//!
//! Every function here is pure: it takes a slice of transactions and returns structured data
//! for the caller to format. Nothing fails; empty input gives empty lists and zero totals.
//! Period boundaries are computed in the time zone of the `now` passed in, so tests can pin
//! both the clock and the zone.

use crate::core::{cart::PaymentMethod, timestamp, transaction::Transaction};
use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::{collections::HashMap, ops::RangeInclusive};

/// Number of products in a revenue ranking unless the caller asks otherwise.
pub const DEFAULT_TOP_PRODUCTS: usize = 10;

/// Number of products in a quantity ranking unless the caller asks otherwise.
pub const DEFAULT_TOP_BY_QUANTITY: usize = 5;

/// Shown as the best seller when there are no sales.
pub const NO_BEST_SELLER: &str = "N/A";

/// Date range selector for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case", tag = "period")]
pub enum Period {
    /// Everything, including sales with an unknown timestamp
    #[default]
    All,
    /// From midnight today until now
    Today,
    /// The whole of yesterday
    Yesterday,
    /// From midnight seven days ago until now
    ThisWeek,
    /// From the first of the month until now
    ThisMonth,
    /// Whole days from `from` to `to`, both inclusive
    Custom {
        /// First day
        from: NaiveDate,
        /// Last day
        to: NaiveDate,
    },
}

impl Period {
    /// The instants this period covers, or `None` when it is unbounded.
    ///
    /// A custom range with `from` after `to` yields an empty window.
    pub fn window<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> Option<RangeInclusive<DateTime<Utc>>> {
        let tz = now.timezone();
        let today = now.date_naive();
        let now_utc = now.with_timezone(&Utc);
        let midnight = |date: NaiveDate| timestamp::start_of_day(&tz, date).with_timezone(&Utc);
        let start_today = midnight(today);

        match *self {
            Self::All => None,
            Self::Today => Some(start_today..=now_utc),
            Self::Yesterday => {
                let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
                Some(midnight(yesterday)..=start_today - Duration::nanoseconds(1))
            }
            Self::ThisWeek => {
                let week_ago = today.checked_sub_days(Days::new(7)).unwrap_or(today);
                Some(midnight(week_ago)..=now_utc)
            }
            Self::ThisMonth => {
                let first = today.with_day(1).unwrap_or(today);
                Some(midnight(first)..=now_utc)
            }
            Self::Custom { from, to } => {
                let end = to
                    .checked_add_days(Days::new(1))
                    .map_or(DateTime::<Utc>::MAX_UTC, |next| {
                        midnight(next) - Duration::milliseconds(1)
                    });
                Some(midnight(from)..=end)
            }
        }
    }
}

/// Revenue and units sold for one product name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSales {
    /// Product name as recorded on the line items
    pub name: String,
    /// Σ(unit price × quantity), before line discounts
    pub revenue: Decimal,
    /// Σ quantity
    pub units: u64,
}

/// Headline numbers for a set of transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesTotals {
    /// Σ grand total
    pub total_revenue: Decimal,
    /// Number of transactions
    pub transaction_count: usize,
    /// Revenue divided by count, zero when there are no transactions
    pub average_transaction: Decimal,
    /// Product with the highest revenue, or `"N/A"`
    pub best_seller: String,
}

/// Share of transactions paid with one method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentShare {
    /// Payment method
    pub method: PaymentMethod,
    /// Number of transactions
    pub count: usize,
    /// Share of all transactions, 0 to 100
    pub percentage: Decimal,
}

/// Everything the reports view shows for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesReport {
    /// Period the report covers
    pub period: Period,
    /// Headline numbers
    pub totals: SalesTotals,
    /// Products ranked by revenue
    pub top_products: Vec<ProductSales>,
    /// Products ranked by units sold
    pub top_by_quantity: Vec<ProductSales>,
    /// Transactions per payment method
    pub payment_breakdown: Vec<PaymentShare>,
}

/// Keeps the transactions that fall inside `period`, preserving order.
///
/// Transactions without a parsable timestamp only survive [`Period::All`].
#[must_use]
pub fn filter_by_period<Tz: TimeZone>(
    transactions: &[Transaction],
    period: &Period,
    now: &DateTime<Tz>,
) -> Vec<Transaction> {
    let Some(window) = period.window(now) else {
        return transactions.to_vec();
    };

    transactions
        .iter()
        .filter(|t| t.created_at.is_some_and(|at| window.contains(&at)))
        .cloned()
        .collect()
}

/// Groups line items by product name, sorted by revenue, highest first.
///
/// The sort is stable: products with equal revenue stay in the order they were first seen.
#[must_use]
pub fn aggregate_by_product(transactions: &[Transaction]) -> Vec<ProductSales> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut sales: Vec<ProductSales> = Vec::new();

    for item in transactions.iter().flat_map(|t| &t.items) {
        let slot = *index.entry(item.name.as_str()).or_insert_with(|| {
            sales.push(ProductSales {
                name: item.name.clone(),
                revenue: Decimal::ZERO,
                units: 0,
            });
            sales.len() - 1
        });

        let entry = &mut sales[slot];
        entry.revenue += item.gross();
        entry.units += u64::from(item.quantity);
    }

    sales.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    sales
}

/// The `limit` products with the most revenue.
#[must_use]
pub fn top_products(transactions: &[Transaction], limit: usize) -> Vec<ProductSales> {
    let mut sales = aggregate_by_product(transactions);
    sales.truncate(limit);
    sales
}

/// The `limit` products with the most units sold.
#[must_use]
pub fn rank_by_quantity(transactions: &[Transaction], limit: usize) -> Vec<ProductSales> {
    let mut sales = aggregate_by_product(transactions);
    sales.sort_by(|a, b| b.units.cmp(&a.units));
    sales.truncate(limit);
    sales
}

/// Revenue, count, average and best seller.
#[must_use]
pub fn totals(transactions: &[Transaction]) -> SalesTotals {
    let total_revenue: Decimal = transactions.iter().map(|t| t.grand_total).sum();
    let transaction_count = transactions.len();
    let average_transaction = if transaction_count == 0 {
        Decimal::ZERO
    } else {
        total_revenue / Decimal::from(transaction_count)
    };
    let best_seller = aggregate_by_product(transactions)
        .into_iter()
        .next()
        .map_or_else(|| NO_BEST_SELLER.to_string(), |p| p.name);

    SalesTotals {
        total_revenue,
        transaction_count,
        average_transaction,
        best_seller,
    }
}

/// Count and percentage per payment method, in cash, card, e-wallet order.
/// Methods nobody used are left out.
#[must_use]
pub fn breakdown_by_payment_method(transactions: &[Transaction]) -> Vec<PaymentShare> {
    let total = transactions.len();
    if total == 0 {
        return Vec::new();
    }

    PaymentMethod::ALL
        .into_iter()
        .filter_map(|method| {
            let count = transactions
                .iter()
                .filter(|t| t.payment_method == method)
                .count();
            (count > 0).then(|| PaymentShare {
                method,
                count,
                percentage: Decimal::from(count) * Decimal::ONE_HUNDRED / Decimal::from(total),
            })
        })
        .collect()
}

/// Case-insensitive search over id, date label, payment method, grand total and item names.
/// An empty term matches everything.
#[must_use]
pub fn search(transactions: &[Transaction], term: &str) -> Vec<Transaction> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return transactions.to_vec();
    }

    transactions
        .iter()
        .filter(|t| matches_term(t, &needle))
        .cloned()
        .collect()
}

fn matches_term(transaction: &Transaction, needle: &str) -> bool {
    let haystacks = [
        transaction.id.to_lowercase(),
        transaction.date_label(),
        transaction.payment_method.as_str().to_string(),
        transaction.payment_method.label().to_lowercase(),
        format!("{:.2}", transaction.grand_total),
    ];

    haystacks.iter().any(|h| h.contains(needle))
        || transaction
            .items
            .iter()
            .any(|item| item.name.to_lowercase().contains(needle))
}

/// Filters to `period` and computes every figure the reports view needs.
#[must_use]
pub fn summarize<Tz: TimeZone>(
    transactions: &[Transaction],
    period: &Period,
    now: &DateTime<Tz>,
) -> SalesReport {
    let filtered = filter_by_period(transactions, period, now);

    SalesReport {
        period: *period,
        totals: totals(&filtered),
        top_products: top_products(&filtered, DEFAULT_TOP_PRODUCTS),
        top_by_quantity: rank_by_quantity(&filtered, DEFAULT_TOP_BY_QUANTITY),
        payment_breakdown: breakdown_by_payment_method(&filtered),
    }
}

/// Formats an amount with its currency code, e.g. `"USD 209.00"`.
#[must_use]
pub fn format_amount(amount: Decimal, currency: &str) -> String {
    format!("{currency} {amount:.2}")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::sample_transaction;
    use chrono::FixedOffset;
    use rust_decimal_macros::dec;

    fn jakarta() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    /// Wall-clock time in Jakarta, as UTC.
    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        jakarta()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn now() -> DateTime<FixedOffset> {
        jakarta().with_ymd_and_hms(2024, 5, 17, 10, 0, 0).unwrap()
    }

    fn sale_at(at: DateTime<Utc>) -> Transaction {
        sample_transaction(at, PaymentMethod::Card, &[("Coffee", dec!(5), 1)])
    }

    fn ids(transactions: &[Transaction]) -> Vec<&str> {
        transactions.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_today_and_yesterday_boundaries() {
        let late_yesterday = sale_at(local(2024, 5, 16, 23, 59));
        let early_today = sale_at(local(2024, 5, 17, 0, 1));
        let two_days_ago = sale_at(local(2024, 5, 15, 12, 0));
        let txs = vec![late_yesterday.clone(), early_today.clone(), two_days_ago];

        let today = filter_by_period(&txs, &Period::Today, &now());
        assert_eq!(ids(&today), vec![early_today.id.as_str()]);

        let yesterday = filter_by_period(&txs, &Period::Yesterday, &now());
        assert_eq!(ids(&yesterday), vec![late_yesterday.id.as_str()]);
    }

    #[test]
    fn test_midnight_belongs_to_today() {
        let midnight = sale_at(local(2024, 5, 17, 0, 0));
        let txs = vec![midnight];
        assert_eq!(filter_by_period(&txs, &Period::Today, &now()).len(), 1);
        assert!(
            filter_by_period(&txs, &Period::Yesterday, &now()).is_empty()
        );
    }

    #[test]
    fn test_future_sales_are_outside_today() {
        let later = sale_at(local(2024, 5, 17, 18, 0));
        assert!(
            filter_by_period(&[later], &Period::Today, &now()).is_empty()
        );
    }

    #[test]
    fn test_week_and_month() {
        let seven_days_ago = sale_at(local(2024, 5, 10, 0, 0));
        let eight_days_ago = sale_at(local(2024, 5, 9, 23, 59));
        let last_month = sale_at(local(2024, 4, 30, 23, 59));
        let first_of_month = sale_at(local(2024, 5, 1, 0, 0));
        let txs = vec![
            seven_days_ago.clone(),
            eight_days_ago.clone(),
            last_month,
            first_of_month.clone(),
        ];

        let week = filter_by_period(&txs, &Period::ThisWeek, &now());
        assert_eq!(ids(&week), vec![seven_days_ago.id.as_str()]);

        let month = filter_by_period(&txs, &Period::ThisMonth, &now());
        assert_eq!(
            ids(&month),
            vec![
                seven_days_ago.id.as_str(),
                eight_days_ago.id.as_str(),
                first_of_month.id.as_str()
            ]
        );
    }

    #[test]
    fn test_custom_range_is_inclusive() {
        let start = sale_at(local(2024, 5, 1, 0, 0));
        let end = sale_at(local(2024, 5, 3, 23, 59));
        let after = sale_at(local(2024, 5, 4, 0, 0));
        let txs = vec![start.clone(), end.clone(), after];

        let period = Period::Custom {
            from: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
        };
        let filtered = filter_by_period(&txs, &period, &now());
        assert_eq!(ids(&filtered), vec![start.id.as_str(), end.id.as_str()]);

        let backwards = Period::Custom {
            from: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        };
        assert!(filter_by_period(&txs, &backwards, &now()).is_empty());
    }

    #[test]
    fn test_undated_sales_only_count_for_all() {
        let mut undated = sale_at(local(2024, 5, 17, 9, 0));
        undated.created_at = None;
        let dated = sale_at(local(2024, 5, 17, 9, 0));
        let txs = vec![undated, dated.clone()];

        let today = filter_by_period(&txs, &Period::Today, &now());
        assert_eq!(ids(&today), vec![dated.id.as_str()]);
        assert_eq!(filter_by_period(&txs, &Period::All, &now()).len(), 2);
        assert_eq!(
            summarize(&txs, &Period::All, &now()).totals.transaction_count,
            2
        );
    }

    #[test]
    fn test_aggregate_by_product() {
        let at = local(2024, 5, 17, 9, 0);
        let txs = vec![
            sample_transaction(
                at,
                PaymentMethod::Cash,
                &[("Coffee", dec!(5), 2), ("Cake", dec!(12), 1)],
            ),
            sample_transaction(
                at,
                PaymentMethod::Card,
                &[("Coffee", dec!(5), 3), ("Tea", dec!(4), 1)],
            ),
        ];

        let sales = aggregate_by_product(&txs);
        assert_eq!(
            sales,
            vec![
                ProductSales {
                    name: "Coffee".to_string(),
                    revenue: dec!(25),
                    units: 5,
                },
                ProductSales {
                    name: "Cake".to_string(),
                    revenue: dec!(12),
                    units: 1,
                },
                ProductSales {
                    name: "Tea".to_string(),
                    revenue: dec!(4),
                    units: 1,
                },
            ]
        );

        // Revenue ignores line discounts
        let mut discounted = txs[1].clone();
        discounted.items[0].discount = dec!(5);
        let sales = aggregate_by_product(&[discounted]);
        assert_eq!(sales[0].revenue, dec!(15));
    }

    #[test]
    fn test_top_products_limit_and_ties() {
        let at = local(2024, 5, 17, 9, 0);
        let items: Vec<(String, Decimal, u32)> = (0..12)
            .map(|i| (format!("Item {i:02}"), dec!(10), 1))
            .collect();
        let borrowed: Vec<(&str, Decimal, u32)> = items
            .iter()
            .map(|(n, p, q)| (n.as_str(), *p, *q))
            .collect();
        let txs = vec![sample_transaction(at, PaymentMethod::Card, &borrowed)];

        let top = top_products(&txs, DEFAULT_TOP_PRODUCTS);
        assert_eq!(top.len(), 10);
        // All tied: first-seen order survives the sort
        assert_eq!(top[0].name, "Item 00");
        assert_eq!(top[9].name, "Item 09");

        assert!(top_products(&[], 10).is_empty());
    }

    #[test]
    fn test_rank_by_quantity() {
        let at = local(2024, 5, 17, 9, 0);
        let txs = vec![sample_transaction(
            at,
            PaymentMethod::Card,
            &[("Watch", dec!(249), 1), ("Coffee", dec!(5), 6), ("Tea", dec!(4), 2)],
        )];

        let ranked = rank_by_quantity(&txs, 2);
        let names: Vec<&str> = ranked.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Coffee", "Tea"]);
    }

    #[test]
    fn test_totals() {
        let at = local(2024, 5, 17, 9, 0);
        let txs = vec![
            sample_transaction(at, PaymentMethod::Cash, &[("Watch", dec!(100), 1)]),
            sample_transaction(at, PaymentMethod::Card, &[("Coffee", dec!(10), 2)]),
        ];

        let t = totals(&txs);
        // Grand totals include 10% tax: 110 + 22
        assert_eq!(t.total_revenue, dec!(132));
        assert_eq!(t.transaction_count, 2);
        assert_eq!(t.average_transaction, dec!(66));
        assert_eq!(t.best_seller, "Watch");
    }

    #[test]
    fn test_totals_of_nothing() {
        let t = totals(&[]);
        assert_eq!(t.total_revenue, Decimal::ZERO);
        assert_eq!(t.transaction_count, 0);
        assert_eq!(t.average_transaction, Decimal::ZERO);
        assert_eq!(t.best_seller, NO_BEST_SELLER);
    }

    #[test]
    fn test_payment_breakdown() {
        let at = local(2024, 5, 17, 9, 0);
        let txs = vec![
            sample_transaction(at, PaymentMethod::EWallet, &[("A", dec!(1), 1)]),
            sample_transaction(at, PaymentMethod::Cash, &[("B", dec!(1), 1)]),
            sample_transaction(at, PaymentMethod::EWallet, &[("C", dec!(1), 1)]),
            sample_transaction(at, PaymentMethod::Cash, &[("D", dec!(1), 1)]),
        ];

        let breakdown = breakdown_by_payment_method(&txs);
        assert_eq!(
            breakdown,
            vec![
                PaymentShare {
                    method: PaymentMethod::Cash,
                    count: 2,
                    percentage: dec!(50),
                },
                PaymentShare {
                    method: PaymentMethod::EWallet,
                    count: 2,
                    percentage: dec!(50),
                },
            ]
        );

        let odd = &txs[..3];
        let shares: Decimal = breakdown_by_payment_method(odd)
            .iter()
            .map(|s| s.percentage)
            .sum();
        assert_eq!(shares.round_dp(6), dec!(100));

        assert!(breakdown_by_payment_method(&[]).is_empty());
    }

    #[test]
    fn test_search() {
        let at = local(2024, 5, 17, 9, 0);
        let mut coffee = sample_transaction(
            at,
            PaymentMethod::Cash,
            &[("Organic Coffee", dec!(5), 1)],
        );
        coffee.id = "TXN-1715911200000".to_string();
        let mat = sample_transaction(at, PaymentMethod::EWallet, &[("Yoga Mat", dec!(39.5), 1)]);
        let txs = vec![coffee.clone(), mat.clone()];

        assert_eq!(ids(&search(&txs, "coffee")), vec![coffee.id.as_str()]);
        assert_eq!(ids(&search(&txs, "txn-17159")), vec![coffee.id.as_str()]);
        assert_eq!(ids(&search(&txs, "E-WALLET")), vec![mat.id.as_str()]);
        // 39.5 × 1.1 = 43.45
        assert_eq!(ids(&search(&txs, "43.45")), vec![mat.id.as_str()]);
        assert_eq!(search(&txs, &coffee.date_label()).len(), 2);
        assert_eq!(search(&txs, "").len(), 2);
        assert!(search(&txs, "laptop").is_empty());
    }

    #[test]
    fn test_summarize_today() {
        let txs = vec![
            sample_transaction(
                local(2024, 5, 17, 8, 0),
                PaymentMethod::Cash,
                &[("Coffee", dec!(5), 4)],
            ),
            sample_transaction(
                local(2024, 5, 16, 8, 0),
                PaymentMethod::Card,
                &[("Watch", dec!(249), 1)],
            ),
        ];

        let report = summarize(&txs, &Period::Today, &now());
        assert_eq!(report.period, Period::Today);
        assert_eq!(report.totals.transaction_count, 1);
        assert_eq!(report.totals.total_revenue, dec!(22));
        assert_eq!(report.totals.best_seller, "Coffee");
        assert_eq!(report.top_products.len(), 1);
        assert_eq!(report.payment_breakdown.len(), 1);
        assert_eq!(report.payment_breakdown[0].method, PaymentMethod::Cash);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(209), "USD"), "USD 209.00");
        assert_eq!(format_amount(dec!(43.45), "IDR"), "IDR 43.45");
    }
}
