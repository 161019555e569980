//! Sales statistics over stored invoices.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::Invoice;

pub const TOP_CUSTOMERS: usize = 5;
pub const STATS_DAYS: usize = 7;
pub const GRAPH_DAYS: usize = 30;
const GRAPH_WIDTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerTotal {
    pub customer_name: String,
    pub total_spent: Decimal,
    pub invoice_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub total: Decimal,
    pub invoice_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesStats {
    pub total_invoices: u64,
    pub total_revenue: Decimal,
    pub top_customers: Vec<CustomerTotal>,
    /// Most recent day first.
    pub daily_sales: Vec<DailySales>,
}

pub fn summarize(invoices: &[Invoice], top_n: usize, days: usize) -> SalesStats {
    let total_revenue: Decimal = invoices.iter().map(|i| i.total).sum();

    SalesStats {
        total_invoices: invoices.len() as u64,
        total_revenue: total_revenue.normalize(),
        top_customers: top_customers(invoices, top_n),
        daily_sales: daily_sales(invoices, days),
    }
}

/// Customers by total spent, highest first. Ties go alphabetically.
pub fn top_customers(invoices: &[Invoice], limit: usize) -> Vec<CustomerTotal> {
    let mut by_customer: HashMap<&str, (Decimal, u64)> = HashMap::new();
    for invoice in invoices {
        let entry = by_customer
            .entry(invoice.customer_name.as_str())
            .or_insert((Decimal::ZERO, 0));
        entry.0 += invoice.total;
        entry.1 += 1;
    }

    let mut customers: Vec<CustomerTotal> = by_customer
        .into_iter()
        .map(|(name, (spent, count))| CustomerTotal {
            customer_name: name.to_string(),
            total_spent: spent.normalize(),
            invoice_count: count,
        })
        .collect();
    customers.sort_by(|a, b| {
        b.total_spent
            .cmp(&a.total_spent)
            .then_with(|| a.customer_name.cmp(&b.customer_name))
    });
    customers.truncate(limit);
    customers
}

/// Per-day totals for the `limit` most recent days with sales, newest first.
/// Days are calendar dates of `order_date` in UTC.
pub fn daily_sales(invoices: &[Invoice], limit: usize) -> Vec<DailySales> {
    let mut by_day: BTreeMap<NaiveDate, (Decimal, u64)> = BTreeMap::new();
    for invoice in invoices {
        let entry = by_day
            .entry(invoice.order_date.date_naive())
            .or_insert((Decimal::ZERO, 0));
        entry.0 += invoice.total;
        entry.1 += 1;
    }

    by_day
        .into_iter()
        .rev()
        .take(limit)
        .map(|(date, (total, count))| DailySales {
            date,
            total: total.normalize(),
            invoice_count: count,
        })
        .collect()
}

/// Horizontal text bar chart, oldest day at the top. Bars scale to the
/// largest day.
pub fn render_sales_graph(days: &[DailySales], currency: &str) -> String {
    let mut out = String::new();
    if days.is_empty() {
        out.push_str("No sales data available for graph.\n");
        return out;
    }

    let max = days.iter().map(|d| d.total).max().unwrap_or(Decimal::ZERO);
    let _ = writeln!(out, "Daily Sales Report");

    for day in days.iter().rev() {
        let width = if max > Decimal::ZERO {
            let scaled = day.total * Decimal::from(GRAPH_WIDTH as u64) / max;
            scaled
                .round()
                .to_usize()
                .unwrap_or(0)
                .max(usize::from(day.total > Decimal::ZERO))
        } else {
            0
        };
        let _ = writeln!(
            out,
            "{} | {:<width$} {} {:.2}",
            day.date.format("%Y-%m-%d"),
            "#".repeat(width),
            currency,
            day.total.round_dp(2),
            width = GRAPH_WIDTH
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn invoice(id: i64, customer: &str, total: i64, day: u32) -> Invoice {
        let when = Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap();
        Invoice {
            id: None,
            invoice_id: id,
            customer_name: customer.to_string(),
            customer_address: String::new(),
            customer_number: String::new(),
            customer_email: None,
            items: vec![],
            subtotal: Decimal::from(total),
            tax: Decimal::ZERO,
            discount: Decimal::ZERO,
            total: Decimal::from(total),
            tax_rate: Decimal::ZERO,
            discount_rate: Decimal::ZERO,
            order_date: when,
            created_at: when,
        }
    }

    #[test]
    fn empty_store_summarizes_to_zero() {
        let stats = summarize(&[], TOP_CUSTOMERS, STATS_DAYS);
        assert_eq!(stats.total_invoices, 0);
        assert_eq!(stats.total_revenue, Decimal::ZERO);
        assert!(stats.top_customers.is_empty());
        assert!(stats.daily_sales.is_empty());
    }

    #[test]
    fn top_customers_rank_by_spend_with_counts() {
        let invoices = vec![
            invoice(1, "Ravi", 100, 1),
            invoice(2, "Meena", 300, 1),
            invoice(3, "Ravi", 250, 2),
            invoice(4, "Arjun", 350, 3),
        ];
        let top = top_customers(&invoices, 2);

        assert_eq!(top.len(), 2);
        // Ravi 350 and Arjun 350 tie; alphabetical order breaks it
        assert_eq!(top[0].customer_name, "Arjun");
        assert_eq!(top[1].customer_name, "Ravi");
        assert_eq!(top[1].invoice_count, 2);
        assert_eq!(top[1].total_spent, Decimal::from(350));
    }

    #[test]
    fn daily_sales_keep_most_recent_days_newest_first() {
        let invoices: Vec<Invoice> = (1..=9)
            .map(|day| invoice(day as i64, "C", 10 * day as i64, day))
            .chain(std::iter::once(invoice(10, "C", 5, 9)))
            .collect();

        let days = daily_sales(&invoices, STATS_DAYS);
        assert_eq!(days.len(), 7);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 5, 9).unwrap());
        assert_eq!(days[0].total, Decimal::from(95));
        assert_eq!(days[0].invoice_count, 2);
        assert_eq!(days[6].date, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
    }

    #[test]
    fn summary_totals_revenue() {
        let invoices = vec![invoice(1, "A", 210, 1), invoice(2, "B", 95, 2)];
        let stats = summarize(&invoices, TOP_CUSTOMERS, STATS_DAYS);
        assert_eq!(stats.total_invoices, 2);
        assert_eq!(stats.total_revenue, Decimal::from(305));
    }

    #[test]
    fn graph_lists_oldest_first_and_scales_bars() {
        let invoices = vec![invoice(1, "A", 100, 1), invoice(2, "B", 50, 2)];
        let graph = render_sales_graph(&daily_sales(&invoices, GRAPH_DAYS), "Rs");
        let lines: Vec<&str> = graph.lines().collect();

        assert_eq!(lines[0], "Daily Sales Report");
        assert!(lines[1].starts_with("2024-05-01 | "));
        assert!(lines[2].starts_with("2024-05-02 | "));
        assert_eq!(lines[1].matches('#').count(), 40);
        assert_eq!(lines[2].matches('#').count(), 20);
        assert!(lines[1].ends_with("Rs 100.00"));
    }

    #[test]
    fn graph_without_data_says_so() {
        assert_eq!(
            render_sales_graph(&[], "Rs"),
            "No sales data available for graph.\n"
        );
    }
}
