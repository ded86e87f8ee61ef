use crate::sources::commerce::OrderRecord;
use serde::{Deserialize, Serialize};

/// The flat set of financial counters and rates computed for one scope
/// (campaign, adset, or ad). Every level aggregates its own filtered raw
/// records; nothing is re-derived from child scopes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommerceMetrics {
    pub partials: u64,
    pub sales: u64,
    pub declines: u64,
    pub sales_total: f64,
    pub upsells: u64,
    pub upsell_total: f64,
    pub refund_amount: f64,
    pub shipping: f64,
    pub net_revenue: f64,
    pub avg_ticket: f64,
    pub conversion_rate: f64,
    pub decline_rate: f64,
    pub sales_rate: f64,
}

/// Reduces completed-sale records plus pre-computed decline/partial counts
/// into `CommerceMetrics`. Declines and partials arrive as counts because the
/// provider exposes them through separate query filters, not the sale
/// record set.
pub fn aggregate(sale_records: &[OrderRecord], declines: u64, partials: u64) -> CommerceMetrics {
    let mut sales_total = 0.0;
    let mut shipping = 0.0;
    let mut refund_amount = 0.0;
    let mut upsells = 0u64;
    let mut upsell_total = 0.0;

    for order in sale_records {
        sales_total += order.total_amount + order.base_shipping + order.sales_tax;
        shipping += order.base_shipping;
        refund_amount += order.refund_amount;

        for item in &order.items {
            if item.is_upsell() {
                upsells += 1;
                upsell_total += item.price;
            }
        }
    }

    let sales = sale_records.len() as u64;
    let funnel = partials + sales + declines;
    let conversion_rate = if funnel > 0 {
        sales as f64 / funnel as f64 * 100.0
    } else {
        0.0
    };
    let decline_rate = if sales + declines > 0 {
        declines as f64 / (sales + declines) as f64 * 100.0
    } else {
        0.0
    };
    let net_revenue = sales_total + upsell_total - refund_amount;
    let avg_ticket = if sales > 0 {
        sales_total / sales as f64
    } else {
        0.0
    };

    CommerceMetrics {
        partials,
        sales,
        declines,
        sales_total,
        upsells,
        upsell_total,
        refund_amount,
        shipping,
        net_revenue,
        avg_ticket,
        conversion_rate,
        decline_rate,
        // Duplicate of conversionRate, kept as its own wire field for the
        // dashboard's legacy column.
        sales_rate: conversion_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::commerce::LineItem;

    fn order(total: f64, base_shipping: f64, sales_tax: f64) -> OrderRecord {
        OrderRecord {
            total_amount: total,
            base_shipping,
            sales_tax,
            ..OrderRecord::default()
        }
    }

    fn upsell_item(price: f64) -> LineItem {
        LineItem {
            name: Some("Pro Upgrade".to_string()),
            product_type: Some("UPSALE".to_string()),
            price,
        }
    }

    #[test]
    fn test_empty_input_is_all_zero() {
        let metrics = aggregate(&[], 0, 0);
        assert_eq!(metrics, CommerceMetrics::default());
        assert_eq!(
            metrics.net_revenue,
            metrics.sales_total + metrics.upsell_total - metrics.refund_amount
        );
    }

    #[test]
    fn test_sales_total_includes_shipping_and_tax() {
        let orders = vec![order(100.0, 5.0, 8.25), order(50.0, 0.0, 0.0)];
        let metrics = aggregate(&orders, 0, 0);

        assert_eq!(metrics.sales, 2);
        assert!((metrics.sales_total - 163.25).abs() < 1e-9);
        assert!((metrics.shipping - 5.0).abs() < 1e-9);
        assert!((metrics.avg_ticket - 81.625).abs() < 1e-9);
    }

    #[test]
    fn test_upsell_items_counted_separately() {
        let mut first = order(100.0, 0.0, 0.0);
        first.items = vec![
            LineItem {
                name: Some("Widget".to_string()),
                product_type: Some("OFFER".to_string()),
                price: 100.0,
            },
            upsell_item(20.0),
        ];
        let mut second = order(60.0, 0.0, 0.0);
        second.items = vec![upsell_item(15.0)];

        let metrics = aggregate(&[first, second], 0, 0);
        assert_eq!(metrics.upsells, 2);
        assert!((metrics.upsell_total - 35.0).abs() < 1e-9);
        assert!((metrics.net_revenue - 195.0).abs() < 1e-9);
    }

    #[test]
    fn test_rate_formulas() {
        let orders = vec![order(10.0, 0.0, 0.0); 2];
        let metrics = aggregate(&orders, 2, 6);

        // 2 sales over a funnel of 6 partials + 2 sales + 2 declines.
        assert!((metrics.conversion_rate - 20.0).abs() < 1e-9);
        assert_eq!(metrics.sales_rate, metrics.conversion_rate);
        // 2 declines over 2 sales + 2 declines.
        assert!((metrics.decline_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_denominators_yield_zero_rates() {
        let metrics = aggregate(&[], 0, 5);
        assert_eq!(metrics.conversion_rate, 0.0);
        assert_eq!(metrics.decline_rate, 0.0);
        assert_eq!(metrics.avg_ticket, 0.0);
    }

    #[test]
    fn test_net_revenue_identity_with_refunds() {
        let mut refunded = order(80.0, 0.0, 0.0);
        refunded.refund_amount = 30.0;
        let metrics = aggregate(&[refunded], 1, 3);

        assert!((metrics.refund_amount - 30.0).abs() < 1e-9);
        assert!(
            (metrics.net_revenue - (metrics.sales_total + metrics.upsell_total - 30.0)).abs()
                < 1e-9
        );
    }
}
