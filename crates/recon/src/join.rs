use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use procledger_core::Value;

use crate::model::{DeliveryLine, LineSource, OrderLine};

/// Delivery side of one joined row.
#[derive(Debug, Clone)]
pub struct JoinedRow {
    pub source: LineSource,
    pub delivery_id: Value,
    pub registration_date: Option<NaiveDate>,
    pub received_quantity: f64,
    pub received_amount: f64,
}

impl JoinedRow {
    fn unmatched(source: LineSource) -> Self {
        Self {
            source,
            delivery_id: Value::Null,
            registration_date: None,
            received_quantity: 0.0,
            received_amount: 0.0,
        }
    }

    fn is_zero(&self) -> bool {
        self.received_quantity == 0.0 && self.received_amount == 0.0
    }
}

/// All rows produced by one order row.
#[derive(Debug, Clone)]
pub struct OrderGroup<'a> {
    pub order_index: usize,
    pub order: &'a OrderLine,
    pub rows: Vec<JoinedRow>,
}

impl OrderGroup<'_> {
    pub fn total_received_quantity(&self) -> f64 {
        self.rows.iter().map(|r| r.received_quantity).sum()
    }

    pub fn total_received_amount(&self) -> f64 {
        self.rows.iter().map(|r| r.received_amount).sum()
    }

    /// Append the pending-balance row when the order still has an open
    /// amount above `epsilon` and no zero row already stands for it.
    /// Returns whether a row was added.
    pub fn synthesize_pending(&mut self, epsilon: f64) -> bool {
        let amount = self.order.amount_before_tax.unwrap_or(0.0);
        let open = amount - self.total_received_amount();
        if open > epsilon && !self.rows.iter().any(JoinedRow::is_zero) {
            self.rows.push(JoinedRow::unmatched(LineSource::Synthetic));
            true
        } else {
            false
        }
    }

    /// Stable sort by registration date, undated rows last.
    pub fn sort_by_registration(&mut self) {
        self.rows
            .sort_by_key(|r| (r.registration_date.is_none(), r.registration_date));
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinStats {
    pub matched_deliveries: usize,
    pub orphan_deliveries: usize,
    pub orphan_received_quantity: f64,
    pub duplicate_order_keys: usize,
}

/// Left join orders to deliveries on canonical order key, one group per
/// order row. Multiplicity is preserved; an order without deliveries gets
/// one unmatched row.
pub fn left_join<'a>(
    orders: &'a [OrderLine],
    deliveries: &[DeliveryLine],
) -> (Vec<OrderGroup<'a>>, JoinStats) {
    let mut stats = JoinStats::default();

    let mut by_key: HashMap<&str, Vec<&DeliveryLine>> = HashMap::new();
    for delivery in deliveries {
        if let Some(key) = delivery.order_key.as_deref() {
            by_key.entry(key).or_default().push(delivery);
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut groups = Vec::with_capacity(orders.len());
    for (order_index, order) in orders.iter().enumerate() {
        let matches = order
            .order_key
            .as_deref()
            .and_then(|k| by_key.get(k))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        if let Some(key) = order.order_key.as_deref() {
            if !seen.insert(key) {
                stats.duplicate_order_keys += 1;
                log::warn!("order '{key}' appears more than once; its deliveries join every copy");
            }
        }

        let rows = if matches.is_empty() {
            vec![JoinedRow::unmatched(LineSource::Unmatched)]
        } else {
            stats.matched_deliveries += matches.len();
            matches
                .iter()
                .map(|d| JoinedRow {
                    source: LineSource::Delivery,
                    delivery_id: d.delivery_id.clone(),
                    registration_date: d.registration_date,
                    received_quantity: d.received_quantity,
                    received_amount: d.received_amount,
                })
                .collect()
        };
        groups.push(OrderGroup { order_index, order, rows });
    }

    for delivery in deliveries {
        let joined = delivery
            .order_key
            .as_deref()
            .is_some_and(|k| seen.contains(k));
        if !joined {
            stats.orphan_deliveries += 1;
            stats.orphan_received_quantity += delivery.received_quantity;
        }
    }
    if stats.orphan_deliveries > 0 {
        log::debug!(
            "{} delivery row(s) reference no known order and were left out",
            stats.orphan_deliveries
        );
    }

    (groups, stats)
}
