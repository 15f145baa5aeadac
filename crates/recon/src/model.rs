use chrono::NaiveDate;
use procledger_core::{Table, Value};
use serde::Serialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One purchase-order line, typed. Unparseable or absent fields are `None`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub contract_id: Value,
    pub order_id: Value,
    /// Canonical join key derived from `order_id`; `None` joins nothing.
    #[serde(skip)]
    pub order_key: Option<String>,
    pub article_code: Value,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub requested_quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub amount_before_tax: Option<f64>,
    pub status: Option<String>,
    pub cycle_ts: Value,
}

/// One receipt recorded against an order. Quantities are null-filled to 0.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryLine {
    pub delivery_id: Value,
    #[serde(skip)]
    pub order_key: Option<String>,
    pub registration_date: Option<NaiveDate>,
    pub received_quantity: f64,
    pub received_amount: f64,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSource {
    /// Joined to a real delivery.
    Delivery,
    /// Order with no delivery at all; delivery fields null.
    Unmatched,
    /// Fabricated row carrying the undelivered remainder.
    Synthetic,
}

impl LineSource {
    pub fn is_pending(self) -> bool {
        matches!(self, LineSource::Unmatched | LineSource::Synthetic)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerLine {
    pub order: OrderLine,
    /// Row number of the order in the input table.
    pub order_index: usize,
    pub source: LineSource,
    pub delivery_id: Value,
    pub delivery_key: String,
    pub registration_date: Option<NaiveDate>,
    pub received_quantity: f64,
    pub received_amount: f64,
    pub pending_quantity: f64,
    pub pending_amount: f64,
    pub days_diff: Option<i64>,
    pub late_days: i64,
    pub penalty_rate: f64,
    pub sanctionable_quantity: f64,
    pub sanction_amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub orders: usize,
    pub lines: usize,
    pub matched_deliveries: usize,
    pub orphan_deliveries: usize,
    pub synthetic_lines: usize,
    pub late_lines: usize,
    pub total_sanction: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerMeta {
    pub today: NaiveDate,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Ledger {
    pub meta: LedgerMeta,
    pub summary: LedgerSummary,
    pub lines: Vec<LedgerLine>,
}

/// Output column order. Order fields, then delivery fields, then derived.
pub const LEDGER_COLUMNS: &[&str] = &[
    "contract_id",
    "order_id",
    "article_code",
    "issue_date",
    "due_date",
    "requested_quantity",
    "unit_price",
    "amount_before_tax",
    "status",
    "cycle_ts",
    "delivery_id",
    "delivery_key",
    "registration_date",
    "received_quantity",
    "received_amount",
    "is_pending",
    "pending_quantity",
    "pending_amount",
    "days_diff",
    "late_days",
    "penalty_rate",
    "sanctionable_quantity",
    "sanction_amount",
];

/// `delivery_key` of the pending row of an order.
pub const PENDING_DELIVERY_KEY: &str = "pending";

impl Ledger {
    /// Flatten into a table with [`LEDGER_COLUMNS`] as header.
    pub fn to_table(&self) -> Result<Table, ReconError> {
        let rows: Vec<Vec<Value>> = self.lines.iter().map(LedgerLine::to_row).collect();
        Ok(Table::from_rows(LEDGER_COLUMNS.iter().copied(), rows)?)
    }

    /// Lines belonging to the order with canonical key `order_key`.
    pub fn lines_for<'a>(&'a self, order_key: &'a str) -> impl Iterator<Item = &'a LedgerLine> + 'a {
        self.lines
            .iter()
            .filter(move |l| l.order.order_key.as_deref() == Some(order_key))
    }
}

impl LedgerLine {
    fn to_row(&self) -> Vec<Value> {
        let o = &self.order;
        vec![
            o.contract_id.clone(),
            o.order_id.clone(),
            o.article_code.clone(),
            o.issue_date.into(),
            o.due_date.into(),
            o.requested_quantity.into(),
            o.unit_price.into(),
            o.amount_before_tax.into(),
            o.status.clone().into(),
            o.cycle_ts.clone(),
            self.delivery_id.clone(),
            Value::text(self.delivery_key.clone()),
            self.registration_date.into(),
            Value::Decimal(self.received_quantity),
            Value::Decimal(self.received_amount),
            Value::Bool(self.source.is_pending()),
            Value::Decimal(self.pending_quantity),
            Value::Decimal(self.pending_amount),
            self.days_diff.into(),
            Value::Int(self.late_days),
            Value::Decimal(self.penalty_rate),
            Value::Decimal(self.sanctionable_quantity),
            Value::Decimal(self.sanction_amount),
        ]
    }
}
