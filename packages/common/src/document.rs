use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::DocType;

/// Currency assumed when the exchange omits one.
pub const DEFAULT_CURRENCY: &str = "KZT";

/// Unit of measure assumed when a line omits one.
pub const DEFAULT_UNIT: &str = "PCE";

/// Normalized, type-agnostic representation of one upstream business document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalDocument {
    /// Primary upstream identity (the immutable document record).
    pub external_id: String,
    /// Secondary upstream identity (the conversation/flow), when exposed.
    pub flow_id: Option<String>,
    pub doc_type: DocType,
    pub number: String,
    pub date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub shipment_date: Option<NaiveDate>,
    /// Order this document refers to (responses, dispatch advices, invoices).
    pub order_number: String,
    pub delivery_place: String,
    pub supplier_id: String,
    pub buyer_id: String,
    pub supplier_name: String,
    pub buyer_name: String,
    pub currency: String,
    pub total_amount: Decimal,
    pub total_tax: Decimal,
    pub total_with_tax: Decimal,
    /// Lines in the order received. Never re-sorted.
    pub lines: Vec<LineItem>,
    /// Decoded upstream structure, kept for audit and reprocessing.
    pub raw_payload: serde_json::Value,
}

impl CanonicalDocument {
    /// A document carrying only its identity; every other field at its default.
    pub fn new(external_id: impl Into<String>, doc_type: DocType) -> Self {
        Self {
            external_id: external_id.into(),
            flow_id: None,
            doc_type,
            number: String::new(),
            date: None,
            delivery_date: None,
            shipment_date: None,
            order_number: String::new(),
            delivery_place: String::new(),
            supplier_id: String::new(),
            buyer_id: String::new(),
            supplier_name: String::new(),
            buyer_name: String::new(),
            currency: DEFAULT_CURRENCY.to_string(),
            total_amount: Decimal::ZERO,
            total_tax: Decimal::ZERO,
            total_with_tax: Decimal::ZERO,
            lines: Vec::new(),
            raw_payload: serde_json::Value::Null,
        }
    }
}

/// One ordered product line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// 1-based position in the received order.
    pub line_number: u32,
    pub product_code: String,
    pub product_name: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub tax_rate: f64,
    pub line_amount: f64,
    pub line_amount_with_tax: f64,
    pub unit: String,
}

impl LineItem {
    pub fn new(line_number: u32) -> Self {
        Self {
            line_number,
            product_code: String::new(),
            product_name: String::new(),
            quantity: 0.0,
            unit_price: 0.0,
            tax_rate: 0.0,
            line_amount: 0.0,
            line_amount_with_tax: 0.0,
            unit: DEFAULT_UNIT.to_string(),
        }
    }
}
