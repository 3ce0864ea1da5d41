//! Operator templates with a closed set of `{{placeholder}}` slots.
//!
//! A template has a document body and a line template; the line template is
//! rendered once per line and the results, joined with `\n`, fill the
//! `{{positions}}` slot. Names outside the enumerated set are left in the
//! output untouched.

use common::dates::format_date;
use common::{CanonicalDocument, LineItem};

use crate::XML_CONTENT_TYPE;
use crate::error::{CodecError, Result};
use crate::xml::escape;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireTemplate {
    pub body: String,
    pub line: String,
    pub content_type: String,
}

impl WireTemplate {
    pub fn new(body: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            line: line.into(),
            content_type: XML_CONTENT_TYPE.to_string(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Whether substituted values must be XML-escaped.
    pub fn is_xml(&self) -> bool {
        self.content_type.to_ascii_lowercase().contains("xml")
    }
}

/// Document-level slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocSlot {
    DocType,
    ExternalId,
    Number,
    Date,
    DeliveryDate,
    ShipmentDate,
    OrderNumber,
    DeliveryPlace,
    SupplierGln,
    SupplierName,
    BuyerGln,
    BuyerName,
    Currency,
    TotalAmount,
    TotalVat,
    TotalWithVat,
    Positions,
    PositionsJson,
    RawJson,
}

impl DocSlot {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "doc_type" => Self::DocType,
            "external_id" => Self::ExternalId,
            "number" => Self::Number,
            "date" => Self::Date,
            "delivery_date" => Self::DeliveryDate,
            "shipment_date" => Self::ShipmentDate,
            "order_number" => Self::OrderNumber,
            "delivery_place" => Self::DeliveryPlace,
            "supplier_gln" => Self::SupplierGln,
            "supplier_name" => Self::SupplierName,
            "buyer_gln" => Self::BuyerGln,
            "buyer_name" => Self::BuyerName,
            "currency" => Self::Currency,
            "total_amount" => Self::TotalAmount,
            "total_vat" => Self::TotalVat,
            "total_with_vat" => Self::TotalWithVat,
            "positions" => Self::Positions,
            "positions_json" => Self::PositionsJson,
            "raw_json" => Self::RawJson,
            _ => return None,
        })
    }
}

/// Line-level slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineSlot {
    Line,
    Ean,
    ItemCode,
    ItemName,
    Quantity,
    UnitPrice,
    Vat,
    Amount,
    AmountWithVat,
    Unit,
}

impl LineSlot {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "line" => Self::Line,
            "ean" => Self::Ean,
            "item_code" => Self::ItemCode,
            "item_name" => Self::ItemName,
            "quantity" => Self::Quantity,
            "unit_price" => Self::UnitPrice,
            "vat" => Self::Vat,
            "amount" => Self::Amount,
            "amount_with_vat" => Self::AmountWithVat,
            "unit" => Self::Unit,
            _ => return None,
        })
    }

    fn value(self, line: &LineItem) -> String {
        match self {
            Self::Line => line.line_number.to_string(),
            Self::Ean | Self::ItemCode => line.product_code.clone(),
            Self::ItemName => line.product_name.clone(),
            Self::Quantity => line.quantity.to_string(),
            Self::UnitPrice => line.unit_price.to_string(),
            Self::Vat => line.tax_rate.to_string(),
            Self::Amount => line.line_amount.to_string(),
            Self::AmountWithVat => line.line_amount_with_tax.to_string(),
            Self::Unit => line.unit.clone(),
        }
    }
}

/// Value to splice into the output, and whether it is already in wire form.
enum Fill {
    Text(String),
    Verbatim(String),
}

/// Walk `tpl`, replacing every `{{name}}` that `resolve` knows.
fn substitute<F>(tpl: &str, xml: bool, mut resolve: F) -> Result<String>
where
    F: FnMut(&str) -> Result<Option<Fill>>,
{
    let mut out = String::with_capacity(tpl.len() * 2);
    let mut rest = tpl;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        let Some(len) = after_open.find(CLOSE) else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let raw = &rest[start..start + OPEN.len() + len + CLOSE.len()];
        match resolve(after_open[..len].trim())? {
            Some(Fill::Text(v)) if xml => out.push_str(&escape(&v)),
            Some(Fill::Text(v)) | Some(Fill::Verbatim(v)) => out.push_str(&v),
            None => out.push_str(raw),
        }
        rest = &rest[raw.len() + start..];
    }
    out.push_str(rest);
    Ok(out)
}

fn render_line(tpl: &str, line: &LineItem, xml: bool) -> Result<String> {
    substitute(tpl, xml, |name| {
        Ok(LineSlot::parse(name).map(|slot| Fill::Text(slot.value(line))))
    })
}

/// Render `doc` through `template`.
pub fn render_template(doc: &CanonicalDocument, template: &WireTemplate) -> Result<String> {
    if template.body.trim().is_empty() {
        return Err(CodecError::EmptyTemplate(doc.doc_type));
    }
    let xml = template.is_xml();

    substitute(&template.body, xml, |name| {
        let Some(slot) = DocSlot::parse(name) else {
            return Ok(None);
        };
        let fill = match slot {
            DocSlot::DocType => Fill::Text(doc.doc_type.as_str().to_string()),
            DocSlot::ExternalId => Fill::Text(doc.external_id.clone()),
            DocSlot::Number => Fill::Text(doc.number.clone()),
            DocSlot::Date => Fill::Text(format_date(doc.date)),
            DocSlot::DeliveryDate => Fill::Text(format_date(doc.delivery_date)),
            DocSlot::ShipmentDate => Fill::Text(format_date(doc.shipment_date)),
            DocSlot::OrderNumber => Fill::Text(doc.order_number.clone()),
            DocSlot::DeliveryPlace => Fill::Text(doc.delivery_place.clone()),
            DocSlot::SupplierGln => Fill::Text(doc.supplier_id.clone()),
            DocSlot::SupplierName => Fill::Text(doc.supplier_name.clone()),
            DocSlot::BuyerGln => Fill::Text(doc.buyer_id.clone()),
            DocSlot::BuyerName => Fill::Text(doc.buyer_name.clone()),
            DocSlot::Currency => Fill::Text(doc.currency.clone()),
            DocSlot::TotalAmount => Fill::Text(doc.total_amount.to_string()),
            DocSlot::TotalVat => Fill::Text(doc.total_tax.to_string()),
            DocSlot::TotalWithVat => Fill::Text(doc.total_with_tax.to_string()),
            DocSlot::Positions => {
                let lines = doc
                    .lines
                    .iter()
                    .map(|line| render_line(&template.line, line, xml))
                    .collect::<Result<Vec<_>>>()?;
                Fill::Verbatim(lines.join("\n"))
            }
            DocSlot::PositionsJson => Fill::Text(serde_json::to_string(&doc.lines)?),
            DocSlot::RawJson => Fill::Text(serde_json::to_string(doc)?),
        };
        Ok(Some(fill))
    })
}
