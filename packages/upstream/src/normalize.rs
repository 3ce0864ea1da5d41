//! Schema normalizer: one upstream item in, at most one canonical document out.
//!
//! The decoded `content` blob is either type-keyed
//! (`{"ORDER": {"HEAD": {...}, "POSITION": [...]}}`) or flat (the same fields
//! without the wrapper). Lines live under `HEAD.POSITION` or directly under the
//! body's `POSITION`. Every output field has a default; nothing here returns an
//! error.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use common::dates::parse_date;
use common::document::{DEFAULT_CURRENCY, DEFAULT_UNIT};
use common::{CanonicalDocument, DocType, LineItem};
use serde_json::Value;
use tracing::warn;

use crate::json::{
    as_decimal, as_items, as_non_negative, as_f64, as_text, field, first_field, lookup,
};

const ID_KEYS: &[&str] = &["documentId", "id"];
const FLOW_ID_KEYS: &[&str] = &["docflowId", "flowId"];

const NUMBER_KEYS: &[&str] = &["NUMBER", "documentNumber", "docNumber"];
const DATE_KEYS: &[&str] = &["DATE", "documentDate", "docDate"];
const DELIVERY_DATE_KEYS: &[&str] = &["DELIVERYDATE"];
const SHIPMENT_DATE_KEYS: &[&str] = &["SHIPMENTDATE", "DESPATCHDATE"];
const ORDER_NUMBER_KEYS: &[&str] = &["ORDERNUMBER"];
const DELIVERY_PLACE_KEYS: &[&str] = &["DELIVERYPLACE"];
const SUPPLIER_KEYS: &[&str] = &["SUPPLIER", "senderGln", "sender"];
const BUYER_KEYS: &[&str] = &["BUYER", "receiverGln", "receiver"];
const SUPPLIER_NAME_KEYS: &[&str] = &["supplierName", "senderName"];
const BUYER_NAME_KEYS: &[&str] = &["buyerName", "receiverName"];
const PARTY_NAME_KEYS: &[&str] = &["полноеНазвание", "краткоеНазвание", "NAME"];
const CURRENCY_KEYS: &[&str] = &["CURRENCY"];
const TOTAL_KEYS: &[&str] = &["AMOUNT"];
const TOTAL_TAX_KEYS: &[&str] = &["VATAMOUNT", "TAXAMOUNT"];
const TOTAL_WITH_TAX_KEYS: &[&str] = &["AMOUNTWITHVAT"];

const POSITION_KEYS: &[&str] = &["POSITION"];
const PRODUCT_CODE_KEYS: &[&str] = &["PRODUCT", "EAN", "BUYERPRODUCTCODE"];
const PRODUCT_NAME_KEYS: &[&str] = &["DESCRIPTION", "NAME"];
const QUANTITY_KEYS: &[&str] = &[
    "ORDEREDQUANTITY",
    "DELIVEREDQUANTITY",
    "ACCEPTEDQUANTITY",
    "QUANTITY",
];
const PRICE_KEYS: &[&str] = &["ORDERPRICE", "PRICE", "PRICEWITHVAT"];
const TAX_RATE_KEYS: &[&str] = &["VAT"];
const LINE_AMOUNT_KEYS: &[&str] = &["AMOUNT"];
const LINE_AMOUNT_WITH_TAX_KEYS: &[&str] = &["AMOUNTWITHVAT"];
const UNIT_KEYS: &[&str] = &["ORDERUNIT", "UNIT"];

static EMPTY: Value = Value::Null;

/// Identity of an item as advertised by the envelope.
pub fn item_id(envelope: &Value) -> Option<String> {
    Some(as_text(first_field(envelope, ID_KEYS))).filter(|s| !s.is_empty())
}

/// Secondary (flow/conversation) identity, if the envelope carries one.
pub fn item_flow_id(envelope: &Value) -> Option<String> {
    Some(as_text(first_field(envelope, FLOW_ID_KEYS))).filter(|s| !s.is_empty())
}

/// Decode the envelope's `content` blob.
///
/// Accepts base64(JSON) in the standard or URL-safe alphabet, or an inline
/// JSON object. Returns `None` when the field is missing or unusable.
pub fn decode_content(envelope: &Value) -> Option<Value> {
    match field(envelope, "content")? {
        Value::String(encoded) => {
            let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
            if compact.is_empty() {
                return None;
            }
            let bytes = STANDARD
                .decode(&compact)
                .or_else(|_| URL_SAFE.decode(&compact));
            let bytes = match bytes {
                Ok(b) => b,
                Err(e) => {
                    warn!(error = %e, "Content is not valid base64");
                    return None;
                }
            };
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(v) if v.is_object() => Some(v),
                Ok(_) => {
                    warn!("Decoded content is not a JSON object");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "Decoded content is not valid JSON");
                    None
                }
            }
        }
        obj @ Value::Object(_) => Some(obj.clone()),
        _ => None,
    }
}

/// Normalize one upstream item into a canonical document.
///
/// Returns `None` only when the item has no identity; an item without content
/// still yields a document built from its envelope fields.
pub fn normalize(doc_type: DocType, envelope: &Value) -> Option<CanonicalDocument> {
    let external_id = item_id(envelope)?;
    let content = decode_content(envelope);

    let body = content
        .as_ref()
        .map(|c| match field(c, doc_type.as_str()) {
            Some(inner @ Value::Object(_)) => inner,
            _ => c,
        })
        .unwrap_or(&EMPTY);
    let head = field(body, "HEAD").filter(|h| h.is_object()).unwrap_or(&EMPTY);

    // Header fields: the body wins, then HEAD, then the list envelope.
    let header = [body, head, envelope];
    // Party fields sit in HEAD in every generation seen so far.
    let parties = [head, body, envelope];

    let mut doc = CanonicalDocument::new(external_id, doc_type);
    doc.flow_id = item_flow_id(envelope);
    doc.number = as_text(lookup(&header, NUMBER_KEYS));
    doc.date = parse_date(&as_text(lookup(&header, DATE_KEYS)));
    doc.delivery_date = parse_date(&as_text(lookup(&header, DELIVERY_DATE_KEYS)));
    doc.shipment_date = parse_date(&as_text(lookup(&header, SHIPMENT_DATE_KEYS)));
    doc.order_number = as_text(lookup(&header, ORDER_NUMBER_KEYS));
    doc.delivery_place = as_text(lookup(&parties, DELIVERY_PLACE_KEYS));
    doc.supplier_id = as_text(lookup(&parties, SUPPLIER_KEYS));
    doc.buyer_id = as_text(lookup(&parties, BUYER_KEYS));
    doc.supplier_name = party_name(head, "SUPPLIER_INFO")
        .unwrap_or_else(|| as_text(lookup(&header, SUPPLIER_NAME_KEYS)));
    doc.buyer_name = party_name(head, "BUYER_INFO")
        .unwrap_or_else(|| as_text(lookup(&header, BUYER_NAME_KEYS)));

    let currency = as_text(lookup(&header, CURRENCY_KEYS));
    doc.currency = if currency.is_empty() {
        DEFAULT_CURRENCY.to_string()
    } else {
        currency
    };

    let totals = [body, head];
    doc.total_amount = as_decimal(lookup(&totals, TOTAL_KEYS));
    doc.total_tax = as_decimal(lookup(&totals, TOTAL_TAX_KEYS));
    doc.total_with_tax = as_decimal(lookup(&totals, TOTAL_WITH_TAX_KEYS));

    let positions = first_field(head, POSITION_KEYS).or_else(|| first_field(body, POSITION_KEYS));
    doc.lines = as_items(positions)
        .into_iter()
        .enumerate()
        .map(|(i, p)| normalize_line(i as u32 + 1, p))
        .collect();

    doc.raw_payload = raw_payload(envelope, content);
    Some(doc)
}

fn party_name(head: &Value, info_key: &str) -> Option<String> {
    let info = field(head, info_key)?;
    Some(as_text(first_field(info, PARTY_NAME_KEYS))).filter(|s| !s.is_empty())
}

fn normalize_line(line_number: u32, p: &Value) -> LineItem {
    let characteristic = field(p, "CHARACTERISTIC").unwrap_or(&EMPTY);
    let unit = as_text(first_field(p, UNIT_KEYS));

    LineItem {
        line_number,
        product_code: as_text(first_field(p, PRODUCT_CODE_KEYS)),
        product_name: as_text(lookup(&[characteristic, p], PRODUCT_NAME_KEYS)),
        quantity: as_non_negative(first_field(p, QUANTITY_KEYS)),
        unit_price: as_non_negative(first_field(p, PRICE_KEYS)),
        tax_rate: as_f64(first_field(p, TAX_RATE_KEYS)),
        line_amount: as_f64(first_field(p, LINE_AMOUNT_KEYS)),
        line_amount_with_tax: as_f64(first_field(p, LINE_AMOUNT_WITH_TAX_KEYS)),
        unit: if unit.is_empty() {
            DEFAULT_UNIT.to_string()
        } else {
            unit
        },
    }
}

/// Envelope as received, with `content` swapped for its decoded form when
/// decoding succeeded.
fn raw_payload(envelope: &Value, content: Option<Value>) -> Value {
    let mut raw = envelope.clone();
    if let (Some(decoded), Some(map)) = (content, raw.as_object_mut()) {
        let key = map
            .keys()
            .find(|k| k.eq_ignore_ascii_case("content"))
            .cloned()
            .unwrap_or_else(|| "content".to_string());
        map.insert(key, decoded);
    }
    raw
}
