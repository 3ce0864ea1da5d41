use chrono::NaiveDate;
use common::{CanonicalDocument, DocType, LineItem};
use rust_decimal::Decimal;
use serde_json::json;

/// Fixed document used to preview templates. Always the same, so a preview
/// is reproducible.
pub fn sample_document(doc_type: DocType) -> CanonicalDocument {
    let mut doc = CanonicalDocument::new("sample-0001", doc_type);
    doc.flow_id = Some("sample-flow-0001".into());
    doc.number = "SAMPLE-001".into();
    doc.date = NaiveDate::from_ymd_opt(2026, 1, 15);
    doc.delivery_date = NaiveDate::from_ymd_opt(2026, 1, 20);
    doc.shipment_date = NaiveDate::from_ymd_opt(2026, 1, 18);
    doc.order_number = "ORD-001".into();
    doc.delivery_place = "4607001234560".into();
    doc.supplier_id = "4607001234577".into();
    doc.supplier_name = "ТОО \"Поставщик\"".into();
    doc.buyer_id = "4607001234584".into();
    doc.buyer_name = "ТОО \"Покупатель\"".into();
    doc.total_amount = Decimal::new(150000, 2);
    doc.total_tax = Decimal::new(18000, 2);
    doc.total_with_tax = Decimal::new(168000, 2);

    let mut milk = LineItem::new(1);
    milk.product_code = "4870001000011".into();
    milk.product_name = "Молоко 3,2% 1л".into();
    milk.quantity = 10.0;
    milk.unit_price = 100.0;
    milk.tax_rate = 12.0;
    milk.line_amount = 1000.0;
    milk.line_amount_with_tax = 1120.0;

    let mut bread = LineItem::new(2);
    bread.product_code = "4870001000028".into();
    bread.product_name = "Хлеб пшеничный".into();
    bread.quantity = 5.0;
    bread.unit_price = 100.0;
    bread.tax_rate = 12.0;
    bread.line_amount = 500.0;
    bread.line_amount_with_tax = 560.0;

    doc.lines = vec![milk, bread];
    doc.raw_payload = json!({ "documentId": doc.external_id, "sample": true });
    doc
}
