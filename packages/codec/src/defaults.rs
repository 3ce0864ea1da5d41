//! Built-in encoders, one per document type. Used when no active template
//! exists. Element order is fixed so identical documents encode identically.

use common::dates::format_date;
use common::{CanonicalDocument, DocType};

use crate::xml::XmlWriter;

/// Response code sent in ORDRSP when the exchange did not supply one
/// (29: accepted without amendment).
const CONFIRMATION_ACCEPTED: &str = "29";

pub fn encode(doc: &CanonicalDocument) -> String {
    let mut w = XmlWriter::new();
    header(&mut w, doc);

    match doc.doc_type {
        DocType::Order => {
            w.leaf("DeliveryDate", format_date(doc.delivery_date))
                .leaf("DeliveryPlace", &doc.delivery_place)
                .leaf("Currency", &doc.currency);
        }
        DocType::OrderResponse => {
            w.leaf("OrderNumber", &doc.order_number)
                .leaf("ConfirmationStatus", CONFIRMATION_ACCEPTED);
        }
        DocType::DispatchAdvice => {
            w.leaf("OrderNumber", &doc.order_number)
                .leaf("ShipmentDate", format_date(doc.shipment_date))
                .leaf("DeliveryPlace", &doc.delivery_place);
        }
        DocType::Invoice => {
            w.leaf("OrderNumber", &doc.order_number)
                .leaf("TotalAmount", doc.total_amount.to_string())
                .leaf("TotalVAT", doc.total_tax.to_string())
                .leaf("TotalWithVAT", doc.total_with_tax.to_string())
                .leaf("Currency", &doc.currency);
        }
        DocType::PriceCatalog => {
            w.leaf("Currency", &doc.currency);
        }
    }

    lines(&mut w, doc);
    w.finish()
}

fn header(w: &mut XmlWriter, doc: &CanonicalDocument) {
    w.open("Document")
        .leaf("DocumentType", doc.doc_type.as_str())
        .leaf("DocumentId", &doc.number)
        .leaf("DocumentDate", format_date(doc.date))
        .open("Parties")
        .open("Supplier")
        .leaf("GLN", &doc.supplier_id)
        .leaf("Name", &doc.supplier_name)
        .close()
        .open("Buyer")
        .leaf("GLN", &doc.buyer_id)
        .leaf("Name", &doc.buyer_name)
        .close()
        .close();
}

fn lines(w: &mut XmlWriter, doc: &CanonicalDocument) {
    w.open("Lines");
    for line in &doc.lines {
        w.open("Line")
            .leaf("LineNumber", line.line_number.to_string())
            .leaf("EAN", &line.product_code)
            .leaf("ItemName", &line.product_name)
            .leaf("Quantity", line.quantity.to_string())
            .leaf("Unit", &line.unit)
            .leaf("UnitPrice", line.unit_price.to_string())
            .leaf("VAT", line.tax_rate.to_string())
            .leaf("Amount", line.line_amount.to_string())
            .leaf("AmountWithVAT", line.line_amount_with_tax.to_string())
            .close();
    }
    w.close();
}
