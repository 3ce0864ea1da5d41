#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Business document types relayed from the exchange.
///
/// The string form is the exchange's own type code, which is also what the
/// downstream receiver sees in the document-type header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
pub enum DocType {
    /// Purchase order.
    #[serde(rename = "ORDER")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "ORDER"))]
    Order,
    /// Supplier's response to an order.
    #[serde(rename = "ORDRSP")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "ORDRSP"))]
    OrderResponse,
    /// Dispatch advice (shipment notice).
    #[serde(rename = "DESADV")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "DESADV"))]
    DispatchAdvice,
    #[serde(rename = "INVOICE")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "INVOICE"))]
    Invoice,
    /// Price catalog.
    #[serde(rename = "PRICAT")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "PRICAT"))]
    PriceCatalog,
}

impl DocType {
    pub const ALL: &'static [DocType] = &[
        Self::Order,
        Self::OrderResponse,
        Self::DispatchAdvice,
        Self::Invoice,
        Self::PriceCatalog,
    ];

    /// Exchange type code (`ORDER`, `ORDRSP`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "ORDER",
            Self::OrderResponse => "ORDRSP",
            Self::DispatchAdvice => "DESADV",
            Self::Invoice => "INVOICE",
            Self::PriceCatalog => "PRICAT",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an unknown document type code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid document type '{invalid}'. Valid values: ORDER, ORDRSP, DESADV, INVOICE, PRICAT")]
pub struct ParseDocTypeError {
    invalid: String,
}

impl FromStr for DocType {
    type Err = ParseDocTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ORDER" => Ok(Self::Order),
            "ORDRSP" | "ORDER_RESPONSE" => Ok(Self::OrderResponse),
            "DESADV" | "DISPATCH_ADVICE" => Ok(Self::DispatchAdvice),
            "INVOICE" => Ok(Self::Invoice),
            "PRICAT" | "PRICE_CATALOG" => Ok(Self::PriceCatalog),
            _ => Err(ParseDocTypeError {
                invalid: s.to_string(),
            }),
        }
    }
}
