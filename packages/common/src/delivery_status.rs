#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Delivery lifecycle of one document towards the downstream receiver.
///
/// ```text
/// Pending -> Sending -> Sent
///                    -> Error -> Sending -> Sent | Error | Failed
/// ```
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "PascalCase")]
pub enum DeliveryStatus {
    /// Waiting for its first delivery attempt.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Pending"))]
    Pending,
    /// Claimed by a delivery attempt that has not finished yet.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Sending"))]
    Sending,
    /// Accepted by the downstream receiver.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Sent"))]
    Sent,
    /// Last attempt failed; another one is scheduled.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Error"))]
    Error,
    /// Retries exhausted. Needs manual intervention.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Failed"))]
    Failed,
}

impl DeliveryStatus {
    /// Returns true for states that the scheduler never revisits.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }

    /// Returns true if an entry in this state may be claimed for delivery.
    pub fn is_claimable(&self) -> bool {
        matches!(self, Self::Pending | Self::Error)
    }

    /// Returns true if an operator may put an entry in this state back to
    /// `Pending`. Sent entries and attempts in flight are excluded.
    pub fn is_requeueable(&self) -> bool {
        matches!(self, Self::Pending | Self::Error | Self::Failed)
    }

    /// Whether the scheduler may move an entry from `self` to `next`.
    /// Manual re-queueing is not a scheduler transition.
    pub fn can_transition_to(&self, next: DeliveryStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Sending)
                | (Self::Error, Self::Sending)
                | (Self::Sending, Self::Sent)
                | (Self::Sending, Self::Error)
                | (Self::Sending, Self::Failed)
        )
    }

    pub const ALL: &'static [DeliveryStatus] = &[
        Self::Pending,
        Self::Sending,
        Self::Sent,
        Self::Error,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Sending => "Sending",
            Self::Sent => "Sent",
            Self::Error => "Error",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for DeliveryStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Error when parsing an invalid status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    invalid: String,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid status '{}'. Valid values: {}",
            self.invalid,
            DeliveryStatus::ALL
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for DeliveryStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Sending" => Ok(Self::Sending),
            "Sent" => Ok(Self::Sent),
            "Error" => Ok(Self::Error),
            "Failed" => Ok(Self::Failed),
            _ => Err(ParseStatusError {
                invalid: s.to_string(),
            }),
        }
    }
}
