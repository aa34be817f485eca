use rust_decimal::Decimal;
use serde::Deserialize;

use kardex_core::{ProductId, TransferId, WarehouseId};
use kardex_infra::MovementFilter;
use kardex_inventory::{MovementKind, SalidaReason, WarehouseStatus};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct WarehouseStatusRequest {
    pub status: WarehouseStatus,
}

#[derive(Debug, Deserialize)]
pub struct AdjustGlobalStockRequest {
    pub delta: Decimal,
}

/// `GET /movements` query string. Every field is optional.
///
/// `kind` also takes the Salida sub-kinds ("Merma", "Consumo Interno"), which
/// filter on Salida plus that exact reason.
#[derive(Debug, Default, Deserialize)]
pub struct MovementQuery {
    pub product_id: Option<String>,
    pub warehouse_id: Option<String>,
    pub kind: Option<String>,
    pub reason: Option<String>,
    pub transfer_id: Option<String>,
    pub search: Option<String>,
}

impl MovementQuery {
    pub fn into_filter(self) -> Result<MovementFilter, axum::response::Response> {
        let mut reason = self.reason.filter(|r| !r.trim().is_empty());
        let kind = match self.kind.as_deref().and_then(SalidaReason::implied_by) {
            Some(implied) => {
                if reason.is_none() {
                    reason = Some(implied.label().to_string());
                }
                Some(MovementKind::Salida)
            }
            None => optional::<MovementKind>(self.kind, "movement kind")?,
        };

        Ok(MovementFilter {
            product_id: optional::<ProductId>(self.product_id, "product id")?,
            warehouse_id: optional::<WarehouseId>(self.warehouse_id, "warehouse id")?,
            kind,
            transfer_id: optional::<TransferId>(self.transfer_id, "transfer id")?,
            reason,
            search: self.search.filter(|s| !s.trim().is_empty()),
        })
    }
}

fn optional<T>(raw: Option<String>, what: &'static str) -> Result<Option<T>, axum::response::Response>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => errors::parse(v, what).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_matches_everything() {
        assert_eq!(MovementQuery::default().into_filter().unwrap(), MovementFilter::default());
    }

    #[test]
    fn query_fields_are_parsed() {
        let filter = MovementQuery {
            product_id: Some("p1".into()),
            kind: Some("Salida".into()),
            warehouse_id: Some("  ".into()),
            ..MovementQuery::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.product_id, Some(ProductId::new("p1").unwrap()));
        assert_eq!(filter.kind, Some(MovementKind::Salida));
        assert_eq!(filter.warehouse_id, None);
    }

    #[test]
    fn salida_sub_kind_becomes_kind_and_reason() {
        let filter = MovementQuery {
            kind: Some("Merma".into()),
            ..MovementQuery::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.kind, Some(MovementKind::Salida));
        assert_eq!(filter.reason.as_deref(), Some("Merma"));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let query = MovementQuery {
            kind: Some("Robo".into()),
            ..MovementQuery::default()
        };
        assert!(query.into_filter().is_err());
    }
}
