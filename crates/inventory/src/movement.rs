//! Kardex movements: the immutable facts of the inventory ledger.

use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kardex_core::{DomainError, DomainResult, MovementId, ProductId, Quantity, TransferId, WarehouseId};

/// Kind of inventory movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementKind {
    /// Goods received. Always a positive delta.
    Entrada,
    /// Goods shipped or consumed (sales, merma, consumo interno). Always negative.
    Salida,
    /// Manual correction; the caller decides the sign.
    Ajuste,
    /// One leg of a warehouse-to-warehouse transfer.
    Transferencia,
    /// Stock held back for an order. Always negative.
    Reserva,
    /// A reservation given back. Always positive.
    #[serde(rename = "Liberación", alias = "Liberacion")]
    Liberacion,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SignRule {
    Positive,
    Negative,
    Either,
}

impl MovementKind {
    pub fn label(self) -> &'static str {
        match self {
            MovementKind::Entrada => "Entrada",
            MovementKind::Salida => "Salida",
            MovementKind::Ajuste => "Ajuste",
            MovementKind::Transferencia => "Transferencia",
            MovementKind::Reserva => "Reserva",
            MovementKind::Liberacion => "Liberación",
        }
    }

    fn sign_rule(self) -> SignRule {
        match self {
            MovementKind::Entrada | MovementKind::Liberacion => SignRule::Positive,
            MovementKind::Salida | MovementKind::Reserva => SignRule::Negative,
            MovementKind::Ajuste | MovementKind::Transferencia => SignRule::Either,
        }
    }

    /// Turn a caller-supplied quantity into the signed ledger delta.
    ///
    /// Entrada/Salida/Reserva/Liberación take a positive magnitude and apply the
    /// kind's sign. Ajuste takes the signed delta as given (must not be zero).
    pub fn signed_delta(self, quantity: Decimal) -> DomainResult<Quantity> {
        match self.sign_rule() {
            SignRule::Positive => Quantity::positive(quantity),
            SignRule::Negative => Quantity::positive(quantity).map(|q| -q),
            SignRule::Either => {
                if quantity.is_zero() {
                    Err(DomainError::validation("quantity cannot be zero"))
                } else {
                    Ok(Quantity::new(quantity))
                }
            }
        }
    }

    fn accepts(self, delta: Quantity) -> bool {
        match self.sign_rule() {
            SignRule::Positive => delta.is_positive(),
            SignRule::Negative => delta.is_negative(),
            SignRule::Either => !delta.is_zero(),
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MovementKind {
    type Err = DomainError;

    /// Accepts the six kind labels only. Salida sub-kinds such as "Merma" are
    /// reasons, see [`SalidaReason::implied_by`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "entrada" => Ok(MovementKind::Entrada),
            "salida" => Ok(MovementKind::Salida),
            "ajuste" => Ok(MovementKind::Ajuste),
            "transferencia" => Ok(MovementKind::Transferencia),
            "reserva" => Ok(MovementKind::Reserva),
            "liberación" | "liberacion" => Ok(MovementKind::Liberacion),
            _ => Err(DomainError::validation(format!("unknown movement kind '{s}'"))),
        }
    }
}

/// Canonical reasons for goods coming in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntradaReason {
    Compra,
    Devolucion,
    AjustePositivo,
    ControlCalidad,
    Otro,
}

impl EntradaReason {
    pub fn label(self) -> &'static str {
        match self {
            EntradaReason::Compra => "Compra",
            EntradaReason::Devolucion => "Devolución",
            EntradaReason::AjustePositivo => "Ajuste Positivo",
            EntradaReason::ControlCalidad => "Control de Calidad - Aprobado",
            EntradaReason::Otro => "Otro",
        }
    }
}

/// Canonical reasons for goods going out.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalidaReason {
    Venta,
    Merma,
    ConsumoInterno,
    AjusteNegativo,
    Otro,
}

impl SalidaReason {
    pub fn label(self) -> &'static str {
        match self {
            SalidaReason::Venta => "Venta",
            SalidaReason::Merma => "Merma",
            SalidaReason::ConsumoInterno => "Consumo Interno",
            SalidaReason::AjusteNegativo => "Ajuste Negativo",
            SalidaReason::Otro => "Otro",
        }
    }

    /// The reason implied by a Salida sub-kind label such as "Merma", used
    /// when a history query names the sub-kind instead of the kind.
    pub fn implied_by(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "merma" => Some(SalidaReason::Merma),
            "consumo interno" | "consumo_interno" => Some(SalidaReason::ConsumoInterno),
            _ => None,
        }
    }
}

/// Descriptive fields of a movement (everything except identity and quantity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDetails {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub reference: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub lot: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub expiry: Option<NaiveDate>,
}

impl MovementDetails {
    pub fn new(reason: impl Into<String>, reference: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            reason: reason.into(),
            reference: reference.into(),
            date,
            lot: None,
            serial: None,
            expiry: None,
        }
    }

    fn normalized(self) -> Self {
        Self {
            reason: self.reason.trim().to_string(),
            reference: self.reference.trim().to_string(),
            date: self.date,
            lot: non_blank(self.lot),
            serial: non_blank(self.serial),
            expiry: self.expiry,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A movement staged for the ledger, not yet assigned a sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub kind: MovementKind,
    pub quantity: Quantity,
    pub details: MovementDetails,
    pub transfer_id: Option<TransferId>,
}

impl NewMovement {
    /// Validate and normalise a movement before it may be staged.
    pub fn new(
        product_id: ProductId,
        warehouse_id: WarehouseId,
        kind: MovementKind,
        quantity: Quantity,
        details: MovementDetails,
    ) -> DomainResult<Self> {
        if quantity.is_zero() {
            return Err(DomainError::validation("movement quantity cannot be zero"));
        }
        if !kind.accepts(quantity) {
            return Err(DomainError::validation(format!(
                "a {kind} movement cannot carry a delta of {quantity}"
            )));
        }
        Ok(Self {
            id: MovementId::new(),
            product_id,
            warehouse_id,
            kind,
            quantity,
            details: details.normalized(),
            transfer_id: None,
        })
    }

    pub fn with_transfer(mut self, transfer_id: TransferId) -> Self {
        self.transfer_id = Some(transfer_id);
        self
    }

    /// Freeze into an immutable record at a ledger position.
    pub fn into_record(self, sequence: u64, recorded_at: DateTime<Utc>) -> MovementRecord {
        MovementRecord {
            id: self.id,
            sequence,
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
            kind: self.kind,
            quantity: self.quantity,
            reason: self.details.reason,
            reference: self.details.reference,
            date: self.details.date,
            lot: self.details.lot,
            serial: self.details.serial,
            expiry: self.details.expiry,
            transfer_id: self.transfer_id,
            recorded_at,
        }
    }
}

/// Kardex entry. Never edited or deleted once committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub id: MovementId,
    /// Position in the ledger (strictly increasing, starts at 1).
    pub sequence: u64,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub kind: MovementKind,
    /// Signed delta.
    pub quantity: Quantity,
    pub reason: String,
    pub reference: String,
    pub date: NaiveDate,
    pub lot: Option<String>,
    pub serial: Option<String>,
    pub expiry: Option<NaiveDate>,
    pub transfer_id: Option<TransferId>,
    pub recorded_at: DateTime<Utc>,
}

impl MovementRecord {
    /// Case-insensitive match over the free-text fields shown on the kardex page.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        let hit = |s: &str| s.to_lowercase().contains(&term);
        hit(self.product_id.as_str())
            || hit(&self.reason)
            || hit(&self.reference)
            || self.lot.as_deref().is_some_and(hit)
            || self.serial.as_deref().is_some_and(hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> MovementDetails {
        MovementDetails::new("Compra", "FAC-1", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
    }

    fn ids() -> (ProductId, WarehouseId) {
        (ProductId::new("p1").unwrap(), WarehouseId::new("A").unwrap())
    }

    #[test]
    fn entrada_and_salida_apply_their_own_sign() {
        assert_eq!(MovementKind::Entrada.signed_delta(Decimal::from(5)).unwrap(), Quantity::from(5));
        assert_eq!(MovementKind::Salida.signed_delta(Decimal::from(5)).unwrap(), Quantity::from(-5));
        assert_eq!(MovementKind::Reserva.signed_delta(Decimal::from(2)).unwrap(), Quantity::from(-2));
    }

    #[test]
    fn magnitude_kinds_reject_non_positive_quantities() {
        assert!(MovementKind::Entrada.signed_delta(Decimal::ZERO).is_err());
        assert!(MovementKind::Salida.signed_delta(Decimal::from(-5)).is_err());
    }

    #[test]
    fn ajuste_keeps_caller_sign_but_rejects_zero() {
        assert_eq!(MovementKind::Ajuste.signed_delta(Decimal::from(-3)).unwrap(), Quantity::from(-3));
        assert!(MovementKind::Ajuste.signed_delta(Decimal::ZERO).is_err());
    }

    #[test]
    fn salida_sub_kinds_are_reasons_not_kinds() {
        assert!("Merma".parse::<MovementKind>().is_err());
        assert!("Consumo Interno".parse::<MovementKind>().is_err());
        assert_eq!(" salida ".parse::<MovementKind>().unwrap(), MovementKind::Salida);
        assert_eq!(SalidaReason::implied_by("merma"), Some(SalidaReason::Merma));
        assert_eq!(SalidaReason::implied_by("Consumo Interno"), Some(SalidaReason::ConsumoInterno));
        assert_eq!(SalidaReason::implied_by("Venta"), None);
        assert!("Robo".parse::<MovementKind>().is_err());
    }

    #[test]
    fn new_movement_rejects_sign_mismatch() {
        let (p, w) = ids();
        let err = NewMovement::new(p, w, MovementKind::Entrada, Quantity::from(-1), details()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn blank_lot_and_serial_are_dropped() {
        let (p, w) = ids();
        let mut d = details();
        d.lot = Some("  ".to_string());
        d.serial = Some(" SN-9 ".to_string());
        let m = NewMovement::new(p, w, MovementKind::Entrada, Quantity::from(1), d).unwrap();
        assert_eq!(m.details.lot, None);
        assert_eq!(m.details.serial.as_deref(), Some("SN-9"));
    }

    #[test]
    fn search_matches_reason_reference_and_lot() {
        let (p, w) = ids();
        let mut d = details();
        d.lot = Some("L-2024-07".to_string());
        let record = NewMovement::new(p, w, MovementKind::Entrada, Quantity::from(1), d)
            .unwrap()
            .into_record(1, Utc::now());
        assert!(record.matches_search("compra"));
        assert!(record.matches_search("fac-1"));
        assert!(record.matches_search("2024-07"));
        assert!(!record.matches_search("venta"));
    }

    #[test]
    fn liberacion_serializes_with_accent_and_accepts_plain_alias() {
        assert_eq!(serde_json::to_string(&MovementKind::Liberacion).unwrap(), "\"Liberación\"");
        let parsed: MovementKind = serde_json::from_str("\"Liberacion\"").unwrap();
        assert_eq!(parsed, MovementKind::Liberacion);
    }
}
