//! Warehouses (almacenes). Purely descriptive; they hold no quantity themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kardex_core::{DomainError, DomainResult, WarehouseId};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarehouseStatus {
    #[default]
    #[serde(rename = "Activo", alias = "Active")]
    Active,
    #[serde(rename = "Inactivo", alias = "Inactive")]
    Inactive,
}

/// Caller-supplied warehouse fields (create and edit forms).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseDraft {
    /// Explicit id; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub responsible: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub status: WarehouseStatus,
}

impl WarehouseDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn validated_name(&self) -> DomainResult<String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("warehouse name is required"));
        }
        Ok(name.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub address: String,
    pub responsible: String,
    pub phone: String,
    pub notes: String,
    pub status: WarehouseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Warehouse {
    pub fn register(draft: WarehouseDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = draft.validated_name()?;
        let id = match draft.id.as_deref() {
            Some(raw) => WarehouseId::new(raw)?,
            None => WarehouseId::new(format!("alm_{}", Uuid::now_v7().simple()))?,
        };
        Ok(Self {
            id,
            name,
            address: draft.address.trim().to_string(),
            responsible: draft.responsible.trim().to_string(),
            phone: draft.phone.trim().to_string(),
            notes: draft.notes,
            status: draft.status,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply an edit form. The id in the draft, if any, must match.
    pub fn update(&self, draft: WarehouseDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        if let Some(raw) = draft.id.as_deref() {
            if WarehouseId::new(raw)? != self.id {
                return Err(DomainError::invariant("warehouse id cannot be changed"));
            }
        }
        let name = draft.validated_name()?;
        Ok(Self {
            id: self.id.clone(),
            name,
            address: draft.address.trim().to_string(),
            responsible: draft.responsible.trim().to_string(),
            phone: draft.phone.trim().to_string(),
            notes: draft.notes,
            status: draft.status,
            created_at: self.created_at,
            updated_at: now,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == WarehouseStatus::Active
    }

    pub fn ensure_active(&self) -> DomainResult<()> {
        if !self.is_active() {
            return Err(DomainError::validation(format!(
                "warehouse '{}' is inactive",
                self.name
            )));
        }
        Ok(())
    }
}
