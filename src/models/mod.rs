use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::ApiError;
use crate::rbac::Role;

/// Fields maintained by the store layer; API payloads may not set them.
pub const SYSTEM_FIELDS: &[&str] = &["id", "created_at", "updated_at"];

/// Tenant registry entry. A `clientes` record *is* the tenant: its id is the
/// tenant id that scopes every other collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub nome: String,
    pub status: TenantStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Inactive,
    Suspended,
}

impl TenantStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, TenantStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Inactive => "inactive",
            TenantStatus::Suspended => "suspended",
        }
    }
}

impl Tenant {
    pub fn from_record(record: &Map<String, Value>) -> Option<Self> {
        serde_json::from_value(Value::Object(record.clone())).ok()
    }
}

/// Grants one user one role within one tenant. At most one binding exists per
/// (user, tenant) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleBinding {
    pub user_id: String,
    pub cliente_id: Uuid,
    pub role: Role,
}

impl RoleBinding {
    pub fn from_record(record: &Map<String, Value>) -> Option<Self> {
        serde_json::from_value(Value::Object(record.clone())).ok()
    }
}

// Create payloads. `cliente_id` stays optional everywhere: the operation
// executor injects the context tenant when the caller omits it.

#[derive(Debug, Deserialize)]
pub struct NovoCliente {
    pub nome: String,
    pub status: TenantStatus,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NovoContrato {
    #[serde(default)]
    pub cliente_id: Option<Uuid>,
    #[serde(default)]
    pub aluno_id: Option<Uuid>,
    pub descricao: String,
    pub valor: Decimal,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NovoProduto {
    pub nome: String,
    pub preco: Decimal,
    #[serde(default)]
    pub ativo: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct NovoAluno {
    #[serde(default)]
    pub cliente_id: Option<Uuid>,
    pub nome: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Validate a create payload against the collection's typed model. Shape
/// problems are caller-correctable and surface verbatim as 400s.
pub fn validate_create(collection: &str, payload: &Map<String, Value>) -> Result<(), ApiError> {
    let value = Value::Object(payload.clone());
    let result = match collection {
        "clientes" => serde_json::from_value::<NovoCliente>(value).map(|_| ()),
        "contratos" => serde_json::from_value::<NovoContrato>(value).map(|_| ()),
        "produtos" => serde_json::from_value::<NovoProduto>(value).map(|_| ()),
        "alunos" => serde_json::from_value::<NovoAluno>(value).map(|_| ()),
        other => {
            return Err(ApiError::not_found(format!(
                "unknown collection '{}'",
                other
            )))
        }
    };

    result.map_err(|e| {
        let mut field_errors = HashMap::new();
        field_errors.insert("payload".to_string(), e.to_string());
        ApiError::validation_fields(format!("invalid {} payload", collection), field_errors)
    })
}

/// Reject attempts to patch store-maintained fields.
pub fn reject_system_fields(payload: &Map<String, Value>) -> Result<(), ApiError> {
    let mut field_errors = HashMap::new();
    for field in SYSTEM_FIELDS {
        if payload.contains_key(*field) {
            field_errors.insert(
                field.to_string(),
                "this field is maintained by the server".to_string(),
            );
        }
    }
    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation_fields(
            "payload contains system fields",
            field_errors,
        ))
    }
}
