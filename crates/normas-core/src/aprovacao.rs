//! # Approval Ledger Vocabulary
//!
//! Approval state is an append-only event log keyed by norma id, never a
//! mutable status column. The current status of a norma is a projection:
//! the event with the greatest `data_registro`, ties broken by the highest
//! event id. `aprovado` may follow `recusado` and vice versa indefinitely;
//! resubmitting the same decision is legal and recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Decision recorded by an approval event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusAprovacao {
    Aprovado,
    Recusado,
}

impl StatusAprovacao {
    /// Wire value, matching the stored column text.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aprovado => "aprovado",
            Self::Recusado => "recusado",
        }
    }
}

impl std::fmt::Display for StatusAprovacao {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StatusAprovacao {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aprovado" => Ok(Self::Aprovado),
            "recusado" => Ok(Self::Recusado),
            other => Err(ValidationError::InvalidStatus(other.to_string())),
        }
    }
}

/// An immutable approval event. There is no update or delete path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aprovacao {
    pub id: i64,
    /// Reference to a norma id; not enforced by the store, so history
    /// survives (orphaned but queryable) when the norma is deleted.
    pub norma_id: i64,
    pub status: StatusAprovacao,
    pub solicitante: String,
    pub data_registro: DateTime<Utc>,
    pub observacao: Option<String>,
}

/// Latest-status projection for a norma.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UltimoStatus {
    pub status: StatusAprovacao,
    pub solicitante: String,
    pub data_registro: DateTime<Utc>,
    pub observacao: Option<String>,
}

/// Validate the requester name attached to a decision. The name comes from
/// the authenticated principal, but a blank `nome_completo` must still be
/// rejected rather than recorded.
pub fn validar_solicitante(solicitante: &str) -> Result<&str, ValidationError> {
    let trimmed = solicitante.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankField("solicitante"));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_str() {
        for status in [StatusAprovacao::Aprovado, StatusAprovacao::Recusado] {
            assert_eq!(StatusAprovacao::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = StatusAprovacao::from_str("pendente").unwrap_err();
        assert_eq!(err, ValidationError::InvalidStatus("pendente".to_string()));
    }

    #[test]
    fn status_is_case_sensitive_on_the_wire() {
        assert!(StatusAprovacao::from_str("Aprovado").is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&StatusAprovacao::Recusado).unwrap();
        assert_eq!(json, "\"recusado\"");
    }

    #[test]
    fn blank_solicitante_is_rejected() {
        assert!(validar_solicitante("  ").is_err());
        assert_eq!(validar_solicitante(" Ana Souza ").unwrap(), "Ana Souza");
    }
}
