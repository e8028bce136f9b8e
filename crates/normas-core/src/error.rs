//! Structured validation errors raised at the domain boundary.

use thiserror::Error;

/// Input validation failure. Maps to HTTP 400 at the request boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// One or more required fields are absent or empty.
    #[error("campos obrigatórios faltando: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// A field that must carry a non-blank value is blank.
    #[error("campo '{0}' não pode ser vazio")]
    BlankField(&'static str),

    /// Approval status is not one of the recognized values.
    #[error("status inválido: '{0}'. Use 'aprovado' ou 'recusado'")]
    InvalidStatus(String),

    /// User role is not one of the recognized values.
    #[error("tipo de usuário inválido: '{0}'")]
    InvalidTipoUsuario(String),

    /// Page number must be a positive integer.
    #[error("parâmetro 'page' inválido: {0} (mínimo 1)")]
    InvalidPage(i64),

    /// Page size must lie within the enforced bounds.
    #[error("parâmetro 'per_page' inválido: {0} (faixa permitida 1–{max})", max = crate::filtro::MAX_PER_PAGE)]
    InvalidPerPage(i64),

    /// A numeric query parameter could not be parsed.
    #[error("parâmetro '{0}' não é um número válido")]
    NotANumber(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_message_lists_all_fields() {
        let err = ValidationError::MissingFields(vec![
            "numero_norma".to_string(),
            "tipo_norma".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("numero_norma"));
        assert!(msg.contains("tipo_norma"));
    }

    #[test]
    fn invalid_per_page_message_names_bounds() {
        let err = ValidationError::InvalidPerPage(0);
        assert!(err.to_string().contains("per_page"));
        assert!(err.to_string().contains("200"));
    }
}
