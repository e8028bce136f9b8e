//! # Users and the Authenticated Principal
//!
//! The core never touches credentials: password hashing and token mechanics
//! live behind the API crate's auth boundary. Handlers only consume the
//! resolved [`Principal`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Role attached to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipoUsuario {
    Admin,
    User,
}

impl TipoUsuario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::str::FromStr for TipoUsuario {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(ValidationError::InvalidTipoUsuario(other.to_string())),
        }
    }
}

/// A user account. `password_hash` never leaves the db layer; this type is
/// the hash-free projection returned by user-management endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Usuario {
    pub id: i64,
    pub username: String,
    pub nome_completo: String,
    pub tipo_usuario: TipoUsuario,
    pub ativo: bool,
    pub data_criacao: DateTime<Utc>,
}

/// The authenticated caller attached to every request after the auth
/// middleware resolves the bearer token. An inactive principal is rejected
/// at the middleware, so handlers may assume `ativo` is true.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub nome_completo: String,
    pub tipo_usuario: TipoUsuario,
    pub ativo: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn tipo_usuario_parses_known_values() {
        assert_eq!(TipoUsuario::from_str("admin").unwrap(), TipoUsuario::Admin);
        assert_eq!(TipoUsuario::from_str("user").unwrap(), TipoUsuario::User);
        assert!(TipoUsuario::from_str("root").is_err());
    }

    #[test]
    fn admin_check() {
        assert!(TipoUsuario::Admin.is_admin());
        assert!(!TipoUsuario::User.is_admin());
    }
}
