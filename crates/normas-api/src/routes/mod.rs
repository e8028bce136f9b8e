//! Handler modules, one router per endpoint family.

pub mod aprovacoes;
pub mod auth;
pub mod normas;
pub mod usuarios;
