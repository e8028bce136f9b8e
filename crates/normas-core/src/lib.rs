//! # normas-core — Domain Model for the Normas Catalogue
//!
//! Foundational types shared by the API layer:
//!
//! - [`norma`] — the regulatory document record, its creation draft and
//!   partial-update patch.
//! - [`aprovacao`] — the append-only approval ledger vocabulary: decision
//!   status, event record, and latest-status projection.
//! - [`usuario`] — users, roles, and the authenticated [`usuario::Principal`]
//!   consumed by every request handler.
//! - [`filtro`] — the recognized filter keys and validated pagination
//!   parameters for the catalogue scan.
//! - [`error`] — structured validation errors raised at the domain boundary.
//!
//! This crate is persistence-agnostic: SQL row mapping lives in the API
//! crate's `db` modules.

pub mod aprovacao;
pub mod error;
pub mod filtro;
pub mod norma;
pub mod usuario;

pub use aprovacao::{Aprovacao, StatusAprovacao, UltimoStatus};
pub use error::ValidationError;
pub use filtro::{NormaFilter, PageParams, PaginationMeta};
pub use norma::{Norma, NormaDraft, NormaPatch};
pub use usuario::{Principal, TipoUsuario, Usuario};
