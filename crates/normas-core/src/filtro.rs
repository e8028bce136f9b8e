//! # Catalogue Filter and Pagination Parameters
//!
//! The filter surface is a small closed set of predicates, not an expression
//! language: exact matches, case-sensitive substring matches, a free-text
//! search over three columns, and one derived predicate
//! (`status_aprovacao`, the latest approval event's status).
//!
//! Pagination parameters are validated here, once, before any query is
//! built: non-positive values and oversized pages are rejected instead of
//! silently accepted.

use serde::Serialize;

use crate::aprovacao::StatusAprovacao;
use crate::error::ValidationError;

/// Default page size when `per_page` is absent.
pub const DEFAULT_PER_PAGE: i64 = 20;

/// Upper bound on `per_page`. Requests above this are rejected, not clamped.
pub const MAX_PER_PAGE: i64 = 200;

/// Validated pagination window. Construction is the only way to obtain one,
/// so every window in the system satisfies `page >= 1` and
/// `1 <= per_page <= MAX_PER_PAGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    page: i64,
    per_page: i64,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageParams {
    /// Build from already-numeric values.
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Result<Self, ValidationError> {
        let page = page.unwrap_or(1);
        let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE);
        if page < 1 {
            return Err(ValidationError::InvalidPage(page));
        }
        if per_page < 1 || per_page > MAX_PER_PAGE {
            return Err(ValidationError::InvalidPerPage(per_page));
        }
        Ok(Self { page, per_page })
    }

    /// Build from raw query-string values. Absent values take defaults;
    /// non-numeric values are rejected with a named parameter.
    pub fn from_raw(
        page: Option<&str>,
        per_page: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let page = page
            .map(|v| v.parse::<i64>())
            .transpose()
            .map_err(|_| ValidationError::NotANumber("page"))?;
        let per_page = per_page
            .map(|v| v.parse::<i64>())
            .transpose()
            .map_err(|_| ValidationError::NotANumber("per_page"))?;
        Self::new(page, per_page)
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
    }

    /// SQL window: `(limit, offset)` with `offset = (page - 1) * per_page`.
    /// There is no upper bound on `page`, so the offset saturates instead of
    /// overflowing; a saturated offset lies past every row and the page
    /// comes back empty.
    pub fn window(&self) -> (i64, i64) {
        (self.per_page, (self.page - 1).saturating_mul(self.per_page))
    }
}

/// Pagination envelope returned alongside every page of results.
///
/// `total` is the count of rows matching the full predicate set, including
/// the derived `status_aprovacao` predicate when supplied — the count query
/// and the data query always carry identical predicates, so pages never
/// under-fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub pages: i64,
}

impl PaginationMeta {
    pub fn new(params: PageParams, total: i64) -> Self {
        Self {
            page: params.page,
            per_page: params.per_page,
            total,
            pages: (total + params.per_page - 1) / params.per_page,
        }
    }
}

/// The recognized catalogue filter keys, each independently optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormaFilter {
    /// Exact match on document type.
    pub tipo_norma: Option<String>,
    /// Substring match on issuing body.
    pub orgao_emissor: Option<String>,
    /// Exact match on publication-source origin.
    pub origem_publicacao: Option<String>,
    /// Exact match on data-source origin.
    pub origem_dado: Option<String>,
    /// Exact match on validity status.
    pub status_vigencia: Option<String>,
    /// Substring match on political-division scope.
    pub divisao_politica: Option<String>,
    /// Case-sensitive substring over titulo_da_norma, ementa and
    /// numero_norma, OR-combined.
    pub search: Option<String>,
    /// Exact match on the applicability flag.
    pub aplicavel: Option<bool>,
    /// Derived predicate: the latest approval event's status.
    pub status_aprovacao: Option<StatusAprovacao>,
}

impl NormaFilter {
    /// Parse the `aplicavel` query value the way the catalogue always has:
    /// the literal `"true"` (case-insensitive) is true, anything else false.
    pub fn parse_aplicavel(raw: &str) -> bool {
        raw.eq_ignore_ascii_case("true")
    }
}
