//! # Norma — the Regulatory Document Record
//!
//! A norma is identified by a store-assigned integer id, immutable once
//! assigned. The `aplicavel` flag is recomputed by the reconciliation job
//! (see the API crate's `sync` module); the partial-update path may still
//! overwrite it, which is preserved as observed behavior.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Sentinel data-source origin applied when a draft does not name one:
/// records created through the catalogue UI rather than an ingestion crawler.
pub const ORIGEM_DADO_MANUAL: &str = "SITE";

/// A regulatory document record as stored in the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Norma {
    pub id: i64,
    pub numero_norma: String,
    pub tipo_norma: String,
    pub orgao_emissor: String,
    pub titulo_da_norma: String,
    pub ementa: Option<String>,
    pub data_publicacao: Option<String>,
    pub divisao_politica: Option<String>,
    pub origem_dado: String,
    pub origem_publicacao: Option<String>,
    pub status_vigencia: Option<String>,
    /// Last-sync timestamp stamped by the ingestion pipeline, opaque here.
    pub lake_ingestao: Option<String>,
    pub aplicavel: bool,
    pub atualizado_em: Option<DateTime<Utc>>,
    /// Derived latest approval status, attached by the scan path. Never
    /// persisted on the norma row itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_aprovacao: Option<String>,
}

/// Fields accepted when creating a norma.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NormaDraft {
    pub numero_norma: Option<String>,
    pub tipo_norma: Option<String>,
    pub orgao_emissor: Option<String>,
    pub titulo_da_norma: Option<String>,
    pub ementa: Option<String>,
    pub data_publicacao: Option<String>,
    pub divisao_politica: Option<String>,
    pub origem_dado: Option<String>,
    pub origem_publicacao: Option<String>,
    pub status_vigencia: Option<String>,
    pub lake_ingestao: Option<String>,
}

impl NormaDraft {
    /// Validate required fields and apply the sentinel origin default.
    ///
    /// Fails with [`ValidationError::MissingFields`] naming every absent or
    /// empty required field, so the client can fix them all in one pass.
    pub fn validate(mut self) -> Result<ValidatedDraft, ValidationError> {
        self.normalize();

        let mut missing = Vec::new();
        for (name, value) in [
            ("numero_norma", &self.numero_norma),
            ("tipo_norma", &self.tipo_norma),
            ("orgao_emissor", &self.orgao_emissor),
            ("titulo_da_norma", &self.titulo_da_norma),
        ] {
            if value.is_none() {
                missing.push(name.to_string());
            }
        }
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        Ok(ValidatedDraft {
            numero_norma: self.numero_norma.unwrap_or_default(),
            tipo_norma: self.tipo_norma.unwrap_or_default(),
            orgao_emissor: self.orgao_emissor.unwrap_or_default(),
            titulo_da_norma: self.titulo_da_norma.unwrap_or_default(),
            ementa: self.ementa,
            data_publicacao: self.data_publicacao,
            divisao_politica: self.divisao_politica,
            origem_dado: self
                .origem_dado
                .unwrap_or_else(|| ORIGEM_DADO_MANUAL.to_string()),
            origem_publicacao: self.origem_publicacao,
            status_vigencia: self.status_vigencia,
            lake_ingestao: self.lake_ingestao,
        })
    }

    /// Collapse blank strings to `None` so they land as NULL, not `''`.
    fn normalize(&mut self) {
        for field in [
            &mut self.numero_norma,
            &mut self.tipo_norma,
            &mut self.orgao_emissor,
            &mut self.titulo_da_norma,
            &mut self.ementa,
            &mut self.data_publicacao,
            &mut self.divisao_politica,
            &mut self.origem_dado,
            &mut self.origem_publicacao,
            &mut self.status_vigencia,
            &mut self.lake_ingestao,
        ] {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }
    }
}

/// A draft that passed validation: required fields are guaranteed non-empty
/// and the data-source origin is resolved.
#[derive(Debug, Clone)]
pub struct ValidatedDraft {
    pub numero_norma: String,
    pub tipo_norma: String,
    pub orgao_emissor: String,
    pub titulo_da_norma: String,
    pub ementa: Option<String>,
    pub data_publicacao: Option<String>,
    pub divisao_politica: Option<String>,
    pub origem_dado: String,
    pub origem_publicacao: Option<String>,
    pub status_vigencia: Option<String>,
    pub lake_ingestao: Option<String>,
}

/// Partial update: only supplied fields are written. Every successful patch
/// refreshes `atualizado_em` in the store.
///
/// `aplicavel` is accepted here because the observed update path allows it;
/// the reconciliation job remains the only systematic writer of that flag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NormaPatch {
    pub numero_norma: Option<String>,
    pub tipo_norma: Option<String>,
    pub orgao_emissor: Option<String>,
    pub titulo_da_norma: Option<String>,
    pub ementa: Option<String>,
    pub data_publicacao: Option<String>,
    pub divisao_politica: Option<String>,
    pub origem_dado: Option<String>,
    pub origem_publicacao: Option<String>,
    pub status_vigencia: Option<String>,
    pub lake_ingestao: Option<String>,
    pub aplicavel: Option<bool>,
}

impl NormaPatch {
    /// Normalize blank strings the way the catalogue always has: a supplied
    /// blank value on an optional column writes NULL; a blank value on a
    /// required column is rejected instead of tripping the NOT NULL
    /// constraint deep in the store.
    ///
    /// Optional columns keep `Some("")`-style input as an explicit clear, so
    /// the db layer distinguishes "not supplied" (`None`, column untouched)
    /// from "supplied blank" (cleared to NULL).
    pub fn validate(self) -> Result<Self, ValidationError> {
        let required: [(&'static str, &Option<String>); 4] = [
            ("numero_norma", &self.numero_norma),
            ("tipo_norma", &self.tipo_norma),
            ("orgao_emissor", &self.orgao_emissor),
            ("titulo_da_norma", &self.titulo_da_norma),
        ];
        for (name, field) in required {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ValidationError::BlankField(name));
            }
        }
        Ok(self)
    }

    /// True when no field is supplied; the store rejects empty patches.
    pub fn is_empty(&self) -> bool {
        self.numero_norma.is_none()
            && self.tipo_norma.is_none()
            && self.orgao_emissor.is_none()
            && self.titulo_da_norma.is_none()
            && self.ementa.is_none()
            && self.data_publicacao.is_none()
            && self.divisao_politica.is_none()
            && self.origem_dado.is_none()
            && self.origem_publicacao.is_none()
            && self.status_vigencia.is_none()
            && self.lake_ingestao.is_none()
            && self.aplicavel.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_draft() -> NormaDraft {
        NormaDraft {
            numero_norma: Some("12.345".to_string()),
            tipo_norma: Some("Lei".to_string()),
            orgao_emissor: Some("ANVISA".to_string()),
            titulo_da_norma: Some("Lei 12.345".to_string()),
            ..NormaDraft::default()
        }
    }

    #[test]
    fn valid_draft_passes() {
        let v = full_draft().validate().unwrap();
        assert_eq!(v.numero_norma, "12.345");
        assert_eq!(v.origem_dado, ORIGEM_DADO_MANUAL);
    }

    #[test]
    fn explicit_origem_dado_is_kept() {
        let mut draft = full_draft();
        draft.origem_dado = Some("CRAWLER-IBAMA".to_string());
        let v = draft.validate().unwrap();
        assert_eq!(v.origem_dado, "CRAWLER-IBAMA");
    }

    #[test]
    fn blank_origem_dado_falls_back_to_sentinel() {
        let mut draft = full_draft();
        draft.origem_dado = Some("   ".to_string());
        let v = draft.validate().unwrap();
        assert_eq!(v.origem_dado, ORIGEM_DADO_MANUAL);
    }

    #[test]
    fn missing_required_fields_are_all_reported() {
        let draft = NormaDraft {
            numero_norma: Some("1".to_string()),
            tipo_norma: Some("".to_string()),
            ..NormaDraft::default()
        };
        let err = draft.validate().unwrap_err();
        match err {
            ValidationError::MissingFields(fields) => {
                assert_eq!(
                    fields,
                    vec!["tipo_norma", "orgao_emissor", "titulo_da_norma"]
                );
            }
            other => panic!("expected MissingFields, got: {other:?}"),
        }
    }

    #[test]
    fn blank_optional_fields_become_none() {
        let mut draft = full_draft();
        draft.ementa = Some("".to_string());
        draft.data_publicacao = Some("  ".to_string());
        let v = draft.validate().unwrap();
        assert!(v.ementa.is_none());
        assert!(v.data_publicacao.is_none());
    }

    #[test]
    fn blank_required_field_in_patch_is_rejected() {
        let patch = NormaPatch {
            tipo_norma: Some("  ".to_string()),
            ..NormaPatch::default()
        };
        assert_eq!(
            patch.validate().unwrap_err(),
            ValidationError::BlankField("tipo_norma")
        );
    }

    #[test]
    fn blank_optional_field_in_patch_is_kept_as_clear() {
        let patch = NormaPatch {
            ementa: Some("".to_string()),
            ..NormaPatch::default()
        };
        let patch = patch.validate().unwrap();
        assert_eq!(patch.ementa, Some("".to_string()));
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(NormaPatch::default().is_empty());
        let patch = NormaPatch {
            ementa: Some("nova ementa".to_string()),
            ..NormaPatch::default()
        };
        assert!(!patch.is_empty());
    }
}
