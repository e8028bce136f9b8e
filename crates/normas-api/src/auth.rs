//! # Authentication Boundary
//!
//! Opaque bearer tokens: 32 random bytes, hex-encoded, handed to the client
//! once at login. Only the SHA-256 digest of the token is stored, so a
//! leaked session table cannot be replayed. Passwords are hashed with
//! Argon2id and verified in constant time by the `argon2` crate.
//!
//! The middleware in this module resolves `Authorization: Bearer <token>`
//! to a [`Principal`] request extension; handlers downstream read the
//! extension and never see the raw credential.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use normas_core::Principal;

use crate::db;
use crate::error::AppError;
use crate::state::AppState;

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(HEX_CHARS[(b >> 4) as usize] as char);
        out.push(HEX_CHARS[(b & 0x0f) as usize] as char);
    }
    out
}

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("falha ao gerar hash de senha: {e}")))
}

/// Verify a password against a stored hash. A malformed stored hash counts
/// as a failed verification, not an internal error.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Mint a fresh session token: 32 bytes from the OS generator, hex-encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes_to_hex(&bytes)
}

/// Storage digest of a session token.
pub fn token_digest(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    bytes_to_hex(&digest)
}

fn bearer_token(request: &Request) -> Result<&str, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Token de autenticação ausente".to_string()))?;
    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Token inválido".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Token inválido".to_string()))
}

/// Resolve the bearer token and attach the principal to the request.
/// Rejects missing headers, unknown or expired tokens, and inactive
/// accounts with 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request)?;
    let digest = token_digest(token);

    let principal =
        db::usuarios::find_principal_by_token_hash(&state.normas, &digest, Utc::now())
            .await?
            .ok_or_else(|| AppError::Unauthorized("Token inválido ou expirado".to_string()))?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Gate a route subtree to admin principals. Layered after
/// [`auth_middleware`], so the extension is always present.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .ok_or_else(|| AppError::Unauthorized("Token de autenticação ausente".to_string()))?;

    if !principal.tipo_usuario.is_admin() {
        return Err(AppError::Forbidden(
            "Acesso restrito a administradores".to_string(),
        ));
    }
    Ok(next.run(request).await)
}
