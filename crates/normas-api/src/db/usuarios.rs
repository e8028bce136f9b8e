//! User-account and session persistence. The `password_hash` column stays
//! inside this module: callers receive either the hash-free [`Usuario`]
//! projection or, for credential checks, the dedicated [`Credenciais`] pair.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use normas_core::{Principal, TipoUsuario, Usuario};

/// Hash plus the owning account, for the login path only.
pub struct Credenciais {
    pub usuario: Usuario,
    pub password_hash: String,
}

fn parse_tipo(raw: &str) -> Result<TipoUsuario, sqlx::Error> {
    TipoUsuario::from_str(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

#[derive(sqlx::FromRow)]
struct UsuarioRow {
    id: i64,
    username: String,
    nome_completo: String,
    tipo_usuario: String,
    ativo: bool,
    data_criacao: DateTime<Utc>,
}

impl UsuarioRow {
    fn into_usuario(self) -> Result<Usuario, sqlx::Error> {
        Ok(Usuario {
            id: self.id,
            username: self.username,
            nome_completo: self.nome_completo,
            tipo_usuario: parse_tipo(&self.tipo_usuario)?,
            ativo: self.ativo,
            data_criacao: self.data_criacao,
        })
    }
}

const USUARIO_COLUMNS: &str = "id, username, nome_completo, tipo_usuario, ativo, data_criacao";

pub async fn find_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<Credenciais>, sqlx::Error> {
    #[derive(sqlx::FromRow)]
    struct Row {
        id: i64,
        username: String,
        password_hash: String,
        nome_completo: String,
        tipo_usuario: String,
        ativo: bool,
        data_criacao: DateTime<Utc>,
    }

    let row: Option<Row> = sqlx::query_as(
        "SELECT id, username, password_hash, nome_completo, tipo_usuario, ativo, data_criacao \
         FROM tb_usuarios WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    row.map(|r| {
        Ok(Credenciais {
            usuario: Usuario {
                id: r.id,
                username: r.username,
                nome_completo: r.nome_completo,
                tipo_usuario: parse_tipo(&r.tipo_usuario)?,
                ativo: r.ativo,
                data_criacao: r.data_criacao,
            },
            password_hash: r.password_hash,
        })
    })
    .transpose()
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Usuario>, sqlx::Error> {
    let row: Option<UsuarioRow> = sqlx::query_as(&format!(
        "SELECT {USUARIO_COLUMNS} FROM tb_usuarios WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(UsuarioRow::into_usuario).transpose()
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Usuario>, sqlx::Error> {
    let rows: Vec<UsuarioRow> = sqlx::query_as(&format!(
        "SELECT {USUARIO_COLUMNS} FROM tb_usuarios ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(UsuarioRow::into_usuario).collect()
}

pub async fn username_exists(pool: &SqlitePool, username: &str) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tb_usuarios WHERE username = ?")
        .bind(username)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn count_admins(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM tb_usuarios WHERE tipo_usuario = 'admin'")
        .fetch_one(pool)
        .await
}

pub async fn create(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
    nome_completo: &str,
    tipo_usuario: TipoUsuario,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO tb_usuarios (username, password_hash, nome_completo, tipo_usuario, ativo, data_criacao) \
         VALUES (?, ?, ?, ?, 1, ?) RETURNING id",
    )
    .bind(username)
    .bind(password_hash)
    .bind(nome_completo)
    .bind(tipo_usuario.as_str())
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Fields an admin may change on an account. `None` leaves the column as is.
#[derive(Default)]
pub struct UsuarioUpdate<'a> {
    pub nome_completo: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub tipo_usuario: Option<TipoUsuario>,
    pub ativo: Option<bool>,
}

impl UsuarioUpdate<'_> {
    pub fn is_empty(&self) -> bool {
        self.nome_completo.is_none()
            && self.password_hash.is_none()
            && self.tipo_usuario.is_none()
            && self.ativo.is_none()
    }
}

/// Apply a partial account update. Returns false when the id does not exist.
pub async fn update(
    pool: &SqlitePool,
    id: i64,
    changes: &UsuarioUpdate<'_>,
) -> Result<bool, sqlx::Error> {
    if changes.is_empty() {
        return Ok(false);
    }

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE tb_usuarios SET ");
    let mut sets = qb.separated(", ");
    if let Some(v) = changes.nome_completo {
        sets.push("nome_completo = ").push_bind_unseparated(v);
    }
    if let Some(v) = changes.password_hash {
        sets.push("password_hash = ").push_bind_unseparated(v);
    }
    if let Some(v) = changes.tipo_usuario {
        sets.push("tipo_usuario = ").push_bind_unseparated(v.as_str());
    }
    if let Some(v) = changes.ativo {
        sets.push("ativo = ").push_bind_unseparated(v);
    }
    qb.push(" WHERE id = ").push_bind(id);

    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Delete an account and every session it owns.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query("DELETE FROM tb_sessoes WHERE usuario_id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    let result = sqlx::query("DELETE FROM tb_usuarios WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Record a session keyed by the token digest. The raw token is never stored.
pub async fn create_session(
    pool: &SqlitePool,
    usuario_id: i64,
    token_hash: &str,
    criado_em: DateTime<Utc>,
    expira_em: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO tb_sessoes (usuario_id, token_hash, criado_em, expira_em) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(usuario_id)
    .bind(token_hash)
    .bind(criado_em)
    .bind(expira_em)
    .execute(pool)
    .await?;
    Ok(())
}

/// Resolve a token digest to its principal. `None` for unknown digests,
/// expired sessions, or inactive accounts.
pub async fn find_principal_by_token_hash(
    pool: &SqlitePool,
    token_hash: &str,
    now: DateTime<Utc>,
) -> Result<Option<Principal>, sqlx::Error> {
    #[derive(sqlx::FromRow)]
    struct Row {
        id: i64,
        username: String,
        nome_completo: String,
        tipo_usuario: String,
        ativo: bool,
    }

    let row: Option<Row> = sqlx::query_as(
        "SELECT u.id, u.username, u.nome_completo, u.tipo_usuario, u.ativo \
         FROM tb_sessoes s JOIN tb_usuarios u ON u.id = s.usuario_id \
         WHERE s.token_hash = ? AND s.expira_em > ? AND u.ativo = 1",
    )
    .bind(token_hash)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    row.map(|r| {
        Ok(Principal {
            id: r.id,
            username: r.username,
            nome_completo: r.nome_completo,
            tipo_usuario: parse_tipo(&r.tipo_usuario)?,
            ativo: r.ativo,
        })
    })
    .transpose()
}

/// Drop sessions past their expiry. Called opportunistically on login.
pub async fn prune_expired(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tb_sessoes WHERE expira_em <= ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::normas_pool;
    use chrono::Duration;

    async fn seed_user(pool: &SqlitePool, username: &str, tipo: TipoUsuario) -> i64 {
        create(pool, username, "$argon2$fake", "Conta Teste", tipo, Utc::now())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn created_user_is_listed_without_hash() {
        let pool = normas_pool().await;
        let id = seed_user(&pool, "ana", TipoUsuario::User).await;

        let usuarios = list(&pool).await.unwrap();
        assert_eq!(usuarios.len(), 1);
        assert_eq!(usuarios[0].id, id);
        assert_eq!(usuarios[0].username, "ana");
        assert!(usuarios[0].ativo);
    }

    #[tokio::test]
    async fn duplicate_username_is_detected() {
        let pool = normas_pool().await;
        seed_user(&pool, "ana", TipoUsuario::User).await;
        assert!(username_exists(&pool, "ana").await.unwrap());
        assert!(!username_exists(&pool, "bia").await.unwrap());
    }

    #[tokio::test]
    async fn admin_count_tracks_roles() {
        let pool = normas_pool().await;
        seed_user(&pool, "root", TipoUsuario::Admin).await;
        seed_user(&pool, "ana", TipoUsuario::User).await;
        assert_eq!(count_admins(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn partial_update_changes_only_named_fields() {
        let pool = normas_pool().await;
        let id = seed_user(&pool, "ana", TipoUsuario::User).await;

        let changes = UsuarioUpdate {
            tipo_usuario: Some(TipoUsuario::Admin),
            ativo: Some(false),
            ..UsuarioUpdate::default()
        };
        assert!(update(&pool, id, &changes).await.unwrap());

        let usuario = find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(usuario.tipo_usuario, TipoUsuario::Admin);
        assert!(!usuario.ativo);
        assert_eq!(usuario.username, "ana");
    }

    #[tokio::test]
    async fn empty_update_is_a_no_op() {
        let pool = normas_pool().await;
        let id = seed_user(&pool, "ana", TipoUsuario::User).await;
        assert!(!update(&pool, id, &UsuarioUpdate::default()).await.unwrap());
    }

    #[tokio::test]
    async fn session_resolves_to_principal_until_expiry() {
        let pool = normas_pool().await;
        let id = seed_user(&pool, "ana", TipoUsuario::User).await;
        let now = Utc::now();
        create_session(&pool, id, "digest-1", now, now + Duration::days(7))
            .await
            .unwrap();

        let principal = find_principal_by_token_hash(&pool, "digest-1", now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(principal.username, "ana");

        let after = now + Duration::days(8);
        assert!(find_principal_by_token_hash(&pool, "digest-1", after)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn inactive_account_invalidates_its_sessions() {
        let pool = normas_pool().await;
        let id = seed_user(&pool, "ana", TipoUsuario::User).await;
        let now = Utc::now();
        create_session(&pool, id, "digest-2", now, now + Duration::days(7))
            .await
            .unwrap();

        let changes = UsuarioUpdate {
            ativo: Some(false),
            ..UsuarioUpdate::default()
        };
        update(&pool, id, &changes).await.unwrap();

        assert!(find_principal_by_token_hash(&pool, "digest-2", now)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn deleting_a_user_removes_their_sessions() {
        let pool = normas_pool().await;
        let id = seed_user(&pool, "ana", TipoUsuario::User).await;
        let now = Utc::now();
        create_session(&pool, id, "digest-3", now, now + Duration::days(7))
            .await
            .unwrap();

        assert!(delete(&pool, id).await.unwrap());
        assert!(find_principal_by_token_hash(&pool, "digest-3", now)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn prune_drops_only_expired_sessions() {
        let pool = normas_pool().await;
        let id = seed_user(&pool, "ana", TipoUsuario::User).await;
        let now = Utc::now();
        create_session(&pool, id, "old", now - Duration::days(8), now - Duration::days(1))
            .await
            .unwrap();
        create_session(&pool, id, "fresh", now, now + Duration::days(7))
            .await
            .unwrap();

        assert_eq!(prune_expired(&pool, now).await.unwrap(), 1);
        assert!(find_principal_by_token_hash(&pool, "fresh", now)
            .await
            .unwrap()
            .is_some());
    }
}
