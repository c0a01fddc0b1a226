//! Postgres-backed grant store.
//!
//! Codes are stored folded to lowercase (the same folding [`Permission`]
//! applies), so the lookups below are plain equality joins.
//!
//! ## Tables
//!
//! - `permission_definitions(code PK, enabled, description)`
//! - `role_permissions(role_name, code)`
//! - `user_permissions(user_id, code)`

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use staybook_auth::{
    GrantSnapshot, GrantStore, GrantStoreError, Permission, PermissionDefinition, Role, RoleGrant,
    UserGrant,
};
use staybook_core::UserId;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS permission_definitions (
        code        TEXT PRIMARY KEY,
        enabled     BOOLEAN NOT NULL DEFAULT TRUE,
        description TEXT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS role_permissions (
        role_name TEXT NOT NULL,
        code      TEXT NOT NULL REFERENCES permission_definitions(code) ON DELETE CASCADE,
        PRIMARY KEY (role_name, code)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_permissions (
        user_id UUID NOT NULL,
        code    TEXT NOT NULL REFERENCES permission_definitions(code) ON DELETE CASCADE,
        PRIMARY KEY (user_id, code)
    )
    "#,
];

/// Grant store over a shared `PgPool`.
#[derive(Debug, Clone)]
pub struct PgGrantStore {
    pool: PgPool,
}

impl PgGrantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let pool = PgPool::connect(database_url)
            .await
            .context("failed to connect grant store to postgres")?;
        Ok(Self::new(pool))
    }

    /// Create the grant tables if they do not exist. Idempotent.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn define(&self, definition: &PermissionDefinition) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO permission_definitions (code, enabled, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (code) DO UPDATE SET
                enabled = excluded.enabled,
                description = excluded.description
            "#,
        )
        .bind(definition.code.as_str())
        .bind(definition.enabled)
        .bind(definition.description.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn grant_to_role(&self, role: &Role, code: &Permission) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO role_permissions (role_name, code) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(role.as_str())
        .bind(code.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn grant_to_user(&self, user_id: UserId, code: &Permission) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_permissions (user_id, code) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id.as_uuid())
        .bind(code.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn query_error(e: sqlx::Error) -> GrantStoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            GrantStoreError::Unavailable(e.to_string())
        }
        other => GrantStoreError::Query(other.to_string()),
    }
}

#[async_trait]
impl GrantStore for PgGrantStore {
    async fn snapshot_for(
        &self,
        user_id: UserId,
        roles: &[Role],
    ) -> Result<GrantSnapshot, GrantStoreError> {
        let role_names: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();

        let role_rows = sqlx::query(
            r#"
            SELECT role_name, code
            FROM role_permissions
            WHERE role_name = ANY($1)
            "#,
        )
        .bind(&role_names)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        let user_rows = sqlx::query(
            r#"
            SELECT code
            FROM user_permissions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        let definition_rows = sqlx::query(
            r#"
            SELECT d.code, d.enabled, d.description
            FROM permission_definitions d
            WHERE d.code IN (
                SELECT code FROM role_permissions WHERE role_name = ANY($1)
                UNION
                SELECT code FROM user_permissions WHERE user_id = $2
            )
            "#,
        )
        .bind(&role_names)
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        let mut snapshot = GrantSnapshot::default();

        for row in role_rows {
            let role: String = row.try_get("role_name").map_err(query_error)?;
            let code: String = row.try_get("code").map_err(query_error)?;
            snapshot.role_grants.push(RoleGrant {
                role: Role::new(role),
                code: Permission::new(code),
            });
        }

        for row in user_rows {
            let code: String = row.try_get("code").map_err(query_error)?;
            snapshot.user_grants.push(UserGrant {
                user_id,
                code: Permission::new(code),
            });
        }

        for row in definition_rows {
            let code: String = row.try_get("code").map_err(query_error)?;
            snapshot.definitions.push(PermissionDefinition {
                code: Permission::new(code),
                enabled: row.try_get("enabled").map_err(query_error)?,
                description: row.try_get("description").map_err(query_error)?,
            });
        }

        tracing::trace!(
            %user_id,
            role_grants = snapshot.role_grants.len(),
            user_grants = snapshot.user_grants.len(),
            "loaded grant snapshot"
        );

        Ok(snapshot)
    }
}
