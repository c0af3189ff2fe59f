//! Database Connection Pool Module
//!
//! PostgreSQL persistence for resources and idempotency records using
//! deadpool-postgres. Every resource statement carries the tenant column in
//! its WHERE clause except the maintenance scan behind `select_stuck`.

use crate::error::ApiError;
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolError, RecyclingMethod, Runtime};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tandem_core::{
    Resource, ResourcePatch, ResourceSpec, ResourceStatus, StorageError, TenantId, Timestamp,
};
use tandem_storage::{
    IdempotencyRecord, IdempotencyStore, ResourceFilter, ResourceKey, ResourceStore,
    StorageResult,
};
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

const SCHEMA_SQL: &str = include_str!("../migrations/0001_init.sql");

const RESOURCE_COLUMNS: &str = "id, tenant_id, kind, name, description, status, remote_id, \
                                provider_voice_id, spec, training_info, created_at, updated_at";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to create pool: {0}")]
    CreatePool(String),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("Corrupt row: {0}")]
    Decode(String),
}

impl From<DbError> for StorageError {
    fn from(err: DbError) -> Self {
        StorageError::Backend {
            reason: err.to_string(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        tracing::error!(error = %err, "Database error");
        ApiError::database_error(err.to_string())
    }
}

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: SecretString,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait timeout when checking out a connection
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "tandem".to_string(),
            user: "postgres".to_string(),
            password: SecretString::new(String::new().into_boxed_str()),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Read `TANDEM_DB_HOST`, `TANDEM_DB_PORT`, `TANDEM_DB_NAME`,
    /// `TANDEM_DB_USER`, `TANDEM_DB_PASSWORD`, `TANDEM_DB_POOL_SIZE` and
    /// `TANDEM_DB_TIMEOUT`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("TANDEM_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("TANDEM_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("TANDEM_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("TANDEM_DB_USER").unwrap_or(defaults.user),
            password: SecretString::new(
                std::env::var("TANDEM_DB_PASSWORD")
                    .unwrap_or_default()
                    .into_boxed_str(),
            ),
            max_size: std::env::var("TANDEM_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|size| *size > 0)
                .unwrap_or(defaults.max_size),
            timeout: Duration::from_secs(
                std::env::var("TANDEM_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Whether a database was configured at all. Without one the server
    /// falls back to in-memory stores.
    pub fn is_configured() -> bool {
        std::env::var("TANDEM_DB_HOST").is_ok_and(|host| !host.trim().is_empty())
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> Result<Pool, DbError> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.expose_secret().to_string());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(deadpool_postgres::PoolConfig::new(self.max_size));

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DbError::CreatePool(e.to_string()))
    }
}

// ============================================================================
// QUERY BUILDING
// ============================================================================

type Param = Box<dyn ToSql + Sync + Send>;

/// Positional WHERE clause accumulator.
#[derive(Default)]
struct Conditions {
    clauses: Vec<String>,
    params: Vec<Param>,
}

impl Conditions {
    fn eq<T: ToSql + Sync + Send + 'static>(&mut self, column: &str, value: T) {
        self.params.push(Box::new(value));
        self.clauses.push(format!("{} = ${}", column, self.params.len()));
    }

    fn raw(&mut self, clause: &str) {
        self.clauses.push(clause.to_string());
    }

    fn bind<T: ToSql + Sync + Send + 'static>(&mut self, value: T) -> usize {
        self.params.push(Box::new(value));
        self.params.len()
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    fn refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect()
    }
}

fn select_query(filter: &ResourceFilter) -> (String, Conditions) {
    let mut conditions = Conditions::default();
    conditions.eq("tenant_id", filter.tenant_id.as_str().to_string());
    if let Some(id) = filter.id {
        conditions.eq("id", id);
    }
    if let Some(kind) = filter.kind {
        conditions.eq("kind", kind.as_str().to_string());
    }
    if let Some(status) = filter.status {
        conditions.eq("status", status.as_db_str().to_string());
    }
    if let Some(remote_id) = &filter.remote_id {
        conditions.eq("remote_id", remote_id.clone());
    }
    if let Some(provider_voice_id) = &filter.provider_voice_id {
        conditions.eq("provider_voice_id", provider_voice_id.clone());
    }
    match filter.has_remote_id {
        Some(true) => conditions.raw("remote_id IS NOT NULL"),
        Some(false) => conditions.raw("remote_id IS NULL"),
        None => {}
    }

    let mut sql = format!(
        "SELECT {} FROM resources{} ORDER BY created_at DESC, id DESC",
        RESOURCE_COLUMNS,
        conditions.where_sql()
    );
    if let Some(limit) = filter.limit {
        let n = conditions.bind(limit as i64);
        sql.push_str(&format!(" LIMIT ${}", n));
    }
    (sql, conditions)
}

fn row_to_resource(row: &Row) -> Result<Resource, DbError> {
    let tenant_raw: String = row.try_get("tenant_id")?;
    let tenant_id = TenantId::parse(&tenant_raw).map_err(|e| DbError::Decode(e.to_string()))?;
    let status_raw: String = row.try_get("status")?;
    let status = status_raw
        .parse::<ResourceStatus>()
        .map_err(|e| DbError::Decode(e.to_string()))?;
    let spec_json: JsonValue = row.try_get("spec")?;
    let spec: ResourceSpec =
        serde_json::from_value(spec_json).map_err(|e| DbError::Decode(e.to_string()))?;

    Ok(Resource {
        id: row.try_get("id")?,
        tenant_id,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        status,
        remote_id: row.try_get("remote_id")?,
        spec,
        training_info: row.try_get("training_info")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn spec_columns(resource: &Resource) -> Result<(JsonValue, Option<String>), DbError> {
    let spec = serde_json::to_value(&resource.spec).map_err(|e| DbError::Decode(e.to_string()))?;
    let provider_voice_id = resource
        .as_voice()
        .and_then(|voice| voice.provider_voice_id.clone());
    Ok((spec, provider_voice_id))
}

fn row_to_record(row: &Row) -> Result<IdempotencyRecord, DbError> {
    let tenant_raw: String = row.try_get("tenant_id")?;
    let status_code: i32 = row.try_get("status_code")?;
    Ok(IdempotencyRecord {
        tenant_id: TenantId::parse(&tenant_raw).map_err(|e| DbError::Decode(e.to_string()))?,
        key: row.try_get("key")?,
        fingerprint: row.try_get("fingerprint")?,
        status_code: u16::try_from(status_code)
            .map_err(|_| DbError::Decode(format!("status code {} out of range", status_code)))?,
        response_body: row.try_get("response_body")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

// ============================================================================
// POSTGRES STORE
// ============================================================================

/// Postgres-backed [`ResourceStore`] and [`IdempotencyStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> Result<Self, DbError> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Create tables and indexes if missing.
    pub async fn migrate(&self) -> Result<(), DbError> {
        let conn = self.pool.get().await?;
        conn.batch_execute(SCHEMA_SQL).await?;
        tracing::info!("Database schema ready");
        Ok(())
    }

    async fn conn(&self) -> Result<deadpool_postgres::Object, DbError> {
        Ok(self.pool.get().await?)
    }

    async fn insert_resource(&self, resource: &Resource) -> Result<(), DbError> {
        let conn = self.conn().await?;
        let (spec, provider_voice_id) = spec_columns(resource)?;
        let sql = format!(
            "INSERT INTO resources ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            RESOURCE_COLUMNS
        );
        conn.execute(
            sql.as_str(),
            &[
                &resource.id,
                &resource.tenant_id.as_str(),
                &resource.kind().as_str(),
                &resource.name,
                &resource.description,
                &resource.status.as_db_str(),
                &resource.remote_id,
                &provider_voice_id,
                &spec,
                &resource.training_info,
                &resource.created_at,
                &resource.updated_at,
            ],
        )
        .await?;
        Ok(())
    }

    async fn select_resources(&self, filter: &ResourceFilter) -> Result<Vec<Resource>, DbError> {
        let conn = self.conn().await?;
        let (sql, conditions) = select_query(filter);
        let rows = conn.query(sql.as_str(), &conditions.refs()).await?;
        rows.iter().map(row_to_resource).collect()
    }

    /// Read-modify-write under a row lock so concurrent patches do not
    /// interleave.
    async fn update_resource(
        &self,
        key: &ResourceKey,
        patch: &ResourcePatch,
    ) -> Result<Option<Resource>, DbError> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;

        let sql = format!(
            "SELECT {} FROM resources WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
            RESOURCE_COLUMNS
        );
        let row = tx
            .query_opt(sql.as_str(), &[&key.tenant_id.as_str(), &key.id])
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut resource = row_to_resource(&row)?;
        resource.apply(patch);
        let (spec, provider_voice_id) = spec_columns(&resource)?;

        tx.execute(
            "UPDATE resources SET name = $3, description = $4, status = $5, remote_id = $6, \
             provider_voice_id = $7, spec = $8, training_info = $9, updated_at = $10 \
             WHERE tenant_id = $1 AND id = $2",
            &[
                &key.tenant_id.as_str(),
                &key.id,
                &resource.name,
                &resource.description,
                &resource.status.as_db_str(),
                &resource.remote_id,
                &provider_voice_id,
                &spec,
                &resource.training_info,
                &resource.updated_at,
            ],
        )
        .await?;
        tx.commit().await?;
        Ok(Some(resource))
    }

    async fn delete_resource(&self, key: &ResourceKey) -> Result<bool, DbError> {
        let conn = self.conn().await?;
        let removed = conn
            .execute(
                "DELETE FROM resources WHERE tenant_id = $1 AND id = $2",
                &[&key.tenant_id.as_str(), &key.id],
            )
            .await?;
        Ok(removed > 0)
    }

    async fn select_stuck_resources(
        &self,
        status: ResourceStatus,
        updated_before: Timestamp,
        limit: usize,
    ) -> Result<Vec<Resource>, DbError> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT {} FROM resources WHERE status = $1 AND updated_at < $2 \
             ORDER BY updated_at ASC LIMIT $3",
            RESOURCE_COLUMNS
        );
        let rows = conn
            .query(
                sql.as_str(),
                &[&status.as_db_str(), &updated_before, &(limit as i64)],
            )
            .await?;
        rows.iter().map(row_to_resource).collect()
    }

    async fn get_record(
        &self,
        tenant_id: &TenantId,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, DbError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "SELECT tenant_id, key, fingerprint, status_code, response_body, created_at, expires_at \
                 FROM idempotency_keys WHERE tenant_id = $1 AND key = $2 AND expires_at > now()",
                &[&tenant_id.as_str(), &key],
            )
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    /// Expired rows for the same key are replaced; live rows are kept.
    async fn put_record(&self, record: &IdempotencyRecord) -> Result<bool, DbError> {
        let conn = self.conn().await?;
        let stored = conn
            .execute(
                "INSERT INTO idempotency_keys \
                 (tenant_id, key, fingerprint, status_code, response_body, created_at, expires_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (tenant_id, key) DO UPDATE SET \
                 fingerprint = EXCLUDED.fingerprint, status_code = EXCLUDED.status_code, \
                 response_body = EXCLUDED.response_body, created_at = EXCLUDED.created_at, \
                 expires_at = EXCLUDED.expires_at \
                 WHERE idempotency_keys.expires_at <= EXCLUDED.created_at",
                &[
                    &record.tenant_id.as_str(),
                    &record.key,
                    &record.fingerprint,
                    &i32::from(record.status_code),
                    &record.response_body,
                    &record.created_at,
                    &record.expires_at,
                ],
            )
            .await?;
        Ok(stored > 0)
    }

    async fn purge_records(&self, now: Timestamp) -> Result<u64, DbError> {
        let conn = self.conn().await?;
        Ok(conn
            .execute("DELETE FROM idempotency_keys WHERE expires_at <= $1", &[&now])
            .await?)
    }
}

#[async_trait]
impl ResourceStore for PgStore {
    async fn insert(&self, resource: &Resource) -> StorageResult<()> {
        self.insert_resource(resource).await.map_err(|e| StorageError::InsertFailed {
            kind: resource.kind(),
            id: resource.id,
            reason: e.to_string(),
        })
    }

    async fn select(&self, filter: &ResourceFilter) -> StorageResult<Vec<Resource>> {
        Ok(self.select_resources(filter).await?)
    }

    async fn update(
        &self,
        key: &ResourceKey,
        patch: &ResourcePatch,
    ) -> StorageResult<Option<Resource>> {
        self.update_resource(key, patch)
            .await
            .map_err(|e| StorageError::UpdateFailed {
                id: key.id,
                reason: e.to_string(),
            })
    }

    async fn delete(&self, key: &ResourceKey) -> StorageResult<bool> {
        Ok(self.delete_resource(key).await?)
    }

    async fn select_stuck(
        &self,
        status: ResourceStatus,
        updated_before: Timestamp,
        limit: usize,
    ) -> StorageResult<Vec<Resource>> {
        Ok(self
            .select_stuck_resources(status, updated_before, limit)
            .await?)
    }
}

#[async_trait]
impl IdempotencyStore for PgStore {
    async fn get(&self, tenant_id: &TenantId, key: &str) -> StorageResult<Option<IdempotencyRecord>> {
        Ok(self.get_record(tenant_id, key).await?)
    }

    async fn put(&self, record: &IdempotencyRecord) -> StorageResult<bool> {
        Ok(self.put_record(record).await?)
    }

    async fn purge_expired(&self, now: Timestamp) -> StorageResult<u64> {
        Ok(self.purge_records(now).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::ResourceKind;

    fn tenant() -> TenantId {
        TenantId::parse("org_1").unwrap()
    }

    #[test]
    fn test_select_always_scoped_to_tenant() {
        let (sql, conditions) = select_query(&ResourceFilter::tenant(tenant()));
        assert!(sql.contains("WHERE tenant_id = $1"));
        assert!(sql.ends_with("ORDER BY created_at DESC, id DESC"));
        assert_eq!(conditions.params.len(), 1);
    }

    #[test]
    fn test_select_numbers_placeholders_in_order() {
        let filter = ResourceFilter::tenant(tenant())
            .kind(ResourceKind::Voice)
            .provider_voice_id("el_rachel")
            .has_remote_id(true)
            .limit(5);
        let (sql, conditions) = select_query(&filter);

        assert!(sql.contains(
            "WHERE tenant_id = $1 AND kind = $2 AND provider_voice_id = $3 AND remote_id IS NOT NULL"
        ));
        assert!(sql.ends_with("LIMIT $4"));
        assert_eq!(conditions.params.len(), 4);
    }

    #[test]
    fn test_db_config_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.port, 5432);
        assert_eq!(config.dbname, "tandem");
        assert_eq!(config.max_size, 16);
    }

    #[test]
    fn test_db_error_maps_to_backend_storage_error() {
        let err = StorageError::from(DbError::Decode("bad status".to_string()));
        assert!(matches!(err, StorageError::Backend { reason } if reason.contains("bad status")));
    }

    #[test]
    fn test_schema_declares_both_tables() {
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS resources"));
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS idempotency_keys"));
    }

    #[cfg(feature = "db-tests")]
    mod live {
        use super::*;
        use tandem_core::AgentSpec;

        async fn store() -> PgStore {
            let store = PgStore::from_config(&DbConfig::from_env()).unwrap();
            store.migrate().await.unwrap();
            store
        }

        #[tokio::test]
        async fn test_resource_round_trip_is_tenant_scoped() {
            let store = store().await;
            let resource = Resource::new(
                tenant(),
                "Receptionist",
                None,
                ResourceSpec::Agent(AgentSpec::default()),
            );
            store.insert(&resource).await.unwrap();

            let other = TenantId::parse("org_other").unwrap();
            let foreign = ResourceKey::new(other, resource.id);
            assert!(store
                .update(&foreign, &ResourcePatch::status(ResourceStatus::Failed))
                .await
                .unwrap()
                .is_none());
            assert!(!store.delete(&foreign).await.unwrap());

            let key = ResourceKey::of(&resource);
            let fetched = store.select_one(&ResourceFilter::key(&key)).await.unwrap();
            assert_eq!(fetched.map(|r| r.id), Some(resource.id));
            assert!(store.delete(&key).await.unwrap());
        }

        #[tokio::test]
        async fn test_idempotency_put_keeps_live_record() {
            let store = store().await;
            let key = uuid::Uuid::now_v7().to_string();
            let first = IdempotencyRecord::new(
                tenant(),
                key.clone(),
                "fp1",
                201,
                b"{}".to_vec(),
                chrono::Duration::hours(1),
            );
            let second = IdempotencyRecord {
                fingerprint: "fp2".to_string(),
                ..first.clone()
            };
            assert!(store.put(&first).await.unwrap());
            assert!(!store.put(&second).await.unwrap());
            let stored = store.get(&tenant(), &key).await.unwrap().unwrap();
            assert_eq!(stored.fingerprint, "fp1");
        }
    }
}
