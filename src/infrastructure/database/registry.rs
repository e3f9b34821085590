//! Data Source Registry
//!
//! A named set of equivalent relational stores with a single active
//! selection. The registry is shared by reference across request handlers
//! and job managers; it is only mutated by `register` during init and by
//! `set_active`, both sequenced outside of active transactions.

use parking_lot::RwLock;
use sqlx::AnyPool;

use super::{create_pool, ensure_schema, Dialect};
use crate::shared::error::AppError;

/// One registered store.
#[derive(Debug, Clone)]
struct DataSource {
    name: String,
    label: String,
    url: String,
    dialect: Dialect,
    pool: Option<AnyPool>,
}

impl DataSource {
    /// Connection detail safe to show in API responses: the URL with any
    /// credential part removed.
    fn detail(&self) -> String {
        match self.url.split_once('@') {
            Some((scheme_and_creds, rest)) => {
                let scheme = scheme_and_creds.split("://").next().unwrap_or("");
                format!("{}://{}", scheme, rest)
            }
            None => self.url.clone(),
        }
    }
}

/// Public description of a registered source, for the `/datasource` surface.
#[derive(Debug, Clone)]
pub struct SourceDescription {
    pub name: String,
    pub label: String,
    pub detail: String,
    pub available: bool,
}

#[derive(Default)]
struct RegistryInner {
    /// Registration order is the presentation order.
    sources: Vec<DataSource>,
    active: String,
}

/// Registry of named data sources with one active selection.
pub struct DataSourceRegistry {
    inner: RwLock<RegistryInner>,
    max_connections: u32,
}

impl DataSourceRegistry {
    pub fn new(max_connections: u32) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            max_connections,
        }
    }

    /// Register a store under a name. The first registered source becomes
    /// the active one. Registering an existing name replaces its URL.
    pub fn register(&self, name: &str, label: &str, url: &str) {
        let mut inner = self.inner.write();
        let source = DataSource {
            name: name.to_string(),
            label: label.to_string(),
            url: url.to_string(),
            dialect: Dialect::from_url(url),
            pool: None,
        };
        if let Some(existing) = inner.sources.iter_mut().find(|s| s.name == name) {
            *existing = source;
        } else {
            inner.sources.push(source);
        }
        if inner.active.is_empty() {
            inner.active = name.to_string();
        }
    }

    /// Connect every registered source and ensure the archive schema exists
    /// on each. Sources that fail to connect stay unavailable but do not
    /// abort startup unless they are the active one.
    pub async fn connect_all(&self) -> Result<(), AppError> {
        let targets: Vec<(String, String)> = {
            let inner = self.inner.read();
            inner
                .sources
                .iter()
                .filter(|s| s.pool.is_none())
                .map(|s| (s.name.clone(), s.url.clone()))
                .collect()
        };

        for (name, url) in targets {
            match create_pool(&url, self.max_connections).await {
                Ok(pool) => {
                    ensure_schema(&pool).await?;
                    tracing::info!(source = %name, "Data source connected");
                    let mut inner = self.inner.write();
                    if let Some(source) = inner.sources.iter_mut().find(|s| s.name == name) {
                        source.pool = Some(pool);
                    }
                }
                Err(e) => {
                    let is_active = self.inner.read().active == name;
                    if is_active {
                        return Err(AppError::Database(e));
                    }
                    tracing::warn!(source = %name, error = %e, "Data source unavailable");
                }
            }
        }
        Ok(())
    }

    /// Close every connected pool. Run at shutdown.
    pub async fn disconnect_all(&self) {
        let pools: Vec<(String, AnyPool)> = {
            let mut inner = self.inner.write();
            inner
                .sources
                .iter_mut()
                .filter_map(|s| s.pool.take().map(|p| (s.name.clone(), p)))
                .collect()
        };
        for (name, pool) in pools {
            pool.close().await;
            tracing::info!(source = %name, "Data source disconnected");
        }
    }

    /// The pool of the currently active source. Fails fast when the active
    /// name is unregistered or not connected.
    pub fn get_active(&self) -> Result<AnyPool, AppError> {
        let inner = self.inner.read();
        let active = inner.active.clone();
        inner
            .sources
            .iter()
            .find(|s| s.name == active)
            .and_then(|s| s.pool.clone())
            .ok_or(AppError::UnknownSource(active))
    }

    /// The pool of a specific source by name.
    pub fn get(&self, name: &str) -> Result<AnyPool, AppError> {
        let inner = self.inner.read();
        inner
            .sources
            .iter()
            .find(|s| s.name == name)
            .and_then(|s| s.pool.clone())
            .ok_or_else(|| AppError::UnknownSource(name.to_string()))
    }

    /// The dialect of a specific source by name.
    pub fn dialect(&self, name: &str) -> Result<Dialect, AppError> {
        let inner = self.inner.read();
        inner
            .sources
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.dialect)
            .ok_or_else(|| AppError::UnknownSource(name.to_string()))
    }

    /// Switch the active source. Atomic from the caller's perspective:
    /// `get_active` calls after this return the new handle.
    pub fn set_active(&self, name: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write();
        if !inner.sources.iter().any(|s| s.name == name) {
            return Err(AppError::UnknownSource(name.to_string()));
        }
        inner.active = name.to_string();
        tracing::info!(source = %name, "Active data source switched");
        Ok(())
    }

    /// The name of the active source.
    pub fn active_name(&self) -> String {
        self.inner.read().active.clone()
    }

    /// Registered source names, in registration order.
    pub fn available_sources(&self) -> Vec<String> {
        self.inner.read().sources.iter().map(|s| s.name.clone()).collect()
    }

    /// Whether a source is registered and connected.
    pub fn is_available(&self, name: &str) -> bool {
        self.inner
            .read()
            .sources
            .iter()
            .any(|s| s.name == name && s.pool.is_some())
    }

    /// Descriptions of every registered source, in registration order.
    pub fn describe(&self) -> Vec<SourceDescription> {
        self.inner
            .read()
            .sources
            .iter()
            .map(|s| SourceDescription {
                name: s.name.clone(),
                label: s.label.clone(),
                detail: s.detail(),
                available: s.pool.is_some(),
            })
            .collect()
    }
}
