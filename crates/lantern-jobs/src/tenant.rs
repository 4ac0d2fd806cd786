//! Tenant resolution and scoping for job executions.

use async_trait::async_trait;
use lantern_scheduler::JobDataMap;
use lantern_transient::Fault;
use serde::{Deserialize, Serialize};

use crate::keys::TENANT_ID;

/// Isolation boundary a job executes within.
///
/// `id: None` is the default tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl Tenant {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
        }
    }

    pub fn id_or_default(&self) -> &str {
        self.id.as_deref().unwrap_or("default")
    }
}

/// Guard returned by [`TenantResolver::push_context`].
///
/// The tenant context is popped when the guard drops, on every exit path.
pub struct TenantScope {
    on_exit: Option<Box<dyn FnOnce() + Send>>,
}

impl TenantScope {
    pub fn new(on_exit: impl FnOnce() + Send + 'static) -> Self {
        Self {
            on_exit: Some(Box::new(on_exit)),
        }
    }

    /// A scope with nothing to undo.
    pub fn noop() -> Self {
        Self { on_exit: None }
    }
}

impl Drop for TenantScope {
    fn drop(&mut self) {
        if let Some(on_exit) = self.on_exit.take() {
            on_exit();
        }
    }
}

/// Maps a job's declared tenant to an execution-scoped tenant context.
#[async_trait]
pub trait TenantResolver: Send + Sync {
    async fn find_tenant(&self, data: &JobDataMap) -> Result<Tenant, Fault>;

    /// Make `tenant` current until the returned scope drops.
    fn push_context(&self, _tenant: &Tenant) -> TenantScope {
        TenantScope::noop()
    }
}

/// Reads the tenant id straight from the `TenantId` job data entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataMapTenantResolver;

#[async_trait]
impl TenantResolver for DataMapTenantResolver {
    async fn find_tenant(&self, data: &JobDataMap) -> Result<Tenant, Fault> {
        Ok(data.get_str(TENANT_ID).map(Tenant::new).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn data_map_resolver_reads_tenant_id() {
        let data = JobDataMap::new().with(TENANT_ID, "acme");
        let tenant = DataMapTenantResolver.find_tenant(&data).await.unwrap();
        assert_eq!(tenant, Tenant::new("acme"));

        let tenant = DataMapTenantResolver.find_tenant(&JobDataMap::new()).await.unwrap();
        assert_eq!(tenant.id, None);
        assert_eq!(tenant.id_or_default(), "default");
    }

    #[test]
    fn scope_runs_exit_once_on_drop() {
        let exits = Arc::new(AtomicUsize::new(0));
        {
            let exits = exits.clone();
            let _scope = TenantScope::new(move || {
                exits.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(exits.load(Ordering::SeqCst), 1);
    }
}
