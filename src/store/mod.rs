use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

use crate::wire::{ProjectDetail, ProjectMeta, ProjectRecord, ProjectSummary, ScreenDescriptor, ScreenMarkup, ScreenPayload, UserRecord};

pub mod sqlite;

/// Project and screen records. Writes are keyed by `(project_id, screen_id)`.
#[async_trait]
pub trait ScreenStore: Send + Sync {
    /// Look the user up by email, inserting a row with `name` the first time.
    async fn get_or_create_user(&self, email: &str, name: &str) -> Result<UserRecord>;

    /// Fields that are `None` are left untouched.
    async fn upsert_project_meta(&self, project_id: &str, meta: &ProjectMeta) -> Result<()>;

    async fn insert_screen(&self, project_id: &str, screen: &ScreenDescriptor) -> Result<()>;

    /// One insert per descriptor, awaited together. Inserts that already
    /// landed stay in place when a sibling fails.
    async fn insert_screens(&self, project_id: &str, screens: &[ScreenDescriptor]) -> Result<()> {
        let results = join_all(screens.iter().map(|s| self.insert_screen(project_id, s))).await;
        let failed: Vec<String> = results
            .into_iter()
            .filter_map(|r| r.err().map(|e| e.to_string()))
            .collect();
        match failed.first() {
            None => Ok(()),
            Some(first) => Err(anyhow!(
                "{} of {} screen inserts failed: {}",
                failed.len(),
                screens.len(),
                first
            )),
        }
    }

    /// Update-by-match. `None` when no row exists for the key; no row is created.
    async fn upsert_screen_markup(&self, markup: &ScreenMarkup) -> Result<Option<ScreenPayload>>;

    async fn delete_screen(&self, project_id: &str, screen_id: &str) -> Result<()>;

    async fn create_project(&self, record: &ProjectRecord) -> Result<ProjectRecord>;

    async fn count_projects(&self, user_id: &str) -> Result<usize>;

    async fn list_projects(&self, user_id: &str) -> Result<Vec<ProjectSummary>>;

    async fn project_detail(&self, project_id: &str, user_id: &str) -> Result<ProjectDetail>;

    async fn update_project(
        &self,
        project_id: &str,
        meta: &ProjectMeta,
        screenshot: Option<&str>,
    ) -> Result<Option<ProjectRecord>>;
}

pub type DynStore = Arc<dyn ScreenStore>;

/// Open the configured store. Any failure leaves the pipeline without one.
pub fn connect(database_url: Option<&str>) -> Option<DynStore> {
    let url = database_url?;
    match sqlite::SqliteStore::open(url) {
        Ok(s) => {
            tracing::info!(url, "screen store ready");
            Some(Arc::new(s))
        }
        Err(e) => {
            tracing::warn!(url, error = %e, "screen store unavailable, results will not be persisted");
            None
        }
    }
}
