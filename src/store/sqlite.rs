use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

use super::ScreenStore;
use crate::wire::{ProjectDetail, ProjectMeta, ProjectRecord, ProjectSummary, ScreenDescriptor, ScreenMarkup, ScreenPayload, UserRecord};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL DEFAULT '',
    device TEXT NOT NULL DEFAULT '',
    user_input TEXT NOT NULL DEFAULT '',
    project_name TEXT,
    theme TEXT,
    project_visual_description TEXT,
    screenshot TEXT
);
CREATE TABLE IF NOT EXISTS screens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL,
    screen_id TEXT,
    screen_name TEXT,
    purpose TEXT,
    screen_description TEXT,
    code TEXT
);
CREATE INDEX IF NOT EXISTS screens_by_project ON screens(project_id, screen_id);
"#;

const PROJECT_COLUMNS: &str =
    "project_id, user_id, device, user_input, project_name, theme, project_visual_description, screenshot";

const SCREEN_COLUMNS: &str = "project_id, screen_id, screen_name, purpose, screen_description, code";

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Accepts a bare path, `:memory:`, or a `sqlite://` / `sqlite:` URL.
    pub fn open(url: &str) -> Result<Self> {
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        let conn = Connection::open(path).with_context(|| format!("opening {}", path))?;
        conn.execute_batch(SCHEMA).context("creating schema")?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    fn project_by_id(conn: &Connection, project_id: &str) -> Result<Option<ProjectRecord>> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE project_id = ?1");
        Ok(conn.query_row(&sql, params![project_id], project_row).optional()?)
    }
}

fn user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRecord>> {
    Ok(conn
        .query_row("SELECT id, name, email FROM users WHERE email = ?1", params![email], |r| {
            Ok(UserRecord { id: r.get(0)?, name: r.get(1)?, email: r.get(2)? })
        })
        .optional()?)
}

fn project_row(r: &Row<'_>) -> rusqlite::Result<ProjectRecord> {
    Ok(ProjectRecord {
        project_id: r.get(0)?,
        user_id: r.get(1)?,
        device: r.get(2)?,
        user_input: r.get(3)?,
        project_name: r.get(4)?,
        theme: r.get(5)?,
        project_visual_description: r.get(6)?,
        screenshot: r.get(7)?,
    })
}

fn screen_row(r: &Row<'_>) -> rusqlite::Result<ScreenPayload> {
    Ok(ScreenPayload {
        project_id: r.get(0)?,
        screen_id: r.get::<_, Option<String>>(1)?.unwrap_or_default(),
        screen_name: r.get(2)?,
        purpose: r.get(3)?,
        screen_description: r.get(4)?,
        code: r.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}

#[async_trait]
impl ScreenStore for SqliteStore {
    async fn get_or_create_user(&self, email: &str, name: &str) -> Result<UserRecord> {
        let conn = self.conn.lock();
        if let Some(user) = user_by_email(&conn, email)? {
            return Ok(user);
        }
        conn.execute("INSERT INTO users (name, email) VALUES (?1, ?2)", params![name, email])?;
        user_by_email(&conn, email)?.with_context(|| format!("user {} vanished after insert", email))
    }

    async fn upsert_project_meta(&self, project_id: &str, meta: &ProjectMeta) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO projects (project_id, project_name, theme, project_visual_description)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(project_id) DO UPDATE SET
                project_name = COALESCE(excluded.project_name, project_name),
                theme = COALESCE(excluded.theme, theme),
                project_visual_description = COALESCE(excluded.project_visual_description, project_visual_description)",
            params![project_id, meta.name, meta.theme, meta.visual_description],
        )?;
        Ok(())
    }

    async fn insert_screen(&self, project_id: &str, screen: &ScreenDescriptor) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO screens (project_id, screen_id, screen_name, purpose, screen_description)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![project_id, screen.id, screen.name, screen.purpose, screen.layout_description],
        )?;
        Ok(())
    }

    async fn upsert_screen_markup(&self, markup: &ScreenMarkup) -> Result<Option<ScreenPayload>> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE screens SET code = ?3 WHERE project_id = ?1 AND screen_id = ?2",
            params![markup.project_id, markup.screen_id, markup.code],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        let sql = format!(
            "SELECT {SCREEN_COLUMNS} FROM screens WHERE project_id = ?1 AND screen_id = ?2 ORDER BY id LIMIT 1"
        );
        Ok(conn
            .query_row(&sql, params![markup.project_id, markup.screen_id], screen_row)
            .optional()?)
    }

    async fn delete_screen(&self, project_id: &str, screen_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM screens WHERE project_id = ?1 AND screen_id = ?2",
            params![project_id, screen_id],
        )?;
        Ok(())
    }

    async fn create_project(&self, record: &ProjectRecord) -> Result<ProjectRecord> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO projects (project_id, user_id, device, user_input) VALUES (?1, ?2, ?3, ?4)",
            params![record.project_id, record.user_id, record.device, record.user_input],
        )?;
        Self::project_by_id(&conn, &record.project_id)?
            .with_context(|| format!("project {} vanished after insert", record.project_id))
    }

    async fn count_projects(&self, user_id: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM projects WHERE user_id = ?1",
            params![user_id],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }

    async fn list_projects(&self, user_id: &str) -> Result<Vec<ProjectSummary>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE user_id = ?1 ORDER BY id DESC");
        let mut stmt = conn.prepare(&sql)?;
        let projects = stmt
            .query_map(params![user_id], project_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut peek = conn.prepare("SELECT code FROM screens WHERE project_id = ?1 ORDER BY id LIMIT 1")?;
        let mut out = Vec::with_capacity(projects.len());
        for project in projects {
            let sneak_peek_code: Option<String> = peek
                .query_row(params![project.project_id], |r| r.get(0))
                .optional()?
                .flatten();
            out.push(ProjectSummary { project, sneak_peek_code });
        }
        Ok(out)
    }

    async fn project_detail(&self, project_id: &str, user_id: &str) -> Result<ProjectDetail> {
        let conn = self.conn.lock();
        let project = Self::project_by_id(&conn, project_id)?.filter(|p| p.user_id == user_id);
        let sql = format!("SELECT {SCREEN_COLUMNS} FROM screens WHERE project_id = ?1 ORDER BY id DESC");
        let mut stmt = conn.prepare(&sql)?;
        let screens = stmt
            .query_map(params![project_id], screen_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ProjectDetail { project_detail: project, screen_config: screens })
    }

    async fn update_project(
        &self,
        project_id: &str,
        meta: &ProjectMeta,
        screenshot: Option<&str>,
    ) -> Result<Option<ProjectRecord>> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE projects SET
                project_name = COALESCE(?2, project_name),
                theme = COALESCE(?3, theme),
                screenshot = COALESCE(?4, screenshot)
             WHERE project_id = ?1",
            params![project_id, meta.name, meta.theme, screenshot],
        )?;
        Self::project_by_id(&conn, project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen(id: &str, name: &str) -> ScreenDescriptor {
        ScreenDescriptor {
            id: Some(id.into()),
            name: Some(name.into()),
            purpose: Some("p".into()),
            layout_description: Some("l".into()),
            ..Default::default()
        }
    }

    fn markup(screen_id: &str, code: &str) -> ScreenMarkup {
        ScreenMarkup { project_id: "p1".into(), screen_id: screen_id.into(), code: code.into() }
    }

    #[tokio::test]
    async fn markup_write_needs_existing_row() {
        let store = SqliteStore::open(":memory:").unwrap();
        assert_eq!(store.upsert_screen_markup(&markup("home", "<div/>")).await.unwrap(), None);

        store.insert_screens("p1", &[screen("home", "Home"), screen("cart", "Cart")]).await.unwrap();
        let row = store.upsert_screen_markup(&markup("home", "<div>v1</div>")).await.unwrap().unwrap();
        assert_eq!(row.code, "<div>v1</div>");
        assert_eq!(row.screen_name.as_deref(), Some("Home"));

        let row = store.upsert_screen_markup(&markup("home", "<div>v2</div>")).await.unwrap().unwrap();
        assert_eq!(row.code, "<div>v2</div>");
    }

    #[tokio::test]
    async fn meta_upsert_keeps_unset_fields() {
        let store = SqliteStore::open(":memory:").unwrap();
        let rec = ProjectRecord {
            project_id: "p1".into(),
            user_id: "u1".into(),
            device: "mobile".into(),
            user_input: "a todo app".into(),
            project_name: None,
            theme: None,
            project_visual_description: None,
            screenshot: None,
        };
        store.create_project(&rec).await.unwrap();
        let meta = ProjectMeta { name: Some("Todo".into()), theme: Some("OCEAN".into()), visual_description: None };
        store.upsert_project_meta("p1", &meta).await.unwrap();
        store
            .upsert_project_meta("p1", &ProjectMeta { visual_description: Some("blue".into()), ..Default::default() })
            .await
            .unwrap();

        let detail = store.project_detail("p1", "u1").await.unwrap();
        let p = detail.project_detail.unwrap();
        assert_eq!(p.project_name.as_deref(), Some("Todo"));
        assert_eq!(p.theme.as_deref(), Some("OCEAN"));
        assert_eq!(p.project_visual_description.as_deref(), Some("blue"));
        assert_eq!(p.user_input, "a todo app");

        assert!(store.project_detail("p1", "someone-else").await.unwrap().project_detail.is_none());
    }

    #[tokio::test]
    async fn listing_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("mockups.db").display());
        let store = SqliteStore::open(&url).unwrap();
        for id in ["p1", "p2"] {
            let rec = ProjectRecord {
                project_id: id.into(),
                user_id: "u1".into(),
                device: "desktop".into(),
                user_input: "shop".into(),
                project_name: None,
                theme: None,
                project_visual_description: None,
                screenshot: None,
            };
            store.create_project(&rec).await.unwrap();
        }
        store.insert_screens("p2", &[screen("home", "Home")]).await.unwrap();
        store
            .upsert_screen_markup(&ScreenMarkup { project_id: "p2".into(), screen_id: "home".into(), code: "<main/>".into() })
            .await
            .unwrap();
        assert_eq!(store.count_projects("u1").await.unwrap(), 2);

        let list = store.list_projects("u1").await.unwrap();
        assert_eq!(list[0].project.project_id, "p2");
        assert_eq!(list[0].sneak_peek_code.as_deref(), Some("<main/>"));
        assert_eq!(list[1].sneak_peek_code, None);

        store.delete_screen("p2", "home").await.unwrap();
        assert!(store.project_detail("p2", "u1").await.unwrap().screen_config.is_empty());

        let updated = store
            .update_project("p1", &ProjectMeta { name: Some("Renamed".into()), ..Default::default() }, Some("shot.png"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.project_name.as_deref(), Some("Renamed"));
        assert_eq!(updated.screenshot.as_deref(), Some("shot.png"));
    }

    #[tokio::test]
    async fn user_created_once_per_email() {
        let store = SqliteStore::open(":memory:").unwrap();
        let first = store.get_or_create_user("ada@example.com", "Ada").await.unwrap();
        assert_eq!(first.name, "Ada");
        let again = store.get_or_create_user("ada@example.com", "Someone Else").await.unwrap();
        assert_eq!(again, first);
        let other = store.get_or_create_user("bob@example.com", "").await.unwrap();
        assert_ne!(other.id, first.id);
    }
}
