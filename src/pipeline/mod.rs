//! Generation entry points. Each one runs the same sequence: credential
//! pre-check, prompt, model call, failure classification, sanitize/parse,
//! best-effort persistence.

use uuid::Uuid;

use crate::config::EnvironmentCapabilities;
use crate::errors::GenError;
use crate::log::Transcripts;
use crate::manifest;
use crate::policy::{self, FailureClass, LimitDecision};
use crate::prompt;
use crate::provider::{Delivery, DynGateway};
use crate::sanitize::{sanitize, Expect};
use crate::store::DynStore;
use crate::wire::{
    CreateProjectInput, EditScreenInput, GenerateManifestInput, GenerateScreenInput, GenerationRequest,
    Instruction, Origin, Outcome, ProjectDetail, ProjectManifest, ProjectMeta, ProjectRecord, ProjectSummary, RequestKind,
    ScreenMarkup, ScreenPayload, UpdateProjectInput, UserRecord,
};

pub struct Pipeline {
    caps: EnvironmentCapabilities,
    gateway: DynGateway,
    store: Option<DynStore>,
    transcripts: Option<Transcripts>,
}

/// Result of the model step once the failure policy has been applied.
enum Reply {
    Text(String),
    RateLimited,
}

impl Pipeline {
    pub fn new(caps: EnvironmentCapabilities, gateway: DynGateway, store: Option<DynStore>) -> Self {
        Self { caps, gateway, store, transcripts: None }
    }

    pub fn with_transcripts(mut self, transcripts: Transcripts) -> Self {
        self.transcripts = Some(transcripts);
        self
    }

    pub fn capabilities(&self) -> &EnvironmentCapabilities {
        &self.caps
    }

    fn mocking(&self) -> bool {
        policy::should_mock(self.caps.credential())
    }

    async fn ask(&self, stage: &str, ins: &Instruction, delivery: Delivery) -> Result<Reply, GenError> {
        match self.gateway.send(ins, delivery).await {
            Ok(res) => {
                if let Some(t) = &self.transcripts {
                    t.record(stage, ins, &res.text, Uuid::new_v4());
                }
                Ok(Reply::Text(res.text))
            }
            Err(e) => match policy::classify_failure(&e) {
                FailureClass::RateLimited => {
                    tracing::warn!(stage, error = %e, "model rate limited, returning placeholder");
                    Ok(Reply::RateLimited)
                }
                FailureClass::Fatal => {
                    tracing::error!(stage, error = %e, "model call failed");
                    Err(e)
                }
            },
        }
    }

    pub async fn generate_manifest(
        &self,
        input: &GenerateManifestInput,
    ) -> Result<Outcome<ProjectManifest>, GenError> {
        let req = input.to_request();
        if self.mocking() {
            tracing::info!(project = %input.project_id, "no model credential, returning mock manifest");
            return Ok(Outcome::unpersisted(policy::mock_manifest(req.theme.as_deref()), Origin::Mock));
        }

        let ins = prompt::build(&req);
        let raw = match self.ask("manifest", &ins, Delivery::Streaming).await? {
            Reply::Text(t) => t,
            Reply::RateLimited => {
                return Ok(Outcome::unpersisted(policy::rate_limited_manifest(), Origin::RateLimited))
            }
        };

        let manifest = manifest::parse_reply(&raw).map_err(|e| {
            if let GenError::Parse { reason, text } = &e {
                tracing::error!(%reason, raw = %text, "manifest reply is not valid JSON");
            }
            e
        })?;
        let dups = manifest::duplicate_ids(&manifest);
        if !dups.is_empty() {
            tracing::warn!(project = %input.project_id, ?dups, "manifest repeats screen ids");
        }

        let persisted = match &self.store {
            Some(store) => {
                let write: anyhow::Result<()> = async {
                    if req.kind == RequestKind::NewProjectManifest {
                        store.upsert_project_meta(&input.project_id, &manifest.meta()).await?;
                    }
                    store.insert_screens(&input.project_id, &manifest.screens).await
                }
                .await;
                match write {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(project = %input.project_id, error = %e, "could not persist manifest, returning generated result only");
                        false
                    }
                }
            }
            None => {
                tracing::warn!(project = %input.project_id, "no screen store configured, manifest not persisted");
                false
            }
        };

        Ok(Outcome { value: manifest, origin: Origin::Generated, persisted })
    }

    pub async fn generate_screen_markup(
        &self,
        input: &GenerateScreenInput,
    ) -> Result<Outcome<ScreenPayload>, GenError> {
        let echo = |code: String| ScreenPayload {
            project_id: input.project_id.clone(),
            screen_id: input.screen_id.clone(),
            screen_name: Some(input.screen_name.clone()),
            purpose: Some(input.purpose.clone()),
            screen_description: Some(input.screen_description.clone()),
            code,
        };

        if self.mocking() {
            tracing::info!(screen = %input.screen_id, "no model credential, returning mock markup");
            let code = policy::mock_screen_markup(&input.screen_name, &input.purpose, &input.screen_description);
            return Ok(Outcome::unpersisted(echo(code), Origin::Mock));
        }

        let ins = prompt::build(&GenerationRequest::screen_markup(input.meta()));
        let code = match self.ask("screen", &ins, Delivery::Buffered).await? {
            Reply::Text(raw) => sanitize(&raw, Expect::Markup),
            Reply::RateLimited => {
                return Ok(Outcome::unpersisted(echo(policy::rate_limited_markup(&input.screen_name)), Origin::RateLimited))
            }
        };

        Ok(self.persist_markup(echo(code)).await)
    }

    pub async fn edit_screen_markup(&self, input: &EditScreenInput) -> Result<Outcome<ScreenPayload>, GenError> {
        let echo = |code: String| ScreenPayload {
            project_id: input.project_id.clone(),
            screen_id: input.screen_id.clone(),
            code,
            ..ScreenPayload::default()
        };

        if self.mocking() {
            tracing::info!(screen = %input.screen_id, "no model credential, returning mock edit");
            return Ok(Outcome::unpersisted(echo(policy::mock_edit_markup(&input.user_input)), Origin::Mock));
        }

        let ins = prompt::build(&GenerationRequest::markup_edit(input.old_code.clone(), input.user_input.clone()));
        let code = match self.ask("edit", &ins, Delivery::Buffered).await? {
            Reply::Text(raw) => sanitize(&raw, Expect::Markup),
            Reply::RateLimited => {
                return Ok(Outcome::unpersisted(echo(policy::rate_limited_edit_markup(&input.old_code)), Origin::RateLimited))
            }
        };

        Ok(self.persist_markup(echo(code)).await)
    }

    /// Write generated markup onto its screen row. The stored row is returned
    /// when the write lands; otherwise the unpersisted payload.
    async fn persist_markup(&self, payload: ScreenPayload) -> Outcome<ScreenPayload> {
        let Some(store) = &self.store else {
            tracing::warn!(screen = %payload.screen_id, "no screen store configured, markup not persisted");
            return Outcome::unpersisted(payload, Origin::Generated);
        };
        let markup = ScreenMarkup {
            project_id: payload.project_id.clone(),
            screen_id: payload.screen_id.clone(),
            code: payload.code.clone(),
        };
        match store.upsert_screen_markup(&markup).await {
            Ok(Some(row)) => Outcome { value: row, origin: Origin::Generated, persisted: true },
            Ok(None) => {
                tracing::warn!(
                    project = %payload.project_id,
                    screen = %payload.screen_id,
                    "no screen row to update, returning generated markup only"
                );
                Outcome::unpersisted(payload, Origin::Generated)
            }
            Err(e) => {
                tracing::warn!(screen = %payload.screen_id, error = %e, "could not persist markup, returning generated markup only");
                Outcome::unpersisted(payload, Origin::Generated)
            }
        }
    }

    /// Get or create the caller's user row. Without a store a fixed mock user
    /// comes back whoever is asking.
    pub async fn ensure_user(&self, caller: Option<&str>, name: Option<&str>) -> Result<Outcome<UserRecord>, GenError> {
        let Some(store) = &self.store else {
            let user = UserRecord { id: 1, name: "Mock User".into(), email: "mock-user@example.com".into() };
            return Ok(Outcome::unpersisted(user, Origin::Mock));
        };
        let email = caller.ok_or(GenError::Unauthorized)?;
        let user = store
            .get_or_create_user(email, name.unwrap_or_default())
            .await
            .map_err(|e| GenError::Persistence(e.to_string()))?;
        Ok(Outcome { value: user, origin: Origin::Generated, persisted: true })
    }

    pub async fn delete_screen(
        &self,
        caller: Option<&str>,
        project_id: &str,
        screen_id: &str,
    ) -> Result<(), GenError> {
        if caller.is_none() {
            return Err(GenError::Unauthorized);
        }
        let store = self.store.as_ref().ok_or_else(|| GenError::Persistence("no screen store configured".into()))?;
        store
            .delete_screen(project_id, screen_id)
            .await
            .map_err(|e| GenError::Persistence(e.to_string()))?;
        tracing::info!(project = project_id, screen = screen_id, "screen deleted");
        Ok(())
    }

    pub async fn create_project(
        &self,
        caller: Option<&str>,
        input: &CreateProjectInput,
    ) -> Result<Outcome<ProjectRecord>, GenError> {
        let user_id = caller.ok_or(GenError::Unauthorized)?;
        let record = ProjectRecord {
            project_id: input.project_id.clone(),
            user_id: user_id.to_string(),
            device: input.device.to_string(),
            user_input: input.user_input.clone(),
            project_name: None,
            theme: None,
            project_visual_description: None,
            screenshot: None,
        };
        let Some(store) = &self.store else {
            return Ok(Outcome::unpersisted(record, Origin::Mock));
        };

        let existing = store
            .count_projects(user_id)
            .await
            .map_err(|e| GenError::Persistence(e.to_string()))?;
        if policy::check_project_limit(existing) == LimitDecision::Exceeded {
            return Err(GenError::Persistence("project limit exceeded".into()));
        }
        let saved = store
            .create_project(&record)
            .await
            .map_err(|e| GenError::Persistence(e.to_string()))?;
        Ok(Outcome { value: saved, origin: Origin::Generated, persisted: true })
    }

    pub async fn list_projects(&self, caller: Option<&str>) -> Result<Vec<ProjectSummary>, GenError> {
        let user_id = caller.ok_or(GenError::Unauthorized)?;
        match &self.store {
            Some(store) => store.list_projects(user_id).await.map_err(|e| GenError::Persistence(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    pub async fn project_detail(&self, caller: Option<&str>, project_id: &str) -> Result<ProjectDetail, GenError> {
        let user_id = caller.ok_or(GenError::Unauthorized)?;
        match &self.store {
            Some(store) => store
                .project_detail(project_id, user_id)
                .await
                .map_err(|e| GenError::Persistence(e.to_string())),
            None => Ok(ProjectDetail {
                project_detail: Some(ProjectRecord {
                    project_id: project_id.to_string(),
                    user_id: user_id.to_string(),
                    device: "mobile".into(),
                    user_input: "Mock project for demonstration".into(),
                    project_name: Some("Mock Project".into()),
                    theme: Some("NETFLIX".into()),
                    project_visual_description: None,
                    screenshot: None,
                }),
                screen_config: Vec::new(),
            }),
        }
    }

    pub async fn update_project(&self, input: &UpdateProjectInput) -> Result<Option<ProjectRecord>, GenError> {
        let meta = ProjectMeta { name: input.project_name.clone(), theme: input.theme.clone(), visual_description: None };
        match &self.store {
            Some(store) => store
                .update_project(&input.project_id, &meta, input.screenshot.as_deref())
                .await
                .map_err(|e| GenError::Persistence(e.to_string())),
            None => Ok(Some(ProjectRecord {
                project_id: input.project_id.clone(),
                user_id: String::new(),
                device: String::new(),
                user_input: String::new(),
                project_name: Some(meta.name.unwrap_or_else(|| "Mock Project".into())),
                theme: Some(meta.theme.unwrap_or_else(|| "NETFLIX".into())),
                project_visual_description: None,
                screenshot: input.screenshot.clone(),
            })),
        }
    }
}
