use chrono::{DateTime, Utc};
use fs_err as fs;
use serde::Serialize;
use serde_json::to_string_pretty;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::wire::Instruction;

pub struct SavedPaths {
    pub dir: PathBuf,
    pub request: PathBuf,
    pub response: PathBuf,
}

#[derive(Serialize)]
struct RequestArtifact<'a> {
    stage: &'a str,
    timestamp: DateTime<Utc>,
    instruction: &'a Instruction,
}

#[derive(Serialize)]
struct ResponseArtifact<'a> {
    stage: &'a str,
    timestamp: DateTime<Utc>,
    raw: &'a str,
}

/// Writes model exchanges under `<root>/.mockup/tx/<id>/`.
#[derive(Debug, Clone)]
pub struct Transcripts {
    root: PathBuf,
}

pub fn tx_dir(root: &Path, tx: Uuid) -> PathBuf {
    root.join(".mockup").join("tx").join(tx.to_string())
}

impl Transcripts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn save_stage(
        &self,
        stage: &str,
        ins: &Instruction,
        raw_reply: &str,
        tx: Uuid,
    ) -> anyhow::Result<SavedPaths> {
        let dir = tx_dir(&self.root, tx);
        fs::create_dir_all(&dir)?;
        let now = Utc::now();

        let request = dir.join(format!("{stage}.request.json"));
        fs::write(&request, to_string_pretty(&RequestArtifact { stage, timestamp: now, instruction: ins })?)?;

        let response = dir.join(format!("{stage}.response.json"));
        fs::write(&response, to_string_pretty(&ResponseArtifact { stage, timestamp: now, raw: raw_reply })?)?;

        Ok(SavedPaths { dir, request, response })
    }

    /// Like `save_stage`, but a failed write only produces a warning.
    pub fn record(&self, stage: &str, ins: &Instruction, raw_reply: &str, tx: Uuid) {
        match self.save_stage(stage, ins, raw_reply, tx) {
            Ok(saved) => tracing::debug!(stage, dir = %saved.dir.display(), "transcript saved"),
            Err(e) => tracing::warn!(stage, error = %e, "could not save transcript"),
        }
    }
}
