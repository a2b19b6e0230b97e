use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// ========================================
/// Generation requests
/// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    NewProjectManifest,
    AdditionalScreenManifest,
    SingleScreenMarkup,
    MarkupEdit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenMeta {
    pub name: String,
    pub purpose: String,
    pub description: String,
}

/// One call into the pipeline. Built only through the per-kind constructors,
/// so `prior_screen_description` implies `AdditionalScreenManifest` and
/// `existing_markup` implies `MarkupEdit`.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub kind: RequestKind,
    pub user_input: String,
    pub device_type: DeviceType,
    pub theme: Option<String>,
    pub prior_screen_description: Option<String>,
    pub screen_meta: Option<ScreenMeta>,
    pub existing_markup: Option<String>,
}

impl GenerationRequest {
    pub fn new_project(user_input: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            kind: RequestKind::NewProjectManifest,
            user_input: user_input.into(),
            device_type,
            theme: None,
            prior_screen_description: None,
            screen_meta: None,
            existing_markup: None,
        }
    }

    pub fn additional_screen(
        user_input: impl Into<String>,
        device_type: DeviceType,
        theme: Option<String>,
        prior_screen_description: impl Into<String>,
    ) -> Self {
        Self {
            kind: RequestKind::AdditionalScreenManifest,
            theme,
            prior_screen_description: Some(prior_screen_description.into()),
            ..Self::new_project(user_input, device_type)
        }
    }

    pub fn screen_markup(meta: ScreenMeta) -> Self {
        Self {
            kind: RequestKind::SingleScreenMarkup,
            screen_meta: Some(meta),
            ..Self::new_project(String::new(), DeviceType::Mobile)
        }
    }

    pub fn markup_edit(existing_markup: impl Into<String>, user_input: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::MarkupEdit,
            existing_markup: Some(existing_markup.into()),
            ..Self::new_project(user_input, DeviceType::Mobile)
        }
    }

    pub fn with_theme(mut self, theme: Option<String>) -> Self {
        self.theme = theme;
        self
    }
}

/// Text actually sent to the model. Edit requests carry no system message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instruction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub user: String,
}

/// ========================================
/// Generated artifacts
/// ========================================

/// Models drift from the schema, so fields decode leniently: scalars become
/// strings, `null` is absent, and unknown keys ride along in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenDescriptor {
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub layout_description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectManifest {
    #[serde(default, deserialize_with = "lenient::text")]
    pub project_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub theme: Option<String>,
    #[serde(default, rename = "projectVisualDescription", deserialize_with = "lenient::text")]
    pub visual_description: Option<String>,
    #[serde(default, deserialize_with = "lenient::screens")]
    pub screens: Vec<ScreenDescriptor>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

mod lenient {
    use serde::de::{Deserialize, Deserializer, Error};
    use serde_json::Value;

    use super::ScreenDescriptor;

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        })
    }

    /// Anything but an array is no screens; non-object entries become empty descriptors.
    pub fn screens<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ScreenDescriptor>, D::Error> {
        let Some(Value::Array(items)) = Option::<Value>::deserialize(d)? else {
            return Ok(Vec::new());
        };
        items
            .into_iter()
            .map(|item| match item {
                Value::Object(_) => ScreenDescriptor::deserialize(item).map_err(D::Error::custom),
                _ => Ok(ScreenDescriptor::default()),
            })
            .collect()
    }
}

impl ProjectManifest {
    pub fn meta(&self) -> ProjectMeta {
        ProjectMeta {
            name: self.project_name.clone(),
            theme: self.theme.clone(),
            visual_description: self.visual_description.clone(),
        }
    }
}

/// Fields written back onto the project row after a new-project manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectMeta {
    pub name: Option<String>,
    pub theme: Option<String>,
    pub visual_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenMarkup {
    pub project_id: String,
    pub screen_id: String,
    pub code: String,
}

/// Body returned by the markup endpoints. The descriptive fields are present
/// when the caller supplied them or when the stored row is echoed back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenPayload {
    pub project_id: String,
    pub screen_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_description: Option<String>,
    pub code: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    #[serde(default)]
    pub completion_tokens: Option<u32>,
    #[serde(default)]
    pub total_tokens: Option<u32>,
}

/// Which path produced a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Generated,
    Mock,
    RateLimited,
}

#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub origin: Origin,
    /// False when the store was unavailable or refused the write.
    pub persisted: bool,
}

impl<T> Outcome<T> {
    pub fn unpersisted(value: T, origin: Origin) -> Self {
        Self { value, origin, persisted: false }
    }
}

/// ========================================
/// HTTP bodies
/// ========================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateManifestInput {
    pub user_input: String,
    pub device_type: DeviceType,
    pub project_id: String,
    #[serde(default)]
    pub old_screen_description: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
}

impl GenerateManifestInput {
    pub fn to_request(&self) -> GenerationRequest {
        match &self.old_screen_description {
            Some(prior) => GenerationRequest::additional_screen(
                self.user_input.clone(),
                self.device_type,
                self.theme.clone(),
                prior.clone(),
            ),
            None => GenerationRequest::new_project(self.user_input.clone(), self.device_type)
                .with_theme(self.theme.clone()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateScreenInput {
    pub project_id: String,
    pub screen_id: String,
    pub screen_name: String,
    pub purpose: String,
    pub screen_description: String,
}

impl GenerateScreenInput {
    pub fn meta(&self) -> ScreenMeta {
        ScreenMeta {
            name: self.screen_name.clone(),
            purpose: self.purpose.clone(),
            description: self.screen_description.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditScreenInput {
    pub project_id: String,
    pub screen_id: String,
    pub old_code: String,
    pub user_input: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenKey {
    pub project_id: String,
    pub screen_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectInput {
    pub project_id: String,
    pub user_input: String,
    pub device: DeviceType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectInput {
    pub project_id: String,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default, rename = "screenShot")]
    pub screenshot: Option<String>,
}

/// Caller account row, keyed by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub project_id: String,
    pub user_id: String,
    pub device: String,
    pub user_input: String,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub project_visual_description: Option<String>,
    #[serde(default)]
    pub screenshot: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: ProjectRecord,
    pub sneak_peek_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    pub project_detail: Option<ProjectRecord>,
    pub screen_config: Vec<ScreenPayload>,
}
