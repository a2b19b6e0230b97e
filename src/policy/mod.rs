use crate::errors::GenError;
use crate::wire::{ProjectManifest, ScreenDescriptor};

/// Value shipped in `.env.example`; a key that still contains it was never filled in.
pub const PLACEHOLDER_CREDENTIAL: &str = "<OPENROUTER_API_KEY>";

const DEFAULT_THEME: &str = "NETFLIX";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    RateLimited,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitDecision {
    Allowed,
    Exceeded,
}

pub fn should_mock(credential: Option<&str>) -> bool {
    match credential {
        None => true,
        Some(c) => c.trim().is_empty() || c.contains(PLACEHOLDER_CREDENTIAL),
    }
}

pub fn classify_failure(err: &GenError) -> FailureClass {
    match err {
        GenError::Transport { status, message } => {
            if *status == Some(429) || message.contains("429") || message.contains("Rate limit") {
                FailureClass::RateLimited
            } else {
                FailureClass::Fatal
            }
        }
        _ => FailureClass::Fatal,
    }
}

/// Project-count limit. Every plan is unlimited for now, so this never refuses.
pub fn check_project_limit(_existing_projects: usize) -> LimitDecision {
    LimitDecision::Allowed
}

fn placeholder_screen(layout: &str) -> ScreenDescriptor {
    ScreenDescriptor {
        id: Some("screen1".into()),
        name: Some("Home Screen".into()),
        purpose: Some("Main landing page".into()),
        layout_description: Some(layout.into()),
        ..Default::default()
    }
}

pub fn mock_manifest(theme: Option<&str>) -> ProjectManifest {
    ProjectManifest {
        project_name: Some("Mock Project".into()),
        theme: Some(theme.unwrap_or(DEFAULT_THEME).into()),
        visual_description: Some("A mock UI/UX project for demonstration purposes".into()),
        screens: vec![placeholder_screen(
            "A clean home screen with navigation and content sections",
        )],
        ..Default::default()
    }
}

pub fn rate_limited_manifest() -> ProjectManifest {
    ProjectManifest {
        project_name: Some("Mock Project (Rate Limit Reached)".into()),
        theme: Some(DEFAULT_THEME.into()),
        visual_description: Some("A mock UI/UX project due to high traffic/rate limits.".into()),
        screens: vec![placeholder_screen(
            "A clean home screen with navigation and content sections. Note: This is a placeholder because the AI service is currently busy.",
        )],
        ..Default::default()
    }
}

pub fn mock_screen_markup(name: &str, purpose: &str, description: &str) -> String {
    format!(
        r#"<div class="p-4 border rounded-lg"><h2>{name}</h2><p>{purpose}</p><p>{description}</p></div>"#
    )
}

pub fn rate_limited_markup(name: &str) -> String {
    format!(
        r#"<div class="h-full flex flex-col items-center justify-center p-8 text-center space-y-4 bg-gray-50 dark:bg-gray-900 rounded-xl border-2 border-dashed border-gray-300 dark:border-gray-700">
    <div class="p-4 bg-yellow-100 dark:bg-yellow-900/30 rounded-full">
        <svg xmlns="http://www.w3.org/2000/svg" width="32" height="32" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round" class="text-yellow-600 dark:text-yellow-400"><circle cx="12" cy="12" r="10"/><path d="M12 8v4"/><path d="M12 16h.01"/></svg>
    </div>
    <h2 class="text-xl font-bold text-gray-900 dark:text-gray-100">AI Rate Limit Reached</h2>
    <p class="text-gray-600 dark:text-gray-400 max-w-md">
        We've hit the daily limit for the free AI model. This is a placeholder screen.
        <br/><br/>
        <strong>Title:</strong> {name}
    </p>
</div>"#
    )
}

/// The edit was not applied; the current markup comes back with a marker comment.
pub fn rate_limited_edit_markup(old_code: &str) -> String {
    format!("<!-- AI rate limit reached: edit not applied -->\n{old_code}")
}

pub fn mock_edit_markup(instruction: &str) -> String {
    format!(r#"<div class="p-4 border rounded-lg">Mock edited screen based on: {instruction}</div>"#)
}
