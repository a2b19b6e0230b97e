use crate::wire::{GenerationRequest, Instruction, RequestKind};

fn design_rules() -> &'static str {
r#"Design Rules:
- Markup: plain HTML with Tailwind CSS utility classes only. No <script>, no external CSS, no React/JSX syntax.
- Icons: inline SVG (lucide style, stroke="currentColor") sized with Tailwind classes.
- Images: use https://placehold.co/<w>x<h> placeholders with descriptive alt text.
- Content: realistic copy that fits the app domain. Never use lorem ipsum.
- Layout: respect the device frame; mobile screens are a single column with a bottom navigation bar, desktop screens may use a sidebar and multi-column grids.
- Accessibility: semantic elements (header, nav, main, section, footer), labelled inputs, sufficient color contrast."#
}

fn theme_catalog() -> &'static str {
r#"Available themes (pick the one that best fits the idea, return its key):
- NETFLIX: near-black background, bold red accents, white text
- AURORA: soft teal-to-violet gradients, light surfaces
- OCEAN: deep blues, sandy neutrals
- FOREST: muted greens, warm off-white
- SUNSET: orange and pink accents on cream
- MONO: black, white and one grey scale, sharp corners"#
}

fn manifest_schema() -> &'static str {
r#"{
  "projectName": string,
  "theme": string,
  "projectVisualDescription": string,
  "screens": [
    {
      "id": string,               // short unique slug, e.g. "home", "task-detail"
      "name": string,
      "purpose": string,
      "layoutDescription": string // sections top to bottom, components, colors
    }
  ]
}"#
}

pub fn app_layout_prompt() -> String {
    format!(r#"You are a senior UI/UX designer planning a {{deviceType}} application.

From the user's app idea, design the set of screens needed for a convincing first version (between 1 and 4 screens, most important first).

Return EXACTLY ONE JSON object (no markdown, no prose, no code fences) that conforms to:

{schema}

Rules:
- Screen ids must be unique within the project.
- "projectVisualDescription" describes the shared visual language (palette, typography, corner radius, spacing) so every screen can be generated consistently.
- Each "layoutDescription" is detailed enough that another designer could build the screen without asking questions.

{themes}"#,
        schema = manifest_schema(),
        themes = theme_catalog()
    )
}

pub fn new_screen_in_existing_project_prompt() -> String {
    format!(r#"You are a senior UI/UX designer extending an existing {{deviceType}} application that uses the {{theme}} theme.

The user describes ONE new screen. You also receive the description of an existing screen of the same project: match its visual language exactly (palette, typography, navigation, spacing).

Return EXACTLY ONE JSON object (no markdown, no prose, no code fences) that conforms to:

{schema}

Rules:
- "screens" contains exactly one entry: the new screen.
- Keep "theme" set to {{theme}} and reuse the existing project's visual description where it applies.
- The new screen id must not collide with common existing ids such as "home"; prefer a descriptive slug."#,
        schema = manifest_schema()
    )
}

pub fn screen_prompt() -> String {
    format!(r#"You are an expert front-end designer. Generate the complete markup for ONE screen of an app mockup.

{rules}

Output:
- Return only the markup for the screen, starting with a single root <div>.
- No explanations, no markdown, no code fences."#,
        rules = design_rules()
    )
}

pub fn edit_prompt(old_code: &str, instruction: &str) -> String {
    format!(
        "{old_code} Make changes as per user Input in this code, keeping design and style same. \
Do not change it. Just make user requested changes and keep all other code as it is. \
Only return HTML Tailwindcss code and no raw text. UserInput is: {instruction}"
    )
}

/// Replace `{deviceType}` and `{theme}`. A placeholder without a value is left as is.
pub fn fill(template: &str, device_type: &str, theme: Option<&str>) -> String {
    let out = template.replace("{deviceType}", device_type);
    match theme {
        Some(t) => out.replace("{theme}", t),
        None => out,
    }
}

pub fn build(req: &GenerationRequest) -> Instruction {
    let device = req.device_type.to_string();
    let theme = req.theme.as_deref();
    match req.kind {
        RequestKind::NewProjectManifest => Instruction {
            system: Some(fill(&app_layout_prompt(), &device, theme)),
            user: req.user_input.clone(),
        },
        RequestKind::AdditionalScreenManifest => Instruction {
            system: Some(fill(&new_screen_in_existing_project_prompt(), &device, theme)),
            user: format!(
                "{} Old Screen Description is:{}",
                req.user_input,
                req.prior_screen_description.as_deref().unwrap_or_default()
            ),
        },
        RequestKind::SingleScreenMarkup => {
            let (name, purpose, description) = req
                .screen_meta
                .as_ref()
                .map(|m| (m.name.as_str(), m.purpose.as_str(), m.description.as_str()))
                .unwrap_or_default();
            Instruction {
                system: Some(screen_prompt()),
                user: format!(
                    "screen Name is: {name},\nscreen Purpose: {purpose},\nscreen Description: {description}"
                ),
            }
        }
        RequestKind::MarkupEdit => Instruction {
            system: None,
            user: edit_prompt(req.existing_markup.as_deref().unwrap_or_default(), &req.user_input),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{DeviceType, ScreenMeta};

    #[test]
    fn new_project_fills_device() {
        let ins = build(&GenerationRequest::new_project("a todo app", DeviceType::Mobile));
        let system = ins.system.unwrap();
        assert!(system.contains("planning a mobile application"));
        assert!(!system.contains("{deviceType}"));
        assert_eq!(ins.user, "a todo app");
    }

    #[test]
    fn additional_screen_appends_prior_description() {
        let req = GenerationRequest::additional_screen(
            "add a profile page",
            DeviceType::Desktop,
            Some("OCEAN".into()),
            "Dark header, card grid",
        );
        let ins = build(&req);
        assert_eq!(ins.user, "add a profile page Old Screen Description is:Dark header, card grid");
        let system = ins.system.unwrap();
        assert!(system.contains("desktop application that uses the OCEAN theme"));
        assert!(!system.contains("{theme}"));
    }

    #[test]
    fn missing_theme_stays_literal() {
        let req = GenerationRequest::additional_screen("x", DeviceType::Mobile, None, "y");
        assert!(build(&req).system.unwrap().contains("{theme}"));
    }

    #[test]
    fn screen_and_edit_prompts() {
        let meta = ScreenMeta { name: "Home".into(), purpose: "Overview".into(), description: "Cards".into() };
        let ins = build(&GenerationRequest::screen_markup(meta));
        assert!(ins.user.contains("screen Name is: Home"));
        assert!(ins.user.contains("screen Description: Cards"));

        let ins = build(&GenerationRequest::markup_edit("<div>old</div>", "make the header red"));
        assert!(ins.system.is_none());
        assert!(ins.user.starts_with("<div>old</div> Make changes"));
        assert!(ins.user.ends_with("UserInput is: make the header red"));
    }

    #[test]
    fn unknown_placeholders_untouched() {
        assert_eq!(fill("{deviceType} {font}", "tablet", Some("MONO")), "tablet {font}");
    }
}
