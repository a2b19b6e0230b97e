use std::collections::HashSet;

use crate::errors::GenError;
use crate::sanitize::{sanitize, strip_fences, Expect};
use crate::wire::ProjectManifest;

/// Decode already-sanitized text. Missing keys come back as `None`/empty;
/// screens without `id` or `name` are kept as they are.
pub fn parse(text: &str) -> Result<ProjectManifest, GenError> {
    serde_json::from_str::<ProjectManifest>(text).map_err(|e| GenError::Parse {
        reason: e.to_string(),
        text: text.to_string(),
    })
}

/// Parse a raw model reply: strict parse of the fence-stripped text first,
/// bracket slicing only when that fails.
pub fn parse_reply(raw: &str) -> Result<ProjectManifest, GenError> {
    let stripped = strip_fences(raw, Expect::Json);
    if let Ok(m) = serde_json::from_str::<ProjectManifest>(&stripped) {
        return Ok(m);
    }
    parse(&sanitize(raw, Expect::Json))
}

/// Screen ids that appear more than once, in first-seen order.
pub fn duplicate_ids(manifest: &ProjectManifest) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dups = Vec::new();
    for id in manifest.screens.iter().filter_map(|s| s.id.as_deref()) {
        if !seen.insert(id) && !dups.iter().any(|d| d == id) {
            dups.push(id.to_string());
        }
    }
    dups
}

#[cfg(test)]
mod tests {
    use super::*;

    const TODO_REPLY: &str = r#"Here is your app:
```json
{
  "projectName": "Todo",
  "theme": "AURORA",
  "projectVisualDescription": "Soft gradients",
  "screens": [
    {"id": "home", "name": "Home", "purpose": "List tasks", "layoutDescription": "Header, list, FAB"},
    {"id": "add", "name": "Add Task", "purpose": "Create", "layoutDescription": "Form"}
  ]
}
```
Let me know if you need changes!"#;

    #[test]
    fn reply_with_prose_and_fences() {
        let m = parse_reply(TODO_REPLY).unwrap();
        assert_eq!(m.project_name.as_deref(), Some("Todo"));
        assert_eq!(m.visual_description.as_deref(), Some("Soft gradients"));
        let ids: Vec<_> = m.screens.iter().map(|s| s.id.as_deref().unwrap()).collect();
        assert_eq!(ids, ["home", "add"]);
    }

    #[test]
    fn brace_in_trailing_text_is_a_parse_failure() {
        let raw = "{\"projectName\":\"A\",\"screens\":[]}";
        assert!(parse_reply(raw).is_ok());
        let noisy = "{\"projectName\":\"A\",\"screens\":[]} note: use {theme} later }";
        assert!(parse_reply(noisy).is_err());
    }

    #[test]
    fn malformed_json_carries_offending_text() {
        match parse("{\"projectName\": ") {
            Err(GenError::Parse { text, reason }) => {
                assert_eq!(text, "{\"projectName\": ");
                assert!(!reason.is_empty());
            }
            other => panic!("expected parse failure, got {:?}", other),
        }
    }

    #[test]
    fn incomplete_screens_pass_through() {
        let m = parse(r#"{"screens":[{"purpose":"orphan"}]}"#).unwrap();
        assert!(m.project_name.is_none());
        assert_eq!(m.screens.len(), 1);
        assert!(m.screens[0].id.is_none() && m.screens[0].name.is_none());
    }

    #[test]
    fn duplicates_reported_once() {
        let m = parse(r#"{"screens":[{"id":"a"},{"id":"b"},{"id":"a"},{"id":"a"}]}"#).unwrap();
        assert_eq!(duplicate_ids(&m), vec!["a".to_string()]);
    }

    #[test]
    fn scalar_ids_become_strings() {
        let m = parse_reply(r#"{"projectName":"Todo","screens":[{"id":1,"name":"Home"},{"id":true,"name":null}]}"#).unwrap();
        assert_eq!(m.screens[0].id.as_deref(), Some("1"));
        assert_eq!(m.screens[1].id.as_deref(), Some("true"));
        assert!(m.screens[1].name.is_none());
    }

    #[test]
    fn null_or_odd_screens_mean_no_screens() {
        assert!(parse_reply(r#"{"projectName":"Todo","screens":null}"#).unwrap().screens.is_empty());
        assert!(parse(r#"{"screens":"home, cart"}"#).unwrap().screens.is_empty());
        let m = parse(r#"{"screens":["home",{"id":"cart"}]}"#).unwrap();
        assert_eq!(m.screens.len(), 2);
        assert!(m.screens[0].id.is_none());
        assert_eq!(m.screens[1].id.as_deref(), Some("cart"));
    }

    #[test]
    fn non_string_theme_is_kept_as_json_text() {
        let m = parse(r#"{"theme":{"name":"AURORA"},"projectVisualDescription":42}"#).unwrap();
        assert_eq!(m.theme.as_deref(), Some(r#"{"name":"AURORA"}"#));
        assert_eq!(m.visual_description.as_deref(), Some("42"));
    }

    #[test]
    fn unknown_keys_survive_the_round_trip() {
        let m = parse(r##"{"projectName":"Todo","palette":["#fff"],"screens":[{"id":"home","icon":"house"}]}"##).unwrap();
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["palette"][0], "#fff");
        assert_eq!(v["screens"][0]["icon"], "house");
        assert_eq!(v["projectName"], "Todo");
    }
}
