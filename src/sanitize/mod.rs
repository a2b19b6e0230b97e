/// What the caller expects to find inside a model reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Markup,
    Json,
}

const MARKUP_FENCES: [&str; 3] = ["```html", "```jsx", "```"];
const JSON_FENCES: [&str; 2] = ["```json", "```"];

pub fn strip_fences(raw: &str, expect: Expect) -> String {
    let fences: &[&str] = match expect {
        Expect::Markup => &MARKUP_FENCES,
        Expect::Json => &JSON_FENCES,
    };
    let mut s = raw.to_string();
    for f in fences {
        s = s.replace(f, "");
    }
    s.trim().to_string()
}

/// Clean a raw reply. For `Json`, the span from the first `{` to the last `}`
/// is kept; without both brackets the trimmed text passes through and the
/// parser reports the failure.
pub fn sanitize(raw: &str, expect: Expect) -> String {
    let cleaned = strip_fences(raw, expect);
    match expect {
        Expect::Markup => cleaned,
        Expect::Json => match (cleaned.find('{'), cleaned.rfind('}')) {
            (Some(start), Some(end)) if start < end => cleaned[start..=end].to_string(),
            _ => cleaned,
        },
    }
}
