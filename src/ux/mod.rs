//! Human-readable summaries. These go to stderr so stdout carries only the
//! payload and can be piped.

use colored::Colorize;
use std::io::{self, Write};

use crate::wire::{Origin, Outcome, ProjectManifest, ScreenPayload};

fn origin_badge(origin: Origin) -> colored::ColoredString {
    match origin {
        Origin::Generated => "[GENERATED]".green().bold(),
        Origin::Mock => "[MOCK]".yellow().bold(),
        Origin::RateLimited => "[RATE LIMITED]".red().bold(),
    }
}

fn persisted_note(persisted: bool) -> colored::ColoredString {
    if persisted {
        "saved".green()
    } else {
        "not saved".dimmed()
    }
}

pub fn write_manifest(w: &mut impl Write, out: &Outcome<ProjectManifest>) -> io::Result<()> {
    let m = &out.value;
    writeln!(w, "\n=== MANIFEST === {}  ({})", origin_badge(out.origin), persisted_note(out.persisted))?;
    writeln!(
        w,
        "{}  theme: {}",
        m.project_name.as_deref().unwrap_or("(unnamed project)").bold(),
        m.theme.as_deref().unwrap_or("-").cyan()
    )?;
    if let Some(d) = &m.visual_description {
        writeln!(w, "{}", d.dimmed())?;
    }
    if m.screens.is_empty() {
        return writeln!(w, "(no screens)");
    }
    for (i, s) in m.screens.iter().enumerate() {
        writeln!(
            w,
            "{}. {}  {} - {}",
            i + 1,
            format!("[{}]", s.id.as_deref().unwrap_or("?")).magenta(),
            s.name.as_deref().unwrap_or("(unnamed)").bold(),
            s.purpose.as_deref().unwrap_or("")
        )?;
    }
    writeln!(w)
}

pub fn write_screen(w: &mut impl Write, out: &Outcome<ScreenPayload>) -> io::Result<()> {
    let s = &out.value;
    writeln!(
        w,
        "\n=== SCREEN {}/{} === {}  ({})",
        s.project_id,
        s.screen_id,
        origin_badge(out.origin),
        persisted_note(out.persisted)
    )?;
    if let Some(name) = &s.screen_name {
        writeln!(w, "{}", name.bold())?;
    }
    writeln!(w, "{} bytes of markup\n", s.code.len())
}

pub fn show_manifest(out: &Outcome<ProjectManifest>) {
    let _ = write_manifest(&mut io::stderr().lock(), out);
}

pub fn show_screen(out: &Outcome<ScreenPayload>) {
    let _ = write_screen(&mut io::stderr().lock(), out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy;

    #[test]
    fn manifest_summary_lists_screens() {
        let out = Outcome::unpersisted(policy::mock_manifest(Some("AURORA")), Origin::Mock);
        let mut buf = Vec::new();
        write_manifest(&mut buf, &out).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("MANIFEST"));
        assert!(text.contains("Mock Project"));
        assert!(text.contains("Home Screen"));
    }

    #[test]
    fn screen_summary_reports_size_not_markup() {
        let payload = ScreenPayload { project_id: "p1".into(), screen_id: "home".into(), code: "<div/>".into(), ..Default::default() };
        let mut buf = Vec::new();
        write_screen(&mut buf, &Outcome::unpersisted(payload, Origin::Generated)).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("p1/home"));
        assert!(text.contains("6 bytes of markup"));
        assert!(!text.contains("<div/>"));
    }
}
