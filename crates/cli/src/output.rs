//! Event printing

use owo_colors::OwoColorize;
use std::io::Write;
use watcher::{EventKind, WatchEvent};

/// Writes forwarded events to stdout
pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn print(&self, event: &WatchEvent) -> anyhow::Result<()> {
        let line = self.format(event)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}")?;
        stdout.flush()?;
        Ok(())
    }

    fn format(&self, event: &WatchEvent) -> anyhow::Result<String> {
        if self.json {
            return Ok(serde_json::to_string(event)?);
        }

        let kind = format!("{:>8}", event.kind.as_str());
        let kind = match event.kind {
            EventKind::Created => kind.green().to_string(),
            EventKind::Modified => kind.yellow().to_string(),
            EventKind::Deleted => kind.red().to_string(),
            EventKind::Moved => kind.cyan().to_string(),
        };

        Ok(match event.destination() {
            Some(to) => format!("{} {} -> {}", kind, event.path.display(), to.display()),
            None => format!("{} {}", kind, event.path.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_line() {
        let printer = Printer::new(true);
        let line = printer.format(&WatchEvent::moved("/tmp/a", "/tmp/b")).unwrap();
        assert_eq!(
            line,
            r#"{"kind":"moved","path":"/tmp/a","destination":"/tmp/b"}"#
        );

        let line = printer.format(&WatchEvent::created("/tmp/a")).unwrap();
        assert_eq!(line, r#"{"kind":"created","path":"/tmp/a"}"#);
    }

    #[test]
    fn test_plain_line_shows_both_move_paths() {
        let printer = Printer::new(false);
        let line = printer.format(&WatchEvent::moved("/tmp/a", "/tmp/b")).unwrap();
        assert!(line.contains("moved"));
        assert!(line.ends_with("/tmp/a -> /tmp/b"));
    }
}
