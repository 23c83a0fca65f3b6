use anstyle::{AnsiColor, Style};
use is_terminal::IsTerminal;
use std::fmt::Display;
use std::io::{self, Write};
use std::time::{Duration, Instant};

const STATUS_WIDTH: usize = 12;

#[derive(Debug, Clone, Copy)]
enum StatusKind {
    Pending,
    Success,
    Info,
    Error,
}

impl StatusKind {
    fn to_stderr(self) -> bool {
        matches!(self, StatusKind::Error)
    }

    fn style(self) -> Style {
        let style = Style::new().bold();
        let color = match self {
            StatusKind::Pending => AnsiColor::Cyan,
            StatusKind::Success => AnsiColor::Green,
            StatusKind::Info => AnsiColor::Blue,
            StatusKind::Error => AnsiColor::Red,
        };
        style.fg_color(Some(color.into()))
    }
}

fn use_color(to_stderr: bool) -> bool {
    let tty = if to_stderr {
        io::stderr().is_terminal()
    } else {
        io::stdout().is_terminal()
    };
    tty && std::env::var_os("NO_COLOR").is_none()
}

fn write_status(kind: StatusKind, label: &str, message: &str) {
    let to_stderr = kind.to_stderr();
    let mut handle: Box<dyn Write> = if to_stderr {
        Box::new(io::stderr().lock())
    } else {
        Box::new(io::stdout().lock())
    };

    let (prefix, suffix) = if use_color(to_stderr) {
        let style = kind.style();
        (style.render().to_string(), style.render_reset().to_string())
    } else {
        (String::new(), String::new())
    };

    for (idx, line) in message.split('\n').enumerate() {
        if idx == 0 {
            let _ = writeln!(handle, "{prefix}{label:>width$}{suffix} {line}", width = STATUS_WIDTH);
        } else {
            let _ = writeln!(handle, "{:>width$} {line}", "", width = STATUS_WIDTH);
        }
    }
    let _ = handle.flush();
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 60 {
        let minutes = duration.as_secs() / 60;
        let seconds = duration.as_secs() % 60;
        if seconds == 0 {
            format!("{minutes}m")
        } else {
            format!("{minutes}m {seconds}s")
        }
    } else if duration.as_secs_f64() >= 1.0 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

pub fn info(message: impl Display) {
    write_status(StatusKind::Info, "Info", &message.to_string());
}

pub fn error(message: impl Display) {
    write_status(StatusKind::Error, "Error", &message.to_string());
}

pub fn success(label: &str, message: impl Display) {
    write_status(StatusKind::Success, label, &message.to_string());
}

/// A timed provisioning step
///
/// Reports as aborted if dropped before `success` or `skip`, which is what
/// happens when a step returns early through `?`.
pub struct Progress {
    message: String,
    started: Instant,
    complete: bool,
}

impl Progress {
    pub fn new(label: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        write_status(StatusKind::Pending, label, &message);

        Self {
            message,
            started: Instant::now(),
            complete: false,
        }
    }

    pub fn success(mut self, label: &str, detail: Option<String>) {
        self.complete = true;
        let mut combined = self.message.clone();
        if let Some(detail) = detail.filter(|detail| !detail.is_empty()) {
            combined.push(' ');
            combined.push_str(&detail);
        }
        combined.push_str(" in ");
        combined.push_str(&format_duration(self.started.elapsed()));

        write_status(StatusKind::Success, label, &combined);
    }

    pub fn skip(mut self, reason: impl Display) {
        self.complete = true;
        write_status(
            StatusKind::Info,
            "Skipped",
            &format!("{} ({reason})", self.message),
        );
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if !self.complete {
            let combined = format!(
                "{} (aborted after {})",
                self.message,
                format_duration(self.started.elapsed())
            );
            write_status(StatusKind::Error, "Failed", &combined);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Duration::from_millis(15), "15ms")]
    #[case(Duration::from_millis(1500), "1.50s")]
    #[case(Duration::from_secs(60), "1m")]
    #[case(Duration::from_secs(125), "2m 5s")]
    fn test_format_duration(#[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(format_duration(duration), expected);
    }
}
