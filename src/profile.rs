use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::environment::{parse_assignments, Environment, ExportRecord};
use crate::error::{Error, Result};

/// First line of the managed block: this marker, alone or followed by a space
pub const START_MARKER: &str = "# >>> edenv";
/// Last line of the managed block: this marker, alone or followed by a space
pub const END_MARKER: &str = "# <<< edenv";

/// Blank lines written ahead of the header line
const SEPARATOR_LINES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Idle,
    Reset,
    HeaderWritten,
    Closed,
}

impl BlockState {
    fn as_str(self) -> &'static str {
        match self {
            BlockState::Idle => "idle",
            BlockState::Reset => "reset",
            BlockState::HeaderWritten => "open",
            BlockState::Closed => "closed",
        }
    }
}

/// Maintains the managed block of `export` statements in a shell profile
///
/// A run goes `reset -> begin_block -> export* -> end_block`. Each export is
/// expanded against the run's [`Environment`], appended to the profile and
/// then applied to the environment so later steps can see it.
///
/// Removal and re-creation are not atomic: a crash after `reset` leaves the
/// profile without a block (or with an unterminated one) until the next run.
#[derive(Debug)]
pub struct ProfileExporter {
    path: PathBuf,
    state: BlockState,
}

impl ProfileExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: BlockState::Idle,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> BlockState {
        self.state
    }

    /// Remove any managed block and trailing blank lines from the profile
    ///
    /// A missing profile is treated as empty and gets created.
    pub fn reset(&mut self) -> Result<()> {
        if self.state == BlockState::HeaderWritten {
            return Err(self.invalid("reset"));
        }

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => return Err(Error::io(&self.path, err)),
        };

        let stripped = strip_managed_block(&contents);
        if stripped != contents {
            tracing::debug!(
                "Rewriting {:?} ({} -> {} bytes)",
                self.path,
                contents.len(),
                stripped.len()
            );
        }

        fs::write(&self.path, stripped).map_err(|err| Error::io(&self.path, err))?;
        self.state = BlockState::Reset;
        Ok(())
    }

    /// Append the separator and header line that open the managed block
    pub fn begin_block(&mut self, header: &str) -> Result<()> {
        if self.state != BlockState::Reset {
            return Err(self.invalid("begin block"));
        }

        let mut text = "\n".repeat(SEPARATOR_LINES);
        text.push_str(&marker_line(START_MARKER, header));
        text.push('\n');
        self.append(&text)?;

        self.state = BlockState::HeaderWritten;
        Ok(())
    }

    /// Export one or more whitespace-separated `NAME=value` assignments
    ///
    /// Each assignment is expanded against `env`, written to the profile and
    /// then applied to `env`, in order. If expansion or the write fails the
    /// assignment leaves no trace in either place.
    pub fn export(&mut self, env: &mut Environment, assignments: &str) -> Result<Vec<ExportRecord>> {
        if self.state != BlockState::HeaderWritten {
            return Err(self.invalid("export"));
        }

        let pairs = parse_assignments(assignments)?;
        let mut records = Vec::with_capacity(pairs.len());

        for (name, template) in pairs {
            let record = env.resolve(&name, &template)?;
            self.append(&format!("{}\n", record.render()))?;
            tracing::debug!("Exported {}={}", record.name, record.value);

            env.apply(record.clone());
            records.push(record);
        }

        Ok(records)
    }

    /// Append the end marker; no further exports are accepted afterwards
    pub fn end_block(&mut self, footer: &str) -> Result<()> {
        if self.state != BlockState::HeaderWritten {
            return Err(self.invalid("end block"));
        }

        self.append(&format!("{}\n", marker_line(END_MARKER, footer)))?;
        self.state = BlockState::Closed;
        Ok(())
    }

    fn append(&self, text: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| Error::io(&self.path, err))?;

        file.write_all(text.as_bytes())
            .map_err(|err| Error::io(&self.path, err))
    }

    fn invalid(&self, operation: &'static str) -> Error {
        Error::InvalidState {
            operation,
            state: self.state.as_str(),
        }
    }
}

fn marker_line(marker: &str, text: &str) -> String {
    // Header and footer must stay on the marker's line
    let text = text.replace(['\r', '\n'], " ");
    let text = text.trim();
    if text.is_empty() {
        marker.to_string()
    } else {
        format!("{marker} {text}")
    }
}

fn is_marker(line: &str, marker: &str) -> bool {
    line.trim_end()
        .strip_prefix(marker)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
}

/// Drop every managed block, then every trailing blank line
///
/// Content outside the block keeps its order and line endings. A start marker
/// without a matching end marker is removed through end of file.
pub fn strip_managed_block(contents: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut in_block = false;

    for line in contents.split_inclusive('\n') {
        if in_block {
            if is_marker(line, END_MARKER) {
                in_block = false;
            }
            continue;
        }

        if is_marker(line, START_MARKER) {
            in_block = true;
            continue;
        }

        kept.push(line);
    }

    while kept.last().is_some_and(|line| line.trim().is_empty()) {
        kept.pop();
    }

    let mut result = kept.concat();
    if !result.is_empty() && !result.ends_with('\n') {
        result.push('\n');
    }
    result
}

/// Render the block a run would append, without touching any file
///
/// `env` receives the exports exactly as a real run would apply them.
pub fn render_block<'a, I>(env: &mut Environment, header: &str, exports: I, footer: &str) -> Result<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut lines = vec![marker_line(START_MARKER, header)];

    for assignments in exports {
        for (name, template) in parse_assignments(assignments)? {
            let record = env.resolve(&name, &template)?;
            lines.push(record.render());
            env.apply(record);
        }
    }

    lines.push(marker_line(END_MARKER, footer));
    Ok(lines.join("\n"))
}
