use regex::Regex;
use std::collections::BTreeMap;
use std::env;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// A single exported environment variable with its value fully expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRecord {
    pub name: String,
    pub value: String,
}

impl ExportRecord {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Render as a POSIX shell `export` statement
    pub fn render(&self) -> String {
        format!("export {}={}", self.name, quote_value(&self.value))
    }
}

/// Environment threaded through a provisioning run
///
/// Seeded from the ambient process environment (or explicit vars in tests).
/// Exports applied during the run shadow ambient values and are visible to
/// every later expansion and child process.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: BTreeMap<String, String>,
    exports: Vec<ExportRecord>,
}

impl Environment {
    /// Snapshot the current process environment
    ///
    /// Variables whose name or value is not valid UTF-8 are left out; a
    /// reference to one fails expansion like any other undefined name.
    pub fn from_process() -> Self {
        Self::from_vars(env::vars_os().filter_map(|(name, value)| {
            match (name.into_string(), value.into_string()) {
                (Ok(name), Ok(value)) => Some((name, value)),
                (name, _) => {
                    tracing::debug!("Ignoring non UTF-8 variable {:?}", name);
                    None
                }
            }
        }))
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            exports: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// All variables, for handing to child processes
    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Records exported this run, in the order they were applied
    pub fn exports(&self) -> &[ExportRecord] {
        &self.exports
    }

    pub fn apply(&mut self, record: ExportRecord) {
        self.vars.insert(record.name.clone(), record.value.clone());
        self.exports.push(record);
    }

    /// Expand `$VAR` and `${VAR}` references against this environment
    pub fn expand(&self, template: &str) -> Result<String> {
        shellexpand::env_with_context(template, |name| match self.vars.get(name) {
            Some(value) => Ok(Some(value.as_str())),
            None => Err(()),
        })
        .map(|expanded| expanded.into_owned())
        .map_err(|err| Error::UndefinedVariable {
            name: err.var_name,
            template: template.to_string(),
        })
    }

    /// Expand `template` into a resolved record for `name`, without applying it
    pub fn resolve(&self, name: &str, template: &str) -> Result<ExportRecord> {
        let value = self.expand(template)?;
        Ok(ExportRecord::new(name, value))
    }
}

fn identifier_regex() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

pub fn is_valid_name(name: &str) -> bool {
    identifier_regex().is_match(name)
}

/// Split `NAME=value NAME2=value2` into raw (unexpanded) pairs
pub fn parse_assignments(input: &str) -> Result<Vec<(String, String)>> {
    input
        .split_whitespace()
        .map(|token| {
            let (name, value) = token.split_once('=').ok_or_else(|| Error::InvalidAssignment {
                input: token.to_string(),
            })?;

            if !is_valid_name(name) {
                return Err(Error::InvalidAssignment {
                    input: token.to_string(),
                });
            }

            Ok((name.to_string(), value.to_string()))
        })
        .collect()
}

fn quote_value(value: &str) -> String {
    let safe = value.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.' | '/' | ':' | ',' | '+' | '@' | '%' | '=')
    });

    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serial_test::serial;

    fn sample_env() -> Environment {
        Environment::from_vars([("HOME", "/home/dev"), ("PATH", "/usr/bin:/bin")])
    }

    #[test]
    fn test_expand_braced_and_bare() {
        let env = sample_env();
        assert_eq!(env.expand("${HOME}/.vim").unwrap(), "/home/dev/.vim");
        assert_eq!(env.expand("$HOME/bin:$PATH").unwrap(), "/home/dev/bin:/usr/bin:/bin");
        assert_eq!(env.expand("plain").unwrap(), "plain");
    }

    #[test]
    fn test_expand_undefined_variable() {
        let env = sample_env();
        let err = env.expand("${Z}/bin").unwrap_err();
        match err {
            Error::UndefinedVariable { name, template } => {
                assert_eq!(name, "Z");
                assert_eq!(template, "${Z}/bin");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    #[serial]
    #[cfg(unix)]
    fn test_from_process_skips_non_utf8_variables() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        env::set_var("EDENV_TEST_BYTES", OsStr::from_bytes(b"\xff\xfe"));
        env::set_var("EDENV_TEST_TEXT", "plain");
        let snapshot = Environment::from_process();
        env::remove_var("EDENV_TEST_BYTES");
        env::remove_var("EDENV_TEST_TEXT");

        assert_eq!(snapshot.get("EDENV_TEST_TEXT"), Some("plain"));
        assert_eq!(snapshot.get("EDENV_TEST_BYTES"), None);
        assert!(matches!(
            snapshot.expand("${EDENV_TEST_BYTES}").unwrap_err(),
            Error::UndefinedVariable { ref name, .. } if name == "EDENV_TEST_BYTES"
        ));
    }

    #[test]
    fn test_apply_shadows_ambient_and_keeps_order() {
        let mut env = sample_env();
        env.apply(ExportRecord::new("A", "1"));
        let b = env.resolve("B", "${A}2").unwrap();
        env.apply(b);
        env.apply(ExportRecord::new("HOME", "/tmp/home"));

        assert_eq!(env.get("B"), Some("12"));
        assert_eq!(env.get("HOME"), Some("/tmp/home"));
        let names: Vec<_> = env.exports().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "HOME"]);
    }

    #[test]
    fn test_parse_assignments_multiple() {
        let pairs = parse_assignments("A=1  B=${A}2\tC=").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "${A}2".to_string()),
                ("C".to_string(), String::new()),
            ]
        );
    }

    #[rstest]
    #[case("NOEQUALS")]
    #[case("1BAD=x")]
    #[case("=x")]
    #[case("BAD-NAME=x")]
    fn test_parse_assignments_rejects(#[case] input: &str) {
        let err = parse_assignments(input).unwrap_err();
        assert!(matches!(err, Error::InvalidAssignment { .. }));
    }

    #[rstest]
    #[case("X", "foo", "export X=foo")]
    #[case("PATH", "/opt/pmd/bin:/usr/bin", "export PATH=/opt/pmd/bin:/usr/bin")]
    #[case("MSG", "hello world", "export MSG='hello world'")]
    #[case("Q", "it's", r"export Q='it'\''s'")]
    #[case("EMPTY", "", "export EMPTY=")]
    fn test_render(#[case] name: &str, #[case] value: &str, #[case] expected: &str) {
        assert_eq!(ExportRecord::new(name, value).render(), expected);
    }
}
