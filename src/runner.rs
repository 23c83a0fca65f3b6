use std::process::Command;

use crate::environment::Environment;
use crate::error::{Error, Result};

/// Executes external tools on behalf of the provisioner
pub trait CommandRunner {
    /// Run `program` to completion with exactly the variables in `env`
    fn run(&self, program: &str, args: &[String], env: &Environment) -> Result<()>;
}

/// Spawns real processes with inherited stdio
///
/// The tool's own output is the diagnostic; failures are only tagged with
/// the program name and exit code.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String], env: &Environment) -> Result<()> {
        tracing::debug!("Running {} {}", program, args.join(" "));

        let status = Command::new(program)
            .args(args)
            .env_clear()
            .envs(env.vars())
            .status()
            .map_err(|err| Error::io(program, err))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::ExternalCommand {
                program: program.to_string(),
                code: status.code(),
            })
        }
    }
}

/// Split an argv list into program and arguments
pub fn split_argv(argv: &[String]) -> Option<(&str, &[String])> {
    argv.split_first()
        .map(|(program, args)| (program.as_str(), args))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    #[cfg(unix)]
    fn test_system_runner_success() {
        let env = Environment::from_process();
        SystemRunner.run("sh", &sh("exit 0"), &env).unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn test_system_runner_reports_exit_code() {
        let env = Environment::from_process();
        let err = SystemRunner.run("sh", &sh("exit 3"), &env).unwrap_err();
        match err {
            Error::ExternalCommand { program, code } => {
                assert_eq!(program, "sh");
                assert_eq!(code, Some(3));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_system_runner_passes_environment() {
        let mut env = Environment::from_process();
        env.apply(crate::environment::ExportRecord::new("EDENV_PROBE", "42"));
        SystemRunner
            .run("sh", &sh("test \"$EDENV_PROBE\" = 42"), &env)
            .unwrap();
    }

    #[test]
    fn test_system_runner_missing_program() {
        let env = Environment::from_process();
        let err = SystemRunner
            .run("edenv-definitely-missing", &[], &env)
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_split_argv() {
        let argv = vec!["vim".to_string(), "+PluginInstall".to_string(), "+qall".to_string()];
        let (program, args) = split_argv(&argv).unwrap();
        assert_eq!(program, "vim");
        assert_eq!(args.len(), 2);
        assert!(split_argv(&[]).is_none());
    }
}
