//! Child-process invocation of the external Python tools.

use std::ffi::OsString;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, warn};

/// A program plus the leading arguments that select the tool.
///
/// For the Python tools this is `python -m <module>`; tests substitute a
/// shell so the adapters can run without Python installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args_prefix: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, args_prefix: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args_prefix,
        }
    }

    /// `python -m module`
    pub fn python_module(python: impl Into<String>, module: &str) -> Self {
        Self::new(python, vec!["-m".to_string(), module.to_string()])
    }

    /// Build a command with the prefix, `args`, and extra environment.
    ///
    /// The environment entries apply to the child only.
    pub fn command<I, S>(&self, args: I, env: &[(OsString, OsString)]) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        debug!(
            "Running {} {} {}",
            self.program,
            self.args_prefix.join(" "),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args_prefix).args(args);
        for (key, value) in env {
            cmd.env(key, value);
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

/// Compose a PYTHONPATH with `extra` entries ahead of `inherited`.
///
/// Returns `None` when there is nothing to set.
pub fn python_path_value(extra: &[PathBuf], inherited: Option<OsString>) -> Option<OsString> {
    let mut entries: Vec<PathBuf> = extra.to_vec();
    if let Some(existing) = inherited.filter(|v| !v.is_empty()) {
        entries.extend(std::env::split_paths(&existing));
    }
    if entries.is_empty() {
        return None;
    }
    match std::env::join_paths(entries) {
        Ok(joined) => Some(joined),
        Err(e) => {
            warn!("Ignoring unusable PYTHONPATH entries: {}", e);
            None
        }
    }
}

/// Child environment: PYTHONPATH (when any) followed by `env`.
///
/// PYTHONPATH stays an `OsString`, so non-UTF-8 directories survive.
pub fn child_env(python_path: &[PathBuf], env: &[(String, String)]) -> Vec<(OsString, OsString)> {
    let mut out = Vec::with_capacity(env.len() + 1);
    if let Some(value) = python_path_value(python_path, std::env::var_os("PYTHONPATH")) {
        out.push((OsString::from("PYTHONPATH"), value));
    }
    out.extend(
        env.iter()
            .map(|(key, value)| (OsString::from(key), OsString::from(value))),
    );
    out
}

/// Last `lines` lines of a process's stderr.
pub fn stderr_tail(stderr: &[u8], lines: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_module_prefix() {
        let tool = ToolCommand::python_module("python3", "graphrag.index");
        assert_eq!(tool.program, "python3");
        assert_eq!(tool.args_prefix, vec!["-m", "graphrag.index"]);
    }

    #[test]
    fn test_python_path_prepends_extra() {
        let value = python_path_value(
            &[PathBuf::from("/opt/graphrag")],
            Some(OsString::from("/usr/lib/py")),
        )
        .unwrap();
        let parts: Vec<PathBuf> = std::env::split_paths(&value).collect();
        assert_eq!(
            parts,
            vec![PathBuf::from("/opt/graphrag"), PathBuf::from("/usr/lib/py")]
        );
    }

    #[test]
    fn test_python_path_empty() {
        assert!(python_path_value(&[], None).is_none());
        assert!(python_path_value(&[], Some(OsString::new())).is_none());
    }

    #[test]
    fn test_child_env_keeps_credentials_after_python_path() {
        let env = child_env(
            &[PathBuf::from("/opt/graphrag")],
            &[("GRAPHRAG_API_KEY".to_string(), "sk-test".to_string())],
        );
        let (key, value) = env.first().unwrap();
        assert_eq!(key, "PYTHONPATH");
        assert_eq!(
            std::env::split_paths(value).next(),
            Some(PathBuf::from("/opt/graphrag"))
        );
        assert_eq!(
            env.last().unwrap(),
            &(OsString::from("GRAPHRAG_API_KEY"), OsString::from("sk-test"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_python_path_keeps_non_utf8_entries() {
        use std::os::unix::ffi::{OsStrExt, OsStringExt};

        let raw = OsString::from_vec(b"/opt/gr\xffaph".to_vec());
        let env = child_env(&[PathBuf::from(&raw)], &[]);
        let (_, value) = &env[0];
        let first = std::env::split_paths(value).next().unwrap();
        assert_eq!(first.as_os_str().as_bytes(), raw.as_bytes());
    }

    #[test]
    fn test_stderr_tail() {
        let err = b"one\ntwo\nthree\nfour\n";
        assert_eq!(stderr_tail(err, 2), "three\nfour");
        assert_eq!(stderr_tail(err, 10), "one\ntwo\nthree\nfour");
        assert_eq!(stderr_tail(b"", 3), "");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_env_reaches_child_only() {
        let tool = ToolCommand::new("sh", vec!["-c".into()]);
        let output = tool
            .command(
                ["printf %s \"$MEETGRAPH_TOOL_TEST\""],
                &[("MEETGRAPH_TOOL_TEST".into(), "child-only".into())],
            )
            .output()
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "child-only");
        assert!(std::env::var_os("MEETGRAPH_TOOL_TEST").is_none());
    }
}
