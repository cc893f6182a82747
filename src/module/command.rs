use super::Module;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// Runs an external program and shows the first line it prints.
#[derive(Debug, Clone)]
pub struct CommandModule {
    program: String,
    args: Vec<String>,
}

impl CommandModule {
    /// Build from a full argument vector (`args[0]` is the program).
    pub fn new(args: &[String]) -> Result<Self> {
        let (program, rest) = args
            .split_first()
            .context("command must name a program")?;
        Ok(Self {
            program: program.clone(),
            args: rest.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Module for CommandModule {
    async fn full_text(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = first_line(&stderr).trim();
            if detail.is_empty() {
                anyhow::bail!("{}", output.status);
            }
            anyhow::bail!("{}: {}", output.status, detail);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(pad(first_line(&stdout)))
    }
}

/// Everything up to the first newline, or the whole text.
fn first_line(text: &str) -> &str {
    text.split('\n').next().unwrap_or_default()
}

/// Surround non-empty text with a single space for readability in the bar.
fn pad(text: &str) -> String {
    let clean = text.trim();
    if clean.is_empty() {
        String::new()
    } else {
        format!(" {} ", clean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(args: &[&str]) -> CommandModule {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        CommandModule::new(&args).unwrap()
    }

    #[test]
    fn test_pad() {
        assert_eq!(pad("foo\n"), " foo ");
        assert_eq!(pad("  \t"), "");
        assert_eq!(pad(""), "");
    }

    #[test]
    fn test_first_line() {
        assert_eq!(first_line("foo\nbar\n"), "foo");
        assert_eq!(first_line("no newline"), "no newline");
        assert_eq!(first_line(""), "");
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(CommandModule::new(&[]).is_err());
    }

    #[tokio::test]
    async fn test_echo_is_padded() {
        assert_eq!(command(&["echo", "foo"]).full_text().await.unwrap(), " foo ");
    }

    #[tokio::test]
    async fn test_silent_success_is_empty() {
        assert_eq!(command(&["true"]).full_text().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_only_first_line_is_kept() {
        let out = command(&["sh", "-c", "echo foo; echo bar"]).full_text().await.unwrap();
        assert_eq!(out, " foo ");
    }

    #[tokio::test]
    async fn test_failure_reports_exit_status() {
        let err = command(&["false"]).full_text().await.unwrap_err();
        assert_eq!(err.to_string(), "exit status: 1");
    }

    #[tokio::test]
    async fn test_failure_includes_stderr_line() {
        let err = command(&["sh", "-c", "echo '  disk gone  ' >&2; echo more >&2; exit 3"])
            .full_text()
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "exit status: 3: disk gone");
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = command(&["/nonexistent/tickbar-probe"]).full_text().await.unwrap_err();
        assert!(format!("{:#}", err).contains("failed to run /nonexistent/tickbar-probe"));
    }
}
