//! Transpiler backed by an esbuild-compatible executable
//!
//! The source goes in over stdin, JavaScript comes back on stdout, and
//! diagnostics are parsed from the plain-text log on stderr:
//!
//! ```text
//! ✘ [ERROR] Expected ";" but found "y"
//!
//!     <stdin>:3:12:
//!       3 │ const a = x y;
//!         ╵             ^
//! ```

use super::{TranspileFailure, TranspileMessage, TranspileOutput, TranspileRequest, Transpiler};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:✘|X|▲)\s*\[(?P<level>ERROR|WARNING)\]\s*(?P<text>.*)$")
        .expect("static header pattern")
});

static LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*<stdin>:(?P<line>\d+):(?P<column>\d+):\s*$").expect("static location pattern")
});

static EXCERPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\d+\s*│\s?(?P<text>.*)$").expect("static excerpt pattern")
});

/// Runs an external transpiler process per request
#[derive(Debug, Clone)]
pub struct CommandTranspiler {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl CommandTranspiler {
    /// Transpiler invoking `program`
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    /// `esbuild` from `PATH`
    #[must_use]
    pub fn esbuild() -> Self {
        Self::new("esbuild")
    }

    /// With an additional command-line argument
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Executable path
    #[must_use]
    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    /// Arguments for one request
    #[must_use]
    pub fn args_for(&self, request: &TranspileRequest) -> Vec<String> {
        let mut args = vec![
            format!("--loader={}", request.dialect.as_str()),
            format!("--target={}", request.target),
            format!("--format={}", request.module_format.as_str()),
            "--jsx=transform".to_string(),
            "--log-level=warning".to_string(),
            "--color=false".to_string(),
        ];
        // Top-level names must survive: the mount step looks the entry up by name
        if request.minify {
            args.push("--minify-whitespace".to_string());
            args.push("--minify-syntax".to_string());
        }
        if request.sourcemap {
            args.push("--sourcemap=inline".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[async_trait]
impl Transpiler for CommandTranspiler {
    async fn transpile(&self, request: TranspileRequest) -> Result<TranspileOutput, TranspileFailure> {
        let mut child = Command::new(&self.program)
            .args(self.args_for(&request))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TranspileFailure::message(format!(
                    "failed to start transpiler '{}': {}",
                    self.program.display(),
                    e
                ))
            })?;

        let Some(mut stdin) = child.stdin.take() else {
            return Err(TranspileFailure::message("transpiler stdin unavailable"));
        };
        let code = request.code;
        let feed = async move {
            let result = stdin.write_all(code.as_bytes()).await;
            drop(stdin);
            result
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());

        let output = output
            .map_err(|e| TranspileFailure::message(format!("transpiler did not finish: {e}")))?;
        if let Err(e) = fed {
            tracing::debug!("Writing to transpiler stdin failed: {}", e);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let (errors, warnings) = parse_diagnostics(&stderr);

        if output.status.success() {
            return Ok(TranspileOutput {
                code: String::from_utf8_lossy(&output.stdout).into_owned(),
                warnings,
            });
        }

        if errors.is_empty() {
            let detail = stderr.trim();
            let text = if detail.is_empty() {
                format!("transpiler exited with {}", output.status)
            } else {
                detail.to_string()
            };
            return Err(TranspileFailure::message(text));
        }
        Err(TranspileFailure { messages: errors })
    }

    fn name(&self) -> &str {
        "command"
    }
}

/// Split an esbuild-style log into errors and warnings
///
/// Columns in the log are 0-based and converted to 1-based.
#[must_use]
pub fn parse_diagnostics(log: &str) -> (Vec<TranspileMessage>, Vec<TranspileMessage>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut current: Option<(bool, TranspileMessage)> = None;

    let mut flush = |entry: Option<(bool, TranspileMessage)>| {
        if let Some((is_error, message)) = entry {
            if is_error {
                errors.push(message);
            } else {
                warnings.push(message);
            }
        }
    };

    for line in log.lines() {
        if let Some(caps) = HEADER.captures(line) {
            flush(current.take());
            let is_error = &caps["level"] == "ERROR";
            current = Some((is_error, TranspileMessage::new(caps["text"].trim())));
            continue;
        }
        let Some((_, message)) = current.as_mut() else {
            continue;
        };
        if message.line.is_none() {
            if let Some(caps) = LOCATION.captures(line) {
                let line_no = caps["line"].parse().unwrap_or(0);
                let column = caps["column"].parse::<u32>().unwrap_or(0).saturating_add(1);
                message.line = Some(line_no);
                message.column = Some(column);
                continue;
            }
        }
        if message.line.is_some() && message.line_text.is_none() {
            if let Some(caps) = EXCERPT.captures(line) {
                message.line_text = Some(caps["text"].to_string());
            }
        }
    }
    flush(current.take());

    (errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpiler::{Dialect, ModuleFormat};

    const LOG: &str = "✘ [ERROR] Expected \";\" but found \"y\"

    <stdin>:3:12:
      3 │ const a = x y;
        ╵             ^

▲ [WARNING] Duplicate key \"a\" in object literal [duplicate-object-key]

    <stdin>:5:14:
      5 │ const o = { a: 1, a: 2 };
        ╵               ~

1 warning and 1 error
";

    #[test]
    fn parses_errors_and_warnings() {
        let (errors, warnings) = parse_diagnostics(LOG);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].text, "Expected \";\" but found \"y\"");
        assert_eq!(errors[0].line, Some(3));
        assert_eq!(errors[0].column, Some(13));
        assert_eq!(errors[0].line_text.as_deref(), Some("const a = x y;"));

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, Some(5));
    }

    #[test]
    fn message_without_location() {
        let (errors, _) = parse_diagnostics("✘ [ERROR] Could not resolve \"x\"\n");
        assert_eq!(errors, vec![TranspileMessage::new("Could not resolve \"x\"")]);
    }

    #[test]
    fn args_follow_request() {
        let transpiler = CommandTranspiler::esbuild().with_arg("--charset=utf8");
        let mut request = TranspileRequest::new("x");
        request.dialect = Dialect::Jsx;
        request.module_format = ModuleFormat::Iife;
        request.minify = true;
        request.sourcemap = true;

        let args = transpiler.args_for(&request);
        assert!(args.contains(&"--loader=jsx".to_string()));
        assert!(args.contains(&"--format=iife".to_string()));
        assert!(args.contains(&"--minify-whitespace".to_string()));
        assert!(args.contains(&"--minify-syntax".to_string()));
        assert!(args.contains(&"--sourcemap=inline".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--charset=utf8"));
    }

    #[test]
    fn minify_keeps_identifiers() {
        let mut request = TranspileRequest::new("export function Dashboard() {}");
        request.minify = true;

        let args = CommandTranspiler::esbuild().args_for(&request);
        assert!(!args.iter().any(|a| a == "--minify" || a.starts_with("--minify-identifiers")));

        request.minify = false;
        let args = CommandTranspiler::esbuild().args_for(&request);
        assert!(!args.iter().any(|a| a.starts_with("--minify")));
    }

    #[tokio::test]
    async fn missing_binary_is_a_failure() {
        let transpiler = CommandTranspiler::new("/nonexistent/vetshim-esbuild");
        let failure = transpiler
            .transpile(TranspileRequest::new("const a = 1;"))
            .await
            .unwrap_err();
        assert_eq!(failure.messages.len(), 1);
        assert!(failure.messages[0].text.contains("failed to start transpiler"));
    }
}
