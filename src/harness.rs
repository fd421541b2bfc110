//! Client for the external plugin-hosting harness.
//!
//! The harness is a separate executable, never linked in. Each request is an
//! argument list; each response is an exit status, captured stdout/stderr, and
//! for `render`, a file left in the output directory.
//!
//! Two commands are used:
//!
//! ```bash
//! harness dump-params --plugin <plugin>
//! harness render --plugin <plugin> --in <dry.wav> --outdir <dir> \
//!     --sr <rate> --bs <block> --ch <channels> --warmup <blocks> \
//!     --set-params "0=0.500000,1=0.700000,..."
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use compressor_validate::harness::{HarnessRunner, RenderRequest};
//!
//! let harness = HarnessRunner::new("build/vst3_harness");
//! let dump = harness.dump_params("build/Compressor.vst3")?;
//!
//! let wet = harness.render(&RenderRequest {
//!     plugin: "build/Compressor.vst3".into(),
//!     input: "out/transfer_input.wav".into(),
//!     output_dir: "out".into(),
//!     sample_rate: 48000,
//!     block_size: 512,
//!     channels: 2,
//!     warmup_blocks: 10,
//!     set_params: "0=0.500000".into(),
//! })?;
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, error, info};

/// File name the harness writes inside `--outdir`.
pub const RENDERED_FILE_NAME: &str = "wet.wav";

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Harness executable not found: {0}")]
    HarnessNotFound(PathBuf),
    #[error("Failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Command failed with exit code {}: {command}", exit_code_label(.code))]
    ExternalProcessFailure {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("Expected rendered file not found: {0}")]
    MissingOutputArtifact(PathBuf),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "<terminated by signal>".to_string(),
    }
}

/// Everything the harness needs to render one file.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub plugin: PathBuf,
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub sample_rate: u32,
    pub block_size: u32,
    pub channels: u16,
    pub warmup_blocks: u32,
    /// `index=value` list from [`crate::params::build_set_params`].
    pub set_params: String,
}

impl RenderRequest {
    fn args(&self) -> Vec<OsString> {
        vec![
            "render".into(),
            "--plugin".into(),
            self.plugin.clone().into(),
            "--in".into(),
            self.input.clone().into(),
            "--outdir".into(),
            self.output_dir.clone().into(),
            "--sr".into(),
            self.sample_rate.to_string().into(),
            "--bs".into(),
            self.block_size.to_string().into(),
            "--ch".into(),
            self.channels.to_string().into(),
            "--warmup".into(),
            self.warmup_blocks.to_string().into(),
            "--set-params".into(),
            self.set_params.clone().into(),
        ]
    }

    /// Where the harness is expected to leave its output.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(RENDERED_FILE_NAME)
    }
}

/// Runner for harness invocations.
pub struct HarnessRunner {
    executable: PathBuf,
}

impl HarnessRunner {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Check an explicit executable path exists before any invocation.
    ///
    /// A bare name such as `vst3_harness` is resolved through `PATH` when the
    /// process is spawned, so it is accepted here and a failed lookup surfaces
    /// as [`HarnessError::Spawn`].
    pub fn check(&self) -> Result<(), HarnessError> {
        if self.executable.components().count() <= 1 || self.executable.is_file() {
            Ok(())
        } else {
            Err(HarnessError::HarnessNotFound(self.executable.clone()))
        }
    }

    /// List the plugin's parameters as raw `dump-params` output.
    pub fn dump_params(&self, plugin: impl AsRef<Path>) -> Result<String, HarnessError> {
        let args: Vec<OsString> = vec![
            "dump-params".into(),
            "--plugin".into(),
            plugin.as_ref().into(),
        ];
        self.run(&args)
    }

    /// Render `request.input` through the plugin and return the output path.
    pub fn render(&self, request: &RenderRequest) -> Result<PathBuf, HarnessError> {
        let stdout = self.run(&request.args())?;
        for line in stdout.lines() {
            debug!(target: "compressor_validate::harness", "{}", line);
        }

        let wet = request.output_path();
        if !wet.exists() {
            return Err(HarnessError::MissingOutputArtifact(wet));
        }
        Ok(wet)
    }

    /// Run one blocking invocation; returns stdout on a zero exit status.
    fn run(&self, args: &[OsString]) -> Result<String, HarnessError> {
        let command = self.command_line(args);
        info!("running {}", command);

        let output = Command::new(&self.executable)
            .args(args)
            .output()
            .map_err(|source| HarnessError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            // Surface everything the harness said before failing the run.
            eprint!("{}", stdout);
            eprint!("{}", stderr);
            error!(code = ?output.status.code(), "harness invocation failed");
            return Err(HarnessError::ExternalProcessFailure {
                command,
                code: output.status.code(),
                stdout,
                stderr,
            });
        }

        if !stderr.trim().is_empty() {
            debug!("harness stderr: {}", stderr.trim());
        }
        Ok(stdout)
    }

    fn command_line(&self, args: &[OsString]) -> String {
        std::iter::once(self.executable.as_os_str())
            .chain(args.iter().map(OsString::as_os_str))
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RenderRequest {
        RenderRequest {
            plugin: PathBuf::from("Comp.vst3"),
            input: PathBuf::from("out/in.wav"),
            output_dir: PathBuf::from("out"),
            sample_rate: 48000,
            block_size: 512,
            channels: 2,
            warmup_blocks: 10,
            set_params: "0=0.500000,1=0.700000".to_string(),
        }
    }

    #[test]
    fn render_args_follow_harness_cli() {
        let args: Vec<String> = request()
            .args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "render", "--plugin", "Comp.vst3", "--in", "out/in.wav", "--outdir", "out",
                "--sr", "48000", "--bs", "512", "--ch", "2", "--warmup", "10",
                "--set-params", "0=0.500000,1=0.700000",
            ]
        );
    }

    #[test]
    fn output_path_is_deterministic() {
        assert_eq!(request().output_path(), Path::new("out").join("wet.wav"));
    }

    #[test]
    fn command_line_includes_executable() {
        let runner = HarnessRunner::new("/opt/harness");
        let line = runner.command_line(&["dump-params".into(), "--plugin".into(), "p".into()]);
        assert_eq!(line, "/opt/harness dump-params --plugin p");
    }

    #[test]
    fn failure_message_names_command_and_code() {
        let err = HarnessError::ExternalProcessFailure {
            command: "h render".to_string(),
            code: Some(3),
            stdout: String::new(),
            stderr: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Command failed with exit code 3: h render");
    }

    #[test]
    fn missing_executable_is_detected() {
        let runner = HarnessRunner::new("/definitely/not/here/harness");
        assert!(matches!(runner.check(), Err(HarnessError::HarnessNotFound(_))));
        let relative = HarnessRunner::new("build/not-here/harness");
        assert!(matches!(relative.check(), Err(HarnessError::HarnessNotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn bare_name_is_resolved_through_path() {
        let runner = HarnessRunner::new("sh");
        assert!(runner.check().is_ok());

        // `sh dump-params ...` runs sh, which fails to open the script
        // `dump-params` and exits non-zero.
        match runner.dump_params("Comp.vst3") {
            Err(HarnessError::ExternalProcessFailure { command, code, .. }) => {
                assert_eq!(command, "sh dump-params --plugin Comp.vst3");
                assert!(code.is_some());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn unknown_bare_name_fails_to_spawn() {
        let runner = HarnessRunner::new("compressor-validate-no-such-harness");
        assert!(runner.check().is_ok());
        match runner.dump_params("Comp.vst3") {
            Err(HarnessError::Spawn { command, source }) => {
                assert!(command.starts_with("compressor-validate-no-such-harness dump-params"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
