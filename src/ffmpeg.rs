use crate::metadata::MetadataRecord;
use log::{debug, error, info};
use regex::Regex;
use std::{
    io,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use thiserror::Error;

const MINIMUM_FFMPEG_MAJOR_VERSION: u32 = 4;
const STDERR_TAIL_LINES: usize = 8;

#[derive(Debug)]
pub struct FFmpegVersionInfo {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub is_compatible: bool,
}

#[derive(Debug)]
pub struct FFmpegCheckResult {
    pub ffmpeg_available: bool,
    pub ffmpeg_version: Option<FFmpegVersionInfo>,
    pub ffprobe_available: bool,
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum FFmpegError {
    #[error("`{0}` command not found. Please ensure it is installed and in your PATH.")]
    CommandNotFound(String),
    #[error("`{command}` exited with {status}: {detail}")]
    CommandFailed {
        command: String,
        status: String,
        detail: String,
    },
    #[error("Path is not valid UTF-8: {}", .0.display())]
    InvalidPath(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

/// Exit status and captured streams of a finished child process.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs an external program to completion.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;
}

/// [`CommandRunner`] backed by `std::process::Command`.
///
/// Stdin is closed so ffmpeg answers its own overwrite prompt with "no"
/// instead of waiting on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Invokes a runner, mapping a missing executable to [`FFmpegError::CommandNotFound`].
pub fn run_tool<R: CommandRunner + ?Sized>(
    runner: &R,
    program: &str,
    args: &[String],
) -> Result<CommandOutput, FFmpegError> {
    runner.run(program, args).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            FFmpegError::CommandNotFound(program.to_string())
        } else {
            FFmpegError::Io(e)
        }
    })
}

/// Writes metadata into a copy of a media file with `ffmpeg -c copy`.
pub struct FFmpegProcessor<R> {
    runner: R,
    program: String,
    debug: bool,
    overwrite: bool,
}

impl<R: CommandRunner> FFmpegProcessor<R> {
    pub fn new(runner: R, program: impl Into<String>, debug: bool) -> Self {
        Self {
            runner,
            program: program.into(),
            debug,
            overwrite: false,
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    #[cfg(test)]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn build_args(
        &self,
        input: &Path,
        metadata: &MetadataRecord,
        output: &Path,
    ) -> Result<Vec<String>, FFmpegError> {
        let mut args = Vec::new();
        if self.overwrite {
            args.push("-y".to_string());
        }
        args.push("-i".to_string());
        args.push(path_arg(input)?);
        args.extend(metadata.to_ffmpeg_args());
        args.extend(["-c".to_string(), "copy".to_string()]);
        args.push(path_arg(output)?);
        Ok(args)
    }

    /// The command line as it is logged in debug mode.
    pub fn command_line(&self, args: &[String]) -> String {
        format!("{} {}", self.program, args.join(" "))
    }

    /// Tags `input` into `output` and reports `output` as the finished file.
    pub fn process(
        &self,
        input: &Path,
        metadata: &MetadataRecord,
        output: &Path,
    ) -> Result<(), FFmpegError> {
        self.copy_with_metadata(input, metadata, output)?;
        info!("File processed successfully: {}", output.display());
        Ok(())
    }

    /// Like [`Self::process`], for an intermediate file the caller still has
    /// to move into place. Success is only logged at debug level.
    pub fn process_staged(
        &self,
        input: &Path,
        metadata: &MetadataRecord,
        staging: &Path,
    ) -> Result<(), FFmpegError> {
        self.copy_with_metadata(input, metadata, staging)?;
        debug!("Staged tagged copy at {}", staging.display());
        Ok(())
    }

    fn copy_with_metadata(
        &self,
        input: &Path,
        metadata: &MetadataRecord,
        output: &Path,
    ) -> Result<(), FFmpegError> {
        let args = self.build_args(input, metadata, output)?;
        let command_line = self.command_line(&args);
        if self.debug {
            debug!("FFmpeg command: {}", command_line);
        }

        let result = run_tool(&self.runner, &self.program, &args).inspect_err(|e| {
            error!("Failed to process {}: {}", input.display(), e);
        })?;

        if self.debug && !result.stderr.is_empty() {
            debug!("FFmpeg output:\n{}", result.stderr.trim_end());
        }

        if !result.success {
            let err = FFmpegError::CommandFailed {
                command: command_line,
                status: result
                    .code
                    .map_or_else(|| "a signal".to_string(), |c| format!("code {}", c)),
                detail: stderr_tail(&result.stderr),
            };
            error!("Failed to process {}: {}", input.display(), err);
            return Err(err);
        }
        Ok(())
    }
}

pub(crate) fn path_arg(path: &Path) -> Result<String, FFmpegError> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| FFmpegError::InvalidPath(path.to_path_buf()))
}

/// Last few non-empty lines of a tool's stderr, where ffmpeg puts the reason it gave up.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return "no diagnostic output".to_string();
    }
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

pub fn parse_ffmpeg_version(version_output: &str) -> Option<FFmpegVersionInfo> {
    let re = Regex::new(r"ffmpeg version n?(\d+)\.(\d+)(?:\.(\d+))?").ok()?;
    let caps = re.captures(version_output)?;
    let major: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minor: u32 = caps.get(2)?.as_str().parse().ok()?;
    let patch: u32 = caps.get(3).map_or(0, |m| m.as_str().parse().unwrap_or(0));
    Some(FFmpegVersionInfo {
        major,
        minor,
        patch,
        is_compatible: major >= MINIMUM_FFMPEG_MAJOR_VERSION,
    })
}

pub fn check_ffmpeg_installation<R: CommandRunner + ?Sized>(
    runner: &R,
    ffmpeg: &str,
    ffprobe: &str,
) -> FFmpegCheckResult {
    let mut result = FFmpegCheckResult {
        ffmpeg_available: false,
        ffmpeg_version: None,
        ffprobe_available: false,
        error: None,
    };
    let version_arg = ["-version".to_string()];

    match run_tool(runner, ffmpeg, &version_arg) {
        Ok(output) if output.success => {
            result.ffmpeg_available = true;
            result.ffmpeg_version = parse_ffmpeg_version(&output.stdout);
        }
        Ok(output) => {
            result.error = Some(format!(
                "`{} -version` failed: {}",
                ffmpeg,
                stderr_tail(&output.stderr)
            ));
        }
        Err(e) => result.error = Some(e.to_string()),
    }

    result.ffprobe_available = matches!(
        run_tool(runner, ffprobe, &version_arg),
        Ok(output) if output.success
    );

    result
}


#[cfg(test)]
mod tests {
    use super::testing::{self, FakeRunner};
    use super::*;
    use tempfile::tempdir;

    fn record() -> MetadataRecord {
        MetadataRecord::new("movie", Some("Comedy".into()), None, None, None)
    }

    #[test]
    fn builds_stream_copy_command() {
        let processor = FFmpegProcessor::new(FakeRunner::succeeding(), "ffmpeg", false);
        let args = processor
            .build_args(Path::new("movie.mp4"), &record(), Path::new("out.mp4"))
            .unwrap();
        assert_eq!(
            args,
            vec![
                "-i",
                "movie.mp4",
                "-metadata",
                "title=movie",
                "-metadata",
                "genre=Comedy",
                "-c",
                "copy",
                "out.mp4"
            ]
        );
    }

    #[test]
    fn debug_command_line_lists_full_invocation() {
        let processor = FFmpegProcessor::new(FakeRunner::succeeding(), "ffmpeg", true);
        let args = processor
            .build_args(Path::new("movie.mp4"), &record(), Path::new("out.mp4"))
            .unwrap();
        assert_eq!(
            processor.command_line(&args),
            "ffmpeg -i movie.mp4 -metadata title=movie -metadata genre=Comedy -c copy out.mp4"
        );
    }

    #[test]
    fn failed_run_reports_the_command_line() {
        let processor = FFmpegProcessor::new(FakeRunner::failing("boom"), "/opt/ffmpeg", false);
        let err = processor
            .process(Path::new("movie.mp4"), &record(), Path::new("out.mp4"))
            .unwrap_err();
        assert!(err.to_string().starts_with(
            "`/opt/ffmpeg -i movie.mp4 -metadata title=movie -metadata genre=Comedy -c copy out.mp4`"
        ));
    }

    #[test]
    fn staged_run_does_not_announce_the_staging_file() {
        testing::capture_logs();
        let dir = tempdir().unwrap();
        let staging = dir.path().join(".movie.partial.mp4");
        let processor = FFmpegProcessor::new(FakeRunner::succeeding(), "ffmpeg", false);
        processor
            .process_staged(Path::new("movie.mp4"), &record(), &staging)
            .unwrap();

        let needle = staging.to_str().unwrap();
        assert!(staging.exists());
        assert!(testing::logged(log::Level::Info, needle).is_empty());
        assert_eq!(testing::logged(log::Level::Debug, needle).len(), 1);
    }

    #[test]
    fn process_announces_its_output() {
        testing::capture_logs();
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.mp4");
        let processor = FFmpegProcessor::new(FakeRunner::succeeding(), "ffmpeg", false);
        processor
            .process(Path::new("movie.mp4"), &record(), &out)
            .unwrap();

        let logged = testing::logged(log::Level::Info, out.to_str().unwrap());
        assert_eq!(
            logged,
            vec![format!("File processed successfully: {}", out.display())]
        );
    }

    #[test]
    fn overwrite_prepends_yes_flag() {
        let processor =
            FFmpegProcessor::new(FakeRunner::succeeding(), "ffmpeg", false).with_overwrite(true);
        let args = processor
            .build_args(Path::new("a.mp4"), &record(), Path::new("b.mp4"))
            .unwrap();
        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert_eq!(args.last().map(String::as_str), Some("b.mp4"));
    }

    #[test]
    fn process_runs_configured_program() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.mp4");
        let processor = FFmpegProcessor::new(FakeRunner::succeeding(), "/opt/ffmpeg", true);
        processor
            .process(Path::new("movie.mp4"), &record(), &out)
            .unwrap();
        let calls = processor.runner().calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "/opt/ffmpeg");
        assert!(out.exists());
    }

    #[test]
    fn non_zero_exit_is_an_error_with_stderr_tail() {
        let processor = FFmpegProcessor::new(
            FakeRunner::failing("banner\n\nmovie.mp4: No such file or directory\n"),
            "ffmpeg",
            false,
        );
        let err = processor
            .process(Path::new("movie.mp4"), &record(), Path::new("out.mp4"))
            .unwrap_err();
        match err {
            FFmpegError::CommandFailed { status, detail, .. } => {
                assert_eq!(status, "code 1");
                assert!(detail.ends_with("movie.mp4: No such file or directory"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_executable_is_reported() {
        let processor = FFmpegProcessor::new(FakeRunner::missing(), "ffmpeg", false);
        let err = processor
            .process(Path::new("movie.mp4"), &record(), Path::new("out.mp4"))
            .unwrap_err();
        assert!(matches!(err, FFmpegError::CommandNotFound(ref p) if p == "ffmpeg"));
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let text: String = (1..=20).map(|i| format!("line {i}\n")).collect();
        let tail = stderr_tail(&text);
        assert!(tail.starts_with("line 13"));
        assert!(tail.ends_with("line 20"));
        assert_eq!(stderr_tail("  \n"), "no diagnostic output");
    }

    #[test]
    fn parses_release_and_distro_versions() {
        let v = parse_ffmpeg_version("ffmpeg version 7.1.1 Copyright (c) 2000-2025").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (7, 1, 1));
        assert!(v.is_compatible);

        let v = parse_ffmpeg_version("ffmpeg version n6.0 Copyright").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (6, 0, 0));

        let v = parse_ffmpeg_version("ffmpeg version 3.4.8-0ubuntu0.2").unwrap();
        assert!(!v.is_compatible);

        assert!(parse_ffmpeg_version("ffmpeg version N-112233-gabcdef").is_none());
    }

    #[test]
    fn installation_check_reports_version() {
        let runner = FakeRunner {
            stdout: "ffmpeg version 7.0.2 Copyright".to_string(),
            ..FakeRunner::succeeding()
        };
        let result = check_ffmpeg_installation(&runner, "ffmpeg", "ffprobe");
        assert!(result.ffmpeg_available);
        assert!(result.ffprobe_available);
        assert_eq!(result.ffmpeg_version.map(|v| v.major), Some(7));
        assert!(result.error.is_none());
    }

    #[test]
    fn installation_check_handles_missing_tools() {
        let result = check_ffmpeg_installation(&FakeRunner::missing(), "ffmpeg", "ffprobe");
        assert!(!result.ffmpeg_available);
        assert!(!result.ffprobe_available);
        assert!(result.error.unwrap().contains("not found"));
    }
}
