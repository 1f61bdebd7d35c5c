use crate::ffmpeg::{CommandRunner, FFmpegError, path_arg, run_tool};
use std::path::Path;

/// Container-level tags of a media file, sorted by key.
pub fn read_format_tags<R: CommandRunner + ?Sized>(
    runner: &R,
    ffprobe: &str,
    input_file: &Path,
) -> Result<Vec<(String, String)>, FFmpegError> {
    let mut args: Vec<String> = ["-v", "quiet", "-print_format", "json", "-show_format"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    args.push(path_arg(input_file)?);

    let output = run_tool(runner, ffprobe, &args)?;
    if !output.success {
        return Err(FFmpegError::CommandFailed {
            command: format!("{} {}", ffprobe, args.join(" ")),
            status: output
                .code
                .map_or_else(|| "a signal".to_string(), |c| format!("code {}", c)),
            detail: output.stderr.trim().to_string(),
        });
    }

    parse_format_tags(&output.stdout)
}

/// Extracts `format.tags` from ffprobe's JSON output. Non-string values are
/// rendered as JSON text.
pub fn parse_format_tags(json_output: &str) -> Result<Vec<(String, String)>, FFmpegError> {
    let parsed: serde_json::Value = serde_json::from_str(json_output)?;
    let mut tags = Vec::new();
    if let Some(map) = parsed["format"]["tags"].as_object() {
        for (key, value) in map {
            let value = match value.as_str() {
                Some(s) => s.to_string(),
                None => value.to_string(),
            };
            tags.push((key.clone(), value));
        }
    }
    Ok(tags)
}
