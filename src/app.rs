use crate::ffmpeg::{CommandRunner, FFmpegProcessor, SystemRunner, check_ffmpeg_installation};
use crate::inspect::read_format_tags;
use crate::metadata::MetadataRecord;
use crate::util::title_from_path;
use crate::{cli::Args, task::Task};
use anyhow::{Context, Result, bail};
use comfy_table::{Table, presets::UTF8_FULL};
use log::{debug, info, warn};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// One tagging run, after CLI arguments and task file have been merged.
#[derive(Debug, Clone, Default)]
pub struct TagRequest {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub genre: Option<String>,
    pub show: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

/// Files left behind by a successful run.
#[derive(Debug, PartialEq, Eq)]
pub struct TagOutcome {
    pub output: PathBuf,
    /// Where the untouched original now lives, when it had to be moved aside.
    pub original: Option<PathBuf>,
}

pub fn run(args: Args) -> Result<()> {
    if args.check_ffmpeg {
        return handle_ffmpeg_check(&args.ffmpeg, &args.ffprobe);
    }

    let input = args
        .input_file
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("input file is required"))?;

    if args.inspect {
        return handle_inspect(&args.ffprobe, Path::new(input));
    }

    let task = Task::load(args.task.as_deref())?;
    let request = TagRequest {
        input: PathBuf::from(input),
        output: args
            .output
            .clone()
            .or_else(|| task.as_ref().and_then(|t| t.output.clone()))
            .map(PathBuf::from),
        genre: args
            .genre
            .clone()
            .or_else(|| task.as_ref().and_then(|t| t.genre.clone())),
        show: args
            .show
            .clone()
            .or_else(|| task.as_ref().and_then(|t| t.show.clone())),
        season: args.season.or_else(|| task.as_ref().and_then(|t| t.season)),
        episode: args
            .episode
            .or_else(|| task.as_ref().and_then(|t| t.episode)),
    };

    let processor = FFmpegProcessor::new(SystemRunner, args.ffmpeg.as_str(), args.debug)
        .with_overwrite(args.overwrite);
    let outcome = tag_file(&request, &processor)?;

    match &outcome.original {
        Some(original) => println!(
            "✅ Tagged {} (original kept as {})",
            outcome.output.display(),
            original.display()
        ),
        None => println!("✅ Tagged {}", outcome.output.display()),
    }
    Ok(())
}

/// Writes the request's metadata with ffmpeg.
///
/// With an explicit output the input is only read. Without one, the tagged
/// copy is produced in a staging file next to the input first; only after
/// ffmpeg succeeds is the input moved to `<title>_original.mp4` and the
/// staging file moved to `<title>.mp4`. A failed ffmpeg run leaves the input
/// where it was.
pub fn tag_file<R: CommandRunner>(
    request: &TagRequest,
    processor: &FFmpegProcessor<R>,
) -> Result<TagOutcome> {
    let input = request.input.as_path();
    let title = title_from_path(input);
    if title.is_empty() {
        bail!("Cannot derive a title from '{}'", input.display());
    }

    let metadata = MetadataRecord::new(
        title.as_str(),
        request.genre.clone(),
        request.show.clone(),
        request.season,
        request.episode,
    );
    print_job_table(input, request.output.as_deref(), &metadata);

    if let Some(output) = &request.output {
        if output == input || (output.exists() && input.exists() && same_file(output, input)?) {
            bail!("Input and output file cannot be the same.");
        }
        processor.process(input, &metadata, output)?;
        return Ok(TagOutcome {
            output: output.clone(),
            original: None,
        });
    }

    if !input.is_file() {
        bail!("Input file '{}' does not exist", input.display());
    }

    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    let original = dir.join(format!("{}_original.mp4", title));
    let output = dir.join(format!("{}.mp4", title));
    let staging = dir.join(format!(".{}.partial.mp4", title));

    if original.exists() {
        bail!(
            "'{}' already exists; refusing to overwrite it",
            original.display()
        );
    }
    if output.exists() && !same_file(&output, input)? {
        bail!(
            "'{}' already exists; refusing to overwrite it",
            output.display()
        );
    }
    if staging.exists() {
        bail!(
            "'{}' already exists (left over from an earlier run?); remove it and retry",
            staging.display()
        );
    }

    if let Err(e) = processor.process_staged(input, &metadata, &staging) {
        discard(&staging);
        return Err(e.into());
    }

    if let Err(e) = fs::rename(input, &original) {
        discard(&staging);
        return Err(e).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                input.display(),
                original.display()
            )
        });
    }
    debug!("Moved {} to {}", input.display(), original.display());

    if let Err(e) = fs::rename(&staging, &output) {
        if let Err(restore) = fs::rename(&original, input) {
            warn!(
                "Could not restore {} from {}: {}",
                input.display(),
                original.display(),
                restore
            );
        }
        discard(&staging);
        return Err(e).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                staging.display(),
                output.display()
            )
        });
    }

    info!(
        "File processed successfully: {} (original kept as {})",
        output.display(),
        original.display()
    );
    Ok(TagOutcome {
        output,
        original: Some(original),
    })
}

fn same_file(a: &Path, b: &Path) -> Result<bool> {
    Ok(fs::canonicalize(a)? == fs::canonicalize(b)?)
}

fn discard(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}

fn print_job_table(input: &Path, output: Option<&Path>, metadata: &MetadataRecord) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Parameter", "Value"]);
    table.add_row(vec!["Input File".to_string(), input.display().to_string()]);
    table.add_row(vec![
        "Output File".to_string(),
        output.map_or_else(
            || format!("{}.mp4 (original kept)", metadata.title),
            |p| p.display().to_string(),
        ),
    ]);
    for (key, value) in metadata.to_args() {
        table.add_row(vec![key.to_string(), value]);
    }
    println!("\n▶️ Job Details:");
    println!("{table}");
}

fn handle_ffmpeg_check(ffmpeg: &str, ffprobe: &str) -> Result<()> {
    println!("🔍 Checking FFmpeg installation...\n");

    let check_result = check_ffmpeg_installation(&SystemRunner, ffmpeg, ffprobe);

    if check_result.ffmpeg_available {
        if let Some(version_info) = &check_result.ffmpeg_version {
            println!("✅ FFmpeg found:");
            println!(
                "   Version: {}.{}.{}",
                version_info.major, version_info.minor, version_info.patch
            );
            if version_info.is_compatible {
                println!("   Status: ✅ Compatible (minimum required: 4.0.0)");
            } else {
                println!("   Status: ❌ Too old (minimum required: 4.0.0)");
            }
        } else {
            println!("⚠️  Could not parse FFmpeg version from output");
        }
    } else {
        let error = check_result
            .error
            .unwrap_or_else(|| "unknown error".to_string());
        println!("❌ FFmpeg not usable: {}", error);
        println!("   Please install FFmpeg and ensure it's accessible from the command line");
        bail!("FFmpeg is required but not available: {}", error);
    }

    println!();

    if check_result.ffprobe_available {
        println!("✅ FFprobe found and working");
    } else {
        println!("⚠️  FFprobe not found; --inspect will not work");
    }

    println!("\n🎉 FFmpeg check complete!");
    Ok(())
}

fn handle_inspect(ffprobe: &str, input: &Path) -> Result<()> {
    println!("🔍 Inspecting container tags in: {}\n", input.display());

    let tags = read_format_tags(&SystemRunner, ffprobe, input)?;
    if tags.is_empty() {
        println!("ℹ️ No container tags found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Tag", "Value"]);
    for (key, value) in tags {
        table.add_row(vec![key, value]);
    }
    println!("{}", table);
    Ok(())
}
