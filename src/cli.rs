use clap::Parser;
use std::ffi::OsString;

/// Set title, genre, show, season and episode tags on an MP4 file using an
/// ffmpeg stream copy (no re-encoding).
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Input MP4 file. Its name without extension becomes the title tag.
    #[arg(required_unless_present = "check_ffmpeg")]
    pub input_file: Option<String>,

    /// Output file. If omitted, the input is kept as <title>_original.mp4 and
    /// the tagged copy is written to <title>.mp4.
    #[arg(short = 'o', long)]
    pub output: Option<String>,

    /// Genre of the content.
    #[arg(short = 'g', long)]
    pub genre: Option<String>,

    /// Show (series) name. Also accepted as -sh.
    #[arg(long)]
    pub show: Option<String>,

    /// Season number. Also accepted as -se.
    #[arg(long)]
    pub season: Option<u32>,

    /// Episode number.
    #[arg(short = 'e', long)]
    pub episode: Option<u32>,

    /// Path to a JSON file with default output, genre, show, season and episode. CLI arguments override values in the task file.
    #[arg(short = 't', long = "task", value_name = "FILE")]
    pub task: Option<String>,

    /// Let ffmpeg overwrite an existing output file.
    #[arg(short = 'y', long)]
    pub overwrite: bool,

    /// Print the container tags currently stored in the input file and exit.
    #[arg(short = 'I', long)]
    pub inspect: bool,

    /// Check FFmpeg/FFprobe installation and version, then exit.
    #[arg(short = 'c', long)]
    pub check_ffmpeg: bool,

    /// ffmpeg executable to run.
    #[arg(long, env = "MP4TAG_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: String,

    /// ffprobe executable used by --inspect and --check-ffmpeg.
    #[arg(long, env = "MP4TAG_FFPROBE", default_value = "ffprobe")]
    pub ffprobe: String,

    /// Verbose logging, including the full ffmpeg command line and its output.
    #[arg(short = 'd', long)]
    pub debug: bool,
}

impl Args {
    /// Parses the process arguments, accepting the two-letter `-sh`/`-se` flags.
    pub fn parse_env() -> Self {
        Self::parse_from(normalize_short_flags(std::env::args_os()))
    }
}

/// Rewrites `-sh` and `-se` (with or without `=value`) to their long forms.
/// clap only supports single-character short flags. Arguments after `--` are
/// left alone, and non-UTF-8 arguments pass through for clap to reject.
pub fn normalize_short_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut after_separator = false;
    args.into_iter()
        .map(|arg| {
            let arg: OsString = arg.into();
            if after_separator {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                after_separator = true;
                return arg;
            }
            for (short, long) in [("-sh", "--show"), ("-se", "--season")] {
                if text == short {
                    return OsString::from(long);
                }
                if let Some(value) = text.strip_prefix(short).and_then(|r| r.strip_prefix('=')) {
                    return OsString::from(format!("{}={}", long, value));
                }
            }
            arg
        })
        .collect()
}
