//! yt-dlp command builder and tool environment.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use ytclip_models::ClipRequest;

use crate::download::DownloadOptions;
use crate::error::{MediaError, MediaResult};

/// Execution environment for the external tools.
///
/// The child inherits the parent environment with `extra_paths` prepended
/// to `PATH`, so yt-dlp and its ffmpeg merge dependency are discoverable
/// even when installed outside the service's own search path.
#[derive(Debug, Clone)]
pub struct ToolEnv {
    /// yt-dlp program name or path
    ytdlp_bin: PathBuf,
    /// Directories searched before the inherited PATH
    extra_paths: Vec<PathBuf>,
}

impl Default for ToolEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolEnv {
    /// Create an environment that uses `yt-dlp` from the inherited PATH.
    pub fn new() -> Self {
        Self {
            ytdlp_bin: PathBuf::from("yt-dlp"),
            extra_paths: Vec::new(),
        }
    }

    /// Use a specific yt-dlp program name or path.
    pub fn with_ytdlp_bin(mut self, bin: impl Into<PathBuf>) -> Self {
        self.ytdlp_bin = bin.into();
        self
    }

    /// Prepend a directory to the child's PATH.
    pub fn with_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extra_paths.push(dir.into());
        self
    }

    /// Prepend several directories to the child's PATH, in order.
    pub fn with_search_paths<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.extra_paths.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// The augmented PATH value handed to children.
    pub fn search_path(&self) -> Option<OsString> {
        let inherited = std::env::var_os("PATH");
        let inherited_dirs = inherited
            .as_ref()
            .map(|p| std::env::split_paths(p).collect::<Vec<_>>())
            .unwrap_or_default();

        std::env::join_paths(self.extra_paths.iter().cloned().chain(inherited_dirs)).ok()
    }

    /// Resolve a binary on the augmented search path.
    pub fn resolve(&self, binary: impl AsRef<std::ffi::OsStr>) -> Option<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        which::which_in(binary, self.search_path(), cwd).ok()
    }

    /// Resolve yt-dlp or fail with `DependencyMissing`.
    pub fn resolve_ytdlp(&self) -> MediaResult<PathBuf> {
        self.resolve(&self.ytdlp_bin)
            .ok_or(MediaError::DependencyMissing("yt-dlp"))
    }

    /// Resolve ffmpeg or fail with `DependencyMissing`.
    pub fn resolve_ffmpeg(&self) -> MediaResult<PathBuf> {
        self.resolve("ffmpeg")
            .ok_or(MediaError::DependencyMissing("ffmpeg"))
    }

    /// Build a tokio command for `program` with the augmented environment.
    pub fn command(&self, program: impl AsRef<Path>) -> Command {
        let mut cmd = Command::new(program.as_ref());
        if let Some(path) = self.search_path() {
            cmd.env("PATH", path);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Check that yt-dlp and ffmpeg are both resolvable.
pub fn check_tools(env: &ToolEnv) -> MediaResult<(PathBuf, PathBuf)> {
    Ok((env.resolve_ytdlp()?, env.resolve_ffmpeg()?))
}

/// Builder for yt-dlp commands.
#[derive(Debug, Clone)]
pub struct YtDlpCommand {
    /// Source URL
    url: String,
    /// Output file path
    output: PathBuf,
    /// Options placed before `-o`
    args: Vec<String>,
}

impl YtDlpCommand {
    /// Create a new yt-dlp command.
    pub fn new(url: impl Into<String>, output: impl AsRef<Path>) -> Self {
        Self {
            url: url.into(),
            output: output.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// Command for downloading one clip request.
    pub fn for_clip(request: &ClipRequest, output: impl AsRef<Path>, options: &DownloadOptions) -> Self {
        Self::new(&request.url, output)
            .force_ipv4()
            .format(request.quality.format_spec())
            .download_sections(request.section_arg())
            .merge_output_format("mp4")
            .retries(options.retries)
            .fragment_retries(options.fragment_retries)
            .newline()
    }

    /// Add a raw argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Connect over IPv4 only.
    pub fn force_ipv4(self) -> Self {
        self.arg("--force-ipv4")
    }

    /// Set the format selector.
    pub fn format(self, spec: impl Into<String>) -> Self {
        self.arg("-f").arg(spec)
    }

    /// Download only the given section (`*START-END`).
    pub fn download_sections(self, section: impl Into<String>) -> Self {
        self.arg("--download-sections").arg(section)
    }

    /// Container used when merging separate audio/video streams.
    pub fn merge_output_format(self, container: impl Into<String>) -> Self {
        self.arg("--merge-output-format").arg(container)
    }

    /// Retries for network failures.
    pub fn retries(self, n: u32) -> Self {
        self.arg("--retries").arg(n.to_string())
    }

    /// Retries for fragment failures.
    pub fn fragment_retries(self, n: u32) -> Self {
        self.arg("--fragment-retries").arg(n.to_string())
    }

    /// Print progress on new lines instead of carriage returns.
    pub fn newline(self) -> Self {
        self.arg("--newline")
    }

    /// Build the command arguments.
    ///
    /// The URL always follows `--` so yt-dlp never reads it as an option.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        args.push("-o".to_string());
        args.push(self.output.to_string_lossy().to_string());
        args.push("--".to_string());
        args.push(self.url.clone());
        args
    }

    /// Turn the builder into a runnable command.
    pub fn into_command(self, program: impl AsRef<Path>, env: &ToolEnv) -> Command {
        let args = self.build_args();
        debug!("Running yt-dlp: {} {}", program.as_ref().display(), args.join(" "));
        let mut cmd = env.command(program);
        cmd.args(&args);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ytclip_models::Quality;

    #[test]
    fn test_clip_command_args() {
        let request =
            ClipRequest::new("https://youtu.be/dQw4w9WgXcQ", Quality::P720, 10, 20).unwrap();
        let options = DownloadOptions {
            retries: 10,
            fragment_retries: 10,
        };
        let args = YtDlpCommand::for_clip(&request, "/tmp/out/clip.mp4", &options).build_args();

        assert_eq!(
            args,
            vec![
                "--force-ipv4",
                "-f",
                "bestvideo[height<=720][ext=mp4]+bestaudio[ext=m4a]/best[height<=720]",
                "--download-sections",
                "*0:10-0:20",
                "--merge-output-format",
                "mp4",
                "--retries",
                "10",
                "--fragment-retries",
                "10",
                "--newline",
                "-o",
                "/tmp/out/clip.mp4",
                "--",
                "https://youtu.be/dQw4w9WgXcQ",
            ]
        );
    }

    #[test]
    fn test_url_is_last_argument() {
        let args = YtDlpCommand::new("https://youtu.be/x", "out.mp4")
            .arg("--verbose")
            .build_args();
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/x"));
        assert_eq!(args[args.len() - 2], "--");
        assert_eq!(args[0], "--verbose");
    }

    #[test]
    fn test_option_like_url_stays_positional() {
        let request = ClipRequest::new(
            "--batch-file=/etc/passwd#youtu.be/dQw4w9WgXcQ",
            Quality::P720,
            0,
            5,
        )
        .unwrap();
        let options = DownloadOptions {
            retries: 1,
            fragment_retries: 1,
        };
        let args = YtDlpCommand::for_clip(&request, "/tmp/o.mp4", &options).build_args();

        let n = args.len();
        assert_eq!(args[n - 2], "--");
        assert_eq!(args[n - 1], "--batch-file=/etc/passwd#youtu.be/dQw4w9WgXcQ");
        assert!(!args[..n - 2].iter().any(|a| a.starts_with("--batch-file")));
    }

    #[test]
    fn test_search_path_prepends_extra_dirs() {
        let env = ToolEnv::new().with_search_paths(["/opt/yt/bin", "/opt/ffmpeg/bin"]);
        let path = env.search_path().unwrap();
        let dirs: Vec<PathBuf> = std::env::split_paths(&path).collect();
        assert_eq!(dirs[0], PathBuf::from("/opt/yt/bin"));
        assert_eq!(dirs[1], PathBuf::from("/opt/ffmpeg/bin"));
    }

    #[test]
    fn test_missing_binary_is_dependency_missing() {
        let env = ToolEnv::new().with_ytdlp_bin("definitely-not-a-real-yt-dlp-binary");
        assert!(matches!(
            env.resolve_ytdlp(),
            Err(MediaError::DependencyMissing("yt-dlp"))
        ));
    }
}
