use crate::config::ServerConfig;
use crate::refresh::NO_CACHE_FLAG;

use std::path::Path;

/// The tool uvx is asked to run.
const TOOL: &str = "yt-dlp";

#[derive(Debug, PartialEq, Eq)]
pub struct DownloadCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl DownloadCommand {
    /// `uvx [--no-cache] yt-dlp -o <dir>/<template> <fixed flags> <caller args> <url>`
    pub fn build(
        config: &ServerConfig,
        uvx: &Path,
        url: &str,
        caller_args: Vec<String>,
        refresh_cache: bool,
    ) -> Self {
        let template = config.download_dir.join(&config.output_template);
        let mut args = Vec::with_capacity(5 + config.fixed_flags.len() + caller_args.len());
        if refresh_cache {
            args.push(NO_CACHE_FLAG.to_string());
        }
        args.push(TOOL.to_string());
        args.push("-o".to_string());
        args.push(template.to_string_lossy().into_owned());
        args.extend(config.fixed_flags.iter().cloned());
        args.extend(caller_args);
        args.push(url.to_string());
        Self {
            program: uvx.to_string_lossy().into_owned(),
            args,
        }
    }

    /// Shell-quoted form, for logs.
    pub fn display(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}
