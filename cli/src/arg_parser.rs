use clap::{Parser, Subcommand};

/// Talk to a ytdlp-server
#[derive(Debug, Parser)]
#[command(name = "ytdlp", version)]
pub struct ArgParser {
    /// Base URL of the server
    #[arg(
        short = 's',
        long = "server",
        env = "YTDLP_SERVER",
        default_value = "http://127.0.0.1:8000"
    )]
    pub server: String,
    /// The sub-command to use
    #[command(subcommand)]
    pub sub_command: SubCommand,
}

#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
pub enum SubCommand {
    /// download a URL, printing yt-dlp's output as it arrives
    Download {
        /// the page or media URL
        url: String,

        /// extra yt-dlp arguments, as one shell-quoted string
        #[arg(long, default_value = "", allow_hyphen_values = true)]
        args: String,
    },
    /// list downloaded files, newest first
    List,
    /// delete a downloaded file
    Delete {
        /// file name relative to the download directory
        name: String,
    },
}
