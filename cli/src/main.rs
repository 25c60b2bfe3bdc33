mod arg_parser;
mod client_cli;

use arg_parser::{ArgParser, SubCommand};
use client_cli::ClientCli;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ArgParser::parse();
    let client = ClientCli::new(&args.server);

    match args.sub_command {
        SubCommand::Download { url, args } => {
            client.download(&url, &args).await?;
        }
        SubCommand::List => {
            for file in client.list().await? {
                println!("{:>12}  {}  {}", file.size, file.mtime, file.name);
            }
        }
        SubCommand::Delete { name } => {
            println!("{}", client.delete(&name).await?);
        }
    }

    Ok(())
}
