use clap::*;
use std::path::PathBuf;

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Write DIRECTORY as an ISO 9660 image with Joliet names.
  Create {
    output: PathBuf,
    #[clap(required = true)]
    directory: PathBuf,
    /// Volume label; at most 16 characters.
    #[clap(long, default_value = "CDROM")]
    label: String,
    #[clap(long, default_value = "")]
    publisher: String,
    #[clap(long, default_value = "")]
    preparer: String,
    #[clap(long, default_value = "")]
    application: String,
    #[clap(long, default_value = "")]
    system: String,
  },
}

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
  #[clap(subcommand)]
  pub command: Command,
}

pub fn parse() -> Cli {
  Cli::parse()
}
