mod cli;

use dir2iso::{
  progress::{CancellationToken, ProgressUpdate},
  source::HostDirectory,
  IsoWriterOptions,
};

fn main() -> Result<(), dir2iso::error::Error> {
  pretty_env_logger::init();

  match cli::parse().command {
    cli::Command::Create {
      output,
      directory,
      label,
      publisher,
      preparer,
      application,
      system,
    } => {
      let options = IsoWriterOptions {
        volume_label: label,
        system_identifier: system,
        publisher_identifier: publisher,
        data_preparer_identifier: preparer,
        application_identifier: application,
        ..Default::default()
      };

      let file = std::fs::File::create(&output)?;
      let report = dir2iso::convert(
        &HostDirectory::new(&directory),
        std::io::BufWriter::new(file),
        options,
        |update: ProgressUpdate<'_>| match update.label {
          Some(label) => log::info!("{label}"),
          None => log::debug!("At sector {}", update.current),
        },
        &CancellationToken::new(),
      )?;

      log::info!(
        "Wrote {} ({} sectors, {} directories, {} files)",
        output.display(),
        report.volume_space_size,
        report.directory_count,
        report.file_count
      );
    }
  }

  Ok(())
}
