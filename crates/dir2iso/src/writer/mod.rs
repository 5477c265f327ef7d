//! High-level interface for writing a directory tree as an ISO 9660 image
//! with a Joliet supplementary volume.

use crate::{
  date::IsoDate,
  encoding::SECTOR_SIZE,
  lba::LbaAllocator,
  prelude::*,
  progress::{CancellationToken, NoProgress, ProgressSink, ProgressUpdate},
  serialize::IsoSerialize,
  source::DirectorySource,
  spec::{self, DirectoryRecord, Identifier, VolumeKind},
  tree::{ElementId, ElementKind, ElementTree},
};
use std::io::Read;

pub mod layout;
pub mod path_table;
pub mod sector;

use layout::VolumeLayout;
use sector::SectorWriter;

/// File data is copied through one buffer of this many bytes.
const COPY_BUFFER_SIZE: usize = 512 * SECTOR_SIZE as usize;

#[derive(Debug, Clone)]
pub struct IsoWriterOptions {
  pub volume_label: String,
  pub system_identifier: String,
  pub volume_set_identifier: String,
  pub publisher_identifier: String,
  pub data_preparer_identifier: String,
  pub application_identifier: String,
  /// Creation and modification date of the volume. Defaults to the creation
  /// date of the source root.
  pub volume_date: Option<IsoDate>,
}

impl Default for IsoWriterOptions {
  fn default() -> Self {
    Self {
      volume_label: "CDROM".to_owned(),
      system_identifier: String::new(),
      volume_set_identifier: String::new(),
      publisher_identifier: String::new(),
      data_preparer_identifier: String::new(),
      application_identifier: String::new(),
      volume_date: None,
    }
  }
}

/// Progress of a conversion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Initializing,
  TreeBuilt,
  Pass1Laid,
  PathTables1Written,
  Pass2Laid,
  PathTables2Written,
  FileExtentsAssigned,
  HeaderWritten,
  DescriptorsWritten,
  DirectoriesWritten(VolumeKind),
  FileDataWritten,
  Done,
  Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathTableReport {
  /// Unpadded size of one copy, in bytes.
  pub size: u32,
  pub type_l_location: u32,
  pub type_m_location: u32,
}

impl From<&VolumeLayout> for PathTableReport {
  fn from(layout: &VolumeLayout) -> Self {
    Self {
      size: layout.path_table_size,
      type_l_location: layout.type_l_location,
      type_m_location: layout.type_m_location,
    }
  }
}

/// Summary of a finished image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
  /// Total sectors in the image.
  pub volume_space_size: u32,
  pub directory_count: usize,
  pub file_count: usize,
  pub primary: PathTableReport,
  pub supplementary: PathTableReport,
}

#[derive(Debug)]
pub struct IsoWriter<P = NoProgress> {
  options: IsoWriterOptions,
  progress: P,
  cancel: CancellationToken,
  stage: Stage,
}

impl IsoWriter {
  pub fn new(options: IsoWriterOptions) -> Self {
    Self {
      options,
      progress: NoProgress,
      cancel: CancellationToken::new(),
      stage: Stage::Initializing,
    }
  }
}

impl<P> IsoWriter<P>
where
  P: ProgressSink,
{
  pub fn with_progress<Q: ProgressSink>(self, progress: Q) -> IsoWriter<Q> {
    IsoWriter {
      options: self.options,
      progress,
      cancel: self.cancel,
      stage: self.stage,
    }
  }

  pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }

  pub fn options(&self) -> &IsoWriterOptions {
    &self.options
  }

  pub fn progress(&self) -> &P {
    &self.progress
  }

  pub fn into_progress(self) -> P {
    self.progress
  }

  pub fn stage(&self) -> Stage {
    self.stage
  }

  fn enter(&mut self, stage: Stage) {
    log::info!("Stage {:?} -> {:?}", self.stage, stage);
    self.stage = stage;
  }

  fn label(&mut self, label: &str, maximum: i64) -> Result<()> {
    self.cancel.check()?;
    log::info!("{label}");
    self.progress.update(ProgressUpdate::labelled(label, 0, maximum));
    Ok(())
  }

  fn position(&mut self, current: i64) {
    self.progress.update(ProgressUpdate::position(current));
  }

  fn report_output<W>(&mut self, out: &SectorWriter<W>)
  where
    W: std::io::Write,
  {
    self.position(out.lba() as i64);
  }

  /// Writes the image of `source` to `output`.
  ///
  /// The sink receives `finished` on success; on any error it receives
  /// `aborted` once and the error is returned.
  pub fn write<W>(&mut self, source: &dyn DirectorySource, output: W) -> Result<ConversionReport>
  where
    W: std::io::Write,
  {
    self.stage = Stage::Initializing;

    match self.run(source, output) {
      Ok(report) => {
        self.enter(Stage::Done);
        self.progress.finished();
        log::info!(
          "Wrote {} sectors ({} directories, {} files)",
          report.volume_space_size,
          report.directory_count,
          report.file_count
        );
        Ok(report)
      }
      Err(error) => {
        self.enter(Stage::Aborted);
        log::warn!("Conversion aborted: {error}");
        self.progress.aborted(&error);
        Err(error)
      }
    }
  }

  fn run<W>(&mut self, source: &dyn DirectorySource, output: W) -> Result<ConversionReport>
  where
    W: std::io::Write,
  {
    // 1. Build and size the element tree.

    let mut tree = ElementTree::build(source, &mut self.progress, &self.cancel)?;
    self.enter(Stage::TreeBuilt);

    // 2. Primary directory extents and numbers.

    self.label("Preparing first set of directory extents...", 1)?;
    let order = tree.directories_breadth_first();
    let mut allocator = LbaAllocator::new(spec::FIRST_DATA_SECTOR);
    layout::assign_directory_extents(&mut tree, &order, VolumeKind::Primary, &mut allocator)?;
    self.position(1);
    self.enter(Stage::Pass1Laid);

    self.label("Calculating directory numbers...", 1)?;
    layout::assign_numbers(&mut tree, &order)?;
    self.position(1);

    // 3. Primary path tables.

    self.label("Preparing first set of path tables...", 2)?;
    let primary = layout::lay_out_path_tables(
      &tree,
      &order,
      VolumeKind::Primary,
      spec::FIRST_DATA_SECTOR,
      &mut allocator,
    )?;
    self.position(2);
    self.enter(Stage::PathTables1Written);

    // 4. Joliet directory extents and path tables.

    self.label("Preparing second set of directory extents...", 1)?;
    let secondary_start = allocator.next_lba();
    layout::assign_directory_extents(
      &mut tree,
      &order,
      VolumeKind::Supplementary,
      &mut allocator,
    )?;
    self.position(1);
    self.enter(Stage::Pass2Laid);

    self.label("Preparing second set of path tables...", 2)?;
    let secondary = layout::lay_out_path_tables(
      &tree,
      &order,
      VolumeKind::Supplementary,
      secondary_start,
      &mut allocator,
    )?;
    self.position(2);
    self.enter(Stage::PathTables2Written);

    // 5. File extents.

    self.label("Initializing...", 1)?;
    let files = layout::assign_file_extents(&mut tree, &mut allocator)?;
    let volume_space_size = allocator.next_lba();
    self.position(1);
    self.enter(Stage::FileExtentsAssigned);

    log::debug!(
      "Volume space: {volume_space_size} sectors, {} in directory tables and files",
      tree.total_sectors(tree.root())
    );

    // 6. Stream everything out in extent order.

    self.label("Writing data to file...", i64::from(volume_space_size))?;
    let mut out = SectorWriter::new(output);

    out.write_zero_sectors(spec::SYSTEM_AREA_SECTORS)?;
    self.report_output(&out);
    self.enter(Stage::HeaderWritten);
    self.cancel.check()?;

    self.write_descriptors(&tree, &primary, &secondary, volume_space_size, &mut out)?;
    self.report_output(&out);
    self.enter(Stage::DescriptorsWritten);
    self.cancel.check()?;

    for layout in [&primary, &secondary] {
      out.expect_lba(layout.tables_start, &format!("{} directory tables", layout.kind))?;
      self.write_directory_tables(&tree, &order, layout.kind, &mut out)?;

      out.expect_lba(layout.type_l_location, &format!("{} type L path table", layout.kind))?;
      out.write_all(&layout.type_l)?;
      out.expect_lba(layout.type_m_location, &format!("{} type M path table", layout.kind))?;
      out.write_all(&layout.type_m)?;

      self.report_output(&out);
      self.enter(Stage::DirectoriesWritten(layout.kind));
      self.cancel.check()?;
    }

    self.write_files(&tree, &files, &mut out)?;
    out.expect_lba(volume_space_size, "end of volume")?;
    out.flush()?;
    self.enter(Stage::FileDataWritten);

    self.progress.update(ProgressUpdate::labelled("Finished.", 1, 1));

    Ok(ConversionReport {
      volume_space_size,
      directory_count: order.len(),
      file_count: tree.file_count(),
      primary: (&primary).into(),
      supplementary: (&secondary).into(),
    })
  }

  fn volume_descriptor(
    &self,
    tree: &ElementTree,
    layout: &VolumeLayout,
    volume_space_size: u32,
  ) -> Result<spec::VolumeDescriptor> {
    let kind = layout.kind;
    let root = tree.get(tree.root());
    let root_dir = tree.directory(tree.root())?;
    let volume_date = self.options.volume_date.unwrap_or(root.created);

    Ok(spec::VolumeDescriptor {
      kind,
      standard_identifier: spec::StandardIdentifier::Cd001,
      version: spec::VolumeDescriptorVersion::Standard,
      system_identifier: self.options.system_identifier.clone(),
      volume_identifier: self.options.volume_label.clone(),
      volume_space_size,
      escape_sequences: match kind {
        VolumeKind::Primary => spec::EscapeSequences::none(),
        VolumeKind::Supplementary => spec::EscapeSequences::joliet_level_3(),
      },
      volume_set_size: 1,
      volume_sequence_number: 1,
      logical_block_size: SECTOR_SIZE as u16,
      path_table_size: layout.path_table_size,
      type_l_path_table_location: layout.type_l_location,
      optional_type_l_path_table_location: 0,
      type_m_path_table_location: layout.type_m_location,
      optional_type_m_path_table_location: 0,
      root_directory_record: DirectoryRecord::new(
        root_dir.extent(kind),
        root_dir.data_length(kind),
        &root.created,
        true,
        Identifier::current_directory(),
      ),
      volume_set_identifier: self.options.volume_set_identifier.clone(),
      publisher_identifier: self.options.publisher_identifier.clone(),
      data_preparer_identifier: self.options.data_preparer_identifier.clone(),
      application_identifier: self.options.application_identifier.clone(),
      copyright_file_identifier: String::new(),
      abstract_file_identifier: String::new(),
      bibliographic_file_identifier: String::new(),
      creation_date: volume_date,
      modification_date: volume_date,
      expiration_date: IsoDate::no_date(),
      effective_date: IsoDate::no_date(),
      file_structure_version: spec::FileStructureVersion::Standard,
    })
  }

  fn write_descriptors<W>(
    &mut self,
    tree: &ElementTree,
    primary: &VolumeLayout,
    secondary: &VolumeLayout,
    volume_space_size: u32,
    out: &mut SectorWriter<W>,
  ) -> Result<()>
  where
    W: std::io::Write,
  {
    let mut bytes = Vec::with_capacity(SECTOR_SIZE as usize);

    for (index, layout) in [primary, secondary].into_iter().enumerate() {
      let descriptor = self.volume_descriptor(tree, layout, volume_space_size)?;

      log::debug!("Writing {} volume descriptor", layout.kind);

      bytes.clear();
      descriptor.serialize(&mut (), &mut bytes)?;
      out.expect_lba(
        spec::SYSTEM_AREA_SECTORS + index as u32,
        &format!("{} volume descriptor", layout.kind),
      )?;
      out.write_all(&bytes)?;
    }

    bytes.clear();
    spec::VolumeDescriptorSetTerminator.serialize(&mut (), &mut bytes)?;
    out.write_all(&bytes)?;

    Ok(())
  }

  fn record_for(tree: &ElementTree, id: ElementId, kind: VolumeKind) -> Result<DirectoryRecord> {
    let element = tree.get(id);
    let identifier = element.identifier(kind)?;

    Ok(match &element.kind {
      ElementKind::Directory(dir) => DirectoryRecord::new(
        dir.extent(kind),
        dir.data_length(kind),
        &element.created,
        true,
        identifier,
      ),
      ElementKind::File(file) => {
        let length = u32::try_from(file.length).map_err(|_| {
          Error::layout(format!("{:?} does not fit a single extent", element.long_name))
        })?;
        DirectoryRecord::new(file.extent, length, &element.created, false, identifier)
      }
    })
  }

  fn write_directory_tables<W>(
    &mut self,
    tree: &ElementTree,
    order: &[ElementId],
    kind: VolumeKind,
    out: &mut SectorWriter<W>,
  ) -> Result<()>
  where
    W: std::io::Write,
  {
    let mut bytes = vec![];

    for &id in order {
      self.cancel.check()?;

      let element = tree.get(id);
      let dir = tree.directory(id)?;
      // The root is its own parent.
      let parent_id = element.parent.unwrap_or(id);
      let parent = tree.get(parent_id);
      let parent_dir = tree.directory(parent_id)?;

      out.expect_lba(dir.extent(kind), &format!("{kind} table of {:?}", element.long_name))?;

      log::debug!(
        "Writing {kind} directory table of {:?} (LBA {}, {} sectors)",
        element.long_name,
        dir.extent(kind),
        dir.size(kind)
      );

      let mut records = Vec::with_capacity(dir.children.len() + 2);
      records.push(DirectoryRecord::new(
        dir.extent(kind),
        dir.data_length(kind),
        &element.created,
        true,
        Identifier::current_directory(),
      ));
      records.push(DirectoryRecord::new(
        parent_dir.extent(kind),
        parent_dir.data_length(kind),
        &parent.created,
        true,
        Identifier::parent_directory(),
      ));
      for &child in &dir.children {
        records.push(Self::record_for(tree, child, kind)?);
      }

      for record in &records {
        log::trace!("Writing directory record: {:?}", record);
        bytes.clear();
        record.serialize(&mut (), &mut bytes)?;
        out.write_aligned(&bytes)?;
      }

      out.pad_to_sector()?;
      self.report_output(out);
    }

    Ok(())
  }

  fn write_files<W>(
    &mut self,
    tree: &ElementTree,
    files: &[ElementId],
    out: &mut SectorWriter<W>,
  ) -> Result<()>
  where
    W: std::io::Write,
  {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];

    for &id in files {
      self.cancel.check()?;

      let element = tree.get(id);
      let file = element
        .as_file()
        .ok_or_else(|| Error::layout(format!("{:?} is not a file", element.long_name)))?;
      let origin = || {
        file
          .content
          .host_path()
          .map(|path| path.to_path_buf())
          .unwrap_or_else(|| tree.path(id))
      };

      out.expect_lba(file.extent, &format!("data of {:?}", element.long_name))?;
      log::debug!(
        "Writing file content (LBA {}, {} bytes): {}",
        file.extent,
        file.length,
        origin().display()
      );

      let mut reader = file.content.open()?;
      let mut remaining = file.length;

      while remaining > 0 {
        let chunk = remaining.min(buffer.len() as u64) as usize;

        // A source shorter than its declared length fails here; extra bytes
        // past the declared length are never read.
        reader
          .read_exact(&mut buffer[..chunk])
          .map_err(|e| Error::source_read(origin(), e))?;
        out.write_all(&buffer[..chunk])?;
        remaining -= chunk as u64;

        self.report_output(out);
      }

      out.pad_to_sector()?;
      self.report_output(out);
      self.cancel.check()?;
    }

    Ok(())
  }
}

/// Writes the image of `source` to `output` in one call.
pub fn convert<W, P>(
  source: &dyn DirectorySource,
  output: W,
  options: IsoWriterOptions,
  progress: P,
  cancel: &CancellationToken,
) -> Result<ConversionReport>
where
  W: std::io::Write,
  P: ProgressSink,
{
  IsoWriter::new(options)
    .with_progress(progress)
    .with_cancellation(cancel.clone())
    .write(source, output)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::{FileContent, MemoryDirectory};

  #[derive(Default)]
  struct Recorder {
    labels: Vec<String>,
    positions: Vec<i64>,
    finished: usize,
    aborted: Vec<String>,
    cancel_on: Option<(String, CancellationToken)>,
  }

  impl ProgressSink for Recorder {
    fn update(&mut self, update: ProgressUpdate<'_>) {
      match update.label {
        Some(label) => {
          self.labels.push(label.to_owned());
          if let Some((trigger, token)) = &self.cancel_on {
            if trigger == label {
              token.cancel();
            }
          }
        }
        None => self.positions.push(update.current),
      }
    }

    fn finished(&mut self) {
      self.finished += 1;
    }

    fn aborted(&mut self, error: &Error) {
      self.aborted.push(error.to_string());
    }
  }

  fn sample() -> MemoryDirectory {
    let d = IsoDate::no_date;
    MemoryDirectory::new(d())
      .with_file("a.txt", d(), b"alpha".to_vec())
      .with_directory("sub", MemoryDirectory::new(d()).with_file("b.txt", d(), vec![9; 3000]))
  }

  #[test]
  fn successful_run_reports_every_stage() {
    let mut writer = IsoWriter::new(IsoWriterOptions::default()).with_progress(Recorder::default());
    let mut image = vec![];
    let report = writer.write(&sample(), &mut image).unwrap();

    assert_eq!(writer.stage(), Stage::Done);
    assert_eq!(image.len() as u64, u64::from(report.volume_space_size) * 2048);
    assert_eq!(report.directory_count, 2);
    assert_eq!(report.file_count, 2);

    let recorder = writer.progress();
    assert_eq!(recorder.finished, 1);
    assert!(recorder.aborted.is_empty());
    assert_eq!(
      recorder.labels,
      vec![
        "Initializing ISO root directory...",
        "Preparing first set of directory extents...",
        "Calculating directory numbers...",
        "Preparing first set of path tables...",
        "Preparing second set of directory extents...",
        "Preparing second set of path tables...",
        "Initializing...",
        "Writing data to file...",
        "Finished.",
      ]
    );
    assert_eq!(
      recorder.positions.last().copied(),
      Some(i64::from(report.volume_space_size))
    );
  }

  #[test]
  fn cancellation_aborts_once() {
    let token = CancellationToken::new();
    let recorder = Recorder {
      cancel_on: Some(("Writing data to file...".to_owned(), token.clone())),
      ..Default::default()
    };
    let mut writer = IsoWriter::new(IsoWriterOptions::default())
      .with_progress(recorder)
      .with_cancellation(token);

    let result = writer.write(&sample(), std::io::sink());

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(writer.stage(), Stage::Aborted);
    assert_eq!(writer.progress().aborted.len(), 1);
    assert_eq!(writer.progress().finished, 0);
  }

  #[test]
  fn short_source_is_a_read_error() {
    let mut root = MemoryDirectory::new(IsoDate::no_date());
    root.insert_file_content("short.bin", IsoDate::no_date(), 100, FileContent::from(vec![1; 10]));

    let result = IsoWriter::new(IsoWriterOptions::default()).write(&root, std::io::sink());
    match result {
      Err(Error::SourceRead { path, .. }) => {
        assert_eq!(path, std::path::PathBuf::from("short.bin"))
      }
      other => panic!("unexpected result: {other:?}"),
    }
  }

  #[test]
  fn long_source_is_truncated_to_declared_length() {
    let mut root = MemoryDirectory::new(IsoDate::no_date());
    root.insert_file_content("long.bin", IsoDate::no_date(), 4, FileContent::from(vec![7; 5000]));

    let mut image = vec![];
    let report = IsoWriter::new(IsoWriterOptions::default())
      .write(&root, &mut image)
      .unwrap();

    // 19 + 2 * (1 table + 2 path table sectors) + 1 data sector.
    assert_eq!(report.volume_space_size, 26);
    let data = &image[25 * 2048..];
    assert_eq!(&data[..4], &[7; 4]);
    assert!(data[4..].iter().all(|&b| b == 0));
  }

  #[test]
  fn oversized_label_aborts() {
    let options = IsoWriterOptions {
      volume_label: "A LABEL THAT IS FAR TOO LONG FOR ANY VOLUME".to_owned(),
      ..Default::default()
    };
    let result = IsoWriter::new(options).write(&sample(), std::io::sink());
    assert!(matches!(result, Err(Error::IdentifierTooLong { .. })));
  }
}
