use chrono::NaiveDate;
use dir2iso::{
  date::IsoDate,
  error::Error,
  progress::{CancellationToken, NoProgress},
  source::{DirectorySource, HostDirectory, MemoryDirectory},
  writer::Stage,
  ConversionReport, IsoWriter, IsoWriterOptions,
};

const SECTOR: usize = 2048;

fn date() -> IsoDate {
  IsoDate::new(
    NaiveDate::from_ymd_opt(2023, 6, 1)
      .unwrap()
      .and_hms_opt(8, 0, 0)
      .unwrap(),
    0,
  )
}

fn image_of(source: &dyn DirectorySource) -> (Vec<u8>, ConversionReport) {
  let mut image = vec![];
  let report = IsoWriter::new(IsoWriterOptions::default())
    .write(source, &mut image)
    .unwrap();
  (image, report)
}

fn sector(image: &[u8], lba: u32) -> &[u8] {
  let start = lba as usize * SECTOR;
  &image[start..start + SECTOR]
}

fn le_u32(bytes: &[u8]) -> u32 {
  u32::from_le_bytes(bytes[..4].try_into().unwrap())
}

fn be_u32(bytes: &[u8]) -> u32 {
  u32::from_be_bytes(bytes[..4].try_into().unwrap())
}

#[derive(Debug)]
struct Record {
  identifier: Vec<u8>,
  extent: u32,
  data_length: u32,
  flags: u8,
}

/// Reads the directory records of a table, skipping sector padding.
fn records(image: &[u8], lba: u32, sectors: u32) -> Vec<Record> {
  let mut out = vec![];

  for s in 0..sectors {
    let bytes = sector(image, lba + s);
    let mut offset = 0;

    while offset < SECTOR && bytes[offset] != 0 {
      let len = bytes[offset] as usize;
      let rec = &bytes[offset..offset + len];

      // Both byte orders must agree.
      assert_eq!(le_u32(&rec[2..]), be_u32(&rec[6..]));
      assert_eq!(le_u32(&rec[10..]), be_u32(&rec[14..]));

      let id_len = rec[32] as usize;
      out.push(Record {
        identifier: rec[33..33 + id_len].to_vec(),
        extent: le_u32(&rec[2..]),
        data_length: le_u32(&rec[10..]),
        flags: rec[25],
      });
      offset += len;
    }
  }

  out
}

fn root_record(image: &[u8], descriptor_lba: u32) -> Record {
  let vd = sector(image, descriptor_lba);
  Record {
    identifier: vd[156 + 33..156 + 34].to_vec(),
    extent: le_u32(&vd[158..]),
    data_length: le_u32(&vd[166..]),
    flags: vd[156 + 25],
  }
}

fn ucs2(text: &str) -> Vec<u8> {
  text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
}

#[test]
fn empty_directory_image() {
  let (image, report) = image_of(&MemoryDirectory::new(date()));

  assert_eq!(report.volume_space_size, 25);
  assert_eq!(image.len(), 25 * SECTOR);
  assert!(image[..16 * SECTOR].iter().all(|&b| b == 0));

  let pvd = sector(&image, 16);
  assert_eq!(pvd[0], 1);
  assert_eq!(&pvd[1..6], b"CD001");
  assert_eq!(pvd[6], 1);
  assert_eq!(&pvd[40..72], format!("{:<32}", "CDROM").as_bytes());
  assert_eq!(le_u32(&pvd[80..]), 25);
  assert_eq!(be_u32(&pvd[84..]), 25);
  assert_eq!(&pvd[128..132], &[0x00, 0x08, 0x08, 0x00]);
  assert_eq!(le_u32(&pvd[132..]), 10);
  assert_eq!(le_u32(&pvd[140..]), 20);
  assert_eq!(be_u32(&pvd[148..]), 21);
  assert_eq!(&pvd[813..829], b"2023060108000000");
  assert_eq!(&pvd[847..863], b"1900010100000000");
  assert_eq!(pvd[881], 1);

  let root = root_record(&image, 16);
  assert_eq!(root.identifier, vec![0]);
  assert_eq!(root.extent, 19);
  assert_eq!(root.data_length, 2048);
  assert_eq!(root.flags, 2);

  let svd = sector(&image, 17);
  assert_eq!(svd[0], 2);
  assert_eq!(&svd[88..91], b"%/E");
  assert_eq!(&svd[40..50], &ucs2("CDROM")[..]);
  assert_eq!(&svd[50..52], &[0x00, 0x20]);
  assert_eq!(le_u32(&svd[140..]), 23);
  assert_eq!(be_u32(&svd[148..]), 24);
  assert_eq!(root_record(&image, 17).extent, 22);

  let terminator = sector(&image, 18);
  assert_eq!(terminator[0], 255);
  assert_eq!(&terminator[1..6], b"CD001");
  assert!(terminator[7..].iter().all(|&b| b == 0));

  // "." and ".." of the root both point at the root.
  for lba in [19, 22] {
    let table = records(&image, lba, 1);
    assert_eq!(table.len(), 2);
    assert_eq!(table[0].identifier, vec![0]);
    assert_eq!(table[1].identifier, vec![1]);
    assert_eq!(table[0].extent, lba);
    assert_eq!(table[1].extent, lba);
  }

  let type_l = sector(&image, 20);
  assert_eq!(&type_l[..10], &[1, 0, 19, 0, 0, 0, 1, 0, 0, 0]);
  let type_m = sector(&image, 21);
  assert_eq!(&type_m[..10], &[1, 0, 0, 0, 0, 19, 0, 1, 0, 0]);
}

#[test]
fn file_data_is_sector_padded() {
  let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
  let root = MemoryDirectory::new(date()).with_file("payload.bin", date(), data.clone());
  let (image, report) = image_of(&root);

  assert_eq!(report.volume_space_size, 25 + 3);
  assert_eq!(report.file_count, 1);

  let table = records(&image, 19, 1);
  let file = &table[2];
  assert_eq!(file.identifier, b"PAYLOAD0;1");
  assert_eq!(file.data_length, 5000);
  assert_eq!(file.flags, 0);
  assert_eq!(file.extent, 25);

  let start = file.extent as usize * SECTOR;
  assert_eq!(&image[start..start + 5000], &data[..]);
  assert!(image[start + 5000..start + 3 * SECTOR].iter().all(|&b| b == 0));

  // Joliet records point at the same data.
  let joliet = records(&image, 22, 1);
  assert_eq!(joliet[2].identifier, ucs2("payload.bin"));
  assert_eq!(joliet[2].extent, 25);
}

#[test]
fn short_and_long_names() {
  let root = MemoryDirectory::new(date()).with_file("My File.txt", date(), b"x".to_vec());
  let (image, _) = image_of(&root);

  assert_eq!(records(&image, 19, 1)[2].identifier, b"MY_FILE0;1");
  assert_eq!(records(&image, 22, 1)[2].identifier, ucs2("My File.txt"));
}

#[test]
fn identical_inputs_give_identical_images() {
  let build = || {
    MemoryDirectory::new(date())
      .with_file("one.txt", date(), b"1".to_vec())
      .with_directory(
        "nested",
        MemoryDirectory::new(date()).with_file("two.txt", date(), vec![2; 4096]),
      )
  };

  let (first, _) = image_of(&build());
  let (second, _) = image_of(&build());
  assert_eq!(first, second);
}

#[test]
fn path_tables_follow_breadth_first_numbering() {
  let d = date;
  let root = MemoryDirectory::new(d())
    .with_directory(
      "b",
      MemoryDirectory::new(d()).with_directory("b1", MemoryDirectory::new(d())),
    )
    .with_directory(
      "a",
      MemoryDirectory::new(d()).with_directory("a1", MemoryDirectory::new(d())),
    );
  let (image, report) = image_of(&root);
  assert_eq!(report.directory_count, 5);

  let table = sector(&image, report.primary.type_l_location);
  let mut offset = 0;
  let mut entries = vec![];
  while offset < report.primary.size as usize {
    let id_len = table[offset] as usize;
    let extent = le_u32(&table[offset + 2..]);
    let parent = u16::from_le_bytes([table[offset + 6], table[offset + 7]]);
    let id = table[offset + 8..offset + 8 + id_len].to_vec();
    entries.push((id, parent, extent));
    offset += 8 + id_len + id_len % 2;
  }

  let names: Vec<_> = entries.iter().map(|(id, parent, _)| (id.clone(), *parent)).collect();
  assert_eq!(
    names,
    vec![
      (vec![0], 1),
      (b"A".to_vec(), 1),
      (b"B".to_vec(), 1),
      (b"A1".to_vec(), 2),
      (b"B1".to_vec(), 3),
    ]
  );

  // Directory tables are laid out in the same order.
  let extents: Vec<_> = entries.iter().map(|(_, _, extent)| *extent).collect();
  assert_eq!(extents, vec![19, 20, 21, 22, 23]);

  // ".." of A1 points at A.
  let a1 = records(&image, 22, 1);
  assert_eq!(a1[1].extent, 20);

  // The big-endian copy carries the same records.
  let type_m = sector(&image, report.primary.type_m_location);
  assert_eq!(be_u32(&type_m[10 + 2..]), 20);
  assert_eq!(&type_m[10 + 6..10 + 8], &[0, 1]);
}

#[test]
fn long_directories_span_sectors() {
  let mut root = MemoryDirectory::new(date());
  for i in 0..100 {
    root.insert_file(format!("entry{i:03}"), date(), vec![]);
  }
  let (image, report) = image_of(&root);

  // "ENTRY000;1" records are 44 bytes: 45 in the first sector, 46 in the second.
  let root_dir = root_record(&image, 16);
  assert_eq!(root_dir.data_length, 3 * 2048);
  let table = records(&image, 19, 3);
  assert_eq!(table.len(), 102);
  assert!(table[2..].iter().all(|r| r.extent == 0 && r.data_length == 0));
  assert_eq!(report.primary.type_l_location, 22);

  // Joliet records for "entry000" are 50 bytes: 39 in the first sector, 40
  // in the second and the remaining 21 in a third.
  let joliet_root = root_record(&image, 17);
  assert_eq!(joliet_root.extent, 24);
  assert_eq!(joliet_root.data_length, 3 * 2048);
  let joliet = records(&image, joliet_root.extent, 3);
  assert_eq!(joliet.len(), 102);
  assert_eq!(joliet[2].identifier.len(), 16);
  let last: Vec<u8> = "entry099".encode_utf16().flat_map(u16::to_be_bytes).collect();
  assert_eq!(joliet[101].identifier, last);
  assert_eq!(report.supplementary.type_l_location, 27);
}

#[test]
fn host_directory_image() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("hello.txt"), b"hello, world").unwrap();
  std::fs::create_dir(dir.path().join("nested")).unwrap();
  std::fs::write(dir.path().join("nested").join("deep.dat"), vec![0xAB; 2049]).unwrap();

  let options = IsoWriterOptions {
    volume_label: "HOSTTEST".to_owned(),
    volume_date: Some(date()),
    ..Default::default()
  };
  let mut image = vec![];
  let report = IsoWriter::new(options)
    .write(&HostDirectory::new(dir.path()), &mut image)
    .unwrap();

  assert_eq!(report.directory_count, 2);
  assert_eq!(report.file_count, 2);
  assert_eq!(image.len(), report.volume_space_size as usize * SECTOR);
  assert_eq!(&sector(&image, 16)[40..48], b"HOSTTEST");

  let table = records(&image, 19, 1);
  let ids: Vec<_> = table[2..].iter().map(|r| r.identifier.clone()).collect();
  assert_eq!(ids, vec![b"HELLO_T0;1".to_vec(), b"NESTED".to_vec()]);

  let hello = &table[2];
  let start = hello.extent as usize * SECTOR;
  assert_eq!(&image[start..start + 12], b"hello, world");

  let nested = records(&image, table[3].extent, 1);
  assert_eq!(nested[2].identifier, b"DEEP_DAT;1");
  assert_eq!(nested[2].data_length, 2049);
  let start = nested[2].extent as usize * SECTOR;
  assert!(image[start..start + 2049].iter().all(|&b| b == 0xAB));
  assert_eq!(nested[2].extent, hello.extent + 1);
}

#[test]
fn cancelled_conversion_writes_nothing_more() {
  let token = CancellationToken::new();
  token.cancel();

  let mut writer = IsoWriter::new(IsoWriterOptions::default())
    .with_progress(NoProgress)
    .with_cancellation(token);
  let mut image = vec![];
  let result = writer.write(&MemoryDirectory::new(date()), &mut image);

  assert!(matches!(result, Err(Error::Cancelled)));
  assert_eq!(writer.stage(), Stage::Aborted);
  assert!(image.is_empty());
}

#[test]
fn cancel_from_another_thread() {
  let token = CancellationToken::new();
  let worker_token = token.clone();
  let root = MemoryDirectory::new(date()).with_file("big.bin", date(), vec![1; 4 << 20]);

  token.cancel();
  let handle = std::thread::spawn(move || {
    dir2iso::convert(
      &root,
      std::io::sink(),
      IsoWriterOptions::default(),
      NoProgress,
      &worker_token,
    )
  });

  assert!(matches!(handle.join().unwrap(), Err(Error::Cancelled)));
}
