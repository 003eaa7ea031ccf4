mod common;

use common::*;
use std::sync::{Arc, Mutex};
use zxfloppy::{
    convert_to_trd,
    trd_conversion_supported,
    DiskCh,
    DiskImage,
    DiskImageError,
    DiskImageFileFormat,
    ErrorSink,
    ImageBuilder,
    ParserWriteOptions,
};

struct CollectingSink(Arc<Mutex<Vec<DiskImageError>>>);

impl ErrorSink for CollectingSink {
    fn show_error(&mut self, error: &DiskImageError) {
        self.0.lock().unwrap().push(error.clone());
    }
}

#[test]
fn test_open_and_flush() {
    init();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("work.trd");
    std::fs::write(&path, pattern_trd(80)).unwrap();

    let ch = DiskCh::new(12, 1);
    let mut disk = DiskImage::new();
    disk.open(&path, false).unwrap();
    assert_eq!(disk.format(), Some(DiskImageFileFormat::Trd));
    assert_eq!(disk.source_path(), Some(path.as_path()));

    disk.write_sector(ch, 3, &[0xC3; 256]).unwrap();
    assert!(disk.is_dirty());
    disk.flush().unwrap();
    assert!(!disk.is_dirty());

    let written = std::fs::read(&path).unwrap();
    let offset = trd_offset(12, 1, 3);
    assert_eq!(&written[offset..offset + 256], &[0xC3; 256][..]);
    assert_eq!(written[offset + 256], (offset / 256 + 1) as u8);
}

#[test]
fn test_open_read_only() {
    init();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locked.trd");
    let original = pattern_trd(40);
    std::fs::write(&path, &original).unwrap();

    let mut disk = DiskImage::new();
    disk.open(&path, true).unwrap();
    assert!(disk.read_sector(DiskCh::new(0, 0), 1).is_ok());
    assert!(matches!(
        disk.write_sector(DiskCh::new(0, 0), 1, &[0u8; 256]),
        Err(DiskImageError::WriteFailed(_))
    ));
    disk.flush().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), original);
}

#[test]
fn test_open_switches_image() {
    init();

    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.trd");
    let second = dir.path().join("second.fdi");
    std::fs::write(&first, pattern_trd(80)).unwrap();

    let mut builder_disk = ImageBuilder::new().with_geometry(40, 1).build().unwrap();
    let fdi = save_bytes(&mut builder_disk, DiskImageFileFormat::Fdi, &ParserWriteOptions::default());
    std::fs::write(&second, fdi).unwrap();

    let mut disk = DiskImage::new();
    disk.open(&first, false).unwrap();
    disk.write_sector(DiskCh::new(0, 0), 16, &[0x77; 256]).unwrap();

    // Opening another image writes back the modified one first.
    disk.open(&second, false).unwrap();
    assert_eq!(disk.format(), Some(DiskImageFileFormat::Fdi));
    assert_eq!(disk.cylinders(), 40);
    assert_eq!(disk.heads(), 1);

    let written = std::fs::read(&first).unwrap();
    let offset = trd_offset(0, 0, 16);
    assert_eq!(&written[offset..offset + 256], &[0x77; 256][..]);
}

#[test]
fn test_open_errors() {
    init();

    let dir = tempfile::tempdir().unwrap();
    let errors = Arc::new(Mutex::new(Vec::new()));

    let mut disk = DiskImage::new();
    disk.set_error_sink(Box::new(CollectingSink(errors.clone())));

    assert!(matches!(
        disk.open(dir.path().join("absent.trd"), true),
        Err(DiskImageError::OpenFailed(_))
    ));

    let unknown = dir.path().join("disk.xyz");
    std::fs::write(&unknown, [0u8; 16]).unwrap();
    assert_eq!(disk.open(&unknown, true), Err(DiskImageError::UnknownFormat));
    assert!(!disk.is_present());

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(matches!(errors[0], DiskImageError::OpenFailed(_)));
    assert_eq!(errors[1], DiskImageError::UnknownFormat);
}

#[test]
fn test_open_detects_content() {
    init();

    let dir = tempfile::tempdir().unwrap();
    let files = [TestFile::new(b"game    ", b'B', 3000, 11)];
    let mut source = disk_with_files(&files);
    let scl = save_bytes(&mut source, DiskImageFileFormat::Scl, &ParserWriteOptions::default());
    let fdi = save_bytes(&mut source, DiskImageFileFormat::Fdi, &ParserWriteOptions::default());

    let scl_path = dir.path().join("game.img");
    std::fs::write(&scl_path, &scl).unwrap();
    let fdi_path = dir.path().join("game");
    std::fs::write(&fdi_path, &fdi).unwrap();
    let trd_path = dir.path().join("game.bin");
    std::fs::write(&trd_path, pattern_trd(80)).unwrap();

    let mut disk = DiskImage::new();
    disk.open(&scl_path, true).unwrap();
    assert_eq!(disk.format(), Some(DiskImageFileFormat::Scl));
    assert_eq!(disk.catalog().unwrap().len(), 1);

    disk.open(&fdi_path, true).unwrap();
    assert_eq!(disk.format(), Some(DiskImageFileFormat::Fdi));

    disk.open(&trd_path, true).unwrap();
    assert_eq!(disk.format(), Some(DiskImageFileFormat::Trd));
    assert_eq!(disk.cylinders(), 80);

    let mut cursor = std::io::Cursor::new(&scl);
    assert_eq!(DiskImage::detect_format(&mut cursor), Ok(DiskImageFileFormat::Scl));
    let mut cursor = std::io::Cursor::new(vec![0u8; 100]);
    assert_eq!(DiskImage::detect_format(&mut cursor), Err(DiskImageError::UnknownFormat));
}

#[test]
fn test_convert_to_trd() {
    init();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archive.scl");

    let files = [TestFile::new(b"intro   ", b'B', 1200, 6)];
    let mut source = disk_with_files(&files);
    let scl = save_bytes(&mut source, DiskImageFileFormat::Scl, &ParserWriteOptions::default());
    std::fs::write(&path, scl).unwrap();

    assert!(trd_conversion_supported(&path));
    assert!(!trd_conversion_supported(dir.path().join("plain.trd")));

    let mut trd = Vec::new();
    convert_to_trd(&path, &mut trd).unwrap();
    assert_eq!(trd, trd_bytes(&mut source));
}

#[test]
fn test_save_not_present() {
    init();

    let mut disk = DiskImage::new();
    let mut out = Vec::new();
    assert_eq!(
        disk.save(DiskImageFileFormat::Trd, &ParserWriteOptions::default(), &mut out),
        Err(DiskImageError::NotPresent)
    );
    assert!(out.is_empty());
}

#[test]
fn test_trdos_header_crc() {
    init();

    // The ID field of every sector on a freshly formatted disk carries a good CRC.
    let disk = ImageBuilder::new().build().unwrap();
    for entry in disk.track_sectors(DiskCh::new(0, 0)) {
        assert!(entry.address.crc_ok);
        assert!(entry.sector.unwrap().crc_ok);
    }
}
