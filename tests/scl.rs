mod common;

use common::*;
use zxfloppy::{util::scl_checksum, DiskImageError, DiskImageFileFormat, ParserWriteOptions};

fn sample_files() -> Vec<TestFile> {
    vec![
        TestFile::new(b"boot    ", b'B', 300, 1),
        TestFile::new(b"screen  ", b'C', 6912, 2),
        TestFile::new(b"code    ", b'C', 256, 3),
    ]
}

#[test]
fn test_scl_write() {
    init();

    let files = sample_files();
    let mut disk = disk_with_files(&files);
    let scl = save_bytes(&mut disk, DiskImageFileFormat::Scl, &ParserWriteOptions::default());

    assert_eq!(&scl[0..8], b"SINCLAIR");
    assert_eq!(scl[8], 3);

    let used: usize = files.iter().map(|f| f.sector_count()).sum();
    assert_eq!(scl.len(), 9 + 3 * 14 + used * 256 + 4);

    // Entries are stored without their position fields.
    assert_eq!(&scl[9..17], b"boot    ");
    assert_eq!(scl[9 + 13], 2);
    assert_eq!(&scl[23..31], b"screen  ");

    let payload = 9 + 3 * 14;
    assert_eq!(&scl[payload..payload + 300], &files[0].data[..]);

    let checksum_offset = scl.len() - 4;
    let stored = u32::from_le_bytes(scl[checksum_offset..].try_into().unwrap());
    assert_eq!(stored, scl_checksum(&scl[..checksum_offset]));
}

#[test]
fn test_scl_round_trip() {
    init();

    let files = sample_files();
    let mut disk = disk_with_files(&files);
    let scl = save_bytes(&mut disk, DiskImageFileFormat::Scl, &ParserWriteOptions::default());

    let mut loaded = load_bytes(&scl, DiskImageFileFormat::Scl);
    assert!(loaded.warnings().is_empty());
    assert_eq!(loaded.cylinders(), 80);
    assert_eq!(loaded.heads(), 2);

    // Files are laid out contiguously from track 1, just as they were on the source disk.
    assert_eq!(loaded.catalog().unwrap(), disk.catalog().unwrap());

    let info = loaded.disk_info().unwrap();
    assert_eq!(info.file_count, 3);
    assert_eq!(info.free_sectors, 2544 - 30);
    assert_eq!(info.first_free_track, 2);
    assert_eq!(info.first_free_sector, 14);
    assert_eq!(info.disk_type, 0x16);

    let rewritten = save_bytes(&mut loaded, DiskImageFileFormat::Scl, &ParserWriteOptions::default());
    assert_eq!(compute_slice_hash(&scl), compute_slice_hash(&rewritten));
    assert_eq!(trd_bytes(&mut disk), trd_bytes(&mut loaded));
}

#[test]
fn test_scl_bad_checksum() {
    init();

    let mut disk = disk_with_files(&sample_files());
    let mut scl = save_bytes(&mut disk, DiskImageFileFormat::Scl, &ParserWriteOptions::default());
    let last = scl.len() - 1;
    scl[last] ^= 0x5A;

    let loaded = load_bytes(&scl, DiskImageFileFormat::Scl);
    assert!(loaded.is_present());
    assert_eq!(
        loaded.warnings(),
        &[DiskImageError::BadChecksum(DiskImageFileFormat::Scl)]
    );
    assert_eq!(loaded.catalog().unwrap().len(), 3);
}

#[test]
fn test_scl_trailing_padding() {
    init();

    let mut disk = disk_with_files(&sample_files());
    let mut scl = save_bytes(&mut disk, DiskImageFileFormat::Scl, &ParserWriteOptions::default());
    // XMODEM style padding after the checksum.
    scl.extend_from_slice(&[0x1A; 127]);

    let loaded = load_bytes(&scl, DiskImageFileFormat::Scl);
    assert!(loaded.warnings().is_empty());
    assert_eq!(loaded.catalog().unwrap(), disk.catalog().unwrap());

    scl.push(0x00);
    let loaded = load_bytes(&scl, DiskImageFileFormat::Scl);
    assert!(loaded.warnings().is_empty());
}

#[test]
fn test_scl_beyond_track_255() {
    init();

    // 17 files of 255 sectors run past logical track 255.
    let mut scl = b"SINCLAIR".to_vec();
    scl.push(17);
    for i in 0..17u8 {
        let mut entry = *b"big     ";
        entry[3] = b'a' + i;
        scl.extend_from_slice(&entry);
        scl.push(b'C');
        scl.extend_from_slice(&0u16.to_le_bytes());
        scl.extend_from_slice(&0xFF00u16.to_le_bytes());
        scl.push(255);
    }
    scl.resize(scl.len() + 17 * 255 * 256, 0xE5);
    let checksum = scl_checksum(&scl);
    scl.extend_from_slice(&checksum.to_le_bytes());

    let mut disk = zxfloppy::DiskImage::new();
    let result = disk.open_buffer(&scl, DiskImageFileFormat::Scl, true);
    assert_eq!(result, Err(DiskImageError::GeometryTooLarge));
    assert!(!disk.is_present());
}

#[test]
fn test_scl_truncated() {
    init();

    let mut disk = disk_with_files(&sample_files());
    let scl = save_bytes(&mut disk, DiskImageFileFormat::Scl, &ParserWriteOptions::default());

    let mut loaded = zxfloppy::DiskImage::new();
    let result = loaded.open_buffer(&scl[..1024], DiskImageFileFormat::Scl, true);
    assert_eq!(result, Err(DiskImageError::CorruptFile));
    assert!(!loaded.is_present());
}

#[test]
fn test_scl_requires_trdos() {
    init();

    let mut disk = load_bytes(&pattern_trd(80), DiskImageFileFormat::Trd);
    let mut out = Vec::new();
    let result = disk.save(DiskImageFileFormat::Scl, &ParserWriteOptions::default(), &mut out);
    assert_eq!(result, Err(DiskImageError::IncompatibleImage));
}
