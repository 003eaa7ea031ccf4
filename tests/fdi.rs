mod common;

use common::*;
use zxfloppy::{DiskCh, DiskImage, DiskImageError, DiskImageFileFormat, ImageBuilder, ParserWriteOptions};

fn fdi_header(cylinders: u16, heads: u16) -> Vec<u8> {
    let mut header = b"FDI\0".to_vec();
    header.extend_from_slice(&cylinders.to_le_bytes());
    header.extend_from_slice(&heads.to_le_bytes());
    header.extend_from_slice(&[14, 0, 14, 0, 0, 0]);
    header
}

#[test]
fn test_fdi_round_trip() {
    init();

    let mut disk = load_bytes(&pattern_trd(80), DiskImageFileFormat::Trd);
    let trd_hash = compute_slice_hash(&trd_bytes(&mut disk));

    let fdi = save_bytes(&mut disk, DiskImageFileFormat::Fdi, &ParserWriteOptions::default());
    assert_eq!(&fdi[0..3], b"FDI");
    assert_eq!(u16::from_le_bytes([fdi[4], fdi[5]]), 80);
    assert_eq!(u16::from_le_bytes([fdi[6], fdi[7]]), 2);

    let mut loaded = load_bytes(&fdi, DiskImageFileFormat::Fdi);
    assert_eq!(loaded.cylinders(), 80);
    assert_eq!(loaded.heads(), 2);
    assert_eq!(compute_slice_hash(&trd_bytes(&mut loaded)), trd_hash);
}

#[test]
fn test_fdi_preserves_marks() {
    init();

    let mut disk = load_bytes(&pattern_trd(40), DiskImageFileFormat::Trd);
    let ch = DiskCh::new(3, 1);

    // Turn sector 4 into a deleted data sector and break the data CRC of sector 11.
    let mark = disk.find_sector(ch, 4, 0).unwrap();
    disk.track_mut(ch).unwrap().set_byte(mark.data_offset - 1, 0xF8);
    disk.apply_sector_crc(ch, &mark).unwrap();
    let mark = disk.find_sector(ch, 11, 0).unwrap();
    let track = disk.track_mut(ch).unwrap();
    let byte = track.byte_at(mark.end_offset);
    track.set_byte(mark.end_offset, !byte);

    let deleted = disk.read_sector(ch, 4).unwrap();
    assert!(deleted.deleted_mark);
    assert!(!deleted.crc_error);
    assert!(disk.read_sector(ch, 11).unwrap().crc_error);

    let fdi = save_bytes(&mut disk, DiskImageFileFormat::Fdi, &ParserWriteOptions::default());
    let loaded = load_bytes(&fdi, DiskImageFileFormat::Fdi);

    let sector = loaded.read_sector(ch, 4).unwrap();
    assert!(sector.deleted_mark);
    assert!(!sector.crc_error);
    assert_eq!(sector.data, deleted.data);

    let sector = loaded.read_sector(ch, 11).unwrap();
    assert!(sector.crc_error);
    assert!(!sector.deleted_mark);

    assert!(!loaded.read_sector(ch, 5).unwrap().crc_error);
}

#[test]
fn test_fdi_geometry_too_large() {
    init();

    let mut image = fdi_header(257, 2);
    image.resize(4096, 0);

    let mut disk = DiskImage::new();
    let result = disk.open_buffer(&image, DiskImageFileFormat::Fdi, true);
    assert_eq!(result, Err(DiskImageError::GeometryTooLarge));
    assert!(!disk.is_present());
}

#[test]
fn test_fdi_write_protect() {
    init();

    let mut disk = ImageBuilder::new().with_geometry(2, 1).build().unwrap();
    let mut fdi = save_bytes(&mut disk, DiskImageFileFormat::Fdi, &ParserWriteOptions::default());
    assert_eq!(fdi[3], 0);
    fdi[3] = 1;

    let mut loaded = DiskImage::new();
    loaded.open_buffer(&fdi, DiskImageFileFormat::Fdi, false).unwrap();
    assert!(loaded.is_read_only());
    assert!(loaded.write_sector(DiskCh::new(1, 0), 1, &[0u8; 256]).is_err());
}

#[test]
fn test_fdi_truncated_track_table() {
    init();

    let mut image = fdi_header(80, 2);
    image.extend_from_slice(&[0u8; 20]);

    let mut disk = DiskImage::new();
    assert_eq!(
        disk.open_buffer(&image, DiskImageFileFormat::Fdi, true),
        Err(DiskImageError::CorruptFile)
    );
}
