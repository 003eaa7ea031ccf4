mod common;

use common::*;
use zxfloppy::{util::td0_crc, DiskCh, DiskImage, DiskImageError, DiskImageFileFormat, ParserWriteOptions};

fn td0_header(id: &[u8; 2], version: u8, stepping: u8) -> Vec<u8> {
    let mut header = vec![id[0], id[1], 0, 0, version, 0, 0x03, stepping, 0, 0x02];
    let crc = td0_crc(&header, 0);
    header.extend_from_slice(&crc.to_le_bytes());
    header
}

fn track_header(sectors: u8, c: u8, h: u8) -> Vec<u8> {
    let crc = td0_crc(&[sectors, c, h], 0) as u8;
    vec![sectors, c, h, crc]
}

/// A single track image with one sector of each encoding method and one sector without data.
fn sample_td0(stepping: u8, comment: Option<&[u8]>) -> Vec<u8> {
    let mut image = td0_header(b"TD", 21, stepping);

    if let Some(text) = comment {
        let mut block = Vec::new();
        block.extend_from_slice(&(text.len() as u16).to_le_bytes());
        block.extend_from_slice(&[124, 5, 14, 12, 30, 0]);
        block.extend_from_slice(text);
        let crc = td0_crc(&block, 0);
        image.extend_from_slice(&crc.to_le_bytes());
        image.extend_from_slice(&block);
    }

    image.extend_from_slice(&track_header(4, 0, 0));

    // Sector 1: raw, 256 bytes.
    image.extend_from_slice(&[0, 0, 1, 1, 0, 0]);
    image.extend_from_slice(&257u16.to_le_bytes());
    image.push(0);
    image.extend((0..256).map(|i| i as u8));

    // Sector 2: repeated pattern.
    image.extend_from_slice(&[0, 0, 2, 1, 0, 0]);
    image.extend_from_slice(&5u16.to_le_bytes());
    image.extend_from_slice(&[1, 128, 0, 0xE5, 0xAA]);

    // Sector 3: run length records, deleted with a bad CRC.
    image.extend_from_slice(&[0, 0, 3, 1, 0x04 | 0x02, 0]);
    image.extend_from_slice(&10u16.to_le_bytes());
    image.extend_from_slice(&[2, 0, 3, 0x11, 0x22, 0x33, 1, 100, 0x44, 0x55]);

    // Sector 4: no data.
    image.extend_from_slice(&[0, 0, 4, 1, 0x20, 0]);

    image.extend_from_slice(&[0xFF, 0, 0, 0]);
    image
}

#[test]
fn test_td0_load() {
    init();

    let disk = load_bytes(&sample_td0(0, None), DiskImageFileFormat::TeleDisk);
    assert!(disk.warnings().is_empty());
    assert_eq!(disk.cylinders(), 1);
    assert_eq!(disk.heads(), 1);

    let ch = DiskCh::new(0, 0);
    let raw = disk.read_sector(ch, 1).unwrap();
    assert_eq!(raw.data, (0..256).map(|i| i as u8).collect::<Vec<u8>>());

    let repeated = disk.read_sector(ch, 2).unwrap();
    assert_eq!(repeated.data.len(), 256);
    assert!(repeated.data.chunks(2).all(|pair| pair == [0xE5, 0xAA]));

    let rle = disk.read_sector(ch, 3).unwrap();
    assert!(rle.deleted_mark);
    assert!(rle.crc_error);
    assert_eq!(&rle.data[..5], &[0x11, 0x22, 0x33, 0x44, 0x55]);
    assert_eq!(rle.data.len(), 256);
    assert!(rle.data[3..203].chunks(2).all(|pair| pair == [0x44, 0x55]));
    assert!(rle.data[203..].iter().all(|b| *b == 0));

    // The ID field of sector 4 is present but it has no data field.
    let sectors = disk.track_sectors(ch);
    assert_eq!(sectors.len(), 4);
    assert!(sectors[3].sector.is_none());
    assert_eq!(sectors[3].address.id.s, 4);
}

#[test]
fn test_td0_comment() {
    init();

    let disk = load_bytes(&sample_td0(0x80, Some(b"Elite\0Side A\0")), DiskImageFileFormat::TeleDisk);
    assert!(disk.warnings().is_empty());
    assert_eq!(disk.track_sectors(DiskCh::new(0, 0)).len(), 4);

    let mut image = sample_td0(0x80, Some(b"Elite\0Side A\0"));
    image[12] ^= 0xFF;
    let disk = load_bytes(&image, DiskImageFileFormat::TeleDisk);
    assert_eq!(
        disk.warnings(),
        &[DiskImageError::BadChecksum(DiskImageFileFormat::TeleDisk)]
    );
    assert!(disk.read_sector(DiskCh::new(0, 0), 2).is_ok());
}

#[test]
fn test_td0_unsupported() {
    init();

    let mut disk = DiskImage::new();

    let mut image = sample_td0(0, None);
    image[..12].copy_from_slice(&td0_header(b"TD", 9, 0));
    assert_eq!(
        disk.open_buffer(&image, DiskImageFileFormat::TeleDisk, true),
        Err(DiskImageError::UnsupportedVersion)
    );

    image[..12].copy_from_slice(&td0_header(b"td", 15, 0));
    assert_eq!(
        disk.open_buffer(&image, DiskImageFileFormat::TeleDisk, true),
        Err(DiskImageError::UnsupportedVersion)
    );
    assert!(!disk.is_present());
}

#[test]
fn test_td0_round_trip() {
    init();

    let mut disk = disk_with_files(&[TestFile::new(b"game    ", b'C', 9000, 4)]);
    let trd_hash = compute_slice_hash(&trd_bytes(&mut disk));

    let td0 = save_bytes(&mut disk, DiskImageFileFormat::TeleDisk, &ParserWriteOptions::default());
    assert_eq!(&td0[0..2], b"TD");
    assert_eq!(td0[4], 21);
    assert_eq!(u16::from_le_bytes([td0[10], td0[11]]), td0_crc(&td0[..10], 0));

    let mut loaded = load_bytes(&td0, DiskImageFileFormat::TeleDisk);
    assert!(loaded.warnings().is_empty());
    assert_eq!(loaded.cylinders(), 80);
    assert_eq!(loaded.heads(), 2);
    assert_eq!(compute_slice_hash(&trd_bytes(&mut loaded)), trd_hash);
}

#[test]
fn test_td0_compressed_round_trip() {
    init();

    let mut disk = disk_with_files(&[TestFile::new(b"game    ", b'C', 9000, 4)]);
    let trd_hash = compute_slice_hash(&trd_bytes(&mut disk));

    let plain = save_bytes(&mut disk, DiskImageFileFormat::TeleDisk, &ParserWriteOptions::default());
    let packed = save_bytes(
        &mut disk,
        DiskImageFileFormat::TeleDisk,
        &ParserWriteOptions { compress: true },
    );
    assert_eq!(&packed[0..2], b"td");
    assert!(packed.len() < plain.len());

    let mut loaded = load_bytes(&packed, DiskImageFileFormat::TeleDisk);
    assert_eq!(compute_slice_hash(&trd_bytes(&mut loaded)), trd_hash);

    // Compressed and plain images describe the same disk.
    let mut unpacked = load_bytes(&plain, DiskImageFileFormat::TeleDisk);
    assert_eq!(trd_bytes(&mut unpacked), trd_bytes(&mut loaded));
}

#[test]
fn test_td0_preserves_marks() {
    init();

    let ch = DiskCh::new(0, 0);
    let mut disk = load_bytes(&sample_td0(0, None), DiskImageFileFormat::TeleDisk);
    let td0 = save_bytes(&mut disk, DiskImageFileFormat::TeleDisk, &ParserWriteOptions::default());
    let loaded = load_bytes(&td0, DiskImageFileFormat::TeleDisk);

    let sector = loaded.read_sector(ch, 3).unwrap();
    assert!(sector.deleted_mark);
    assert!(sector.crc_error);
    assert_eq!(sector.data, disk.read_sector(ch, 3).unwrap().data);

    let sectors = loaded.track_sectors(ch);
    assert_eq!(sectors.len(), 4);
    assert!(sectors[3].sector.is_none());
}
