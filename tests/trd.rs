mod common;

use common::*;
use zxfloppy::{DiskCh, DiskImage, DiskImageError, DiskImageFileFormat};

#[test]
fn test_trd_round_trip() {
    init();

    let in_image = pattern_trd(80);
    let in_hash = compute_slice_hash(&in_image);
    println!("Input file SHA1: {}", in_hash);

    let mut disk = load_bytes(&in_image, DiskImageFileFormat::Trd);
    assert_eq!(disk.cylinders(), 80);
    assert_eq!(disk.heads(), 2);
    assert_eq!(disk.max_cylinder(), 79);

    let out_image = trd_bytes(&mut disk);
    let out_hash = compute_slice_hash(&out_image);
    println!("Output file SHA1: {}", out_hash);

    assert_eq!(in_hash, out_hash);
    assert!(disk.warnings().is_empty());
}

#[test]
fn test_trd_sector_contents() {
    init();

    let disk = load_bytes(&pattern_trd(40), DiskImageFileFormat::Trd);
    for (c, h, s) in [(0, 0, 1), (0, 1, 16), (17, 0, 5), (39, 1, 9)] {
        let index = trd_offset(c, h, s) / 256;
        let sector = disk.read_sector(DiskCh::new(c as u16, h as u8), s as u8).unwrap();
        assert_eq!(sector.id.c, c as u8);
        // TR-DOS writes head 0 into every ID field.
        assert_eq!(sector.id.h, 0);
        assert!(!sector.crc_error);
        assert!(!sector.deleted_mark);
        assert_eq!(sector.data, vec![index as u8; 256]);
    }
}

#[test]
fn test_trd_missing_sector() {
    init();

    let mut disk = load_bytes(&pattern_trd(80), DiskImageFileFormat::Trd);
    let ch = DiskCh::new(5, 0);

    // Renumber sector 7 so it can no longer be found.
    let mark = disk.find_sector(ch, 7, 0).unwrap();
    let track = disk.track_mut(ch).unwrap();
    track.set_byte(mark.address.id_offset + 2, 0x27);
    assert_eq!(
        disk.read_sector(ch, 7).err(),
        Some(DiskImageError::SectorNotFound { ch, sector: 7 })
    );

    let out_image = trd_bytes(&mut disk);
    assert_eq!(out_image.len(), 80 * 2 * 16 * 256);

    let offset = trd_offset(5, 0, 7);
    let sentinel = &out_image[offset..offset + 256];
    assert!(sentinel.starts_with(b"ERROR: THIS SECTOR NOT FOUND"));
    assert_eq!(sentinel[53], 0);
    assert_eq!(sentinel[255], b'*');

    // Neighbouring sectors are untouched.
    let next = trd_offset(5, 0, 8);
    assert_eq!(&out_image[next..next + 256], &[(next / 256) as u8; 256][..]);

    assert!(disk
        .warnings()
        .contains(&DiskImageError::SectorNotFound { ch, sector: 7 }));
}

#[test]
fn test_trd_invalid_size() {
    init();

    let mut disk = DiskImage::new();
    let result = disk.open_buffer(&[0u8; 4096], DiskImageFileFormat::Trd, true);
    assert_eq!(result, Err(DiskImageError::UnknownFormat));
    assert!(!disk.is_present());
}
