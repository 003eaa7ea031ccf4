/*
    FluxFox
    https://github.com/dbalsom/fluxfox

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    tests/common/mod.rs

    Common support routines for tests
*/
#![allow(dead_code)]

use hex::encode;
use sha1::{Digest, Sha1};
use zxfloppy::{prelude::*, trdos::DirectoryElement, trdos::DiskInfo, util::hobeta_crc};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn compute_slice_hash(slice: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(slice);
    let result = hasher.finalize();

    encode(result)
}

/// Build a TRD image where every byte of each sector holds that sector's index, wrapping.
pub fn pattern_trd(cylinders: usize) -> Vec<u8> {
    let mut image = Vec::with_capacity(cylinders * 2 * 16 * 256);
    for index in 0..cylinders * 2 * 16 {
        image.extend_from_slice(&[index as u8; 256]);
    }
    image
}

/// Offset of a sector within a double sided TRD image. `s` is 1-based.
pub fn trd_offset(c: usize, h: usize, s: usize) -> usize {
    ((c * 2 + h) * 16 + (s - 1)) * 256
}

pub struct TestFile {
    pub name: [u8; 8],
    pub file_type: u8,
    pub data: Vec<u8>,
}

impl TestFile {
    pub fn new(name: &[u8; 8], file_type: u8, len: usize, seed: u8) -> Self {
        Self {
            name: *name,
            file_type,
            data: (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect(),
        }
    }

    pub fn sector_count(&self) -> usize {
        self.data.len().div_ceil(256)
    }
}

/// Map a TR-DOS logical sector number to a physical location on a double sided disk.
pub fn logical_to_physical(position: usize) -> (DiskCh, u8) {
    let track = position / 16;
    (DiskCh::new((track / 2) as u16, (track % 2) as u8), (position % 16) as u8 + 1)
}

/// Build a formatted 80 cylinder double sided disk holding `files` stored contiguously from
/// track 1, with a matching catalog and disk information block.
pub fn disk_with_files(files: &[TestFile]) -> DiskImage {
    let mut disk = ImageBuilder::new().build().unwrap();
    let root = DiskCh::new(0, 0);
    let mut position = 16;

    for (i, file) in files.iter().enumerate() {
        for (j, chunk) in file.data.chunks(256).enumerate() {
            let (ch, s) = logical_to_physical(position + j);
            let mut block = [0u8; 256];
            block[..chunk.len()].copy_from_slice(chunk);
            disk.write_sector(ch, s, &block).unwrap();
        }

        let entry = DirectoryElement {
            name: file.name,
            file_type: file.file_type,
            start: 0x6000,
            length: file.data.len() as u16,
            sector_count: file.sector_count() as u8,
            first_sector: (position % 16) as u8,
            first_track: (position / 16) as u8,
        };
        let catalog_sector = (i / 16) as u8 + 1;
        let mut sector = disk.read_sector(root, catalog_sector).unwrap().data;
        sector[(i % 16) * 16..(i % 16) * 16 + 16].copy_from_slice(&entry.to_bytes());
        disk.write_sector(root, catalog_sector, &sector).unwrap();

        position += file.sector_count();
    }

    let mut info_sector = disk.read_sector(root, 9).unwrap().data;
    let mut info = DiskInfo::from_sector(&info_sector).unwrap();
    info.file_count = files.len() as u8;
    info.first_free_sector = (position % 16) as u8;
    info.first_free_track = (position / 16) as u8;
    info.free_sectors -= (position - 16) as u16;
    info.write_to(&mut info_sector).unwrap();
    disk.write_sector(root, 9, &info_sector).unwrap();

    disk
}

/// Build a Hobeta file wrapping `file`.
pub fn hobeta_file(file: &TestFile) -> Vec<u8> {
    let sectors = file.sector_count();
    let mut buffer = Vec::with_capacity(17 + sectors * 256);
    buffer.extend_from_slice(&file.name);
    buffer.push(file.file_type);
    buffer.extend_from_slice(&0x6000u16.to_le_bytes());
    buffer.extend_from_slice(&(file.data.len() as u16).to_le_bytes());
    buffer.extend_from_slice(&((sectors as u16) << 8).to_le_bytes());
    let crc = hobeta_crc(&buffer);
    buffer.extend_from_slice(&crc.to_le_bytes());

    let mut payload = file.data.clone();
    payload.resize(sectors * 256, 0);
    buffer.extend_from_slice(&payload);
    buffer
}

/// Save `disk` as a TRD image and return the bytes.
pub fn trd_bytes(disk: &mut DiskImage) -> Vec<u8> {
    let mut out = Vec::new();
    disk.write_trd(&mut out).unwrap();
    out
}

/// Save `disk` in `format` and return the bytes.
pub fn save_bytes(disk: &mut DiskImage, format: DiskImageFileFormat, opts: &ParserWriteOptions) -> Vec<u8> {
    let mut out = Vec::new();
    match disk.save(format, opts, &mut out) {
        Ok(()) => out,
        Err(e) => panic!("Failed to save {} image: {}", format, e),
    }
}

/// Load `buffer` as a read-write image of `format`.
pub fn load_bytes(buffer: &[u8], format: DiskImageFileFormat) -> DiskImage {
    let mut disk = DiskImage::new();
    match disk.open_buffer(buffer, format, false) {
        Ok(()) => disk,
        Err(e) => panic!("Failed to load {} image: {}", format, e),
    }
}
