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

    src/file_parsers/hobeta.rs

    A reader for Hobeta files. A Hobeta file is a single TR-DOS file with a 17 byte header.
    The file is written onto a blank TR-DOS disk, or appended to the disk created by a previous
    Hobeta load. Hobeta images are read-only and are never written back.
*/
use crate::chs::DiskCh;
use crate::file_parsers::{FormatCaps, ParserWriteCompatibility, ParserWriteOptions};
use crate::io::{Cursor, ReadSeek, Write};
use crate::trdos::{DirectoryElement, DISK_INFO_SECTOR, MAX_FILES};
use crate::util::{hobeta_crc, read_image_bytes};
use crate::{DiskImage, DiskImageError, DiskImageFileFormat, TRDOS_SECTORS_PER_TRACK, TRDOS_SECTOR_SIZE};
use binrw::{binrw, BinRead};

pub const HOBETA_HEADER_SIZE: usize = 17;
/// Geometry of the disk created for the first Hobeta file.
pub const HOBETA_CYLINDERS: usize = 80;
pub const HOBETA_HEADS: usize = 2;

#[derive(Debug)]
#[binrw]
#[brw(little)]
pub struct HobetaHeader {
    pub name: [u8; 8],
    pub file_type: u8,
    pub start: u16,
    pub length: u16,
    /// The payload length, a whole number of sectors. The high byte is the sector count.
    pub size: u16,
    pub crc: u16,
}

impl HobetaHeader {
    pub fn sector_count(&self) -> u8 {
        (self.size >> 8) as u8
    }
}

pub struct HobetaFormat;

impl HobetaFormat {
    pub(crate) fn capabilities() -> FormatCaps {
        FormatCaps::CAP_FILE_ARCHIVE
    }

    pub(crate) fn extensions() -> Vec<&'static str> {
        vec!["$b", "$c"]
    }

    pub(crate) fn detect<RWS: ReadSeek>(mut image: RWS) -> bool {
        let mut raw = [0u8; HOBETA_HEADER_SIZE];
        if image.seek(std::io::SeekFrom::Start(0)).is_err() || image.read_exact(&mut raw).is_err() {
            return false;
        }
        match HobetaHeader::read(&mut Cursor::new(&raw[..])) {
            Ok(header) => header.crc == hobeta_crc(&raw),
            Err(_) => false,
        }
    }

    pub(crate) fn can_write(_image: &DiskImage) -> ParserWriteCompatibility {
        ParserWriteCompatibility::UnsupportedFormat
    }

    pub(crate) fn load_image<RWS: ReadSeek>(mut read_buf: RWS, image: &mut DiskImage) -> Result<(), DiskImageError> {
        let data = read_image_bytes(&mut read_buf)?;

        if data.len() < HOBETA_HEADER_SIZE {
            return Err(DiskImageError::CorruptFile);
        }
        let header = HobetaHeader::read(&mut Cursor::new(&data)).map_err(|_| DiskImageError::CorruptFile)?;
        if data.len() < HOBETA_HEADER_SIZE + (header.size & 0xFF00) as usize {
            log::error!(
                "HobetaFormat::load_image(): Header claims {} sectors, file holds {} bytes",
                header.sector_count(),
                data.len()
            );
            return Err(DiskImageError::CorruptFile);
        }
        if header.crc != hobeta_crc(&data) {
            image.warn(DiskImageError::BadChecksum(DiskImageFileFormat::Hobeta));
        }

        if !image.present {
            image.format_trdos(HOBETA_CYLINDERS, HOBETA_HEADS, None)?;
        }
        image.read_only = true;

        let mut entry = DirectoryElement::from_bytes(&data[..DirectoryElement::SHORT_SIZE])?;
        entry.sector_count = header.sector_count();
        log::debug!("HobetaFormat::load_image(): {}", entry);

        let root = DiskCh::new(0, 0);
        let mut info = image.disk_info()?;
        let file_index = info.file_count as usize;
        if file_index >= MAX_FILES {
            image.warn(DiskImageError::DiskFull);
            return Ok(());
        }

        let heads = image.store.heads();
        let capacity = image.store.cylinders() * heads * TRDOS_SECTORS_PER_TRACK;
        let start = info.first_free_track as usize * TRDOS_SECTORS_PER_TRACK + info.first_free_sector as usize;
        let end = start + entry.sector_count as usize;
        if end > capacity {
            image.warn(DiskImageError::DiskFull);
            return Ok(());
        }

        for (k, position) in (start..end).enumerate() {
            let track = position / TRDOS_SECTORS_PER_TRACK;
            let ch = DiskCh::new((track / heads) as u16, (track % heads) as u8);
            let sector = (position % TRDOS_SECTORS_PER_TRACK) as u8 + 1;
            let offset = HOBETA_HEADER_SIZE + k * TRDOS_SECTOR_SIZE;
            let payload = &data[offset..std::cmp::min(offset + TRDOS_SECTOR_SIZE, data.len())];

            image.modify_sector(ch, sector, |buf| {
                let len = std::cmp::min(buf.len(), payload.len());
                buf[..len].copy_from_slice(&payload[..len]);
            })?;
        }

        entry.first_track = info.first_free_track;
        entry.first_sector = info.first_free_sector;
        let catalog_sector = (file_index * DirectoryElement::SIZE / TRDOS_SECTOR_SIZE + 1) as u8;
        let catalog_offset = (file_index * DirectoryElement::SIZE) % TRDOS_SECTOR_SIZE;
        let raw_entry = entry.to_bytes();
        image.modify_sector(root, catalog_sector, |buf| {
            buf[catalog_offset..catalog_offset + DirectoryElement::SIZE].copy_from_slice(&raw_entry);
        })?;

        info.file_count += 1;
        info.free_sectors = info.free_sectors.saturating_sub(entry.sector_count as u16);
        info.first_free_track = (end / TRDOS_SECTORS_PER_TRACK) as u8;
        info.first_free_sector = (end % TRDOS_SECTORS_PER_TRACK) as u8;

        let mut result = Ok(());
        image.modify_sector(root, DISK_INFO_SECTOR, |buf| {
            result = info.write_to(buf);
        })?;
        result
    }

    pub(crate) fn save_image<W: Write>(
        _image: &mut DiskImage,
        _opts: &ParserWriteOptions,
        _output: &mut W,
    ) -> Result<(), DiskImageError> {
        Err(DiskImageError::UnknownFormat)
    }
}
