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

    src/file_parsers/scl.rs

    A parser for SCL archives. An SCL file holds a list of TR-DOS files rather than a disk:
    the 'SINCLAIR' signature, a file count, one 14-byte directory entry per file, the file
    payloads in whole sectors, and a 32-bit additive checksum of everything before it.

    Loading lays the files out contiguously on a fresh TR-DOS disk and builds its catalog.
*/
use crate::chs::DiskCh;
use crate::file_parsers::{write_output, FormatCaps, ParserWriteCompatibility, ParserWriteOptions};
use crate::io::{Cursor, ReadSeek, Write};
use crate::track_schema::builder::format_trdos_track;
use crate::trdos::{
    disk_type,
    disk_type_heads,
    sentinel_sector,
    DirectoryElement,
    DiskInfo,
    DEFAULT_LABEL,
    DISK_INFO_SECTOR,
    MAX_FILES,
    MISSING_SECTOR_MESSAGE,
    TRDOS_ID,
};
use crate::util::{le_u32, read_image_bytes, scl_checksum};
use crate::{
    DiskImage,
    DiskImageError,
    DiskImageFileFormat,
    MAXIMUM_CYLINDERS,
    TRDOS_SECTORS_PER_TRACK,
    TRDOS_SECTOR_SIZE,
    TRDOS_TRACK_SIZE,
};
use binrw::{binrw, BinRead};

pub const SCL_SIGNATURE: &[u8; 8] = b"SINCLAIR";
/// The smallest data area an SCL disk is given, in sectors: an 80 cylinder double sided disk.
pub const SCL_MINIMUM_SECTORS: usize = 2544;
pub const SCL_HEADS: usize = 2;

#[derive(Debug)]
#[binrw]
#[brw(little)]
pub struct SclHeader {
    pub signature: [u8; 8],
    pub file_count: u8,
}

pub const SCL_HEADER_SIZE: usize = 9;

/// The entry written for files whose catalog sector cannot be read.
fn placeholder_entry() -> DirectoryElement {
    DirectoryElement {
        name: *b"WRONGSEC",
        file_type: b'E',
        start: 0xEEEE,
        length: 0xEEEE,
        sector_count: 0,
        first_sector: 0,
        first_track: 0,
    }
}

/// The number of data sectors given to a disk holding `used` sectors of files.
/// The disk is kept a whole number of cylinders and is never smaller than 80 cylinders.
pub fn scl_disk_sectors(used: usize) -> usize {
    let cylinder_sectors = TRDOS_SECTORS_PER_TRACK * SCL_HEADS;
    let sectors = (TRDOS_SECTORS_PER_TRACK + used).div_ceil(cylinder_sectors) * cylinder_sectors - TRDOS_SECTORS_PER_TRACK;
    std::cmp::max(SCL_MINIMUM_SECTORS, sectors)
}

/// The TR-DOS logical track holding linear sector `position`. Catalog entries store it in one
/// byte, so larger layouts cannot be described.
fn logical_track(position: usize) -> Result<u8, DiskImageError> {
    u8::try_from(position / TRDOS_SECTORS_PER_TRACK).map_err(|_| {
        log::error!("SclFormat::load_image(): Sector {} is beyond logical track 255", position);
        DiskImageError::GeometryTooLarge
    })
}

pub struct SclFormat;

impl SclFormat {
    pub(crate) fn capabilities() -> FormatCaps {
        FormatCaps::CAP_FILE_ARCHIVE
    }

    pub(crate) fn extensions() -> Vec<&'static str> {
        vec!["scl"]
    }

    pub(crate) fn detect<RWS: ReadSeek>(mut image: RWS) -> bool {
        if image.seek(std::io::SeekFrom::Start(0)).is_err() {
            return false;
        }
        match SclHeader::read(&mut image) {
            Ok(header) => &header.signature == SCL_SIGNATURE,
            Err(_) => false,
        }
    }

    /// Read and validate the TR-DOS disk information block. Returns the block and the number
    /// of heads implied by its disk type.
    fn trdos_info(image: &DiskImage) -> Result<(DiskInfo, usize), DiskImageError> {
        let info = image.disk_info().map_err(|_| DiskImageError::IncompatibleImage)?;
        if !info.is_trdos() || info.file_count as usize > MAX_FILES {
            return Err(DiskImageError::IncompatibleImage);
        }
        let heads = disk_type_heads(info.disk_type).ok_or(DiskImageError::IncompatibleImage)?;
        Ok((info, heads))
    }

    /// An SCL can only be produced from a TR-DOS disk, and only keeps the cataloged files.
    pub(crate) fn can_write(image: &DiskImage) -> ParserWriteCompatibility {
        match Self::trdos_info(image) {
            Ok(_) => ParserWriteCompatibility::DataLoss,
            Err(_) => ParserWriteCompatibility::Incompatible,
        }
    }

    pub(crate) fn load_image<RWS: ReadSeek>(mut read_buf: RWS, image: &mut DiskImage) -> Result<(), DiskImageError> {
        let data = read_image_bytes(&mut read_buf)?;

        if data.len() < SCL_HEADER_SIZE + 4 {
            return Err(DiskImageError::CorruptFile);
        }
        let header = SclHeader::read(&mut Cursor::new(&data)).map_err(|_| DiskImageError::CorruptFile)?;
        if &header.signature != SCL_SIGNATURE {
            return Err(DiskImageError::UnknownFormat);
        }

        let file_count = header.file_count as usize;
        if file_count > MAX_FILES {
            log::error!("SclFormat::load_image(): {} files will not fit in a catalog", file_count);
            return Err(DiskImageError::CorruptFile);
        }

        let entries_end = SCL_HEADER_SIZE + file_count * DirectoryElement::SHORT_SIZE;
        if data.len() < entries_end + 4 {
            return Err(DiskImageError::CorruptFile);
        }

        let mut entries = data[SCL_HEADER_SIZE..entries_end]
            .chunks_exact(DirectoryElement::SHORT_SIZE)
            .map(DirectoryElement::from_bytes)
            .collect::<Result<Vec<_>, _>>()?;

        let used_sectors: usize = entries.iter().map(|e| e.sector_count as usize).sum();
        let payload_end = entries_end + used_sectors * TRDOS_SECTOR_SIZE;
        if data.len() < payload_end + 4 {
            log::error!(
                "SclFormat::load_image(): {} sectors of file data exceed the image size",
                used_sectors
            );
            return Err(DiskImageError::CorruptFile);
        }

        // The checksum follows the last file. Anything after it is transfer padding.
        let stored = le_u32(&data, payload_end).ok_or(DiskImageError::CorruptFile)?;
        let calculated = scl_checksum(&data[..payload_end]);
        if data.len() > payload_end + 4 {
            log::debug!(
                "SclFormat::load_image(): Ignoring {} trailing bytes",
                data.len() - payload_end - 4
            );
        }
        log::debug!(
            "SclFormat::load_image(): {} files, {} sectors, checksum {:08X} calculated {:08X}",
            file_count,
            used_sectors,
            stored,
            calculated
        );
        if stored != calculated {
            image.warn(DiskImageError::BadChecksum(DiskImageFileFormat::Scl));
        }

        let disk_sectors = scl_disk_sectors(used_sectors);
        let tracks = (disk_sectors + TRDOS_SECTORS_PER_TRACK) / TRDOS_SECTORS_PER_TRACK;
        let cylinders = tracks / SCL_HEADS;
        if cylinders > MAXIMUM_CYLINDERS {
            return Err(DiskImageError::GeometryTooLarge);
        }

        // Lay the disk out as a linear sector dump, then build tracks from it.
        let mut disk = vec![0u8; tracks * TRDOS_TRACK_SIZE];
        let mut position = TRDOS_SECTORS_PER_TRACK;
        let mut source = entries_end;

        for (i, entry) in entries.iter_mut().enumerate() {
            entry.first_track = logical_track(position)?;
            entry.first_sector = (position % TRDOS_SECTORS_PER_TRACK) as u8;

            let len = entry.sector_count as usize * TRDOS_SECTOR_SIZE;
            let dest = position * TRDOS_SECTOR_SIZE;
            disk[dest..dest + len].copy_from_slice(&data[source..source + len]);
            source += len;
            position += entry.sector_count as usize;

            let catalog_offset = i * DirectoryElement::SIZE;
            disk[catalog_offset..catalog_offset + DirectoryElement::SIZE].copy_from_slice(&entry.to_bytes());
            log::trace!("SclFormat::load_image(): {}", entry);
        }

        let info = DiskInfo {
            first_free_sector: (position % TRDOS_SECTORS_PER_TRACK) as u8,
            first_free_track: logical_track(position)?,
            disk_type: disk_type(cylinders, SCL_HEADS),
            file_count: file_count as u8,
            free_sectors: (disk_sectors - used_sectors) as u16,
            trdos_id: TRDOS_ID,
            deleted_count: entries.iter().filter(|e| e.is_deleted()).count() as u8,
            label: DEFAULT_LABEL,
            ..Default::default()
        };
        let info_offset = (DISK_INFO_SECTOR as usize - 1) * TRDOS_SECTOR_SIZE;
        info.write_to(&mut disk[info_offset..info_offset + TRDOS_SECTOR_SIZE])?;

        image.reset_geometry(cylinders, SCL_HEADS)?;
        for (i, payload) in disk.chunks_exact(TRDOS_TRACK_SIZE).enumerate() {
            let ch = DiskCh::from_index(i, SCL_HEADS);
            image.insert_track(ch, format_trdos_track(ch.c() as u8, Some(payload)))?;
        }
        Ok(())
    }

    pub(crate) fn save_image<W: Write>(
        image: &mut DiskImage,
        _opts: &ParserWriteOptions,
        output: &mut W,
    ) -> Result<(), DiskImageError> {
        let (info, heads) = Self::trdos_info(image)?;
        let root = DiskCh::new(0, 0);
        let file_count = info.file_count as usize;

        let mut buffer = Vec::new();
        buffer.extend_from_slice(SCL_SIGNATURE);
        buffer.push(info.file_count);

        let mut entries = Vec::with_capacity(file_count);
        for i in 0..file_count {
            let sector = (i * DirectoryElement::SIZE / TRDOS_SECTOR_SIZE + 1) as u8;
            let offset = (i * DirectoryElement::SIZE) % TRDOS_SECTOR_SIZE;

            let entry = match image.read_sector(root, sector) {
                Ok(result) if result.data.len() >= offset + DirectoryElement::SIZE => {
                    DirectoryElement::from_bytes(&result.data[offset..offset + DirectoryElement::SIZE])?
                }
                _ => {
                    image.warn(DiskImageError::SectorNotFound { ch: root, sector });
                    placeholder_entry()
                }
            };
            buffer.extend_from_slice(&entry.to_bytes()[..DirectoryElement::SHORT_SIZE]);
            entries.push(entry);
        }

        let sentinel = sentinel_sector(MISSING_SECTOR_MESSAGE);
        for entry in &entries {
            let start = entry.first_track as usize * TRDOS_SECTORS_PER_TRACK + entry.first_sector as usize;
            for position in start..start + entry.sector_count as usize {
                let track = position / TRDOS_SECTORS_PER_TRACK;
                let ch = DiskCh::new((track / heads) as u16, (track % heads) as u8);
                let sector = (position % TRDOS_SECTORS_PER_TRACK) as u8 + 1;

                match image.read_sector(ch, sector) {
                    Ok(result) => {
                        let mut block = [0u8; TRDOS_SECTOR_SIZE];
                        let len = std::cmp::min(result.data.len(), TRDOS_SECTOR_SIZE);
                        block[..len].copy_from_slice(&result.data[..len]);
                        buffer.extend_from_slice(&block);
                    }
                    Err(_) => {
                        image.warn(DiskImageError::SectorNotFound { ch, sector });
                        buffer.extend_from_slice(&sentinel);
                    }
                }
            }
        }

        let checksum = scl_checksum(&buffer);
        buffer.extend_from_slice(&checksum.to_le_bytes());
        log::debug!(
            "SclFormat::save_image(): {} files, {} bytes, checksum {:08X}",
            file_count,
            buffer.len(),
            checksum
        );
        write_output(output, &buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_sectors() {
        assert_eq!(scl_disk_sectors(0), 2544);
        assert_eq!(scl_disk_sectors(2544), 2544);
        assert_eq!(scl_disk_sectors(2545), 2544 + 32);
        assert_eq!(scl_disk_sectors(2576), 2576);
    }

    #[test]
    fn test_detect() {
        let mut data = SCL_SIGNATURE.to_vec();
        data.extend_from_slice(&[0, 0x55, 0x02, 0, 0]);
        assert!(SclFormat::detect(Cursor::new(&data)));
        data[0] = b'Z';
        assert!(!SclFormat::detect(Cursor::new(&data)));
    }
}
