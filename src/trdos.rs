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

    src/trdos.rs

    TR-DOS catalog structures. The catalog occupies sectors 1-8 of track 0 with sixteen 16-byte
    directory entries per sector. Sector 9 holds the disk information block starting at 0xE1.
*/
use crate::io::Cursor;
use crate::DiskImageError;
use binrw::{binrw, BinRead, BinWrite};
use std::fmt::{self, Display, Formatter};

/// Sector number of the disk information sector on track 0.
pub const DISK_INFO_SECTOR: u8 = 9;
/// Number of catalog sectors.
pub const CATALOG_SECTORS: usize = 8;
/// The largest number of files a catalog can hold.
pub const MAX_FILES: usize = 128;
/// Value of the TR-DOS id byte (0xE7) on a formatted disk.
pub const TRDOS_ID: u8 = 0x10;
/// First name byte of a deleted file.
pub const DELETED_FILE: u8 = 0x01;

pub const DISK_TYPE_80_DS: u8 = 0x16;
pub const DISK_TYPE_40_DS: u8 = 0x17;
pub const DISK_TYPE_80_SS: u8 = 0x18;
pub const DISK_TYPE_40_SS: u8 = 0x19;

/// Label written to the disk information sector of a freshly formatted disk.
pub const DEFAULT_LABEL: [u8; 8] = *b"ZXFLOPPY";

/// Payload written in place of a sector that could not be read.
pub const MISSING_SECTOR_MESSAGE: &[u8] = b"ERROR: THIS SECTOR NOT FOUND OR IN NON TR-DOS FORMAT!";

/// A 256 byte block of `*` carrying `message` and a terminating NUL at its start.
pub fn sentinel_sector(message: &[u8]) -> [u8; 256] {
    let mut block = [b'*'; 256];
    let len = std::cmp::min(message.len(), 255);
    block[..len].copy_from_slice(&message[..len]);
    block[len] = 0;
    block
}

/// Return the disk type byte for a geometry.
pub fn disk_type(cylinders: usize, heads: usize) -> u8 {
    match (cylinders <= 40, heads < 2) {
        (false, false) => DISK_TYPE_80_DS,
        (true, false) => DISK_TYPE_40_DS,
        (false, true) => DISK_TYPE_80_SS,
        (true, true) => DISK_TYPE_40_SS,
    }
}

/// Return the number of heads implied by a disk type byte, or None if the byte is not a
/// TR-DOS disk type.
pub fn disk_type_heads(disk_type: u8) -> Option<usize> {
    match disk_type {
        DISK_TYPE_80_DS | DISK_TYPE_40_DS => Some(2),
        DISK_TYPE_80_SS | DISK_TYPE_40_SS => Some(1),
        _ => None,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[binrw]
#[brw(little)]
pub struct DirectoryElement {
    pub name: [u8; 8],
    pub file_type: u8,
    pub start: u16,
    pub length: u16,
    pub sector_count: u8,
    pub first_sector: u8,
    pub first_track: u8,
}

impl DirectoryElement {
    pub const SIZE: usize = 16;
    /// SCL archives and Hobeta headers store entries without the position fields.
    pub const SHORT_SIZE: usize = 14;

    /// Parse an entry from at least 14 bytes. Position fields absent from a short entry are zero.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DiskImageError> {
        if bytes.len() < Self::SHORT_SIZE {
            return Err(DiskImageError::CorruptFile);
        }
        let mut raw = [0u8; Self::SIZE];
        let len = std::cmp::min(bytes.len(), Self::SIZE);
        raw[..len].copy_from_slice(&bytes[..len]);
        DirectoryElement::read(&mut Cursor::new(&raw[..])).map_err(|_| DiskImageError::CorruptFile)
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        let mut cursor = Cursor::new(Vec::with_capacity(Self::SIZE));
        let mut raw = [0u8; Self::SIZE];
        if self.write(&mut cursor).is_ok() {
            raw.copy_from_slice(&cursor.get_ref()[..Self::SIZE]);
        }
        raw
    }

    pub fn is_deleted(&self) -> bool {
        self.name[0] == DELETED_FILE
    }

    /// An entry starting with 0 terminates the catalog.
    pub fn is_end(&self) -> bool {
        self.name[0] == 0
    }

    pub fn name_lossy(&self) -> String {
        self.name.iter().map(|b| if b.is_ascii_graphic() || *b == b' ' { *b as char } else { '?' }).collect()
    }
}

impl Display for DirectoryElement {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{}.{} start: {:5} length: {:5} sectors: {:3} at {}/{}",
            self.name_lossy(),
            self.file_type as char,
            self.start,
            self.length,
            self.sector_count,
            self.first_track,
            self.first_sector
        )
    }
}

/// The disk information block in sector 9 of track 0, offsets 0xE1..=0xFF.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[binrw]
#[brw(little)]
pub struct DiskInfo {
    pub first_free_sector: u8,
    /// Logical track (cylinder * 2 + head) of the first free sector.
    pub first_free_track: u8,
    pub disk_type: u8,
    pub file_count: u8,
    pub free_sectors: u16,
    pub trdos_id: u8,
    pub reserved0: [u8; 12],
    pub deleted_count: u8,
    pub label: [u8; 8],
    pub reserved1: [u8; 3],
}

impl DiskInfo {
    pub const OFFSET: usize = 0xE1;
    pub const SIZE: usize = 0x100 - Self::OFFSET;

    pub fn from_sector(sector: &[u8]) -> Result<Self, DiskImageError> {
        let block = sector
            .get(Self::OFFSET..Self::OFFSET + Self::SIZE)
            .ok_or(DiskImageError::CorruptFile)?;
        DiskInfo::read(&mut Cursor::new(block)).map_err(|_| DiskImageError::CorruptFile)
    }

    /// Store the block into a 256 byte sector buffer.
    pub fn write_to(&self, sector: &mut [u8]) -> Result<(), DiskImageError> {
        if sector.len() < Self::OFFSET + Self::SIZE {
            return Err(DiskImageError::ParameterError);
        }
        let mut cursor = Cursor::new(Vec::with_capacity(Self::SIZE));
        self.write(&mut cursor).map_err(|_| DiskImageError::ParameterError)?;
        sector[Self::OFFSET..Self::OFFSET + Self::SIZE].copy_from_slice(cursor.get_ref());
        Ok(())
    }

    pub fn is_trdos(&self) -> bool {
        self.trdos_id == TRDOS_ID
    }
}
