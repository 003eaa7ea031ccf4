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

    src/track_schema/mod.rs

    The WD1793 / IBM System 34 MFM track layout as seen by a TR-DOS controller.
    An address mark is a run of 0xA1 sync bytes with missing clock, an 0xFE marker, the four
    CHRN bytes and a big-endian CRC. A data field is another sync run, a marker in 0xF8..=0xFB,
    the sector payload and its CRC. Both CRCs cover everything from the first sync byte.
*/

//! Track layout constants and the transient views the scanner returns.

pub mod builder;
pub mod scanner;

use std::fmt::{Display, Formatter};

pub use builder::{apply_sector_crc, format_trdos_track, format_variable, GapLayout, SectorDescriptor, TrackBuilder};
pub use scanner::{find_address_mark, find_sector, AddressMarkIter};

pub const GAP_BYTE: u8 = 0x4E;
pub const SYNC_BYTE: u8 = 0x00;
pub const A1_SYNC: u8 = 0xA1;

/// ID address mark.
pub const IDAM: u8 = 0xFE;
/// Normal data address mark.
pub const DAM: u8 = 0xFB;
/// Deleted data address mark.
pub const DDAM: u8 = 0xF8;

/// Length of the CHRN field plus its CRC.
pub const ID_FIELD_LEN: usize = 6;

/// The CHRN identifier of a sector as recorded in its address mark.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SectorId {
    pub c: u8,
    pub h: u8,
    pub s: u8,
    pub n: u8,
}

impl SectorId {
    pub fn new(c: u8, h: u8, s: u8, n: u8) -> Self {
        Self { c, h, s, n }
    }

    /// The sector size in bytes. The WD1793 only decodes the low two bits of the length code,
    /// giving 128, 256, 512 or 1024 bytes.
    pub fn size(&self) -> usize {
        128usize << (self.n & 0x03)
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        [self.c, self.h, self.s, self.n]
    }
}

impl From<[u8; 4]> for SectorId {
    fn from(bytes: [u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

impl Display for SectorId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[C: {} H: {} S: {} N: {}]", self.c, self.h, self.s, self.n)
    }
}

/// An ID address mark located on a track. Offsets are positions within the track buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AddressMark {
    /// Offset of the first 0xA1 sync byte.
    pub sync_offset: usize,
    /// Offset of the CHRN field.
    pub id_offset: usize,
    /// Offset of the first byte after the ID CRC.
    pub end_offset: usize,
    pub id: SectorId,
    pub crc_ok: bool,
}

/// A sector located on a track: its address mark plus the data field that follows it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SectorMark {
    pub address: AddressMark,
    /// The data address mark byte, one of 0xF8..=0xFB.
    pub data_marker: u8,
    /// Offset of the first 0xA1 sync byte of the data field.
    pub sync_offset: usize,
    /// Offset of the first payload byte.
    pub data_offset: usize,
    /// Offset of the first data CRC byte.
    pub end_offset: usize,
    pub length: usize,
    pub crc_ok: bool,
}

impl SectorMark {
    pub fn is_deleted(&self) -> bool {
        self.data_marker == DDAM
    }

    /// Both the ID field and the data field CRCs are valid.
    pub fn is_ok(&self) -> bool {
        self.address.crc_ok && self.crc_ok
    }
}
