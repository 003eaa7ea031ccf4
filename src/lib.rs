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
*/


//! # zxfloppy
//!
//! A library for reading, writing and emulating ZX Spectrum floppy disk images.
//!
//! Every image is held as a set of raw MFM tracks, each track being a byte buffer with a parallel
//! clock mask that flags the 0xA1 sync bytes of address marks. A WD1793-style scanner locates
//! address marks and sectors on those tracks, and a track synthesizer builds correctly gapped
//! tracks from sector lists. Container formats (TRD, SCL, FDI, UDI, TD0, FDD and Hobeta) are
//! translated to and from this physical model by the parsers in [`file_parsers`].
//!
//! The main entry point is [`DiskImage`].

pub mod chs;
pub mod diskimage;
pub mod file_parsers;
pub mod image_builder;
pub mod io;
pub mod track;
pub mod track_schema;
pub mod trdos;
pub mod util;

use std::fmt::{self, Display, Formatter};
use std::path::Path;
use strum::{EnumIter, IntoEnumIterator};
use thiserror::Error;

/// The canonical length in bytes of one MFM revolution at 250kbps / 300RPM.
pub const DEFAULT_TRACK_SIZE: usize = 6250;
/// The number of sectors on a TR-DOS track.
pub const TRDOS_SECTORS_PER_TRACK: usize = 16;
/// The size of a TR-DOS sector.
pub const TRDOS_SECTOR_SIZE: usize = 256;
/// The size of one TR-DOS track worth of sector data.
pub const TRDOS_TRACK_SIZE: usize = TRDOS_SECTORS_PER_TRACK * TRDOS_SECTOR_SIZE;
/// The largest cylinder count any container may describe.
pub const MAXIMUM_CYLINDERS: usize = 256;
/// The largest head count any container may describe.
pub const MAXIMUM_HEADS: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DiskImageError {
    #[error("Can't open the disk image: {0}")]
    OpenFailed(String),
    #[error("Not enough memory to load the disk image")]
    NoMemory,
    #[error("Unknown disk image format")]
    UnknownFormat,
    #[error("The disk image is corrupt")]
    CorruptFile,
    #[error("Unsupported disk image version")]
    UnsupportedVersion,
    #[error("Bad {0} file checksum")]
    BadChecksum(DiskImageFileFormat),
    #[error("The disk image geometry is too large")]
    GeometryTooLarge,
    #[error("Track {0} can't be formatted: sector data exceeds the track length")]
    ImpossibleFormat(DiskCh),
    #[error("Sector {sector} not found on track {ch}")]
    SectorNotFound { ch: DiskCh, sector: u8 },
    #[error("No address marks found on track {0}")]
    AddressMarkNotFound(DiskCh),
    #[error("Sector {sector} on track {ch} has a bad CRC")]
    CrcError { ch: DiskCh, sector: u8 },
    #[error("The disk image is not in TR-DOS format")]
    IncompatibleImage,
    #[error("No free space left in the TR-DOS catalog")]
    DiskFull,
    #[error("No disk image is loaded")]
    NotPresent,
    #[error("Invalid parameters were specified to a library function")]
    ParameterError,
    #[error("Writing the disk image failed: {0}")]
    WriteFailed(String),
}

impl DiskImageError {
    /// Returns true for conditions that are reported but do not abort the current operation.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            DiskImageError::BadChecksum(_)
                | DiskImageError::SectorNotFound { .. }
                | DiskImageError::AddressMarkNotFound(_)
                | DiskImageError::CrcError { .. }
                | DiskImageError::DiskFull
        )
    }
}

/// The container formats understood by the library.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter)]
pub enum DiskImageFileFormat {
    /// Raw TR-DOS sector dump.
    Trd,
    /// Sinclair file archive.
    Scl,
    /// 'Full Disk Image' as used by UKV Spectrum Debugger.
    Fdi,
    /// Ultra Disk Image, raw MFM tracks.
    Udi,
    /// Sydex Teledisk.
    TeleDisk,
    /// SPM disk image.
    Fdd,
    /// Single Hobeta file injected onto a blank disk.
    Hobeta,
}

impl Display for DiskImageFileFormat {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let str = match self {
            DiskImageFileFormat::Trd => "TRD",
            DiskImageFileFormat::Scl => "SCL",
            DiskImageFileFormat::Fdi => "FDI",
            DiskImageFileFormat::Udi => "UDI",
            DiskImageFileFormat::TeleDisk => "TD0",
            DiskImageFileFormat::Fdd => "FDD",
            DiskImageFileFormat::Hobeta => "Hobeta",
        };
        write!(f, "{}", str)
    }
}

impl DiskImageFileFormat {
    /// Determine the image format from a file name. Matching is case-insensitive.
    /// Hobeta files carry a two character extension starting with `$` or `!`, such as `game.$b`.
    pub fn from_path(path: impl AsRef<Path>) -> Option<DiskImageFileFormat> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();

        if ext.len() == 2 && (ext.starts_with('$') || ext.starts_with('!')) {
            return Some(DiskImageFileFormat::Hobeta);
        }
        DiskImageFileFormat::iter()
            .filter(|format| *format != DiskImageFileFormat::Hobeta)
            .find(|format| file_parsers::ImageParser::extensions(format).contains(&ext.as_str()))
    }
}

/// Return a list of the file extensions the library can open. Hobeta is listed by its two
/// most common forms.
pub fn supported_extensions() -> Vec<&'static str> {
    DiskImageFileFormat::iter()
        .flat_map(|format| file_parsers::ImageParser::extensions(&format))
        .collect()
}

pub use crate::chs::DiskCh;
pub use crate::diskimage::{convert_to_trd, trd_conversion_supported, DiskImage, ErrorSink, LogSink};
pub use crate::file_parsers::{detect_image_format, ImageParser, ParserWriteCompatibility, ParserWriteOptions};
pub use crate::image_builder::ImageBuilder;
pub use crate::track::{Track, TrackStore};
pub use crate::track_schema::{AddressMark, SectorId, SectorMark};

pub mod prelude {
    pub use crate::chs::DiskCh;
    pub use crate::diskimage::{DiskImage, ErrorSink, LogSink};
    pub use crate::file_parsers::{ImageParser, ParserWriteCompatibility, ParserWriteOptions};
    pub use crate::image_builder::ImageBuilder;
    pub use crate::track_schema::{AddressMark, SectorId, SectorMark};
    pub use crate::{DiskImageError, DiskImageFileFormat};
}
