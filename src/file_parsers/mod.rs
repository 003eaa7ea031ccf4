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

    src/file_parsers/mod.rs

    Container format dispatch. Each supported container has a parser type with a fixed set of
    associated functions; the ImageParser trait implemented on DiskImageFileFormat selects the
    right one.
*/
use crate::{
    io::{ReadSeek, Write},
    DiskImage,
    DiskImageError,
    DiskImageFileFormat,
};
use bitflags::bitflags;
use strum::IntoEnumIterator;

#[cfg(feature = "td0")]
pub mod compression;
pub mod fdd;
pub mod fdi;
pub mod hobeta;
pub mod scl;
#[cfg(feature = "td0")]
pub mod td0;
pub mod trd;
pub mod udi;

bitflags! {
    /// Bit flags representing the capabilities of a specific image format. Used to determine if a
    /// specific image format can represent a particular DiskImage.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[rustfmt::skip]
    pub struct FormatCaps: u32 {
        const CAP_VARIABLE_SPT      = 0b0000_0000_0000_0001; // Can support variable sector counts per track
        const CAP_VARIABLE_SSPT     = 0b0000_0000_0000_0010; // Can support variable sector sizes
        const CAP_ADDRESS_CRC       = 0b0000_0000_0000_0100; // Encodes sector address mark CRC status
        const CAP_DATA_CRC          = 0b0000_0000_0000_1000; // Encodes sector data CRC status
        const CAP_DATA_DELETED      = 0b0000_0000_0001_0000; // Encodes 'Deleted address' marks
        const CAP_SID_OVERRIDE      = 0b0000_0000_0010_0000; // Can specify the sector ID parameters (chs, size) independent of sector order
        const CAP_COMMENT           = 0b0000_0000_0100_0000; // Can store a text comment field
        const CAP_RAW_TRACK         = 0b0000_0000_1000_0000; // Stores the raw MFM track with its clock mask
        const CAP_FILE_ARCHIVE      = 0b0000_0001_0000_0000; // Stores TR-DOS files rather than disk sectors
        const CAP_NO_DAM            = 0b0100_0000_0000_0000; // Can store IDAM with no DAM
    }
}

/// Return a set of FormatCaps flags implicitly supported by a raw track format.
pub fn raw_track_flags() -> FormatCaps {
    FormatCaps::CAP_VARIABLE_SPT
        | FormatCaps::CAP_VARIABLE_SSPT
        | FormatCaps::CAP_ADDRESS_CRC
        | FormatCaps::CAP_DATA_CRC
        | FormatCaps::CAP_DATA_DELETED
        | FormatCaps::CAP_SID_OVERRIDE
        | FormatCaps::CAP_NO_DAM
        | FormatCaps::CAP_RAW_TRACK
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParserWriteCompatibility {
    Ok,
    DataLoss,
    Incompatible,
    UnsupportedFormat,
}

/// Options passed to a parser's writer.
#[derive(Clone, Debug, Default)]
pub struct ParserWriteOptions {
    /// Write the compressed variant of the format, where one exists (TD0 'advanced compression').
    pub compress: bool,
}

/// Return a list of image formats and their associated extensions that support the specified
/// FormatCaps.
pub fn formats_from_caps(caps: FormatCaps) -> Vec<(DiskImageFileFormat, Vec<String>)> {
    DiskImageFileFormat::iter()
        .filter(|format| caps.is_empty() || format.capabilities().contains(caps))
        .map(|format| {
            let extensions = format.extensions().iter().map(|ext| ext.to_string()).collect();
            (format, extensions)
        })
        .collect()
}

/// Return the subset of `formats` that can write `image`, possibly with data loss.
pub fn filter_writable(image: &DiskImage, formats: Vec<DiskImageFileFormat>) -> Vec<DiskImageFileFormat> {
    formats
        .into_iter()
        .filter(|format| {
            matches!(
                format.can_write(image),
                ParserWriteCompatibility::Ok | ParserWriteCompatibility::DataLoss
            )
        })
        .collect()
}

/// The order in which container signatures are tried. TRD has no signature and is matched by
/// size alone, so it goes last.
const DETECT_ORDER: [DiskImageFileFormat; 7] = [
    DiskImageFileFormat::TeleDisk,
    DiskImageFileFormat::Udi,
    DiskImageFileFormat::Fdi,
    DiskImageFileFormat::Fdd,
    DiskImageFileFormat::Scl,
    DiskImageFileFormat::Hobeta,
    DiskImageFileFormat::Trd,
];

/// Attempt to detect the container format of an image from its content. Returns None if no
/// parser recognizes it.
pub fn detect_image_format<T: ReadSeek>(image_io: &mut T) -> Option<DiskImageFileFormat> {
    DETECT_ORDER.iter().copied().find(|format| format.detect(&mut *image_io))
}

/// Write a fully built container to its destination.
pub(crate) fn write_output<W: Write>(output: &mut W, buffer: &[u8]) -> Result<(), DiskImageError> {
    output
        .write_all(buffer)
        .and_then(|_| output.flush())
        .map_err(|e| DiskImageError::WriteFailed(e.to_string()))
}

pub trait ImageParser {
    /// Return the capability flags for this format.
    fn capabilities(&self) -> FormatCaps;
    /// Detect and return true if the image is of a format that the parser can read.
    fn detect<RWS: ReadSeek>(&self, image_buf: RWS) -> bool;
    /// Return a list of file extensions associated with the parser.
    fn extensions(&self) -> Vec<&'static str>;
    /// Load a container into `image`. The parser sets geometry, tracks and the present flag.
    fn load_image<RWS: ReadSeek>(&self, read_buf: RWS, image: &mut DiskImage) -> Result<(), DiskImageError>;
    /// Determine if the parser can write an image back to its own format.
    fn can_write(&self, image: &DiskImage) -> ParserWriteCompatibility;
    /// Serialize `image`. Per-sector problems are reported as warnings on the image.
    fn save_image<W: Write>(
        &self,
        image: &mut DiskImage,
        opts: &ParserWriteOptions,
        output: &mut W,
    ) -> Result<(), DiskImageError>;
}

impl ImageParser for DiskImageFileFormat {
    fn capabilities(&self) -> FormatCaps {
        match self {
            DiskImageFileFormat::Trd => trd::TrdFormat::capabilities(),
            DiskImageFileFormat::Scl => scl::SclFormat::capabilities(),
            DiskImageFileFormat::Fdi => fdi::FdiFormat::capabilities(),
            DiskImageFileFormat::Udi => udi::UdiFormat::capabilities(),
            #[cfg(feature = "td0")]
            DiskImageFileFormat::TeleDisk => td0::Td0Format::capabilities(),
            #[cfg(not(feature = "td0"))]
            DiskImageFileFormat::TeleDisk => FormatCaps::empty(),
            DiskImageFileFormat::Fdd => fdd::FddFormat::capabilities(),
            DiskImageFileFormat::Hobeta => hobeta::HobetaFormat::capabilities(),
        }
    }

    fn detect<RWS: ReadSeek>(&self, image_buf: RWS) -> bool {
        match self {
            DiskImageFileFormat::Trd => trd::TrdFormat::detect(image_buf),
            DiskImageFileFormat::Scl => scl::SclFormat::detect(image_buf),
            DiskImageFileFormat::Fdi => fdi::FdiFormat::detect(image_buf),
            DiskImageFileFormat::Udi => udi::UdiFormat::detect(image_buf),
            #[cfg(feature = "td0")]
            DiskImageFileFormat::TeleDisk => td0::Td0Format::detect(image_buf),
            #[cfg(not(feature = "td0"))]
            DiskImageFileFormat::TeleDisk => false,
            DiskImageFileFormat::Fdd => fdd::FddFormat::detect(image_buf),
            DiskImageFileFormat::Hobeta => hobeta::HobetaFormat::detect(image_buf),
        }
    }

    fn extensions(&self) -> Vec<&'static str> {
        match self {
            DiskImageFileFormat::Trd => trd::TrdFormat::extensions(),
            DiskImageFileFormat::Scl => scl::SclFormat::extensions(),
            DiskImageFileFormat::Fdi => fdi::FdiFormat::extensions(),
            DiskImageFileFormat::Udi => udi::UdiFormat::extensions(),
            DiskImageFileFormat::TeleDisk => vec!["td0"],
            DiskImageFileFormat::Fdd => fdd::FddFormat::extensions(),
            DiskImageFileFormat::Hobeta => hobeta::HobetaFormat::extensions(),
        }
    }

    fn load_image<RWS: ReadSeek>(&self, read_buf: RWS, image: &mut DiskImage) -> Result<(), DiskImageError> {
        match self {
            DiskImageFileFormat::Trd => trd::TrdFormat::load_image(read_buf, image),
            DiskImageFileFormat::Scl => scl::SclFormat::load_image(read_buf, image),
            DiskImageFileFormat::Fdi => fdi::FdiFormat::load_image(read_buf, image),
            DiskImageFileFormat::Udi => udi::UdiFormat::load_image(read_buf, image),
            #[cfg(feature = "td0")]
            DiskImageFileFormat::TeleDisk => td0::Td0Format::load_image(read_buf, image),
            #[cfg(not(feature = "td0"))]
            DiskImageFileFormat::TeleDisk => Err(DiskImageError::UnknownFormat),
            DiskImageFileFormat::Fdd => fdd::FddFormat::load_image(read_buf, image),
            DiskImageFileFormat::Hobeta => hobeta::HobetaFormat::load_image(read_buf, image),
        }
    }

    fn can_write(&self, image: &DiskImage) -> ParserWriteCompatibility {
        match self {
            DiskImageFileFormat::Trd => trd::TrdFormat::can_write(image),
            DiskImageFileFormat::Scl => scl::SclFormat::can_write(image),
            DiskImageFileFormat::Fdi => fdi::FdiFormat::can_write(image),
            DiskImageFileFormat::Udi => udi::UdiFormat::can_write(image),
            #[cfg(feature = "td0")]
            DiskImageFileFormat::TeleDisk => td0::Td0Format::can_write(image),
            #[cfg(not(feature = "td0"))]
            DiskImageFileFormat::TeleDisk => ParserWriteCompatibility::UnsupportedFormat,
            DiskImageFileFormat::Fdd => fdd::FddFormat::can_write(image),
            DiskImageFileFormat::Hobeta => hobeta::HobetaFormat::can_write(image),
        }
    }

    fn save_image<W: Write>(
        &self,
        image: &mut DiskImage,
        opts: &ParserWriteOptions,
        output: &mut W,
    ) -> Result<(), DiskImageError> {
        match self {
            DiskImageFileFormat::Trd => trd::TrdFormat::save_image(image, opts, output),
            DiskImageFileFormat::Scl => scl::SclFormat::save_image(image, opts, output),
            DiskImageFileFormat::Fdi => fdi::FdiFormat::save_image(image, opts, output),
            DiskImageFileFormat::Udi => udi::UdiFormat::save_image(image, opts, output),
            #[cfg(feature = "td0")]
            DiskImageFileFormat::TeleDisk => td0::Td0Format::save_image(image, opts, output),
            #[cfg(not(feature = "td0"))]
            DiskImageFileFormat::TeleDisk => Err(DiskImageError::UnknownFormat),
            DiskImageFileFormat::Fdd => fdd::FddFormat::save_image(image, opts, output),
            DiskImageFileFormat::Hobeta => hobeta::HobetaFormat::save_image(image, opts, output),
        }
    }
}
