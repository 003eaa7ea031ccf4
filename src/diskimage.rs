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

    src/diskimage.rs

    The DiskImage facade. A DiskImage owns every track of one open image, remembers where it
    came from and in which container, and dispatches loading and saving to the parsers.
*/
use crate::chs::DiskCh;
use crate::file_parsers::{detect_image_format, ImageParser, ParserWriteCompatibility, ParserWriteOptions};
use crate::io::{BufReader, ReadSeek, Write};
use crate::track::{Track, TrackStore};
use crate::track_schema::builder::{apply_sector_crc, format_trdos_track};
use crate::track_schema::scanner::{find_address_mark, find_sector, AddressMarkIter};
use crate::track_schema::{AddressMark, SectorId, SectorMark};
use crate::trdos::{
    disk_type,
    DirectoryElement,
    DiskInfo,
    CATALOG_SECTORS,
    DEFAULT_LABEL,
    DISK_INFO_SECTOR,
    TRDOS_ID,
};
use crate::{DiskImageError, DiskImageFileFormat, MAXIMUM_CYLINDERS, MAXIMUM_HEADS, TRDOS_SECTORS_PER_TRACK};
use std::path::{Path, PathBuf};

/// Receiver for errors and warnings raised while loading or saving an image.
pub trait ErrorSink {
    fn show_error(&mut self, error: &DiskImageError);
}

/// The default sink. Forwards warnings and errors to the `log` facade.
#[derive(Default)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn show_error(&mut self, error: &DiskImageError) {
        if error.is_warning() {
            log::warn!("{}", error);
        }
        else {
            log::error!("{}", error);
        }
    }
}

/// A sector read from an image, along with its status flags.
#[derive(Clone, Debug)]
pub struct ReadSectorResult {
    pub id: SectorId,
    pub deleted_mark: bool,
    pub crc_error: bool,
    pub data: Vec<u8>,
}

/// One ID field found while walking a track, and the data field belonging to it, if any.
#[derive(Copy, Clone, Debug)]
pub struct TrackSector {
    pub address: AddressMark,
    pub sector: Option<SectorMark>,
}

pub struct DiskImage {
    pub(crate) format: Option<DiskImageFileFormat>,
    pub(crate) max_cylinder: u8,
    pub(crate) max_head: u8,
    pub(crate) read_only: bool,
    pub(crate) dirty: bool,
    pub(crate) present: bool,
    pub(crate) source_path: Option<PathBuf>,
    pub(crate) store: TrackStore,
    sink: Box<dyn ErrorSink>,
    warnings: Vec<DiskImageError>,
}

impl Default for DiskImage {
    fn default() -> Self {
        Self {
            format: None,
            max_cylinder: 0,
            max_head: 0,
            read_only: true,
            dirty: false,
            present: false,
            source_path: None,
            store: TrackStore::default(),
            sink: Box::new(LogSink),
            warnings: Vec::new(),
        }
    }
}

impl DiskImage {
    pub fn new() -> Self {
        Default::default()
    }

    /// Replace the error sink. The default sink logs.
    pub fn set_error_sink(&mut self, sink: Box<dyn ErrorSink>) {
        self.sink = sink;
    }

    pub fn format(&self) -> Option<DiskImageFileFormat> {
        self.format
    }

    pub fn set_format(&mut self, format: Option<DiskImageFileFormat>) {
        self.format = format;
    }

    pub fn max_cylinder(&self) -> u8 {
        self.max_cylinder
    }

    pub fn max_head(&self) -> u8 {
        self.max_head
    }

    /// The number of cylinders of a present image, or 0.
    pub fn cylinders(&self) -> usize {
        if self.present {
            self.store.cylinders()
        }
        else {
            0
        }
    }

    /// The number of heads of a present image, or 0.
    pub fn heads(&self) -> usize {
        if self.present {
            self.store.heads()
        }
        else {
            0
        }
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Warnings raised by the last open, load, save or flush.
    pub fn warnings(&self) -> &[DiskImageError] {
        &self.warnings
    }

    /// Discard all tracks and return to the closed state.
    pub fn clear(&mut self) {
        self.store.clear();
        self.format = None;
        self.max_cylinder = 0;
        self.max_head = 0;
        self.read_only = true;
        self.dirty = false;
        self.present = false;
        self.source_path = None;
    }

    /// Report a non-fatal condition. It is passed to the error sink and kept in
    /// [`DiskImage::warnings`].
    pub(crate) fn warn(&mut self, warning: DiskImageError) {
        self.sink.show_error(&warning);
        self.warnings.push(warning);
    }

    fn fail<T>(&mut self, error: DiskImageError) -> Result<T, DiskImageError> {
        self.sink.show_error(&error);
        Err(error)
    }

    /// Allocate an empty track store of the given geometry.
    pub(crate) fn reset_geometry(&mut self, cylinders: usize, heads: usize) -> Result<(), DiskImageError> {
        if cylinders == 0 || heads == 0 {
            return Err(DiskImageError::ParameterError);
        }
        if cylinders > MAXIMUM_CYLINDERS || heads > MAXIMUM_HEADS {
            log::error!(
                "reset_geometry(): {} cylinders, {} heads exceeds the maximum geometry",
                cylinders,
                heads
            );
            return Err(DiskImageError::GeometryTooLarge);
        }
        self.store = TrackStore::new(cylinders, heads);
        self.max_cylinder = (cylinders - 1) as u8;
        self.max_head = (heads - 1) as u8;
        Ok(())
    }

    pub(crate) fn insert_track(&mut self, ch: DiskCh, track: Track) -> Result<(), DiskImageError> {
        self.store.insert(ch, track)
    }

    /// Flush the current image, then open the image at `path`. The format is chosen by the file
    /// extension, or by the file content when the extension is not recognized. Opening a Hobeta
    /// file while a Hobeta disk is loaded adds the file to that disk.
    pub fn open(&mut self, path: impl AsRef<Path>, read_only: bool) -> Result<(), DiskImageError> {
        let path = path.as_ref();

        if let Err(e) = self.flush() {
            log::error!("open(): Failed to flush previous image: {}", e);
        }
        self.warnings.clear();

        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(e) => {
                self.clear();
                return self.fail(DiskImageError::OpenFailed(format!("{}: {}", path.display(), e)));
            }
        };
        let mut reader = BufReader::new(file);

        let format = match DiskImageFileFormat::from_path(path) {
            Some(format) => format,
            None => match DiskImage::detect_format(&mut reader) {
                Ok(format) => {
                    log::debug!("open(): Unrecognized extension, detected {} by content", format);
                    format
                }
                Err(e) => {
                    self.clear();
                    return self.fail(e);
                }
            },
        };

        log::debug!("open(): Opening {} as {}", path.display(), format);
        self.load_from(reader, format, read_only)?;
        self.source_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Detect the container format of an image from its content.
    pub fn detect_format<RS: ReadSeek>(image_io: &mut RS) -> Result<DiskImageFileFormat, DiskImageError> {
        detect_image_format(image_io).ok_or(DiskImageError::UnknownFormat)
    }

    /// Load an image of a known format from any seekable reader. The image has no source path
    /// and so is never flushed.
    pub fn load<RS: ReadSeek>(
        &mut self,
        reader: RS,
        format: DiskImageFileFormat,
        read_only: bool,
    ) -> Result<(), DiskImageError> {
        self.warnings.clear();
        self.load_from(reader, format, read_only)
    }

    /// Load an image of a known format from a byte slice.
    pub fn open_buffer(
        &mut self,
        buffer: &[u8],
        format: DiskImageFileFormat,
        read_only: bool,
    ) -> Result<(), DiskImageError> {
        self.load(crate::io::Cursor::new(buffer), format, read_only)
    }

    fn load_from<RS: ReadSeek>(
        &mut self,
        reader: RS,
        format: DiskImageFileFormat,
        read_only: bool,
    ) -> Result<(), DiskImageError> {
        let append = format == DiskImageFileFormat::Hobeta
            && self.present
            && self.format == Some(DiskImageFileFormat::Hobeta);
        if !append {
            self.clear();
        }
        self.read_only = read_only;

        match format.load_image(reader, self) {
            Ok(()) => {
                self.format = Some(format);
                self.present = true;
                self.dirty = false;
                log::debug!(
                    "load(): Loaded {} image: {} cylinders, {} heads, {} warnings",
                    format,
                    self.store.cylinders(),
                    self.store.heads(),
                    self.warnings.len()
                );
                Ok(())
            }
            Err(e) => {
                self.clear();
                self.fail(e)
            }
        }
    }

    /// Write a modified image back to its source file, in its source format. Does nothing for
    /// read-only, unmodified or Hobeta images, or images without a source path.
    pub fn flush(&mut self) -> Result<(), DiskImageError> {
        if !self.present || !self.dirty || self.read_only {
            return Ok(());
        }
        let format = match self.format {
            Some(DiskImageFileFormat::Hobeta) | None => return Ok(()),
            Some(format) => format,
        };
        let path = match &self.source_path {
            Some(path) => path.clone(),
            None => {
                log::debug!("flush(): Image has no source path, not flushing");
                return Ok(());
            }
        };

        let mut buffer = Vec::new();
        self.save(format, &ParserWriteOptions::default(), &mut buffer)?;

        if let Err(e) = std::fs::write(&path, &buffer) {
            return self.fail(DiskImageError::WriteFailed(format!("{}: {}", path.display(), e)));
        }
        log::debug!("flush(): Wrote {} bytes to {}", buffer.len(), path.display());
        self.dirty = false;
        Ok(())
    }

    /// Serialize the image in `format` to `writer`.
    /// Formats that cannot be written return [`DiskImageError::UnknownFormat`]; formats that
    /// cannot represent this image return [`DiskImageError::IncompatibleImage`].
    pub fn save<W: Write>(
        &mut self,
        format: DiskImageFileFormat,
        opts: &ParserWriteOptions,
        writer: &mut W,
    ) -> Result<(), DiskImageError> {
        self.warnings.clear();

        if !self.present {
            return self.fail(DiskImageError::NotPresent);
        }
        match format.can_write(self) {
            ParserWriteCompatibility::UnsupportedFormat => {
                return self.fail(DiskImageError::UnknownFormat);
            }
            ParserWriteCompatibility::Incompatible => {
                return self.fail(DiskImageError::IncompatibleImage);
            }
            ParserWriteCompatibility::DataLoss => {
                log::warn!("save(): Writing {} may not preserve all data on this image", format);
            }
            ParserWriteCompatibility::Ok => {}
        }

        match format.save_image(self, opts, writer) {
            Ok(()) => Ok(()),
            Err(e) => self.fail(e),
        }
    }

    /// Write the image as a TRD sector dump.
    pub fn write_trd<W: Write>(&mut self, writer: &mut W) -> Result<(), DiskImageError> {
        self.save(DiskImageFileFormat::Trd, &ParserWriteOptions::default(), writer)
    }

    /// Return the track at `ch`, if the image is present and the track exists.
    pub fn find_track(&self, ch: DiskCh) -> Option<&Track> {
        if !self.present {
            return None;
        }
        self.store.get(ch)
    }

    /// Return the track at `ch` for modification. The image is flagged dirty.
    pub fn track_mut(&mut self, ch: DiskCh) -> Option<&mut Track> {
        if !self.present {
            return None;
        }
        let track = self.store.get_mut(ch)?;
        self.dirty = true;
        Some(track)
    }

    pub fn find_address_mark(&self, ch: DiskCh, from: usize) -> Option<AddressMark> {
        find_address_mark(self.find_track(ch)?, from)
    }

    pub fn find_sector(&self, ch: DiskCh, sector: u8, from: usize) -> Option<SectorMark> {
        find_sector(self.find_track(ch)?, sector, from)
    }

    /// Recalculate the data CRC of `sector` on track `ch`.
    pub fn apply_sector_crc(&mut self, ch: DiskCh, sector: &SectorMark) -> Result<(), DiskImageError> {
        let track = self.track_mut(ch).ok_or(DiskImageError::AddressMarkNotFound(ch))?;
        apply_sector_crc(track, sector);
        Ok(())
    }

    /// Walk every ID field of track `ch` once, pairing each with its data field.
    pub fn track_sectors(&self, ch: DiskCh) -> Vec<TrackSector> {
        let track = match self.find_track(ch) {
            Some(track) => track,
            None => return Vec::new(),
        };
        AddressMarkIter::new(track)
            .map(|address| TrackSector {
                address,
                sector: find_sector(track, address.id.s, address.sync_offset),
            })
            .collect()
    }

    pub fn read_sector(&self, ch: DiskCh, sector: u8) -> Result<ReadSectorResult, DiskImageError> {
        if !self.present {
            return Err(DiskImageError::NotPresent);
        }
        let track = self.store.get(ch).ok_or(DiskImageError::AddressMarkNotFound(ch))?;
        let mark = find_sector(track, sector, 0).ok_or(DiskImageError::SectorNotFound { ch, sector })?;

        Ok(ReadSectorResult {
            id: mark.address.id,
            deleted_mark: mark.is_deleted(),
            crc_error: !mark.is_ok(),
            data: track.read_wrapped(mark.data_offset, mark.length),
        })
    }

    /// Overwrite the start of sector `sector` on track `ch` with `data` and correct its CRC.
    /// Bytes beyond the sector length are ignored.
    pub fn write_sector(&mut self, ch: DiskCh, sector: u8, data: &[u8]) -> Result<(), DiskImageError> {
        if !self.present {
            return Err(DiskImageError::NotPresent);
        }
        if self.read_only {
            return Err(DiskImageError::WriteFailed("image is read-only".to_string()));
        }
        self.modify_sector(ch, sector, |buf| {
            let len = std::cmp::min(buf.len(), data.len());
            buf[..len].copy_from_slice(&data[..len]);
        })
    }

    /// Apply `f` to the payload of a sector in place, then correct the sector's CRC.
    pub(crate) fn modify_sector<F>(&mut self, ch: DiskCh, sector: u8, f: F) -> Result<(), DiskImageError>
    where
        F: FnOnce(&mut [u8]),
    {
        let track = self.store.get_mut(ch).ok_or(DiskImageError::AddressMarkNotFound(ch))?;
        let mark = find_sector(track, sector, 0).ok_or(DiskImageError::SectorNotFound { ch, sector })?;

        let mut buf = track.read_wrapped(mark.data_offset, mark.length);
        f(&mut buf);
        track.write_wrapped(mark.data_offset, &buf);
        apply_sector_crc(track, &mark);
        self.dirty = true;
        Ok(())
    }

    /// Replace the image with a blank TR-DOS disk and write an empty catalog to track 0.
    /// An image without a container format becomes a TRD image, so that it can be flushed.
    pub fn format_trdos(
        &mut self,
        cylinders: usize,
        heads: usize,
        label: Option<&[u8; 8]>,
    ) -> Result<(), DiskImageError> {
        self.reset_geometry(cylinders, heads)?;

        for c in 0..cylinders {
            for h in 0..heads {
                let ch = DiskCh::new(c as u16, h as u8);
                self.store.insert(ch, format_trdos_track(c as u8, None))?;
            }
        }

        let info = DiskInfo {
            first_free_sector: 0,
            first_free_track: 1,
            disk_type: disk_type(cylinders, heads),
            file_count: 0,
            free_sectors: (cylinders * heads * TRDOS_SECTORS_PER_TRACK - TRDOS_SECTORS_PER_TRACK) as u16,
            trdos_id: TRDOS_ID,
            label: *label.unwrap_or(&DEFAULT_LABEL),
            ..Default::default()
        };

        let mut result = Ok(());
        self.modify_sector(DiskCh::new(0, 0), DISK_INFO_SECTOR, |sector| {
            result = info.write_to(sector);
        })?;
        result?;

        if self.format.is_none() {
            self.format = Some(DiskImageFileFormat::Trd);
        }
        self.present = true;
        log::debug!(
            "format_trdos(): Formatted {} cylinders, {} heads, disk type {:02X}",
            cylinders,
            heads,
            info.disk_type
        );
        Ok(())
    }

    /// Read the TR-DOS disk information block from sector 9 of track 0.
    pub fn disk_info(&self) -> Result<DiskInfo, DiskImageError> {
        let sector = self.read_sector(DiskCh::new(0, 0), DISK_INFO_SECTOR)?;
        DiskInfo::from_sector(&sector.data)
    }

    /// Read the TR-DOS catalog, deleted entries included, up to the first end marker.
    pub fn catalog(&self) -> Result<Vec<DirectoryElement>, DiskImageError> {
        let mut entries = Vec::new();

        for s in 1..=CATALOG_SECTORS as u8 {
            let sector = self.read_sector(DiskCh::new(0, 0), s)?;
            for raw in sector.data.chunks_exact(DirectoryElement::SIZE) {
                let entry = DirectoryElement::from_bytes(raw)?;
                if entry.is_end() {
                    return Ok(entries);
                }
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

/// Open `path` read-only and write it to `writer` as a TRD image.
pub fn convert_to_trd<W: Write>(path: impl AsRef<Path>, writer: &mut W) -> Result<(), DiskImageError> {
    let mut image = DiskImage::default();
    image.open(path, true)?;
    image.write_trd(writer)
}

/// Returns true for the containers that are routinely converted to TRD before use.
pub fn trd_conversion_supported(path: impl AsRef<Path>) -> bool {
    matches!(
        DiskImageFileFormat::from_path(path),
        Some(DiskImageFileFormat::Scl | DiskImageFileFormat::Fdi | DiskImageFileFormat::Udi)
    )
}
