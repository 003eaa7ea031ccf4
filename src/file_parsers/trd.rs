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

    src/file_parsers/trd.rs

    A parser for TRD images, a plain dump of every 256 byte sector of a double sided TR-DOS
    disk, in cylinder, head, sector order.
*/
use crate::chs::DiskCh;
use crate::file_parsers::{write_output, FormatCaps, ParserWriteCompatibility, ParserWriteOptions};
use crate::io::{ReadSeek, Write};
use crate::track_schema::builder::format_trdos_track;
use crate::trdos::{sentinel_sector, MISSING_SECTOR_MESSAGE};
use crate::util::{get_length, read_image_bytes};
use crate::{
    DiskImage,
    DiskImageError,
    MAXIMUM_CYLINDERS,
    TRDOS_SECTORS_PER_TRACK,
    TRDOS_SECTOR_SIZE,
    TRDOS_TRACK_SIZE,
};

/// TRD images always describe two heads.
pub const TRD_HEADS: usize = 2;
pub const TRD_CYLINDER_SIZE: usize = TRDOS_TRACK_SIZE * TRD_HEADS;

pub struct TrdFormat;

impl TrdFormat {
    pub(crate) fn capabilities() -> FormatCaps {
        FormatCaps::empty()
    }

    pub(crate) fn extensions() -> Vec<&'static str> {
        vec!["trd"]
    }

    pub(crate) fn detect<RWS: ReadSeek>(mut image: RWS) -> bool {
        match get_length(&mut image) {
            Ok(len) => len > 0 && len % TRD_CYLINDER_SIZE as u64 == 0,
            Err(_) => false,
        }
    }

    /// A TRD only holds disks of sixteen good 256 byte sectors per track.
    pub(crate) fn can_write(image: &DiskImage) -> ParserWriteCompatibility {
        for (ch, _) in image.store.iter() {
            let sectors = image.track_sectors(ch);
            let standard = sectors.len() == TRDOS_SECTORS_PER_TRACK
                && sectors.iter().all(|entry| {
                    entry.sector.map_or(false, |s| {
                        s.is_ok() && !s.is_deleted() && s.length == TRDOS_SECTOR_SIZE && (1..=16).contains(&s.address.id.s)
                    })
                });
            if !standard {
                return ParserWriteCompatibility::DataLoss;
            }
        }
        ParserWriteCompatibility::Ok
    }

    pub(crate) fn load_image<RWS: ReadSeek>(mut read_buf: RWS, image: &mut DiskImage) -> Result<(), DiskImageError> {
        let data = read_image_bytes(&mut read_buf)?;

        if data.is_empty() {
            return Err(DiskImageError::CorruptFile);
        }
        if data.len() % TRD_CYLINDER_SIZE != 0 {
            log::debug!(
                "TrdFormat::load_image(): Image size {} is not a multiple of {}",
                data.len(),
                TRD_CYLINDER_SIZE
            );
            return Err(DiskImageError::UnknownFormat);
        }

        let cylinders = data.len() / TRD_CYLINDER_SIZE;
        if cylinders > MAXIMUM_CYLINDERS {
            return Err(DiskImageError::GeometryTooLarge);
        }
        log::debug!("TrdFormat::load_image(): {} cylinders", cylinders);

        image.reset_geometry(cylinders, TRD_HEADS)?;
        for (i, payload) in data.chunks_exact(TRDOS_TRACK_SIZE).enumerate() {
            let ch = DiskCh::from_index(i, TRD_HEADS);
            image.insert_track(ch, format_trdos_track(ch.c() as u8, Some(payload)))?;
        }
        Ok(())
    }

    pub(crate) fn save_image<W: Write>(
        image: &mut DiskImage,
        _opts: &ParserWriteOptions,
        output: &mut W,
    ) -> Result<(), DiskImageError> {
        let cylinders = image.cylinders();
        let heads = image.heads();
        let sentinel = sentinel_sector(MISSING_SECTOR_MESSAGE);
        let mut buffer = Vec::with_capacity(cylinders * heads * TRDOS_TRACK_SIZE);

        for c in 0..cylinders {
            for h in 0..heads {
                let ch = DiskCh::new(c as u16, h as u8);
                for s in 1..=TRDOS_SECTORS_PER_TRACK as u8 {
                    match image.read_sector(ch, s) {
                        Ok(sector) => {
                            if sector.crc_error {
                                image.warn(DiskImageError::CrcError { ch, sector: s });
                            }
                            if sector.data.len() != TRDOS_SECTOR_SIZE {
                                log::warn!(
                                    "TrdFormat::save_image(): Sector {} on track {} is {} bytes long",
                                    s,
                                    ch,
                                    sector.data.len()
                                );
                            }
                            let mut block = [0u8; TRDOS_SECTOR_SIZE];
                            let len = std::cmp::min(sector.data.len(), TRDOS_SECTOR_SIZE);
                            block[..len].copy_from_slice(&sector.data[..len]);
                            buffer.extend_from_slice(&block);
                        }
                        Err(e) if e.is_warning() => {
                            image.warn(DiskImageError::SectorNotFound { ch, sector: s });
                            buffer.extend_from_slice(&sentinel);
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        log::debug!("TrdFormat::save_image(): Writing {} bytes", buffer.len());
        write_output(output, &buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Cursor;

    #[test]
    fn test_detect() {
        assert!(TrdFormat::detect(Cursor::new(vec![0u8; TRD_CYLINDER_SIZE * 80])));
        assert!(!TrdFormat::detect(Cursor::new(vec![0u8; TRD_CYLINDER_SIZE + 1])));
        assert!(!TrdFormat::detect(Cursor::new(Vec::<u8>::new())));
    }

    #[test]
    fn test_load_errors() {
        let mut image = DiskImage::default();
        assert_eq!(
            TrdFormat::load_image(Cursor::new(Vec::<u8>::new()), &mut image),
            Err(DiskImageError::CorruptFile)
        );
        assert_eq!(
            TrdFormat::load_image(Cursor::new(vec![0u8; 1000]), &mut image),
            Err(DiskImageError::UnknownFormat)
        );
        assert_eq!(
            TrdFormat::load_image(Cursor::new(vec![0u8; TRD_CYLINDER_SIZE * 257]), &mut image),
            Err(DiskImageError::GeometryTooLarge)
        );
    }
}
