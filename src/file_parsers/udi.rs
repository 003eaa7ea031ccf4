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

    src/file_parsers/udi.rs

    A parser for UDI ('Ultra Disk Image') files. UDI stores every track as raw MFM bytes with a
    packed clock mask, so it maps directly onto the track model. A CRC-32 of the whole file
    follows the last track.
*/
use crate::chs::DiskCh;
use crate::file_parsers::{raw_track_flags, write_output, FormatCaps, ParserWriteCompatibility, ParserWriteOptions};
use crate::io::{Cursor, ReadSeek, SeekFrom, Write};
use crate::track::Track;
use crate::util::{le_u16, le_u32, read_image_bytes, udi_crc32};
use crate::{DiskImage, DiskImageError, DiskImageFileFormat, DEFAULT_TRACK_SIZE, MAXIMUM_HEADS};
use binrw::{binrw, BinRead, BinWrite};

pub const UDI_SIGNATURE: &[u8; 4] = b"UDI!";
pub const UDI_HEADER_SIZE: usize = 16;
/// Track format byte of an MFM track.
pub const UDI_TRACK_MFM: u8 = 0x00;

#[derive(Debug)]
#[binrw]
#[brw(little)]
pub struct UdiHeader {
    pub signature: [u8; 4],
    /// File length, excluding the trailing CRC.
    pub unpacked_len: u32,
    pub version: u8,
    pub max_cylinder: u8,
    pub max_head: u8,
    pub reserved: u8,
    pub extra_len: u32,
}

pub struct UdiFormat;

impl UdiFormat {
    pub(crate) fn capabilities() -> FormatCaps {
        raw_track_flags()
    }

    pub(crate) fn extensions() -> Vec<&'static str> {
        vec!["udi"]
    }

    pub(crate) fn detect<RWS: ReadSeek>(mut image: RWS) -> bool {
        if image.seek(SeekFrom::Start(0)).is_err() {
            return false;
        }
        match UdiHeader::read(&mut image) {
            Ok(header) => &header.signature == UDI_SIGNATURE,
            Err(_) => false,
        }
    }

    pub(crate) fn can_write(_image: &DiskImage) -> ParserWriteCompatibility {
        ParserWriteCompatibility::Ok
    }

    pub(crate) fn load_image<RWS: ReadSeek>(mut read_buf: RWS, image: &mut DiskImage) -> Result<(), DiskImageError> {
        let data = read_image_bytes(&mut read_buf)?;
        if data.len() < UDI_HEADER_SIZE + 4 {
            return Err(DiskImageError::CorruptFile);
        }

        let header = UdiHeader::read(&mut Cursor::new(&data)).map_err(|_| DiskImageError::CorruptFile)?;
        if &header.signature != UDI_SIGNATURE {
            return Err(DiskImageError::UnknownFormat);
        }
        if header.version != 0 || header.reserved != 0 || header.extra_len != 0 {
            log::error!(
                "UdiFormat::load_image(): Unsupported header: version {} reserved {} extra length {}",
                header.version,
                header.reserved,
                header.extra_len
            );
            return Err(DiskImageError::UnsupportedVersion);
        }

        let unpacked_len = header.unpacked_len as usize;
        if data.len() != unpacked_len + 4 {
            log::error!(
                "UdiFormat::load_image(): File is {} bytes, header claims {}",
                data.len(),
                unpacked_len + 4
            );
            return Err(DiskImageError::CorruptFile);
        }

        let stored = le_u32(&data, unpacked_len).ok_or(DiskImageError::CorruptFile)?;
        let calculated = udi_crc32(&data[..unpacked_len]);
        if stored != calculated {
            log::debug!(
                "UdiFormat::load_image(): CRC {:08X} calculated {:08X}",
                stored,
                calculated
            );
            image.warn(DiskImageError::BadChecksum(DiskImageFileFormat::Udi));
        }

        let cylinders = header.max_cylinder as usize + 1;
        let heads = header.max_head as usize + 1;
        if heads > MAXIMUM_HEADS {
            return Err(DiskImageError::GeometryTooLarge);
        }
        log::debug!("UdiFormat::load_image(): {} cylinders, {} heads", cylinders, heads);
        image.reset_geometry(cylinders, heads)?;

        let body = &data[..unpacked_len];
        let mut pos = UDI_HEADER_SIZE;
        for c in 0..cylinders {
            for h in 0..heads {
                let ch = DiskCh::new(c as u16, h as u8);
                let format = *body.get(pos).ok_or(DiskImageError::CorruptFile)?;
                pos += 1;

                if format != UDI_TRACK_MFM {
                    let skip = le_u32(body, pos).ok_or(DiskImageError::CorruptFile)? as usize;
                    log::warn!(
                        "UdiFormat::load_image(): Track {} has unsupported format {:02X}, skipping {} bytes",
                        ch,
                        format,
                        skip
                    );
                    pos += 4 + skip;
                    // Stands in as an unformatted, zero filled track.
                    image.insert_track(ch, Track::new(DEFAULT_TRACK_SIZE))?;
                    continue;
                }

                let len = le_u16(body, pos).ok_or(DiskImageError::CorruptFile)? as usize;
                pos += 2;
                let clock_len = len.div_ceil(8);
                let track_bytes = body.get(pos..pos + len).ok_or(DiskImageError::CorruptFile)?;
                let clock_bytes = body
                    .get(pos + len..pos + len + clock_len)
                    .ok_or(DiskImageError::CorruptFile)?;
                pos += len + clock_len;

                log::trace!("UdiFormat::load_image(): Track {} is {} bytes", ch, len);
                image.insert_track(ch, Track::from_packed_clock(track_bytes.to_vec(), clock_bytes))?;
            }
        }

        if pos != unpacked_len {
            log::warn!(
                "UdiFormat::load_image(): {} bytes of track data unaccounted for",
                unpacked_len as isize - pos as isize
            );
        }
        Ok(())
    }

    pub(crate) fn save_image<W: Write>(
        image: &mut DiskImage,
        _opts: &ParserWriteOptions,
        output: &mut W,
    ) -> Result<(), DiskImageError> {
        let header = UdiHeader {
            signature: *UDI_SIGNATURE,
            unpacked_len: 0,
            version: 0,
            max_cylinder: image.max_cylinder,
            max_head: image.max_head,
            reserved: 0,
            extra_len: 0,
        };
        let mut cursor = Cursor::new(Vec::new());
        header
            .write(&mut cursor)
            .map_err(|e| DiskImageError::WriteFailed(e.to_string()))?;
        let mut buffer = cursor.into_inner();

        for c in 0..image.cylinders() {
            for h in 0..image.heads() {
                let ch = DiskCh::new(c as u16, h as u8);
                buffer.push(UDI_TRACK_MFM);
                match image.find_track(ch) {
                    Some(track) => {
                        let len = u16::try_from(track.len()).map_err(|_| DiskImageError::IncompatibleImage)?;
                        buffer.extend_from_slice(&len.to_le_bytes());
                        buffer.extend_from_slice(track.data());
                        buffer.extend_from_slice(&track.packed_clock());
                    }
                    None => buffer.extend_from_slice(&0u16.to_le_bytes()),
                }
            }
        }

        let unpacked_len = buffer.len() as u32;
        buffer[4..8].copy_from_slice(&unpacked_len.to_le_bytes());
        let crc = udi_crc32(&buffer);
        buffer.extend_from_slice(&crc.to_le_bytes());

        log::debug!("UdiFormat::save_image(): {} bytes, CRC {:08X}", buffer.len(), crc);
        write_output(output, &buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        let mut data = UDI_SIGNATURE.to_vec();
        data.extend_from_slice(&[0u8; 12]);
        assert!(UdiFormat::detect(Cursor::new(&data)));
        assert!(!UdiFormat::detect(Cursor::new(&data[..8])));
    }

    #[test]
    fn test_bad_version() {
        let mut data = UDI_SIGNATURE.to_vec();
        data.extend_from_slice(&20u32.to_le_bytes());
        data.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 0]);
        data.extend_from_slice(&[0, 0, 0, 0]);
        let mut image = DiskImage::default();
        assert_eq!(
            UdiFormat::load_image(Cursor::new(&data), &mut image),
            Err(DiskImageError::UnsupportedVersion)
        );
    }
}
