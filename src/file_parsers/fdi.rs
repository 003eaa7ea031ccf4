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

    src/file_parsers/fdi.rs

    A parser for FDI ('Full Disk Image') files, as produced by the UKV Spectrum Debugger.

    An FDI file describes every sector of every track by its ID field, a flag byte and an
    offset into the data area, so non-standard and damaged disks can be represented.
*/
use crate::chs::DiskCh;
use crate::file_parsers::{write_output, FormatCaps, ParserWriteCompatibility, ParserWriteOptions};
use crate::io::{Cursor, ReadSeek, Seek, SeekFrom, Write};
use crate::track_schema::builder::{format_variable, SectorDescriptor};
use crate::track_schema::SectorId;
use crate::util::read_image_bytes;
use crate::{DiskImage, DiskImageError, MAXIMUM_CYLINDERS, MAXIMUM_HEADS};
use binrw::{binrw, BinRead, BinWrite};

pub const FDI_SIGNATURE: &[u8; 3] = b"FDI";
pub const FDI_HEADER_SIZE: usize = 14;

/// The sector has an ID field but no data field.
pub const FDI_SECTOR_NO_DATA: u8 = 0b0100_0000;
/// The data field uses a deleted data mark.
pub const FDI_SECTOR_DELETED: u8 = 0b1000_0000;
/// Any of these bits set means the data CRC was good. Writers set the bit for the sector size.
pub const FDI_SECTOR_CRC_MASK: u8 = 0b0011_1111;

#[derive(Debug)]
#[binrw]
#[brw(little)]
pub struct FdiHeader {
    pub signature: [u8; 3],
    pub write_protect: u8,
    pub cylinders: u16,
    pub heads: u16,
    pub text_offset: u16,
    pub data_offset: u16,
    pub extra_size: u16,
}

#[derive(Debug)]
#[binrw]
#[brw(little)]
pub struct FdiTrackHeader {
    /// Offset of the track's sector data, relative to the data area.
    pub data_offset: u32,
    pub reserved: u16,
    pub sector_count: u8,
}

#[derive(Debug)]
#[binrw]
#[brw(little)]
pub struct FdiSectorHeader {
    pub cylinder: u8,
    pub head: u8,
    pub sector_id: u8,
    pub size: u8,
    pub flags: u8,
    /// Offset of the sector data, relative to the track's data offset.
    pub data_offset: u16,
}

struct FdiTrack {
    header: FdiTrackHeader,
    sectors: Vec<FdiSectorHeader>,
    data: Vec<u8>,
}

pub struct FdiFormat;

impl FdiFormat {
    pub(crate) fn capabilities() -> FormatCaps {
        FormatCaps::CAP_VARIABLE_SPT
            | FormatCaps::CAP_VARIABLE_SSPT
            | FormatCaps::CAP_DATA_CRC
            | FormatCaps::CAP_DATA_DELETED
            | FormatCaps::CAP_SID_OVERRIDE
            | FormatCaps::CAP_COMMENT
            | FormatCaps::CAP_NO_DAM
    }

    pub(crate) fn extensions() -> Vec<&'static str> {
        vec!["fdi"]
    }

    pub(crate) fn detect<RWS: ReadSeek>(mut image: RWS) -> bool {
        if image.seek(SeekFrom::Start(0)).is_err() {
            return false;
        }
        match FdiHeader::read(&mut image) {
            Ok(header) => &header.signature == FDI_SIGNATURE,
            Err(_) => false,
        }
    }

    pub(crate) fn can_write(_image: &DiskImage) -> ParserWriteCompatibility {
        ParserWriteCompatibility::Ok
    }

    pub(crate) fn load_image<RWS: ReadSeek>(mut read_buf: RWS, image: &mut DiskImage) -> Result<(), DiskImageError> {
        let data = read_image_bytes(&mut read_buf)?;
        if data.len() < FDI_HEADER_SIZE {
            return Err(DiskImageError::CorruptFile);
        }

        let mut cursor = Cursor::new(&data);
        let header = FdiHeader::read(&mut cursor).map_err(|_| DiskImageError::CorruptFile)?;
        if &header.signature != FDI_SIGNATURE {
            return Err(DiskImageError::UnknownFormat);
        }

        let cylinders = header.cylinders as usize;
        let heads = header.heads as usize;
        log::debug!(
            "FdiFormat::load_image(): {} cylinders, {} heads, write protect: {}, data offset: {:04X}",
            cylinders,
            heads,
            header.write_protect != 0,
            header.data_offset
        );
        if cylinders == 0 || heads == 0 {
            return Err(DiskImageError::CorruptFile);
        }
        if cylinders > MAXIMUM_CYLINDERS || heads > MAXIMUM_HEADS {
            return Err(DiskImageError::GeometryTooLarge);
        }

        if let Some(comment) = data.get(header.text_offset as usize..) {
            let end = comment.iter().position(|b| *b == 0).unwrap_or(comment.len());
            log::debug!(
                "FdiFormat::load_image(): Comment: {}",
                String::from_utf8_lossy(&comment[..end])
            );
        }

        cursor
            .seek(SeekFrom::Start(FDI_HEADER_SIZE as u64 + header.extra_size as u64))
            .map_err(|_| DiskImageError::CorruptFile)?;

        image.reset_geometry(cylinders, heads)?;
        if header.write_protect != 0 {
            image.read_only = true;
        }

        for c in 0..cylinders {
            for h in 0..heads {
                let ch = DiskCh::new(c as u16, h as u8);
                let track_header = FdiTrackHeader::read(&mut cursor).map_err(|_| DiskImageError::CorruptFile)?;
                let track_base = header.data_offset as usize + track_header.data_offset as usize;

                let mut sectors = Vec::with_capacity(track_header.sector_count as usize);
                for _ in 0..track_header.sector_count {
                    let sh = FdiSectorHeader::read(&mut cursor).map_err(|_| DiskImageError::CorruptFile)?;
                    let id = SectorId::new(sh.cylinder, sh.head, sh.sector_id, sh.size);

                    let payload = if sh.flags & FDI_SECTOR_NO_DATA != 0 {
                        None
                    }
                    else {
                        let start = track_base + sh.data_offset as usize;
                        let bytes = data.get(start..start + id.size()).ok_or_else(|| {
                            log::error!("FdiFormat::load_image(): Sector {} on track {} is out of bounds", id, ch);
                            DiskImageError::CorruptFile
                        })?;
                        Some(bytes.to_vec())
                    };

                    log::trace!("FdiFormat::load_image(): Track {} sector {} flags: {:02X}", ch, id, sh.flags);
                    sectors.push(
                        SectorDescriptor::new(id, payload)
                            .with_deleted(sh.flags & FDI_SECTOR_DELETED != 0)
                            .with_crc_valid(sh.flags & FDI_SECTOR_CRC_MASK != 0),
                    );
                }

                image.insert_track(ch, format_variable(ch, &sectors)?)?;
            }
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

        let mut tracks = Vec::with_capacity(cylinders * heads);
        let mut table_size = 0;
        let mut data_size = 0usize;

        for c in 0..cylinders {
            for h in 0..heads {
                let ch = DiskCh::new(c as u16, h as u8);
                let mut fdi_track = FdiTrack {
                    header: FdiTrackHeader {
                        data_offset: u32::try_from(data_size).map_err(|_| DiskImageError::IncompatibleImage)?,
                        reserved: 0,
                        sector_count: 0,
                    },
                    sectors: Vec::new(),
                    data: Vec::new(),
                };

                if let Some(track) = image.find_track(ch) {
                    for entry in image.track_sectors(ch).iter().take(u8::MAX as usize) {
                        let id = entry.address.id;
                        let mut sh = FdiSectorHeader {
                            cylinder: id.c,
                            head: id.h,
                            sector_id: id.s,
                            size: id.n,
                            flags: FDI_SECTOR_NO_DATA,
                            data_offset: u16::try_from(fdi_track.data.len()).map_err(|_| DiskImageError::IncompatibleImage)?,
                        };
                        if let Some(sector) = entry.sector {
                            sh.flags = 0;
                            if sector.is_deleted() {
                                sh.flags |= FDI_SECTOR_DELETED;
                            }
                            if sector.crc_ok {
                                sh.flags |= ((sector.length >> 7) as u8) & FDI_SECTOR_CRC_MASK;
                            }
                            fdi_track.data.extend(track.read_wrapped(sector.data_offset, sector.length));
                        }
                        fdi_track.sectors.push(sh);
                    }
                }

                fdi_track.header.sector_count = fdi_track.sectors.len() as u8;
                table_size += 7 + 7 * fdi_track.sectors.len();
                data_size += fdi_track.data.len();
                tracks.push(fdi_track);
            }
        }

        let comment = format!("zxfloppy {}\0", env!("CARGO_PKG_VERSION"));
        let text_offset = FDI_HEADER_SIZE + table_size;
        let data_offset = text_offset + comment.len();

        let header = FdiHeader {
            signature: *FDI_SIGNATURE,
            write_protect: 0,
            cylinders: cylinders as u16,
            heads: heads as u16,
            text_offset: u16::try_from(text_offset).map_err(|_| DiskImageError::IncompatibleImage)?,
            data_offset: u16::try_from(data_offset).map_err(|_| DiskImageError::IncompatibleImage)?,
            extra_size: 0,
        };
        log::debug!(
            "FdiFormat::save_image(): {} tracks, data offset {:04X}, {} bytes of sector data",
            tracks.len(),
            data_offset,
            data_size
        );

        let mut buffer = Cursor::new(Vec::with_capacity(data_offset + data_size));
        let write_err = |e: binrw::Error| DiskImageError::WriteFailed(e.to_string());
        header.write(&mut buffer).map_err(write_err)?;
        for track in &tracks {
            track.header.write(&mut buffer).map_err(write_err)?;
            for sector in &track.sectors {
                sector.write(&mut buffer).map_err(write_err)?;
            }
        }

        let mut buffer = buffer.into_inner();
        buffer.extend_from_slice(comment.as_bytes());
        for track in &tracks {
            buffer.extend_from_slice(&track.data);
        }
        write_output(output, &buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = FdiHeader {
            signature: *FDI_SIGNATURE,
            write_protect: 1,
            cylinders: 80,
            heads: 2,
            text_offset: 0x1234,
            data_offset: 0x5678,
            extra_size: 0,
        };
        let mut buffer = Cursor::new(Vec::new());
        header.write(&mut buffer).unwrap();
        assert_eq!(
            buffer.into_inner(),
            vec![b'F', b'D', b'I', 1, 80, 0, 2, 0, 0x34, 0x12, 0x78, 0x56, 0, 0]
        );
    }

    #[test]
    fn test_detect() {
        assert!(FdiFormat::detect(Cursor::new(b"FDI\0\x50\0\x02\0\0\0\0\0\0\0".to_vec())));
        assert!(!FdiFormat::detect(Cursor::new(b"FDX\0\x50\0\x02\0\0\0\0\0\0\0".to_vec())));
        assert!(!FdiFormat::detect(Cursor::new(b"FDI".to_vec())));
    }
}
