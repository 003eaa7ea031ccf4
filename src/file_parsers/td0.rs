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

    src/file_parsers/td0.rs

    A parser for the Teledisk (TD0) disk image format.

    The proprietary format used by the Teledisk disk copying software, published by Sydex in the
    1980s. This utility was quite popular for early disk archival efforts, and many Teledisk images
    exist in the wild.

    Teledisk disk images can be optionally encoded with 'advanced compression' which is a form of
    LZHUF compression. Such images carry a lowercase 'td' signature, and everything after the
    12 byte file header is compressed.
*/
use crate::chs::DiskCh;
use crate::file_parsers::compression::lzhuf::{compress, expand, TD0_OPTIONS};
use crate::file_parsers::{write_output, FormatCaps, ParserWriteCompatibility, ParserWriteOptions};
use crate::io::{Cursor, Read, ReadSeek, Seek, SeekFrom, Write};
use crate::track_schema::builder::{format_variable, SectorDescriptor};
use crate::track_schema::SectorId;
use crate::util::{read_image_bytes, td0_crc};
use crate::{DiskImage, DiskImageError, DiskImageFileFormat, MAXIMUM_HEADS};
use binrw::{binrw, BinRead, BinReaderExt, BinWrite};

pub const SECTOR_DUPLICATED: u8 = 0b0000_0001;
pub const SECTOR_CRC_ERROR: u8 = 0b0000_0010;
pub const SECTOR_DELETED: u8 = 0b0000_0100;

pub const SECTOR_SKIPPED: u8 = 0b0001_0000;
pub const SECTOR_NO_DATA: u8 = 0b0010_0000;
pub const SECTOR_NO_ID: u8 = 0b0100_0000;

/// Stepping byte flag indicating a comment block follows the header.
pub const HAS_COMMENT_BLOCK: u8 = 0x80;
pub const END_OF_IMAGE: u8 = 0xFF;

pub const HEADER_SIZE: usize = 12;
pub const WRITE_VERSION: u8 = 21;

#[derive(Debug)]
#[binrw]
#[brw(little)]
pub struct TelediskHeader {
    pub id: [u8; 2],
    pub sequence: u8,
    pub check_sequence: u8,
    pub version: u8,
    pub data_rate: u8,
    pub drive_type: u8,
    pub stepping: u8,
    pub allocation_flag: u8,
    pub heads: u8,
    pub crc: u16,
}

pub const COMMENT_HEADER_SIZE: usize = 10;
/// Teledisk comment block header
/// 'length' bytes of comment data line records follow the header, as nul-terminated strings.
#[derive(Debug)]
#[binrw]
#[brw(little)]
pub struct CommentHeader {
    pub crc: u16,
    pub length: u16,
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

#[derive(Debug)]
#[binrw]
#[brw(little)]
pub struct TrackHeader {
    pub sectors: u8,
    pub cylinder: u8,
    pub head: u8,
    pub crc: u8,
}

#[derive(Debug)]
#[binrw]
#[brw(little)]
pub struct SectorHeader {
    pub cylinder: u8,
    pub head: u8,
    pub sector_id: u8,
    pub sector_size: u8,
    pub flags: u8,
    pub crc: u8,
}

impl SectorHeader {
    /// Sectors marked skipped or without data have no data block.
    fn has_data_block(&self) -> bool {
        self.flags & (SECTOR_SKIPPED | SECTOR_NO_DATA) == 0
    }
}

pub struct Td0Format {}

/// Expand one sector data block into a sector of `size` bytes.
/// Encoded data past the end of the sector is ignored; a short block leaves the remainder zero.
fn decode_sector_data(block: &[u8], size: usize) -> Result<Vec<u8>, DiskImageError> {
    let mut sector = Vec::with_capacity(size);
    let (method, encoded) = block.split_first().ok_or(DiskImageError::CorruptFile)?;

    match method {
        0 => sector.extend_from_slice(encoded),
        1 => {
            if encoded.len() < 4 {
                return Err(DiskImageError::CorruptFile);
            }
            let count = u16::from_le_bytes([encoded[0], encoded[1]]) as usize;
            for _ in 0..std::cmp::min(count, size / 2 + 1) {
                sector.extend_from_slice(&encoded[2..4]);
            }
        }
        2 => {
            let mut pos = 0;
            while pos < encoded.len() && sector.len() < size {
                let record = encoded.get(pos..pos + 2).ok_or(DiskImageError::CorruptFile)?;
                let len = record[1] as usize;
                pos += 2;
                match record[0] {
                    0 => {
                        let literal = encoded.get(pos..pos + len).ok_or(DiskImageError::CorruptFile)?;
                        sector.extend_from_slice(literal);
                        pos += len;
                    }
                    1 => {
                        let pattern = encoded.get(pos..pos + 2).ok_or(DiskImageError::CorruptFile)?;
                        for _ in 0..len {
                            sector.extend_from_slice(pattern);
                        }
                        pos += 2;
                    }
                    _ => {
                        log::error!("decode_sector_data(): Invalid RLE record type {:02X}", record[0]);
                        return Err(DiskImageError::CorruptFile);
                    }
                }
            }
        }
        _ => {
            log::error!("decode_sector_data(): Invalid encoding method {:02X}", method);
            return Err(DiskImageError::CorruptFile);
        }
    }

    sector.resize(size, 0);
    Ok(sector)
}

impl Td0Format {
    pub(crate) fn capabilities() -> FormatCaps {
        FormatCaps::CAP_VARIABLE_SPT
            | FormatCaps::CAP_VARIABLE_SSPT
            | FormatCaps::CAP_DATA_CRC
            | FormatCaps::CAP_DATA_DELETED
            | FormatCaps::CAP_SID_OVERRIDE
            | FormatCaps::CAP_COMMENT
            | FormatCaps::CAP_NO_DAM
    }

    pub(crate) fn detect<RWS: ReadSeek>(mut image: RWS) -> bool {
        let mut detected = false;
        _ = image.seek(SeekFrom::Start(0));

        if let Ok(file_header) = TelediskHeader::read(&mut image) {
            if file_header.id == "TD".as_bytes() || file_header.id == "td".as_bytes() {
                detected = true;
            }
        }

        detected
    }

    pub(crate) fn can_write(_image: &DiskImage) -> ParserWriteCompatibility {
        ParserWriteCompatibility::Ok
    }

    pub(crate) fn load_image<RWS: ReadSeek>(mut read_buf: RWS, image: &mut DiskImage) -> Result<(), DiskImageError> {
        let image_data = read_image_bytes(&mut read_buf)?;

        if image_data.len() < HEADER_SIZE {
            log::trace!("Image is too small to be a Teledisk image.");
            return Err(DiskImageError::CorruptFile);
        }

        // Read first 10 bytes to calculate header CRC.
        let header_crc = td0_crc(&image_data[0..10], 0);
        let file_header =
            TelediskHeader::read(&mut Cursor::new(&image_data)).map_err(|_| DiskImageError::CorruptFile)?;

        let compressed = file_header.id == "td".as_bytes();
        if !compressed && file_header.id != "TD".as_bytes() {
            return Err(DiskImageError::UnknownFormat);
        }

        let major_version = file_header.version / 10;
        let minor_version = file_header.version % 10;
        let has_comment_block = file_header.stepping & HAS_COMMENT_BLOCK != 0;

        log::trace!(
            "Detected Teledisk Image, version {}.{}, compressed: {} comment_block: {}",
            major_version,
            minor_version,
            compressed,
            has_comment_block
        );

        log::trace!("Header CRC: {:04X} Calculated CRC: {:04X}", file_header.crc, header_crc);
        if file_header.crc != header_crc {
            image.warn(DiskImageError::BadChecksum(DiskImageFileFormat::TeleDisk));
        }

        if !(10..=21).contains(&file_header.version) {
            log::error!("Unsupported Teledisk version {}.{}", major_version, minor_version);
            return Err(DiskImageError::UnsupportedVersion);
        }
        if file_header.allocation_flag != 0 {
            log::error!("Teledisk images of DOS allocated sectors only are not supported");
            return Err(DiskImageError::UnsupportedVersion);
        }
        if compressed && file_header.version < 20 {
            log::error!("Teledisk 'old advanced' compression is not supported");
            return Err(DiskImageError::UnsupportedVersion);
        }

        // Decompress the image data if necessary.
        let body = if compressed {
            let expanded = expand(&image_data[HEADER_SIZE..], None, &TD0_OPTIONS);
            log::trace!(
                "Decompressed {} bytes to {} bytes",
                image_data.len() - HEADER_SIZE,
                expanded.len()
            );
            expanded
        }
        else {
            image_data[HEADER_SIZE..].to_vec()
        };

        // From this point forward, we are working with the decompressed data.
        let mut body_ref = Cursor::new(&body);

        // Parse comment block if indicated.
        if has_comment_block {
            let comment_header = CommentHeader::read(&mut body_ref).map_err(|_| DiskImageError::CorruptFile)?;
            let comment_end = COMMENT_HEADER_SIZE + comment_header.length as usize;
            let crc_data = body.get(2..comment_end).ok_or(DiskImageError::CorruptFile)?;
            let calculated_crc = td0_crc(crc_data, 0);

            log::trace!(
                "Comment block header crc: {:04X} calculated_crc: {:04X}",
                comment_header.crc,
                calculated_crc
            );
            if comment_header.crc != calculated_crc {
                image.warn(DiskImageError::BadChecksum(DiskImageFileFormat::TeleDisk));
            }

            // Comment black consists of nul-terminated strings. Convert nul terminators to newlines.
            let comment: String = body[COMMENT_HEADER_SIZE..comment_end]
                .iter()
                .map(|c| if *c == 0 { '\n' } else { *c as char })
                .collect();
            log::debug!(
                "Comment block dated {}-{:02}-{:02}: {}",
                1900 + comment_header.year as u32,
                comment_header.month + 1,
                comment_header.day,
                comment.trim_end()
            );
            body_ref
                .seek(SeekFrom::Start(comment_end as u64))
                .map_err(|_| DiskImageError::CorruptFile)?;
        }

        let mut tracks = Vec::new();
        let mut max_cylinder = 0;
        let mut max_head = 0;

        // A truncated image simply ends after the last complete track header.
        while let Ok(track_header) = TrackHeader::read(&mut body_ref) {
            if track_header.sectors == END_OF_IMAGE {
                break;
            }

            let track_crc = td0_crc(&[track_header.sectors, track_header.cylinder, track_header.head], 0);
            if track_crc as u8 != track_header.crc {
                log::warn!(
                    "Track header crc mismatch on c:{} h:{}: {:02X} calculated: {:02X}",
                    track_header.cylinder,
                    track_header.head,
                    track_header.crc,
                    track_crc as u8
                );
            }

            let mut sectors = Vec::with_capacity(track_header.sectors as usize);
            for _ in 0..track_header.sectors {
                let sector_header = SectorHeader::read(&mut body_ref).map_err(|_| DiskImageError::CorruptFile)?;
                let id = SectorId::new(
                    sector_header.cylinder,
                    sector_header.head,
                    sector_header.sector_id,
                    sector_header.sector_size,
                );

                let data = if sector_header.has_data_block() {
                    let block_len: u16 = body_ref.read_le().map_err(|_| DiskImageError::CorruptFile)?;
                    let mut block = vec![0u8; block_len as usize];
                    body_ref.read_exact(&mut block).map_err(|_| DiskImageError::CorruptFile)?;
                    Some(decode_sector_data(&block, id.size())?)
                }
                else {
                    None
                };

                log::trace!(
                    "Track c:{} h:{} sector {} flags: {:02X} data: {}",
                    track_header.cylinder,
                    track_header.head,
                    id,
                    sector_header.flags,
                    data.is_some()
                );
                sectors.push(
                    SectorDescriptor::new(id, data)
                        .with_deleted(sector_header.flags & SECTOR_DELETED != 0)
                        .with_crc_valid(sector_header.flags & SECTOR_CRC_ERROR == 0),
                );
            }

            max_cylinder = std::cmp::max(max_cylinder, track_header.cylinder as usize);
            max_head = std::cmp::max(max_head, track_header.head as usize);
            tracks.push((DiskCh::new(track_header.cylinder as u16, track_header.head), sectors));
        }

        if max_head + 1 > MAXIMUM_HEADS {
            return Err(DiskImageError::GeometryTooLarge);
        }
        log::debug!(
            "Read {} tracks, {} cylinders, {} heads",
            tracks.len(),
            max_cylinder + 1,
            max_head + 1
        );

        image.reset_geometry(max_cylinder + 1, max_head + 1)?;
        for (ch, sectors) in tracks {
            image.insert_track(ch, format_variable(ch, &sectors)?)?;
        }
        Ok(())
    }

    pub(crate) fn save_image<W: Write>(
        image: &mut DiskImage,
        opts: &ParserWriteOptions,
        output: &mut W,
    ) -> Result<(), DiskImageError> {
        let write_err = |e: binrw::Error| DiskImageError::WriteFailed(e.to_string());
        let mut body = Cursor::new(Vec::new());

        for c in 0..image.cylinders() {
            for h in 0..image.heads() {
                let ch = DiskCh::new(c as u16, h as u8);
                let track = match image.find_track(ch) {
                    Some(track) => track,
                    None => continue,
                };
                let entries = image.track_sectors(ch);
                let entries = &entries[..std::cmp::min(entries.len(), 0xFE)];

                let mut track_header = TrackHeader {
                    sectors: entries.len() as u8,
                    cylinder: c as u8,
                    head: h as u8,
                    crc: 0,
                };
                track_header.crc = td0_crc(&[track_header.sectors, track_header.cylinder, track_header.head], 0) as u8;
                track_header.write(&mut body).map_err(write_err)?;

                for entry in entries {
                    let id = entry.address.id;
                    let mut sector_header = SectorHeader {
                        cylinder: id.c,
                        head: id.h,
                        sector_id: id.s,
                        sector_size: id.n,
                        flags: SECTOR_NO_DATA,
                        crc: 0,
                    };

                    match entry.sector {
                        Some(sector) => {
                            let data = track.read_wrapped(sector.data_offset, sector.length);
                            sector_header.flags = 0;
                            if sector.is_deleted() {
                                sector_header.flags |= SECTOR_DELETED;
                            }
                            if !sector.crc_ok {
                                sector_header.flags |= SECTOR_CRC_ERROR;
                            }
                            sector_header.crc = td0_crc(&data, 0) as u8;
                            sector_header.write(&mut body).map_err(write_err)?;
                            ((data.len() + 1) as u16).write_le(&mut body).map_err(write_err)?;
                            0u8.write_le(&mut body).map_err(write_err)?;
                            body.write_all(&data)
                                .map_err(|e| DiskImageError::WriteFailed(e.to_string()))?;
                        }
                        None => sector_header.write(&mut body).map_err(write_err)?,
                    }
                }
            }
        }

        TrackHeader {
            sectors: END_OF_IMAGE,
            cylinder: 0,
            head: 0,
            crc: 0,
        }
        .write(&mut body)
        .map_err(write_err)?;

        let mut body = body.into_inner();
        if opts.compress {
            let packed = compress(&body, &TD0_OPTIONS);
            log::debug!("Compressed {} bytes to {} bytes", body.len(), packed.len());
            body = packed;
        }

        let mut file_header = TelediskHeader {
            id: if opts.compress { *b"td" } else { *b"TD" },
            sequence: 0,
            check_sequence: 0,
            version: WRITE_VERSION,
            data_rate: 0,
            drive_type: 0x03,
            stepping: 0,
            allocation_flag: 0,
            heads: 0x02,
            crc: 0,
        };
        let mut header = Cursor::new(Vec::with_capacity(HEADER_SIZE));
        file_header.write(&mut header).map_err(write_err)?;
        file_header.crc = td0_crc(&header.get_ref()[0..10], 0);

        let mut buffer = Cursor::new(Vec::with_capacity(HEADER_SIZE + body.len()));
        file_header.write(&mut buffer).map_err(write_err)?;
        let mut buffer = buffer.into_inner();
        buffer.extend_from_slice(&body);

        write_output(output, &buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_raw() {
        let mut block = vec![0u8];
        block.extend_from_slice(&[1, 2, 3]);
        let sector = decode_sector_data(&block, 8).unwrap();
        assert_eq!(sector, vec![1, 2, 3, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_decode_repeat() {
        let block = [1u8, 4, 0, 0xE5, 0xAA];
        let sector = decode_sector_data(&block, 8).unwrap();
        assert_eq!(sector, vec![0xE5, 0xAA, 0xE5, 0xAA, 0xE5, 0xAA, 0xE5, 0xAA]);
    }

    #[test]
    fn test_decode_rle() {
        // Two literal bytes, then the pattern 0x1234 three times.
        let block = [2u8, 0, 2, 0xAB, 0xCD, 1, 3, 0x12, 0x34];
        let sector = decode_sector_data(&block, 8).unwrap();
        assert_eq!(sector, vec![0xAB, 0xCD, 0x12, 0x34, 0x12, 0x34, 0x12, 0x34]);
    }

    #[test]
    fn test_decode_invalid() {
        assert_eq!(decode_sector_data(&[3u8, 0], 128), Err(DiskImageError::CorruptFile));
        assert_eq!(decode_sector_data(&[2u8, 7, 1], 128), Err(DiskImageError::CorruptFile));
        assert_eq!(decode_sector_data(&[], 128), Err(DiskImageError::CorruptFile));
    }

    #[test]
    fn test_detect() {
        let header = b"td\0\0\x15\0\x03\0\0\x02\0\0";
        assert!(Td0Format::detect(Cursor::new(header.to_vec())));
        assert!(!Td0Format::detect(Cursor::new(b"IMD 1.18".to_vec())));
    }
}
