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

    src/file_parsers/fdd.rs

    A parser for FDD images, the disk format of the SPM Spectrum emulator.

    The header carries a 30 byte identification string, the geometry and a table of 1024
    track offsets. Each track lists its sectors by ID field and file position.
*/
use crate::chs::DiskCh;
use crate::file_parsers::{write_output, FormatCaps, ParserWriteCompatibility, ParserWriteOptions};
use crate::io::{ReadSeek, SeekFrom, Write};
use crate::track_schema::builder::{format_variable, SectorDescriptor};
use crate::track_schema::SectorId;
use crate::util::{le_u32, read_image_bytes};
use crate::{DiskImage, DiskImageError, MAXIMUM_HEADS};

pub const FDD_SIGNATURE: &[u8; 30] = b"SPM DISK (c) 1996 MOA v0.1    ";
pub const FDD_ID_LEN: usize = 30;
pub const FDD_MAX_TRACKS: usize = 1024;
/// Offset of the track table.
pub const FDD_TABLE_OFFSET: usize = 36;
pub const FDD_HEADER_SIZE: usize = FDD_TABLE_OFFSET + FDD_MAX_TRACKS * 4;
pub const FDD_TRACK_HEADER_SIZE: usize = 2;
pub const FDD_SECTOR_HEADER_SIZE: usize = 8;

/// Payload written in place of a sector whose data field cannot be found.
pub const FDD_MISSING_SECTOR_MESSAGE: &[u8] = b"***ERROR: SECTOR NOT FOUND!***";

/// The geometry bytes of the header.
const FDD_CYLINDERS_OFFSET: usize = FDD_ID_LEN;
const FDD_HEADS_OFFSET: usize = FDD_ID_LEN + 1;

fn fdd_sector_size(size: u8) -> usize {
    128 << (size & 3)
}

/// Read a file offset stored as a 32-bit signed integer. Negative offsets are rejected.
fn read_offset(data: &[u8], at: usize) -> Result<usize, DiskImageError> {
    let raw = le_u32(data, at).ok_or(DiskImageError::CorruptFile)? as i32;
    usize::try_from(raw).map_err(|_| DiskImageError::CorruptFile)
}

pub struct FddFormat;

impl FddFormat {
    pub(crate) fn capabilities() -> FormatCaps {
        FormatCaps::CAP_VARIABLE_SPT | FormatCaps::CAP_VARIABLE_SSPT | FormatCaps::CAP_SID_OVERRIDE
    }

    pub(crate) fn extensions() -> Vec<&'static str> {
        vec!["fdd"]
    }

    pub(crate) fn detect<RWS: ReadSeek>(mut image: RWS) -> bool {
        let mut id = [0u8; FDD_ID_LEN];
        if image.seek(SeekFrom::Start(0)).is_err() || image.read_exact(&mut id).is_err() {
            return false;
        }
        id.starts_with(b"SPM DISK")
    }

    /// FDD has no way to record deleted marks, CRC errors or ID fields without data.
    pub(crate) fn can_write(image: &DiskImage) -> ParserWriteCompatibility {
        for (ch, _) in image.store.iter() {
            let lossy = image.track_sectors(ch).iter().any(|entry| {
                entry.sector.map_or(true, |s| !s.is_ok() || s.is_deleted())
            });
            if lossy {
                return ParserWriteCompatibility::DataLoss;
            }
        }
        ParserWriteCompatibility::Ok
    }

    pub(crate) fn load_image<RWS: ReadSeek>(mut read_buf: RWS, image: &mut DiskImage) -> Result<(), DiskImageError> {
        let data = read_image_bytes(&mut read_buf)?;
        if data.len() < FDD_TABLE_OFFSET {
            return Err(DiskImageError::CorruptFile);
        }

        // The cylinder count is stored modulo 256.
        let cylinders = match data[FDD_CYLINDERS_OFFSET] {
            0 => 256,
            c => c as usize,
        };
        let heads = data[FDD_HEADS_OFFSET] as usize;
        log::debug!(
            "FddFormat::load_image(): ID '{}', {} cylinders, {} heads",
            String::from_utf8_lossy(&data[..FDD_ID_LEN]).trim_end(),
            cylinders,
            heads
        );
        if heads > MAXIMUM_HEADS {
            return Err(DiskImageError::GeometryTooLarge);
        }
        if heads == 0 {
            return Err(DiskImageError::CorruptFile);
        }

        image.reset_geometry(cylinders, heads)?;

        for c in 0..cylinders {
            for h in 0..heads {
                let ch = DiskCh::new(c as u16, h as u8);
                let track_offset = read_offset(&data, FDD_TABLE_OFFSET + ch.to_index(heads) * 4)?;
                let track_header = data
                    .get(track_offset..track_offset + FDD_TRACK_HEADER_SIZE)
                    .ok_or(DiskImageError::CorruptFile)?;
                let sector_count = track_header[1] as usize;

                let mut sectors = Vec::with_capacity(sector_count);
                for s in 0..sector_count {
                    let record_offset = track_offset + FDD_TRACK_HEADER_SIZE + s * FDD_SECTOR_HEADER_SIZE;
                    let record = data
                        .get(record_offset..record_offset + FDD_SECTOR_HEADER_SIZE)
                        .ok_or(DiskImageError::CorruptFile)?;
                    let id = SectorId::new(record[0], record[1], record[2], record[3]);

                    let position = read_offset(record, 4)?;
                    let len = fdd_sector_size(id.n);
                    let payload = data.get(position..position + len).ok_or_else(|| {
                        log::error!("FddFormat::load_image(): Sector {} on track {} is out of bounds", id, ch);
                        DiskImageError::CorruptFile
                    })?;

                    log::trace!("FddFormat::load_image(): Track {} sector {} at {:06X}", ch, id, position);
                    sectors.push(SectorDescriptor::new(id, Some(payload.to_vec())));
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

        let mut buffer = vec![0u8; FDD_HEADER_SIZE];
        buffer[..FDD_ID_LEN].copy_from_slice(FDD_SIGNATURE);
        buffer[FDD_CYLINDERS_OFFSET] = cylinders as u8;
        buffer[FDD_HEADS_OFFSET] = heads as u8;

        let mut missing = [0u8; 1024];
        missing[..FDD_MISSING_SECTOR_MESSAGE.len()].copy_from_slice(FDD_MISSING_SECTOR_MESSAGE);

        for c in 0..cylinders {
            for h in 0..heads {
                let ch = DiskCh::new(c as u16, h as u8);
                let entries = image.track_sectors(ch);
                let entries = &entries[..std::cmp::min(entries.len(), u8::MAX as usize)];

                let track_offset = buffer.len();
                let table_entry = FDD_TABLE_OFFSET + ch.to_index(heads) * 4;
                buffer[table_entry..table_entry + 4].copy_from_slice(&(track_offset as u32).to_le_bytes());

                buffer.push(0);
                buffer.push(entries.len() as u8);
                let records_offset = buffer.len();
                buffer.resize(records_offset + entries.len() * FDD_SECTOR_HEADER_SIZE, 0);

                for (i, entry) in entries.iter().enumerate() {
                    let id = entry.address.id;
                    let len = fdd_sector_size(id.n);
                    let position = buffer.len();

                    let record = records_offset + i * FDD_SECTOR_HEADER_SIZE;
                    buffer[record..record + 4].copy_from_slice(&[id.c, id.h, id.s, id.n & 3]);
                    buffer[record + 4..record + 8].copy_from_slice(&(position as u32).to_le_bytes());

                    let payload = match (entry.sector, image.find_track(ch)) {
                        (Some(sector), Some(track)) => Some(track.read_wrapped(sector.data_offset, sector.length)),
                        _ => None,
                    };
                    match payload {
                        Some(mut payload) => {
                            payload.resize(len, 0);
                            buffer.extend_from_slice(&payload);
                        }
                        None => {
                            buffer.extend_from_slice(&missing[..len]);
                            image.warn(DiskImageError::SectorNotFound { ch, sector: id.s });
                        }
                    }
                }
            }
        }

        log::debug!("FddFormat::save_image(): {} bytes", buffer.len());
        write_output(output, &buffer)
    }
}
