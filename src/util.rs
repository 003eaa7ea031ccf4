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

    src/util.rs

    Checksum routines shared by the track model and the container parsers, helpers for
    pulling a whole container into memory, and a hex dump routine.
*/
use crate::io::{ReadSeek, SeekFrom, Write};
use crate::DiskImageError;

/// Calculate the CRC-16/IBM-3740 (CCITT, polynomial 0x1021, initial value 0xFFFF) of `data`, as
/// computed by the WD179x family over address marks and data fields.
/// Pass the result of a previous call as `start` to continue a running CRC.
pub fn crc_ibm_3740(data: &[u8], start: Option<u16>) -> u16 {
    let mut crc = start.unwrap_or(0xFFFF);

    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x1021 } else { crc << 1 };
        }
    }
    crc
}

/// Calculate the CRC-16/IBM-3740 of `len` bytes of a circular buffer, starting at `start`.
/// Ranges that run off the end of `data` continue from offset 0.
pub fn crc_ibm_3740_wrapped(data: &[u8], start: usize, len: usize) -> u16 {
    if data.is_empty() {
        return 0xFFFF;
    }
    let start = start % data.len();
    let mut crc = 0xFFFF;
    let mut remaining = len;
    let mut pos = start;

    while remaining > 0 {
        let chunk = std::cmp::min(remaining, data.len() - pos);
        crc = crc_ibm_3740(&data[pos..pos + chunk], Some(crc));
        remaining -= chunk;
        pos = 0;
    }
    crc
}

/// The Teledisk CRC (polynomial 0xA097, initial value supplied by the caller, usually 0).
pub fn td0_crc(data: &[u8], input_crc: u16) -> u16 {
    let mut crc = input_crc;

    for byte in data.iter() {
        crc ^= (*byte as u16) << 8;
        for _j in 0..8 {
            crc = (crc << 1) ^ if crc & 0x8000 != 0 { 0xA097 } else { 0 };
        }
    }
    crc
}

/// The CRC-32 variant used by UDI images. The running value starts at 0xFFFFFFFF and is inverted
/// around every byte, so the result differs from the common zlib CRC-32.
pub fn udi_crc32(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;

    for byte in data {
        crc ^= 0xFFFF_FFFF ^ (*byte as u32);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc >>= 1;
            crc ^= 0xEDB8_8320 & mask;
        }
        crc ^= 0xFFFF_FFFF;
    }
    crc
}

/// The SCL trailer checksum, a plain 32-bit sum of every byte.
pub fn scl_checksum(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |sum, b| sum.wrapping_add(*b as u32))
}

/// The Hobeta header checksum, calculated over the first 15 bytes of the header.
pub fn hobeta_crc(header: &[u8]) -> u16 {
    let sum = header
        .iter()
        .take(15)
        .fold(0u16, |sum, b| sum.wrapping_add(*b as u16));
    sum.wrapping_mul(257).wrapping_add(105)
}

pub(crate) fn get_length<T: ReadSeek>(source: &mut T) -> Result<u64, crate::io::Error> {
    // Seek to the end of the source
    let length = source.seek(SeekFrom::End(0))?;
    // Seek back to the beginning of the source
    source.seek(SeekFrom::Start(0))?;
    Ok(length)
}

/// Read an entire container into memory. Allocation failure is reported as
/// [`DiskImageError::NoMemory`] rather than aborting.
pub(crate) fn read_image_bytes<T: ReadSeek>(source: &mut T) -> Result<Vec<u8>, DiskImageError> {
    let length = get_length(source).map_err(|e| DiskImageError::OpenFailed(e.to_string()))?;
    let length = usize::try_from(length).map_err(|_| DiskImageError::NoMemory)?;

    let mut buffer = Vec::new();
    buffer.try_reserve_exact(length).map_err(|_| DiskImageError::NoMemory)?;
    source
        .read_to_end(&mut buffer)
        .map_err(|e| DiskImageError::OpenFailed(e.to_string()))?;
    Ok(buffer)
}

/// Read a little-endian u16 from `data` at `offset`, if in bounds.
pub(crate) fn le_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Read a little-endian u32 from `data` at `offset`, if in bounds.
pub(crate) fn le_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Write `data_slice` to `out` as rows of hex bytes followed by their ASCII rendering.
/// Row addresses start at `start_address`.
pub fn dump_slice<W: Write>(
    data_slice: &[u8],
    start_address: usize,
    bytes_per_row: usize,
    out: &mut W,
) -> Result<(), crate::io::Error> {
    let bytes_per_row = bytes_per_row.max(1);
    for (i, row) in data_slice.chunks(bytes_per_row).enumerate() {
        write!(out, "{:06X} | ", start_address + i * bytes_per_row)?;
        for byte in row {
            write!(out, "{:02X} ", byte)?;
        }
        // Pad a short final row so the ASCII column lines up
        for _ in row.len()..bytes_per_row {
            write!(out, "   ")?;
        }
        write!(out, "| ")?;
        for byte in row {
            let ch = if byte.is_ascii_graphic() || *byte == b' ' { *byte as char } else { '.' };
            write!(out, "{}", ch)?;
        }
        writeln!(out)?;
    }
    out.flush()
}
