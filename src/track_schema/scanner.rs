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

    src/track_schema/scanner.rs

    Address mark and sector search over a circular MFM track, following the behavior of the
    WD1793 'read address' and 'read sector' commands.
*/
use crate::track::Track;
use crate::track_schema::{AddressMark, SectorId, SectorMark, DAM, DDAM, IDAM, ID_FIELD_LEN};

/// Skip over a run of sync bytes beginning at `sync`. Returns the offset of the first byte after
/// the run and the run length, or None if the whole track is sync bytes.
fn skip_sync_run(track: &Track, sync: usize) -> Option<(usize, usize)> {
    let len = track.len();
    let mut off = (sync + 1) % len;
    let mut run = 1;

    while track.is_sync(off) {
        if run >= len {
            log::warn!("skip_sync_run(): track is saturated with sync marks");
            return None;
        }
        off = (off + 1) % len;
        run += 1;
    }
    Some((off, run))
}

/// Scan forward from `from`, wrapping, for the next ID address mark.
/// The search covers exactly one revolution. A mark is returned whether or not its CRC is valid.
pub fn find_address_mark(track: &Track, from: usize) -> Option<AddressMark> {
    let len = track.len();
    if len == 0 {
        return None;
    }

    for pos in from..from + len {
        let sync_offset = pos % len;
        if !track.is_sync(sync_offset) {
            continue;
        }

        let (marker_offset, run) = skip_sync_run(track, sync_offset)?;
        if track.byte_at(marker_offset) != IDAM {
            continue;
        }

        let id_offset = (marker_offset + 1) % len;
        let id_bytes = track.read_wrapped(id_offset, 4);
        let id = SectorId::new(id_bytes[0], id_bytes[1], id_bytes[2], id_bytes[3]);

        // Sync run + marker + CHRN
        let crc = track.crc(sync_offset, run + 1 + 4);
        let crc_ok = track.byte_at(id_offset + 4) == (crc >> 8) as u8 && track.byte_at(id_offset + 5) == crc as u8;

        return Some(AddressMark {
            sync_offset,
            id_offset,
            end_offset: (id_offset + ID_FIELD_LEN) % len,
            id,
            crc_ok,
        });
    }
    None
}

/// Search the track for the sector with ID `sector`, starting at `from`.
///
/// Address marks are visited in rotational order until one carries the requested sector number
/// or the first visited mark comes around again. The data field must be the next sync run after
/// the ID field; if that run is not followed by a data address mark the sector has no data.
pub fn find_sector(track: &Track, sector: u8, from: usize) -> Option<SectorMark> {
    let mut offset = from;
    let mut first_end = None;

    let address = loop {
        let mark = find_address_mark(track, offset)?;
        if mark.id.s == sector {
            break mark;
        }
        match first_end {
            Some(end) if end == mark.end_offset => return None,
            Some(_) => {}
            None => first_end = Some(mark.end_offset),
        }
        offset = mark.end_offset;
    };

    let len = track.len();
    for step in 0..len {
        let sync_offset = (address.end_offset + step) % len;
        if !track.is_sync(sync_offset) {
            continue;
        }

        let (marker_offset, run) = skip_sync_run(track, sync_offset)?;
        let data_marker = track.byte_at(marker_offset);
        if !(DDAM..=DAM).contains(&data_marker) {
            log::trace!(
                "find_sector(): sector {} has no data field (found marker {:02X})",
                address.id,
                data_marker
            );
            return None;
        }

        let data_offset = (marker_offset + 1) % len;
        let length = address.id.size();
        let end_offset = (data_offset + length) % len;

        let crc = track.crc(sync_offset, run + 1 + length);
        let crc_ok = track.byte_at(end_offset) == (crc >> 8) as u8 && track.byte_at(end_offset + 1) == crc as u8;

        return Some(SectorMark {
            address,
            data_marker,
            sync_offset,
            data_offset,
            end_offset,
            length,
            crc_ok,
        });
    }
    None
}

/// Iterates over every address mark on a track once, in rotational order starting from offset 0.
/// Iteration ends when the first mark is seen again.
pub struct AddressMarkIter<'a> {
    track: &'a Track,
    offset: usize,
    first: Option<usize>,
    visited: usize,
    done: bool,
}

impl<'a> AddressMarkIter<'a> {
    pub fn new(track: &'a Track) -> Self {
        Self {
            track,
            offset: 0,
            first: None,
            visited: 0,
            done: false,
        }
    }
}

impl Iterator for AddressMarkIter<'_> {
    type Item = AddressMark;

    fn next(&mut self) -> Option<AddressMark> {
        if self.done || self.visited > self.track.len() {
            return None;
        }

        let mark = match find_address_mark(self.track, self.offset) {
            Some(mark) => mark,
            None => {
                self.done = true;
                return None;
            }
        };

        match self.first {
            Some(first) if first == mark.id_offset => {
                self.done = true;
                return None;
            }
            Some(_) => {}
            None => self.first = Some(mark.id_offset),
        }

        self.offset = mark.end_offset;
        self.visited += 1;
        Some(mark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track_schema::{TrackBuilder, GAP_BYTE};
    use crate::DEFAULT_TRACK_SIZE;

    fn two_sector_track() -> Track {
        let mut builder = TrackBuilder::new();
        for s in [1u8, 2] {
            builder.gap(10).sync(12);
            let mark = builder.mark(3, IDAM);
            builder.bytes(&[0, 0, s, 1]).crc(mark);
            builder.gap(22).sync(12);
            let mark = builder.mark(3, DAM);
            builder.bytes(&[s; 256]).crc(mark);
            builder.gap(60);
        }
        builder.finish(DEFAULT_TRACK_SIZE)
    }

    #[test]
    fn test_find_address_mark() {
        let track = two_sector_track();
        let mark = find_address_mark(&track, 0).expect("mark");
        assert_eq!(mark.sync_offset, 22);
        assert_eq!(mark.id_offset, 26);
        assert_eq!(mark.end_offset, 32);
        assert_eq!(mark.id, SectorId::new(0, 0, 1, 1));
        assert!(mark.crc_ok);

        let next = find_address_mark(&track, mark.end_offset).expect("mark");
        assert_eq!(next.id.s, 2);

        // Wraps around to the first mark again
        let wrapped = find_address_mark(&track, next.end_offset).expect("mark");
        assert_eq!(wrapped, mark);
    }

    #[test]
    fn test_unclocked_a1_is_not_a_mark() {
        let mut builder = TrackBuilder::new();
        builder.gap(10).bytes(&[0xA1, 0xA1, 0xA1, IDAM, 0, 0, 1, 1, 0, 0]);
        let track = builder.finish(100);
        assert!(find_address_mark(&track, 0).is_none());
    }

    #[test]
    fn test_find_sector() {
        let track = two_sector_track();
        let sector = find_sector(&track, 2, 0).expect("sector");
        assert_eq!(sector.address.id.s, 2);
        assert_eq!(sector.data_marker, DAM);
        assert_eq!(sector.length, 256);
        assert!(sector.is_ok());
        assert!(!sector.is_deleted());
        assert_eq!(track.read_wrapped(sector.data_offset, 256), vec![2u8; 256]);

        assert!(find_sector(&track, 3, 0).is_none());
    }

    #[test]
    fn test_bad_id_crc_is_reported() {
        let mut track = two_sector_track();
        let mark = find_address_mark(&track, 0).expect("mark");
        let crc_hi = track.byte_at(mark.id_offset + 4);
        track.set_byte(mark.id_offset + 4, crc_hi ^ 0xFF);

        let mark = find_address_mark(&track, 0).expect("mark");
        assert!(!mark.crc_ok);
        let sector = find_sector(&track, 1, 0).expect("sector");
        assert!(!sector.address.crc_ok);
        assert!(sector.crc_ok);
    }

    #[test]
    fn test_sector_across_index() {
        let mut track = two_sector_track();
        let sector = find_sector(&track, 2, 0).expect("sector");
        // Rotate so that the payload of sector 2 straddles the end of the buffer.
        track.rotate_left(sector.data_offset + 100);

        let sector = find_sector(&track, 2, 0).expect("sector");
        assert!(sector.end_offset < sector.data_offset);
        assert!(sector.is_ok());
        assert_eq!(track.read_wrapped(sector.data_offset, 256), vec![2u8; 256]);
    }

    #[test]
    fn test_id_without_data() {
        let mut builder = TrackBuilder::new();
        builder.gap(10).sync(12);
        let mark = builder.mark(3, IDAM);
        builder.bytes(&[0, 0, 1, 1]).crc(mark);
        builder.gap(22).sync(12);
        let mark = builder.mark(3, IDAM);
        builder.bytes(&[0, 0, 2, 1]).crc(mark);
        let track = builder.finish(DEFAULT_TRACK_SIZE);

        assert!(find_address_mark(&track, 0).is_some());
        assert!(find_sector(&track, 1, 0).is_none());
    }

    #[test]
    fn test_saturated_track() {
        let mut builder = TrackBuilder::new();
        builder.mark(64, GAP_BYTE);
        // The marker byte is truncated, leaving a track made of sync bytes only.
        let track = builder.finish(64);
        assert!(find_address_mark(&track, 0).is_none());
    }

    #[test]
    fn test_iter_visits_each_mark_once() {
        let track = two_sector_track();
        let ids = AddressMarkIter::new(&track).map(|m| m.id.s).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2]);

        let empty = Track::new(100);
        assert_eq!(AddressMarkIter::new(&empty).count(), 0);
    }
}
