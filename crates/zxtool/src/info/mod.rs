/*
    zxtool
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
use crate::args::GlobalOptions;
use crate::open_image;
use anyhow::Error;
use strum::IntoEnumIterator;
use zxfloppy::{file_parsers::filter_writable, DiskCh, DiskImageFileFormat};

pub mod args;

pub(crate) fn run(_global: &GlobalOptions, params: &args::InfoParams) -> Result<(), Error> {
    let disk = open_image(&params.in_file)?;

    if let Some(format) = disk.format() {
        println!("Detected disk image type: {}", format);
    }

    println!("Disk image info:");
    println!("{}", "-".repeat(79));
    println!("Cylinders: {} Heads: {}", disk.cylinders(), disk.heads());
    println!("Read only: {}", disk.is_read_only());

    for c in 0..disk.cylinders() {
        for h in 0..disk.heads() {
            let ch = DiskCh::new(c as u16, h as u8);
            if disk.find_track(ch).is_none() {
                println!("  Track {}: not present", ch);
                continue;
            }
            let sectors = disk.track_sectors(ch);
            let bad = sectors
                .iter()
                .filter(|entry| entry.sector.map_or(true, |s| !s.is_ok()))
                .count();
            println!("  Track {}: {} sectors, {} bad or without data", ch, sectors.len(), bad);

            if params.sector_list {
                for entry in &sectors {
                    let status = match entry.sector {
                        Some(s) if s.is_deleted() => "deleted",
                        Some(s) if !s.is_ok() => "bad crc",
                        Some(_) => "ok",
                        None => "no data",
                    };
                    println!("    {} {}", entry.address.id, status);
                }
            }
        }
    }
    println!();

    match (disk.disk_info(), disk.catalog()) {
        (Ok(info), Ok(catalog)) if info.is_trdos() => {
            println!("TR-DOS catalog:");
            println!("{}", "-".repeat(79));
            println!(
                "Label: '{}' Disk type: {:02X} Files: {} Deleted: {} Free sectors: {}",
                String::from_utf8_lossy(&info.label),
                info.disk_type,
                info.file_count,
                info.deleted_count,
                info.free_sectors
            );
            for entry in catalog {
                println!("  {}", entry);
            }
        }
        _ => println!("No TR-DOS catalog found."),
    }
    println!();

    println!("Image can be written to the following formats:");
    let formats = filter_writable(&disk, DiskImageFileFormat::iter().collect());
    for format in formats {
        println!("  {}", format);
    }

    Ok(())
}
