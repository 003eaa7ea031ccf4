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
pub(crate) mod args;

use anyhow::{bail, Error};
use std::io::{BufWriter, Write};

use crate::{args::GlobalOptions, open_image};
use zxfloppy::DiskCh;

pub(crate) fn run(global: &GlobalOptions, params: &args::DumpParams) -> Result<(), Error> {
    let row_size = params.row_size.unwrap_or(16) as usize;
    let disk = open_image(&params.in_file)?;

    let ch = DiskCh::new(params.cylinder, params.head);
    if disk.find_track(ch).is_none() {
        bail!("Specified track: {} not found.", ch);
    }

    let rsr = match disk.read_sector(ch, params.sector) {
        Ok(rsr) => rsr,
        Err(e) => {
            bail!("Error reading sector: {}", e);
        }
    };

    let mut buf = BufWriter::new(std::io::stdout());
    if !global.silent {
        _ = writeln!(
            &mut buf,
            "Dumping sector from {} with id {} ({} bytes){}{}:",
            ch,
            rsr.id,
            rsr.data.len(),
            if rsr.deleted_mark { ", deleted data mark" } else { "" },
            if rsr.crc_error { ", CRC error" } else { "" }
        );
    }

    _ = zxfloppy::util::dump_slice(&rsr.data, 0, row_size, &mut buf);
    Ok(())
}
