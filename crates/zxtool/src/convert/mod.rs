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
pub mod args;

use crate::{args::GlobalOptions, open_image};
use anyhow::{bail, Error};
use zxfloppy::prelude::*;

pub(crate) fn run(global: &GlobalOptions, params: &args::ConvertParams) -> Result<(), Error> {
    let output_format = match DiskImageFileFormat::from_path(&params.out_file) {
        Some(format) => format,
        None => {
            bail!("Error: Unknown output file extension: {}", params.out_file.display());
        }
    };

    let mut in_disk = open_image(&params.in_file)?;

    if !global.silent {
        if let Some(format) = in_disk.format() {
            println!("Input disk image type: {}", format);
        }
        println!("Output disk image type: {}", output_format);
    }

    match output_format.can_write(&in_disk) {
        ParserWriteCompatibility::Ok => {
            if !global.silent {
                println!("Output format is compatible with input image.");
            }
        }
        ParserWriteCompatibility::Incompatible | ParserWriteCompatibility::UnsupportedFormat => {
            bail!("Output format {} cannot write specified image!", output_format);
        }
        ParserWriteCompatibility::DataLoss => {
            eprintln!("Warning: Output format {} may lose data!", output_format);
        }
    }

    let opts = ParserWriteOptions {
        compress: params.compress,
    };
    let mut out_buffer = Vec::new();
    if let Err(e) = in_disk.save(output_format, &opts, &mut out_buffer) {
        bail!("Error saving output image: {}", e);
    }
    for warning in in_disk.warnings() {
        eprintln!("Warning: {}", warning);
    }

    match std::fs::write(&params.out_file, out_buffer) {
        Ok(_) => {
            if !global.silent {
                println!("Output image saved to {}", params.out_file.display());
            }
            Ok(())
        }
        Err(e) => {
            bail!("Error saving output image: {}", e);
        }
    }
}
