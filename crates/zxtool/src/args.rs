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
use bpaf::*;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use crate::convert::args::{convert_parser, ConvertParams};
use crate::dump::args::{dump_parser, DumpParams};
use crate::info::args::{info_parser, InfoParams};

#[derive(Clone, Debug)]
pub enum Command {
    Version,
    Convert(ConvertParams),
    Dump(DumpParams),
    Info(InfoParams),
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Command::Version => write!(f, "version"),
            Command::Convert(_) => write!(f, "convert"),
            Command::Dump(_) => write!(f, "dump"),
            Command::Info(_) => write!(f, "info"),
        }
    }
}

#[derive(Debug)]
pub struct AppParams {
    pub global: GlobalOptions,
    pub command: Command,
}

#[derive(Debug)]
pub struct GlobalOptions {
    pub silent: bool,
}

pub fn global_options_parser() -> impl Parser<GlobalOptions> {
    let silent = long("silent")
        .help("Suppress all output except required output")
        .switch(); // Switch returns a bool, true if the flag is present

    construct!(GlobalOptions { silent })
}

pub(crate) fn in_file_parser() -> impl Parser<PathBuf> {
    long("in_file")
        .short('i')
        .argument::<PathBuf>("IN_FILE")
        .help("Path to input file")
}

pub(crate) fn out_file_parser() -> impl Parser<PathBuf> {
    long("out_file")
        .short('o')
        .argument::<PathBuf>("OUT_FILE")
        .help("Path to output file. The output format is chosen by its extension")
}

pub(crate) fn command_parser() -> impl Parser<AppParams> {
    let global = global_options_parser();

    let version = pure(Command::Version)
        .to_options()
        .command("version")
        .help("Display version information and exit");

    let convert = construct!(Command::Convert(convert_parser()))
        .to_options()
        .command("convert")
        .help("Convert a disk image to another format");
    let dump = construct!(Command::Dump(dump_parser()))
        .to_options()
        .command("dump")
        .help("Dump a sector from a disk image");
    let info = construct!(Command::Info(info_parser()))
        .to_options()
        .command("info")
        .help("Display information about a disk image");

    let command = construct!([version, convert, dump, info]);

    construct!(AppParams { global, command })
}

pub(crate) fn sector_parser() -> impl Parser<u8> {
    long("sector")
        .short('s')
        .argument::<u8>("SECTOR")
        .help("Specify the sector number to dump")
}

pub(crate) fn cylinder_parser() -> impl Parser<u16> {
    long("cylinder")
        .short('c')
        .argument::<u16>("CYLINDER")
        .help("Specify the cylinder number to dump")
        .guard(|&cylinder| cylinder < 256, "Cylinder must be less than 256")
}

pub(crate) fn head_parser() -> impl Parser<u8> {
    long("head")
        .short('h')
        .argument::<u8>("HEAD")
        .help("Specify the head number to dump")
        .guard(|&head| head == 0 || head == 1, "Head must be either 0 or 1")
}
