/*
    Portions derived from retrocompressor by Daniel Gordon
    https://github.com/dfgordon/retrocompressor/
    Copyright (c) 2023 Daniel Gordon

    Permission is hereby granted, free of charge, to any person obtaining a copy
    of this software and associated documentation files (the "Software"), to deal
    in the Software without restriction, including without limitation the rights
    to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
    copies of the Software, and to permit persons to whom the Software is
    furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in all
    copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
    OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
    SOFTWARE.
*/

mod adaptive_huff;
#[allow(clippy::module_inception)]
mod lzhuf;
mod ring_buffer;

/// Options controlling compression
#[derive(Clone, Debug)]
pub struct Options {
    /// size of the dictionary window. Must be 4096, positions are coded in 12 bits.
    window_size: usize,
    /// matches of this length or shorter are coded as literals
    threshold: usize,
    /// longest match
    lookahead: usize,
    /// backfill symbol for the dictionary
    precursor: u8,
}

/// Parameters of the LZHUF variant used by TeleDisk 'advanced compression'.
pub const TD0_OPTIONS: Options = Options {
    window_size: 4096,
    threshold: 2,
    lookahead: 60,
    precursor: b' ',
};

pub use lzhuf::{compress, expand};
