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

    src/chs.rs

    Physical track addressing.
*/
use std::fmt::Display;

/// A physical track address: cylinder and head.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Default)]
pub struct DiskCh {
    pub(crate) c: u16,
    pub(crate) h: u8,
}

impl From<(u16, u8)> for DiskCh {
    fn from((c, h): (u16, u8)) -> Self {
        Self { c, h }
    }
}

impl Display for DiskCh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[c:{} h:{}]", self.c, self.h)
    }
}

impl DiskCh {
    pub fn new(c: u16, h: u8) -> Self {
        Self { c, h }
    }
    pub fn c(&self) -> u16 {
        self.c
    }
    pub fn h(&self) -> u8 {
        self.h
    }

    /// The linear track index for a disk with `heads` heads, in TRD/SCL order
    /// (cylinder-major, head-minor).
    pub fn to_index(&self, heads: usize) -> usize {
        self.c as usize * heads + self.h as usize
    }

    /// Inverse of [`DiskCh::to_index`].
    pub fn from_index(index: usize, heads: usize) -> Self {
        let heads = heads.max(1);
        Self {
            c: (index / heads) as u16,
            h: (index % heads) as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        for index in 0..20 {
            let ch = DiskCh::from_index(index, 2);
            assert_eq!(ch.to_index(2), index);
        }
        assert_eq!(DiskCh::from_index(5, 2), DiskCh::new(2, 1));
        assert_eq!(DiskCh::from_index(5, 1), DiskCh::new(5, 0));
    }

    #[test]
    fn test_display() {
        assert_eq!(DiskCh::new(79, 1).to_string(), "[c:79 h:1]");
    }
}
