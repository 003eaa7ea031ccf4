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

    src/file_parsers/compression/lzhuf/ring_buffer.rs

    Sliding dictionary window for the LZSS stage.
*/

pub(crate) struct RingBuffer {
    buf: Vec<u8>,
    pos: usize,
    mask: usize,
}

impl RingBuffer {
    /// Create a window of `size` bytes. `size` must be a power of two.
    pub(crate) fn new(size: usize) -> Self {
        Self {
            buf: vec![0; size],
            pos: 0,
            mask: size - 1,
        }
    }

    pub(crate) fn fill(&mut self, len: usize, value: u8) {
        let len = std::cmp::min(len, self.buf.len());
        self.buf[..len].fill(value);
    }

    pub(crate) fn set_pos(&mut self, pos: usize) {
        self.pos = pos & self.mask;
    }

    /// Read the byte `distance` positions behind the write position.
    pub(crate) fn behind(&self, distance: usize) -> u8 {
        self.buf[self.pos.wrapping_sub(distance) & self.mask]
    }

    /// Store a byte at the write position and advance it.
    pub(crate) fn push(&mut self, value: u8) {
        self.buf[self.pos] = value;
        self.pos = (self.pos + 1) & self.mask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapping() {
        let mut ring = RingBuffer::new(4);
        ring.set_pos(5);
        ring.push(b'a');
        ring.push(b'b');
        ring.push(b'c');
        ring.push(b'd');
        assert_eq!(ring.behind(1), b'd');
        assert_eq!(ring.behind(4), b'a');
        // Distances wrap around the window.
        assert_eq!(ring.behind(8), b'a');
    }

    #[test]
    fn test_fill() {
        let mut ring = RingBuffer::new(8);
        ring.fill(6, b' ');
        ring.set_pos(6);
        assert_eq!(ring.behind(1), b' ');
        assert_eq!(ring.behind(6), b' ');
        assert_eq!(ring.behind(7), 0);
    }
}
