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

    src/file_parsers/compression/lzhuf/adaptive_huff.rs

    Adaptive Huffman coding stage of LZHUF.
*/

//! The adaptive Huffman tree is kept in the same flat array layout as `LZHUF.C`: leaves first,
//! then branches in ascending frequency order, with the root in the last slot. A right son is
//! always stored immediately after its left son, so only left sons are recorded.
//! The same update rules on both sides keep the encoder and decoder trees in lockstep.

use bit_vec::BitVec;

/// Bit lengths of the codes for the upper 6 bits of a match position.
const P_LEN: [u8; 64] = [
    0x03, 0x04, 0x04, 0x04, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06,
    0x06, 0x06, 0x06, 0x06, 0x06, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07,
    0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08,
    0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08,
];

/// Codes for the upper 6 bits of a match position, left aligned in a byte.
const P_CODE: [u8; 64] = [
    0x00, 0x20, 0x30, 0x40, 0x50, 0x58, 0x60, 0x68, 0x70, 0x78, 0x80, 0x88, 0x90, 0x94, 0x98, 0x9C, 0xA0, 0xA4, 0xA8,
    0xAC, 0xB0, 0xB4, 0xB8, 0xBC, 0xC0, 0xC2, 0xC4, 0xC6, 0xC8, 0xCA, 0xCC, 0xCE, 0xD0, 0xD2, 0xD4, 0xD6, 0xD8, 0xDA,
    0xDC, 0xDE, 0xE0, 0xE2, 0xE4, 0xE6, 0xE8, 0xEA, 0xEC, 0xEE, 0xF0, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8,
    0xF9, 0xFA, 0xFB, 0xFC, 0xFD, 0xFE, 0xFF,
];

/// Code length indexed by the next 8 bits of the stream.
const D_LEN: [u8; 256] = [
    0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03,
    0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04,
    0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04,
    0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04,
    0x04, 0x04, 0x04, 0x04, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05,
    0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05,
    0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05,
    0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06,
    0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06,
    0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06,
    0x06, 0x06, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07,
    0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07,
    0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08,
    0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08,
];

/// Upper 6 bits of a match position indexed by the next 8 bits of the stream.
const D_CODE: [u8; 256] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
    0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02,
    0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03,
    0x03, 0x03, 0x03, 0x03, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05,
    0x05, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x08, 0x08,
    0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x09, 0x09, 0x09, 0x09, 0x09, 0x09, 0x09, 0x09, 0x0A, 0x0A, 0x0A, 0x0A, 0x0A,
    0x0A, 0x0A, 0x0A, 0x0B, 0x0B, 0x0B, 0x0B, 0x0B, 0x0B, 0x0B, 0x0B, 0x0C, 0x0C, 0x0C, 0x0C, 0x0D, 0x0D, 0x0D, 0x0D,
    0x0E, 0x0E, 0x0E, 0x0E, 0x0F, 0x0F, 0x0F, 0x0F, 0x10, 0x10, 0x10, 0x10, 0x11, 0x11, 0x11, 0x11, 0x12, 0x12, 0x12,
    0x12, 0x13, 0x13, 0x13, 0x13, 0x14, 0x14, 0x14, 0x14, 0x15, 0x15, 0x15, 0x15, 0x16, 0x16, 0x16, 0x16, 0x17, 0x17,
    0x17, 0x17, 0x18, 0x18, 0x19, 0x19, 0x1A, 0x1A, 0x1B, 0x1B, 0x1C, 0x1C, 0x1D, 0x1D, 0x1E, 0x1E, 0x1F, 0x1F, 0x20,
    0x20, 0x21, 0x21, 0x22, 0x22, 0x23, 0x23, 0x24, 0x24, 0x25, 0x25, 0x26, 0x26, 0x27, 0x27, 0x28, 0x28, 0x29, 0x29,
    0x2A, 0x2A, 0x2B, 0x2B, 0x2C, 0x2C, 0x2D, 0x2D, 0x2E, 0x2E, 0x2F, 0x2F, 0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36,
    0x37, 0x38, 0x39, 0x3A, 0x3B, 0x3C, 0x3D, 0x3E, 0x3F,
];

/// Frequency of the root that triggers a rebuild of the tree.
const MAX_FREQ: usize = 0x8000;

pub(crate) struct AdaptiveHuffmanTree {
    /// Number of symbols (leaves)
    symbols: usize,
    /// Number of nodes in the tree
    node_ct: usize,
    root: usize,
    /// Node frequencies. The extra slot past the last node is a backstop that stops the sort.
    freq: Vec<usize>,
    /// Parent of each node, followed by the leaf node of each symbol.
    parent: Vec<usize>,
    /// Left son of every node. Values >= node_ct denote a leaf for symbol `son - node_ct`.
    son: Vec<usize>,
}

impl AdaptiveHuffmanTree {
    pub(crate) fn new(symbols: usize) -> Self {
        let node_ct = 2 * symbols - 1;
        let mut tree = Self {
            symbols,
            node_ct,
            root: node_ct - 1,
            freq: vec![0; node_ct + 1],
            parent: vec![0; node_ct + symbols],
            son: vec![0; node_ct],
        };

        for i in 0..symbols {
            tree.freq[i] = 1;
            tree.son[i] = i + node_ct;
            tree.parent[i + node_ct] = i;
        }

        let mut i = 0;
        for j in symbols..node_ct {
            tree.freq[j] = tree.freq[i] + tree.freq[i + 1];
            tree.son[j] = i;
            tree.parent[i] = j;
            tree.parent[i + 1] = j;
            i += 2;
        }

        tree.freq[node_ct] = 0xFFFF;
        tree.parent[tree.root] = 0;
        tree
    }

    fn is_leaf(&self, node: usize) -> bool {
        self.son[node] >= self.node_ct
    }

    fn leaf_of(&self, symbol: usize) -> usize {
        self.parent[symbol + self.node_ct]
    }

    /// Set the parent of the node(s) referenced by `son`, which is either a leaf reference or
    /// the left son of a pair.
    fn adopt(&mut self, son: usize, parent: usize) {
        self.parent[son] = parent;
        if son < self.node_ct {
            self.parent[son + 1] = parent;
        }
    }

    /// Halve all leaf frequencies and rebuild the branches.
    fn rebuild(&mut self) {
        log::trace!("AdaptiveHuffmanTree::rebuild(): root frequency reached {:#X}", MAX_FREQ);
        let mut j = 0;
        for i in 0..self.node_ct {
            if self.is_leaf(i) {
                self.freq[j] = (self.freq[i] + 1) / 2;
                self.son[j] = self.son[i];
                j += 1;
            }
        }

        let mut i = 0;
        for j in self.symbols..self.node_ct {
            let f = self.freq[i] + self.freq[i + 1];
            self.freq[j] = f;

            let mut k = j - 1;
            while f < self.freq[k] {
                k -= 1;
            }
            k += 1;

            self.freq.copy_within(k..j, k + 1);
            self.freq[k] = f;
            self.son.copy_within(k..j, k + 1);
            self.son[k] = i;
            i += 2;
        }

        for i in 0..self.node_ct {
            let k = self.son[i];
            self.adopt(k, i);
        }
    }

    /// Increment the frequency of `symbol` and restore the sibling ordering.
    pub(crate) fn update(&mut self, symbol: usize) {
        if self.freq[self.root] == MAX_FREQ {
            self.rebuild();
        }

        let mut c = self.leaf_of(symbol);
        loop {
            self.freq[c] += 1;
            let k = self.freq[c];

            if k > self.freq[c + 1] {
                let mut l = c + 1;
                while k > self.freq[l + 1] {
                    l += 1;
                }

                self.freq[c] = self.freq[l];
                self.freq[l] = k;

                let i = self.son[c];
                self.adopt(i, l);
                let j = self.son[l];
                self.son[l] = i;
                self.adopt(j, c);
                self.son[c] = j;

                c = l;
            }

            c = self.parent[c];
            if c == 0 {
                break;
            }
        }
    }
}

/// Collects output bits MSB first.
#[derive(Default)]
pub(crate) struct BitWriter {
    bits: BitVec,
}

impl BitWriter {
    /// Append the low `count` bits of `value`, most significant first.
    pub(crate) fn put(&mut self, value: u32, count: u8) {
        for i in (0..count).rev() {
            self.bits.push((value >> i) & 1 != 0);
        }
    }

    /// Return the collected bits, zero padded to a whole byte.
    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bits.to_bytes()
    }
}

/// Reads bits MSB first. Reads past the end of the input return 0.
pub(crate) struct BitReader {
    bits: BitVec,
    pos: usize,
}

impl BitReader {
    pub(crate) fn new(data: &[u8]) -> Self {
        Self {
            bits: BitVec::from_bytes(data),
            pos: 0,
        }
    }

    pub(crate) fn bit(&mut self) -> usize {
        let bit = self.bits.get(self.pos).unwrap_or(false);
        self.pos += 1;
        bit as usize
    }

    pub(crate) fn byte(&mut self) -> usize {
        let mut byte = 0;
        for _ in 0..8 {
            byte = (byte << 1) | self.bit();
        }
        byte
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.pos >= self.bits.len()
    }
}

pub(crate) struct AdaptiveHuffmanCoder {
    tree: AdaptiveHuffmanTree,
    out: BitWriter,
}

impl AdaptiveHuffmanCoder {
    pub(crate) fn new(symbols: usize) -> Self {
        Self {
            tree: AdaptiveHuffmanTree::new(symbols),
            out: BitWriter::default(),
        }
    }

    pub(crate) fn encode_char(&mut self, symbol: usize) {
        // Walk from the leaf up to the root. Odd slots are right sons.
        let mut path = Vec::with_capacity(32);
        let mut node = self.tree.leaf_of(symbol);
        loop {
            path.push(node & 1 != 0);
            node = self.tree.parent[node];
            if node == self.tree.root {
                break;
            }
        }
        for bit in path.into_iter().rev() {
            self.out.put(bit as u32, 1);
        }
        self.tree.update(symbol);
    }

    pub(crate) fn encode_position(&mut self, position: usize) {
        let upper = (position >> 6) & 0x3F;
        let len = P_LEN[upper];
        self.out.put((P_CODE[upper] >> (8 - len)) as u32, len);
        self.out.put((position & 0x3F) as u32, 6);
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.out.into_bytes()
    }
}

pub(crate) struct AdaptiveHuffmanDecoder {
    tree: AdaptiveHuffmanTree,
    input: BitReader,
}

impl AdaptiveHuffmanDecoder {
    pub(crate) fn new(symbols: usize, data: &[u8]) -> Self {
        Self {
            tree: AdaptiveHuffmanTree::new(symbols),
            input: BitReader::new(data),
        }
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.input.is_exhausted()
    }

    pub(crate) fn decode_char(&mut self) -> usize {
        let mut c = self.tree.son[self.tree.root];
        while c < self.tree.node_ct {
            c = self.tree.son[c + self.input.bit()];
        }
        let symbol = c - self.tree.node_ct;
        self.tree.update(symbol);
        symbol
    }

    pub(crate) fn decode_position(&mut self) -> usize {
        let mut i = self.input.byte();
        let upper = (D_CODE[i] as usize) << 6;
        // Eight bits are already consumed, the code plus 6 raw bits need D_LEN + 6 in total.
        for _ in 0..(D_LEN[i] - 2) {
            i = (i << 1) | self.input.bit();
        }
        upper | (i & 0x3F)
    }
}
