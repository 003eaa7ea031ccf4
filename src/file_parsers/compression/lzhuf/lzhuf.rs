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

    src/file_parsers/compression/lzhuf/lzhuf.rs

    LZSS compression with adaptive Huffman coding, compatible with the 'advanced compression'
    mode of TeleDisk images.
*/

//! The stream carries no header. Literal bytes are coded as symbols 0-255 and matches as
//! symbols 256 and up, where the symbol encodes the match length and is followed by a coded
//! position counting backwards from the current window position.
//!
//! The decoder runs until the input bits are exhausted. Bits past the end of the input read as
//! zero, so the padding of the final byte may produce a few trailing bytes of garbage. Callers
//! that know the expected length should pass it as a limit.

use super::adaptive_huff::{AdaptiveHuffmanCoder, AdaptiveHuffmanDecoder};
use super::ring_buffer::RingBuffer;
use super::Options;

/// Bound on the number of earlier candidates examined per match search.
const MAX_CHAIN: usize = 256;

fn symbol_ct(opt: &Options) -> usize {
    256 + opt.lookahead - opt.threshold
}

/// Expand an LZHUF stream. Expansion stops when the input is exhausted or once `limit` bytes
/// have been produced.
pub fn expand(packed: &[u8], limit: Option<usize>, opt: &Options) -> Vec<u8> {
    let limit = limit.unwrap_or(usize::MAX);
    let mut huff = AdaptiveHuffmanDecoder::new(symbol_ct(opt), packed);
    let mut window = RingBuffer::new(opt.window_size);
    let start_pos = opt.window_size - opt.lookahead;
    window.fill(start_pos, opt.precursor);
    window.set_pos(start_pos);

    let mut out = Vec::with_capacity(std::cmp::min(packed.len().saturating_mul(3), limit));
    while !huff.is_exhausted() && out.len() < limit {
        let c = huff.decode_char();
        if c < 256 {
            out.push(c as u8);
            window.push(c as u8);
        }
        else {
            let distance = huff.decode_position() + 1;
            let match_len = c + opt.threshold - 255;
            for _ in 0..match_len {
                let byte = window.behind(distance);
                out.push(byte);
                window.push(byte);
            }
        }
    }

    out.truncate(limit);
    out
}

/// Compress `data` into an LZHUF stream. Matches are found greedily with a hash chain over
/// three byte prefixes.
pub fn compress(data: &[u8], opt: &Options) -> Vec<u8> {
    let mut huff = AdaptiveHuffmanCoder::new(symbol_ct(opt));
    let hash_size = 1 << 16;
    let mut head = vec![usize::MAX; hash_size];
    let mut prev = vec![usize::MAX; data.len()];

    let hash = |pos: usize| -> Option<usize> {
        if pos + 2 < data.len() {
            Some((((data[pos] as usize) << 8) ^ ((data[pos + 1] as usize) << 4) ^ data[pos + 2] as usize) & (hash_size - 1))
        }
        else {
            None
        }
    };

    let mut cur = 0;
    while cur < data.len() {
        let mut best_len = 0;
        let mut best_pos = 0;

        if let Some(h) = hash(cur) {
            let mut candidate = head[h];
            let mut chain = 0;
            while candidate != usize::MAX && cur - candidate < opt.window_size - 1 && chain < MAX_CHAIN {
                let mut len = 0;
                while cur + len < data.len() && len < opt.lookahead && data[candidate + len] == data[cur + len] {
                    len += 1;
                }
                if len > best_len {
                    best_len = len;
                    best_pos = candidate;
                    if len == opt.lookahead {
                        break;
                    }
                }
                candidate = prev[candidate];
                chain += 1;
            }
        }

        let step = if best_len > opt.threshold {
            huff.encode_char(255 - opt.threshold + best_len);
            huff.encode_position(cur - best_pos - 1);
            best_len
        }
        else {
            huff.encode_char(data[cur] as usize);
            1
        };

        for pos in cur..cur + step {
            if let Some(h) = hash(pos) {
                prev[pos] = head[h];
                head[h] = pos;
            }
        }
        cur += step;
    }

    huff.finish()
}

#[cfg(test)]
mod tests {
    use super::super::TD0_OPTIONS;
    use super::*;

    fn lcg_bytes(len: usize, alphabet: &[u8]) -> Vec<u8> {
        let mut state: u32 = 0x1234_5678;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
                alphabet[(state >> 16) as usize % alphabet.len()]
            })
            .collect()
    }

    #[test]
    fn expansion_works() {
        let packed = hex::decode("DEEFB7FC0E0C701385C3E27164811960").unwrap();
        let expanded = expand(&packed, Some(24), &TD0_OPTIONS);
        assert_eq!(expanded, b"12345123456789123456789\n".to_vec());

        let packed = hex::decode(
            "EAEB3DBF9C4EFE1E16EA34091C0DC08C02FC3F773F5720177F1F5FBFC6AB7FA5AFFE4C3996",
        )
        .unwrap();
        let expanded = expand(&packed, None, &TD0_OPTIONS);
        assert_eq!(expanded, b"I am Sam. Sam I am. I do not like this Sam I am.\n".to_vec());
    }

    #[test]
    fn invertibility() {
        let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
        let compressed = compress(test_data, &TD0_OPTIONS);
        let expanded = expand(&compressed, None, &TD0_OPTIONS);
        assert_eq!(test_data.to_vec(), expanded[0..test_data.len()]);

        let test_data = "1234567".as_bytes();
        let compressed = compress(test_data, &TD0_OPTIONS);
        let expanded = expand(&compressed, Some(test_data.len()), &TD0_OPTIONS);
        assert_eq!(test_data.to_vec(), expanded);
    }

    #[test]
    fn long_runs_compress() {
        let test_data = vec![0u8; 300_000];
        let compressed = compress(&test_data, &TD0_OPTIONS);
        assert!(compressed.len() < test_data.len() / 10);
        assert_eq!(expand(&compressed, Some(test_data.len()), &TD0_OPTIONS), test_data);
    }

    #[test]
    fn tree_rebuild_round_trip() {
        // Enough symbols to force several rebuilds of the Huffman tree.
        let text = lcg_bytes(60_000, b"abcdefgh ");
        let compressed = compress(&text, &TD0_OPTIONS);
        assert_eq!(expand(&compressed, Some(text.len()), &TD0_OPTIONS), text);

        let noise = lcg_bytes(40_000, &(0..=255u8).collect::<Vec<_>>());
        let compressed = compress(&noise, &TD0_OPTIONS);
        assert_eq!(expand(&compressed, Some(noise.len()), &TD0_OPTIONS), noise);
    }

    #[test]
    fn empty_input() {
        assert!(compress(&[], &TD0_OPTIONS).is_empty());
        assert!(expand(&[], None, &TD0_OPTIONS).is_empty());
    }
}
