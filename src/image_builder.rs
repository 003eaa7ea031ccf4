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

    src/image_builder.rs

    Implements the Builder pattern for DiskImage objects.

    Allows for creation of blank, TR-DOS formatted DiskImages.
*/

use crate::{DiskImage, DiskImageError, DiskImageFileFormat};

/// Implements the Builder pattern for DiskImage objects.
/// Allows for creation of blank TR-DOS formatted DiskImages.
pub struct ImageBuilder {
    #[doc = "Number of cylinders for the DiskImage to be built."]
    pub cylinders: usize,
    #[doc = "Number of heads for the DiskImage to be built."]
    pub heads: usize,
    #[doc = "Specify the disk label to store in the TR-DOS disk information block."]
    pub label: Option<[u8; 8]>,
    #[doc = "Specify the [`DiskImageFileFormat`] the DiskImage should report."]
    pub format: Option<DiskImageFileFormat>,
    #[doc = "Specify whether the DiskImage should reject sector writes."]
    pub read_only: bool,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self {
            cylinders: 80,
            heads: 2,
            label: None,
            format: Some(DiskImageFileFormat::Trd),
            read_only: false,
        }
    }
}

impl ImageBuilder {
    pub fn new() -> ImageBuilder {
        Default::default()
    }

    /// Set the geometry of the [`DiskImage`] to be built.
    pub fn with_geometry(mut self, cylinders: usize, heads: usize) -> ImageBuilder {
        self.cylinders = cylinders;
        self.heads = heads;
        self
    }

    /// Set the disk label for the [`DiskImage`] to be built. Labels shorter than eight bytes are
    /// padded with spaces; longer labels are truncated.
    pub fn with_label(mut self, label: &[u8]) -> ImageBuilder {
        let mut new_label = [0x20; 8];
        let max_len = label.len().min(8);
        new_label[..max_len].copy_from_slice(&label[..max_len]);

        self.label = Some(new_label);
        self
    }

    /// Set the [`DiskImageFileFormat`] for the [`DiskImage`] to be built.
    pub fn with_format(mut self, format: DiskImageFileFormat) -> ImageBuilder {
        self.format = Some(format);
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> ImageBuilder {
        self.read_only = read_only;
        self
    }

    /// Build the [`DiskImage`] using the specified parameters.
    pub fn build(self) -> Result<DiskImage, DiskImageError> {
        let mut disk_image = DiskImage::new();

        log::debug!(
            "ImageBuilder::build(): Formatting {}x{} TR-DOS disk image",
            self.cylinders,
            self.heads
        );
        disk_image.format_trdos(self.cylinders, self.heads, self.label.as_ref())?;
        disk_image.set_format(self.format);
        disk_image.set_read_only(self.read_only);

        // Clear dirty flag
        disk_image.dirty = false;

        Ok(disk_image)
    }
}
