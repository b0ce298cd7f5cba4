//! Named color lists.
//!
//! A list of spot colors, each with a PCS value and up to
//! [`MAX_STAGE_CHANNELS`] device colorants. The named color stage turns a
//! normalized color index into either of them.

use vcms_core::{CmsError, CmsResult, MAX_STAGE_CHANNELS};

/// One entry of a [`NamedColorList`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedColor {
    /// Root name, without the list's prefix and suffix.
    pub name: String,
    /// PCS encoding.
    pub pcs: [u16; 3],
    /// Device colorants; only the list's colorant count is meaningful.
    pub colorant: [u16; MAX_STAGE_CHANNELS],
}

/// Ordered list of named colors sharing a prefix, suffix and colorant count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedColorList {
    prefix: String,
    suffix: String,
    colorant_count: usize,
    colors: Vec<NamedColor>,
}

impl NamedColorList {
    /// Creates an empty list.
    pub fn new(colorant_count: usize, prefix: &str, suffix: &str) -> CmsResult<Self> {
        if colorant_count == 0 || colorant_count > MAX_STAGE_CHANNELS {
            return Err(CmsError::ChannelLimit {
                what: "named color colorants",
                requested: colorant_count,
                max: MAX_STAGE_CHANNELS,
            });
        }
        Ok(Self {
            prefix: prefix.to_owned(),
            suffix: suffix.to_owned(),
            colorant_count,
            colors: Vec::new(),
        })
    }

    /// Appends a color. Colorants beyond the list's count are ignored,
    /// missing ones are zero.
    pub fn append(&mut self, name: &str, pcs: [u16; 3], colorant: &[u16]) {
        let mut c = [0u16; MAX_STAGE_CHANNELS];
        let n = colorant.len().min(self.colorant_count);
        c[..n].copy_from_slice(&colorant[..n]);
        self.colors.push(NamedColor {
            name: name.to_owned(),
            pcs,
            colorant: c,
        });
    }

    /// Position of the color with this root name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.colors.iter().position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Color at `index`.
    pub fn get(&self, index: usize) -> Option<&NamedColor> {
        self.colors.get(index)
    }

    /// Number of colors.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// True when the list holds no colors.
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Device colorants per color.
    pub fn colorant_count(&self) -> usize {
        self.colorant_count
    }

    /// Common name prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Common name suffix.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Full display name of the color at `index`.
    pub fn full_name(&self, index: usize) -> Option<String> {
        self.get(index).map(|c| format!("{}{}{}", self.prefix, c.name, self.suffix))
    }
}
