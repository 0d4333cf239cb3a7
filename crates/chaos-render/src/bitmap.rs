//! Named bitmap regions inside texture atlas pages

use std::collections::HashMap;

/// Where a bitmap lives in the atlas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitmapTexcoords {
    /// Atlas page (texture array layer)
    pub page: u32,
    /// Bottom-left corner, normalized
    pub min: [f32; 2],
    /// Top-right corner, normalized
    pub max: [f32; 2],
}

impl Default for BitmapTexcoords {
    fn default() -> Self {
        Self {
            page: 0,
            min: [0.0, 0.0],
            max: [1.0, 1.0],
        }
    }
}

impl BitmapTexcoords {
    /// Texcoords for the four quad corners, in
    /// `[top-left, top-right, bottom-left, bottom-right]` order
    pub fn corners(&self) -> [[f32; 3]; 4] {
        let page = self.page as f32;
        [
            [self.min[0], self.max[1], page],
            [self.max[0], self.max[1], page],
            [self.min[0], self.min[1], page],
            [self.max[0], self.min[1], page],
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitmapInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub texcoords: BitmapTexcoords,
}

/// Bitmaps by name. Packing them into pages happens elsewhere.
#[derive(Default)]
pub struct BitmapSet {
    bitmaps: HashMap<String, BitmapInfo>,
}

impl BitmapSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, info: BitmapInfo) {
        self.bitmaps.insert(info.name.clone(), info);
    }

    pub fn find_bitmap_info(&self, name: &str) -> Option<&BitmapInfo> {
        self.bitmaps.get(name)
    }

    pub fn len(&self) -> usize {
        self.bitmaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bitmaps.is_empty()
    }
}
