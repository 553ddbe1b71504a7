/// Texture paths referenced by materials
///
/// Each distinct path gets a slot index on first registration; later
/// registrations of the same path return the same slot. Slots index the
/// texture table bound to the shaders.

use std::path::{Path, PathBuf};
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct TextureRegistry {
    paths: Vec<PathBuf>,
    slots: FxHashMap<PathBuf, u32>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot of `path`, registering it if needed
    pub fn register(&mut self, path: impl AsRef<Path>) -> u32 {
        let path = path.as_ref();
        if let Some(&slot) = self.slots.get(path) {
            return slot;
        }
        let slot = self.paths.len() as u32;
        self.paths.push(path.to_path_buf());
        self.slots.insert(path.to_path_buf(), slot);
        slot
    }

    pub fn slot(&self, path: impl AsRef<Path>) -> Option<u32> {
        self.slots.get(path.as_ref()).copied()
    }

    pub fn path(&self, slot: u32) -> Option<&Path> {
        self.paths.get(slot as usize).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Registered paths in slot order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Path)> {
        self.paths.iter().enumerate().map(|(i, p)| (i as u32, p.as_path()))
    }
}

/// Decoded RGBA8 image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TextureData {
    /// Wrap tightly packed RGBA8 pixels
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(Error::InvalidResource(format!(
                "Texture data of {}x{} needs {} bytes, got {}",
                width, height, expected, pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }

    /// 1x1 texture of one colour
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self { width: 1, height: 1, pixels: rgba.to_vec() }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Image decoding collaborator
pub trait TextureSource {
    fn load(&self, path: &Path) -> Result<TextureData>;
}

#[cfg(test)]
#[path = "texture_registry_tests.rs"]
mod tests;
