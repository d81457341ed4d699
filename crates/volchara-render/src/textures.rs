//! Append-only texture array bookkeeping.

use volchara_gpu::{GpuError, GpuImage};

/// Fixed-capacity list of loaded textures.
///
/// A texture's index is its position in the array and never changes, so
/// objects can keep a plain `u32` handle. Textures are only released when
/// the whole array is.
#[derive(Debug)]
pub struct TextureArray<T = GpuImage> {
    entries: Vec<T>,
    capacity: u32,
}

impl<T> TextureArray<T> {
    pub fn new(capacity: u32) -> Self {
        Self {
            entries: Vec::with_capacity(capacity as usize),
            capacity,
        }
    }

    /// Index the next texture will receive, or `CapacityExceeded` if full.
    pub fn next_index(&self) -> Result<u32, GpuError> {
        let index = self.len();
        if index >= self.capacity {
            return Err(GpuError::CapacityExceeded {
                resource: "texture array".to_string(),
                requested: u64::from(index) + 1,
                capacity: u64::from(self.capacity),
            });
        }
        Ok(index)
    }

    /// Append a texture and return its index.
    pub fn push(&mut self, texture: T) -> Result<u32, GpuError> {
        let index = self.next_index()?;
        self.entries.push(texture);
        Ok(index)
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.entries.get(index as usize)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Remove every texture for destruction.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.entries.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_stable_and_sequential() {
        let mut textures = TextureArray::new(64);
        assert_eq!(textures.push("grass").unwrap(), 0);
        assert_eq!(textures.push("stone").unwrap(), 1);
        assert_eq!(textures.push("water").unwrap(), 2);
        assert_eq!(textures.push("sand").unwrap(), 3);

        assert_eq!(textures.get(0), Some(&"grass"));
        assert_eq!(textures.get(1), Some(&"stone"));
        assert_eq!(textures.get(2), Some(&"water"));
        assert_eq!(textures.len(), 4);
    }

    #[test]
    fn full_array_is_reported() {
        let mut textures = TextureArray::new(2);
        textures.push(()).unwrap();
        textures.push(()).unwrap();

        match textures.push(()) {
            Err(GpuError::CapacityExceeded {
                requested,
                capacity,
                ..
            }) => {
                assert_eq!(requested, 3);
                assert_eq!(capacity, 2);
            }
            other => panic!("expected CapacityExceeded, got {other:?}"),
        }
        assert_eq!(textures.len(), 2);
    }
}
