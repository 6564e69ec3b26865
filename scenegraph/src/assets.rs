use std::collections::HashMap;
use std::fmt;

use crate::buffer::{HeapBuffer, LinearBuffer};

#[derive(Debug)]
pub enum AssetError {
    Missing(String),
    NotUtf8(String),
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::Missing(name) => write!(f, "asset not found: {name}"),
            AssetError::NotUtf8(name) => write!(f, "asset is not valid UTF-8: {name}"),
        }
    }
}

impl std::error::Error for AssetError {}

/// Named store of raw asset buffers. Shader/kernel sources are registered
/// here by the application and pulled out by the renderers.
#[derive(Default)]
pub struct AssetLibrary {
    assets: HashMap<String, HeapBuffer>,
}

impl AssetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_asset(&mut self, name: &str, buffer: HeapBuffer) {
        self.assets.insert(name.to_string(), buffer);
    }

    pub fn get(&self, name: &str) -> Option<&HeapBuffer> {
        self.assets.get(name)
    }

    /// Fetch an asset and decode it as UTF-8 source text.
    pub fn source_str(&self, name: &str) -> Result<&str, AssetError> {
        let buffer = self
            .assets
            .get(name)
            .ok_or_else(|| AssetError::Missing(name.to_string()))?;
        std::str::from_utf8(buffer.as_slice()).map_err(|_| AssetError::NotUtf8(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_lookup() {
        let mut assets = AssetLibrary::new();
        assets.add_asset("tracer.wgsl", HeapBuffer::from_bytes(b"fn main() {}"));

        assert_eq!(assets.source_str("tracer.wgsl").unwrap(), "fn main() {}");
        assert!(matches!(
            assets.source_str("missing.wgsl"),
            Err(AssetError::Missing(_))
        ));
    }

    #[test]
    fn non_utf8_asset_is_reported() {
        let mut assets = AssetLibrary::new();
        assets.add_asset("blob", HeapBuffer::from_bytes(&[0xff, 0xfe]));
        assert!(matches!(
            assets.source_str("blob"),
            Err(AssetError::NotUtf8(_))
        ));
    }
}
