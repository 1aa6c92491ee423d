//! Stamp bitmap cache
//!
//! Bitmaps are deduplicated by where they came from: file metadata for local
//! images, the URL otherwise. Editors hold an `Arc` to their bitmap, so an
//! entry is only dropped by [`BitmapCache::prune`] once no editor uses it.
//!
//! Decoding is left to the host. The cache only stores the encoded bytes with
//! the dimensions the host reported.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use pdf_annotator_scheduler::CancellationToken;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{EditorError, EditorResult};
use crate::ids::EditorId;

/// What makes two bitmaps the same image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum BitmapKey {
    File { name: String, size: u64, last_modified: u64, mime: String },
    Url { url: String },
}

/// Cached image bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    /// Content id referenced by serialized stamps (`bitmapId`).
    pub id: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    /// Pixel size reported by the decoder.
    pub size: Option<(u32, u32)>,
}

impl Bitmap {
    /// Inline form used in clipboard payloads.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

/// Splits a base64 data URL into its mime type and bytes.
pub fn parse_data_url(url: &str) -> EditorResult<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| EditorError::Bitmap("not a data URL".to_owned()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| EditorError::Bitmap("data URL without payload".to_owned()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| EditorError::Bitmap("data URL is not base64 encoded".to_owned()))?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|err| EditorError::Bitmap(format!("invalid base64 payload: {err}")))?;
    Ok((mime.to_owned(), bytes))
}

/// Where a stamp's image comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum BitmapSource {
    /// Local file. The metadata is the cache key.
    File { name: String, size: u64, last_modified: u64, mime: String },
    /// Remote or data URL.
    Url { url: String },
    /// Already cached bitmap.
    Id { id: String },
}

impl BitmapSource {
    pub fn key(&self) -> Option<BitmapKey> {
        match self {
            Self::File { name, size, last_modified, mime } => Some(BitmapKey::File {
                name: name.clone(),
                size: *size,
                last_modified: *last_modified,
                mime: mime.clone(),
            }),
            Self::Url { url } => Some(BitmapKey::Url { url: url.clone() }),
            Self::Id { .. } => None,
        }
    }
}

/// What the host hands back once it has read and decoded an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedBitmap {
    pub mime: String,
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Image load the host must perform for a pending stamp.
#[derive(Debug, Clone)]
pub struct BitmapRequest {
    pub editor_id: EditorId,
    pub source: BitmapSource,
    /// Cancelled when the stamp goes away before the image arrives.
    pub token: CancellationToken,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitmapCacheStats {
    pub bitmaps: usize,
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct BitmapCache {
    by_id: HashMap<String, Arc<Bitmap>>,
    by_key: HashMap<BitmapKey, String>,
    hits: u64,
    misses: u64,
}

impl BitmapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached bitmap for `key`, if that image was seen before.
    pub fn lookup(&mut self, key: &BitmapKey) -> Option<Arc<Bitmap>> {
        let found = self.by_key.get(key).and_then(|id| self.by_id.get(id)).cloned();
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    pub fn get(&self, id: &str) -> Option<Arc<Bitmap>> {
        self.by_id.get(id).cloned()
    }

    /// Stores decoded bytes, reusing the existing entry for the same key.
    pub fn insert(&mut self, key: Option<BitmapKey>, decoded: DecodedBitmap) -> Arc<Bitmap> {
        let size = Some((decoded.width, decoded.height));
        self.store(key, decoded.mime, decoded.bytes, size)
    }

    fn store(
        &mut self,
        key: Option<BitmapKey>,
        mime: String,
        bytes: Vec<u8>,
        size: Option<(u32, u32)>,
    ) -> Arc<Bitmap> {
        if let Some(existing) = key.as_ref().and_then(|key| self.by_key.get(key)).and_then(|id| self.by_id.get(id)) {
            return Arc::clone(existing);
        }

        let bitmap = Arc::new(Bitmap {
            id: format!("image_{}", Uuid::new_v4().simple()),
            mime,
            bytes,
            size,
        });
        debug!(id = %bitmap.id, bytes = bitmap.bytes.len(), "bitmap cached");

        if let Some(key) = key {
            self.by_key.insert(key, bitmap.id.clone());
        }
        self.by_id.insert(bitmap.id.clone(), Arc::clone(&bitmap));
        bitmap
    }

    /// Imports an inlined clipboard bitmap. Pasting the same data twice
    /// shares one entry.
    pub fn import_data_url(&mut self, url: &str) -> EditorResult<Arc<Bitmap>> {
        let key = BitmapKey::Url { url: url.to_owned() };
        if let Some(bitmap) = self.lookup(&key) {
            return Ok(bitmap);
        }

        let (mime, bytes) = parse_data_url(url)?;
        Ok(self.store(Some(key), mime, bytes, None))
    }

    /// Drops bitmaps no editor references. Returns how many were dropped.
    pub fn prune(&mut self) -> usize {
        let unused: Vec<String> = self
            .by_id
            .iter()
            .filter(|(_, bitmap)| Arc::strong_count(bitmap) == 1)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &unused {
            self.by_id.remove(id);
        }
        self.by_key.retain(|_, id| !unused.contains(id));
        if !unused.is_empty() {
            debug!(count = unused.len(), "pruned unused bitmaps");
        }
        unused.len()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn stats(&self) -> BitmapCacheStats {
        BitmapCacheStats {
            bitmaps: self.by_id.len(),
            bytes: self.by_id.values().map(|bitmap| bitmap.bytes.len()).sum(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}
