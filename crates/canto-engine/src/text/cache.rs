use std::collections::HashMap;

use super::FontId;
use crate::texture::TextureHandle;

/// Texture holding one rasterized string.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextEntry {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
    last_used: u64,
}

/// Rasterized strings keyed by font, pixel height and text.
///
/// Entries not drawn for `max_idle` frames are evicted; the caller releases
/// the returned handles.
#[derive(Debug)]
pub struct TextCache {
    entries: HashMap<(FontId, u32), HashMap<String, TextEntry>>,
    max_idle: u64,
}

impl TextCache {
    pub fn new(max_idle: u32) -> Self {
        Self { entries: HashMap::new(), max_idle: u64::from(max_idle) }
    }

    fn key(font: FontId, px: f32) -> (FontId, u32) {
        (font, px.to_bits())
    }

    /// Looks up a string and marks it used in `frame`.
    pub fn get(&mut self, font: FontId, px: f32, text: &str, frame: u64) -> Option<TextEntry> {
        let entry = self.entries.get_mut(&Self::key(font, px))?.get_mut(text)?;
        entry.last_used = frame;
        Some(*entry)
    }

    pub fn insert(
        &mut self,
        font: FontId,
        px: f32,
        text: &str,
        handle: TextureHandle,
        size: (u32, u32),
        frame: u64,
    ) -> TextEntry {
        let entry = TextEntry { handle, width: size.0, height: size.1, last_used: frame };
        self.entries.entry(Self::key(font, px)).or_default().insert(text.to_owned(), entry);
        entry
    }

    /// Removes entries idle for more than `max_idle` frames.
    pub fn evict(&mut self, frame: u64) -> Vec<TextureHandle> {
        let max_idle = self.max_idle;
        let mut evicted = Vec::new();
        for strings in self.entries.values_mut() {
            strings.retain(|_, e| {
                let keep = frame.saturating_sub(e.last_used) <= max_idle;
                if !keep {
                    evicted.push(e.handle);
                }
                keep
            });
        }
        self.entries.retain(|_, strings| !strings.is_empty());
        evicted
    }

    /// Empties the cache, returning every handle.
    pub fn drain(&mut self) -> Vec<TextureHandle> {
        self.entries
            .drain()
            .flat_map(|(_, strings)| strings.into_values().map(|e| e.handle))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_refreshes_and_idle_entries_expire() {
        let mut cache = TextCache::new(2);
        let font = FontId(0);
        cache.insert(font, 24.0, "hello", TextureHandle(1), (40, 24), 0);
        cache.insert(font, 24.0, "bye", TextureHandle(2), (30, 24), 0);

        assert!(cache.get(font, 24.0, "hello", 2).is_some());
        assert!(cache.get(font, 12.0, "hello", 2).is_none());

        let evicted = cache.evict(3);
        assert_eq!(evicted, vec![TextureHandle(2)]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn drain_returns_everything() {
        let mut cache = TextCache::new(10);
        cache.insert(FontId(0), 10.0, "a", TextureHandle(5), (1, 1), 0);
        cache.insert(FontId(1), 10.0, "a", TextureHandle(6), (1, 1), 0);
        let mut handles = cache.drain();
        handles.sort();
        assert_eq!(handles, vec![TextureHandle(5), TextureHandle(6)]);
        assert!(cache.is_empty());
    }
}
