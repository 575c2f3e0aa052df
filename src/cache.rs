use crate::id::ShaderHandle;
use crate::shader::ShaderStage;
use ahash::RandomState;
use lru::LruCache;
use std::num::NonZeroUsize;

/// Default number of compiled programs kept alive by a [`crate::ShaderBaker`].
pub const DEFAULT_SHADER_CACHE_CAPACITY: usize = 64;

/// LRU of compiled shader handles keyed by a hash of `(stage, source)`.
pub(crate) struct ShaderCache {
    compiled: LruCache<u64, ShaderHandle>,
    hasher: RandomState,
}

impl ShaderCache {
    pub(crate) fn new(size: NonZeroUsize) -> Self {
        Self {
            compiled: LruCache::new(size),
            hasher: RandomState::new(),
        }
    }

    pub(crate) fn key(&self, stage: ShaderStage, source: &str) -> u64 {
        self.hasher.hash_one((stage, source))
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub(crate) fn get(&mut self, cache_key: &u64) -> Option<ShaderHandle> {
        self.compiled.get(cache_key).copied()
    }

    pub(crate) fn insert(&mut self, cache_key: u64, handle: ShaderHandle) -> Option<ShaderHandle> {
        self.compiled
            .push(cache_key, handle)
            .filter(|(evicted_key, _)| *evicted_key != cache_key)
            .map(|(_, evicted)| evicted)
    }

    /// Empties the cache, returning every handle it held.
    pub(crate) fn take_all(&mut self) -> Vec<ShaderHandle> {
        let handles = self.compiled.iter().map(|(_, handle)| *handle).collect();
        self.compiled.clear();
        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_is_part_of_the_key() {
        let cache = ShaderCache::new(NonZeroUsize::MIN);
        let source = "#version 440\nvoid main() {}\n";
        assert_eq!(
            cache.key(ShaderStage::Vertex, source),
            cache.key(ShaderStage::Vertex, source)
        );
        assert_ne!(
            cache.key(ShaderStage::Vertex, source),
            cache.key(ShaderStage::Fragment, source)
        );
    }

    #[test]
    fn least_recently_used_handle_is_evicted() {
        let mut cache = ShaderCache::new(NonZeroUsize::new(2).unwrap());
        assert_eq!(cache.insert(1, ShaderHandle(10)), None);
        assert_eq!(cache.insert(2, ShaderHandle(20)), None);
        assert_eq!(cache.get(&1), Some(ShaderHandle(10)));
        assert_eq!(cache.insert(3, ShaderHandle(30)), Some(ShaderHandle(20)));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&2), None);
        // Re-inserting an existing key replaces in place, nothing is evicted.
        assert_eq!(cache.insert(3, ShaderHandle(31)), None);
    }
}
