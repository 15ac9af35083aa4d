//! Per-file token counts, cached by file signature.

use std::collections::HashMap;
use std::fs;
use std::sync::Mutex;
use std::time::UNIX_EPOCH;

use cc_base::tokens::{estimate_tokens_with, percentage};
use cc_base::types::FileTokenCount;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheEntry {
    mtime_ms: u128,
    size: u64,
    count: usize,
}

fn file_sig(path: &str) -> Option<(u128, u64)> {
    let meta = fs::metadata(path).ok()?;
    let mtime = meta.modified().ok()?.duration_since(UNIX_EPOCH).ok()?.as_millis();
    Some((mtime, meta.len()))
}

#[derive(Debug)]
pub struct TokenCache {
    chars_per_token: f32,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl TokenCache {
    pub fn new(chars_per_token: f32) -> Self {
        Self { chars_per_token, entries: Mutex::new(HashMap::new()) }
    }

    pub fn estimate(&self, text: &str) -> usize {
        estimate_tokens_with(text, self.chars_per_token)
    }

    /// Count known for `path`, if the file is unchanged since it was counted.
    pub fn cached(&self, path: &str) -> Option<usize> {
        let sig = file_sig(path)?;
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(path).filter(|e| (e.mtime_ms, e.size) == sig).map(|e| e.count)
    }

    /// Count `path`, reading it only when the cache is stale. Unreadable
    /// files count as zero.
    pub fn count_file(&self, path: &str) -> usize {
        if let Some(count) = self.cached(path) {
            return count;
        }
        let count = fs::read(path).map(|bytes| self.estimate(&String::from_utf8_lossy(&bytes))).unwrap_or(0);
        if let Some((mtime_ms, size)) = file_sig(path) {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.insert(path.to_string(), CacheEntry { mtime_ms, size, count });
        }
        count
    }

    /// Count every file and express each as a share of the total.
    pub fn count_selection(&self, paths: &[String]) -> (Vec<FileTokenCount>, usize) {
        let counts: Vec<(String, usize)> = paths.iter().map(|p| (p.clone(), self.count_file(p))).collect();
        let total: usize = counts.iter().map(|(_, c)| *c).sum();
        let files = counts
            .into_iter()
            .map(|(id, token_count)| FileTokenCount { id, token_count, token_percentage: percentage(token_count, total) })
            .collect();
        (files, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_until_file_changes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        fs::write(&path, "abcdefgh").expect("write");
        let p = path.to_string_lossy().to_string();

        let cache = TokenCache::new(4.0);
        assert_eq!(cache.cached(&p), None);
        assert_eq!(cache.count_file(&p), 2);
        assert_eq!(cache.cached(&p), Some(2));

        fs::write(&path, "abcdefghijkl").expect("write");
        assert_eq!(cache.count_file(&p), 3);
    }

    #[test]
    fn selection_percentages_sum_to_hundred() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, "aaaa").expect("write");
        fs::write(&b, "bbbbbbbbbbbb").expect("write");
        let cache = TokenCache::new(4.0);
        let (files, total) =
            cache.count_selection(&[a.to_string_lossy().to_string(), b.to_string_lossy().to_string()]);
        assert_eq!(total, 4);
        assert_eq!(files[0].token_percentage, 25.0);
        assert_eq!(files[1].token_percentage, 75.0);
    }

    #[test]
    fn missing_file_counts_zero() {
        let cache = TokenCache::new(4.0);
        assert_eq!(cache.count_file("/no/such/file"), 0);
    }
}
