use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::content::{Content, ContentValue};
use crate::error::{ContentError, ContentResult};
use crate::hooks::ContentHooks;
use crate::options::ParserOptions;
use crate::output::RenderOutput;
use crate::services::ContentServices;
use crate::title::Title;

const PARSER_CACHE_SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS parser_cache (
    cache_key TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    revision_id INTEGER,
    stored_at_unix INTEGER NOT NULL,
    output_json TEXT NOT NULL
);
";

/// A committed render plus bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedOutput {
    pub title: String,
    pub revision_id: Option<u64>,
    pub stored_at_unix: i64,
    pub output: RenderOutput,
}

/// Event passed to save-complete observers once an entry is committed.
#[derive(Debug, Clone, Copy)]
pub struct ParserCacheSaveComplete<'a> {
    pub cache_name: &'a str,
    pub key: &'a str,
    pub title: &'a Title,
    pub options: &'a ParserOptions,
    pub revision_id: Option<u64>,
    pub output: &'a RenderOutput,
}

pub trait ParserCacheStore: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> ContentResult<Option<CachedOutput>>;
    fn put(&self, key: &str, entry: &CachedOutput) -> ContentResult<()>;
    fn delete(&self, key: &str) -> ContentResult<bool>;
    fn len(&self) -> ContentResult<usize>;
}

#[derive(Debug, Default)]
pub struct MemoryParserCacheStore {
    entries: Mutex<HashMap<String, CachedOutput>>,
}

impl MemoryParserCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, CachedOutput>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ParserCacheStore for MemoryParserCacheStore {
    fn get(&self, key: &str) -> ContentResult<Option<CachedOutput>> {
        Ok(self.entries().get(key).cloned())
    }

    fn put(&self, key: &str, entry: &CachedOutput) -> ContentResult<()> {
        self.entries().insert(key.to_string(), entry.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> ContentResult<bool> {
        Ok(self.entries().remove(key).is_some())
    }

    fn len(&self) -> ContentResult<usize> {
        Ok(self.entries().len())
    }
}

/// Parser cache persisted in a SQLite file.
#[derive(Debug)]
pub struct SqliteParserCacheStore {
    path: PathBuf,
    connection: Mutex<Connection>,
}

impl SqliteParserCacheStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parser cache directory {}", parent.display())
            })?;
        }
        let connection = Connection::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        connection
            .busy_timeout(Duration::from_secs(5))
            .context("failed to set sqlite busy timeout")?;
        connection
            .pragma_update(None, "journal_mode", "WAL")
            .context("failed to enable WAL journal mode")?;
        connection
            .execute_batch(PARSER_CACHE_SCHEMA_SQL)
            .context("failed to initialize parser cache schema")?;
        Ok(Self {
            path: path.to_path_buf(),
            connection: Mutex::new(connection),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load(&self, key: &str) -> Result<Option<CachedOutput>> {
        let connection = self.connection();
        let mut statement = connection
            .prepare(
                "SELECT title, revision_id, stored_at_unix, output_json
                 FROM parser_cache
                 WHERE cache_key = ?1",
            )
            .context("failed to prepare parser cache lookup")?;
        let mut rows = statement
            .query([key])
            .context("failed to run parser cache lookup")?;
        let row = match rows.next().context("failed to read parser cache row")? {
            Some(row) => row,
            None => return Ok(None),
        };

        let revision_id: Option<i64> = row.get(1).context("failed to decode revision id")?;
        let revision_id = revision_id
            .map(u64::try_from)
            .transpose()
            .context("revision id is negative")?;
        let output_json: String = row.get(3).context("failed to decode output json")?;
        let output = serde_json::from_str(&output_json)
            .with_context(|| format!("failed to parse cached output for {key}"))?;
        Ok(Some(CachedOutput {
            title: row.get(0).context("failed to decode cached title")?,
            revision_id,
            stored_at_unix: row.get(2).context("failed to decode stored_at_unix")?,
            output,
        }))
    }

    fn store(&self, key: &str, entry: &CachedOutput) -> Result<()> {
        let output_json =
            serde_json::to_string(&entry.output).context("failed to serialize render output")?;
        let revision_id = entry
            .revision_id
            .map(i64::try_from)
            .transpose()
            .context("revision id does not fit in sqlite integer")?;
        self.connection()
            .execute(
                "INSERT INTO parser_cache (cache_key, title, revision_id, stored_at_unix, output_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(cache_key) DO UPDATE SET
                    title = excluded.title,
                    revision_id = excluded.revision_id,
                    stored_at_unix = excluded.stored_at_unix,
                    output_json = excluded.output_json",
                params![key, entry.title, revision_id, entry.stored_at_unix, output_json],
            )
            .context("failed to write parser cache entry")?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let removed = self
            .connection()
            .execute("DELETE FROM parser_cache WHERE cache_key = ?1", [key])
            .context("failed to delete parser cache entry")?;
        Ok(removed > 0)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .connection()
            .query_row("SELECT COUNT(*) FROM parser_cache", [], |row| row.get(0))
            .context("failed to count parser cache entries")?;
        usize::try_from(count).context("parser cache count is negative")
    }
}

fn storage_error(error: anyhow::Error) -> ContentError {
    ContentError::storage(format!("{error:#}"))
}

impl ParserCacheStore for SqliteParserCacheStore {
    fn get(&self, key: &str) -> ContentResult<Option<CachedOutput>> {
        self.load(key).map_err(storage_error)
    }

    fn put(&self, key: &str, entry: &CachedOutput) -> ContentResult<()> {
        self.store(key, entry).map_err(storage_error)
    }

    fn delete(&self, key: &str) -> ContentResult<bool> {
        self.remove(key).map_err(storage_error)
    }

    fn len(&self) -> ContentResult<usize> {
        self.count().map_err(storage_error)
    }
}

/// Render cache keyed by title, content, options and revision.
#[derive(Debug, Clone)]
pub struct ParserCache {
    name: String,
    store: Arc<dyn ParserCacheStore>,
    hooks: Arc<ContentHooks>,
    expire_secs: u64,
}

impl ParserCache {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn ParserCacheStore>,
        services: &ContentServices,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            hooks: services.hooks_handle(),
            expire_secs: services.config().parser_cache_expire_secs,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(
        content: &Content,
        title: &Title,
        options: &ParserOptions,
        revision_id: Option<u64>,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(title.prefixed_db_key().as_bytes());
        hasher.update([0u8]);
        hasher.update(content.model().as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(content.native_data().as_bytes());
        hasher.update([0u8]);
        hasher.update(options.options_hash().as_bytes());
        hasher.update([0u8]);
        if let Some(revision_id) = revision_id {
            hasher.update(revision_id.to_le_bytes());
        }
        let digest = hasher.finalize();
        let mut key = String::with_capacity(32);
        for byte in &digest[..16] {
            key.push_str(&format!("{byte:02x}"));
        }
        key
    }

    /// Fresh cached output, or `None` on a miss or an expired entry.
    pub fn get(
        &self,
        content: &Content,
        title: &Title,
        options: &ParserOptions,
        revision_id: Option<u64>,
    ) -> ContentResult<Option<RenderOutput>> {
        let key = Self::key(content, title, options, revision_id);
        let Some(entry) = self.store.get(&key)? else {
            return Ok(None);
        };
        let age = Utc::now().timestamp().saturating_sub(entry.stored_at_unix);
        if u64::try_from(age).unwrap_or(0) > self.expire_secs {
            debug!(cache = %self.name, key = %key, age, "expired parser cache entry");
            self.store.delete(&key)?;
            return Ok(None);
        }
        Ok(Some(entry.output))
    }

    /// Commits `output`, then notifies save-complete observers exactly once.
    /// Observers are not called when the store rejects the write.
    pub fn save(
        &self,
        output: &RenderOutput,
        content: &Content,
        title: &Title,
        options: &ParserOptions,
        revision_id: Option<u64>,
    ) -> ContentResult<()> {
        let key = Self::key(content, title, options, revision_id);
        let now = Utc::now().timestamp();
        let mut output = output.clone();
        if output.cache_time().is_none() {
            output.set_cache_time(now);
        }
        let entry = CachedOutput {
            title: title.prefixed_text(),
            revision_id,
            stored_at_unix: now,
            output,
        };
        if let Err(error) = self.store.put(&key, &entry) {
            warn!(cache = %self.name, key = %key, "parser cache write failed: {error}");
            return Err(error);
        }

        self.hooks.cache_save_complete(&ParserCacheSaveComplete {
            cache_name: &self.name,
            key: &key,
            title,
            options,
            revision_id,
            output: &entry.output,
        });
        Ok(())
    }

    pub fn delete(
        &self,
        content: &Content,
        title: &Title,
        options: &ParserOptions,
        revision_id: Option<u64>,
    ) -> ContentResult<bool> {
        self.store
            .delete(&Self::key(content, title, options, revision_id))
    }

    pub fn len(&self) -> ContentResult<usize> {
        self.store.len()
    }

    pub fn is_empty(&self) -> ContentResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Cached HTML render, rendering and committing on a miss. Models whose
    /// handler opts out of caching are always rendered fresh.
    pub fn get_or_render(
        &self,
        content: &Content,
        title: &Title,
        revision_id: Option<u64>,
        options: Option<&ParserOptions>,
        services: &ContentServices,
    ) -> ContentResult<RenderOutput> {
        let defaults;
        let options = match options {
            Some(options) => options,
            None => {
                defaults = services.default_parser_options();
                defaults.as_ref()
            }
        };
        let cacheable = services
            .registry()
            .handler_for(content.model())
            .map(|handler| handler.is_parser_cacheable())
            .unwrap_or(false);

        if cacheable && let Some(output) = self.get(content, title, options, revision_id)? {
            return Ok(output);
        }
        let output = content.parser_output(title, revision_id, Some(options), true, services)?;
        if cacheable {
            self.save(&output, content, title, options, revision_id)?;
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::config::ContentConfig;
    use crate::hooks::HookOutcome;
    use tempfile::tempdir;

    fn page() -> Title {
        Title::parse("Cached page").expect("title")
    }

    fn counting_services(counter: &Arc<AtomicUsize>, outcome: HookOutcome) -> ContentServices {
        let seen = Arc::clone(counter);
        let mut hooks = ContentHooks::new();
        hooks.add_cache_save_complete_hook(move |event| {
            assert!(!event.key.is_empty());
            seen.fetch_add(1, Ordering::SeqCst);
            outcome
        });
        ContentServices::default().with_hooks(hooks)
    }

    #[test]
    fn save_notifies_observers_once_even_when_they_abort() {
        let counter = Arc::new(AtomicUsize::new(0));
        let services = counting_services(&counter, HookOutcome::Abort);
        let cache = ParserCache::new("pcache", Arc::new(MemoryParserCacheStore::new()), &services);
        let content = Content::wikitext("Hello [[World]]");
        let options = services.default_parser_options();

        let output = content
            .parser_output(&page(), Some(1), Some(&options), true, &services)
            .expect("render");
        cache
            .save(&output, &content, &page(), &options, Some(1))
            .expect("save");
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let cached = cache
            .get(&content, &page(), &options, Some(1))
            .expect("get")
            .expect("hit");
        assert_eq!(cached.html(), output.html());
        assert!(cache.get(&content, &page(), &options, Some(2)).expect("get").is_none());
    }

    #[test]
    fn get_or_render_renders_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let services = counting_services(&counter, HookOutcome::Continue);
        let cache = ParserCache::new("pcache", Arc::new(MemoryParserCacheStore::new()), &services);
        let content = Content::wikitext("Text");

        let first = cache
            .get_or_render(&content, &page(), None, None, &services)
            .expect("first");
        let second = cache
            .get_or_render(&content, &page(), None, None, &services)
            .expect("second");
        assert_eq!(first.html(), second.html());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().expect("len"), 1);
    }

    #[test]
    fn expired_entries_are_dropped() {
        let config = ContentConfig {
            parser_cache_expire_secs: 0,
            ..ContentConfig::default()
        };
        let services = ContentServices::new(config);
        let store = Arc::new(MemoryParserCacheStore::new());
        let cache = ParserCache::new("pcache", store.clone(), &services);
        let content = Content::wikitext("Old");
        let options = services.default_parser_options();

        let key = ParserCache::key(&content, &page(), &options, None);
        store
            .put(
                &key,
                &CachedOutput {
                    title: "Cached page".to_string(),
                    revision_id: None,
                    stored_at_unix: Utc::now().timestamp() - 10,
                    output: RenderOutput::new(),
                },
            )
            .expect("put");
        assert!(cache.get(&content, &page(), &options, None).expect("get").is_none());
        assert!(cache.is_empty().expect("empty"));
    }

    #[test]
    fn key_depends_on_content_and_options() {
        let services = ContentServices::default();
        let options = services.default_parser_options();
        let a = ParserCache::key(&Content::wikitext("a"), &page(), &options, None);
        let b = ParserCache::key(&Content::wikitext("b"), &page(), &options, None);
        let js = ParserCache::key(&Content::javascript("a"), &page(), &options, None);
        let mut other_options = (*options).clone();
        other_options.external_link_target = Some("_blank".to_string());
        let c = ParserCache::key(&Content::wikitext("a"), &page(), &other_options, None);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert_ne!(a, js);
        assert_ne!(a, c);
    }

    #[test]
    fn sqlite_store_persists_entries() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("cache").join("parser_cache.sqlite");
        let services = ContentServices::default();
        let options = services.default_parser_options();
        let content = Content::wikitext("Persisted [[Link]]");

        {
            let store = SqliteParserCacheStore::open(&path).expect("open");
            let cache = ParserCache::new("sqlite", Arc::new(store), &services);
            cache
                .get_or_render(&content, &page(), Some(9), Some(&options), &services)
                .expect("render");
        }

        let store = SqliteParserCacheStore::open(&path).expect("reopen");
        assert_eq!(store.path(), path.as_path());
        let cache = ParserCache::new("sqlite", Arc::new(store), &services);
        let cached = cache
            .get(&content, &page(), &options, Some(9))
            .expect("get")
            .expect("hit");
        assert!(cached.has_links());
        assert_eq!(cached.revision_id(), Some(9));
        assert!(
            cache
                .delete(&content, &page(), &options, Some(9))
                .expect("delete")
        );
        assert_eq!(cache.len().expect("len"), 0);
    }
}
