//! Selector sources outside the validated document: files on disk and remote
//! stylesheets.
//!
//! I/O goes through two narrow collaborator traits, [`FileSystem`] and
//! [`RemoteFetcher`], so the engine can be driven by real disks and networks or
//! by in-memory fakes. [`SourceLoader`] combines them with the shared cache and
//! a global concurrency limiter:
//!
//! - local files are keyed `fs://<path>` with the mtime (ms) as freshness;
//! - remote stylesheets are keyed by URL with freshness `-1`;
//! - every read or fetch holds a limiter permit (FIFO queueing);
//! - oversized files are skipped, overlong content is truncated.
//!
//! Loader methods return errors; the aggregator decides that every error is
//! recoverable and logs it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::cache::{self, SharedStyleCache, REMOTE_FRESHNESS};
use crate::config::XrefConfig;
use crate::error::{IoResultExt, XrefError, XrefResult};
use crate::selector::Selector;
use crate::tokenizer::parse_selectors;

/// Result of a `stat` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub mtime_ms: i64,
    pub size: u64,
}

/// Blocking filesystem access.
pub trait FileSystem: Send + Sync {
    fn stat(&self, path: &Path) -> XrefResult<FileStat>;
    fn read_to_string(&self, path: &Path) -> XrefResult<String>;
    fn exists(&self, path: &Path) -> bool;
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn stat(&self, path: &Path) -> XrefResult<FileStat> {
        let meta = fs::metadata(path).with_path(path)?;
        let mtime_ms = meta
            .modified()
            .with_path(path)?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Ok(FileStat {
            mtime_ms,
            size: meta.len(),
        })
    }

    fn read_to_string(&self, path: &Path) -> XrefResult<String> {
        fs::read_to_string(path).with_path(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// HTTP(S) GET with a timeout; implementations follow redirects up to their cap.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> XrefResult<String>;
}

/// `reqwest` based fetcher.
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "remote")]
impl HttpFetcher {
    pub fn new(max_redirects: usize) -> XrefResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .user_agent(concat!("cssxref/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| XrefError::internal(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "remote")]
#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> XrefResult<String> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| XrefError::fetch(url, describe_reqwest_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(XrefError::fetch(url, format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| XrefError::fetch(url, describe_reqwest_error(&e)))
    }
}

#[cfg(feature = "remote")]
fn describe_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_redirect() {
        "too many redirects".to_string()
    } else {
        err.to_string()
    }
}

/// Where a `<link href>` points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    Local(PathBuf),
    Remote(String),
}

/// Resolves a stylesheet `href` against the document directory and the
/// workspace root. `data:` URLs and unresolvable paths yield `None`.
pub fn resolve_link(href: &str, doc_dir: Option<&Path>, workspace_root: Option<&Path>) -> Option<LinkTarget> {
    let href = href.trim();
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(LinkTarget::Remote(href.to_string()));
    }
    if let Some(rest) = href.strip_prefix("//") {
        return Some(LinkTarget::Remote(format!("https://{}", rest)));
    }
    if lower.starts_with("data:") || lower.contains("://") {
        return None;
    }

    let path_part = href.split(['?', '#']).next().unwrap_or_default();
    if path_part.is_empty() {
        return None;
    }

    let path = Path::new(path_part);
    let resolved = if let Some(rel) = path_part.strip_prefix('/') {
        match workspace_root {
            Some(root) => root.join(rel),
            None if path.is_absolute() => path.to_path_buf(),
            None => return None,
        }
    } else {
        doc_dir?.join(path)
    };

    Some(LinkTarget::Local(normalize(&resolved)))
}

/// Lexically removes `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Cache key for a file on disk.
pub fn fs_key(path: &Path) -> String {
    format!("fs://{}", path.display())
}

/// Cuts `text` to at most `limit` characters.
pub fn truncate_chars(text: &mut String, limit: usize) -> bool {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => {
            text.truncate(cut);
            true
        }
        None => false,
    }
}

/// Limits that apply to every loaded source.
#[derive(Debug, Clone, Copy)]
pub struct LoadLimits {
    pub max_file_size: u64,
    pub max_content_length: usize,
    pub remote_timeout: Duration,
}

impl From<&XrefConfig> for LoadLimits {
    fn from(cfg: &XrefConfig) -> Self {
        Self {
            max_file_size: cfg.max_file_size,
            max_content_length: cfg.max_content_length,
            remote_timeout: cfg.remote_timeout(),
        }
    }
}

/// Cached, rate-limited loading of selector sources. Cheap to clone; clones
/// share the cache, limiter and collaborators.
#[derive(Clone)]
pub struct SourceLoader {
    fs: Arc<dyn FileSystem>,
    fetcher: Option<Arc<dyn RemoteFetcher>>,
    cache: SharedStyleCache,
    limiter: Arc<Semaphore>,
    limits: LoadLimits,
}

impl SourceLoader {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        fetcher: Option<Arc<dyn RemoteFetcher>>,
        cache: SharedStyleCache,
        max_concurrency: usize,
        limits: LoadLimits,
    ) -> Self {
        Self {
            fs,
            fetcher,
            cache,
            limiter: Arc::new(Semaphore::new(max_concurrency.max(1))),
            limits,
        }
    }

    pub fn cache(&self) -> &SharedStyleCache {
        &self.cache
    }

    pub fn has_fetcher(&self) -> bool {
        self.fetcher.is_some()
    }

    /// Selectors of a local stylesheet, from cache when its mtime is unchanged.
    pub async fn load_local(&self, path: &Path) -> XrefResult<Arc<Vec<Selector>>> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| XrefError::internal(e.to_string()))?;

        let key = fs_key(path);
        let fs = Arc::clone(&self.fs);
        let owned = path.to_path_buf();
        let stat = tokio::task::spawn_blocking(move || fs.stat(&owned))
            .await
            .map_err(|e| XrefError::internal(e.to_string()))??;

        if let Some(hit) = cache::lock(&self.cache).get_fresh(&key, stat.mtime_ms) {
            return Ok(hit);
        }

        if stat.size > self.limits.max_file_size {
            info!(
                path = %path.display(),
                size = stat.size,
                limit = self.limits.max_file_size,
                "skipping oversized stylesheet"
            );
            return Err(XrefError::TooLarge {
                path: path.to_path_buf(),
                size: stat.size,
                limit: self.limits.max_file_size,
            });
        }

        let fs = Arc::clone(&self.fs);
        let owned = path.to_path_buf();
        let max_len = self.limits.max_content_length;
        let selectors = tokio::task::spawn_blocking(move || -> XrefResult<Vec<Selector>> {
            let mut text = fs.read_to_string(&owned)?;
            if truncate_chars(&mut text, max_len) {
                info!(path = %owned.display(), limit = max_len, "stylesheet truncated before parsing");
            }
            Ok(parse_selectors(&text))
        })
        .await
        .map_err(|e| XrefError::internal(e.to_string()))??;

        debug!(path = %path.display(), count = selectors.len(), "parsed stylesheet");
        let selectors = Arc::new(selectors);
        cache::lock(&self.cache).set(key, stat.mtime_ms, Arc::clone(&selectors));
        Ok(selectors)
    }

    /// Selectors of a remote stylesheet. Cached entries only expire via TTL.
    pub async fn load_remote(&self, url: &str) -> XrefResult<Arc<Vec<Selector>>> {
        if let Some(hit) = cache::lock(&self.cache).get_fresh(url, REMOTE_FRESHNESS) {
            return Ok(hit);
        }

        let fetcher = self
            .fetcher
            .as_ref()
            .ok_or_else(|| XrefError::fetch(url, "remote stylesheets are disabled"))?;

        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| XrefError::internal(e.to_string()))?;

        let mut text = fetcher.fetch(url, self.limits.remote_timeout).await?;
        if truncate_chars(&mut text, self.limits.max_content_length) {
            info!(url, limit = self.limits.max_content_length, "remote stylesheet truncated before parsing");
        }

        let selectors = Arc::new(parse_selectors(&text));
        debug!(url, count = selectors.len(), "fetched stylesheet");
        cache::lock(&self.cache).set(url, REMOTE_FRESHNESS, Arc::clone(&selectors));
        Ok(selectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{shared, StyleCache, DEFAULT_TTL};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory filesystem with settable mtimes.
    #[derive(Default)]
    struct MemFs {
        files: Mutex<HashMap<PathBuf, (String, i64)>>,
        reads: AtomicUsize,
    }

    impl MemFs {
        fn put(&self, path: &str, text: &str, mtime: i64) {
            self.files
                .lock()
                .unwrap()
                .insert(PathBuf::from(path), (text.to_string(), mtime));
        }
    }

    impl FileSystem for MemFs {
        fn stat(&self, path: &Path) -> XrefResult<FileStat> {
            let files = self.files.lock().unwrap();
            let (text, mtime) = files.get(path).ok_or_else(|| {
                XrefError::io(path, std::io::Error::new(std::io::ErrorKind::NotFound, "missing"))
            })?;
            Ok(FileStat {
                mtime_ms: *mtime,
                size: text.len() as u64,
            })
        }

        fn read_to_string(&self, path: &Path) -> XrefResult<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let files = self.files.lock().unwrap();
            files.get(path).map(|(t, _)| t.clone()).ok_or_else(|| {
                XrefError::io(path, std::io::Error::new(std::io::ErrorKind::NotFound, "missing"))
            })
        }

        fn exists(&self, path: &Path) -> bool {
            self.files.lock().unwrap().contains_key(path)
        }
    }

    struct CountingFetcher {
        body: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteFetcher for CountingFetcher {
        async fn fetch(&self, _url: &str, _timeout: Duration) -> XrefResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    fn limits() -> LoadLimits {
        LoadLimits::from(&XrefConfig::default())
    }

    fn loader(fs: Arc<MemFs>, fetcher: Option<Arc<dyn RemoteFetcher>>, limits: LoadLimits) -> SourceLoader {
        let cache = shared(StyleCache::new(16, DEFAULT_TTL).unwrap());
        SourceLoader::new(fs, fetcher, cache, 2, limits)
    }

    #[test]
    fn test_resolve_link() {
        let dir = Path::new("/site/pages");
        let root = Path::new("/site");
        assert_eq!(
            resolve_link("../css/a.css?v=2", Some(dir), Some(root)),
            Some(LinkTarget::Local(PathBuf::from("/site/css/a.css")))
        );
        assert_eq!(
            resolve_link("/b.css", Some(dir), Some(root)),
            Some(LinkTarget::Local(PathBuf::from("/site/b.css")))
        );
        assert_eq!(
            resolve_link("//cdn.example.com/c.css", Some(dir), None),
            Some(LinkTarget::Remote("https://cdn.example.com/c.css".into()))
        );
        assert_eq!(
            resolve_link("HTTPS://cdn.example.com/d.css", None, None),
            Some(LinkTarget::Remote("HTTPS://cdn.example.com/d.css".into()))
        );
        assert_eq!(resolve_link("data:text/css,.a{}", Some(dir), None), None);
        assert_eq!(resolve_link("rel.css", None, None), None);
    }

    #[test]
    fn test_truncate_chars() {
        let mut s = "héllo".to_string();
        assert!(truncate_chars(&mut s, 2));
        assert_eq!(s, "hé");
        let mut short = "ab".to_string();
        assert!(!truncate_chars(&mut short, 5));
    }

    #[tokio::test]
    async fn test_local_load_is_cached_by_mtime() {
        let fs = Arc::new(MemFs::default());
        fs.put("/w/a.css", ".a{}", 1);
        let loader = loader(Arc::clone(&fs), None, limits());

        let first = loader.load_local(Path::new("/w/a.css")).await.unwrap();
        assert_eq!(first[0].name, "a");
        loader.load_local(Path::new("/w/a.css")).await.unwrap();
        assert_eq!(fs.reads.load(Ordering::SeqCst), 1);

        fs.put("/w/a.css", ".b{}", 2);
        let changed = loader.load_local(Path::new("/w/a.css")).await.unwrap();
        assert_eq!(changed[0].name, "b");
        assert_eq!(fs.reads.load(Ordering::SeqCst), 2);
        assert_eq!(cache::lock(loader.cache()).len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_file_is_skipped() {
        let fs = Arc::new(MemFs::default());
        fs.put("/w/big.css", ".a{} .b{}", 1);
        let loader = loader(
            fs,
            None,
            LoadLimits {
                max_file_size: 4,
                ..limits()
            },
        );
        let err = loader.load_local(Path::new("/w/big.css")).await.unwrap_err();
        assert!(matches!(err, XrefError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn test_long_content_is_truncated() {
        let fs = Arc::new(MemFs::default());
        fs.put("/w/long.css", ".a{} .b{}", 1);
        let loader = loader(
            fs,
            None,
            LoadLimits {
                max_content_length: 5,
                ..limits()
            },
        );
        let sels = loader.load_local(Path::new("/w/long.css")).await.unwrap();
        assert_eq!(sels.len(), 1);
        assert_eq!(sels[0].name, "a");
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let loader = loader(Arc::new(MemFs::default()), None, limits());
        let err = loader.load_local(Path::new("/nope.css")).await.unwrap_err();
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_remote_fetch_is_cached() {
        let fetcher = Arc::new(CountingFetcher {
            body: ".remote{}".into(),
            calls: AtomicUsize::new(0),
        });
        let loader = loader(
            Arc::new(MemFs::default()),
            Some(fetcher.clone() as Arc<dyn RemoteFetcher>),
            limits(),
        );

        let url = "https://cdn.example.com/r.css";
        assert_eq!(loader.load_remote(url).await.unwrap()[0].name, "remote");
        loader.load_remote(url).await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache::lock(loader.cache()).get(url).unwrap().freshness, REMOTE_FRESHNESS);
    }

    #[tokio::test]
    async fn test_remote_without_fetcher_fails_softly() {
        let loader = loader(Arc::new(MemFs::default()), None, limits());
        let err = loader.load_remote("https://x/y.css").await.unwrap_err();
        assert!(matches!(err, XrefError::Fetch { .. }));
    }
}
