//! Multi-source selector aggregation.
//!
//! For one validation request the aggregator builds a [`StyleMap`] from, in
//! order:
//!
//! 1. the document itself (embedded `<style>` blocks, or the whole text of a
//!    stylesheet);
//! 2. stylesheets referenced by `<link rel="stylesheet">`, local or remote;
//! 3. every style file under the workspace root, in bounded batches.
//!
//! The first source to claim a key keeps it. Every I/O failure is logged once
//! (size guards at info by the loader, the rest at warn here) and contributes
//! nothing; aggregation itself never fails. A cancelled request
//! returns whatever had been collected when cancellation was observed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::{self, SharedStyleCache};
use crate::cancel::CancelToken;
use crate::config::XrefConfig;
use crate::document::{Document, DocumentKind};
use crate::error::{XrefError, XrefResult};
use crate::loader::{fs_key, resolve_link, LinkTarget, LoadLimits, OsFileSystem, RemoteFetcher, SourceLoader};
use crate::markup::{extract_style_blocks, find_stylesheet_links};
use crate::scan::gather_style_files;
use crate::selector::{KnownSelectors, Selector};
use crate::tokenizer::{parse_selectors, parse_selectors_at};

/// Source key to the selectors it declares.
pub type StyleMap = HashMap<String, Arc<Vec<Selector>>>;

/// Union of every class and id declared in `map`.
pub fn known_selectors(map: &StyleMap) -> KnownSelectors {
    let mut known = KnownSelectors::default();
    for selectors in map.values() {
        known.extend(selectors.iter());
    }
    known
}

/// Collects selectors from every source visible to a document.
#[derive(Clone)]
pub struct StyleAggregator {
    loader: SourceLoader,
    config: Arc<XrefConfig>,
}

impl StyleAggregator {
    pub fn new(loader: SourceLoader, config: Arc<XrefConfig>) -> Self {
        Self { loader, config }
    }

    /// Aggregator over the real filesystem and, when enabled, HTTP.
    pub fn from_config(config: Arc<XrefConfig>, cache: SharedStyleCache) -> XrefResult<Self> {
        let fetcher = default_fetcher(&config)?;
        let loader = SourceLoader::new(
            Arc::new(OsFileSystem),
            fetcher,
            cache,
            config.max_concurrency,
            LoadLimits::from(config.as_ref()),
        );
        Ok(Self::new(loader, config))
    }

    pub fn config(&self) -> &XrefConfig {
        &self.config
    }

    pub fn cache(&self) -> &SharedStyleCache {
        self.loader.cache()
    }

    /// Selectors declared by the document itself, cached by key and version.
    pub fn local_selectors(&self, doc: &Document) -> Arc<Vec<Selector>> {
        if let Some(hit) = cache::lock(self.cache()).get_fresh(&doc.key, doc.version) {
            debug!(key = %doc.key, version = doc.version, "document selectors from cache");
            return hit;
        }

        let selectors = Arc::new(match doc.kind {
            DocumentKind::Style => parse_selectors(&doc.text),
            DocumentKind::Markup => {
                let index = doc.line_index();
                extract_style_blocks(&doc.text)
                    .into_iter()
                    .flat_map(|block| parse_selectors_at(block.text, block.start, &index))
                    .collect()
            }
            DocumentKind::Script => Vec::new(),
        });

        cache::lock(self.cache()).set(doc.key.clone(), doc.version, Arc::clone(&selectors));
        selectors
    }

    /// Builds the style map for `doc`.
    pub async fn collect_all(&self, doc: &Document, workspace_root: Option<&Path>, cancel: &CancelToken) -> StyleMap {
        let mut map = StyleMap::new();
        map.insert(doc.key.clone(), self.local_selectors(doc));

        if cancel.is_cancelled() {
            return map;
        }
        if doc.kind == DocumentKind::Markup {
            self.collect_links(doc, workspace_root, cancel, &mut map).await;
        }

        if cancel.is_cancelled() {
            return map;
        }
        if let (Some(root), true) = (workspace_root, self.config.workspace_scan) {
            self.collect_workspace(root, cancel, &mut map).await;
        }

        map
    }

    async fn collect_links(&self, doc: &Document, workspace_root: Option<&Path>, cancel: &CancelToken, map: &mut StyleMap) {
        for href in find_stylesheet_links(&doc.text) {
            let Some(target) = resolve_link(&href, doc.dir(), workspace_root) else {
                debug!(href = %href, "unresolvable stylesheet link");
                continue;
            };

            match target {
                LinkTarget::Local(path) => {
                    let key = fs_key(&path);
                    if map.contains_key(&key) {
                        continue;
                    }
                    match self.loader.load_local(&path).await {
                        Ok(selectors) => {
                            map.insert(key, selectors);
                        }
                        Err(XrefError::TooLarge { .. }) => {}
                        Err(e) => warn!(href = %href, error = %e, "linked stylesheet unavailable"),
                    }
                }
                LinkTarget::Remote(url) => {
                    if !self.config.remote_stylesheets || !self.loader.has_fetcher() || map.contains_key(&url) {
                        continue;
                    }
                    if cancel.is_cancelled() {
                        return;
                    }
                    match self.loader.load_remote(&url).await {
                        Ok(selectors) => {
                            map.insert(url, selectors);
                        }
                        Err(e) => warn!(url = %url, error = %e, "remote stylesheet unavailable"),
                    }
                }
            }
        }
    }

    async fn collect_workspace(&self, root: &Path, cancel: &CancelToken, map: &mut StyleMap) {
        let owned_root = root.to_path_buf();
        let config = Arc::clone(&self.config);
        let files = match tokio::task::spawn_blocking(move || gather_style_files(&owned_root, &config)).await {
            Ok(Ok(files)) => files,
            Ok(Err(e)) => {
                warn!(root = %root.display(), error = %e, "workspace scan failed");
                return;
            }
            Err(e) => {
                warn!(root = %root.display(), error = %e, "workspace scan task failed");
                return;
            }
        };

        let pending: Vec<PathBuf> = files
            .into_iter()
            .filter(|path| !map.contains_key(&fs_key(path)))
            .collect();
        let mut loaded = 0usize;

        for batch in pending.chunks(self.config.batch_size.max(1)) {
            if cancel.is_cancelled() {
                debug!(root = %root.display(), "workspace scan cancelled");
                break;
            }

            let mut tasks = JoinSet::new();
            for path in batch {
                let loader = self.loader.clone();
                let path = path.clone();
                tasks.spawn(async move {
                    let result = loader.load_local(&path).await;
                    (path, result)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((path, Ok(selectors))) => {
                        map.entry(fs_key(&path)).or_insert(selectors);
                        loaded += 1;
                    }
                    Ok((_, Err(XrefError::TooLarge { .. }))) => {}
                    Ok((path, Err(e))) => {
                        warn!(path = %path.display(), error = %e, "workspace stylesheet skipped")
                    }
                    Err(e) => warn!(error = %e, "workspace load task failed"),
                }
            }
        }

        info!(root = %root.display(), files = loaded, "workspace stylesheets collected");
    }
}

#[cfg(feature = "remote")]
fn default_fetcher(config: &XrefConfig) -> XrefResult<Option<Arc<dyn RemoteFetcher>>> {
    if !config.remote_stylesheets {
        return Ok(None);
    }
    let fetcher = crate::loader::HttpFetcher::new(config.max_redirects)?;
    Ok(Some(Arc::new(fetcher)))
}

#[cfg(not(feature = "remote"))]
fn default_fetcher(_config: &XrefConfig) -> XrefResult<Option<Arc<dyn RemoteFetcher>>> {
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{shared, StyleCache};
    use crate::loader::{FileStat, FileSystem};
    use crate::selector::SelectorKind;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn create_temp_dir(name: &str) -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir()
            .join("cssxref_aggregator_test")
            .join(format!("{}_{}_{}", name, std::process::id(), id));
        if dir.exists() {
            fs::remove_dir_all(&dir).ok();
        }
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, rel: &str, body: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        path
    }

    struct StaticFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteFetcher for StaticFetcher {
        async fn fetch(&self, _url: &str, _timeout: Duration) -> XrefResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(".remote{}".to_string())
        }
    }

    fn aggregator(config: XrefConfig, fetcher: Option<Arc<dyn RemoteFetcher>>) -> StyleAggregator {
        let cache = shared(StyleCache::new(64, config.cache_ttl()).unwrap());
        let loader = SourceLoader::new(
            Arc::new(OsFileSystem),
            fetcher,
            cache,
            config.max_concurrency,
            LoadLimits::from(&config),
        );
        StyleAggregator::new(loader, Arc::new(config))
    }

    /// Real filesystem that records how many calls overlap.
    #[derive(Default)]
    struct PeakFs {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl PeakFs {
        fn enter(&self) {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl FileSystem for PeakFs {
        fn stat(&self, path: &Path) -> XrefResult<FileStat> {
            self.enter();
            OsFileSystem.stat(path)
        }

        fn read_to_string(&self, path: &Path) -> XrefResult<String> {
            self.enter();
            OsFileSystem.read_to_string(path)
        }

        fn exists(&self, path: &Path) -> bool {
            OsFileSystem.exists(path)
        }
    }

    /// Log sink for a scoped fmt subscriber.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn names(map: &StyleMap) -> Vec<String> {
        let mut names: Vec<_> = map.values().flat_map(|s| s.iter().map(|s| s.to_string())).collect();
        names.sort();
        names
    }

    #[test]
    fn test_local_selectors_for_markup() {
        let agg = aggregator(XrefConfig::default(), None);
        let html = "<p>hi</p>\n<style>\n.a { }\n#b { }\n</style>";
        let doc = Document::new("mem://a.html", 1, html, DocumentKind::Markup);

        let sels = agg.local_selectors(&doc);
        assert_eq!(sels.len(), 2);
        assert_eq!(&html[sels[0].offset..sels[0].offset + 2], ".a");
        assert_eq!((sels[0].line, sels[0].col), (2, 0));
        assert_eq!(sels[1].kind, SelectorKind::Id);
    }

    #[test]
    fn test_local_selectors_cached_by_version() {
        let agg = aggregator(XrefConfig::default(), None);
        let v1 = Document::new("mem://s.css", 1, ".one{}", DocumentKind::Style);
        let first = agg.local_selectors(&v1);
        assert!(Arc::ptr_eq(&first, &agg.local_selectors(&v1)));

        let v2 = Document::new("mem://s.css", 2, ".two{}", DocumentKind::Style);
        assert_eq!(agg.local_selectors(&v2)[0].name, "two");
        assert_eq!(cache::lock(agg.cache()).len(), 1);

        let script = Document::new("mem://a.js", 1, ".x{}", DocumentKind::Script);
        assert!(agg.local_selectors(&script).is_empty());
    }

    #[tokio::test]
    async fn test_collects_links_and_workspace() {
        let root = create_temp_dir("links");
        write(&root, "css/site.css", ".site{}");
        write(&root, "theme/extra.scss", ".extra{ .nested{} }");
        write(&root, "node_modules/pkg/vendor.css", ".vendor{}");
        let page = write(
            &root,
            "pages/index.html",
            r#"<link rel="stylesheet" href="../css/site.css"><link rel="stylesheet" href="https://cdn.example.com/r.css"><style>.inline{}</style>"#,
        );
        let text = fs::read_to_string(&page).unwrap();
        let doc = Document::new("file:///index.html", 1, text, DocumentKind::Markup).with_path(&page);

        let fetcher = Arc::new(StaticFetcher {
            calls: AtomicUsize::new(0),
        });
        let agg = aggregator(XrefConfig::default(), Some(fetcher.clone() as Arc<dyn RemoteFetcher>));
        let map = agg.collect_all(&doc, Some(&root), &CancelToken::new()).await;

        assert_eq!(names(&map), vec![".extra", ".inline", ".nested", ".remote", ".site"]);
        assert!(map.contains_key(&fs_key(&root.join("css/site.css"))));
        assert!(map.contains_key("https://cdn.example.com/r.css"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        let known = known_selectors(&map);
        assert!(known.contains(SelectorKind::Class, "remote"));
        fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn test_toggles_and_missing_links() {
        let root = create_temp_dir("toggles");
        write(&root, "a.css", ".ws{}");
        let html = r#"<link rel="stylesheet" href="missing.css"><link rel="stylesheet" href="//cdn.example.com/r.css">"#;
        let doc = Document::new("k", 1, html, DocumentKind::Markup).with_path(root.join("index.html"));

        let fetcher = Arc::new(StaticFetcher {
            calls: AtomicUsize::new(0),
        });
        let config = XrefConfig {
            remote_stylesheets: false,
            workspace_scan: false,
            ..XrefConfig::default()
        };
        let agg = aggregator(config, Some(fetcher.clone() as Arc<dyn RemoteFetcher>));
        let map = agg.collect_all(&doc, Some(&root), &CancelToken::new()).await;

        assert_eq!(map.len(), 1);
        assert!(map["k"].is_empty());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn test_cancelled_request_keeps_local_only() {
        let root = create_temp_dir("cancelled");
        write(&root, "a.css", ".ws{}");
        let doc = Document::new("k", 1, "<style>.own{}</style>", DocumentKind::Markup);
        let agg = aggregator(XrefConfig::default(), None);

        let cancel = CancelToken::new();
        cancel.cancel();
        let map = agg.collect_all(&doc, Some(&root), &cancel).await;
        assert_eq!(names(&map), vec![".own"]);
        fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn test_workspace_batches_settle_individually() {
        let root = create_temp_dir("batches");
        for i in 0..7 {
            write(&root, &format!("s{}.css", i), &format!(".c{}{{}}", i));
        }
        write(&root, "huge.css", &".big{}".repeat(100));
        let config = XrefConfig {
            batch_size: 3,
            max_file_size: 64,
            ..XrefConfig::default()
        };
        let agg = aggregator(config, None);
        let doc = Document::new("k", 1, "", DocumentKind::Script);

        let map = agg.collect_all(&doc, Some(&root), &CancelToken::new()).await;
        assert_eq!(map.len(), 8);
        assert!(!names(&map).contains(&".big".to_string()));
        fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn test_workspace_loads_respect_concurrency_cap() {
        let root = create_temp_dir("limiter");
        for i in 0..12 {
            write(&root, &format!("f{:02}.css", i), &format!(".f{}{{}}", i));
        }
        let config = XrefConfig {
            max_concurrency: 3,
            ..XrefConfig::default()
        };
        let fs = Arc::new(PeakFs::default());
        let cache = shared(StyleCache::new(64, config.cache_ttl()).unwrap());
        let loader = SourceLoader::new(fs.clone(), None, cache, config.max_concurrency, LoadLimits::from(&config));
        let agg = StyleAggregator::new(loader, Arc::new(config));
        let doc = Document::new("k", 1, "", DocumentKind::Script);

        let map = agg.collect_all(&doc, Some(&root), &CancelToken::new()).await;
        assert_eq!(map.len(), 13);
        let peak = fs.peak.load(Ordering::SeqCst);
        assert!((2..=3).contains(&peak), "peak concurrent calls: {}", peak);
        fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn test_oversized_sources_logged_once_at_info() {
        let root = create_temp_dir("oversized");
        write(&root, "huge.css", &".big{}".repeat(100));
        let html = r#"<link rel="stylesheet" href="huge.css">"#;
        let doc = Document::new("k", 1, html, DocumentKind::Markup).with_path(root.join("index.html"));
        let config = XrefConfig {
            max_file_size: 64,
            ..XrefConfig::default()
        };
        let agg = aggregator(config, None);

        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let map = agg.collect_all(&doc, Some(&root), &CancelToken::new()).await;
        assert_eq!(map.len(), 1);

        let output = logs.contents();
        assert!(output.contains("skipping oversized stylesheet"));
        assert!(!output.contains("WARN"), "unexpected warning: {}", output);
        fs::remove_dir_all(&root).ok();
    }
}
