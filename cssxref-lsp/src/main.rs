//! cssxref LSP Server - live CSS selector diagnostics.
//!
//! Provides IDE integration with:
//! - Diagnostics on open, change and save (full text sync)
//! - Unnecessary markers on unused selectors
//! - `cssxref.clearCache` command
//!
//! A newer request for a document cancels the one still running for it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::RwLock;
use tower_lsp::jsonrpc::{Error as LspError, Result as LspResult};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};

use cssxref_core::diagnostic::SOURCE;
use cssxref_core::{
    cache, init_structured_logging, load_config, log_info, log_warn, shared, workspace_root_for, CancelToken,
    Document, DocumentKind, LineIndex, StyleCache, Validator, XrefConfig,
};

const CLEAR_CACHE_COMMAND: &str = "cssxref.clearCache";

/// Text of an open document, as last sent by the client.
#[derive(Debug, Clone)]
struct OpenDocument {
    version: i32,
    text: String,
    kind: DocumentKind,
}

/// Per-session state created in `initialize`.
struct Session {
    validator: Arc<Validator>,
    folders: Vec<PathBuf>,
}

/// Cancel tokens of the running request per document.
///
/// Tokens are swapped synchronously when a request is scheduled, so requests
/// supersede each other in the order they were issued.
#[derive(Clone, Default)]
struct InFlight(Arc<Mutex<HashMap<Url, CancelToken>>>);

impl InFlight {
    fn requests(&self) -> MutexGuard<'_, HashMap<Url, CancelToken>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a new request for `uri`, cancelling the previous one.
    fn begin(&self, uri: &Url) -> CancelToken {
        let token = CancelToken::new();
        if let Some(previous) = self.requests().insert(uri.clone(), token.clone()) {
            previous.cancel();
        }
        token
    }

    fn cancel(&self, uri: &Url) {
        if let Some(token) = self.requests().remove(uri) {
            token.cancel();
        }
    }

    fn cancel_all(&self) {
        for (_, token) in self.requests().drain() {
            token.cancel();
        }
    }
}

/// cssxref Language Server state.
#[derive(Clone)]
struct CssxrefLsp {
    client: Client,
    session: Arc<RwLock<Option<Session>>>,
    documents: Arc<RwLock<HashMap<Url, OpenDocument>>>,
    in_flight: InFlight,
}

impl CssxrefLsp {
    fn new(client: Client) -> Self {
        Self {
            client,
            session: Arc::new(RwLock::new(None)),
            documents: Arc::new(RwLock::new(HashMap::new())),
            in_flight: InFlight::default(),
        }
    }

    /// Validates `uri` in the background, superseding any running request.
    fn schedule(&self, uri: Url) {
        let token = self.in_flight.begin(&uri);
        let this = self.clone();
        tokio::spawn(async move { this.validate_uri(uri, token).await });
    }

    async fn validate_uri(&self, uri: Url, token: CancelToken) {
        let Some(open) = self.documents.read().await.get(&uri).cloned() else {
            return;
        };
        let (validator, folders) = match self.session.read().await.as_ref() {
            Some(session) => (Arc::clone(&session.validator), session.folders.clone()),
            None => return,
        };

        let path = uri.to_file_path().ok();
        let root = path.as_deref().and_then(|p| workspace_root_for(p, &folders));
        let mut doc = Document::new(uri.to_string(), i64::from(open.version), open.text, open.kind);
        if let Some(path) = path {
            doc = doc.with_path(path);
        }

        let diagnostics = validator.validate(&doc, root.as_deref(), &token).await;
        if token.is_cancelled() || !self.is_current(&uri, open.version).await {
            return;
        }

        let index = LineIndex::new(&doc.text);
        let lsp_diagnostics = diagnostics
            .iter()
            .map(|d| to_lsp_diagnostic(&doc.text, &index, d))
            .collect();
        self.client
            .publish_diagnostics(uri, lsp_diagnostics, Some(open.version))
            .await;
    }

    /// False once the document was closed or moved past `version`.
    async fn is_current(&self, uri: &Url, version: i32) -> bool {
        self.documents
            .read()
            .await
            .get(uri)
            .is_some_and(|doc| doc.version == version)
    }

    async fn update_document(&self, uri: Url, version: i32, text: String, language_id: Option<&str>) {
        let config = match self.session.read().await.as_ref() {
            Some(session) => session.validator.config().clone(),
            None => XrefConfig::default(),
        };
        let mut documents = self.documents.write().await;
        let kind = match (documents.get(&uri), language_id) {
            (Some(existing), None) => existing.kind,
            _ => document_kind(&uri, language_id, &config),
        };
        documents.insert(uri, OpenDocument { version, text, kind });
    }

    async fn log_info(&self, message: &str) {
        log_info(message);
        self.client.log_message(MessageType::INFO, message).await;
    }
}

/// Kind from the file extension, falling back to the client's language id.
/// Unknown documents are treated as markup.
fn document_kind(uri: &Url, language_id: Option<&str>, config: &XrefConfig) -> DocumentKind {
    if let Some(kind) = config.kind_for_path(Path::new(uri.path())) {
        return kind;
    }
    match language_id.unwrap_or_default() {
        "css" | "scss" | "less" => DocumentKind::Style,
        "javascript" | "javascriptreact" | "typescript" | "typescriptreact" => DocumentKind::Script,
        _ => DocumentKind::Markup,
    }
}

/// LSP position (UTF-16 columns) of a byte offset.
fn utf16_position(text: &str, index: &LineIndex, offset: usize) -> Position {
    let offset = offset.min(text.len());
    let line = match index.offset_to_line_col(offset) {
        Some(pos) => pos.line,
        None => index.line_count().saturating_sub(1) as u32,
    };
    let start = index.line_start(line).unwrap_or(0).min(offset);
    let character = text
        .get(start..offset)
        .map_or(offset - start, |s| s.encode_utf16().count());
    Position::new(line, character as u32)
}

fn to_lsp_diagnostic(text: &str, index: &LineIndex, diag: &cssxref_core::Diagnostic) -> Diagnostic {
    Diagnostic {
        range: Range::new(
            utf16_position(text, index, diag.offset),
            utf16_position(text, index, diag.end()),
        ),
        severity: Some(DiagnosticSeverity::WARNING),
        code: Some(NumberOrString::String(diag.kind.code().to_string())),
        source: Some(SOURCE.to_string()),
        message: diag.message.clone(),
        tags: diag
            .is_unnecessary()
            .then(|| vec![DiagnosticTag::UNNECESSARY]),
        ..Diagnostic::default()
    }
}

/// Workspace folders announced by the client, or its root URI.
#[allow(deprecated)]
fn workspace_folders(params: &InitializeParams) -> Vec<PathBuf> {
    let mut folders: Vec<PathBuf> = params
        .workspace_folders
        .iter()
        .flatten()
        .filter_map(|f| f.uri.to_file_path().ok())
        .collect();
    if folders.is_empty() {
        if let Some(path) = params.root_uri.as_ref().and_then(|u| u.to_file_path().ok()) {
            folders.push(path);
        }
    }
    folders
}

/// Initialization options win; otherwise the first folder's cssxref.toml.
fn session_config(params: &InitializeParams, folders: &[PathBuf]) -> LspResult<XrefConfig> {
    if let Some(options) = params.initialization_options.clone().filter(|v| !v.is_null()) {
        return XrefConfig::from_json(options).map_err(|e| LspError::invalid_params(e.to_string()));
    }
    for folder in folders {
        match load_config(folder) {
            Ok(Some(config)) => return Ok(config),
            Ok(None) => {}
            Err(e) => log_warn(&format!("Ignoring config in {}: {:#}", folder.display(), e)),
        }
    }
    Ok(XrefConfig::default())
}

#[tower_lsp::async_trait]
impl LanguageServer for CssxrefLsp {
    async fn initialize(&self, params: InitializeParams) -> LspResult<InitializeResult> {
        let folders = workspace_folders(&params);
        let config = session_config(&params, &folders)?;

        let cache = StyleCache::new(config.cache_max_entries, config.cache_ttl())
            .map_err(|e| LspError::invalid_params(e.to_string()))?;
        let validator = Validator::from_config(Arc::new(config), shared(cache))
            .map_err(|e| LspError::invalid_params(e.to_string()))?;

        *self.session.write().await = Some(Session {
            validator: Arc::new(validator),
            folders,
        });

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                        include_text: Some(false),
                    })),
                    ..Default::default()
                })),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![CLEAR_CACHE_COMMAND.to_string()],
                    ..Default::default()
                }),
                ..ServerCapabilities::default()
            },
            server_info: Some(ServerInfo {
                name: "cssxref-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.log_info("cssxref LSP server initialized").await;
    }

    async fn shutdown(&self) -> LspResult<()> {
        self.in_flight.cancel_all();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        self.update_document(doc.uri.clone(), doc.version, doc.text, Some(doc.language_id.as_str()))
            .await;
        self.schedule(doc.uri);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };
        let uri = params.text_document.uri;
        self.update_document(uri.clone(), params.text_document.version, change.text, None)
            .await;
        self.schedule(uri);
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        self.schedule(params.text_document.uri);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.write().await.remove(&uri);
        self.in_flight.cancel(&uri);
        if let Some(session) = self.session.read().await.as_ref() {
            cache::lock(session.validator.cache()).delete(uri.as_str());
        }
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> LspResult<Option<serde_json::Value>> {
        if params.command != CLEAR_CACHE_COMMAND {
            return Err(LspError::invalid_params(format!("Unknown command: {}", params.command)));
        }

        if let Some(session) = self.session.read().await.as_ref() {
            cache::lock(session.validator.cache()).clear();
        }
        let open: Vec<Url> = self.documents.read().await.keys().cloned().collect();
        self.log_info(&format!("Selector cache cleared, revalidating {} document(s)", open.len()))
            .await;
        for uri in open {
            self.schedule(uri);
        }
        Ok(None)
    }
}

#[tokio::main]
async fn main() {
    // Set up panic hook for graceful error handling
    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] cssxref-lsp internal error: {}", info);
    }));

    // Logs go to stderr; stdout carries the protocol.
    init_structured_logging();

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(CssxrefLsp::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}
