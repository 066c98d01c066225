//! Resource Resolver: binary references to displayable URLs.
//!
//! A reference either exposes a direct URL, used as-is with nothing to
//! release, or has its bytes fetched and registered under a process-local
//! handle URL. Handles are owned by [`LocalHandle`] values and released when
//! those drop, so a consumer that detaches or switches references can never
//! leak one or release one twice.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use quire_core::{BlobRef, ImageSettings};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::remote::BlobSource;

/// Scheme prefix of locally allocated handle URLs.
pub const LOCAL_HANDLE_PREFIX: &str = "blob:quire/";

// ============================================================================
// IMAGE PAYLOADS
// ============================================================================

/// Fetched bytes tagged with their image type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Detect the image type from magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];

    if bytes.starts_with(PNG) {
        Some("image/png")
    } else if bytes.starts_with(JPEG) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

// ============================================================================
// HANDLE REGISTRY
// ============================================================================

#[derive(Default)]
struct RegistryState {
    next: u64,
    live: HashMap<String, ImagePayload>,
}

/// Arena of locally allocated handle URLs.
#[derive(Clone, Default)]
pub struct HandleRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a payload and return the owning handle.
    pub fn allocate(&self, payload: ImagePayload) -> LocalHandle {
        let mut state = self.lock();
        state.next += 1;
        let url = format!("{LOCAL_HANDLE_PREFIX}{}", state.next);
        state.live.insert(url.clone(), payload);
        tracing::debug!(url = %url, "Allocated local handle");
        LocalHandle {
            url,
            registry: self.clone(),
        }
    }

    /// Payload behind a live handle URL.
    pub fn get(&self, url: &str) -> Option<ImagePayload> {
        self.lock().live.get(url).cloned()
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.lock().live.contains_key(url)
    }

    /// Number of handles currently allocated.
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    fn release(&self, url: &str) {
        if self.lock().live.remove(url).is_some() {
            tracing::debug!(url = %url, "Released local handle");
        }
    }
}

/// Owner of one local handle URL. Dropping it releases the handle.
#[derive(Debug)]
pub struct LocalHandle {
    url: String,
    registry: HandleRegistry,
}

impl LocalHandle {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for LocalHandle {
    fn drop(&mut self) {
        self.registry.release(&self.url);
    }
}

impl std::fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("live", &self.live_count())
            .finish()
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// How a reference resolved.
#[derive(Debug)]
pub enum Resolution {
    /// The reference's own URL; nothing allocated.
    Direct(String),
    /// Fetched bytes behind a local handle.
    Local(LocalHandle),
}

impl Resolution {
    pub fn url(&self) -> &str {
        match self {
            Resolution::Direct(url) => url,
            Resolution::Local(handle) => handle.url(),
        }
    }
}

/// Turns binary references into displayable URLs.
#[derive(Clone)]
pub struct ResourceResolver {
    source: Arc<dyn BlobSource>,
    registry: HandleRegistry,
    default_mime: String,
}

impl ResourceResolver {
    pub fn new(source: Arc<dyn BlobSource>, settings: &ImageSettings) -> Self {
        Self {
            source,
            registry: HandleRegistry::new(),
            default_mime: settings.default_mime.clone(),
        }
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    /// Resolve once. Failures are logged and yield `None`.
    pub async fn resolve(&self, blob: &BlobRef) -> Option<Resolution> {
        if let Some(url) = self.source.direct_url(blob) {
            return Some(Resolution::Direct(url));
        }
        let payload = self.fetch_payload(blob).await?;
        Some(Resolution::Local(self.registry.allocate(payload)))
    }

    async fn fetch_payload(&self, blob: &BlobRef) -> Option<ImagePayload> {
        match self.source.fetch_bytes(blob).await {
            Ok(bytes) => {
                let mime = sniff_mime(&bytes)
                    .map(str::to_string)
                    .unwrap_or_else(|| self.default_mime.clone());
                Some(ImagePayload { mime, bytes })
            }
            Err(err) => {
                tracing::warn!(reference = %blob, error = %err, "Image resolution failed");
                None
            }
        }
    }

    /// Attach a consumer. The slot owns at most one handle at a time.
    pub fn attach(&self) -> ImageSlot {
        let (notify, _) = watch::channel(0);
        ImageSlot {
            resolver: self.clone(),
            state: Arc::new(Mutex::new(SlotState::default())),
            task: None,
            notify: Arc::new(notify),
        }
    }
}

// ============================================================================
// IMAGE SLOT
// ============================================================================

#[derive(Default)]
struct SlotState {
    reference: Option<BlobRef>,
    generation: u64,
    resolution: Option<Resolution>,
    pending: bool,
}

/// One consumer's view of a (possibly changing) reference.
pub struct ImageSlot {
    resolver: ResourceResolver,
    state: Arc<Mutex<SlotState>>,
    task: Option<JoinHandle<()>>,
    notify: Arc<watch::Sender<u64>>,
}

fn lock_slot(state: &Mutex<SlotState>) -> MutexGuard<'_, SlotState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ImageSlot {
    /// Point the slot at `blob`. Unchanged references are a no-op; otherwise
    /// the previous handle is released before the new resolution starts.
    pub fn set_reference(&mut self, blob: Option<&BlobRef>) {
        let mut state = lock_slot(&self.state);
        if state.reference.as_ref() == blob {
            return;
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        state.generation += 1;
        state.resolution = None;
        state.reference = blob.cloned();
        state.pending = false;

        let Some(blob) = blob else {
            drop(state);
            self.bump();
            return;
        };

        if let Some(url) = self.resolver.source.direct_url(blob) {
            state.resolution = Some(Resolution::Direct(url));
            drop(state);
            self.bump();
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(reference = %blob, "No async runtime; image left unresolved");
                drop(state);
                self.bump();
                return;
            }
        };

        state.pending = true;
        let generation = state.generation;
        drop(state);

        let resolver = self.resolver.clone();
        let slot_state = Arc::clone(&self.state);
        let notify = Arc::clone(&self.notify);
        let blob = blob.clone();
        self.task = Some(runtime.spawn(async move {
            let payload = resolver.fetch_payload(&blob).await;
            let mut state = lock_slot(&slot_state);
            if state.generation != generation {
                return;
            }
            state.resolution = payload.map(|p| Resolution::Local(resolver.registry.allocate(p)));
            state.pending = false;
            drop(state);
            notify.send_modify(|version| *version += 1);
        }));
        self.bump();
    }

    fn bump(&self) {
        self.notify.send_modify(|version| *version += 1);
    }

    pub fn reference(&self) -> Option<BlobRef> {
        lock_slot(&self.state).reference.clone()
    }

    /// Resolved URL, or `None` while pending, on failure, or with no
    /// reference.
    pub fn url(&self) -> Option<String> {
        lock_slot(&self.state)
            .resolution
            .as_ref()
            .map(|r| r.url().to_string())
    }

    pub fn is_pending(&self) -> bool {
        lock_slot(&self.state).pending
    }

    /// Wait for the current resolution to finish and return its URL.
    pub async fn settled(&self) -> Option<String> {
        let mut receiver = self.notify.subscribe();
        loop {
            if !self.is_pending() {
                return self.url();
            }
            if receiver.changed().await.is_err() {
                return None;
            }
        }
    }
}

impl Drop for ImageSlot {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let mut state = lock_slot(&self.state);
        state.generation += 1;
        state.resolution = None;
        state.pending = false;
    }
}
