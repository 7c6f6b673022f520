//! Decoded image handles keyed by source string.
//!
//! A source decodes at most once while it stays cached. Background decodes
//! run on a single worker thread per cache and report back through a
//! channel; `poll` installs whatever has finished.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tiny_skia::Pixmap;
use usvg::fontdb;

use crate::decode::decode_source;
use crate::error::Result;

/// Cheap-to-clone reference to a decoded (or not yet decoded) raster.
#[derive(Clone, Debug, Default)]
pub struct RasterHandle {
    source: Option<Arc<str>>,
    image: Option<Arc<Pixmap>>,
}

impl RasterHandle {
    /// A handle with no source at all; behaves like an undecoded one.
    pub fn empty() -> Self {
        RasterHandle::default()
    }

    pub fn from_pixmap(pixmap: Pixmap) -> Self {
        RasterHandle {
            source: None,
            image: Some(Arc::new(pixmap)),
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn image(&self) -> Option<&Pixmap> {
        self.image.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.image.is_some()
    }

    /// 0 until decoded, and for sources that failed to decode.
    pub fn natural_width(&self) -> u32 {
        self.image.as_ref().map_or(0, |p| p.width())
    }

    pub fn natural_height(&self) -> u32 {
        self.image.as_ref().map_or(0, |p| p.height())
    }
}

#[derive(Clone, Debug)]
enum Entry {
    Pending,
    Ready(Arc<Pixmap>),
    Failed,
}

struct Decoded {
    source: String,
    result: Result<Pixmap>,
}

struct Job {
    source: String,
    fontdb: Option<Arc<fontdb::Database>>,
}

pub struct ImageCache {
    entries: HashMap<String, Entry>,
    /// Queue of the decode worker, started on the first background request.
    jobs: Option<Sender<Job>>,
    tx: Sender<Decoded>,
    rx: Receiver<Decoded>,
    fontdb: Option<Arc<fontdb::Database>>,
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCache {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        ImageCache {
            entries: HashMap::new(),
            jobs: None,
            tx,
            rx,
            fontdb: None,
        }
    }

    /// Font database handed to the SVG rasteriser so text inside SVG logos renders.
    pub fn with_fontdb(mut self, db: Arc<fontdb::Database>) -> Self {
        self.fontdb = Some(db);
        self
    }

    /// Returns immediately. Unknown sources are queued on the decode worker
    /// and come back as an undecoded handle until `poll` picks up the result.
    pub fn request(&mut self, source: &str) -> RasterHandle {
        if !self.entries.contains_key(source) {
            self.entries.insert(source.to_string(), Entry::Pending);
            log::debug!("decoding {} in background", short(source));
            self.submit(Job {
                source: source.to_string(),
                fontdb: self.fontdb.clone(),
            });
        }
        self.handle(source)
    }

    fn submit(&mut self, job: Job) {
        let jobs = self
            .jobs
            .get_or_insert_with(|| spawn_worker(self.tx.clone()));
        if let Err(mpsc::SendError(job)) = jobs.send(job) {
            // worker gone after a decoder panic; start a fresh one
            log::warn!("decode worker stopped; restarting");
            let jobs = self.jobs.insert(spawn_worker(self.tx.clone()));
            let _ = jobs.send(job);
        }
    }

    /// Decodes on the calling thread unless the source is already settled.
    pub fn load_blocking(&mut self, source: &str) -> RasterHandle {
        let settled = matches!(
            self.entries.get(source),
            Some(Entry::Ready(_)) | Some(Entry::Failed)
        );
        if !settled {
            let result = decode_source(source, self.fontdb.clone());
            self.install(source.to_string(), result);
        }
        self.handle(source)
    }

    /// Installs finished background decodes. Returns how many handles changed.
    pub fn poll(&mut self) -> usize {
        let mut changed = 0;
        while let Ok(done) = self.rx.try_recv() {
            let pending = self
                .entries
                .get(&done.source)
                .map(|e| matches!(e, Entry::Pending));
            match pending {
                Some(true) => {
                    self.install(done.source, done.result);
                    changed += 1;
                }
                // settled meanwhile by load_blocking; first result stays
                Some(false) => {}
                None => log::warn!("dropping stale decode of {}", short(&done.source)),
            }
        }
        changed
    }

    pub fn handle(&self, source: &str) -> RasterHandle {
        let image = match self.entries.get(source) {
            Some(Entry::Ready(p)) => Some(p.clone()),
            _ => None,
        };
        RasterHandle {
            source: Some(Arc::from(source)),
            image,
        }
    }

    /// Drops a source; the next request decodes it again.
    pub fn forget(&mut self, source: &str) {
        self.entries.remove(source);
    }

    pub fn is_pending(&self, source: &str) -> bool {
        matches!(self.entries.get(source), Some(Entry::Pending))
    }

    pub fn has_pending(&self) -> bool {
        self.entries.values().any(|e| matches!(e, Entry::Pending))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn install(&mut self, source: String, result: Result<Pixmap>) {
        let entry = match result {
            Ok(pixmap) => {
                log::debug!(
                    "decoded {} ({}x{})",
                    short(&source),
                    pixmap.width(),
                    pixmap.height()
                );
                Entry::Ready(Arc::new(pixmap))
            }
            Err(e) => {
                log::warn!("cannot decode {}: {e}", short(&source));
                Entry::Failed
            }
        };
        self.entries.insert(source, entry);
    }
}

fn spawn_worker(results: Sender<Decoded>) -> Sender<Job> {
    let (jobs, queue) = mpsc::channel::<Job>();
    thread::spawn(move || {
        for job in queue {
            let result = decode_source(&job.source, job.fontdb);
            let done = Decoded {
                source: job.source,
                result,
            };
            // receiver gone means the cache was dropped
            if results.send(done).is_err() {
                break;
            }
        }
    });
    jobs
}

// data URLs are long; keep log lines readable
fn short(source: &str) -> &str {
    match source.char_indices().nth(48) {
        Some((i, _)) => &source[..i],
        None => source,
    }
}
