use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::error::{PlayerError, PlayerResult};
use crate::frame::RasterFrame;
use crate::frame_loader::decode_frame;

/// Resolves one frame source into a decoded frame.
pub trait FrameDecoder: Send + Sync + 'static {
    fn decode(&self, source: &Path) -> PlayerResult<RasterFrame>;
}

/// Decodes image files from disk, honouring EXIF orientation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageFileDecoder;

impl FrameDecoder for ImageFileDecoder {
    fn decode(&self, source: &Path) -> PlayerResult<RasterFrame> {
        decode_frame(source)
    }
}

pub type LoadJob = Box<dyn FnOnce() + Send + 'static>;

/// Decides where frame load jobs run.
pub trait Spawner {
    fn spawn(&self, job: LoadJob);
}

/// Queues jobs on a fixed-size rayon pool; the caller never waits and at most `threads`
/// frames decode at once.
#[derive(Debug, Clone)]
pub struct PoolSpawner {
    pool: Arc<rayon::ThreadPool>,
}

impl PoolSpawner {
    /// `None` sizes the pool to the available cores.
    pub fn new(threads: Option<usize>) -> PlayerResult<Self> {
        if threads == Some(0) {
            return Err(PlayerError::pool("decode threads must be >= 1 when set"));
        }

        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("frame-load-{i}"));
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| PlayerError::pool(format!("failed to build decode thread pool: {e}")))?;
        debug!(threads = pool.current_num_threads(), "decode pool ready");
        Ok(Self { pool: Arc::new(pool) })
    }
}

impl Spawner for PoolSpawner {
    fn spawn(&self, job: LoadJob) {
        self.pool.spawn(job);
    }
}

/// Runs each job on the calling thread before returning.
#[cfg(test)]
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineSpawner;

#[cfg(test)]
impl Spawner for InlineSpawner {
    fn spawn(&self, job: LoadJob) {
        job();
    }
}

struct FrameSlots {
    sources: Vec<PathBuf>,
    slots: Vec<OnceLock<RasterFrame>>,
    failed: AtomicUsize,
}

/// Fixed-length, index-stable set of frames filled in as loads complete.
///
/// Slot `i` always belongs to source `i`, whatever order the loads finish in. A slot whose load
/// failed stays empty for the lifetime of the set.
#[derive(Clone)]
pub struct FrameSet {
    inner: Arc<FrameSlots>,
}

impl FrameSet {
    fn pending(sources: Vec<PathBuf>) -> Self {
        let slots = sources.iter().map(|_| OnceLock::new()).collect();
        Self {
            inner: Arc::new(FrameSlots {
                sources,
                slots,
                failed: AtomicUsize::new(0),
            }),
        }
    }

    fn fill(&self, index: usize, result: PlayerResult<RasterFrame>) {
        match result {
            Ok(frame) => {
                // Slots are written exactly once per load; a second write cannot happen.
                let _ = self.inner.slots[index].set(frame);
            }
            Err(err) => {
                self.inner.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    index,
                    source = %self.inner.sources[index].display(),
                    error = %err,
                    "frame failed to load; slot will render empty"
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.inner.sources
    }

    /// Frame at `index`, or `None` while it is still decoding, after a failed load, or out of range.
    pub fn get(&self, index: usize) -> Option<&RasterFrame> {
        self.inner.slots.get(index).and_then(OnceLock::get)
    }

    pub fn loaded_count(&self) -> usize {
        self.inner.slots.iter().filter(|slot| slot.get().is_some()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.inner.failed.load(Ordering::Relaxed)
    }

    /// Every load has either produced a frame or failed.
    pub fn is_settled(&self) -> bool {
        self.loaded_count() + self.failed_count() >= self.len()
    }

    #[cfg(test)]
    pub fn same_set(&self, other: &FrameSet) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for FrameSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSet")
            .field("len", &self.len())
            .field("loaded", &self.loaded_count())
            .field("failed", &self.failed_count())
            .finish()
    }
}

pub struct ResourceCache {
    decoder: Arc<dyn FrameDecoder>,
    spawner: Box<dyn Spawner>,
    current: Option<FrameSet>,
}

impl ResourceCache {
    pub fn new(decoder: impl FrameDecoder, spawner: impl Spawner + 'static) -> Self {
        Self {
            decoder: Arc::new(decoder),
            spawner: Box::new(spawner),
            current: None,
        }
    }

    /// Issues one non-blocking load per source and returns the set those loads will fill.
    ///
    /// Loading the same source list again returns the existing set without issuing new loads.
    pub fn load(&mut self, sources: &[PathBuf]) -> FrameSet {
        if let Some(existing) = self.current.as_ref().filter(|set| set.sources() == sources) {
            debug!(frames = existing.len(), "frame set already loaded; reusing");
            return existing.clone();
        }

        let set = FrameSet::pending(sources.to_vec());
        self.current = Some(set.clone());

        for (index, source) in sources.iter().enumerate() {
            let set = set.clone();
            let decoder = Arc::clone(&self.decoder);
            let source = source.clone();
            self.spawner.spawn(Box::new(move || {
                // A panicking decoder counts as a failed load so the set still settles.
                let result = panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(&source)))
                    .unwrap_or_else(|_| {
                        Err(PlayerError::decode(format!("decoder panicked on {}", source.display())))
                    });
                set.fill(index, result);
            }));
        }

        debug!(frames = set.len(), "issued frame loads");
        set
    }

    pub fn current(&self) -> Option<&FrameSet> {
        self.current.as_ref()
    }

    /// Forgets the current set; loads still in flight finish into the dropped set.
    pub fn evict(&mut self) {
        self.current = None;
    }
}
