use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::block::{BlockId, InnerBlock};
use crate::config::{ConfigError, ContextConfig, Master, RuntimeConfig, DEFAULT_BATCH_SIZE};
use crate::operator::sink::StreamOutput;
use crate::operator::source::Source;
use crate::operator::Data;
use crate::scheduler::Scheduler;
use crate::stream::Stream;
use crate::CoordUInt;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("The context has no master address")]
    MissingMaster,

    #[error("The context has no application name")]
    MissingAppName,

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("The context has been stopped")]
    Stopped,

    #[error("Cannot spawn a worker thread: {0}")]
    Spawn(std::io::Error),

    #[error("{0} worker(s) panicked during the execution")]
    WorkerPanicked(usize),
}

/// The state shared by all the handles and the streams of a context.
pub(crate) struct StreamContextInner {
    /// The resolved configuration, master and application name are always set.
    pub(crate) config: ContextConfig,
    master: Master,
    runtime: RuntimeConfig,
    /// The number of blocks created so far, used for the block ids.
    block_count: AtomicU64,
    /// The scheduler collecting the blocks of the next job.
    pub(crate) scheduler: Mutex<Scheduler>,
    /// Held while a job runs, executions on the same context are serialized.
    execution: Mutex<()>,
    stopped: AtomicBool,
}

/// Compute session that runs the streams built on it.
///
/// The context is a cheap handle: cloning it gives another handle to the same session, and
/// stopping any of them stops the session for all of them.
///
/// ```
/// # use renoir_mongo::{ContextConfig, StreamContext};
/// # use renoir_mongo::operator::source::ParallelIteratorSource;
/// let ctx = StreamContext::new(ContextConfig::new().master("local[4]").app_name("example")).unwrap();
/// let res = ctx.stream(ParallelIteratorSource::new(0..100u64)).collect_count();
/// ctx.execute_blocking().unwrap();
/// assert_eq!(res.get(), Some(100));
/// ctx.stop();
/// ```
#[derive(Clone)]
pub struct StreamContext {
    inner: Arc<StreamContextInner>,
}

impl std::fmt::Debug for StreamContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamContext")
            .field("master", &self.master())
            .field("app_name", &self.app_name())
            .field("runtime", &self.inner.runtime)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl StreamContext {
    /// Start a new session. Both the master and the application name must be set.
    pub fn new(config: ContextConfig) -> Result<Self, ContextError> {
        let master = config.master.as_deref().ok_or(ContextError::MissingMaster)?;
        let master = Master::parse(master)?;
        if config.app_name.is_none() {
            return Err(ContextError::MissingAppName);
        }
        let runtime = master.runtime();
        info!(
            "starting context {:?} on {} ({} replicas)",
            config.app_name.as_deref().unwrap_or_default(),
            master,
            runtime.parallelism()
        );
        Ok(Self {
            inner: Arc::new(StreamContextInner {
                config,
                master,
                runtime,
                block_count: AtomicU64::new(0),
                scheduler: Mutex::new(Scheduler::new(runtime)),
                execution: Mutex::new(()),
                stopped: AtomicBool::new(false),
            }),
        })
    }

    /// Start a new session with the configuration of the file pointed by
    /// [`CONFIG_ENV_VAR`](crate::config::CONFIG_ENV_VAR).
    pub fn from_env() -> Result<Self, ContextError> {
        Self::new(ContextConfig::from_env()?)
    }

    /// The master address, as given at construction.
    pub fn master(&self) -> &str {
        self.inner.master.address()
    }

    /// The application name, as given at construction.
    pub fn app_name(&self) -> &str {
        self.inner.config.app_name.as_deref().unwrap_or_default()
    }

    /// The installation path of the runtime, if configured.
    pub fn home(&self) -> Option<&Path> {
        self.inner.config.home.as_deref()
    }

    /// The deployment artifacts of the application.
    pub fn jars(&self) -> &[String] {
        &self.inner.config.jars
    }

    /// Number of replicas of the blocks with unlimited replication.
    pub fn parallelism(&self) -> CoordUInt {
        self.inner.runtime.parallelism()
    }

    pub fn runtime(&self) -> RuntimeConfig {
        self.inner.runtime
    }

    pub(crate) fn batch_size(&self) -> u32 {
        self.inner.config.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    /// Start a new stream from the given source.
    pub fn stream<Out, S>(&self, source: S) -> Stream<Out, S>
    where
        Out: Data,
        S: Source<Out> + 'static,
    {
        let block_id: BlockId = self.inner.block_count.fetch_add(1, Ordering::Relaxed);
        info!("creating a new stream, block_id={block_id}: {source}");
        let replication = source.replication();
        Stream {
            block: InnerBlock::new(block_id, source, replication),
            ctx: self.inner.clone(),
        }
    }

    /// Run all the blocks closed since the last execution and wait for their completion.
    ///
    /// The result covers all the blocks that were run: a worker panic in any of them is an
    /// error. Use [`StreamContext::execute_output`] to get the outcome of a single stream.
    ///
    /// After this the context can be used to build and run other jobs.
    pub fn execute_blocking(&self) -> Result<(), ContextError> {
        let _execution = self.inner.execution.lock();
        self.run_pending()
    }

    /// Make sure the block of `output` has run and return how its own execution ended.
    ///
    /// If another caller already ran the block, its outcome is returned without starting a new
    /// execution; otherwise all the pending blocks are run. Failures of the other blocks of the
    /// same execution are not reported here.
    pub fn execute_output<Out>(&self, output: &StreamOutput<Out>) -> Result<(), ContextError> {
        let _execution = self.inner.execution.lock();
        if !output.is_done() {
            if let Err(e) = self.run_pending() {
                debug!("execution of {} ended with: {e}", self.app_name());
            }
        }
        output.take_outcome().unwrap_or(Err(ContextError::Stopped))
    }

    /// Run the pending blocks, the execution lock must be held.
    fn run_pending(&self) -> Result<(), ContextError> {
        let mut scheduler = self.inner.scheduler.lock().take();
        if self.is_stopped() {
            warn!(
                "discarding {} blocks of stopped context {}",
                scheduler.pending(),
                self.app_name()
            );
            scheduler.clear();
            return Err(ContextError::Stopped);
        }
        info!(
            "starting execution of {} blocks of {}",
            scheduler.pending(),
            self.app_name()
        );
        scheduler.start_blocking()
    }

    /// Stop the session: the blocks not executed yet are dropped and any further execution fails.
    ///
    /// Stopping an already stopped context does nothing.
    pub fn stop(&self) {
        if !self.inner.stopped.swap(true, Ordering::AcqRel) {
            info!("stopping context {}", self.app_name());
            self.inner.scheduler.lock().clear();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Whether two handles refer to the same session.
    pub fn same_session(&self, other: &StreamContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
