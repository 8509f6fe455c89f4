use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::block::{BlockId, InnerBlock};
use crate::config::{LocalConfig, RuntimeConfig};
use crate::context::ContextError;
use crate::operator::{Data, Operator};
use crate::worker::spawn_worker;
use crate::CoordUInt;

/// Coordinates that identify a replica of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coord {
    /// The identifier of the block the replica belongs to.
    pub block_id: BlockId,
    /// The index of the replica inside the block.
    pub replica_id: CoordUInt,
}

impl Coord {
    pub fn new(block_id: BlockId, replica_id: CoordUInt) -> Self {
        Self {
            block_id,
            replica_id,
        }
    }
}

impl Display for Coord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Coord[b{}, r{}]", self.block_id, self.replica_id)
    }
}

/// Metadata associated to a replica of a block, passed to the operators during setup.
#[derive(Debug, Clone)]
pub struct ExecutionMetadata {
    /// The coordinate of the block (it's ID, replica ID, ...).
    pub coord: Coord,
    /// The list of replicas of this block.
    pub replicas: Vec<Coord>,
    /// The global identifier of the replica (from 0 to `replicas.len()-1`)
    pub global_id: CoordUInt,
}

/// Function that sets up a replica of a block and spawns its worker.
type StartHandle =
    Box<dyn FnOnce(&mut ExecutionMetadata) -> std::io::Result<JoinHandle<()>> + Send>;

/// How the execution of a block ended, set once all its replicas have been joined.
///
/// The slot is filled by whichever execution runs the block, and it is empty while the block is
/// still pending.
pub(crate) type BlockOutcomeRef = Arc<Mutex<Option<Result<(), ContextError>>>>;

/// The blocks of a job, each with the start handles of its replicas.
struct SchedulerBlockInfo {
    id: BlockId,
    name: String,
    start_handles: Vec<StartHandle>,
    outcome: BlockOutcomeRef,
}

/// The `Scheduler` is the entity that keeps track of all the blocks of the job graph and when the
/// execution starts it spawns all the workers.
pub(crate) struct Scheduler {
    /// The configuration of the runtime.
    config: LocalConfig,
    /// The blocks registered since the last execution.
    blocks: Vec<SchedulerBlockInfo>,
}

impl Scheduler {
    pub fn new(runtime: RuntimeConfig) -> Self {
        let config = match runtime {
            RuntimeConfig::Local(local) => local,
        };
        Self {
            config,
            blocks: Default::default(),
        }
    }

    /// Register a new block inside the scheduler.
    ///
    /// The block is cloned once for every replica it will run with. The returned slot receives
    /// the outcome of the block when it has been executed.
    pub(crate) fn add_block<Out: Data, OperatorChain>(
        &mut self,
        block: InnerBlock<Out, OperatorChain>,
    ) -> BlockOutcomeRef
    where
        OperatorChain: Operator<Out> + 'static,
    {
        let instances = block.replication.instances(self.config.parallelism);
        let id = block.id;
        let name = block.to_string();
        debug!("scheduling block {id} with {instances} replicas: {name}");

        let mut replicas = Vec::with_capacity(instances as usize);
        for _ in 1..instances {
            replicas.push(block.clone());
        }
        replicas.push(block);

        let start_handles = replicas
            .into_iter()
            .map(|block| {
                Box::new(move |metadata: &mut ExecutionMetadata| spawn_worker(block, metadata))
                    as StartHandle
            })
            .collect();
        let outcome = BlockOutcomeRef::default();
        self.blocks.push(SchedulerBlockInfo {
            id,
            name,
            start_handles,
            outcome: outcome.clone(),
        });
        outcome
    }

    /// Number of blocks waiting to be executed.
    pub(crate) fn pending(&self) -> usize {
        self.blocks.len()
    }

    /// Drop all the registered blocks without running them, their outcome is
    /// [`ContextError::Stopped`].
    pub(crate) fn clear(&mut self) {
        for block in self.blocks.drain(..) {
            *block.outcome.lock() = Some(Err(ContextError::Stopped));
        }
    }

    /// Take the registered blocks, leaving the scheduler empty and ready for the next job.
    pub(crate) fn take(&mut self) -> Scheduler {
        Scheduler {
            config: self.config,
            blocks: std::mem::take(&mut self.blocks),
        }
    }

    /// Start the computation of all the blocks and wait until all of them complete.
    ///
    /// Each block gets its own outcome in its slot, the returned result summarizes all of them.
    pub(crate) fn start_blocking(self) -> Result<(), ContextError> {
        info!(
            "starting scheduler with {} blocks: {:?}",
            self.blocks.len(),
            self.config
        );
        let mut running = Vec::with_capacity(self.blocks.len());
        for block in self.blocks {
            let replicas = (0..block.start_handles.len() as CoordUInt)
                .map(|replica_id| Coord::new(block.id, replica_id))
                .collect::<Vec<_>>();
            debug!("starting block {}: {}", block.id, block.name);
            let mut join_handles = Vec::with_capacity(replicas.len());
            let mut spawn_error = None;
            for (start_handle, &coord) in block.start_handles.into_iter().zip(replicas.iter()) {
                let mut metadata = ExecutionMetadata {
                    coord,
                    replicas: replicas.clone(),
                    global_id: coord.replica_id,
                };
                match start_handle(&mut metadata) {
                    Ok(handle) => join_handles.push((coord, handle)),
                    Err(e) => {
                        error!("cannot spawn worker {coord}: {e}");
                        spawn_error.get_or_insert(e);
                    }
                }
            }
            running.push((block.outcome, join_handles, spawn_error));
        }

        // wait till the computation ends
        let mut total_panicked = 0;
        let mut first_spawn_error = None;
        for (outcome, join_handles, spawn_error) in running {
            let mut panicked = 0;
            for (coord, handle) in join_handles {
                if handle.join().is_err() {
                    error!("worker {coord} panicked");
                    panicked += 1;
                }
            }
            total_panicked += panicked;
            let result = match spawn_error {
                Some(e) => {
                    let copy = std::io::Error::new(e.kind(), e.to_string());
                    first_spawn_error.get_or_insert(copy);
                    Err(ContextError::Spawn(e))
                }
                None if panicked > 0 => Err(ContextError::WorkerPanicked(panicked)),
                None => Ok(()),
            };
            *outcome.lock() = Some(result);
        }
        if let Some(e) = first_spawn_error {
            return Err(ContextError::Spawn(e));
        }
        if total_panicked > 0 {
            return Err(ContextError::WorkerPanicked(total_panicked));
        }
        Ok(())
    }
}
