use std::{sync::Arc, thread};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use crate::{
    bytecode::SharedBytecode,
    compiler::{Compiler, Options},
    engine::{HostEngine, TransformLibrary},
    error::{EngineError, Error},
};

/// A fixed set of compilers, each with a private transformer, for compiling
/// many scripts in parallel.
pub struct CompilerPool<H: HostEngine, L: TransformLibrary> {
    sender: Sender<Compiler<H, L>>,
    receiver: Receiver<Compiler<H, L>>,
    capacity: usize,
    engine: Arc<H>,
    bytecode: Arc<SharedBytecode<L>>,
    options: Options,
}

impl<H: HostEngine, L: TransformLibrary> CompilerPool<H, L> {
    /// Builds `size` compilers in parallel and starts their transformers, so
    /// nothing is left to warm up once the pool is returned. A size of zero is
    /// treated as one.
    pub fn new(size: usize, engine: Arc<H>, bytecode: Arc<SharedBytecode<L>>, options: Options) -> Result<Self, Error> {
        let capacity = size.max(1);
        let (sender, receiver) = crossbeam_channel::bounded(capacity);

        thread::scope(|s| {
            let workers = (0..capacity)
                .map(|_| s.spawn(|| warm_up(&engine, &bytecode, &options, &sender)))
                .collect::<Vec<_>>();

            workers.into_iter().try_for_each(|worker| {
                worker.join().unwrap_or_else(|_| {
                    Err(Error::Initialization(EngineError::new(
                        "compiler initialization panicked",
                    )))
                })
            })
        })?;

        debug!(capacity, "compiler pool ready");

        Ok(Self {
            sender,
            receiver,
            capacity,
            engine,
            bytecode,
            options,
        })
    }

    /// Takes a compiler out of the pool, waiting for one to be released if
    /// all of them are in use.
    pub fn acquire(&self) -> Compiler<H, L> {
        match self.receiver.recv() {
            Ok(compiler) => compiler,
            // The pool holds both ends of the channel, so this is unreachable while it lives.
            Err(_) => Compiler::new(Arc::clone(&self.engine), Arc::clone(&self.bytecode), self.options.clone()),
        }
    }

    pub fn try_acquire(&self) -> Option<Compiler<H, L>> {
        self.receiver.try_recv().ok()
    }

    /// Puts a compiler back. Never blocks; a compiler that does not fit is dropped.
    pub fn release(&self, compiler: Compiler<H, L>) {
        if let Err(err) = self.sender.try_send(compiler) {
            warn!(capacity = self.capacity, error = %err, "dropping compiler released to a full pool");
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of compilers currently waiting in the pool.
    pub fn available(&self) -> usize {
        self.receiver.len()
    }
}

fn warm_up<H: HostEngine, L: TransformLibrary>(
    engine: &Arc<H>,
    bytecode: &Arc<SharedBytecode<L>>,
    options: &Options,
    sender: &Sender<Compiler<H, L>>,
) -> Result<(), Error> {
    let transformer = Arc::new(bytecode.instantiate()?);
    let compiler = Compiler::new(Arc::clone(engine), Arc::clone(bytecode), options.clone()).with_transformer(transformer);
    sender
        .send(compiler)
        .map_err(|_| Error::Initialization(EngineError::new("compiler pool closed during warm-up")))
}
