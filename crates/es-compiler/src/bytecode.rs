use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::{
    engine::TransformLibrary,
    error::{EngineError, Error},
    transformer::Transformer,
};

/// The transform library compiled once and shared by every [`Transformer`]
/// created from it.
///
/// Build one per process (or per test) and hand it around behind an `Arc`.
/// The first caller compiles the library; concurrent callers wait for that
/// build and all of them observe the same result, including a failure.
///
/// It also owns the default transformer used by compilers that were not given
/// one of their own.
pub struct SharedBytecode<L: TransformLibrary> {
    library: L,
    compiled: OnceLock<Result<Arc<L::Bytecode>, EngineError>>,
    default_transformer: OnceLock<Result<Arc<Transformer<L>>, EngineError>>,
}

impl<L: TransformLibrary> SharedBytecode<L> {
    pub fn new(library: L) -> Self {
        Self {
            library,
            compiled: OnceLock::new(),
            default_transformer: OnceLock::new(),
        }
    }

    pub fn library(&self) -> &L {
        &self.library
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    pub fn get_or_compile(&self) -> Result<Arc<L::Bytecode>, Error> {
        self.bytecode().map_err(Error::Initialization)
    }

    /// Starts a new runtime with the library loaded.
    pub fn instantiate(&self) -> Result<Transformer<L>, Error> {
        self.start_runtime().map_err(Error::Initialization)
    }

    /// The transformer shared by every compiler without a private one. Started
    /// on first use.
    pub fn default_transformer(&self) -> Result<Arc<Transformer<L>>, Error> {
        self.default_transformer
            .get_or_init(|| {
                debug!("starting default transformer");
                self.start_runtime().map(Arc::new)
            })
            .clone()
            .map_err(Error::Initialization)
    }

    /// Drops the memoized build and the default transformer so the next
    /// caller starts from scratch.
    pub fn reset(&mut self) {
        self.compiled = OnceLock::new();
        self.default_transformer = OnceLock::new();
    }

    fn bytecode(&self) -> Result<Arc<L::Bytecode>, EngineError> {
        self.compiled
            .get_or_init(|| {
                debug!("compiling transform library");
                self.library.compile().map(Arc::new)
            })
            .clone()
    }

    fn start_runtime(&self) -> Result<Transformer<L>, EngineError> {
        let bytecode = self.bytecode()?;
        self.library.instantiate(&bytecode).map(Transformer::new)
    }
}

impl<L: TransformLibrary + std::fmt::Debug> std::fmt::Debug for SharedBytecode<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBytecode")
            .field("library", &self.library)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}
