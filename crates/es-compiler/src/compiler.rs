use std::{
    borrow::Cow,
    fmt,
    sync::{Arc, OnceLock},
};

use tracing::{debug, field, warn};

use crate::{
    CompileResult,
    bytecode::SharedBytecode,
    engine::{HostEngine, SourceMapLoader, SourceMaps, TransformLibrary},
    error::{Error, SourceMapError, SyntaxError},
    mode::CompatibilityMode,
    source_map::{SOURCE_MAP_SENTINEL, increase_mappings_by_one},
    transformer::{TransformOutput, Transformer},
};

/// Non-entry modules are evaluated inside this function so `module` and
/// `exports` resolve without native module support in the host.
pub const MODULE_WRAPPER_PREFIX: &str = "(function(module, exports){\n";
pub const MODULE_WRAPPER_SUFFIX: &str = "\n})\n";

#[derive(Clone, Default)]
pub struct Options {
    pub compatibility_mode: CompatibilityMode,
    /// Without a loader, source maps are disabled altogether.
    pub source_map_loader: Option<Arc<dyn SourceMapLoader>>,
    pub strict: bool,
}

impl Options {
    pub fn with_compatibility_mode(mut self, compatibility_mode: CompatibilityMode) -> Self {
        self.compatibility_mode = compatibility_mode;
        self
    }

    pub fn with_source_map_loader(mut self, loader: impl SourceMapLoader + 'static) -> Self {
        self.source_map_loader = Some(Arc::new(loader));
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("compatibility_mode", &self.compatibility_mode)
            .field("source_map_loader", &self.source_map_loader.is_some())
            .field("strict", &self.strict)
            .finish()
    }
}

/// A successfully compiled unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled<P> {
    pub program: P,
    /// The text handed to the host, after wrapping and transforming.
    pub source: String,
    /// The last map loaded or produced for the unwrapped source.
    pub source_map: Option<Vec<u8>>,
}

/// Compiles script sources into host programs, transforming them when the
/// host rejects their syntax.
///
/// A compiler is meant to be used by one caller at a time; use a
/// [`crate::CompilerPool`] to compile in parallel.
pub struct Compiler<H: HostEngine, L: TransformLibrary> {
    engine: Arc<H>,
    bytecode: Arc<SharedBytecode<L>>,
    transformer: OnceLock<Arc<Transformer<L>>>,
    options: Options,
}

impl<H: HostEngine, L: TransformLibrary> Compiler<H, L> {
    pub fn new(engine: Arc<H>, bytecode: Arc<SharedBytecode<L>>, options: Options) -> Self {
        Self {
            engine,
            bytecode,
            transformer: OnceLock::new(),
            options,
        }
    }

    /// Uses `transformer` instead of the shared default, e.g. a private one for
    /// a compiler that transforms often.
    pub fn with_transformer(self, transformer: Arc<Transformer<L>>) -> Self {
        Self {
            transformer: OnceLock::from(transformer),
            ..self
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn engine(&self) -> &H {
        &self.engine
    }

    /// Returns this compiler's transformer. A compiler built without one
    /// uses the default transformer of its [`SharedBytecode`].
    ///
    /// Fails only when the bundled transform library itself cannot be loaded.
    pub fn initialize_transformer(&self) -> Result<&Transformer<L>, Error> {
        if let Some(transformer) = self.transformer.get() {
            return Ok(transformer.as_ref());
        }

        let transformer = self.bytecode.default_transformer()?;
        Ok(self.transformer.get_or_init(|| transformer).as_ref())
    }

    /// Rewrites `source` for the host. A map is produced only when a source map
    /// loader is configured.
    pub fn transform(&self, source: &str, filename: &str, input_map: Option<&[u8]>) -> Result<TransformOutput, Error> {
        self.initialize_transformer()?.transform(
            source,
            filename,
            self.options.source_map_loader.is_some(),
            input_map,
        )
    }

    /// Compiles `source`. Anything but the entry module is wrapped so it can
    /// be evaluated as a CommonJS-style module.
    pub fn compile(&self, source: &str, filename: &str, entry: bool) -> CompileResult<H::Program> {
        let mut mode = self.options.compatibility_mode;
        let mut source = Cow::Borrowed(source);
        let mut source_map: Option<Vec<u8>> = None;

        loop {
            let code = if entry {
                source.to_string()
            } else {
                wrap_module(&source)
            };
            let mut state = CompilationState::new(
                entry,
                source_map.take(),
                self.options.source_map_loader.as_deref(),
            );

            let error = match self.parse(&mut state, filename, &code) {
                Ok(ast) => {
                    let program = self
                        .engine
                        .compile(ast, self.options.strict)
                        .map_err(|e| Error::syntax(filename, &code, e))?;

                    return Ok(Compiled {
                        program,
                        source: code,
                        source_map: state.source_map,
                    });
                }
                Err(error) => error,
            };

            let Some(next_mode) = mode.fallback() else {
                return Err(Error::syntax(filename, &code, error));
            };

            debug!(filename, %mode, %error, "transforming source the host could not parse");
            let output = self.transform(&source, filename, state.source_map.as_deref())?;
            source = Cow::Owned(output.code);
            source_map = output.source_map;
            mode = next_mode;
        }
    }

    fn parse(&self, state: &mut CompilationState<'_>, filename: &str, code: &str) -> Result<H::Ast, SyntaxError> {
        if state.loader.is_none() {
            return self.engine.parse(filename, code, SourceMaps::Disabled);
        }

        let parsed = self.engine.parse(
            filename,
            code,
            SourceMaps::Load(&mut |path: &str| state.load_source_map(path)),
        );
        if !state.source_map_failed {
            return parsed;
        }

        // A broken map reference must not fail the script, so parse it again without maps.
        state.source_map_failed = false;
        warn!(
            filename,
            error = parsed.as_ref().err().map(field::display),
            "couldn't load source map for {filename}"
        );
        self.engine.parse(filename, code, SourceMaps::Disabled)
    }
}

fn wrap_module(source: &str) -> String {
    format!("{MODULE_WRAPPER_PREFIX}{source}{MODULE_WRAPPER_SUFFIX}")
}

/// State of a single parse attempt.
struct CompilationState<'a> {
    /// Set when a map could not be loaded or repaired; the parse is retried without maps.
    source_map_failed: bool,
    source_map: Option<Vec<u8>>,
    entry: bool,
    loader: Option<&'a dyn SourceMapLoader>,
}

impl<'a> CompilationState<'a> {
    fn new(entry: bool, source_map: Option<Vec<u8>>, loader: Option<&'a dyn SourceMapLoader>) -> Self {
        Self {
            source_map_failed: false,
            source_map,
            entry,
            loader,
        }
    }

    /// Called by the host parser for every `sourceMappingURL` it meets.
    fn load_source_map(&mut self, path: &str) -> Result<Vec<u8>, SourceMapError> {
        if path != SOURCE_MAP_SENTINEL {
            let loaded = match self.loader {
                Some(loader) => loader.load(path),
                None => Err(SourceMapError::Unavailable),
            };

            match loaded {
                Ok(map) => self.source_map = Some(map),
                Err(err) => {
                    self.source_map = None;
                    self.source_map_failed = true;
                    return Err(err);
                }
            }
        }

        let Some(map) = self.source_map.as_deref() else {
            self.source_map_failed = true;
            return Err(SourceMapError::Unavailable);
        };

        if self.entry {
            return Ok(map.to_vec());
        }

        match increase_mappings_by_one(map) {
            Ok(map) => Ok(map),
            Err(err) => {
                self.source_map_failed = true;
                Err(err)
            }
        }
    }
}
