#![allow(dead_code)]

use std::{
    io::{self, Write},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use crossbeam_channel::{Receiver, Sender};
use es_compiler::{
    Compiler, EngineError, HostEngine, Options, RawTransformOutput, SharedBytecode, SourceMaps, SyntaxError,
    TransformLibrary, TransformOptions, TransformRuntime,
};
use serde_json::{Value, json};
use tracing_subscriber::fmt::MakeWriter;

/// Syntax the legacy host does not understand and the transform library rewrites.
const MODERN_SYNTAX: [&str; 2] = ["class ", "**"];
/// Syntax nothing can fix.
const INVALID_SYNTAX: &str = "@@";
const SOURCE_MAPPING_URL: &str = "//# sourceMappingURL=";

#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    pub source: String,
    pub source_map: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub source: String,
    pub strict: bool,
    pub source_map: Option<Vec<u8>>,
}

/// A host engine that only understands ES5-ish scripts.
#[derive(Debug, Default)]
pub struct LegacyEngine {
    pub parses: AtomicUsize,
    /// Every map handed to the parser, keyed by the URL that referenced it.
    pub loaded_maps: Mutex<Vec<(String, Vec<u8>)>>,
    /// Follow `sourceMappingURL` comments before reporting syntax errors.
    pub maps_before_syntax: bool,
}

impl LegacyEngine {
    pub fn loaded_maps(&self) -> Vec<(String, Vec<u8>)> {
        self.loaded_maps.lock().unwrap().clone()
    }

    fn check_syntax(source: &str) -> Result<(), SyntaxError> {
        for (line, text) in source.lines().enumerate() {
            if let Some(column) = text.find(INVALID_SYNTAX) {
                return Err(SyntaxError::new("Unexpected token @", line + 1, column + 1));
            }
            for marker in MODERN_SYNTAX {
                if let Some(column) = text.find(marker) {
                    return Err(SyntaxError::new(
                        format!("Unexpected token {}", marker.trim()),
                        line + 1,
                        column + 1,
                    ));
                }
            }
        }
        Ok(())
    }

    fn load_maps(&self, source: &str, source_maps: SourceMaps<'_>) -> Result<Option<Vec<u8>>, SyntaxError> {
        let SourceMaps::Load(loader) = source_maps else {
            return Ok(None);
        };

        let mut source_map = None;
        for (line, text) in source.lines().enumerate() {
            if let Some(url) = text.strip_prefix(SOURCE_MAPPING_URL) {
                let map = loader(url)
                    .map_err(|e| SyntaxError::new(format!("couldn't load source map: {e}"), line + 1, 1))?;
                self.loaded_maps.lock().unwrap().push((url.to_string(), map.clone()));
                source_map = Some(map);
            }
        }
        Ok(source_map)
    }
}

impl HostEngine for LegacyEngine {
    type Ast = Ast;
    type Program = Program;

    fn parse(&self, _filename: &str, source: &str, source_maps: SourceMaps<'_>) -> Result<Ast, SyntaxError> {
        self.parses.fetch_add(1, Ordering::SeqCst);

        let source_map = if self.maps_before_syntax {
            let source_map = self.load_maps(source, source_maps)?;
            Self::check_syntax(source)?;
            source_map
        } else {
            Self::check_syntax(source)?;
            self.load_maps(source, source_maps)?
        };

        Ok(Ast {
            source: source.to_string(),
            source_map,
        })
    }

    fn compile(&self, ast: Ast, strict: bool) -> Result<Program, SyntaxError> {
        if strict {
            if let Some((line, text)) = ast.source.lines().enumerate().find(|(_, text)| text.contains("with (")) {
                return Err(SyntaxError::new(
                    "Strict mode code may not include a with statement",
                    line + 1,
                    text.find("with (").unwrap_or_default() + 1,
                ));
            }
        }

        Ok(Program {
            source: ast.source,
            strict,
            source_map: ast.source_map,
        })
    }
}

/// A stand-in for the bundled Babel build.
#[derive(Debug, Default)]
pub struct FakeBabel {
    pub compiles: AtomicUsize,
    pub instances: AtomicUsize,
    pub transforms: Arc<AtomicUsize>,
    pub requests: Arc<Mutex<Vec<TransformOptions>>>,
    pub broken_bytecode: bool,
    pub failing_runtime: bool,
}

impl FakeBabel {
    pub fn transforms(&self) -> usize {
        self.transforms.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<TransformOptions> {
        self.requests.lock().unwrap().clone()
    }
}

pub struct FakeBabelRuntime {
    transforms: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<TransformOptions>>>,
    failing: bool,
}

impl TransformLibrary for FakeBabel {
    type Bytecode = String;
    type Runtime = FakeBabelRuntime;

    fn compile(&self) -> Result<String, EngineError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        if self.broken_bytecode {
            return Err(EngineError::new("SyntaxError: babel.min.js: Unexpected end of input"));
        }
        Ok("babel bytecode".to_string())
    }

    fn instantiate(&self, bytecode: &String) -> Result<FakeBabelRuntime, EngineError> {
        assert_eq!(bytecode, "babel bytecode");
        self.instances.fetch_add(1, Ordering::SeqCst);
        Ok(FakeBabelRuntime {
            transforms: Arc::clone(&self.transforms),
            requests: Arc::clone(&self.requests),
            failing: self.failing_runtime,
        })
    }
}

impl TransformRuntime for FakeBabelRuntime {
    fn transform(&mut self, source: &str, options: &TransformOptions) -> Result<RawTransformOutput, EngineError> {
        self.transforms.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(options.clone());

        if self.failing {
            return Err(EngineError::new("ReferenceError: Unknown plugin"));
        }

        let input_map = options.get("inputSourceMap");
        let mut code = source.replace("class ", "function ").replace("**", "*");
        if input_map.is_some() {
            // The composed map replaces the one the source referenced.
            code = code
                .lines()
                .filter(|line| !line.starts_with(SOURCE_MAPPING_URL))
                .collect::<Vec<_>>()
                .join("\n");
        }
        let map = (options.get("sourceMaps") == Some(&json!(true))).then(|| {
            let mut map = json!({
                "version": 3,
                "sources": [options.get("filename").cloned().unwrap_or(Value::Null)],
                "names": [],
                "mappings": vec!["AAAA"; code.lines().count().max(1)].join(";"),
            });
            if let Some(input) = input_map {
                map["x_input_mappings"] = input["mappings"].clone();
            }
            map
        });

        Ok(RawTransformOutput { code, map })
    }
}

pub fn compiler(options: Options) -> (Arc<LegacyEngine>, Arc<SharedBytecode<FakeBabel>>, Compiler<LegacyEngine, FakeBabel>) {
    compiler_with(FakeBabel::default(), options)
}

pub fn compiler_with(
    babel: FakeBabel,
    options: Options,
) -> (Arc<LegacyEngine>, Arc<SharedBytecode<FakeBabel>>, Compiler<LegacyEngine, FakeBabel>) {
    compiler_on(LegacyEngine::default(), babel, options)
}

pub fn compiler_on(
    engine: LegacyEngine,
    babel: FakeBabel,
    options: Options,
) -> (Arc<LegacyEngine>, Arc<SharedBytecode<FakeBabel>>, Compiler<LegacyEngine, FakeBabel>) {
    let engine = Arc::new(engine);
    let bytecode = Arc::new(SharedBytecode::new(babel));
    let compiler = Compiler::new(Arc::clone(&engine), Arc::clone(&bytecode), options);
    (engine, bytecode, compiler)
}

pub fn mappings(bytes: &[u8]) -> String {
    let map: Value = serde_json::from_slice(bytes).unwrap();
    map["mappings"].as_str().unwrap().to_string()
}

/// Forwards formatted log lines to a channel.
#[derive(Clone)]
pub struct LogWriter {
    sender: Sender<String>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = self.sender.send(String::from_utf8_lossy(buf).to_string());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Runs `f` with a subscriber installed and returns what it logged.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
    let (sender, receiver): (Sender<String>, Receiver<String>) = crossbeam_channel::unbounded();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(LogWriter { sender })
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    (result, receiver.try_iter().collect())
}
