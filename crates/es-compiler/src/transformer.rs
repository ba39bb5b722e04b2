use std::{
    sync::{LazyLock, Mutex},
    time::Instant,
};

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{
    engine::{TransformLibrary, TransformOptions, TransformRuntime},
    error::{EngineError, Error},
    source_map::{SOURCE_MAP_SENTINEL, SOURCE_MAPPING_URL_PREFIX},
};

/// Options every transform starts from.
///
/// Only the ES2015+ features the host engine lacks are enabled. Module plugins
/// other than CommonJS are dropped and regenerator-based transforms are left out
/// because they need a runtime the host does not ship.
pub static DEFAULT_OPTIONS: LazyLock<TransformOptions> = LazyLock::new(|| {
    let mut options = TransformOptions::default();
    options.set(
        "plugins",
        json!([
            ["transform-es2015-classes", {"loose": false}],
            "transform-es2015-object-super",
            ["transform-es2015-modules-commonjs", {"loose": false}],
            "transform-exponentiation-operator",
        ]),
    );
    options.set("ast", false);
    options.set("sourceMaps", false);
    options.set("babelrc", false);
    options.set("compact", false);
    options.set("retainLines", true);
    options.set("highlightCode", false);
    options
});

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformOutput {
    pub code: String,
    pub source_map: Option<Vec<u8>>,
}

/// One transform runtime, used by one caller at a time.
pub struct Transformer<L: TransformLibrary> {
    runtime: Mutex<L::Runtime>,
}

impl<L: TransformLibrary> Transformer<L> {
    pub fn new(runtime: L::Runtime) -> Self {
        Self {
            runtime: Mutex::new(runtime),
        }
    }

    /// Rewrites `source` into syntax the host engine understands.
    ///
    /// With `source_maps` set the output ends in a `sourceMappingURL` comment
    /// pointing at [`SOURCE_MAP_SENTINEL`] and the map comes back alongside it,
    /// composed with `input_map` when one is given.
    pub fn transform(
        &self,
        source: &str,
        filename: &str,
        source_maps: bool,
        input_map: Option<&[u8]>,
    ) -> Result<TransformOutput, Error> {
        // A runtime that panicked mid-transform may hold half-built state.
        let mut runtime = self.runtime.lock().map_err(|_| {
            Error::transform(filename, EngineError::new("transform runtime panicked in an earlier transform"))
        })?;
        let options = transform_options(filename, source_maps, input_map);

        let started = Instant::now();
        let output = runtime
            .transform(source, &options)
            .map_err(|e| Error::transform(filename, e))?;
        debug!(filename, elapsed = ?started.elapsed(), "transformed");

        if !source_maps {
            return Ok(TransformOutput {
                code: output.code,
                source_map: None,
            });
        }

        let map = output.map.ok_or_else(|| {
            Error::transform(filename, EngineError::new("source map was requested but not generated"))
        })?;
        let source_map = serde_json::to_vec(&map)
            .map_err(|e| Error::transform(filename, EngineError::new(e.to_string())))?;

        let mut code = output.code;
        code.push_str(SOURCE_MAPPING_URL_PREFIX);
        code.push_str(SOURCE_MAP_SENTINEL);

        Ok(TransformOutput {
            code,
            source_map: Some(source_map),
        })
    }
}

fn transform_options(filename: &str, source_maps: bool, input_map: Option<&[u8]>) -> TransformOptions {
    let mut options = DEFAULT_OPTIONS.clone();

    if source_maps {
        // The map carries exact positions, so line retention only costs readability.
        options.set("retainLines", false);
        options.set("sourceMaps", true);

        match input_map.filter(|map| !map.is_empty()).map(|map| serde_json::from_slice::<Value>(map)) {
            Some(Ok(map)) => options.set("inputSourceMap", map),
            Some(Err(err)) => {
                warn!(filename, error = %err, "ignoring undecodable input source map");
            }
            None => {}
        }
    }

    options.set("filename", filename);
    options
}
