#![no_main]

use arbitrary::Arbitrary;
use es_compiler::{SourceMapError, increase_mappings_by_one};
use libfuzzer_sys::fuzz_target;
use serde_json::{Value, json};

#[derive(Debug, Clone, Arbitrary)]
enum Mappings {
    Missing,
    Text(Vec<String>),
    Number(i64),
    List(Vec<String>),
}

#[derive(Debug, Clone, Arbitrary)]
struct ArbitraryMap {
    sources: Vec<String>,
    mappings: Mappings,
}

impl ArbitraryMap {
    fn to_json(&self) -> Value {
        let mut map = json!({"version": 3, "sources": self.sources, "names": []});
        match &self.mappings {
            Mappings::Missing => {}
            Mappings::Text(groups) => map["mappings"] = json!(groups.join(";")),
            Mappings::Number(n) => map["mappings"] = json!(n),
            Mappings::List(items) => map["mappings"] = json!(items),
        }
        map
    }
}

fuzz_target!(|input: (ArbitraryMap, Vec<u8>)| {
    let (map, raw) = input;

    // Arbitrary bytes must never panic.
    let _ = increase_mappings_by_one(&raw);

    let bytes = serde_json::to_vec(&map.to_json()).unwrap();
    match (&map.mappings, increase_mappings_by_one(&bytes)) {
        (Mappings::Missing, Ok(shifted)) => assert_eq!(shifted, bytes),
        (Mappings::Text(groups), Ok(shifted)) => {
            let shifted: Value = serde_json::from_slice(&shifted).unwrap();
            assert_eq!(shifted["mappings"], json!(format!(";{}", groups.join(";"))));
            assert_eq!(shifted["sources"], json!(map.sources));
        }
        (Mappings::Number(_) | Mappings::List(_), Err(SourceMapError::InvalidMappings)) => {}
        (mappings, result) => panic!("unexpected result for {mappings:?}: {result:?}"),
    }
});
