#![allow(missing_docs)]

mod support;

use std::sync::Arc;
use std::thread;

use agebridge::{
    BatchLoader, EdgeDefinition, GraphData, GraphSchema, LoadOptions, Result, VertexDefinition,
};
use serde_json::json;
use support::{record, MemoryAge};

const TYPES: usize = 6;
const PER_TYPE: usize = 25;

fn schema() -> GraphSchema {
    let mut schema = GraphSchema::new().allow_undeclared(true);
    for t in 0..TYPES {
        schema = schema.vertex(format!("T{t}"), VertexDefinition::new());
    }
    schema.edge("LINK", EdgeDefinition::new("T0", "T1"))
}

fn data() -> GraphData {
    let mut data = GraphData::new();
    for t in 0..TYPES {
        for i in 0..PER_TYPE {
            data = data.vertex(format!("T{t}"), record(json!({"id": format!("t{t}_{i}"), "n": i})));
        }
    }
    for i in 0..PER_TYPE {
        data = data.edge("LINK", record(json!({"from": format!("t0_{i}"), "to": format!("t1_{i}")})));
    }
    data
}

#[test]
fn parallel_types_load_completely() -> Result<()> {
    support::init_tracing();
    let age = Arc::new(MemoryAge::new());
    let loader = BatchLoader::new(age.clone(), Arc::new(schema()), "g");
    let options = LoadOptions::new().batch_size(10).max_parallel_batches(4);
    let result = loader.load_graph_data(&data(), &options)?;

    assert!(result.success());
    assert_eq!(result.vertex_count(), (TYPES * PER_TYPE) as u64);
    assert!(result
        .vertex_counts()
        .values()
        .all(|&count| count == PER_TYPE as u64));
    assert_eq!(result.edge_count(), PER_TYPE as u64);
    for t in 0..TYPES {
        assert_eq!(age.vertices(&format!("T{t}")).len(), PER_TYPE);
    }

    let log = age.statements();
    let last_vertex = log.iter().rposition(|s| s.contains("CREATE (v:"));
    let first_edge = log.iter().position(|s| s.contains("MATCH (source:"));
    assert!(last_vertex < first_edge);
    assert!(age.staged_keys().is_empty());
    Ok(())
}

#[test]
fn parallel_failure_stops_other_workers_and_cleans_up() {
    let age = Arc::new(MemoryAge::new());
    age.fail_on("CREATE (v:T3", 0, 1);
    let loader = BatchLoader::new(age.clone(), Arc::new(schema()), "g");
    let options = LoadOptions::new().batch_size(5).max_parallel_batches(3);
    let err = loader
        .load_graph_data(&data(), &options)
        .expect_err("T3 fails");
    assert_eq!(err.code(), "BatchLoaderError");
    assert!(err.to_string().contains("T3"));
    assert!(age.vertices("T3").is_empty());
    assert!(age.statements_containing("MATCH (source:") == 0);
    assert!(age.staged_keys().is_empty());
}

#[test]
fn concurrent_calls_use_separate_namespaces() {
    let age = Arc::new(MemoryAge::new());
    let loader = Arc::new(BatchLoader::new(age.clone(), Arc::new(schema()), "g"));

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let loader = Arc::clone(&loader);
            thread::spawn(move || {
                let mut data = GraphData::new();
                for i in 0..PER_TYPE {
                    data = data.vertex("T5", record(json!({"id": i})));
                }
                loader.load_graph_data(&data, &LoadOptions::new().batch_size(7))
            })
        })
        .collect();

    let mut batch_ids = Vec::new();
    for handle in handles {
        let result = handle.join().expect("worker thread").expect("load succeeds");
        assert_eq!(result.vertex_count(), PER_TYPE as u64);
        batch_ids.push(result.batch_id().to_owned());
    }
    batch_ids.sort();
    batch_ids.dedup();
    assert_eq!(batch_ids.len(), 3);
    assert_eq!(age.vertices("T5").len(), 3 * PER_TYPE);
    assert!(age.staged_keys().is_empty());
}
