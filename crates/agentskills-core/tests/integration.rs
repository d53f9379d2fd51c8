//! Integration tests for the agentskills-core crate.
//!
//! These tests exercise the registry, tag index, set operations, loader and
//! execution tracking together through the public API.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use agentskills_core::{
    CallStatus, ConflictPolicy, ExecutionMode, HandlerCatalog, Invocation, LoadFilter,
    RegistryConfig, SkillArgs, SkillError, SkillLoader, SkillRecord, SkillRegistry, StaticModule,
    ops, skill_fn,
};
use serde_json::{Map, Value, json};

#[derive(Debug, thiserror::Error)]
#[error("division by zero")]
struct DivisionByZero;

fn noop(name: &str, tags: &[&str]) -> SkillRecord {
    SkillRecord::builder(name, skill_fn(|_| Ok(Value::Null)))
        .description(format!("{name} skill"))
        .tags(tags.iter().copied())
        .build()
        .unwrap()
}

fn registry_with(records: Vec<SkillRecord>) -> SkillRegistry {
    let registry = SkillRegistry::new();
    registry.register_all(records).unwrap();
    registry
}

fn key_set(registry: &SkillRegistry) -> BTreeSet<String> {
    registry.get_keys().into_iter().collect()
}

fn math_catalog() -> HandlerCatalog {
    HandlerCatalog::new()
        .with_documented(
            "sum",
            "Sum of a list of numbers.",
            skill_fn(|args| {
                let numbers: Vec<f64> = args.required(0, "numbers")?;
                Ok(json!(numbers.iter().sum::<f64>()))
            }),
        )
        .with_documented(
            "divide",
            "Divide a by b.",
            skill_fn(|args| {
                let a: f64 = args.required(0, "a")?;
                let b: f64 = args.required(1, "b")?;
                if b == 0.0 {
                    return Err(DivisionByZero.into());
                }
                Ok(json!(a / b))
            }),
        )
}

fn write(dir: &Path, name: &str, text: &str) {
    std::fs::write(dir.join(name), text).unwrap();
}

// ═══════════════════════════════════════════════════════════════════════
//  Registry and tag index
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn tag_scenario_and_remove() {
    let registry = registry_with(vec![
        noop("A", &["math", "geom"]),
        noop("B", &["math"]),
        noop("C", &["text"]),
    ]);

    assert_eq!(registry.get_by_tag(["math"]), vec!["A", "B"]);
    assert_eq!(registry.get_by_tag(["math", "geom"]), vec!["A"]);

    assert!(registry.remove("B"));
    assert_eq!(registry.get_names(), vec!["A", "C"]);
}

#[test]
fn multi_tag_query_is_intersection_of_single_tag_queries() {
    let registry = registry_with(vec![
        noop("a", &["x", "y"]),
        noop("b", &["x"]),
        noop("c", &["y", "z"]),
        noop("d", &["x", "y", "z"]),
    ]);

    for (t1, t2) in [("x", "y"), ("y", "z"), ("x", "z")] {
        let left: BTreeSet<String> = registry.get_by_tag([t1]).into_iter().collect();
        let right: BTreeSet<String> = registry.get_by_tag([t2]).into_iter().collect();
        let both: BTreeSet<String> = registry.get_by_tag([t1, t2]).into_iter().collect();
        assert_eq!(both, &left & &right, "{t1} AND {t2}");
    }
}

#[test]
fn enumeration_order_under_register_remove_sequences() {
    let registry = SkillRegistry::new();
    for name in ["a", "b", "c", "d"] {
        registry.register(noop(name, &[])).unwrap();
    }
    registry.remove("b");
    registry.register(noop("e", &[])).unwrap();
    registry.register(noop("b", &[])).unwrap();
    registry.register(noop("c", &["updated"])).unwrap();
    registry.remove("a");

    assert_eq!(registry.get_names(), vec!["c", "d", "e", "b"]);
    assert_eq!(registry.get_by_tag(["updated"]), vec!["c"]);
}

#[test]
fn register_then_remove_round_trip() {
    let registry = registry_with(vec![noop("A", &["math", "geom"]), noop("C", &["text"])]);
    let names = registry.get_names();
    let index = registry.tag_index();

    let key = registry.register(noop("D", &["math", "fresh"])).unwrap();
    assert_eq!(registry.get_by_tag(["math"]), vec!["A", "D"]);
    assert!(registry.remove(&key));

    assert_eq!(registry.get_names(), names);
    assert_eq!(registry.tag_index(), index);
}

#[test]
fn metadata_is_schemaless() {
    let registry = SkillRegistry::new();
    let record = SkillRecord::builder("detect_objects", skill_fn(|_| Ok(json!([]))))
        .description("Detect objects in an image")
        .tags(["vision", "ml"])
        .param("image_path", "Path to the image")
        .meta("version", "2.0")
        .meta("requires_gpu", true)
        .meta("supported_formats", json!(["jpg", "png"]))
        .build()
        .unwrap();
    registry.register(record).unwrap();

    let mut patch = Map::new();
    patch.insert("version".into(), json!("2.1"));
    patch.insert("model_size".into(), json!("large"));
    registry.update_metadata("detect_objects", patch).unwrap();

    let meta = registry.get_metadata("local.detect_objects").unwrap();
    assert_eq!(meta["version"], json!("2.1"));
    assert_eq!(meta["model_size"], json!("large"));
    assert_eq!(meta["requires_gpu"], json!(true));
    assert_eq!(meta["parameters"]["image_path"], json!("Path to the image"));
}

// ═══════════════════════════════════════════════════════════════════════
//  Set operations
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn union_last_wins() {
    let b_first = SkillRecord::builder("B", skill_fn(|_| Ok(json!("first"))))
        .description("first B")
        .build()
        .unwrap();
    let b_second = SkillRecord::builder("B", skill_fn(|_| Ok(json!("second"))))
        .description("second B")
        .build()
        .unwrap();

    let first = registry_with(vec![noop("A", &[]), b_first]);
    let second = registry_with(vec![b_second, noop("C", &[])]);

    let merged = ops::union(&first, &second);
    assert_eq!(
        key_set(&merged),
        BTreeSet::from(["local.A", "local.B", "local.C"].map(String::from))
    );
    assert_eq!(merged.get("local.B").unwrap().description(), "second B");
    assert_eq!(merged.invoke("B", &SkillArgs::new()).unwrap(), json!("second"));

    let b_from_second = second.get("local.B").unwrap();
    assert!(Arc::ptr_eq(&merged.get("local.B").unwrap(), &b_from_second));
}

#[test]
fn set_identities() {
    let a = registry_with(vec![noop("p", &[]), noop("q", &[]), noop("r", &[])]);
    let b = registry_with(vec![noop("q", &[]), noop("s", &[])]);

    assert_eq!(key_set(&ops::union(&a, &b)), key_set(&ops::union(&b, &a)));
    assert_eq!(
        ops::difference(&a, &b).len() + ops::intersection(&a, &b).len(),
        a.len()
    );
    assert_eq!(
        key_set(&ops::symmetric_difference(&a, &b)),
        key_set(&ops::union(&ops::difference(&a, &b), &ops::difference(&b, &a)))
    );
    assert_eq!(
        ops::symmetric_difference(&a, &b).get_keys(),
        vec!["local.p", "local.r", "local.s"]
    );
}

#[test]
fn set_operation_results_share_trackers() {
    let a = registry_with(vec![noop("shared", &[])]);
    let b = SkillRegistry::new();
    let merged = a.union(&b);

    merged.invoke("shared", &SkillArgs::new().arg(1)).unwrap();
    assert_eq!(
        a.get_last_call("shared").unwrap().status(),
        CallStatus::CalledOk
    );
}

// ═══════════════════════════════════════════════════════════════════════
//  Loader
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn folder_with_two_files_yields_two_plus_zero() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "math.toml",
        r#"
[[skill]]
name = "sum"
tags = ["math"]

[[skill]]
name = "divide"
tags = ["math", "arith"]
"#,
    );
    write(tmp.path(), "empty.toml", "namespace = \"nothing\"\n");

    let loader = SkillLoader::new(SkillRegistry::new(), math_catalog());
    assert_eq!(loader.from_folder(tmp.path(), &LoadFilter::new()).unwrap(), 2);
    assert_eq!(loader.registry().get_names().len(), 2);
}

#[test]
fn folder_filters_and_invocation() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "calc.toml",
        r#"
namespace = "calc"

[[skill]]
name = "sum"
tags = ["math", "aggregate"]

[skill.parameters]
numbers = "List of numbers"

[[skill]]
name = "divide"
tags = ["math", "arith"]
"#,
    );

    let loader = SkillLoader::new(SkillRegistry::new(), math_catalog());
    let filter = LoadFilter::new().by_tags(["math"]).exclude_tags(["arith"]);
    assert_eq!(loader.from_folder(tmp.path(), &filter).unwrap(), 1);

    let registry = loader.registry();
    assert_eq!(registry.get_keys(), vec!["calc.sum"]);
    assert_eq!(
        registry
            .invoke("calc.sum", &SkillArgs::new().kwarg("numbers", json!([1.5, 2.5])))
            .unwrap(),
        json!(4.0)
    );

    let tools = registry.tool_definitions();
    assert_eq!(tools[0].name, "calc_sum");
    assert_eq!(tools[0].description, "Sum of a list of numbers.");
}

#[test]
fn load_error_names_path_and_cause() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "broken.toml", "[[skill]]\nname = \"sum\"\ntags = [\"math\"\n");

    let loader = SkillLoader::new(SkillRegistry::new(), math_catalog());
    let err = loader
        .from_file(&tmp.path().join("broken.toml"))
        .unwrap_err();
    match &err {
        SkillError::Load { path, reason } => {
            assert!(path.ends_with("broken.toml"));
            assert!(!reason.is_empty());
        }
        other => panic!("expected a load error, got {other:?}"),
    }
    assert!(err.to_string().contains("broken.toml"));
}

#[test]
fn modules_and_current_context() {
    let module = StaticModule::new("helpers")
        .with_skill(noop("tidy", &["util"]))
        .with_skill(noop("format", &["util", "text"]));

    let loader = SkillLoader::new(SkillRegistry::new(), HandlerCatalog::new())
        .with_current(StaticModule::new("main").with_skill(noop("entry", &[])));

    assert_eq!(loader.from_module(&module).unwrap(), 2);
    assert_eq!(loader.from_current().unwrap(), 1);
    assert_eq!(
        loader.registry().get_keys(),
        vec!["helpers.tidy", "helpers.format", "main.entry"]
    );
}

#[test]
fn registries_loading_one_module_keep_separate_history() {
    let module = StaticModule::new("net").with_skill(noop("ping", &[]));
    let first = SkillLoader::new(SkillRegistry::new(), HandlerCatalog::new());
    let second = SkillLoader::new(SkillRegistry::new(), HandlerCatalog::new());
    first.from_module(&module).unwrap();
    second.from_module(&module).unwrap();

    first.registry().invoke("ping", &SkillArgs::new()).unwrap();
    assert_eq!(
        second.registry().get_last_call("ping").unwrap().status(),
        CallStatus::NeverCalled
    );

    first.registry().clear();
    first.from_module(&module).unwrap();
    assert_eq!(
        first.registry().get_last_call("ping").unwrap().status(),
        CallStatus::NeverCalled
    );
}

#[test]
fn shared_namespace_across_files_counts_distinct_skills() {
    let tmp = tempfile::tempdir().unwrap();
    for file in ["a.toml", "b.toml"] {
        write(tmp.path(), file, "namespace = \"ns\"\n[[skill]]\nname = \"x\"\nhandler = \"sum\"\n");
    }

    let loader = SkillLoader::new(SkillRegistry::new(), math_catalog());
    let count = loader.from_folder(tmp.path(), &LoadFilter::new()).unwrap();
    assert_eq!(count, loader.registry().get_names().len());
    assert_eq!(count, 1);
}

// ═══════════════════════════════════════════════════════════════════════
//  Invocation and tracking
// ═══════════════════════════════════════════════════════════════════════

fn divide_registry() -> SkillRegistry {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "math.toml", "[[skill]]\nname = \"divide\"\n");
    let loader = SkillLoader::new(SkillRegistry::new(), math_catalog());
    loader.from_file(&tmp.path().join("math.toml")).unwrap();
    loader.registry().clone()
}

#[test]
fn tracker_reflects_success_then_failure() {
    let registry = divide_registry();
    assert_eq!(
        registry.get_last_call("divide").unwrap().status(),
        CallStatus::NeverCalled
    );

    let value = registry
        .invoke("math.divide", &SkillArgs::new().arg(10.0).arg(4.0))
        .unwrap();
    assert_eq!(value, json!(2.5));
    let ok = registry.get_last_call("math.divide").unwrap();
    assert_eq!(ok.result, Some(json!(2.5)));
    assert!(ok.exception.is_none());

    let err = registry
        .invoke("math.divide", &SkillArgs::new().arg(1.0).arg(0.0))
        .unwrap_err();
    let fault = err.skill_fault().unwrap();
    assert!(fault.downcast_ref::<DivisionByZero>().is_some());

    let failed = registry.get_last_call("math.divide").unwrap();
    assert!(failed.result.is_none());
    assert!(
        failed
            .exception
            .as_ref()
            .unwrap()
            .downcast_ref::<DivisionByZero>()
            .is_some()
    );
    assert_eq!(failed.args, vec![json!(1.0), json!(0.0)]);

    registry
        .invoke("math.divide", &SkillArgs::new().arg(9.0).arg(3.0))
        .unwrap();
    let recovered = registry.get_last_call("math.divide").unwrap();
    assert_eq!(recovered.result, Some(json!(3.0)));
    assert!(recovered.exception.is_none());
}

#[test]
fn execution_modes_through_registry() {
    let registry = divide_registry();

    let planned = registry
        .invoke_with_mode("divide", SkillArgs::new().arg(8.0).arg(2.0), ExecutionMode::GetArgs)
        .unwrap();
    assert!(matches!(planned, Invocation::Planned { ref key, .. } if key == "math.divide"));
    assert!(registry.get_last_result("divide").unwrap().is_none());

    let Invocation::Dispatched(handle) = registry
        .invoke_with_mode(
            "divide",
            SkillArgs::new().arg(8.0).arg(2.0),
            ExecutionMode::ExecutionOnly,
        )
        .unwrap()
    else {
        panic!("expected a dispatched call");
    };
    assert_eq!(handle.join().unwrap().unwrap(), json!(4.0));
}

// ═══════════════════════════════════════════════════════════════════════
//  Concurrency
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn concurrent_invocations_keep_separate_records() {
    let registry = divide_registry();

    let handles: Vec<_> = (1..=8u32)
        .map(|i| {
            let registry = registry.clone();
            thread::spawn(move || {
                let numerator = f64::from(i) * 10.0;
                for _ in 0..50 {
                    registry
                        .invoke("divide", &SkillArgs::new().arg(numerator).arg(10.0))
                        .unwrap();
                    let last = registry.get_last_call("divide").unwrap();
                    assert_eq!(last.args[0], json!(numerator));
                    assert_eq!(last.result, Some(json!(f64::from(i))));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(
        registry.get_last_call("divide").unwrap().status(),
        CallStatus::NeverCalled
    );
}

#[test]
fn concurrent_mutation_and_queries() {
    let registry = SkillRegistry::with_config(
        RegistryConfig::new().with_conflict_policy(ConflictPolicy::Error),
    );

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let registry = registry.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    let name = format!("w{w}_s{i}");
                    registry.register(noop(&name, &["bulk"])).unwrap();
                    if i % 5 == 0 {
                        assert!(registry.remove(&name));
                    }
                }
            })
        })
        .collect();

    let reader = {
        let registry = registry.clone();
        thread::spawn(move || {
            for _ in 0..100 {
                let names = registry.get_by_tag(["bulk"]);
                assert!(names.len() <= 100);
                for name in names {
                    assert!(name.starts_with('w'));
                }
            }
        })
    };

    for handle in writers {
        handle.join().unwrap();
    }
    reader.join().unwrap();

    assert_eq!(registry.len(), 4 * 20);
    assert_eq!(registry.get_by_tag(["bulk"]).len(), 80);
}
