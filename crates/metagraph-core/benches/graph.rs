//! Storage and engine hot-path benchmarks.
//!
//! Measures link maintenance, indexed end reads, derived reads with and
//! without the computed-value cache, and the `#opposite` scan.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use metagraph_core::{
    Engine, EngineConfig, InstanceRef, MetaAssociation, MetaAssociationEnd, MetaClass,
    MetaProperty, Multiplicity, SchemaRegistry, Value, ValueType,
};

fn engine(config: EngineConfig) -> Engine {
    let mut registry = SchemaRegistry::new();
    registry
        .register_class(
            MetaClass::new("Node")
                .with_attribute(MetaProperty::new("name", ValueType::String))
                .with_attribute(MetaProperty::new("label", ValueType::String).derived("label")),
        )
        .unwrap();
    registry
        .register_association(MetaAssociation::composite(
            "Tree", "Node", "parent", "Node", "children",
        ))
        .unwrap();
    registry
        .register_association(MetaAssociation::new(
            "Refers",
            MetaAssociationEnd::new("referrers", "Node")
                .with_multiplicity(Multiplicity::many())
                .non_navigable()
                .opposite(),
            MetaAssociationEnd::new("refers", "Node").with_multiplicity(Multiplicity::many()),
        ))
        .unwrap();
    let engine = Engine::with_schema(registry.build_indexes().unwrap()).with_config(config);
    engine
        .constraints()
        .register_derived_property("Node", "label", |ctx| {
            let name = ctx.get("name")?;
            let parent = ctx.get("parent")?;
            let prefix = match parent.as_ref_id() {
                Some(id) => ctx.get_of(id, "name")?,
                None => Value::Null,
            };
            Ok(Value::from(format!(
                "{}/{}",
                prefix.as_str().unwrap_or(""),
                name.as_str().unwrap_or("")
            )))
        });
    engine
}

/// A root with `size` named children.
fn populate(engine: &Engine, size: usize) -> (InstanceRef, Vec<InstanceRef>) {
    let root = engine.create_instance("Node").unwrap();
    engine.set_property(root.id, "name", "root").unwrap();
    let children: Vec<InstanceRef> = (0..size)
        .map(|i| {
            let child = engine.create_instance("Node").unwrap();
            engine.set_property(child.id, "name", format!("n{i}")).unwrap();
            engine.create_link("Tree", root.id, child.id).unwrap();
            child
        })
        .collect();
    (root, children)
}

fn bench_link_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/create_link");

    for size in [100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let engine = engine(EngineConfig::new());
                black_box(populate(&engine, size));
            });
        });
    }

    group.finish();
}

fn bench_end_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/end_read");

    for size in [100, 1000] {
        let engine = engine(EngineConfig::new());
        let (root, _) = populate(&engine, size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(engine.get_property_value(&root, "children").unwrap()));
        });
    }

    group.finish();
}

fn bench_derived_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/derived_read");

    for (name, config) in [
        ("cached", EngineConfig::new()),
        ("uncached", EngineConfig::new().without_cache()),
    ] {
        let engine = engine(config);
        let (_, children) = populate(&engine, 100);
        group.bench_function(name, |b| {
            b.iter(|| {
                for child in &children {
                    black_box(engine.get_property_value(child, "label").unwrap());
                }
            });
        });
    }

    group.finish();
}

fn bench_opposite_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/opposite_read");

    let engine = engine(EngineConfig::new());
    let (root, children) = populate(&engine, 1000);
    for child in &children {
        engine.create_link("Refers", child.id, root.id).unwrap();
    }
    group.bench_function("indexed", |b| {
        b.iter(|| black_box(engine.get_property_value(&root, "referrers").unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_link_creation,
    bench_end_read,
    bench_derived_read,
    bench_opposite_read
);
criterion_main!(benches);
