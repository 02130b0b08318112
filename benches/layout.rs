use cdg_core::config::LayoutConfig;
use cdg_core::layout::compute_layout;
use cdg_core::normalize::normalize;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::collections::BTreeMap;
use std::hint::black_box;

fn trip_payload(facts: usize, constraints: usize) -> serde_json::Value {
    let mut nodes = vec![serde_json::json!({
        "id": "goal",
        "type": "goal",
        "status": "confirmed",
        "statement": "Plan the trip",
        "importance": 0.95,
    })];
    let mut edges = Vec::new();
    for i in 0..facts {
        let id = format!("fact_{i}");
        nodes.push(serde_json::json!({
            "id": id,
            "type": "fact",
            "statement": format!("City stay: Stop{} {} days", i, (i % 5) + 1),
        }));
        edges.push(serde_json::json!({"from": "goal", "to": id, "type": "enable"}));
    }
    for i in 0..constraints {
        let id = format!("con_{i}");
        nodes.push(serde_json::json!({
            "id": id,
            "type": "constraint",
            "statement": format!("Checklist item {} limit: {}", i, i * 10),
            "severity": if i % 7 == 0 { "high" } else { "low" },
        }));
        edges.push(serde_json::json!({
            "from": id,
            "to": format!("fact_{}", i % facts.max(1)),
            "type": "constraint",
        }));
    }
    serde_json::json!({"id": "bench", "version": 1, "nodes": nodes, "edges": edges})
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    for (facts, constraints) in [(10usize, 10usize), (60, 60), (200, 300)] {
        let name = format!("trip_{}_{}", facts, constraints);
        let payload = trip_payload(facts, constraints);
        group.bench_with_input(BenchmarkId::from_parameter(name), &payload, |b, data| {
            b.iter(|| {
                let graph = normalize(black_box(data));
                black_box(graph.nodes.len());
            });
        });
    }
    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let config = LayoutConfig::default();
    let pins = BTreeMap::new();
    for (facts, constraints) in [(10usize, 10usize), (60, 60), (200, 300)] {
        let name = format!("trip_{}_{}", facts, constraints);
        let graph = normalize(&trip_payload(facts, constraints));
        group.bench_with_input(BenchmarkId::from_parameter(name), &graph, |b, graph| {
            b.iter(|| {
                let positions = compute_layout(black_box(graph), &pins, &config);
                black_box(positions.len());
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_normalize, bench_layout
);
criterion_main!(benches);
