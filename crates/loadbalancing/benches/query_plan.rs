//! Query plan generation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use loadbalancing::{BasicLoadBalancingPolicy, LoadBalancingConfig, LoadBalancingPolicy, Request};
use metadata::{HostId, NodeInfo};

fn policy(local: u128, remote: u128) -> BasicLoadBalancingPolicy {
    let config = LoadBalancingConfig {
        local_datacenter: Some("dc1".to_string()),
        allow_remote: true,
        ..Default::default()
    };
    let policy = BasicLoadBalancingPolicy::new(config).unwrap();
    let nodes = (0..local + remote)
        .map(|id| {
            let dc = if id < local { "dc1" } else { "dc2" };
            NodeInfo::with_topology(
                HostId(id),
                format!("10.{}.{}.1:9042", id / 250, id % 250).parse().unwrap(),
                Some(dc.to_string()),
                None,
            )
        })
        .collect();
    policy.init(nodes, &[HostId(0)]).unwrap();
    policy
}

fn bench_query_plan(c: &mut Criterion) {
    let policy = policy(64, 64);
    let request = Request::new();

    c.bench_function("new_query_plan/first_node", |b| {
        b.iter(|| black_box(policy.new_query_plan(&request).next()))
    });

    c.bench_function("new_query_plan/full_walk", |b| {
        b.iter(|| black_box(policy.new_query_plan(&request).count()))
    });
}

criterion_group!(benches, bench_query_plan);
criterion_main!(benches);
