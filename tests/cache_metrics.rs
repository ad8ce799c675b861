use std::{collections::HashSet, num::NonZeroUsize, sync::Arc, time::Duration};

use mapperlab::{
    application::{bootstrap, users::UserMapper},
    cache::EvictionPolicy,
    config::{NamespaceCacheSettings, PluginSettings},
    infra::db::MemoryDataSource,
    plugin::{CapturingSink, ObservationSink},
};
use metrics_util::debugging::DebuggingRecorder;

#[test]
fn cache_and_plugin_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let source = MemoryDataSource::seeded();
    source.set_latency(Some(Duration::from_millis(2)));
    let plugins = PluginSettings {
        slow_sql_threshold_ms: Some("1".to_string()),
        ..PluginSettings::default()
    };
    let factory = bootstrap::session_factory(
        &NamespaceCacheSettings {
            enabled: true,
            capacity: NonZeroUsize::new(1).expect("non-zero"),
            eviction_policy: EvictionPolicy::Lru,
        },
        &plugins,
        Arc::new(source.clone()),
        Arc::new(CapturingSink::new()) as Arc<dyn ObservationSink>,
    )
    .expect("session factory");

    // L2 miss, timed slow read, then an L1 hit.
    let mut session = factory.open_session();
    let mut mapper = UserMapper::new(&mut session);
    mapper.find_by_id(1).expect("first read");
    mapper.find_by_id(1).expect("session cache read");
    session.close().expect("close");

    // L2 hit, then a second key evicts the first at capacity one.
    let mut session = factory.open_session();
    let mut mapper = UserMapper::new(&mut session);
    mapper.find_by_id(1).expect("namespace cache read");
    mapper.find_by_id(2).expect("evicting read");

    // A rejected full-table write still flushes the namespace.
    assert!(mapper.update_all().is_err());
    session.close().expect("close");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "mapperlab_cache_l1_hit_total",
        "mapperlab_cache_l2_hit_total",
        "mapperlab_cache_l2_miss_total",
        "mapperlab_cache_l2_evict_total",
        "mapperlab_cache_l2_flush_total",
        "mapperlab_sql_cost_ms",
        "mapperlab_sql_slow_total",
        "mapperlab_policy_violation_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
