use std::{num::NonZeroUsize, sync::Arc};

use mapperlab::{
    application::{
        bootstrap,
        error::AppError,
        users::{UserMapper, statements},
    },
    cache::EvictionPolicy,
    config::{NamespaceCacheSettings, PluginSettings},
    executor::ExecutorError,
    infra::db::MemoryDataSource,
    mapping::{Params, RowBounds},
    plugin::{CapturingSink, ObservationSink},
    session::SessionFactory,
};

fn cache_settings(capacity: usize, eviction_policy: EvictionPolicy) -> NamespaceCacheSettings {
    NamespaceCacheSettings {
        enabled: true,
        capacity: NonZeroUsize::new(capacity).expect("non-zero capacity"),
        eviction_policy,
    }
}

fn factory_with(cache: NamespaceCacheSettings) -> (SessionFactory, MemoryDataSource) {
    let source = MemoryDataSource::seeded();
    let sink = Arc::new(CapturingSink::new()) as Arc<dyn ObservationSink>;
    let factory = bootstrap::session_factory(
        &cache,
        &PluginSettings::default(),
        Arc::new(source.clone()),
        sink,
    )
    .expect("session factory");
    (factory, source)
}

fn factory() -> (SessionFactory, MemoryDataSource) {
    factory_with(cache_settings(512, EvictionPolicy::Lru))
}

fn read_user(factory: &SessionFactory, id: i64) {
    let mut session = factory.open_session();
    UserMapper::new(&mut session)
        .find_by_id(id)
        .expect("find user");
    session.close().expect("close session");
}

#[test]
fn equal_reads_in_one_session_hit_the_backend_once() {
    let (factory, source) = factory();
    let mut session = factory.open_session();

    let mut mapper = UserMapper::new(&mut session);
    let first = mapper.find_all().expect("first read");
    let second = mapper.find_all().expect("second read");

    assert_eq!(first, second);
    assert_eq!(source.executions(statements::FIND_ALL), 1);
    assert_eq!(session.cached_results(), 1);
}

#[test]
fn different_parameters_are_different_keys() {
    let (factory, source) = factory();
    let mut session = factory.open_session();

    let mut mapper = UserMapper::new(&mut session);
    mapper.find_by_id(1).expect("user 1");
    mapper.find_by_id(2).expect("user 2");
    mapper.find_by_id(1).expect("user 1 again");

    assert_eq!(source.executions(statements::FIND_BY_ID), 2);
}

#[test]
fn row_bounds_are_part_of_the_key() {
    let (factory, source) = factory();
    let mut session = factory.open_session();

    let mut mapper = UserMapper::new(&mut session);
    let page = mapper.find_page(RowBounds::new(1, 1)).expect("page");
    let all = mapper.find_all().expect("all");

    assert_eq!(page.len(), 1);
    assert_eq!(page[0].username, "bob");
    assert_eq!(all.len(), 3);
    assert_eq!(source.executions(statements::FIND_ALL), 2);
}

#[test]
fn a_write_in_the_session_forces_the_next_read_to_execute() {
    let (factory, source) = factory();
    let mut session = factory.open_session();

    let mut mapper = UserMapper::new(&mut session);
    mapper.find_all().expect("read");
    mapper.update_one().expect("write");
    let users = mapper.find_all().expect("read after write");

    assert_eq!(users[0].username, "kubo");
    assert_eq!(source.executions(statements::FIND_ALL), 2);
    assert!(session.is_dirty());
}

#[test]
fn namespace_cache_is_shared_between_sessions() {
    let (factory, source) = factory();

    read_user(&factory, 1);
    read_user(&factory, 1);

    assert_eq!(source.executions(statements::FIND_BY_ID), 1);
}

#[test]
fn a_write_in_another_session_flushes_the_namespace() {
    let (factory, source) = factory();
    read_user(&factory, 1);

    let mut writer = factory.open_session();
    UserMapper::new(&mut writer)
        .update_one()
        .expect("update one");
    writer.commit(false).expect("commit");
    writer.close().expect("close");

    read_user(&factory, 1);
    assert_eq!(source.executions(statements::FIND_BY_ID), 2);
}

#[test]
fn least_recently_read_entry_is_evicted_first() {
    let (factory, source) = factory_with(cache_settings(2, EvictionPolicy::Lru));

    read_user(&factory, 1);
    read_user(&factory, 2);
    read_user(&factory, 1);
    read_user(&factory, 3);
    assert_eq!(source.executions(statements::FIND_BY_ID), 3);

    read_user(&factory, 1);
    assert_eq!(source.executions(statements::FIND_BY_ID), 3);

    read_user(&factory, 2);
    assert_eq!(source.executions(statements::FIND_BY_ID), 4);
}

#[test]
fn fifo_ignores_reads_when_evicting() {
    let (factory, source) = factory_with(cache_settings(2, EvictionPolicy::Fifo));

    read_user(&factory, 1);
    read_user(&factory, 2);
    read_user(&factory, 1);
    read_user(&factory, 3);

    read_user(&factory, 1);
    assert_eq!(source.executions(statements::FIND_BY_ID), 4);
}

#[test]
fn disabled_namespace_cache_leaves_only_the_session_cache() {
    let mut settings = cache_settings(512, EvictionPolicy::Lru);
    settings.enabled = false;
    let (factory, source) = factory_with(settings);

    read_user(&factory, 1);
    read_user(&factory, 1);

    assert_eq!(source.executions(statements::FIND_BY_ID), 2);
    assert!(factory.caches().is_empty());
}

#[test]
fn full_table_update_is_rejected_before_reaching_the_backend() {
    let (factory, source) = factory();
    let mut session = factory.open_session();

    let err = UserMapper::new(&mut session)
        .update_all()
        .expect_err("full-table update must be blocked");

    assert!(matches!(
        err,
        AppError::Executor(ExecutorError::PolicyViolation { ref statement_id, .. })
            if statement_id == statements::UPDATE_ALL
    ));
    assert_eq!(source.executions(statements::UPDATE_ALL), 0);
    assert!(source.users().iter().all(|user| user.username != "kubo"));
}

#[test]
fn closed_session_refuses_work() {
    let (factory, _source) = factory();
    let mut session = factory.open_session();
    session.close().expect("close");
    session.close().expect("second close is a no-op");

    let err = session
        .select_list(statements::FIND_ALL, &Params::new())
        .expect_err("closed session");
    assert!(matches!(err, ExecutorError::SessionClosed));
}

#[test]
fn unknown_statement_is_reported() {
    let (factory, _source) = factory();
    let mut session = factory.open_session();

    let err = session
        .select_list("UserMapper.findByEmail", &Params::new())
        .expect_err("unknown statement");
    assert!(matches!(err, ExecutorError::UnknownStatement { .. }));
}

#[test]
fn reads_cannot_go_through_update() {
    let (factory, _source) = factory();
    let mut session = factory.open_session();

    let err = session
        .update(statements::FIND_ALL, &Params::new())
        .expect_err("read statement used as write");
    assert!(matches!(err, ExecutorError::CommandMismatch { .. }));
}
