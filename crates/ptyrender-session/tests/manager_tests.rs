//! Session manager tests over in-process backends.

mod common;

use std::sync::Arc;

use ptyrender_core::{Config, Dimensions, Error, SessionStatus};
use ptyrender_session::{BackendKind, SessionManager};

use common::{registry, FeedBackend};

#[tokio::test]
async fn manager_applies_config_to_requests() {
    let (backend, _feeder) = FeedBackend::new("mock", BackendKind::NativePty);
    let log = backend.log.clone();

    let config = Config::from_yaml(
        r#"
terminal:
  default_cols: 132
  default_rows: 43
  term: vt220
output:
  read_chunk_size: 512
"#,
    )
    .unwrap();
    let manager = SessionManager::with_registry(config, Arc::new(registry(vec![backend])));

    let (session, _events) = manager
        .create_session("top".to_string(), vec!["-b".to_string()], None)
        .unwrap();

    {
        let log = log.lock().unwrap();
        let request = &log.requests[0];
        assert_eq!(request.command, "top");
        assert_eq!(request.args, vec!["-b"]);
        assert_eq!(request.dimensions, Dimensions::new(43, 132));
        assert_eq!(request.term, "vt220");
        assert_eq!(request.chunk_size, 512);
    }

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.dimensions, Dimensions::new(43, 132));

    manager.close_all().await.unwrap();
    assert_eq!(manager.session_count(), 0);
}

#[tokio::test]
async fn explicit_dimensions_override_defaults() {
    let (backend, _feeder) = FeedBackend::new("mock", BackendKind::NativePty);
    let manager =
        SessionManager::with_registry(Config::default(), Arc::new(registry(vec![backend])));

    let (session, _events) = manager
        .create_session("ls".to_string(), vec![], Some(Dimensions::new(5, 20)))
        .unwrap();
    assert_eq!(
        session.snapshot().await.unwrap().dimensions,
        Dimensions::new(5, 20)
    );

    manager
        .resize_session(&session.id(), Dimensions::new(6, 30))
        .await
        .unwrap();
    assert_eq!(
        session.snapshot().await.unwrap().dimensions,
        Dimensions::new(6, 30)
    );

    manager.close_session(&session.id()).await.unwrap();
    assert_eq!(session.status(), SessionStatus::Terminated);
}

#[tokio::test]
async fn exhaustion_is_not_registered() {
    let (backend, _feeder) = FeedBackend::new("mock", BackendKind::NativePty);
    let manager = SessionManager::with_registry(
        Config::default(),
        Arc::new(registry(vec![backend.unavailable()])),
    );

    let result = manager.create_session("ls".to_string(), vec![], None);
    assert!(matches!(result, Err(Error::BackendsExhausted { .. })));
    assert_eq!(manager.session_count(), 0);
}

#[tokio::test]
async fn finished_sessions_are_reaped_on_list() {
    let (backend, feeder) = FeedBackend::new("mock", BackendKind::NativePty);
    let manager =
        SessionManager::with_registry(Config::default(), Arc::new(registry(vec![backend])));

    let (session, _events) = manager.create_session("true".to_string(), vec![], None).unwrap();
    assert_eq!(manager.list_sessions().len(), 1);
    assert_eq!(manager.list_sessions()[0].backend_name, "mock");

    drop(feeder);
    assert_eq!(session.wait().await, SessionStatus::Exited);

    assert!(manager.list_sessions().is_empty());
    assert!(matches!(
        manager.get_session(&session.id()),
        Err(Error::SessionNotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_spawns_respect_session_limit() {
    let mut backends = Vec::new();
    let mut feeders = Vec::new();
    for name in ["feed-a", "feed-b", "feed-c", "feed-d", "feed-e", "feed-f"] {
        let (backend, feeder) = FeedBackend::new(name, BackendKind::NativePty);
        backends.push(backend);
        feeders.push(feeder);
    }

    let config = Config::from_yaml("server:\n  max_sessions: 2\n").unwrap();
    let manager = SessionManager::with_registry(config, Arc::new(registry(backends)));
    let runtime = tokio::runtime::Handle::current();

    let results: Vec<_> = std::thread::scope(|scope| {
        let spawned: Vec<_> = (0..6)
            .map(|_| {
                let manager = &manager;
                let runtime = runtime.clone();
                scope.spawn(move || {
                    let _guard = runtime.enter();
                    manager.create_session("cat".to_string(), vec![], None)
                })
            })
            .collect();
        spawned.into_iter().map(|thread| thread.join().unwrap()).collect()
    });

    let started = results.iter().filter(|result| result.is_ok()).count();
    let refused = results
        .iter()
        .filter(|result| matches!(result, Err(Error::SessionLimitReached(2))))
        .count();
    assert_eq!(started, 2);
    assert_eq!(refused, 4);
    assert_eq!(manager.session_count(), 2);

    drop(results);
    manager.close_all().await.unwrap();
    drop(feeders);
}
