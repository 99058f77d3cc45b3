//! Behavioural tests for the daemon bootstrap sequence.

use std::cell::RefCell;
use std::sync::Arc;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::bootstrap::{BootstrapError, ConfigLoader, Daemon, bootstrap_with};
use crate::server::SocketListener;

use super::support::{FailingConfigLoader, HealthEvent, RecordingHealthReporter, TestConfigLoader};

struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    test_loader: Option<TestConfigLoader>,
    reporter: Arc<RecordingHealthReporter>,
    daemon: Option<Daemon>,
    error: Option<BootstrapError>,
    held: Option<SocketListener>,
}

impl TestWorld {
    fn new() -> Self {
        Self {
            loader: Box::new(FailingConfigLoader),
            test_loader: None,
            reporter: Arc::new(RecordingHealthReporter::default()),
            daemon: None,
            error: None,
            held: None,
        }
    }

    fn bootstrap(&mut self) {
        let loader: &dyn ConfigLoader = match &self.test_loader {
            Some(loader) => loader,
            None => &*self.loader,
        };
        match bootstrap_with(loader, self.reporter.clone()) {
            Ok(daemon) => self.daemon = Some(daemon),
            Err(error) => self.error = Some(error),
        }
    }

    fn has_event(&self, predicate: impl Fn(&HealthEvent) -> bool) -> bool {
        self.reporter.events().iter().any(predicate)
    }
}

impl Drop for TestWorld {
    fn drop(&mut self) {
        if let Some(daemon) = self.daemon.take() {
            daemon.listener().cleanup();
        }
        if let Some(held) = self.held.take() {
            held.cleanup();
        }
    }
}

#[fixture]
fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}

#[given("a healthy configuration loader")]
fn given_healthy_loader(world: &RefCell<TestWorld>) {
    world.borrow_mut().test_loader = Some(TestConfigLoader::new());
}

#[given("a failing configuration loader")]
fn given_failing_loader(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    world.loader = Box::new(FailingConfigLoader);
    world.test_loader = None;
}

#[given("the session pool capacity is {capacity}")]
fn given_capacity(world: &RefCell<TestWorld>, capacity: usize) {
    if let Some(loader) = world.borrow_mut().test_loader.as_mut() {
        loader.set_max_clients(capacity);
    }
}

#[given("another daemon already serves the socket")]
fn given_live_socket(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    let config = world
        .test_loader
        .as_ref()
        .expect("healthy loader")
        .load()
        .expect("load configuration");
    config.socket().prepare_filesystem().expect("socket directory");
    world.held = Some(SocketListener::bind(config.socket()).expect("bind live socket"));
}

#[when("the daemon bootstrap runs")]
fn when_bootstrap_runs(world: &RefCell<TestWorld>) {
    world.borrow_mut().bootstrap();
}

#[then("bootstrap succeeds")]
fn then_bootstrap_succeeds(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    assert!(world.error.is_none(), "bootstrap error: {:?}", world.error);
    assert!(world.daemon.is_some(), "daemon should have been initialised");
}

#[then("bootstrap fails")]
fn then_bootstrap_fails(world: &RefCell<TestWorld>) {
    assert!(
        world.borrow().error.is_some(),
        "bootstrap succeeded unexpectedly"
    );
}

#[then("bootstrap fails with \"{message}\"")]
fn then_bootstrap_fails_with(world: &RefCell<TestWorld>, message: String) {
    let world = world.borrow();
    let error = world.error.as_ref().expect("bootstrap should fail");
    assert!(
        error.to_string().contains(&message),
        "unexpected error: {error}"
    );
}

#[then("the daemon socket exists")]
fn then_socket_exists(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    let daemon = world.daemon.as_ref().expect("daemon");
    let path = daemon.config().socket().unix_path().expect("unix socket");
    assert!(path.exists(), "socket {path} missing");
}

#[then("the reporter recorded bootstrap start")]
fn then_reporter_start(world: &RefCell<TestWorld>) {
    assert!(
        world
            .borrow()
            .has_event(|event| *event == HealthEvent::BootstrapStarting),
        "bootstrap start event missing"
    );
}

#[then("the reporter recorded bootstrap success")]
fn then_reporter_success(world: &RefCell<TestWorld>) {
    assert!(
        world
            .borrow()
            .has_event(|event| *event == HealthEvent::BootstrapSucceeded),
        "bootstrap success event missing"
    );
}

#[then("the reporter recorded bootstrap failure")]
fn then_reporter_failure(world: &RefCell<TestWorld>) {
    assert!(
        world
            .borrow()
            .has_event(|event| matches!(event, HealthEvent::BootstrapFailed(_))),
        "bootstrap failure event missing"
    );
}

#[then("the reporter recorded the \"{permission}\" permission and \"{mac}\" MAC backends")]
fn then_reporter_backends(world: &RefCell<TestWorld>, permission: String, mac: String) {
    let expected = HealthEvent::BackendsSelected { permission, mac };
    assert!(
        world.borrow().has_event(|event| *event == expected),
        "backend selection event missing: {:?}",
        world.borrow().reporter.events()
    );
}

#[scenario(
    path = "tests/features/daemon_bootstrap.feature",
    name = "Bootstrap binds the socket and selects the backends"
)]
fn bootstrap_succeeds(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/daemon_bootstrap.feature",
    name = "Bootstrap reports configuration failures"
)]
fn bootstrap_reports_configuration_failures(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/daemon_bootstrap.feature",
    name = "Bootstrap rejects an empty session pool"
)]
fn bootstrap_rejects_empty_pool(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/daemon_bootstrap.feature",
    name = "Bootstrap refuses a socket held by a running daemon"
)]
fn bootstrap_refuses_live_socket(world: RefCell<TestWorld>) {
    drop(world);
}
