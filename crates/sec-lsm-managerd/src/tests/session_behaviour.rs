//! Behavioural tests for the record protocol spoken over the daemon socket.

use std::cell::RefCell;
use std::fs;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use super::support::{DaemonHarness, LineClient};

#[derive(Default)]
struct SessionWorld {
    daemon: Option<DaemonHarness>,
    client: Option<LineClient>,
    reply: Option<String>,
    listing: Vec<String>,
}

impl SessionWorld {
    fn client(&mut self) -> &mut LineClient {
        self.client.as_mut().expect("client should be connected")
    }
}

#[fixture]
fn world() -> RefCell<SessionWorld> {
    RefCell::new(SessionWorld::default())
}

#[given("a running daemon")]
fn given_daemon(world: &RefCell<SessionWorld>) {
    world.borrow_mut().daemon = Some(DaemonHarness::start(0));
}

#[given("a connected client")]
fn given_client(world: &RefCell<SessionWorld>) {
    let mut world = world.borrow_mut();
    let stream = world.daemon.as_ref().expect("daemon").connect();
    world.client = Some(LineClient::new(stream));
}

#[when("the client sends \"{record}\"")]
fn when_client_sends(world: &RefCell<SessionWorld>, record: String) {
    let mut world = world.borrow_mut();
    let reply = world.client().request(&record);
    world.reply = Some(reply);
}

#[when("the client declares its \"{kind}\" directory")]
fn when_client_declares_directory(world: &RefCell<SessionWorld>, kind: String) {
    let mut world = world.borrow_mut();
    let dir = world.daemon.as_ref().expect("daemon").root().join(&kind);
    fs::create_dir_all(&dir).expect("application directory");
    let reply = world.client().request(&format!("path {dir} {kind}"));
    world.reply = Some(reply);
}

#[when("the client requests the display")]
fn when_client_displays(world: &RefCell<SessionWorld>) {
    let mut world = world.borrow_mut();
    let listing = world.client().request_listing("display");
    world.listing = listing;
}

#[then("the reply is \"{expected}\"")]
fn then_reply_is(world: &RefCell<SessionWorld>, expected: String) {
    assert_eq!(world.borrow().reply.as_deref(), Some(expected.as_str()));
}

#[then("the display contains \"{line}\"")]
fn then_display_contains(world: &RefCell<SessionWorld>, line: String) {
    let world = world.borrow();
    assert!(
        world.listing.contains(&line),
        "display {:?} lacks {line:?}",
        world.listing
    );
}

#[then("the display ends with \"{line}\"")]
fn then_display_ends_with(world: &RefCell<SessionWorld>, line: String) {
    assert_eq!(world.borrow().listing.last(), Some(&line));
}

#[then("the connection is closed")]
fn then_connection_closed(world: &RefCell<SessionWorld>) {
    assert_eq!(world.borrow_mut().client().read_line(), None);
}

#[scenario(
    path = "tests/features/session_protocol.feature",
    name = "A described application is installed and removed"
)]
fn session_installs_application(world: RefCell<SessionWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/session_protocol.feature",
    name = "Validation errors keep the session usable"
)]
fn session_survives_validation_errors(world: RefCell<SessionWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/session_protocol.feature",
    name = "Unknown commands close the connection"
)]
fn session_closes_on_unknown_command(world: RefCell<SessionWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/session_protocol.feature",
    name = "Unsupported protocol versions are refused"
)]
fn session_refuses_unsupported_version(world: RefCell<SessionWorld>) {
    drop(world);
}
