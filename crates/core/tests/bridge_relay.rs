//! End-to-end bridge scenarios over scripted fake drivers.

use std::sync::Arc;
use std::time::Duration;

use sb::{Session, SessionConfig, SessionPhase, markup, pair};
use sb_driver::fake::{FakeDriver, FakeDriverBuilder, FakeDriverController};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};

fn test_config() -> SessionConfig {
	SessionConfig {
		url: "http://127.0.0.1:8080/room".into(),
		captcha_detection_window: Duration::from_millis(40),
		probe_timeout: Duration::from_millis(25),
		disconnect_grace: Duration::from_millis(10),
		leave_grace: Duration::from_millis(10),
		type_delay: Duration::ZERO,
		escape_presses: 3,
		escape_press_delay: Duration::ZERO,
	}
}

/// Scripts the page far enough for a session to reach its room: consent
/// prompt, no captcha (the detection window elapses), live send control,
/// composer and escape present.
fn seed_room(page: &FakeDriverController) {
	page.add_element(markup::CONSENT_ROOT);
	page.add_element(markup::CONSENT_ACCEPT);
	page.add_element(markup::COMPOSER);
	page.add_element(markup::ESCAPE);
	page.add_element(markup::SEND_ENABLED);
}

struct Bridge {
	a: Arc<Session<FakeDriver>>,
	b: Arc<Session<FakeDriver>>,
	page_a: FakeDriverController,
	page_b: FakeDriverController,
}

fn bridge() -> Bridge {
	let (driver_a, page_a) = FakeDriverBuilder::new().build();
	let (driver_b, page_b) = FakeDriverBuilder::new().build();
	let a = Session::new("left", test_config(), driver_a);
	let b = Session::new("right", test_config(), driver_b);
	pair(&a, &b);
	seed_room(&page_a);
	seed_room(&page_b);
	Bridge { a, b, page_a, page_b }
}

fn spawn_run(session: &Arc<Session<FakeDriver>>) -> JoinHandle<sb::Result<()>> {
	let session = Arc::clone(session);
	tokio::spawn(async move { session.run().await })
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
	let deadline = Instant::now() + Duration::from_secs(2);
	while !condition() {
		assert!(Instant::now() < deadline, "timed out waiting for: {what}");
		sleep(Duration::from_millis(5)).await;
	}
}

fn stranger_message(page: &FakeDriverController, text: &str, sent_at: u64) {
	page.add_element_with_payload(markup::STRANGER_MESSAGE, json!({ "text": text, "sentAt": sent_at.to_string() }));
}

#[tokio::test]
async fn novel_message_is_forwarded_to_the_peer_exactly_once() {
	let bridge = bridge();
	let run_a = spawn_run(&bridge.a);
	let run_b = spawn_run(&bridge.b);

	wait_until("both sessions paired", || {
		bridge.a.phase().is_connected() && bridge.b.phase().is_connected()
	})
	.await;

	stranger_message(&bridge.page_a, "hi", 100);
	wait_until("forward typed into the peer's composer", || !bridge.page_b.typed().is_empty()).await;

	// Several more poll ticks re-read the same row; still one forward.
	sleep(Duration::from_millis(120)).await;

	let typed = bridge.page_b.typed();
	assert_eq!(typed.len(), 1);
	assert_eq!(typed[0].selector, markup::COMPOSER);
	assert_eq!(typed[0].text, "hi");
	assert_eq!(bridge.page_b.clicks_on(markup::SEND_ENABLED).len(), 1);
	assert_eq!(bridge.a.last_seen().map(|message| message.sent_at), Some(100));
	assert_eq!(bridge.a.message_count(), 1);

	run_a.abort();
	run_b.abort();
}

#[tokio::test]
async fn stale_timestamps_are_not_forwarded_but_newer_ones_are() {
	let bridge = bridge();
	let run_a = spawn_run(&bridge.a);
	let run_b = spawn_run(&bridge.b);

	wait_until("both sessions paired", || {
		bridge.a.phase().is_connected() && bridge.b.phase().is_connected()
	})
	.await;

	stranger_message(&bridge.page_a, "hi", 100);
	wait_until("first forward", || bridge.page_b.typed().len() == 1).await;

	// The newest row now carries an older server timestamp; the poller
	// must treat it as already seen.
	stranger_message(&bridge.page_a, "echo from the past", 90);
	sleep(Duration::from_millis(100)).await;
	assert_eq!(bridge.page_b.typed().len(), 1);

	stranger_message(&bridge.page_a, "later", 150);
	wait_until("second forward", || bridge.page_b.typed().len() == 2).await;

	let texts: Vec<_> = bridge.page_b.typed().into_iter().map(|entry| entry.text).collect();
	assert_eq!(texts, vec!["hi", "later"]);
	assert_eq!(bridge.a.message_count(), 2);

	run_a.abort();
	run_b.abort();
}

#[tokio::test]
async fn rows_without_a_readable_timestamp_are_ignored() {
	let bridge = bridge();
	let run_a = spawn_run(&bridge.a);
	let run_b = spawn_run(&bridge.b);

	wait_until("both sessions paired", || {
		bridge.a.phase().is_connected() && bridge.b.phase().is_connected()
	})
	.await;

	bridge.page_a.add_element_with_payload(markup::STRANGER_MESSAGE, json!({ "text": "ghost", "sentAt": null }));
	sleep(Duration::from_millis(100)).await;
	assert!(bridge.page_b.typed().is_empty());
	assert_eq!(bridge.a.message_count(), 0);

	stranger_message(&bridge.page_a, "real", 10);
	wait_until("real message forwarded", || bridge.page_b.typed().len() == 1).await;

	run_a.abort();
	run_b.abort();
}

#[tokio::test]
async fn remote_disconnect_propagates_to_the_peer_once() {
	let bridge = bridge();
	let run_a = spawn_run(&bridge.a);
	let run_b = spawn_run(&bridge.b);

	wait_until("both sessions paired", || {
		bridge.a.phase().is_connected() && bridge.b.phase().is_connected()
	})
	.await;

	// A's stranger walks away: send goes disabled, the new-chat
	// affordance shows up.
	bridge.page_a.remove_elements(markup::SEND_ENABLED);
	bridge.page_a.add_element(markup::NEW_TALK);
	bridge.page_a.add_element(markup::SEND_DISABLED);

	wait_until("peer pressed escape", || !bridge.page_b.clicks_on(markup::ESCAPE).is_empty()).await;
	wait_until("new-chat affordance triggered", || !bridge.page_a.clicks_on(markup::NEW_TALK).is_empty()).await;
	wait_until("A back to awaiting a room", || bridge.a.phase() == SessionPhase::AwaitingRoom).await;

	// Exactly one wind-down on each side, escape as a triple press.
	sleep(Duration::from_millis(100)).await;
	assert_eq!(bridge.page_b.clicks_on(markup::ESCAPE), vec![sb_driver::fake::RecordedClick {
		selector: markup::ESCAPE.to_string(),
		presses: 3,
	}]);
	assert_eq!(bridge.page_a.clicks_on(markup::NEW_TALK).len(), 1);

	run_a.abort();
	run_b.abort();
}

#[tokio::test]
async fn disconnect_request_is_a_noop_for_an_unpaired_peer() {
	let bridge = bridge();
	// B never gets a live send control, so it sits awaiting a room.
	bridge.page_b.remove_elements(markup::SEND_ENABLED);

	let run_a = spawn_run(&bridge.a);
	let run_b = spawn_run(&bridge.b);

	wait_until("A paired", || bridge.a.phase().is_connected()).await;

	bridge.page_a.remove_elements(markup::SEND_ENABLED);
	bridge.page_a.add_element(markup::NEW_TALK);
	bridge.page_a.add_element(markup::SEND_DISABLED);

	wait_until("A back to awaiting a room", || bridge.a.phase() == SessionPhase::AwaitingRoom).await;
	sleep(Duration::from_millis(100)).await;
	assert!(bridge.page_b.clicks_on(markup::ESCAPE).is_empty());

	run_a.abort();
	run_b.abort();
}

#[tokio::test]
async fn forward_is_dropped_when_the_peer_is_not_in_a_room() {
	let bridge = bridge();
	bridge.page_b.remove_elements(markup::SEND_ENABLED);

	let run_a = spawn_run(&bridge.a);
	let run_b = spawn_run(&bridge.b);

	wait_until("A paired", || bridge.a.phase().is_connected()).await;

	stranger_message(&bridge.page_a, "nobody home", 100);
	sleep(Duration::from_millis(150)).await;

	// A accepted and published the message; B silently dropped it.
	assert_eq!(bridge.a.message_count(), 1);
	assert!(bridge.page_b.typed().is_empty());

	run_a.abort();
	run_b.abort();
}

#[tokio::test]
async fn unresolved_captcha_aborts_before_any_relaying() {
	let (driver, page) = FakeDriverBuilder::new().build();
	page.add_element(markup::CONSENT_ROOT);
	page.add_element(markup::CONSENT_ACCEPT);
	page.add_element(markup::CAPTCHA_FRAME);
	page.fail_expression(markup::CAPTCHA_CLEARED_EXPR);
	// A live room is scripted, but the session must never reach it.
	page.add_element(markup::SEND_ENABLED);

	let session = Session::new("left", test_config(), driver);
	session.run().await.unwrap();

	assert_eq!(session.phase(), SessionPhase::Failed);
	assert!(!session.captcha_resolved());
	assert!(!page.list_queries().iter().any(|selector| selector == markup::STRANGER_MESSAGE));
	assert!(page.typed().is_empty());
	// The consent accept is the only interaction that happened.
	assert_eq!(page.clicks().len(), 1);
	assert_eq!(page.clicks()[0].selector, markup::CONSENT_ACCEPT);
}

#[tokio::test]
async fn manual_captcha_solve_unblocks_the_room_loop() {
	let (driver, page) = FakeDriverBuilder::new().build();
	page.add_element(markup::CONSENT_ROOT);
	page.add_element(markup::CONSENT_ACCEPT);
	page.add_element(markup::CAPTCHA_FRAME);
	page.add_element(markup::SEND_ENABLED);

	let session = Session::new("left", test_config(), driver);
	let run = spawn_run(&session);

	wait_until("session blocked on the captcha", || session.phase() == SessionPhase::AwaitingCaptcha).await;

	// The human solves it: the frame is gone from the page.
	page.set_evaluation(markup::CAPTCHA_CLEARED_EXPR, json!(true));

	wait_until("session paired after the solve", || session.phase().is_connected()).await;
	assert!(session.captcha_resolved());

	run.abort();
}

#[tokio::test]
async fn driver_failure_during_the_probe_is_fatal() {
	let bridge = bridge();
	let run_a = spawn_run(&bridge.a);
	let run_b = spawn_run(&bridge.b);

	wait_until("A paired", || bridge.a.phase().is_connected()).await;

	bridge.page_a.fail_selector(markup::SEND_DISABLED);

	let outcome = tokio::time::timeout(Duration::from_secs(2), run_a)
		.await
		.expect("session should stop after the driver failure")
		.expect("task should not panic");
	assert!(outcome.is_err());

	run_b.abort();
}
