mod support;

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use shell_io::{RequestMethod, ShellResponse, TransportError};
use shell_nav::{ErrorKind, NavigationController, Transition};
use support::{RecordingHost, ScriptedTransport, page};

fn controller() -> (ScriptedTransport, NavigationController<ScriptedTransport, RecordingHost>) {
    let transport = ScriptedTransport::new();
    let controller = NavigationController::new(
        transport.clone(),
        RecordingHost::default(),
        "/admin/",
        page("Dashboard", "<div>Hi</div>"),
    );
    (transport, controller)
}

/// Navigate to `url`, answer with `response` and report the frame loaded.
fn visit(
    transport: &ScriptedTransport,
    controller: &mut NavigationController<ScriptedTransport, RecordingHost>,
    url: &str,
    response: ShellResponse,
) -> Result<()> {
    let seq = controller.navigate(url, true).expect("navigation dispatched");
    transport.respond(seq, response);
    controller.poll();
    let next = controller.next_frame().expect("next frame accepted").id;
    assert!(controller.on_load_next_frame(next));
    Ok(())
}

#[test]
fn initial_frame_needs_no_fetch() {
    let (transport, controller) = controller();

    assert!(transport.requests().is_empty());
    assert_eq!(controller.current_frame().url, "/admin/");
    assert_eq!(controller.current_frame().title(), Some("Dashboard"));
    assert!(controller.next_frame().is_none());
    assert!(!controller.is_pending());
}

#[test]
fn slow_earlier_response_is_discarded() -> Result<()> {
    let (transport, mut controller) = controller();

    let first = controller.navigate("/admin/pages/1/", true).unwrap();
    let second = controller.navigate("/admin/pages/2/", true).unwrap();
    assert!(first < second);

    transport.respond(second, page("Page 2", "<p>two</p>"));
    assert_eq!(controller.poll(), 1);
    let next = controller.next_frame().unwrap().id;
    assert!(controller.on_load_next_frame(next));

    transport.respond(first, page("Page 1", "<p>one</p>"));
    assert_eq!(controller.poll(), 1);

    assert_eq!(controller.current_frame().url, "/admin/pages/2/");
    assert!(controller.next_frame().is_none());
    assert_eq!(controller.host().pushed, vec!["/admin/pages/2/"]);
    assert!(!controller.is_pending());
    Ok(())
}

#[test]
fn every_completion_order_settles_on_latest_navigation() {
    let urls = ["/admin/a/", "/admin/b/", "/admin/c/"];
    let orders = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    for order in orders {
        let (transport, mut controller) = controller();
        let ids: Vec<u64> = urls
            .iter()
            .map(|url| controller.navigate(url, true).unwrap())
            .collect();

        for index in order {
            transport.respond(ids[index], page(urls[index], "<p>x</p>"));
            controller.poll();
            if let Some(next) = controller.next_frame().map(|frame| frame.id) {
                controller.on_load_next_frame(next);
            }
        }

        assert_eq!(controller.current_frame().url, "/admin/c/", "order {order:?}");
    }
}

#[test]
fn error_after_later_navigation_wins_over_older_page() {
    let (transport, mut controller) = controller();

    let older = controller.navigate("/admin/pages/1/", true).unwrap();
    let newer = controller.navigate("/admin/pages/999/", true).unwrap();
    transport.respond(newer, ShellResponse::NotFound);
    transport.respond(older, page("Page 1", "<p>one</p>"));
    controller.poll();

    let error = controller.error_frame().expect("error frame shown");
    assert_eq!(error.url, "/admin/pages/999/");
    assert_eq!(error.kind, ErrorKind::NotFound);
    assert!(controller.next_frame().is_none());
    assert_eq!(controller.current_frame().url, "/admin/");
}

#[test]
fn not_found_keeps_current_frame_and_history() -> Result<()> {
    let (transport, mut controller) = controller();
    visit(&transport, &mut controller, "/admin/pages/", page("Pages", "<p>list</p>"))?;
    let current = controller.current_frame().clone();

    let seq = controller.navigate("/admin/pages/999/", true).unwrap();
    transport.respond(seq, ShellResponse::NotFound);
    controller.poll();

    assert_eq!(controller.current_frame(), &current);
    assert_eq!(
        controller.error_frame().map(|error| &error.kind),
        Some(&ErrorKind::NotFound)
    );
    assert_eq!(controller.host().pushed, vec!["/admin/pages/"]);

    visit(&transport, &mut controller, "/admin/images/", page("Images", "<p>img</p>"))?;
    assert!(controller.error_frame().is_none());
    assert_eq!(controller.current_frame().url, "/admin/images/");
    Ok(())
}

#[test]
fn permission_denied_shows_error_frame() {
    let (transport, mut controller) = controller();

    let seq = controller.navigate("/admin/users/", true).unwrap();
    transport.respond(seq, ShellResponse::PermissionDenied);
    controller.poll();

    let error = controller.error_frame().unwrap();
    assert_eq!(error.kind, ErrorKind::PermissionDenied);
    assert_eq!(error.kind.title(), "Permission denied");
    assert!(controller.host().pushed.is_empty());
}

#[test]
fn transport_failure_leaves_current_frame_untouched() {
    let (transport, mut controller) = controller();

    let seq = controller.navigate("/admin/pages/", true).unwrap();
    transport.fail(seq, TransportError::Timeout(30_000));
    controller.poll();

    assert_eq!(controller.current_frame().url, "/admin/");
    match &controller.error_frame().unwrap().kind {
        ErrorKind::TransportFailure(reason) => assert!(reason.contains("timed out")),
        other => panic!("unexpected error kind {other:?}"),
    }
}

#[test]
fn current_frame_changes_only_on_load_signal() {
    let (transport, mut controller) = controller();

    let seq = controller.navigate("/admin/pages/", true).unwrap();
    transport.respond(seq, page("Pages", "<p>list</p>"));
    controller.poll();

    assert_eq!(controller.current_frame().url, "/admin/");
    assert_eq!(controller.next_frame().unwrap().url, "/admin/pages/");
    assert!(controller.is_pending());

    let next = controller.next_frame().unwrap().id;
    assert!(controller.on_load_next_frame(next));
    assert_eq!(controller.current_frame().url, "/admin/pages/");
    assert!(controller.next_frame().is_none());
    assert!(!controller.on_load_next_frame(next));
}

#[test]
fn load_signal_for_superseded_frame_is_ignored() {
    let (transport, mut controller) = controller();

    let first = controller.navigate("/admin/a/", true).unwrap();
    transport.respond(first, page("A", "<p>a</p>"));
    controller.poll();
    let superseded = controller.next_frame().unwrap().id;

    let second = controller.navigate("/admin/b/", true).unwrap();
    transport.respond(second, page("B", "<p>b</p>"));
    controller.poll();
    let pending = controller.next_frame().unwrap().id;
    assert_ne!(superseded, pending);

    assert!(!controller.on_load_next_frame(superseded));
    assert_eq!(controller.current_frame().url, "/admin/");
    assert!(controller.on_load_next_frame(pending));
    assert_eq!(controller.current_frame().url, "/admin/b/");
}

#[test]
fn navigate_without_push_never_adds_history() -> Result<()> {
    let (transport, mut controller) = controller();
    visit(&transport, &mut controller, "/admin/pages/", page("Pages", "<p>list</p>"))?;

    let seq = controller.navigate("/admin/", false).unwrap();
    transport.respond(seq, page("Dashboard", "<div>Hi</div>"));
    controller.poll();
    let next = controller.next_frame().unwrap().id;
    controller.on_load_next_frame(next);

    assert_eq!(controller.current_frame().url, "/admin/");
    assert_eq!(controller.host().pushed, vec!["/admin/pages/"]);
    Ok(())
}

#[test]
fn form_posts_are_sequenced_without_history() {
    let (transport, mut controller) = controller();

    let fields = vec![("title".to_string(), "News".to_string())];
    let seq = controller
        .submit_form("/admin/pages/3/edit/", fields.clone())
        .unwrap();
    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, RequestMethod::Post { fields });

    transport.respond(seq, page("Editing", "<form></form>"));
    controller.poll();
    assert_eq!(controller.next_frame().unwrap().url, "/admin/pages/3/edit/");
    assert!(controller.host().pushed.is_empty());
}

#[test]
fn load_it_leaves_the_shell() {
    let (transport, mut controller) = controller();

    let download = controller.navigate("/admin/documents/new.zip", true).unwrap();
    let later = controller.navigate("/admin/pages/", true);
    assert!(later.is_some());
    transport.respond(later.unwrap(), ShellResponse::LoadExternally);
    transport.respond(download, page("Too late", "<p>x</p>"));
    controller.poll();

    assert!(controller.is_terminated());
    assert_eq!(controller.terminated(), Some("/admin/pages/"));
    assert_eq!(controller.host().external.as_deref(), Some("/admin/pages/"));
    assert!(controller.next_frame().is_none());
    assert_eq!(controller.navigate("/admin/images/", true), None);
    assert_eq!(transport.requests().len(), 2);
}

#[test]
fn blank_url_is_not_dispatched() {
    let (transport, mut controller) = controller();

    assert_eq!(controller.navigate("   ", true), None);
    assert!(transport.requests().is_empty());
}

#[test]
fn rejected_frame_becomes_render_failure() {
    let (transport, mut controller) = controller();

    let seq = controller.navigate("/admin/explorer/", true).unwrap();
    transport.respond(
        seq,
        ShellResponse::RenderClientView {
            view: "PageExplorer".to_string(),
            context: serde_json::json!({}),
        },
    );
    controller.poll();
    let next = controller.next_frame().unwrap().id;

    controller.reject_next_frame(next, "no client view registered");
    assert!(controller.next_frame().is_none());
    assert_eq!(
        controller.error_frame().unwrap().kind,
        ErrorKind::RenderFailure("no client view registered".to_string())
    );
    assert_eq!(controller.current_frame().url, "/admin/");
}

#[test]
fn listeners_observe_every_transition() -> Result<()> {
    let (transport, mut controller) = controller();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    controller.add_navigation_listener(move |snapshot| {
        sink.borrow_mut().push(snapshot.transition.clone());
    });

    visit(&transport, &mut controller, "/admin/pages/", page("Pages", "<p>list</p>"))?;
    let seq = controller.navigate("/admin/pages/999/", true).unwrap();
    transport.respond(seq, ShellResponse::NotFound);
    controller.poll();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 3);
    assert!(matches!(seen[0], Transition::NextFrameReady(_)));
    assert!(matches!(seen[1], Transition::FramePromoted(_)));
    assert!(matches!(seen[2], Transition::ErrorShown(_)));
    Ok(())
}

#[test]
fn in_flight_requests_remember_how_they_were_sent() {
    let (transport, mut controller) = controller();

    let get = controller.navigate("/admin/pages/", true).unwrap();
    let fields = vec![("q".to_string(), "news".to_string())];
    let post = controller.submit_form("/admin/pages/search/", fields.clone()).unwrap();

    let in_flight = controller.in_flight();
    assert_eq!(in_flight.len(), 2);
    assert_eq!(in_flight[0].sequence_id, get);
    assert_eq!(in_flight[0].method, RequestMethod::Get);
    assert!(in_flight[0].push_history);
    assert_eq!(in_flight[1].sequence_id, post);
    assert_eq!(in_flight[1].method, RequestMethod::Post { fields });
    assert!(!in_flight[1].push_history);

    transport.respond(get, page("Pages", "<p>list</p>"));
    transport.respond(post, page("Results", "<p>hits</p>"));
    controller.poll();
    assert!(controller.in_flight().is_empty());
}

#[test]
fn snapshot_reflects_last_transition() {
    let (transport, mut controller) = controller();
    assert!(controller.snapshot().is_none());

    let seq = controller.navigate("/admin/pages/999/", true).unwrap();
    transport.respond(seq, ShellResponse::NotFound);
    controller.poll();

    let snapshot = controller.snapshot().expect("a transition happened");
    let error = snapshot.error_frame.expect("error frame in snapshot");
    assert_eq!(snapshot.transition, Transition::ErrorShown(error.id));
    assert_eq!(snapshot.current_frame.url, "/admin/");
    assert!(snapshot.next_frame.is_none());
}
