use std::sync::Mutex;

use async_trait::async_trait;
use geofence_editor::prelude::*;

fn config() -> EditorConfig {
    EditorConfig::default().with_access_token("pk.test-token")
}

fn delhi() -> Location {
    Location::new(28.6139, 77.2090)
}

fn open_session(
    recorder: &EngineRecorder,
    geolocation: Option<GeolocationProvider>,
    callbacks: EditorCallbacks,
) -> (EditorSession, SessionHandle) {
    let recorder = recorder.clone();
    EditorSession::open(
        config(),
        EditorOptions::default(),
        move |events| Box::new(HeadlessEngineFactory::new(recorder).with_events(events)),
        geolocation,
        callbacks,
    )
    .unwrap()
}

#[tokio::test]
async fn test_session_confirms_selection() {
    let recorder = EngineRecorder::new();
    let confirmed = Arc::new(Mutex::new(None));
    let sink = confirmed.clone();
    let (session, handle) = open_session(
        &recorder,
        None,
        EditorCallbacks::new(move |config| *sink.lock().unwrap() = Some(config), || {}),
    );

    handle.click(delhi()).unwrap();
    handle.set_radius(200.0).unwrap();
    handle.confirm().unwrap();

    let outcome = session.run().await;
    let expected = GeofenceConfig::new(delhi(), 200.0);
    assert_eq!(outcome, SessionOutcome::Confirmed(expected));
    assert_eq!(*confirmed.lock().unwrap(), Some(expected));

    // The session owned the only receiver
    assert!(matches!(handle.click(delhi()), Err(EditorError::SessionClosed)));
    assert!(recorder
        .calls()
        .iter()
        .any(|call| matches!(call, EngineCall::Destroy { .. })));
}

#[tokio::test]
async fn test_confirm_without_selection_keeps_running() {
    let recorder = EngineRecorder::new();
    let cancelled = Arc::new(Mutex::new(0));
    let counter = cancelled.clone();
    let (session, handle) = open_session(
        &recorder,
        None,
        EditorCallbacks::new(|_| {}, move || *counter.lock().unwrap() += 1),
    );

    handle.confirm().unwrap();
    handle.cancel().unwrap();

    assert_eq!(session.run().await, SessionOutcome::Cancelled);
    assert_eq!(*cancelled.lock().unwrap(), 1);
    assert_eq!(recorder.mutation_count(), 0);
}

#[tokio::test]
async fn test_dropping_every_handle_cancels_session() {
    let recorder = EngineRecorder::new();
    let cancelled = Arc::new(Mutex::new(0));
    let counter = cancelled.clone();
    let (session, handle) = open_session(
        &recorder,
        None,
        EditorCallbacks::new(|_| {}, move || *counter.lock().unwrap() += 1),
    );
    drop(handle);

    let outcome = tokio::time::timeout(Duration::from_secs(2), session.run())
        .await
        .expect("session should end once its handles are gone");
    assert_eq!(outcome, SessionOutcome::Cancelled);
    assert_eq!(*cancelled.lock().unwrap(), 1);
    assert!(recorder
        .calls()
        .iter()
        .any(|call| matches!(call, EngineCall::Destroy { .. })));
}

#[tokio::test]
async fn test_events_posted_before_last_handle_drop_still_apply() {
    let recorder = EngineRecorder::new();
    let (session, handle) = open_session(&recorder, None, EditorCallbacks::noop());

    let ui = handle.clone();
    drop(handle);
    ui.click(delhi()).unwrap();
    ui.confirm().unwrap();
    drop(ui);

    let outcome = tokio::time::timeout(Duration::from_secs(2), session.run())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        SessionOutcome::Confirmed(GeofenceConfig::new(delhi(), 50.0))
    );
}

#[tokio::test]
async fn test_session_seeds_center_from_location() {
    let recorder = EngineRecorder::new();
    let provider = GeolocationProvider::new(
        Arc::new(FixedPosition(Ok(delhi()))),
        PositionOptions::default(),
    );
    let (session, handle) = open_session(&recorder, Some(provider), EditorCallbacks::noop());

    let runner = tokio::spawn(session.run());
    // Let the spawned location request land before confirming
    for _ in 0..100 {
        if recorder.live_source_count() == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(recorder.live_source_count(), 1);
    handle.confirm().unwrap();

    let outcome = runner.await.unwrap();
    assert_eq!(
        outcome,
        SessionOutcome::Confirmed(GeofenceConfig::new(delhi(), 50.0))
    );
}

struct SlowPosition;

#[async_trait]
impl PositionSource for SlowPosition {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> std::result::Result<Location, LocationError> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(Location::new(12.9716, 77.5946))
    }
}

#[tokio::test(start_paused = true)]
async fn test_late_auto_seed_does_not_override_click() {
    let (tx, mut rx) = event_channel();
    let provider = GeolocationProvider::new(Arc::new(SlowPosition), PositionOptions::default());
    let deps = EditorDeps {
        engine_factory: Box::new(HeadlessEngineFactory::default()),
        scheduler: Arc::new(ManualScheduler::new()),
        events: tx,
        geolocation: Some(provider),
    };
    let mut editor =
        GeofenceEditor::open(config(), EditorOptions::default(), deps, EditorCallbacks::noop())
            .unwrap();
    assert_eq!(
        editor.location_availability(),
        LocationAvailability::Pending
    );

    editor.handle_click(delhi()).unwrap();

    let event = rx.recv().await.unwrap();
    assert!(matches!(
        event,
        EditorEvent::LocationResolved {
            request: LocationRequest::AutoSeed,
            ..
        }
    ));
    editor.handle_event(event).unwrap();

    assert_eq!(editor.center(), Some(delhi()));
    assert_eq!(
        editor.location_availability(),
        LocationAvailability::Available(Location::new(12.9716, 77.5946))
    );
}

fn open_with_location(
    result: std::result::Result<Location, LocationError>,
    initial_center: Option<Location>,
) -> (GeofenceEditor, geofence_editor::input::events::EventReceiver) {
    let (tx, rx) = event_channel();
    let provider = GeolocationProvider::new(
        Arc::new(FixedPosition(result)),
        PositionOptions::default(),
    );
    let deps = EditorDeps {
        engine_factory: Box::new(HeadlessEngineFactory::default()),
        scheduler: Arc::new(ManualScheduler::new()),
        events: tx,
        geolocation: Some(provider),
    };
    let editor = GeofenceEditor::open(
        config(),
        EditorOptions {
            initial_center,
            initial_radius_meters: 50.0,
        },
        deps,
        EditorCallbacks::noop(),
    )
    .unwrap();
    (editor, rx)
}

#[tokio::test]
async fn test_current_location_enabled_after_success() {
    let bengaluru = Location::new(12.9716, 77.5946);
    let (mut editor, mut rx) = open_with_location(Ok(bengaluru), Some(delhi()));

    // Nothing answered yet
    assert!(!editor.can_use_current_location());
    assert!(matches!(
        editor.use_current_location(),
        Err(EditorError::LocationDisabled)
    ));

    // The startup lookup does not move the caller's initial center
    let startup = rx.recv().await.unwrap();
    editor.handle_event(startup).unwrap();
    assert_eq!(editor.center(), Some(delhi()));
    assert!(editor.can_use_current_location());

    editor.use_current_location().unwrap();
    let event = rx.recv().await.unwrap();
    assert!(matches!(
        event,
        EditorEvent::LocationResolved {
            request: LocationRequest::Explicit,
            ..
        }
    ));
    editor.handle_event(event).unwrap();
    assert_eq!(editor.center(), Some(bengaluru));
}

#[tokio::test]
async fn test_denied_location_keeps_button_disabled() {
    let (mut editor, mut rx) =
        open_with_location(Err(LocationError::PermissionDenied), Some(delhi()));
    assert_eq!(editor.location_availability(), LocationAvailability::Pending);

    // A failed startup lookup is silent
    let event = rx.recv().await.unwrap();
    editor.handle_event(event).unwrap();
    assert_eq!(
        editor.location_availability(),
        LocationAvailability::Unavailable(LocationError::PermissionDenied)
    );
    assert!(!editor.can_use_current_location());
    assert!(matches!(
        editor.use_current_location(),
        Err(EditorError::LocationDisabled)
    ));

    // The session is still usable
    assert_eq!(editor.status(), EditorStatus::Open);
    editor.handle_click(Location::new(19.0760, 72.8777)).unwrap();
    assert!(editor.confirm().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_sync_retry_through_channel_timer() {
    let recorder = EngineRecorder::new();
    let engine_recorder = recorder.clone();
    // Engine that never reports ready on its own
    let (session, handle) = EditorSession::open(
        config(),
        EditorOptions::default(),
        move |_events| Box::new(HeadlessEngineFactory::new(engine_recorder)),
        None,
        EditorCallbacks::noop(),
    )
    .unwrap();
    let generation = session.editor().lifecycle().generation();

    handle.click(delhi()).unwrap();
    let runner = tokio::spawn(session.run());
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert_eq!(recorder.mutation_count(), 0);

    let events = handle.sender();
    for event in [EngineEvent::Load, EngineEvent::StyleLoad] {
        events
            .send(EditorEvent::Engine { generation, event })
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(recorder.live_source_count(), 1);

    handle.cancel().unwrap();
    assert_eq!(runner.await.unwrap(), SessionOutcome::Cancelled);
    assert_eq!(recorder.live_source_count(), 0);
}
