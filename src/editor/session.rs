//! Async driver for a [`GeofenceEditor`].
//!
//! The session owns the editor and drains its event channel on one task, so
//! engine callbacks, timers, location answers and user input are applied in
//! arrival order without locking.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::{
    core::{
        config::EditorConfig,
        geo::{GeofenceConfig, Location},
    },
    editor::controller::{EditorCallbacks, EditorDeps, EditorOptions, EditorStatus, GeofenceEditor},
    engine::EngineFactory,
    input::{
        events::{event_channel, EditorEvent, EventReceiver, EventSender},
        geolocation::GeolocationProvider,
    },
    runtime::ChannelTimer,
    EditorError, Result,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionOutcome {
    Confirmed(GeofenceConfig),
    Cancelled,
}

/// Cloneable input side of a running session.
///
/// The session is cancelled once every clone has been dropped and the
/// events already posted have been applied.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    events: EventSender,
    _alive: Arc<oneshot::Sender<()>>,
}

impl SessionHandle {
    pub fn click(&self, location: Location) -> Result<()> {
        self.post(EditorEvent::MapClick(location))
    }

    pub fn set_radius(&self, radius_meters: f64) -> Result<()> {
        self.post(EditorEvent::RadiusInput(radius_meters))
    }

    pub fn use_current_location(&self) -> Result<()> {
        self.post(EditorEvent::UseCurrentLocation)
    }

    pub fn set_credential(&self, token: impl Into<String>) -> Result<()> {
        self.post(EditorEvent::SetCredential(token.into()))
    }

    pub fn retry_map(&self) -> Result<()> {
        self.post(EditorEvent::RetryMap)
    }

    pub fn confirm(&self) -> Result<()> {
        self.post(EditorEvent::Confirm)
    }

    pub fn cancel(&self) -> Result<()> {
        self.post(EditorEvent::Cancel)
    }

    /// Raw sender, for engine adapters that forward their own events. It does
    /// not keep the session alive.
    pub fn sender(&self) -> EventSender {
        self.events.clone()
    }

    fn post(&self, event: EditorEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| EditorError::SessionClosed)
    }
}

pub struct EditorSession {
    editor: GeofenceEditor,
    events: EventReceiver,
    handles_dropped: oneshot::Receiver<()>,
}

impl EditorSession {
    /// Wires an editor to a fresh event channel.
    ///
    /// `engine_factory` receives the session's sender so engines can post
    /// their load, style and click notifications back. Must be called from
    /// within a Tokio runtime.
    pub fn open<F>(
        config: EditorConfig,
        options: EditorOptions,
        engine_factory: F,
        geolocation: Option<GeolocationProvider>,
        callbacks: EditorCallbacks,
    ) -> Result<(Self, SessionHandle)>
    where
        F: FnOnce(EventSender) -> Box<dyn EngineFactory>,
    {
        let (tx, rx) = event_channel();
        let deps = EditorDeps {
            engine_factory: engine_factory(tx.clone()),
            scheduler: Arc::new(ChannelTimer::new(tx.clone())),
            events: tx.clone(),
            geolocation,
        };
        let editor = GeofenceEditor::open(config, options, deps, callbacks)?;
        let (alive, handles_dropped) = oneshot::channel();
        let session = Self {
            editor,
            events: rx,
            handles_dropped,
        };
        let handle = SessionHandle {
            events: tx,
            _alive: Arc::new(alive),
        };
        Ok((session, handle))
    }

    pub fn editor(&self) -> &GeofenceEditor {
        &self.editor
    }

    /// Processes events until the session is confirmed or cancelled, or until
    /// every [`SessionHandle`] is gone and nothing is left to apply.
    ///
    /// Rejected inputs (confirm with no selection, a disabled location
    /// request) are logged and leave the session open.
    pub async fn run(mut self) -> SessionOutcome {
        loop {
            // Queued events win over the handles going away
            let event = tokio::select! {
                biased;
                event = self.events.recv() => event,
                _ = &mut self.handles_dropped => None,
            };
            let Some(event) = event else {
                break;
            };
            log::trace!("session event: {:?}", event);
            match self.editor.handle_event(event) {
                Ok(EditorStatus::Open) => {}
                Ok(EditorStatus::Confirmed) => {
                    if let Some(config) = self.editor.confirmed() {
                        return SessionOutcome::Confirmed(config);
                    }
                    return SessionOutcome::Cancelled;
                }
                Ok(EditorStatus::Cancelled) => return SessionOutcome::Cancelled,
                Err(err) => log::warn!("editor input rejected: {}", err),
            }
        }

        log::info!("all session handles dropped, cancelling");
        self.editor.cancel();
        SessionOutcome::Cancelled
    }
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("editor", &self.editor)
            .finish_non_exhaustive()
    }
}
