pub mod controller;
pub mod session;

pub use controller::{
    EditorCallbacks, EditorDeps, EditorOptions, EditorStatus, GeofenceEditor,
    LocationAvailability,
};
pub use session::{EditorSession, SessionHandle, SessionOutcome};
