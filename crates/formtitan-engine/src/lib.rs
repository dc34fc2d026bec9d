//! Form-Titan Engine: drives one live form
//!
//! Owns the definition, the form state, the rule engines and the layout
//! interpreter, and runs the load / edit / validate / submit lifecycle
//! against a [`Transport`]. Presentation is delegated to a [`Renderer`].
//!
//! ```ignore
//! let engine = FormEngine::new(transport, EngineOptions::default())
//!     .with_renderer(OutlineRenderer::new());
//! engine.load_form("contact-us-v1").await;
//! engine.set_value("email", json!("ada@example.com"));
//! match engine.handle_submit().await {
//!     SubmitOutcome::Submitted(response) => println!("{}", response.message),
//!     other => println!("{:?}", other),
//! }
//! ```

pub mod engine;
pub mod options;
pub mod renderer;
pub mod transport;

pub use engine::{FormEngine, FormSource, LoadOutcome, SkipReason, SubmitOutcome};
pub use options::{EngineOptions, ValidationScope};
pub use renderer::{OutlineRenderer, Renderer, StatusMessage};
pub use transport::{SubmissionPayload, SubmitResponse, Transport, TransportError};
