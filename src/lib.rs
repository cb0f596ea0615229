//! Snap Translate client core
//!
//! Everything between the photo picker and the rendered translation:
//! reachability tracking, upload construction, submission and the session
//! state machine the view layer renders from.

pub mod core;
pub mod shared;

#[cfg(test)]
mod test_support;

pub use crate::core::acquirer::{FileAcquirer, ImageAcquirer, PickResult, PickedAsset, PickerOptions, UriNormalization};
pub use crate::core::connectivity::{ConnectivityProbe, ReachabilityProbe};
pub use crate::core::session::{PickOutcome, SessionController};
pub use crate::core::translation::{Translation, TranslationBackend, TranslationClient, TranslationOutcome};
pub use crate::core::upload::UploadPayload;
pub use crate::shared::emit::{EventSink, NoopSink};
pub use crate::shared::error::{AppError, AppResult};
pub use crate::shared::events::{AlertChoice, SessionEvent};
pub use crate::shared::settings::ClientSettings;
pub use crate::shared::types::{ConnectionStatus, LanguageCode, SelectedImage, SessionPhase, SessionSnapshot};
