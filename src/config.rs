pub mod defaults;
pub mod settings;

pub use defaults::{DEFAULT_DEBOUNCE, DEFAULT_DEBOUNCE_MS};
pub use settings::TrackerSettings;
