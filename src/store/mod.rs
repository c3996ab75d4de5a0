pub mod prefs;
pub mod read_state;

pub use prefs::Preferences;
pub use read_state::{MemoryReadStateStore, PrefsReadStateStore, ReadStateStore};
