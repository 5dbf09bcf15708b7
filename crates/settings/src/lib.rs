//! JSON-backed viewer preferences.
//! 以 JSON 儲存的檢視器偏好設定。

pub mod preferences;

pub use preferences::{
    IngestPreferences, LoggingPreferences, Preferences, PreferencesError, PreferencesStore,
    ResolverPreferences, TreePreferences,
};
