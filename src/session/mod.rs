//! Session stores.
//!
//! # Data Flow
//! ```text
//! request start:  SessionStore::init  (token cookie → Context::session)
//! handler:        Context::set_session / destroy_session / SessionMap::save
//! background:     MemoryStore sweep task (interval, stops when empty)
//! ```
//!
//! # Design Decisions
//! - Payloads are `serde_json::Value`; serialization is the store's concern
//! - Expiry slides forward on every successful `init`
//! - Time comes from a `Clock` so expiry can be tested without sleeping

pub mod clock;
pub mod cookie;
pub mod file;
pub mod key;
pub mod map;
pub mod memory;
pub mod store;

pub use self::cookie::CookieStore;
pub use clock::{Clock, ManualClock, SystemClock};
pub use file::FileStore;
pub use key::{generate_key, HashKeyGenerator, KeyGenerator, KEY_LEN};
pub use map::SessionMap;
pub use memory::MemoryStore;
pub use store::{SessionStore, StoreOptions};

use std::sync::Arc;

use crate::config::{SessionConfig, SessionStoreKind};
use crate::lifecycle::Shutdown;

/// Build the store selected by `config`.
pub fn from_config(config: &SessionConfig, shutdown: Option<Shutdown>) -> Arc<dyn SessionStore> {
    let options = StoreOptions::from_config(config);
    match config.store {
        SessionStoreKind::Memory => {
            Arc::new(MemoryStore::new(options, config.sweep_interval(), shutdown))
        }
        SessionStoreKind::File => Arc::new(FileStore::new(options, &config.file_path)),
        SessionStoreKind::Cookie => Arc::new(CookieStore::new(options)),
    }
}
