//! A bounded, de-duplicating navigation history.
//!
//! [`NavigationHistory`] records visited values like a browser's back/forward
//! stack: a new value is appended at the cursor (dropping anything ahead of
//! it), the oldest entries fall off past the capacity, and a value is only
//! ever listed once. A history can mirror its current value into a
//! [`Storage`] slot and save or restore its entry list there.
//!
//! ```
//! use histnav::{HistoryOptions, NavigationHistory};
//!
//! let mut history = NavigationHistory::new(
//!     HistoryOptions::default().capacity(3).initial_value("/a".to_string()),
//! )
//! .unwrap();
//!
//! for location in ["/b", "/c", "/d"] {
//!     history.set(location.to_string());
//! }
//! assert_eq!(history.history(), ["/b", "/c", "/d"]);
//!
//! history.back(1);
//! history.set("/e".to_string());
//! assert_eq!(history.history(), ["/b", "/c", "/e"]);
//! ```

pub mod app;
pub mod codec;
pub mod config;
pub mod error;
pub mod history;
pub mod keys;
pub mod storage;
pub mod switcher;
pub mod view;

pub use codec::{Codec, FnCodec, Json, Raw};
pub use error::{CodecError, HistoryError, StorageError};
pub use history::{HistoryEvent, HistoryOptions, NavigationHistory, SetOutcome, SubscriptionId};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageEvent};
