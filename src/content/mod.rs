//! Site content: the editable copy behind every page.
//!
//! # Data flow
//!
//! ```text
//!  content table ──load_all──► ContentContext ──content()──► pages
//!        ▲                         │   ▲
//!        │                         │   └── update_content(path, value)
//!        └──── persist_section ◄───┘               ▲
//!                                          EditableField::save
//! ```
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `path` | Validated dotted paths |
//! | `tree` | Persistent tree with structural sharing |
//! | `seed` | Default copy |
//! | `accessor` | Load/persist against the store |
//! | `context` | Live tree, admin mode, updates |
//! | `field` | Per-field edit state machine |
//! | `report` | Failure channel |

pub mod accessor;
pub mod context;
pub mod field;
pub mod path;
pub mod report;
pub mod seed;
pub mod tree;

pub use accessor::{ContentStore, PersistOutcome, PersistTicket, Timeouts};
pub use context::{AdminSession, ContentContext, ContentError, EditGate};
pub use field::{EditableField, FieldMode, FieldView};
pub use path::ContentPath;
pub use report::{FailureSink, LogSink};
pub use seed::{SPECIALTIES, seed_tree};
pub use tree::{ContentNode, ContentTree};
