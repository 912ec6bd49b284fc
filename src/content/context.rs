//! Live content state shared by every page and editor.
//!
//! Uses `arc-swap` for lock-free reads and atomic tree replacement, so a
//! reader holds either the old tree or the new one, never a mix.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  ContentContext (ArcSwap)                   │
//! │                                                             │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────┐    │
//! │  │   Page A    │     │   Page B    │     │   Editor    │    │
//! │  └──────┬──────┘     └──────┬──────┘     └──────┬──────┘    │
//! │         │                   │                   │           │
//! │         ▼                   ▼                   ▼           │
//! │     content()           content()        update_content()   │
//! │    (lock-free)         (lock-free)     (swap, then persist) │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The context is built once in `main` and handed to consumers as an `Arc`.

use super::{
    accessor::{ContentStore, PersistTicket},
    path::{ContentPath, PathError},
    tree::{ContentNode, ContentTree, TreeError},
};
use crate::log;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use thiserror::Error;
use tokio::task::JoinHandle;

/// Content update errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("content is still loading")]
    StillLoading,

    #[error("editing is not enabled")]
    EditingLocked,
}

/// Process-wide admin mode flag.
#[derive(Debug, Default)]
pub struct AdminSession {
    active: AtomicBool,
}

impl AdminSession {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Flip the flag and return the new state.
    pub fn toggle(&self) -> bool {
        !self.active.fetch_xor(true, Ordering::AcqRel)
    }

    /// Edit permission for one render or action.
    ///
    /// Open only when admin mode is on and the operator has been verified.
    pub fn gate(&self, operator_verified: bool) -> EditGate {
        EditGate {
            open: operator_verified && self.is_active(),
        }
    }
}

/// Whether edit affordances may be shown or used right now.
///
/// Only obtainable from [`AdminSession::gate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditGate {
    open: bool,
}

impl EditGate {
    pub fn is_open(self) -> bool {
        self.open
    }
}

pub struct ContentContext {
    tree: ArcSwap<ContentTree>,
    seed: ContentTree,
    loading: AtomicBool,
    activated: AtomicBool,
    admin: AdminSession,
    accessor: ContentStore,
    /// Per-section revision counters. Held while swapping to order writers.
    revisions: Mutex<FxHashMap<String, u64>>,
}

impl ContentContext {
    /// New context serving `seed` until [`activate`](Self::activate) loads.
    pub fn new(accessor: ContentStore, seed: ContentTree) -> Arc<Self> {
        Arc::new(Self {
            tree: ArcSwap::from_pointee(seed.clone()),
            seed,
            loading: AtomicBool::new(true),
            activated: AtomicBool::new(false),
            admin: AdminSession::default(),
            accessor,
            revisions: Mutex::default(),
        })
    }

    /// Start the one and only load.
    ///
    /// Returns `None` when already activated. The tree is replaced wholesale
    /// once the load resolves, and `loading()` turns false.
    pub fn activate(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.activated.swap(true, Ordering::AcqRel) {
            return None;
        }

        let ctx = Arc::clone(self);
        Some(self.accessor.runtime().spawn(async move {
            let tree = ctx.accessor.load_all(ctx.seed.clone()).await;
            {
                let _writer = ctx.revisions.lock();
                ctx.tree.store(Arc::new(tree));
                ctx.loading.store(false, Ordering::Release);
            }
            log!("content"; "loaded {} sections", ctx.content().section_names().count());
        }))
    }

    /// Current tree. Lock-free; the `Arc` stays valid after later edits.
    #[inline]
    pub fn content(&self) -> Arc<ContentTree> {
        self.tree.load_full()
    }

    /// Defaults the live tree started from.
    pub fn seed(&self) -> &ContentTree {
        &self.seed
    }

    pub fn loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn admin(&self) -> &AdminSession {
        &self.admin
    }

    /// Set the leaf at `path` to `value`, then persist its section.
    ///
    /// The new tree is visible to readers before this returns. Persistence
    /// runs in the background; the ticket may be dropped.
    ///
    /// # Errors
    ///
    /// Fails without touching the tree when the path is not a leaf of either
    /// the live tree or the seed, or while the initial load is still pending.
    /// A seed field missing from a stored section is created.
    pub fn update_content(
        &self,
        path: &ContentPath,
        value: impl Into<ContentNode>,
    ) -> Result<PersistTicket, ContentError> {
        let mut revisions = self.revisions.lock();
        if self.loading() {
            return Err(ContentError::StillLoading);
        }

        let updated = self
            .content()
            .with_value_or_seeded(&self.seed, path, value.into())?;
        let section = path.section();
        let data = updated
            .section(section)
            .cloned()
            .ok_or_else(|| TreeError::Unresolved {
                path: path.to_string(),
                missing: section.to_owned(),
            })?;

        let revision = revisions.entry(section.to_owned()).or_default();
        *revision += 1;
        let revision = *revision;

        self.tree.store(Arc::new(updated));
        drop(revisions);

        Ok(self.accessor.persist_section(section, &data, revision))
    }

    /// Parse `raw` and update.
    #[cfg(test)]
    pub fn update_content_at(
        &self,
        raw: &str,
        value: impl Into<ContentNode>,
    ) -> Result<PersistTicket, ContentError> {
        self.update_content(&ContentPath::parse(raw)?, value)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::content::{
        accessor::{PersistOutcome, Timeouts},
        report::RecordingSink,
        seed::seed_tree,
    };
    use crate::store::{DataStore, Filter, MemoryStore, Row, StoreError, Table};
    use serde_json::json;
    use tokio::runtime::Handle;

    pub(crate) async fn loaded_context(store: Arc<dyn DataStore>) -> Arc<ContentContext> {
        let sink = Arc::new(RecordingSink::new());
        let accessor = ContentStore::new(store, sink, Handle::current(), Timeouts::default());
        let ctx = ContentContext::new(accessor, seed_tree());
        ctx.activate().unwrap().await.unwrap();
        ctx
    }

    fn path(raw: &str) -> ContentPath {
        ContentPath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_starts_loading_with_seed() {
        let sink = Arc::new(RecordingSink::new());
        let accessor = ContentStore::new(
            Arc::new(MemoryStore::new()),
            sink,
            Handle::current(),
            Timeouts::default(),
        );
        let ctx = ContentContext::new(accessor, seed_tree());
        assert!(ctx.loading());
        assert!(ctx.content().ptr_eq(&seed_tree()));
        assert_eq!(
            ctx.update_content(&path("home.hero.title"), "x").unwrap_err(),
            ContentError::StillLoading
        );

        ctx.activate().unwrap().await.unwrap();
        assert!(!ctx.loading());
        assert!(ctx.activate().is_none());
    }

    #[tokio::test]
    async fn test_update_is_visible_immediately_and_shares_siblings() {
        let ctx = loaded_context(Arc::new(MemoryStore::new())).await;
        let before = ctx.content();

        let ticket = ctx.update_content(&path("home.hero.title"), "New").unwrap();
        let after = ctx.content();

        assert_eq!(after.text(&path("home.hero.title")), "New");
        assert_eq!(before.text(&path("home.hero.title")), "Empower Your Client Acquisition");
        assert!(!after.ptr_eq(&before));
        assert!(!after.section("home").unwrap().ptr_eq(before.section("home").unwrap()));
        for name in before.section_names().filter(|n| *n != "home") {
            assert!(after.section(name).unwrap().ptr_eq(before.section(name).unwrap()));
        }
        assert_eq!(
            after.get(&path("home.hero.subtitle")),
            before.get(&path("home.hero.subtitle"))
        );
        assert!(after
            .get(&path("home.features"))
            .unwrap()
            .ptr_eq(before.get(&path("home.features")).unwrap()));
        assert_eq!(ticket.outcome().await, PersistOutcome::Written);
    }

    #[tokio::test]
    async fn test_every_seed_leaf_is_updatable() {
        let ctx = loaded_context(Arc::new(MemoryStore::new())).await;
        let seed = seed_tree();
        let leaves: Vec<String> = seed.text_leaves().into_iter().map(|(p, _)| p).collect();
        assert!(leaves.len() > 20);

        for raw in &leaves {
            let p = path(raw);
            let before = ctx.content();
            ctx.update_content(&p, format!("edited {raw}")).unwrap();
            let after = ctx.content();
            assert_eq!(after.text(&p), format!("edited {raw}"));
            for other in leaves.iter().filter(|o| *o != raw) {
                let o = path(other);
                assert_eq!(after.get(&o), before.get(&o), "{other} changed");
            }
        }
    }

    #[tokio::test]
    async fn test_two_edits_two_persists_with_section_snapshots() {
        let store = Arc::new(MemoryStore::new());
        let ctx = loaded_context(store.clone()).await;

        let first = ctx.update_content(&path("home.hero.title"), "A").unwrap();
        let second = ctx.update_content(&path("home.hero.title"), "B").unwrap();

        assert_eq!(ctx.content().text(&path("home.hero.title")), "B");
        assert_eq!((first.section(), first.revision()), ("home", 1));
        assert_eq!((second.section(), second.revision()), ("home", 2));

        let outcomes = [first.outcome().await, second.outcome().await];
        assert!(outcomes.contains(&PersistOutcome::Written));

        let rows = store
            .read_rows(Table::Content, Some(&Filter::eq("section", "home")))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["data"]["hero"]["title"], json!("B"));
        assert_eq!(rows[0]["data"]["features"].as_array().unwrap().len(), 3);
    }

    /// Memory store that keeps a copy of every upserted row.
    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryStore,
        upserts: Mutex<Vec<Row>>,
    }

    impl DataStore for RecordingStore {
        fn read_rows(&self, table: Table, filter: Option<&Filter>) -> Result<Vec<Row>, StoreError> {
            self.inner.read_rows(table, filter)
        }
        fn upsert_row(&self, table: Table, row: Row, key: &str) -> Result<(), StoreError> {
            self.upserts.lock().push(row.clone());
            self.inner.upsert_row(table, row, key)
        }
        fn insert_row(&self, table: Table, row: Row) -> Result<(), StoreError> {
            self.inner.insert_row(table, row)
        }
    }

    #[tokio::test]
    async fn test_each_persist_carries_section_as_of_its_call() {
        let store = Arc::new(RecordingStore::default());
        let ctx = loaded_context(store.clone()).await;
        let features = ctx.content().section("home").unwrap().to_json()["features"].clone();

        let first = ctx.update_content(&path("home.hero.title"), "A").unwrap();
        assert_eq!(first.outcome().await, PersistOutcome::Written);
        let second = ctx.update_content(&path("home.hero.title"), "B").unwrap();
        assert_eq!(second.outcome().await, PersistOutcome::Written);

        let upserts = store.upserts.lock().clone();
        assert_eq!(upserts.len(), 2);
        for (row, title) in upserts.iter().zip(["A", "B"]) {
            assert_eq!(row["section"], json!("home"));
            assert_eq!(row["data"]["hero"]["title"], json!(title));
            assert_eq!(row["data"]["features"], features);
            assert_eq!(row["data"]["features"].as_array().unwrap().len(), 3);
        }
    }

    #[tokio::test]
    async fn test_seed_field_missing_from_stored_section_is_editable() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_row(
                Table::Content,
                json!({ "section": "mission", "data": { "title": "Stored", "body": "b" }, "updated_at": "t" })
                    .as_object()
                    .cloned()
                    .unwrap(),
                "section",
            )
            .unwrap();
        let ctx = loaded_context(store.clone()).await;
        assert!(ctx.content().get(&path("mission.subtitle")).is_none());

        let ticket = ctx.update_content_at("mission.subtitle", "New subtitle").unwrap();
        assert_eq!(ctx.content().text(&path("mission.subtitle")), "New subtitle");
        assert_eq!(ctx.content().text(&path("mission.title")), "Stored");
        assert_eq!(ticket.outcome().await, PersistOutcome::Written);

        let rows = store
            .read_rows(Table::Content, Some(&Filter::eq("section", "mission")))
            .unwrap();
        assert_eq!(
            rows[0]["data"],
            json!({ "title": "Stored", "body": "b", "subtitle": "New subtitle" })
        );

        // Absent from both trees.
        let before = ctx.content();
        assert!(matches!(
            ctx.update_content_at("mission.tagline", "x"),
            Err(ContentError::Tree(TreeError::Unresolved { .. }))
        ));
        assert!(ctx.content().ptr_eq(&before));
    }

    #[tokio::test]
    async fn test_bad_paths_fail_and_leave_tree_unchanged() {
        let ctx = loaded_context(Arc::new(MemoryStore::new())).await;
        let before = ctx.content();

        for raw in ["home.hero", "bogus.field", "contact.phone", "home.features"] {
            assert!(ctx.update_content_at(raw, "x").is_err(), "{raw} accepted");
        }
        assert!(matches!(
            ctx.update_content_at("home", "x"),
            Err(ContentError::Path(PathError::SectionOnly(_)))
        ));
        assert!(ctx.content().ptr_eq(&before));
    }

    #[tokio::test]
    async fn test_revisions_are_per_section() {
        let ctx = loaded_context(Arc::new(MemoryStore::new())).await;
        let a = ctx.update_content_at("home.hero.title", "x").unwrap();
        let b = ctx.update_content_at("contact.title", "y").unwrap();
        assert_eq!(a.revision(), 1);
        assert_eq!(b.revision(), 1);
    }

    #[tokio::test]
    async fn test_load_picks_up_stored_sections() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_row(
                Table::Content,
                json!({ "section": "mission", "data": { "title": "Stored" }, "updated_at": "t" })
                    .as_object()
                    .cloned()
                    .unwrap(),
                "section",
            )
            .unwrap();
        let ctx = loaded_context(store).await;
        assert_eq!(ctx.content().text(&path("mission.title")), "Stored");
        assert_eq!(ctx.content().text(&path("mission.body")), "");
    }

    #[test]
    fn test_admin_session_toggle_and_gate() {
        let admin = AdminSession::default();
        assert!(!admin.gate(true).is_open());
        assert!(admin.toggle());
        assert!(admin.gate(true).is_open());
        assert!(!admin.gate(false).is_open());
        assert!(!admin.toggle());
        assert!(!admin.is_active());
    }
}
