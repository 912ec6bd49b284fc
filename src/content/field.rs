//! Inline editable text field.
//!
//! ```text
//!              click (gate open)
//!   Display ───────────────────────► Editing { draft }
//!      ▲                                  │
//!      │ save: update_content(path, draft)│
//!      │ cancel: draft dropped            │
//!      │ gate closed: forced back         │
//!      └──────────────────────────────────┘
//! ```
//!
//! The gate is checked on every call, not only when the field is created.

use super::{
    accessor::PersistTicket,
    context::{ContentContext, ContentError, EditGate},
    path::ContentPath,
    tree::ContentTree,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMode {
    Display,
    Editing { draft: String },
}

/// What the field shows right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldView {
    /// Plain text, no affordance.
    ReadOnly { text: String },
    /// Text with a click affordance.
    Editable { text: String },
    /// Input holding the draft, with Save and Cancel.
    Editing { draft: String },
}

#[derive(Debug, Clone)]
pub struct EditableField {
    path: ContentPath,
    mode: FieldMode,
    multiline: bool,
}

impl EditableField {
    pub fn new(path: ContentPath) -> Self {
        Self {
            path,
            mode: FieldMode::Display,
            multiline: false,
        }
    }

    /// A field that was already editing, rebuilt from a submitted draft.
    pub fn resume(path: ContentPath, draft: impl Into<String>) -> Self {
        Self {
            path,
            mode: FieldMode::Editing {
                draft: draft.into(),
            },
            multiline: false,
        }
    }

    /// Edit with a textarea instead of a single-line input.
    pub fn multiline(mut self) -> Self {
        self.multiline = true;
        self
    }

    pub fn path(&self) -> &ContentPath {
        &self.path
    }

    pub fn mode(&self) -> &FieldMode {
        &self.mode
    }

    pub fn is_multiline(&self) -> bool {
        self.multiline
    }

    /// Display → Editing, seeding the draft with the live value.
    ///
    /// Returns whether the field is now editing. A path that is not a text
    /// leaf of `tree`, nor one of `seed` that `tree` lacks, stays in Display.
    pub fn click(&mut self, gate: EditGate, tree: &ContentTree, seed: &ContentTree) -> bool {
        if !self.enforce(gate) {
            return false;
        }
        if self.mode == FieldMode::Display {
            if !tree.accepts_text(seed, &self.path) {
                return false;
            }
            self.mode = FieldMode::Editing {
                draft: tree.text(&self.path).to_owned(),
            };
        }
        true
    }

    /// Replace the draft. Ignored outside Editing.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        if let FieldMode::Editing { draft } = &mut self.mode {
            *draft = text.into();
        }
    }

    /// Commit the draft and return to Display.
    ///
    /// On error the field stays in Editing with its draft, except when the
    /// gate is closed, which forces Display.
    pub fn save(&mut self, gate: EditGate, ctx: &ContentContext) -> Result<PersistTicket, ContentError> {
        if !self.enforce(gate) {
            return Err(ContentError::EditingLocked);
        }
        let FieldMode::Editing { draft } = &self.mode else {
            return Err(ContentError::EditingLocked);
        };
        let ticket = ctx.update_content(&self.path, draft.as_str())?;
        self.mode = FieldMode::Display;
        Ok(ticket)
    }

    /// Editing → Display, dropping the draft.
    pub fn cancel(&mut self) {
        self.mode = FieldMode::Display;
    }

    pub fn render(&mut self, gate: EditGate, tree: &ContentTree) -> FieldView {
        let open = self.enforce(gate);
        match &self.mode {
            FieldMode::Editing { draft } => FieldView::Editing {
                draft: draft.clone(),
            },
            FieldMode::Display => {
                let text = tree.text(&self.path).to_owned();
                if open {
                    FieldView::Editable { text }
                } else {
                    FieldView::ReadOnly { text }
                }
            }
        }
    }

    /// Force Display when the gate is closed. Returns whether it is open.
    fn enforce(&mut self, gate: EditGate) -> bool {
        if !gate.is_open() {
            self.mode = FieldMode::Display;
        }
        gate.is_open()
    }
}
