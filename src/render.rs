//! HTML rendering for site pages and the admin surface.
//!
//! Templates are embedded at compile time and filled with [`fill`]. Every
//! content value goes through [`escape`]; editable values go through an
//! [`Editor`], which drives one [`EditableField`] per path.

use crate::{
    contact::{ContactForm, SPECIALTY_OPTIONS},
    content::{ContentNode, ContentPath, ContentTree, EditGate, EditableField, FieldView, SPECIALTIES},
    store::Row,
};
use serde_json::Value;
use std::borrow::Cow;

// ============================================================================
// Constants - HTML Templates
// ============================================================================

const LAYOUT_TEMPLATE: &str = include_str!("embed/layout.html");
const HOME_TEMPLATE: &str = include_str!("embed/home.html");
const ARTICLE_TEMPLATE: &str = include_str!("embed/article.html");
const CONTACT_TEMPLATE: &str = include_str!("embed/contact.html");
const LOGIN_TEMPLATE: &str = include_str!("embed/login.html");
const RESET_TEMPLATE: &str = include_str!("embed/reset.html");
const ADMIN_TEMPLATE: &str = include_str!("embed/admin.html");
const NOT_FOUND_TEMPLATE: &str = include_str!("embed/not_found.html");

/// Leaves longer than this get a textarea in the admin panel.
const MULTILINE_THRESHOLD: usize = 80;

// ============================================================================
// Helpers
// ============================================================================

/// Escape text for HTML element and attribute context.
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Replace `{key}` placeholders in one pass.
///
/// Substituted values are never rescanned, so content containing `{body}`
/// stays literal. Braces that do not name a known key are kept.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let hit = after.find('}').and_then(|end| {
            let key = &after[..end];
            vars.iter().find(|(k, _)| *k == key).map(|(_, v)| (end, *v))
        });
        match hit {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Flash message above a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    fn to_html(&self) -> String {
        let (class, text) = match self {
            Self::Success(text) => ("success", text),
            Self::Error(text) => ("error", text),
        };
        format!(r#"<div class="notice {class}" role="status">{}</div>"#, escape(text))
    }
}

fn notice_html(notice: Option<&Notice>) -> String {
    notice.map(Notice::to_html).unwrap_or_default()
}

// ============================================================================
// Editable Fields
// ============================================================================

/// Renders content values for one page request.
pub struct Editor<'a> {
    tree: &'a ContentTree,
    seed: &'a ContentTree,
    gate: EditGate,
    route: &'a str,
    active: Option<EditableField>,
    error: Option<String>,
}

impl<'a> Editor<'a> {
    pub fn new(tree: &'a ContentTree, gate: EditGate, route: &'a str) -> Self {
        Self {
            tree,
            seed: tree,
            gate,
            route,
            active: None,
            error: None,
        }
    }

    /// Defaults that make fields missing from `tree` clickable.
    pub fn with_seed(mut self, seed: &'a ContentTree) -> Self {
        self.seed = seed;
        self
    }

    /// Apply the click transition to the field at `raw`.
    pub fn click(mut self, raw: &str) -> Self {
        if let Ok(path) = ContentPath::parse(raw) {
            let mut field = EditableField::new(path);
            if field.click(self.gate, self.tree, self.seed) {
                self.active = Some(field);
            }
        }
        self
    }

    /// Show `field` as it is, with `error` under it. Used after a failed save.
    pub fn keep(mut self, field: EditableField, error: String) -> Self {
        self.active = Some(field);
        self.error = Some(error);
        self
    }

    pub fn tree(&self) -> &'a ContentTree {
        self.tree
    }

    pub fn is_open(&self) -> bool {
        self.gate.is_open()
    }

    /// Plain text at `raw`, escaped, never editable.
    pub fn plain(&self, raw: &str) -> String {
        match ContentPath::parse(raw) {
            Ok(path) => escape(self.tree.text(&path)).into_owned(),
            Err(_) => String::new(),
        }
    }

    pub fn line(&mut self, raw: &str) -> String {
        self.field(raw, false)
    }

    pub fn block(&mut self, raw: &str) -> String {
        self.field(raw, true)
    }

    fn field(&mut self, raw: &str, multiline: bool) -> String {
        let Ok(path) = ContentPath::parse(raw) else {
            return String::new();
        };
        let mut field = match self.active.as_ref().filter(|f| f.path() == &path) {
            Some(active) => active.clone(),
            None => EditableField::new(path),
        };
        if multiline {
            field = field.multiline();
        }

        match field.render(self.gate, self.tree) {
            FieldView::ReadOnly { text } => escape(&text).into_owned(),
            FieldView::Editable { text } => {
                let shown = if text.is_empty() { "(empty)" } else { text.as_str() };
                format!(
                    r#"<span class="editable" data-path="{raw}"><a href="{route}?edit={query}" title="Click to edit">{text}</a></span>"#,
                    raw = escape(raw),
                    route = escape(self.route),
                    query = urlencoding::encode(raw),
                    text = escape(shown),
                )
            }
            FieldView::Editing { draft } => self.editing_form(raw, &draft, field.is_multiline()),
        }
    }

    fn editing_form(&self, raw: &str, draft: &str, multiline: bool) -> String {
        let input = if multiline {
            format!(r#"<textarea name="value" autofocus>{}</textarea>"#, escape(draft))
        } else {
            format!(r#"<input name="value" value="{}" autofocus>"#, escape(draft))
        };
        let error = self
            .error
            .as_deref()
            .map(|e| format!(r#"<span class="notice error">{}</span>"#, escape(e)))
            .unwrap_or_default();
        format!(
            concat!(
                r#"<form class="editing" method="post" action="/admin/content" data-path="{raw}">"#,
                r#"<input type="hidden" name="path" value="{raw}">"#,
                r#"<input type="hidden" name="return_to" value="{route}">"#,
                r#"{input}<button type="submit">Save</button><a href="{route}">Cancel</a>{error}</form>"#,
            ),
            raw = escape(raw),
            route = escape(self.route),
            input = input,
            error = error,
        )
    }

    /// Image URL field, shown only while editing is possible.
    fn image_field(&mut self, raw: &str) -> String {
        if !self.is_open() {
            return String::new();
        }
        format!("<p>Image URL: {}</p>", self.line(raw))
    }
}

// ============================================================================
// Layout
// ============================================================================

/// Signed-in admin shown in the top bar.
#[derive(Debug, Clone, Copy)]
pub struct AdminBar<'a> {
    pub email: &'a str,
    pub active: bool,
}

fn nav(tree: &ContentTree) -> String {
    let mut links = vec![r#"<a href="/">Home</a>"#.to_owned(), r#"<a href="/mission">Mission</a>"#.to_owned()];
    for (section, slug) in SPECIALTIES {
        let label = ContentPath::parse(&format!("{section}.title"))
            .map(|p| tree.text(&p).to_owned())
            .unwrap_or_default();
        links.push(format!(r#"<a href="/{slug}">{}</a>"#, escape(&label)));
    }
    links.push(r#"<a href="/contact">Contact</a>"#.to_owned());
    links.join("")
}

fn admin_bar(bar: Option<AdminBar<'_>>) -> String {
    let Some(bar) = bar else {
        return String::new();
    };
    let (state, action) = if bar.active { ("ON", "Turn off") } else { ("OFF", "Turn on") };
    format!(
        concat!(
            r#"<div class="admin-bar"><span>{email}</span><span>Admin mode: {state}</span>"#,
            r#"<form method="post" action="/admin/mode"><button type="submit">{action}</button></form>"#,
            r#"<a href="/admin-panel">Admin panel</a>"#,
            r#"<form method="post" action="/admin/logout"><button type="submit">Sign out</button></form></div>"#,
        ),
        email = escape(bar.email),
        state = state,
        action = action,
    )
}

/// Wrap `body` in the site chrome.
pub fn layout(site_title: &str, page_title: &str, tree: &ContentTree, bar: Option<AdminBar<'_>>, body: &str) -> String {
    fill(
        LAYOUT_TEMPLATE,
        &[
            ("site_title", &*escape(site_title)),
            ("page_title", &*escape(page_title)),
            ("admin_bar", &*admin_bar(bar)),
            ("nav", &*nav(tree)),
            ("body", body),
        ],
    )
}

// ============================================================================
// Pages
// ============================================================================

pub fn home(ed: &mut Editor<'_>) -> String {
    let count = ContentPath::parse("home.features")
        .ok()
        .and_then(|p| match ed.tree().get(&p) {
            Some(ContentNode::List(items)) => Some(items.len()),
            _ => None,
        })
        .unwrap_or(0);

    let features: Vec<String> = (0..count)
        .map(|i| {
            format!(
                "<article><h3>{}</h3><p>{}</p></article>",
                ed.line(&format!("home.features.{i}.title")),
                ed.block(&format!("home.features.{i}.description")),
            )
        })
        .collect();

    let cta = if ed.is_open() {
        ed.line("home.hero.ctaText")
    } else {
        format!(r#"<a class="cta" href="/contact">{}</a>"#, ed.plain("home.hero.ctaText"))
    };

    fill(
        HOME_TEMPLATE,
        &[
            ("hero_title", &*ed.line("home.hero.title")),
            ("hero_subtitle", &*ed.block("home.hero.subtitle")),
            ("hero_cta", &*cta),
            ("features", &*features.join("\n")),
        ],
    )
}

/// Title, subtitle, image and body of `section`: mission and specialty pages.
pub fn article(ed: &mut Editor<'_>, section: &str, with_cta: bool) -> String {
    let cta = if with_cta {
        r#"<p><a class="cta" href="/contact">Get Started</a></p>"#
    } else {
        ""
    };
    fill(
        ARTICLE_TEMPLATE,
        &[
            ("title", &*ed.line(&format!("{section}.title"))),
            ("subtitle", &*ed.line(&format!("{section}.subtitle"))),
            ("image_src", &*ed.plain(&format!("{section}.image"))),
            ("image_alt", &*ed.plain(&format!("{section}.title"))),
            ("image_field", &*ed.image_field(&format!("{section}.image"))),
            ("body", &*ed.block(&format!("{section}.body"))),
            ("cta", cta),
        ],
    )
}

pub fn contact(ed: &mut Editor<'_>, form: &ContactForm, notice: Option<&Notice>) -> String {
    let options: Vec<String> = SPECIALTY_OPTIONS
        .iter()
        .map(|option| {
            let selected = if form.specialty_interest == *option { " selected" } else { "" };
            format!(r#"            <option value="{0}"{selected}>{0}</option>"#, escape(option))
        })
        .collect();

    fill(
        CONTACT_TEMPLATE,
        &[
            ("title", &*ed.line("contact.title")),
            ("subtitle", &*ed.line("contact.subtitle")),
            ("image_src", &*ed.plain("contact.image")),
            ("image_alt", &*ed.plain("contact.title")),
            ("image_field", &*ed.image_field("contact.image")),
            ("body", &*ed.block("contact.body")),
            ("email", &*ed.line("contact.email")),
            ("notice", &*notice_html(notice)),
            ("name", &*escape(&form.name)),
            ("form_email", &*escape(&form.email)),
            ("phone", &*escape(&form.phone)),
            ("specialty_options", &*options.join("\n")),
            ("message", &*escape(&form.message)),
        ],
    )
}

pub fn login(notice: Option<&Notice>) -> String {
    fill(LOGIN_TEMPLATE, &[("notice", &*notice_html(notice))])
}

pub fn reset_password(token: &str, min_len: usize, notice: Option<&Notice>) -> String {
    fill(
        RESET_TEMPLATE,
        &[
            ("notice", &*notice_html(notice)),
            ("token", &*escape(token)),
            ("min_len", &*min_len.to_string()),
        ],
    )
}

/// Admin panel: mode toggle, every content leaf, and received submissions.
pub fn admin_panel(ed: &mut Editor<'_>, email: &str, active: bool, submissions: &[Row], notice: Option<&Notice>) -> String {
    let tree = ed.tree();
    let content_rows: Vec<String> = tree
        .text_leaves()
        .into_iter()
        .map(|(path, text)| {
            let cell = if text.chars().count() > MULTILINE_THRESHOLD {
                ed.block(&path)
            } else {
                ed.line(&path)
            };
            format!("        <tr><td><code>{}</code></td><td>{cell}</td></tr>", escape(&path))
        })
        .collect();

    let submission_rows: Vec<String> = submissions
        .iter()
        .map(|row| {
            let cells: Vec<String> = ["created_at", "name", "email", "specialty_interest", "status", "message"]
                .iter()
                .map(|column| format!("<td>{}</td>", escape(&cell_text(row, column))))
                .collect();
            format!("        <tr>{}</tr>", cells.join(""))
        })
        .collect();

    let (mode, toggle_label) = if active {
        ("ON", "Turn admin mode off")
    } else {
        ("OFF", "Turn admin mode on")
    };

    fill(
        ADMIN_TEMPLATE,
        &[
            ("notice", &*notice_html(notice)),
            ("email", &*escape(email)),
            ("mode", mode),
            ("toggle_label", toggle_label),
            ("content_rows", &*content_rows.join("\n")),
            ("submission_rows", &*submission_rows.join("\n")),
        ],
    )
}

fn cell_text(row: &Row, column: &str) -> String {
    match row.get(column) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn not_found() -> String {
    NOT_FOUND_TEMPLATE.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{AdminSession, seed_tree};
    use serde_json::json;

    fn gates() -> (EditGate, EditGate) {
        let admin = AdminSession::default();
        let closed = admin.gate(true);
        admin.set_active(true);
        (closed, admin.gate(true))
    }

    #[test]
    fn test_escape() {
        assert!(matches!(escape("plain"), Cow::Borrowed("plain")));
        assert_eq!(escape(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }

    #[test]
    fn test_fill_is_single_pass() {
        let out = fill("<h1>{title}</h1>{body} .x { color: red }", &[("title", "{body}"), ("body", "B")]);
        assert_eq!(out, "<h1>{body}</h1>B .x { color: red }");
    }

    #[test]
    fn test_fill_keeps_unknown_and_unclosed_braces() {
        assert_eq!(fill("{a}{b}{", &[("a", "1")]), "1{b}{");
    }

    #[test]
    fn test_public_render_has_no_affordances() {
        let tree = seed_tree();
        let (closed, _) = gates();
        let mut ed = Editor::new(&tree, closed, "/").click("home.hero.title");
        let html = home(&mut ed);

        assert!(html.contains("Empower Your Client Acquisition"));
        assert!(html.contains(r#"<a class="cta" href="/contact">Get Started Today</a>"#));
        assert!(!html.contains("data-path"));
        assert!(!html.contains("/admin/content"));
    }

    #[test]
    fn test_admin_render_marks_fields_editable() {
        let tree = seed_tree();
        let (_, open) = gates();
        let mut ed = Editor::new(&tree, open, "/mission");
        let html = article(&mut ed, "mission", false);

        assert!(html.contains(r#"data-path="mission.title""#));
        assert!(html.contains(r#"href="/mission?edit=mission.body""#));
        assert!(html.contains("Image URL:"));
    }

    #[test]
    fn test_click_renders_editing_form_with_live_value() {
        let tree = seed_tree();
        let (_, open) = gates();
        let mut ed = Editor::new(&tree, open, "/contact").click("contact.title");
        let html = ed.line("contact.title");

        assert!(html.starts_with(r#"<form class="editing""#));
        assert!(html.contains(r#"<input name="value" value="Contact Us" autofocus>"#));
        assert!(html.contains(r#"name="return_to" value="/contact""#));
        // Other fields stay in display mode.
        assert!(ed.line("contact.subtitle").starts_with(r#"<span class="editable""#));
    }

    #[test]
    fn test_multiline_editing_uses_textarea() {
        let tree = seed_tree();
        let (_, open) = gates();
        let mut ed = Editor::new(&tree, open, "/mission").click("mission.body");
        assert!(ed.block("mission.body").contains("<textarea"));
    }

    #[test]
    fn test_click_opens_seed_field_missing_from_live_tree() {
        let seed = seed_tree();
        let live = seed.with_section("mission", ContentNode::from_json(&json!({ "title": "T" })));
        let (_, open) = gates();

        let mut ed = Editor::new(&live, open, "/mission").click("mission.body");
        assert!(!ed.block("mission.body").contains("<textarea"));

        let mut ed = Editor::new(&live, open, "/mission")
            .with_seed(&seed)
            .click("mission.body");
        assert!(ed.block("mission.body").contains(r#"<textarea name="value" autofocus></textarea>"#));
    }

    #[test]
    fn test_kept_field_shows_draft_and_error() {
        let tree = seed_tree();
        let (_, open) = gates();
        let mut field = EditableField::new(ContentPath::parse("contact.title").unwrap());
        field.click(open, &tree, &tree);
        field.set_draft("<Draft>");
        let mut ed = Editor::new(&tree, open, "/contact").keep(field, "content is still loading".into());

        let html = ed.line("contact.title");
        assert!(html.contains(r#"value="&lt;Draft&gt;""#));
        assert!(html.contains("content is still loading"));
    }

    #[test]
    fn test_stored_markup_is_escaped() {
        let tree = seed_tree()
            .with_value(
                &ContentPath::parse("mission.title").unwrap(),
                "<script>alert(1)</script>".into(),
            )
            .unwrap();
        let (closed, _) = gates();
        let mut ed = Editor::new(&tree, closed, "/mission");
        let html = article(&mut ed, "mission", false);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_contact_keeps_form_values() {
        let tree = seed_tree();
        let (closed, _) = gates();
        let mut ed = Editor::new(&tree, closed, "/contact");
        let form = ContactForm {
            name: "Dana".into(),
            specialty_interest: "Neurology".into(),
            ..ContactForm::default()
        };
        let html = contact(&mut ed, &form, Some(&Notice::Error("Please enter your email".into())));

        assert!(html.contains(r#"value="Dana""#));
        assert!(html.contains(r#"<option value="Neurology" selected>"#));
        assert!(html.contains(r#"class="notice error""#));
    }

    #[test]
    fn test_layout_nav_uses_live_titles() {
        let tree = seed_tree();
        let html = layout("Site", "Home", &tree, None, "<p>x</p>");
        assert!(html.contains(r#"<a href="/stem-cell">Stem Cell Practitioners</a>"#));
        assert!(html.contains("<title>Home | Site</title>"));
        assert!(!html.contains("admin-bar\">"));
    }

    #[test]
    fn test_admin_panel_lists_leaves_and_submissions() {
        let tree = seed_tree();
        let (closed, _) = gates();
        let mut ed = Editor::new(&tree, closed, "/admin-panel");
        let mut row = Row::new();
        row.insert("name".into(), Value::from("Dana"));
        row.insert("phone".into(), Value::Null);
        let html = admin_panel(&mut ed, "boss@example.com", false, &[row], None);

        assert!(html.contains("<code>home.features.0.title</code>"));
        assert!(html.contains("<td>Dana</td>"));
        assert!(html.contains("Admin mode is <strong>OFF</strong>"));
    }
}
