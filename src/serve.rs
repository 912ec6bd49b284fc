//! HTTP server for the public site and the admin surface.
//!
//! Built on `tiny_http`, one request at a time on the main thread:
//!
//! - Public pages rendered from the live content tree
//! - Contact form intake
//! - Admin login, password reset, admin panel and inline edits
//! - Graceful shutdown on Ctrl+C
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────────┐
//! │   Main Thread   │     │   Tokio Runtime      │
//! │  (HTTP Server)  │     │ (load, persist tasks)│
//! └────────┬────────┘     └──────────┬───────────┘
//!          │                         │
//!          ▼                         ▼
//!   Req ─► route() ─► Reply     store reads/writes
//!          │                         ▲
//!          └── update_content ───────┘
//! ```
//!
//! Routing works on plain [`Req`]/[`Reply`] values so it can be exercised
//! without a socket.

use crate::{
    auth::{AdminCheck, AuthProvider, Session, verify_admin},
    config::SiteConfig,
    contact::{self, ContactForm, SUCCESS_MESSAGE},
    content::{ContentContext, ContentPath, EditableField, SPECIALTIES},
    log,
    render::{self, AdminBar, Editor, Notice},
    store::{DataStore, Row, Table},
};
use anyhow::{Context, Result, anyhow};
use serde_json::json;
use std::{
    io::Read,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

/// Largest accepted request body.
const MAX_BODY_BYTES: u64 = 64 * 1024;

pub const SESSION_COOKIE: &str = "leadsite_session";

// ============================================================================
// Application State
// ============================================================================

/// Everything a request handler needs.
pub struct App {
    pub config: &'static SiteConfig,
    pub content: Arc<ContentContext>,
    pub auth: Arc<dyn AuthProvider>,
    pub store: Arc<dyn DataStore>,
}

/// Who is looking at a page, and what they may do.
struct Viewer {
    session: Option<Session>,
    check: AdminCheck,
}

impl App {
    fn viewer(&self, req: &Req) -> Viewer {
        let check = verify_admin(self.auth.as_ref(), self.store.as_ref(), req.token.as_deref());
        let session = match &check {
            AdminCheck::Granted(session) => Some(session.clone()),
            AdminCheck::Denied(_) => None,
        };
        Viewer { session, check }
    }

    fn admin_bar<'v>(&self, viewer: &'v Viewer) -> Option<AdminBar<'v>> {
        viewer.session.as_ref().map(|s| AdminBar {
            email: s.email.as_deref().unwrap_or_default(),
            active: self.content.admin().is_active(),
        })
    }
}

// ============================================================================
// Server Entry Point
// ============================================================================

/// Start the server and block until Ctrl+C.
///
/// This function:
/// 1. Binds to the configured interface and port (with auto-retry on port conflict)
/// 2. Sets up Ctrl+C handler for graceful shutdown
/// 3. Enters the main request handling loop
pub fn serve_site(app: &App) -> Result<()> {
    let interface: IpAddr = app
        .config
        .serve
        .interface
        .parse()
        .with_context(|| format!("invalid interface `{}`", app.config.serve.interface))?;

    let (server, addr) = try_bind_port(interface, app.config.serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, app) {
            log!("serve"; "request error: {e:#}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request / Reply
// ============================================================================

/// A decoded request.
#[derive(Debug, Clone)]
pub struct Req {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub token: Option<String>,
}

impl Req {
    pub fn get(url: &str) -> Self {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        Self {
            method: Method::Get,
            path: path.to_owned(),
            query: parse_pairs(query),
            form: Vec::new(),
            token: None,
        }
    }

    pub fn post(path: &str, form: &[(&str, &str)]) -> Self {
        Self {
            method: Method::Post,
            path: path.to_owned(),
            query: Vec::new(),
            form: form
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            token: None,
        }
    }

    #[cfg(test)]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        lookup(&self.query, key)
    }

    pub fn field(&self, key: &str) -> &str {
        lookup(&self.form, key).unwrap_or_default()
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// A response before it is turned into `tiny_http` types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    pub location: Option<String>,
    pub cookie: Option<String>,
}

impl Reply {
    fn html(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "text/html; charset=utf-8",
            body,
            location: None,
            cookie: None,
        }
    }

    fn json(body: String) -> Self {
        Self {
            content_type: "application/json; charset=utf-8",
            ..Self::html(200, body)
        }
    }

    fn redirect(location: &str) -> Self {
        Self {
            location: Some(location.to_owned()),
            ..Self::html(303, String::new())
        }
    }

    fn with_cookie(mut self, cookie: String) -> Self {
        self.cookie = Some(cookie);
        self
    }
}

/// Decode `a=1&b=two+words` pairs. Malformed escapes are kept verbatim.
pub fn parse_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (k, v) = part.split_once('=').unwrap_or((part, ""));
            (decode_component(k), decode_component(v))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Session token from a `Cookie` header value.
pub fn session_token(cookie_header: &str) -> Option<String> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_owned())
        .filter(|value| !value.is_empty())
}

/// Keep redirects on this site: a local absolute path, without its query.
fn local_target(raw: &str) -> &str {
    let path = raw.split(['?', '#']).next().unwrap_or_default();
    if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') {
        path
    } else {
        "/"
    }
}

// ============================================================================
// Request Handling
// ============================================================================

fn handle_request(mut request: Request, app: &App) -> Result<()> {
    let req = decode_request(&mut request)?;
    let reply = route(app, &req);
    respond(request, reply)
}

fn decode_request(request: &mut Request) -> Result<Req> {
    let url = request.url().to_owned();
    let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));
    let token = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Cookie"))
        .and_then(|h| session_token(h.value.as_str()));

    let mut form = Vec::new();
    if *request.method() == Method::Post {
        let mut body = String::new();
        request
            .as_reader()
            .take(MAX_BODY_BYTES)
            .read_to_string(&mut body)
            .context("Failed to read request body")?;
        form = parse_pairs(&body);
    }

    Ok(Req {
        method: request.method().clone(),
        path: decode_component(path),
        query: parse_pairs(query),
        form,
        token,
    })
}

fn respond(request: Request, reply: Reply) -> Result<()> {
    let mut response = Response::from_string(reply.body)
        .with_status_code(StatusCode(reply.status))
        .with_header(header("Content-Type", reply.content_type)?);
    if let Some(location) = &reply.location {
        response = response.with_header(header("Location", location)?);
    }
    if let Some(cookie) = &reply.cookie {
        response = response.with_header(header("Set-Cookie", cookie)?);
    }
    request.respond(response)?;
    Ok(())
}

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes())
        .map_err(|()| anyhow!("invalid `{name}` header value"))
}

/// Pages rendered from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Home,
    Contact,
    Mission,
    Specialty(&'static str),
    AdminPanel,
}

impl View {
    fn for_path(path: &str) -> Option<Self> {
        match path {
            "/" => Some(Self::Home),
            "/contact" => Some(Self::Contact),
            "/mission" => Some(Self::Mission),
            "/admin-panel" => Some(Self::AdminPanel),
            _ => SPECIALTIES
                .iter()
                .find(|(_, slug)| path.strip_prefix('/') == Some(*slug))
                .map(|(section, _)| Self::Specialty(section)),
        }
    }

    fn route(self) -> String {
        match self {
            Self::Home => "/".into(),
            Self::Contact => "/contact".into(),
            Self::Mission => "/mission".into(),
            Self::AdminPanel => "/admin-panel".into(),
            Self::Specialty(section) => SPECIALTIES
                .iter()
                .find(|(s, _)| *s == section)
                .map_or_else(|| "/".into(), |(_, slug)| format!("/{slug}")),
        }
    }
}

/// Dispatch one request.
pub fn route(app: &App, req: &Req) -> Reply {
    let path = req.path.trim_end_matches('/');
    let path = if path.is_empty() { "/" } else { path };

    match (&req.method, path) {
        (Method::Get, "/api/content") => api_content(app),
        (Method::Post, "/contact") => submit_contact(app, req),
        (Method::Get, "/admin-login") => login_page(app, req),
        (Method::Post, "/admin-login") => sign_in(app, req),
        (Method::Post, "/admin/forgot") => forgot_password(app, req),
        (Method::Get, "/reset-password") => Reply::html(
            200,
            reset_page(app, req.query("token").unwrap_or_default(), None),
        ),
        (Method::Post, "/reset-password") => reset_password(app, req),
        (Method::Post, "/admin/mode") => toggle_mode(app, req),
        (Method::Post, "/admin/content") => save_content(app, req),
        (Method::Post, "/admin/logout") => sign_out(app, req),
        (Method::Get, _) => match View::for_path(path) {
            Some(view) => {
                let viewer = app.viewer(req);
                show(app, view, &viewer, req.query("edit"), None, &ContactForm::default(), None)
            }
            None => not_found(app),
        },
        _ => not_found(app),
    }
}

/// Render `view`, optionally with one field clicked or kept open after a
/// failed save.
fn show(
    app: &App,
    view: View,
    viewer: &Viewer,
    edit: Option<&str>,
    kept: Option<(EditableField, String)>,
    form: &ContactForm,
    notice: Option<&Notice>,
) -> Reply {
    if view == View::AdminPanel && viewer.session.is_none() {
        return to_login(true);
    }

    let tree = app.content.content();
    let gate = app.content.admin().gate(viewer.check.is_granted());
    let route = view.route();
    let mut ed = Editor::new(&tree, gate, &route).with_seed(app.content.seed());
    if let Some(raw) = edit {
        ed = ed.click(raw);
    }
    if let Some((field, error)) = kept {
        ed = ed.keep(field, error);
    }

    let title_of = |section: &str| {
        ContentPath::parse(&format!("{section}.title"))
            .map(|p| tree.text(&p).to_owned())
            .unwrap_or_default()
    };

    let (title, body) = match view {
        View::Home => ("Home".to_owned(), render::home(&mut ed)),
        View::Mission => (title_of("mission"), render::article(&mut ed, "mission", false)),
        View::Specialty(section) => (title_of(section), render::article(&mut ed, section, true)),
        View::Contact => (title_of("contact"), render::contact(&mut ed, form, notice)),
        View::AdminPanel => {
            let email = viewer
                .session
                .as_ref()
                .and_then(|s| s.email.as_deref())
                .unwrap_or_default();
            let (submissions, notice) = match app.store.read_rows(Table::ContactSubmissions, None) {
                Ok(mut rows) => {
                    let received = |row: &Row| row.get("created_at").map(ToString::to_string);
                    rows.sort_by_key(|row| std::cmp::Reverse(received(row)));
                    (rows, notice.cloned())
                }
                Err(e) => {
                    log!("serve"; "listing submissions failed: {e}");
                    (Vec::new(), Some(Notice::Error("Could not load submissions".into())))
                }
            };
            let active = app.content.admin().is_active();
            let body = render::admin_panel(&mut ed, email, active, &submissions, notice.as_ref());
            ("Admin Panel".to_owned(), body)
        }
    };

    let status = match notice {
        Some(Notice::Error(_)) => 400,
        _ => 200,
    };
    let page = render::layout(&app.config.base.title, &title, &tree, app.admin_bar(viewer), &body);
    Reply::html(status, page)
}

fn not_found(app: &App) -> Reply {
    let tree = app.content.content();
    let page = render::layout(&app.config.base.title, "Not Found", &tree, None, &render::not_found());
    Reply::html(404, page)
}

fn api_content(app: &App) -> Reply {
    let body = json!({
        "loading": app.content.loading(),
        "content": app.content.content().to_json(),
    });
    Reply::json(body.to_string())
}

fn submit_contact(app: &App, req: &Req) -> Reply {
    let form = ContactForm::from_pairs(req.form.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    let viewer = app.viewer(req);
    match contact::submit(app.store.as_ref(), &form) {
        Ok(()) => {
            log!("serve"; "contact submission from {}", form.email.trim());
            let notice = Notice::Success(SUCCESS_MESSAGE.into());
            show(app, View::Contact, &viewer, None, None, &ContactForm::default(), Some(&notice))
        }
        Err(e) => {
            if let contact::ContactError::Store(inner) = &e {
                log!("serve"; "contact submission failed: {inner}");
            }
            let notice = Notice::Error(e.to_string());
            show(app, View::Contact, &viewer, None, None, &form, Some(&notice))
        }
    }
}

// ============================================================================
// Admin Surface
// ============================================================================

fn session_cookie(app: &App, token: &str) -> String {
    let max_age = u64::from(app.config.auth.session_ttl_hours) * 3600;
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}")
}

fn cleared_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Redirect to the login page, dropping the cookie if a session was refused.
fn to_login(clear: bool) -> Reply {
    let reply = Reply::redirect("/admin-login");
    if clear { reply.with_cookie(cleared_cookie()) } else { reply }
}

fn login_reply(app: &App, status: u16, notice: Option<&Notice>) -> Reply {
    let tree = app.content.content();
    let page = render::layout(&app.config.base.title, "Admin Login", &tree, None, &render::login(notice));
    Reply::html(status, page)
}

fn reset_page(app: &App, token: &str, notice: Option<&Notice>) -> String {
    let tree = app.content.content();
    let body = render::reset_password(token, app.config.auth.min_password_len, notice);
    render::layout(&app.config.base.title, "Reset Password", &tree, None, &body)
}

fn login_page(app: &App, req: &Req) -> Reply {
    if app.viewer(req).session.is_some() {
        return Reply::redirect("/admin-panel");
    }
    login_reply(app, 200, None)
}

fn sign_in(app: &App, req: &Req) -> Reply {
    let session = match app.auth.sign_in(req.field("email"), req.field("password")) {
        Ok(session) => session,
        Err(e) => {
            log!("auth"; "sign-in failed for {}", req.field("email").trim());
            return login_reply(app, 401, Some(&Notice::Error(e.to_string())));
        }
    };

    match verify_admin(app.auth.as_ref(), app.store.as_ref(), Some(&session.token)) {
        AdminCheck::Granted(_) => {
            Reply::redirect("/admin-panel").with_cookie(session_cookie(app, &session.token))
        }
        AdminCheck::Denied(_) => {
            let notice = Notice::Error("Access denied. Admin privileges required.".into());
            login_reply(app, 403, Some(&notice))
        }
    }
}

fn sign_out(app: &App, req: &Req) -> Reply {
    if let Some(token) = &req.token {
        app.auth.sign_out(token);
    }
    to_login(true)
}

fn forgot_password(app: &App, req: &Req) -> Reply {
    let email = req.field("email");
    if email.trim().is_empty() {
        return login_reply(app, 400, Some(&Notice::Error("Please enter your email".into())));
    }
    match app.auth.send_password_reset(email, &app.config.reset_redirect()) {
        Ok(()) => {
            let notice = Notice::Success("Password reset email sent! Check your inbox.".into());
            login_reply(app, 200, Some(&notice))
        }
        Err(e) => login_reply(app, 500, Some(&Notice::Error(e.to_string()))),
    }
}

fn reset_password(app: &App, req: &Req) -> Reply {
    let token = req.field("token");
    let password = req.field("password");
    if password != req.field("confirm") {
        let notice = Notice::Error("Passwords do not match".into());
        return Reply::html(400, reset_page(app, token, Some(&notice)));
    }
    match app.auth.update_password(token, password) {
        Ok(()) => {
            let notice = Notice::Success("Password updated successfully! Please sign in.".into());
            login_reply(app, 200, Some(&notice))
        }
        Err(e) => Reply::html(400, reset_page(app, token, Some(&Notice::Error(e.to_string())))),
    }
}

fn toggle_mode(app: &App, req: &Req) -> Reply {
    let viewer = app.viewer(req);
    if viewer.session.is_none() {
        return to_login(req.token.is_some());
    }
    let active = app.content.admin().toggle();
    log!("content"; "admin mode {}", if active { "on" } else { "off" });
    Reply::redirect("/admin-panel")
}

/// Save transition of one editable field.
fn save_content(app: &App, req: &Req) -> Reply {
    let viewer = app.viewer(req);
    if viewer.session.is_none() {
        return to_login(req.token.is_some());
    }

    let target = local_target(req.field("return_to"));
    let gate = app.content.admin().gate(true);
    let path = match ContentPath::parse(req.field("path")) {
        Ok(path) => path,
        Err(e) => {
            let notice = Notice::Error(e.to_string());
            return show(app, View::AdminPanel, &viewer, None, None, &ContactForm::default(), Some(&notice));
        }
    };

    let mut field = EditableField::resume(path, req.field("value"));

    match field.save(gate, &app.content) {
        Ok(ticket) => {
            log!("content"; "{} updated (rev {})", field.path(), ticket.revision());
            Reply::redirect(target)
        }
        Err(e) => {
            log!("content"; "update of {} rejected: {e}", field.path());
            let view = View::for_path(target).unwrap_or(View::AdminPanel);
            let notice = Notice::Error(e.to_string());
            let notice = (view == View::AdminPanel).then_some(&notice);
            let kept = Some((field, e.to_string()));
            let mut reply = show(app, view, &viewer, None, kept, &ContactForm::default(), notice);
            reply.status = 409;
            reply
        }
    }
}
