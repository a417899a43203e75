use maud::{DOCTYPE, Markup, PreEscaped, html};

#[derive(Debug, Clone)]
pub struct SessionView {
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct ProjectSummaryView {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ProjectView {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct EndpointView {
    pub url: String,
    pub synthesized: bool,
}

#[derive(Debug, Clone)]
pub struct EnvVarView {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub enum WebBody {
    Home,
    Login,
    AuthError {
        code: Option<String>,
    },
    Projects {
        projects: Vec<ProjectSummaryView>,
    },
    ProjectOverview {
        project: ProjectView,
        endpoint: EndpointView,
        sandbox_count: usize,
    },
    ProjectSettings {
        project: ProjectView,
        endpoint: EndpointView,
        environments: Vec<EnvVarView>,
    },
    NotFound,
    ServerError,
}

#[derive(Debug, Clone)]
pub struct WebPage {
    pub title: String,
    pub path: String,
    pub session: Option<SessionView>,
    pub body: WebBody,
}

pub fn render_page(page: &WebPage) -> String {
    let markup = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (page.title) " | Portside" }
                style { (PreEscaped(styles())) }
            }
            body {
                div class="ps-bg" {}
                div class="ps-app" {
                    (topbar(&page.path, page.session.as_ref()))
                    main class="ps-main" {
                        (body_markup(page))
                    }
                }
            }
        }
    };

    markup.into_string()
}

/// Messages for the dedicated authentication-error page. Total over every
/// input: the three recognized provider codes get their own wording, anything
/// else (including no code at all) collapses to the generic message.
#[must_use]
pub fn auth_error_message(code: Option<&str>) -> &'static str {
    match code {
        Some("Configuration") => {
            "There is a problem with the server configuration. Contact support if the error persists."
        }
        Some("AccessDenied") => "You do not have permission to sign in.",
        Some("Verification") => {
            "The sign-in link is no longer valid. It may have expired or it may have already been used."
        }
        _ => "Unable to sign in.",
    }
}

fn topbar(path: &str, session: Option<&SessionView>) -> Markup {
    let nav = [("/", "Home"), ("/projects", "Projects")];

    html! {
        header class="ps-topbar" {
            a class="ps-brand" href="/" { "Portside" }
            nav class="ps-nav" {
                @for (href, label) in nav {
                    @let active = nav_active(path, href);
                    a class={(if active { "ps-nav-link active" } else { "ps-nav-link" })} href=(href) { (label) }
                }
            }
            div class="ps-session" {
                @if let Some(session) = session {
                    span class="ps-session-label" { (session.user_id) }
                    form method="post" action="/logout" {
                        button type="submit" class="ps-btn subtle" { "Sign out" }
                    }
                } @else {
                    a class="ps-btn" href="/login" { "Sign in" }
                }
            }
        }
    }
}

fn body_markup(page: &WebPage) -> Markup {
    match &page.body {
        WebBody::Home => home_panel(page.session.as_ref()),
        WebBody::Login => login_panel(),
        WebBody::AuthError { code } => auth_error_panel(code.as_deref()),
        WebBody::Projects { projects } => projects_panel(projects),
        WebBody::ProjectOverview {
            project,
            endpoint,
            sandbox_count,
        } => project_overview_panel(project, endpoint, *sandbox_count),
        WebBody::ProjectSettings {
            project,
            endpoint,
            environments,
        } => project_settings_panel(project, endpoint, environments),
        WebBody::NotFound => not_found_panel(),
        WebBody::ServerError => server_error_panel(),
    }
}

fn home_panel(session: Option<&SessionView>) -> Markup {
    html! {
        section class="ps-hero" {
            h1 { "Ship from a sandbox that is already online." }
            p class="ps-muted" {
                "Portside gives every project an isolated cloud sandbox with a stable \
                 HTTPS address, environment management, and instant previews."
            }
            div class="ps-hero-actions" {
                @if session.is_some() {
                    a class="ps-btn primary" href="/projects" { "Open your projects" }
                } @else {
                    a class="ps-btn primary" href="/login" { "Get started" }
                }
            }
        }
        section class="ps-grid three" {
            article class="ps-card" {
                h2 { "Sandboxes" }
                p class="ps-muted" {
                    "Each project runs in its own sandbox, reachable the moment the \
                     project exists. No waiting on provisioning to share a link."
                }
            }
            article class="ps-card" {
                h2 { "Environments" }
                p class="ps-muted" {
                    "Keep configuration with the project. Values flow into the sandbox \
                     exactly as you saved them."
                }
            }
            article class="ps-card" {
                h2 { "Private by default" }
                p class="ps-muted" {
                    "Projects are visible only to their owner. There is nothing to \
                     configure and nothing to accidentally expose."
                }
            }
        }
    }
}

fn login_panel() -> Markup {
    html! {
        section class="ps-card ps-login" {
            h1 { "Sign in to Portside" }
            p class="ps-muted" {
                "Sign-in is handled by the Portside identity service. Once your \
                 session is established you will be returned here."
            }
            p class="ps-muted" {
                "If you arrived here after a failed sign-in, the error page has \
                 details about what went wrong."
            }
        }
    }
}

fn auth_error_panel(code: Option<&str>) -> Markup {
    html! {
        section class="ps-card ps-auth-error" {
            h1 { "Sign-in problem" }
            p class="ps-notice error" { (auth_error_message(code)) }
            p class="ps-muted" {
                a href="/login" { "Try signing in again" }
                " or head back to the "
                a href="/" { "home page" }
                "."
            }
        }
    }
}

fn projects_panel(projects: &[ProjectSummaryView]) -> Markup {
    html! {
        section class="ps-card ps-projects" {
            h1 { "Projects" }
            @if projects.is_empty() {
                p class="ps-muted" { "No projects yet." }
            } @else {
                ul class="ps-project-items" {
                    @for project in projects {
                        li {
                            a class="ps-project-link" href={(format!("/projects/{}", project.id))} {
                                span class="ps-project-name" { (project.name) }
                                span class="ps-project-meta" { "created " (project.created_at) }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn project_overview_panel(
    project: &ProjectView,
    endpoint: &EndpointView,
    sandbox_count: usize,
) -> Markup {
    html! {
        section class="ps-card ps-project" {
            h1 { (project.name) }
            p class="ps-muted" { "Project " code { (project.id) } " · created " (project.created_at) }
            div class="ps-endpoint" {
                h2 { "Sandbox address" }
                a class="ps-endpoint-url" href=(endpoint.url) { (endpoint.url) }
                @if endpoint.synthesized {
                    p class="ps-muted" {
                        "The sandbox has not reported its address yet; this is the \
                         address it will come up on."
                    }
                }
            }
            p class="ps-muted" {
                (sandbox_count) @if sandbox_count == 1 { " sandbox" } @else { " sandboxes" }
                " · "
                a href={(format!("/projects/{}/settings", project.id))} { "Settings" }
            }
        }
    }
}

fn project_settings_panel(
    project: &ProjectView,
    endpoint: &EndpointView,
    environments: &[EnvVarView],
) -> Markup {
    html! {
        section class="ps-card ps-project-settings" {
            h1 { (project.name) " settings" }
            p class="ps-muted" {
                a href={(format!("/projects/{}", project.id))} { "Back to overview" }
            }
            div class="ps-endpoint" {
                h2 { "Sandbox address" }
                a class="ps-endpoint-url" href=(endpoint.url) { (endpoint.url) }
            }
            h2 { "Environment variables" }
            @if environments.is_empty() {
                p class="ps-muted" { "No environment variables configured." }
            } @else {
                table class="ps-env-table" {
                    thead {
                        tr {
                            th { "Key" }
                            th { "Value" }
                        }
                    }
                    tbody {
                        @for variable in environments {
                            tr {
                                td { code { (variable.key) } }
                                td { code { (variable.value) } }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn not_found_panel() -> Markup {
    html! {
        section class="ps-card ps-status-page" {
            h1 { "Not found" }
            p class="ps-muted" { "This page does not exist." }
            p class="ps-muted" {
                a href="/projects" { "Back to your projects" }
            }
        }
    }
}

fn server_error_panel() -> Markup {
    html! {
        section class="ps-card ps-status-page" {
            h1 { "Something went wrong" }
            p class="ps-muted" { "An unexpected error occurred. Try again in a moment." }
        }
    }
}

fn nav_active(path: &str, href: &str) -> bool {
    if href == "/" {
        return path == "/";
    }
    path == href || path.starts_with(&format!("{href}/"))
}

fn styles() -> &'static str {
    r#"
:root {
  color-scheme: dark;
  --bg: #0a0d14;
  --panel: rgba(17, 22, 33, 0.86);
  --panel-border: rgba(124, 144, 176, 0.26);
  --text: #e8edf8;
  --muted: #93a1bd;
  --accent: #4fd1a5;
  --danger: #ff7888;
}
* { box-sizing: border-box; }
html, body { margin: 0; min-height: 100%; width: 100%; background: var(--bg); color: var(--text); }
body {
  font-family: "IBM Plex Sans", "SF Pro Text", -apple-system, BlinkMacSystemFont, sans-serif;
  -webkit-font-smoothing: antialiased;
}
.ps-bg {
  position: fixed;
  inset: 0;
  background: radial-gradient(120% 120% at 15% 0%, rgba(79, 209, 165, 0.14) 0%, rgba(79, 209, 165, 0) 55%),
              linear-gradient(180deg, #070a10 0%, #0c1019 60%, #070a10 100%);
  pointer-events: none;
  z-index: 0;
}
.ps-app { position: relative; z-index: 1; min-height: 100vh; display: flex; flex-direction: column; }
.ps-topbar {
  display: grid;
  grid-template-columns: 160px 1fr auto;
  gap: 1rem;
  align-items: center;
  padding: 0.85rem 1rem;
  border-bottom: 1px solid var(--panel-border);
  background: rgba(9, 13, 20, 0.78);
}
.ps-brand {
  font-weight: 700;
  letter-spacing: 0.05em;
  text-transform: uppercase;
  font-size: 0.82rem;
  color: #dff6ec;
  text-decoration: none;
}
.ps-nav { display: flex; gap: 0.45rem; }
.ps-nav-link {
  text-decoration: none;
  color: var(--muted);
  border: 1px solid transparent;
  border-radius: 10px;
  padding: 0.38rem 0.62rem;
  font-size: 0.9rem;
}
.ps-nav-link:hover { color: var(--text); border-color: rgba(138, 162, 204, 0.35); }
.ps-nav-link.active { color: #defbee; border-color: rgba(79, 209, 165, 0.5); background: rgba(22, 63, 50, 0.4); }
.ps-session { display: flex; gap: 0.6rem; align-items: center; }
.ps-session-label { color: var(--muted); font-size: 0.84rem; font-family: ui-monospace, monospace; }
.ps-main { padding: 1.2rem 1rem 2rem; width: 100%; max-width: 1080px; margin: 0 auto; display: grid; gap: 1rem; }
.ps-card {
  border: 1px solid var(--panel-border);
  border-radius: 14px;
  background: var(--panel);
  padding: 1.1rem;
}
.ps-grid { display: grid; gap: 1rem; }
.ps-grid.three { grid-template-columns: repeat(3, minmax(0, 1fr)); }
.ps-hero { padding: 2.4rem 0 1rem; max-width: 640px; }
.ps-hero h1 { margin: 0 0 0.7rem; font-size: 2rem; line-height: 1.2; }
.ps-hero-actions { margin-top: 1.1rem; }
.ps-btn {
  appearance: none;
  border: 1px solid rgba(112, 134, 170, 0.4);
  border-radius: 10px;
  background: rgba(20, 29, 45, 0.9);
  color: #e3f4ec;
  padding: 0.48rem 0.78rem;
  font-size: 0.9rem;
  text-decoration: none;
  cursor: pointer;
}
.ps-btn:hover { border-color: rgba(110, 219, 180, 0.6); }
.ps-btn.primary { background: linear-gradient(180deg, #1d8a66 0%, #11604a 100%); border-color: rgba(99, 227, 183, 0.55); }
.ps-btn.subtle { background: rgba(20, 29, 45, 0.4); }
.ps-muted { color: var(--muted); line-height: 1.55; }
.ps-notice {
  border: 1px solid rgba(79, 209, 165, 0.45);
  background: rgba(17, 59, 47, 0.45);
  border-radius: 10px;
  padding: 0.6rem 0.72rem;
}
.ps-notice.error {
  border-color: rgba(255, 117, 137, 0.52);
  background: rgba(117, 24, 42, 0.32);
  color: #ffdce3;
}
.ps-project-items { list-style: none; padding: 0; margin: 0.8rem 0 0; display: grid; gap: 0.45rem; }
.ps-project-link {
  display: grid;
  gap: 0.15rem;
  text-decoration: none;
  color: #dcebe4;
  padding: 0.55rem 0.62rem;
  border: 1px solid rgba(125, 151, 194, 0.3);
  border-radius: 10px;
  background: rgba(13, 23, 36, 0.6);
}
.ps-project-link:hover { border-color: rgba(104, 214, 175, 0.6); }
.ps-project-name { font-weight: 600; }
.ps-project-meta { font-size: 0.78rem; color: var(--muted); }
.ps-endpoint { margin: 0.9rem 0; }
.ps-endpoint h2 { margin: 0 0 0.4rem; font-size: 0.95rem; color: var(--muted); text-transform: uppercase; letter-spacing: 0.05em; }
.ps-endpoint-url {
  color: var(--accent);
  font-family: ui-monospace, SFMono-Regular, Menlo, monospace;
  word-break: break-all;
}
.ps-env-table { width: 100%; border-collapse: collapse; margin-top: 0.6rem; }
.ps-env-table th {
  text-align: left;
  color: var(--muted);
  font-size: 0.78rem;
  text-transform: uppercase;
  letter-spacing: 0.05em;
  padding: 0.4rem 0.5rem;
  border-bottom: 1px solid var(--panel-border);
}
.ps-env-table td { padding: 0.45rem 0.5rem; border-bottom: 1px solid rgba(124, 144, 176, 0.14); }
.ps-status-page h1 { margin-top: 0; }
@media (max-width: 880px) {
  .ps-topbar { grid-template-columns: 1fr; }
  .ps-grid.three { grid-template-columns: 1fr; }
}
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: WebBody) -> WebPage {
        WebPage {
            title: "Test".to_string(),
            path: "/".to_string(),
            session: None,
            body,
        }
    }

    #[test]
    fn auth_error_messages_are_distinct_for_recognized_codes() {
        let configuration = auth_error_message(Some("Configuration"));
        let access_denied = auth_error_message(Some("AccessDenied"));
        let verification = auth_error_message(Some("Verification"));
        let default = auth_error_message(None);

        let all = [configuration, access_denied, verification, default];
        for (index, left) in all.iter().enumerate() {
            for right in all.iter().skip(index + 1) {
                assert_ne!(left, right);
            }
        }
    }

    #[test]
    fn unrecognized_and_missing_codes_share_the_default_message() {
        assert_eq!(auth_error_message(Some("bogus")), auth_error_message(None));
        assert_eq!(auth_error_message(Some("")), auth_error_message(None));
        // Lookup is case-sensitive; a near-miss is still unrecognized.
        assert_eq!(
            auth_error_message(Some("configuration")),
            auth_error_message(None)
        );
    }

    #[test]
    fn auth_error_message_is_pure() {
        assert_eq!(
            auth_error_message(Some("Verification")),
            auth_error_message(Some("Verification"))
        );
    }

    #[test]
    fn auth_error_page_renders_the_mapped_message() {
        let html = render_page(&page(WebBody::AuthError {
            code: Some("AccessDenied".to_string()),
        }));
        assert!(html.contains("You do not have permission to sign in."));
    }

    #[test]
    fn home_page_offers_sign_in_when_anonymous() {
        let html = render_page(&page(WebBody::Home));
        assert!(html.contains("href=\"/login\""));
        assert!(html.contains("Portside"));
    }

    #[test]
    fn topbar_shows_session_and_sign_out_when_authenticated() {
        let mut with_session = page(WebBody::Home);
        with_session.session = Some(SessionView {
            user_id: "user_alice".to_string(),
        });

        let html = render_page(&with_session);
        assert!(html.contains("user_alice"));
        assert!(html.contains("action=\"/logout\""));
    }

    #[test]
    fn overview_flags_a_synthesized_endpoint() {
        let html = render_page(&page(WebBody::ProjectOverview {
            project: ProjectView {
                id: "proj_1".to_string(),
                name: "api".to_string(),
                created_at: "2026-08-01".to_string(),
            },
            endpoint: EndpointView {
                url: "https://sandbox-proj_1.sandboxes.portside.test".to_string(),
                synthesized: true,
            },
            sandbox_count: 0,
        }));
        assert!(html.contains("has not reported its address yet"));
        assert!(html.contains("https://sandbox-proj_1.sandboxes.portside.test"));
    }

    #[test]
    fn settings_table_passes_environment_values_through_unchanged() {
        let html = render_page(&page(WebBody::ProjectSettings {
            project: ProjectView {
                id: "proj_1".to_string(),
                name: "api".to_string(),
                created_at: "2026-08-01".to_string(),
            },
            endpoint: EndpointView {
                url: "https://api.portside.dev".to_string(),
                synthesized: false,
            },
            environments: vec![EnvVarView {
                key: "DATABASE_URL".to_string(),
                value: "postgres://db.internal:5432/app".to_string(),
            }],
        }));
        assert!(html.contains("DATABASE_URL"));
        assert!(html.contains("postgres://db.internal:5432/app"));
    }
}
