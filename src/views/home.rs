use anyhow::{bail, Result};
use tracing::{error, info, warn};

use crate::models::{Deal, FileInfo};
use crate::services::{auth, deals};
use crate::session::{Notifier, Route, SessionContext};
use crate::views::{deal_card, format};

/// Where the displayed deals came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealsSource {
    Live,
    Cached,
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DealsState {
    Loading,
    Ready { deals: Vec<Deal>, source: DealsSource },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilesState {
    Loading,
    Ready(Vec<FileInfo>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileModal {
    pub deal: Deal,
    pub files: FilesState,
}

pub struct HomePage<'a, N: Notifier> {
    ctx: &'a SessionContext<N>,
    deals: DealsState,
    refreshing: bool,
    modal: Option<FileModal>,
    route: Route,
    /// Command the user types to open a deal, shown on every card.
    action: String,
}

impl<'a, N: Notifier> HomePage<'a, N> {
    pub fn new(ctx: &'a SessionContext<N>) -> Self {
        Self {
            ctx,
            deals: DealsState::Loading,
            refreshing: false,
            modal: None,
            route: Route::Home,
            action: "files".to_string(),
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn deals_state(&self) -> &DealsState {
        &self.deals
    }

    pub fn deals(&self) -> &[Deal] {
        match &self.deals {
            DealsState::Ready { deals, .. } => deals,
            DealsState::Loading => &[],
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn modal(&self) -> Option<&FileModal> {
        self.modal.as_ref()
    }

    /// Without a session go straight to login; otherwise load deals,
    /// falling back to the cached list when the backend is unavailable.
    pub async fn mount(&mut self) -> Route {
        if !self.ctx.is_authenticated() {
            self.route = Route::Login;
            return self.route;
        }

        self.deals = DealsState::Loading;
        let result = deals::list_deals(self.ctx).await;
        self.deals = match result {
            Ok(response) => {
                self.cache(&response.deals);
                DealsState::Ready {
                    deals: response.deals,
                    source: DealsSource::Live,
                }
            }
            Err(e) => {
                error!(error = %e, "error loading initial deals");
                self.fallback()
            }
        };

        self.follow_redirect()
    }

    fn fallback(&self) -> DealsState {
        let site = self.ctx.stored_site().unwrap_or_default();
        match self.ctx.store().cached_deals(site) {
            Ok(Some(deals)) => {
                info!(count = deals.len(), "loaded deals from cache as fallback");
                DealsState::Ready {
                    deals,
                    source: DealsSource::Cached,
                }
            }
            Ok(None) => DealsState::Ready {
                deals: Vec::new(),
                source: DealsSource::Empty,
            },
            Err(e) => {
                error!(error = %e, "error reading cached deals");
                DealsState::Ready {
                    deals: Vec::new(),
                    source: DealsSource::Empty,
                }
            }
        }
    }

    fn cache(&self, deals: &[Deal]) {
        let site = self.ctx.stored_site().unwrap_or_default();
        if let Err(e) = self.ctx.store().cache_deals(site, deals) {
            warn!(error = %e, "failed to cache deals");
        }
    }

    /// Fetch again. A failure keeps whatever is on screen.
    pub async fn refresh(&mut self) -> Route {
        if !self.ctx.is_authenticated() {
            return self.route;
        }

        self.refreshing = true;
        let result = deals::list_deals(self.ctx).await;
        match result {
            Ok(response) => {
                self.cache(&response.deals);
                self.deals = DealsState::Ready {
                    deals: response.deals,
                    source: DealsSource::Live,
                };
            }
            Err(e) => error!(error = %e, "error refreshing deals"),
        }
        self.refreshing = false;

        self.follow_redirect()
    }

    /// Open the files modal for a deal on screen. File errors are logged
    /// and shown as an empty list.
    pub async fn open_deal(&mut self, deal_id: i64) -> Result<Route> {
        let deal = match self.deals().iter().find(|d| d.id == deal_id) {
            Some(d) => d.clone(),
            None => bail!("Deal #{} not found", deal_id),
        };

        self.modal = Some(FileModal {
            deal,
            files: FilesState::Loading,
        });

        let result = deals::list_files(self.ctx, deal_id).await;
        let files = match result {
            Ok(response) => match response.error {
                Some(e) => {
                    error!(deal_id, error = %e, "error fetching files");
                    Vec::new()
                }
                None => response.files,
            },
            Err(e) => {
                error!(deal_id, error = %e, "error fetching deal files");
                Vec::new()
            }
        };
        if let Some(modal) = self.modal.as_mut() {
            modal.files = FilesState::Ready(files);
        }

        Ok(self.follow_redirect())
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
    }

    pub fn logout(&mut self) -> Route {
        auth::logout(self.ctx);
        self.modal = None;
        self.route = Route::Login;
        self.route
    }

    fn follow_redirect(&mut self) -> Route {
        if let Some(route) = self.ctx.take_redirect() {
            self.route = route;
        }
        if self.route == Route::Login {
            self.modal = None;
        }
        self.route
    }

    pub fn render(&self) -> String {
        let mut lines = vec!["Altius Capital Dashboard".to_string(), "=".repeat(60)];

        let deals = match &self.deals {
            DealsState::Loading => {
                lines.push("Loading your deals...".to_string());
                return format::block(&lines);
            }
            DealsState::Ready { deals, .. } => deals,
        };

        let count = if deals.len() == 1 { "Deal" } else { "Deals" };
        lines.push(format!("Your Available Deals ({} {})", deals.len(), count));
        if self.refreshing {
            lines.push("Refreshing...".to_string());
        }
        lines.push(String::new());

        if deals.is_empty() {
            lines.push("No deals available".to_string());
            lines.push(
                "Check back later for new investment opportunities or contact your account manager for more information."
                    .to_string(),
            );
            lines.push(String::new());
        } else {
            for deal in deals {
                lines.push(deal_card::render(deal, &self.action));
            }
        }

        let site = self.ctx.stored_site().unwrap_or_default();
        lines.push("Session Information".to_string());
        lines.push("  Status:  Authenticated".to_string());
        lines.push(format!("  Website: {}", site.as_str().to_uppercase()));
        lines.push(format!("  Token:   {}", self.ctx.stored_token().unwrap_or_default()));
        format::block(&lines)
    }

    pub fn render_modal(&self) -> Option<String> {
        let modal = self.modal.as_ref()?;
        let deal = &modal.deal;

        let heading = if deal.title.trim().is_empty() {
            "Deal Details"
        } else {
            deal.title.as_str()
        };
        let mut lines = vec![
            heading.to_string(),
            "-".repeat(60),
            "Deal Information".to_string(),
            format!("  ID:          {}", deal.id),
            format!("  Status:      {}", deal.deal_status),
            format!("  Asset Class: {}", deal.asset_class),
            format!("  Currency:    {}", deal.currency),
            format!("  Firm:        {}", format::or_na(&deal.firm)),
            format!("  Created:     {}", format::date(&deal.created_at)),
            String::new(),
            "Available Files".to_string(),
        ];

        match &modal.files {
            FilesState::Loading => lines.push("  Loading files...".to_string()),
            FilesState::Ready(files) if files.is_empty() => {
                lines.push("  No files available for this deal.".to_string());
            }
            FilesState::Ready(files) => {
                for (i, file) in files.iter().enumerate() {
                    lines.push(format!("  {}. {}", i + 1, file.name));
                    lines.push(format!(
                        "     {} \u{2022} {}",
                        file.file_type,
                        format::file_size(file.size)
                    ));
                    lines.push(format!("     Download: {}", file.download_url));
                }
            }
        }
        Some(format::block(&lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::models::{Session, Site};
    use crate::session::{Notice, RecordingNotifier};
    use crate::store::{Store, SESSION_KEYS};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn setup_context(server: &MockServer) -> (SessionContext<RecordingNotifier>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Store::open(&dir.path().join("state.db")).unwrap();
        let api = ApiClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let ctx = SessionContext::new(store, api, RecordingNotifier::default());
        ctx.begin(&Session {
            token: "T1".to_string(),
            site: Site::Fo1,
        })
        .unwrap();
        (ctx, dir)
    }

    fn deal_json(id: i64, title: &str) -> Value {
        json!({
            "id": id,
            "title": title,
            "created_at": "2024-01-15T09:30:00Z",
            "firm": "Acme",
            "asset_class": "Real Estate",
            "deal_status": "active",
            "currency": "USD",
            "user_id": 1,
            "deal_capital_seeker_email": "a@b.com"
        })
    }

    fn deal(id: i64, title: &str) -> Deal {
        serde_json::from_value(deal_json(id, title)).unwrap()
    }

    async fn mock_deals(server: &MockServer, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/deals/list"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    // ==================== Mount ====================

    #[tokio::test]
    async fn test_mount_without_session_goes_to_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let (ctx, _dir) = setup_context(&server);
        ctx.end();

        let mut page = HomePage::new(&ctx);
        assert_eq!(page.mount().await, Route::Login);
        assert_eq!(page.deals_state(), &DealsState::Loading);
    }

    #[tokio::test]
    async fn test_mount_loads_and_caches_deals() {
        let server = MockServer::start().await;
        mock_deals(&server, 200, json!({"deals": [deal_json(1, "A"), deal_json(2, "B")], "total": 2})).await;
        let (ctx, _dir) = setup_context(&server);

        let mut page = HomePage::new(&ctx);
        assert_eq!(page.mount().await, Route::Home);
        assert_eq!(page.deals().len(), 2);
        assert!(matches!(page.deals_state(), DealsState::Ready { source: DealsSource::Live, .. }));
        assert_eq!(ctx.store().cached_deals(Site::Fo1).unwrap().unwrap().len(), 2);
        assert!(page.render().contains("Your Available Deals (2 Deals)"));
    }

    #[tokio::test]
    async fn test_null_optional_fields_still_render() {
        let server = MockServer::start().await;
        let mut raw = deal_json(42, "Fund");
        raw["firm"] = Value::Null;
        raw["currency"] = Value::Null;
        mock_deals(&server, 200, json!({"deals": [raw], "total": 1})).await;
        Mock::given(method("POST"))
            .and(path("/deals/42/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [{
                    "id": 5, "name": "Teaser.pdf", "size": 1024, "url": "u",
                    "type": null, "download_url": "https://files.example/5"
                }],
                "total": 1
            })))
            .mount(&server)
            .await;
        let (ctx, _dir) = setup_context(&server);

        let mut page = HomePage::new(&ctx);
        assert_eq!(page.mount().await, Route::Home);
        assert!(matches!(page.deals_state(), DealsState::Ready { source: DealsSource::Live, .. }));
        assert_eq!(page.deals()[0].firm, "");
        assert_eq!(page.deals()[0].currency, "USD");

        page.open_deal(42).await.unwrap();
        let modal = page.render_modal().unwrap();
        assert!(modal.contains("Firm:        N/A"));
        assert!(modal.contains("1. Teaser.pdf"));
        assert!(ctx.notifier().notices().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_backend_falls_back_to_cache_and_keeps_session() {
        let dir = tempdir().unwrap();
        let store = Store::open(&dir.path().join("state.db")).unwrap();
        let api = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let ctx = SessionContext::new(store, api, RecordingNotifier::default());
        ctx.begin(&Session {
            token: "T1".to_string(),
            site: Site::Fo1,
        })
        .unwrap();
        ctx.store().cache_deals(Site::Fo1, &[deal(3, "Cached")]).unwrap();

        let mut page = HomePage::new(&ctx);
        assert_eq!(page.mount().await, Route::Home);
        assert!(matches!(page.deals_state(), DealsState::Ready { source: DealsSource::Cached, .. }));
        assert_eq!(page.deals()[0].title, "Cached");
        assert!(ctx.is_authenticated());
        assert_eq!(ctx.notifier().notices(), vec![Notice::Network]);
    }

    #[tokio::test]
    async fn test_mount_failure_renders_cached_snapshot() {
        let server = MockServer::start().await;
        mock_deals(&server, 500, json!({"detail": "Error fetching deals: boom"})).await;
        let (ctx, _dir) = setup_context(&server);
        let cached = vec![deal(9, "Cached deal")];
        ctx.store().cache_deals(Site::Fo1, &cached).unwrap();

        let mut page = HomePage::new(&ctx);
        assert_eq!(page.mount().await, Route::Home);
        assert_eq!(page.deals(), cached.as_slice());
        assert!(matches!(page.deals_state(), DealsState::Ready { source: DealsSource::Cached, .. }));
        assert_eq!(
            ctx.notifier().notices(),
            vec![Notice::Server {
                status: 500,
                message: "Error fetching deals: boom".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_mount_failure_without_cache_is_empty() {
        let server = MockServer::start().await;
        mock_deals(&server, 503, json!({})).await;
        let (ctx, _dir) = setup_context(&server);

        let mut page = HomePage::new(&ctx);
        page.mount().await;
        assert!(page.deals().is_empty());
        assert!(matches!(page.deals_state(), DealsState::Ready { source: DealsSource::Empty, .. }));
        let rendered = page.render();
        assert!(rendered.contains("Your Available Deals (0 Deals)"));
        assert!(rendered.contains("No deals available"));
    }

    #[tokio::test]
    async fn test_cache_from_other_site_is_not_trusted() {
        let server = MockServer::start().await;
        mock_deals(&server, 500, json!({})).await;
        let (ctx, _dir) = setup_context(&server);
        ctx.store().cache_deals(Site::Fo2, &[deal(1, "Other site")]).unwrap();

        let mut page = HomePage::new(&ctx);
        page.mount().await;
        assert!(page.deals().is_empty());
    }

    #[tokio::test]
    async fn test_session_conflict_on_mount_redirects_to_login() {
        let server = MockServer::start().await;
        mock_deals(
            &server,
            409,
            json!({"detail": {"error": "SESSION_CONFLICT", "message": "elsewhere"}}),
        )
        .await;
        let (ctx, _dir) = setup_context(&server);
        ctx.store().cache_deals(Site::Fo1, &[deal(1, "A")]).unwrap();

        let mut page = HomePage::new(&ctx);
        assert_eq!(page.mount().await, Route::Login);
        for key in SESSION_KEYS {
            assert_eq!(ctx.store().get(key).unwrap(), None);
        }
        assert_eq!(ctx.notifier().notices(), vec![Notice::SessionConflict]);
    }

    #[tokio::test]
    async fn test_expired_session_on_mount_redirects_to_login() {
        let server = MockServer::start().await;
        mock_deals(&server, 401, json!({"detail": {"error": "UNAUTHORIZED"}})).await;
        let (ctx, _dir) = setup_context(&server);

        let mut page = HomePage::new(&ctx);
        assert_eq!(page.mount().await, Route::Login);
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.notifier().notices(), vec![Notice::SessionExpired]);
    }

    // ==================== Refresh ====================

    #[tokio::test]
    async fn test_refresh_failure_keeps_displayed_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deals/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"deals": [deal_json(1, "Live")], "total": 1})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mock_deals(&server, 500, json!({"detail": "down"})).await;
        let (ctx, _dir) = setup_context(&server);
        ctx.store().cache_deals(Site::Fo1, &[deal(1, "Live"), deal(2, "Stale")]).unwrap();

        let mut page = HomePage::new(&ctx);
        page.mount().await;
        assert_eq!(page.deals().len(), 1);

        assert_eq!(page.refresh().await, Route::Home);
        assert!(!page.is_refreshing());
        assert_eq!(page.deals().len(), 1);
        assert_eq!(page.deals()[0].title, "Live");
        assert!(matches!(page.deals_state(), DealsState::Ready { source: DealsSource::Live, .. }));
    }

    #[tokio::test]
    async fn test_refresh_replaces_list_and_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deals/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"deals": [deal_json(1, "A")], "total": 1})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mock_deals(
            &server,
            200,
            json!({"deals": [deal_json(1, "A"), deal_json(3, "C")], "total": 2}),
        )
        .await;
        let (ctx, _dir) = setup_context(&server);

        let mut page = HomePage::new(&ctx);
        page.mount().await;
        page.refresh().await;

        assert_eq!(page.deals().len(), 2);
        assert_eq!(ctx.store().cached_deals(Site::Fo1).unwrap().unwrap().len(), 2);
        assert!(page.render().contains("(2 Deals)"));
    }

    // ==================== Files modal ====================

    #[tokio::test]
    async fn test_open_deal_lists_files() {
        let server = MockServer::start().await;
        mock_deals(&server, 200, json!({"deals": [deal_json(42, "Fund")], "total": 1})).await;
        Mock::given(method("POST"))
            .and(path("/deals/42/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [{
                    "id": 5, "name": "Teaser.pdf", "size": 1536, "url": "u",
                    "type": "pdf", "download_url": "https://files.example/5"
                }],
                "total": 1
            })))
            .mount(&server)
            .await;
        let (ctx, _dir) = setup_context(&server);

        let mut page = HomePage::new(&ctx);
        page.mount().await;
        assert_eq!(page.open_deal(42).await.unwrap(), Route::Home);

        let modal = page.render_modal().unwrap();
        assert!(modal.starts_with("Fund"));
        assert!(modal.contains("1. Teaser.pdf"));
        assert!(modal.contains("pdf \u{2022} 1.5 KB"));
        assert!(modal.contains("Download: https://files.example/5"));

        page.close_modal();
        assert!(page.modal().is_none());
        assert!(page.render_modal().is_none());
    }

    #[tokio::test]
    async fn test_files_payload_error_renders_empty_state_without_notice() {
        let server = MockServer::start().await;
        mock_deals(&server, 200, json!({"deals": [deal_json(42, "Fund")], "total": 1})).await;
        Mock::given(method("POST"))
            .and(path("/deals/42/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [], "total": 0, "error": "backend timeout"
            })))
            .mount(&server)
            .await;
        let (ctx, _dir) = setup_context(&server);

        let mut page = HomePage::new(&ctx);
        page.mount().await;
        page.open_deal(42).await.unwrap();

        assert_eq!(page.modal().unwrap().files, FilesState::Ready(vec![]));
        assert!(page
            .render_modal()
            .unwrap()
            .contains("No files available for this deal."));
        assert!(ctx.notifier().notices().is_empty());
    }

    #[tokio::test]
    async fn test_open_unknown_deal_fails() {
        let server = MockServer::start().await;
        mock_deals(&server, 200, json!({"deals": [], "total": 0})).await;
        let (ctx, _dir) = setup_context(&server);

        let mut page = HomePage::new(&ctx);
        page.mount().await;
        let err = page.open_deal(7).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(page.modal().is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_state_and_goes_to_login() {
        let server = MockServer::start().await;
        mock_deals(&server, 200, json!({"deals": [deal_json(1, "A")], "total": 1})).await;
        let (ctx, _dir) = setup_context(&server);

        let mut page = HomePage::new(&ctx);
        page.mount().await;
        assert_eq!(page.logout(), Route::Login);
        for key in SESSION_KEYS {
            assert_eq!(ctx.store().get(key).unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_render_shows_session_panel() {
        let server = MockServer::start().await;
        mock_deals(&server, 200, json!({"deals": [deal_json(1, "A")], "total": 1})).await;
        let (ctx, _dir) = setup_context(&server);

        let mut page = HomePage::new(&ctx).with_action("v");
        page.mount().await;
        let rendered = page.render();
        assert!(rendered.contains("(1 Deal)"));
        assert!(rendered.contains("View Details: v 1"));
        assert!(rendered.contains("Website: FO1"));
        assert!(rendered.contains("Token:   T1"));
    }
}
