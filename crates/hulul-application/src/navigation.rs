//! Dashboard navigation: routes, sidebar items and sign-out.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::session_store::{SessionStore, SignOutOutcome};

/// External contact link for the support team.
pub const WHATSAPP_SUPPORT_URL: &str = "https://wa.me/hulul";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Dashboard,
    Company,
    Documents,
    Transactions,
    Support,
    Settings,
}

impl Route {
    pub const ALL: [Route; 6] = [
        Route::Dashboard,
        Route::Company,
        Route::Documents,
        Route::Transactions,
        Route::Support,
        Route::Settings,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Dashboard => "/dashboard",
            Route::Company => "/dashboard/company",
            Route::Documents => "/dashboard/documents",
            Route::Transactions => "/dashboard/transactions",
            Route::Support => "/dashboard/support",
            Route::Settings => "/dashboard/settings",
        }
    }

    /// Sidebar label as shown in the dashboard.
    pub fn label(&self) -> &'static str {
        match self {
            Route::Dashboard => "الرئيسية",
            Route::Company => "شركتي",
            Route::Documents => "المستندات",
            Route::Transactions => "تتبع المعاملات",
            Route::Support => "الدعم الفني",
            Route::Settings => "الإعدادات",
        }
    }

    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.trim_end_matches('/');
        Route::ALL.into_iter().find(|route| route.path() == path)
    }

    /// Path to one ticket's thread under the support section.
    pub fn ticket_thread(ticket_id: &str) -> String {
        format!("{}/{}", Route::Support.path(), ticket_id)
    }

    /// Whether this route's link is highlighted at `current_path`.
    ///
    /// A link is active on its own path and on every path nested below it.
    pub fn is_active(&self, current_path: &str) -> bool {
        let current = current_path.trim_end_matches('/');
        current == self.path()
            || current
                .strip_prefix(self.path())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub route: Route,
    pub path: &'static str,
    pub label: &'static str,
    pub active: bool,
}

/// The dashboard sidebar.
pub struct Sidebar {
    store: Arc<SessionStore>,
}

impl Sidebar {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    /// Navigation items, marked active relative to `current_path`.
    pub fn items(&self, current_path: &str) -> Vec<NavItem> {
        Route::ALL
            .into_iter()
            .map(|route| NavItem {
                route,
                path: route.path(),
                label: route.label(),
                active: route.is_active(current_path),
            })
            .collect()
    }

    pub fn contact_link(&self) -> &'static str {
        WHATSAPP_SUPPORT_URL
    }

    /// Signs out through the session store. The outcome's route is always the login route.
    pub async fn sign_out(&self) -> SignOutOutcome {
        self.store.sign_out().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_round_trip() {
        for route in Route::ALL {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
        assert_eq!(Route::from_path("/dashboard/support/"), Some(Route::Support));
        assert_eq!(Route::from_path("/admin"), None);
    }

    #[test]
    fn test_nested_paths_keep_parent_active() {
        let thread = Route::ticket_thread("T1");
        assert_eq!(thread, "/dashboard/support/T1");
        assert!(Route::Support.is_active(&thread));
        assert!(Route::Dashboard.is_active(&thread));
        assert!(!Route::Settings.is_active(&thread));
        assert!(!Route::Support.is_active("/dashboard/supportx"));
    }
}
