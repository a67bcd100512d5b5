//! Preview tab reconciliation.
//!
//! The browser's tab API is an external capability, abstracted as
//! [`TabManager`]. On every reload the preview tab is looked up again by
//! URL; nothing is cached between reloads.

use thiserror::Error;
use url::Url;

/// A browser tab as reported by the tab capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabHandle {
    pub id: u64,
    pub window_id: u64,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum TabError {
    #[error("tab {0} no longer exists")]
    Gone(u64),

    #[error("browser refused tab operation: {0}")]
    Browser(String),
}

/// Minimal tab API needed by the agent.
pub trait TabManager: Send {
    /// All open tabs.
    fn query(&mut self) -> Result<Vec<TabHandle>, TabError>;
    /// Navigate a tab, optionally activating it.
    fn update(&mut self, id: u64, url: &str, active: bool) -> Result<TabHandle, TabError>;
    /// Open a new tab.
    fn create(&mut self, url: &str) -> Result<TabHandle, TabError>;
    /// Bring a window to the front.
    fn focus_window(&mut self, window_id: u64) -> Result<(), TabError>;
}

/// What a reload did to the tabs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    Reused(TabHandle),
    Created(TabHandle),
}

/// Whether `candidate` shows the view endpoint.
///
/// Compares origin and path prefix, ignoring query and fragment. The
/// prefix must end at a path boundary (`/view` matches `/view/` but not
/// `/viewer`).
pub fn matches_view(view: &Url, candidate: &str) -> bool {
    let Ok(candidate) = Url::parse(candidate) else {
        return false;
    };
    if candidate.scheme() != view.scheme()
        || candidate.host_str() != view.host_str()
        || candidate.port_or_known_default() != view.port_or_known_default()
    {
        return false;
    }
    let prefix = view.path().trim_end_matches('/');
    candidate
        .path()
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// The view URL with a fresh `t=<millis>` cache-buster.
pub fn cache_bust(view: &Url, millis: u128) -> Url {
    let mut url = view.clone();
    url.set_fragment(None);
    let kept: Vec<(String, String)> = view
        .query_pairs()
        .filter(|(k, _)| k != "t")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("t", &millis.to_string());
    url
}

/// Point an existing preview tab at a fresh URL, or open one.
pub fn reconcile<T: TabManager + ?Sized>(
    tabs: &mut T,
    view: &Url,
    millis: u128,
) -> Result<Reconciled, TabError> {
    let existing = tabs
        .query()?
        .into_iter()
        .find(|tab| matches_view(view, &tab.url));

    if let Some(tab) = existing {
        let target = cache_bust(view, millis);
        match tabs.update(tab.id, target.as_str(), true) {
            Ok(updated) => {
                tabs.focus_window(updated.window_id)?;
                return Ok(Reconciled::Reused(updated));
            }
            // Closed between query and update
            Err(TabError::Gone(id)) => crate::debug!("agent"; "tab {} vanished, opening a new one", id),
            Err(e) => return Err(e),
        }
    }

    tabs.create(view.as_str()).map(Reconciled::Created)
}
