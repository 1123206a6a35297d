use super::catalog::{Catalog, NavItem};
use super::route::{matches_prefix, normalize_path, ROOT};
use crate::auth::AccessProfile;

/// Outcome of running the gate for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Render the requested page.
    Allow,
    /// Replace the current location with this path.
    RedirectTo(String),
    /// Nothing in the catalog is reachable for this session.
    AccessDenied,
}

/// Filters the catalog for a session and judges paths against the result.
#[derive(Debug, Clone, Copy)]
pub struct AccessGate<'a> {
    catalog: &'a Catalog,
}

impl<'a> AccessGate<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Items the session may see. Owners get the whole catalog; everyone
    /// else gets ungated items plus those whose permission they hold.
    /// Sub-items are never filtered on their own.
    pub fn permitted(&self, profile: &AccessProfile) -> PermittedSet<'a> {
        let items = self
            .catalog
            .items()
            .iter()
            .filter(|item| match &item.required_permission {
                None => true,
                Some(permission) => profile.allows(permission),
            })
            .collect();

        PermittedSet {
            items,
            owner: profile.is_owner(),
        }
    }

    pub fn decide(&self, profile: &AccessProfile, path: &str) -> GateDecision {
        if profile.is_owner() {
            return GateDecision::Allow;
        }

        let permitted = self.permitted(profile);
        if permitted.is_allowed(path) {
            return GateDecision::Allow;
        }

        match permitted.redirect_target() {
            Some(target) => GateDecision::RedirectTo(target.to_string()),
            None => GateDecision::AccessDenied,
        }
    }
}

/// The catalog as one session sees it, in catalog order.
#[derive(Debug, Clone)]
pub struct PermittedSet<'a> {
    items: Vec<&'a NavItem>,
    owner: bool,
}

impl<'a> PermittedSet<'a> {
    pub fn items(&self) -> &[&'a NavItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Flattened route prefixes: sub-item paths for groups, own path otherwise.
    pub fn allow_list(&self) -> Vec<&'a str> {
        self.items.iter().copied().flat_map(NavItem::routes).collect()
    }

    /// Owners reach everything; others need a matching allow-listed prefix.
    pub fn is_allowed(&self, path: &str) -> bool {
        self.owner
            || self
                .allow_list()
                .iter()
                .any(|prefix| matches_prefix(prefix, path))
    }

    /// Where to send a session that hit a forbidden path.
    ///
    /// The first permitted item's landing route, skipping the root landing
    /// page whenever a concrete section is available.
    pub fn redirect_target(&self) -> Option<&'a str> {
        let mut landings = self.items.iter().copied().filter_map(NavItem::landing_route);
        let first = landings.next()?;

        if normalize_path(first) != ROOT {
            return Some(first);
        }

        landings
            .find(|route| normalize_path(route) != ROOT)
            .or(Some(first))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GateState {
    /// Inputs changed (or nothing seen yet); a decision is pending.
    #[default]
    Evaluating,
    /// The decision for the current path and access profile.
    Settled(GateDecision),
}

/// Per-session gate state machine.
///
/// Re-evaluates when the path or the access profile changes and
/// otherwise hands back the settled decision.
#[derive(Debug, Clone, Default)]
pub struct GateTracker {
    state: GateState,
    last_path: Option<String>,
    last_profile: Option<AccessProfile>,
    evaluations: u64,
}

impl GateTracker {
    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    pub fn observe(&mut self, gate: &AccessGate<'_>, path: &str, profile: &AccessProfile) -> GateDecision {
        let path = normalize_path(path);
        let unchanged = self.last_path.as_deref() == Some(path)
            && self.last_profile.as_ref() == Some(profile);

        if unchanged {
            if let GateState::Settled(decision) = &self.state {
                return decision.clone();
            }
        }

        self.state = GateState::Evaluating;
        let decision = gate.decide(profile, path);
        self.evaluations += 1;

        self.last_path = Some(path.to_string());
        self.last_profile = Some(profile.clone());
        self.state = GateState::Settled(decision.clone());

        decision
    }
}
