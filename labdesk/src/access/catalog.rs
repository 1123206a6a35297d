use super::route::matches_prefix;
use serde::Serialize;
use std::sync::LazyLock;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Icon {
    Dashboard,
    Calendar,
    Package,
    TestTube,
    Tags,
    Users,
    Newspaper,
    Bell,
    UserCircle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubItem {
    pub label: String,
    pub path: String,
}

/// Where a navigation entry leads: a single page or a group of pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavTarget {
    Path(String),
    SubItems(Vec<SubItem>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub label: String,
    pub icon: Icon,
    pub target: NavTarget,
    pub required_permission: Option<String>,
}

impl NavItem {
    pub fn link(label: impl Into<String>, path: impl Into<String>, icon: Icon) -> Self {
        Self {
            label: label.into(),
            icon,
            target: NavTarget::Path(path.into()),
            required_permission: None,
        }
    }

    pub fn group(label: impl Into<String>, icon: Icon, sub_items: &[(&str, &str)]) -> Self {
        Self {
            label: label.into(),
            icon,
            target: NavTarget::SubItems(
                sub_items
                    .iter()
                    .map(|(label, path)| SubItem {
                        label: label.to_string(),
                        path: path.to_string(),
                    })
                    .collect(),
            ),
            required_permission: None,
        }
    }

    pub fn requires(mut self, permission: impl Into<String>) -> Self {
        self.required_permission = Some(permission.into());
        self
    }

    /// Route prefixes this item opens up: every sub-item path, or its own path.
    pub fn routes(&self) -> Vec<&str> {
        match &self.target {
            NavTarget::Path(path) => vec![path.as_str()],
            NavTarget::SubItems(sub_items) => sub_items.iter().map(|s| s.path.as_str()).collect(),
        }
    }

    /// The page a redirect to this item lands on.
    pub fn landing_route(&self) -> Option<&str> {
        self.routes().first().copied()
    }

    /// Label of the page at `path` if it belongs to this item.
    pub fn title_for(&self, path: &str) -> Option<&str> {
        match &self.target {
            NavTarget::Path(own) => matches_prefix(own, path).then_some(self.label.as_str()),
            NavTarget::SubItems(sub_items) => sub_items
                .iter()
                .filter(|s| matches_prefix(&s.path, path))
                // Longest match wins so /packages/new beats /packages
                .max_by_key(|s| s.path.len())
                .map(|s| s.label.as_str()),
        }
    }
}

/// Ordered, read-only list of navigation items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    items: Vec<NavItem>,
}

impl Catalog {
    pub fn new(items: Vec<NavItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[NavItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find the item owning `path` together with the page title.
    pub fn lookup(&self, path: &str) -> Option<(&NavItem, &str)> {
        self.items
            .iter()
            .find_map(|item| item.title_for(path).map(|title| (item, title)))
    }
}

static LAB_CATALOG: LazyLock<Catalog> = LazyLock::new(|| {
    Catalog::new(vec![
        NavItem::link("Dashboard", "/", Icon::Dashboard),
        NavItem::group(
            "Bookings",
            Icon::Calendar,
            &[("All Bookings", "/bookings"), ("Home Collections", "/home-collections")],
        )
        .requires("manage-booking"),
        NavItem::group(
            "Packages",
            Icon::Package,
            &[("Packages", "/packages"), ("Add Package", "/packages/new")],
        )
        .requires("manage-package"),
        NavItem::group(
            "Tests",
            Icon::TestTube,
            &[("Tests", "/tests"), ("Add Test", "/tests/new")],
        )
        .requires("manage-test"),
        NavItem::link("Categories", "/categories", Icon::Tags).requires("manage-category"),
        NavItem::group(
            "Staff",
            Icon::Users,
            &[("Staff", "/staff"), ("Add Staff", "/staff/new")],
        )
        .requires("manage-staff"),
        NavItem::group(
            "CMS",
            Icon::Newspaper,
            &[
                ("Banners", "/cms/banners"),
                ("Blogs", "/cms/blogs"),
                ("Testimonials", "/cms/testimonials"),
                ("FAQs", "/cms/faqs"),
            ],
        )
        .requires("manage-cms"),
        NavItem::link("Notifications", "/notifications", Icon::Bell).requires("manage-notification"),
        NavItem::link("Profile", "/profile", Icon::UserCircle),
    ])
});

/// The console's navigation, defined once per process.
pub fn default_catalog() -> &'static Catalog {
    &LAB_CATALOG
}
