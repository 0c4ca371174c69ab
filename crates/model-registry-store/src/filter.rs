//! Query filters for registry lookups

use model_registry_core::EntityStatus;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Parse a `sort` query value, anything other than `desc` is ascending
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("desc") {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }
}

/// Pagination window, `limit == None` means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Pagination {
    pub fn new(limit: Option<usize>, offset: usize) -> Self {
        Self { limit, offset }
    }

    /// Apply the window to a fully sorted result set
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

/// Filter for model lookups
///
/// Name matching is exact unless `greedy` is set, in which case it is a
/// case-insensitive substring match.
#[derive(Debug, Clone, Default)]
pub struct ModelFilter {
    pub id: Option<String>,
    pub name: Option<String>,
    pub display_name: Option<String>,
    /// Content version of the model
    pub version: Option<String>,
    pub registrant: Option<String>,
    pub category: Option<String>,
    pub status: Option<EntityStatus>,
    /// Free text matched against name and display name
    pub search: Option<String>,
    pub greedy: bool,
    /// Inline the model's components
    pub components: bool,
    /// Inline the model's relationships
    pub relationships: bool,
    /// Field to order on: `name`, `displayName` or `version`
    pub order_on: Option<String>,
    pub sort: SortOrder,
    pub pagination: Pagination,
}

impl ModelFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn registrant(mut self, registrant: impl Into<String>) -> Self {
        self.registrant = Some(registrant.into());
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn greedy(mut self, greedy: bool) -> Self {
        self.greedy = greedy;
        self
    }

    pub fn with_components(mut self, include: bool) -> Self {
        self.components = include;
        self
    }

    pub fn with_relationships(mut self, include: bool) -> Self {
        self.relationships = include;
        self
    }

    pub fn order_on(mut self, field: impl Into<String>, sort: SortOrder) -> Self {
        self.order_on = Some(field.into());
        self.sort = sort;
        self
    }

    pub fn paginate(mut self, limit: Option<usize>, offset: usize) -> Self {
        self.pagination = Pagination::new(limit, offset);
        self
    }
}

/// Filter for component lookups
#[derive(Debug, Clone, Default)]
pub struct ComponentFilter {
    pub id: Option<String>,
    /// Component kind
    pub name: Option<String>,
    pub model_name: Option<String>,
    /// Resource API version
    pub api_version: Option<String>,
    pub greedy: bool,
    pub pagination: Pagination,
}

impl ComponentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    pub fn greedy(mut self, greedy: bool) -> Self {
        self.greedy = greedy;
        self
    }
}

/// Filter passed to `RegistryManager::get_entities`
#[derive(Debug, Clone)]
pub enum EntityFilter {
    Model(ModelFilter),
    Component(ComponentFilter),
}

impl From<ModelFilter> for EntityFilter {
    fn from(filter: ModelFilter) -> Self {
        EntityFilter::Model(filter)
    }
}

impl From<ComponentFilter> for EntityFilter {
    fn from(filter: ComponentFilter) -> Self {
        EntityFilter::Component(filter)
    }
}

/// Filter for registrant listings
#[derive(Debug, Clone, Default)]
pub struct RegistrantFilter {
    /// Case-insensitive substring of the registrant kind
    pub search: Option<String>,
    pub sort: SortOrder,
    pub pagination: Pagination,
}

/// Match `candidate` against a wanted value, exact or greedy
pub(crate) fn matches_text(wanted: &Option<String>, candidate: &str, greedy: bool) -> bool {
    match wanted {
        None => true,
        Some(w) if w.is_empty() => true,
        Some(w) if greedy => candidate.to_lowercase().contains(&w.to_lowercase()),
        Some(w) => candidate.eq_ignore_ascii_case(w),
    }
}
