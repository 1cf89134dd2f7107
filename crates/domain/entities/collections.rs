use uuid::Uuid;

/// A collection joined with its site and integration, resolved once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionViewEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub external_collection_id: String,
    pub external_site_id: String,
    pub integration_id: Uuid,
    pub url_base: Option<String>,
}

impl CollectionViewEntity {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Public URL of an item page, when both the base URL and slug are known.
    pub fn item_url(&self, slug: Option<&str>) -> Option<String> {
        let base = self.url_base.as_deref()?.trim_end_matches('/');
        let slug = slug?.trim_matches('/');
        if base.is_empty() || slug.is_empty() {
            return None;
        }
        Some(format!("{base}/{slug}"))
    }
}
