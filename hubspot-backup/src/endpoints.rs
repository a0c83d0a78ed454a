//! The HubSpot collections included in a backup.

use crate::pagination::{Endpoint, Strategy};

const CATALOG: &[(&str, &str, Strategy)] = &[
    ("lists", "/contacts/v1/lists", Strategy::HasMore),
    ("blogs", "/content/api/v2/blogs", Strategy::Once),
    ("blog-posts", "/content/api/v2/blog-posts", Strategy::Limit),
    ("blog-authors", "/blogs/v3/blog-authors", Strategy::Limit),
    ("blog-topics", "/blogs/v3/topics", Strategy::Limit),
    ("blog-comments", "/comments/v3/comments", Strategy::Limit),
    ("layouts", "/content/api/v2/layouts", Strategy::Limit),
    ("pages", "/content/api/v2/pages", Strategy::Limit),
    ("hubdb-tables", "/hubdb/api/v2/tables", Strategy::Once),
    ("templates", "/content/api/v2/templates", Strategy::Limit),
    ("url-mappings", "/url-mappings/v3/url-mappings", Strategy::Limit),
    ("deals", "/deals/v1/deal/paged", Strategy::HasMore),
    ("marketing-emails", "/marketing-emails/v1/emails", Strategy::Limit),
    ("workflows", "/automation/v3/workflows", Strategy::Once),
    ("companies", "/companies/v2/companies/paged", Strategy::HasMore),
    ("contacts", "/contacts/v1/lists/all/contacts/all", Strategy::Contacts),
];

/// Every backed-up endpoint, rooted at `base_url`
pub fn default_endpoints(base_url: &str) -> Vec<Endpoint> {
    let base = base_url.trim_end_matches('/');
    CATALOG
        .iter()
        .map(|(name, path, strategy)| Endpoint::new(*name, format!("{}{}", base, path), *strategy))
        .collect()
}
