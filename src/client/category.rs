//! Category hierarchy client
//!
//! Reads categories and their members through the MediaWiki action API and
//! resolves member pages to the slug the pageviews API expects.

use crate::client::{ClientError, ClientResult};
use crate::config::SourceConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

/// MediaWiki namespace number of category pages
pub const CATEGORY_NAMESPACE: i64 = 14;

/// A category and its ordered members
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub title: String,
    pub members: Vec<CategoryMember>,
}

impl Category {
    pub fn member(&self, title: &str) -> Option<&CategoryMember> {
        self.members.iter().find(|m| m.title == title)
    }

    /// Returns true if `title` is listed as a nested category of this one
    pub fn contains_subcategory(&self, title: &str) -> bool {
        self.member(title)
            .map(|m| m.kind() == MemberKind::Subcategory)
            .unwrap_or(false)
    }
}

/// Whether a member is a nested category or a leaf page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Subcategory,
    Page,
}

/// One child of a category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMember {
    pub title: String,
    pub namespace: i64,
}

impl CategoryMember {
    pub fn page(title: &str) -> Self {
        Self {
            title: title.to_string(),
            namespace: 0,
        }
    }

    pub fn subcategory(title: &str) -> Self {
        Self {
            title: title.to_string(),
            namespace: CATEGORY_NAMESPACE,
        }
    }

    pub fn kind(&self) -> MemberKind {
        if self.namespace == CATEGORY_NAMESPACE {
            MemberKind::Subcategory
        } else {
            MemberKind::Page
        }
    }
}

/// Outcome of resolving a member to its canonical identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(String),
    /// The page has no resolvable identifier (removed or renamed upstream)
    Unresolvable,
}

/// Read-only access to the category hierarchy
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetches a category and all of its members, `None` if it does not exist
    async fn fetch_category(&self, title: &str) -> ClientResult<Option<Category>>;

    /// Resolves a leaf member to the slug used by the metrics API
    async fn resolve_canonical_id(&self, member: &CategoryMember) -> ClientResult<Resolution>;
}

/// Derives a slug from a page's full URL
///
/// Strips `prefix` when present, otherwise takes everything after `/wiki/`
/// in the URL path. Titles may contain `/`, so the slug can span segments.
pub fn slug_from_full_url(full_url: &str, prefix: &str) -> Option<String> {
    let slug = match full_url.strip_prefix(prefix) {
        Some(rest) => rest.to_string(),
        None => {
            let url = Url::parse(full_url).ok()?;
            let (_, rest) = url.path().split_once("/wiki/")?;
            rest.to_string()
        }
    };
    (!slug.is_empty()).then_some(slug)
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    error: Option<ApiErrorBody>,
    #[serde(rename = "continue", default)]
    continuation: Option<HashMap<String, String>>,
    #[serde(default)]
    query: QueryBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Default, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: Vec<PageInfo>,
    #[serde(default)]
    categorymembers: Vec<MemberInfo>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    fullurl: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MemberInfo {
    ns: i64,
    title: String,
}

/// `ContentSource` backed by the MediaWiki action API
#[derive(Debug, Clone)]
pub struct MediaWikiClient {
    client: Client,
    api_url: String,
    article_url_prefix: String,
}

impl MediaWikiClient {
    pub fn new(client: Client, source: &SourceConfig) -> Self {
        Self {
            client,
            api_url: source.wiki_api_url.clone(),
            article_url_prefix: source.article_url_prefix.clone(),
        }
    }

    async fn query(&self, params: &[(&str, &str)]) -> ClientResult<QueryResponse> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[("action", "query"), ("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await
            .map_err(|e| ClientError::from_transport(&self.api_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::from_status(&self.api_url, status));
        }

        let body = response
            .json::<QueryResponse>()
            .await
            .map_err(|e| ClientError::Decode {
                url: self.api_url.clone(),
                message: e.to_string(),
            })?;

        // maxlag, ratelimited and friends arrive as HTTP 200
        if let Some(error) = body.error {
            tracing::debug!("MediaWiki API error {}: {}", error.code, error.info);
            return Err(ClientError::Api {
                url: self.api_url.clone(),
                code: error.code,
                info: error.info,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl ContentSource for MediaWikiClient {
    async fn fetch_category(&self, title: &str) -> ClientResult<Option<Category>> {
        let mut members = Vec::new();
        let mut continuation: Option<HashMap<String, String>> = None;

        loop {
            let response = {
                let mut params: Vec<(&str, &str)> = vec![
                    ("list", "categorymembers"),
                    ("cmtitle", title),
                    ("cmlimit", "max"),
                ];
                match &continuation {
                    // Only the first page asks about the category itself
                    None => params.push(("titles", title)),
                    Some(values) => {
                        params.extend(values.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                    }
                }
                self.query(&params).await?
            };

            // A category without a description page can still have members
            if continuation.is_none() && response.query.categorymembers.is_empty() {
                if let Some(page) = response.query.pages.first() {
                    if page.missing || page.invalid {
                        return Ok(None);
                    }
                }
            }

            members.extend(response.query.categorymembers.into_iter().map(|m| CategoryMember {
                title: m.title,
                namespace: m.ns,
            }));

            match response.continuation {
                Some(next) if !next.is_empty() => continuation = Some(next),
                _ => break,
            }
        }

        tracing::debug!("Fetched {} members of {}", members.len(), title);
        Ok(Some(Category {
            title: title.to_string(),
            members,
        }))
    }

    async fn resolve_canonical_id(&self, member: &CategoryMember) -> ClientResult<Resolution> {
        let response = self
            .query(&[("prop", "info"), ("inprop", "url"), ("titles", &member.title)])
            .await?;
        let full_url = response
            .query
            .pages
            .into_iter()
            .next()
            .filter(|page| !page.missing && !page.invalid)
            .and_then(|page| page.fullurl);

        Ok(full_url
            .and_then(|url| slug_from_full_url(&url, &self.article_url_prefix))
            .map(Resolution::Resolved)
            .unwrap_or(Resolution::Unresolvable))
    }
}
