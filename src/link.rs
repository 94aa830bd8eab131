// link.rs

use crate::error::{DashError, Result};
use crate::id::next_id;
#[cfg(test)]
use crate::storage::load_value;
use crate::storage::{Key, Storage, entry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_FAVICON_SIZE: u32 = 48;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub icon_url: String,
}

/// What the add-link form submits.
#[derive(Debug, Clone, Default)]
pub struct NewLink {
    pub url: String,
    pub name: Option<String>,
    pub icon_url: Option<String>,
}

impl NewLink {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn icon_url<S: Into<String>>(mut self, icon_url: S) -> Self {
        self.icon_url = Some(icon_url.into());
        self
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Prepends `https://` unless the input already carries an http(s) scheme.
pub fn normalize_url(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DashError::validation("Please enter a URL"));
    }
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(raw.to_string())
    } else {
        Ok(format!("https://{}", raw))
    }
}

pub fn favicon_url(url: &str, size: u32) -> String {
    let domain = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string());
    format!("https://www.google.com/s2/favicons?sz={}&domain={}", size, domain)
}

/// Opens the link in the system browser.
pub fn open(url: &str) -> Result<()> {
    info!(url, "opening link");
    open::that_detached(url).map_err(|source| DashError::Launch {
        url: url.to_string(),
        source,
    })
}

pub struct LinkManager<S> {
    store: S,
    links: Vec<Link>,
    favicon_size: u32,
}

impl<S: Storage> LinkManager<S> {
    /// Wraps links that were already fetched, e.g. by the mediator's `getData`.
    pub fn new(store: S, links: Vec<Link>) -> Self {
        Self {
            store,
            links,
            favicon_size: DEFAULT_FAVICON_SIZE,
        }
    }

    #[cfg(test)]
    #[tracing::instrument(skip(store))]
    pub fn load(store: S) -> Result<Self> {
        let links: Vec<Link> = load_value(&store, Key::Hotlinks)?.unwrap_or_default();
        debug!(count = links.len(), "loaded hotlinks");
        Ok(Self::new(store, links))
    }

    pub fn with_favicon_size(mut self, size: u32) -> Self {
        self.favicon_size = size;
        self
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn get(&self, id: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.id == id)
    }

    pub fn add(&mut self, input: NewLink) -> Result<&Link> {
        self.add_at(input, Utc::now())
    }

    #[tracing::instrument(skip(self, input), fields(url = %input.url))]
    pub fn add_at(&mut self, input: NewLink, now: DateTime<Utc>) -> Result<&Link> {
        let url = normalize_url(&input.url)?;
        let icon_url = non_blank(input.icon_url).unwrap_or_else(|| favicon_url(&url, self.favicon_size));
        let link = Link {
            id: next_id(now, self.links.iter().map(|l| l.id.as_str())),
            name: non_blank(input.name).unwrap_or_default(),
            url,
            icon_url,
        };
        info!(id = %link.id, url = %link.url, "adding hotlink");

        let mut next = self.links.clone();
        next.push(link);
        self.commit(next)?;
        Ok(&self.links[self.links.len() - 1])
    }

    /// Returns `false` when no link has that id.
    #[tracing::instrument(skip(self))]
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        if self.get(id).is_none() {
            debug!("hotlink not found, nothing removed");
            return Ok(false);
        }
        let next: Vec<Link> = self.links.iter().filter(|l| l.id != id).cloned().collect();
        self.commit(next)?;
        Ok(true)
    }

    fn commit(&mut self, next: Vec<Link>) -> Result<()> {
        self.store.set(entry(Key::Hotlinks, &next)?)?;
        self.links = next;
        Ok(())
    }
}
