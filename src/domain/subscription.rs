//! The subscription tree: nested categories whose leaves reference feeds.
//!
//! Categories are addressed by a [`CategoryPath`], whose string form prefixes
//! every label with `-` and joins them with `/` (`-Tech/-Rust`). The empty
//! string is the root category.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::app::{Result, TributaryError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CategoryPath(Vec<String>);

impl CategoryPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn parse(id: &str) -> Result<Self> {
        let id = id.trim_matches('/');
        if id.is_empty() {
            return Ok(Self::root());
        }
        id.split('/')
            .map(|segment| match segment.strip_prefix('-') {
                Some(label) if !label.is_empty() => Ok(label.to_string()),
                _ => Err(TributaryError::InvalidCategoryPath(id.to_string())),
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, label: &str) -> Self {
        let mut labels = self.0.clone();
        labels.push(label.to_string());
        Self(labels)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.0.split_last()?;
        Some(Self(init.to_vec()))
    }

    pub fn last_label(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// True when `self` is `ancestor` or lies somewhere below it.
    pub fn starts_with(&self, ancestor: &CategoryPath) -> bool {
        self.0.starts_with(&ancestor.0)
    }

    pub fn to_id(&self) -> String {
        self.0
            .iter()
            .map(|label| format!("-{label}"))
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_id())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub feed_id: String,
    pub feed_uri: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outline {
    Category(Category),
    Subscription(Subscription),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub label: String,
    #[serde(default)]
    pub children: Vec<Outline>,
}

impl Category {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            children: Vec::new(),
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.children.iter().filter_map(|child| match child {
            Outline::Category(c) => Some(c),
            Outline::Subscription(_) => None,
        })
    }

    pub fn subscriptions(&self) -> impl Iterator<Item = &Subscription> {
        self.children.iter().filter_map(|child| match child {
            Outline::Subscription(s) => Some(s),
            Outline::Category(_) => None,
        })
    }

    pub fn category(&self, label: &str) -> Option<&Category> {
        self.categories().find(|c| c.label == label)
    }

    fn category_mut(&mut self, label: &str) -> Option<&mut Category> {
        self.children.iter_mut().find_map(|child| match child {
            Outline::Category(c) if c.label == label => Some(c),
            _ => None,
        })
    }

    /// Every subscription in this category and all of its descendants,
    /// depth-first in document order. A feed subscribed in several places
    /// appears once.
    pub fn recursive_subscriptions(&self) -> Vec<&Subscription> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect_subscriptions(&mut seen, &mut out);
        out
    }

    fn collect_subscriptions<'a>(
        &'a self,
        seen: &mut HashSet<&'a str>,
        out: &mut Vec<&'a Subscription>,
    ) {
        for child in &self.children {
            match child {
                Outline::Subscription(s) => {
                    if seen.insert(s.feed_id.as_str()) {
                        out.push(s);
                    }
                }
                Outline::Category(c) => c.collect_subscriptions(seen, out),
            }
        }
    }

    /// Add a child category, or return the existing one with that label.
    pub fn add_category(&mut self, label: &str) -> Result<&mut Category> {
        validate_label(label)?;
        let label = label.trim();
        if self.category(label).is_none() {
            self.children.push(Outline::Category(Category::new(label)));
        }
        self.category_mut(label)
            .ok_or_else(|| TributaryError::InvalidCategoryTitle(label.to_string()))
    }

    pub fn remove_category(&mut self, label: &str) -> Option<Category> {
        let index = self
            .children
            .iter()
            .position(|child| matches!(child, Outline::Category(c) if c.label == label))?;
        match self.children.remove(index) {
            Outline::Category(c) => Some(c),
            Outline::Subscription(_) => None,
        }
    }

    /// Returns false when the feed is already subscribed directly here.
    pub fn subscribe(&mut self, subscription: Subscription) -> bool {
        if self.contains_feed(&subscription.feed_id) {
            return false;
        }
        self.children.push(Outline::Subscription(subscription));
        true
    }

    pub fn unsubscribe(&mut self, feed_id: &str) -> Option<Subscription> {
        let index = self.children.iter().position(
            |child| matches!(child, Outline::Subscription(s) if s.feed_id == feed_id),
        )?;
        match self.children.remove(index) {
            Outline::Subscription(s) => Some(s),
            Outline::Category(_) => None,
        }
    }

    pub fn contains_feed(&self, feed_id: &str) -> bool {
        self.subscriptions().any(|s| s.feed_id == feed_id)
    }
}

fn validate_label(label: &str) -> Result<()> {
    let trimmed = label.trim();
    if trimmed.is_empty() || trimmed.contains('/') {
        return Err(TributaryError::InvalidCategoryTitle(label.to_string()));
    }
    Ok(())
}

/// Source of a move: either a category or one subscription inside a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlineRef {
    Category(CategoryPath),
    Subscription {
        parent: CategoryPath,
        feed_id: String,
    },
}

impl OutlineRef {
    /// Accepts `-A/-B` for categories and `-A/feeds/<id>` or `feeds/<id>`
    /// for subscriptions.
    pub fn parse(path: &str) -> Result<Self> {
        let path = path.trim_matches('/');
        let split = if let Some(feed_id) = path.strip_prefix("feeds/") {
            Some(("", feed_id))
        } else {
            path.split_once("/feeds/")
        };
        match split {
            Some((parent, feed_id)) if !feed_id.is_empty() && !feed_id.contains('/') => {
                Ok(Self::Subscription {
                    parent: CategoryPath::parse(parent)?,
                    feed_id: feed_id.to_string(),
                })
            }
            Some(_) => Err(TributaryError::InvalidCategoryPath(path.to_string())),
            None => Ok(Self::Category(CategoryPath::parse(path)?)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionList {
    pub root: Category,
    /// Incremented by the store on every save.
    #[serde(skip)]
    pub version: i64,
}

impl SubscriptionList {
    pub fn category(&self, path: &CategoryPath) -> Result<&Category> {
        path.labels()
            .iter()
            .try_fold(&self.root, |category, label| category.category(label))
            .ok_or_else(|| TributaryError::InvalidCategoryPath(path.to_id()))
    }

    pub fn category_mut(&mut self, path: &CategoryPath) -> Result<&mut Category> {
        let mut category = &mut self.root;
        for label in path.labels() {
            category = category
                .category_mut(label)
                .ok_or_else(|| TributaryError::InvalidCategoryPath(path.to_id()))?;
        }
        Ok(category)
    }

    pub fn find_subscription(&self, feed_id: &str) -> Option<&Subscription> {
        self.root
            .recursive_subscriptions()
            .into_iter()
            .find(|s| s.feed_id == feed_id)
    }

    pub fn remove_category(&mut self, path: &CategoryPath) -> Result<Category> {
        let (parent, label) = path
            .parent()
            .zip(path.last_label())
            .ok_or_else(|| TributaryError::InvalidCategoryPath(path.to_id()))?;
        self.category_mut(&parent)?
            .remove_category(label)
            .ok_or_else(|| TributaryError::InvalidCategoryPath(path.to_id()))
    }

    /// Move a category or subscription under `dest`. Moving a category into
    /// itself or one of its descendants is rejected.
    pub fn move_outline(&mut self, source: &OutlineRef, dest: &CategoryPath) -> Result<()> {
        self.category(dest)?;
        match source {
            OutlineRef::Category(path) => {
                let (parent, label) = path
                    .parent()
                    .zip(path.last_label())
                    .ok_or_else(|| TributaryError::InvalidCategoryPath(path.to_id()))?;
                self.category(path)?;
                if dest.starts_with(path) {
                    return Err(TributaryError::CategoryCircularReference(format!(
                        "cannot move {path} into {dest}"
                    )));
                }
                if &parent == dest {
                    return Ok(());
                }
                if self.category(dest)?.category(label).is_some() {
                    return Err(TributaryError::InvalidCategoryTitle(format!(
                        "{label} already exists in {dest}"
                    )));
                }
                let moved = self.remove_category(path)?;
                self.category_mut(dest)?
                    .children
                    .push(Outline::Category(moved));
                Ok(())
            }
            OutlineRef::Subscription { parent, feed_id } => {
                if !self.category(parent)?.contains_feed(feed_id) {
                    return Err(TributaryError::FeedNotInCategory(feed_id.clone()));
                }
                if parent == dest {
                    return Ok(());
                }
                let moved = self
                    .category_mut(parent)?
                    .unsubscribe(feed_id)
                    .ok_or_else(|| TributaryError::FeedNotInCategory(feed_id.clone()))?;
                self.category_mut(dest)?.subscribe(moved);
                Ok(())
            }
        }
    }
}
