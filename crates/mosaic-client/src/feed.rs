//! Page-scoped copies of feed items and profiles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use mosaic_net::SocialApi;
use mosaic_shared::models::{FeedItem, Page, Profile};
use mosaic_shared::types::{ActionKind, EntityKey, UserId};
use mosaic_shared::MosaicError;

use crate::mutation::{ToggleSnapshot, ToggleStore};
use crate::view::ViewScope;

/// Which listing a feed view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    Posts,
    Reels,
}

/// Loaded items of one feed, in server order.
#[derive(Debug, Clone)]
pub struct FeedState {
    source: FeedSource,
    items: Vec<FeedItem>,
    next_page: Option<u32>,
}

impl FeedState {
    pub fn new(source: FeedSource) -> Self {
        Self {
            source,
            items: Vec::new(),
            next_page: Some(1),
        }
    }

    pub fn source(&self) -> FeedSource {
        self.source
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn get(&self, key: EntityKey) -> Option<&FeedItem> {
        self.items.iter().find(|item| item.key() == key)
    }

    /// Page to request next, `None` once the listing is exhausted.
    pub fn next_page(&self) -> Option<u32> {
        self.next_page
    }

    /// Put a single item in front, replacing an older copy.
    pub fn upsert(&mut self, item: FeedItem) {
        match self.items.iter_mut().find(|held| held.key() == item.key()) {
            Some(held) => *held = item,
            None => self.items.insert(0, item),
        }
    }

    /// Append page `number`, skipping items already held. Returns how many
    /// were added.
    pub fn append_page(&mut self, number: u32, page: Page<FeedItem>) -> usize {
        let before = self.items.len();
        self.next_page = page.has_more().then_some(number + 1);

        for item in page.results {
            if self.get(item.key()).is_none() {
                self.items.push(item);
            }
        }
        self.items.len() - before
    }

    fn get_mut(&mut self, key: EntityKey) -> Option<&mut FeedItem> {
        self.items.iter_mut().find(|item| item.key() == key)
    }
}

impl ToggleStore for FeedState {
    fn read(&self, target: EntityKey, action: ActionKind) -> Option<ToggleSnapshot> {
        let e = self.get(target)?.engagement();
        match action {
            ActionKind::Like => Some(ToggleSnapshot {
                active: e.is_liked,
                count: Some(e.like_count),
            }),
            ActionKind::Save => Some(ToggleSnapshot {
                active: e.is_saved,
                count: None,
            }),
            ActionKind::Follow => None,
        }
    }

    fn write(&mut self, target: EntityKey, action: ActionKind, value: ToggleSnapshot) -> bool {
        let Some(item) = self.get_mut(target) else {
            return false;
        };
        let e = item.engagement_mut();
        match action {
            ActionKind::Like => {
                e.is_liked = value.active;
                if let Some(count) = value.count {
                    e.like_count = count;
                }
                true
            }
            ActionKind::Save => {
                e.is_saved = value.active;
                true
            }
            ActionKind::Follow => false,
        }
    }
}

/// Fetch the next page of `state`'s listing into it.
///
/// Returns the number of new items; `0` once the listing is exhausted.
pub async fn load_more(
    api: &dyn SocialApi,
    state: &Arc<Mutex<FeedState>>,
    scope: &ViewScope,
) -> Result<usize, MosaicError> {
    let (source, page) = {
        let guard = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match guard.next_page() {
            Some(page) => (guard.source(), page),
            None => return Ok(0),
        }
    };

    let result = match source {
        FeedSource::Posts => api.feed(page).await,
        FeedSource::Reels => api.reels(page).await,
    };
    let fetched = scope.settle(result)?;

    let added = state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .append_page(page, fetched);
    debug!(?source, page, added, "Feed page loaded");
    Ok(added)
}

/// Profiles shown in the current view, keyed by user.
#[derive(Debug, Clone, Default)]
pub struct ProfileState {
    profiles: HashMap<UserId, Profile>,
}

impl ProfileState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, profile: Profile) {
        self.profiles.insert(profile.user.id, profile);
    }

    pub fn get(&self, user: UserId) -> Option<&Profile> {
        self.profiles.get(&user)
    }
}

impl ToggleStore for ProfileState {
    fn read(&self, target: EntityKey, action: ActionKind) -> Option<ToggleSnapshot> {
        match (target, action) {
            (EntityKey::User(id), ActionKind::Follow) => {
                let p = self.profiles.get(&id)?;
                Some(ToggleSnapshot {
                    active: p.is_following,
                    count: Some(p.followers_count),
                })
            }
            _ => None,
        }
    }

    fn write(&mut self, target: EntityKey, action: ActionKind, value: ToggleSnapshot) -> bool {
        let (EntityKey::User(id), ActionKind::Follow) = (target, action) else {
            return false;
        };
        let Some(p) = self.profiles.get_mut(&id) else {
            return false;
        };
        p.is_following = value.active;
        if let Some(count) = value.count {
            p.followers_count = count;
        }
        true
    }
}
