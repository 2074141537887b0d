//! Cache Strategy Table
//!
//! Static freshness, retention, refresh and retry policy per content class,
//! the collection → class mapping, and the invalidation cascades between
//! collections and composite cache keys.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::cache::Priority;

const SECOND: Duration = Duration::from_secs(1);
const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);

/// Composite key holding the homepage bundle.
pub const HOMEPAGE_KEY: &str = "homepage:data";
/// Composite key holding the site settings map.
pub const SETTINGS_KEY: &str = "settings:all";

// == Content Class ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentClass {
    /// Composite homepage bundle
    Homepage,
    /// Pages and service descriptions that change rarely
    Static,
    /// Blog posts, projects, testimonials
    Dynamic,
    /// Per-user records (profiles, quotes, proposals)
    UserData,
    Settings,
    /// Notifications and live counters
    RealTime,
}

impl ContentClass {
    pub const ALL: [ContentClass; 6] = [
        ContentClass::Homepage,
        ContentClass::Static,
        ContentClass::Dynamic,
        ContentClass::UserData,
        ContentClass::Settings,
        ContentClass::RealTime,
    ];
}

// == Retry Policy ==
/// Retry count with capped exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
            max_delay,
        }
    }

    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (0-based): `min(base * 2^attempt, max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Runs `op`, retrying failures with backoff. Returns the last error.
    pub async fn retry<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.attempts => {
                    let delay = self.delay_for(attempt);
                    debug!(attempt, ?delay, error = %err, "retrying after failure");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

// == Cache Strategy ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStrategy {
    /// How long data counts as fresh; used as the cache TTL
    pub stale_time: Duration,
    /// How long unused data is retained before collection
    pub retention: Duration,
    pub priority: Priority,
    /// Background refresh cadence, if any
    pub refetch_interval: Option<Duration>,
    pub retry: RetryPolicy,
}

/// Strategy bound to each content class.
pub fn strategy_for(class: ContentClass) -> CacheStrategy {
    match class {
        ContentClass::Homepage => CacheStrategy {
            stale_time: 2 * MINUTE,
            retention: 10 * MINUTE,
            priority: Priority::High,
            refetch_interval: Some(5 * MINUTE),
            retry: RetryPolicy::new(3, SECOND, 30 * SECOND),
        },
        ContentClass::Static => CacheStrategy {
            stale_time: 30 * MINUTE,
            retention: HOUR,
            priority: Priority::High,
            refetch_interval: None,
            retry: RetryPolicy::new(2, SECOND, 30 * SECOND),
        },
        ContentClass::Dynamic => CacheStrategy {
            stale_time: 5 * MINUTE,
            retention: 30 * MINUTE,
            priority: Priority::Normal,
            refetch_interval: None,
            retry: RetryPolicy::new(3, SECOND, 30 * SECOND),
        },
        ContentClass::UserData => CacheStrategy {
            stale_time: MINUTE,
            retention: 5 * MINUTE,
            priority: Priority::Normal,
            refetch_interval: None,
            retry: RetryPolicy::new(1, SECOND, 10 * SECOND),
        },
        ContentClass::Settings => CacheStrategy {
            stale_time: 10 * MINUTE,
            retention: 24 * HOUR,
            priority: Priority::High,
            refetch_interval: None,
            retry: RetryPolicy::new(3, SECOND, 30 * SECOND),
        },
        ContentClass::RealTime => CacheStrategy {
            stale_time: 10 * SECOND,
            retention: MINUTE,
            priority: Priority::Low,
            refetch_interval: Some(30 * SECOND),
            retry: RetryPolicy::new(5, Duration::from_millis(500), 10 * SECOND),
        },
    }
}

/// Known CMS collections and their content class.
pub const COLLECTION_CLASSES: &[(&str, ContentClass)] = &[
    ("pages", ContentClass::Static),
    ("services", ContentClass::Static),
    ("team_members", ContentClass::Static),
    ("blog_posts", ContentClass::Dynamic),
    ("blog_categories", ContentClass::Dynamic),
    ("projects", ContentClass::Dynamic),
    ("testimonials", ContentClass::Dynamic),
    ("settings", ContentClass::Settings),
    ("profiles", ContentClass::UserData),
    ("quotes", ContentClass::UserData),
    ("proposals", ContentClass::UserData),
    ("contact_submissions", ContentClass::RealTime),
    ("notifications", ContentClass::RealTime),
];

/// Content class of a collection. Unknown collections are treated as dynamic.
pub fn class_for_collection(collection: &str) -> ContentClass {
    if collection == HOMEPAGE_KEY {
        return ContentClass::Homepage;
    }
    COLLECTION_CLASSES
        .iter()
        .find(|(name, _)| *name == collection)
        .map(|(_, class)| *class)
        .unwrap_or(ContentClass::Dynamic)
}

/// Strategy for a collection, via its content class.
pub fn strategy_for_collection(collection: &str) -> CacheStrategy {
    strategy_for(class_for_collection(collection))
}

/// Collections the homepage bundle is assembled from.
pub const HOMEPAGE_COLLECTIONS: &[&str] =
    &["pages", "services", "projects", "blog_posts", "testimonials"];

/// Key prefixes to invalidate, beyond `<collection>:`, when a collection is written.
pub const INVALIDATION_CASCADES: &[(&str, &[&str])] = &[
    ("pages", &[HOMEPAGE_KEY]),
    ("services", &[HOMEPAGE_KEY]),
    ("projects", &[HOMEPAGE_KEY]),
    ("blog_posts", &[HOMEPAGE_KEY]),
    ("testimonials", &[HOMEPAGE_KEY]),
    // Category names are embedded in post listings
    ("blog_categories", &["blog_posts:", HOMEPAGE_KEY]),
    ("settings", &[SETTINGS_KEY]),
];

/// Cascade targets declared for `collection`.
pub fn cascade_for(collection: &str) -> &'static [&'static str] {
    INVALIDATION_CASCADES
        .iter()
        .find(|(name, _)| *name == collection)
        .map(|(_, targets)| *targets)
        .unwrap_or(&[])
}
