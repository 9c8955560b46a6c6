use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a cached record counts as fresh.
///
/// Startup loads use the short window so a fresh session re-reads the
/// remote document soon after it changes elsewhere; everything else
/// accepts an hour-old copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// 5 minutes
    InitialLoad,
    /// 60 minutes
    General,
    Custom(Duration),
}

impl CacheTtl {
    pub fn duration(&self) -> Duration {
        match self {
            CacheTtl::InitialLoad => Duration::minutes(5),
            CacheTtl::General => Duration::minutes(60),
            CacheTtl::Custom(d) => *d,
        }
    }
}

/// A value stamped with when it was stored and the record version it carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    #[serde(default = "default_version")]
    pub version: u64,
}

fn default_version() -> u64 {
    1
}

impl<T> CachedData<T> {
    pub fn new(data: T, version: u64, cached_at: DateTime<Utc>) -> Self {
        Self {
            data,
            cached_at,
            version,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.cached_at
    }

    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        self.age(now).num_minutes()
    }

    /// Fresh while strictly younger than `ttl`.
    pub fn is_fresh(&self, ttl: CacheTtl, now: DateTime<Utc>) -> bool {
        self.age(now) < ttl.duration()
    }

    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        let minutes = self.age_minutes(now);
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}
