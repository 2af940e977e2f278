//! Read-side cache for incident detail payloads.
//!
//! Mutations (status transitions, report saves/restores) invalidate the
//! affected incident's entry; reads additionally carry a content hash probe
//! so a stale entry is never served after an out-of-band edit.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::repo::IncidentDetail;

struct CachedDetail {
    data: IncidentDetail,
    computed_at: SystemTime,
    data_hash: String,
}

pub struct DetailCache {
    entries: Mutex<HashMap<i64, CachedDetail>>,
    ttl_seconds: u64,
}

impl DetailCache {
    pub fn new() -> Self {
        DetailCache {
            entries: Mutex::new(HashMap::new()),
            ttl_seconds: 300,
        }
    }

    /// Custom TTL, for tests.
    pub fn with_ttl(ttl_seconds: u64) -> Self {
        DetailCache {
            entries: Mutex::new(HashMap::new()),
            ttl_seconds,
        }
    }

    /// Cached detail for the incident, if the hash still matches and the
    /// entry has not expired.
    pub fn get(&self, incident_id: i64, current_hash: &str) -> Option<IncidentDetail> {
        let entries = self.entries.lock().unwrap();
        let cached = entries.get(&incident_id)?;

        if cached.data_hash != current_hash {
            return None;
        }

        let age = SystemTime::now()
            .duration_since(cached.computed_at)
            .unwrap_or(Duration::from_secs(self.ttl_seconds + 1));
        if age.as_secs() < self.ttl_seconds {
            Some(cached.data.clone())
        } else {
            None
        }
    }

    pub fn set(&self, incident_id: i64, detail: IncidentDetail, hash: String) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            incident_id,
            CachedDetail {
                data: detail,
                computed_at: SystemTime::now(),
                data_hash: hash,
            },
        );
    }

    /// Drop the entry for one incident (call after mutating it).
    pub fn invalidate(&self, incident_id: i64) {
        self.entries.lock().unwrap().remove(&incident_id);
    }

    pub fn invalidate_all(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DetailCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct HashProbe<'a> {
    updated_at: &'a str,
    version_ids: &'a [i64],
    current_version_id: Option<i64>,
}

/// Content hash of the parts of an incident detail that can change:
/// the incident's `updated_at` plus the id set and current pointer of its
/// report history.
pub fn compute_detail_hash(
    updated_at: &str,
    version_ids: &[i64],
    current_version_id: Option<i64>,
) -> String {
    let probe = HashProbe {
        updated_at,
        version_ids,
        current_version_id,
    };
    // Serialization of this probe cannot fail; the fields are plain data.
    let json = serde_json::to_string(&probe).unwrap_or_default();
    hex::encode(Sha256::digest(json.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CustomerNotification, Incident, IncidentStatus};
    use std::thread;

    fn dummy_detail() -> IncidentDetail {
        IncidentDetail {
            incident: Incident {
                id: 1,
                incident_number: "INC-0001".to_string(),
                title: "cache test".to_string(),
                description: None,
                severity: None,
                status: IncidentStatus::Open,
                customer_notification: CustomerNotification::Pending,
                created_at: "2026-01-01T00:00:00Z".to_string(),
                updated_at: "2026-01-01T00:00:00Z".to_string(),
                updated_by: None,
                closed_time: None,
            },
            versions: vec![],
            warnings: vec![],
        }
    }

    #[test]
    fn cache_hit_on_matching_hash() {
        let cache = DetailCache::new();
        let hash = compute_detail_hash("2026-01-01T00:00:00Z", &[1, 2], Some(2));

        cache.set(1, dummy_detail(), hash.clone());
        assert!(cache.get(1, &hash).is_some());
    }

    #[test]
    fn cache_miss_on_hash_mismatch() {
        let cache = DetailCache::new();
        let hash1 = compute_detail_hash("2026-01-01T00:00:00Z", &[1], Some(1));
        let hash2 = compute_detail_hash("2026-01-02T00:00:00Z", &[1], Some(1));
        assert_ne!(hash1, hash2);

        cache.set(1, dummy_detail(), hash1);
        assert!(cache.get(1, &hash2).is_none());
    }

    #[test]
    fn cache_expires_after_ttl() {
        let cache = DetailCache::with_ttl(1);
        let hash = compute_detail_hash("2026-01-01T00:00:00Z", &[], None);

        cache.set(1, dummy_detail(), hash.clone());
        assert!(cache.get(1, &hash).is_some());

        thread::sleep(Duration::from_millis(1100));
        assert!(cache.get(1, &hash).is_none());
    }

    #[test]
    fn invalidate_drops_only_that_incident() {
        let cache = DetailCache::new();
        let hash = compute_detail_hash("2026-01-01T00:00:00Z", &[], None);

        cache.set(1, dummy_detail(), hash.clone());
        cache.set(2, dummy_detail(), hash.clone());

        cache.invalidate(1);
        assert!(cache.get(1, &hash).is_none());
        assert!(cache.get(2, &hash).is_some());

        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn hash_is_sensitive_to_current_pointer() {
        let a = compute_detail_hash("2026-01-01T00:00:00Z", &[1, 2], Some(1));
        let b = compute_detail_hash("2026-01-01T00:00:00Z", &[1, 2], Some(2));
        assert_ne!(a, b);
    }
}
