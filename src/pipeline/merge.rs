//! Merge engine: combines all records sharing an identity key into one
//! canonical record, resolving field conflicts by source quality.

use crate::pipeline::completeness;
use crate::pipeline::identity::IdentityKey;
use crate::pipeline::normalize::PartialFields;
use crate::types::SourceId;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Which source currently supplies a field's value, and at what quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldProvenance {
    pub source: SourceId,
    pub quality: u8,
}

/// The single merged representation of one newsletter.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalRecord {
    pub identity_key: IdentityKey,
    pub name: Option<String>,
    pub link: Option<String>,
    pub publisher: Option<String>,
    pub email: Option<String>,
    pub subscriber_count: Option<u64>,
    pub social_accounts: BTreeMap<String, String>,
    pub provenance: BTreeMap<String, FieldProvenance>,
    pub is_complete: bool,
}

impl CanonicalRecord {
    fn new(identity_key: IdentityKey) -> Self {
        Self {
            identity_key,
            name: None,
            link: None,
            publisher: None,
            email: None,
            subscriber_count: None,
            social_accounts: BTreeMap::new(),
            provenance: BTreeMap::new(),
            is_complete: false,
        }
    }
}

/// Total, deterministic quality order over source ids. Built from the
/// configured priority list, highest first.
#[derive(Debug, Clone)]
pub struct SourceRanking {
    quality: HashMap<SourceId, u8>,
}

impl SourceRanking {
    pub fn from_priority(order: &[SourceId]) -> Self {
        let n = order.len() as u8;
        let quality = order
            .iter()
            .enumerate()
            .map(|(i, source)| (*source, n - i as u8))
            .collect();
        Self { quality }
    }

    /// Quality score for a source; unranked sources score zero and can never
    /// displace a ranked value.
    pub fn quality(&self, source: SourceId) -> u8 {
        self.quality.get(&source).copied().unwrap_or(0)
    }
}

impl Default for SourceRanking {
    fn default() -> Self {
        Self::from_priority(&crate::constants::DEFAULT_SOURCE_PRIORITY)
    }
}

/// Owns the identity -> canonical record map for the duration of a run.
/// Merging only adds or upgrades information; no field is ever cleared.
pub struct MergeEngine {
    ranking: SourceRanking,
    records: HashMap<IdentityKey, CanonicalRecord>,
}

impl MergeEngine {
    pub fn new(ranking: SourceRanking) -> Self {
        Self {
            ranking,
            records: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Merge one normalized record into the canonical map.
    ///
    /// Per scalar field: absent -> set; present -> overwrite only when the
    /// incoming source's quality is strictly greater (ties keep the existing
    /// value, so merge order between equal sources cannot change the
    /// outcome). `social_accounts` is unioned instead, since different
    /// sources surface different platforms.
    pub fn merge(&mut self, key: IdentityKey, fields: PartialFields, source: SourceId) {
        let quality = self.ranking.quality(source);
        let record = self
            .records
            .entry(key.clone())
            .or_insert_with(|| CanonicalRecord::new(key));

        let PartialFields {
            name,
            link,
            publisher,
            email,
            subscriber_count,
            social_accounts,
        } = fields;

        apply_field(&mut record.name, &mut record.provenance, "name", name, source, quality);
        apply_field(&mut record.link, &mut record.provenance, "link", link, source, quality);
        apply_field(
            &mut record.publisher,
            &mut record.provenance,
            "publisher",
            publisher,
            source,
            quality,
        );
        apply_field(
            &mut record.email,
            &mut record.provenance,
            "email",
            email,
            source,
            quality,
        );
        apply_field(
            &mut record.subscriber_count,
            &mut record.provenance,
            "subscriber_count",
            subscriber_count,
            source,
            quality,
        );

        for (platform, handle) in social_accounts {
            record.social_accounts.entry(platform).or_insert(handle);
        }

        record.is_complete = completeness::is_complete(record);
    }

    /// Freeze the map into canonical records, sorted by identity key so the
    /// output order is independent of fetch timing and hash order.
    pub fn into_records(self) -> Vec<CanonicalRecord> {
        let mut records: Vec<CanonicalRecord> = self.records.into_values().collect();
        records.sort_by(|a, b| a.identity_key.cmp(&b.identity_key));
        records
    }
}

fn apply_field<T>(
    current: &mut Option<T>,
    provenance: &mut BTreeMap<String, FieldProvenance>,
    field: &'static str,
    incoming: Option<T>,
    source: SourceId,
    quality: u8,
) {
    let Some(value) = incoming else { return };
    let should_set = match provenance.get(field) {
        None => true,
        Some(existing) => quality > existing.quality,
    };
    if current.is_none() || should_set {
        *current = Some(value);
        provenance.insert(field.to_string(), FieldProvenance { source, quality });
    }
}
