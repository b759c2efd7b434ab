//! Volume binding model.
//!
//! A mount spec travels on the wire as `src:dst`, `src:dst:flags` or
//! `src:dst:flags:size_bytes`. A source ending in the `AUTO` sentinel is
//! bound to a concrete resource by the scheduler; everything else is a
//! fixed host mount whose size counts toward additional storage.

use crate::error::{GantryError, Result};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

/// Source sentinel meaning "scheduler assigns".
pub const AUTO: &str = "AUTO";

/// Flag character denoting monopoly (exclusive) allocation.
const MONOPOLY_FLAG: char = 'm';

/// A single volume mount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VolumeBinding {
    pub source: String,
    pub destination: String,
    pub flags: String,
    pub size_in_bytes: i64,
}

impl VolumeBinding {
    /// Parse a colon-separated volume spec.
    pub fn parse(volume: &str) -> Result<Self> {
        let parts: Vec<&str> = volume.split(':').collect();
        let (source, destination, flags, size_in_bytes) = match parts.as_slice() {
            [src, dst] => (*src, *dst, "", 0),
            [src, dst, flags] => (*src, *dst, *flags, 0),
            [src, dst, flags, size] => {
                let size = size.parse::<i64>().map_err(|e| GantryError::InvalidVolumeSize {
                    spec: volume.to_string(),
                    reason: e.to_string(),
                })?;
                (*src, *dst, *flags, size)
            }
            _ => return Err(GantryError::InvalidVolume { spec: volume.to_string() }),
        };

        let binding = Self {
            source: source.to_string(),
            destination: destination.to_string(),
            flags: flags.to_string(),
            size_in_bytes,
        };
        binding.validate()?;
        Ok(binding)
    }

    /// Reject bindings that cannot be mounted or scheduled.
    pub fn validate(&self) -> Result<()> {
        if self.destination.is_empty() {
            return Err(GantryError::InvalidVolume { spec: self.to_string(false) });
        }
        if self.require_monopoly() && self.size_in_bytes == 0 {
            return Err(GantryError::InvalidVolume { spec: self.to_string(false) });
        }
        Ok(())
    }

    fn auto_source(&self) -> bool {
        self.source.ends_with(AUTO)
    }

    /// The scheduler must bind the source to a concrete resource ID.
    pub fn require_schedule(&self) -> bool {
        self.auto_source() && !self.flags.is_empty()
    }

    /// Scheduled with exclusive use of the allocated resource.
    pub fn require_monopoly(&self) -> bool {
        self.auto_source() && self.flags.contains(MONOPOLY_FLAG)
    }

    /// Scheduled without a size bound.
    pub fn require_infinity(&self) -> bool {
        self.auto_source() && !self.flags.contains(MONOPOLY_FLAG) && self.size_in_bytes == 0
    }

    /// Emit the minimal colon form. `normalize` strips the monopoly flag,
    /// which only matters to the scheduler, not the engine.
    pub fn to_string(&self, normalize: bool) -> String {
        let flags = if normalize {
            self.flags.replace(MONOPOLY_FLAG, "")
        } else {
            self.flags.clone()
        };

        if self.flags.is_empty() && self.size_in_bytes == 0 {
            format!("{}:{}", self.source, self.destination)
        } else if self.size_in_bytes == 0 {
            format!("{}:{}:{}", self.source, self.destination, flags)
        } else {
            format!("{}:{}:{}:{}", self.source, self.destination, flags, self.size_in_bytes)
        }
    }
}

/// An ordered collection of volume bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeBindings(pub Vec<VolumeBinding>);

impl VolumeBindings {
    /// Parse a list of volume specs.
    pub fn parse(volumes: &[String]) -> Result<Self> {
        volumes.iter().map(|v| VolumeBinding::parse(v)).collect::<Result<Vec<_>>>().map(Self)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VolumeBinding> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert into a list of spec strings. Sorting uses the un-normalized
    /// string so serialization order is stable regardless of `normalize`.
    pub fn to_strings(&self, sorted: bool, normalize: bool) -> Vec<String> {
        let mut bindings: Vec<&VolumeBinding> = self.0.iter().collect();
        if sorted {
            bindings.sort_by_key(|vb| vb.to_string(false));
        }
        bindings.into_iter().map(|vb| vb.to_string(normalize)).collect()
    }

    /// Bytes of storage consumed by fixed host mounts. Scheduled bindings
    /// draw from the volume allocator instead.
    pub fn additional_storage(&self) -> i64 {
        self.0.iter().filter(|vb| !vb.require_schedule()).map(|vb| vb.size_in_bytes).sum()
    }

    /// Produce new bindings with auto sources replaced by the resource IDs
    /// the plan assigned. Non-scheduled bindings pass through unchanged.
    pub fn apply_plan(&self, plan: &VolumePlan) -> VolumeBindings {
        VolumeBindings(
            self.0
                .iter()
                .map(|vb| {
                    let mut applied = vb.clone();
                    if let Some(vmap) = plan.get_volume_map(vb) {
                        applied.source = vmap.resource_id().to_string();
                    }
                    applied
                })
                .collect(),
        )
    }

    /// Union two collections. Schedule-requiring entries with identical
    /// (source, destination, flags) sum their sizes and are dropped when the
    /// total goes negative; hard entries concatenate. Commutative on the
    /// schedule-requiring side.
    pub fn merge(&self, other: &VolumeBindings) -> (VolumeBindings, VolumeBindings) {
        let mut sizes: HashMap<(String, String, String), i64> = HashMap::new();
        let mut order: Vec<(String, String, String)> = Vec::new();
        let mut hard = Vec::new();

        for vb in self.0.iter().chain(other.0.iter()) {
            if !vb.require_schedule() {
                hard.push(vb.clone());
                continue;
            }
            let key = (vb.source.clone(), vb.destination.clone(), vb.flags.clone());
            if !sizes.contains_key(&key) {
                order.push(key.clone());
            }
            *sizes.entry(key).or_insert(0) += vb.size_in_bytes;
        }

        let soft = order
            .into_iter()
            .filter_map(|key| {
                let size = sizes[&key];
                if size < 0 {
                    return None;
                }
                let (source, destination, flags) = key;
                Some(VolumeBinding { source, destination, flags, size_in_bytes: size })
            })
            .collect();

        (VolumeBindings(soft), VolumeBindings(hard))
    }

    /// Order-independent equality over the wire form.
    pub fn is_equal(&self, other: &VolumeBindings) -> bool {
        self.to_strings(true, false) == other.to_strings(true, false)
    }
}

impl FromIterator<VolumeBinding> for VolumeBindings {
    fn from_iter<T: IntoIterator<Item = VolumeBinding>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a VolumeBindings {
    type Item = &'a VolumeBinding;
    type IntoIter = std::slice::Iter<'a, VolumeBinding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// JSON form is a list of spec strings, so anything we emit must re-parse
// identically.
impl Serialize for VolumeBindings {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_strings(false, false).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VolumeBindings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let volumes = Vec::<String>::deserialize(deserializer)?;
        VolumeBindings::parse(&volumes).map_err(D::Error::custom)
    }
}

/// Assignment of one scheduled binding: resource ID to allocated size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeMap(pub HashMap<String, i64>);

impl VolumeMap {
    pub fn new(resource_id: impl Into<String>, size: i64) -> Self {
        let mut map = HashMap::new();
        map.insert(resource_id.into(), size);
        Self(map)
    }

    /// The allocated resource ID, or "" for an empty map.
    pub fn resource_id(&self) -> &str {
        self.0.keys().next().map(String::as_str).unwrap_or("")
    }

    pub fn size(&self) -> i64 {
        self.0.values().next().copied().unwrap_or(0)
    }
}

/// Mapping from scheduled bindings to their allocated resources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumePlan(HashMap<VolumeBinding, VolumeMap>);

impl VolumePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, binding: VolumeBinding, map: VolumeMap) {
        self.0.insert(binding, map);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get_volume_map(&self, binding: &VolumeBinding) -> Option<&VolumeMap> {
        self.0.get(binding)
    }

    /// Wire-literal form keyed by the binding's un-normalized string.
    pub fn to_literal(&self) -> HashMap<String, VolumeMap> {
        self.0.iter().map(|(vb, vmap)| (vb.to_string(false), vmap.clone())).collect()
    }

    /// Rebuild a plan from its wire-literal form.
    pub fn from_literal(literal: HashMap<String, VolumeMap>) -> Result<Self> {
        let mut plan = Self::new();
        for (spec, vmap) in literal {
            plan.insert(VolumeBinding::parse(&spec)?, vmap);
        }
        Ok(plan)
    }

    /// Collapse all assignments into one map for resource accounting.
    pub fn into_volume_map(&self) -> VolumeMap {
        let mut merged: HashMap<String, i64> = HashMap::new();
        for vmap in self.0.values() {
            for (resource, size) in &vmap.0 {
                *merged.entry(resource.clone()).or_insert(0) += size;
            }
        }
        VolumeMap(merged)
    }
}

impl Serialize for VolumePlan {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_literal().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VolumePlan {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let literal = HashMap::<String, VolumeMap>::deserialize(deserializer)?;
        VolumePlan::from_literal(literal).map_err(D::Error::custom)
    }
}
