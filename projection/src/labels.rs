use std::collections::HashMap;
use std::iter::FromIterator;

use readers::{ScanError, ScanResult};

/// Semantic class of a point, the lower 16 bits of a packed label
pub type SemanticId = u16;
/// Object instance of a point, the upper 16 bits of a packed label. 0 means "no instance"
pub type InstanceId = u16;

const SEMANTIC_MASK: u32 = 0xFFFF;
const INSTANCE_SHIFT: u32 = 16;

/// Splits a packed 32-bit label into its semantic and instance parts
#[inline]
pub fn decode_label(label: u32) -> (SemanticId, InstanceId) {
    (
        (label & SEMANTIC_MASK) as SemanticId,
        (label >> INSTANCE_SHIFT) as InstanceId,
    )
}

/// Inverse of `decode_label`
#[inline]
pub fn encode_label(semantic: SemanticId, instance: InstanceId) -> u32 {
    semantic as u32 + ((instance as u32) << INSTANCE_SHIFT)
}

/// Mapping from raw semantic ids to a reduced set of target classes. Ids without an entry map to themselves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassRemapTable {
    mapping: HashMap<SemanticId, SemanticId>,
}

impl ClassRemapTable {
    pub fn new(mapping: HashMap<SemanticId, SemanticId>) -> Self {
        Self { mapping }
    }

    pub fn map(&self, id: SemanticId) -> SemanticId {
        self.mapping.get(&id).copied().unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

impl FromIterator<(SemanticId, SemanticId)> for ClassRemapTable {
    fn from_iter<T: IntoIterator<Item = (SemanticId, SemanticId)>>(iter: T) -> Self {
        Self {
            mapping: iter.into_iter().collect(),
        }
    }
}

/// Rewrites every id in `semantic_ids` that has an entry in `table`. Each id is looked up exactly once, so chained
/// mappings (a -> b, b -> c) are not followed
pub fn remap(semantic_ids: &mut [SemanticId], table: &ClassRemapTable) {
    for id in semantic_ids.iter_mut() {
        *id = table.map(*id);
    }
}

/// Per-point semantic and instance ids of one scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelContext {
    semantic: Vec<SemanticId>,
    instance: Vec<InstanceId>,
}

impl LabelContext {
    /// Decodes packed labels for a scan with `point_count` points. Fails with `CountMismatch` if there is not
    /// exactly one label per point
    pub fn from_packed(labels: &[u32], point_count: usize) -> ScanResult<Self> {
        if labels.len() != point_count {
            return Err(ScanError::CountMismatch {
                points: point_count,
                labels: labels.len(),
            });
        }

        let (semantic, instance): (Vec<_>, Vec<_>) =
            labels.iter().map(|label| decode_label(*label)).unzip();

        assert!(
            labels
                .iter()
                .zip(semantic.iter().zip(instance.iter()))
                .all(|(label, (sem, inst))| encode_label(*sem, *inst) == *label),
            "Decomposed labels do not reconstruct the packed labels"
        );

        Ok(Self { semantic, instance })
    }

    /// Applies a class remapping to all semantic ids. Instance ids are left untouched
    pub fn remap(&mut self, table: &ClassRemapTable) {
        remap(&mut self.semantic, table);
    }

    pub fn len(&self) -> usize {
        self.semantic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.semantic.is_empty()
    }

    pub fn semantic_ids(&self) -> &[SemanticId] {
        &self.semantic
    }

    pub fn instance_ids(&self) -> &[InstanceId] {
        &self.instance
    }

    pub fn semantic(&self, point_index: usize) -> SemanticId {
        self.semantic[point_index]
    }

    pub fn instance(&self, point_index: usize) -> InstanceId {
        self.instance[point_index]
    }
}
