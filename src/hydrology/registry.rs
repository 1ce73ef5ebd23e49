//! Global water body registry.
//!
//! A disjoint-set over `WaterBodyId`s. Chunks register their components and
//! border labels as they are produced; components that face each other
//! across a chunk edge are unioned. Union is monotonic toward Ocean and the
//! root is always the smallest member id, so the final state does not depend
//! on the order chunks arrive in.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::labeling::{BorderLabels, WaterBodyId, WaterBodyKind, WaterComponent};
use crate::coords::{ChunkCoord, Edge};

/// A resolved water body (the union of its member components).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaterBody {
    /// Canonical id (smallest member)
    pub id: WaterBodyId,
    pub kind: WaterBodyKind,
    /// Tiles across all registered members
    pub tile_count: u64,
    pub min_elevation: f32,
    /// Chunks holding at least one member tile
    pub chunks: BTreeSet<ChunkCoord>,
}

impl WaterBody {
    fn from_component(chunk: ChunkCoord, component: &WaterComponent) -> Self {
        Self {
            id: component.id,
            kind: component.initial_kind(),
            tile_count: component.tile_count as u64,
            min_elevation: component.min_elevation,
            chunks: BTreeSet::from([chunk]),
        }
    }

    /// Large enclosed water. Only a label: the kind stays Lake.
    pub fn is_inland_sea(&self, min_tiles: u64) -> bool {
        self.kind == WaterBodyKind::Lake && min_tiles > 0 && self.tile_count >= min_tiles
    }
}

/// Kind of a body as persisted alongside a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaterBodyRecord {
    pub id: WaterBodyId,
    pub kind: WaterBodyKind,
}

/// What changed when a chunk was registered.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegistrationReport {
    /// Components newly added
    pub added: usize,
    /// Unions that joined two previously separate bodies
    pub merges: usize,
    /// Roots of bodies that turned from Lake into Ocean
    pub promoted: Vec<WaterBodyId>,
}

/// Statistics about registered water bodies
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WaterBodyStats {
    pub ocean_count: usize,
    pub ocean_tiles: u64,
    pub lake_count: usize,
    pub lake_tiles: u64,
    pub smallest_lake: u64,
    pub largest_lake: u64,
    pub avg_lake_size: f32,
    pub inland_seas: usize,
}

impl WaterBodyStats {
    pub fn total_water_tiles(&self) -> u64 {
        self.ocean_tiles + self.lake_tiles
    }
}

/// Disjoint-set registry of water bodies plus the border index.
#[derive(Default)]
pub struct WaterBodyRegistry {
    parents: HashMap<WaterBodyId, WaterBodyId>,
    /// Body data, keyed by root
    bodies: HashMap<WaterBodyId, WaterBody>,
    /// Border labels of every chunk ever registered (kept after eviction)
    borders: HashMap<ChunkCoord, BorderLabels>,
    integrated: HashSet<ChunkCoord>,
    resident: HashSet<ChunkCoord>,
    /// Non-resident chunks whose stored water biomes are out of date
    pending_reconcile: HashSet<ChunkCoord>,
}

impl WaterBodyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chunk's components and union them with neighbours across
    /// shared edges. Registering the same chunk twice is a no-op.
    pub fn integrate_chunk(
        &mut self,
        chunk: ChunkCoord,
        components: &[WaterComponent],
        border: &BorderLabels,
    ) -> RegistrationReport {
        let mut report = RegistrationReport::default();
        if !self.integrated.insert(chunk) {
            return report;
        }

        for component in components {
            if self.parents.contains_key(&component.id) {
                continue;
            }
            self.parents.insert(component.id, component.id);
            self.bodies
                .insert(component.id, WaterBody::from_component(chunk, component));
            report.added += 1;
        }

        let mut pairs = Vec::new();
        for edge in Edge::ALL {
            if let Some(theirs) = self.borders.get(&chunk.neighbor(edge)) {
                pairs.extend(border.facing_pairs(edge, theirs));
            }
        }
        self.borders.insert(chunk, border.clone());

        for (a, b) in pairs {
            self.union(a, b, &mut report);
        }

        report
    }

    /// Root of `id`, with path compression. Unknown ids are their own root.
    pub fn find(&mut self, id: WaterBodyId) -> WaterBodyId {
        let mut root = id;
        while let Some(&parent) = self.parents.get(&root) {
            if parent == root {
                break;
            }
            root = parent;
        }

        let mut current = id;
        while current != root {
            match self.parents.insert(current, root) {
                Some(next) => current = next,
                None => break,
            }
        }
        root
    }

    /// Canonical id and kind. Ids not registered yet resolve to themselves
    /// as a Lake.
    pub fn resolve(&mut self, id: WaterBodyId) -> (WaterBodyId, WaterBodyKind) {
        let root = self.find(id);
        let kind = self
            .bodies
            .get(&root)
            .map_or(WaterBodyKind::Lake, |b| b.kind);
        (root, kind)
    }

    pub fn body(&mut self, id: WaterBodyId) -> Option<&WaterBody> {
        let root = self.find(id);
        self.bodies.get(&root)
    }

    pub fn bodies(&self) -> impl Iterator<Item = &WaterBody> {
        self.bodies.values()
    }

    /// Join the bodies of `a` and `b`. Returns false if already joined or
    /// either id is unknown.
    fn union(&mut self, a: WaterBodyId, b: WaterBodyId, report: &mut RegistrationReport) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb || !self.bodies.contains_key(&ra) || !self.bodies.contains_key(&rb) {
            return false;
        }

        let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
        let Some(child_body) = self.bodies.remove(&child) else {
            return false;
        };
        self.parents.insert(child, root);

        let mut promoted_chunks = Vec::new();
        let promoted = {
            let Some(root_body) = self.bodies.get_mut(&root) else {
                return false;
            };
            let merged = root_body.kind.merge(child_body.kind);
            if merged == WaterBodyKind::Ocean {
                if root_body.kind == WaterBodyKind::Lake {
                    promoted_chunks.extend(root_body.chunks.iter().copied());
                }
                if child_body.kind == WaterBodyKind::Lake {
                    promoted_chunks.extend(child_body.chunks.iter().copied());
                }
            }
            let promoted = merged != root_body.kind || merged != child_body.kind;

            root_body.kind = merged;
            root_body.tile_count += child_body.tile_count;
            root_body.min_elevation = root_body.min_elevation.min(child_body.min_elevation);
            root_body.chunks.extend(child_body.chunks);
            promoted
        };

        if promoted {
            self.note_promotion(root, promoted_chunks, report);
        }
        report.merges += 1;
        true
    }

    /// Force a body to Ocean (used when restoring persisted kinds).
    pub fn mark_ocean(&mut self, id: WaterBodyId) -> bool {
        let root = self.find(id);
        let Some(body) = self.bodies.get_mut(&root) else {
            return false;
        };
        if body.kind == WaterBodyKind::Ocean {
            return false;
        }
        body.kind = WaterBodyKind::Ocean;
        let chunks: Vec<ChunkCoord> = body.chunks.iter().copied().collect();
        self.note_promotion(root, chunks, &mut RegistrationReport::default());
        true
    }

    fn note_promotion(
        &mut self,
        root: WaterBodyId,
        chunks: Vec<ChunkCoord>,
        report: &mut RegistrationReport,
    ) {
        for chunk in chunks {
            if !self.resident.contains(&chunk) {
                self.pending_reconcile.insert(chunk);
            }
        }
        report.promoted.push(root);
    }

    /// Apply persisted kinds of bodies a reloaded chunk references.
    pub fn restore_records(&mut self, records: &[WaterBodyRecord]) {
        for record in records {
            if record.kind == WaterBodyKind::Ocean {
                self.mark_ocean(record.id);
            }
        }
    }

    /// Current kind of each id, for persisting alongside a chunk.
    pub fn records_for(&mut self, ids: impl IntoIterator<Item = WaterBodyId>) -> Vec<WaterBodyRecord> {
        ids.into_iter()
            .map(|id| WaterBodyRecord {
                id,
                kind: self.resolve(id).1,
            })
            .collect()
    }

    pub fn set_resident(&mut self, chunk: ChunkCoord, resident: bool) {
        if resident {
            self.resident.insert(chunk);
        } else {
            self.resident.remove(&chunk);
        }
    }

    /// Whether a chunk's stored water biomes must be refreshed, clearing the flag.
    pub fn take_pending_reconcile(&mut self, chunk: ChunkCoord) -> bool {
        self.pending_reconcile.remove(&chunk)
    }

    pub fn pending_reconcile_count(&self) -> usize {
        self.pending_reconcile.len()
    }

    /// Statistics over all registered bodies.
    pub fn stats(&self, inland_sea_min_tiles: u64) -> WaterBodyStats {
        let mut stats = WaterBodyStats {
            smallest_lake: u64::MAX,
            ..WaterBodyStats::default()
        };

        for body in self.bodies.values() {
            match body.kind {
                WaterBodyKind::Ocean => {
                    stats.ocean_count += 1;
                    stats.ocean_tiles += body.tile_count;
                }
                WaterBodyKind::Lake => {
                    stats.lake_count += 1;
                    stats.lake_tiles += body.tile_count;
                    stats.smallest_lake = stats.smallest_lake.min(body.tile_count);
                    stats.largest_lake = stats.largest_lake.max(body.tile_count);
                    if body.is_inland_sea(inland_sea_min_tiles) {
                        stats.inland_seas += 1;
                    }
                }
            }
        }

        if stats.lake_count > 0 {
            stats.avg_lake_size = stats.lake_tiles as f32 / stats.lake_count as f32;
        } else {
            stats.smallest_lake = 0;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::labeling::label_components;
    use crate::tilemap::Tilemap;

    /// Label a grid as chunk `coord`, anchoring nothing unless `anchored`.
    fn labels(coord: ChunkCoord, rows: &[Vec<f32>], anchored: bool) -> (Vec<WaterComponent>, BorderLabels) {
        let grid = Tilemap::from_rows(rows);
        let labels = label_components(&grid, 0.0, coord, |_, _| anchored);
        (labels.components, labels.border)
    }

    #[test]
    fn test_union_across_edge_promotes_to_ocean() {
        let left = ChunkCoord::new(0, 0);
        let right = ChunkCoord::new(1, 0);
        let (lc, lb) = labels(left, &[vec![1.0, -1.0], vec![1.0, 1.0]], false);
        let (rc, rb) = labels(right, &[vec![-1.0, -1.0], vec![1.0, 1.0]], true);

        let mut registry = WaterBodyRegistry::new();
        registry.set_resident(left, true);
        let first = registry.integrate_chunk(left, &lc, &lb);
        assert_eq!(first.added, 1);
        assert_eq!(registry.resolve(lc[0].id).1, WaterBodyKind::Lake);

        let second = registry.integrate_chunk(right, &rc, &rb);
        assert_eq!(second.merges, 1);
        assert_eq!(second.promoted, vec![lc[0].id]);

        let (root, kind) = registry.resolve(rc[0].id);
        assert_eq!(root, lc[0].id);
        assert_eq!(kind, WaterBodyKind::Ocean);
        let body = registry.body(root).unwrap();
        assert_eq!(body.tile_count, 3);
        assert_eq!(body.chunks.len(), 2);
    }

    #[test]
    fn test_order_independent_roots() {
        let a = ChunkCoord::new(0, 0);
        let b = ChunkCoord::new(0, 1);
        let (ac, ab) = labels(a, &[vec![1.0, 1.0], vec![-1.0, 1.0]], false);
        let (bc, bb) = labels(b, &[vec![-1.0, 1.0], vec![1.0, 1.0]], false);

        let mut forward = WaterBodyRegistry::new();
        forward.integrate_chunk(a, &ac, &ab);
        forward.integrate_chunk(b, &bc, &bb);

        let mut backward = WaterBodyRegistry::new();
        backward.integrate_chunk(b, &bc, &bb);
        backward.integrate_chunk(a, &ac, &ab);

        assert_eq!(forward.resolve(bc[0].id), backward.resolve(bc[0].id));
        assert_eq!(forward.resolve(ac[0].id), backward.resolve(ac[0].id));
        assert_eq!(forward.resolve(bc[0].id).0, ac[0].id);
    }

    #[test]
    fn test_ocean_never_reverts() {
        let a = ChunkCoord::new(0, 0);
        let b = ChunkCoord::new(1, 0);
        let (ac, ab) = labels(a, &[vec![1.0, -1.0], vec![1.0, -1.0]], true);
        let (bc, bb) = labels(b, &[vec![-1.0, 1.0], vec![-1.0, 1.0]], false);

        let mut registry = WaterBodyRegistry::new();
        registry.integrate_chunk(a, &ac, &ab);
        let report = registry.integrate_chunk(b, &bc, &bb);
        assert_eq!(registry.resolve(bc[0].id).1, WaterBodyKind::Ocean);
        assert_eq!(report.promoted, vec![ac[0].id]);
        assert!(!registry.mark_ocean(bc[0].id));
    }

    #[test]
    fn test_promotion_of_evicted_chunk_is_pending() {
        let a = ChunkCoord::new(0, 0);
        let b = ChunkCoord::new(1, 0);
        let (ac, ab) = labels(a, &[vec![1.0, -1.0], vec![1.0, 1.0]], false);
        let (bc, bb) = labels(b, &[vec![-1.0, 1.0], vec![1.0, 1.0]], true);

        let mut registry = WaterBodyRegistry::new();
        registry.set_resident(a, true);
        registry.integrate_chunk(a, &ac, &ab);
        registry.set_resident(a, false);

        registry.set_resident(b, true);
        registry.integrate_chunk(b, &bc, &bb);

        assert_eq!(registry.pending_reconcile_count(), 1);
        assert!(registry.take_pending_reconcile(a));
        assert!(!registry.take_pending_reconcile(a));
        assert!(!registry.take_pending_reconcile(b));
    }

    #[test]
    fn test_reintegration_is_noop() {
        let a = ChunkCoord::new(0, 0);
        let (ac, ab) = labels(a, &[vec![-1.0, 1.0], vec![1.0, 1.0]], false);
        let mut registry = WaterBodyRegistry::new();
        registry.integrate_chunk(a, &ac, &ab);
        let again = registry.integrate_chunk(a, &ac, &ab);
        assert_eq!(again, RegistrationReport::default());
        assert_eq!(registry.body(ac[0].id).unwrap().tile_count, 1);
    }

    #[test]
    fn test_records_round_trip_kind() {
        let a = ChunkCoord::new(3, 3);
        let (ac, ab) = labels(a, &[vec![-1.0, 1.0], vec![1.0, 1.0]], false);

        let mut registry = WaterBodyRegistry::new();
        registry.integrate_chunk(a, &ac, &ab);
        registry.mark_ocean(ac[0].id);
        let records = registry.records_for([ac[0].id]);

        let mut fresh = WaterBodyRegistry::new();
        fresh.integrate_chunk(a, &ac, &ab);
        assert_eq!(fresh.resolve(ac[0].id).1, WaterBodyKind::Lake);
        fresh.restore_records(&records);
        assert_eq!(fresh.resolve(ac[0].id).1, WaterBodyKind::Ocean);
    }

    #[test]
    fn test_unknown_id_resolves_to_lake() {
        let mut registry = WaterBodyRegistry::new();
        let id = WaterBodyId::terminal_lake(ChunkCoord::new(9, 9), 4);
        assert_eq!(registry.resolve(id), (id, WaterBodyKind::Lake));
        assert!(registry.body(id).is_none());
    }

    #[test]
    fn test_stats() {
        let a = ChunkCoord::new(0, 0);
        let (ac, ab) = labels(
            a,
            &[
                vec![-1.0, 1.0, -1.0],
                vec![-1.0, 1.0, 1.0],
                vec![1.0, 1.0, 1.0],
            ],
            false,
        );
        let mut registry = WaterBodyRegistry::new();
        registry.integrate_chunk(a, &ac, &ab);

        let stats = registry.stats(2);
        assert_eq!(stats.lake_count, 2);
        assert_eq!(stats.lake_tiles, 3);
        assert_eq!(stats.smallest_lake, 1);
        assert_eq!(stats.largest_lake, 2);
        assert_eq!(stats.inland_seas, 1);
        assert_eq!(stats.total_water_tiles(), 3);
        assert!((stats.avg_lake_size - 1.5).abs() < 1e-6);
    }
}
