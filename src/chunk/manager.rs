//! Chunk lifecycle: on-demand generation, caching, eviction and reload.
//!
//! Each coordinate has at most one slot: absent (Unloaded), `Generating`
//! (claimed by exactly one thread) or `Ready`. Callers that find a
//! `Generating` slot wait on a condition variable until it is published.
//! The slot table is the only synchronization point for the lifecycle; the
//! water body registry has its own lock and is never taken before the table.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, trace, warn};
use parking_lot::{Condvar, Mutex};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::biomes::Biome;
use crate::cache::CacheStats;
use crate::config::WorldConfig;
use crate::coords::{ChunkBounds, ChunkCoord, TileCoord};
use crate::error::WorldError;
use crate::hydrology::{WaterBody, WaterBodyId, WaterBodyRecord, WaterBodyRegistry, WaterBodyStats};
use crate::world::GenerationContext;

use super::pipeline::GenerationCaches;
use super::storage::ChunkStorage;
use super::{water_biome, Chunk, ChunkEvent, ChunkState, Tile};

enum Slot {
    Generating,
    Ready(Arc<Chunk>),
}

#[derive(Default)]
struct SlotTable {
    slots: HashMap<ChunkCoord, Slot>,
    /// Generating chunks outside the active area, evicted as they publish
    evict_on_publish: HashSet<ChunkCoord>,
}

/// Result of moving the active area.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AreaUpdate {
    /// Chunks queued on the worker pool
    pub scheduled: usize,
    /// Ready chunks dropped from memory
    pub evicted: usize,
    /// Generating chunks that will be dropped once they publish
    pub deferred: usize,
}

struct Shared {
    ctx: Arc<GenerationContext>,
    caches: GenerationCaches,
    table: Mutex<SlotTable>,
    published: Condvar,
    registry: Mutex<WaterBodyRegistry>,
    storage: Option<ChunkStorage>,
    stats: Mutex<CacheStats>,
    subscribers: Mutex<Vec<Sender<ChunkEvent>>>,
}

/// Releases a claimed `Generating` slot if production unwinds, so waiters
/// retry instead of sleeping forever.
struct Claim<'a> {
    shared: &'a Shared,
    coord: ChunkCoord,
    armed: bool,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut table = self.shared.table.lock();
            table.slots.remove(&self.coord);
            table.evict_on_publish.remove(&self.coord);
            self.shared.published.notify_all();
        }
    }
}

impl Shared {
    /// Return the Ready chunk, producing it on this thread if nobody else is.
    fn load(&self, coord: ChunkCoord) -> Arc<Chunk> {
        {
            let mut table = self.table.lock();
            loop {
                let ready = match table.slots.get(&coord) {
                    Some(Slot::Ready(chunk)) => Some(Arc::clone(chunk)),
                    Some(Slot::Generating) => None,
                    None => break,
                };
                if let Some(chunk) = ready {
                    drop(table);
                    self.stats.lock().hits += 1;
                    return chunk;
                }
                self.published.wait(&mut table);
            }
            table.slots.insert(coord, Slot::Generating);
        }
        self.stats.lock().misses += 1;

        let mut claim = Claim {
            shared: self,
            coord,
            armed: true,
        };
        let chunk = self.produce(coord);
        claim.armed = false;

        self.publish(coord, chunk)
    }

    /// Read the chunk back from disk if possible, otherwise generate it.
    fn produce(&self, coord: ChunkCoord) -> Chunk {
        let start = Instant::now();

        if let Some(storage) = &self.storage {
            match storage.load_chunk(coord) {
                Ok(Some(persisted)) => {
                    let mut chunk = persisted.chunk;
                    self.integrate(&mut chunk, &persisted.water_bodies);
                    self.stats.lock().disk_loads += 1;
                    debug!("loaded chunk {coord} from disk in {:.1?}", start.elapsed());
                    return chunk;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!("discarding persisted chunk {coord}: {err}");
                    if let Err(e) = storage.delete_chunk(coord) {
                        warn!("could not delete {}: {e}", storage.chunk_path(coord).display());
                    }
                    self.stats.lock().discarded += 1;
                    self.emit(ChunkEvent::Discarded {
                        coord,
                        reason: err.to_string(),
                    });
                }
            }
        }

        let mut chunk = self.caches.generate(&self.ctx, coord);
        self.integrate(&mut chunk, &[]);
        self.stats.lock().generated += 1;
        debug!(
            "generated chunk {coord} in {:.1?} ({} water components, {} rivers)",
            start.elapsed(),
            chunk.hydrology.components.len(),
            chunk.rivers.len()
        );
        chunk
    }

    /// Merge the chunk into the registry and bring its water biomes up to date.
    fn integrate(&self, chunk: &mut Chunk, records: &[WaterBodyRecord]) {
        let coord = chunk.coord;
        let mut registry = self.registry.lock();
        let report =
            registry.integrate_chunk(coord, &chunk.hydrology.components, &chunk.hydrology.border);
        registry.restore_records(records);

        if registry.take_pending_reconcile(coord) {
            debug!("chunk {coord} has water promoted while it was unloaded");
        }
        let changed = chunk.refresh_water_biomes(|id| registry.resolve(id).1);
        registry.set_resident(coord, true);

        if report.merges > 0 || changed > 0 {
            trace!(
                "chunk {coord}: {} merges, {} promotions, {changed} tiles refreshed",
                report.merges,
                report.promoted.len()
            );
        }
    }

    fn publish(&self, coord: ChunkCoord, chunk: Chunk) -> Arc<Chunk> {
        let chunk = Arc::new(chunk);
        let evict_now = {
            let mut table = self.table.lock();
            table.slots.insert(coord, Slot::Ready(Arc::clone(&chunk)));
            self.published.notify_all();
            table.evict_on_publish.remove(&coord)
        };

        self.emit(ChunkEvent::Ready(coord));
        if evict_now {
            self.evict(coord);
        }
        chunk
    }

    /// Drop a Ready chunk, persisting it when storage is configured.
    fn evict(&self, coord: ChunkCoord) -> bool {
        let (chunk, records) = {
            let mut table = self.table.lock();
            let chunk = match table.slots.remove(&coord) {
                Some(Slot::Ready(chunk)) => chunk,
                Some(generating) => {
                    table.slots.insert(coord, generating);
                    return false;
                }
                None => return false,
            };
            let mut registry = self.registry.lock();
            registry.set_resident(coord, false);
            let records = registry.records_for(chunk.water_ids());
            (chunk, records)
        };

        let persisted = match &self.storage {
            Some(storage) => match storage.save_chunk(&chunk, &records) {
                Ok(()) => {
                    self.stats.lock().disk_saves += 1;
                    true
                }
                Err(err) => {
                    warn!("failed to persist chunk {coord}: {err}");
                    false
                }
            },
            None => false,
        };

        self.stats.lock().evictions += 1;
        debug!("evicted chunk {coord} (persisted: {persisted})");
        self.emit(ChunkEvent::Evicted { coord, persisted });
        true
    }

    fn emit(&self, event: ChunkEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn state(&self, coord: ChunkCoord) -> ChunkState {
        match self.table.lock().slots.get(&coord) {
            None => ChunkState::Unloaded,
            Some(Slot::Generating) => ChunkState::Generating,
            Some(Slot::Ready(_)) => ChunkState::Ready,
        }
    }
}

/// Owns every chunk of one world and streams them in and out of memory.
pub struct ChunkManager {
    shared: Arc<Shared>,
    pool: ThreadPool,
}

impl ChunkManager {
    pub fn new(config: WorldConfig) -> Result<Self, WorldError> {
        let ctx = GenerationContext::new(config)?;
        Self::with_context(Arc::new(ctx))
    }

    pub fn with_context(ctx: Arc<GenerationContext>) -> Result<Self, WorldError> {
        let config = ctx.config();
        let runtime = &config.runtime;

        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("chunk-gen-{i}"));
        if runtime.worker_threads > 0 {
            builder = builder.num_threads(runtime.worker_threads);
        }
        let pool = builder.build()?;

        let storage = runtime
            .storage_dir
            .as_ref()
            .map(|dir| ChunkStorage::new(dir, config.seed, config.chunk_size));

        info!(
            "chunk manager ready: seed {}, {}-tile chunks, {} workers, persistence {}",
            config.seed,
            config.chunk_size,
            pool.current_num_threads(),
            if storage.is_some() { "on" } else { "off" }
        );

        let shared = Shared {
            caches: GenerationCaches::new(&ctx),
            ctx,
            table: Mutex::new(SlotTable::default()),
            published: Condvar::new(),
            registry: Mutex::new(WaterBodyRegistry::new()),
            storage,
            stats: Mutex::new(CacheStats::default()),
            subscribers: Mutex::new(Vec::new()),
        };

        Ok(Self {
            shared: Arc::new(shared),
            pool,
        })
    }

    pub fn context(&self) -> &Arc<GenerationContext> {
        &self.shared.ctx
    }

    /// Block until the chunk is Ready, generating it on this thread if no
    /// one else is already doing so.
    pub fn ensure_loaded(&self, coord: ChunkCoord) -> Result<Arc<Chunk>, WorldError> {
        self.shared.ctx.validate_chunk(coord)?;
        Ok(self.shared.load(coord))
    }

    /// Queue the chunk on the worker pool without waiting.
    pub fn request(&self, coord: ChunkCoord) -> Result<(), WorldError> {
        self.shared.ctx.validate_chunk(coord)?;
        if self.shared.state(coord) == ChunkState::Unloaded {
            self.spawn_load(coord);
        }
        Ok(())
    }

    fn spawn_load(&self, coord: ChunkCoord) {
        let shared = Arc::clone(&self.shared);
        self.pool.spawn(move || {
            shared.load(coord);
        });
    }

    /// Snapshot of one tile, with its water body resolved to the canonical id.
    pub fn query_tile(&self, tile: TileCoord) -> Result<Tile, WorldError> {
        let ctx = &self.shared.ctx;
        ctx.validate_tile(tile)?;
        let chunk = self.ensure_loaded(tile.chunk(ctx.chunk_size()))?;

        let (x, y) = tile.local(ctx.chunk_size());
        let data = chunk.tiles.get(x, y);
        let resolved = data
            .water_body
            .map(|id| self.shared.registry.lock().resolve(id));

        let biome = match (data.biome, resolved) {
            (Biome::Ocean | Biome::Lake, Some((_, kind))) => water_biome(kind),
            (biome, _) => biome,
        };

        Ok(Tile {
            coord: tile,
            elevation: data.elevation,
            temperature: data.temperature,
            moisture: data.moisture,
            biome,
            water_body: resolved.map(|(root, _)| root),
            water_kind: resolved.map(|(_, kind)| kind),
            river: data.river,
        })
    }

    pub fn chunk_bounds(&self, coord: ChunkCoord) -> Result<ChunkBounds, WorldError> {
        self.shared.ctx.validate_chunk(coord)?;
        Ok(self.shared.ctx.chunk_bounds(coord))
    }

    pub fn chunk_state(&self, coord: ChunkCoord) -> ChunkState {
        self.shared.state(coord)
    }

    /// Keep chunks within `radius` (Chebyshev) of `center`, queue the missing
    /// ones nearest first and evict the rest.
    pub fn set_active_center(&self, center: ChunkCoord, radius: u32) -> AreaUpdate {
        let ctx = &self.shared.ctx;
        let mut wanted: Vec<ChunkCoord> = center
            .square_around(radius)
            .filter(|c| ctx.contains_chunk(*c))
            .collect();
        wanted.sort_by_key(|c| (c.distance_sq(&center), c.y, c.x));

        let mut outside = {
            let mut table = self.shared.table.lock();
            let mut ready = Vec::new();
            let mut generating = HashSet::new();
            for (coord, slot) in &table.slots {
                if coord.chebyshev_distance(&center) <= radius {
                    continue;
                }
                match slot {
                    Slot::Ready(_) => ready.push(*coord),
                    Slot::Generating => {
                        generating.insert(*coord);
                    }
                }
            }
            table.evict_on_publish = generating;
            ready
        };
        outside.sort();

        let mut update = AreaUpdate {
            deferred: self.shared.table.lock().evict_on_publish.len(),
            ..AreaUpdate::default()
        };
        for coord in outside {
            if self.shared.evict(coord) {
                update.evicted += 1;
            }
        }
        for coord in wanted {
            if self.shared.state(coord) == ChunkState::Unloaded {
                self.spawn_load(coord);
                update.scheduled += 1;
            }
        }

        info!(
            "active center {center} radius {radius}: {} scheduled, {} evicted, {} deferred",
            update.scheduled, update.evicted, update.deferred
        );
        update
    }

    /// `set_active_center` with the configured `active_radius`.
    pub fn recenter(&self, center: ChunkCoord) -> AreaUpdate {
        self.set_active_center(center, self.shared.ctx.config().active_radius)
    }

    /// Evict one Ready chunk. Returns false if it was not Ready.
    pub fn evict(&self, coord: ChunkCoord) -> bool {
        self.shared.evict(coord)
    }

    /// Channel of lifecycle events from now on.
    pub fn subscribe(&self) -> Receiver<ChunkEvent> {
        let (tx, rx) = unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = *self.shared.stats.lock();
        stats.resident = self.resident_chunks().len();
        stats
    }

    /// Ready chunks, sorted.
    pub fn resident_chunks(&self) -> Vec<ChunkCoord> {
        let table = self.shared.table.lock();
        let mut coords: Vec<ChunkCoord> = table
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(coord, _)| *coord)
            .collect();
        coords.sort();
        coords
    }

    /// The body `id` currently belongs to.
    pub fn water_body(&self, id: WaterBodyId) -> Option<WaterBody> {
        self.shared.registry.lock().body(id).cloned()
    }

    /// Member tiles of the body `id` belongs to, sorted, from resident
    /// chunks only. Complete once every chunk the body spans is Ready.
    pub fn water_body_tiles(&self, id: WaterBodyId) -> Vec<TileCoord> {
        let (root, spans) = {
            let mut registry = self.shared.registry.lock();
            match registry.body(id) {
                Some(body) => (body.id, body.chunks.clone()),
                None => return Vec::new(),
            }
        };

        let resident: Vec<Arc<Chunk>> = {
            let table = self.shared.table.lock();
            spans
                .iter()
                .filter_map(|coord| match table.slots.get(coord) {
                    Some(Slot::Ready(chunk)) => Some(Arc::clone(chunk)),
                    _ => None,
                })
                .collect()
        };

        let mut registry = self.shared.registry.lock();
        let mut tiles = Vec::new();
        for chunk in resident {
            let origin = chunk.coord.origin(chunk.size());
            for (x, y, data) in chunk.tiles.iter() {
                // River tiles carry the id of the body they drain into
                if !matches!(data.biome, Biome::Ocean | Biome::Lake) {
                    continue;
                }
                if data.water_body.is_some_and(|member| registry.find(member) == root) {
                    tiles.push(origin.offset(x as i64, y as i64));
                }
            }
        }
        tiles.sort();
        tiles
    }

    pub fn water_body_stats(&self) -> WaterBodyStats {
        let min = self.shared.ctx.config().hydrology.inland_sea_min_tiles;
        self.shared.registry.lock().stats(min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::WorldBounds;
    use crate::heightmap::elevation_at;
    use crate::hydrology::WaterBodyKind;
    use std::collections::VecDeque;
    use std::sync::Barrier;
    use std::thread;

    fn config() -> WorldConfig {
        let mut config = WorldConfig {
            seed: 9,
            chunk_size: 16,
            bounds: Some(WorldBounds::new(4, 4)),
            edge_falloff_width: 10,
            ..WorldConfig::default()
        };
        config.runtime.worker_threads = 2;
        config.rivers.river_horizon = 1;
        config
    }

    fn all_chunks() -> Vec<ChunkCoord> {
        (0..4)
            .flat_map(|y| (0..4).map(move |x| ChunkCoord::new(x, y)))
            .collect()
    }

    fn chunk_snapshot(manager: &ChunkManager, coord: ChunkCoord) -> Vec<Tile> {
        let bounds = manager.chunk_bounds(coord).unwrap();
        let mut tiles = Vec::new();
        for y in bounds.min.y..bounds.max.y {
            for x in bounds.min.x..bounds.max.x {
                tiles.push(manager.query_tile(TileCoord::new(x, y)).unwrap());
            }
        }
        tiles
    }

    #[test]
    fn test_concurrent_ensure_loaded_generates_once() {
        let manager = ChunkManager::new(config()).unwrap();
        let barrier = Barrier::new(2);
        let coord = ChunkCoord::new(1, 2);

        let (a, b) = thread::scope(|s| {
            let first = s.spawn(|| {
                barrier.wait();
                manager.ensure_loaded(coord).unwrap()
            });
            let second = s.spawn(|| {
                barrier.wait();
                manager.ensure_loaded(coord).unwrap()
            });
            (first.join().unwrap(), second.join().unwrap())
        });

        assert!(Arc::ptr_eq(&a, &b));
        let stats = manager.stats();
        assert_eq!(stats.generated, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(manager.chunk_state(coord), ChunkState::Ready);
    }

    #[test]
    fn test_load_order_does_not_change_tiles() {
        let forward = ChunkManager::new(config()).unwrap();
        let backward = ChunkManager::new(config()).unwrap();

        let coords = all_chunks();
        for &coord in &coords {
            forward.ensure_loaded(coord).unwrap();
        }
        for &coord in coords.iter().rev() {
            backward.ensure_loaded(coord).unwrap();
        }

        for &coord in &coords {
            assert_eq!(chunk_snapshot(&forward, coord), chunk_snapshot(&backward, coord));
        }
        assert_eq!(forward.water_body_stats(), backward.water_body_stats());
    }

    #[test]
    fn test_ocean_tiles_connect_to_anchor() {
        let manager = ChunkManager::new(config()).unwrap();
        for coord in all_chunks() {
            manager.ensure_loaded(coord).unwrap();
        }
        let ctx = Arc::clone(manager.context());
        let n = 64;
        let below_sea = |t: TileCoord| manager.query_tile(t).unwrap().elevation < ctx.sea_level();

        // Reference flood from every anchored below-sea tile
        let mut reached = HashSet::new();
        let mut queue = VecDeque::new();
        for y in 0..n {
            for x in 0..n {
                let t = TileCoord::new(x, y);
                if ctx.is_anchor(t) && below_sea(t) && reached.insert(t) {
                    queue.push_back(t);
                }
            }
        }
        while let Some(t) = queue.pop_front() {
            for next in t.neighbors4() {
                if ctx.contains_tile(next) && below_sea(next) && reached.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        let mut oceans = 0;
        for y in 0..n {
            for x in 0..n {
                let tile = manager.query_tile(TileCoord::new(x, y)).unwrap();
                match tile.biome {
                    Biome::Ocean => {
                        oceans += 1;
                        assert!(
                            reached.contains(&tile.coord),
                            "ocean at {} is cut off",
                            tile.coord
                        );
                        assert_eq!(tile.water_kind, Some(WaterBodyKind::Ocean));
                    }
                    Biome::Lake => assert!(
                        !reached.contains(&tile.coord),
                        "lake at {} reaches the edge",
                        tile.coord
                    ),
                    _ => {}
                }
            }
        }
        assert!(oceans > 0);
    }

    #[test]
    fn test_eviction_round_trip_with_storage() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.runtime.storage_dir = Some(dir.path().to_path_buf());
        let manager = ChunkManager::new(config).unwrap();
        let events = manager.subscribe();

        let coord = ChunkCoord::new(0, 1);
        let before = chunk_snapshot(&manager, coord);

        let update = manager.set_active_center(ChunkCoord::new(3, 3), 0);
        assert_eq!(update.evicted, 1);
        assert_eq!(manager.chunk_state(coord), ChunkState::Unloaded);
        assert!(events
            .try_iter()
            .any(|e| e == ChunkEvent::Evicted { coord, persisted: true }));

        let after = chunk_snapshot(&manager, coord);
        assert_eq!(before, after);
        let stats = manager.stats();
        assert_eq!(stats.disk_saves, 1);
        assert_eq!(stats.disk_loads, 1);
    }

    #[test]
    fn test_eviction_round_trip_without_storage() {
        let manager = ChunkManager::new(config()).unwrap();
        let coord = ChunkCoord::new(2, 0);
        let before = chunk_snapshot(&manager, coord);

        assert!(manager.evict(coord));
        assert!(!manager.evict(coord));
        assert_eq!(manager.chunk_state(coord), ChunkState::Unloaded);

        let after = chunk_snapshot(&manager, coord);
        assert_eq!(before, after);
        assert_eq!(manager.stats().generated, 2);
    }

    #[test]
    fn test_corrupt_file_is_discarded_and_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.runtime.storage_dir = Some(dir.path().to_path_buf());
        let seed = config.seed;
        let manager = ChunkManager::new(config).unwrap();

        let coord = ChunkCoord::new(1, 1);
        let before = chunk_snapshot(&manager, coord);
        assert!(manager.evict(coord));

        let storage = ChunkStorage::new(dir.path(), seed, 16);
        std::fs::write(storage.chunk_path(coord), b"\x01\x02garbage").unwrap();

        let events = manager.subscribe();
        let after = chunk_snapshot(&manager, coord);
        assert_eq!(before, after);

        let discarded = events
            .try_iter()
            .any(|e| matches!(e, ChunkEvent::Discarded { coord: c, .. } if c == coord));
        assert!(discarded);
        assert_eq!(manager.stats().discarded, 1);
        assert!(!storage.chunk_exists(coord));
    }

    #[test]
    fn test_invalid_coordinates_are_rejected() {
        let manager = ChunkManager::new(config()).unwrap();
        assert!(matches!(
            manager.query_tile(TileCoord::new(-1, 0)),
            Err(WorldError::InvalidCoordinate { .. })
        ));
        assert!(manager.ensure_loaded(ChunkCoord::new(4, 0)).is_err());
        assert!(manager.request(ChunkCoord::new(0, -1)).is_err());

        let bounds = manager.chunk_bounds(ChunkCoord::new(1, 0)).unwrap();
        assert_eq!(bounds.min, TileCoord::new(16, 0));
        assert_eq!(bounds.max, TileCoord::new(32, 16));
    }

    #[test]
    fn test_request_and_wait_generates_once() {
        let manager = ChunkManager::new(config()).unwrap();
        let events = manager.subscribe();
        let coord = ChunkCoord::new(3, 0);

        manager.request(coord).unwrap();
        let chunk = manager.ensure_loaded(coord).unwrap();
        assert_eq!(chunk.coord, coord);
        assert_eq!(manager.stats().generated, 1);
        assert_eq!(events.recv().unwrap(), ChunkEvent::Ready(coord));
    }

    #[test]
    fn test_generating_chunk_outside_area_evicted_on_publish() {
        let manager = ChunkManager::new(config()).unwrap();
        let coord = ChunkCoord::new(2, 2);

        // Claim the slot the way a worker would, then move the area away
        manager
            .shared
            .table
            .lock()
            .slots
            .insert(coord, Slot::Generating);
        let update = manager.set_active_center(ChunkCoord::new(0, 0), 0);
        assert_eq!(update.deferred, 1);
        assert_eq!(manager.chunk_state(coord), ChunkState::Generating);

        let events = manager.subscribe();
        let chunk = manager.shared.produce(coord);
        manager.shared.publish(coord, chunk);

        assert_eq!(manager.chunk_state(coord), ChunkState::Unloaded);
        let events: Vec<ChunkEvent> = events.try_iter().collect();
        assert!(events.contains(&ChunkEvent::Ready(coord)));
        assert!(events.contains(&ChunkEvent::Evicted { coord, persisted: false }));
    }

    #[test]
    fn test_active_area_schedules_nearest_and_keeps_inside() {
        let manager = ChunkManager::new(config()).unwrap();
        manager.ensure_loaded(ChunkCoord::new(0, 0)).unwrap();
        manager.ensure_loaded(ChunkCoord::new(3, 3)).unwrap();

        let update = manager.set_active_center(ChunkCoord::new(0, 0), 1);
        assert_eq!(update.evicted, 1);
        assert_eq!(update.scheduled, 3);

        for coord in [ChunkCoord::new(1, 0), ChunkCoord::new(0, 1), ChunkCoord::new(1, 1)] {
            manager.ensure_loaded(coord).unwrap();
        }
        assert_eq!(
            manager.resident_chunks(),
            vec![
                ChunkCoord::new(0, 0),
                ChunkCoord::new(0, 1),
                ChunkCoord::new(1, 0),
                ChunkCoord::new(1, 1)
            ]
        );
    }

    #[test]
    fn test_far_unbounded_tile_is_invalid() {
        let mut config = config();
        config.bounds = None;
        let manager = ChunkManager::new(config).unwrap();

        let far = TileCoord::new((i32::MAX as i64 + 1) * 16 + 3, 5);
        assert!(matches!(
            manager.query_tile(far),
            Err(WorldError::InvalidCoordinate { .. })
        ));
        assert!(manager.query_tile(TileCoord::new(-far.x, 5)).is_err());
        assert!(manager.ensure_loaded(ChunkCoord::new(i32::MAX, 0)).is_err());

        // Area updates near the limit only schedule valid chunks
        let update = manager.set_active_center(ChunkCoord::new(i32::MAX, i32::MIN), 1);
        assert_eq!(update.scheduled, 0);
    }

    #[test]
    fn test_water_body_tiles_match_tile_count() {
        let manager = ChunkManager::new(config()).unwrap();
        for coord in all_chunks() {
            manager.ensure_loaded(coord).unwrap();
        }

        let mut roots = HashSet::new();
        for y in 0..64 {
            for x in 0..64 {
                let tile = manager.query_tile(TileCoord::new(x, y)).unwrap();
                if matches!(tile.biome, Biome::Ocean | Biome::Lake) {
                    roots.insert(tile.water_body.unwrap());
                }
            }
        }
        assert!(!roots.is_empty());

        for root in roots {
            let body = manager.water_body(root).unwrap();
            let tiles = manager.water_body_tiles(root);
            assert_eq!(tiles.len() as u64, body.tile_count, "body {root}");
            for tile in tiles {
                assert_eq!(manager.query_tile(tile).unwrap().water_body, Some(root));
            }
        }
    }

    #[test]
    fn test_water_body_tiles_skip_evicted_chunks() {
        let manager = ChunkManager::new(config()).unwrap();
        for coord in all_chunks() {
            manager.ensure_loaded(coord).unwrap();
        }
        let first = (0..64)
            .flat_map(|y| (0..64).map(move |x| TileCoord::new(x, y)))
            .map(|t| manager.query_tile(t).unwrap())
            .find(|t| t.biome == Biome::Ocean)
            .unwrap();
        let ocean = first.water_body.unwrap();
        let all = manager.water_body_tiles(ocean);
        assert!(all.contains(&first.coord));

        let evicted = first.coord.chunk(16);
        assert!(manager.evict(evicted));
        let partial = manager.water_body_tiles(ocean);
        assert!(partial.iter().all(|t| t.chunk(16) != evicted));
        assert_eq!(partial.len(), all.iter().filter(|t| t.chunk(16) != evicted).count());
        assert!(partial.len() < all.len());
    }

    #[test]
    fn test_reload_refreshes_water_promoted_while_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let mut base = config();
        base.bounds = None;
        base.sea_level = 0.15;
        base.hydrology.connectivity_horizon = 0;
        base.runtime.storage_dir = Some(dir.path().to_path_buf());

        // Find two below-sea tiles facing each other across a chunk edge
        let ctx = GenerationContext::new(base.clone()).unwrap();
        let sea = ctx.sea_level();
        let (lake_tile, seed_tile) = (-24..24)
            .flat_map(|cy| (-24..24).map(move |cx| ChunkCoord::new(cx, cy)))
            .flat_map(|c| (0..16).map(move |y| c.origin(16).offset(15, y)))
            .map(|t| (t, t.offset(1, 0)))
            .find(|&(a, b)| elevation_at(&ctx, a) < sea && elevation_at(&ctx, b) < sea)
            .expect("no water across a chunk edge");

        // The only anchor sits in the eastern neighbour
        let mut config = base;
        config.ocean_seeds = vec![seed_tile];
        let manager = ChunkManager::new(config).unwrap();
        let chunk_coord = lake_tile.chunk(16);
        let neighbour = seed_tile.chunk(16);

        let chunk = manager.ensure_loaded(chunk_coord).unwrap();
        let data = chunk.get(lake_tile).unwrap();
        assert_eq!(data.biome, Biome::Lake);
        let id = data.water_body.unwrap();
        drop(chunk);
        assert!(manager.evict(chunk_coord));

        manager.ensure_loaded(neighbour).unwrap();
        assert_eq!(manager.water_body(id).unwrap().kind, WaterBodyKind::Ocean);

        // Still Lake on disk
        let storage = ChunkStorage::new(dir.path(), 9, 16);
        let persisted = storage.load_chunk(chunk_coord).unwrap().unwrap();
        assert_eq!(persisted.chunk.get(lake_tile).unwrap().biome, Biome::Lake);

        let reloaded = manager.ensure_loaded(chunk_coord).unwrap();
        assert_eq!(manager.stats().disk_loads, 1);
        assert_eq!(reloaded.get(lake_tile).unwrap().biome, Biome::Ocean);
        let root = manager.water_body(id).unwrap().id;
        let mut members = reloaded.tiles.values().iter().filter(|t| {
            matches!(t.biome, Biome::Ocean | Biome::Lake)
                && t.water_body.and_then(|w| manager.water_body(w)).map(|b| b.id) == Some(root)
        });
        assert!(members.all(|t| t.biome == Biome::Ocean));
        assert_eq!(manager.query_tile(lake_tile).unwrap().biome, Biome::Ocean);
    }

    #[test]
    fn test_recenter_uses_configured_radius() {
        let mut config = config();
        config.active_radius = 1;
        let manager = ChunkManager::new(config).unwrap();
        let update = manager.recenter(ChunkCoord::new(0, 0));
        assert_eq!(update.scheduled, 4);
    }
}
