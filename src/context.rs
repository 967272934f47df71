//! Per-task mutable state
//!
//! The geometry is shared read-only between tasks. Everything a lookup or a
//! tracking step mutates lives in a [`TaskContext`] owned by exactly one
//! task and passed down by `&mut`.

use crate::float_types::Real;
use crate::geometry::MaterialId;
use crate::locate::LocationCache;
use crate::tracking::{DeltaCounters, ParticleType};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
struct XsEntry {
    particle: ParticleType,
    energy: Real,
    xs: Real,
}

/// Last total cross section evaluated per material.
#[derive(Debug, Clone, Default)]
pub struct XsCache {
    entries: Vec<Option<XsEntry>>,
}

impl XsCache {
    pub fn get(&self, material: MaterialId, particle: ParticleType, energy: Real) -> Option<Real> {
        match self.entries.get(material.0).copied().flatten() {
            Some(e) if e.particle == particle && e.energy == energy => Some(e.xs),
            _ => None,
        }
    }

    pub fn insert(&mut self, material: MaterialId, particle: ParticleType, energy: Real, xs: Real) {
        if self.entries.len() <= material.0 {
            self.entries.resize(material.0 + 1, None);
        }
        self.entries[material.0] = Some(XsEntry { particle, energy, xs });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone)]
pub struct TaskContext {
    id: usize,
    rng: ChaCha8Rng,
    cache: LocationCache,
    xs_cache: XsCache,
    counters: DeltaCounters,
    plot_mode: bool,
}

impl TaskContext {
    /// Context of task `id`. Tasks sharing a `seed` draw from independent
    /// streams of the same generator, so every task is reproducible on its own.
    pub fn new(id: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(id as u64);
        Self {
            id,
            rng,
            cache: LocationCache::new(),
            xs_cache: XsCache::default(),
            counters: DeltaCounters::default(),
            plot_mode: false,
        }
    }

    pub const fn id(&self) -> usize {
        self.id
    }

    /// Uniform draw in `[0, 1)`.
    #[inline]
    pub fn uniform(&mut self) -> Real {
        self.rng.gen_range(0.0..1.0)
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub const fn cache(&self) -> &LocationCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut LocationCache {
        &mut self.cache
    }

    pub fn xs_cache_mut(&mut self) -> &mut XsCache {
        &mut self.xs_cache
    }

    pub const fn counters(&self) -> &DeltaCounters {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut DeltaCounters {
        &mut self.counters
    }

    pub const fn plot_mode(&self) -> bool {
        self.plot_mode
    }

    /// Switch between transport and plot (diagnostic) lookups. Caches are
    /// reset whenever the mode actually changes.
    pub fn set_plot_mode(&mut self, on: bool) {
        if self.plot_mode != on {
            self.plot_mode = on;
            self.reset_caches();
        }
    }

    pub fn reset_caches(&mut self) {
        self.cache.reset();
        self.xs_cache.clear();
    }
}
