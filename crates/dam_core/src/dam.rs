//! Dams: layered material barriers with leaks, floods and erosion.
//!
//! A dam is an ordered stack of material sections holding back the
//! reservoir on its seaward side. Dams form a chain ordered by position;
//! the chain's sentinel head stands for the undammed shoreline, so "the
//! level behind the first dam" needs no special casing.
//!
//! Each tick a dam runs three phases in order: flood check, leak
//! activation, erosion. All dams finish their phases before the reservoir
//! graph moves any water, so activation decisions are always based on the
//! previous tick's levels.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DamError, Result};
use crate::flow::VisualFlow;
use crate::leak::Leak;
use crate::material::{Material, SECTION_HEIGHT};
use crate::reservoir::{ConnectionId, ReservoirGraph, ReservoirId};
use crate::world::{FlowChange, FlowKind, LeakSpawn, TickEvents};

/// Rate of the overflow connection a flooded dam opens.
pub const FLOOD_RATE: f32 = 0.1;

/// Rate a freshly created leak starts with.
pub const INITIAL_LEAK_RATE: f32 = 0.01;

/// Chance per second (for an eight-layer dam) of a leak forming
/// spontaneously; scales with dam size.
pub const NEW_LEAK_CHANCE: f32 = 0.05;

/// Layer count the spontaneous-leak chance is normalized against.
const BASELINE_LAYERS: f32 = 8.0;

/// Unique handle for a dam in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DamId(pub u32);

impl DamId {
    /// Create a new dam id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

/// How many leaks get an erosion update this tick.
///
/// One attempt per ten leaks plus one, never more than ten: per-tick cost
/// stays bounded while heavily breached dams erode collectively faster.
#[must_use]
pub fn erosion_attempts(leak_count: usize) -> usize {
    (leak_count / 10 + 1).min(10)
}

/// A layered barrier separating two reservoirs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dam {
    id: DamId,
    /// The reservoir this dam holds back (and floods into).
    level: ReservoirId,
    start_x: f32,
    end_x: f32,
    height: f32,
    /// Material layers, bottom to top. `height` is always
    /// `materials.len() * SECTION_HEIGHT`, and only ever grows.
    materials: Vec<Material>,
    leaks: Vec<Leak>,
    flood_connection: ConnectionId,
    flow: VisualFlow,
    /// Chain link toward the shoreline; `None` means the sentinel head.
    prev: Option<usize>,
    /// Chain link away from the shoreline.
    next: Option<usize>,
}

impl Dam {
    fn new(
        id: DamId,
        level: ReservoirId,
        flood_connection: ConnectionId,
        start_x: f32,
        end_x: f32,
        layers: usize,
        prev: Option<usize>,
        next: Option<usize>,
    ) -> Self {
        let height = layers as f32 * SECTION_HEIGHT;
        Self {
            id,
            level,
            start_x,
            end_x,
            height,
            materials: vec![Material::Wood; layers],
            leaks: Vec::new(),
            flood_connection,
            flow: VisualFlow::new(start_x, end_x, height),
            prev,
            next,
        }
    }

    // ACCESSORS

    /// Identity of this dam.
    #[must_use]
    pub const fn id(&self) -> DamId {
        self.id
    }

    /// The reservoir this dam holds back.
    #[must_use]
    pub const fn level(&self) -> ReservoirId {
        self.level
    }

    /// Lower horizontal bound.
    #[must_use]
    pub const fn start_x(&self) -> f32 {
        self.start_x
    }

    /// Upper horizontal bound.
    #[must_use]
    pub const fn end_x(&self) -> f32 {
        self.end_x
    }

    /// Current height. Only ever grows, one layer at a time.
    #[must_use]
    pub const fn height(&self) -> f32 {
        self.height
    }

    /// Number of material layers.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.materials.len()
    }

    /// Material layers, bottom to top, for rendering.
    #[must_use]
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Active leaks with their rates and positions.
    #[must_use]
    pub fn leaks(&self) -> &[Leak] {
        &self.leaks
    }

    /// Connection id of this dam's overflow.
    #[must_use]
    pub const fn flood_connection(&self) -> ConnectionId {
        self.flood_connection
    }

    /// Cosmetic emitter for the flood overflow.
    #[must_use]
    pub const fn flow(&self) -> &VisualFlow {
        &self.flow
    }

    /// Whether `x` lies within the dam itself.
    #[must_use]
    pub fn in_area(&self, x: f32) -> bool {
        self.start_x <= x && x < self.end_x
    }

    /// Material of the layer at height `y`, or `None` beyond the top.
    ///
    /// Like every lookup on this type, an out-of-range probe is a normal
    /// outcome, not an error: creature behaviors poll this every tick.
    #[must_use]
    pub fn get_material(&self, y: f32) -> Option<Material> {
        self.materials.get((y / SECTION_HEIGHT) as usize).copied()
    }

    /// Whether the water behind or before this dam stands above its crest.
    #[must_use]
    pub fn is_flooded(&self, graph: &ReservoirGraph, prev_level: ReservoirId) -> bool {
        if graph.level(self.level).unwrap_or(0.0) > self.height {
            return true;
        }
        graph.level(prev_level).unwrap_or(0.0) > self.height
    }

    /// The higher of the dam's own level and the level behind it.
    #[must_use]
    pub fn highest_level(&self, graph: &ReservoirGraph, prev_level: ReservoirId) -> f32 {
        let own = graph.level(self.level).unwrap_or(0.0);
        let prev = graph.level(prev_level).unwrap_or(0.0);
        own.max(prev)
    }

    // MANIPULATORS

    /// Phase 1: open or close the flood overflow.
    fn update_flooded(
        &mut self,
        graph: &mut ReservoirGraph,
        prev_level: ReservoirId,
        events: &mut TickEvents,
    ) -> Result<()> {
        let own = graph.level(self.level).unwrap_or(0.0);
        let prev = graph.level(prev_level).unwrap_or(0.0);
        if own > self.height || prev > self.height {
            self.flow.update_flow(FLOOD_RATE, own, prev);
            if !graph.have_connection(self.flood_connection) {
                graph.connect(self.flood_connection, self.level, prev_level, FLOOD_RATE, 0.0)?;
                tracing::trace!(dam = self.id.0, own, prev, "dam flooded");
                events.flows_opened.push(FlowChange {
                    dam: self.id,
                    connection: self.flood_connection,
                    kind: FlowKind::Flood,
                    rate: FLOOD_RATE,
                });
            }
        } else if graph.have_connection(self.flood_connection) {
            graph.disconnect(self.flood_connection)?;
            self.flow.cut_flow();
            events.flows_closed.push(FlowChange {
                dam: self.id,
                connection: self.flood_connection,
                kind: FlowKind::Flood,
                rate: 0.0,
            });
        }
        Ok(())
    }

    /// Phase 2: open connections for submerged leaks, close the rest.
    ///
    /// Deactivation stops the flow but keeps the leak (and its accumulated
    /// rate) for reactivation when the water rises again.
    fn update_leaks(
        &mut self,
        graph: &mut ReservoirGraph,
        prev_level: ReservoirId,
        events: &mut TickEvents,
    ) -> Result<()> {
        let highest = self.highest_level(graph, prev_level);
        let id = self.id;
        let own_level = self.level;
        for leak in &mut self.leaks {
            if leak.between(0.0, highest) {
                let rate = leak.rate();
                if leak.activate(graph, own_level, prev_level)? {
                    events.flows_opened.push(FlowChange {
                        dam: id,
                        connection: leak.connection(),
                        kind: FlowKind::Leak,
                        rate,
                    });
                }
            } else if leak.deactivate(graph)? {
                events.flows_closed.push(FlowChange {
                    dam: id,
                    connection: leak.connection(),
                    kind: FlowKind::Leak,
                    rate: 0.0,
                });
            }
        }
        Ok(())
    }

    /// Phase 3: erode a bounded random subset of the existing leaks, and
    /// occasionally breach spontaneously.
    fn step_erosion(
        &mut self,
        dt: f32,
        graph: &ReservoirGraph,
        prev_level: ReservoirId,
        rng: &mut ChaCha8Rng,
        next_connection: &mut u32,
        events: &mut TickEvents,
    ) {
        let water = self.highest_level(graph, prev_level);

        if !self.leaks.is_empty() {
            for _ in 0..erosion_attempts(self.leaks.len()) {
                let index = rng.gen_range(0..self.leaks.len());
                let Some(material) = self.get_material(self.leaks[index].height()) else {
                    continue;
                };
                self.leaks[index].step_erosion(dt, material, water);
            }
        }

        let chance = NEW_LEAK_CHANCE * dt * (self.layer_count() as f32 / BASELINE_LAYERS);
        if rng.gen::<f32>() < chance {
            let height = rng.gen_range(0.0..self.height);
            let low = height - SECTION_HEIGHT / 2.0;
            let high = height + SECTION_HEIGHT / 2.0;
            // a breach only forms where the dam is still whole
            if !self.leaks.iter().any(|leak| leak.between(low, high)) {
                let connection = self.spawn_leak(next_connection, height, INITIAL_LEAK_RATE);
                events.leaks_created.push(LeakSpawn {
                    dam: self.id,
                    connection,
                    height,
                });
            }
        }
    }

    /// Damage the dam at height `y`, as a gnawing animal does.
    ///
    /// A nibble above the crest does nothing. A nibble near existing leaks
    /// widens every leak in range, scaled by how well the local material
    /// resists animals. A nibble into whole material creates a fresh leak;
    /// its connection id is returned so the caller can track it.
    pub(crate) fn nibble_at(
        &mut self,
        next_connection: &mut u32,
        y: f32,
        check_radius: f32,
        amount: f32,
    ) -> Option<ConnectionId> {
        if y >= self.height {
            return None;
        }
        let low = y - check_radius / 2.0;
        let high = y + check_radius / 2.0;
        let factor = self.get_material(y)?.animal_erosion_factor();
        let mut widened = false;
        for leak in self.leaks.iter_mut().filter(|leak| leak.between(low, high)) {
            leak.add_rate(amount * factor);
            widened = true;
        }
        if widened {
            return None;
        }
        Some(self.spawn_leak(next_connection, y, INITIAL_LEAK_RATE))
    }

    /// Patch the first leak found around height `y`.
    ///
    /// Returns `true` when the leak's rate was driven below zero: the leak
    /// is destroyed, its connection closed, and the layer at its height is
    /// permanently replaced with `material`. Only then has the caller's
    /// material actually been consumed. Probing where no leak exists
    /// returns `false` and never creates anything.
    pub(crate) fn fix_leaks_at(
        &mut self,
        graph: &mut ReservoirGraph,
        y: f32,
        check_radius: f32,
        amount: f32,
        material: Material,
    ) -> Result<bool> {
        let low = y - check_radius / 2.0;
        let high = y + check_radius / 2.0;
        let Some(index) = self.leaks.iter().position(|leak| leak.between(low, high)) else {
            return Ok(false);
        };
        self.leaks[index].add_rate(-amount);
        if self.leaks[index].rate() >= 0.0 {
            return Ok(false);
        }
        let leak = self.leaks.remove(index);
        if graph.have_connection(leak.connection()) {
            graph.disconnect(leak.connection())?;
        }
        let layer = (leak.height() / SECTION_HEIGHT) as usize;
        if let Some(slot) = self.materials.get_mut(layer) {
            *slot = material;
        }
        tracing::trace!(dam = self.id.0, height = leak.height(), "leak repaired");
        Ok(true)
    }

    /// Append one layer of `material`, raising the dam by a section.
    pub(crate) fn build_up(&mut self, material: Material) {
        self.materials.push(material);
        self.height = self.materials.len() as f32 * SECTION_HEIGHT;
        self.flow.set_spill_height(self.height);
    }

    fn spawn_leak(&mut self, next_connection: &mut u32, height: f32, rate: f32) -> ConnectionId {
        let connection = ConnectionId(*next_connection);
        *next_connection += 1;
        self.leaks
            .push(Leak::new(self.start_x, self.end_x, height, rate, connection));
        connection
    }
}

/// The dams of the world, ordered by position.
///
/// Implemented as an indexed array with explicit prev/next indices and a
/// sentinel head: the shoreline reservoir plays "the level behind the
/// first dam" so walking upstream never needs a null check. The chain also
/// owns the counter that leak and flood connections draw their ids from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DamChain {
    dams: Vec<Dam>,
    /// Reservoir the sentinel head reports: the undammed shoreline.
    shoreline: ReservoirId,
    /// Index of the dam closest to the shoreline.
    first: Option<usize>,
    next_connection: u32,
}

impl DamChain {
    /// Create an empty chain whose sentinel reports the given reservoir.
    ///
    /// `first_connection` is where internally allocated connection ids
    /// start; host-chosen ids should stay below it.
    #[must_use]
    pub fn new(shoreline: ReservoirId, first_connection: u32) -> Self {
        Self {
            dams: Vec::new(),
            shoreline,
            first: None,
            next_connection: first_connection,
        }
    }

    /// Reservoir id of the sentinel head.
    #[must_use]
    pub const fn shoreline(&self) -> ReservoirId {
        self.shoreline
    }

    /// Number of dams in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dams.len()
    }

    /// Whether the chain holds no dams.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dams.is_empty()
    }

    /// Hand out a fresh connection id from the shared counter.
    pub fn allocate_connection(&mut self) -> ConnectionId {
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        id
    }

    /// Look up a dam by id.
    #[must_use]
    pub fn get(&self, id: DamId) -> Option<&Dam> {
        self.dams.get(id.0 as usize)
    }

    pub(crate) fn get_mut(&mut self, id: DamId) -> Option<&mut Dam> {
        self.dams.get_mut(id.0 as usize)
    }

    /// Route a nibble to a dam; an unknown id is a silent miss.
    pub(crate) fn nibble_at(
        &mut self,
        id: DamId,
        y: f32,
        check_radius: f32,
        amount: f32,
    ) -> Option<ConnectionId> {
        let index = id.0 as usize;
        if index >= self.dams.len() {
            return None;
        }
        let dam = &mut self.dams[index];
        dam.nibble_at(&mut self.next_connection, y, check_radius, amount)
    }

    /// Route a repair to a dam; an unknown id fixes nothing.
    pub(crate) fn fix_leaks_at(
        &mut self,
        graph: &mut ReservoirGraph,
        id: DamId,
        y: f32,
        check_radius: f32,
        amount: f32,
        material: Material,
    ) -> Result<bool> {
        match self.get_mut(id) {
            Some(dam) => dam.fix_leaks_at(graph, y, check_radius, amount, material),
            None => Ok(false),
        }
    }

    /// Add a layer to a dam; returns whether the dam exists.
    pub(crate) fn build_up(&mut self, id: DamId, material: Material) -> bool {
        match self.get_mut(id) {
            Some(dam) => {
                dam.build_up(material);
                true
            }
            None => false,
        }
    }

    /// Dams in position order, shoreline outward.
    pub fn iter(&self) -> impl Iterator<Item = &Dam> + '_ {
        std::iter::successors(self.first.map(|i| &self.dams[i]), move |dam| {
            dam.next.map(|i| &self.dams[i])
        })
    }

    /// The dam whose area contains `x`, if any.
    #[must_use]
    pub fn dam_at(&self, x: f32) -> Option<DamId> {
        self.iter().find(|dam| dam.in_area(x)).map(Dam::id)
    }

    /// The dam whose held-back water covers `x`: the span from its end to
    /// the start of the next dam (or onward, for the last dam).
    #[must_use]
    pub fn water_area_at(&self, x: f32) -> Option<DamId> {
        let mut cursor = self.first;
        while let Some(index) = cursor {
            let dam = &self.dams[index];
            let next_start = dam.next.map(|n| self.dams[n].start_x);
            if dam.end_x <= x && next_start.map_or(true, |s| x < s) {
                return Some(dam.id);
            }
            cursor = dam.next;
        }
        None
    }

    /// Register a new dam and splice it into the chain by position.
    ///
    /// The dam's reservoir is created under `level`; without an explicit
    /// `initial_level` it inherits the level behind it, so a fresh dam
    /// starts with equalized water on both sides.
    ///
    /// # Errors
    ///
    /// Returns [`DamError::InvalidState`] for degenerate geometry, or the
    /// graph's error if `level` is already taken.
    pub fn add_dam(
        &mut self,
        graph: &mut ReservoirGraph,
        level: ReservoirId,
        start_x: f32,
        end_x: f32,
        layers: usize,
        initial_level: Option<f32>,
    ) -> Result<DamId> {
        if layers == 0 {
            return Err(DamError::InvalidState(
                "a dam needs at least one material layer".into(),
            ));
        }
        if end_x <= start_x {
            return Err(DamError::InvalidState(format!(
                "degenerate dam extent: {start_x}..{end_x}"
            )));
        }

        // the dam directly behind the new one: greatest start below ours
        let mut prev: Option<usize> = None;
        for (i, dam) in self.dams.iter().enumerate() {
            if dam.start_x < start_x && prev.map_or(true, |p| self.dams[p].start_x < dam.start_x) {
                prev = Some(i);
            }
        }
        let prev_level = match prev {
            Some(p) => self.dams[p].level,
            None => self.shoreline,
        };
        let inherited = graph.level(prev_level).unwrap_or(0.0);
        graph.add_level(level, initial_level.unwrap_or(inherited))?;

        let index = self.dams.len();
        let id = DamId(index as u32);
        let next = match prev {
            Some(p) => self.dams[p].next,
            None => self.first,
        };
        let flood_connection = self.allocate_connection();
        self.dams.push(Dam::new(
            id,
            level,
            flood_connection,
            start_x,
            end_x,
            layers,
            prev,
            next,
        ));
        match prev {
            Some(p) => self.dams[p].next = Some(index),
            None => self.first = Some(index),
        }
        if let Some(n) = next {
            self.dams[n].prev = Some(index);
        }
        Ok(id)
    }

    /// Reservoir id behind the dam at `index` (the sentinel's for the
    /// first dam).
    fn prev_level_of(&self, index: usize) -> ReservoirId {
        match self.dams[index].prev {
            Some(p) => self.dams[p].level,
            None => self.shoreline,
        }
    }

    /// Same, addressed by dam id.
    #[must_use]
    pub fn prev_level(&self, id: DamId) -> Option<ReservoirId> {
        let index = id.0 as usize;
        if index < self.dams.len() {
            Some(self.prev_level_of(index))
        } else {
            None
        }
    }

    /// Run every dam's per-tick phases, shoreline outward: flood check,
    /// leak activation, erosion. The reservoir graph must only be stepped
    /// afterwards.
    pub(crate) fn update(
        &mut self,
        graph: &mut ReservoirGraph,
        dt: f32,
        rng: &mut ChaCha8Rng,
        events: &mut TickEvents,
    ) -> Result<()> {
        let mut cursor = self.first;
        while let Some(index) = cursor {
            let prev_level = self.prev_level_of(index);
            let dam = &mut self.dams[index];
            dam.update_flooded(graph, prev_level, events)?;
            dam.update_leaks(graph, prev_level, events)?;
            dam.step_erosion(dt, graph, prev_level, rng, &mut self.next_connection, events);
            cursor = dam.next;
        }
        Ok(())
    }

    /// Water level visible at `x`: a flooded dam shows its highest level,
    /// a dry dam shows none, water areas show their owning reservoir, and
    /// everything before the first dam shows the shoreline.
    #[must_use]
    pub fn water_level_at(&self, graph: &ReservoirGraph, x: f32) -> f32 {
        let mut cursor = self.first;
        while let Some(index) = cursor {
            let dam = &self.dams[index];
            if dam.in_area(x) {
                let prev_level = self.prev_level_of(index);
                if dam.is_flooded(graph, prev_level) {
                    return dam.highest_level(graph, prev_level);
                }
                return 0.0;
            }
            let next_start = dam.next.map(|n| self.dams[n].start_x);
            if dam.end_x <= x && next_start.map_or(true, |s| x < s) {
                return graph.level(dam.level).unwrap_or(0.0);
            }
            cursor = dam.next;
        }
        graph.level(self.shoreline).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    const SHORE: ReservoirId = ReservoirId(0);
    const SEA: ReservoirId = ReservoirId(1);

    fn setup(layers: usize, sea_level: f32) -> (ReservoirGraph, DamChain) {
        let mut graph = ReservoirGraph::new();
        graph.add_level(SHORE, 0.0).unwrap();
        let mut chain = DamChain::new(SHORE, 1000);
        chain
            .add_dam(&mut graph, SEA, 5.5, 6.5, layers, Some(sea_level))
            .unwrap();
        (graph, chain)
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn test_erosion_attempts_scaling() {
        assert_eq!(erosion_attempts(0), 1);
        assert_eq!(erosion_attempts(9), 1);
        assert_eq!(erosion_attempts(10), 2);
        assert_eq!(erosion_attempts(35), 4);
        assert_eq!(erosion_attempts(90), 10);
        assert_eq!(erosion_attempts(500), 10);
    }

    #[test]
    fn test_build_up_is_deterministic() {
        let (_, mut chain) = setup(3, 0.0);
        let dam = chain.get_mut(DamId(0)).unwrap();
        assert!((dam.height() - 3.0 * SECTION_HEIGHT).abs() < 1e-6);

        dam.build_up(Material::Wood);
        assert!((dam.height() - 4.0 * SECTION_HEIGHT).abs() < 1e-6);
        assert_eq!(
            dam.get_material(3.0 * SECTION_HEIGHT + 0.01),
            Some(Material::Wood)
        );
    }

    #[test]
    fn test_get_material_beyond_top_is_none() {
        let (_, chain) = setup(3, 0.0);
        let dam = chain.get(DamId(0)).unwrap();
        assert_eq!(dam.get_material(0.0), Some(Material::Wood));
        assert_eq!(dam.get_material(dam.height() + 0.1), None);
        assert_eq!(dam.get_material(dam.height()), None);
    }

    #[test]
    fn test_nibble_creates_exactly_one_leak() {
        let (_, mut chain) = setup(8, 1.0);
        let mut next = 2000;
        let dam = chain.get_mut(DamId(0)).unwrap();

        let created = dam.nibble_at(&mut next, 0.5, 0.2, 0.001);
        assert!(created.is_some());
        assert_eq!(dam.leaks().len(), 1);
        assert!((dam.leaks()[0].rate() - INITIAL_LEAK_RATE).abs() < 1e-7);

        // a second nibble in range widens instead of creating
        let again = dam.nibble_at(&mut next, 0.5, 0.2, 0.001);
        assert!(again.is_none());
        assert_eq!(dam.leaks().len(), 1);
        let expected = INITIAL_LEAK_RATE + 0.001 * Material::Wood.animal_erosion_factor();
        assert!((dam.leaks()[0].rate() - expected).abs() < 1e-7);
    }

    #[test]
    fn test_nibble_above_crest_is_noop() {
        let (_, mut chain) = setup(3, 0.0);
        let mut next = 2000;
        let dam = chain.get_mut(DamId(0)).unwrap();
        assert!(dam.nibble_at(&mut next, dam.height(), 0.2, 0.001).is_none());
        assert!(dam.leaks().is_empty());
    }

    #[test]
    fn test_fix_without_leak_never_creates_one() {
        let (mut graph, mut chain) = setup(8, 1.0);
        let dam = chain.get_mut(DamId(0)).unwrap();
        for _ in 0..5 {
            let consumed = dam
                .fix_leaks_at(&mut graph, 0.5, 1.0, 0.05, Material::Stone)
                .unwrap();
            assert!(!consumed);
        }
        assert!(dam.leaks().is_empty());
    }

    #[test]
    fn test_fix_removes_leak_and_replaces_material() {
        let (mut graph, mut chain) = setup(8, 1.0);
        let mut next = 2000;
        let dam = chain.get_mut(DamId(0)).unwrap();

        let y = 0.5;
        dam.nibble_at(&mut next, y, 0.2, 0.0);
        // bring the leak to a known rate
        let current = dam.leaks[0].rate();
        dam.leaks[0].add_rate(0.05 - current);
        assert_eq!(dam.get_material(y), Some(Material::Wood));

        let consumed = dam
            .fix_leaks_at(&mut graph, y, 1.0, 0.06, Material::Stone)
            .unwrap();
        assert!(consumed);
        assert!(dam.leaks().is_empty());
        assert_eq!(dam.get_material(y), Some(Material::Stone));
    }

    #[test]
    fn test_fix_that_only_shrinks_consumes_nothing() {
        let (mut graph, mut chain) = setup(8, 1.0);
        let mut next = 2000;
        let dam = chain.get_mut(DamId(0)).unwrap();
        dam.nibble_at(&mut next, 0.5, 0.2, 0.0);

        let consumed = dam
            .fix_leaks_at(&mut graph, 0.5, 1.0, INITIAL_LEAK_RATE / 2.0, Material::Stone)
            .unwrap();
        assert!(!consumed);
        assert_eq!(dam.leaks().len(), 1);
        assert_eq!(dam.get_material(0.5), Some(Material::Wood));
    }

    #[test]
    fn test_flood_opens_then_closes_connection() {
        let (mut graph, mut chain) = setup(8, 1.0);
        let mut rng = rng();
        let dam_height = chain.get(DamId(0)).unwrap().height();
        let flood = chain.get(DamId(0)).unwrap().flood_connection();

        // dt 0 keeps erosion quiet; flood state does not depend on it
        let mut events = TickEvents::default();
        chain.update(&mut graph, 0.0, &mut rng, &mut events).unwrap();
        assert!(!graph.have_connection(flood));

        graph.set_level(SEA, dam_height + 0.5).unwrap();
        let mut events = TickEvents::default();
        chain.update(&mut graph, 0.0, &mut rng, &mut events).unwrap();
        assert!(graph.have_connection(flood));
        assert!(events
            .flows_opened
            .iter()
            .any(|f| f.kind == FlowKind::Flood && f.connection == flood));

        graph.set_level(SEA, dam_height - 0.5).unwrap();
        let mut events = TickEvents::default();
        chain.update(&mut graph, 0.0, &mut rng, &mut events).unwrap();
        assert!(!graph.have_connection(flood));
        assert!(events
            .flows_closed
            .iter()
            .any(|f| f.kind == FlowKind::Flood && f.connection == flood));
    }

    #[test]
    fn test_leak_activation_follows_water_height() {
        let (mut graph, mut chain) = setup(8, 1.0);
        let mut rng = rng();
        let mut next = 2000;

        let dam = chain.get_mut(DamId(0)).unwrap();
        let connection = dam.nibble_at(&mut next, 0.5, 0.2, 0.0).unwrap();

        // water at 1.0 covers a leak at 0.5; dt 0 keeps erosion quiet
        let mut events = TickEvents::default();
        chain.update(&mut graph, 0.0, &mut rng, &mut events).unwrap();
        assert!(graph.have_connection(connection));

        // water below the leak deactivates it but keeps the leak around
        graph.set_level(SEA, 0.2).unwrap();
        let mut events = TickEvents::default();
        chain.update(&mut graph, 0.0, &mut rng, &mut events).unwrap();
        assert!(!graph.have_connection(connection));
        assert_eq!(chain.get(DamId(0)).unwrap().leaks().len(), 1);

        // rising water reactivates the same leak
        graph.set_level(SEA, 1.0).unwrap();
        let mut events = TickEvents::default();
        chain.update(&mut graph, 0.0, &mut rng, &mut events).unwrap();
        assert!(graph.have_connection(connection));
    }

    #[test]
    fn test_chain_splices_by_position() {
        let mut graph = ReservoirGraph::new();
        graph.add_level(SHORE, 0.0).unwrap();
        let mut chain = DamChain::new(SHORE, 1000);

        let outer = chain
            .add_dam(&mut graph, ReservoirId(1), 12.0, 13.0, 8, Some(2.0))
            .unwrap();
        let inner = chain
            .add_dam(&mut graph, ReservoirId(2), 5.5, 6.5, 8, Some(1.0))
            .unwrap();

        let order: Vec<DamId> = chain.iter().map(Dam::id).collect();
        assert_eq!(order, vec![inner, outer]);
        // the inner dam answers to the sentinel, the outer to the inner
        assert_eq!(chain.prev_level(inner), Some(SHORE));
        assert_eq!(chain.prev_level(outer), Some(ReservoirId(2)));

        // each dam's water area runs up to the next dam
        assert_eq!(chain.water_area_at(8.0), Some(inner));
        assert_eq!(chain.water_area_at(20.0), Some(outer));
        assert_eq!(chain.water_area_at(1.0), None);
    }

    #[test]
    fn test_water_level_routing() {
        let (mut graph, chain) = setup(8, 1.0);
        // before the dam: the shoreline level
        graph.set_level(SHORE, 0.3).unwrap();
        assert!((chain.water_level_at(&graph, 1.0) - 0.3).abs() < 1e-6);
        // on a dry dam: no water
        assert!((chain.water_level_at(&graph, 6.0)).abs() < 1e-6);
        // behind the dam: its reservoir
        assert!((chain.water_level_at(&graph, 10.0) - 1.0).abs() < 1e-6);

        // a flooded dam shows its highest level on the dam itself
        let height = chain.get(DamId(0)).unwrap().height();
        graph.set_level(SEA, height + 1.0).unwrap();
        assert!((chain.water_level_at(&graph, 6.0) - (height + 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_spontaneous_leaks_form_over_time() {
        let (mut graph, mut chain) = setup(8, 1.0);
        let mut rng = rng();
        let mut events = TickEvents::default();
        // ~200 simulated seconds at an expected 0.05 leaks per second
        for _ in 0..2000 {
            chain.update(&mut graph, 0.1, &mut rng, &mut events).unwrap();
            graph.step(0.1);
        }
        assert!(
            !events.leaks_created.is_empty(),
            "no spontaneous leak in 200 simulated seconds"
        );
        assert_eq!(
            events.leaks_created.len(),
            chain.get(DamId(0)).unwrap().leaks().len()
        );
    }
}
