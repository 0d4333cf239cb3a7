//! Typed particle storage owned by a layer

use chaos_core::AllocationId;

/// An ordered run of particles of one type.
///
/// Dead particles are removed by swap-remove, so storage order is stable
/// only between removals.
pub struct ParticleAllocation<P> {
    id: AllocationId,
    particles: Vec<P>,
    visible: bool,
    paused: bool,
    destroy_when_empty: bool,
}

impl<P: Clone + Default> ParticleAllocation<P> {
    pub fn new(id: AllocationId) -> Self {
        Self {
            id,
            particles: Vec::new(),
            visible: true,
            paused: false,
            destroy_when_empty: false,
        }
    }

    pub fn id(&self) -> AllocationId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[P] {
        &self.particles
    }

    /// In-place access for gameplay code
    pub fn particles_mut(&mut self) -> &mut [P] {
        &mut self.particles
    }

    /// Append `count` default particles and return them for initialization
    pub fn add_particles(&mut self, count: usize) -> &mut [P] {
        let start = self.particles.len();
        self.particles.resize(start + count, P::default());
        &mut self.particles[start..]
    }

    /// Remove one particle; the last particle takes its slot
    pub fn remove_particle(&mut self, index: usize) -> Option<P> {
        if index < self.particles.len() {
            Some(self.particles.swap_remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Run `update` on every particle, dropping those for which it returns
    /// true. Returns the number removed.
    pub fn update_and_compact(&mut self, mut update: impl FnMut(&mut P) -> bool) -> usize {
        let mut removed = 0;
        let mut i = 0;
        while i < self.particles.len() {
            if update(&mut self.particles[i]) {
                self.particles.swap_remove(i);
                removed += 1;
                // Don't increment i: the swapped-in particle still needs updating
            } else {
                i += 1;
            }
        }
        removed
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Paused allocations keep rendering but skip updates
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn destroy_when_empty(&self) -> bool {
        self.destroy_when_empty
    }

    /// Have the layer drop this allocation once a tick leaves it empty
    pub fn set_destroy_when_empty(&mut self, destroy: bool) {
        self.destroy_when_empty = destroy;
    }
}
