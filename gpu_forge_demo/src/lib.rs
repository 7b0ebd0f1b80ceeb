/*!
# GpuForge Demo

Samples running on the soft backend:

- **bitonic_sort**: GPU sort of `u32` keys with ping-pong compute passes
- **particles**: compute-driven particles fed by an append buffer
- **soft_particles**: CPU-simulated particles sorted back-to-front and
  uploaded each frame
- **compositor**: three-pass frame combining a scene, fog and screen pass
- **bezier**: bicubic patches tessellated by a compute pass, then drawn
*/

pub mod bitonic_sort;
pub mod particles;
pub mod soft_particles;
pub mod compositor;
pub mod bezier;

pub use bezier::SimpleBezier;
pub use bitonic_sort::BitonicSorter;
pub use compositor::SceneCompositor;
pub use particles::GpuParticleSystem;
pub use soft_particles::{SoftParticles, SoftParticlesConfig};
