//! `dosgfx-rs` reads and writes the image and tileset files of DOS-era
//! games: planar EGA, packed CGA, linear VGA, PCX, and the container
//! formats of Crystal Caves, Secret Agent, Dangerous Dave and Jill of the
//! Jungle.

pub use dosgfx_internal::*;
