//! Procedural river networks and the terrain elevations they imply.
//!
//! Given a coastline, seed mouths on it, and a slope raster, the growth
//! stage expands a forest of river trees inland under geometric spacing
//! constraints, in parallel. The elevation stage then assigns an elevation
//! to every scattered terrain sample by blending the nearest ridge of its
//! cell against the nearest point of its river.
//!
//! Pipeline stages (driven by the `grower` and `elevator` binaries):
//! - **Growth** - [`growth`] over [`hydrology`], [`shore`] and [`raster`],
//!   spatially indexed by the `kd-forest` crate.
//! - **Elevation** - [`terrain`] over [`hydrology`], [`honeycomb`] and
//!   [`shore`].
//!
//! Inputs and outputs travel through the [`store`] document.

pub mod geometry;
pub mod growth;
pub mod honeycomb;
pub mod hydrology;
pub mod raster;
pub mod shore;
pub mod store;
pub mod terrain;
pub mod util;
