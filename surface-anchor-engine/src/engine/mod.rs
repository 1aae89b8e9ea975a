//! Scene-side state: the operational boundary, the reconstruction mesh store
//! and the provider session feeding both.

pub mod boundary;
pub mod mesh;
pub mod session;
