//! Decision layer: classifies observations against open intervals and
//! drives the interval lifecycle.

pub mod continuum;
