//! Defense calculations - armor class, resistances, vulnerabilities

mod profile;
mod resistance;

pub use profile::DefenseProfile;
pub use resistance::{adjust_for_defenses, calculate_damage_applied, DamageApplied};
