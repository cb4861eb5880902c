//! Built-in assignment policies for replisim.
//!
//! This crate provides the [`AssignmentPolicy`] trait and the built-in
//! policies the simulator can be configured with:
//!
//! | Policy | Strategy |
//! |--------|----------|
//! | [`RoundRobin`] | Cycle through replicas in registration order |
//! | [`LeastLoad`] | Shortest projected queue, first registered wins ties |

pub mod least_load;
pub mod round_robin;
pub mod traits;

pub use least_load::LeastLoad;
pub use round_robin::RoundRobin;
pub use traits::*;

/// Create an assignment policy by its configuration name.
pub fn policy_by_name(name: &str) -> Option<Box<dyn AssignmentPolicy>> {
    match name {
        "round_robin" => Some(Box::new(RoundRobin::new())),
        "least_load" => Some(Box::new(LeastLoad::new())),
        _ => None,
    }
}

/// List all built-in policy names.
pub fn available_policies() -> Vec<&'static str> {
    vec!["round_robin", "least_load"]
}
