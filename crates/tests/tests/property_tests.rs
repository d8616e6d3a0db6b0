#[path = "property/scorer_bounds.rs"]
mod scorer_bounds;

#[path = "property/rollback_exact.rs"]
mod rollback_exact;

#[path = "property/history_consistency.rs"]
mod history_consistency;
