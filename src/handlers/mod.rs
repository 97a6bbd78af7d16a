// Two security tiers: public (reads, token acquisition) and protected
// (record mutations behind a bearer token).
pub mod protected;
pub mod public;
