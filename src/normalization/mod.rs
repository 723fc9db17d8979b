pub mod checkpoints;
pub mod login;
pub mod nation;
pub mod vote;
