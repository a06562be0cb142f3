pub mod ai;
pub mod car;
pub mod decision;
pub mod driver;
pub mod engine;
pub mod handle_race;
pub mod mental;
pub mod physics;
pub mod skills;
pub mod track;
