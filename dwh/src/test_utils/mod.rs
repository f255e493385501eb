//! Helpers shared by the unit and integration tests of the loader.
//!
//! [`fixtures`] builds raw tables shaped like the extractors' output, [`faulty`] wraps a
//! warehouse to make chosen tables fail, [`failpoints`] arms the commit fail points and
//! [`database`] creates throwaway Postgres and MySQL databases for the `#[ignore]`d tests
//! that need real servers.

pub mod database;
pub mod failpoints;
pub mod faulty;
pub mod fixtures;
