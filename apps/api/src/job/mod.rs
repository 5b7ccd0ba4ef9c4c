//! Job-board endpoints. Listings are not backed by any data source yet, so
//! every query answers with an empty list.

pub mod handlers;
