//! Identifier types shared by the client and the store

pub mod ids;

pub use ids::PubMedId;
