pub mod db;
pub mod fusion;
pub mod ingest;
pub mod manual_map;
pub mod normalize;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod similarity;
