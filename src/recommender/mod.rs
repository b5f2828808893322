pub mod catalog_index;
pub mod ranker;

pub use catalog_index::{
    CatalogIndex, CatalogIndexLoader, CatalogSource, ItemVector, DEFAULT_CATALOG_TTL_SECS,
};
pub use ranker::{cosine_similarity, rank_items, Recommender, DEFAULT_QUEUE_SIZE};
