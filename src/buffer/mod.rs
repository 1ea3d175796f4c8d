pub mod buffer_pool_manager;
pub mod lru_k_replacer;
pub mod lru_replacer;
pub mod page_guard;
pub mod replacer;
