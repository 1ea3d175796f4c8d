pub mod extendible_hash_table;
pub mod hash_function;

#[cfg(test)]
mod extendible_hash_table_test;
