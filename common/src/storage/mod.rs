pub mod vector_store_id;
