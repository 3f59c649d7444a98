pub mod filesystem;
pub mod object_store;

pub use filesystem::FsObjectStore;
pub use object_store::ObjectStore;
