mod csv_dir;
mod memory;

pub use csv_dir::CsvBackend;
pub use memory::MemoryBackend;
