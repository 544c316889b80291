pub mod db;
pub mod extractor;
pub mod pdf;
pub mod storage;
pub mod structuring_llm;

pub use db::DbAdapter;
pub use extractor::DocumentTextExtractor;
pub use pdf::LopdfRenderer;
pub use storage::FileStorage;
pub use structuring_llm::OpenAiStructuringAdapter;
