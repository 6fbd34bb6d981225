pub mod builtin;
pub mod http;
pub mod registry;

pub use builtin::file_search::{CorpusSearch, SearchHit};
pub use builtin::locate_pdf::{find_pdf_link, DocumentLocator};
pub use builtin::read_pdf::{join_page_texts, page_texts, DocumentExtractor};
pub use registry::ToolRegistry;
