pub mod file_search;
pub mod locate_pdf;
pub mod read_pdf;
pub mod web_search;
