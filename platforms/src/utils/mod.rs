pub mod retry;
pub mod time;
pub mod url_parser;
