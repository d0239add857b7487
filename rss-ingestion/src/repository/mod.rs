pub mod article;
pub mod author;
pub mod source;

pub use article::ArticleRepository;
pub use author::AuthorRepository;
pub use source::SourceRepository;
