use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open {_0}")]
    Startup(#[error(not(source))] &'static str),
    #[display("could not open the source of project {_0}")]
    Source(#[error(not(source))] String),
    #[display("command failed")]
    Workflow,
    /// `commit localized` found unapproved translations.
    #[display("commit is not localized into {_0}")]
    NotLocalized(#[error(not(source))] String),
}
