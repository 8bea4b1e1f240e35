//! Interactive shell mode

#[cfg(feature = "repl")]
pub mod interactive;

#[cfg(feature = "repl")]
pub use interactive::run_repl;

#[cfg(not(feature = "repl"))]
pub fn run_repl<R: crate::runtime::ContainerRuntime>(
    _manager: &mut crate::manager::BucketManager<R>,
    _format: &crate::output::OutputFormat,
) -> crate::error::Result<()> {
    Err(crate::error::ResenError::Validation(
        "Interactive shell not enabled. Rebuild with --features repl".to_string(),
    ))
}
