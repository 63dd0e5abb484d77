/// Async counterpart to the standard library's `TryFrom<T>` trait.
///
/// Used where producing a value needs I/O, e.g. digesting a file's content
/// from its path.
///
/// # Examples
///
/// ```rust,ignore
/// struct FileLength(u64);
///
/// impl AsyncTryFrom<&Path> for FileLength {
///     type Error = std::io::Error;
///
///     async fn async_try_from(path: &Path) -> Result<Self, Self::Error> {
///         let metadata = compio::fs::metadata(path).await?;
///         Ok(FileLength(metadata.len()))
///     }
/// }
/// ```
pub trait AsyncTryFrom<T>: Sized {
    /// The error type that can occur during conversion.
    type Error;

    /// Performs the fallible asynchronous conversion from `T` to `Self`.
    async fn async_try_from(value: T) -> Result<Self, Self::Error>;
}
