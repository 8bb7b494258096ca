use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers all failure modes of archive remapping: classfile parsing, mapping
/// ingestion, archive container I/O, and the synthetic-member heuristics. Each variant
/// carries enough context for the operator to act on the failure.
///
/// # Error Categories
///
/// ## Classfile Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid classfile structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the payload boundary
/// - [`Error::NotAClass`] - Payload does not start with the classfile magic
/// - [`Error::PoolLimit`] - Constant pool grew past the format's 16-bit index space
///
/// ## Resolution Errors
/// - [`Error::InvalidDescriptor`] - A member descriptor failed to parse
/// - [`Error::InstructionShape`] - A synthetic-member heuristic found an instruction
///   sequence that violates its shape assumptions on a class already confirmed to
///   match the heuristic's precondition; fatal, since continuing risks emitting
///   incorrect names
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::ZipError`] - Archive container errors from the zip crate
/// - [`Error::LockError`] - Archive reader lock was poisoned
#[derive(Error, Debug)]
pub enum Error {
    /// The classfile payload is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was
    /// detected for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing a classfile payload.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The payload does not carry the classfile magic number.
    #[error("Payload does not start with the classfile magic number")]
    NotAClass,

    /// Appending rewritten entries would push the constant pool past 65535 slots.
    ///
    /// The classfile format addresses the pool with 16-bit indices, so a class
    /// whose pool is already near the limit cannot take further rewrites.
    #[error("Constant pool limit exceeded while rewriting")]
    PoolLimit,

    /// A member descriptor string failed to parse.
    #[error("Invalid descriptor - {0}")]
    InvalidDescriptor(String),

    /// A synthetic-member heuristic hit an instruction sequence that violates its
    /// shape assumptions.
    ///
    /// This is raised only after the heuristic's precondition was confirmed on the
    /// owning class, so it indicates the input binary breaks assumptions the
    /// recovery depends on. It is fatal for the run; a heuristic that simply does
    /// not match reports a normal negative instead.
    #[error("Unexpected instruction shape - {0}")]
    InstructionShape(String),

    /// Error for all File related problems, e.g. 'not found', 'read failure'
    #[error(transparent)]
    FileError(#[from] std::io::Error),

    /// Error for all archive container problems, forwarded from the zip crate.
    #[error(transparent)]
    ZipError(#[from] zip::result::ZipError),

    /// Failed to lock the archive reader.
    #[error("Failed to lock target")]
    LockError,
}
