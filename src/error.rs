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
/// This enum covers all failure modes of the loader subsystem: guest memory faults, image
/// mapping and export parsing problems, registry invariant violations, parameter-map misuse
/// at the API boundary, and the hard "unsupported operation" condition.
///
/// # Error Categories
///
/// ## Guest Memory Errors
/// - [`Error::InvalidAddress`] - Access to an unmapped or out-of-bounds guest address
///
/// ## Image Loading Errors
/// - [`Error::Malformed`] - Corrupted or invalid image structure
/// - [`Error::FileError`] - Filesystem I/O errors while reading an image
/// - [`Error::GoblinErr`] - PE parsing errors from the goblin crate
///
/// ## Registry Errors
/// - [`Error::AlreadyRegistered`] - A module name or base address was registered twice
///
/// ## API Boundary Errors
/// - [`Error::MissingParameter`] - The marshaled parameter map lacks a declared parameter
/// - [`Error::ParameterType`] - A parameter carried a value of the wrong kind
/// - [`Error::Unsupported`] - An operation was invoked with inputs the emulation does not
///   model; this is the one unrecoverable condition and must reach the embedding harness
///
/// # Recoverable vs. unrecoverable
///
/// Not-found conditions (module absent, symbol absent, unknown handle) are *not* errors:
/// the API handlers resolve them to a zero result and emit a [`crate::trace::LoaderEvent`].
/// Everything in this enum either indicates a bug at the integration boundary or, for
/// [`Error::Unsupported`], a guest dependency on behavior the emulation deliberately does
/// not implement — the operator needs to see that, so it is never folded into a sentinel
/// return value.
///
/// # Examples
///
/// ```rust,no_run
/// use winldr::{Error, Loader};
///
/// # fn demo(loader: &Loader) {
/// match loader.module_file_name(0xDEAD_0000) {
///     Ok(path) => println!("image path: {}", path),
///     Err(Error::Unsupported { operation, handle }) => {
///         eprintln!("{} cannot service handle {:#x}", operation, handle);
///     }
///     Err(e) => eprintln!("loader error: {}", e),
/// }
/// # }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The image is damaged and could not be parsed.
    ///
    /// This error indicates that a library file does not conform to the expected
    /// PE structure. The error includes the source location where the malformation
    /// was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Access to an invalid guest address.
    ///
    /// Raised by the virtual address space when a read or write touches memory
    /// that is not mapped, or would run past the end of its region. Inside the
    /// loader this means the emulated program handed over a bad pointer, or the
    /// harness marshaled one.
    #[error("Invalid guest address {address:#x}: {reason}")]
    InvalidAddress {
        /// The guest address that was accessed
        address: u64,
        /// Why the access was rejected
        reason: &'static str,
    },

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while opening or mapping a
    /// library file from the virtual filesystem root.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error from the goblin crate during PE parsing.
    ///
    /// The goblin crate is used to extract the export directory from library
    /// files. This error wraps any failures from that parsing layer.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// A module was registered under a name or base address that is already taken.
    ///
    /// The registry guarantees one base address per normalized name and one name
    /// per base address for the lifetime of the emulation session. Hitting this
    /// error means the embedding loader logic tried to map the same file twice
    /// or reused a base address.
    #[error("Module {name} already registered at {base:#x}")]
    AlreadyRegistered {
        /// Normalized module name that collided
        name: String,
        /// Base address of the existing registration
        base: u64,
    },

    /// The marshaled parameter map lacks a declared parameter.
    ///
    /// The calling-convention harness extracts parameters ahead of dispatch; a
    /// missing entry means the harness and the operation signature disagree.
    #[error("Parameter '{0}' missing from the marshaled call")]
    MissingParameter(&'static str),

    /// A parameter carried a value of the wrong kind.
    ///
    /// Like [`Error::MissingParameter`], this indicates a mismatch between the
    /// marshaling harness and the declared operation signature, not a guest
    /// visible failure.
    #[error("Parameter '{name}' is not a {expected}")]
    ParameterType {
        /// Name of the offending parameter
        name: &'static str,
        /// What the handler expected to find
        expected: &'static str,
    },

    /// The operation was invoked with inputs the emulation does not model.
    ///
    /// This is the hard, unrecoverable condition of the subsystem: a sample
    /// relied on behavior that is deliberately unimplemented (for example,
    /// `GetModuleFileName` on a handle other than the process image). Silently
    /// returning zero here could mask the dependency, so the condition carries
    /// the offending operation and handle and propagates to the embedding
    /// harness, which decides whether to abort the run.
    #[error("{operation} not implemented for handle {handle:#x}")]
    Unsupported {
        /// The API operation that was invoked
        operation: &'static str,
        /// The handle value the operation could not service
        handle: u64,
    },
}
