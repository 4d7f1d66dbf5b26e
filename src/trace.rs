//! Diagnostic events emitted by the loader subsystem.
//!
//! Not-found conditions are recoverable by design: the guest receives a zero
//! result and execution continues. They are still worth surfacing — a sample
//! probing for a library that is not on the virtual filesystem, or importing a
//! symbol by a bad handle, is often the interesting part of a run. This module
//! provides [`LoaderEvent`], a typed record of those moments, and [`TraceSink`],
//! the outlet the embedding emulator supplies to collect them.
//!
//! The subsystem never formats or prints events itself; rendering is the
//! embedder's concern.
//!
//! # Example
//!
//! ```rust
//! use winldr::trace::{BufferSink, LoaderEvent, TraceSink};
//!
//! let sink = BufferSink::new();
//! sink.record(LoaderEvent::ModuleNotFound {
//!     name: "missing.dll".into(),
//! });
//! assert_eq!(sink.drain().len(), 1);
//! ```

use std::sync::Mutex;

/// A diagnostic event recorded by the loader.
///
/// Each variant corresponds to a decision point where the loader degrades
/// gracefully instead of failing: the guest sees a zero/failure result, the
/// sink sees the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderEvent {
    /// A `GetModuleHandle`-class query named a library that is not in the
    /// registry. The loader will attempt a late bind if the file exists.
    ModuleNotRegistered {
        /// Canonicalized library name that missed the registry
        name: String,
    },

    /// A library could not be resolved to a file under the virtual
    /// filesystem root. The call returns a null handle.
    ModuleNotFound {
        /// Canonicalized library name that failed to resolve
        name: String,
    },

    /// A library was mapped and registered.
    ModuleLoaded {
        /// Canonicalized library name
        name: String,
        /// Base address the image was mapped at
        base: u64,
    },

    /// `GetProcAddress` was called with a handle no registered module owns.
    UnknownModuleHandle {
        /// The unrecognized handle value
        handle: u64,
        /// The symbol the guest was trying to import
        symbol: String,
    },

    /// A symbol was not present in the owning module's export table or
    /// import-address-table.
    SymbolNotFound {
        /// Normalized name of the module that was searched
        module: String,
        /// The symbol that missed, rendered as name or `#ordinal`
        symbol: String,
    },

    /// A denylisted symbol was requested and suppressed.
    ///
    /// Certain symbols are answered with 0 regardless of table contents as a
    /// compatibility carve-out for samples that use them to detect emulation.
    SymbolSuppressed {
        /// The denylisted symbol name
        name: String,
    },
}

/// Outlet for loader diagnostics.
///
/// Implementations must be cheap and non-blocking; the loader calls
/// [`record`](TraceSink::record) from inside the trap-handling path.
pub trait TraceSink: Send + Sync {
    /// Records a single event.
    fn record(&self, event: LoaderEvent);
}

/// A sink that discards every event.
///
/// This is the default when the embedder does not care about diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn record(&self, _event: LoaderEvent) {}
}

/// A sink that buffers events in memory.
///
/// Useful for tests and for embedders that render diagnostics after a run
/// rather than during it.
#[derive(Debug, Default)]
pub struct BufferSink {
    events: Mutex<Vec<LoaderEvent>>,
}

impl BufferSink {
    /// Creates an empty buffer sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns all buffered events, oldest first.
    pub fn drain(&self) -> Vec<LoaderEvent> {
        std::mem::take(&mut *lock!(self.events))
    }

    /// Returns the number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        lock!(self.events).len()
    }

    /// Returns `true` if no events have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TraceSink for BufferSink {
    fn record(&self, event: LoaderEvent) {
        lock!(self.events).push(event);
    }
}
