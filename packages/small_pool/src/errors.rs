use thiserror::Error;

/// Errors that can occur when requesting memory from a pool.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested byte count cannot be served by the pool: it is either zero
    /// or larger than the pool's chunk size.
    ///
    /// Requests above the largest configured chunk size are expected to be routed
    /// to the general-purpose allocator before ever reaching a pool.
    #[error("requested {requested} bytes outside the supported range 1..={chunk_size}")]
    SizeOutOfRange {
        /// The byte count that was requested.
        requested: usize,

        /// The chunk size of the pool that rejected the request.
        chunk_size: usize,
    },

    /// The system allocator could not supply the backing memory for a new page.
    #[error("system allocator failed to provide {bytes} bytes for a new page")]
    SystemMemoryExhausted {
        /// The size of the page allocation that failed.
        bytes: usize,
    },
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn size_out_of_range_names_the_limit() {
        let error = Error::SizeOutOfRange {
            requested: 513,
            chunk_size: 512,
        };

        assert!(error.to_string().contains("513"));
        assert!(error.to_string().contains("512"));
    }
}
