//! Checked big-endian reads over [`bytes::Buf`].
//!
//! Every read either succeeds and advances the cursor, or fails with
//! [`OutOfBytes`] and leaves the cursor untouched.

use bytes::{Buf, Bytes};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("out of bytes (wanted {wanted}, {remaining} remaining)")]
pub struct OutOfBytes {
    pub wanted: usize,
    pub remaining: usize,
}

/**
This macro builds a set of `try_get_{number_type}` functions for safe reading of
bytes from a Buf. They return Result<T, OutOfBytes> instead of panicking
 */
macro_rules! impl_safebuf {
    ( $($type:ty),* ) => {
        pub trait SafeBuf: Buf {
            paste::paste! {
                $(
                fn [<try_get_ $type>](&mut self) -> Result<$type, OutOfBytes> {
                    self.ensure_remaining(std::mem::size_of::<$type>())?;
                    Ok(self.[<get_ $type>]())
                }
                )*
            }

            fn ensure_remaining(&self, wanted: usize) -> Result<(), OutOfBytes> {
                let remaining = self.remaining();
                if remaining < wanted {
                    return Err(OutOfBytes { wanted, remaining });
                }

                Ok(())
            }

            fn try_skip(&mut self, count: usize) -> Result<(), OutOfBytes> {
                self.ensure_remaining(count)?;
                self.advance(count);
                Ok(())
            }

            fn try_copy_bytes(&mut self, count: usize) -> Result<Vec<u8>, OutOfBytes> {
                self.ensure_remaining(count)?;
                let mut out = vec![0; count];
                self.copy_to_slice(&mut out);
                Ok(out)
            }
        }

        impl<T: Buf> SafeBuf for T { }
    }
}

impl_safebuf!(u8, u16, u32, u64, i8, i16, i32, i64);

/// Zero-copy sub-buffers, only available on [`Bytes`].
pub trait SafeBytes {
    fn try_split_to(&mut self, count: usize) -> Result<Bytes, OutOfBytes>;
}

impl SafeBytes for Bytes {
    fn try_split_to(&mut self, count: usize) -> Result<Bytes, OutOfBytes> {
        self.ensure_remaining(count)?;
        Ok(self.split_to(count))
    }
}
