//! This module defines range-checked types for node addresses and frame
//! payloads, meant to simplify correct usage of the API.

use snafu::{ensure, OptionExt, Snafu};

use arrayvec::ArrayVec;
use core::convert::{TryFrom, TryInto};
use core::fmt;
use core::ops::Deref;

/// Largest payload a single frame can carry, limited by the 4-bit length field.
pub const MAX_PAYLOAD_LEN: usize = 15;

/// Error type for this module
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The value isn't a valid bus node address.
    #[snafu(display("Invalid address"))]
    InvalidAddress,
    /// The payload doesn't fit in a single frame.
    #[snafu(display("Payload of {} bytes exceeds the {} byte frame limit", len, MAX_PAYLOAD_LEN))]
    PayloadTooLong { len: usize },
}

const fn invalid_address() -> InvalidAddressSnafu {
    InvalidAddressSnafu
}

/// Address is a range-checked [0, 15] integer, representing a node address.
///
/// ## Example
/// ```
/// use commbus::Address;
/// use std::convert::TryInto;
/// let addr = Address::new(3).unwrap();
/// let addr: Address = 3usize.try_into().unwrap();
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct Address(u8);

/// Create a new [`Address`], panics if it is out of range.
pub const fn addr(a: u8) -> Address {
    if a <= 15 {
        return Address(a);
    }
    panic!("Invalid address.")
}

impl Address {
    /// Create a new address, checking that the address is in \[0, 15\].
    /// # Errors
    /// Returns [`Error::InvalidAddress`] if `address` is out of range.
    pub fn new(address: impl TryInto<u8>) -> Result<Self, Error> {
        let address = address.try_into().ok().with_context(invalid_address)?;
        ensure!(address <= 15, invalid_address());
        Ok(Self(address))
    }

    /// Extract the target address from the upper nibble of an addr/len byte.
    pub(crate) const fn from_header(header: u8) -> Self {
        Self(header >> 4)
    }

    /// Pack this address and a payload length into an addr/len byte.
    pub(crate) const fn header(self, len: u8) -> u8 {
        (self.0 << 4) | (len & 0x0f)
    }
}

impl Deref for Address {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq<usize> for Address {
    fn eq(&self, other: &usize) -> bool {
        self.0 as usize == *other
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trait to convert `T: TryInto<u8>` into an [`Address`].
pub trait IntoAddress {
    /// Convert self to an Address.
    /// # Errors
    /// Returns `Error:InvalidAddress` if self isn't a valid address.
    fn into_address(self) -> Result<Address, Error>;
}

impl IntoAddress for Address {
    fn into_address(self) -> Result<Address, Error> {
        Ok(self)
    }
}

impl<T> IntoAddress for T
where
    T: TryInto<u8>,
{
    fn into_address(self) -> Result<Address, Error> {
        Address::new(self)
    }
}

impl TryFrom<usize> for Address {
    type Error = Error;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Payload bytes of a single frame.
pub type Payload = ArrayVec<u8, MAX_PAYLOAD_LEN>;

/// Copy `data` into a [`Payload`].
/// # Errors
/// Returns [`Error::PayloadTooLong`] if `data` is longer than [`MAX_PAYLOAD_LEN`].
pub fn payload(data: &[u8]) -> Result<Payload, Error> {
    let mut buf = Payload::new();
    buf.try_extend_from_slice(data)
        .ok()
        .context(PayloadTooLongSnafu { len: data.len() })?;
    Ok(buf)
}


#[cfg(test)]
mod payload_tests {
    use super::{payload, Error, MAX_PAYLOAD_LEN};

    #[test]
    fn test_payload_limit() {
        assert_eq!(payload(&[]).unwrap().len(), 0);
        assert_eq!(payload(&[7; MAX_PAYLOAD_LEN]).unwrap().as_slice(), &[7; 15]);
        assert!(matches!(
            payload(&[0; 16]),
            Err(Error::PayloadTooLong { len: 16 })
        ));
    }
}
