//! Cross-crate scenarios for the loopback exchange.

#[cfg(test)]
mod exchange_e2e;

#[cfg(all(test, unix))]
mod socket_e2e;
