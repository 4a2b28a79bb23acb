// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! Platform shims.

pub mod time {
    //! Monotonic clock used for fence-wait deadlines and frame timing.
    //!
    //! `std::time::Instant` panics on wasm32, so the browser clock from `web_time` is used there.

    #[cfg(not(target_arch = "wasm32"))]
    pub use std::time::Instant;

    #[cfg(target_arch = "wasm32")]
    pub use web_time::Instant;
}
