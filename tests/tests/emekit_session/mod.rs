//! Key session integration tests.
//!
//! Drive `KeySession` against a scripted platform whose notifications arrive
//! from separate threads, as a real key system's callbacks do.

mod flow;
mod mocked;
