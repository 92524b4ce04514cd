/// Collector module
///
/// This module groups all logic responsible for:
/// - Collecting one wallet row from the backends (`aggregator`)
/// - Running one pass over all addresses (`runner`)
/// - Repeating passes on a fixed interval (`scheduler`)
/// - Exposing the whole thing as a runnable plugin (`plugin`)
///
/// Data flow:
///   scheduler -> runner -> aggregator -> backends (fan-out)
///   aggregator (fan-in) -> runner -> sink
///
/// Design notes:
/// - Backend-specific logic MUST NOT live here
/// - Errors never escape a cycle; they are logged and the cycle moves on
///
pub mod aggregator;
pub mod error;
pub mod plugin;
pub mod runner;
pub mod scheduler;
