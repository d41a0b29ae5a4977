//! Built-in backends.

pub mod influxdb;

mod log;
pub use self::log::Log;

mod noop;
pub use self::noop::Noop;

mod stdout;
pub use self::stdout::StdOut;

pub use self::influxdb::InfluxDb;
