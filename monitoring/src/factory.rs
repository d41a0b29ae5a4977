use crate::{
    backend::{Backend, Verbosity},
    backends::{InfluxDb, Log, Noop, StdOut},
    builder::BuildError,
};

/// Creates a backend from a URL of the form `scheme://[host[:port]][/verbosity]`.
///
/// Recognized schemes:
/// - `stdout`: writes metrics to standard output, see [`StdOut`]
/// - `infologger`: emits metrics as `tracing` events, see [`Log`]. Any host in the URL is ignored: where the events end
///   up, locally or remotely, is decided by the process's `tracing` subscriber.
/// - `influxdb-udp`: sends InfluxDB line protocol over UDP to `host:port`, see [`InfluxDb`]
/// - `no-op`: discards everything, see [`Noop`]
///
/// A path of `/prod` or `/debug` sets the verbosity of the backend. Any other path is ignored.
///
/// # Errors
///
/// If the URL is malformed or names an unknown scheme, or if the backend's transport cannot be created, an error is
/// returned.
pub fn backend_from_url(url: &str) -> Result<Box<dyn Backend>, BuildError> {
    let (scheme, rest) = url.split_once("://").ok_or_else(|| invalid(url, "missing '://'"))?;
    let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));

    let mut backend: Box<dyn Backend> = match scheme {
        "stdout" => Box::new(StdOut::new()),
        "infologger" => Box::new(Log::new()),
        "no-op" => Box::new(Noop),
        "influxdb-udp" => {
            let (host, port) = authority.rsplit_once(':').ok_or_else(|| invalid(url, "expected 'host:port'"))?;
            if host.is_empty() {
                return Err(invalid(url, "empty host"));
            }
            let port = port.parse::<u16>().map_err(|e| invalid(url, format!("invalid port '{}': {}", port, e)))?;
            Box::new(InfluxDb::udp(host, port)?)
        }
        "influxdb-http" => return Err(BuildError::UnsupportedTransport { scheme: scheme.to_string() }),
        _ => return Err(BuildError::UnrecognizedBackend { scheme: scheme.to_string() }),
    };

    if let Ok(verbosity) = path.trim_end_matches('/').parse::<Verbosity>() {
        backend.set_verbosity(verbosity);
    }

    Ok(backend)
}

fn invalid<R: Into<String>>(url: &str, reason: R) -> BuildError {
    BuildError::InvalidUrl { url: url.to_string(), reason: reason.into() }
}
