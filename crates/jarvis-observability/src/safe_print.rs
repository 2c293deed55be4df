// Best-effort stderr logging that never panics.
//
// When stderr is closed or redirected to a broken pipe, `eprintln!` panics on
// write errors. Trace and metrics sinks report their own failures through this
// macro so a logging problem can never take a request down with it.

#[macro_export]
macro_rules! safe_eprintln {
    ($($arg:tt)*) => {{
        use std::io::Write;
        let _ = writeln!(std::io::stderr(), $($arg)*);
    }};
}
