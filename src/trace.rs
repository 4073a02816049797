//! Chrome trace output for build phases.
//!
//! Off by default; call [`open`] to start collecting and [`close`] to finish
//! the file.  Load the result in `chrome://tracing` or Perfetto.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

static TRACE: Mutex<Option<Trace>> = Mutex::new(None);

struct Trace {
    start: Instant,
    w: BufWriter<File>,
}

impl Trace {
    fn new(path: &Path) -> std::io::Result<Self> {
        let mut w = BufWriter::new(File::create(path)?);
        writeln!(w, "[")?;
        Ok(Trace {
            start: Instant::now(),
            w,
        })
    }

    fn write_complete(
        &mut self,
        name: &str,
        start: Instant,
        end: Instant,
    ) -> std::io::Result<()> {
        writeln!(
            self.w,
            "{{ \"pid\": 0, \"name\": {:?}, \"ts\": {}, \"ph\": \"X\", \"dur\": {} }},",
            name,
            start.duration_since(self.start).as_micros(),
            end.duration_since(start).as_micros(),
        )
    }

    fn close(&mut self) -> std::io::Result<()> {
        let end = Instant::now();
        self.write_complete("main", self.start, end)?;
        writeln!(self.w, "]")?;
        self.w.flush()
    }
}

/// Start tracing to a file.  Replaces any trace already in progress.
pub fn open(path: &Path) -> std::io::Result<()> {
    let trace = Trace::new(path)?;
    *TRACE.lock().unwrap() = Some(trace);
    Ok(())
}

/// Time `f` and record it as a complete event, if tracing is open.
pub fn scope<T>(name: &'static str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    let end = Instant::now();
    if let Some(trace) = TRACE.lock().unwrap().as_mut() {
        // A failed trace write never fails the build.
        let _ = trace.write_complete(name, start, end);
    }
    result
}

/// Finish and flush the trace file, if tracing is open.
pub fn close() -> std::io::Result<()> {
    if let Some(trace) = TRACE.lock().unwrap().as_mut() {
        trace.close()?;
    }
    *TRACE.lock().unwrap() = None;
    Ok(())
}
