use rtmap::PafRecord;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write JSON string to stdout or a file.
pub fn write_output(json: &str, output_path: Option<&str>) -> Result<(), String> {
    match output_path {
        Some(path) => {
            std::fs::write(Path::new(path), json)
                .map_err(|e| format!("Failed to write output file '{}': {}", path, e))
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(json.as_bytes())
                .and_then(|_| handle.write_all(b"\n"))
                .map_err(|e| format!("Failed to write to stdout: {}", e))
        }
    }
}

/// Serialize a value to JSON (pretty or compact).
pub fn to_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<String, String> {
    if compact {
        serde_json::to_string(value).map_err(|e| format!("JSON serialization failed: {}", e))
    } else {
        serde_json::to_string_pretty(value)
            .map_err(|e| format!("JSON serialization failed: {}", e))
    }
}

/// Streams mapping records, one per line, as PAF or compact JSON.
pub struct RecordWriter {
    out: Box<dyn Write>,
    json: bool,
    written: u64,
}

impl RecordWriter {
    /// Open `output_path`, or stdout when None
    pub fn create(output_path: Option<&str>, json: bool) -> Result<Self, String> {
        let out: Box<dyn Write> = match output_path {
            Some(path) => {
                let file = File::create(path)
                    .map_err(|e| format!("Failed to create output file '{}': {}", path, e))?;
                Box::new(BufWriter::new(file))
            }
            None => Box::new(BufWriter::new(std::io::stdout())),
        };
        Ok(Self::from_writer(out, json))
    }

    pub fn from_writer(out: Box<dyn Write>, json: bool) -> Self {
        Self {
            out,
            json,
            written: 0,
        }
    }

    pub fn write(&mut self, record: &PafRecord) -> Result<(), String> {
        let line = if self.json {
            to_json(record, true)?
        } else {
            record.to_string()
        };
        writeln!(self.out, "{}", line).map_err(|e| format!("Failed to write record: {}", e))?;
        self.written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<u64, String> {
        self.out
            .flush()
            .map_err(|e| format!("Failed to flush output: {}", e))?;
        Ok(self.written)
    }
}
