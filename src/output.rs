//! Buffered, zero-allocation writer for the predictions output table.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::classifier::Relatedness;
use crate::error::{RaffiError, Result};

const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

pub struct PredictionsWriter<W: Write> {
    writer: BufWriter<W>,
    itoa_buf: itoa::Buffer,
    path: PathBuf,
}

impl PredictionsWriter<File> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| RaffiError::io(path, e))?;
        Ok(PredictionsWriter {
            writer: BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file),
            itoa_buf: itoa::Buffer::new(),
            path: path.to_path_buf(),
        })
    }
}

impl<W: Write> PredictionsWriter<W> {
    fn wrap_io(&self, e: io::Error) -> RaffiError {
        RaffiError::io(&self.path, e)
    }

    pub fn write_header(&mut self) -> Result<()> {
        self.writer
            .write_all(b"ID1\tID2\tKINSHIP\tIBD0\tIBD1\tIBD2\tTYPE\n")
            .map_err(|e| self.wrap_io(e))
    }

    pub fn write_row(
        &mut self,
        id1: &str,
        id2: &str,
        kinship: f64,
        ibd0: f64,
        ibd1: f64,
        ibd2: f64,
        relatedness: Relatedness,
    ) -> Result<()> {
        self.writer
            .write_all(id1.as_bytes())
            .map_err(|e| self.wrap_io(e))?;
        self.writer.write_all(b"\t").map_err(|e| self.wrap_io(e))?;
        self.writer
            .write_all(id2.as_bytes())
            .map_err(|e| self.wrap_io(e))?;
        self.writer.write_all(b"\t").map_err(|e| self.wrap_io(e))?;
        self.write_fixed4(kinship)?;
        self.writer.write_all(b"\t").map_err(|e| self.wrap_io(e))?;
        self.write_fixed4(ibd0)?;
        self.writer.write_all(b"\t").map_err(|e| self.wrap_io(e))?;
        self.write_fixed4(ibd1)?;
        self.writer.write_all(b"\t").map_err(|e| self.wrap_io(e))?;
        self.write_fixed4(ibd2)?;
        self.writer.write_all(b"\t").map_err(|e| self.wrap_io(e))?;
        self.writer
            .write_all(relatedness.label().as_bytes())
            .map_err(|e| self.wrap_io(e))?;
        self.writer.write_all(b"\n").map_err(|e| self.wrap_io(e))
    }

    /// Writes `value` with exactly four decimal digits, matching the
    /// original tool's `std::fixed << std::setprecision(4)` output.
    fn write_fixed4(&mut self, value: f64) -> Result<()> {
        let negative = value.is_sign_negative() && value != 0.0;
        let scaled = (value.abs() * 10_000.0).round() as u64;
        let int_part = scaled / 10_000;
        let frac_part = scaled % 10_000;

        if negative {
            self.writer.write_all(b"-").map_err(|e| self.wrap_io(e))?;
        }
        let formatted = self.itoa_buf.format(int_part).as_bytes().to_vec();
        self.writer
            .write_all(&formatted)
            .map_err(|e| self.wrap_io(e))?;
        self.writer.write_all(b".").map_err(|e| self.wrap_io(e))?;

        let frac_formatted = self.itoa_buf.format(frac_part).as_bytes().to_vec();
        for _ in 0..(4 - frac_formatted.len()) {
            self.writer.write_all(b"0").map_err(|e| self.wrap_io(e))?;
        }
        self.writer
            .write_all(&frac_formatted)
            .map_err(|e| self.wrap_io(e))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| self.wrap_io(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_fixed_four_decimal_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.txt");
        {
            let mut w = PredictionsWriter::create(&path).unwrap();
            w.write_header().unwrap();
            w.write_row(
                "sampleA",
                "sampleB",
                0.125,
                0.5,
                0.25,
                0.0,
                Relatedness::SecondDegree,
            )
            .unwrap();
            w.flush().unwrap();
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "ID1\tID2\tKINSHIP\tIBD0\tIBD1\tIBD2\tTYPE\n\
             sampleA\tsampleB\t0.1250\t0.5000\t0.2500\t0.0000\t2nd\n"
        );
    }

    #[test]
    fn pads_short_fractional_parts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.txt");
        {
            let mut w = PredictionsWriter::create(&path).unwrap();
            w.write_row("a", "b", 0.001, 0.0, 0.0, 0.0, Relatedness::Unrelated)
                .unwrap();
            w.flush().unwrap();
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("a\tb\t0.0010\t"));
    }
}
