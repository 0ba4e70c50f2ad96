//! DCD trajectory writer (little-endian, CHARMM flavour).
//!
//! Coordinates are converted from nm to Angstrom on the way out.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::atoms::AtomicGroup;
use crate::error::{TrajError, TrajResult};
use crate::trajectory::dcd::ANGSTROM_TO_NM;

const TITLE: &str = "Created by trajseq";
const CHARMM_VERSION: i32 = 24;

pub struct DcdWriter {
    out: BufWriter<File>,
    n_atoms: usize,
    has_unit_cell: bool,
    n_written: usize,
    buf: Vec<u8>,
}

impl DcdWriter {
    /// Create `path` and write a header for `n_atoms` atoms.
    pub fn create<P: AsRef<Path>>(path: P, n_atoms: usize, has_unit_cell: bool) -> TrajResult<Self> {
        let n_atoms_i32 = i32::try_from(n_atoms).map_err(|_| {
            TrajError::InvalidOptions(format!("{} atoms do not fit a DCD header", n_atoms))
        })?;
        let mut out = BufWriter::new(File::create(path.as_ref())?);

        // "CORD" followed by the 20-word control array. NSET (word 0) and
        // NSTEP (word 3) are patched in by `finish`.
        let mut block = Vec::with_capacity(84);
        block.extend_from_slice(b"CORD");
        for word in 0..20 {
            let bytes = match word {
                2 => 1i32.to_le_bytes(),
                9 => 1.0f32.to_le_bytes(),
                10 => (has_unit_cell as i32).to_le_bytes(),
                19 => CHARMM_VERSION.to_le_bytes(),
                _ => 0i32.to_le_bytes(),
            };
            block.extend_from_slice(&bytes);
        }
        write_record(&mut out, &block)?;

        let mut titles = Vec::with_capacity(84);
        titles.extend_from_slice(&1i32.to_le_bytes());
        let mut title = [b' '; 80];
        title[..TITLE.len()].copy_from_slice(TITLE.as_bytes());
        titles.extend_from_slice(&title);
        write_record(&mut out, &titles)?;

        write_record(&mut out, &n_atoms_i32.to_le_bytes())?;

        Ok(Self {
            out,
            n_atoms,
            has_unit_cell,
            n_written: 0,
            buf: Vec::with_capacity(n_atoms * 4),
        })
    }

    pub fn frames_written(&self) -> usize {
        self.n_written
    }

    /// Append one frame. A missing box is written as zeros when the file
    /// carries unit cells.
    pub fn write_frame(&mut self, frame: &AtomicGroup) -> TrajResult<()> {
        if frame.len() != self.n_atoms {
            return Err(TrajError::Mismatch(format!(
                "writer expects {} atoms, frame has {}",
                self.n_atoms,
                frame.len()
            )));
        }
        if self.has_unit_cell {
            let [a, b, c, alpha, beta, gamma] = frame.periodic_box().unwrap_or([0.0; 6]);
            self.buf.clear();
            for v in [
                a / ANGSTROM_TO_NM,
                gamma,
                b / ANGSTROM_TO_NM,
                beta,
                alpha,
                c / ANGSTROM_TO_NM,
            ] {
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
            write_record(&mut self.out, &self.buf)?;
        }
        for axis in 0..3 {
            self.buf.clear();
            for c in frame.coords() {
                self.buf
                    .extend_from_slice(&((c[axis] / ANGSTROM_TO_NM) as f32).to_le_bytes());
            }
            write_record(&mut self.out, &self.buf)?;
        }
        self.n_written += 1;
        Ok(())
    }

    /// Patch the frame count into the header and flush.
    pub fn finish(mut self) -> TrajResult<()> {
        let count = i32::try_from(self.n_written).map_err(|_| {
            TrajError::InvalidOptions(format!("{} frames do not fit a DCD header", self.n_written))
        })?;
        self.out.flush()?;
        let file = self.out.get_mut();
        // NSET sits right after the record marker and "CORD".
        file.seek(SeekFrom::Start(8))?;
        file.write_all(&count.to_le_bytes())?;
        // NSTEP: total steps covered.
        file.seek(SeekFrom::Start(20))?;
        file.write_all(&count.to_le_bytes())?;
        file.flush()?;
        log::debug!("wrote {} DCD frames", self.n_written);
        Ok(())
    }
}

fn write_record<W: Write>(out: &mut W, payload: &[u8]) -> TrajResult<()> {
    let len = i32::try_from(payload.len())
        .map_err(|_| TrajError::InvalidOptions("DCD record too large".into()))?;
    out.write_all(&len.to_le_bytes())?;
    out.write_all(payload)?;
    out.write_all(&len.to_le_bytes())?;
    Ok(())
}
