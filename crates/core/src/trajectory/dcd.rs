//! DCD trajectory file reader.
//!
//! Reads CHARMM/NAMD/X-PLOR DCD binary trajectory format with random access
//! by frame index. Coordinates are converted from Angstrom to nm.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::atoms::AtomicGroup;
use crate::error::{TrajError, TrajResult};
use crate::trajectory::TrajectoryReader;

/// Angstrom to nm conversion factor
pub const ANGSTROM_TO_NM: f64 = 0.1;

/// DCD file header information.
#[derive(Debug, Clone)]
pub struct DcdHeader {
    /// Number of frames in trajectory
    pub n_frames: usize,
    /// Number of atoms
    pub n_atoms: usize,
    /// Starting timestep
    pub start_timestep: i32,
    /// Timestep interval between frames
    pub timestep_interval: i32,
    /// Integration timestep in AKMA units
    pub timestep: f32,
    /// Whether unit cell information is present
    pub has_unit_cell: bool,
    /// Whether this is a CHARMM format DCD
    pub is_charmm: bool,
    /// Whether the file is big-endian
    pub is_big_endian: bool,
    /// Title strings from header
    pub titles: Vec<String>,
    /// File byte offset where frame data begins
    pub first_frame_offset: u64,
    /// Size in bytes of each frame (for seeking)
    pub frame_size: usize,
}

/// Random-access DCD reader.
pub struct DcdReader {
    reader: BufReader<File>,
    header: DcdHeader,
    path: PathBuf,
    scratch: Vec<u8>,
}

impl DcdReader {
    /// Open a DCD file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> TrajResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut header = read_dcd_header_internal(&mut reader)?;

        // Writers that crash before patching the header leave a stale count.
        let data_len = file_len.saturating_sub(header.first_frame_offset);
        let on_disk = if header.frame_size == 0 {
            0
        } else {
            (data_len / header.frame_size as u64) as usize
        };
        if on_disk != header.n_frames {
            log::warn!(
                "{}: header declares {} frames but file holds {}; using {}",
                path.display(),
                header.n_frames,
                on_disk,
                on_disk
            );
            header.n_frames = on_disk;
        }
        log::debug!(
            "opened {} ({} frames, {} atoms)",
            path.display(),
            header.n_frames,
            header.n_atoms
        );

        Ok(Self {
            reader,
            header,
            path,
            scratch: Vec::new(),
        })
    }

    /// Get the header information.
    pub fn header(&self) -> &DcdHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seek_frame(&mut self, frame: usize) -> TrajResult<()> {
        let offset =
            self.header.first_frame_offset + (frame as u64) * (self.header.frame_size as u64);
        self.reader.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Read one Fortran record of exactly `expected` payload bytes into scratch.
    fn read_record(&mut self, expected: usize) -> TrajResult<()> {
        let big = self.header.is_big_endian;
        let lead = read_i32(&mut self.reader, big)?;
        if lead as i64 != expected as i64 {
            return Err(TrajError::Parse(format!(
                "{}: expected a record of {} bytes, found {}",
                self.path.display(),
                expected,
                lead
            )));
        }
        self.scratch.resize(expected, 0);
        self.reader.read_exact(&mut self.scratch)?;
        let _trail = read_i32(&mut self.reader, big)?;
        Ok(())
    }

    fn read_unit_cell(&mut self) -> TrajResult<[f64; 6]> {
        self.read_record(48)?;
        let big = self.header.is_big_endian;
        let mut vals = [0.0f64; 6];
        for (v, chunk) in vals.iter_mut().zip(self.scratch.chunks_exact(8)) {
            let bytes: [u8; 8] = [
                chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ];
            *v = if big {
                f64::from_be_bytes(bytes)
            } else {
                f64::from_le_bytes(bytes)
            };
        }
        // Stored as a, gamma, b, beta, alpha, c
        let [a, gamma, b, beta, alpha, c] = vals;
        Ok([
            a * ANGSTROM_TO_NM,
            b * ANGSTROM_TO_NM,
            c * ANGSTROM_TO_NM,
            alpha,
            beta,
            gamma,
        ])
    }

    fn read_axis(&mut self, axis: usize, frame: &mut AtomicGroup) -> TrajResult<()> {
        let n_atoms = self.header.n_atoms;
        self.read_record(n_atoms * 4)?;
        let big = self.header.is_big_endian;
        for (c, chunk) in frame.coords_mut().iter_mut().zip(self.scratch.chunks_exact(4)) {
            let bytes = [chunk[0], chunk[1], chunk[2], chunk[3]];
            let v = if big {
                f32::from_be_bytes(bytes)
            } else {
                f32::from_le_bytes(bytes)
            };
            c[axis] = v as f64 * ANGSTROM_TO_NM;
        }
        Ok(())
    }
}

impl TrajectoryReader for DcdReader {
    fn n_frames(&self) -> usize {
        self.header.n_frames
    }

    fn n_atoms(&self) -> usize {
        self.header.n_atoms
    }

    fn read_frame(&mut self, index: usize, frame: &mut AtomicGroup) -> TrajResult<()> {
        if index >= self.header.n_frames {
            return Err(TrajError::out_of_range(index, self.header.n_frames));
        }
        if frame.len() != self.header.n_atoms {
            return Err(TrajError::Mismatch(format!(
                "{} has {} atoms but the model has {}",
                self.path.display(),
                self.header.n_atoms,
                frame.len()
            )));
        }
        self.seek_frame(index)?;
        let cell = if self.header.has_unit_cell {
            Some(self.read_unit_cell()?)
        } else {
            None
        };
        for axis in 0..3 {
            self.read_axis(axis, frame)?;
        }
        frame.set_periodic_box(cell);
        Ok(())
    }
}

fn read_i32<R: Read>(reader: &mut R, big_endian: bool) -> TrajResult<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(if big_endian {
        i32::from_be_bytes(buf)
    } else {
        i32::from_le_bytes(buf)
    })
}

fn read_f32<R: Read>(reader: &mut R, big_endian: bool) -> TrajResult<f32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(if big_endian {
        f32::from_be_bytes(buf)
    } else {
        f32::from_le_bytes(buf)
    })
}

/// Detect endianness by checking the first block size (should be 84).
fn detect_endianness<R: Read + Seek>(reader: &mut R) -> TrajResult<bool> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    reader.seek(SeekFrom::Current(-4))?;

    let le_val = i32::from_le_bytes(buf);
    let be_val = i32::from_be_bytes(buf);
    if le_val == 84 {
        Ok(false)
    } else if be_val == 84 {
        Ok(true)
    } else {
        Err(TrajError::Parse(format!(
            "Invalid DCD header: first block size is {} (LE) or {} (BE), expected 84",
            le_val, be_val
        )))
    }
}

fn read_dcd_header_internal<R: Read + Seek>(reader: &mut R) -> TrajResult<DcdHeader> {
    let big = detect_endianness(reader)?;
    let parse_err = |msg: String| TrajError::Parse(msg);

    // First block: main header
    let block1_size = read_i32(reader, big)?;
    if block1_size != 84 {
        return Err(parse_err(format!("Invalid DCD header size: {}", block1_size)));
    }

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != b"CORD" {
        return Err(parse_err(format!("Invalid DCD magic: {:?}", magic)));
    }

    let n_frames_i32 = read_i32(reader, big)?;
    if n_frames_i32 < 0 {
        return Err(parse_err(format!("Invalid number of frames: {}", n_frames_i32)));
    }
    let start_timestep = read_i32(reader, big)?;
    let timestep_interval = read_i32(reader, big)?;
    let mut unused = [0u8; 20];
    reader.read_exact(&mut unused)?;
    let n_fixed = read_i32(reader, big)?;
    if n_fixed != 0 {
        return Err(TrajError::Unsupported(format!(
            "DCD files with {} fixed atoms",
            n_fixed
        )));
    }
    let timestep = read_f32(reader, big)?;
    let has_unit_cell = read_i32(reader, big)? != 0;

    let mut skip_buf = [0u8; 32];
    reader.read_exact(&mut skip_buf)?;
    let charmm_version = read_i32(reader, big)?;
    let is_charmm = charmm_version != 0;
    if is_charmm && skip_buf[0..4] != [0, 0, 0, 0] {
        return Err(TrajError::Unsupported(
            "DCD files with four-dimensional coordinates".into(),
        ));
    }
    let _block1_end = read_i32(reader, big)?;

    // Second block: titles
    let block2_size = read_i32(reader, big)?;
    let n_titles = read_i32(reader, big)?;
    if n_titles < 0 || 4 + n_titles as i64 * 80 > block2_size as i64 {
        return Err(parse_err(format!(
            "Title block of {} bytes cannot hold {} titles",
            block2_size, n_titles
        )));
    }
    let mut titles = Vec::with_capacity(n_titles as usize);
    for _ in 0..n_titles {
        let mut title_buf = [0u8; 80];
        reader.read_exact(&mut title_buf)?;
        titles.push(
            String::from_utf8_lossy(&title_buf)
                .trim_end_matches(['\0', ' '])
                .to_string(),
        );
    }
    let remaining = block2_size as i64 - (4 + n_titles as i64 * 80);
    if remaining > 0 {
        reader.seek(SeekFrom::Current(remaining))?;
    }
    let _block2_end = read_i32(reader, big)?;

    // Third block: number of atoms
    let _block3_size = read_i32(reader, big)?;
    let n_atoms_i32 = read_i32(reader, big)?;
    if n_atoms_i32 < 0 {
        return Err(parse_err(format!("Invalid number of atoms: {}", n_atoms_i32)));
    }
    let n_atoms = n_atoms_i32 as usize;
    let _block3_end = read_i32(reader, big)?;

    let first_frame_offset = reader.stream_position()?;

    let coord_block_size = n_atoms
        .checked_mul(4)
        .and_then(|v| v.checked_add(8))
        .ok_or_else(|| parse_err(format!("Frame size overflow: n_atoms={}", n_atoms)))?;
    let unit_cell_size = if has_unit_cell { 4 + 48 + 4 } else { 0 };
    let frame_size = coord_block_size
        .checked_mul(3)
        .and_then(|v| v.checked_add(unit_cell_size))
        .ok_or_else(|| parse_err(format!("Frame size overflow: n_atoms={}", n_atoms)))?;

    Ok(DcdHeader {
        n_frames: n_frames_i32 as usize,
        n_atoms,
        start_timestep,
        timestep_interval,
        timestep,
        has_unit_cell,
        is_charmm,
        is_big_endian: big,
        titles,
        first_frame_offset,
        frame_size,
    })
}

/// Read the header from a DCD file.
pub fn read_dcd_header<P: AsRef<Path>>(path: P) -> TrajResult<DcdHeader> {
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::new(file);
    read_dcd_header_internal(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::{Atom, AtomicGroup};
    use crate::trajectory::writer::DcdWriter;

    fn model(n: usize) -> AtomicGroup {
        AtomicGroup::from_atoms(
            (0..n)
                .map(|i| Atom::new(i as i64 + 1, "CA", "ALA", i as i64 + 1))
                .collect(),
        )
    }

    fn write_frames(path: &Path, frames: &[Vec<[f64; 3]>], cell: Option<[f64; 6]>) {
        let mut writer = DcdWriter::create(path, frames[0].len(), cell.is_some()).unwrap();
        let mut g = model(frames[0].len());
        for f in frames {
            g.set_coords(f).unwrap();
            g.set_periodic_box(cell);
            writer.write_frame(&g).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn random_access_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("three.dcd");
        let frames: Vec<Vec<[f64; 3]>> = (0..3)
            .map(|k| vec![[k as f64, 0.5, -1.0], [0.25, k as f64 * 2.0, 3.0]])
            .collect();
        write_frames(&path, &frames, None);

        let header = read_dcd_header(&path).unwrap();
        assert_eq!(header.n_frames, 3);
        assert_eq!(header.n_atoms, 2);
        assert!(!header.has_unit_cell);

        let mut reader = DcdReader::open(&path).unwrap();
        let mut g = model(2);
        reader.read_frame(2, &mut g).unwrap();
        assert!((g.coords()[0][0] - 2.0).abs() < 1e-6);
        assert!((g.coords()[1][1] - 4.0).abs() < 1e-6);
        reader.read_frame(0, &mut g).unwrap();
        assert!((g.coords()[1][2] - 3.0).abs() < 1e-6);
        assert!(g.periodic_box().is_none());
    }

    #[test]
    fn unit_cell_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cell.dcd");
        let cell = [4.0, 5.0, 6.0, 90.0, 90.0, 120.0];
        write_frames(&path, &[vec![[1.0, 1.0, 1.0]]], Some(cell));

        let mut reader = DcdReader::open(&path).unwrap();
        let mut g = model(1);
        reader.read_frame(0, &mut g).unwrap();
        let got = g.periodic_box().unwrap();
        for (a, b) in got.iter().zip(cell.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn read_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.dcd");
        write_frames(&path, &[vec![[0.0; 3]; 2]], None);

        let mut reader = DcdReader::open(&path).unwrap();
        let mut g = model(2);
        assert!(matches!(
            reader.read_frame(1, &mut g),
            Err(TrajError::OutOfRange { index: 1, len: 1 })
        ));
        let mut wrong = model(3);
        assert!(matches!(
            reader.read_frame(0, &mut wrong),
            Err(TrajError::Mismatch(_))
        ));

        let junk = dir.path().join("junk.dcd");
        std::fs::write(&junk, b"not a trajectory at all").unwrap();
        assert!(matches!(DcdReader::open(&junk), Err(TrajError::Parse(_))));
    }
}
