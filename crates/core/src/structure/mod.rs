//! Building a model (atoms plus one coordinate set) from structure files.

pub mod pdb;

use std::path::Path;

use crate::amber::{inpcrd, prmtop};
use crate::atoms::AtomicGroup;
use crate::error::{TrajError, TrajResult};

pub use pdb::read_pdb;

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Read a model, choosing the parser from the file extension.
///
/// PDB files (`.pdb`, `.ent`) carry coordinates; AMBER topologies
/// (`.prmtop`, `.parm7`, `.top`) do not, so their atoms start at the origin.
pub fn create_system<P: AsRef<Path>>(path: P) -> TrajResult<AtomicGroup> {
    let path = path.as_ref();
    let group = match extension(path).as_str() {
        "pdb" | "ent" => pdb::read_pdb(path)?,
        "prmtop" | "parm7" | "top" => prmtop::read_prmtop(path)?,
        _ => {
            return Err(TrajError::Unsupported(format!(
                "model format of {}",
                path.display()
            )))
        }
    };
    log::debug!("read {} atoms from {}", group.len(), path.display());
    Ok(group)
}

/// Read a topology and fill its coordinates from an AMBER coordinate file
/// (`.inpcrd`, `.rst7`, `.crd`) or a PDB.
pub fn create_system_with_coordinates<P, Q>(topology: P, coordinates: Q) -> TrajResult<AtomicGroup>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let mut group = create_system(topology)?;
    let coordinates = coordinates.as_ref();
    let (positions, periodic_box) = match extension(coordinates).as_str() {
        "inpcrd" | "rst7" | "crd" | "rst" => {
            let crd = inpcrd::read_inpcrd(coordinates)?;
            (crd.positions, crd.periodic_box)
        }
        "pdb" | "ent" => {
            let model = pdb::read_pdb(coordinates)?;
            (model.coords().to_vec(), model.periodic_box())
        }
        _ => {
            return Err(TrajError::Unsupported(format!(
                "coordinate format of {}",
                coordinates.display()
            )))
        }
    };
    group.set_coords(&positions)?;
    group.set_periodic_box(periodic_box);
    Ok(group)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDB: &str = "\
ATOM      1  N   ALA A   1       1.000   2.000   3.000  1.00  0.00           N
ATOM      2  CA  ALA A   1       2.000   2.000   3.000  1.00  0.00           C
";

    #[test]
    fn dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let pdb = dir.path().join("model.PDB");
        std::fs::write(&pdb, PDB).unwrap();
        let group = create_system(&pdb).unwrap();
        assert_eq!(group.len(), 2);

        let other = dir.path().join("model.gro");
        std::fs::write(&other, PDB).unwrap();
        assert!(matches!(
            create_system(&other),
            Err(TrajError::Unsupported(_))
        ));
        assert!(matches!(
            create_system(dir.path().join("missing.pdb")),
            Err(TrajError::Io(_))
        ));
    }

    #[test]
    fn coordinates_from_second_file() {
        let dir = tempfile::tempdir().unwrap();
        let pdb = dir.path().join("model.pdb");
        std::fs::write(&pdb, PDB).unwrap();
        let crd = dir.path().join("model.inpcrd");
        std::fs::write(
            &crd,
            "title\n     2\n  10.0000000  10.0000000  10.0000000  20.0000000  20.0000000  20.0000000\n",
        )
        .unwrap();
        let group = create_system_with_coordinates(&pdb, &crd).unwrap();
        assert!((group.coords()[1][0] - 2.0).abs() < 1e-12);
        assert_eq!(group.atoms()[1].name, "CA");
    }
}
