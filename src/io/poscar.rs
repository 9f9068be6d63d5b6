// src/io/poscar.rs

use crate::model::{Atom, Structure};
use crate::utils::linalg::cart_to_frac;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn parse_floats(line: &str, what: &str) -> io::Result<[f64; 3]> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(invalid(format!("Invalid {} line: '{}'", what, line.trim())));
    }
    let mut out = [0.0; 3];
    for (slot, part) in out.iter_mut().zip(&parts) {
        *slot = part
            .parse::<f64>()
            .map_err(|_| invalid(format!("Invalid number '{}' in {} line", part, what)))?;
    }
    Ok(out)
}

pub fn parse(path: impl AsRef<Path>) -> io::Result<Structure> {
    let file = File::open(path.as_ref())?;
    parse_reader(io::BufReader::new(file))
}

pub fn parse_reader<R: BufRead>(reader: R) -> io::Result<Structure> {
    let mut lines = reader.lines();
    let mut next_line = |what: &str| -> io::Result<String> {
        lines.next().ok_or_else(|| invalid(format!("Missing {}", what)))?
    };

    let comment = next_line("comment")?;

    // Scale
    let scale_line = next_line("scale")?;
    let scale: f64 = scale_line
        .trim()
        .parse()
        .map_err(|_| invalid("Invalid Scale"))?;

    // Lattice
    let mut lattice = [[0.0; 3]; 3];
    for row in lattice.iter_mut() {
        let v = parse_floats(&next_line("lattice")?, "lattice")?;
        for (c, x) in row.iter_mut().zip(v) {
            *c = x * scale;
        }
    }

    // Elements (optional in VASP 4 files) & Counts
    let line6 = next_line("elements")?;
    let has_names = line6.trim().chars().next().is_some_and(|c| c.is_alphabetic());
    let (names_line, counts_line) = if has_names {
        (line6, next_line("counts")?)
    } else {
        (String::new(), line6)
    };

    let element_names: Vec<&str> = names_line.split_whitespace().collect();
    let counts = counts_line
        .split_whitespace()
        .map(|x| x.parse::<usize>().map_err(|_| invalid(format!("Invalid count '{}'", x))))
        .collect::<io::Result<Vec<usize>>>()?;

    // Mode, skipping "Selective dynamics"
    let mut mode_line = next_line("mode")?;
    if mode_line.trim().to_lowercase().starts_with('s') {
        mode_line = next_line("mode")?;
    }
    let is_direct = mode_line.trim().to_lowercase().starts_with('d');

    // Atoms
    let mut atoms = Vec::new();
    for (elem_idx, &count) in counts.iter().enumerate() {
        let elem_name = element_names.get(elem_idx).copied().unwrap_or("X").to_string();
        for _ in 0..count {
            let [x, y, z] = parse_floats(&next_line("atom position")?, "atom position")?;

            let position = if is_direct {
                [
                    x * lattice[0][0] + y * lattice[1][0] + z * lattice[2][0],
                    x * lattice[0][1] + y * lattice[1][1] + z * lattice[2][1],
                    x * lattice[0][2] + y * lattice[1][2] + z * lattice[2][2],
                ]
            } else {
                [x * scale, y * scale, z * scale]
            };

            let idx = atoms.len();
            atoms.push(Atom {
                element: elem_name.clone(),
                position,
                original_index: idx,
            });
        }
    }

    Ok(Structure {
        lattice,
        atoms,
        formula: comment.trim().to_string(),
    })
}

pub fn write(path: impl AsRef<Path>, structure: &Structure) -> io::Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_to(&mut writer, structure)?;
    writer.flush()
}

pub fn write_to<W: Write>(out: &mut W, structure: &Structure) -> io::Result<()> {
    // 1. Header
    let title = if structure.formula.is_empty() { "dsenum" } else { structure.formula.as_str() };
    writeln!(out, "{}", title)?;
    writeln!(out, "1.0")?; // Universal scaling factor

    // 2. Lattice Vectors
    for vec in &structure.lattice {
        writeln!(out, " {:14.10} {:14.10} {:14.10}", vec[0], vec[1], vec[2])?;
    }

    // 3. Group atoms by element, in order of first appearance
    let mut groups: Vec<(&str, Vec<&Atom>)> = Vec::new();
    for atom in &structure.atoms {
        match groups.iter_mut().find(|(e, _)| *e == atom.element) {
            Some((_, list)) => list.push(atom),
            None => groups.push((atom.element.as_str(), vec![atom])),
        }
    }

    for (label, _) in &groups {
        write!(out, " {:<4}", label)?;
    }
    writeln!(out)?;
    for (_, list) in &groups {
        write!(out, " {:<4}", list.len())?;
    }
    writeln!(out)?;

    // 4. Atomic Positions (Direct/Fractional)
    writeln!(out, "Direct")?;
    for atom in groups.iter().flat_map(|(_, list)| list) {
        let [u, v, w] = cart_to_frac(atom.position, structure.lattice)
            .ok_or_else(|| invalid("Singular lattice"))?;
        writeln!(out, " {:14.10} {:14.10} {:14.10}", u, v, w)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NACL: &str = "rocksalt
1.0
  0.0 2.8 2.8
  2.8 0.0 2.8
  2.8 2.8 0.0
Na Cl
1 1
Direct
 0.0 0.0 0.0
 0.5 0.5 0.5
";

    #[test]
    fn test_parse_direct() {
        let s = parse_reader(NACL.as_bytes()).unwrap();
        assert_eq!(s.formula, "rocksalt");
        assert_eq!(s.atoms.len(), 2);
        assert_eq!(s.atoms[1].element, "Cl");
        assert!((s.atoms[1].position[0] - 2.8).abs() < 1e-12);
    }

    #[test]
    fn test_write_then_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("POSCAR");
        let s = parse_reader(NACL.as_bytes()).unwrap();
        write(&path, &s).unwrap();

        let back = parse(&path).unwrap();
        assert_eq!(back.atoms.len(), 2);
        for (a, b) in s.atoms.iter().zip(&back.atoms) {
            assert_eq!(a.element, b.element);
            for k in 0..3 {
                assert!((a.position[k] - b.position[k]).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn test_truncated_file() {
        let broken = "title\n1.0\n1 0 0\n0 1 0\n";
        let err = parse_reader(broken.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let bad_count = NACL.replace("1 1", "1 x");
        assert!(parse_reader(bad_count.as_bytes()).is_err());
    }
}
