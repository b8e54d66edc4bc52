//! Run artifacts: assignment files and the constraint-incoherence trace.
//!
//! Both formats are plain tab-separated lines:
//!
//! ```text
//! assignments:  index<TAB>cluster      (-1 for an unassigned point)
//! incoherence:  iteration<TAB>value
//! ```

use std::io::{self, Write};

use crate::cluster::UNASSIGNED;
use crate::constraints::ConstraintSet;

/// Write one `index<TAB>cluster` line per point.
pub fn write_assignments<W: Write>(mut out: W, assignment: &[usize]) -> io::Result<()> {
    for (i, &k) in assignment.iter().enumerate() {
        if k == UNASSIGNED {
            writeln!(out, "{i}\t-1")?;
        } else {
            writeln!(out, "{i}\t{k}")?;
        }
    }
    out.flush()
}

/// Write one `iteration<TAB>value` line per recorded iteration.
pub fn write_incoherence<W: Write>(mut out: W, trace: &[f64]) -> io::Result<()> {
    for (iteration, value) in trace.iter().enumerate() {
        writeln!(out, "{iteration}\t{value}")?;
    }
    out.flush()
}

/// Fraction of (must-link, cannot-link) combinations in which the must-linked
/// pair lies farther apart than the cannot-linked pair.
///
/// 0 means the metric agrees with every constraint; 1 means it disagrees with
/// all of them. Returns 0 when either kind of constraint is absent.
pub fn incoherence(constraints: &ConstraintSet, distance: impl Fn(usize, usize) -> f64) -> f64 {
    let mut cannot: Vec<f64> = constraints
        .cannot_links()
        .map(|p| distance(p.lower(), p.higher()))
        .collect();
    if cannot.is_empty() {
        return 0.0;
    }
    cannot.sort_by(f64::total_cmp);

    let mut combinations = 0usize;
    let mut incoherent = 0usize;
    for pair in constraints.must_links() {
        let d = distance(pair.lower(), pair.higher());
        incoherent += cannot.partition_point(|&c| c < d);
        combinations += cannot.len();
    }
    if combinations == 0 {
        0.0
    } else {
        incoherent as f64 / combinations as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::LinkType;

    #[test]
    fn test_assignment_lines() {
        let mut buf = Vec::new();
        write_assignments(&mut buf, &[1, 0, UNASSIGNED]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "0\t1\n1\t0\n2\t-1\n");
    }

    #[test]
    fn test_incoherence_lines() {
        let mut buf = Vec::new();
        write_incoherence(&mut buf, &[0.5, 0.25]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "0\t0.5\n1\t0.25\n");
    }

    #[test]
    fn test_incoherence_fraction() {
        let points = [0.0f64, 1.0, 5.0, 6.0];
        let set = ConstraintSet::from_triples(
            4,
            [
                (0, 1, LinkType::MustLink),
                (0, 3, LinkType::MustLink),
                (1, 2, LinkType::CannotLink),
            ],
        )
        .unwrap();
        let dist = |i: usize, j: usize| (points[i] - points[j]).abs();
        // ML(0,1)=1 < CL(1,2)=4; ML(0,3)=6 > 4
        assert_eq!(incoherence(&set, dist), 0.5);
    }

    #[test]
    fn test_incoherence_without_cannot_links() {
        let set = ConstraintSet::from_triples(2, [(0, 1, LinkType::MustLink)]).unwrap();
        assert_eq!(incoherence(&set, |_, _| 1.0), 0.0);
    }
}
