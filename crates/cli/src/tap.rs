//! TAP version 14 report for the conformance suite.
//!
//! Every point belongs to a fixture kind. Failures carry a YAML block with
//! the kind and the mismatch, and the trailer tallies each kind before the
//! overall counts.

use std::collections::BTreeMap;
use std::fmt;

/// What a test point checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FixtureKind {
    /// Lowered source against `*.expected.js`.
    Lowered,
    /// Console output of the lowered source against `*.expected-output.txt`.
    Output,
    /// First diagnostic of a file rejected at this pass.
    Rejected(u8),
}

impl FixtureKind {
    fn point_name(self, stem: &str) -> String {
        match self {
            FixtureKind::Lowered => format!("positive/{}", stem),
            FixtureKind::Output => format!("positive/{} (output)", stem),
            FixtureKind::Rejected(pass) => format!("negative/pass{}/{}", pass, stem),
        }
    }
}

impl fmt::Display for FixtureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureKind::Lowered => f.write_str("lowered"),
            FixtureKind::Output => f.write_str("output"),
            FixtureKind::Rejected(pass) => write!(f, "rejected at pass {}", pass),
        }
    }
}

struct Point {
    kind: FixtureKind,
    stem: String,
    failure: Option<String>,
}

pub struct Tap {
    points: Vec<Point>,
}

impl Tap {
    pub fn new() -> Self {
        Tap { points: Vec::new() }
    }

    pub fn record(&mut self, kind: FixtureKind, stem: &str, outcome: Result<(), String>) {
        if let Err(reason) = &outcome {
            tracing::debug!(%kind, fixture = stem, %reason, "fixture failed");
        }
        self.points.push(Point {
            kind,
            stem: stem.to_owned(),
            failure: outcome.err(),
        });
    }

    pub fn total(&self) -> usize {
        self.points.len()
    }

    pub fn failure_count(&self) -> usize {
        self.points.iter().filter(|p| p.failure.is_some()).count()
    }

    /// `(passed, total)` per kind, in kind order.
    fn tally(&self) -> BTreeMap<FixtureKind, (usize, usize)> {
        let mut tally = BTreeMap::new();
        for p in &self.points {
            let entry = tally.entry(p.kind).or_insert((0, 0));
            if p.failure.is_none() {
                entry.0 += 1;
            }
            entry.1 += 1;
        }
        tally
    }

    pub fn render(&self) -> String {
        let mut out = format!("TAP version 14\n1..{}\n", self.points.len());
        for (i, p) in self.points.iter().enumerate() {
            let name = p.kind.point_name(&p.stem);
            match &p.failure {
                None => out.push_str(&format!("ok {} - {}\n", i + 1, name)),
                Some(reason) => {
                    out.push_str(&format!("not ok {} - {}\n", i + 1, name));
                    out.push_str(&format!("  ---\n  kind: {}\n  message: |\n", p.kind));
                    for line in reason.lines() {
                        out.push_str(&format!("    {}\n", line));
                    }
                    out.push_str("  ...\n");
                }
            }
        }
        for (kind, (passed, total)) in self.tally() {
            out.push_str(&format!("# {} {}/{}\n", kind, passed, total));
        }
        let failed = self.failure_count();
        out.push_str(&format!("# tests {}\n", self.points.len()));
        out.push_str(&format!("# pass  {}\n", self.points.len() - failed));
        out.push_str(&format!("# fail  {}\n", failed));
        out
    }

    /// Print the report to stdout.
    pub fn finish(self) {
        print!("{}", self.render());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_carry_their_kind() {
        let mut tap = Tap::new();
        tap.record(FixtureKind::Lowered, "a", Ok(()));
        tap.record(
            FixtureKind::Rejected(2),
            "b",
            Err("expected x\ngot y".to_owned()),
        );
        assert_eq!(tap.failure_count(), 1);
        assert_eq!(
            tap.render(),
            "TAP version 14\n1..2\n\
             ok 1 - positive/a\n\
             not ok 2 - negative/pass2/b\n  ---\n  kind: rejected at pass 2\n  message: |\n    expected x\n    got y\n  ...\n\
             # lowered 1/1\n# rejected at pass 2 0/1\n\
             # tests 2\n# pass  1\n# fail  1\n"
        );
    }

    #[test]
    fn kinds_are_tallied_in_order() {
        let mut tap = Tap::new();
        tap.record(FixtureKind::Rejected(0), "z", Ok(()));
        tap.record(FixtureKind::Output, "a", Err("differs".to_owned()));
        tap.record(FixtureKind::Lowered, "a", Ok(()));
        let report = tap.render();
        let lowered = report.find("# lowered 1/1").unwrap();
        let output = report.find("# output 0/1").unwrap();
        let pass0 = report.find("# rejected at pass 0 1/1").unwrap();
        assert!(lowered < output && output < pass0, "{}", report);
        assert!(report.contains("not ok 2 - positive/a (output)\n"), "{}", report);
    }

    #[test]
    fn empty_suite_has_zero_plan() {
        assert!(Tap::new().render().starts_with("TAP version 14\n1..0\n"));
    }
}
