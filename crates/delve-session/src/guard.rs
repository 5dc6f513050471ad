//! The determinism guard: sample and verify result fingerprints.
//!
//! After every completed command the live side samples a 16-bit digest
//! of the simulation's generator state and appends it to the log.
//! Replay recomputes the digest from its own simulation and compares;
//! a mismatch is conclusive proof that two runs have drifted, and it is
//! the only such signal, so it is never ignored.

use std::fmt;

use delve_core::{Fingerprint, MoveNumber, Simulation};
use delve_log::{LogError, LogWriter};

/// A fingerprint mismatch detected during replay.
///
/// Distinct from every format error so a UI can explain "this replay
/// does not match the recorded game" rather than "this file is
/// corrupt".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Divergence {
    /// The move at which the mismatch was detected.
    pub mov: MoveNumber,
    /// The fingerprint recorded by the live session.
    pub recorded: Fingerprint,
    /// The fingerprint recomputed during replay.
    pub replayed: Fingerprint,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "divergence at move {}: recorded {}, replayed {}",
            self.mov, self.recorded, self.replayed
        )
    }
}

impl std::error::Error for Divergence {}

/// Sample the simulation's fingerprint and append it, sealing the
/// current command in the log.
pub fn seal(writer: &mut LogWriter, sim: &dyn Simulation) -> Result<Fingerprint, LogError> {
    let fp = sim.rng_fingerprint();
    writer.append_fingerprint(fp)?;
    Ok(fp)
}

/// Recompute the fingerprint after replaying move `mov` and compare it
/// to the recorded value.
pub fn verify(
    mov: MoveNumber,
    recorded: Fingerprint,
    sim: &dyn Simulation,
) -> Result<(), Divergence> {
    let replayed = sim.rng_fingerprint();
    if replayed == recorded {
        Ok(())
    } else {
        Err(Divergence {
            mov,
            recorded,
            replayed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_test_utils::MockDungeon;

    #[test]
    fn matching_fingerprint_passes() {
        let sim = MockDungeon::new(11);
        let fp = sim.rng_fingerprint();
        assert!(verify(MoveNumber(1), fp, &sim).is_ok());
    }

    #[test]
    fn mismatch_reports_both_values() {
        let mut sim = MockDungeon::new(11);
        let fp = sim.rng_fingerprint();
        sim.scramble(1);
        let err = verify(MoveNumber(9), fp, &sim).unwrap_err();
        assert_eq!(err.mov, MoveNumber(9));
        assert_eq!(err.recorded, fp);
        assert_ne!(err.replayed, fp);
    }
}
