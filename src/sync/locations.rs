//! Canonical and legacy remote locations per synchronized entity.
//!
//! Each entity has exactly one canonical `(phase, step, activity)` address
//! and an ordered list of legacy addresses that may still hold data written
//! by earlier schema versions. Reads stop at the first location that yields
//! data; a legacy hit is migrated forward to the canonical location.

use crate::remote::ResponseAddress;

/// A `(phase, step, activity)` address within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
  pub phase: &'static str,
  pub step: &'static str,
  pub activity: &'static str,
}

impl Location {
  pub const fn new(phase: &'static str, step: &'static str, activity: &'static str) -> Self {
    Self {
      phase,
      step,
      activity,
    }
  }

  pub fn address(&self, project_id: &str) -> ResponseAddress {
    ResponseAddress::new(project_id, self.phase, self.step, self.activity)
  }
}

/// The full location set for one entity.
pub struct LocationChain {
  pub canonical: Location,
  /// Checked in order after the canonical location comes up empty.
  pub legacy: &'static [Location],
  /// Extra locations written alongside canonical, for read paths that
  /// address the data differently (the public form).
  pub secondary: &'static [Location],
}

pub const SLIDER_QUESTIONS: LocationChain = LocationChain {
  canonical: Location::new("collection", "questions", "slider-questions"),
  legacy: &[
    Location::new("design", "form-questions", "slider-questions"),
    Location::new("design", "questions", "slider-questions"),
  ],
  secondary: &[Location::new("collection", "public-form", "slider-questions")],
};

pub const PARTICIPANT_QUESTIONS: LocationChain = LocationChain {
  canonical: Location::new("collection", "questions", "participant-questions"),
  legacy: &[Location::new(
    "design",
    "form-questions",
    "participant-questions",
  )],
  secondary: &[],
};

pub const STORY_QUESTION: LocationChain = LocationChain {
  canonical: Location::new("collection", "questions", "story-question"),
  legacy: &[Location::new("design", "form-questions", "story-question")],
  secondary: &[],
};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn address_carries_the_project() {
    let addr = SLIDER_QUESTIONS.canonical.address("p1");
    assert_eq!(addr.project_id, "p1");
    assert_eq!(addr.phase_id, "collection");
    assert_eq!(addr.step_id, "questions");
    assert_eq!(addr.activity_id, "slider-questions");
  }

  #[test]
  fn canonical_locations_are_not_in_their_own_legacy_chain() {
    for chain in [&SLIDER_QUESTIONS, &PARTICIPANT_QUESTIONS, &STORY_QUESTION] {
      assert!(!chain.legacy.contains(&chain.canonical));
    }
  }
}
