//! Template choice. Strategies never touch ambient randomness; they take a
//! selector, which tests pin and production seeds from config.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait TemplateSelector: Send {
    /// Returns an index in `0..n`. `n` is always > 0.
    fn pick(&mut self, n: usize) -> usize;
}

/// `StdRng`-backed selector: reproducible with a seed, entropy-seeded otherwise.
pub struct SeededSelector(StdRng);

impl SeededSelector {
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self(StdRng::seed_from_u64(seed)),
            None => Self(StdRng::from_entropy()),
        }
    }
}

impl TemplateSelector for SeededSelector {
    fn pick(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        self.0.gen_range(0..n)
    }
}

/// Always picks the same index (clamped to the slice).
#[cfg(test)]
pub struct FixedSelector(pub usize);

#[cfg(test)]
impl TemplateSelector for FixedSelector {
    fn pick(&mut self, n: usize) -> usize {
        self.0.min(n.saturating_sub(1))
    }
}

/// Picks a template with `selector`; `None` for an empty list.
pub fn choose<'t, T>(selector: &mut dyn TemplateSelector, templates: &'t [T]) -> Option<&'t T> {
    if templates.is_empty() {
        return None;
    }
    templates.get(selector.pick(templates.len()))
}
