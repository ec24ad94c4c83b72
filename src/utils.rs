//! Miscellaneous utilities: seeded sampling, a small dense linear solver and
//! the `_`-delimited tokenizer behind the construction strings.

use nalgebra::{DMatrix, DVector};
use rand::distributions::Uniform;
use rand::prelude::*;

use crate::error::{ConfigError, ConfigResult};

/// Uniform index generator over an explicit `StdRng`.
///
/// Never reseeded implicitly: two generators built from the same seed produce
/// the same draws.
#[derive(Debug, Clone)]
pub struct UniformRandomGenerator {
    rng: StdRng,
}

impl UniformRandomGenerator {
    /// Construct from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Construct with a fixed seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw a seed for a derived generator.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Fill `out` with distinct integers in `[min, max]`.
    ///
    /// Requires `out.len() <= max - min + 1`; rejection sampling is fine for
    /// the minimal sample sizes used here.
    pub fn gen_unique(&mut self, out: &mut [usize], min: usize, max: usize) {
        debug_assert!(out.len() <= max - min + 1);
        let dist = Uniform::new_inclusive(min, max);
        for i in 0..out.len() {
            loop {
                let candidate = self.rng.sample(dist);
                if out[..i].iter().all(|&v| v != candidate) {
                    out[i] = candidate;
                    break;
                }
            }
        }
    }
}

impl Default for UniformRandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Solve `A x = b` by Gaussian elimination with partial pivoting.
///
/// `augmented` is `[A | b]` with `A` square. Returns `None` when a pivot
/// falls below `1e-10` (singular or near-singular system).
pub fn gauss_elimination(mut augmented: DMatrix<f64>) -> Option<DVector<f64>> {
    let n = augmented.nrows();
    if augmented.ncols() != n + 1 {
        return None;
    }

    for i in 0..n {
        let mut max_row = i;
        let mut max_val = augmented[(i, i)].abs();
        for k in (i + 1)..n {
            let val = augmented[(k, i)].abs();
            if val > max_val {
                max_val = val;
                max_row = k;
            }
        }
        if max_row != i {
            augmented.swap_rows(i, max_row);
        }

        let pivot = augmented[(i, i)];
        if pivot.abs() < 1e-10 {
            return None;
        }
        for k in (i + 1)..n {
            let factor = augmented[(k, i)] / pivot;
            for j in i..=n {
                augmented[(k, j)] -= factor * augmented[(i, j)];
            }
        }
    }

    let mut x = DVector::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut acc = augmented[(i, n)];
        for j in (i + 1)..n {
            acc -= augmented[(i, j)] * x[j];
        }
        x[i] = acc / augmented[(i, i)];
    }
    Some(x)
}

/// Parse `a/b` or a plain number.
pub fn parse_fraction(token: &str) -> Option<f64> {
    match token.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            let value = num / den;
            value.is_finite().then_some(value)
        }
        None => token.trim().parse().ok(),
    }
}

/// Cursor over `separator`-delimited tokens.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    tokens: Vec<&'a str>,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &'a str, separator: char) -> Self {
        let tokens = if text.trim().is_empty() {
            Vec::new()
        } else {
            text.split(separator).map(str::trim).collect()
        };
        Self { tokens, pos: 0 }
    }

    pub fn has_next(&self) -> bool {
        self.pos < self.tokens.len()
    }

    pub fn next_token(&mut self, field: &'static str) -> ConfigResult<&'a str> {
        let token = self
            .tokens
            .get(self.pos)
            .copied()
            .ok_or(ConfigError::MissingValue(field))?;
        self.pos += 1;
        Ok(token)
    }

    /// Consume the next token if it equals `keyword` (ASCII case-insensitive).
    pub fn is_next(&mut self, keyword: &str) -> bool {
        match self.tokens.get(self.pos) {
            Some(token) if token.eq_ignore_ascii_case(keyword) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    pub fn next_int<T: std::str::FromStr>(&mut self, field: &'static str) -> ConfigResult<T> {
        let token = self.next_token(field)?;
        token.parse().map_err(|_| ConfigError::InvalidNumber {
            field,
            token: token.to_string(),
        })
    }

    pub fn next_f64(&mut self, field: &'static str) -> ConfigResult<f64> {
        let token = self.next_token(field)?;
        token
            .parse::<f64>()
            .ok()
            .filter(|v| !v.is_nan())
            .ok_or_else(|| ConfigError::InvalidNumber {
                field,
                token: token.to_string(),
            })
    }

    pub fn next_fraction(&mut self, field: &'static str) -> ConfigResult<f64> {
        let token = self.next_token(field)?;
        parse_fraction(token).ok_or_else(|| ConfigError::InvalidNumber {
            field,
            token: token.to_string(),
        })
    }

    /// Fail on any unconsumed token.
    pub fn finish(self) -> ConfigResult<()> {
        match self.tokens.get(self.pos) {
            Some(token) => Err(ConfigError::UnexpectedToken(token.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_samples_within_bounds() {
        let mut rng = UniformRandomGenerator::from_seed(1234);
        let mut buf = [0usize; 5];
        rng.gen_unique(&mut buf, 0, 10);

        assert!(buf.iter().all(|&v| v <= 10));
        for i in 0..buf.len() {
            for j in (i + 1)..buf.len() {
                assert_ne!(buf[i], buf[j]);
            }
        }
    }

    #[test]
    fn deterministic_with_same_seed() {
        let mut rng1 = UniformRandomGenerator::from_seed(42);
        let mut rng2 = UniformRandomGenerator::from_seed(42);
        let mut a1 = [0usize; 4];
        let mut a2 = [0usize; 4];
        rng1.gen_unique(&mut a1, 0, 100);
        rng2.gen_unique(&mut a2, 0, 100);
        assert_eq!(a1, a2);
        assert_eq!(rng1.next_seed(), rng2.next_seed());
    }

    #[test]
    fn gauss_elimination_solves_small_system() {
        // 2x + y = 5, x - y = 1
        let augmented = DMatrix::from_row_slice(2, 3, &[2.0, 1.0, 5.0, 1.0, -1.0, 1.0]);
        let x = gauss_elimination(augmented).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-12);
        assert!((x[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn gauss_elimination_rejects_singular_system() {
        let augmented = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 2.0, 4.0, 6.0]);
        assert!(gauss_elimination(augmented).is_none());
    }

    #[test]
    fn fractions_parse() {
        assert_eq!(parse_fraction("16/9"), Some(16.0 / 9.0));
        assert_eq!(parse_fraction("2.5"), Some(2.5));
        assert_eq!(parse_fraction("1/0"), None);
        assert_eq!(parse_fraction("abc"), None);
    }

    #[test]
    fn tokenizer_walks_keywords_and_values() {
        let mut tk = Tokenizer::new("4_300_2.5_CORRECTION_MINWIDTH_1/2", '_');
        assert_eq!(tk.next_int::<i64>("model").unwrap(), 4);
        assert_eq!(tk.next_int::<usize>("cycles").unwrap(), 300);
        assert_eq!(tk.next_f64("dist").unwrap(), 2.5);
        assert!(!tk.is_next("MINMATCHES"));
        assert!(tk.is_next("correction"));
        assert!(tk.is_next("MINWIDTH"));
        assert_eq!(tk.next_fraction("width").unwrap(), 0.5);
        assert!(!tk.has_next());
        tk.finish().unwrap();
    }

    #[test]
    fn tokenizer_reports_leftovers() {
        let mut tk = Tokenizer::new("1_L2_EXTRA", '_');
        tk.next_token("a").unwrap();
        tk.next_token("b").unwrap();
        assert_eq!(
            tk.finish(),
            Err(ConfigError::UnexpectedToken("EXTRA".to_string()))
        );
    }
}
